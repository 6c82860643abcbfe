//! Message pipeline.
//!
//! Every inbound message flows through:
//! 1. `Classifier::classify()`: greeting, menu pick, or ignore (pure)
//! 2. `Dispatcher::handle()`: reply through the channel, then update the
//!    contact log
//!
//! The menu table in `menu` drives both steps.

pub mod classifier;
pub mod dispatcher;
pub mod menu;
pub mod types;
