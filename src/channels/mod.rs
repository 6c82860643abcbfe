//! Channel abstraction for message I/O.

pub mod channel;
pub mod cli;
pub mod whatsapp;

pub use channel::*;
pub use cli::CliChannel;
pub use whatsapp::{WhatsAppChannel, WhatsAppConfig};
