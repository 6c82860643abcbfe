//! Menu responder: WhatsApp greeting/menu auto-responder with a per-contact
//! choice log.

pub mod bot;
pub mod channels;
pub mod config;
pub mod error;
pub mod pipeline;
pub mod server;
pub mod store;
