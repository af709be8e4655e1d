// Conversation command engine - core
//
// Consumes command envelopes that mutate rooms, routed instances and their
// messages, and republishes each outcome to downstream channels.

pub mod common;
pub mod config;
pub mod domains;
pub mod kernel;
pub mod server;

pub use config::*;
