//! Rooms domain - rooms, routed instances and their messages.

pub mod actions;
pub mod commands;
pub mod models;
pub mod participants;
pub mod visibility;

pub use commands::{Command, CommandKind};
pub use models::*;
