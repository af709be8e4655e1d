// Common types and utilities shared across the application

pub mod envelope;
pub mod errors;
pub mod timestamps;

pub use envelope::{channel_for, CallerClass, Envelope, EnvelopeError, OutboundEnvelope, User};
pub use errors::{EngineError, EngineResult};
