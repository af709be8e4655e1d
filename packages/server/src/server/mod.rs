// Inbound command handling (envelope decoding, dispatch, result publishing)
pub mod router;

pub use router::*;
