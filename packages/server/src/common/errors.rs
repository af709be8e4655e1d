use thiserror::Error;

/// Failures a command handler can surface.
///
/// Every variant reaches the caller the same way: one error envelope whose
/// `error` field is the `Display` text below. Callers only ever see the text.
#[derive(Error, Debug)]
pub enum EngineError {
    /// A referenced room, instance or message does not exist
    #[error("{0} not found")]
    NotFound(String),

    /// A required payload field is missing or malformed
    #[error("{0}")]
    PreconditionFailed(String),

    /// The command is restricted to another caller class
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    /// The document store or event publisher rejected a call
    #[error("Downstream failure: {0:#}")]
    DownstreamFailure(#[from] anyhow::Error),
}

impl EngineError {
    /// `"<field> is required"`
    pub fn required(field: &str) -> Self {
        Self::PreconditionFailed(format!("{} is required", field))
    }

    pub fn not_found(what: &str) -> Self {
        Self::NotFound(what.to_string())
    }
}

pub type EngineResult<T> = Result<T, EngineError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn messages_are_human_readable() {
        assert_eq!(EngineError::not_found("item").to_string(), "item not found");
        assert_eq!(
            EngineError::required("instance").to_string(),
            "instance is required"
        );
        assert_eq!(
            EngineError::Unauthorized("activate requires the client domain".into()).to_string(),
            "Unauthorized: activate requires the client domain"
        );
    }

    #[test]
    fn downstream_failure_keeps_context_chain() {
        let err: EngineError = anyhow::anyhow!("connection reset")
            .context("failed to write rooms/r1")
            .into();
        assert_eq!(
            err.to_string(),
            "Downstream failure: failed to write rooms/r1: connection reset"
        );
    }
}
