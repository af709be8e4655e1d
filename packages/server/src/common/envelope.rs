//! Inbound and outbound command envelopes.
//!
//! Inbound envelopes arrive as base64-encoded JSON. Results leave as plain JSON
//! on a channel derived from a base name and the envelope's `source`.

use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;

/// Domain value that identifies the client/operator caller class.
pub const CLIENT_DOMAIN: &str = "client";

/// Already-authenticated identity that issued a command.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct User {
    #[serde(default, deserialize_with = "identifier")]
    pub id: String,
    /// Profile fields forwarded untouched (names, user_type, ...)
    #[serde(flatten)]
    pub attributes: Map<String, Value>,
}

impl User {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            attributes: Map::new(),
        }
    }

    pub fn to_value(&self) -> Value {
        serde_json::to_value(self).unwrap_or(Value::Null)
    }
}

/// Caller class carried in the envelope `domain` field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallerClass {
    /// Operators and other client-side tooling (`domain == "client"`)
    Client,
    /// Everyone else: admin pipelines, audience apps, ...
    Other,
}

impl CallerClass {
    pub fn from_domain(domain: &str) -> Self {
        if domain == CLIENT_DOMAIN {
            CallerClass::Client
        } else {
            CallerClass::Other
        }
    }
}

#[derive(Error, Debug)]
pub enum EnvelopeError {
    #[error("empty envelope")]
    Empty,

    #[error("invalid base64: {0}")]
    Base64(#[from] base64::DecodeError),

    #[error("invalid envelope json: {0}")]
    Json(#[from] serde_json::Error),
}

/// Decoded inbound command envelope.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Envelope {
    #[serde(default)]
    pub domain: String,
    #[serde(default)]
    pub action: String,
    #[serde(default)]
    pub command: String,
    #[serde(default)]
    pub payload: Value,
    #[serde(default)]
    pub user: User,
    #[serde(
        default,
        deserialize_with = "optional_identifier",
        skip_serializing_if = "Option::is_none"
    )]
    pub socket_id: Option<String>,
    #[serde(
        default,
        deserialize_with = "optional_identifier",
        skip_serializing_if = "Option::is_none"
    )]
    pub source: Option<String>,
    #[serde(
        default,
        deserialize_with = "optional_identifier",
        skip_serializing_if = "Option::is_none"
    )]
    pub event_id: Option<String>,
}

impl Envelope {
    /// Decode a base64-encoded JSON envelope.
    pub fn decode(data: &[u8]) -> Result<Self, EnvelopeError> {
        let trimmed = data.trim_ascii();
        if trimmed.is_empty() {
            return Err(EnvelopeError::Empty);
        }
        let json = STANDARD.decode(trimmed)?;
        Ok(serde_json::from_slice(&json)?)
    }

    /// Base64 form of this envelope, as it travels on the inbound subject.
    pub fn encode(&self) -> Result<String, EnvelopeError> {
        Ok(STANDARD.encode(serde_json::to_vec(self)?))
    }

    pub fn caller(&self) -> CallerClass {
        CallerClass::from_domain(&self.domain)
    }

    /// `source` with empty strings treated as absent
    pub fn source(&self) -> Option<&str> {
        self.source.as_deref().filter(|s| !s.is_empty())
    }
}

/// Result envelope published after a command completes or fails.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OutboundEnvelope {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub domain: String,
    pub action: String,
    pub command: String,
    pub payload: Value,
    pub user: User,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub socket_id: Option<String>,
}

impl OutboundEnvelope {
    pub fn success(envelope: &Envelope, payload: Value) -> Self {
        Self {
            error: None,
            domain: envelope.domain.clone(),
            action: envelope.action.clone(),
            command: envelope.command.clone(),
            payload,
            user: envelope.user.clone(),
            socket_id: envelope.socket_id.clone(),
        }
    }

    /// Error envelope echoing the inbound payload untouched.
    pub fn failure(envelope: &Envelope, message: impl Into<String>) -> Self {
        Self {
            error: Some(message.into()),
            ..Self::success(envelope, envelope.payload.clone())
        }
    }

    pub fn is_error(&self) -> bool {
        self.error.is_some()
    }
}

/// Identity fields arrive as strings, but some producers send numeric ids.
fn identifier<'de, D: Deserializer<'de>>(deserializer: D) -> Result<String, D::Error> {
    Ok(optional_identifier(deserializer)?.unwrap_or_default())
}

fn optional_identifier<'de, D: Deserializer<'de>>(
    deserializer: D,
) -> Result<Option<String>, D::Error> {
    match Value::deserialize(deserializer)? {
        Value::Null => Ok(None),
        Value::String(s) => Ok(Some(s)),
        Value::Number(n) => Ok(Some(n.to_string())),
        other => Err(D::Error::custom(format!(
            "expected a string or number identifier, found {}",
            other
        ))),
    }
}

/// `"<base>-<source>"`, or `base` alone when there is no source.
pub fn channel_for(base: &str, source: Option<&str>) -> String {
    match source {
        Some(source) if !source.is_empty() => format!("{}-{}", base, source),
        _ => base.to_string(),
    }
}
