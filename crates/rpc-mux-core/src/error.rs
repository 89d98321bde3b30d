//! Wire-facing error shape.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::types::{Method, SessionId};

/// Protocol status code accompanying an [`RpcError`].
///
/// Serializes as the numeric protocol value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(into = "u32", try_from = "u32")]
pub enum StatusCode {
    /// No error.
    Ok,
    /// Generic failure.
    Generic,
}

impl StatusCode {
    /// Numeric protocol value.
    #[must_use]
    pub const fn code(self) -> u32 {
        match self {
            Self::Ok => 0,
            Self::Generic => 218,
        }
    }
}

impl From<StatusCode> for u32 {
    fn from(code: StatusCode) -> Self {
        code.code()
    }
}

impl TryFrom<u32> for StatusCode {
    type Error = UnknownStatusCode;

    fn try_from(code: u32) -> Result<Self, UnknownStatusCode> {
        match code {
            0 => Ok(Self::Ok),
            218 => Ok(Self::Generic),
            other => Err(UnknownStatusCode(other)),
        }
    }
}

/// A numeric status code with no known variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("unknown status code {0}")]
pub struct UnknownStatusCode(pub u32);

/// Error reported back to a caller through a response handle.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
#[error("{desc}")]
pub struct RpcError {
    /// Status code.
    pub code: StatusCode,
    /// Human-readable description.
    pub desc: String,
}

impl RpcError {
    /// A generic error with the given description.
    #[must_use]
    pub fn generic(desc: impl Into<String>) -> Self {
        Self {
            code: StatusCode::Generic,
            desc: desc.into(),
        }
    }

    /// The error sent back when an inbound call has no session and no
    /// registered handler.
    #[must_use]
    pub fn unhandled(session_id: Option<SessionId>, method: &Method) -> Self {
        let desc = match session_id {
            Some(id) => format!("Unhandled incoming RPC {id} {method}"),
            None => format!("Unhandled incoming RPC {method}"),
        };
        Self::generic(desc)
    }

    /// The error sent back when an outstanding call is cancelled.
    #[must_use]
    pub fn cancelled() -> Self {
        Self::generic("Canceling RPC")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_code_values() {
        assert_eq!(StatusCode::Ok.code(), 0);
        assert_eq!(StatusCode::Generic.code(), 218);
    }

    #[test]
    fn test_unhandled_mentions_session_and_method() {
        let err = RpcError::unhandled(Some(124), &Method::from("chat.send"));
        assert_eq!(err.code, StatusCode::Generic);
        assert!(err.desc.contains("124"));
        assert!(err.desc.contains("chat.send"));

        let err = RpcError::unhandled(None, &Method::from("chat.send"));
        assert!(err.desc.contains("chat.send"));
    }

    #[test]
    fn test_serialization_uses_numeric_code() {
        let err = RpcError::cancelled();
        let json = serde_json::to_value(&err).unwrap();
        assert_eq!(json["code"], serde_json::json!(218));
        assert_eq!(json["desc"], serde_json::json!("Canceling RPC"));

        let parsed: RpcError = serde_json::from_value(json).unwrap();
        assert_eq!(parsed, err);
    }

    #[test]
    fn test_unknown_numeric_code_is_rejected() {
        let result: Result<StatusCode, _> = serde_json::from_str("999");
        assert!(result.is_err());
        assert_eq!(StatusCode::try_from(999), Err(UnknownStatusCode(999)));
    }
}
