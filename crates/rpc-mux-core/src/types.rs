//! Call identity and parameter types.

use std::borrow::Borrow;
use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Session identifier. Assigned by the dispatcher, monotonically increasing,
/// unique among live sessions.
pub type SessionId = u64;

/// Sequence identifier carried by inbound response handles.
pub type SeqId = u64;

/// Call parameters: a JSON object.
pub type Params = serde_json::Map<String, Value>;

/// Reserved parameter key the dispatcher uses to correlate traffic with a
/// session.
pub const SESSION_ID_KEY: &str = "sessionID";

/// An RPC method name.
///
/// Unknown methods surface as explicit lookup misses rather than raw string
/// key accesses.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Method(String);

impl Method {
    /// Create a method name.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    /// The method name as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for Method {
    fn from(name: &str) -> Self {
        Self(name.to_owned())
    }
}

impl From<String> for Method {
    fn from(name: String) -> Self {
        Self(name)
    }
}

impl Borrow<str> for Method {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl AsRef<str> for Method {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Merge a session ID into caller-supplied params under [`SESSION_ID_KEY`].
///
/// The session ID wins over any caller-supplied value for the key.
#[must_use]
pub fn with_session_id(mut params: Params, session_id: SessionId) -> Params {
    params.insert(SESSION_ID_KEY.to_owned(), Value::from(session_id));
    params
}

/// Extract the session ID from inbound params, if present.
#[must_use]
pub fn session_id_of(params: &Params) -> Option<SessionId> {
    params.get(SESSION_ID_KEY).and_then(Value::as_u64)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_with_session_id_inserts_key() {
        let params = with_session_id(Params::new(), 124);
        assert_eq!(params.get(SESSION_ID_KEY), Some(&json!(124)));
        assert_eq!(params.len(), 1);
    }

    #[test]
    fn test_with_session_id_wins_over_caller_value() {
        let mut params = Params::new();
        params.insert(SESSION_ID_KEY.to_owned(), json!(7));
        params.insert("name".to_owned(), json!("alice"));

        let params = with_session_id(params, 125);
        assert_eq!(session_id_of(&params), Some(125));
        assert_eq!(params.get("name"), Some(&json!("alice")));
    }

    #[test]
    fn test_session_id_of_missing_or_non_numeric() {
        assert_eq!(session_id_of(&Params::new()), None);

        let mut params = Params::new();
        params.insert(SESSION_ID_KEY.to_owned(), json!("not a number"));
        assert_eq!(session_id_of(&params), None);
    }

    #[test]
    fn test_method_borrow_allows_str_lookup() {
        let mut map = std::collections::HashMap::new();
        map.insert(Method::from("chat.send"), 1);
        assert_eq!(map.get("chat.send"), Some(&1));
        assert_eq!(map.get("chat.recv"), None);
    }
}
