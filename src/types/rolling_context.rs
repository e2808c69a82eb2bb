use serde::{Deserialize, Serialize};
use serde_json::Value;

/// The opaque continuation value a server returns after a successful exchange.
///
/// The client never interprets the contents.  It is stored as received, replayed verbatim on
/// the next request, and only inspected for its length.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RollingContext(Value);

impl RollingContext {
    /// Wrap a raw server value.
    pub fn new(value: Value) -> Self {
        Self(value)
    }

    /// The number of entries, when the value is a countable sequence.
    pub fn len(&self) -> Option<usize> {
        match &self.0 {
            Value::Array(items) => Some(items.len()),
            _ => None,
        }
    }

    /// True when the value is an empty sequence.
    pub fn is_empty(&self) -> bool {
        self.len() == Some(0)
    }

    /// The raw server value.
    pub fn as_value(&self) -> &Value {
        &self.0
    }
}

impl From<Value> for RollingContext {
    fn from(value: Value) -> Self {
        Self::new(value)
    }
}
