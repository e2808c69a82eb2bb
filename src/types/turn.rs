use serde::{Deserialize, Serialize};

use crate::types::Role;

/// One message in a conversation, attributed to a role.
///
/// Turns are immutable once appended to a conversation.  The serialized form is the message
/// shape the chat endpoint expects: `{"role": "...", "content": "..."}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Turn {
    /// Who authored the turn.
    pub role: Role,

    /// The text of the turn.
    pub content: String,
}

impl Turn {
    /// Create a new `Turn` with the given role and content.
    pub fn new(role: Role, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
        }
    }

    /// Create a new user `Turn`.
    pub fn user(content: impl Into<String>) -> Self {
        Self::new(Role::User, content)
    }

    /// Create a new assistant `Turn`.
    pub fn assistant(content: impl Into<String>) -> Self {
        Self::new(Role::Assistant, content)
    }

    /// Create a new system `Turn`.
    pub fn system(content: impl Into<String>) -> Self {
        Self::new(Role::System, content)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::{json, to_value};

    #[test]
    fn turn_wire_shape() {
        let turn = Turn::user("hi");
        assert_eq!(
            to_value(&turn).unwrap(),
            json!({"role": "user", "content": "hi"})
        );
    }

    #[test]
    fn turn_deserialization() {
        let turn: Turn =
            serde_json::from_value(json!({"role": "assistant", "content": "hello"})).unwrap();
        assert_eq!(turn, Turn::assistant("hello"));
    }
}
