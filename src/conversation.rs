//! The ordered turn history of a session and the rolling context that accompanies it.

use crate::error::{Error, Result};
use crate::types::{Role, RollingContext, Turn};

/// Owns the conversation log and the server's rolling context.
///
/// The log only grows: turns are appended at the end and the whole store is emptied by
/// [`ConversationStore::clear`].  No turn is ever edited, reordered or removed individually,
/// so every request sees a prefix of what the next request will see.
#[derive(Debug, Clone, Default)]
pub struct ConversationStore {
    turns: Vec<Turn>,
    context: Option<RollingContext>,
}

impl ConversationStore {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a turn to the end of the log.
    ///
    /// # Errors
    ///
    /// Returns a validation error for a user turn whose content is blank.
    pub fn append(&mut self, turn: Turn) -> Result<()> {
        if turn.role == Role::User && turn.content.trim().is_empty() {
            return Err(Error::validation(
                "user turn must not be empty",
                Some("content".to_string()),
            ));
        }
        self.turns.push(turn);
        Ok(())
    }

    /// The full log, oldest first.
    pub fn all(&self) -> &[Turn] {
        &self.turns
    }

    /// The number of turns in the log.
    pub fn len(&self) -> usize {
        self.turns.len()
    }

    /// True when the log holds no turns.
    pub fn is_empty(&self) -> bool {
        self.turns.is_empty()
    }

    /// The rolling context from the latest successful exchange.
    pub fn rolling_context(&self) -> Option<&RollingContext> {
        self.context.as_ref()
    }

    /// Replaces the rolling context with the server's latest value.
    pub fn replace_context(&mut self, context: RollingContext) {
        self.context = Some(context);
    }

    /// Empties the log and drops the rolling context.
    pub fn clear(&mut self) {
        self.turns.clear();
        self.context = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn append_preserves_order() {
        let mut store = ConversationStore::new();
        store.append(Turn::user("one")).unwrap();
        store.append(Turn::assistant("two")).unwrap();
        store.append(Turn::user("three")).unwrap();
        let contents: Vec<_> = store.all().iter().map(|t| t.content.as_str()).collect();
        assert_eq!(contents, vec!["one", "two", "three"]);
        assert_eq!(store.len(), 3);
    }

    #[test]
    fn blank_user_turn_rejected() {
        let mut store = ConversationStore::new();
        let err = store.append(Turn::user("  \n\t")).unwrap_err();
        assert!(err.is_validation());
        assert!(store.is_empty());
    }

    #[test]
    fn duplicates_are_kept() {
        let mut store = ConversationStore::new();
        store.append(Turn::user("hi")).unwrap();
        store.append(Turn::user("hi")).unwrap();
        assert_eq!(store.len(), 2);
    }

    #[test]
    fn clear_drops_turns_and_context() {
        let mut store = ConversationStore::new();
        store.append(Turn::user("hi")).unwrap();
        store.replace_context(RollingContext::new(json!([1, 2])));
        assert!(store.rolling_context().is_some());

        store.clear();
        assert!(store.is_empty());
        assert!(store.rolling_context().is_none());
    }

    #[test]
    fn context_is_replaced_not_merged() {
        let mut store = ConversationStore::new();
        store.replace_context(RollingContext::new(json!([1, 2, 3])));
        store.replace_context(RollingContext::new(json!([9])));
        assert_eq!(
            store.rolling_context(),
            Some(&RollingContext::new(json!([9])))
        );
    }
}
