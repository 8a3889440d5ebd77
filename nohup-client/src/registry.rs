//! Session identity
//!
//! Exactly one session is current at any time. The backend keys its
//! conversation history by this id, so starting a new session is what makes
//! the agent forget the previous conversation.

use std::fmt;
use std::str::FromStr;

use uuid::Uuid;

/// Identifier of one conversation with the agent backend
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SessionId(Uuid);

impl SessionId {
    /// Generate a fresh random id
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for SessionId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.0, f)
    }
}

impl FromStr for SessionId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Uuid::parse_str(s).map(Self)
    }
}

/// Tracks the current session
#[derive(Debug)]
pub struct SessionRegistry {
    current: SessionId,
}

impl SessionRegistry {
    /// Start with a freshly generated session
    pub fn new() -> Self {
        Self::with_session(SessionId::new())
    }

    /// Start with a known session, e.g. to resume a conversation
    pub fn with_session(current: SessionId) -> Self {
        Self { current }
    }

    pub fn current(&self) -> SessionId {
        self.current
    }

    /// Replace the current session with a new, distinct one
    pub fn start_new(&mut self) -> SessionId {
        let mut next = SessionId::new();
        while next == self.current {
            next = SessionId::new();
        }
        tracing::info!(previous = %self.current, session = %next, "Starting new session");
        self.current = next;
        next
    }
}

impl Default for SessionRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_start_new_changes_current() {
        let mut registry = SessionRegistry::new();
        let first = registry.current();
        let second = registry.start_new();
        assert_ne!(first, second);
        assert_eq!(registry.current(), second);
    }

    #[test]
    fn test_with_session_keeps_id() {
        let id = SessionId::new();
        let registry = SessionRegistry::with_session(id);
        assert_eq!(registry.current(), id);
    }

    #[test]
    fn test_session_id_parse_and_display() {
        let text = "8c6f6d4e-2f55-4a8e-9a3e-5b8f0c1d2e3f";
        let id: SessionId = text.parse().unwrap();
        assert_eq!(id.to_string(), text);
    }

    #[test]
    fn test_session_id_parse_rejects_garbage() {
        assert!("not-a-uuid".parse::<SessionId>().is_err());
    }
}
