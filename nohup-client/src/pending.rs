//! Tool calls awaiting a user decision
//!
//! The table is keyed by tool call id. An id can be resolved at most once:
//! resolution removes the entry, so a second approve or deny finds nothing.

use std::collections::{HashMap, HashSet};
use std::time::Duration;

use tokio::time::Instant;

use nohup_protocol::tools::PASTE_AT_CURSOR;
use nohup_protocol::ToolCall;

/// A tool call parked until the user approves or denies it
#[derive(Debug, Clone)]
pub struct PendingAction {
    pub call: ToolCall,
    pub received_at: Instant,
}

/// Pending action table
#[derive(Debug, Default)]
pub struct PendingActions {
    entries: HashMap<String, PendingAction>,
}

impl PendingActions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Park a tool call, returning any call it replaced under the same id
    pub fn put(&mut self, call: ToolCall) -> Option<ToolCall> {
        self.put_at(call, Instant::now())
    }

    pub fn put_at(&mut self, call: ToolCall, received_at: Instant) -> Option<ToolCall> {
        let id = call.id.clone();
        self.entries
            .insert(id, PendingAction { call, received_at })
            .map(|previous| previous.call)
    }

    pub fn get(&self, id: &str) -> Option<&ToolCall> {
        self.entries.get(id).map(|entry| &entry.call)
    }

    /// Remove and return a tool call
    pub fn remove(&mut self, id: &str) -> Option<ToolCall> {
        self.entries.remove(id).map(|entry| entry.call)
    }

    /// Drop every entry, returning how many were discarded
    pub fn clear(&mut self) -> usize {
        let count = self.entries.len();
        self.entries.clear();
        count
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Remove and return calls older than `max_age` at `now`, oldest first
    pub fn take_expired(&mut self, max_age: Duration, now: Instant) -> Vec<ToolCall> {
        let mut expired: Vec<PendingAction> = Vec::new();
        self.entries.retain(|_, entry| {
            if now.saturating_duration_since(entry.received_at) >= max_age {
                expired.push(entry.clone());
                false
            } else {
                true
            }
        });
        expired.sort_by_key(|entry| entry.received_at);
        expired.into_iter().map(|entry| entry.call).collect()
    }
}

/// Which tools run without asking the user
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApprovalPolicy {
    auto_approve: HashSet<String>,
}

impl ApprovalPolicy {
    /// Auto-approve exactly the named tools
    pub fn from_names<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            auto_approve: names.into_iter().map(Into::into).collect(),
        }
    }

    /// Every tool requires approval
    pub fn always_ask() -> Self {
        Self {
            auto_approve: HashSet::new(),
        }
    }

    pub fn requires_approval(&self, call: &ToolCall) -> bool {
        !self.auto_approve.contains(call.name())
    }
}

impl Default for ApprovalPolicy {
    fn default() -> Self {
        Self::from_names([PASTE_AT_CURSOR])
    }
}
