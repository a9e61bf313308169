//! In-memory session store.
//!
//! Each session holds a bounded turn history (oldest evicted first) plus a
//! bounded log of tool invocations. All mutations on one session happen
//! under that session's DashMap shard entry, so append-then-trim is atomic;
//! callers serialize whole turns through `SessionLaneManager`.

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use serde::Serialize;
use std::time::{Duration, Instant};

use crate::errors::ErrorDetail;
use crate::sessions::types::{InvocationStatus, ToolInvocation, Turn};

/// Turns kept per session at rest.
pub const SESSION_TURN_LIMIT: usize = 5;

/// Invocation records kept per session.
const INVOCATION_LOG_LIMIT: usize = 20;

struct SessionState {
    turns: Vec<Turn>,
    invocations: Vec<ToolInvocation>,
    created_at: DateTime<Utc>,
    last_activity_at: DateTime<Utc>,
    last_touched: Instant,
}

impl SessionState {
    fn new() -> Self {
        SessionState {
            turns: Vec::new(),
            invocations: Vec::new(),
            created_at: Utc::now(),
            last_activity_at: Utc::now(),
            last_touched: Instant::now(),
        }
    }

    fn touch(&mut self) {
        self.last_activity_at = Utc::now();
        self.last_touched = Instant::now();
    }
}

/// Point-in-time view of a session's metadata.
#[derive(Debug, Clone, Serialize)]
pub struct SessionMeta {
    pub session_id: String,
    pub turn_count: usize,
    pub created_at: DateTime<Utc>,
    pub last_activity_at: DateTime<Utc>,
}

pub struct SessionStore {
    sessions: DashMap<String, SessionState>,
}

impl SessionStore {
    pub fn new() -> Self {
        SessionStore {
            sessions: DashMap::new(),
        }
    }

    /// Ensures the session exists and returns its metadata.
    pub fn get_or_create(&self, session_id: &str) -> SessionMeta {
        let mut entry = self
            .sessions
            .entry(session_id.to_string())
            .or_insert_with(SessionState::new);
        entry.touch();
        SessionMeta {
            session_id: session_id.to_string(),
            turn_count: entry.turns.len(),
            created_at: entry.created_at,
            last_activity_at: entry.last_activity_at,
        }
    }

    /// Atomic append-then-trim. The stored turn count never exceeds
    /// `SESSION_TURN_LIMIT` once this returns.
    pub fn append_turn(&self, session_id: &str, turn: Turn) {
        let mut entry = self
            .sessions
            .entry(session_id.to_string())
            .or_insert_with(SessionState::new);
        entry.turns.push(turn);
        if entry.turns.len() > SESSION_TURN_LIMIT {
            let excess = entry.turns.len() - SESSION_TURN_LIMIT;
            entry.turns.drain(..excess);
        }
        entry.touch();
    }

    /// Snapshot copy of the last `limit` turns, oldest first. Safe to hold
    /// while other tasks keep appending.
    pub fn read_context(&self, session_id: &str, limit: usize) -> Vec<Turn> {
        match self.sessions.get(session_id) {
            Some(entry) => {
                let turns = &entry.turns;
                let start = turns.len().saturating_sub(limit);
                turns[start..].to_vec()
            }
            None => Vec::new(),
        }
    }

    pub fn turn_count(&self, session_id: &str) -> usize {
        self.sessions
            .get(session_id)
            .map(|e| e.turns.len())
            .unwrap_or(0)
    }

    pub fn meta(&self, session_id: &str) -> Option<SessionMeta> {
        self.sessions.get(session_id).map(|e| SessionMeta {
            session_id: session_id.to_string(),
            turn_count: e.turns.len(),
            created_at: e.created_at,
            last_activity_at: e.last_activity_at,
        })
    }

    pub fn record_invocation(&self, session_id: &str, invocation: ToolInvocation) {
        let mut entry = self
            .sessions
            .entry(session_id.to_string())
            .or_insert_with(SessionState::new);
        entry.invocations.push(invocation);
        if entry.invocations.len() > INVOCATION_LOG_LIMIT {
            let excess = entry.invocations.len() - INVOCATION_LOG_LIMIT;
            entry.invocations.drain(..excess);
        }
        entry.touch();
    }

    /// Terminal status update for an invocation. A cancelled invocation goes
    /// through here too, so nothing is ever left `pending` forever.
    pub fn finish_invocation(
        &self,
        session_id: &str,
        invocation_id: &str,
        status: InvocationStatus,
        result_summary: Option<String>,
        error: Option<ErrorDetail>,
    ) {
        if let Some(mut entry) = self.sessions.get_mut(session_id) {
            if let Some(inv) = entry
                .invocations
                .iter_mut()
                .find(|inv| inv.id == invocation_id)
            {
                inv.status = status;
                inv.result_summary = result_summary;
                inv.error = error;
                inv.finished_at = Some(Utc::now());
            }
            entry.touch();
        }
    }

    pub fn invocation(&self, session_id: &str, invocation_id: &str) -> Option<ToolInvocation> {
        self.sessions.get(session_id).and_then(|e| {
            e.invocations
                .iter()
                .find(|inv| inv.id == invocation_id)
                .cloned()
        })
    }

    pub fn invocations(&self, session_id: &str) -> Vec<ToolInvocation> {
        self.sessions
            .get(session_id)
            .map(|e| e.invocations.clone())
            .unwrap_or_default()
    }

    /// Removes sessions idle for longer than `idle_for`, skipping any the
    /// `busy` predicate reports as having work in flight. Returns the number
    /// evicted.
    pub fn evict_idle(&self, idle_for: Duration, busy: impl Fn(&str) -> bool) -> usize {
        let before = self.sessions.len();
        self.sessions
            .retain(|id, state| state.last_touched.elapsed() < idle_for || busy(id));
        let evicted = before - self.sessions.len();
        if evicted > 0 {
            log::info!("[SESSIONS] Evicted {} idle session(s)", evicted);
        }
        evicted
    }

    /// Explicit session-end signal. Returns false if the session was unknown.
    pub fn end_session(&self, session_id: &str) -> bool {
        self.sessions.remove(session_id).is_some()
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }
}

impl Default for SessionStore {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_turn_count_never_exceeds_limit() {
        let store = SessionStore::new();
        for i in 0..25 {
            store.append_turn("s1", Turn::user(format!("turn {}", i)));
            assert!(store.turn_count("s1") <= SESSION_TURN_LIMIT);
        }
        assert_eq!(store.turn_count("s1"), SESSION_TURN_LIMIT);
    }

    #[test]
    fn test_fifo_eviction_order() {
        let store = SessionStore::new();
        for i in 0..8 {
            store.append_turn("s1", Turn::user(format!("turn {}", i)));
        }
        let turns = store.read_context("s1", SESSION_TURN_LIMIT);
        let contents: Vec<&str> = turns.iter().map(|t| t.content.as_str()).collect();
        assert_eq!(
            contents,
            vec!["turn 3", "turn 4", "turn 5", "turn 6", "turn 7"]
        );
    }

    #[test]
    fn test_tool_result_round_trip_is_byte_exact() {
        let store = SessionStore::new();
        let summary = r#"{"status":"ok","data":{"balance_ton":12.5,"jettons":[]}}"#;
        store.append_turn("s1", Turn::tool_result(summary, "inv-1"));
        let turns = store.read_context("s1", SESSION_TURN_LIMIT);
        assert_eq!(turns.len(), 1);
        assert_eq!(turns[0].content.as_bytes(), summary.as_bytes());
        assert_eq!(turns[0].invocation_id.as_deref(), Some("inv-1"));
    }

    #[test]
    fn test_read_context_is_a_snapshot() {
        let store = SessionStore::new();
        store.append_turn("s1", Turn::user("one"));
        let snapshot = store.read_context("s1", SESSION_TURN_LIMIT);
        store.append_turn("s1", Turn::user("two"));
        assert_eq!(snapshot.len(), 1);
        assert_eq!(store.turn_count("s1"), 2);
    }

    #[test]
    fn test_sessions_are_independent() {
        let store = SessionStore::new();
        store.append_turn("a", Turn::user("for a"));
        store.append_turn("b", Turn::user("for b"));
        assert_eq!(store.read_context("a", 5)[0].content, "for a");
        assert_eq!(store.read_context("b", 5)[0].content, "for b");
        assert!(store.end_session("a"));
        assert_eq!(store.turn_count("a"), 0);
        assert_eq!(store.turn_count("b"), 1);
    }

    #[test]
    fn test_evict_idle_skips_busy_sessions() {
        let store = SessionStore::new();
        store.get_or_create("busy");
        store.get_or_create("idle");
        let evicted = store.evict_idle(Duration::from_secs(0), |id| id == "busy");
        assert_eq!(evicted, 1);
        assert!(store.meta("busy").is_some());
        assert!(store.meta("idle").is_none());
    }

    #[test]
    fn test_invocation_lifecycle() {
        let store = SessionStore::new();
        let inv = ToolInvocation::pending("inv-1", "get_ton_price", json!({"currency": "usd"}));
        store.record_invocation("s1", inv);
        assert_eq!(
            store.invocation("s1", "inv-1").unwrap().status,
            InvocationStatus::Pending
        );

        store.finish_invocation(
            "s1",
            "inv-1",
            InvocationStatus::Cancelled,
            None,
            None,
        );
        let inv = store.invocation("s1", "inv-1").unwrap();
        assert_eq!(inv.status, InvocationStatus::Cancelled);
        assert!(inv.finished_at.is_some());
    }

    #[test]
    fn test_invocation_log_is_bounded() {
        let store = SessionStore::new();
        for i in 0..30 {
            store.record_invocation(
                "s1",
                ToolInvocation::pending(format!("inv-{}", i), "get_ton_price", json!({})),
            );
        }
        let invs = store.invocations("s1");
        assert_eq!(invs.len(), 20);
        assert_eq!(invs[0].id, "inv-10");
    }
}
