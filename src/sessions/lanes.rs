//! Per-session write lanes.
//!
//! A lane is a one-permit semaphore per session id. Holding the lane makes a
//! whole turn (append, resolve, invoke, append result) single-writer for its
//! session; turns for different sessions run in parallel. The idle reaper
//! treats a held lane as proof of in-flight work and leaves that session
//! alone.

use dashmap::DashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::{OwnedSemaphorePermit, Semaphore};

/// Holding a lane longer than this is logged as suspicious.
const LANE_HOLD_WARNING_SECS: u64 = 60;

/// Hard cap on tracked lanes, abandoned session ids beyond it get pruned
/// oldest-first.
const MAX_LANES: usize = 10_000;

struct Lane {
    semaphore: Arc<Semaphore>,
    last_used: Instant,
}

impl Lane {
    fn new() -> Self {
        Lane {
            semaphore: Arc::new(Semaphore::new(1)),
            last_used: Instant::now(),
        }
    }
}

/// Releases the lane when dropped.
pub struct SessionLaneGuard {
    session_id: String,
    _permit: OwnedSemaphorePermit,
    acquired_at: Instant,
    manager: Arc<SessionLaneManager>,
}

impl SessionLaneGuard {
    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    pub fn held_duration(&self) -> Duration {
        self.acquired_at.elapsed()
    }
}

impl Drop for SessionLaneGuard {
    fn drop(&mut self) {
        let held = self.acquired_at.elapsed();
        if held.as_secs() > LANE_HOLD_WARNING_SECS {
            log::warn!(
                "[SESSIONS] Lane for {} held {}s, turn took unusually long",
                self.session_id,
                held.as_secs()
            );
        }
        if let Some(mut lane) = self.manager.lanes.get_mut(&self.session_id) {
            lane.last_used = Instant::now();
        }
    }
}

pub struct SessionLaneManager {
    lanes: DashMap<String, Lane>,
}

impl SessionLaneManager {
    pub fn new() -> Arc<Self> {
        Arc::new(SessionLaneManager {
            lanes: DashMap::new(),
        })
    }

    /// Waits until this session's lane is free and takes it.
    pub async fn acquire(self: &Arc<Self>, session_id: &str) -> SessionLaneGuard {
        let semaphore = self.lane_semaphore(session_id);
        let permit = semaphore
            .acquire_owned()
            .await
            .expect("session lane semaphore closed");
        SessionLaneGuard {
            session_id: session_id.to_string(),
            _permit: permit,
            acquired_at: Instant::now(),
            manager: Arc::clone(self),
        }
    }

    /// Non-blocking variant; None means another turn holds the lane.
    pub fn try_acquire(self: &Arc<Self>, session_id: &str) -> Option<SessionLaneGuard> {
        let semaphore = self.lane_semaphore(session_id);
        match semaphore.try_acquire_owned() {
            Ok(permit) => Some(SessionLaneGuard {
                session_id: session_id.to_string(),
                _permit: permit,
                acquired_at: Instant::now(),
                manager: Arc::clone(self),
            }),
            Err(_) => None,
        }
    }

    /// True while a turn for this session is in flight.
    pub fn is_held(&self, session_id: &str) -> bool {
        self.lanes
            .get(session_id)
            .map(|lane| lane.semaphore.available_permits() == 0)
            .unwrap_or(false)
    }

    /// Drops lanes idle past the threshold. Held lanes are never removed.
    pub fn prune_idle(&self, idle_for: Duration) {
        self.lanes.retain(|_, lane| {
            lane.semaphore.available_permits() == 0 || lane.last_used.elapsed() < idle_for
        });

        if self.lanes.len() > MAX_LANES {
            let mut by_age: Vec<(String, Instant)> = self
                .lanes
                .iter()
                .filter(|e| e.semaphore.available_permits() > 0)
                .map(|e| (e.key().clone(), e.last_used))
                .collect();
            by_age.sort_by_key(|(_, last_used)| *last_used);
            let excess = self.lanes.len() - MAX_LANES;
            for (key, _) in by_age.into_iter().take(excess) {
                self.lanes.remove(&key);
            }
        }
    }

    pub fn len(&self) -> usize {
        self.lanes.len()
    }

    pub fn held_count(&self) -> usize {
        self.lanes
            .iter()
            .filter(|e| e.semaphore.available_permits() == 0)
            .count()
    }

    fn lane_semaphore(&self, session_id: &str) -> Arc<Semaphore> {
        self.lanes
            .entry(session_id.to_string())
            .or_insert_with(Lane::new)
            .semaphore
            .clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_lane_serializes_one_session() {
        let manager = SessionLaneManager::new();

        let guard = manager.acquire("s1").await;
        assert!(manager.is_held("s1"));
        assert!(manager.try_acquire("s1").is_none());

        drop(guard);
        assert!(!manager.is_held("s1"));
        assert!(manager.try_acquire("s1").is_some());
    }

    #[tokio::test]
    async fn test_distinct_sessions_do_not_contend() {
        let manager = SessionLaneManager::new();

        let _g1 = manager.acquire("s1").await;
        let g2 = manager.try_acquire("s2");
        assert!(g2.is_some());
        assert_eq!(manager.held_count(), 2);
    }

    #[tokio::test]
    async fn test_prune_keeps_held_lanes() {
        let manager = SessionLaneManager::new();

        let _held = manager.acquire("held").await;
        drop(manager.acquire("idle").await);
        assert_eq!(manager.len(), 2);

        manager.prune_idle(Duration::from_secs(0));
        assert_eq!(manager.len(), 1);
        assert!(manager.is_held("held"));
    }
}
