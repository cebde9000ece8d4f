//! Read-only status surface shared with the control prompt

use crate::model::GameState;
use crate::strategy::incidents::Incident;
use serde::Serialize;
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

/// Running totals since start
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct StatusCounters {
    pub cycles: u64,
    pub skipped: u64,
    pub dispatched: u64,
    pub rejected: u64,
    pub resolved_incidents: u64,
    pub timed_out_incidents: u64,
}

#[derive(Debug, Default)]
struct Status {
    state: Option<Arc<GameState>>,
    incidents: Vec<Incident>,
    counters: StatusCounters,
}

/// Cheap to clone; every clone sees the same status
#[derive(Debug, Clone, Default)]
pub struct StatusBoard {
    inner: Arc<RwLock<Status>>,
}

impl StatusBoard {
    pub fn new() -> Self {
        Self::default()
    }

    // A panicked writer leaves plain data behind; keep serving it
    fn read(&self) -> RwLockReadGuard<'_, Status> {
        self.inner.read().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn write(&self) -> RwLockWriteGuard<'_, Status> {
        self.inner.write().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Latest published snapshot, if any cycle has been trusted yet
    pub fn current_state(&self) -> Option<Arc<GameState>> {
        self.read().state.clone()
    }

    pub fn pending_incidents(&self) -> Vec<Incident> {
        self.read().incidents.clone()
    }

    pub fn counters(&self) -> StatusCounters {
        self.read().counters
    }

    pub(crate) fn publish(&self, state: Arc<GameState>, incidents: Vec<Incident>) {
        let mut status = self.write();
        status.state = Some(state);
        status.incidents = incidents;
    }

    pub(crate) fn update_counters(&self, f: impl FnOnce(&mut StatusCounters)) {
        f(&mut self.write().counters);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clones_share_status() {
        let board = StatusBoard::new();
        let reader = board.clone();
        assert!(reader.current_state().is_none());

        board.publish(Arc::new(GameState::default()), Vec::new());
        board.update_counters(|c| c.dispatched += 2);

        assert!(reader.current_state().is_some());
        assert_eq!(reader.counters().dispatched, 2);
        assert!(reader.pending_incidents().is_empty());
    }
}
