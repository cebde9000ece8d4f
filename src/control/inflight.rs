//! In-flight action tracking
//!
//! A dispatched idempotency key stays blocked until its effect shows up in a
//! later snapshot or its ttl runs out. Keys given up on after repeated
//! rejections are blocked the same way.

use crate::core::types::Cycle;
use crate::model::GameState;
use crate::strategy::assignment::PendingMove;
use crate::strategy::proposal::Action;
use ahash::AHashMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryKind {
    /// Applied by the actuator, effect not seen yet
    Pending,
    /// Dropped after too many rejections
    Abandoned,
}

#[derive(Debug, Clone)]
pub struct InFlight {
    pub action: Action,
    pub kind: EntryKind,
    pub dispatched_cycle: Cycle,
    pub expires_at: Cycle,
    /// Room progress when a collect was dispatched
    baseline_progress: Option<f32>,
}

#[derive(Debug, Default)]
pub struct InFlightTracker {
    entries: AHashMap<String, InFlight>,
}

impl InFlightTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Whether a proposal with this key must not be dispatched now
    pub fn is_blocked(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }

    pub fn get(&self, key: &str) -> Option<&InFlight> {
        self.entries.get(key)
    }

    /// Record a successfully applied action
    pub fn record(&mut self, key: &str, action: &Action, state: &GameState, cycle: Cycle, ttl: Cycle) {
        let baseline_progress = match action {
            Action::Collect { room, .. } => state.room(*room).map(|r| r.production_progress),
            _ => None,
        };
        self.entries.insert(
            key.to_string(),
            InFlight {
                action: action.clone(),
                kind: EntryKind::Pending,
                dispatched_cycle: cycle,
                expires_at: cycle + ttl,
                baseline_progress,
            },
        );
    }

    /// Suppress a key that kept failing
    pub fn abandon(&mut self, key: &str, action: &Action, cycle: Cycle, ttl: Cycle) {
        self.entries.insert(
            key.to_string(),
            InFlight {
                action: action.clone(),
                kind: EntryKind::Abandoned,
                dispatched_cycle: cycle,
                expires_at: cycle + ttl,
                baseline_progress: None,
            },
        );
    }

    /// Drop entries whose ttl has run out; returns their keys
    pub fn expire(&mut self, cycle: Cycle) -> Vec<String> {
        let mut expired: Vec<String> = self
            .entries
            .iter()
            .filter(|(_, e)| e.expires_at <= cycle)
            .map(|(k, _)| k.clone())
            .collect();
        expired.sort();
        for key in &expired {
            self.entries.remove(key);
        }
        expired
    }

    /// Applied moves and training orders still waiting to show up, by dweller
    pub fn pending_moves(&self) -> Vec<PendingMove> {
        let mut moves: Vec<PendingMove> = self
            .entries
            .values()
            .filter(|e| e.kind == EntryKind::Pending)
            .filter_map(|e| match e.action {
                Action::AssignDweller { dweller, room, .. } | Action::Train { dweller, room, .. } => {
                    Some(PendingMove { dweller, room })
                }
                _ => None,
            })
            .collect();
        moves.sort();
        moves
    }

    /// Drop pending entries whose effect is visible in `state`; returns their keys
    pub fn confirm_effects(&mut self, state: &GameState) -> Vec<String> {
        let mut confirmed: Vec<String> = self
            .entries
            .iter()
            .filter(|(_, e)| e.kind == EntryKind::Pending && effect_visible(e, state))
            .map(|(k, _)| k.clone())
            .collect();
        confirmed.sort();
        for key in &confirmed {
            self.entries.remove(key);
        }
        confirmed
    }
}

fn effect_visible(entry: &InFlight, state: &GameState) -> bool {
    match &entry.action {
        Action::AssignDweller { dweller, room, .. } | Action::Train { dweller, room, .. } => state
            .dweller(*dweller)
            .is_some_and(|d| d.current_room == Some(*room)),
        Action::Collect { room, .. } => match (state.room(*room), entry.baseline_progress) {
            (Some(r), Some(before)) => r.production_progress < before,
            _ => false,
        },
        // Rushes and incident responses have no single visible effect
        Action::RushProduction { .. } | Action::RespondToIncident { .. } => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::types::{DwellerId, Region, ResourceKind, RoomId, RoomType, Special, Vec2};
    use crate::model::{Dweller, Room};
    use std::collections::BTreeSet;

    fn state(progress: f32, dweller_room: Option<u32>) -> GameState {
        GameState {
            rooms: vec![Room {
                id: RoomId(1),
                room_type: RoomType::Diner,
                level: 1,
                position: Vec2::new(50.0, 50.0),
                region: Region::new(0.0, 0.0, 100.0, 100.0),
                capacity: 2,
                assigned_dwellers: dweller_room.map(|_| DwellerId(1)).into_iter().collect::<BTreeSet<_>>(),
                is_producing: true,
                production_progress: progress,
            }],
            dwellers: vec![Dweller {
                id: DwellerId(1),
                name: "Ada".into(),
                level: 1,
                health: 100,
                special: Special::default(),
                current_room: dweller_room.map(RoomId),
                is_training: false,
                is_exploring: false,
                position: Vec2::default(),
            }],
            ..Default::default()
        }
    }

    #[test]
    fn test_blocks_until_expiry() {
        let mut tracker = InFlightTracker::new();
        let action = Action::RushProduction {
            room: RoomId(1),
            resource: ResourceKind::Food,
            at: Vec2::default(),
        };
        tracker.record("k", &action, &state(0.2, None), 10, 5);
        assert!(tracker.is_blocked("k"));
        assert!(tracker.expire(14).is_empty());
        assert_eq!(tracker.expire(15), vec!["k".to_string()]);
        assert!(!tracker.is_blocked("k"));
    }

    #[test]
    fn test_assignment_confirmed_when_dweller_arrives() {
        let mut tracker = InFlightTracker::new();
        let action = Action::AssignDweller {
            dweller: DwellerId(1),
            room: RoomId(1),
            from: Vec2::default(),
            to: Vec2::default(),
        };
        tracker.record("assign", &action, &state(0.0, None), 1, 5);
        assert!(tracker.confirm_effects(&state(0.0, None)).is_empty());
        assert_eq!(tracker.confirm_effects(&state(0.0, Some(1))), vec!["assign".to_string()]);
        assert!(tracker.is_empty());
    }

    #[test]
    fn test_collect_confirmed_when_progress_resets() {
        let mut tracker = InFlightTracker::new();
        let action = Action::Collect {
            room: RoomId(1),
            resource: ResourceKind::Food,
            at: Vec2::default(),
        };
        tracker.record("collect", &action, &state(0.97, None), 1, 5);
        assert!(tracker.confirm_effects(&state(0.98, None)).is_empty());
        assert_eq!(tracker.confirm_effects(&state(0.05, None)).len(), 1);
    }

    #[test]
    fn test_abandoned_keys_never_confirm() {
        let mut tracker = InFlightTracker::new();
        let action = Action::AssignDweller {
            dweller: DwellerId(1),
            room: RoomId(1),
            from: Vec2::default(),
            to: Vec2::default(),
        };
        tracker.abandon("assign", &action, 1, 5);
        assert!(tracker.confirm_effects(&state(0.0, Some(1))).is_empty());
        assert_eq!(tracker.get("assign").map(|e| e.kind), Some(EntryKind::Abandoned));
    }

    #[test]
    fn test_pending_moves_lists_only_applied_moves() {
        let mut tracker = InFlightTracker::new();
        let assign = |dweller| Action::AssignDweller {
            dweller: DwellerId(dweller),
            room: RoomId(1),
            from: Vec2::default(),
            to: Vec2::default(),
        };
        let snapshot = state(0.0, None);
        tracker.record("assign:2", &assign(2), &snapshot, 1, 5);
        tracker.record("assign:1", &assign(1), &snapshot, 1, 5);
        tracker.abandon("assign:3", &assign(3), 1, 5);
        tracker.record(
            "rush",
            &Action::RushProduction {
                room: RoomId(1),
                resource: ResourceKind::Food,
                at: Vec2::default(),
            },
            &snapshot,
            1,
            5,
        );

        let moves = tracker.pending_moves();
        let dwellers: Vec<u32> = moves.iter().map(|m| m.dweller.0).collect();
        assert_eq!(dwellers, vec![1, 2]);
        assert!(moves.iter().all(|m| m.room == RoomId(1)));
    }
}
