//! Resource manager - turns resource shortfalls into collect/rush proposals
//!
//! For each resource with a configured threshold:
//! - Computes the fill fraction `level / capacity`
//! - Below threshold, targets the matching production room: collect when a
//!   room is ready, otherwise rush the room closest to finishing
//! - Priority grows as the resource approaches empty

use crate::core::config::ResourcePolicy;
use crate::core::types::ResourceKind;
use crate::model::{GameState, Room};
use crate::strategy::proposal::{Action, ActionProposal, ProposalSource};
use std::cmp::Ordering;

/// A resource below its threshold
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ResourceDeficit {
    pub kind: ResourceKind,
    pub fraction: f32,
    pub threshold: f32,
    /// `(threshold - fraction) / threshold`, in (0, 1]
    pub priority: f32,
}

#[derive(Debug, Clone)]
pub struct ResourceManager {
    policy: ResourcePolicy,
}

impl ResourceManager {
    pub fn new(policy: ResourcePolicy) -> Self {
        Self { policy }
    }

    pub fn policy(&self) -> &ResourcePolicy {
        &self.policy
    }

    /// Whether a resource at `fraction` fill needs attention
    ///
    /// Resources without a configured threshold never do.
    pub fn should_collect(&self, kind: ResourceKind, fraction: f32) -> bool {
        self.policy
            .thresholds
            .get(&kind)
            .is_some_and(|t| fraction < *t)
    }

    /// All current deficits, most urgent first (ties by fixed kind order)
    pub fn prioritize_production(&self, state: &GameState) -> Vec<ResourceDeficit> {
        let mut deficits: Vec<ResourceDeficit> = self
            .policy
            .thresholds
            .iter()
            .filter_map(|(kind, threshold)| {
                let fraction = state.resources.get(kind)?.fraction()?;
                if !self.should_collect(*kind, fraction) {
                    return None;
                }
                Some(ResourceDeficit {
                    kind: *kind,
                    fraction,
                    threshold: *threshold,
                    priority: (threshold - fraction) / threshold,
                })
            })
            .collect();

        deficits.sort_by(|a, b| {
            b.priority
                .total_cmp(&a.priority)
                .then_with(|| a.kind.rank().cmp(&b.kind.rank()))
        });
        deficits
    }

    /// Proposals for every resource below threshold that has a target room
    pub fn evaluate(&self, state: &GameState) -> Vec<ActionProposal> {
        let mut proposals = Vec::new();

        for deficit in self.prioritize_production(state) {
            let Some(action) = self.target_action(state, deficit.kind) else {
                tracing::debug!(
                    "{} at {:.0}% has no room to collect from",
                    deficit.kind,
                    deficit.fraction * 100.0
                );
                continue;
            };
            let key = match &action {
                Action::Collect { room, .. } => format!("resource:{}:collect:{}", deficit.kind, room),
                Action::RushProduction { room, .. } => format!("resource:{}:rush:{}", deficit.kind, room),
                _ => continue,
            };
            proposals.push(ActionProposal::new(
                action,
                deficit.priority,
                key,
                ProposalSource::Resource,
            ));
        }

        proposals
    }

    fn target_action(&self, state: &GameState, kind: ResourceKind) -> Option<Action> {
        let ready_at = self.policy.collect_ready_progress;
        let candidates: Vec<&Room> = match kind.producer() {
            Some(room_type) => state.rooms_of_type(room_type).collect(),
            // Caps drop from every production room
            None => state
                .rooms
                .iter()
                .filter(|r| r.room_type.produces().is_some())
                .collect(),
        };

        let best = candidates.iter().copied().max_by(|a, b| by_progress(a, b))?;
        if best.production_progress >= ready_at {
            Some(Action::Collect {
                room: best.id,
                resource: kind,
                at: best.position,
            })
        } else if kind.producer().is_some() {
            Some(Action::RushProduction {
                room: best.id,
                resource: kind,
                at: best.position,
            })
        } else {
            None
        }
    }
}

/// Higher progress wins; on equal progress the lower id does
fn by_progress(a: &Room, b: &Room) -> Ordering {
    a.production_progress
        .total_cmp(&b.production_progress)
        .then_with(|| b.id.cmp(&a.id))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::types::{Region, RoomId, RoomType, Vec2};
    use crate::model::ResourceLevel;
    use std::collections::BTreeSet;

    fn room(id: u32, room_type: RoomType, progress: f32) -> Room {
        Room {
            id: RoomId(id),
            room_type,
            level: 1,
            position: Vec2::new(id as f32 * 100.0, 50.0),
            region: Region::new(id as f32 * 100.0 - 50.0, 0.0, 100.0, 100.0),
            capacity: 2,
            assigned_dwellers: BTreeSet::new(),
            is_producing: true,
            production_progress: progress,
        }
    }

    fn state(levels: &[(ResourceKind, f32)], rooms: Vec<Room>) -> GameState {
        GameState {
            resources: levels
                .iter()
                .map(|(k, l)| (*k, ResourceLevel { level: *l, capacity: 100.0 }))
                .collect(),
            rooms,
            ..Default::default()
        }
    }

    fn manager() -> ResourceManager {
        ResourceManager::new(ResourcePolicy::default())
    }

    #[test]
    fn test_priority_formula() {
        let s = state(
            &[(ResourceKind::Power, 40.0)],
            vec![room(1, RoomType::PowerGenerator, 0.2)],
        );
        let proposals = manager().evaluate(&s);
        assert_eq!(proposals.len(), 1);
        assert!((proposals[0].priority.0 - 0.5).abs() < 1e-6);
    }

    #[test]
    fn test_collect_when_ready_rush_otherwise() {
        let s = state(
            &[(ResourceKind::Food, 10.0), (ResourceKind::Water, 10.0)],
            vec![
                room(1, RoomType::Diner, 0.97),
                room(2, RoomType::WaterTreatment, 0.4),
                room(3, RoomType::WaterTreatment, 0.6),
            ],
        );
        let proposals = manager().evaluate(&s);
        assert!(matches!(
            proposals.iter().find(|p| p.idempotency_key.starts_with("resource:food")).map(|p| &p.action),
            Some(Action::Collect { room: RoomId(1), .. })
        ));
        assert!(matches!(
            proposals.iter().find(|p| p.idempotency_key.starts_with("resource:water")).map(|p| &p.action),
            Some(Action::RushProduction { room: RoomId(3), .. })
        ));
    }

    #[test]
    fn test_ties_follow_kind_order() {
        // Same fraction and threshold for water and food: water ranks first
        let s = state(
            &[(ResourceKind::Food, 35.0), (ResourceKind::Water, 35.0)],
            vec![room(1, RoomType::Diner, 0.1), room(2, RoomType::WaterTreatment, 0.1)],
        );
        let kinds: Vec<String> = manager()
            .evaluate(&s)
            .into_iter()
            .map(|p| p.idempotency_key)
            .collect();
        assert_eq!(kinds, vec!["resource:water:rush:room-2", "resource:food:rush:room-1"]);
    }

    #[test]
    fn test_no_proposal_above_threshold_or_without_room() {
        let s = state(
            &[(ResourceKind::Power, 90.0), (ResourceKind::Food, 10.0)],
            vec![room(1, RoomType::PowerGenerator, 0.99)],
        );
        assert!(manager().evaluate(&s).is_empty());
    }

    #[test]
    fn test_zero_capacity_is_ignored() {
        let mut s = state(&[], vec![room(1, RoomType::PowerGenerator, 0.99)]);
        s.resources
            .insert(ResourceKind::Power, ResourceLevel { level: 0.0, capacity: 0.0 });
        assert!(manager().evaluate(&s).is_empty());
    }

    #[test]
    fn test_caps_need_configured_threshold() {
        let s = state(
            &[(ResourceKind::Caps, 5.0)],
            vec![room(1, RoomType::Diner, 0.5), room(2, RoomType::WaterTreatment, 0.98)],
        );
        assert!(manager().evaluate(&s).is_empty());

        let mut policy = ResourcePolicy::default();
        policy.thresholds.insert(ResourceKind::Caps, 0.3);
        let proposals = ResourceManager::new(policy).evaluate(&s);
        assert_eq!(proposals.len(), 1);
        assert!(matches!(proposals[0].action, Action::Collect { room: RoomId(2), .. }));
    }

    #[test]
    fn test_should_collect() {
        let m = manager();
        assert!(m.should_collect(ResourceKind::Power, 0.5));
        assert!(!m.should_collect(ResourceKind::Power, 0.8));
        assert!(!m.should_collect(ResourceKind::Radaway, 0.0));
    }

    #[test]
    fn test_evaluate_is_deterministic() {
        let s = state(
            &[(ResourceKind::Power, 20.0), (ResourceKind::Food, 20.0), (ResourceKind::Water, 60.0)],
            vec![
                room(1, RoomType::PowerGenerator, 0.5),
                room(2, RoomType::Diner, 0.5),
                room(3, RoomType::WaterTreatment, 0.96),
            ],
        );
        assert_eq!(manager().evaluate(&s), manager().evaluate(&s));
    }
}
