//! Action proposals: the contract between strategy components and the orchestrator

use crate::core::types::{DwellerId, IncidentId, ResourceKind, RoomId, SpecialStat, Vec2};
use crate::strategy::incidents::ResponseAction;
use ordered_float::OrderedFloat;
use serde::{Deserialize, Serialize};
use std::fmt;

/// What a proposal asks the actuator to do
///
/// Every variant carries the screen coordinates the actuator taps or drags to.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Action {
    /// Tap a ready room to collect its output
    Collect {
        room: RoomId,
        resource: ResourceKind,
        at: Vec2,
    },
    /// Rush a room that is not ready yet
    RushProduction {
        room: RoomId,
        resource: ResourceKind,
        at: Vec2,
    },
    /// Drag a dweller into a room
    AssignDweller {
        dweller: DwellerId,
        room: RoomId,
        from: Vec2,
        to: Vec2,
    },
    /// Drag an idle dweller into a training room
    Train {
        dweller: DwellerId,
        room: RoomId,
        stat: SpecialStat,
        from: Vec2,
        to: Vec2,
    },
    RespondToIncident {
        incident: IncidentId,
        response: ResponseAction,
        room: Option<RoomId>,
        location: Vec2,
        dwellers: Vec<DwellerId>,
    },
}

impl Action {
    /// Short verb used in logs
    pub fn verb(&self) -> &'static str {
        match self {
            Action::Collect { .. } => "collect",
            Action::RushProduction { .. } => "rush",
            Action::AssignDweller { .. } => "assign",
            Action::Train { .. } => "train",
            Action::RespondToIncident { .. } => "respond",
        }
    }
}

/// Which strategy component produced a proposal
///
/// Declaration order is merge order: incident responses first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum ProposalSource {
    Incident,
    Resource,
    Assignment,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActionProposal {
    pub action: Action,
    /// Higher is more urgent; only comparable within one source
    pub priority: OrderedFloat<f32>,
    /// Two proposals with the same key are the same intent
    pub idempotency_key: String,
    pub source: ProposalSource,
}

impl ActionProposal {
    pub fn new(action: Action, priority: f32, idempotency_key: String, source: ProposalSource) -> Self {
        Self {
            action,
            priority: OrderedFloat(priority),
            idempotency_key,
            source,
        }
    }
}

impl fmt::Display for ActionProposal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} [{:?} p={:.3}] {}",
            self.action.verb(),
            self.source,
            self.priority.0,
            self.idempotency_key
        )
    }
}
