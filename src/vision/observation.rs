//! Typed observations produced by the normalizer

use crate::core::types::{Region, ResourceKind, RoomType, Special};
use serde::{Deserialize, Serialize};

/// A single typed sighting from one capture; never mutated after creation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Observation {
    pub kind: ObservationKind,
    pub region: Region,
    pub confidence: f32,
    pub timestamp_ms: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ObservationKind {
    /// Gauge in the resource bar
    Resource {
        kind: ResourceKind,
        level: f32,
        capacity: f32,
    },
    Room {
        room_type: RoomType,
        level: u8,
        capacity: u8,
        producing: bool,
        progress: f32,
    },
    Dweller(DwellerReading),
    /// Incident signature such as a fire overlay
    Hazard { signature: String },
    /// Fixed UI element used to judge frame quality
    Anchor { name: String },
}

/// What can be read off a dweller sprite and its info card
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DwellerReading {
    pub name: Option<String>,
    pub level: u8,
    pub health: u32,
    pub special: Special,
    pub training: bool,
    pub exploring: bool,
}

/// Identity of "the same kind of thing" for deduplication
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum KindKey {
    Resource(ResourceKind),
    Room(RoomType),
    Dweller,
    Hazard(String),
    Anchor(String),
}

impl ObservationKind {
    pub fn key(&self) -> KindKey {
        match self {
            ObservationKind::Resource { kind, .. } => KindKey::Resource(*kind),
            ObservationKind::Room { room_type, .. } => KindKey::Room(*room_type),
            ObservationKind::Dweller(_) => KindKey::Dweller,
            ObservationKind::Hazard { signature } => KindKey::Hazard(signature.clone()),
            ObservationKind::Anchor { name } => KindKey::Anchor(name.clone()),
        }
    }
}

impl Observation {
    pub fn key(&self) -> KindKey {
        self.kind.key()
    }
}
