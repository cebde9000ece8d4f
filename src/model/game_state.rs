//! Immutable game-state snapshot
//!
//! A new `GameState` is built every trusted cycle and shared as
//! `Arc<GameState>`; nothing mutates a published snapshot. Entities refer to
//! each other by id only.

use crate::core::types::{
    Cycle, DwellerId, Region, ResourceKind, RoomId, RoomType, Special, Vec2,
};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ResourceLevel {
    pub level: f32,
    pub capacity: f32,
}

impl ResourceLevel {
    /// Fill fraction in [0, 1]; `None` when capacity is unknown
    pub fn fraction(&self) -> Option<f32> {
        if self.capacity > 0.0 {
            Some((self.level / self.capacity).clamp(0.0, 1.0))
        } else {
            None
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Dweller {
    pub id: DwellerId,
    pub name: String,
    pub level: u8,
    pub health: u32,
    pub special: Special,
    pub current_room: Option<RoomId>,
    pub is_training: bool,
    pub is_exploring: bool,
    /// Centre of the dweller sprite on screen
    pub position: Vec2,
}

impl Dweller {
    pub fn is_available(&self) -> bool {
        !self.is_training && !self.is_exploring
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Room {
    pub id: RoomId,
    pub room_type: RoomType,
    pub level: u8,
    /// Centre of the room on screen
    pub position: Vec2,
    pub region: Region,
    pub capacity: u8,
    pub assigned_dwellers: BTreeSet<DwellerId>,
    pub is_producing: bool,
    pub production_progress: f32,
}

impl Room {
    pub fn open_slots(&self) -> usize {
        (self.capacity as usize).saturating_sub(self.assigned_dwellers.len())
    }
}

/// An incident signature seen on screen this cycle
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HazardSighting {
    pub signature: String,
    pub position: Vec2,
    pub room: Option<RoomId>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GameState {
    /// Trusted frame counter of the estimator
    pub cycle: Cycle,
    pub timestamp_ms: u64,
    pub resources: BTreeMap<ResourceKind, ResourceLevel>,
    /// Sorted by id
    pub dwellers: Vec<Dweller>,
    /// Sorted by id
    pub rooms: Vec<Room>,
    pub hazards: Vec<HazardSighting>,
}

impl GameState {
    pub fn dweller(&self, id: DwellerId) -> Option<&Dweller> {
        self.dwellers
            .binary_search_by_key(&id, |d| d.id)
            .ok()
            .map(|i| &self.dwellers[i])
    }

    pub fn room(&self, id: RoomId) -> Option<&Room> {
        self.rooms
            .binary_search_by_key(&id, |r| r.id)
            .ok()
            .map(|i| &self.rooms[i])
    }

    /// Lowest-id room whose region contains the point
    pub fn room_at(&self, point: Vec2) -> Option<&Room> {
        self.rooms.iter().find(|r| r.region.contains(point))
    }

    pub fn rooms_of_type(&self, room_type: RoomType) -> impl Iterator<Item = &Room> + '_ {
        self.rooms.iter().filter(move |r| r.room_type == room_type)
    }

    /// Check the cross-reference invariant between dwellers and rooms
    pub fn check_references(&self) -> Result<(), String> {
        for dweller in &self.dwellers {
            if let Some(room) = dweller.current_room {
                if self.room(room).is_none() {
                    return Err(format!("{} references missing {}", dweller.id, room));
                }
            }
        }
        for room in &self.rooms {
            for id in &room.assigned_dwellers {
                if self.dweller(*id).is_none() {
                    return Err(format!("{} references missing {}", room.id, id));
                }
            }
        }
        Ok(())
    }
}
