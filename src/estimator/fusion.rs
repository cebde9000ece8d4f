//! State estimator - fuses per-cycle observations into a `GameState`
//!
//! The estimator owns an arena of tracked rooms, dwellers and resource gauges
//! keyed by stable integer ids. Each trusted frame:
//! 1. Associates observations with existing tracks (or opens new ones)
//! 2. Smooths continuous quantities, overwrites discrete ones
//! 3. Ages unseen tracks and forgets expired ones
//! 4. Publishes a fresh immutable snapshot with referential consistency repaired
//!
//! Frames that show too few of the expected UI anchors are rejected without
//! touching the arena.

use crate::core::config::EstimatorConfig;
use crate::core::error::AutopilotError;
use crate::core::types::{DwellerId, Region, ResourceKind, RoomId, RoomType, Vec2};
use crate::estimator::track::{associate, smooth, Track, Visibility};
use crate::model::{Dweller, GameState, HazardSighting, ResourceLevel, Room};
use crate::vision::observation::{DwellerReading, Observation, ObservationKind};
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

/// Result of fusing one frame
#[derive(Debug, Clone, PartialEq)]
pub enum FusionOutcome {
    Published(Arc<GameState>),
    /// Not enough of the screen was recognised to trust this frame
    LowConfidence { detected: usize, expected: usize },
}

impl FusionOutcome {
    pub fn state(&self) -> Option<&Arc<GameState>> {
        match self {
            FusionOutcome::Published(state) => Some(state),
            FusionOutcome::LowConfidence { .. } => None,
        }
    }

    pub fn into_result(self) -> Result<Arc<GameState>, AutopilotError> {
        match self {
            FusionOutcome::Published(state) => Ok(state),
            FusionOutcome::LowConfidence { detected, expected } => {
                Err(AutopilotError::LowConfidenceState { detected, expected })
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
struct RoomData {
    room_type: RoomType,
    level: u8,
    capacity: u8,
    producing: bool,
    progress: f32,
    region: Region,
}

#[derive(Debug, Clone, PartialEq)]
struct DwellerData {
    reading: DwellerReading,
}

#[derive(Debug, Clone, PartialEq)]
struct GaugeTrack {
    level: f32,
    capacity: f32,
    misses: u32,
}

/// Fuses observations over time into a coherent world model
#[derive(Debug, Clone)]
pub struct StateEstimator {
    config: EstimatorConfig,
    cycle: u64,
    next_room_id: u32,
    next_dweller_id: u32,
    rooms: BTreeMap<u32, Track<RoomData>>,
    dwellers: BTreeMap<u32, Track<DwellerData>>,
    gauges: BTreeMap<ResourceKind, GaugeTrack>,
    rejected_frames: u64,
}

impl StateEstimator {
    pub fn new(config: EstimatorConfig) -> Self {
        Self {
            config,
            cycle: 0,
            next_room_id: 1,
            next_dweller_id: 1,
            rooms: BTreeMap::new(),
            dwellers: BTreeMap::new(),
            gauges: BTreeMap::new(),
            rejected_frames: 0,
        }
    }

    /// Trusted frames fused so far
    pub fn cycle(&self) -> u64 {
        self.cycle
    }

    pub fn rejected_frames(&self) -> u64 {
        self.rejected_frames
    }

    /// Rooms and dwellers currently remembered, including stale ones
    pub fn tracked_counts(&self) -> (usize, usize) {
        (self.rooms.len(), self.dwellers.len())
    }

    /// Fuse one frame of observations
    pub fn fuse(&mut self, observations: &[Observation], timestamp_ms: u64) -> FusionOutcome {
        let (detected, expected) = self.anchor_coverage(observations);
        if expected > 0 && (detected as f32) < self.config.min_anchor_fraction * expected as f32 {
            self.rejected_frames += 1;
            tracing::debug!(
                "Rejecting frame at {}ms: {}/{} UI anchors",
                timestamp_ms,
                detected,
                expected
            );
            return FusionOutcome::LowConfidence { detected, expected };
        }

        self.cycle += 1;
        self.fuse_gauges(observations);
        self.fuse_rooms(observations);
        self.fuse_dwellers(observations);
        self.expire_tracks();

        let state = self.build_snapshot(observations, timestamp_ms);
        tracing::debug!(
            "Fused cycle {}: {} rooms, {} dwellers, {} hazards",
            state.cycle,
            state.rooms.len(),
            state.dwellers.len(),
            state.hazards.len()
        );
        FusionOutcome::Published(Arc::new(state))
    }

    fn anchor_coverage(&self, observations: &[Observation]) -> (usize, usize) {
        let expected = &self.config.expected_anchors;
        let seen: BTreeSet<&str> = observations
            .iter()
            .filter_map(|o| match &o.kind {
                ObservationKind::Anchor { name } => Some(name.as_str()),
                _ => None,
            })
            .collect();
        let detected = expected.iter().filter(|a| seen.contains(a.as_str())).count();
        (detected, expected.len())
    }

    fn fuse_gauges(&mut self, observations: &[Observation]) {
        let alpha = self.config.smoothing_alpha;
        let mut seen = BTreeSet::new();

        for obs in observations {
            let ObservationKind::Resource { kind, level, capacity } = obs.kind else {
                continue;
            };
            // Normalizer output is most-confident first; keep only that reading
            if !seen.insert(kind) {
                continue;
            }
            match self.gauges.get_mut(&kind) {
                Some(gauge) => {
                    gauge.level = smooth(gauge.level, level, alpha);
                    gauge.capacity = capacity;
                    gauge.misses = 0;
                }
                None => {
                    self.gauges.insert(
                        kind,
                        GaugeTrack {
                            level,
                            capacity,
                            misses: 0,
                        },
                    );
                }
            }
        }

        for (kind, gauge) in self.gauges.iter_mut() {
            if !seen.contains(kind) {
                gauge.misses += 1;
            }
        }
    }

    fn fuse_rooms(&mut self, observations: &[Observation]) {
        let alpha = self.config.smoothing_alpha;
        let max_distance = self.config.match_distance;

        let rooms: Vec<(&Observation, RoomData)> = observations
            .iter()
            .filter_map(|o| match o.kind {
                ObservationKind::Room {
                    room_type,
                    level,
                    capacity,
                    producing,
                    progress,
                } => Some((
                    o,
                    RoomData {
                        room_type,
                        level,
                        capacity,
                        producing,
                        progress,
                        region: o.region,
                    },
                )),
                _ => None,
            })
            .collect();

        let positions: Vec<Vec2> = rooms.iter().map(|(o, _)| o.region.center()).collect();
        let matched = associate(&positions, self.rooms.values(), |i, track, distance| {
            track.data.room_type == rooms[i].1.room_type && distance <= max_distance
        });

        let mut seen = BTreeSet::new();
        for ((obs, data), track_id) in rooms.into_iter().zip(matched) {
            let position = obs.region.center();
            match track_id.and_then(|id| self.rooms.get_mut(&id)) {
                Some(track) => {
                    let progress = smooth(track.data.progress, data.progress, alpha);
                    track.data = RoomData { progress, ..data };
                    track.position = position;
                    track.misses = 0;
                    seen.insert(track.id);
                }
                None => {
                    let id = self.next_room_id;
                    self.next_room_id += 1;
                    tracing::debug!("New room {} ({:?}) at {:?}", id, data.room_type, position);
                    self.rooms.insert(id, Track::new(id, data, position));
                    seen.insert(id);
                }
            }
        }

        for track in self.rooms.values_mut() {
            if !seen.contains(&track.id) {
                track.misses += 1;
            }
        }
    }

    fn fuse_dwellers(&mut self, observations: &[Observation]) {
        let max_distance = self.config.match_distance;

        let dwellers: Vec<(&Observation, &DwellerReading)> = observations
            .iter()
            .filter_map(|o| match &o.kind {
                ObservationKind::Dweller(reading) => Some((o, reading)),
                _ => None,
            })
            .collect();

        let positions: Vec<Vec2> = dwellers.iter().map(|(o, _)| o.region.center()).collect();
        let matched = associate(&positions, self.dwellers.values(), |i, track, distance| {
            match (&dwellers[i].1.name, &track.data.reading.name) {
                // A known name is the strongest identity cue: dwellers walk
                // across the vault when reassigned
                (Some(observed), Some(known)) => observed == known,
                _ => distance <= max_distance,
            }
        });

        let mut seen = BTreeSet::new();
        for ((obs, reading), track_id) in dwellers.into_iter().zip(matched) {
            let position = obs.region.center();
            match track_id.and_then(|id| self.dwellers.get_mut(&id)) {
                Some(track) => {
                    let mut reading = reading.clone();
                    if reading.name.is_none() {
                        reading.name = track.data.reading.name.take();
                    }
                    track.data = DwellerData { reading };
                    track.position = position;
                    track.misses = 0;
                    seen.insert(track.id);
                }
                None => {
                    let id = self.next_dweller_id;
                    self.next_dweller_id += 1;
                    tracing::debug!("New dweller {} ({:?}) at {:?}", id, reading.name, position);
                    self.dwellers.insert(
                        id,
                        Track::new(
                            id,
                            DwellerData {
                                reading: reading.clone(),
                            },
                            position,
                        ),
                    );
                    seen.insert(id);
                }
            }
        }

        for track in self.dwellers.values_mut() {
            if !seen.contains(&track.id) {
                track.misses += 1;
            }
        }
    }

    fn expire_tracks(&mut self) {
        let (n, m) = (self.config.stale_after_cycles, self.config.forget_after_cycles);
        let before = (self.rooms.len(), self.dwellers.len());
        self.rooms.retain(|_, t| t.visibility(n, m) != Visibility::Expired);
        self.dwellers.retain(|_, t| t.visibility(n, m) != Visibility::Expired);
        self.gauges.retain(|_, g| g.misses <= n + m);
        let forgotten = (before.0 - self.rooms.len()) + (before.1 - self.dwellers.len());
        if forgotten > 0 {
            tracing::debug!("Forgot {} entities unseen for over {} cycles", forgotten, n + m);
        }
    }

    fn build_snapshot(&self, observations: &[Observation], timestamp_ms: u64) -> GameState {
        let (n, m) = (self.config.stale_after_cycles, self.config.forget_after_cycles);

        let resources = self
            .gauges
            .iter()
            .filter(|(_, g)| g.misses <= n)
            .map(|(kind, g)| {
                (
                    *kind,
                    ResourceLevel {
                        level: g.level,
                        capacity: g.capacity,
                    },
                )
            })
            .collect();

        let mut rooms: Vec<Room> = self
            .rooms
            .values()
            .filter(|t| t.visibility(n, m) == Visibility::Live)
            .map(|t| Room {
                id: RoomId(t.id),
                room_type: t.data.room_type,
                level: t.data.level,
                position: t.position,
                region: t.data.region,
                capacity: t.data.capacity,
                assigned_dwellers: BTreeSet::new(),
                is_producing: t.data.producing,
                production_progress: t.data.progress.clamp(0.0, 1.0),
            })
            .collect();

        let mut dwellers: Vec<Dweller> = self
            .dwellers
            .values()
            .filter(|t| t.visibility(n, m) == Visibility::Live)
            .map(|t| {
                let r = &t.data.reading;
                let current_room = rooms
                    .iter()
                    .find(|room| room.region.contains(t.position))
                    .map(|room| room.id);
                Dweller {
                    id: DwellerId(t.id),
                    name: r.name.clone().unwrap_or_else(|| format!("Dweller {}", t.id)),
                    level: r.level,
                    health: r.health,
                    special: r.special,
                    current_room,
                    is_training: r.training,
                    is_exploring: r.exploring,
                    position: t.position,
                }
            })
            .collect();

        for dweller in &dwellers {
            if let Some(room_id) = dweller.current_room {
                if let Ok(idx) = rooms.binary_search_by_key(&room_id, |r| r.id) {
                    rooms[idx].assigned_dwellers.insert(dweller.id);
                }
            }
        }

        repair_references(&mut dwellers, &mut rooms);

        let hazards = observations
            .iter()
            .filter_map(|o| match &o.kind {
                ObservationKind::Hazard { signature } => {
                    let position = o.region.center();
                    Some(HazardSighting {
                        signature: signature.clone(),
                        position,
                        room: rooms.iter().find(|r| r.region.contains(position)).map(|r| r.id),
                    })
                }
                _ => None,
            })
            .collect();

        GameState {
            cycle: self.cycle,
            timestamp_ms,
            resources,
            dwellers,
            rooms,
            hazards,
        }
    }
}

/// Drop references to entities that are not part of the published set
///
/// `dwellers` and `rooms` must be sorted by id.
pub fn repair_references(dwellers: &mut [Dweller], rooms: &mut [Room]) {
    let room_ids: BTreeSet<RoomId> = rooms.iter().map(|r| r.id).collect();
    let dweller_ids: BTreeSet<DwellerId> = dwellers.iter().map(|d| d.id).collect();

    for dweller in dwellers.iter_mut() {
        if let Some(room) = dweller.current_room {
            if !room_ids.contains(&room) {
                tracing::debug!("Dropping dangling {} on {}", room, dweller.id);
                dweller.current_room = None;
            }
        }
    }
    for room in rooms.iter_mut() {
        room.assigned_dwellers.retain(|id| dweller_ids.contains(id));
    }
}
