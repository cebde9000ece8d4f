//! Seeded synthetic vision source for headless runs
//!
//! Produces noisy frames for a fixed vault layout: jittered boxes, random
//! detection dropouts, occasional occluded frames, draining resources and
//! short-lived fires. It does not react to dispatched actions.

use crate::core::error::Result;
use crate::core::types::{Region, ResourceKind, RoomType, Special};
use crate::vision::detection::{Frame, RawDetection};
use crate::vision::source::VisionSource;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use std::future::Future;

const FRAME_INTERVAL_MS: u64 = 500;

#[derive(Debug, Clone)]
pub struct ScenarioRoom {
    pub room_type: RoomType,
    pub region: Region,
    pub capacity: u8,
}

#[derive(Debug, Clone)]
pub struct ScenarioDweller {
    pub name: String,
    pub level: u8,
    pub special: Special,
    /// Index into `VaultScenario::rooms`, `None` for idle dwellers in the lobby
    pub room: Option<usize>,
}

/// Static layout the synthetic source renders every frame
#[derive(Debug, Clone)]
pub struct VaultScenario {
    pub rooms: Vec<ScenarioRoom>,
    pub dwellers: Vec<ScenarioDweller>,
    pub resources: Vec<(ResourceKind, f32, f32)>,
}

impl VaultScenario {
    /// Small starter vault: three production rooms, a classroom, six dwellers
    pub fn starter_vault() -> Self {
        let room = |room_type, x, y| ScenarioRoom {
            room_type,
            region: Region::new(x, y, 180.0, 90.0),
            capacity: 2,
        };
        let special = |s, p, a, i| Special {
            strength: s,
            perception: p,
            endurance: 2,
            charisma: 2,
            intelligence: i,
            agility: a,
            luck: 3,
        };
        let dweller = |name: &str, level, special, room| ScenarioDweller {
            name: name.to_string(),
            level,
            special,
            room,
        };

        Self {
            rooms: vec![
                room(RoomType::PowerGenerator, 100.0, 200.0),
                room(RoomType::WaterTreatment, 300.0, 200.0),
                room(RoomType::Diner, 100.0, 320.0),
                room(RoomType::Classroom, 300.0, 320.0),
            ],
            dwellers: vec![
                dweller("Marcus", 5, special(8, 2, 3, 2), Some(2)),
                dweller("Elena", 4, special(2, 7, 4, 5), None),
                dweller("Thomas", 3, special(6, 3, 2, 2), None),
                dweller("Sarah", 6, special(3, 3, 8, 4), Some(0)),
                dweller("William", 2, special(2, 2, 2, 9), None),
                dweller("Ada", 1, special(1, 1, 1, 1), None),
            ],
            resources: vec![
                (ResourceKind::Power, 70.0, 100.0),
                (ResourceKind::Food, 55.0, 100.0),
                (ResourceKind::Water, 80.0, 100.0),
                (ResourceKind::Caps, 250.0, 1000.0),
            ],
        }
    }
}

/// Seeded generator of noisy frames for a [`VaultScenario`]
pub struct SyntheticVision {
    scenario: VaultScenario,
    rng: ChaCha8Rng,
    clock_ms: u64,
    levels: Vec<f32>,
    progress: Vec<f32>,
    fire: Option<(usize, u32)>,
    pub dropout_rate: f64,
    pub occlusion_rate: f64,
    pub fire_chance: f64,
    pub jitter: f32,
    pub max_frames: Option<u64>,
    frames_emitted: u64,
}

impl SyntheticVision {
    pub fn new(scenario: VaultScenario, seed: u64) -> Self {
        let levels = scenario.resources.iter().map(|(_, level, _)| *level).collect();
        let progress = vec![0.0; scenario.rooms.len()];
        Self {
            scenario,
            rng: ChaCha8Rng::seed_from_u64(seed),
            clock_ms: 0,
            levels,
            progress,
            fire: None,
            dropout_rate: 0.05,
            occlusion_rate: 0.03,
            fire_chance: 0.02,
            jitter: 2.0,
            max_frames: None,
            frames_emitted: 0,
        }
    }

    pub fn with_max_frames(mut self, max_frames: u64) -> Self {
        self.max_frames = Some(max_frames);
        self
    }

    fn jittered(&mut self, region: Region) -> [f32; 4] {
        let j = self.jitter;
        let dx = self.rng.gen_range(-j..=j);
        let dy = self.rng.gen_range(-j..=j);
        [region.x + dx, region.y + dy, region.w, region.h]
    }

    fn confidence(&mut self) -> f32 {
        self.rng.gen_range(0.6..1.0)
    }

    /// Render the next frame and advance the scenario by one step
    pub fn next_frame(&mut self) -> Frame {
        let mut detections = Vec::new();

        if !self.rng.gen_bool(self.occlusion_rate) {
            for (name, region) in [
                ("ui:resource_bar", Region::new(0.0, 0.0, 640.0, 30.0)),
                ("ui:vault_view", Region::new(0.0, 40.0, 640.0, 440.0)),
            ] {
                let conf = self.confidence();
                detections.push(RawDetection::new(name, [region.x, region.y, region.w, region.h], conf));
            }
        }

        for i in 0..self.scenario.resources.len() {
            let (kind, _, capacity) = self.scenario.resources[i];
            let drained = (self.levels[i] - self.rng.gen_range(0.0..1.5)).max(0.0);
            // Someone collected: the gauge jumps back up
            self.levels[i] = if drained < capacity * 0.2 && self.rng.gen_bool(0.3) {
                capacity
            } else {
                drained
            };
            if self.rng.gen_bool(self.dropout_rate) {
                continue;
            }
            let region = Region::new(10.0 + 100.0 * i as f32, 5.0, 80.0, 20.0);
            let bbox = self.jittered(region);
            let conf = self.confidence();
            let noisy = (self.levels[i] + self.rng.gen_range(-2.0..2.0)).max(0.0);
            detections.push(
                RawDetection::new(&format!("resource:{}", kind.label()), bbox, conf)
                    .with_reading("level", noisy)
                    .with_reading("capacity", capacity),
            );
        }

        for i in 0..self.scenario.rooms.len() {
            let room = self.scenario.rooms[i].clone();
            let staffed = self.scenario.dwellers.iter().any(|d| d.room == Some(i));
            if staffed && room.room_type.produces().is_some() {
                self.progress[i] += self.rng.gen_range(0.02..0.08);
                if self.progress[i] > 1.0 {
                    self.progress[i] = 0.0;
                }
            }
            if self.rng.gen_bool(self.dropout_rate) {
                continue;
            }
            let label = format!("room:{}", room.room_type.label());
            let bbox = self.jittered(room.region);
            let conf = self.confidence();
            detections.push(
                RawDetection::new(&label, bbox, conf)
                    .with_reading("capacity", room.capacity as f32)
                    .with_reading("progress", self.progress[i].min(1.0))
                    .with_reading("producing", if staffed { 1.0 } else { 0.0 }),
            );
        }

        for i in 0..self.scenario.dwellers.len() {
            if self.rng.gen_bool(self.dropout_rate) {
                continue;
            }
            let dweller = self.scenario.dwellers[i].clone();
            let anchor = match dweller.room {
                Some(r) => {
                    let region = self.scenario.rooms[r].region;
                    Region::new(region.x + 20.0 + 50.0 * (i % 3) as f32, region.y + 30.0, 20.0, 40.0)
                }
                None => Region::new(520.0, 100.0 + 45.0 * i as f32, 20.0, 40.0),
            };
            let bbox = self.jittered(anchor);
            let conf = self.confidence();
            let s = dweller.special;
            detections.push(
                RawDetection::new("dweller", bbox, conf)
                    .with_text(&dweller.name)
                    .with_reading("level", dweller.level as f32)
                    .with_reading("strength", s.strength as f32)
                    .with_reading("perception", s.perception as f32)
                    .with_reading("endurance", s.endurance as f32)
                    .with_reading("charisma", s.charisma as f32)
                    .with_reading("intelligence", s.intelligence as f32)
                    .with_reading("agility", s.agility as f32)
                    .with_reading("luck", s.luck as f32),
            );
        }

        self.fire = match self.fire {
            Some((room, left)) if left > 1 => Some((room, left - 1)),
            Some(_) => None,
            None if !self.scenario.rooms.is_empty() && self.rng.gen_bool(self.fire_chance) => {
                let room = self.rng.gen_range(0..self.scenario.rooms.len());
                Some((room, self.rng.gen_range(3..8)))
            }
            None => None,
        };
        if let Some((room, _)) = self.fire {
            let c = self.scenario.rooms[room].region.center();
            let conf = self.confidence();
            detections.push(RawDetection::new(
                "hazard:fire_overlay",
                [c.x - 30.0, c.y - 20.0, 60.0, 40.0],
                conf,
            ));
        }

        let frame = Frame::new(self.clock_ms, detections);
        self.clock_ms += FRAME_INTERVAL_MS;
        self.frames_emitted += 1;
        frame
    }
}

impl VisionSource for SyntheticVision {
    fn capture(&mut self) -> impl Future<Output = Result<Option<Frame>>> + Send {
        let frame = match self.max_frames {
            Some(max) if self.frames_emitted >= max => None,
            _ => Some(self.next_frame()),
        };
        async move { Ok(frame) }
    }
}
