//! Core type definitions used throughout the codebase

use serde::{Deserialize, Serialize};
use std::fmt;

/// Decision cycle counter (one per consumed snapshot)
pub type Cycle = u64;

/// Stable identifier for a tracked dweller
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct DwellerId(pub u32);

/// Stable identifier for a tracked room
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct RoomId(pub u32);

/// Identifier for a tracked incident
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct IncidentId(pub u32);

impl fmt::Display for DwellerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "dweller-{}", self.0)
    }
}

impl fmt::Display for RoomId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "room-{}", self.0)
    }
}

impl fmt::Display for IncidentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "incident-{}", self.0)
    }
}

/// 2D screen position
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Vec2 {
    pub x: f32,
    pub y: f32,
}

impl Vec2 {
    pub fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }

    pub fn distance(&self, other: &Self) -> f32 {
        let dx = self.x - other.x;
        let dy = self.y - other.y;
        (dx * dx + dy * dy).sqrt()
    }
}

impl std::ops::Add for Vec2 {
    type Output = Self;
    fn add(self, rhs: Self) -> Self {
        Self { x: self.x + rhs.x, y: self.y + rhs.y }
    }
}

impl std::ops::Sub for Vec2 {
    type Output = Self;
    fn sub(self, rhs: Self) -> Self {
        Self { x: self.x - rhs.x, y: self.y - rhs.y }
    }
}

/// Axis-aligned screen rectangle `(x, y, w, h)` with the origin at the top-left
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Region {
    pub x: f32,
    pub y: f32,
    pub w: f32,
    pub h: f32,
}

impl Region {
    pub fn new(x: f32, y: f32, w: f32, h: f32) -> Self {
        Self { x, y, w, h }
    }

    pub fn center(&self) -> Vec2 {
        Vec2::new(self.x + self.w / 2.0, self.y + self.h / 2.0)
    }

    pub fn contains(&self, point: Vec2) -> bool {
        point.x >= self.x
            && point.x <= self.x + self.w
            && point.y >= self.y
            && point.y <= self.y + self.h
    }

    pub fn is_valid(&self) -> bool {
        [self.x, self.y, self.w, self.h].iter().all(|v| v.is_finite())
            && self.w >= 0.0
            && self.h >= 0.0
    }
}

/// Vault resources shown in the top resource bar
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResourceKind {
    Power,
    Food,
    Water,
    Caps,
    Stimpaks,
    Radaway,
}

impl ResourceKind {
    /// Fixed tie-break order: power > water > food > caps > stimpaks > radaway
    pub const PRIORITY_ORDER: [ResourceKind; 6] = [
        ResourceKind::Power,
        ResourceKind::Water,
        ResourceKind::Food,
        ResourceKind::Caps,
        ResourceKind::Stimpaks,
        ResourceKind::Radaway,
    ];

    /// Position in [`Self::PRIORITY_ORDER`] (0 = most important)
    pub fn rank(&self) -> usize {
        match self {
            ResourceKind::Power => 0,
            ResourceKind::Water => 1,
            ResourceKind::Food => 2,
            ResourceKind::Caps => 3,
            ResourceKind::Stimpaks => 4,
            ResourceKind::Radaway => 5,
        }
    }

    pub fn from_label(label: &str) -> Option<Self> {
        match label {
            "power" => Some(ResourceKind::Power),
            "food" => Some(ResourceKind::Food),
            "water" => Some(ResourceKind::Water),
            "caps" => Some(ResourceKind::Caps),
            "stimpaks" => Some(ResourceKind::Stimpaks),
            "radaway" => Some(ResourceKind::Radaway),
            _ => None,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            ResourceKind::Power => "power",
            ResourceKind::Food => "food",
            ResourceKind::Water => "water",
            ResourceKind::Caps => "caps",
            ResourceKind::Stimpaks => "stimpaks",
            ResourceKind::Radaway => "radaway",
        }
    }

    /// Room type that produces this resource (caps drop from every producing room)
    pub fn producer(&self) -> Option<RoomType> {
        match self {
            ResourceKind::Power => Some(RoomType::PowerGenerator),
            ResourceKind::Food => Some(RoomType::Diner),
            ResourceKind::Water => Some(RoomType::WaterTreatment),
            ResourceKind::Stimpaks => Some(RoomType::Medbay),
            ResourceKind::Radaway => Some(RoomType::ScienceLab),
            ResourceKind::Caps => None,
        }
    }
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// One of the seven SPECIAL attributes
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SpecialStat {
    Strength,
    Perception,
    Endurance,
    Charisma,
    Intelligence,
    Agility,
    Luck,
}

impl SpecialStat {
    pub const ALL: [SpecialStat; 7] = [
        SpecialStat::Strength,
        SpecialStat::Perception,
        SpecialStat::Endurance,
        SpecialStat::Charisma,
        SpecialStat::Intelligence,
        SpecialStat::Agility,
        SpecialStat::Luck,
    ];

    pub fn label(&self) -> &'static str {
        match self {
            SpecialStat::Strength => "strength",
            SpecialStat::Perception => "perception",
            SpecialStat::Endurance => "endurance",
            SpecialStat::Charisma => "charisma",
            SpecialStat::Intelligence => "intelligence",
            SpecialStat::Agility => "agility",
            SpecialStat::Luck => "luck",
        }
    }
}

/// SPECIAL stat block (each stat 1-10, higher with outfits)
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Special {
    pub strength: u8,
    pub perception: u8,
    pub endurance: u8,
    pub charisma: u8,
    pub intelligence: u8,
    pub agility: u8,
    pub luck: u8,
}

impl Special {
    pub fn get(&self, stat: SpecialStat) -> u8 {
        match stat {
            SpecialStat::Strength => self.strength,
            SpecialStat::Perception => self.perception,
            SpecialStat::Endurance => self.endurance,
            SpecialStat::Charisma => self.charisma,
            SpecialStat::Intelligence => self.intelligence,
            SpecialStat::Agility => self.agility,
            SpecialStat::Luck => self.luck,
        }
    }

    pub fn set(&mut self, stat: SpecialStat, value: u8) {
        match stat {
            SpecialStat::Strength => self.strength = value,
            SpecialStat::Perception => self.perception = value,
            SpecialStat::Endurance => self.endurance = value,
            SpecialStat::Charisma => self.charisma = value,
            SpecialStat::Intelligence => self.intelligence = value,
            SpecialStat::Agility => self.agility = value,
            SpecialStat::Luck => self.luck = value,
        }
    }

    /// Lowest stat, first in SPECIAL order on ties
    pub fn weakest(&self) -> (SpecialStat, u8) {
        SpecialStat::ALL
            .iter()
            .map(|&s| (s, self.get(s)))
            .fold((SpecialStat::Strength, u8::MAX), |best, cur| {
                if cur.1 < best.1 {
                    cur
                } else {
                    best
                }
            })
    }
}

/// Room types recognised on the vault view
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RoomType {
    PowerGenerator,
    Diner,
    WaterTreatment,
    LivingQuarters,
    Storage,
    Medbay,
    ScienceLab,
    WeightRoom,
    Armory,
    FitnessRoom,
    Lounge,
    Classroom,
    AthleticsRoom,
    GameRoom,
}

impl RoomType {
    pub const ALL: [RoomType; 14] = [
        RoomType::PowerGenerator,
        RoomType::Diner,
        RoomType::WaterTreatment,
        RoomType::LivingQuarters,
        RoomType::Storage,
        RoomType::Medbay,
        RoomType::ScienceLab,
        RoomType::WeightRoom,
        RoomType::Armory,
        RoomType::FitnessRoom,
        RoomType::Lounge,
        RoomType::Classroom,
        RoomType::AthleticsRoom,
        RoomType::GameRoom,
    ];

    pub fn label(&self) -> &'static str {
        match self {
            RoomType::PowerGenerator => "power_generator",
            RoomType::Diner => "diner",
            RoomType::WaterTreatment => "water_treatment",
            RoomType::LivingQuarters => "living_quarters",
            RoomType::Storage => "storage",
            RoomType::Medbay => "medbay",
            RoomType::ScienceLab => "science_lab",
            RoomType::WeightRoom => "weight_room",
            RoomType::Armory => "armory",
            RoomType::FitnessRoom => "fitness_room",
            RoomType::Lounge => "lounge",
            RoomType::Classroom => "classroom",
            RoomType::AthleticsRoom => "athletics_room",
            RoomType::GameRoom => "game_room",
        }
    }

    pub fn from_label(label: &str) -> Option<Self> {
        RoomType::ALL.iter().copied().find(|r| r.label() == label)
    }

    /// Stat that drives production speed in this room
    pub fn dominant_stat(&self) -> Option<SpecialStat> {
        match self {
            RoomType::PowerGenerator => Some(SpecialStat::Strength),
            RoomType::WaterTreatment => Some(SpecialStat::Perception),
            RoomType::Diner => Some(SpecialStat::Agility),
            RoomType::Medbay | RoomType::ScienceLab => Some(SpecialStat::Intelligence),
            _ => None,
        }
    }

    /// Stat trained by this room, for training rooms
    pub fn trains(&self) -> Option<SpecialStat> {
        match self {
            RoomType::WeightRoom => Some(SpecialStat::Strength),
            RoomType::Armory => Some(SpecialStat::Perception),
            RoomType::FitnessRoom => Some(SpecialStat::Endurance),
            RoomType::Lounge => Some(SpecialStat::Charisma),
            RoomType::Classroom => Some(SpecialStat::Intelligence),
            RoomType::AthleticsRoom => Some(SpecialStat::Agility),
            RoomType::GameRoom => Some(SpecialStat::Luck),
            _ => None,
        }
    }

    pub fn produces(&self) -> Option<ResourceKind> {
        match self {
            RoomType::PowerGenerator => Some(ResourceKind::Power),
            RoomType::Diner => Some(ResourceKind::Food),
            RoomType::WaterTreatment => Some(ResourceKind::Water),
            RoomType::Medbay => Some(ResourceKind::Stimpaks),
            RoomType::ScienceLab => Some(ResourceKind::Radaway),
            _ => None,
        }
    }

    /// Slots in a single-width room when the detection carries no capacity reading
    pub fn default_capacity(&self) -> u8 {
        match self {
            RoomType::LivingQuarters | RoomType::Storage => 0,
            _ => 2,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resource_priority_order() {
        let mut kinds = vec![
            ResourceKind::Radaway,
            ResourceKind::Food,
            ResourceKind::Caps,
            ResourceKind::Power,
            ResourceKind::Stimpaks,
            ResourceKind::Water,
        ];
        kinds.sort_by_key(|k| k.rank());
        assert_eq!(kinds, ResourceKind::PRIORITY_ORDER.to_vec());
    }

    #[test]
    fn test_resource_label_roundtrip() {
        for kind in ResourceKind::PRIORITY_ORDER {
            assert_eq!(ResourceKind::from_label(kind.label()), Some(kind));
        }
        assert_eq!(ResourceKind::from_label("nuka_cola"), None);
    }

    #[test]
    fn test_region_contains_and_center() {
        let region = Region::new(10.0, 20.0, 100.0, 40.0);
        assert_eq!(region.center(), Vec2::new(60.0, 40.0));
        assert!(region.contains(Vec2::new(10.0, 20.0)));
        assert!(region.contains(Vec2::new(110.0, 60.0)));
        assert!(!region.contains(Vec2::new(111.0, 30.0)));
    }

    #[test]
    fn test_region_rejects_non_finite() {
        assert!(!Region::new(f32::NAN, 0.0, 1.0, 1.0).is_valid());
        assert!(!Region::new(0.0, 0.0, -1.0, 1.0).is_valid());
        assert!(Region::new(0.0, 0.0, 0.0, 0.0).is_valid());
    }

    #[test]
    fn test_special_weakest_prefers_first_on_tie() {
        let special = Special {
            strength: 5,
            perception: 2,
            endurance: 2,
            charisma: 7,
            intelligence: 3,
            agility: 9,
            luck: 4,
        };
        assert_eq!(special.weakest(), (SpecialStat::Perception, 2));
    }

    #[test]
    fn test_room_roles() {
        assert_eq!(RoomType::PowerGenerator.dominant_stat(), Some(SpecialStat::Strength));
        assert_eq!(RoomType::Classroom.trains(), Some(SpecialStat::Intelligence));
        assert_eq!(RoomType::LivingQuarters.dominant_stat(), None);
        assert_eq!(ResourceKind::Water.producer(), Some(RoomType::WaterTreatment));
        assert_eq!(RoomType::from_label("diner"), Some(RoomType::Diner));
        for room in RoomType::ALL {
            assert_eq!(RoomType::from_label(room.label()), Some(room));
        }
    }
}
