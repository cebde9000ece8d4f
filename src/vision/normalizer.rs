//! Detection normalizer - raw boxes to typed, deduplicated observations
//!
//! Pure functions with no shared state. The pipeline is:
//! 1. Parse each detection (label grammar + readings), rejecting malformed ones
//! 2. Drop anything below the confidence floor
//! 3. Collapse same-kind detections whose centres lie within the tolerance,
//!    keeping the most confident one

use crate::core::config::NormalizerConfig;
use crate::core::error::{AutopilotError, Result};
use crate::core::types::{Region, ResourceKind, RoomType, Special, SpecialStat};
use crate::vision::detection::RawDetection;
use crate::vision::observation::{DwellerReading, Observation, ObservationKind};
use std::cmp::Ordering;

/// Highest stat value a dweller can show (base 10 plus outfit bonuses)
const MAX_STAT: f32 = 20.0;

/// Normalize a whole frame, failing on the first malformed detection
pub fn normalize(
    raw_detections: &[RawDetection],
    timestamp_ms: u64,
    config: &NormalizerConfig,
) -> Result<Vec<Observation>> {
    let parsed = raw_detections
        .iter()
        .map(|raw| parse_detection(raw, timestamp_ms))
        .collect::<Result<Vec<_>>>()?;
    Ok(filter_and_dedup(parsed, config))
}

/// Normalize a frame, dropping (and logging) malformed detections individually
pub fn normalize_lossy(
    raw_detections: &[RawDetection],
    timestamp_ms: u64,
    config: &NormalizerConfig,
) -> Vec<Observation> {
    let parsed = raw_detections
        .iter()
        .filter_map(|raw| match parse_detection(raw, timestamp_ms) {
            Ok(obs) => Some(obs),
            Err(e) => {
                tracing::warn!("Dropping detection {:?}: {}", raw.kind, e);
                None
            }
        })
        .collect();
    filter_and_dedup(parsed, config)
}

/// Parse one raw detection into a typed observation
pub fn parse_detection(raw: &RawDetection, timestamp_ms: u64) -> Result<Observation> {
    let label = raw
        .kind
        .as_deref()
        .filter(|k| !k.trim().is_empty())
        .ok_or_else(|| AutopilotError::InvalidDetection("missing kind".into()))?;

    let [x, y, w, h] = raw
        .region
        .ok_or_else(|| AutopilotError::InvalidDetection(format!("{}: missing region", label)))?;
    let region = Region::new(x, y, w, h);
    if !region.is_valid() {
        return Err(AutopilotError::InvalidDetection(format!(
            "{}: malformed region {:?}",
            label, raw.region
        )));
    }

    if !raw.confidence.is_finite() || !(0.0..=1.0).contains(&raw.confidence) {
        return Err(AutopilotError::InvalidDetection(format!(
            "{}: confidence {} outside [0, 1]",
            label, raw.confidence
        )));
    }

    let kind = parse_kind(label, raw)?;

    Ok(Observation {
        kind,
        region,
        confidence: raw.confidence,
        timestamp_ms,
    })
}

fn parse_kind(label: &str, raw: &RawDetection) -> Result<ObservationKind> {
    if label == "dweller" {
        return parse_dweller(raw);
    }

    let (category, subtype) = label
        .split_once(':')
        .filter(|(_, sub)| !sub.is_empty())
        .ok_or_else(|| AutopilotError::InvalidDetection(format!("unknown kind '{}'", label)))?;

    match category {
        "resource" => {
            let kind = ResourceKind::from_label(subtype).ok_or_else(|| {
                AutopilotError::InvalidDetection(format!("unknown resource '{}'", subtype))
            })?;
            let level = required(raw, "level", label)?.max(0.0);
            let capacity = reading(raw, "capacity", label)?.unwrap_or(100.0).max(0.0);
            Ok(ObservationKind::Resource {
                kind,
                level,
                capacity,
            })
        }
        "room" => {
            let room_type = RoomType::from_label(subtype).ok_or_else(|| {
                AutopilotError::InvalidDetection(format!("unknown room type '{}'", subtype))
            })?;
            let level = reading(raw, "level", label)?.unwrap_or(1.0).clamp(1.0, 3.0) as u8;
            let capacity = match reading(raw, "capacity", label)? {
                Some(c) => c.round().clamp(0.0, 6.0) as u8,
                None => room_type.default_capacity(),
            };
            let progress = reading(raw, "progress", label)?.unwrap_or(0.0).clamp(0.0, 1.0);
            let producing = reading(raw, "producing", label)?.unwrap_or(0.0) > 0.5;
            Ok(ObservationKind::Room {
                room_type,
                level,
                capacity,
                producing,
                progress,
            })
        }
        "hazard" => Ok(ObservationKind::Hazard {
            signature: subtype.to_string(),
        }),
        "ui" => Ok(ObservationKind::Anchor {
            name: subtype.to_string(),
        }),
        _ => Err(AutopilotError::InvalidDetection(format!(
            "unknown kind '{}'",
            label
        ))),
    }
}

fn parse_dweller(raw: &RawDetection) -> Result<ObservationKind> {
    let mut special = Special::default();
    for stat in SpecialStat::ALL {
        let value = reading(raw, stat.label(), "dweller")?.unwrap_or(1.0);
        special.set(stat, value.round().clamp(0.0, MAX_STAT) as u8);
    }

    let level = reading(raw, "level", "dweller")?.unwrap_or(1.0).round().clamp(1.0, 50.0) as u8;
    let health = reading(raw, "health", "dweller")?.unwrap_or(100.0).round().max(0.0) as u32;
    let training = reading(raw, "training", "dweller")?.unwrap_or(0.0) > 0.5;
    let exploring = reading(raw, "exploring", "dweller")?.unwrap_or(0.0) > 0.5;
    let name = raw
        .text
        .as_ref()
        .map(|t| t.trim().to_string())
        .filter(|t| !t.is_empty());

    Ok(ObservationKind::Dweller(DwellerReading {
        name,
        level,
        health,
        special,
        training,
        exploring,
    }))
}

fn reading(raw: &RawDetection, name: &str, label: &str) -> Result<Option<f32>> {
    match raw.readings.get(name) {
        Some(v) if !v.is_finite() => Err(AutopilotError::InvalidDetection(format!(
            "{}: reading '{}' is not finite",
            label, name
        ))),
        Some(v) => Ok(Some(*v)),
        None => Ok(None),
    }
}

fn required(raw: &RawDetection, name: &str, label: &str) -> Result<f32> {
    reading(raw, name, label)?.ok_or_else(|| {
        AutopilotError::InvalidDetection(format!("{}: missing reading '{}'", label, name))
    })
}

fn filter_and_dedup(mut observations: Vec<Observation>, config: &NormalizerConfig) -> Vec<Observation> {
    observations.retain(|o| o.confidence >= config.confidence_floor);

    // Most confident first; position breaks ties so the result is deterministic
    observations.sort_by(|a, b| {
        b.confidence
            .total_cmp(&a.confidence)
            .then_with(|| cmp_position(&a.region, &b.region))
    });

    let mut kept: Vec<Observation> = Vec::with_capacity(observations.len());
    for obs in observations {
        let key = obs.key();
        let center = obs.region.center();
        let duplicate = kept.iter().any(|k| {
            k.key() == key && k.region.center().distance(&center) <= config.dedup_tolerance
        });
        if !duplicate {
            kept.push(obs);
        }
    }
    kept
}

fn cmp_position(a: &Region, b: &Region) -> Ordering {
    a.y.total_cmp(&b.y)
        .then_with(|| a.x.total_cmp(&b.x))
        .then_with(|| a.w.total_cmp(&b.w))
        .then_with(|| a.h.total_cmp(&b.h))
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn config() -> NormalizerConfig {
        NormalizerConfig {
            confidence_floor: 0.5,
            dedup_tolerance: 10.0,
        }
    }

    #[test]
    fn test_parse_resource_gauge() {
        let raw = RawDetection::new("resource:water", [0.0, 0.0, 50.0, 10.0], 0.9)
            .with_reading("level", 42.0)
            .with_reading("capacity", 120.0);
        let obs = parse_detection(&raw, 7).unwrap();
        assert_eq!(
            obs.kind,
            ObservationKind::Resource {
                kind: ResourceKind::Water,
                level: 42.0,
                capacity: 120.0
            }
        );
        assert_eq!(obs.timestamp_ms, 7);
    }

    #[test]
    fn test_missing_kind_is_invalid() {
        let mut raw = RawDetection::new("dweller", [0.0, 0.0, 1.0, 1.0], 0.9);
        raw.kind = None;
        assert!(matches!(
            parse_detection(&raw, 0),
            Err(AutopilotError::InvalidDetection(_))
        ));
    }

    #[test]
    fn test_missing_region_is_invalid() {
        let mut raw = RawDetection::new("ui:vault_view", [0.0, 0.0, 1.0, 1.0], 0.9);
        raw.region = None;
        assert!(matches!(
            parse_detection(&raw, 0),
            Err(AutopilotError::InvalidDetection(_))
        ));
    }

    #[test]
    fn test_resource_without_level_is_invalid() {
        let raw = RawDetection::new("resource:food", [0.0, 0.0, 1.0, 1.0], 0.9);
        assert!(parse_detection(&raw, 0).is_err());
    }

    #[test]
    fn test_unknown_label_is_invalid() {
        let raw = RawDetection::new("vehicle:car", [0.0, 0.0, 1.0, 1.0], 0.9);
        assert!(parse_detection(&raw, 0).is_err());
        let raw = RawDetection::new("room:", [0.0, 0.0, 1.0, 1.0], 0.9);
        assert!(parse_detection(&raw, 0).is_err());
    }

    #[test]
    fn test_dweller_defaults_and_stats() {
        let raw = RawDetection::new("dweller", [100.0, 100.0, 20.0, 40.0], 0.8)
            .with_text(" Marcus ")
            .with_reading("strength", 9.0)
            .with_reading("level", 12.0)
            .with_reading("training", 1.0);
        let obs = parse_detection(&raw, 0).unwrap();
        match obs.kind {
            ObservationKind::Dweller(reading) => {
                assert_eq!(reading.name.as_deref(), Some("Marcus"));
                assert_eq!(reading.special.strength, 9);
                assert_eq!(reading.special.luck, 1);
                assert_eq!(reading.level, 12);
                assert_eq!(reading.health, 100);
                assert!(reading.training);
                assert!(!reading.exploring);
            }
            other => panic!("expected dweller, got {:?}", other),
        }
    }

    #[test]
    fn test_drops_below_confidence_floor() {
        let raw = vec![
            RawDetection::new("ui:vault_view", [0.0, 0.0, 10.0, 10.0], 0.4),
            RawDetection::new("ui:resource_bar", [0.0, 0.0, 10.0, 10.0], 0.5),
        ];
        let obs = normalize(&raw, 0, &config()).unwrap();
        assert_eq!(obs.len(), 1);
        assert_eq!(obs[0].key(), crate::vision::KindKey::Anchor("resource_bar".into()));
    }

    #[test]
    fn test_dedup_keeps_highest_confidence() {
        let raw = vec![
            RawDetection::new("room:diner", [100.0, 100.0, 60.0, 30.0], 0.7),
            RawDetection::new("room:diner", [104.0, 101.0, 60.0, 30.0], 0.95),
            RawDetection::new("room:diner", [300.0, 100.0, 60.0, 30.0], 0.6),
            // Different kind at the same spot survives
            RawDetection::new("room:medbay", [100.0, 100.0, 60.0, 30.0], 0.6),
        ];
        let obs = normalize(&raw, 0, &config()).unwrap();
        assert_eq!(obs.len(), 3);
        assert_eq!(obs[0].confidence, 0.95);
        assert_eq!(obs[0].region.x, 104.0);
    }

    #[test]
    fn test_strict_normalize_fails_on_malformed() {
        let mut bad = RawDetection::new("dweller", [0.0, 0.0, 1.0, 1.0], 0.9);
        bad.region = None;
        let raw = vec![RawDetection::new("ui:vault_view", [0.0, 0.0, 1.0, 1.0], 0.9), bad];
        assert!(normalize(&raw, 0, &config()).is_err());
        assert_eq!(normalize_lossy(&raw, 0, &config()).len(), 1);
    }

    #[test]
    fn test_empty_frame_is_not_an_error() {
        assert!(normalize(&[], 0, &config()).unwrap().is_empty());
    }

    proptest! {
        #[test]
        fn prop_output_is_floor_filtered_and_deduplicated(
            boxes in prop::collection::vec((0.0f32..200.0, 0.0f32..200.0, 0.0f32..1.0, 0usize..3), 0..40)
        ) {
            let labels = ["room:diner", "dweller", "hazard:fire_overlay"];
            let raw: Vec<RawDetection> = boxes
                .iter()
                .map(|(x, y, c, k)| RawDetection::new(labels[*k], [*x, *y, 10.0, 10.0], *c))
                .collect();
            let cfg = config();
            let obs = normalize(&raw, 0, &cfg).unwrap();

            for o in &obs {
                prop_assert!(o.confidence >= cfg.confidence_floor);
            }
            for (i, a) in obs.iter().enumerate() {
                for b in obs.iter().skip(i + 1) {
                    if a.key() == b.key() {
                        prop_assert!(a.region.center().distance(&b.region.center()) > cfg.dedup_tolerance);
                    }
                }
            }
            for w in obs.windows(2) {
                prop_assert!(w[0].confidence >= w[1].confidence);
            }
        }
    }
}
