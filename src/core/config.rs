//! Policy configuration with documented defaults
//!
//! Every tunable the decision engine reads is collected here. The values are
//! loaded once at startup (see [`load_config`]) and never reloaded mid-run.

use crate::core::error::{AutopilotError, Result};
use crate::core::types::{ResourceKind, RoomType};
use crate::strategy::incidents::{IncidentKind, ResponseAction};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

/// Resources that must carry a threshold for the system to act safely
pub const REQUIRED_THRESHOLDS: [ResourceKind; 3] =
    [ResourceKind::Power, ResourceKind::Food, ResourceKind::Water];

/// Top-level configuration for the autopilot
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AutopilotConfig {
    pub normalizer: NormalizerConfig,
    pub estimator: EstimatorConfig,
    pub resources: ResourcePolicy,
    pub assignment: AssignmentConfig,
    pub incidents: IncidentPolicy,
    pub orchestrator: OrchestratorConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NormalizerConfig {
    /// Detections below this confidence are dropped before anything else
    pub confidence_floor: f32,

    /// Two same-kind detections whose centres are closer than this (pixels)
    /// are treated as one object
    pub dedup_tolerance: f32,
}

impl Default for NormalizerConfig {
    fn default() -> Self {
        Self {
            confidence_floor: 0.5,
            dedup_tolerance: 12.0,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EstimatorConfig {
    /// Exponential smoothing factor for continuous quantities
    ///
    /// `new = alpha * observed + (1 - alpha) * previous`. At 0.6 a single noisy
    /// frame moves the estimate a little over half way.
    pub smoothing_alpha: f32,

    /// Maximum distance (pixels) between a detection and a known entity for
    /// them to be considered the same object
    pub match_distance: f32,

    /// Consecutive unseen cycles after which an entity is hidden (N)
    pub stale_after_cycles: u32,

    /// Further cycles a hidden entity is kept for re-matching (M)
    pub forget_after_cycles: u32,

    /// UI anchors that a healthy frame always shows
    pub expected_anchors: Vec<String>,

    /// Fraction of `expected_anchors` required to trust a frame
    pub min_anchor_fraction: f32,
}

impl Default for EstimatorConfig {
    fn default() -> Self {
        Self {
            smoothing_alpha: 0.6,
            match_distance: 40.0,
            stale_after_cycles: 5,
            forget_after_cycles: 10,
            expected_anchors: vec!["resource_bar".into(), "vault_view".into()],
            min_anchor_fraction: 0.5,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ResourcePolicy {
    /// Fill fraction below which a resource needs attention
    ///
    /// Power, food and water are required. Caps, stimpaks and radaway only
    /// produce proposals when a threshold is configured for them.
    pub thresholds: BTreeMap<ResourceKind, f32>,

    /// Production progress at which a room is ready to collect
    pub collect_ready_progress: f32,
}

impl Default for ResourcePolicy {
    fn default() -> Self {
        let mut thresholds = BTreeMap::new();
        thresholds.insert(ResourceKind::Power, 0.8);
        thresholds.insert(ResourceKind::Food, 0.7);
        thresholds.insert(ResourceKind::Water, 0.7);
        Self {
            thresholds,
            collect_ready_progress: 0.95,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AssignmentConfig {
    /// Weight of the room's dominant SPECIAL stat in a pair score
    pub stat_weight: f32,

    /// Bonus per dweller level
    pub level_weight: f32,

    /// Relative value of each room type (missing types weigh 1.0)
    pub room_weights: BTreeMap<RoomType, f32>,

    /// A dweller whose dominant stat for their current room is below this is
    /// flagged for reassignment
    pub misfit_stat: u8,

    /// Idle dwellers with a stat below this are sent to train it
    pub train_below_stat: u8,
}

impl Default for AssignmentConfig {
    fn default() -> Self {
        let mut room_weights = BTreeMap::new();
        room_weights.insert(RoomType::PowerGenerator, 1.2);
        room_weights.insert(RoomType::WaterTreatment, 1.1);
        room_weights.insert(RoomType::Diner, 1.0);
        room_weights.insert(RoomType::Medbay, 0.8);
        room_weights.insert(RoomType::ScienceLab, 0.8);
        Self {
            stat_weight: 1.0,
            level_weight: 0.1,
            room_weights,
            misfit_stat: 3,
            train_below_stat: 3,
        }
    }
}

impl AssignmentConfig {
    pub fn room_weight(&self, room_type: RoomType) -> f32 {
        self.room_weights.get(&room_type).copied().unwrap_or(1.0)
    }
}

/// Maps a hazard label seen on screen to an incident kind and its response
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SignatureRule {
    pub label: String,
    pub kind: IncidentKind,
    pub response: ResponseAction,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct IncidentPolicy {
    pub signatures: Vec<SignatureRule>,

    /// Minimum cycles between two responses to the same incident
    pub cooldown_cycles: u64,

    /// Consecutive absent cycles before an incident counts as resolved
    pub resolve_after_absent: u32,

    /// Cycles after detection before an unresolved incident times out
    pub response_deadline_cycles: u64,

    /// Sightings closer than this (pixels) share a location
    pub location_tolerance: f32,

    /// Dwellers below this health are never sent to respond
    pub min_responder_health: u32,
}

impl Default for IncidentPolicy {
    fn default() -> Self {
        Self {
            signatures: vec![
                SignatureRule {
                    label: "fire_overlay".into(),
                    kind: IncidentKind::Fire,
                    response: ResponseAction::DispatchDwellers { count: 2 },
                },
                SignatureRule {
                    label: "radroach".into(),
                    kind: IncidentKind::Radroaches,
                    response: ResponseAction::DispatchDwellers { count: 2 },
                },
                SignatureRule {
                    label: "molerat".into(),
                    kind: IncidentKind::MoleRats,
                    response: ResponseAction::DispatchDwellers { count: 3 },
                },
                SignatureRule {
                    label: "raider".into(),
                    kind: IncidentKind::Raiders,
                    response: ResponseAction::DispatchDwellers { count: 3 },
                },
            ],
            cooldown_cycles: 3,
            resolve_after_absent: 2,
            response_deadline_cycles: 30,
            location_tolerance: 40.0,
            min_responder_health: 50,
        }
    }
}

impl IncidentPolicy {
    pub fn rule_for(&self, label: &str) -> Option<&SignatureRule> {
        self.signatures.iter().find(|r| r.label == label)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OrchestratorConfig {
    /// Bounded wait for a single actuation call (milliseconds)
    pub actuation_timeout_ms: u64,

    /// Cycles a dispatched key stays in flight before it may be re-issued
    pub inflight_ttl_cycles: u64,

    /// Rejections tolerated before a proposal is dropped
    pub retry_cap: u32,

    /// Pause between capture cycles (milliseconds)
    pub cycle_interval_ms: u64,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            actuation_timeout_ms: 2000,
            inflight_ttl_cycles: 5,
            retry_cap: 3,
            cycle_interval_ms: 500,
        }
    }
}

impl AutopilotConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse a TOML document; sections left out keep their defaults
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let config: AutopilotConfig = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate configuration for internal consistency
    pub fn validate(&self) -> Result<()> {
        for kind in REQUIRED_THRESHOLDS {
            if !self.resources.thresholds.contains_key(&kind) {
                return Err(AutopilotError::Config(format!(
                    "missing required threshold for {}",
                    kind
                )));
            }
        }

        for (kind, t) in &self.resources.thresholds {
            if !(*t > 0.0 && *t <= 1.0) {
                return Err(AutopilotError::Config(format!(
                    "threshold for {} must be in (0, 1], got {}",
                    kind, t
                )));
            }
        }

        let alpha = self.estimator.smoothing_alpha;
        if !(alpha > 0.0 && alpha <= 1.0) {
            return Err(AutopilotError::Config(format!(
                "smoothing_alpha must be in (0, 1], got {}",
                alpha
            )));
        }

        if !(0.0..=1.0).contains(&self.estimator.min_anchor_fraction) {
            return Err(AutopilotError::Config(format!(
                "min_anchor_fraction must be in [0, 1], got {}",
                self.estimator.min_anchor_fraction
            )));
        }

        if !(0.0..=1.0).contains(&self.normalizer.confidence_floor) {
            return Err(AutopilotError::Config(format!(
                "confidence_floor must be in [0, 1], got {}",
                self.normalizer.confidence_floor
            )));
        }

        if self.incidents.cooldown_cycles == 0 || self.incidents.resolve_after_absent == 0 {
            return Err(AutopilotError::Config(
                "incident cooldown and debounce must be at least one cycle".into(),
            ));
        }

        if self.orchestrator.retry_cap == 0 {
            return Err(AutopilotError::Config("retry_cap must be at least 1".into()));
        }

        let mut labels: Vec<&str> = self.incidents.signatures.iter().map(|r| r.label.as_str()).collect();
        labels.sort_unstable();
        if labels.windows(2).any(|w| w[0] == w[1]) {
            return Err(AutopilotError::Config("duplicate incident signature label".into()));
        }

        Ok(())
    }
}

/// Load and validate the configuration file
pub fn load_config(path: &Path) -> Result<AutopilotConfig> {
    let content = fs::read_to_string(path)?;
    let config = AutopilotConfig::from_toml_str(&content)?;
    tracing::info!(
        "Loaded configuration from {} ({} thresholds, {} incident signatures)",
        path.display(),
        config.resources.thresholds.len(),
        config.incidents.signatures.len()
    );
    Ok(config)
}

/// Write the configuration as TOML, e.g. to capture a tuned policy
pub fn save_config(config: &AutopilotConfig, path: &Path) -> Result<()> {
    config.validate()?;
    let content = toml::to_string_pretty(config)?;
    fs::write(path, content)?;
    tracing::info!("Saved configuration to {}", path.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        assert!(AutopilotConfig::default().validate().is_ok());
    }

    #[test]
    fn test_defaults_only_threshold_required_resources() {
        let config = AutopilotConfig::default();
        assert_eq!(config.resources.thresholds.len(), 3);
        assert!(!config.resources.thresholds.contains_key(&ResourceKind::Caps));
    }

    #[test]
    fn test_missing_required_threshold_is_fatal() {
        let toml = r#"
            [resources.thresholds]
            power = 0.8
            food = 0.7
        "#;
        let err = AutopilotConfig::from_toml_str(toml).unwrap_err();
        assert!(matches!(err, AutopilotError::Config(msg) if msg.contains("water")));
    }

    #[test]
    fn test_partial_file_keeps_defaults() {
        let toml = r#"
            [estimator]
            smoothing_alpha = 0.5

            [resources.thresholds]
            power = 0.9
            food = 0.6
            water = 0.6
            caps = 0.2
        "#;
        let config = AutopilotConfig::from_toml_str(toml).unwrap();
        assert_eq!(config.estimator.smoothing_alpha, 0.5);
        assert_eq!(config.estimator.stale_after_cycles, 5);
        assert_eq!(config.resources.thresholds[&ResourceKind::Caps], 0.2);
        assert_eq!(config.orchestrator.retry_cap, 3);
    }

    #[test]
    fn test_incident_signatures_from_toml() {
        let toml = r#"
            [[incidents.signatures]]
            label = "deathclaw"
            kind = "deathclaws"
            response = { dispatch_dwellers = { count = 4 } }

            [[incidents.signatures]]
            label = "smoke"
            kind = "fire"
            response = "focus_room"
        "#;
        let config = AutopilotConfig::from_toml_str(toml).unwrap();
        assert_eq!(config.incidents.signatures.len(), 2);
        let rule = config.incidents.rule_for("deathclaw").unwrap();
        assert_eq!(rule.kind, IncidentKind::Deathclaws);
        assert_eq!(rule.response, ResponseAction::DispatchDwellers { count: 4 });
        assert_eq!(
            config.incidents.rule_for("smoke").unwrap().response,
            ResponseAction::FocusRoom
        );
    }

    #[test]
    fn test_rejects_bad_alpha() {
        let mut config = AutopilotConfig::default();
        config.estimator.smoothing_alpha = 0.0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_saved_config_loads_back() {
        let mut config = AutopilotConfig::default();
        config.resources.thresholds.insert(ResourceKind::Stimpaks, 0.25);
        config.incidents.signatures[1].response = ResponseAction::FocusRoom;
        config.orchestrator.retry_cap = 5;

        let path = std::env::temp_dir().join(format!("vault-policy-{}.toml", std::process::id()));
        save_config(&config, &path).unwrap();
        let loaded = load_config(&path).unwrap();
        std::fs::remove_file(&path).ok();

        assert_eq!(loaded.resources.thresholds, config.resources.thresholds);
        assert_eq!(loaded.incidents.signatures, config.incidents.signatures);
        assert_eq!(loaded.assignment.room_weights, config.assignment.room_weights);
        assert_eq!(loaded.estimator.expected_anchors, config.estimator.expected_anchors);
        assert_eq!(loaded.orchestrator.retry_cap, 5);
    }

    #[test]
    fn test_invalid_config_is_not_saved() {
        let mut config = AutopilotConfig::default();
        config.resources.thresholds.remove(&ResourceKind::Water);
        let path = std::env::temp_dir().join(format!("vault-bad-{}.toml", std::process::id()));
        assert!(matches!(save_config(&config, &path), Err(AutopilotError::Config(_))));
        assert!(!path.exists());
    }
}
