//! Vault Autopilot - game-state inference and decision engine
//!
//! Raw detections flow through the normalizer and estimator into an immutable
//! [`model::GameState`]; strategy components turn each snapshot into ranked
//! proposals, and the orchestrator dispatches them to an actuator.

pub mod control;
pub mod core;
pub mod estimator;
pub mod model;
pub mod strategy;
pub mod vision;
