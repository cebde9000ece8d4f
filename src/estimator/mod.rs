//! State estimation: turns per-frame observations into a tracked world model

pub mod fusion;
pub mod track;

pub use fusion::{repair_references, FusionOutcome, StateEstimator};
pub use track::{Track, Visibility};
