//! Vision boundary - raw detections in, typed observations out
//!
//! The vision collaborator (pixel capture + template matching) lives outside
//! this crate. It hands over labelled boxes once per cycle; everything here
//! turns those into [`Observation`]s the estimator can fuse.

pub mod detection;
pub mod normalizer;
pub mod observation;
pub mod source;
pub mod synthetic;

pub use detection::{Frame, RawDetection};
pub use normalizer::{normalize, normalize_lossy, parse_detection};
pub use observation::{DwellerReading, KindKey, Observation, ObservationKind};
pub use source::{ReplayVision, VisionSource};
pub use synthetic::{SyntheticVision, VaultScenario};
