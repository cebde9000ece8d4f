pub mod config;
pub mod error;
pub mod types;

pub use config::{load_config, save_config, AutopilotConfig};
pub use error::{AutopilotError, Result};
