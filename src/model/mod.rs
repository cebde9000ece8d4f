//! World model published by the estimator each cycle

pub mod game_state;

pub use game_state::{Dweller, GameState, HazardSighting, ResourceLevel, Room};
