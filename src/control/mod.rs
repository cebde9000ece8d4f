//! Decision loop: orchestration, actuation and in-flight bookkeeping

pub mod actuation;
pub mod inflight;
pub mod orchestrator;
pub mod runner;
pub mod status;

pub use actuation::{ActionResult, Actuator, LoggingActuator};
pub use inflight::InFlightTracker;
pub use orchestrator::{merge_proposals, CycleReport, Orchestrator};
pub use runner::{run_lockstep, spawn_autopilot, AutopilotHandle, CapturePipeline, RunSummary};
pub use status::{StatusBoard, StatusCounters};
