//! Wiring of capture and decision tasks
//!
//! The capture task owns the vision source and the estimator. It publishes
//! each fusion outcome into a `watch` channel, overwriting any outcome the
//! decision loop has not consumed yet. The decision loop owns the
//! orchestrator and runs one cycle per outcome it sees. A `watch<bool>` stop
//! signal is observed between cycles only, so a running cycle always
//! completes.

use crate::control::actuation::Actuator;
use crate::control::orchestrator::{CycleReport, Orchestrator};
use crate::control::status::StatusBoard;
use crate::core::config::{AutopilotConfig, NormalizerConfig};
use crate::core::error::{AutopilotError, Result};
use crate::estimator::{FusionOutcome, StateEstimator};
use crate::vision::{normalize_lossy, Frame, VisionSource};
use serde::Serialize;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;

/// Normalizer and estimator, driven one frame at a time
#[derive(Debug, Clone)]
pub struct CapturePipeline {
    normalizer: NormalizerConfig,
    estimator: StateEstimator,
}

impl CapturePipeline {
    pub fn new(config: &AutopilotConfig) -> Self {
        Self {
            normalizer: config.normalizer.clone(),
            estimator: StateEstimator::new(config.estimator.clone()),
        }
    }

    pub fn process(&mut self, frame: &Frame) -> FusionOutcome {
        let observations = normalize_lossy(&frame.detections, frame.captured_at_ms, &self.normalizer);
        self.estimator.fuse(&observations, frame.captured_at_ms)
    }

    pub fn estimator(&self) -> &StateEstimator {
        &self.estimator
    }
}

/// Totals over a whole run
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RunSummary {
    pub frames: u64,
    pub cycles: u64,
    pub skipped: u64,
    pub proposed: u64,
    pub filtered: u64,
    pub dispatched: u64,
    pub failed: u64,
    pub rejected: u64,
    pub confirmed: u64,
    pub incidents_resolved: u64,
    pub incidents_timed_out: u64,
}

impl RunSummary {
    pub fn absorb(&mut self, report: &CycleReport) {
        self.cycles += 1;
        if report.skipped {
            self.skipped += 1;
        }
        self.proposed += report.proposed as u64;
        self.filtered += report.filtered as u64;
        self.dispatched += report.dispatched.len() as u64;
        self.failed += report.failed.len() as u64;
        self.confirmed += report.confirmed.len() as u64;
        self.incidents_resolved += report.resolved.len() as u64;
        for error in &report.errors {
            match error {
                AutopilotError::ActionRejected { .. } => self.rejected += 1,
                AutopilotError::IncidentTimeout(_) => self.incidents_timed_out += 1,
                _ => {}
            }
        }
    }
}

/// Drive every frame of `vision` through the pipeline and the orchestrator
/// in lockstep, without dropping any
///
/// Deterministic for a deterministic source and actuator.
pub async fn run_lockstep<V: VisionSource, A: Actuator>(
    config: &AutopilotConfig,
    mut vision: V,
    orchestrator: &mut Orchestrator<A>,
    max_frames: Option<u64>,
) -> Result<RunSummary> {
    let mut pipeline = CapturePipeline::new(config);
    let mut summary = RunSummary::default();

    while max_frames.map_or(true, |max| summary.frames < max) {
        let Some(frame) = vision.capture().await? else {
            break;
        };
        summary.frames += 1;
        let outcome = pipeline.process(&frame);
        let report = orchestrator.run_cycle(&outcome).await;
        summary.absorb(&report);
    }

    Ok(summary)
}

/// Handle to a running autopilot
pub struct AutopilotHandle {
    stop_tx: watch::Sender<bool>,
    status: StatusBoard,
    capture: JoinHandle<u64>,
    decision: JoinHandle<RunSummary>,
}

impl AutopilotHandle {
    pub fn status(&self) -> &StatusBoard {
        &self.status
    }

    /// Ask both tasks to stop after their current step
    pub fn stop(&self) {
        // Both tasks gone already means there is nothing to stop
        let _ = self.stop_tx.send(true);
    }

    pub fn is_finished(&self) -> bool {
        self.capture.is_finished() && self.decision.is_finished()
    }

    /// Wait for both tasks to end
    pub async fn join(self) -> Result<RunSummary> {
        let frames = self
            .capture
            .await
            .map_err(|e| AutopilotError::Task(e.to_string()))?;
        let mut summary = self
            .decision
            .await
            .map_err(|e| AutopilotError::Task(e.to_string()))?;
        summary.frames = frames;
        Ok(summary)
    }
}

/// Start the capture task and decision loop on the current tokio runtime
pub fn spawn_autopilot<V: VisionSource, A: Actuator>(
    config: &AutopilotConfig,
    vision: V,
    actuator: A,
    status: StatusBoard,
) -> AutopilotHandle {
    let (stop_tx, stop_rx) = watch::channel(false);
    let (outcome_tx, outcome_rx) = watch::channel(None);

    let pipeline = CapturePipeline::new(config);
    let interval = Duration::from_millis(config.orchestrator.cycle_interval_ms);
    let orchestrator = Orchestrator::new(config, actuator, status.clone());

    tracing::info!(
        "Starting autopilot (cycle interval {}ms)",
        config.orchestrator.cycle_interval_ms
    );

    let capture = tokio::spawn(capture_loop(vision, pipeline, outcome_tx, stop_rx.clone(), interval));
    let decision = tokio::spawn(decision_loop(orchestrator, outcome_rx, stop_rx));

    AutopilotHandle {
        stop_tx,
        status,
        capture,
        decision,
    }
}

async fn capture_loop<V: VisionSource>(
    mut vision: V,
    mut pipeline: CapturePipeline,
    outcome_tx: watch::Sender<Option<FusionOutcome>>,
    mut stop: watch::Receiver<bool>,
    interval: Duration,
) -> u64 {
    let mut frames = 0;

    loop {
        if *stop.borrow() {
            break;
        }

        match vision.capture().await {
            Ok(Some(frame)) => {
                frames += 1;
                let outcome = pipeline.process(&frame);
                if outcome_tx.send(Some(outcome)).is_err() {
                    tracing::debug!("Decision loop gone, stopping capture");
                    break;
                }
            }
            Ok(None) => {
                tracing::info!("Vision source exhausted after {} frames", frames);
                break;
            }
            Err(e) => tracing::warn!("Capture failed: {}", e),
        }

        if !interval.is_zero() {
            tokio::select! {
                biased;
                changed = stop.changed() => {
                    if changed.is_err() {
                        break;
                    }
                }
                _ = tokio::time::sleep(interval) => {}
            }
        } else {
            tokio::task::yield_now().await;
        }
    }

    frames
}

async fn decision_loop<A: Actuator>(
    mut orchestrator: Orchestrator<A>,
    mut outcomes: watch::Receiver<Option<FusionOutcome>>,
    mut stop: watch::Receiver<bool>,
) -> RunSummary {
    let mut summary = RunSummary::default();

    loop {
        tokio::select! {
            biased;
            changed = stop.changed() => {
                if changed.is_err() || *stop.borrow() {
                    break;
                }
                continue;
            }
            changed = outcomes.changed() => {
                if changed.is_err() {
                    break;
                }
            }
        }

        let outcome = outcomes.borrow_and_update().clone();
        let Some(outcome) = outcome else {
            continue;
        };
        let report = orchestrator.run_cycle(&outcome).await;
        summary.absorb(&report);
    }

    tracing::info!(
        "Decision loop stopped after {} cycles ({} dispatched)",
        summary.cycles,
        summary.dispatched
    );
    summary
}
