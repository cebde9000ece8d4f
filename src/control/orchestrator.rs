//! Decision orchestrator - one pass of the decision loop per snapshot
//!
//! Each cycle:
//! 1. Skips everything when the estimator did not trust the frame
//! 2. Confirms in-flight actions whose effect is visible, expires old ones
//! 3. Collects proposals from the incident, resource and assignment components
//! 4. Merges them (incidents, then resources, then assignments)
//! 5. Filters keys already in flight and duplicates within the batch
//! 6. Dispatches the rest with a bounded wait per call
//! 7. Publishes status

use crate::control::actuation::Actuator;
use crate::control::inflight::InFlightTracker;
use crate::control::status::StatusBoard;
use crate::core::config::{AutopilotConfig, OrchestratorConfig};
use crate::core::error::AutopilotError;
use crate::core::types::{Cycle, IncidentId};
use crate::estimator::FusionOutcome;
use crate::model::GameState;
use crate::strategy::{
    Action, ActionProposal, AssignmentOptimizer, IncidentHandler, ResourceManager,
};
use ahash::{AHashMap, AHashSet};
use std::sync::Arc;
use std::time::Duration;

/// What happened during one cycle
#[derive(Debug, Default)]
pub struct CycleReport {
    pub cycle: Cycle,
    /// Estimator cycle of the consumed snapshot
    pub state_cycle: Option<Cycle>,
    /// True when the snapshot was untrusted and nothing was evaluated
    pub skipped: bool,
    pub proposed: usize,
    /// Proposals dropped because their key was in flight or repeated
    pub filtered: usize,
    pub dispatched: Vec<String>,
    pub failed: Vec<String>,
    pub confirmed: Vec<String>,
    pub expired: Vec<String>,
    pub resolved: Vec<IncidentId>,
    pub errors: Vec<AutopilotError>,
}

#[derive(Debug, Clone, Copy)]
struct RetryEntry {
    attempts: u32,
    last_cycle: Cycle,
}

pub struct Orchestrator<A: Actuator> {
    config: OrchestratorConfig,
    resources: ResourceManager,
    assignment: AssignmentOptimizer,
    incidents: IncidentHandler,
    inflight: InFlightTracker,
    failures: AHashMap<String, RetryEntry>,
    actuator: A,
    status: StatusBoard,
    cycle: Cycle,
}

impl<A: Actuator> Orchestrator<A> {
    pub fn new(config: &AutopilotConfig, actuator: A, status: StatusBoard) -> Self {
        Self {
            config: config.orchestrator.clone(),
            resources: ResourceManager::new(config.resources.clone()),
            assignment: AssignmentOptimizer::new(config.assignment.clone()),
            incidents: IncidentHandler::new(config.incidents.clone()),
            inflight: InFlightTracker::new(),
            failures: AHashMap::new(),
            actuator,
            status,
            cycle: 0,
        }
    }

    pub fn cycle(&self) -> Cycle {
        self.cycle
    }

    pub fn actuator(&self) -> &A {
        &self.actuator
    }

    pub fn inflight(&self) -> &InFlightTracker {
        &self.inflight
    }

    pub fn incidents(&self) -> &IncidentHandler {
        &self.incidents
    }

    pub fn status(&self) -> &StatusBoard {
        &self.status
    }

    /// Run one decision cycle against the latest fusion outcome
    pub async fn run_cycle(&mut self, outcome: &FusionOutcome) -> CycleReport {
        self.cycle += 1;
        let cycle = self.cycle;
        let mut report = CycleReport {
            cycle,
            ..Default::default()
        };

        let state = match outcome {
            FusionOutcome::Published(state) => Arc::clone(state),
            FusionOutcome::LowConfidence { detected, expected } => {
                tracing::warn!(
                    "Cycle {}: low confidence frame ({}/{} anchors), not acting",
                    cycle,
                    detected,
                    expected
                );
                report.skipped = true;
                report.errors.push(AutopilotError::LowConfidenceState {
                    detected: *detected,
                    expected: *expected,
                });
                self.status.update_counters(|c| {
                    c.cycles += 1;
                    c.skipped += 1;
                });
                return report;
            }
        };
        report.state_cycle = Some(state.cycle);

        report.confirmed = self.inflight.confirm_effects(&state);
        report.expired = self.inflight.expire(cycle);
        let ttl = self.config.inflight_ttl_cycles;
        self.failures
            .retain(|_, entry| cycle.saturating_sub(entry.last_cycle) <= ttl);

        let incident_report = self.incidents.tick(&state, cycle);
        report.resolved = incident_report.resolved.iter().map(|i| i.id).collect();
        for incident in &incident_report.timed_out {
            report
                .errors
                .push(AutopilotError::IncidentTimeout(incident.to_string()));
        }

        let proposals = merge_proposals(vec![
            incident_report.proposals,
            self.resources.evaluate(&state),
            self.assignment
                .assign_around(&state, &self.inflight.pending_moves()),
        ]);
        report.proposed = proposals.len();

        let batch = self.filter(proposals);
        report.filtered = report.proposed - batch.len();

        for proposal in batch {
            self.dispatch(proposal, &state, &mut report).await;
        }

        tracing::debug!(
            "Cycle {}: {} proposed, {} filtered, {} dispatched, {} failed",
            cycle,
            report.proposed,
            report.filtered,
            report.dispatched.len(),
            report.failed.len()
        );

        self.status.publish(state, self.incidents.pending());
        let rejected = report
            .errors
            .iter()
            .filter(|e| matches!(e, AutopilotError::ActionRejected { .. }))
            .count() as u64;
        let dispatched = report.dispatched.len() as u64;
        let resolved = incident_report.resolved.len() as u64;
        let timed_out = incident_report.timed_out.len() as u64;
        self.status.update_counters(|c| {
            c.cycles += 1;
            c.dispatched += dispatched;
            c.rejected += rejected;
            c.resolved_incidents += resolved;
            c.timed_out_incidents += timed_out;
        });

        report
    }

    fn filter(&self, proposals: Vec<ActionProposal>) -> Vec<ActionProposal> {
        let mut seen = AHashSet::new();
        proposals
            .into_iter()
            .filter(|p| {
                if self.inflight.is_blocked(&p.idempotency_key) {
                    return false;
                }
                seen.insert(p.idempotency_key.clone())
            })
            .collect()
    }

    async fn dispatch(&mut self, proposal: ActionProposal, state: &GameState, report: &mut CycleReport) {
        let cycle = self.cycle;
        let key = proposal.idempotency_key;
        let wait = Duration::from_millis(self.config.actuation_timeout_ms);

        let failure = match tokio::time::timeout(wait, self.actuator.dispatch(&proposal.action)).await
        {
            Ok(result) if result.applied => None,
            Ok(result) => Some(result.error.unwrap_or_else(|| "not applied".to_string())),
            Err(_) => Some(format!(
                "no answer within {}ms",
                self.config.actuation_timeout_ms
            )),
        };

        let Some(reason) = failure else {
            // A response key stays blocked for the incident cooldown only
            let ttl = match &proposal.action {
                Action::RespondToIncident { incident, .. } => {
                    self.incidents.record_response(*incident, cycle);
                    self.incidents.policy().cooldown_cycles
                }
                _ => self.config.inflight_ttl_cycles,
            };
            self.inflight.record(&key, &proposal.action, state, cycle, ttl);
            self.failures.remove(&key);
            report.dispatched.push(key);
            return;
        };

        let entry = self.failures.entry(key.clone()).or_insert(RetryEntry {
            attempts: 0,
            last_cycle: cycle,
        });
        entry.attempts += 1;
        entry.last_cycle = cycle;

        if entry.attempts >= self.config.retry_cap {
            tracing::warn!(
                "Giving up on {} after {} attempts: {}",
                key,
                entry.attempts,
                reason
            );
            self.failures.remove(&key);
            self.inflight.abandon(
                &key,
                &proposal.action,
                cycle,
                self.config.inflight_ttl_cycles,
            );
            report.errors.push(AutopilotError::ActionRejected {
                key: key.clone(),
                reason,
            });
        } else {
            tracing::debug!("{} not applied ({}), will retry", key, reason);
        }
        report.failed.push(key);
    }
}

/// Concatenate component outputs in source precedence, keeping each
/// component's own order
pub fn merge_proposals(batches: Vec<Vec<ActionProposal>>) -> Vec<ActionProposal> {
    let mut merged: Vec<ActionProposal> = batches.into_iter().flatten().collect();
    merged.sort_by_key(|p| p.source);
    merged
}
