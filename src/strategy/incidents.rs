//! Incident handler - per-incident response state machines
//!
//! ```text
//! Detected --> Responding --> Resolved   (signature absent for N cycles)
//!                        \--> TimedOut   (deadline passed)
//! ```
//!
//! Which hazard labels count as incidents, and how to respond to each, comes
//! from [`IncidentPolicy`]. Terminal incidents are reported once and dropped.
//!
//! A response only counts as sent once the actuator applied it (see
//! [`IncidentHandler::record_response`]); until then the same proposal, under
//! the same key, comes back every cycle.

use crate::core::config::IncidentPolicy;
use crate::core::types::{Cycle, DwellerId, IncidentId, RoomId, Vec2};
use crate::model::{GameState, HazardSighting};
use crate::strategy::proposal::{Action, ActionProposal, ProposalSource};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IncidentKind {
    Fire,
    Radroaches,
    MoleRats,
    Raiders,
    Deathclaws,
}

impl IncidentKind {
    /// Urgency of a response, used as proposal priority
    pub fn severity(&self) -> f32 {
        match self {
            IncidentKind::Deathclaws => 1.0,
            IncidentKind::Raiders => 0.9,
            IncidentKind::Fire => 0.8,
            IncidentKind::MoleRats => 0.7,
            IncidentKind::Radroaches => 0.6,
        }
    }
}

/// How to respond to an incident
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResponseAction {
    /// Drag the nearest healthy dwellers into the affected room
    DispatchDwellers { count: u8 },
    /// Tap the affected room so its occupants engage
    FocusRoom,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum IncidentState {
    Detected,
    Responding,
    Resolved,
    TimedOut,
}

impl IncidentState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, IncidentState::Resolved | IncidentState::TimedOut)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Incident {
    pub id: IncidentId,
    pub kind: IncidentKind,
    pub signature: String,
    pub location: Vec2,
    pub room: Option<RoomId>,
    /// Snapshot timestamp of the first sighting
    pub detected_at: u64,
    pub detected_cycle: Cycle,
    pub state: IncidentState,
    pub response: ResponseAction,
    pub responses_sent: u32,
    pub last_response_cycle: Option<Cycle>,
    /// Consecutive cycles without a sighting at this location
    pub absent_streak: u32,
}

impl Incident {
    /// Whether a sighting belongs to this incident
    pub fn matches(&self, sighting: &HazardSighting, kind: IncidentKind, tolerance: f32) -> bool {
        if kind != self.kind {
            return false;
        }
        match (self.room, sighting.room) {
            (Some(a), Some(b)) => a == b,
            _ => self.location.distance(&sighting.position) <= tolerance,
        }
    }
}

impl fmt::Display for Incident {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {:?} ({:?})", self.id, self.kind, self.state)?;
        if let Some(room) = self.room {
            write!(f, " in {}", room)?;
        }
        Ok(())
    }
}

/// What one tick of the handler produced
#[derive(Debug, Clone, Default)]
pub struct IncidentReport {
    pub proposals: Vec<ActionProposal>,
    pub resolved: Vec<Incident>,
    pub timed_out: Vec<Incident>,
}

#[derive(Debug, Clone)]
pub struct IncidentHandler {
    policy: IncidentPolicy,
    incidents: BTreeMap<IncidentId, Incident>,
    next_id: u32,
}

impl IncidentHandler {
    pub fn new(policy: IncidentPolicy) -> Self {
        Self {
            policy,
            incidents: BTreeMap::new(),
            next_id: 1,
        }
    }

    /// Incidents still being handled
    pub fn pending(&self) -> Vec<Incident> {
        self.incidents.values().cloned().collect()
    }

    pub fn get(&self, id: IncidentId) -> Option<&Incident> {
        self.incidents.get(&id)
    }

    pub fn policy(&self) -> &IncidentPolicy {
        &self.policy
    }

    /// Note an applied response; starts the cooldown window
    pub fn record_response(&mut self, id: IncidentId, cycle: Cycle) {
        if let Some(incident) = self.incidents.get_mut(&id) {
            incident.responses_sent += 1;
            incident.last_response_cycle = Some(cycle);
        }
    }

    /// Start tracking configured hazards not already covered by an incident
    pub fn detect(&mut self, state: &GameState, cycle: Cycle) -> Vec<IncidentId> {
        let tolerance = self.policy.location_tolerance;
        let mut detected = Vec::new();

        for sighting in &state.hazards {
            let Some(rule) = self.policy.rule_for(&sighting.signature) else {
                continue;
            };
            if self
                .incidents
                .values()
                .any(|i| i.matches(sighting, rule.kind, tolerance))
            {
                continue;
            }

            let id = IncidentId(self.next_id);
            self.next_id += 1;
            let incident = Incident {
                id,
                kind: rule.kind,
                signature: sighting.signature.clone(),
                location: sighting.position,
                room: sighting.room,
                detected_at: state.timestamp_ms,
                detected_cycle: cycle,
                state: IncidentState::Detected,
                response: rule.response,
                responses_sent: 0,
                last_response_cycle: None,
                absent_streak: 0,
            };
            tracing::info!("Detected {} at {:?}", incident, incident.location);
            self.incidents.insert(id, incident);
            detected.push(id);
        }

        detected
    }

    /// Detect new incidents, advance every tracked one, drop terminal ones
    pub fn tick(&mut self, state: &GameState, cycle: Cycle) -> IncidentReport {
        self.detect(state, cycle);

        let mut report = IncidentReport::default();
        for incident in self.incidents.values_mut() {
            if let Some(proposal) = advance(&self.policy, incident, state, cycle) {
                report.proposals.push(proposal);
            }
        }

        let finished: Vec<IncidentId> = self
            .incidents
            .values()
            .filter(|i| i.state.is_terminal())
            .map(|i| i.id)
            .collect();
        for id in finished {
            if let Some(incident) = self.incidents.remove(&id) {
                match incident.state {
                    IncidentState::TimedOut => report.timed_out.push(incident),
                    _ => report.resolved.push(incident),
                }
            }
        }

        report.proposals.sort_by(|a, b| b.priority.cmp(&a.priority));
        report
    }
}

/// Advance one incident by one cycle, returning a response if one is due
///
/// The proposal does not touch the cooldown; the caller reports applied
/// responses through [`IncidentHandler::record_response`].
pub fn advance(
    policy: &IncidentPolicy,
    incident: &mut Incident,
    state: &GameState,
    cycle: Cycle,
) -> Option<ActionProposal> {
    if incident.state.is_terminal() {
        return None;
    }

    let present = state.hazards.iter().any(|s| {
        policy
            .rule_for(&s.signature)
            .is_some_and(|rule| incident.matches(s, rule.kind, policy.location_tolerance))
    });
    if present {
        incident.absent_streak = 0;
    } else {
        incident.absent_streak += 1;
    }

    if incident.absent_streak >= policy.resolve_after_absent {
        incident.state = IncidentState::Resolved;
        tracing::info!(
            "Resolved {} after {} responses",
            incident.id,
            incident.responses_sent
        );
        return None;
    }

    if cycle.saturating_sub(incident.detected_cycle) >= policy.response_deadline_cycles {
        incident.state = IncidentState::TimedOut;
        tracing::warn!(
            "{} still active {} cycles after detection",
            incident.id,
            policy.response_deadline_cycles
        );
        return None;
    }

    if incident.state == IncidentState::Detected {
        incident.state = IncidentState::Responding;
    }

    let due = incident
        .last_response_cycle
        .map_or(true, |last| cycle.saturating_sub(last) >= policy.cooldown_cycles);
    if !due || !present {
        return None;
    }

    let dwellers = match incident.response {
        ResponseAction::DispatchDwellers { count } => {
            let responders = pick_responders(policy, incident, state, count as usize);
            if responders.is_empty() {
                tracing::debug!("No healthy responders for {}", incident.id);
                return None;
            }
            responders
        }
        ResponseAction::FocusRoom => Vec::new(),
    };

    Some(ActionProposal::new(
        Action::RespondToIncident {
            incident: incident.id,
            response: incident.response,
            room: incident.room,
            location: incident.location,
            dwellers,
        },
        incident.kind.severity(),
        format!("incident:{}:respond", incident.id.0),
        ProposalSource::Incident,
    ))
}

/// Nearest healthy, available dwellers outside the affected room (ties by id)
fn pick_responders(
    policy: &IncidentPolicy,
    incident: &Incident,
    state: &GameState,
    count: usize,
) -> Vec<DwellerId> {
    let mut candidates: Vec<(f32, DwellerId)> = state
        .dwellers
        .iter()
        .filter(|d| d.is_available() && d.health >= policy.min_responder_health)
        .filter(|d| incident.room.is_none() || d.current_room != incident.room)
        .map(|d| (d.position.distance(&incident.location), d.id))
        .collect();
    candidates.sort_by(|a, b| a.0.total_cmp(&b.0).then_with(|| a.1.cmp(&b.1)));
    candidates.into_iter().take(count).map(|(_, id)| id).collect()
}
