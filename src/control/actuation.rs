//! Actuation collaborator: performs taps and drags on the game

use crate::strategy::proposal::Action;
use serde::{Deserialize, Serialize};
use std::future::Future;

/// Outcome of a single dispatch
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActionResult {
    /// `false` means "try again on a later cycle"
    pub applied: bool,
    pub error: Option<String>,
}

impl ActionResult {
    pub fn applied() -> Self {
        Self {
            applied: true,
            error: None,
        }
    }

    pub fn rejected(reason: impl Into<String>) -> Self {
        Self {
            applied: false,
            error: Some(reason.into()),
        }
    }
}

/// Something that can carry out an [`Action`]
pub trait Actuator: Send + 'static {
    fn dispatch(&mut self, action: &Action) -> impl Future<Output = ActionResult> + Send;
}

/// Actuator that only logs; every action counts as applied
#[derive(Debug, Default)]
pub struct LoggingActuator {
    dispatched: u64,
}

impl LoggingActuator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn dispatched(&self) -> u64 {
        self.dispatched
    }
}

impl Actuator for LoggingActuator {
    fn dispatch(&mut self, action: &Action) -> impl Future<Output = ActionResult> + Send {
        self.dispatched += 1;
        match action {
            Action::Collect { room, resource, at } | Action::RushProduction { room, resource, at } => {
                tracing::info!("{} {} ({}) at ({:.0}, {:.0})", action.verb(), room, resource, at.x, at.y);
            }
            Action::AssignDweller { dweller, room, .. } => {
                tracing::info!("assign {} -> {}", dweller, room);
            }
            Action::Train { dweller, room, stat, .. } => {
                tracing::info!("train {} in {} ({})", dweller, room, stat.label());
            }
            Action::RespondToIncident {
                incident,
                response,
                dwellers,
                ..
            } => {
                tracing::info!("respond to {} with {:?} ({} dwellers)", incident, response, dwellers.len());
            }
        }
        async { ActionResult::applied() }
    }
}
