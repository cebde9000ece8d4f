//! Strategy components: each turns a `GameState` into ranked proposals

pub mod assignment;
pub mod incidents;
pub mod matching;
pub mod proposal;
pub mod resources;

pub use assignment::{AssignmentOptimizer, PendingMove};
pub use incidents::{
    Incident, IncidentHandler, IncidentKind, IncidentReport, IncidentState, ResponseAction,
};
pub use matching::max_weight_matching;
pub use proposal::{Action, ActionProposal, ProposalSource};
pub use resources::{ResourceDeficit, ResourceManager};
