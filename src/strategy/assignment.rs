//! Dweller assignment optimizer
//!
//! Builds a dweller x room-slot score matrix and solves it as a maximum-weight
//! matching. Only idle dwellers and dwellers who are a poor fit for their
//! current production room take part; everyone else stays where they are.
//! Moves already applied but not yet visible ([`PendingMove`]) hold their
//! dweller and their seat.

use crate::core::config::AssignmentConfig;
use crate::core::types::{DwellerId, RoomId, SpecialStat};
use crate::model::{Dweller, GameState, Room};
use crate::strategy::matching::max_weight_matching;
use crate::strategy::proposal::{Action, ActionProposal, ProposalSource};
use std::collections::BTreeMap;

/// Fixed-point scale for pair scores fed to the solver
const SCORE_SCALE: f32 = 1000.0;

/// Training proposals rank below any real reassignment of the same cycle
const TRAIN_PRIORITY: f32 = 0.1;

/// An applied move or training order the snapshot does not reflect yet
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct PendingMove {
    pub dweller: DwellerId,
    pub room: RoomId,
}

fn arrivals(pending: &[PendingMove], room: RoomId) -> usize {
    pending.iter().filter(|m| m.room == room).count()
}

/// One column of the matrix
#[derive(Debug, Clone, Copy)]
struct Slot<'a> {
    room: &'a Room,
    /// Slot held by this dweller row; only that row may take it
    reserved_for: Option<usize>,
}

#[derive(Debug, Clone)]
pub struct AssignmentOptimizer {
    config: AssignmentConfig,
}

impl AssignmentOptimizer {
    pub fn new(config: AssignmentConfig) -> Self {
        Self { config }
    }

    /// Value of placing `dweller` in `room`
    ///
    /// `None` when the room has no dominant stat or the dweller is busy.
    pub fn score(&self, dweller: &Dweller, room: &Room) -> Option<f32> {
        if !dweller.is_available() {
            return None;
        }
        let stat = room.room_type.dominant_stat()?;
        let base = self.config.stat_weight * dweller.special.get(stat) as f32
            + self.config.level_weight * dweller.level as f32;
        Some(self.config.room_weight(room.room_type) * base)
    }

    /// Whether the dweller sits in a production room they are poorly suited for
    pub fn is_misfit(&self, dweller: &Dweller, state: &GameState) -> bool {
        dweller
            .current_room
            .and_then(|id| state.room(id))
            .and_then(|room| room.room_type.dominant_stat())
            .is_some_and(|stat| dweller.special.get(stat) < self.config.misfit_stat)
    }

    /// Stat an idle dweller should train, if their weakest one is below the bar
    pub fn should_train(&self, dweller: &Dweller) -> Option<SpecialStat> {
        if !dweller.is_available() || dweller.current_room.is_some() {
            return None;
        }
        let (stat, value) = dweller.special.weakest();
        (value < self.config.train_below_stat).then_some(stat)
    }

    /// Reassignment proposals followed by training proposals
    pub fn assign(&self, state: &GameState) -> Vec<ActionProposal> {
        self.assign_around(state, &[])
    }

    /// Like [`assign`](Self::assign), leaving dwellers with a pending move
    /// alone and counting their destination seats as taken
    pub fn assign_around(&self, state: &GameState, pending: &[PendingMove]) -> Vec<ActionProposal> {
        let moving = |d: &Dweller| pending.iter().any(|m| m.dweller == d.id);
        let candidates: Vec<&Dweller> = state
            .dwellers
            .iter()
            .filter(|d| d.is_available() && !moving(*d))
            .filter(|d| d.current_room.is_none() || self.is_misfit(d, state))
            .collect();

        let slots = self.build_slots(state, &candidates, pending);
        let weights = self.weight_matrix(&candidates, &slots);
        let matching = solve_preferring_low_rows(&weights);

        let mut moves: Vec<(f32, &Dweller, &Room)> = Vec::new();
        for (row, col) in matching.iter().enumerate() {
            let Some(col) = col else { continue };
            let dweller = candidates[row];
            let room = slots[*col].room;
            if dweller.current_room == Some(room.id) {
                continue;
            }
            if let Some(score) = self.score(dweller, room) {
                moves.push((score, dweller, room));
            }
        }
        moves.sort_by(|a, b| b.0.total_cmp(&a.0).then_with(|| a.1.id.cmp(&b.1.id)));

        let mut proposals: Vec<ActionProposal> = moves
            .iter()
            .map(|(score, dweller, room)| {
                ActionProposal::new(
                    Action::AssignDweller {
                        dweller: dweller.id,
                        room: room.id,
                        from: dweller.position,
                        to: room.position,
                    },
                    *score,
                    format!("assign:{}:{}", dweller.id, room.id),
                    ProposalSource::Assignment,
                )
            })
            .collect();

        let matched: Vec<_> = moves.iter().map(|(_, d, _)| d.id).collect();
        proposals.extend(self.training_proposals(state, pending, |d| {
            !matched.contains(&d.id) && !moving(d)
        }));

        if !proposals.is_empty() {
            tracing::debug!(
                "Assignment: {} candidates, {} slots, {} proposals",
                candidates.len(),
                slots.len(),
                proposals.len()
            );
        }
        proposals
    }

    fn build_slots<'a>(
        &self,
        state: &'a GameState,
        candidates: &[&Dweller],
        pending: &[PendingMove],
    ) -> Vec<Slot<'a>> {
        let mut slots = Vec::new();
        for room in &state.rooms {
            if room.room_type.dominant_stat().is_none() {
                continue;
            }
            let open = room.open_slots().saturating_sub(arrivals(pending, room.id));
            for _ in 0..open {
                slots.push(Slot {
                    room,
                    reserved_for: None,
                });
            }
            for (row, dweller) in candidates.iter().enumerate() {
                if dweller.current_room == Some(room.id) {
                    slots.push(Slot {
                        room,
                        reserved_for: Some(row),
                    });
                }
            }
        }
        slots
    }

    /// Fixed-point pair scores; `None` where the pair is not allowed
    fn weight_matrix(&self, candidates: &[&Dweller], slots: &[Slot<'_>]) -> Vec<Vec<Option<i64>>> {
        candidates
            .iter()
            .enumerate()
            .map(|(row, dweller)| {
                slots
                    .iter()
                    .map(|slot| {
                        if slot.reserved_for.is_some_and(|r| r != row) {
                            return None;
                        }
                        let score = self.score(dweller, slot.room)?;
                        let fixed = (score * SCORE_SCALE).round() as i64;
                        (fixed > 0).then_some(fixed)
                    })
                    .collect()
            })
            .collect()
    }

    fn training_proposals(
        &self,
        state: &GameState,
        pending: &[PendingMove],
        eligible: impl Fn(&Dweller) -> bool,
    ) -> Vec<ActionProposal> {
        let mut open: BTreeMap<RoomId, usize> = state
            .rooms
            .iter()
            .filter(|r| r.room_type.trains().is_some())
            .map(|r| (r.id, r.open_slots().saturating_sub(arrivals(pending, r.id))))
            .collect();

        let mut proposals = Vec::new();
        for dweller in state.dwellers.iter().filter(|d| eligible(d)) {
            let Some(stat) = self.should_train(dweller) else {
                continue;
            };
            let room = state.rooms.iter().find(|r| {
                r.room_type.trains() == Some(stat) && open.get(&r.id).is_some_and(|n| *n > 0)
            });
            let Some(room) = room else { continue };
            if let Some(n) = open.get_mut(&room.id) {
                *n -= 1;
            }
            proposals.push(ActionProposal::new(
                Action::Train {
                    dweller: dweller.id,
                    room: room.id,
                    stat,
                    from: dweller.position,
                    to: room.position,
                },
                TRAIN_PRIORITY,
                format!("train:{}:{}", dweller.id, room.id),
                ProposalSource::Assignment,
            ));
        }
        proposals
    }
}

/// Maximum-weight matching that, among equally good ones, seats the lowest
/// rows
///
/// Rows are settled in order. A row is kept when some optimal matching seats
/// it together with every row kept before it, otherwise it is dropped. Each
/// trial scales the weights so the total score always dominates, then adds 1
/// per seated row of interest.
fn solve_preferring_low_rows(weights: &[Vec<Option<i64>>]) -> Vec<Option<usize>> {
    let rows = weights.len();
    let scale = rows as i64 + 2;
    let mut kept = vec![false; rows];
    let mut dropped = vec![false; rows];
    let mut best = vec![None; rows];

    for row in 0..rows {
        if weights[row].iter().all(Option::is_none) {
            dropped[row] = true;
            continue;
        }
        let trial: Vec<Vec<Option<i64>>> = weights
            .iter()
            .enumerate()
            .map(|(r, cells)| {
                if dropped[r] {
                    return vec![None; cells.len()];
                }
                let bonus = i64::from(kept[r] || r == row);
                cells.iter().map(|c| c.map(|w| w * scale + bonus)).collect()
            })
            .collect();
        let matching = max_weight_matching(&trial);

        let wanted = kept.iter().filter(|k| **k).count() + 1;
        let seated = (0..=row)
            .filter(|r| (kept[*r] || *r == row) && matching[*r].is_some())
            .count();
        if seated == wanted {
            kept[row] = true;
            best = matching;
        } else {
            dropped[row] = true;
        }
    }
    best
}
