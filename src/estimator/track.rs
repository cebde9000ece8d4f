//! Tracked entities and observation-to-track association

use crate::core::types::Vec2;

/// Lifecycle of a track relative to the staleness policy
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Visibility {
    /// Seen recently enough to publish
    Live,
    /// Hidden from snapshots but kept for re-matching
    Stale,
    /// Past the retention window; drop it
    Expired,
}

/// An entity the estimator remembers across cycles
#[derive(Debug, Clone, PartialEq)]
pub struct Track<T> {
    pub id: u32,
    pub data: T,
    pub position: Vec2,
    /// Consecutive trusted cycles without a matching observation
    pub misses: u32,
}

impl<T> Track<T> {
    pub fn new(id: u32, data: T, position: Vec2) -> Self {
        Self {
            id,
            data,
            position,
            misses: 0,
        }
    }

    pub fn visibility(&self, stale_after: u32, forget_after: u32) -> Visibility {
        if self.misses <= stale_after {
            Visibility::Live
        } else if self.misses <= stale_after + forget_after {
            Visibility::Stale
        } else {
            Visibility::Expired
        }
    }
}

/// Exponential smoothing: `alpha * observed + (1 - alpha) * previous`
pub fn smooth(previous: f32, observed: f32, alpha: f32) -> f32 {
    alpha * observed + (1.0 - alpha) * previous
}

/// Assign observations to existing tracks
///
/// Every compatible (observation, track) pair is a candidate; candidates are
/// taken in ascending distance order (ties by observation index, then track
/// id), each observation and track used at most once. `compatible` decides
/// whether a pair is plausible at all, given its distance.
///
/// Returns, per observation, the id of the matched track.
pub fn associate<'a, T: 'a>(
    observed: &[Vec2],
    tracks: impl Iterator<Item = &'a Track<T>>,
    compatible: impl Fn(usize, &Track<T>, f32) -> bool,
) -> Vec<Option<u32>> {
    let mut candidates: Vec<(f32, usize, u32)> = Vec::new();
    let mut track_ids = Vec::new();

    for track in tracks {
        track_ids.push(track.id);
        for (i, pos) in observed.iter().enumerate() {
            let distance = pos.distance(&track.position);
            if compatible(i, track, distance) {
                candidates.push((distance, i, track.id));
            }
        }
    }

    candidates.sort_by(|a, b| {
        a.0.total_cmp(&b.0)
            .then_with(|| a.1.cmp(&b.1))
            .then_with(|| a.2.cmp(&b.2))
    });

    let mut matched: Vec<Option<u32>> = vec![None; observed.len()];
    let mut used_tracks: Vec<u32> = Vec::with_capacity(track_ids.len());
    for (_, obs_idx, track_id) in candidates {
        if matched[obs_idx].is_some() || used_tracks.contains(&track_id) {
            continue;
        }
        matched[obs_idx] = Some(track_id);
        used_tracks.push(track_id);
    }
    matched
}
