//! Maximum-weight bipartite matching (Hungarian algorithm)
//!
//! Rows and columns need not be balanced; the matrix is padded to square with
//! zero-weight dummy cells. Scores are integers so the solver is exact and
//! its result does not depend on float rounding.

/// Large enough to dominate any reduced cost, small enough not to overflow
const INF: i64 = i64::MAX / 4;

/// Solve a maximum-weight matching
///
/// `weights[row][col]` is `None` for forbidden pairs. Returns, for each row,
/// the column it is matched to. Pairs with non-positive weight are never
/// returned, so a row may stay unmatched even when a column is free.
pub fn max_weight_matching(weights: &[Vec<Option<i64>>]) -> Vec<Option<usize>> {
    let rows = weights.len();
    let cols = weights.iter().map(|r| r.len()).max().unwrap_or(0);
    let n = rows.max(cols);
    let mut result = vec![None; rows];
    if rows == 0 || cols == 0 {
        return result;
    }

    let weight = |i: usize, j: usize| -> Option<i64> {
        weights.get(i).and_then(|r| r.get(j)).copied().flatten().filter(|w| *w > 0)
    };
    // Minimisation over negated weights; forbidden and padding cells cost 0
    let cost = |i: usize, j: usize| -> i64 { weight(i, j).map(|w| -w).unwrap_or(0) };

    // Potentials and matching, 1-based with index 0 as the virtual root
    let mut u = vec![0i64; n + 1];
    let mut v = vec![0i64; n + 1];
    let mut p = vec![0usize; n + 1];
    let mut way = vec![0usize; n + 1];

    for i in 1..=n {
        p[0] = i;
        let mut j0 = 0;
        let mut minv = vec![INF; n + 1];
        let mut used = vec![false; n + 1];

        loop {
            used[j0] = true;
            let i0 = p[j0];
            let mut delta = INF;
            let mut j1 = 0;
            for j in 1..=n {
                if used[j] {
                    continue;
                }
                let cur = cost(i0 - 1, j - 1) - u[i0] - v[j];
                if cur < minv[j] {
                    minv[j] = cur;
                    way[j] = j0;
                }
                if minv[j] < delta {
                    delta = minv[j];
                    j1 = j;
                }
            }
            for j in 0..=n {
                if used[j] {
                    u[p[j]] += delta;
                    v[j] -= delta;
                } else {
                    minv[j] -= delta;
                }
            }
            j0 = j1;
            if p[j0] == 0 {
                break;
            }
        }

        // Augment along the alternating path
        loop {
            let j1 = way[j0];
            p[j0] = p[j1];
            j0 = j1;
            if j0 == 0 {
                break;
            }
        }
    }

    for j in 1..=n {
        let i = p[j];
        if i == 0 || i > rows || j > cols {
            continue;
        }
        if weight(i - 1, j - 1).is_some() {
            result[i - 1] = Some(j - 1);
        }
    }
    result
}

/// Sum of the weights of a matching produced by [`max_weight_matching`]
pub fn matching_weight(weights: &[Vec<Option<i64>>], matching: &[Option<usize>]) -> i64 {
    matching
        .iter()
        .enumerate()
        .filter_map(|(i, col)| weights[i].get((*col)?).copied().flatten())
        .sum()
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    /// Each row in turn takes its best remaining column
    fn greedy(weights: &[Vec<Option<i64>>]) -> Vec<Option<usize>> {
        let mut taken = Vec::new();
        weights
            .iter()
            .map(|row| {
                let best = row
                    .iter()
                    .enumerate()
                    .filter(|(j, w)| !taken.contains(j) && w.is_some_and(|w| w > 0))
                    .max_by_key(|(j, w)| (w.unwrap_or(0), std::cmp::Reverse(*j)))
                    .map(|(j, _)| j);
                if let Some(j) = best {
                    taken.push(j);
                }
                best
            })
            .collect()
    }

    fn brute_force(weights: &[Vec<Option<i64>>], row: usize, used: &mut Vec<bool>) -> i64 {
        if row == weights.len() {
            return 0;
        }
        let mut best = brute_force(weights, row + 1, used);
        for (j, w) in weights[row].iter().enumerate() {
            if let Some(w) = w.filter(|w| *w > 0) {
                if !used[j] {
                    used[j] = true;
                    best = best.max(w + brute_force(weights, row + 1, used));
                    used[j] = false;
                }
            }
        }
        best
    }

    #[test]
    fn test_beats_greedy_on_crossing_preferences() {
        // Row 0 grabs column 0 greedily, leaving row 1 a poor column
        let weights = vec![vec![Some(120), Some(90)], vec![Some(72), Some(10)]];
        let matching = max_weight_matching(&weights);
        assert_eq!(matching, vec![Some(1), Some(0)]);
        assert_eq!(matching_weight(&weights, &matching), 162);
        assert_eq!(matching_weight(&weights, &greedy(&weights)), 130);
    }

    #[test]
    fn test_rectangular_and_forbidden() {
        let weights = vec![
            vec![None, Some(5), Some(1)],
            vec![None, None, None],
            vec![Some(3), Some(4), None],
        ];
        let matching = max_weight_matching(&weights);
        assert_eq!(matching, vec![Some(1), None, Some(0)]);

        let wide = vec![vec![Some(1), Some(2), Some(3), Some(4)]];
        assert_eq!(max_weight_matching(&wide), vec![Some(3)]);

        let tall = vec![vec![Some(2)], vec![Some(7)], vec![Some(3)]];
        assert_eq!(max_weight_matching(&tall), vec![None, Some(0), None]);
    }

    #[test]
    fn test_empty_inputs() {
        assert!(max_weight_matching(&[]).is_empty());
        assert_eq!(max_weight_matching(&[vec![], vec![]]), vec![None, None]);
    }

    proptest! {
        #[test]
        fn prop_optimal_and_at_least_greedy(
            weights in prop::collection::vec(
                prop::collection::vec(prop::option::weighted(0.8, 0i64..1000), 4),
                0..5,
            )
        ) {
            let matching = max_weight_matching(&weights);
            let total = matching_weight(&weights, &matching);

            let mut used = vec![false; 4];
            prop_assert_eq!(total, brute_force(&weights, 0, &mut used));
            prop_assert!(total >= matching_weight(&weights, &greedy(&weights)));

            let mut cols: Vec<usize> = matching.iter().flatten().copied().collect();
            let before = cols.len();
            cols.sort_unstable();
            cols.dedup();
            prop_assert_eq!(cols.len(), before);
        }
    }
}
