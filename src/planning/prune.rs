use ndarray::{Array1, ArrayView1};
use std::cmp::Ordering;

use crate::belief::BeliefSet;
use crate::error::{MadpError, Result};
use crate::planning::config::PruneStrength;
use crate::planning::lp;
use crate::planning::vector_set::VectorSet;
use crate::types::{Index, REWARD_PRECISION};

/// Indices of the vectors that survive pruning at `strength`, in their
/// original order. `beliefs` is required for point-based pruning.
pub fn prune(set: &VectorSet, strength: PruneStrength, beliefs: Option<&BeliefSet>) -> Result<Vec<Index>> {
    let unique = prune_duplicates(set);
    match strength {
        PruneStrength::Duplicates => Ok(unique),
        PruneStrength::PointBased => {
            let beliefs = beliefs.ok_or_else(|| {
                MadpError::invalid_parameter("beliefs", "point-based pruning needs a belief set")
            })?;
            let kept = prune_point_based(&set.select(&unique), beliefs)?;
            Ok(kept.into_iter().map(|i| unique[i]).collect())
        }
        PruneStrength::Exact => {
            let undominated = prune_pointwise_dominated(&set.select(&unique));
            let candidates: Vec<Index> = undominated.iter().map(|&i| unique[i]).collect();
            let kept = prune_exact(&set.select(&candidates))?;
            Ok(kept.into_iter().map(|i| candidates[i]).collect())
        }
    }
}

/// Applies [`prune`] and returns the surviving rows.
pub fn pruned(set: &VectorSet, strength: PruneStrength, beliefs: Option<&BeliefSet>) -> Result<VectorSet> {
    Ok(set.select(&prune(set, strength, beliefs)?))
}

fn approx_equal(a: ArrayView1<'_, f64>, b: ArrayView1<'_, f64>) -> bool {
    a.iter().zip(b.iter()).all(|(x, y)| (x - y).abs() <= REWARD_PRECISION)
}

/// Keeps the first of every group of vectors equal within
/// `REWARD_PRECISION` in every coordinate.
pub fn prune_duplicates(set: &VectorSet) -> Vec<Index> {
    let mut kept: Vec<Index> = Vec::new();
    for i in 0..set.nr_vectors() {
        if !kept.iter().any(|&k| approx_equal(set.row(k), set.row(i))) {
            kept.push(i);
        }
    }
    kept
}

/// Drops every vector another remaining vector beats or matches in each
/// coordinate. Expects duplicates to be gone already.
pub fn prune_pointwise_dominated(set: &VectorSet) -> Vec<Index> {
    let n = set.nr_vectors();
    let mut alive = vec![true; n];
    for i in 0..n {
        let f = set.row(i);
        let dominated = (0..n).any(|j| {
            j != i
                && alive[j]
                && set
                    .row(j)
                    .iter()
                    .zip(f.iter())
                    .all(|(g, fi)| *g >= fi - REWARD_PRECISION)
        });
        if dominated {
            alive[i] = false;
        }
    }
    (0..n).filter(|&i| alive[i]).collect()
}

/// Keeps, for each belief, the first vector with the highest value there.
pub fn prune_point_based(set: &VectorSet, beliefs: &BeliefSet) -> Result<Vec<Index>> {
    if beliefs.is_empty() {
        return Err(MadpError::invalid_parameter("beliefs", "belief set is empty"));
    }
    let mut keep = vec![false; set.nr_vectors()];
    for belief in beliefs {
        if belief.values().len() != set.size() {
            return Err(MadpError::dimension_mismatch(
                format!("beliefs over {} states", set.size()),
                format!("belief over {} states", belief.values().len()),
            ));
        }
        if let Some((best, _)) = set.best_at(belief.values()) {
            keep[best] = true;
        }
    }
    Ok((0..set.nr_vectors()).filter(|&i| keep[i]).collect())
}

/// Lark's filter: repeatedly looks for a belief at which the next candidate
/// beats every vector kept so far, and moves the best candidate at that
/// belief into the kept set. Candidates without such a witness are dropped.
pub fn prune_exact(set: &VectorSet) -> Result<Vec<Index>> {
    let size = set.size();
    let mut frontier: Vec<Index> = (0..set.nr_vectors()).collect();
    let mut kept: Vec<Index> = Vec::new();
    let mut nr_programs = 0usize;

    while let Some(&candidate) = frontier.first() {
        let witness = if kept.is_empty() {
            let mut corner = Array1::zeros(size);
            corner[0] = 1.0;
            Some(corner)
        } else {
            nr_programs += 1;
            find_witness(set, candidate, &kept)?
        };
        match witness {
            Some(belief) => {
                let position = best_at_witness(set, &frontier, &belief);
                kept.push(frontier.remove(position));
            }
            None => {
                frontier.remove(0);
            }
        }
    }
    log::trace!(
        "exact prune kept {} of {} vectors after {} linear programs",
        kept.len(),
        set.nr_vectors(),
        nr_programs
    );
    kept.sort_unstable();
    Ok(kept)
}

/// Position in `frontier` of the best vector at `belief`; vectors within
/// `REWARD_PRECISION` of the best are compared lexicographically.
fn best_at_witness(set: &VectorSet, frontier: &[Index], belief: &Array1<f64>) -> usize {
    let values: Vec<f64> = frontier.iter().map(|&i| set.row(i).dot(belief)).collect();
    let max = values.iter().cloned().fold(f64::NEG_INFINITY, f64::max);
    let mut best: Option<usize> = None;
    for (position, &v) in values.iter().enumerate() {
        if v < max - REWARD_PRECISION {
            continue;
        }
        best = match best {
            None => Some(position),
            Some(current) => {
                if lexicographic(set.row(frontier[position]), set.row(frontier[current])) == Ordering::Greater {
                    Some(position)
                } else {
                    Some(current)
                }
            }
        };
    }
    best.unwrap_or(0)
}

fn lexicographic(a: ArrayView1<'_, f64>, b: ArrayView1<'_, f64>) -> Ordering {
    for (x, y) in a.iter().zip(b.iter()) {
        if (x - y).abs() > REWARD_PRECISION {
            return x.partial_cmp(y).unwrap_or(Ordering::Equal);
        }
    }
    Ordering::Equal
}

/// Belief at which `candidate` exceeds every vector in `others` by more than
/// `REWARD_PRECISION`, if one exists.
fn find_witness(set: &VectorSet, candidate: Index, others: &[Index]) -> Result<Option<Array1<f64>>> {
    let competitors: Vec<_> = others.iter().map(|&u| set.row(u)).collect();
    let witness = lp::max_margin(set.row(candidate), &competitors)?;
    Ok((witness.margin > REWARD_PRECISION).then_some(witness.belief))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::belief::Belief;
    use ndarray::array;

    fn max_value(set: &VectorSet, b: &Array1<f64>) -> f64 {
        set.best_at(b).map_or(f64::NEG_INFINITY, |(_, v)| v)
    }

    #[test]
    fn test_duplicates_keep_first() {
        let set = VectorSet::new(array![[1.0, 2.0], [3.0, 4.0], [1.0, 2.0 + 1e-12], [3.0, 4.0]]);
        assert_eq!(prune_duplicates(&set), vec![0, 1]);
        assert_eq!(prune(&set, PruneStrength::Duplicates, None).unwrap(), vec![0, 1]);
    }

    #[test]
    fn test_pointwise_dominance() {
        let set = VectorSet::new(array![[0.0, 0.0], [1.0, 1.0], [2.0, -1.0]]);
        assert_eq!(prune_pointwise_dominated(&set), vec![1, 2]);
    }

    #[test]
    fn test_exact_drops_vector_under_the_upper_surface() {
        // The middle vector is below the max of the two corners everywhere.
        let set = VectorSet::new(array![[1.0, 0.0], [0.4, 0.4], [0.0, 1.0], [0.6, 0.6]]);
        let kept = prune(&set, PruneStrength::Exact, None).unwrap();
        assert_eq!(kept, vec![0, 2, 3]);

        let without_peak = VectorSet::new(array![[1.0, 0.0], [0.4, 0.4], [0.0, 1.0]]);
        assert_eq!(prune(&without_peak, PruneStrength::Exact, None).unwrap(), vec![0, 2]);
    }

    #[test]
    fn test_exact_three_states() {
        let set = VectorSet::new(array![
            [1.0, 0.0, 0.0],
            [0.0, 1.0, 0.0],
            [0.0, 0.0, 1.0],
            [0.3, 0.3, 0.3],
            [0.5, 0.5, 0.5],
        ]);
        assert_eq!(prune(&set, PruneStrength::Exact, None).unwrap(), vec![0, 1, 2, 4]);
    }

    #[test]
    fn test_single_state_keeps_the_max() {
        let set = VectorSet::new(array![[1.0], [3.0], [2.0]]);
        assert_eq!(prune(&set, PruneStrength::Exact, None).unwrap(), vec![1]);
    }

    #[test]
    fn test_exact_prune_preserves_values_and_is_idempotent() {
        let set = VectorSet::new(array![
            [3.0, -1.0, 0.5],
            [0.0, 2.0, 0.0],
            [1.0, 1.0, 1.0],
            [-2.0, 0.0, 3.0],
            [0.9, 0.9, 0.9],
            [2.0, 1.5, -3.0],
        ]);
        let once = pruned(&set, PruneStrength::Exact, None).unwrap();
        assert!(once.nr_vectors() < set.nr_vectors());
        for b in [
            array![1.0, 0.0, 0.0],
            array![0.2, 0.3, 0.5],
            array![1.0 / 3.0, 1.0 / 3.0, 1.0 / 3.0],
            array![0.0, 0.6, 0.4],
        ] {
            assert!((max_value(&set, &b) - max_value(&once, &b)).abs() < 1e-9);
        }
        let twice = pruned(&once, PruneStrength::Exact, None).unwrap();
        assert_eq!(once, twice);
    }

    #[test]
    fn test_point_based() {
        let set = VectorSet::new(array![[1.0, 0.0], [0.6, 0.6], [0.0, 1.0]]);
        let beliefs = BeliefSet::new(vec![Belief::uniform(2)]);
        assert_eq!(prune(&set, PruneStrength::PointBased, Some(&beliefs)).unwrap(), vec![1]);
        assert!(prune(&set, PruneStrength::PointBased, None).is_err());
        assert!(prune_point_based(&set, &BeliefSet::default()).is_err());
    }

    #[test]
    fn test_empty_set() {
        let set = VectorSet::zeros(0, 3);
        assert!(prune(&set, PruneStrength::Exact, None).unwrap().is_empty());
    }
}
