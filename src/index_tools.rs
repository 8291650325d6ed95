//! Mixed-radix arithmetic between per-agent indices and flattened joint indices.
//!
//! A joint index over agents with cardinalities `n_0..n_k` is
//! `J = sum_i idx_i * step_i` with `step_i = n_{i+1} * ... * n_k`, so agent 0
//! is the most significant digit and the last agent varies fastest.

use crate::error::{check_index, MadpError, Result};
use crate::types::Index;

/// Step sizes for mixed-radix encoding; the last agent has step 1.
///
/// Callers that need overflow detection should validate the cardinalities
/// with [`joint_cardinality`] first; step sizes saturate instead of wrapping.
pub fn calculate_step_size(cardinalities: &[usize]) -> Vec<usize> {
    let mut steps = vec![1usize; cardinalities.len()];
    for i in (0..cardinalities.len().saturating_sub(1)).rev() {
        steps[i] = steps[i + 1].saturating_mul(cardinalities[i + 1]);
    }
    steps
}

/// Number of joint elements, failing with `IndexOverflow` if the product of
/// the cardinalities does not fit in an `Index`.
pub fn joint_cardinality(cardinalities: &[usize]) -> Result<usize> {
    cardinalities
        .iter()
        .try_fold(1usize, |acc, &n| acc.checked_mul(n))
        .ok_or_else(|| MadpError::IndexOverflow {
            cardinalities: cardinalities.to_vec(),
        })
}

/// Flattens per-agent indices into a joint index.
pub fn individual_to_joint(indices: &[Index], cardinalities: &[usize]) -> Result<Index> {
    if indices.len() != cardinalities.len() {
        return Err(MadpError::dimension_mismatch(
            format!("{} individual indices", cardinalities.len()),
            format!("{}", indices.len()),
        ));
    }
    joint_cardinality(cardinalities)?;
    for (agent, (&idx, &n)) in indices.iter().zip(cardinalities).enumerate() {
        check_index(&format!("individual index of agent {}", agent), idx, n)?;
    }
    let steps = calculate_step_size(cardinalities);
    Ok(individual_to_joint_with_steps(indices, &steps))
}

/// Unchecked flattening with precomputed step sizes.
pub fn individual_to_joint_with_steps(indices: &[Index], steps: &[usize]) -> Index {
    indices.iter().zip(steps).map(|(&idx, &step)| idx * step).sum()
}

/// Splits a joint index into per-agent indices, most significant agent first.
pub fn joint_to_individual(joint: Index, cardinalities: &[usize]) -> Result<Vec<Index>> {
    let total = joint_cardinality(cardinalities)?;
    check_index("joint index", joint, total)?;
    let steps = calculate_step_size(cardinalities);
    Ok(joint_to_individual_with_steps(joint, &steps))
}

/// Unchecked decomposition with precomputed step sizes.
pub fn joint_to_individual_with_steps(joint: Index, steps: &[usize]) -> Vec<Index> {
    let mut remainder = joint;
    steps
        .iter()
        .map(|&step| {
            let idx = remainder / step;
            remainder %= step;
            idx
        })
        .collect()
}

/// Odometer increment over all index combinations, last agent fastest.
///
/// Returns `true` when the indices wrapped past the last combination (they
/// are then all zero again).
pub fn increment(indices: &mut [Index], cardinalities: &[usize]) -> bool {
    for i in (0..indices.len()).rev() {
        indices[i] += 1;
        if indices[i] < cardinalities[i] {
            return false;
        }
        indices[i] = 0;
    }
    true
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_step_size() {
        assert_eq!(calculate_step_size(&[2, 3, 4]), vec![12, 4, 1]);
        assert_eq!(calculate_step_size(&[5]), vec![1]);
        assert!(calculate_step_size(&[]).is_empty());
    }

    #[test]
    fn test_round_trip_small() {
        let card = [2, 3, 4];
        for joint in 0..24 {
            let individual = joint_to_individual(joint, &card).unwrap();
            assert_eq!(individual_to_joint(&individual, &card).unwrap(), joint);
        }
        assert_eq!(joint_to_individual(23, &card).unwrap(), vec![1, 2, 3]);
        assert_eq!(individual_to_joint(&[1, 0, 2], &card).unwrap(), 14);
    }

    #[test]
    fn test_out_of_range() {
        assert!(joint_to_individual(24, &[2, 3, 4]).is_err());
        assert!(individual_to_joint(&[0, 3, 0], &[2, 3, 4]).is_err());
        assert!(individual_to_joint(&[0, 0], &[2, 3, 4]).is_err());
    }

    #[test]
    fn test_overflow_detected() {
        let card = [usize::MAX, 2];
        assert!(matches!(joint_cardinality(&card), Err(MadpError::IndexOverflow { .. })));
        assert!(matches!(
            individual_to_joint(&[0, 1], &card),
            Err(MadpError::IndexOverflow { .. })
        ));
        assert!(joint_to_individual(0, &card).is_err());
    }

    #[test]
    fn test_increment_enumerates_in_joint_order() {
        let card = [2, 3];
        let mut indices = vec![0, 0];
        let mut joint = 0;
        loop {
            assert_eq!(individual_to_joint(&indices, &card).unwrap(), joint);
            joint += 1;
            if increment(&mut indices, &card) {
                break;
            }
        }
        assert_eq!(joint, 6);
        assert_eq!(indices, vec![0, 0]);
    }
}
