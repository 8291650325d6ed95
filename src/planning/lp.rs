//! Witness programs for exact pruning.
//!
//! For a candidate `w` and competitors `u_1..u_k` the program
//! `max δ  s.t.  (w - u_j)·b >= δ for all j,  Σ b = 1,  b >= 0`
//! finds the belief where `w` beats its best competitor by the largest
//! margin. Solved with `minilp`.

use minilp::{ComparisonOp, LinearExpr, OptimizationDirection, Problem, Variable};
use ndarray::{Array1, ArrayView1};

use crate::error::{MadpError, Result};

#[derive(Clone, Debug)]
pub struct Witness {
    /// `min_j (w - u_j)·b` at `belief`; positive when `w` is strictly best there
    pub margin: f64,
    pub belief: Array1<f64>,
}

pub fn max_margin(candidate: ArrayView1<'_, f64>, others: &[ArrayView1<'_, f64>]) -> Result<Witness> {
    let size = candidate.len();
    if size == 0 || others.is_empty() {
        return Err(MadpError::invalid_parameter(
            "witness program",
            "needs a non-empty candidate and at least one competitor",
        ));
    }
    if let Some(other) = others.iter().find(|u| u.len() != size) {
        return Err(MadpError::dimension_mismatch(
            format!("vectors over {} states", size),
            format!("vector over {} states", other.len()),
        ));
    }

    let mut problem = Problem::new(OptimizationDirection::Maximize);
    let belief: Vec<Variable> = (0..size).map(|_| problem.add_var(0.0, (0.0, 1.0))).collect();
    let delta = problem.add_var(1.0, (f64::NEG_INFINITY, f64::INFINITY));

    for other in others {
        let mut lhs = LinearExpr::empty();
        for (s, &var) in belief.iter().enumerate() {
            lhs.add(var, candidate[s] - other[s]);
        }
        lhs.add(delta, -1.0);
        problem.add_constraint(lhs, ComparisonOp::Ge, 0.0);
    }
    let mut mass = LinearExpr::empty();
    for &var in &belief {
        mass.add(var, 1.0);
    }
    problem.add_constraint(mass, ComparisonOp::Eq, 1.0);

    let solution = problem.solve()?;
    Ok(Witness {
        margin: solution[delta],
        belief: belief.iter().map(|&var| solution[var].max(0.0)).collect(),
    })
}
