use ndarray::Array1;
use serde::{Serialize, Deserialize};
use std::fs::File;
use std::io::{BufRead, BufReader, BufWriter, Read, Write};

use crate::belief::BeliefInterface;
use crate::error::{MadpError, Result};
use crate::types::Index;

/// A linear piece of a value function: `V(b) = Σ_s b(s) · values[s]` when
/// this vector is maximal at `b`.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct AlphaVector {
    pub values: Array1<f64>,
    /// Joint action taken first when following this vector
    pub action: Index,
    /// Per joint observation, index of the successor vector in the previous
    /// value function. Empty when unknown.
    pub branches: Vec<Index>,
}

impl AlphaVector {
    pub fn new(values: Array1<f64>, action: Index) -> Self {
        AlphaVector {
            values,
            action,
            branches: Vec::new(),
        }
    }

    pub fn with_branches(values: Array1<f64>, action: Index, branches: Vec<Index>) -> Self {
        AlphaVector { values, action, branches }
    }

    pub fn size(&self) -> usize {
        self.values.len()
    }

    pub fn value_at(&self, belief: &dyn BeliefInterface) -> f64 {
        belief.inner_product(&self.values)
    }
}

pub type ValueFunction = Vec<AlphaVector>;

/// `max_α α · b`, or `-∞` for an empty value function.
pub fn value_at(vf: &[AlphaVector], belief: &dyn BeliefInterface) -> f64 {
    vf.iter()
        .map(|alpha| alpha.value_at(belief))
        .fold(f64::NEG_INFINITY, f64::max)
}

/// Index of the maximising vector; ties go to the lowest index.
pub fn best_vector(vf: &[AlphaVector], belief: &dyn BeliefInterface) -> Option<Index> {
    let mut best: Option<(Index, f64)> = None;
    for (i, alpha) in vf.iter().enumerate() {
        let v = alpha.value_at(belief);
        if best.map_or(true, |(_, b)| v > b) {
            best = Some((i, v));
        }
    }
    best.map(|(i, _)| i)
}

/// Writes one line per vector: the action index followed by the
/// coefficients in `{:.16e}` notation, in value-function order.
pub fn export_value_function<W: Write>(vf: &[AlphaVector], writer: W) -> Result<()> {
    let mut writer = BufWriter::new(writer);
    for alpha in vf {
        write!(writer, "{}", alpha.action)?;
        for v in alpha.values.iter() {
            write!(writer, " {:.16e}", v)?;
        }
        writeln!(writer)?;
    }
    writer.flush()?;
    Ok(())
}

/// Reads the format of [`export_value_function`]. Blank lines are skipped;
/// all vectors must have the same length.
pub fn import_value_function<R: Read>(reader: R) -> Result<ValueFunction> {
    let mut vf = ValueFunction::new();
    for (i, line) in BufReader::new(reader).lines().enumerate() {
        let line = line?;
        let line_nr = i + 1;
        let mut fields = line.split_whitespace();
        let action = match fields.next() {
            Some(field) => field.parse::<Index>().map_err(|e| MadpError::ParseError {
                line: line_nr,
                reason: format!("bad action index '{}': {}", field, e),
            })?,
            None => continue,
        };
        let values = fields
            .map(|field| {
                field.parse::<f64>().map_err(|e| MadpError::ParseError {
                    line: line_nr,
                    reason: format!("bad coefficient '{}': {}", field, e),
                })
            })
            .collect::<Result<Vec<f64>>>()?;
        if values.is_empty() {
            return Err(MadpError::ParseError {
                line: line_nr,
                reason: "no coefficients".to_string(),
            });
        }
        if let Some(first) = vf.first() {
            if first.size() != values.len() {
                return Err(MadpError::ParseError {
                    line: line_nr,
                    reason: format!("expected {} coefficients, found {}", first.size(), values.len()),
                });
            }
        }
        vf.push(AlphaVector::new(Array1::from_vec(values), action));
    }
    Ok(vf)
}

pub fn save_value_function(vf: &[AlphaVector], path: &str) -> Result<()> {
    export_value_function(vf, File::create(path)?)
}

pub fn load_value_function(path: &str) -> Result<ValueFunction> {
    import_value_function(File::open(path)?)
}
