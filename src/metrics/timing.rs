use serde::{Serialize, Deserialize};
use std::collections::{BTreeMap, HashMap};
use std::time::Instant;

use crate::error::{MadpError, Result};

/// Statistics of the recorded durations of one id, in seconds
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TimingStats {
    pub count: usize,
    pub total: f64,
    pub mean: f64,
    pub min: f64,
    pub max: f64,
}

impl TimingStats {
    pub fn from_durations(durations: &[f64]) -> Self {
        if durations.is_empty() {
            return TimingStats {
                count: 0,
                total: 0.0,
                mean: 0.0,
                min: 0.0,
                max: 0.0,
            };
        }
        let total: f64 = durations.iter().sum();
        TimingStats {
            count: durations.len(),
            total,
            mean: total / durations.len() as f64,
            min: durations.iter().copied().fold(f64::INFINITY, f64::min),
            max: durations.iter().copied().fold(f64::NEG_INFINITY, f64::max),
        }
    }
}

/// Wall-clock timing of named, possibly repeated, sections.
#[derive(Debug, Default)]
pub struct Timing {
    running: HashMap<String, Instant>,
    durations: BTreeMap<String, Vec<f64>>,
}

impl Timing {
    pub fn new() -> Self {
        Timing::default()
    }

    /// Starts (or restarts) the clock for `id`.
    pub fn start(&mut self, id: &str) {
        self.running.insert(id.to_string(), Instant::now());
    }

    /// Stops the clock for `id`, records the duration and returns it.
    pub fn stop(&mut self, id: &str) -> Result<f64> {
        let started = self.running.remove(id).ok_or_else(|| MadpError::NotFound {
            what: "running timer".to_string(),
            name: id.to_string(),
        })?;
        let elapsed = started.elapsed().as_secs_f64();
        self.durations.entry(id.to_string()).or_default().push(elapsed);
        Ok(elapsed)
    }

    pub fn is_running(&self, id: &str) -> bool {
        self.running.contains_key(id)
    }

    pub fn total(&self, id: &str) -> f64 {
        self.durations.get(id).map_or(0.0, |d| d.iter().sum())
    }

    pub fn count(&self, id: &str) -> usize {
        self.durations.get(id).map_or(0, |d| d.len())
    }

    pub fn durations(&self, id: &str) -> &[f64] {
        self.durations.get(id).map(|d| d.as_slice()).unwrap_or(&[])
    }

    /// Per-id statistics in id order
    pub fn summary(&self) -> BTreeMap<String, TimingStats> {
        self.durations
            .iter()
            .map(|(id, d)| (id.clone(), TimingStats::from_durations(d)))
            .collect()
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(&self.summary())?)
    }

    pub fn log_summary(&self) {
        for (id, stats) in self.summary() {
            log::info!(
                "timing {}: {} calls, total {:.6}s, mean {:.6}s, min {:.6}s, max {:.6}s",
                id,
                stats.count,
                stats.total,
                stats.mean,
                stats.min,
                stats.max
            );
        }
    }
}
