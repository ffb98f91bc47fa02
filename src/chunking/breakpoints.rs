//! Breakpoint threshold policies over consecutive embedding distances.
//!
//! A breakpoint between units `i` and `i + 1` is declared when
//! `distances[i]` strictly exceeds the policy's threshold. With zero variance
//! in the distances no threshold is exceeded, so uniform text collapses into a
//! single chunk instead of looping or dividing by zero.

use serde::{Deserialize, Serialize};

/// Statistical policy deriving the cut threshold from the distance
/// distribution. Larger amounts cut less aggressively: fewer, larger chunks.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "policy", rename_all = "snake_case")]
pub enum BreakpointStrategy {
    /// Cut at `mean + amount * stddev` of the observed distances.
    StandardDeviation { amount: f32 },
    /// Cut above the given percentile (0–100) of the observed distances.
    Percentile { percentile: f32 },
    /// Cut at `mean + multiplier * IQR` of the observed distances.
    Interquartile { multiplier: f32 },
}

impl Default for BreakpointStrategy {
    fn default() -> Self {
        BreakpointStrategy::StandardDeviation { amount: 3.0 }
    }
}

impl BreakpointStrategy {
    /// Indices `i` such that a chunk boundary falls between unit `i` and
    /// `i + 1`. Fewer than two distances can never produce a boundary.
    pub fn breakpoints(&self, distances: &[f32]) -> Vec<usize> {
        if distances.is_empty() {
            return Vec::new();
        }
        let threshold = self.threshold(distances);
        distances
            .iter()
            .enumerate()
            .filter(|&(_, &distance)| distance > threshold)
            .map(|(i, _)| i)
            .collect()
    }

    fn threshold(&self, distances: &[f32]) -> f32 {
        match *self {
            BreakpointStrategy::StandardDeviation { amount } => {
                mean(distances) + amount * stddev(distances)
            }
            BreakpointStrategy::Percentile { percentile } => percentile_of(distances, percentile),
            BreakpointStrategy::Interquartile { multiplier } => {
                let q1 = percentile_of(distances, 25.0);
                let q3 = percentile_of(distances, 75.0);
                mean(distances) + multiplier * (q3 - q1)
            }
        }
    }
}

fn mean(values: &[f32]) -> f32 {
    values.iter().sum::<f32>() / values.len() as f32
}

fn stddev(values: &[f32]) -> f32 {
    let m = mean(values);
    let variance = values.iter().map(|v| (v - m) * (v - m)).sum::<f32>() / values.len() as f32;
    variance.sqrt()
}

/// Nearest-rank-with-interpolation percentile over a copy of `values`.
fn percentile_of(values: &[f32], percentile: f32) -> f32 {
    let mut sorted = values.to_vec();
    sorted.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));
    let clamped = percentile.clamp(0.0, 100.0);
    let rank = clamped / 100.0 * (sorted.len() - 1) as f32;
    let lower = rank.floor() as usize;
    let upper = rank.ceil() as usize;
    if lower == upper {
        return sorted[lower];
    }
    let weight = rank - lower as f32;
    sorted[lower] * (1.0 - weight) + sorted[upper] * weight
}
