//! Concentration statistics over branch sizes.
//!
//! Pure aggregation: how unevenly a basin's mass is spread over its entry
//! branches. A basin with one overwhelming branch has a trunk; a basin with
//! many comparable branches has none.

use serde::{Deserialize, Serialize};

/// Concentration statistics for one branch-size multiset.
///
/// `num_branches == 0` marks the undefined (empty-input) case; every field
/// is zero there rather than an error.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ConcentrationMetrics {
    /// Branches with non-zero size.
    pub num_branches: usize,
    /// Total mass across branches.
    pub total_mass: u64,
    /// Gini coefficient of the size distribution (0 = perfectly even).
    pub gini: f64,
    /// Inverse Herfindahl-Hirschman index: how many equal branches would
    /// produce the same concentration.
    pub effective_branches: f64,
    /// Shannon entropy of branch shares, normalized by `ln(num_branches)`.
    /// Defined as 0 for one branch or fewer.
    pub entropy_normalized: f64,
    /// Share of the largest branch.
    pub top1_share: f64,
    /// Combined share of the 5 largest branches.
    pub top5_share: f64,
    /// Combined share of the 10 largest branches.
    pub top10_share: f64,
}

impl ConcentrationMetrics {
    /// The zeroed, undefined-marked result for empty input.
    pub fn empty() -> Self {
        Self {
            num_branches: 0,
            total_mass: 0,
            gini: 0.0,
            effective_branches: 0.0,
            entropy_normalized: 0.0,
            top1_share: 0.0,
            top5_share: 0.0,
            top10_share: 0.0,
        }
    }

    /// True when the input was empty and the metric fields carry no meaning.
    pub fn is_undefined(&self) -> bool {
        self.num_branches == 0
    }
}

/// Compute concentration metrics over a branch-size multiset.
///
/// Zero-sized entries carry no mass and are ignored. Empty (or all-zero)
/// input yields [`ConcentrationMetrics::empty`], never an error.
pub fn concentration(sizes: &[u64]) -> ConcentrationMetrics {
    let mut sizes: Vec<u64> = sizes.iter().copied().filter(|&s| s > 0).collect();
    if sizes.is_empty() {
        return ConcentrationMetrics::empty();
    }

    sizes.sort_unstable();
    let n = sizes.len();
    let total: u64 = sizes.iter().sum();
    let total_f = total as f64;

    // Gini over ascending sizes: (2 * Σ i·x_i) / (n · Σ x) - (n + 1) / n.
    let weighted: f64 = sizes
        .iter()
        .enumerate()
        .map(|(i, &x)| (i as f64 + 1.0) * x as f64)
        .sum();
    let gini = (2.0 * weighted) / (n as f64 * total_f) - (n as f64 + 1.0) / n as f64;

    let shares: Vec<f64> = sizes.iter().map(|&x| x as f64 / total_f).collect();
    let hhi: f64 = shares.iter().map(|s| s * s).sum();
    let effective_branches = 1.0 / hhi;

    let entropy_normalized = if n <= 1 {
        0.0
    } else {
        let entropy: f64 = shares.iter().map(|&s| -s * s.ln()).sum();
        entropy / (n as f64).ln()
    };

    let top_share = |k: usize| -> f64 {
        // sizes are ascending; the k largest sit at the tail.
        let tail: u64 = sizes.iter().rev().take(k).sum();
        tail as f64 / total_f
    };

    ConcentrationMetrics {
        num_branches: n,
        total_mass: total,
        gini: gini.max(0.0),
        effective_branches,
        entropy_normalized,
        top1_share: top_share(1),
        top5_share: top_share(5),
        top10_share: top_share(10),
    }
}
