//! Dominant-branch chasing.
//!
//! Starting from a seed cycle, repeatedly decompose the basin rooted above
//! the current seed, follow the dominant entry upstream, and record how its
//! share decays. The chase is a two-state machine: `Active(seed)` until one
//! of four collapse conditions fires, then `Collapsed(reason)`, which is
//! terminal. Each hop depends on the previous one, so a single chase is
//! inherently sequential; chases from different seeds are independent.

use serde::{Deserialize, Serialize};
use std::collections::HashSet;

use crate::basin::BasinLimits;
use crate::branch::decompose_above;
use crate::canonical::canonical_hash_hex;
use crate::edge_index::EdgeIndex;
use crate::metrics::concentration;
use crate::types::{CanonicalCycle, PageId};

/// Why a chase stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CollapseReason {
    /// No branch held the required share: the trunk ended.
    BelowThreshold,
    /// The dominant entry has no predecessors (or the seed has no upstream
    /// branches at all).
    NoPredecessors,
    /// The dominant entry repeated a previously visited seed.
    CycleDetected,
    /// The hop fuse fired.
    MaxHops,
}

/// Chase configuration.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ChaseConfig {
    /// Minimum top-1 share required to keep chasing.
    pub dominance_threshold: f64,
    /// Hop fuse; the chase always collapses within this many hops.
    pub max_hops: usize,
    /// Caps applied to every per-hop basin decomposition.
    pub limits: BasinLimits,
}

impl Default for ChaseConfig {
    fn default() -> Self {
        Self {
            dominance_threshold: 0.5,
            max_hops: 32,
            limits: BasinLimits::unbounded(),
        }
    }
}

/// One emitted hop of a chase.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ChaseHop {
    /// Hop counter, starting at 0 on the initial cycle.
    pub hop: usize,
    /// Representative of the seed this hop was rooted on (the cycle's
    /// minimum member for hop 0, the prior dominant entry afterwards).
    pub seed: PageId,
    /// Total nodes in the basin above this seed.
    pub basin_total: usize,
    /// Entry page of the dominant branch.
    pub dominant_entry: PageId,
    /// Its share of the branch mass.
    pub dominant_share: f64,
}

/// Full chase trace.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChaseTrace {
    /// Key of the cycle the chase started from.
    pub initial_basin_key: String,
    /// Emitted hops, in order.
    pub hops: Vec<ChaseHop>,
    /// Terminal state.
    pub collapse: CollapseReason,
    /// True if any per-hop decomposition was truncated; the decay profile is
    /// then a lower bound, not an exact one.
    pub partial: bool,
}

impl ChaseTrace {
    /// Number of hops before collapse.
    pub fn num_hops(&self) -> usize {
        self.hops.len()
    }

    /// Canonical hash of the trace.
    pub fn result_hash(&self) -> String {
        canonical_hash_hex(self)
    }
}

/// Iterates branch decomposition from a moving seed.
pub struct DominantChaser<'a> {
    index: &'a EdgeIndex,
    config: ChaseConfig,
}

impl<'a> DominantChaser<'a> {
    /// Create a chaser over a built edge index.
    pub fn new(index: &'a EdgeIndex, config: ChaseConfig) -> Self {
        Self { index, config }
    }

    /// Run a chase from a seed cycle until it collapses.
    pub fn chase(&self, initial: &CanonicalCycle) -> ChaseTrace {
        let mut seeds: Vec<PageId> = initial.members().to_vec();
        let mut seed_repr = initial.min_page();
        let mut basin_key = initial.key();
        let mut visited: HashSet<PageId> = initial.members().iter().copied().collect();

        let mut hops: Vec<ChaseHop> = Vec::new();
        let mut partial = false;

        let collapse = loop {
            let hop = hops.len();
            let decomp =
                decompose_above(self.index, &seeds, basin_key.clone(), &self.config.limits, 0);
            partial |= decomp.basin.partial;

            let metrics = concentration(&decomp.branch_sizes());
            let dominant = match decomp.dominant() {
                Some(d) => *d,
                None => break CollapseReason::NoPredecessors,
            };

            if metrics.top1_share < self.config.dominance_threshold {
                break CollapseReason::BelowThreshold;
            }
            if self.index.predecessors(dominant.entry_id).is_empty() {
                break CollapseReason::NoPredecessors;
            }
            if !visited.insert(dominant.entry_id) {
                break CollapseReason::CycleDetected;
            }

            hops.push(ChaseHop {
                hop,
                seed: seed_repr,
                basin_total: decomp.basin.total_nodes,
                dominant_entry: dominant.entry_id,
                dominant_share: metrics.top1_share,
            });
            tracing::debug!(
                hop,
                seed = %seed_repr,
                dominant = %dominant.entry_id,
                share = metrics.top1_share,
                "chase hop"
            );

            if hops.len() >= self.config.max_hops {
                break CollapseReason::MaxHops;
            }

            seed_repr = dominant.entry_id;
            seeds = vec![dominant.entry_id];
            basin_key = format!("above:{}", dominant.entry_id);
        };

        tracing::info!(
            cycle = %initial,
            hops = hops.len(),
            collapse = ?collapse,
            partial,
            "chase collapsed"
        );

        ChaseTrace {
            initial_basin_key: initial.key(),
            hops,
            collapse,
            partial,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::InMemoryLinkTable;
    use crate::types::RuleIndex;

    fn p(id: u64) -> PageId {
        PageId::new(id)
    }

    async fn build_index(pages: Vec<(PageId, Vec<PageId>)>) -> EdgeIndex {
        let table = InMemoryLinkTable::from_pages(pages);
        EdgeIndex::build(&table, RuleIndex::new(1).unwrap())
            .await
            .unwrap()
    }

    fn cycle12() -> CanonicalCycle {
        CanonicalCycle::new(vec![p(1), p(2)]).unwrap()
    }

    #[tokio::test]
    async fn test_chase_follows_trunk_to_source() {
        // Trunk 5 -> 4 -> 3 -> cycle(1, 2).
        let index = build_index(vec![
            (p(1), vec![p(2)]),
            (p(2), vec![p(1)]),
            (p(3), vec![p(1)]),
            (p(4), vec![p(3)]),
            (p(5), vec![p(4)]),
        ])
        .await;

        let trace = DominantChaser::new(&index, ChaseConfig::default()).chase(&cycle12());

        // Hops on 3 and 4 are emitted; 5 has no predecessors, so the hop
        // that would pick it collapses instead.
        assert_eq!(trace.collapse, CollapseReason::NoPredecessors);
        assert_eq!(trace.num_hops(), 2);
        assert_eq!(trace.hops[0].seed, p(1));
        assert_eq!(trace.hops[0].dominant_entry, p(3));
        assert_eq!(trace.hops[0].basin_total, 5);
        assert_eq!(trace.hops[1].seed, p(3));
        assert_eq!(trace.hops[1].dominant_entry, p(4));
        assert!(!trace.partial);
    }

    #[tokio::test]
    async fn test_collapse_below_threshold() {
        // Two even entries: top-1 share 0.5 under a 0.6 threshold.
        let index = build_index(vec![
            (p(1), vec![p(2)]),
            (p(2), vec![p(1)]),
            (p(3), vec![p(1)]),
            (p(4), vec![p(2)]),
        ])
        .await;

        let config = ChaseConfig {
            dominance_threshold: 0.6,
            ..ChaseConfig::default()
        };
        let trace = DominantChaser::new(&index, config).chase(&cycle12());

        assert_eq!(trace.collapse, CollapseReason::BelowThreshold);
        assert!(trace.hops.is_empty());
    }

    #[tokio::test]
    async fn test_collapse_no_predecessors_at_seed() {
        // Nothing outside the cycle points in.
        let index = build_index(vec![(p(1), vec![p(2)]), (p(2), vec![p(1)])]).await;

        let trace = DominantChaser::new(&index, ChaseConfig::default()).chase(&cycle12());
        assert_eq!(trace.collapse, CollapseReason::NoPredecessors);
        assert!(trace.hops.is_empty());
    }

    #[tokio::test]
    async fn test_collapse_max_hops() {
        let index = build_index(vec![
            (p(1), vec![p(2)]),
            (p(2), vec![p(1)]),
            (p(3), vec![p(1)]),
            (p(4), vec![p(3)]),
            (p(5), vec![p(4)]),
            (p(6), vec![p(5)]),
            (p(7), vec![p(6)]),
        ])
        .await;

        let config = ChaseConfig {
            max_hops: 2,
            ..ChaseConfig::default()
        };
        let trace = DominantChaser::new(&index, config).chase(&cycle12());

        assert_eq!(trace.collapse, CollapseReason::MaxHops);
        assert_eq!(trace.num_hops(), 2);
    }

    #[tokio::test]
    async fn test_cycle_adjacent_seed_triggers_cycle_detected() {
        // The real loop is 1 -> 2 -> 3 -> 4 -> 1; the chase is seeded with
        // only the {1, 2} arc, so walking upstream re-encounters seeds.
        let index = build_index(vec![
            (p(1), vec![p(2)]),
            (p(2), vec![p(3)]),
            (p(3), vec![p(4)]),
            (p(4), vec![p(1)]),
        ])
        .await;

        let trace = DominantChaser::new(&index, ChaseConfig::default()).chase(&cycle12());
        assert_eq!(trace.collapse, CollapseReason::CycleDetected);
        assert!(trace.num_hops() <= 2);
    }

    #[tokio::test]
    async fn test_trace_hash_is_idempotent() {
        let index = build_index(vec![
            (p(1), vec![p(2)]),
            (p(2), vec![p(1)]),
            (p(3), vec![p(1)]),
        ])
        .await;

        let chaser = DominantChaser::new(&index, ChaseConfig::default());
        let a = chaser.chase(&cycle12());
        let b = chaser.chase(&cycle12());
        assert_eq!(a.result_hash(), b.result_hash());
    }
}
