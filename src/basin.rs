//! Layered reverse-BFS basin mapping.
//!
//! Given the reverse index for one rule, computes the full ancestor set of a
//! seed cycle: every page whose forward trace falls into it. This is the
//! dominant cost center: observed basins run from hundreds of pages to
//! beyond a million, so both depth and node caps are supported as
//! cooperative early-stops, and a truncated result is always explicitly
//! flagged partial. Callers must never treat a truncated basin as complete:
//! without the flag it could masquerade as a small legitimate one.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet, HashSet};

use crate::canonical::canonical_hash_hex;
use crate::edge_index::EdgeIndex;
use crate::types::{CanonicalCycle, PageId};

/// Traversal caps. `None` means unbounded.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BasinLimits {
    /// Deepest reverse layer to materialize.
    pub max_depth: Option<u32>,
    /// Cap on total discovered nodes, seed layer included.
    pub max_nodes: Option<usize>,
}

impl BasinLimits {
    /// Unbounded traversal.
    pub fn unbounded() -> Self {
        Self::default()
    }
}

/// Which cap cut the traversal short.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Truncation {
    /// Stopped at `max_depth` with a non-empty next layer.
    DepthCap,
    /// Stopped at `max_nodes`; the final layer may be cut mid-way.
    NodeCap,
}

/// One row of the per-depth basin table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DepthRow {
    /// Reverse depth (0 = seed layer).
    pub depth: u32,
    /// Pages first discovered at this depth.
    pub nodes_at_depth: usize,
    /// Pages discovered up to and including this depth.
    pub cumulative_nodes: usize,
}

/// Result of one basin mapping run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BasinMap {
    /// Stable key of the basin (cycle key, or a seed-set key for chases).
    pub basin_key: String,
    /// Rule index the reverse edges were built under.
    pub rule: u32,
    /// Seed layer, sorted ascending.
    pub seed: Vec<PageId>,
    /// Per-depth discovery table.
    pub depth_rows: Vec<DepthRow>,
    /// Total discovered pages, seed included.
    pub total_nodes: usize,
    /// True whenever a cap stopped the traversal.
    pub partial: bool,
    /// Which cap fired, when `partial`.
    pub truncation: Option<Truncation>,
    /// Page -> discovery depth, when membership was requested.
    pub membership: Option<BTreeMap<PageId, u32>>,
}

impl BasinMap {
    /// Deepest materialized layer.
    pub fn max_depth(&self) -> u32 {
        self.depth_rows.last().map(|r| r.depth).unwrap_or(0)
    }

    /// Discovery depth of a page, when membership was kept.
    pub fn depth_of(&self, page: PageId) -> Option<u32> {
        self.membership.as_ref().and_then(|m| m.get(&page).copied())
    }

    /// Membership test, when membership was kept.
    pub fn contains(&self, page: PageId) -> bool {
        self.membership
            .as_ref()
            .map(|m| m.contains_key(&page))
            .unwrap_or(false)
    }

    /// Canonical hash of the run result (membership excluded). Two runs on
    /// identical inputs produce identical hashes.
    pub fn result_hash(&self) -> String {
        canonical_hash_hex(&(
            &self.basin_key,
            self.rule,
            &self.seed,
            &self.depth_rows,
            self.total_nodes,
            self.partial,
            &self.truncation,
        ))
    }
}

/// Map the basin of a verified seed cycle.
///
/// `keep_membership` materializes the page -> depth map; leave it off for
/// count-only runs over very large basins.
pub fn map_basin(
    index: &EdgeIndex,
    cycle: &CanonicalCycle,
    limits: &BasinLimits,
    keep_membership: bool,
) -> BasinMap {
    map_above(index, cycle.members(), cycle.key(), limits, keep_membership)
}

/// Map the reverse-reachable set above an arbitrary seed layer.
///
/// The seed layer sits at depth 0 exactly like a cycle does; the dominant
/// chaser uses this to root a basin above a single entry page.
pub fn map_above(
    index: &EdgeIndex,
    seed_nodes: &[PageId],
    basin_key: String,
    limits: &BasinLimits,
    keep_membership: bool,
) -> BasinMap {
    let mut seed: Vec<PageId> = seed_nodes.to_vec();
    seed.sort_unstable();
    seed.dedup();

    let mut seen: HashSet<PageId> = seed.iter().copied().collect();
    let mut membership: Option<BTreeMap<PageId, u32>> = if keep_membership {
        Some(seed.iter().map(|&p| (p, 0)).collect())
    } else {
        None
    };

    let mut total = seed.len();
    let mut depth_rows = vec![DepthRow {
        depth: 0,
        nodes_at_depth: total,
        cumulative_nodes: total,
    }];

    let mut frontier = seed.clone();
    let mut depth: u32 = 0;
    let mut partial = false;
    let mut truncation = None;

    loop {
        // Layer barrier: the next layer is assembled in full against the
        // current `seen` set before anything is committed.
        let mut next: BTreeSet<PageId> = BTreeSet::new();
        for &node in &frontier {
            for &pred in index.predecessors(node) {
                if !seen.contains(&pred) {
                    next.insert(pred);
                }
            }
        }

        if next.is_empty() {
            break; // exhaustive: seen is exactly the reverse-reachable set
        }

        if let Some(max_depth) = limits.max_depth {
            if depth + 1 > max_depth {
                partial = true;
                truncation = Some(Truncation::DepthCap);
                break;
            }
        }

        let mut layer: Vec<PageId> = next.into_iter().collect();
        if let Some(max_nodes) = limits.max_nodes {
            if total >= max_nodes {
                partial = true;
                truncation = Some(Truncation::NodeCap);
                break;
            }
            let remaining = max_nodes - total;
            if layer.len() > remaining {
                // Cut deterministically: layers are already sorted ascending.
                layer.truncate(remaining);
                partial = true;
                truncation = Some(Truncation::NodeCap);
            }
        }

        depth += 1;
        total += layer.len();
        for &page in &layer {
            seen.insert(page);
            if let Some(m) = membership.as_mut() {
                m.insert(page, depth);
            }
        }
        depth_rows.push(DepthRow {
            depth,
            nodes_at_depth: layer.len(),
            cumulative_nodes: total,
        });

        tracing::debug!(
            basin = %basin_key,
            depth,
            layer = layer.len(),
            cumulative = total,
            "basin layer mapped"
        );

        if partial {
            break; // a truncated layer must not seed further expansion
        }
        frontier = layer;
    }

    BasinMap {
        basin_key,
        rule: index.rule().get(),
        seed,
        depth_rows,
        total_nodes: total,
        partial,
        truncation,
        membership,
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

    /// 1 <-> 2 cycle; 3 -> 1; 4 -> 3; 5 -> 3; 6 -> 5; 7 halts.
    async fn chain_index() -> EdgeIndex {
        let table = InMemoryLinkTable::from_pages(vec![
            (p(1), vec![p(2)]),
            (p(2), vec![p(1)]),
            (p(3), vec![p(1)]),
            (p(4), vec![p(3)]),
            (p(5), vec![p(3)]),
            (p(6), vec![p(5)]),
            (p(7), vec![]),
        ]);
        EdgeIndex::build(&table, RuleIndex::new(1).unwrap())
            .await
            .unwrap()
    }

    fn seed_cycle() -> CanonicalCycle {
        CanonicalCycle::new(vec![p(1), p(2)]).unwrap()
    }

    #[tokio::test]
    async fn test_exact_basin() {
        let index = chain_index().await;
        let map = map_basin(&index, &seed_cycle(), &BasinLimits::unbounded(), true);

        assert!(!map.partial);
        assert_eq!(map.total_nodes, 6);
        assert_eq!(map.basin_key, "cycle:1-2");

        let members: Vec<PageId> = map.membership.as_ref().unwrap().keys().copied().collect();
        assert_eq!(members, vec![p(1), p(2), p(3), p(4), p(5), p(6)]);

        // depth table: seed 2, then {3}, then {4,5}, then {6}
        assert_eq!(
            map.depth_rows,
            vec![
                DepthRow { depth: 0, nodes_at_depth: 2, cumulative_nodes: 2 },
                DepthRow { depth: 1, nodes_at_depth: 1, cumulative_nodes: 3 },
                DepthRow { depth: 2, nodes_at_depth: 2, cumulative_nodes: 5 },
                DepthRow { depth: 3, nodes_at_depth: 1, cumulative_nodes: 6 },
            ]
        );
        assert_eq!(map.depth_of(p(6)), Some(3));
        assert!(!map.contains(p(7)));
    }

    #[tokio::test]
    async fn test_depth_cap_flags_partial() {
        let index = chain_index().await;
        let limits = BasinLimits {
            max_depth: Some(2),
            max_nodes: None,
        };
        let map = map_basin(&index, &seed_cycle(), &limits, true);

        assert!(map.partial);
        assert_eq!(map.truncation, Some(Truncation::DepthCap));
        assert_eq!(map.max_depth(), 2);
        assert_eq!(map.total_nodes, 5); // 6 is beyond depth 2
    }

    #[tokio::test]
    async fn test_depth_cap_exact_fit_is_complete() {
        let index = chain_index().await;
        let limits = BasinLimits {
            max_depth: Some(3),
            max_nodes: None,
        };
        let map = map_basin(&index, &seed_cycle(), &limits, false);

        // Depth 3 is the last non-empty layer: nothing was cut.
        assert!(!map.partial);
        assert_eq!(map.total_nodes, 6);
    }

    #[tokio::test]
    async fn test_node_cap_cuts_deterministically() {
        let index = chain_index().await;
        let limits = BasinLimits {
            max_depth: None,
            max_nodes: Some(4),
        };
        let map = map_basin(&index, &seed_cycle(), &limits, true);

        assert!(map.partial);
        assert_eq!(map.truncation, Some(Truncation::NodeCap));
        assert_eq!(map.total_nodes, 4);
        // Layer {4, 5} is cut to its ascending prefix {4}.
        assert!(map.contains(p(4)));
        assert!(!map.contains(p(5)));
    }

    #[tokio::test]
    async fn test_idempotent_result_hash() {
        let index = chain_index().await;
        let a = map_basin(&index, &seed_cycle(), &BasinLimits::unbounded(), false);
        let b = map_basin(&index, &seed_cycle(), &BasinLimits::unbounded(), true);
        assert_eq!(a.result_hash(), b.result_hash());
    }

    #[tokio::test]
    async fn test_map_above_single_page() {
        let index = chain_index().await;
        let map = map_above(
            &index,
            &[p(3)],
            "seeds:3".to_string(),
            &BasinLimits::unbounded(),
            true,
        );

        assert_eq!(map.total_nodes, 4); // 3, 4, 5, 6
        assert_eq!(map.depth_of(p(6)), Some(2));
    }
}
