//! Entry-rooted branch decomposition of a basin.
//!
//! Every non-seed page in a basin reached the seed cycle through exactly one
//! depth-1 ancestor, its entry. The decomposer runs the same layered
//! reverse-BFS as the basin mapper while propagating entry labels: depth-1
//! discoveries label themselves, deeper discoveries inherit the label of the
//! page that discovered them. Branches partition `basin \ seed`.
//!
//! Tie-break, fixed and documented: should a page ever have several
//! same-layer candidate parents, the numerically smallest entry label wins;
//! a depth-1 page entered from several cycle nodes records the smallest as
//! `terminal_entered`. Under `succ_N` the forward map is a function, so each
//! page has exactly one discovering parent and the tie-break is a no-op, but
//! the merge is written out so the ordering rule is explicit.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};

use crate::basin::{BasinLimits, BasinMap, DepthRow, Truncation};
use crate::canonical::canonical_hash_hex;
use crate::edge_index::EdgeIndex;
use crate::types::{CanonicalCycle, PageId};

/// Aggregate statistics for one branch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BranchStats {
    /// The depth-1 entry page rooting this branch.
    pub entry_id: PageId,
    /// Pages carrying this entry label (the entry itself included).
    pub branch_size: usize,
    /// Deepest reverse layer any member was discovered at.
    pub max_depth: u32,
    /// Seed node the entry steps onto.
    pub terminal_entered: PageId,
}

/// One row of the ranked branch table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BranchRow {
    /// 1-based rank by descending size.
    pub rank: usize,
    /// Entry page.
    pub entry_id: PageId,
    /// Branch size.
    pub branch_size: usize,
    /// Deepest member layer.
    pub max_depth: u32,
    /// Seed node entered through.
    pub terminal_entered: PageId,
}

/// Result of one branch decomposition run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BranchDecomposition {
    /// The underlying basin table (membership not duplicated here).
    pub basin: BasinMap,
    /// Branches ranked by descending size, ties by ascending entry id.
    pub branches: Vec<BranchStats>,
    /// Full member sets, materialized only for the top-K branches.
    pub memberships: BTreeMap<PageId, BTreeSet<PageId>>,
    /// How many branches had membership materialized.
    pub top_k: usize,
}

impl BranchDecomposition {
    /// Branch sizes in rank order, as metric input.
    pub fn branch_sizes(&self) -> Vec<u64> {
        self.branches.iter().map(|b| b.branch_size as u64).collect()
    }

    /// The ranked branch table.
    pub fn rows(&self) -> Vec<BranchRow> {
        self.branches
            .iter()
            .enumerate()
            .map(|(i, b)| BranchRow {
                rank: i + 1,
                entry_id: b.entry_id,
                branch_size: b.branch_size,
                max_depth: b.max_depth,
                terminal_entered: b.terminal_entered,
            })
            .collect()
    }

    /// The dominant branch, if any branch exists.
    pub fn dominant(&self) -> Option<&BranchStats> {
        self.branches.first()
    }

    /// Canonical hash over basin result and ranked branches.
    pub fn result_hash(&self) -> String {
        canonical_hash_hex(&(self.basin.result_hash(), &self.branches))
    }
}

/// Decompose the basin of a verified seed cycle into entry branches.
pub fn decompose(
    index: &EdgeIndex,
    cycle: &CanonicalCycle,
    limits: &BasinLimits,
    top_k: usize,
) -> BranchDecomposition {
    decompose_above(index, cycle.members(), cycle.key(), limits, top_k)
}

/// Decompose the reverse-reachable set above an arbitrary seed layer.
pub fn decompose_above(
    index: &EdgeIndex,
    seed_nodes: &[PageId],
    basin_key: String,
    limits: &BasinLimits,
    top_k: usize,
) -> BranchDecomposition {
    let mut seed: Vec<PageId> = seed_nodes.to_vec();
    seed.sort_unstable();
    seed.dedup();

    let mut seen: HashSet<PageId> = seed.iter().copied().collect();
    let mut entry_of: HashMap<PageId, PageId> = HashMap::new();
    let mut entered_via: HashMap<PageId, PageId> = HashMap::new();
    let mut stats: HashMap<PageId, (usize, u32)> = HashMap::new();

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
        // Assemble the full next layer before committing: page -> smallest
        // candidate entry label (and, at depth 1, smallest seed parent).
        let mut discovered: BTreeMap<PageId, PageId> = BTreeMap::new();
        let mut via: BTreeMap<PageId, PageId> = BTreeMap::new();
        for &node in &frontier {
            for &pred in index.predecessors(node) {
                if seen.contains(&pred) {
                    continue;
                }
                if depth == 0 {
                    discovered.entry(pred).or_insert(pred);
                    via.entry(pred)
                        .and_modify(|m| {
                            if node < *m {
                                *m = node;
                            }
                        })
                        .or_insert(node);
                } else {
                    let label = entry_of[&node];
                    discovered
                        .entry(pred)
                        .and_modify(|e| {
                            if label < *e {
                                *e = label;
                            }
                        })
                        .or_insert(label);
                }
            }
        }

        if discovered.is_empty() {
            break;
        }

        if let Some(max_depth) = limits.max_depth {
            if depth + 1 > max_depth {
                partial = true;
                truncation = Some(Truncation::DepthCap);
                break;
            }
        }

        let mut layer: Vec<(PageId, PageId)> = discovered.into_iter().collect();
        if let Some(max_nodes) = limits.max_nodes {
            if total >= max_nodes {
                partial = true;
                truncation = Some(Truncation::NodeCap);
                break;
            }
            let remaining = max_nodes - total;
            if layer.len() > remaining {
                layer.truncate(remaining);
                partial = true;
                truncation = Some(Truncation::NodeCap);
            }
        }

        depth += 1;
        total += layer.len();
        for &(page, entry) in &layer {
            seen.insert(page);
            entry_of.insert(page, entry);
            if depth == 1 {
                entered_via.insert(page, via[&page]);
            }
            let s = stats.entry(entry).or_insert((0, 0));
            s.0 += 1;
            s.1 = s.1.max(depth);
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
            branches = stats.len(),
            "branch layer labeled"
        );

        if partial {
            break;
        }
        frontier = layer.into_iter().map(|(page, _)| page).collect();
    }

    let mut branches: Vec<BranchStats> = stats
        .into_iter()
        .map(|(entry_id, (branch_size, max_depth))| BranchStats {
            entry_id,
            branch_size,
            max_depth,
            terminal_entered: entered_via[&entry_id],
        })
        .collect();
    branches.sort_by(|a, b| {
        b.branch_size
            .cmp(&a.branch_size)
            .then_with(|| a.entry_id.cmp(&b.entry_id))
    });

    // Membership only for the largest K branches: materializing every
    // branch of a million-page basin is memory-prohibitive and rarely asked
    // for.
    let top_entries: BTreeSet<PageId> = branches
        .iter()
        .take(top_k)
        .map(|b| b.entry_id)
        .collect();
    let mut memberships: BTreeMap<PageId, BTreeSet<PageId>> =
        top_entries.iter().map(|&e| (e, BTreeSet::new())).collect();
    for (&page, &entry) in &entry_of {
        if top_entries.contains(&entry) {
            memberships
                .get_mut(&entry)
                .expect("top entry pre-seeded")
                .insert(page);
        }
    }

    let basin = BasinMap {
        basin_key,
        rule: index.rule().get(),
        seed,
        depth_rows,
        total_nodes: total,
        partial,
        truncation,
        membership: None,
    };

    BranchDecomposition {
        basin,
        branches,
        memberships,
        top_k,
    }
}
