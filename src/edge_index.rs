//! Materialized reverse lookup for one rule index.
//!
//! Under a fixed N every page has at most one successor, so the forward map
//! is a function and the reverse map is the only thing worth materializing:
//! `predecessors(target)` answers "who steps onto this page". Built once per
//! N with a documented build step, shared read-only across seed cycles.
//! There is no implicit global edge cache.

use std::collections::HashMap;

use crate::store::LinkTable;
use crate::types::{succ_from_links, PageId, RuleIndex, Successor};

/// Error type for index construction.
#[derive(Debug, Clone, thiserror::Error)]
pub enum EdgeIndexError {
    /// The link table holds no pages at all.
    #[error("Link table is empty")]
    EmptyLinkTable,
    /// Link table error.
    #[error("Link table error: {0}")]
    Store(String),
}

/// Reverse successor index for one rule index.
///
/// Immutable once built; predecessor lists are sorted ascending so every
/// consumer iterates them in the same order.
#[derive(Debug, Clone)]
pub struct EdgeIndex {
    rule: RuleIndex,
    predecessors: HashMap<PageId, Vec<PageId>>,
    num_pages: usize,
    num_edges: usize,
    num_halting: usize,
}

impl EdgeIndex {
    /// Build the index by one pass over the link table.
    ///
    /// Emits one edge `page -> succ_N(page)` for every page with at least N
    /// links. Dangling targets (pages that appear only as targets) simply
    /// end up with empty predecessor lists.
    pub async fn build<T: LinkTable>(table: &T, rule: RuleIndex) -> Result<Self, EdgeIndexError> {
        let pages = table
            .page_ids()
            .await
            .map_err(|e| EdgeIndexError::Store(e.to_string()))?;
        if pages.is_empty() {
            return Err(EdgeIndexError::EmptyLinkTable);
        }

        let num_pages = pages.len();
        let mut predecessors: HashMap<PageId, Vec<PageId>> = HashMap::new();
        let mut num_edges = 0usize;
        let mut num_halting = 0usize;

        for page in pages {
            let links = table
                .links(page)
                .await
                .map_err(|e| EdgeIndexError::Store(e.to_string()))?
                .unwrap_or_default();

            match succ_from_links(&links, rule) {
                Successor::Page(target) => {
                    predecessors.entry(target).or_default().push(page);
                    num_edges += 1;
                }
                Successor::Halt => num_halting += 1,
            }
        }

        for preds in predecessors.values_mut() {
            preds.sort_unstable();
        }

        tracing::info!(
            rule = %rule,
            pages = num_pages,
            edges = num_edges,
            halting = num_halting,
            targets = predecessors.len(),
            "edge index built"
        );

        Ok(Self {
            rule,
            predecessors,
            num_pages,
            num_edges,
            num_halting,
        })
    }

    /// Pages whose successor is `target`, sorted ascending. Empty for pages
    /// nothing steps onto, including dangling targets.
    pub fn predecessors(&self, target: PageId) -> &[PageId] {
        self.predecessors
            .get(&target)
            .map(|v| v.as_slice())
            .unwrap_or(&[])
    }

    /// Rule index this reverse map was built for.
    pub fn rule(&self) -> RuleIndex {
        self.rule
    }

    /// Pages scanned during the build.
    pub fn num_pages(&self) -> usize {
        self.num_pages
    }

    /// Edges emitted (pages with out-degree >= N).
    pub fn num_edges(&self) -> usize {
        self.num_edges
    }

    /// Pages that halt under this rule (out-degree < N).
    pub fn num_halting(&self) -> usize {
        self.num_halting
    }

    /// Distinct pages that are stepped onto by at least one page.
    pub fn num_targets(&self) -> usize {
        self.predecessors.len()
    }
}
