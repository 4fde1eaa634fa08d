//! Cross-rule tunnel analysis.
//!
//! Runs the classification machinery once per rule index, pivots to one row
//! per candidate page with a basin-key column per N, and labels tunnel
//! nodes: pages whose basin assignment changes with N. The mechanism label
//! is pure bookkeeping over data already in hand (the candidate's link row
//! and its per-N traces); no extra traversal happens here.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;

use crate::canonical::canonical_hash_hex;
use crate::classifier::{ClassifierError, TerminalClassifier};
use crate::store::LinkTable;
use crate::types::{succ_from_links, PageId, RuleIndex};

/// Error type for multiplex analysis.
#[derive(Debug, Clone, thiserror::Error)]
pub enum MultiplexError {
    /// At least one rule index is required.
    #[error("No rule indices supplied")]
    NoRules,
    /// Forward classification failed.
    #[error(transparent)]
    Classifier(#[from] ClassifierError),
    /// Link table error.
    #[error("Link table error: {0}")]
    Store(String),
}

/// How a tunnel node switches basins between adjacent rule indices.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Mechanism {
    /// The immediate successor itself differs at the transition (a different
    /// link position, or one side halts).
    DegreeShift,
    /// The immediate successor is identical but the paths part downstream.
    PathDivergence,
}

/// One pivoted row of the tunnel table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TunnelRow {
    /// Candidate page.
    pub page: PageId,
    /// Basin key per rule index.
    pub basin_keys: BTreeMap<u32, String>,
    /// Reverse depth per rule index: forward steps before entering the
    /// terminal.
    pub reverse_depths: BTreeMap<u32, u32>,
    /// True iff the basin keys are not all identical.
    pub is_tunnel: bool,
    /// Mechanism at the first switching transition, for tunnel nodes.
    pub mechanism: Option<Mechanism>,
    /// The adjacent rule pair where the basin key first switches.
    pub transition: Option<(u32, u32)>,
}

/// Full tunnel analysis report.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TunnelReport {
    /// Rule indices analyzed, ascending.
    pub rules: Vec<u32>,
    /// One row per candidate, sorted by page id.
    pub rows: Vec<TunnelRow>,
    /// Number of tunnel nodes found.
    pub num_tunnels: usize,
    /// Canonical content hash of the report.
    pub report_hash: String,
}

impl TunnelReport {
    /// Rows flagged as tunnel nodes.
    pub fn tunnels(&self) -> impl Iterator<Item = &TunnelRow> {
        self.rows.iter().filter(|r| r.is_tunnel)
    }
}

/// Pivots per-page basin membership across several rule indices.
pub struct MultiplexTunnelAnalyzer<T: LinkTable> {
    table: Arc<T>,
    rules: Vec<RuleIndex>,
    max_steps: usize,
}

impl<T: LinkTable> MultiplexTunnelAnalyzer<T> {
    /// Create an analyzer over a set of rule indices (deduplicated and
    /// sorted ascending).
    pub fn new(table: Arc<T>, rules: Vec<RuleIndex>) -> Result<Self, MultiplexError> {
        let mut rules = rules;
        rules.sort_unstable();
        rules.dedup();
        if rules.is_empty() {
            return Err(MultiplexError::NoRules);
        }
        Ok(Self {
            table,
            rules,
            max_steps: TerminalClassifier::<T>::DEFAULT_MAX_STEPS,
        })
    }

    /// Override the per-trace step fuse.
    pub fn with_max_steps(mut self, max_steps: usize) -> Self {
        self.max_steps = max_steps;
        self
    }

    /// Classify each candidate under every rule and pivot the results.
    pub async fn analyze(&self, candidates: &[PageId]) -> Result<TunnelReport, MultiplexError> {
        let mut pages: Vec<PageId> = candidates.to_vec();
        pages.sort_unstable();
        pages.dedup();

        let classifiers: Vec<TerminalClassifier<T>> = self
            .rules
            .iter()
            .map(|&rule| {
                TerminalClassifier::new(Arc::clone(&self.table), rule)
                    .with_max_steps(self.max_steps)
            })
            .collect();

        let mut rows = Vec::with_capacity(pages.len());
        for &page in &pages {
            let links = self
                .table
                .links(page)
                .await
                .map_err(|e| MultiplexError::Store(e.to_string()))?
                .ok_or(ClassifierError::PageNotFound(page))?;

            let mut basin_keys = BTreeMap::new();
            let mut reverse_depths = BTreeMap::new();
            for classifier in &classifiers {
                let trace = classifier.classify(page).await?;
                basin_keys.insert(classifier.rule().get(), trace.basin_key());
                reverse_depths.insert(classifier.rule().get(), trace.steps_to_terminal);
            }

            let is_tunnel = {
                let mut keys = basin_keys.values();
                let first = keys.next();
                first.is_some() && keys.any(|k| Some(k) != first)
            };

            let (mechanism, transition) = if is_tunnel {
                let switch = self
                    .rules
                    .windows(2)
                    .find(|w| basin_keys[&w[0].get()] != basin_keys[&w[1].get()]);
                match switch {
                    Some(pair) => {
                        let succ_lo = succ_from_links(&links, pair[0]);
                        let succ_hi = succ_from_links(&links, pair[1]);
                        let mechanism = if succ_lo != succ_hi {
                            Mechanism::DegreeShift
                        } else {
                            Mechanism::PathDivergence
                        };
                        (Some(mechanism), Some((pair[0].get(), pair[1].get())))
                    }
                    // Keys differ only across non-adjacent rules; with an
                    // ascending scan this cannot happen, but stay total.
                    None => (None, None),
                }
            } else {
                (None, None)
            };

            rows.push(TunnelRow {
                page,
                basin_keys,
                reverse_depths,
                is_tunnel,
                mechanism,
                transition,
            });
        }

        let num_tunnels = rows.iter().filter(|r| r.is_tunnel).count();
        let rules: Vec<u32> = self.rules.iter().map(|r| r.get()).collect();
        let report_hash = canonical_hash_hex(&(&rules, &rows));

        tracing::info!(
            rules = ?rules,
            candidates = rows.len(),
            tunnels = num_tunnels,
            "tunnel analysis complete"
        );

        Ok(TunnelReport {
            rules,
            rows,
            num_tunnels,
            report_hash,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::InMemoryLinkTable;

    fn p(id: u64) -> PageId {
        PageId::new(id)
    }

    fn n(rule: u32) -> RuleIndex {
        RuleIndex::new(rule).unwrap()
    }

    #[tokio::test]
    async fn test_degree_shift_tunnel() {
        // X's third and fourth links point at different self-cycles.
        let table = Arc::new(InMemoryLinkTable::from_pages(vec![
            (p(10), vec![p(1), p(1), p(2), p(3)]),
            (p(1), vec![]),
            (p(2), vec![p(2), p(2), p(2)]),
            (p(3), vec![p(3), p(3), p(3), p(3)]),
        ]));

        let analyzer = MultiplexTunnelAnalyzer::new(table, vec![n(3), n(4)]).unwrap();
        let report = analyzer.analyze(&[p(10)]).await.unwrap();

        let row = &report.rows[0];
        assert!(row.is_tunnel);
        assert_eq!(row.basin_keys[&3], "cycle:2");
        assert_eq!(row.basin_keys[&4], "cycle:3");
        assert_eq!(row.mechanism, Some(Mechanism::DegreeShift));
        assert_eq!(row.transition, Some((3, 4)));
        assert_eq!(report.num_tunnels, 1);
    }

    #[tokio::test]
    async fn test_path_divergence_tunnel() {
        // X's first and second links are the same page; the split happens
        // one step downstream.
        let table = Arc::new(InMemoryLinkTable::from_pages(vec![
            (p(10), vec![p(20), p(20)]),
            (p(20), vec![p(30), p(40)]),
            (p(30), vec![p(30)]),
            (p(40), vec![p(40), p(40)]),
        ]));

        let analyzer = MultiplexTunnelAnalyzer::new(table, vec![n(1), n(2)]).unwrap();
        let report = analyzer.analyze(&[p(10)]).await.unwrap();

        let row = &report.rows[0];
        assert!(row.is_tunnel);
        assert_eq!(row.basin_keys[&1], "cycle:30");
        assert_eq!(row.basin_keys[&2], "cycle:40");
        assert_eq!(row.mechanism, Some(Mechanism::PathDivergence));
        assert_eq!(row.reverse_depths[&1], 2);
        assert_eq!(row.reverse_depths[&2], 2);
    }

    #[tokio::test]
    async fn test_stable_page_is_not_a_tunnel() {
        // Duplicate link positions: identical fate under both rules.
        let table = Arc::new(InMemoryLinkTable::from_pages(vec![
            (p(10), vec![p(20), p(20)]),
            (p(20), vec![p(20), p(20)]),
        ]));

        let analyzer = MultiplexTunnelAnalyzer::new(table, vec![n(1), n(2)]).unwrap();
        let report = analyzer.analyze(&[p(10)]).await.unwrap();

        let row = &report.rows[0];
        assert!(!row.is_tunnel);
        assert!(row.mechanism.is_none());
        assert_eq!(report.num_tunnels, 0);
    }

    #[tokio::test]
    async fn test_halt_counts_as_a_basin_key() {
        // One link only: cycles under N=1, halts under N=2.
        let table = Arc::new(InMemoryLinkTable::from_pages(vec![
            (p(10), vec![p(20)]),
            (p(20), vec![p(20)]),
        ]));

        let analyzer = MultiplexTunnelAnalyzer::new(table, vec![n(1), n(2)]).unwrap();
        let report = analyzer.analyze(&[p(10)]).await.unwrap();

        let row = &report.rows[0];
        assert!(row.is_tunnel);
        assert_eq!(row.basin_keys[&2], "halt");
        assert_eq!(row.mechanism, Some(Mechanism::DegreeShift));
    }

    #[tokio::test]
    async fn test_no_rules_is_input_error() {
        let table = Arc::new(InMemoryLinkTable::new());
        let err = MultiplexTunnelAnalyzer::new(table, vec![]);
        assert!(matches!(err, Err(MultiplexError::NoRules)));
    }

    #[tokio::test]
    async fn test_unknown_candidate_fails_fast() {
        let table = Arc::new(InMemoryLinkTable::from_pages(vec![(p(1), vec![p(1)])]));
        let analyzer = MultiplexTunnelAnalyzer::new(table, vec![n(1)]).unwrap();

        let err = analyzer.analyze(&[p(99)]).await;
        assert!(matches!(
            err,
            Err(MultiplexError::Classifier(ClassifierError::PageNotFound(_)))
        ));
    }

    #[tokio::test]
    async fn test_report_hash_idempotent_and_rows_sorted() {
        let table = Arc::new(InMemoryLinkTable::from_pages(vec![
            (p(10), vec![p(20)]),
            (p(20), vec![p(20)]),
        ]));
        let analyzer = MultiplexTunnelAnalyzer::new(table, vec![n(1), n(2)]).unwrap();

        let a = analyzer.analyze(&[p(20), p(10)]).await.unwrap();
        let b = analyzer.analyze(&[p(10), p(20)]).await.unwrap();

        assert_eq!(a.report_hash, b.report_hash);
        assert_eq!(a.rows[0].page, p(10));
        assert_eq!(a.rows[1].page, p(20));
    }
}
