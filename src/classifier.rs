//! Forward classification of a page's eventual fate.
//!
//! Iterates the successor rule from a start page until it either halts or
//! revisits a page (closing a cycle). Used for sampling, validation, and to
//! verify that a supplied seed really is a cycle before basin mapping.

use std::collections::HashMap;
use std::sync::Arc;

use crate::store::LinkTable;
use crate::types::{succ_from_links, CanonicalCycle, PageId, RuleIndex, Successor, Terminal};

/// Error type for classifier operations.
#[derive(Debug, Clone, thiserror::Error)]
pub enum ClassifierError {
    /// Start page not found in the link table.
    #[error("Page not found: {0}")]
    PageNotFound(PageId),
    /// The step fuse blew. The domain is finite, so a well-formed table
    /// always terminates within its page count; this signals corrupt input
    /// or an algorithm bug, not a long path.
    #[error("Step limit exceeded tracing from {start} after {max_steps} steps")]
    StepLimitExceeded {
        /// Page the trace started from.
        start: PageId,
        /// The configured fuse.
        max_steps: usize,
    },
    /// A supplied seed failed cycle verification.
    #[error("Seed is not a cycle under {rule}: {reason}")]
    NotACycle {
        /// Rule index the seed was checked under.
        rule: RuleIndex,
        /// What went wrong.
        reason: String,
    },
    /// Link table error.
    #[error("Link table error: {0}")]
    Store(String),
}

/// Result of forward-tracing one page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ForwardTrace {
    /// Page the trace started from.
    pub start: PageId,
    /// Terminal the trace reached.
    pub terminal: Terminal,
    /// Rule applications before entering the terminal: 0 if the start page
    /// already sits on the cycle; for halting traces, the number of rule
    /// applications up to and including the one that yields HALT, so an
    /// immediately halting page reports 1. The multiplex analyzer publishes
    /// this value as the per-rule reverse depth.
    pub steps_to_terminal: u32,
    /// Distinct pages visited, in trace order (cycle members included once).
    pub path: Vec<PageId>,
}

impl ForwardTrace {
    /// Stable basin key of the reached terminal.
    pub fn basin_key(&self) -> String {
        self.terminal.basin_key()
    }
}

/// Classifies pages by iterating `succ_N` with a step fuse.
///
/// Pure given the link table: the same start page always yields the same
/// trace.
pub struct TerminalClassifier<T: LinkTable> {
    table: Arc<T>,
    rule: RuleIndex,
    max_steps: usize,
}

impl<T: LinkTable> TerminalClassifier<T> {
    /// Default step fuse. Generous: any well-formed trace terminates within
    /// the page count.
    pub const DEFAULT_MAX_STEPS: usize = 1_000_000;

    /// Create a classifier for a rule index.
    pub fn new(table: Arc<T>, rule: RuleIndex) -> Self {
        Self {
            table,
            rule,
            max_steps: Self::DEFAULT_MAX_STEPS,
        }
    }

    /// Override the step fuse.
    pub fn with_max_steps(mut self, max_steps: usize) -> Self {
        self.max_steps = max_steps;
        self
    }

    /// The rule index this classifier traces under.
    pub fn rule(&self) -> RuleIndex {
        self.rule
    }

    /// One application of the rule.
    ///
    /// Pages absent from the table have no link list and halt.
    pub async fn successor(&self, page: PageId) -> Result<Successor, ClassifierError> {
        let links = self
            .table
            .links(page)
            .await
            .map_err(|e| ClassifierError::Store(e.to_string()))?;
        Ok(match links {
            Some(links) => succ_from_links(&links, self.rule),
            None => Successor::Halt,
        })
    }

    /// Trace a page to its terminal.
    ///
    /// An unknown start page is an input error; unknown pages reached
    /// mid-trace halt (out-degree 0).
    pub async fn classify(&self, start: PageId) -> Result<ForwardTrace, ClassifierError> {
        let mut path: Vec<PageId> = Vec::new();
        let mut position: HashMap<PageId, usize> = HashMap::new();
        let mut current = start;

        loop {
            if let Some(&entry) = position.get(&current) {
                // First repeat closes the cycle: everything from the first
                // visit of `current` onward loops.
                let cycle = CanonicalCycle::new(path[entry..].to_vec())
                    .expect("trace cycle is non-empty and duplicate-free");
                return Ok(ForwardTrace {
                    start,
                    terminal: Terminal::Cycle(cycle),
                    steps_to_terminal: entry as u32,
                    path,
                });
            }

            if path.len() >= self.max_steps {
                return Err(ClassifierError::StepLimitExceeded {
                    start,
                    max_steps: self.max_steps,
                });
            }

            position.insert(current, path.len());
            path.push(current);

            let links = self
                .table
                .links(current)
                .await
                .map_err(|e| ClassifierError::Store(e.to_string()))?;

            let succ = match links {
                Some(links) => succ_from_links(&links, self.rule),
                // A dangling target halts; only an unknown start is an error.
                None if path.len() == 1 => return Err(ClassifierError::PageNotFound(start)),
                None => Successor::Halt,
            };

            match succ {
                Successor::Page(next) => current = next,
                Successor::Halt => {
                    let steps = path.len() as u32;
                    return Ok(ForwardTrace {
                        start,
                        terminal: Terminal::Halt,
                        steps_to_terminal: steps,
                        path,
                    });
                }
            }
        }
    }

    /// Verify a supplied seed closes under the rule.
    ///
    /// Each member's successor must be the next member (cyclically). Returns
    /// the canonicalized cycle on success, `NotACycle` otherwise.
    pub async fn verify_cycle(&self, seed: &[PageId]) -> Result<CanonicalCycle, ClassifierError> {
        let cycle =
            CanonicalCycle::new(seed.to_vec()).ok_or_else(|| ClassifierError::NotACycle {
                rule: self.rule,
                reason: "seed is empty or contains duplicate pages".to_string(),
            })?;

        let members = cycle.members();
        for (i, &page) in members.iter().enumerate() {
            let expected = members[(i + 1) % members.len()];
            match self.successor(page).await? {
                Successor::Page(actual) if actual == expected => {}
                Successor::Page(actual) => {
                    return Err(ClassifierError::NotACycle {
                        rule: self.rule,
                        reason: format!(
                            "succ({}) = {} but the seed expects {}",
                            page, actual, expected
                        ),
                    });
                }
                Successor::Halt => {
                    return Err(ClassifierError::NotACycle {
                        rule: self.rule,
                        reason: format!("succ({}) = HALT inside the seed", page),
                    });
                }
            }
        }

        tracing::debug!(rule = %self.rule, cycle = %cycle, "seed cycle verified");
        Ok(cycle)
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

    /// A: [B, C], B: [A], C: [A], the worked example from the project notes.
    fn triangle_table() -> Arc<InMemoryLinkTable> {
        Arc::new(InMemoryLinkTable::from_pages(vec![
            (p(1), vec![p(2), p(3)]),
            (p(2), vec![p(1)]),
            (p(3), vec![p(1)]),
        ]))
    }

    #[tokio::test]
    async fn test_classify_reaches_shared_cycle() {
        let classifier = TerminalClassifier::new(triangle_table(), n(1));

        let a = classifier.classify(p(1)).await.unwrap();
        let b = classifier.classify(p(2)).await.unwrap();
        let c = classifier.classify(p(3)).await.unwrap();

        let expected = CanonicalCycle::new(vec![p(1), p(2)]).unwrap();
        assert_eq!(a.terminal, Terminal::Cycle(expected.clone()));
        assert_eq!(b.terminal, Terminal::Cycle(expected.clone()));
        assert_eq!(c.terminal, Terminal::Cycle(expected));

        assert_eq!(a.steps_to_terminal, 0);
        assert_eq!(b.steps_to_terminal, 0);
        assert_eq!(c.steps_to_terminal, 1);
    }

    #[tokio::test]
    async fn test_classify_halts_on_short_list() {
        let table = Arc::new(InMemoryLinkTable::from_pages(vec![
            (p(1), vec![p(2)]),
            (p(2), vec![]),
        ]));
        let classifier = TerminalClassifier::new(table, n(1));

        let trace = classifier.classify(p(1)).await.unwrap();
        assert_eq!(trace.terminal, Terminal::Halt);
        assert_eq!(trace.steps_to_terminal, 2);
        assert_eq!(trace.path, vec![p(1), p(2)]);

        // An immediately halting page reports one application, never zero.
        let direct = classifier.classify(p(2)).await.unwrap();
        assert_eq!(direct.steps_to_terminal, 1);
    }

    #[tokio::test]
    async fn test_dangling_target_halts() {
        let table = Arc::new(InMemoryLinkTable::from_pages(vec![(p(1), vec![p(99)])]));
        let classifier = TerminalClassifier::new(table, n(1));

        let trace = classifier.classify(p(1)).await.unwrap();
        assert_eq!(trace.terminal, Terminal::Halt);
    }

    #[tokio::test]
    async fn test_unknown_start_is_input_error() {
        let classifier = TerminalClassifier::new(triangle_table(), n(1));
        let err = classifier.classify(p(42)).await;
        assert!(matches!(err, Err(ClassifierError::PageNotFound(_))));
    }

    #[tokio::test]
    async fn test_step_fuse() {
        let table = Arc::new(InMemoryLinkTable::from_pages(vec![
            (p(1), vec![p(2)]),
            (p(2), vec![p(3)]),
            (p(3), vec![p(4)]),
            (p(4), vec![]),
        ]));
        let classifier = TerminalClassifier::new(table, n(1)).with_max_steps(2);

        let err = classifier.classify(p(1)).await;
        assert!(matches!(
            err,
            Err(ClassifierError::StepLimitExceeded { max_steps: 2, .. })
        ));
    }

    #[tokio::test]
    async fn test_verify_cycle_accepts_real_cycle() {
        let classifier = TerminalClassifier::new(triangle_table(), n(1));

        // Rotated input canonicalizes to the same cycle.
        let cycle = classifier.verify_cycle(&[p(2), p(1)]).await.unwrap();
        assert_eq!(cycle.members(), &[p(1), p(2)]);
    }

    #[tokio::test]
    async fn test_verify_cycle_rejects_non_cycle() {
        let classifier = TerminalClassifier::new(triangle_table(), n(1));

        // C's successor is A, not itself.
        let err = classifier.verify_cycle(&[p(3)]).await;
        assert!(matches!(err, Err(ClassifierError::NotACycle { .. })));

        let err = classifier.verify_cycle(&[]).await;
        assert!(matches!(err, Err(ClassifierError::NotACycle { .. })));
    }
}
