//! Title/id resolution at the boundary.
//!
//! The traversal core only ever sees `PageId`. A `PageRef` supplied at the
//! boundary (CLI arguments, report labels) is resolved exactly once here and
//! never inside a BFS hot path.

use std::collections::HashMap;

use crate::types::{PageId, PageRef};

/// Error type for reference resolution.
#[derive(Debug, Clone, thiserror::Error)]
pub enum ResolveError {
    /// Title has no known page id.
    #[error("Unresolvable title: {0:?}")]
    UnknownTitle(String),
}

/// Title to page-id mapping, supplied externally.
pub trait TitleResolver {
    /// Page id for a title, if known.
    fn id_for_title(&self, title: &str) -> Option<PageId>;

    /// Title for a page id, if known. Used only when rendering reports.
    fn title_for_id(&self, page: PageId) -> Option<&str>;
}

/// In-memory title resolver for tests and small analyses.
#[derive(Debug, Clone, Default)]
pub struct InMemoryTitleResolver {
    by_title: HashMap<String, PageId>,
    by_id: HashMap<PageId, String>,
}

impl InMemoryTitleResolver {
    /// Create an empty resolver.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a title for a page id.
    pub fn insert(&mut self, title: impl Into<String>, page: PageId) {
        let title = title.into();
        self.by_title.insert(title.clone(), page);
        self.by_id.insert(page, title);
    }
}

impl TitleResolver for InMemoryTitleResolver {
    fn id_for_title(&self, title: &str) -> Option<PageId> {
        self.by_title.get(title).copied()
    }

    fn title_for_id(&self, page: PageId) -> Option<&str> {
        self.by_id.get(&page).map(|s| s.as_str())
    }
}

/// Resolve a page reference into a concrete id.
///
/// `ById` passes through untouched; `ByTitle` consults the resolver and
/// fails fast on unknown titles.
pub fn resolve_page_ref(
    page_ref: &PageRef,
    resolver: &dyn TitleResolver,
) -> Result<PageId, ResolveError> {
    match page_ref {
        PageRef::ById(id) => Ok(*id),
        PageRef::ByTitle(title) => resolver
            .id_for_title(title)
            .ok_or_else(|| ResolveError::UnknownTitle(title.clone())),
    }
}
