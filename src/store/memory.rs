//! In-memory link table.

use async_trait::async_trait;
use std::collections::BTreeMap;
use std::convert::Infallible;

use super::LinkTable;
use crate::types::PageId;

/// In-memory link table.
///
/// Uses a `BTreeMap` for deterministic enumeration order. Suitable for tests
/// and for analyses whose extracted link table fits in memory.
#[derive(Debug, Clone, Default)]
pub struct InMemoryLinkTable {
    pages: BTreeMap<PageId, Vec<PageId>>,
}

impl InMemoryLinkTable {
    /// Create a new empty table.
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a page with its ordered link list, replacing any prior entry.
    pub fn add_page(&mut self, page: PageId, links: Vec<PageId>) {
        self.pages.insert(page, links);
    }

    /// Build a table from `(page, links)` pairs.
    pub fn from_pages<I>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (PageId, Vec<PageId>)>,
    {
        let mut table = Self::new();
        for (page, links) in pairs {
            table.add_page(page, links);
        }
        table
    }

    /// Number of pages (synchronous convenience).
    pub fn len(&self) -> usize {
        self.pages.len()
    }

    /// True if the table holds no pages.
    pub fn is_empty(&self) -> bool {
        self.pages.is_empty()
    }
}

#[async_trait]
impl LinkTable for InMemoryLinkTable {
    type Error = Infallible;

    async fn links(&self, page: PageId) -> Result<Option<Vec<PageId>>, Self::Error> {
        Ok(self.pages.get(&page).cloned())
    }

    async fn page_ids(&self) -> Result<Vec<PageId>, Self::Error> {
        Ok(self.pages.keys().copied().collect())
    }

    async fn num_pages(&self) -> Result<usize, Self::Error> {
        Ok(self.pages.len())
    }
}
