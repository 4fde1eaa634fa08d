//! Link table abstraction.
//!
//! The link table is the immutable input snapshot: every page's ordered
//! outgoing link list, supplied by an external extraction pipeline. The
//! kernel only ever reads it.

pub mod memory;

pub use memory::InMemoryLinkTable;

use async_trait::async_trait;

use crate::types::PageId;

/// Read-only access to the ordered link lists of a page set.
///
/// Implementations must be stable for the duration of an analysis: repeated
/// calls with the same page id return the same list.
#[async_trait]
pub trait LinkTable: Send + Sync {
    /// Error type for table operations.
    type Error: std::error::Error + Send + Sync + 'static;

    /// Ordered outgoing link list for a page, `None` if the page is unknown.
    async fn links(&self, page: PageId) -> Result<Option<Vec<PageId>>, Self::Error>;

    /// Enumerate all page ids in ascending order.
    async fn page_ids(&self) -> Result<Vec<PageId>, Self::Error>;

    /// Number of pages in the table.
    async fn num_pages(&self) -> Result<usize, Self::Error>;
}
