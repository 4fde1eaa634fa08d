//! Core types for the basin kernel.

pub mod page;
pub mod terminal;

pub use page::{succ_from_links, PageId, PageRef, RuleIndex, RuleIndexError, Successor};
pub use terminal::{CanonicalCycle, Terminal};
