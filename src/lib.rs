//! # basin-kernel
//!
//! Deterministic basin decomposition and branch analysis for N-link
//! traversal of link graphs.
//!
//! The kernel answers one question:
//!
//! > Under the rule "always follow the Nth link", which pages eventually
//! > fall into a given terminal cycle, and through which entry branches?
//!
//! ## Core Contract
//!
//! 1. Given a link table and a rule index N, classify any page's fate
//!    (halt, or a canonicalized terminal cycle)
//! 2. Materialize the reverse successor index once per N and map the full
//!    ancestor basin of a verified seed cycle, layer by layer
//! 3. Decompose the basin into entry-rooted branches, score their
//!    concentration, chase the dominant branch upstream, and compare basin
//!    membership across several N
//!
//! ## Architecture
//!
//! ```text
//! LinkTable → succ_N → TerminalClassifier (validation)
//!                   → EdgeIndex(N) → BasinMapper / BranchDecomposer
//!                                       → ConcentrationMetrics → DominantChaser
//! per-N results → MultiplexTunnelAnalyzer
//! ```
//!
//! ## Determinism Guarantees
//!
//! - Same table + same N + same seed → identical tables and result hashes
//! - Layers, predecessor lists, and report rows are ordered by page id
//! - Truncated traversals are always explicitly flagged partial

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod basin;
pub mod branch;
pub mod canonical;
pub mod chase;
pub mod classifier;
pub mod edge_index;
pub mod manifest;
pub mod metrics;
pub mod multiplex;
pub mod resolve;
pub mod store;
pub mod types;

// Re-exports
pub use types::{
    succ_from_links, CanonicalCycle, PageId, PageRef, RuleIndex, RuleIndexError, Successor,
    Terminal,
};
pub use store::{InMemoryLinkTable, LinkTable};
pub use resolve::{resolve_page_ref, InMemoryTitleResolver, ResolveError, TitleResolver};
pub use classifier::{ClassifierError, ForwardTrace, TerminalClassifier};
pub use edge_index::{EdgeIndex, EdgeIndexError};
pub use basin::{map_above, map_basin, BasinLimits, BasinMap, DepthRow, Truncation};
pub use branch::{
    decompose, decompose_above, BranchDecomposition, BranchRow, BranchStats,
};
pub use metrics::{concentration, ConcentrationMetrics};
pub use chase::{ChaseConfig, ChaseHop, ChaseTrace, CollapseReason, DominantChaser};
pub use multiplex::{
    Mechanism, MultiplexError, MultiplexTunnelAnalyzer, TunnelReport, TunnelRow,
};
pub use manifest::{AnalysisManifest, MANIFEST_SCHEMA_VERSION};
pub use canonical::{canonical_hash, canonical_hash_hex, to_canonical_bytes};

/// Schema version for all basin kernel result types.
/// Increment on breaking changes to any schema type.
pub const BASIN_KERNEL_SCHEMA_VERSION: &str = "1.0.0";
