//! Per-run analysis manifest.
//!
//! Bundles the content hashes of one (rule, seed cycle) run's artifacts so
//! a run can be replayed and byte-compared later. The timestamp is recorded
//! for bookkeeping but excluded from the manifest hash: two identical runs
//! at different times hash identically.

use chrono::Utc;
use serde::{Deserialize, Serialize};

use crate::branch::BranchDecomposition;
use crate::canonical::canonical_hash_hex;
use crate::chase::ChaseTrace;
use crate::metrics::ConcentrationMetrics;

/// Manifest schema version. Increment on breaking changes.
pub const MANIFEST_SCHEMA_VERSION: &str = "basin_manifest_v1";

/// Provenance record for one basin analysis run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisManifest {
    /// Manifest schema version.
    pub schema_version: String,
    /// Rule index the run used.
    pub rule: u32,
    /// Basin key of the analyzed cycle.
    pub basin_key: String,
    /// Wall-clock creation time, milliseconds since epoch. Not hashed.
    pub created_at_ms: i64,
    /// Hash of the per-depth basin table.
    pub basin_hash: String,
    /// Hash of the ranked branch table.
    pub branch_hash: String,
    /// Hash of the concentration metrics row.
    pub metrics_hash: String,
    /// Hash of the chase trace, when a chase was run.
    pub chase_hash: Option<String>,
    /// True if any bundled artifact derives from a truncated basin.
    pub partial: bool,
    /// Hash over all content fields above (timestamp excluded).
    pub manifest_hash: String,
}

impl AnalysisManifest {
    /// Build a manifest from a run's artifacts.
    pub fn new(
        decomposition: &BranchDecomposition,
        metrics: &ConcentrationMetrics,
        chase: Option<&ChaseTrace>,
    ) -> Self {
        let basin_hash = decomposition.basin.result_hash();
        let branch_hash = canonical_hash_hex(&decomposition.branches);
        let metrics_hash = canonical_hash_hex(metrics);
        let chase_hash = chase.map(|c| c.result_hash());
        let partial =
            decomposition.basin.partial || chase.map(|c| c.partial).unwrap_or(false);

        let manifest_hash = canonical_hash_hex(&(
            MANIFEST_SCHEMA_VERSION,
            decomposition.basin.rule,
            &decomposition.basin.basin_key,
            &basin_hash,
            &branch_hash,
            &metrics_hash,
            &chase_hash,
            partial,
        ));

        Self {
            schema_version: MANIFEST_SCHEMA_VERSION.to_string(),
            rule: decomposition.basin.rule,
            basin_key: decomposition.basin.basin_key.clone(),
            created_at_ms: Utc::now().timestamp_millis(),
            basin_hash,
            branch_hash,
            metrics_hash,
            chase_hash,
            partial,
            manifest_hash,
        }
    }
}
