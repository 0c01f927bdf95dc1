//! Typed ID aliases for persisted entities.
//!
//! Jobs are the exception: their ids are caller-supplied opaque strings, see
//! `domains::jobs::models::JobId`.

pub use super::id::Id;

// ============================================================================
// Entity marker types
// ============================================================================

/// Marker type for Organization entities (quota holders).
pub struct Organization;

/// Marker type for per-item analysis records.
pub struct AdAnalysis;

// ============================================================================
// Type aliases - the primary API
// ============================================================================

/// Typed ID for Organization entities.
pub type OrganizationId = Id<Organization>;

/// Typed ID for analysis records.
pub type AnalysisId = Id<AdAnalysis>;
