//! Serialisable run reports.

use crate::detector::DetectionStatus;
use crate::types::Pt2i;
use serde::Serialize;

/// Outcome of one seed.
#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SeedReport {
    pub seed_start: Pt2i,
    pub seed_end: Pt2i,
    pub status: DetectionStatus,
    pub status_code: i32,
    /// Number of plateaux in the detected track (0 on failure).
    pub spread: usize,
    /// Number of unaccepted plateaux.
    pub holes: usize,
    /// Relative lateral motion of the accepted centres.
    pub shift_length: f32,
    /// Whether the track was painted onto the road map.
    pub painted: bool,
}

/// Aggregated report of a mapping run.
#[derive(Clone, Debug, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MapperReport {
    /// Detected road sections.
    pub roads: usize,
    /// Seeds dropped because their centre was already covered.
    pub unused_seeds: usize,
    /// Point lookups outside resident tiles.
    pub outside_requests: usize,
    /// Covered map pixels at the end of the run.
    pub coverage: usize,
    pub elapsed_ms: f64,
    pub seeds: Vec<SeedReport>,
}
