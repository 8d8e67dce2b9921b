#![doc = include_str!("../README.md")]

// Public modules (stable-ish surface)
pub mod detector;
pub mod diagnostics;
pub mod tileset;
pub mod tool;
pub mod track;
pub mod types;

// Lower-level building blocks, public for tools and tests.
pub mod config;
pub mod plateau;
pub mod scanner;

// --- High-level re-exports -------------------------------------------------

pub use crate::detector::{DetectionStatus, DetectorParams, TrackDetector, MAX_TRACK_WIDTH};
pub use crate::plateau::{Plateau, PlateauParams, PlateauStatus};
pub use crate::tileset::PtTileSet;
pub use crate::tool::{RoadMap, RoadMapper};
pub use crate::track::CarriageTrack;

/// Small prelude for quick experiments.
///
/// ```no_run
/// use road_detector::prelude::*;
///
/// # fn main() {
/// let mut ptset = PtTileSet::new(1, 1, 100, 100, 0.5, 0.0, 0.0);
/// ptset.load_points();
/// let mut det = TrackDetector::default();
/// det.set_points_grid(100, 100, 1, 0.5);
/// let found = det.detect(&ptset, Pt2i::new(20, 10), Pt2i::new(20, 40));
/// println!("status={:?} found={}", det.status(), found.is_some());
/// # }
/// ```
pub mod prelude {
    pub use crate::detector::{DetectionStatus, DetectorParams, TrackDetector};
    pub use crate::plateau::PlateauParams;
    pub use crate::tileset::PtTileSet;
    pub use crate::tool::RoadMapper;
    pub use crate::track::CarriageTrack;
    pub use crate::types::{Pt2i, Pt3f};
}
