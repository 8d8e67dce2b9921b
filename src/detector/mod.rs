//! The carriage-track detector.
//!
//! Overview
//! - [`TrackDetector::detect`] takes a seed stroke in DTM cell coordinates
//!   and either returns a [`CarriageTrack`] or a failure status.
//! - An optional trial pass over a limited extent feeds a least-squares
//!   realignment of the stroke, after which the full detection reruns from
//!   the aligned stroke.
//! - Tracking walks outward from the central plateau scan by scan, guided
//!   by per-side trend registers and tolerant of a bounded number of fit
//!   failures.
//!
//! Fit failures inside the step loop are local events; only the status
//! codes of [`DetectionStatus`] ever surface.
//!
//! [`CarriageTrack`]: crate::track::CarriageTrack

mod params;
mod pipeline;
mod registers;
mod status;

pub use params::DetectorParams;
pub use pipeline::{TrackDetector, MAX_TRACK_WIDTH};
pub use registers::{SideRegisters, StabilityRegister, TrendRegister};
pub use status::DetectionStatus;
