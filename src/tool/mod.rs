//! Seed-catalogue coordinator.
//!
//! [`RoadMapper`] drives the detector over a per-tile catalogue of seed
//! strokes, paints every accepted carriage track onto a [`RoadMap`]
//! occupancy raster and drops seeds whose stroke centre already lies on
//! painted ground. Successful seeds are recorded per tile and detected
//! tracks can be retained for export.

mod map;
mod mapper;

pub use map::RoadMap;
pub use mapper::RoadMapper;
