//! Synthetic mountainside point clouds with a carved road.

use road_detector::types::Pt3f;
use road_detector::PtTileSet;

/// Hillside scene: a V-shaped cross-slope with an optional flat road notch.
///
/// The terrain is sampled on a regular grid; at every `x` where
/// `road_at(x)` holds, heights within `half_width` of the road centre are
/// flattened to the base height and the slope resumes beyond the shoulder.
/// Columns where `sampled(x)` is false produce no returns at all.
pub struct Scene {
    /// Square extent in metres.
    pub size: f32,
    /// Sampling step in metres.
    pub step: f32,
    /// Road centre at the scene middle.
    pub road_y: f32,
    /// Lateral drift of the road centre per metre of `x`.
    pub drift: f32,
    /// Road half width.
    pub half_width: f32,
    /// Road surface height.
    pub base_height: f32,
    /// Cross slope on both sides of the road (metres per metre).
    pub cross_slope: f32,
}

impl Default for Scene {
    fn default() -> Self {
        Self {
            size: 30.0,
            step: 0.25,
            road_y: 15.0,
            drift: 0.0,
            half_width: 1.5,
            base_height: 100.0,
            cross_slope: 0.8,
        }
    }
}

impl Scene {
    /// Road centre at a given `x`.
    pub fn centre_at(&self, x: f32) -> f32 {
        self.road_y + self.drift * (x - self.size * 0.5)
    }

    /// Builds the cloud with per-column road and sampling predicates.
    pub fn cloud_where(
        &self,
        road_at: impl Fn(f32) -> bool,
        sampled: impl Fn(f32) -> bool,
    ) -> Vec<Pt3f> {
        let mut pts = Vec::new();
        let n = (self.size / self.step) as i32;
        for i in 0..n {
            let x = (i as f32 + 0.5) * self.step;
            if !sampled(x) {
                continue;
            }
            let on_road = road_at(x);
            let ry = self.centre_at(x);
            for j in 0..n {
                let y = (j as f32 + 0.5) * self.step;
                let off = (y - ry).abs();
                let z = if on_road {
                    self.base_height + (off - self.half_width).max(0.0) * self.cross_slope
                } else {
                    self.base_height + off * self.cross_slope
                };
                pts.push(Pt3f::new(x, y, z));
            }
        }
        pts
    }

    /// Cloud with the road present everywhere.
    pub fn cloud(&self) -> Vec<Pt3f> {
        self.cloud_where(|_| true, |_| true)
    }
}

/// Single-tile point store over `cells × cells` cells of `cell_size` metres,
/// loaded and ready for lookups.
pub fn loaded_tile_set(points: &[Pt3f], cells: i32, cell_size: f32) -> PtTileSet {
    let mut set = PtTileSet::new(1, 1, cells, cells, cell_size, 0.0, 0.0);
    set.add_points(points);
    set.load_points();
    set
}
