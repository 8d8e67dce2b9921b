use super::tile::PtTile;
use crate::types::Pt3f;
use log::debug;
use std::collections::VecDeque;

/// Grid of point tiles with spatial cell lookup and buffered traversal.
///
/// Tile indices are row-major (`k = ty * cot + tx`). A lookup in a
/// non-resident tile simply answers `false`; out-of-range *tile* indices are
/// a programming error.
#[derive(Debug)]
pub struct PtTileSet {
    cot: usize,
    rot: usize,
    tile_cols: i32,
    tile_rows: i32,
    cell_size: f32,
    xref: f64,
    yref: f64,
    tiles: Vec<Option<PtTile>>,
    loaded: Vec<bool>,
    buffer_size: usize,
    traversal: Option<Traversal>,
}

#[derive(Debug)]
struct Traversal {
    next: usize,
    resident: VecDeque<usize>,
}

impl PtTileSet {
    /// Creates an empty `cot × rot` tile grid.
    ///
    /// Each tile spans `tile_cols × tile_rows` cells of `cell_size` metres;
    /// `(xref, yref)` is the terrain position of cell `(0, 0)`.
    pub fn new(
        cot: usize,
        rot: usize,
        tile_cols: i32,
        tile_rows: i32,
        cell_size: f32,
        xref: f64,
        yref: f64,
    ) -> Self {
        assert!(cot > 0 && rot > 0, "empty tile grid");
        assert!(cell_size > 0.0, "cell size must be positive");
        Self {
            cot,
            rot,
            tile_cols,
            tile_rows,
            cell_size,
            xref,
            yref,
            tiles: (0..cot * rot).map(|_| None).collect(),
            loaded: vec![false; cot * rot],
            buffer_size: 0,
            traversal: None,
        }
    }

    #[inline]
    pub fn columns_of_tiles(&self) -> usize {
        self.cot
    }

    #[inline]
    pub fn rows_of_tiles(&self) -> usize {
        self.rot
    }

    #[inline]
    pub fn cell_size(&self) -> f32 {
        self.cell_size
    }

    #[inline]
    pub fn xref(&self) -> f64 {
        self.xref
    }

    #[inline]
    pub fn yref(&self) -> f64 {
        self.yref
    }

    /// Width of the whole grid in cells.
    #[inline]
    pub fn cell_width(&self) -> i32 {
        self.cot as i32 * self.tile_cols
    }

    /// Height of the whole grid in cells.
    #[inline]
    pub fn cell_height(&self) -> i32 {
        self.rot as i32 * self.tile_rows
    }

    /// Installs a tile at grid position `(tx, ty)`.
    pub fn add_tile(&mut self, tx: usize, ty: usize, tile: PtTile) {
        debug_assert!(tx < self.cot && ty < self.rot, "tile ({tx}, {ty}) out of grid");
        debug_assert_eq!(tile.columns(), self.tile_cols);
        debug_assert_eq!(tile.rows(), self.tile_rows);
        self.tiles[ty * self.cot + tx] = Some(tile);
    }

    /// Bins loose points into the grid, creating tiles as needed.
    pub fn add_points(&mut self, points: &[Pt3f]) {
        for ty in 0..self.rot {
            for tx in 0..self.cot {
                let cx0 = tx as i32 * self.tile_cols;
                let cy0 = ty as i32 * self.tile_rows;
                let tile = PtTile::build(
                    cx0,
                    cy0,
                    self.tile_cols,
                    self.tile_rows,
                    self.cell_size,
                    self.xref,
                    self.yref,
                    points,
                );
                if tile.point_count() > 0 || self.tiles[ty * self.cot + tx].is_none() {
                    self.add_tile(tx, ty, tile);
                }
            }
        }
    }

    #[inline]
    pub fn is_loaded(&self, k: usize) -> bool {
        debug_assert!(k < self.cot * self.rot, "tile index {k} out of range");
        self.loaded[k]
    }

    /// Marks every installed tile resident (unbuffered mode).
    pub fn load_points(&mut self) -> bool {
        let mut any = false;
        for k in 0..self.tiles.len() {
            if self.tiles[k].is_some() {
                self.loaded[k] = true;
                any = true;
            }
        }
        any
    }

    /// Enters buffered mode with the given residency capacity
    /// (0 keeps everything resident once visited).
    pub fn set_buffer_size(&mut self, size: usize) {
        self.buffer_size = size;
    }

    /// Starts (or restarts) the buffered boustrophedon traversal; all tiles
    /// become non-resident until visited.
    pub fn create_buffers(&mut self) {
        self.loaded.iter_mut().for_each(|l| *l = false);
        self.traversal = Some(Traversal {
            next: 0,
            resident: VecDeque::new(),
        });
    }

    /// Brings the next tile of the traversal resident and returns its index;
    /// `None` once every tile has been visited.
    ///
    /// Rows are walked in alternating direction so consecutive tiles stay
    /// spatially adjacent.
    pub fn next_tile(&mut self) -> Option<usize> {
        let traversal = self.traversal.as_mut()?;
        while traversal.next < self.cot * self.rot {
            let ord = traversal.next;
            traversal.next += 1;
            let j = ord / self.cot;
            let i = ord % self.cot;
            let k = j * self.cot + if j % 2 != 0 { self.cot - 1 - i } else { i };
            if self.tiles[k].is_none() {
                continue;
            }
            self.loaded[k] = true;
            traversal.resident.push_back(k);
            if self.buffer_size != 0 {
                while traversal.resident.len() > self.buffer_size {
                    if let Some(old) = traversal.resident.pop_front() {
                        self.loaded[old] = false;
                        debug!("evicting tile {old}");
                    }
                }
            }
            return Some(k);
        }
        None
    }

    fn tile_of_cell(&self, i: i32, j: i32) -> Option<usize> {
        if i < 0 || j < 0 || i >= self.cell_width() || j >= self.cell_height() {
            return None;
        }
        let tx = (i / self.tile_cols) as usize;
        let ty = (j / self.tile_rows) as usize;
        Some(ty * self.cot + tx)
    }

    /// Appends every point of planar cell `(i, j)` to `out`.
    ///
    /// Returns `false` when the cell lies outside any resident tile; the
    /// caller decides whether to count that as an out-of-bounds request.
    pub fn collect_points(&self, out: &mut Vec<Pt3f>, i: i32, j: i32) -> bool {
        let Some(k) = self.tile_of_cell(i, j) else {
            return false;
        };
        if !self.loaded[k] {
            return false;
        }
        let Some(tile) = self.tiles[k].as_ref() else {
            return false;
        };
        out.extend_from_slice(tile.cell_points(i, j));
        true
    }

    /// Like [`Self::collect_points`] but also records, per point, the tile
    /// index and in-tile point index needed to label it later.
    pub fn collect_points_and_labels(
        &self,
        out: &mut Vec<Pt3f>,
        tile_labels: &mut Vec<usize>,
        point_labels: &mut Vec<usize>,
        i: i32,
        j: i32,
    ) -> bool {
        let Some(k) = self.tile_of_cell(i, j) else {
            return false;
        };
        if !self.loaded[k] {
            return false;
        }
        let Some(tile) = self.tiles[k].as_ref() else {
            return false;
        };
        let base = tile.cell_offset(i, j);
        for (off, p) in tile.cell_points(i, j).iter().enumerate() {
            out.push(*p);
            tile_labels.push(k);
            point_labels.push(base + off);
        }
        true
    }

    /// Marks one stored point as a track return.
    pub fn label_as_track(&mut self, tile_label: usize, point_label: usize) {
        debug_assert!(tile_label < self.cot * self.rot);
        if let Some(tile) = self.tiles[tile_label].as_mut() {
            tile.label_as_track(point_label);
        }
    }

    /// Total number of points labelled as track.
    pub fn track_point_count(&self) -> usize {
        self.tiles
            .iter()
            .flatten()
            .map(|t| t.track_point_count())
            .sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn grid_with_points() -> PtTileSet {
        let mut set = PtTileSet::new(2, 2, 4, 4, 0.5, 0.0, 0.0);
        let pts = vec![
            Pt3f::new(0.1, 0.1, 1.0),
            Pt3f::new(2.2, 0.2, 2.0), // second tile column
            Pt3f::new(0.3, 2.3, 3.0), // second tile row
        ];
        set.add_points(&pts);
        set
    }

    #[test]
    fn lookup_requires_residency() {
        let mut set = grid_with_points();
        let mut out = Vec::new();
        assert!(!set.collect_points(&mut out, 0, 0));
        assert!(out.is_empty());
        set.load_points();
        assert!(set.collect_points(&mut out, 0, 0));
        assert_eq!(out.len(), 1);
        assert!(set.collect_points(&mut out, 4, 0));
        assert_eq!(out.len(), 2);
    }

    #[test]
    fn out_of_grid_cells_answer_false() {
        let mut set = grid_with_points();
        set.load_points();
        let mut out = Vec::new();
        assert!(!set.collect_points(&mut out, -1, 0));
        assert!(!set.collect_points(&mut out, 8, 0));
        assert!(out.is_empty());
    }

    #[test]
    fn traversal_is_boustrophedon() {
        let mut set = PtTileSet::new(3, 2, 2, 2, 0.5, 0.0, 0.0);
        let pts: Vec<Pt3f> = (0..6)
            .flat_map(|ty| (0..3).map(move |tx| Pt3f::new(tx as f32 + 0.1, ty as f32 * 0.34, 0.0)))
            .collect();
        set.add_points(&pts);
        set.create_buffers();
        let mut order = Vec::new();
        while let Some(k) = set.next_tile() {
            order.push(k);
        }
        assert_eq!(order, vec![0, 1, 2, 5, 4, 3]);
    }

    #[test]
    fn buffer_capacity_evicts_oldest() {
        let mut set = grid_with_points();
        set.set_buffer_size(1);
        set.create_buffers();
        let first = set.next_tile().unwrap();
        assert!(set.is_loaded(first));
        let second = set.next_tile().unwrap();
        assert!(set.is_loaded(second));
        assert!(!set.is_loaded(first));
    }

    #[test]
    fn labels_round_trip_through_the_set() {
        let mut set = grid_with_points();
        set.load_points();
        let mut out = Vec::new();
        let mut tls = Vec::new();
        let mut lbs = Vec::new();
        assert!(set.collect_points_and_labels(&mut out, &mut tls, &mut lbs, 0, 0));
        assert_eq!(out.len(), 1);
        set.label_as_track(tls[0], lbs[0]);
        assert_eq!(set.track_point_count(), 1);
    }
}
