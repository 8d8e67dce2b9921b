use crate::types::Pt3f;

/// One tile of ground points, binned into a regular cell array.
///
/// Storage is compact: all points in cell order in one vector, with a
/// per-cell offset table. Cells are addressed by global cell indices; the
/// tile covers `[cx0, cx0 + cols) × [cy0, cy0 + rows)`.
#[derive(Clone, Debug)]
pub struct PtTile {
    cx0: i32,
    cy0: i32,
    cols: i32,
    rows: i32,
    starts: Vec<u32>,
    pts: Vec<Pt3f>,
    track: Vec<bool>,
}

impl PtTile {
    /// Bins `points` into a tile anchored at global cell `(cx0, cy0)`.
    ///
    /// `xref`/`yref` is the terrain origin of cell `(0, 0)`; points whose
    /// cell falls outside the tile are dropped.
    pub fn build(
        cx0: i32,
        cy0: i32,
        cols: i32,
        rows: i32,
        cell_size: f32,
        xref: f64,
        yref: f64,
        points: &[Pt3f],
    ) -> Self {
        assert!(cols > 0 && rows > 0, "empty tile geometry");
        let ncells = (cols * rows) as usize;
        let local_cell = |p: &Pt3f| -> Option<usize> {
            let cx = ((p.x as f64 - xref) / cell_size as f64).floor() as i32 - cx0;
            let cy = ((p.y as f64 - yref) / cell_size as f64).floor() as i32 - cy0;
            if cx < 0 || cx >= cols || cy < 0 || cy >= rows {
                None
            } else {
                Some((cy * cols + cx) as usize)
            }
        };

        let mut counts = vec![0u32; ncells + 1];
        for p in points {
            if let Some(c) = local_cell(p) {
                counts[c + 1] += 1;
            }
        }
        for i in 1..counts.len() {
            counts[i] += counts[i - 1];
        }
        let total = counts[ncells] as usize;
        let mut pts = vec![Pt3f::default(); total];
        let mut cursor = counts.clone();
        for p in points {
            if let Some(c) = local_cell(p) {
                pts[cursor[c] as usize] = *p;
                cursor[c] += 1;
            }
        }
        Self {
            cx0,
            cy0,
            cols,
            rows,
            starts: counts,
            pts,
            track: vec![false; total],
        }
    }

    #[inline]
    pub fn columns(&self) -> i32 {
        self.cols
    }

    #[inline]
    pub fn rows(&self) -> i32 {
        self.rows
    }

    #[inline]
    pub fn point_count(&self) -> usize {
        self.pts.len()
    }

    /// Whether global cell `(i, j)` falls inside this tile.
    #[inline]
    pub fn covers(&self, i: i32, j: i32) -> bool {
        i >= self.cx0 && i < self.cx0 + self.cols && j >= self.cy0 && j < self.cy0 + self.rows
    }

    /// Points of global cell `(i, j)`, which must be covered.
    pub fn cell_points(&self, i: i32, j: i32) -> &[Pt3f] {
        debug_assert!(self.covers(i, j), "cell ({i}, {j}) outside tile");
        let c = ((j - self.cy0) * self.cols + (i - self.cx0)) as usize;
        let s = self.starts[c] as usize;
        let e = self.starts[c + 1] as usize;
        &self.pts[s..e]
    }

    /// Offset of the first point of global cell `(i, j)` in tile order.
    pub fn cell_offset(&self, i: i32, j: i32) -> usize {
        debug_assert!(self.covers(i, j), "cell ({i}, {j}) outside tile");
        let c = ((j - self.cy0) * self.cols + (i - self.cx0)) as usize;
        self.starts[c] as usize
    }

    /// Marks one point as belonging to a detected track.
    pub fn label_as_track(&mut self, point: usize) {
        if let Some(flag) = self.track.get_mut(point) {
            *flag = true;
        }
    }

    #[inline]
    pub fn is_track_point(&self, point: usize) -> bool {
        self.track.get(point).copied().unwrap_or(false)
    }

    /// Number of points labelled as track so far.
    pub fn track_point_count(&self) -> usize {
        self.track.iter().filter(|t| **t).count()
    }
}
