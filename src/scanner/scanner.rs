//! The strip rasterizer.

use super::pattern::{Octant, ScanPattern};
use crate::types::Pt2i;

/// Half-open clipping rectangle `[xmin, xmax) × [ymin, ymax)`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ClipRect {
    pub xmin: i32,
    pub ymin: i32,
    pub xmax: i32,
    pub ymax: i32,
}

impl ClipRect {
    pub fn new(xmin: i32, ymin: i32, xmax: i32, ymax: i32) -> Self {
        Self {
            xmin,
            ymin,
            xmax,
            ymax,
        }
    }

    /// Rectangle spanning `[0, w) × [0, h)`.
    pub fn of_size(w: i32, h: i32) -> Self {
        Self::new(0, 0, w, h)
    }

    #[inline]
    pub fn contains(&self, x: i32, y: i32) -> bool {
        x >= self.xmin && x < self.xmax && y >= self.ymin && y < self.ymax
    }
}

/// Behaviour flavour of a scanner.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ScanKind {
    /// Strip bounds fixed at construction; [`DirectionalScanner::bind_to`]
    /// is a no-op.
    Static,
    /// Cursors are realigned into the strip on each advance and the strip
    /// can be rebound between steps.
    Adaptive,
    /// Degenerate axis-aligned direction; rebinds like `Adaptive`.
    Vh,
}

#[derive(Clone, Copy, Debug)]
struct Cursor {
    x: i32,
    y: i32,
    phase: usize,
}

/// Incremental rasterizer for a strip of parallel discrete scan lines.
///
/// The strip is bounded by the two lines `a·x + b·y = c1` and
/// `a·x + b·y = c2` (`c1 ≥ c2`); each scan line is a naive digital line in
/// the direction `(a, b)` walked from the `c2` side to the `c1` side.
/// `next_on_left` / `next_on_right` move to the neighbour line on either
/// side of the central one; the left and right cursors only ever drift
/// apart. All returned points lie inside the clip rectangle.
#[derive(Clone, Debug)]
pub struct DirectionalScanner {
    clip: ClipRect,
    kind: ScanKind,
    oct: Octant,
    pattern: ScanPattern,
    dla: i32,
    dlb: i32,
    dlc1: i64,
    dlc2: i64,
    templ_a: i32,
    templ_b: i32,
    templ_nu: i64,
    ccur: Cursor,
    lcur: Cursor,
    rcur: Cursor,
}

impl DirectionalScanner {
    /// Builds a scanner from a strip given by its two bounding offsets.
    ///
    /// `(cx, cy)` must lie on the central scan line; it anchors the pattern
    /// phase. `(a, b)` must be in normalised form.
    #[allow(clippy::too_many_arguments)]
    pub fn from_bounds(
        clip: ClipRect,
        a: i32,
        b: i32,
        c1: i64,
        c2: i64,
        pattern: ScanPattern,
        kind: ScanKind,
        cx: i32,
        cy: i32,
    ) -> Self {
        let (lo, hi) = if c1 < c2 { (c1, c2) } else { (c2, c1) };
        let mut scanner = Self {
            clip,
            kind,
            oct: Octant::of(a, b),
            pattern,
            dla: a,
            dlb: b,
            dlc1: hi,
            dlc2: lo,
            templ_a: a,
            templ_b: b,
            templ_nu: hi - lo,
            ccur: Cursor { x: cx, y: cy, phase: 0 },
            lcur: Cursor { x: cx, y: cy, phase: 0 },
            rcur: Cursor { x: cx, y: cy, phase: 0 },
        };
        scanner.align_cursors();
        scanner
    }

    /// Builds a scanner from a start point on one bounding line and the
    /// offset `c` of the other bounding line.
    #[allow(clippy::too_many_arguments)]
    pub fn from_start(
        clip: ClipRect,
        a: i32,
        b: i32,
        c: i64,
        pattern: ScanPattern,
        kind: ScanKind,
        sx: i32,
        sy: i32,
    ) -> Self {
        let start = a as i64 * sx as i64 + b as i64 * sy as i64;
        Self::from_bounds(clip, a, b, start, c, pattern, kind, sx, sy)
    }

    /// Builds a scanner from the central scan centre and a strip length
    /// counted in pattern steps.
    #[allow(clippy::too_many_arguments)]
    pub fn from_center_length(
        clip: ClipRect,
        a: i32,
        b: i32,
        pattern: ScanPattern,
        kind: ScanKind,
        cx: i32,
        cy: i32,
        length: i32,
    ) -> Self {
        let mut scanner = Self {
            clip,
            kind,
            oct: Octant::of(a, b),
            pattern,
            dla: a,
            dlb: b,
            dlc1: 0,
            dlc2: 0,
            templ_a: a,
            templ_b: b,
            templ_nu: 0,
            ccur: Cursor { x: cx, y: cy, phase: 0 },
            lcur: Cursor { x: cx, y: cy, phase: 0 },
            rcur: Cursor { x: cx, y: cy, phase: 0 },
        };
        let w2 = (length + 1) / 2;
        let mut fwd = scanner.lcur;
        let mut back = scanner.lcur;
        for _ in 0..w2 {
            scanner.step_forward(&mut fwd);
            scanner.step_back(&mut back);
        }
        scanner.dlc1 = scanner.value(fwd.x, fwd.y);
        scanner.dlc2 = scanner.value(back.x, back.y);
        scanner.templ_nu = scanner.dlc1 - scanner.dlc2;
        scanner.align_cursors();
        scanner
    }

    #[inline]
    pub fn kind(&self) -> ScanKind {
        self.kind
    }

    #[inline]
    pub fn octant(&self) -> Octant {
        self.oct
    }

    /// Current strip offsets `(c1, c2)`.
    #[inline]
    pub fn strip_bounds(&self) -> (i64, i64) {
        (self.dlc1, self.dlc2)
    }

    #[inline]
    fn value(&self, x: i32, y: i32) -> i64 {
        self.dla as i64 * x as i64 + self.dlb as i64 * y as i64
    }

    /// One pattern step along the scan direction. The line value strictly
    /// increases.
    fn step_forward(&self, cur: &mut Cursor) {
        let step = self.pattern.step(cur.phase);
        if self.oct.x_major {
            if step {
                cur.y += self.oct.ss;
            }
            cur.x += self.oct.sp;
        } else {
            if step {
                cur.x += self.oct.ss;
            }
            cur.y += self.oct.sp;
        }
        cur.phase = self.pattern.next_phase(cur.phase);
    }

    /// Inverse of [`Self::step_forward`].
    fn step_back(&self, cur: &mut Cursor) {
        cur.phase = self.pattern.prev_phase(cur.phase);
        let step = self.pattern.step(cur.phase);
        if self.oct.x_major {
            cur.x -= self.oct.sp;
            if step {
                cur.y -= self.oct.ss;
            }
        } else {
            cur.y -= self.oct.sp;
            if step {
                cur.x -= self.oct.ss;
            }
        }
    }

    /// Moves a cursor to the neighbour scan line; the pattern phase is
    /// preserved because neighbour lines are secondary-axis translates.
    fn shift_lateral(&self, cur: &mut Cursor, amount: i32) {
        if self.oct.x_major {
            cur.y += amount;
        } else {
            cur.x += amount;
        }
    }

    /// Walks the cursor along its line to the first pixel whose value lies
    /// in the strip.
    fn realign(&self, cur: &mut Cursor) {
        while self.value(cur.x, cur.y) >= self.dlc2 {
            self.step_back(cur);
        }
        while self.value(cur.x, cur.y) < self.dlc2 {
            self.step_forward(cur);
        }
    }

    fn align_cursors(&mut self) {
        let mut l = self.lcur;
        self.realign(&mut l);
        self.ccur = l;
        self.lcur = l;
        self.rcur = l;
    }

    /// Collects the line through `cur`, clipped to the strip and the
    /// rectangle. Points are appended; the new length is returned.
    fn scan_from(&self, mut cur: Cursor, out: &mut Vec<Pt2i>) -> usize {
        while self.value(cur.x, cur.y) < self.dlc2 {
            self.step_forward(&mut cur);
        }
        while self.value(cur.x, cur.y) <= self.dlc1 && !self.clip.contains(cur.x, cur.y) {
            self.step_forward(&mut cur);
        }
        while self.value(cur.x, cur.y) <= self.dlc1 && self.clip.contains(cur.x, cur.y) {
            out.push(Pt2i::new(cur.x, cur.y));
            self.step_forward(&mut cur);
        }
        out.len()
    }

    /// Appends the central scan line and returns the new vector length.
    /// The central line is fixed at construction; side walks never move it.
    pub fn first(&self, out: &mut Vec<Pt2i>) -> usize {
        self.scan_from(self.ccur, out)
    }

    /// Advances one scan to the left and appends its points.
    pub fn next_on_left(&mut self, out: &mut Vec<Pt2i>) -> usize {
        let mut cur = self.lcur;
        self.shift_lateral(&mut cur, self.oct.lat_left);
        self.realign(&mut cur);
        self.lcur = cur;
        self.scan_from(cur, out)
    }

    /// Advances one scan to the right and appends its points.
    pub fn next_on_right(&mut self, out: &mut Vec<Pt2i>) -> usize {
        let mut cur = self.rcur;
        self.shift_lateral(&mut cur, -self.oct.lat_left);
        self.realign(&mut cur);
        self.rcur = cur;
        self.scan_from(cur, out)
    }

    /// Advances `n` scans to the left and appends the landing scan.
    pub fn skip_left(&mut self, out: &mut Vec<Pt2i>, n: usize) -> usize {
        let mut cur = self.lcur;
        self.shift_lateral(&mut cur, self.oct.lat_left * n as i32);
        self.realign(&mut cur);
        self.lcur = cur;
        self.scan_from(cur, out)
    }

    /// Advances `n` scans to the right and appends the landing scan.
    pub fn skip_right(&mut self, out: &mut Vec<Pt2i>, n: usize) -> usize {
        let mut cur = self.rcur;
        self.shift_lateral(&mut cur, -self.oct.lat_left * n as i32);
        self.realign(&mut cur);
        self.rcur = cur;
        self.scan_from(cur, out)
    }

    /// Skips `n` scans to the left without collecting; the next advance
    /// lands where the `n`-th scan would have been.
    pub fn pass_left(&mut self, n: usize) {
        let mut cur = self.lcur;
        self.shift_lateral(&mut cur, self.oct.lat_left * (n as i32 - 1));
        self.lcur = cur;
    }

    /// Skips `n` scans to the right without collecting.
    pub fn pass_right(&mut self, n: usize) {
        let mut cur = self.rcur;
        self.shift_lateral(&mut cur, -self.oct.lat_left * (n as i32 - 1));
        self.rcur = cur;
    }

    /// Moves the strip to a new direction and offset between steps.
    ///
    /// The strip half-width is rescaled from the construction template by
    /// whichever of the 1-norm or ∞-norm ratios grew more, so rebinding
    /// never collapses the strip. Cursors keep their position and are
    /// realigned on the next advance. The new direction must stay in the
    /// construction octant (the step pattern is not rebuilt). Static
    /// scanners ignore the call.
    pub fn bind_to(&mut self, a: i32, b: i32, c: i64) {
        if self.kind == ScanKind::Static {
            return;
        }
        let (a, b, c) = if a < 0 || (a == 0 && b < 0) {
            (-a, -b, -c)
        } else {
            (a, b, c)
        };
        debug_assert_eq!(
            Octant::of(a, b).index(),
            self.oct.index(),
            "rebinding across octants"
        );
        self.dla = a;
        self.dlb = b;
        let old_a = self.templ_a.abs() as i64;
        let old_b = self.templ_b.abs() as i64;
        let old_n1 = old_a + old_b;
        let old_ninf = old_a.max(old_b);
        let new_a = a.abs() as i64;
        let new_b = b.abs() as i64;
        let new_n1 = new_a + new_b;
        let new_ninf = new_a.max(new_b);
        let nu = if new_n1 * old_ninf > old_n1 * new_ninf {
            self.templ_nu * new_n1 / old_n1
        } else {
            self.templ_nu * new_ninf / old_ninf
        };
        debug_assert!(nu >= 0, "strip width must stay non-negative");
        self.dlc1 = c + nu / 2;
        self.dlc2 = c - nu / 2;
    }
}
