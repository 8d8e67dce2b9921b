//! Cross-section plateau fitting.

use super::params::PlateauParams;
use crate::types::Pt2f;
use serde::Serialize;
use std::collections::VecDeque;

/// Minimum sample support for a trustworthy fit, and minimum scan
/// population before a failure counts against the tracker.
const MIN_PTS: usize = 5;
/// Endpoint samples further than this factor times the mean gap from the
/// window interior are trimmed off.
const TRIM_FACTOR: f32 = 3.0;
/// Reach beyond an endpoint when probing for a rising margin.
const BOUND_REACH: f32 = 1.0;
/// Maximum sample gap bridged inside a height-hinted window.
const HINT_GAP: f32 = 1.0;

/// Fit outcome, ordered by quality (`Ok` best). Lateral retries keep the
/// plateau with the greater status.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Serialize)]
pub enum PlateauStatus {
    /// No sample at all under the scan.
    Empty,
    /// Too few samples to attempt a fit.
    NotEnoughPoints,
    /// No interval fits under the height band.
    NoBand,
    /// The flat interval exceeds the maximum width.
    TooWide,
    /// The widest band interval stays below the minimum width.
    TooNarrow,
    /// A well-formed interval sits outside the tolerated lateral shift.
    Shifted,
    /// The optimal height band was found with too little support; callers
    /// may retry with the reported minimum height.
    OptimalHeightUnderUsed,
    Ok,
}

/// Reference interval guiding a tracked fit.
#[derive(Clone, Copy, Debug)]
pub struct TrackRef {
    pub start: f32,
    pub end: f32,
    /// Expected minimum height; `None` when no height anchor exists yet.
    pub height: Option<f32>,
}

/// One cross-section fit.
///
/// Created per scan by the detector and appended to a carriage track, which
/// then owns it. Distances are measured along the stroke from its first
/// endpoint, heights are LiDAR elevations.
#[derive(Clone, Debug)]
pub struct Plateau {
    scan_shift: i32,
    status: PlateauStatus,
    internal_start: f32,
    internal_end: f32,
    estimated_start: f32,
    estimated_end: f32,
    estimated_center: f32,
    min_height: f32,
    start_index: usize,
    end_index: usize,
    support: usize,
    deviation: f32,
    slope: f32,
    bounded_start: bool,
    bounded_end: bool,
    reliable: bool,
    accepted: bool,
    possible: bool,
    consistent_height: bool,
    enough_points: bool,
    impassable: bool,
    no_optimal_height: bool,
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum WindowClass {
    Feasible,
    TooWide,
    TooNarrow,
}

#[derive(Clone, Copy)]
struct Window {
    i: usize,
    j: usize,
    class: WindowClass,
}

impl Plateau {
    fn empty(scan_shift: i32) -> Self {
        Self {
            scan_shift,
            status: PlateauStatus::Empty,
            internal_start: 0.0,
            internal_end: 0.0,
            estimated_start: 0.0,
            estimated_end: 0.0,
            estimated_center: 0.0,
            min_height: 0.0,
            start_index: 0,
            end_index: 0,
            support: 0,
            deviation: 0.0,
            slope: 0.0,
            bounded_start: false,
            bounded_end: false,
            reliable: false,
            accepted: false,
            possible: false,
            consistent_height: false,
            enough_points: false,
            impassable: false,
            no_optimal_height: false,
        }
    }

    /// Initial fit with a free-floating centre.
    ///
    /// `pts` must be sorted by distance. With `height_hint`, the search is
    /// restricted to the band anchored at that minimum height — the retry
    /// path after an [`PlateauStatus::OptimalHeightUnderUsed`] outcome.
    pub fn detect(
        params: &PlateauParams,
        scan_shift: i32,
        pts: &[Pt2f],
        height_hint: Option<f32>,
    ) -> Self {
        let mut pl = Self::empty(scan_shift);
        if pts.is_empty() {
            pl.no_optimal_height = true;
            return pl;
        }
        pl.enough_points = pts.len() >= MIN_PTS;
        pl.min_height = pts.iter().map(|p| p.y).fold(f32::INFINITY, f32::min);
        if !pl.enough_points {
            pl.status = PlateauStatus::NotEnoughPoints;
            pl.no_optimal_height = true;
            return pl;
        }

        let indices: Vec<usize> = match height_hint {
            Some(h0) => {
                let lo = h0 - 3.0 * params.slope_tolerance;
                let hi = h0 + params.thickness_tolerance;
                (0..pts.len())
                    .filter(|&k| pts[k].y >= lo && pts[k].y <= hi)
                    .collect()
            }
            None => (0..pts.len()).collect(),
        };
        let max_gap = height_hint.map(|_| HINT_GAP);
        let windows = candidate_windows(pts, &indices, params, params.thickness_tolerance, max_gap);
        let Some(best) = pick_initial(pts, &indices, &windows, params) else {
            pl.status = PlateauStatus::NoBand;
            pl.no_optimal_height = true;
            return pl;
        };

        pl.install_window(params, pts, &indices, best);
        pl.consistent_height = true;
        match best.class {
            WindowClass::Feasible => {
                if pl.support >= MIN_PTS {
                    pl.status = PlateauStatus::Ok;
                    pl.accepted = true;
                } else {
                    pl.status = PlateauStatus::OptimalHeightUnderUsed;
                }
                pl.possible = true;
            }
            WindowClass::TooWide => pl.status = PlateauStatus::TooWide,
            WindowClass::TooNarrow => pl.status = PlateauStatus::TooNarrow,
        }
        pl.reliable = pl.status == PlateauStatus::Ok && pl.support >= MIN_PTS;
        pl
    }

    /// Tracked fit around a reference interval translated by `lateral`.
    ///
    /// `confdist` counts the scans elapsed since the last reliable anchor;
    /// it widens both the height tolerance and the admissible lateral
    /// shift. `pts` must be sorted by distance.
    pub fn track(
        params: &PlateauParams,
        scan_shift: i32,
        pts: &[Pt2f],
        reference: TrackRef,
        lateral: f32,
        confdist: i32,
    ) -> Self {
        let mut pl = Self::empty(scan_shift);
        if pts.is_empty() {
            return pl;
        }
        pl.enough_points = pts.len() >= MIN_PTS;
        pl.min_height = pts.iter().map(|p| p.y).fold(f32::INFINITY, f32::min);
        if !pl.enough_points {
            pl.status = PlateauStatus::NotEnoughPoints;
            return pl;
        }

        let cd = confdist.max(0) as f32;
        let tol = params.thickness_tolerance + cd * params.slope_tolerance;
        let reach = params.side_shift_tolerance * confdist.max(1) as f32;
        let refs = reference.start + lateral;
        let refe = reference.end + lateral;
        let tc = (refs + refe) * 0.5;

        let indices: Vec<usize> = (0..pts.len()).collect();
        let windows = candidate_windows(pts, &indices, params, tol, None);
        let best = pick_tracked(pts, &indices, &windows, params, tc, reach);

        match best {
            Some(best) => {
                pl.install_window(params, pts, &indices, best);
                match best.class {
                    WindowClass::Feasible => {
                        if (pl.estimated_center - tc).abs() <= reach {
                            pl.status = PlateauStatus::Ok;
                            pl.accepted = true;
                        } else {
                            pl.status = PlateauStatus::Shifted;
                        }
                        pl.possible = true;
                    }
                    WindowClass::TooWide => pl.status = PlateauStatus::TooWide,
                    WindowClass::TooNarrow => pl.status = PlateauStatus::TooNarrow,
                }
            }
            None => {
                pl.status = PlateauStatus::NoBand;
                pl.estimated_start = refs;
                pl.estimated_end = refe;
                pl.estimated_center = tc;
            }
        }

        pl.consistent_height = match reference.height {
            Some(refh) => {
                pl.possible
                    && (pl.min_height - refh).abs()
                        <= params.slope_tolerance * confdist.max(1) as f32
            }
            None => pl.possible,
        };
        if params.is_net_build_on() && !pl.possible {
            if let Some(refh) = reference.height {
                let floor = pts
                    .iter()
                    .filter(|p| {
                        p.x >= refs - params.side_shift_tolerance
                            && p.x <= refe + params.side_shift_tolerance
                    })
                    .map(|p| p.y)
                    .fold(f32::INFINITY, f32::min);
                if floor.is_finite() && floor > refh + params.max_tilt {
                    pl.impassable = true;
                }
            }
        }
        pl.reliable = pl.status == PlateauStatus::Ok && pl.support >= MIN_PTS;
        pl
    }

    fn install_window(
        &mut self,
        params: &PlateauParams,
        pts: &[Pt2f],
        indices: &[usize],
        win: Window,
    ) {
        let (mut i, mut j) = (win.i, win.j);
        // trim isolated boundary samples
        while j - i > 1 {
            let span = pts[indices[j]].x - pts[indices[i]].x;
            let mean_gap = span / (j - i) as f32;
            if pts[indices[i + 1]].x - pts[indices[i]].x > TRIM_FACTOR * mean_gap {
                i += 1;
            } else if pts[indices[j]].x - pts[indices[j - 1]].x > TRIM_FACTOR * mean_gap {
                j -= 1;
            } else {
                break;
            }
        }
        let first = indices[i];
        let last = indices[j];
        self.start_index = first;
        self.end_index = last + 1;
        self.support = j - i + 1;
        self.internal_start = pts[first].x;
        self.internal_end = pts[last].x;
        let mut min_h = pts[first].y;
        for &k in &indices[i..=j] {
            if pts[k].y < min_h {
                min_h = pts[k].y;
            }
        }
        self.min_height = min_h;

        // fractional endpoints interpolated into the neighbour samples
        self.estimated_start = if first > 0 {
            (pts[first].x + pts[first - 1].x) * 0.5
        } else {
            pts[first].x
        };
        self.estimated_end = if last + 1 < pts.len() {
            (pts[last].x + pts[last + 1].x) * 0.5
        } else {
            pts[last].x
        };
        let width = self.estimated_end - self.estimated_start;
        if width > params.max_length {
            let excess = (width - params.max_length) * 0.5;
            self.estimated_start += excess;
            self.estimated_end -= excess;
        }
        self.estimated_center = (self.estimated_start + self.estimated_end) * 0.5;

        // rising margins within reach of each endpoint
        let top = self.min_height + params.thickness_tolerance;
        self.bounded_start = pts[..first]
            .iter()
            .rev()
            .take_while(|p| self.internal_start - p.x <= BOUND_REACH)
            .any(|p| p.y >= top);
        self.bounded_end = pts[last + 1..]
            .iter()
            .take_while(|p| p.x - self.internal_end <= BOUND_REACH)
            .any(|p| p.y >= top);
    }

    #[inline]
    pub fn status(&self) -> PlateauStatus {
        self.status
    }

    #[inline]
    pub fn scan_shift(&self) -> i32 {
        self.scan_shift
    }

    #[inline]
    pub fn internal_start(&self) -> f32 {
        self.internal_start
    }

    #[inline]
    pub fn internal_end(&self) -> f32 {
        self.internal_end
    }

    #[inline]
    pub fn estimated_start(&self) -> f32 {
        self.estimated_start
    }

    #[inline]
    pub fn estimated_end(&self) -> f32 {
        self.estimated_end
    }

    #[inline]
    pub fn estimated_center(&self) -> f32 {
        self.estimated_center
    }

    #[inline]
    pub fn estimated_width(&self) -> f32 {
        self.estimated_end - self.estimated_start
    }

    #[inline]
    pub fn min_height(&self) -> f32 {
        self.min_height
    }

    /// First sample of the plateau in the sorted scan.
    #[inline]
    pub fn start_index(&self) -> usize {
        self.start_index
    }

    /// Past-the-end sample of the plateau in the sorted scan.
    #[inline]
    pub fn end_index(&self) -> usize {
        self.end_index
    }

    #[inline]
    pub fn support(&self) -> usize {
        self.support
    }

    #[inline]
    pub fn bounded(&self) -> bool {
        self.bounded_start && self.bounded_end
    }

    #[inline]
    pub fn bounded_start(&self) -> bool {
        self.bounded_start
    }

    #[inline]
    pub fn bounded_end(&self) -> bool {
        self.bounded_end
    }

    #[inline]
    pub fn reliable(&self) -> bool {
        self.reliable
    }

    #[inline]
    pub fn is_accepted(&self) -> bool {
        self.accepted
    }

    /// Marks the fit as accepted (carriage-track acceptance or the
    /// under-used-height retry keeping the first solution).
    #[inline]
    pub fn accept_result(&mut self) {
        self.accepted = true;
    }

    #[inline]
    pub fn possible(&self) -> bool {
        self.possible
    }

    #[inline]
    pub fn consistent_height(&self) -> bool {
        self.consistent_height
    }

    #[inline]
    pub fn has_enough_points(&self) -> bool {
        self.enough_points
    }

    #[inline]
    pub fn impassable(&self) -> bool {
        self.impassable
    }

    /// Whether no candidate height band exists at all (the retry at the
    /// reported minimum height would be pointless).
    #[inline]
    pub fn no_optimal_height(&self) -> bool {
        self.no_optimal_height
    }

    /// Whether the fitted width lies inside the admissible envelope.
    #[inline]
    pub fn consistent_width(&self) -> bool {
        self.possible
    }

    #[inline]
    pub fn estimated_deviation(&self) -> f32 {
        self.deviation
    }

    #[inline]
    pub fn set_deviation(&mut self, deviation: f32) {
        self.deviation = deviation;
    }

    #[inline]
    pub fn estimated_slope(&self) -> f32 {
        self.slope
    }

    #[inline]
    pub fn set_slope(&mut self, slope: f32) {
        self.slope = slope;
    }

    /// Whether `pos` falls inside the estimated interval.
    #[inline]
    pub fn contains(&self, pos: f32) -> bool {
        pos >= self.estimated_start && pos <= self.estimated_end
    }

    /// Width-quality comparison: nearer to the nominal start length wins.
    pub fn thiner_than(&self, other: &Plateau, params: &PlateauParams) -> bool {
        (self.estimated_width() - params.start_length).abs()
            < (other.estimated_width() - params.start_length).abs()
    }

    /// Geometric adjacency of two consecutive plateaux: their estimated
    /// intervals overlap.
    pub fn is_connected_to(&self, other: &Plateau) -> bool {
        self.estimated_start <= other.estimated_end && other.estimated_start <= self.estimated_end
    }

    /// Whether this plateau sits on the line joining its two accepted
    /// neighbours `dist` scans apart.
    pub fn fit(&self, near: &Plateau, far: &Plateau, dist: i32) -> bool {
        if dist <= 0 {
            return true;
        }
        let c = near.estimated_center
            + (far.estimated_center - near.estimated_center) / dist as f32;
        self.contains(c)
    }
}

/// Maximal band windows: for each end sample the smallest start keeping the
/// height range under `tol`, with an optional cap on in-window sample gaps.
fn candidate_windows(
    pts: &[Pt2f],
    indices: &[usize],
    _params: &PlateauParams,
    tol: f32,
    max_gap: Option<f32>,
) -> Vec<Window> {
    let mut out = Vec::new();
    let mut minq: VecDeque<usize> = VecDeque::new();
    let mut maxq: VecDeque<usize> = VecDeque::new();
    let mut i = 0usize;
    for j in 0..indices.len() {
        if let Some(gap) = max_gap {
            if j > i && pts[indices[j]].x - pts[indices[j - 1]].x > gap {
                i = j;
                minq.clear();
                maxq.clear();
            }
        }
        let h = pts[indices[j]].y;
        while matches!(minq.back(), Some(&k) if pts[indices[k]].y >= h) {
            minq.pop_back();
        }
        minq.push_back(j);
        while matches!(maxq.back(), Some(&k) if pts[indices[k]].y <= h) {
            maxq.pop_back();
        }
        maxq.push_back(j);
        loop {
            let (Some(&hi), Some(&lo)) = (maxq.front(), minq.front()) else {
                break;
            };
            if pts[indices[hi]].y - pts[indices[lo]].y <= tol {
                break;
            }
            if lo == i {
                minq.pop_front();
            }
            if hi == i {
                maxq.pop_front();
            }
            i += 1;
        }
        if j > i {
            out.push(Window {
                i,
                j,
                class: WindowClass::Feasible,
            });
        }
    }
    out
}

fn classify(span: f32, params: &PlateauParams) -> WindowClass {
    if span > params.max_length {
        WindowClass::TooWide
    } else if span < params.min_length {
        WindowClass::TooNarrow
    } else {
        WindowClass::Feasible
    }
}

/// Initial-mode selection: widest feasible window, ties broken by the lower
/// base height; degraded classes are kept as fallbacks.
fn pick_initial(
    pts: &[Pt2f],
    indices: &[usize],
    windows: &[Window],
    params: &PlateauParams,
) -> Option<Window> {
    let mut best: Option<(Window, f32, f32)> = None;
    for w in windows {
        let span = pts[indices[w.j]].x - pts[indices[w.i]].x;
        let class = classify(span, params);
        let base = (w.i..=w.j)
            .map(|k| pts[indices[k]].y)
            .fold(f32::INFINITY, f32::min);
        let cand = Window { class, ..*w };
        let better = match &best {
            None => true,
            Some((b, bspan, bbase)) => match (class, b.class) {
                (WindowClass::Feasible, WindowClass::Feasible) => {
                    span > *bspan || (span == *bspan && base < *bbase)
                }
                (WindowClass::Feasible, _) => true,
                (_, WindowClass::Feasible) => false,
                (WindowClass::TooNarrow, WindowClass::TooNarrow) => span > *bspan,
                (WindowClass::TooNarrow, WindowClass::TooWide) => true,
                (WindowClass::TooWide, WindowClass::TooNarrow) => false,
                (WindowClass::TooWide, WindowClass::TooWide) => span < *bspan,
            },
        };
        if better {
            best = Some((cand, span, base));
        }
    }
    best.map(|(w, _, _)| w)
}

/// Tracked-mode selection: feasible window with its centre closest to the
/// predicted centre; degraded classes as fallbacks.
fn pick_tracked(
    pts: &[Pt2f],
    indices: &[usize],
    windows: &[Window],
    params: &PlateauParams,
    tc: f32,
    _reach: f32,
) -> Option<Window> {
    let mut best: Option<(Window, f32)> = None;
    for w in windows {
        let span = pts[indices[w.j]].x - pts[indices[w.i]].x;
        let class = classify(span, params);
        let center = (pts[indices[w.j]].x + pts[indices[w.i]].x) * 0.5;
        let dist = (center - tc).abs();
        let cand = Window { class, ..*w };
        let better = match &best {
            None => true,
            Some((b, bdist)) => match (class, b.class) {
                (WindowClass::Feasible, WindowClass::Feasible) => dist < *bdist,
                (WindowClass::Feasible, _) => true,
                (_, WindowClass::Feasible) => false,
                _ => dist < *bdist,
            },
        };
        if better {
            best = Some((cand, dist));
        }
    }
    best.map(|(w, _)| w)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn flat_section(start: f32, end: f32, h: f32, step: f32) -> Vec<Pt2f> {
        let mut pts = Vec::new();
        let mut d = start;
        while d <= end + 1e-4 {
            pts.push(Pt2f::new(d, h));
            d += step;
        }
        pts
    }

    fn bordered_road(center: f32, half_width: f32, h: f32) -> Vec<Pt2f> {
        // rising margins on both sides of a flat band
        let mut pts = Vec::new();
        let mut d = center - half_width - 2.0;
        while d <= center + half_width + 2.0 {
            let off = (d - center).abs();
            let z = if off <= half_width {
                h
            } else {
                h + (off - half_width) * 1.5
            };
            pts.push(Pt2f::new(d, z));
            d += 0.25;
        }
        pts
    }

    #[test]
    fn detect_fits_a_flat_band() {
        let params = PlateauParams::default();
        let pts = bordered_road(6.0, 1.5, 100.0);
        let pl = Plateau::detect(&params, 0, &pts, None);
        assert_eq!(pl.status(), PlateauStatus::Ok);
        assert!(pl.possible());
        assert!(pl.bounded(), "rising margins should bound the plateau");
        assert!((pl.estimated_center() - 6.0).abs() < 0.5);
        assert!(pl.estimated_width() >= params.min_length);
        assert!(pl.estimated_width() <= params.max_length);
        assert!((pl.min_height() - 100.0).abs() < 1e-3);
    }

    #[test]
    fn detect_rejects_an_empty_scan() {
        let params = PlateauParams::default();
        let pl = Plateau::detect(&params, 0, &[], None);
        assert_eq!(pl.status(), PlateauStatus::Empty);
        assert!(!pl.has_enough_points());
        assert!(pl.no_optimal_height());
    }

    #[test]
    fn detect_flags_narrow_bands() {
        let params = PlateauParams::default();
        let mut pts = flat_section(4.0, 5.0, 50.0, 0.25);
        // strong slope everywhere else
        for k in 0..20 {
            pts.insert(0, Pt2f::new(3.9 - 0.2 * k as f32, 52.0 + k as f32));
        }
        pts.sort_by(|a, b| a.x.partial_cmp(&b.x).unwrap());
        let pl = Plateau::detect(&params, 0, &pts, None);
        assert_eq!(pl.status(), PlateauStatus::TooNarrow);
        assert!(!pl.possible());
    }

    #[test]
    fn estimated_interval_brackets_the_centre() {
        let params = PlateauParams::default();
        let pts = bordered_road(10.0, 1.8, 73.0);
        let pl = Plateau::detect(&params, 0, &pts, None);
        assert!(pl.estimated_start() <= pl.estimated_center());
        assert!(pl.estimated_center() <= pl.estimated_end());
    }

    #[test]
    fn track_follows_the_reference() {
        let params = PlateauParams::default();
        let pts = bordered_road(6.2, 1.5, 100.0);
        let reference = TrackRef {
            start: 4.5,
            end: 7.5,
            height: Some(100.05),
        };
        let pl = Plateau::track(&params, 0, &pts, reference, 0.0, 1);
        assert_eq!(pl.status(), PlateauStatus::Ok);
        assert!(pl.consistent_height());
        assert!((pl.estimated_center() - 6.2).abs() < 0.5);
    }

    #[test]
    fn track_reports_lateral_shifts() {
        let mut params = PlateauParams::default();
        params.side_shift_tolerance = 0.2;
        let pts = bordered_road(8.0, 1.5, 100.0);
        let reference = TrackRef {
            start: 4.0,
            end: 7.0,
            height: Some(100.0),
        };
        let pl = Plateau::track(&params, 0, &pts, reference, 0.0, 1);
        assert_eq!(pl.status(), PlateauStatus::Shifted);
        assert!(pl.possible());
        assert!(!pl.reliable());
    }

    #[test]
    fn track_with_sparse_scan_does_not_count_as_failure_evidence() {
        let params = PlateauParams::default();
        let pts = vec![Pt2f::new(5.0, 10.0), Pt2f::new(5.5, 10.0)];
        let reference = TrackRef {
            start: 4.0,
            end: 7.0,
            height: Some(10.0),
        };
        let pl = Plateau::track(&params, 0, &pts, reference, 0.0, 1);
        assert_eq!(pl.status(), PlateauStatus::NotEnoughPoints);
        assert!(!pl.has_enough_points());
    }

    #[test]
    fn status_order_ranks_ok_highest() {
        assert!(PlateauStatus::Ok > PlateauStatus::OptimalHeightUnderUsed);
        assert!(PlateauStatus::OptimalHeightUnderUsed > PlateauStatus::Shifted);
        assert!(PlateauStatus::Shifted > PlateauStatus::NoBand);
        assert!(PlateauStatus::NoBand > PlateauStatus::NotEnoughPoints);
        assert!(PlateauStatus::NotEnoughPoints > PlateauStatus::Empty);
    }

    #[test]
    fn fit_checks_the_interpolated_centre() {
        let params = PlateauParams::default();
        let a = Plateau::detect(&params, 0, &bordered_road(6.0, 1.5, 10.0), None);
        let b = Plateau::detect(&params, 0, &bordered_road(6.4, 1.5, 10.0), None);
        let mid = Plateau::detect(&params, 0, &bordered_road(6.2, 1.5, 10.0), None);
        assert!(mid.fit(&a, &b, 2));
    }
}
