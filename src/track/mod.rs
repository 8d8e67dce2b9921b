//! Carriage track: the ordered two-sided sequence of plateaux detected
//! along one road section.
//!
//! Plateaux are indexed by a signed integer: 0 is the central plateau,
//! negative indices grow to the right of the stroke direction, positive to
//! the left. Internally each side is a plain vector and the centre a
//! distinguished slot; the signed index is only an API affair.

use crate::detector::DetectionStatus;
use crate::plateau::Plateau;
use crate::types::{Pt2f, Pt2i, Vr2f};

/// Which plateau interval to export.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BoundMode {
    /// Sample-supported interval.
    Internal,
    /// Interpolated interval.
    Estimated,
}

#[derive(Clone, Debug)]
struct TrackEntry {
    plateau: Plateau,
    display: Vec<Pt2i>,
}

/// Ordered collection of plateaux with acceptance bookkeeping, pruning and
/// raster/vector output. Owns its plateaux.
#[derive(Clone, Debug, Default)]
pub struct CarriageTrack {
    seed_p1: Pt2i,
    seed_p2: Pt2i,
    cell_size: f32,
    reversed: bool,
    status: DetectionStatus,
    central: Option<TrackEntry>,
    lefts: Vec<TrackEntry>,
    rights: Vec<TrackEntry>,
}

impl CarriageTrack {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records the seed stroke the detection ran from.
    pub fn set_detection_seed(&mut self, p1: Pt2i, p2: Pt2i, cell_size: f32) {
        self.seed_p1 = p1;
        self.seed_p2 = p2;
        self.cell_size = cell_size;
    }

    #[inline]
    pub fn seed_start(&self) -> Pt2i {
        self.seed_p1
    }

    #[inline]
    pub fn seed_end(&self) -> Pt2i {
        self.seed_p2
    }

    #[inline]
    pub fn cell_size(&self) -> f32 {
        self.cell_size
    }

    #[inline]
    pub fn status(&self) -> DetectionStatus {
        self.status
    }

    pub fn set_status(&mut self, status: DetectionStatus) {
        self.status = status;
    }

    /// Installs the central plateau and its display scan.
    pub fn start(&mut self, central: Plateau, display: Vec<Pt2i>, reversed: bool) {
        self.central = Some(TrackEntry {
            plateau: central,
            display,
        });
        self.reversed = reversed;
        self.lefts.clear();
        self.rights.clear();
    }

    /// Appends a plateau on one side; negative indices grow on the right.
    pub fn add(&mut self, on_right: bool, plateau: Plateau, display: Vec<Pt2i>) {
        let entry = TrackEntry { plateau, display };
        if on_right {
            self.rights.push(entry);
        } else {
            self.lefts.push(entry);
        }
    }

    /// Drops one side so the detector can retry it.
    pub fn clear_side(&mut self, on_right: bool) {
        if on_right {
            self.rights.clear();
        } else {
            self.lefts.clear();
        }
    }

    fn entry(&self, idx: i32) -> Option<&TrackEntry> {
        if idx == 0 {
            self.central.as_ref()
        } else if idx < 0 {
            self.rights.get((-idx - 1) as usize)
        } else {
            self.lefts.get((idx - 1) as usize)
        }
    }

    fn entry_mut(&mut self, idx: i32) -> Option<&mut TrackEntry> {
        if idx == 0 {
            self.central.as_mut()
        } else if idx < 0 {
            self.rights.get_mut((-idx - 1) as usize)
        } else {
            self.lefts.get_mut((idx - 1) as usize)
        }
    }

    /// Plateau at a signed index, if present.
    pub fn plateau(&self, idx: i32) -> Option<&Plateau> {
        self.entry(idx).map(|e| &e.plateau)
    }

    /// Display scan at a signed index, if present.
    pub fn display_scan(&self, idx: i32) -> Option<&[Pt2i]> {
        self.entry(idx).map(|e| e.display.as_slice())
    }

    /// Flips the accepted flag of the plateau at `idx`.
    pub fn accept(&mut self, idx: i32) {
        if let Some(e) = self.entry_mut(idx) {
            e.plateau.accept_result();
        }
    }

    #[inline]
    pub fn left_scan_count(&self) -> usize {
        self.lefts.len()
    }

    #[inline]
    pub fn right_scan_count(&self) -> usize {
        self.rights.len()
    }

    /// Total number of plateaux: both sides plus the centre.
    pub fn spread(&self) -> usize {
        if self.central.is_none() {
            return 0;
        }
        self.lefts.len() + self.rights.len() + 1
    }

    /// Number of plateaux that are not accepted.
    pub fn nb_holes(&self) -> usize {
        let central_hole = match &self.central {
            Some(e) if !e.plateau.is_accepted() => 1,
            _ => 0,
        };
        central_hole
            + self
                .lefts
                .iter()
                .chain(self.rights.iter())
                .filter(|e| !e.plateau.is_accepted())
                .count()
    }

    /// A track is usable when a central plateau exists and was accepted.
    pub fn is_valid(&self) -> bool {
        self.central
            .as_ref()
            .map(|e| e.plateau.is_accepted())
            .unwrap_or(false)
    }

    /// Removes trailing unaccepted runs and short trailing accepted runs
    /// from both sides.
    ///
    /// Returns `true` when the surviving accepted sequence is too short to
    /// form a track (fewer than `tail_min_size` accepted plateaux in all).
    pub fn prune(&mut self, tail_min_size: usize) -> bool {
        if tail_min_size == 0 {
            return false;
        }
        prune_side(&mut self.lefts, tail_min_size);
        prune_side(&mut self.rights, tail_min_size);
        let accepted = self.spread() - self.nb_holes();
        accepted < tail_min_size
    }

    /// Total lateral motion between consecutive accepted centres, per metre
    /// of track length.
    pub fn relative_shift_length(&self) -> f32 {
        let mut run = 0.0f32;
        let mut first_idx = 0i32;
        let mut last_idx = 0i32;
        let mut prev: Option<(i32, f32)> = None;
        for idx in -(self.rights.len() as i32)..=(self.lefts.len() as i32) {
            let Some(pl) = self.plateau(idx) else {
                continue;
            };
            if !pl.is_accepted() {
                continue;
            }
            let c = pl.estimated_center();
            if let Some((_, pc)) = prev {
                run += (c - pc).abs();
                last_idx = idx;
            } else {
                first_idx = idx;
                last_idx = idx;
            }
            prev = Some((idx, c));
        }
        let span = (last_idx - first_idx).max(1) as f32 * self.cell_size.max(f32::MIN_POSITIVE);
        run / span
    }

    /// World-space bound polylines of the accepted plateaux, one point pair
    /// per scan, ordered from the rightmost scan to the leftmost.
    pub fn get_position(
        &self,
        bound1: &mut Vec<Pt2f>,
        bound2: &mut Vec<Pt2f>,
        mode: BoundMode,
        iratio: f32,
    ) {
        let p1f = Pt2f::new(
            self.cell_size * (self.seed_p1.x as f32 + 0.5),
            self.cell_size * (self.seed_p1.y as f32 + 0.5),
        );
        let p12 = Vr2f::new(
            self.cell_size * (self.seed_p2.x - self.seed_p1.x) as f32,
            self.cell_size * (self.seed_p2.y - self.seed_p1.y) as f32,
        );
        let l12 = p12.norm();
        if l12 <= 0.0 {
            return;
        }
        let dir = Vr2f::new(p12.x / l12, p12.y / l12);
        let fact = self.cell_size / (p12.x * p12.x + p12.y * p12.y);
        let lshift = scan_step_vector(p12, fact);
        for idx in -(self.rights.len() as i32)..=(self.lefts.len() as i32) {
            let Some(pl) = self.plateau(idx) else {
                continue;
            };
            if !pl.is_accepted() {
                continue;
            }
            let (s, e) = match mode {
                BoundMode::Internal => (pl.internal_start(), pl.internal_end()),
                BoundMode::Estimated => (pl.estimated_start(), pl.estimated_end()),
            };
            let ox = p1f.x + idx as f32 * lshift.x;
            let oy = p1f.y + idx as f32 * lshift.y;
            bound1.push(Pt2f::new(
                (ox + dir.x * s) * iratio,
                (oy + dir.y * s) * iratio,
            ));
            bound2.push(Pt2f::new(
                (ox + dir.x * e) * iratio,
                (oy + dir.y * e) * iratio,
            ));
        }
    }

    fn scan_pixels(&self, entry: &TrackEntry, width: i32, height: i32, iratio: f32) -> Vec<Pt2i> {
        let pl = &entry.plateau;
        let p1f = Pt2f::new(
            self.cell_size * (self.seed_p1.x as f32 + 0.5),
            self.cell_size * (self.seed_p1.y as f32 + 0.5),
        );
        let p12 = Vr2f::new(
            self.cell_size * (self.seed_p2.x - self.seed_p1.x) as f32,
            self.cell_size * (self.seed_p2.y - self.seed_p1.y) as f32,
        );
        let l12 = p12.norm();
        if l12 <= 0.0 {
            return Vec::new();
        }
        let (s, e) = (pl.estimated_start(), pl.estimated_end());
        let mut out = Vec::new();
        for p in &entry.display {
            let px = self.cell_size * (p.x as f32 + 0.5) - p1f.x;
            let py = self.cell_size * (p.y as f32 + 0.5) - p1f.y;
            let dist = (px * p12.x + py * p12.y) / l12;
            if dist < s || dist > e {
                continue;
            }
            let mx = (p.x as f32 * iratio) as i32;
            let my = (p.y as f32 * iratio) as i32;
            if mx >= 0 && mx < width && my >= 0 && my < height {
                out.push(Pt2i::new(mx, my));
            }
        }
        out
    }

    /// Collects the accepted plateaux as per-scan pixel runs on a raster of
    /// `width × height` map pixels (`iratio` map pixels per DTM cell).
    pub fn get_points(
        &self,
        out: &mut Vec<Vec<Pt2i>>,
        accepted_only: bool,
        width: i32,
        height: i32,
        iratio: f32,
    ) {
        for idx in -(self.rights.len() as i32)..=(self.lefts.len() as i32) {
            let Some(entry) = self.entry(idx) else {
                continue;
            };
            if accepted_only && !entry.plateau.is_accepted() {
                continue;
            }
            let run = self.scan_pixels(entry, width, height, iratio);
            if !run.is_empty() {
                out.push(run);
            }
        }
    }

    /// Like [`Self::get_points`] but keeps only the 4-connected run chain
    /// containing the central plateau.
    pub fn get_connected_points(
        &self,
        out: &mut Vec<Vec<Pt2i>>,
        accepted_only: bool,
        width: i32,
        height: i32,
        iratio: f32,
    ) {
        let Some(central) = self.central.as_ref() else {
            return;
        };
        if accepted_only && !central.plateau.is_accepted() {
            return;
        }
        let central_run = self.scan_pixels(central, width, height, iratio);
        if central_run.is_empty() {
            return;
        }

        let side_runs = |on_right: bool| -> Vec<Vec<Pt2i>> {
            let count = if on_right {
                self.rights.len()
            } else {
                self.lefts.len()
            };
            let mut runs = Vec::new();
            let mut prev = central_run.clone();
            for k in 1..=count {
                let idx = if on_right { -(k as i32) } else { k as i32 };
                let entry = self.entry(idx).unwrap();
                if accepted_only && !entry.plateau.is_accepted() {
                    break;
                }
                let run = self.scan_pixels(entry, width, height, iratio);
                if run.is_empty() || !runs_touch(&prev, &run) {
                    break;
                }
                prev = run.clone();
                runs.push(run);
            }
            runs
        };

        let mut rights = side_runs(true);
        let lefts = side_runs(false);
        rights.reverse();
        out.extend(rights);
        out.push(central_run);
        out.extend(lefts);
    }
}

fn prune_side(entries: &mut Vec<TrackEntry>, tail_min: usize) {
    loop {
        while entries
            .last()
            .map(|e| !e.plateau.is_accepted())
            .unwrap_or(false)
        {
            entries.pop();
        }
        let tail_run = entries
            .iter()
            .rev()
            .take_while(|e| e.plateau.is_accepted())
            .count();
        if entries.is_empty() || tail_run >= tail_min {
            return;
        }
        entries.truncate(entries.len() - tail_run);
    }
}

/// Whether two pixel runs contain a 4-adjacent pair.
fn runs_touch(a: &[Pt2i], b: &[Pt2i]) -> bool {
    a.iter()
        .any(|p| b.iter().any(|q| p.is_4_adjacent_to(*q) || p == q))
}

/// Per-scan lateral displacement in terrain space for a stroke direction.
///
/// This is the ±90° rotation of the direction normalised to the digital
/// lateral step, split over the eight sign/magnitude cases and pinned by
/// tests.
pub(crate) fn scan_step_vector(p12: Vr2f, fact: f32) -> Vr2f {
    if p12.x > 0.0 {
        if p12.y > 0.0 {
            if p12.x > p12.y {
                Vr2f::new(-(p12.x * p12.y) * fact, (p12.x * p12.x) * fact)
            } else {
                Vr2f::new(-(p12.y * p12.y) * fact, (p12.x * p12.y) * fact)
            }
        } else if p12.x > -p12.y {
            Vr2f::new(-(p12.x * p12.y) * fact, (p12.x * p12.x) * fact)
        } else {
            Vr2f::new((p12.y * p12.y) * fact, -(p12.x * p12.y) * fact)
        }
    } else if p12.y > 0.0 {
        if -p12.x > p12.y {
            Vr2f::new((p12.x * p12.y) * fact, -(p12.x * p12.x) * fact)
        } else {
            Vr2f::new(-(p12.y * p12.y) * fact, (p12.x * p12.y) * fact)
        }
    } else if p12.x < p12.y {
        Vr2f::new((p12.x * p12.y) * fact, -(p12.x * p12.x) * fact)
    } else {
        Vr2f::new((p12.y * p12.y) * fact, -(p12.x * p12.y) * fact)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::plateau::{Plateau, PlateauParams, TrackRef};

    fn road_scan(center: f32, h: f32) -> Vec<Pt2f> {
        let mut pts = Vec::new();
        let mut d = center - 3.5;
        while d <= center + 3.5 {
            let off = (d - center).abs();
            let z = if off <= 1.5 { h } else { h + (off - 1.5) * 1.5 };
            pts.push(Pt2f::new(d, z));
            d += 0.25;
        }
        pts
    }

    fn ok_plateau(center: f32) -> Plateau {
        let params = PlateauParams::default();
        let pl = Plateau::detect(&params, 0, &road_scan(center, 50.0), None);
        assert!(pl.is_accepted());
        pl
    }

    fn failed_plateau() -> Plateau {
        let params = PlateauParams::default();
        let pl = Plateau::track(
            &params,
            0,
            &[Pt2f::new(1.0, 0.0)],
            TrackRef {
                start: 0.0,
                end: 3.0,
                height: None,
            },
            0.0,
            1,
        );
        assert!(!pl.is_accepted());
        pl
    }

    fn track_with(lefts: &[bool], rights: &[bool]) -> CarriageTrack {
        let mut ct = CarriageTrack::new();
        ct.set_detection_seed(Pt2i::new(0, 0), Pt2i::new(12, 0), 0.5);
        ct.start(ok_plateau(3.0), vec![Pt2i::new(0, 0)], false);
        for &ok in lefts {
            let pl = if ok { ok_plateau(3.0) } else { failed_plateau() };
            ct.add(false, pl, vec![Pt2i::new(0, 0)]);
        }
        for &ok in rights {
            let pl = if ok { ok_plateau(3.0) } else { failed_plateau() };
            ct.add(true, pl, vec![Pt2i::new(0, 0)]);
        }
        ct
    }

    #[test]
    fn signed_indexing_reaches_both_sides() {
        let ct = track_with(&[true, true], &[true]);
        assert!(ct.plateau(0).is_some());
        assert!(ct.plateau(2).is_some());
        assert!(ct.plateau(-1).is_some());
        assert!(ct.plateau(3).is_none());
        assert!(ct.plateau(-2).is_none());
        assert_eq!(ct.spread(), 4);
    }

    #[test]
    fn holes_count_unaccepted_plateaux() {
        let ct = track_with(&[true, false, true], &[false]);
        assert_eq!(ct.spread(), 5);
        assert_eq!(ct.nb_holes(), 2);
    }

    #[test]
    fn prune_drops_unaccepted_tails() {
        let mut ct = track_with(&[true, true, false, false], &[true, false]);
        assert!(!ct.prune(2));
        assert_eq!(ct.left_scan_count(), 2);
        // right side: single accepted run of 1 < 2, dropped
        assert_eq!(ct.right_scan_count(), 0);
        assert_eq!(ct.nb_holes(), 0);
    }

    #[test]
    fn prune_is_idempotent() {
        let mut ct = track_with(&[true, false, true, false], &[false, true, true]);
        ct.prune(2);
        let spread = ct.spread();
        let holes = ct.nb_holes();
        assert!(!ct.prune(2));
        assert_eq!(ct.spread(), spread);
        assert_eq!(ct.nb_holes(), holes);
    }

    #[test]
    fn prune_reports_tracks_with_too_few_accepted() {
        let mut ct = track_with(&[], &[]);
        assert!(ct.prune(2), "a lone central plateau is not a track");
        assert!(!ct.prune(1));
    }

    #[test]
    fn shift_length_is_zero_for_straight_tracks() {
        let ct = track_with(&[true, true, true], &[true, true]);
        assert!(ct.relative_shift_length() < 1e-3);
    }

    #[test]
    fn shift_length_bounds_total_center_motion() {
        let mut ct = CarriageTrack::new();
        ct.set_detection_seed(Pt2i::new(0, 0), Pt2i::new(12, 0), 0.5);
        ct.start(ok_plateau(3.0), Vec::new(), false);
        ct.add(false, ok_plateau(3.6), Vec::new());
        ct.add(false, ok_plateau(3.0), Vec::new());
        let rsl = ct.relative_shift_length();
        assert!(rsl >= 0.0);
        // |Δc| sums to ~1.2 m over two scan steps of 0.5 m
        assert!(rsl <= 1.2 / 1.0 + 0.2);
    }

    #[test]
    fn step_vector_rotates_by_a_quarter_turn() {
        let dirs = [
            (2.0f32, 1.0f32),
            (1.0, 2.0),
            (-1.0, 2.0),
            (-2.0, 1.0),
            (-2.0, -1.0),
            (-1.0, -2.0),
            (1.0, -2.0),
            (2.0, -1.0),
        ];
        for (x, y) in dirs {
            let v = Vr2f::new(x, y);
            let s = scan_step_vector(v, 0.2);
            // the step never aligns with the stroke direction
            let cross = v.x * s.y - v.y * s.x;
            assert!(
                cross.abs() > 1e-6,
                "degenerate step for direction ({x}, {y})"
            );
            assert!(s.norm() > 0.0);
        }
    }
}
