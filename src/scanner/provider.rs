//! Scanner construction from stroke endpoints.

use super::pattern::ScanPattern;
use super::scanner::{ClipRect, DirectionalScanner, ScanKind};
use crate::types::Pt2i;
use std::collections::HashMap;

/// Builds [`DirectionalScanner`]s over a fixed grid and owns the shared
/// step-pattern pool.
///
/// Directions are normalised so that the strip coefficient `a` is positive
/// (or `a == 0` and `b > 0`); when the input stroke had to be flipped to
/// reach this form, [`ScannerProvider::is_last_scan_reversed`] reports it so
/// callers can swap their notion of left and right.
#[derive(Debug, Default)]
pub struct ScannerProvider {
    width: i32,
    height: i32,
    last_scan_reversed: bool,
    patterns: HashMap<(i32, i32), ScanPattern>,
}

impl ScannerProvider {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the scanned grid size; the clip rectangle becomes
    /// `[0, w) × [0, h)`.
    pub fn set_size(&mut self, width: i32, height: i32) {
        self.width = width;
        self.height = height;
    }

    #[inline]
    pub fn width(&self) -> i32 {
        self.width
    }

    #[inline]
    pub fn height(&self) -> i32 {
        self.height
    }

    /// Whether the stroke of the last built scanner was flipped during
    /// normalisation.
    #[inline]
    pub fn is_last_scan_reversed(&self) -> bool {
        self.last_scan_reversed
    }

    /// Builds a scanner whose central scan is the digital segment from `p1`
    /// to `p2`. Returns `None` for a degenerate stroke.
    pub fn get_scanner(
        &mut self,
        p1: Pt2i,
        p2: Pt2i,
        adaptive: bool,
    ) -> Option<DirectionalScanner> {
        let d = p1.vector_to(p2);
        if d.x == 0 && d.y == 0 {
            return None;
        }
        let (a, b, start, end) = if d.x < 0 || (d.x == 0 && d.y < 0) {
            self.last_scan_reversed = true;
            (-d.x, -d.y, p2, p1)
        } else {
            self.last_scan_reversed = false;
            (d.x, d.y, p1, p2)
        };
        let kind = if a == 0 || b == 0 {
            ScanKind::Vh
        } else if adaptive {
            ScanKind::Adaptive
        } else {
            ScanKind::Static
        };
        let pattern = self
            .patterns
            .entry((a, b))
            .or_insert_with(|| ScanPattern::between(start, end))
            .clone();
        let c1 = a as i64 * end.x as i64 + b as i64 * end.y as i64;
        Some(DirectionalScanner::from_start(
            ClipRect::of_size(self.width, self.height),
            a,
            b,
            c1,
            pattern,
            kind,
            start.x,
            start.y,
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reversal_flag_follows_stroke_orientation() {
        let mut prov = ScannerProvider::new();
        prov.set_size(50, 50);
        prov.get_scanner(Pt2i::new(5, 5), Pt2i::new(15, 9), true)
            .unwrap();
        assert!(!prov.is_last_scan_reversed());
        prov.get_scanner(Pt2i::new(15, 9), Pt2i::new(5, 5), true)
            .unwrap();
        assert!(prov.is_last_scan_reversed());
    }

    #[test]
    fn degenerate_stroke_yields_no_scanner() {
        let mut prov = ScannerProvider::new();
        prov.set_size(10, 10);
        assert!(prov
            .get_scanner(Pt2i::new(3, 3), Pt2i::new(3, 3), true)
            .is_none());
    }

    #[test]
    fn reversed_stroke_scans_the_same_pixels() {
        let mut prov = ScannerProvider::new();
        prov.set_size(40, 40);
        let fwd = prov
            .get_scanner(Pt2i::new(3, 4), Pt2i::new(13, 10), true)
            .unwrap();
        let rev = prov
            .get_scanner(Pt2i::new(13, 10), Pt2i::new(3, 4), true)
            .unwrap();
        let mut a = Vec::new();
        let mut b = Vec::new();
        fwd.first(&mut a);
        rev.first(&mut b);
        assert_eq!(a, b);
    }

    #[test]
    fn axis_aligned_strokes_get_vh_scanners() {
        let mut prov = ScannerProvider::new();
        prov.set_size(20, 20);
        let h = prov
            .get_scanner(Pt2i::new(2, 5), Pt2i::new(12, 5), true)
            .unwrap();
        assert_eq!(h.kind(), ScanKind::Vh);
        let v = prov
            .get_scanner(Pt2i::new(5, 2), Pt2i::new(5, 12), true)
            .unwrap();
        assert_eq!(v.kind(), ScanKind::Vh);
        let d = prov
            .get_scanner(Pt2i::new(2, 2), Pt2i::new(12, 7), true)
            .unwrap();
        assert_eq!(d.kind(), ScanKind::Adaptive);
    }
}
