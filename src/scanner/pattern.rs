//! Shared step patterns and octant descriptors.

use crate::types::Pt2i;
use std::sync::Arc;

/// Cyclic step pattern of a naive digital line.
///
/// One entry per primary-axis move, `true` where the secondary axis advances
/// too. The pattern is immutable and shared: clones are cheap views onto the
/// same array.
#[derive(Clone, Debug)]
pub struct ScanPattern {
    steps: Arc<[bool]>,
}

impl ScanPattern {
    /// Wraps a precomputed step array.
    pub fn new(steps: Vec<bool>) -> Self {
        Self {
            steps: steps.into(),
        }
    }

    /// Pattern of the digital segment joining two distinct points.
    pub fn between(p1: Pt2i, p2: Pt2i) -> Self {
        Self::new(p1.steps_to(p2))
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.steps.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    /// Cyclic read; `phase` may be any index, it is reduced modulo the
    /// pattern length. An empty pattern never steps.
    #[inline]
    pub fn step(&self, phase: usize) -> bool {
        if self.steps.is_empty() {
            false
        } else {
            self.steps[phase % self.steps.len()]
        }
    }

    /// Advances a phase by one, cyclically.
    #[inline]
    pub fn next_phase(&self, phase: usize) -> usize {
        if self.steps.len() <= 1 {
            0
        } else {
            (phase + 1) % self.steps.len()
        }
    }

    /// Moves a phase back by one, cyclically.
    #[inline]
    pub fn prev_phase(&self, phase: usize) -> usize {
        if self.steps.len() <= 1 {
            0
        } else {
            (phase + self.steps.len() - 1) % self.steps.len()
        }
    }
}

/// Octant descriptor of a scan direction.
///
/// `x_major` selects the primary advance axis so that the scan line stays
/// closest to a coordinate axis; `sp` and `ss` are the primary and secondary
/// step signs, and `lat_left` the secondary-axis sign of a move towards the
/// left neighbour line. Directions are taken in normalised form
/// (`a > 0`, or `a == 0` and `b > 0`).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Octant {
    pub x_major: bool,
    pub sp: i32,
    pub ss: i32,
    pub lat_left: i32,
}

impl Octant {
    /// Descriptor for the normalised direction `(a, b)`.
    pub fn of(a: i32, b: i32) -> Self {
        debug_assert!(
            a > 0 || (a == 0 && b > 0),
            "octant of non-normalised direction ({a}, {b})"
        );
        let x_major = a >= b.abs();
        if x_major {
            Self {
                x_major,
                sp: 1,
                ss: if b >= 0 { 1 } else { -1 },
                lat_left: 1,
            }
        } else {
            Self {
                x_major,
                sp: if b > 0 { 1 } else { -1 },
                ss: 1,
                lat_left: -b.signum(),
            }
        }
    }

    /// Index 0..8 of the octant, used as a pool key.
    pub fn index(&self) -> usize {
        let mut idx = if self.x_major { 0 } else { 4 };
        if self.sp < 0 {
            idx += 2;
        }
        if self.ss < 0 {
            idx += 1;
        }
        idx
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cyclic_access_wraps() {
        let p = ScanPattern::new(vec![true, false, false]);
        assert!(p.step(0));
        assert!(!p.step(1));
        assert!(p.step(3));
        assert_eq!(p.next_phase(2), 0);
        assert_eq!(p.prev_phase(0), 2);
    }

    #[test]
    fn empty_pattern_never_steps() {
        let p = ScanPattern::new(Vec::new());
        assert!(!p.step(0));
        assert_eq!(p.next_phase(0), 0);
    }

    #[test]
    fn octant_selects_primary_axis() {
        assert!(Octant::of(5, 2).x_major);
        assert!(Octant::of(5, -2).x_major);
        assert!(!Octant::of(2, 5).x_major);
        assert!(!Octant::of(2, -5).x_major);
        assert!(!Octant::of(0, 3).x_major);
    }

    #[test]
    fn octant_indices_are_distinct() {
        let dirs = [
            (5, 2),
            (5, -2),
            (2, 5),
            (2, -5),
            (3, 3),
            (3, -4),
            (0, 1),
            (1, 0),
        ];
        for (a, b) in dirs {
            let o = Octant::of(a, b);
            assert!(o.index() < 8);
            assert_eq!(o.sp.abs(), 1);
            assert_eq!(o.ss.abs(), 1);
            assert_eq!(o.lat_left.abs(), 1);
        }
    }
}
