//! Geometry value types shared across the crate.
//!
//! Integer points and vectors live on the DTM cell grid, float points in
//! metric terrain coordinates. All types are plain `Copy` values.

use serde::{Deserialize, Serialize};

/// Integer 2D point (DTM cell coordinates).
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Pt2i {
    pub x: i32,
    pub y: i32,
}

impl Pt2i {
    #[inline]
    pub fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }

    /// Vector from this point to `other`.
    #[inline]
    pub fn vector_to(&self, other: Pt2i) -> Vr2i {
        Vr2i::new(other.x - self.x, other.y - self.y)
    }

    /// 4-adjacency test (self excluded).
    #[inline]
    pub fn is_4_adjacent_to(&self, other: Pt2i) -> bool {
        (self.x - other.x).abs() + (self.y - other.y).abs() == 1
    }

    /// Digital segment pattern from this point towards `other`.
    ///
    /// Returns the cyclic step array of the naive line: one entry per
    /// primary-axis move, `true` where the secondary axis advances too.
    /// The primary axis is the one with the larger coordinate span.
    pub fn steps_to(&self, other: Pt2i) -> Vec<bool> {
        let dx = (other.x - self.x).abs();
        let dy = (other.y - self.y).abs();
        let (n, m) = if dx >= dy { (dx, dy) } else { (dy, dx) };
        if n == 0 {
            return Vec::new();
        }
        let mut steps = Vec::with_capacity(n as usize);
        let mut acc = n / 2;
        for _ in 0..n {
            acc += m;
            if acc >= n {
                acc -= n;
                steps.push(true);
            } else {
                steps.push(false);
            }
        }
        steps
    }
}

/// Integer 2D vector.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Vr2i {
    pub x: i32,
    pub y: i32,
}

impl Vr2i {
    #[inline]
    pub fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }

    #[inline]
    pub fn invert(&mut self) {
        self.x = -self.x;
        self.y = -self.y;
    }

    #[inline]
    pub fn norm2(&self) -> i64 {
        self.x as i64 * self.x as i64 + self.y as i64 * self.y as i64
    }
}

/// Float 2D point (metres).
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Pt2f {
    pub x: f32,
    pub y: f32,
}

impl Pt2f {
    #[inline]
    pub fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }
}

/// Float 3D point (metres); `z` is the ground elevation.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Pt3f {
    pub x: f32,
    pub y: f32,
    pub z: f32,
}

impl Pt3f {
    #[inline]
    pub fn new(x: f32, y: f32, z: f32) -> Self {
        Self { x, y, z }
    }
}

/// Float 2D vector.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Vr2f {
    pub x: f32,
    pub y: f32,
}

impl Vr2f {
    #[inline]
    pub fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }

    #[inline]
    pub fn scalar_product(&self, other: Vr2f) -> f32 {
        self.x * other.x + self.y * other.y
    }

    #[inline]
    pub fn norm(&self) -> f32 {
        (self.x * self.x + self.y * self.y).sqrt()
    }
}

/// Exact non-negative rational.
///
/// Seed strokes produced by blurred-segment extraction carry rational
/// endpoints; they cross into the detector only through [`AbsRat::to_f32`].
#[derive(Clone, Copy, Debug, Eq, Serialize, Deserialize)]
pub struct AbsRat {
    num: i64,
    den: i64,
}

impl AbsRat {
    /// Builds `num / den`; signs are folded into the absolute value.
    pub fn new(num: i64, den: i64) -> Self {
        debug_assert!(den != 0, "rational with zero denominator");
        Self {
            num: num.abs(),
            den: den.abs().max(1),
        }
    }

    #[inline]
    pub fn zero() -> Self {
        Self { num: 0, den: 1 }
    }

    #[inline]
    pub fn numerator(&self) -> i64 {
        self.num
    }

    #[inline]
    pub fn denominator(&self) -> i64 {
        self.den
    }

    #[inline]
    pub fn to_f32(&self) -> f32 {
        self.num as f32 / self.den as f32
    }
}

impl PartialEq for AbsRat {
    fn eq(&self, other: &Self) -> bool {
        self.num as i128 * other.den as i128 == other.num as i128 * self.den as i128
    }
}

impl PartialOrd for AbsRat {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for AbsRat {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        (self.num as i128 * other.den as i128).cmp(&(other.num as i128 * self.den as i128))
    }
}
