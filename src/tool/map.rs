use crate::types::Pt2i;

/// Occupancy raster of detected roads.
#[derive(Clone, Debug)]
pub struct RoadMap {
    width: i32,
    height: i32,
    data: Vec<u8>,
}

impl RoadMap {
    pub fn new(width: i32, height: i32) -> Self {
        assert!(width > 0 && height > 0, "empty road map");
        Self {
            width,
            height,
            data: vec![0u8; (width * height) as usize],
        }
    }

    #[inline]
    pub fn width(&self) -> i32 {
        self.width
    }

    #[inline]
    pub fn height(&self) -> i32 {
        self.height
    }

    /// Raw row-major occupancy bytes (0 = free, 255 = road).
    pub fn pixels(&self) -> &[u8] {
        &self.data
    }

    /// Whether a map pixel is already covered by a detected road.
    pub fn occupied(&self, p: Pt2i) -> bool {
        if p.x < 0 || p.x >= self.width || p.y < 0 || p.y >= self.height {
            return false;
        }
        self.data[(p.y * self.width + p.x) as usize] != 0
    }

    /// Paints per-scan pixel runs; returns `true` iff at least one
    /// previously free pixel was covered.
    pub fn add(&mut self, scans: &[Vec<Pt2i>]) -> bool {
        let mut painted = false;
        for run in scans {
            for p in run {
                if p.x < 0 || p.x >= self.width || p.y < 0 || p.y >= self.height {
                    continue;
                }
                let cell = &mut self.data[(p.y * self.width + p.x) as usize];
                if *cell == 0 {
                    painted = true;
                }
                *cell = 255;
            }
        }
        painted
    }

    /// Number of covered pixels.
    pub fn coverage(&self) -> usize {
        self.data.iter().filter(|v| **v != 0).count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn add_reports_new_coverage_only() {
        let mut map = RoadMap::new(10, 10);
        let run = vec![vec![Pt2i::new(2, 3), Pt2i::new(3, 3)]];
        assert!(map.add(&run));
        assert!(map.occupied(Pt2i::new(2, 3)));
        assert!(!map.add(&run), "repainting covered ground is not progress");
        assert_eq!(map.coverage(), 2);
    }

    #[test]
    fn out_of_map_pixels_are_ignored() {
        let mut map = RoadMap::new(4, 4);
        assert!(!map.add(&[vec![Pt2i::new(-1, 0), Pt2i::new(9, 9)]]));
        assert_eq!(map.coverage(), 0);
        assert!(!map.occupied(Pt2i::new(-1, 0)));
    }
}
