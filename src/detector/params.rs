use serde::Deserialize;

/// Tunables of the carriage-track detector.
///
/// Defaults are permissive; clean high-density surveys tolerate tighter
/// values (`plateau_lack_tolerance` 5, `max_shift_length` 0.5).
#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct DetectorParams {
    /// Consecutive countable fit failures ending a side.
    pub plateau_lack_tolerance: usize,
    /// Upper bound on [`relative_shift_length`] before a track is declared
    /// too hectic.
    ///
    /// [`relative_shift_length`]: crate::track::CarriageTrack::relative_shift_length
    pub max_shift_length: f32,
    /// Minimum accepted-plateau density (percent, 0–100).
    pub min_density: i32,
    /// Enables the hectic-track filter.
    pub shift_length_pruning: bool,
    /// Enables the sparse-track filter.
    pub density_pruning: bool,
    /// Counts fit failures even on underpopulated scans.
    pub density_insensitive: bool,
    /// Half-extent (in scans) of the trial pass feeding stroke realignment;
    /// 0 skips the trial and runs a single-phase detection.
    pub initial_track_extent: i32,
    /// Automatic mode: no prior anchor, first plateau searched laterally.
    pub auto_detection: bool,
    /// Net-build option demanding geometric adjacency between accepted
    /// plateaux.
    pub connect_on: bool,
}

impl Default for DetectorParams {
    fn default() -> Self {
        Self {
            plateau_lack_tolerance: 11,
            max_shift_length: 1.65,
            min_density: 60,
            shift_length_pruning: true,
            density_pruning: true,
            density_insensitive: false,
            initial_track_extent: 6,
            auto_detection: false,
            connect_on: false,
        }
    }
}

impl DetectorParams {
    /// Granularity of the interactive shift-length adjustment.
    pub const SHIFT_LENGTH_INCREMENT: f32 = 0.05;

    pub fn set_plateau_lack_tolerance(&mut self, nb: isize) {
        self.plateau_lack_tolerance = nb.max(0) as usize;
    }

    pub fn set_max_shift_length(&mut self, val: f32) {
        self.max_shift_length = val.max(0.0);
    }

    pub fn inc_max_shift_length(&mut self, steps: i32) {
        self.set_max_shift_length(self.max_shift_length + steps as f32 * Self::SHIFT_LENGTH_INCREMENT);
    }

    pub fn set_min_density(&mut self, val: i32) {
        self.min_density = val.clamp(0, 100);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn setters_clamp_to_valid_ranges() {
        let mut p = DetectorParams::default();
        p.set_plateau_lack_tolerance(-3);
        assert_eq!(p.plateau_lack_tolerance, 0);
        p.set_min_density(150);
        assert_eq!(p.min_density, 100);
        p.set_min_density(-10);
        assert_eq!(p.min_density, 0);
        p.set_max_shift_length(-1.0);
        assert_eq!(p.max_shift_length, 0.0);
        p.inc_max_shift_length(4);
        assert!((p.max_shift_length - 0.2).abs() < 1e-6);
    }
}
