use serde::Deserialize;

/// Shared parameter bundle for plateau fitting.
///
/// Distances are metres in terrain space. Defaults target forest roads of
/// 2.5–5 m width sampled at a quarter-metre cell size.
#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct PlateauParams {
    /// Minimum plateau width.
    pub min_length: f32,
    /// Maximum plateau width.
    pub max_length: f32,
    /// Nominal width used to rank competing fits.
    pub start_length: f32,
    /// Vertical thickness of the height band.
    pub thickness_tolerance: f32,
    /// Permitted tilt per scan step; also widens tolerances with the
    /// confidence distance.
    pub slope_tolerance: f32,
    /// Lateral jitter permitted between adjacent plateaux.
    pub side_shift_tolerance: f32,
    /// Lateral retry step while tracking.
    pub plateau_search_distance: f32,
    /// Lateral retry step for the first plateau (automatic mode).
    pub first_plateau_search_distance: f32,
    /// Tilt above which a blocked cross-section is declared impassable
    /// (net-build mode).
    pub max_tilt: f32,
    /// Minimum accepted-run length kept by tail pruning; 0 disables pruning.
    pub tail_min_size: usize,
    /// Adds the lateral trend to the position prediction on every step.
    pub deviation_prediction: bool,
    /// Adds the height trend to the height prediction on every step.
    pub slope_prediction: bool,
    /// Net-build mode: reference is the previous plateau itself and
    /// obstacles terminate the search.
    pub net_build: bool,
}

impl Default for PlateauParams {
    fn default() -> Self {
        Self {
            min_length: 2.2,
            max_length: 6.0,
            start_length: 3.0,
            thickness_tolerance: 0.25,
            slope_tolerance: 0.10,
            side_shift_tolerance: 0.5,
            plateau_search_distance: 0.3,
            first_plateau_search_distance: 0.6,
            max_tilt: 0.25,
            tail_min_size: 2,
            deviation_prediction: false,
            slope_prediction: false,
            net_build: false,
        }
    }
}

impl PlateauParams {
    #[inline]
    pub fn is_deviation_prediction_on(&self) -> bool {
        self.deviation_prediction
    }

    #[inline]
    pub fn is_slope_prediction_on(&self) -> bool {
        self.slope_prediction
    }

    #[inline]
    pub fn is_net_build_on(&self) -> bool {
        self.net_build
    }
}
