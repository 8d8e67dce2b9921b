use serde::Serialize;

/// Outcome of a carriage-track detection.
///
/// Negative codes are failures; the numeric value is what callers surface.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
pub enum DetectionStatus {
    #[default]
    None,
    Ok,
    TooNarrowInput,
    NoAvailableScan,
    NoCentralPlateau,
    NoConsistentSequence,
    NoBounds,
    TooHecticPlateaux,
    TooSparsePlateaux,
    Disconnect,
}

impl DetectionStatus {
    /// Integer code of the status.
    pub fn code(self) -> i32 {
        match self {
            DetectionStatus::None => 0,
            DetectionStatus::Ok => 1,
            DetectionStatus::TooNarrowInput => -1,
            DetectionStatus::NoAvailableScan => -2,
            DetectionStatus::NoCentralPlateau => -3,
            DetectionStatus::NoConsistentSequence => -4,
            DetectionStatus::NoBounds => -5,
            DetectionStatus::TooHecticPlateaux => -6,
            DetectionStatus::TooSparsePlateaux => -7,
            DetectionStatus::Disconnect => -8,
        }
    }

    #[inline]
    pub fn is_failure(self) -> bool {
        self.code() < 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn codes_match_the_documented_values() {
        assert_eq!(DetectionStatus::None.code(), 0);
        assert_eq!(DetectionStatus::Ok.code(), 1);
        assert_eq!(DetectionStatus::TooNarrowInput.code(), -1);
        assert_eq!(DetectionStatus::NoAvailableScan.code(), -2);
        assert_eq!(DetectionStatus::NoCentralPlateau.code(), -3);
        assert_eq!(DetectionStatus::NoConsistentSequence.code(), -4);
        assert_eq!(DetectionStatus::NoBounds.code(), -5);
        assert_eq!(DetectionStatus::TooHecticPlateaux.code(), -6);
        assert_eq!(DetectionStatus::TooSparsePlateaux.code(), -7);
        assert_eq!(DetectionStatus::Disconnect.code(), -8);
        assert!(!DetectionStatus::Ok.is_failure());
        assert!(DetectionStatus::NoBounds.is_failure());
    }
}
