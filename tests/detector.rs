//! End-to-end detection scenarios on synthetic mountainside clouds.
//!
//! The scenes use a 30 m square hillside sampled every 0.25 m, a DTM cell
//! size of 0.5 m (60 × 60 cells) and a 3 m wide road at mid-height. Seed
//! strokes are vertical, crossing the road at the centre column.

mod common;

use common::synthetic_cloud::{loaded_tile_set, Scene};
use road_detector::{
    DetectionStatus, DetectorParams, PlateauParams, PtTileSet, TrackDetector,
};
use road_detector::types::Pt2i;

const CELLS: i32 = 60;
const CELL: f32 = 0.5;

fn detector(dp: DetectorParams, pp: PlateauParams) -> TrackDetector {
    let _ = env_logger::builder().is_test(true).try_init();
    let mut det = TrackDetector::new(dp, pp);
    det.set_points_grid(CELLS, CELLS, 1, CELL);
    det
}

fn stroke() -> (Pt2i, Pt2i) {
    (Pt2i::new(30, 10), Pt2i::new(30, 50))
}

#[test]
fn too_short_strokes_are_rejected() {
    let set = PtTileSet::new(1, 1, CELLS, CELLS, CELL, 0.0, 0.0);
    let mut det = detector(DetectorParams::default(), PlateauParams::default());
    // 5 cells = 2.5 m, under the 6 m track width
    let found = det.detect(&set, Pt2i::new(0, 0), Pt2i::new(5, 0));
    assert!(found.is_none());
    assert_eq!(det.status(), DetectionStatus::TooNarrowInput);
    assert_eq!(det.status().code(), -1);
}

#[test]
fn lone_cross_section_gives_no_consistent_sequence() {
    // a flat 3 m band exists only under the central scan column
    let scene = Scene::default();
    let cloud = scene.cloud_where(|_| true, |x| (15.0..15.5).contains(&x));
    let set = loaded_tile_set(&cloud, CELLS, CELL);
    let mut det = detector(DetectorParams::default(), PlateauParams::default());
    let (p1, p2) = stroke();
    let found = det.detect(&set, p1, p2);
    assert!(found.is_none());
    assert_eq!(det.status(), DetectionStatus::NoConsistentSequence);
}

#[test]
fn straight_road_is_tracked_end_to_end() {
    // 15 m of road: 30 scan columns at 0.5 m
    let scene = Scene::default();
    let cloud = scene.cloud_where(|x| (7.5..22.5).contains(&x), |_| true);
    let set = loaded_tile_set(&cloud, CELLS, CELL);
    let mut det = detector(DetectorParams::default(), PlateauParams::default());
    let (p1, p2) = stroke();
    let found = det.detect(&set, p1, p2);
    let ct = found.expect("straight road must be detected");
    assert_eq!(ct.spread(), 30);
    assert_eq!(ct.nb_holes(), 0);
    assert!(ct.relative_shift_length() < 0.05);
    assert!(ct.plateau(0).is_some(), "central plateau always present");
    assert_eq!(det.status(), DetectionStatus::Ok);
}

#[test]
fn accepted_plateaux_keep_widths_in_the_envelope() {
    let scene = Scene::default();
    let cloud = scene.cloud();
    let set = loaded_tile_set(&cloud, CELLS, CELL);
    let pp = PlateauParams::default();
    let mut det = detector(DetectorParams::default(), pp.clone());
    let (p1, p2) = stroke();
    let ct = det.detect(&set, p1, p2).expect("road detected");
    let mut checked = 0;
    for idx in -(ct.right_scan_count() as i32)..=(ct.left_scan_count() as i32) {
        let Some(pl) = ct.plateau(idx) else { continue };
        if !pl.is_accepted() {
            continue;
        }
        assert!(pl.estimated_start() <= pl.estimated_center());
        assert!(pl.estimated_center() <= pl.estimated_end());
        let w = pl.estimated_end() - pl.estimated_start();
        assert!(w >= pp.min_length && w <= pp.max_length, "width {w}");
        checked += 1;
    }
    assert!(checked > 10);
}

fn curved_params(deviation_prediction: bool) -> (DetectorParams, PlateauParams) {
    let mut dp = DetectorParams::default();
    dp.initial_track_extent = 0;
    dp.plateau_lack_tolerance = 4;
    dp.density_pruning = false;
    let mut pp = PlateauParams::default();
    pp.side_shift_tolerance = 0.1;
    pp.plateau_search_distance = 0.05;
    pp.deviation_prediction = deviation_prediction;
    (dp, pp)
}

#[test]
fn deviation_prediction_follows_a_curving_road() {
    let scene = Scene {
        drift: 0.4, // 0.2 m per 0.5 m scan step
        ..Scene::default()
    };
    let cloud = scene.cloud();
    let set = loaded_tile_set(&cloud, CELLS, CELL);
    let (dp, pp) = curved_params(true);
    let mut det = detector(dp, pp);
    let (p1, p2) = stroke();
    let ct = det.detect(&set, p1, p2).expect("predictor keeps the lock");
    assert!(ct.spread() >= 20, "spread {}", ct.spread());
}

#[test]
fn without_prediction_the_curve_breaks_the_lock() {
    let scene = Scene {
        drift: 0.4,
        ..Scene::default()
    };
    let cloud = scene.cloud();
    let set = loaded_tile_set(&cloud, CELLS, CELL);
    let (dp, pp) = curved_params(false);
    let mut det = detector(dp, pp);
    let (p1, p2) = stroke();
    match det.detect(&set, p1, p2) {
        None => assert!(det.status().is_failure()),
        Some(ct) => assert!(ct.spread() <= 10, "spread {}", ct.spread()),
    }
}

fn gap_params(tolerance: usize) -> DetectorParams {
    let mut dp = DetectorParams::default();
    dp.plateau_lack_tolerance = tolerance;
    dp.density_insensitive = true;
    dp.density_pruning = false;
    dp
}

#[test]
fn lack_tolerance_carries_the_track_over_point_gaps() {
    // road everywhere, but returns vanish for 5 m on both sides of a short
    // central section (10 gap scans per side)
    let scene = Scene::default();
    let sampled = |x: f32| (x - 15.0).abs() <= 2.5 || (x - 15.0).abs() > 7.5;
    let cloud = scene.cloud_where(|_| true, sampled);
    let set = loaded_tile_set(&cloud, CELLS, CELL);
    let (p1, p2) = stroke();

    let mut tolerant = detector(gap_params(11), PlateauParams::default());
    let wide = tolerant
        .detect(&set, p1, p2)
        .map(|ct| ct.spread())
        .unwrap_or(0);
    assert!(wide >= 30, "tolerant run stops at {wide}");

    let mut strict = detector(gap_params(5), PlateauParams::default());
    let narrow = strict
        .detect(&set, p1, p2)
        .map(|ct| ct.spread())
        .unwrap_or(0);
    assert!(narrow <= 15, "strict run reaches {narrow}");
}

#[test]
fn zero_lack_tolerance_stops_at_the_first_counted_failure() {
    let scene = Scene::default();
    // a single missing column 2.5 m right of the stroke
    let sampled = |x: f32| !(17.5..18.0).contains(&x);
    let cloud = scene.cloud_where(|_| true, sampled);
    let set = loaded_tile_set(&cloud, CELLS, CELL);
    let (p1, p2) = stroke();

    let mut strict = detector(gap_params(0), PlateauParams::default());
    let short = strict
        .detect(&set, p1, p2)
        .map(|ct| ct.spread())
        .unwrap_or(0);
    let mut tolerant = detector(gap_params(11), PlateauParams::default());
    let long = tolerant
        .detect(&set, p1, p2)
        .map(|ct| ct.spread())
        .unwrap_or(0);
    assert!(long > short, "tolerance 11 reaches {long}, 0 reaches {short}");
}

#[test]
fn sparse_tracks_are_pruned_by_density() {
    // every other scan column has no returns; holes pile up to ~50%
    let scene = Scene::default();
    let sampled = |x: f32| ((x / CELL) as i32) % 2 == 0;
    let cloud = scene.cloud_where(|_| true, sampled);
    let set = loaded_tile_set(&cloud, CELLS, CELL);
    let mut dp = DetectorParams::default();
    dp.min_density = 60;
    dp.initial_track_extent = 0;
    let mut pp = PlateauParams::default();
    pp.tail_min_size = 0;
    let mut det = detector(dp, pp);
    let (p1, p2) = stroke();
    let found = det.detect(&set, p1, p2);
    assert!(found.is_none());
    assert_eq!(det.status(), DetectionStatus::TooSparsePlateaux);
}

#[test]
fn zero_extent_collapses_to_a_single_phase() {
    let scene = Scene::default();
    let cloud = scene.cloud_where(|x| (7.5..22.5).contains(&x), |_| true);
    let set = loaded_tile_set(&cloud, CELLS, CELL);
    let (p1, p2) = stroke();

    let mut two_phase = detector(DetectorParams::default(), PlateauParams::default());
    let a = two_phase
        .detect(&set, p1, p2)
        .map(|ct| (ct.spread(), ct.nb_holes()));
    let mut dp = DetectorParams::default();
    dp.initial_track_extent = 0;
    let mut one_phase = detector(dp, PlateauParams::default());
    let b = one_phase
        .detect(&set, p1, p2)
        .map(|ct| (ct.spread(), ct.nb_holes()));
    assert_eq!(a, b, "aligned stroke is a fixed point on a straight road");
    assert_eq!(two_phase.status(), DetectionStatus::Ok);
    assert_eq!(one_phase.status(), DetectionStatus::Ok);
}

#[test]
fn automatic_mode_finds_an_off_centre_road() {
    let scene = Scene {
        road_y: 16.2, // 1.2 m off the stroke middle
        ..Scene::default()
    };
    let cloud = scene.cloud();
    let set = loaded_tile_set(&cloud, CELLS, CELL);
    let mut dp = DetectorParams::default();
    dp.auto_detection = true;
    dp.initial_track_extent = 0;
    let mut det = detector(dp, PlateauParams::default());
    let (p1, p2) = stroke();
    let ct = det.detect(&set, p1, p2).expect("auto mode locks on");
    assert!(ct.spread() >= 20);
    assert_eq!(det.status(), DetectionStatus::Ok);
}

#[test]
fn out_of_tile_lookups_are_counted_not_fatal() {
    let scene = Scene::default();
    let cloud = scene.cloud();
    // the tile grid covers only the lower half of the scanned area
    let mut set = PtTileSet::new(1, 1, CELLS, CELLS / 2, CELL, 0.0, 0.0);
    set.add_points(&cloud);
    set.load_points();
    let mut det = detector(DetectorParams::default(), PlateauParams::default());
    det.set_points_grid(CELLS, CELLS, 1, CELL);
    let (p1, p2) = stroke();
    let _ = det.detect(&set, p1, p2);
    assert!(det.outs() > 0, "upper-half lookups must be counted");
    det.reset_outs();
    assert_eq!(det.outs(), 0);
}
