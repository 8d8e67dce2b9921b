use super::map::RoadMap;
use crate::detector::TrackDetector;
use crate::diagnostics::{MapperReport, SeedReport};
use crate::tileset::PtTileSet;
use crate::track::CarriageTrack;
use crate::types::Pt2i;
use log::{debug, info, warn};
use std::time::Instant;

/// Walks a per-tile seed catalogue with the detector and paints accepted
/// tracks onto the road map.
pub struct RoadMapper {
    detector: TrackDetector,
    map: RoadMap,
    iratio: f32,
    connected: bool,
    keep_tracks: bool,
    successful_seeds: Vec<Vec<(Pt2i, Pt2i)>>,
    road_sections: Vec<CarriageTrack>,
}

impl RoadMapper {
    /// `iratio` is the number of map pixels per DTM cell; `connected`
    /// restricts painting to the run chain around the central plateau;
    /// `keep_tracks` retains detected tracks for export.
    pub fn new(
        detector: TrackDetector,
        map_width: i32,
        map_height: i32,
        iratio: f32,
        connected: bool,
        keep_tracks: bool,
    ) -> Self {
        Self {
            detector,
            map: RoadMap::new(map_width, map_height),
            iratio,
            connected,
            keep_tracks,
            successful_seeds: Vec::new(),
            road_sections: Vec::new(),
        }
    }

    #[inline]
    pub fn map(&self) -> &RoadMap {
        &self.map
    }

    #[inline]
    pub fn detector(&self) -> &TrackDetector {
        &self.detector
    }

    #[inline]
    pub fn detector_mut(&mut self) -> &mut TrackDetector {
        &mut self.detector
    }

    /// Seeds that produced a painted track, grouped by tile.
    pub fn successful_seeds(&self) -> &[Vec<(Pt2i, Pt2i)>] {
        &self.successful_seeds
    }

    /// Takes the retained tracks (empty unless `keep_tracks` was set).
    pub fn take_road_sections(&mut self) -> Vec<CarriageTrack> {
        std::mem::take(&mut self.road_sections)
    }

    /// Connectivity check of the plain traversal path.
    // TODO: decide what the region test should be; until then every
    // section passes.
    pub fn is_connected(&self, _scans: &[Vec<Pt2i>]) -> bool {
        true
    }

    /// Runs the detector over every seed.
    ///
    /// `seeds` is indexed by tile (row-major, one entry per tile of
    /// `ptset`). With `buffered`, tiles are brought resident through the
    /// boustrophedon traversal; otherwise everything is loaded up front and
    /// the catalogue is walked in the same serpentine order.
    pub fn process(
        &mut self,
        ptset: &mut PtTileSet,
        seeds: &[Vec<(Pt2i, Pt2i)>],
        buffered: bool,
    ) -> MapperReport {
        let start = Instant::now();
        let cot = ptset.columns_of_tiles();
        let rot = ptset.rows_of_tiles();
        debug_assert_eq!(seeds.len(), cot * rot, "one seed list per tile");
        self.successful_seeds = vec![Vec::new(); cot * rot];
        let mut report = MapperReport::default();

        if buffered {
            ptset.create_buffers();
            while let Some(k) = ptset.next_tile() {
                debug!(
                    "tile {k} ({}, {}): {} seeds",
                    k % cot,
                    k / cot,
                    seeds[k].len()
                );
                for &(p1, p2) in &seeds[k] {
                    self.run_seed(ptset, k, p1, p2, false, &mut report);
                }
                let outs = self.detector.outs();
                if outs != 0 {
                    warn!("{outs} point requests outside resident tiles");
                    report.outside_requests += outs;
                    self.detector.reset_outs();
                }
            }
        } else {
            if !ptset.load_points() {
                warn!("tiles cannot be loaded");
                return report;
            }
            for j in 0..rot {
                for i in 0..cot {
                    let k = j * cot + if j % 2 != 0 { cot - 1 - i } else { i };
                    for &(p1, p2) in &seeds[k] {
                        self.run_seed(ptset, k, p1, p2, true, &mut report);
                    }
                }
            }
            report.outside_requests += self.detector.outs();
            self.detector.reset_outs();
        }

        report.coverage = self.map.coverage();
        report.elapsed_ms = start.elapsed().as_secs_f64() * 1000.0;
        info!(
            "{} roads, {} unused seeds, {} map pixels",
            report.roads, report.unused_seeds, report.coverage
        );
        report
    }

    fn run_seed(
        &mut self,
        ptset: &PtTileSet,
        tile: usize,
        p1: Pt2i,
        p2: Pt2i,
        plain: bool,
        report: &mut MapperReport,
    ) {
        let center = Pt2i::new((p1.x + p2.x) / 2, (p1.y + p2.y) / 2);
        let map_center = Pt2i::new(
            (center.x as f32 * self.iratio) as i32,
            (center.y as f32 * self.iratio) as i32,
        );
        if self.map.occupied(map_center) {
            report.unused_seeds += 1;
            return;
        }

        let scans = {
            let found = self
                .detector
                .detect(ptset, p1, p2)
                .filter(|ct| ct.plateau(0).is_some());
            found.map(|ct| {
                let mut out = Vec::new();
                if self.connected {
                    ct.get_connected_points(
                        &mut out,
                        true,
                        self.map.width(),
                        self.map.height(),
                        self.iratio,
                    );
                } else {
                    ct.get_points(
                        &mut out,
                        true,
                        self.map.width(),
                        self.map.height(),
                        self.iratio,
                    );
                }
                out
            })
        };
        let status = self.detector.status();
        let (spread, holes, shift) = self
            .detector
            .final_track()
            .map(|ct| (ct.spread(), ct.nb_holes(), ct.relative_shift_length()))
            .unwrap_or((0, 0, 0.0));

        let mut painted = false;
        if let Some(scans) = scans {
            if plain && !self.is_connected(&scans) {
                info!("road section {} is not connected", report.roads);
            } else if self.map.add(&scans) {
                painted = true;
                self.successful_seeds[tile].push((p1, p2));
                if self.keep_tracks {
                    if let Some(track) = self.detector.preserve_detection() {
                        self.road_sections.push(track);
                    }
                }
            }
            report.roads += 1;
        }
        report.seeds.push(SeedReport {
            seed_start: p1,
            seed_end: p2,
            status,
            status_code: status.code(),
            spread,
            holes,
            shift_length: shift,
            painted,
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plain_path_connectivity_is_a_pass_through() {
        let mapper = RoadMapper::new(TrackDetector::default(), 8, 8, 1.0, false, false);
        assert!(mapper.is_connected(&[]));
        assert!(mapper.is_connected(&[vec![Pt2i::new(0, 0)], vec![Pt2i::new(7, 7)]]));
    }
}
