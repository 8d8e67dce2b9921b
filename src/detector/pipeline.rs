//! Carriage-track detection state machine.
//!
//! Given a seed stroke crossing a suspected road, the detector
//! - gathers the central cross-section with an adaptive directional scanner
//!   (sub-divided for the point grid),
//! - fits the central plateau, retrying at the reported minimum height when
//!   the optimal band was under-used,
//! - forks the scanner and tracks plateaux outward on both sides, predicting
//!   each position and height from per-side trend registers,
//! - realigns the input stroke orthogonally to the detected centres and runs
//!   a second, full pass when a trial extent is configured,
//! - prunes inconsistent tails and applies the hectic/sparse post-filters.
//!
//! All failures are reported as status codes; nothing here panics on valid
//! input data.

use super::params::DetectorParams;
use super::registers::SideRegisters;
use super::status::DetectionStatus;
use crate::plateau::{Plateau, PlateauParams, PlateauStatus, TrackRef};
use crate::scanner::{DirectionalScanner, ScannerProvider};
use crate::tileset::PtTileSet;
use crate::track::{scan_step_vector, CarriageTrack};
use crate::types::{Pt2f, Pt2i, Pt3f, Vr2f};
use log::debug;
use nalgebra::Matrix2;
use std::cmp::Ordering;

/// Road cross-sections wider than this are not tracked; seed strokes
/// shorter than this cannot frame one.
pub const MAX_TRACK_WIDTH: f32 = 6.0;

const NOBOUNDS_TOLERANCE: i32 = 10;
const POS_HEIGHT_REGISTER_SIZE: usize = 8;
const UNSTABILITY_REGISTER_SIZE: usize = 6;
const UNSTABILITY_PATH_LIMIT: f32 = 0.25;
const NB_SIDE_TRIALS: usize = 5;

/// The carriage-track detector. Owns its trial (`ict`) and final (`fct`)
/// tracks until the caller takes the final one with
/// [`TrackDetector::preserve_detection`].
pub struct TrackDetector {
    params: DetectorParams,
    pfeat: PlateauParams,
    scanp: ScannerProvider,
    discanp: ScannerProvider,
    subdiv: i32,
    csize: f32,
    ip1: Pt2i,
    ip2: Pt2i,
    fp1: Pt2i,
    fp2: Pt2i,
    fct: Option<CarriageTrack>,
    fstatus: DetectionStatus,
    ict: Option<CarriageTrack>,
    istatus: DetectionStatus,
    initial_unbounded: bool,
    initial_ref_idx: i32,
    initial_refs: f32,
    initial_refe: f32,
    initial_refh: f32,
    out_count: usize,
}

struct CentralScan {
    ds: DirectionalScanner,
    disp: DirectionalScanner,
    cpts: Vec<Pt2f>,
    dispix: Vec<Pt2i>,
    scan0_shift: i32,
    p1: Pt2i,
    p2: Pt2i,
    p1f: Pt2f,
    p12: Vr2f,
    l12: f32,
    reversed: bool,
}

#[derive(Clone, Copy)]
struct CentralFacts {
    bounded: bool,
    refs: f32,
    refe: f32,
    refh: f32,
    reliable: bool,
    center: f32,
}

impl Default for TrackDetector {
    fn default() -> Self {
        Self::new(DetectorParams::default(), PlateauParams::default())
    }
}

impl TrackDetector {
    pub fn new(params: DetectorParams, pfeat: PlateauParams) -> Self {
        Self {
            params,
            pfeat,
            scanp: ScannerProvider::new(),
            discanp: ScannerProvider::new(),
            subdiv: 1,
            csize: 1.0,
            ip1: Pt2i::default(),
            ip2: Pt2i::default(),
            fp1: Pt2i::default(),
            fp2: Pt2i::default(),
            fct: None,
            fstatus: DetectionStatus::None,
            ict: None,
            istatus: DetectionStatus::None,
            initial_unbounded: true,
            initial_ref_idx: 0,
            initial_refs: 0.0,
            initial_refe: 0.0,
            initial_refh: 0.0,
            out_count: 0,
        }
    }

    /// Declares the scanned grid: DTM size in cells, the sub-division factor
    /// of the point grid and the cell size in metres.
    pub fn set_points_grid(&mut self, width: i32, height: i32, subdiv: i32, cell_size: f32) {
        self.subdiv = subdiv.max(1);
        self.csize = cell_size;
        self.scanp.set_size(width * self.subdiv, height * self.subdiv);
        self.discanp.set_size(width, height);
    }

    #[inline]
    pub fn params(&self) -> &DetectorParams {
        &self.params
    }

    #[inline]
    pub fn params_mut(&mut self) -> &mut DetectorParams {
        &mut self.params
    }

    #[inline]
    pub fn plateau_params(&self) -> &PlateauParams {
        &self.pfeat
    }

    #[inline]
    pub fn plateau_params_mut(&mut self) -> &mut PlateauParams {
        &mut self.pfeat
    }

    /// Detection status: the final status when set, otherwise the status of
    /// the initial trial.
    pub fn status(&self) -> DetectionStatus {
        if self.fstatus != DetectionStatus::None {
            self.fstatus
        } else {
            self.istatus
        }
    }

    /// Count of point lookups that fell outside resident tiles.
    #[inline]
    pub fn outs(&self) -> usize {
        self.out_count
    }

    pub fn reset_outs(&mut self) {
        self.out_count = 0;
    }

    /// Final track of the last detection, if any.
    pub fn final_track(&self) -> Option<&CarriageTrack> {
        self.fct.as_ref()
    }

    /// Trial track of the last detection, if any.
    pub fn initial_track(&self) -> Option<&CarriageTrack> {
        self.ict.as_ref()
    }

    /// Transfers ownership of the final track to the caller.
    pub fn preserve_detection(&mut self) -> Option<CarriageTrack> {
        self.fct.take()
    }

    /// Drops any previous detection state.
    pub fn clear(&mut self) {
        self.fct = None;
        self.fstatus = DetectionStatus::None;
        self.ict = None;
        self.istatus = DetectionStatus::None;
        self.initial_unbounded = true;
        self.initial_ref_idx = 0;
    }

    /// Runs a detection from the seed stroke `(p1, p2)` given in DTM cell
    /// coordinates. Returns the final track on success, `None` on failure
    /// (the status tells why).
    pub fn detect(&mut self, ptset: &PtTileSet, p1: Pt2i, p2: Pt2i) -> Option<&CarriageTrack> {
        self.clear();
        self.ip1 = p1;
        self.ip2 = p2;
        self.fp1 = p1;
        self.fp2 = p2;
        let p12 = Vr2f::new(
            self.csize * (p2.x - p1.x) as f32,
            self.csize * (p2.y - p1.y) as f32,
        );
        let l12 = p12.norm();
        if l12 < MAX_TRACK_WIDTH {
            self.fstatus = DetectionStatus::TooNarrowInput;
            if self.params.initial_track_extent != 0 {
                self.istatus = DetectionStatus::TooNarrowInput;
            }
            return None;
        }

        if self.params.auto_detection {
            self.detect_auto(ptset);
        } else {
            self.detect_stage(ptset, self.params.initial_track_extent);
        }

        // Aligns the input stroke orthogonally to the detected centres and
        // reruns a full detection from the aligned stroke.
        if self.ict.is_some() && self.istatus != DetectionStatus::NoCentralPlateau {
            let centres = self.trial_centres(p1, p12, l12);
            if centres.len() > self.params.initial_track_extent as usize {
                self.align_input(&centres);
                self.detect_stage(ptset, 0);
            }
        }

        if self.fct.is_some() {
            if self.fstatus == DetectionStatus::NoConsistentSequence {
                return None;
            }
            let shift = self
                .fct
                .as_ref()
                .map(|ct| ct.relative_shift_length())
                .unwrap_or(0.0);
            if self.params.shift_length_pruning && shift > self.params.max_shift_length {
                if let Some(ct) = self.fct.as_mut() {
                    ct.set_status(DetectionStatus::TooHecticPlateaux);
                }
                self.fstatus = DetectionStatus::TooHecticPlateaux;
                debug!("track rejected: relative shift {shift:.3}");
                return None;
            }
            let (holes, spread) = self
                .fct
                .as_ref()
                .map(|ct| (ct.nb_holes(), ct.spread()))
                .unwrap_or((0, 0));
            if self.params.density_pruning
                && holes * 100 > spread * (100 - self.params.min_density) as usize
            {
                if let Some(ct) = self.fct.as_mut() {
                    ct.set_status(DetectionStatus::TooSparsePlateaux);
                }
                self.fstatus = DetectionStatus::TooSparsePlateaux;
                debug!("track rejected: {holes} holes over {spread} scans");
                return None;
            }
            if !self.fstatus.is_failure() {
                self.fstatus = DetectionStatus::Ok;
                if let Some(ct) = self.fct.as_mut() {
                    ct.set_status(DetectionStatus::Ok);
                }
            }
        }
        self.fct.as_ref()
    }

    /// Reliable plateau centres of the trial detection, in terrain space.
    fn trial_centres(&self, p1: Pt2i, p12: Vr2f, l12: f32) -> Vec<Pt2f> {
        let Some(ict) = self.ict.as_ref() else {
            return Vec::new();
        };
        let Some(central) = ict.plateau(0) else {
            return Vec::new();
        };
        let fact = self.csize / (p12.x * p12.x + p12.y * p12.y);
        let p1f = Pt2f::new(
            self.csize * (p1.x as f32 + 0.5),
            self.csize * (p1.y as f32 + 0.5),
        );
        let lshift = scan_step_vector(p12, fact);
        let mut centres = Vec::new();
        let rplc = (central.internal_end() + central.internal_start()) / (2.0 * l12);
        centres.push(Pt2f::new(
            p1f.x + p12.x * rplc,
            p1f.y + p12.y * rplc,
        ));
        for i in 1..self.params.initial_track_extent {
            if let Some(pl) = ict.plateau(i) {
                if pl.reliable() {
                    let rplc = (pl.internal_end() + pl.internal_start()) / (2.0 * l12);
                    centres.push(Pt2f::new(
                        p1f.x + i as f32 * lshift.x + p12.x * rplc,
                        p1f.y + i as f32 * lshift.y + p12.y * rplc,
                    ));
                }
            }
            if let Some(pl) = ict.plateau(-i) {
                if pl.reliable() {
                    let rplc = (pl.internal_end() + pl.internal_start()) / (2.0 * l12);
                    centres.push(Pt2f::new(
                        p1f.x - i as f32 * lshift.x + p12.x * rplc,
                        p1f.y - i as f32 * lshift.y + p12.y * rplc,
                    ));
                }
            }
        }
        centres
    }

    fn fail(&mut self, initial: bool, status: DetectionStatus) {
        if initial {
            self.istatus = status;
        } else {
            self.fstatus = status;
        }
    }

    fn input_stroke(&self, initial: bool) -> (Pt2i, Pt2i) {
        if initial {
            (self.ip1, self.ip2)
        } else {
            (self.fp1, self.fp2)
        }
    }

    /// Builds the scanners and gathers the sorted central profile.
    fn central_scan(&mut self, ptset: &PtTileSet, initial: bool) -> Option<CentralScan> {
        let (p1, p2) = self.input_stroke(initial);
        let csize = self.csize;
        let p12 = Vr2f::new(csize * (p2.x - p1.x) as f32, csize * (p2.y - p1.y) as f32);
        let p1f = Pt2f::new(csize * (p1.x as f32 + 0.5), csize * (p1.y as f32 + 0.5));
        let l12 = p12.norm();
        let dss_pos = Vr2f::new(
            p1.x as f32 + (p2.x - p1.x) as f32 * 0.5,
            p1.y as f32 + (p2.y - p1.y) as f32 * 0.5,
        );
        let mut dss_n = p1.vector_to(p2);
        if dss_n.x < 0 {
            dss_n.invert();
        }
        let valc = dss_n.x as f32 * dss_pos.x + dss_n.y as f32 * dss_pos.y;
        let scan0_shift = round_half(valc);
        let sub = self.subdiv;
        let ds = self.scanp.get_scanner(
            Pt2i::new(p1.x * sub + sub / 2, p1.y * sub + sub / 2),
            Pt2i::new(p2.x * sub + sub / 2, p2.y * sub + sub / 2),
            true,
        );
        let reversed = self.scanp.is_last_scan_reversed();
        let disp = self.discanp.get_scanner(p1, p2, true);
        let (Some(mut ds), Some(mut disp)) = (ds, disp) else {
            self.fail(initial, DetectionStatus::NoAvailableScan);
            return None;
        };

        // central scan of the point grid, accumulated over the sub-division
        let mut pix = Vec::new();
        let mut nbp = ds.first(&mut pix);
        for _ in 0..sub / 2 {
            if nbp == 0 {
                break;
            }
            nbp = ds.next_on_right(&mut pix);
        }
        nbp = 1;
        for _ in 0..sub - 1 - sub / 2 {
            if nbp == 0 {
                break;
            }
            nbp = ds.next_on_left(&mut pix);
        }
        if pix.is_empty() {
            self.fail(initial, DetectionStatus::NoAvailableScan);
            return None;
        }

        let mut dispix = Vec::new();
        disp.first(&mut dispix);
        let cpts = self.collect_profile(ptset, &pix, p1f, p12, l12);
        Some(CentralScan {
            ds,
            disp,
            cpts,
            dispix,
            scan0_shift,
            p1,
            p2,
            p1f,
            p12,
            l12,
            reversed,
        })
    }

    /// Projects the points under a scan onto the stroke axis and sorts them
    /// by distance.
    fn collect_profile(
        &mut self,
        ptset: &PtTileSet,
        pix: &[Pt2i],
        p1f: Pt2f,
        p12: Vr2f,
        l12: f32,
    ) -> Vec<Pt2f> {
        let mut pts = Vec::new();
        let mut cell: Vec<Pt3f> = Vec::new();
        for q in pix {
            cell.clear();
            if !ptset.collect_points(&mut cell, q.x, q.y) {
                self.out_count += 1;
            }
            for p in &cell {
                let pcl = Vr2f::new(p.x - p1f.x, p.y - p1f.y);
                pts.push(Pt2f::new(pcl.scalar_product(p12) / l12, p.z));
            }
        }
        pts.sort_by(comp_further);
        pts
    }

    /// One detection stage over the current input stroke.
    ///
    /// A non-zero `exlimit` bounds the side traversals to that many scans
    /// and stores the result as the trial track; 0 runs to termination and
    /// stores the final track.
    fn detect_stage(&mut self, ptset: &PtTileSet, exlimit: i32) {
        let initial = exlimit != 0;
        self.initial_unbounded = true;
        let Some(cs) = self.central_scan(ptset, initial) else {
            return;
        };
        let mut ct = CarriageTrack::new();
        ct.set_detection_seed(cs.p1, cs.p2, self.csize);

        // central plateau, with one retry at the reported optimal height
        let mut cpl = Plateau::detect(&self.pfeat, cs.scan0_shift, &cs.cpts, None);
        let mut success = cpl.status() == PlateauStatus::Ok;
        if !success && !cpl.no_optimal_height() {
            let cpl2 = Plateau::detect(
                &self.pfeat,
                cs.scan0_shift,
                &cs.cpts,
                Some(cpl.min_height()),
            );
            if cpl2.status() == PlateauStatus::Ok {
                let dw = (cpl.estimated_width() - self.pfeat.start_length).abs();
                let dw2 = (cpl2.estimated_width() - self.pfeat.start_length).abs();
                if cpl.status() == PlateauStatus::OptimalHeightUnderUsed && dw <= dw2 {
                    cpl.accept_result();
                } else {
                    cpl = cpl2;
                }
                success = true;
            }
        }
        let central = CentralFacts {
            bounded: cpl.bounded(),
            refs: cpl.internal_start(),
            refe: cpl.internal_end(),
            refh: cpl.min_height(),
            reliable: cpl.reliable(),
            center: cpl.estimated_center(),
        };
        ct.start(cpl, cs.dispix.clone(), cs.reversed);
        if success {
            ct.accept(0);
        } else {
            ct.set_status(DetectionStatus::NoCentralPlateau);
            self.fail(initial, DetectionStatus::NoCentralPlateau);
            self.store_stage(initial, ct);
            return;
        }

        if central.bounded {
            self.initial_unbounded = false;
        }
        self.initial_refs = central.refs;
        self.initial_refe = central.refe;
        self.initial_refh = central.refh;
        self.track_both_sides(ptset, &mut ct, &cs, exlimit, central, None);

        if self.pfeat.tail_min_size != 0 && ct.prune(self.pfeat.tail_min_size) {
            ct.set_status(DetectionStatus::NoConsistentSequence);
            self.fail(initial, DetectionStatus::NoConsistentSequence);
        }
        self.store_stage(initial, ct);
    }

    /// Automatic mode: no prior anchor, the first plateau is searched
    /// laterally around the stroke.
    fn detect_auto(&mut self, ptset: &PtTileSet) {
        self.initial_unbounded = true;
        let Some(cs) = self.central_scan(ptset, false) else {
            return;
        };
        let mut ct = CarriageTrack::new();
        ct.set_detection_seed(cs.p1, cs.p2, self.csize);
        let net = self.pfeat.is_net_build_on();
        let whole = TrackRef {
            start: 0.0,
            end: cs.l12,
            height: None,
        };

        let mut cpl = Plateau::track(&self.pfeat, cs.scan0_shift, &cs.cpts, whole, 0.0, 0);
        let mut found = cpl.status() == PlateauStatus::Ok;
        for trial in 0..NB_SIDE_TRIALS * 2 {
            let off = self.pfeat.first_plateau_search_distance
                * (trial / 2 + 1) as f32
                * if trial % 2 == 0 { 1.0 } else { -1.0 };
            let cpl2 = Plateau::track(&self.pfeat, cs.scan0_shift, &cs.cpts, whole, off, 0);
            if cpl2.status() == PlateauStatus::Ok {
                found = true;
                if cpl2.thiner_than(&cpl, &self.pfeat) {
                    cpl = cpl2;
                }
            }
        }
        let central = CentralFacts {
            bounded: cpl.bounded(),
            refs: cpl.internal_start(),
            refe: cpl.internal_end(),
            refh: cpl.min_height(),
            reliable: cpl.reliable(),
            center: cpl.estimated_center(),
        };
        let net_central = net.then(|| cpl.clone());
        let accept_central = if net { cpl.consistent_width() } else { found };
        ct.start(cpl, cs.dispix.clone(), cs.reversed);
        if accept_central {
            ct.accept(0);
        }
        if !found {
            ct.set_status(DetectionStatus::NoCentralPlateau);
            self.fstatus = DetectionStatus::NoCentralPlateau;
            self.fct = Some(ct);
            return;
        }

        if central.bounded {
            self.initial_unbounded = false;
        }
        self.initial_ref_idx = 0;
        self.initial_refs = central.refs;
        self.initial_refe = central.refe;
        self.initial_refh = central.refh;
        self.track_both_sides(ptset, &mut ct, &cs, 0, central, net_central);

        if self.pfeat.tail_min_size != 0 && ct.prune(self.pfeat.tail_min_size) {
            ct.set_status(DetectionStatus::NoConsistentSequence);
            self.fstatus = DetectionStatus::NoConsistentSequence;
        }
        self.fct = Some(ct);
    }

    /// Tracks both sides from the central scan, with the second-chance
    /// rerun of the first side when only the second side found bounds.
    fn track_both_sides(
        &mut self,
        ptset: &PtTileSet,
        ct: &mut CarriageTrack,
        cs: &CentralScan,
        exlimit: i32,
        central: CentralFacts,
        net_central: Option<Plateau>,
    ) {
        let mut ds = cs.ds.clone();
        let mut disp = cs.disp.clone();
        let mut ds2 = cs.ds.clone();
        let mut disp2 = cs.disp.clone();
        let mut regs = SideRegisters::new(
            POS_HEIGHT_REGISTER_SIZE,
            UNSTABILITY_REGISTER_SIZE,
            UNSTABILITY_PATH_LIMIT,
        );

        regs.seed(central.reliable, central.center, central.refh);
        self.track_side(
            ptset, ct, true, cs.reversed, exlimit, &mut ds, &mut disp, cs, &mut regs,
            net_central.clone(),
        );
        let first_unbounded = self.initial_unbounded;

        regs.seed(central.reliable, central.center, central.refh);
        let net_ref2 = net_central
            .as_ref()
            .map(|c| ct.plateau(self.initial_ref_idx).cloned().unwrap_or_else(|| c.clone()));
        self.track_side(
            ptset, ct, false, cs.reversed, exlimit, &mut ds2, &mut disp2, cs, &mut regs,
            net_ref2,
        );

        // second chance for the first side if the central plateau was not
        // bounded and a bound was found on the second side
        if first_unbounded && !self.initial_unbounded {
            let mut ds3 = cs.ds.clone();
            let mut disp3 = cs.disp.clone();
            regs.seed(central.reliable, central.center, central.refh);
            let net_ref3 = net_central
                .as_ref()
                .map(|c| ct.plateau(self.initial_ref_idx).cloned().unwrap_or_else(|| c.clone()));
            self.track_side(
                ptset, ct, true, cs.reversed, exlimit, &mut ds3, &mut disp3, cs, &mut regs,
                net_ref3,
            );
        }
    }

    /// Per-side tracking loop.
    #[allow(clippy::too_many_arguments)]
    fn track_side(
        &mut self,
        ptset: &PtTileSet,
        ct: &mut CarriageTrack,
        on_right: bool,
        reversed: bool,
        exlimit: i32,
        ds: &mut DirectionalScanner,
        disp: &mut DirectionalScanner,
        cs: &CentralScan,
        regs: &mut SideRegisters,
        mut net_ref: Option<Plateau>,
    ) {
        let initial = exlimit != 0;
        let mut search = true;
        let mut nbfail = 0usize;
        let mut num: i32 = if on_right { -1 } else { 1 };
        let exlim = if on_right { -exlimit } else { exlimit };
        ct.clear_side(on_right);
        let mut confdist: i32 = 1;
        let (ss_p1, ss_p2) = self.input_stroke(initial);
        let ss_p12 = ss_p1.vector_to(ss_p2);
        let ss_l12 = (ss_p12.norm2() as f32).sqrt();
        let mut dss_n = ss_p12;
        if dss_n.x < 0 {
            dss_n.invert();
        }
        let net = net_ref.is_some();
        let mut refs = self.initial_refs;
        let mut refe = self.initial_refe;
        let mut refh = self.initial_refh;
        let rightward = on_right != reversed;

        while search && num != exlim {
            // recentre the strip on the predicted plateau
            let pcenter = match net_ref.as_ref() {
                Some(r) => r.estimated_center(),
                None => (refs + refe) * 0.5,
            };
            let posx = ss_p1.x as f32 + (ss_p12.x as f32 / ss_l12) * pcenter / self.csize;
            let posy = ss_p1.y as f32 + (ss_p12.y as f32 / ss_l12) * pcenter / self.csize;
            let valc = dss_n.x as f32 * posx + dss_n.y as f32 * posy;
            let scan_shift = round_half(valc);
            disp.bind_to(dss_n.x, dss_n.y, scan_shift as i64);
            ds.bind_to(
                dss_n.x,
                dss_n.y,
                (scan_shift * self.subdiv + self.subdiv / 2) as i64,
            );

            // advance one display scan and the matching point scans
            let mut dispix = Vec::new();
            if rightward {
                disp.next_on_right(&mut dispix);
            } else {
                disp.next_on_left(&mut dispix);
            }
            let mut pix = Vec::new();
            if dispix.is_empty() {
                search = false;
            } else {
                for _ in 0..self.subdiv {
                    if !search {
                        break;
                    }
                    let n = if rightward {
                        ds.next_on_right(&mut pix)
                    } else {
                        ds.next_on_left(&mut pix)
                    };
                    if n == 0 {
                        search = false;
                    }
                }
            }
            if pix.is_empty() {
                search = false;
            } else {
                let pts = self.collect_profile(ptset, &pix, cs.p1f, cs.p12, cs.l12);

                // plateau fit with lateral retries
                let reference = match net_ref.as_ref() {
                    Some(r) => TrackRef {
                        start: r.estimated_start(),
                        end: r.estimated_end(),
                        height: Some(r.min_height()),
                    },
                    None => TrackRef {
                        start: refs,
                        end: refe,
                        height: Some(refh),
                    },
                };
                let mut pl =
                    Plateau::track(&self.pfeat, scan_shift, &pts, reference, 0.0, confdist);
                if pl.status() != PlateauStatus::Ok {
                    if net {
                        let mut tracking = true;
                        for trial in 0..NB_SIDE_TRIALS * 2 {
                            if !tracking {
                                break;
                            }
                            let off = self.pfeat.plateau_search_distance
                                * (trial / 2 + 1) as f32
                                * if trial % 2 == 0 { 1.0 } else { -1.0 };
                            let pl2 = Plateau::track(
                                &self.pfeat, scan_shift, &pts, reference, off, confdist,
                            );
                            if pl2.status() > pl.status() {
                                pl = pl2;
                                if pl.status() == PlateauStatus::Ok {
                                    tracking = false;
                                }
                            }
                        }
                    } else {
                        // retry order follows the bound-erosion side
                        let erosion = regs.stability.update(
                            pl.internal_start(),
                            pl.internal_end(),
                            pl.bounded_start(),
                            pl.bounded_end(),
                            pl.estimated_width(),
                            self.pfeat.max_length,
                        );
                        let first_off = if erosion < 0 {
                            -self.pfeat.plateau_search_distance
                        } else {
                            self.pfeat.plateau_search_distance
                        };
                        let pl2 = Plateau::track(
                            &self.pfeat, scan_shift, &pts, reference, first_off, confdist,
                        );
                        if pl2.status() > pl.status() {
                            pl = pl2;
                        }
                        if pl.status() != PlateauStatus::Ok {
                            let pl3 = Plateau::track(
                                &self.pfeat, scan_shift, &pts, reference, -first_off, confdist,
                            );
                            if pl3.status() > pl.status() {
                                pl = pl3;
                            }
                        }
                    }
                }

                // obstacle ends a net-build traversal
                if net && pl.impassable() {
                    search = false;
                }

                // failure tolerance: only populated scans count
                if pl.status() == PlateauStatus::Ok {
                    nbfail = 0;
                } else if self.params.density_insensitive || pl.has_enough_points() {
                    nbfail += 1;
                    if nbfail >= self.params.plateau_lack_tolerance {
                        search = false;
                    }
                }

                // bound discovery
                if search && self.initial_unbounded {
                    if pl.bounded() && pl.is_accepted() {
                        self.initial_unbounded = false;
                        if net {
                            self.initial_ref_idx = num;
                        } else {
                            self.initial_refs = pl.internal_start();
                            self.initial_refe = pl.internal_end();
                        }
                    } else if num == NOBOUNDS_TOLERANCE || num == -NOBOUNDS_TOLERANCE {
                        ct.set_status(DetectionStatus::NoBounds);
                        self.fail(initial, DetectionStatus::NoBounds);
                        search = false;
                    }
                }

                // prediction update
                if search {
                    pl.set_deviation(regs.position.update(pl.possible(), pl.estimated_center()));
                    pl.set_slope(regs.height.update(pl.consistent_height(), pl.min_height()));
                    if !net {
                        if pl.possible() {
                            refs = pl.estimated_start();
                            refe = pl.estimated_end();
                        }
                        if self.pfeat.is_deviation_prediction_on() || !pl.possible() {
                            refs += pl.estimated_deviation();
                            refe += pl.estimated_deviation();
                        }
                        if pl.consistent_height() {
                            refh = pl.min_height();
                        }
                        if self.pfeat.is_slope_prediction_on() || !pl.consistent_height() {
                            refh += pl.estimated_slope();
                        }
                    }
                }
                if net {
                    net_ref = Some(pl.clone());
                }

                // commit the step, then acceptance and back-fill
                let accepted_ok = pl.status() == PlateauStatus::Ok && pl.reliable();
                let c1 = pl.estimated_center();
                ct.add(on_right, pl, dispix);
                if accepted_ok {
                    let anchor_idx = if num < 0 { num + confdist } else { num - confdist };
                    if net && self.params.connect_on {
                        let mut cleaning = true;
                        let mut cdist = confdist;
                        let mut locnum = num;
                        let mut hcenter = c1;
                        let fpl_center = ct
                            .plateau(anchor_idx)
                            .map(|p| p.estimated_center())
                            .unwrap_or(c1);
                        while cleaning && cdist != 1 {
                            locnum += if locnum < 0 { 1 } else { -1 };
                            if let Some(lpl) = ct.plateau(locnum) {
                                let c = hcenter + (fpl_center - hcenter) / cdist as f32;
                                cleaning = lpl.contains(c);
                                hcenter = lpl.estimated_center();
                            } else {
                                cleaning = false;
                            }
                            cdist -= 1;
                        }
                        if cleaning {
                            for i in 1..confdist {
                                ct.accept(if num < 0 { num + i } else { num - i });
                            }
                            ct.accept(num);
                        } else {
                            ct.set_status(DetectionStatus::Disconnect);
                            self.fail(initial, DetectionStatus::Disconnect);
                            search = false;
                        }
                    } else {
                        ct.accept(num);
                        let anchor_center = ct
                            .plateau(anchor_idx)
                            .map(|p| p.estimated_center())
                            .unwrap_or(c1);
                        let dc = (anchor_center - c1) / confdist as f32;
                        for i in 1..confdist {
                            let locnum = if num < 0 { num + i } else { num - i };
                            let hit = ct
                                .plateau(locnum)
                                .map(|p| p.contains(c1 + dc * i as f32))
                                .unwrap_or(false);
                            if hit {
                                ct.accept(locnum);
                            }
                        }
                    }
                    confdist = 1;
                    if net {
                        let prev_idx = if num < 0 { num + 1 } else { num - 1 };
                        let connected = match (ct.plateau(num), ct.plateau(prev_idx)) {
                            (Some(p), Some(q)) => p.is_connected_to(q),
                            _ => true,
                        };
                        if !connected {
                            ct.set_status(DetectionStatus::Disconnect);
                            self.fail(initial, DetectionStatus::Disconnect);
                            search = false;
                        }
                    }
                } else {
                    confdist += 1;
                }
            }
            num += if on_right { -1 } else { 1 };
        }
    }

    fn store_stage(&mut self, initial: bool, ct: CarriageTrack) {
        if initial {
            self.ict = Some(ct);
        } else {
            self.fct = Some(ct);
        }
    }

    /// Least-squares realignment of the input stroke, orthogonal to the
    /// fitted centre line, with a fixed half-length of one track width.
    fn align_input(&mut self, pts: &[Pt2f]) {
        if pts.is_empty() {
            return;
        }
        let n = pts.len() as f32;
        let mut xmin = pts[0].x;
        let mut xmax = xmin;
        let mut ymin = pts[0].y;
        let mut ymax = ymin;
        let mut xm = 0.0f32;
        let mut ym = 0.0f32;
        for p in pts {
            xm += p.x;
            ym += p.y;
            xmin = xmin.min(p.x);
            xmax = xmax.max(p.x);
            ymin = ymin.min(p.y);
            ymax = ymax.max(p.y);
        }
        xm /= n;
        ym /= n;
        let mut cov = Matrix2::<f32>::zeros();
        for p in pts {
            let dx = p.x - xm;
            let dy = p.y - ym;
            cov[(0, 0)] += dx * dx;
            cov[(1, 1)] += dy * dy;
            cov[(0, 1)] += dx * dy;
        }
        cov /= n;

        // linear fit a*x - b*y = c on the dominant axis
        let mut a = 1.0f32;
        let mut b = 1.0f32;
        let c;
        if xmax - xmin > ymax - ymin {
            a = cov[(0, 1)] / cov[(0, 0)];
            c = a * xm - ym;
        } else {
            b = cov[(0, 1)] / cov[(1, 1)];
            c = xm - b * ym;
        }

        let p0 = pts[0];
        let d = b * p0.x + a * p0.y;
        let den = a * a + b * b;
        let x = (a * c + b * d) / den;
        let y = (a * d - b * c) / den;
        let dir = if (a * (self.ip2.x - self.ip1.x) as f32 - b * (self.ip2.y - self.ip1.y) as f32)
            < 0.0
        {
            -1.0
        } else {
            1.0
        };
        let length = MAX_TRACK_WIDTH * dir;
        self.fp1 = Pt2i::new(
            ((x - a * length) / self.csize) as i32,
            ((y + b * length) / self.csize) as i32,
        );
        self.fp2 = Pt2i::new(
            ((x + a * length) / self.csize) as i32,
            ((y - b * length) / self.csize) as i32,
        );
        debug!(
            "stroke realigned to ({}, {}) -> ({}, {})",
            self.fp1.x, self.fp1.y, self.fp2.x, self.fp2.y
        );
    }

    /// Replays the scans of an accepted track and labels its points in the
    /// tile set.
    pub fn label_points(&mut self, ptset: &mut PtTileSet, ct: &CarriageTrack) {
        if !ct.is_valid() {
            return;
        }
        let p1 = ct.seed_start();
        let p2 = ct.seed_end();
        let csize = self.csize;
        let p1f = Pt2f::new(csize * (p1.x as f32 + 0.5), csize * (p1.y as f32 + 0.5));
        let p12 = Vr2f::new(csize * (p2.x - p1.x) as f32, csize * (p2.y - p1.y) as f32);
        let l12 = p12.norm();
        if l12 <= 0.0 {
            return;
        }
        let mut ab = p1.vector_to(p2);
        if ab.x < 0 {
            ab.invert();
        }
        let sub = self.subdiv;
        let Some(mut ds) = self.scanp.get_scanner(
            Pt2i::new(p1.x * sub + sub / 2, p1.y * sub + sub / 2),
            Pt2i::new(p2.x * sub + sub / 2, p2.y * sub + sub / 2),
            true,
        ) else {
            return;
        };
        let reversed = self.scanp.is_last_scan_reversed();

        let mut pix0 = Vec::new();
        let mut nbp = ds.first(&mut pix0);
        for _ in 0..sub / 2 {
            if nbp == 0 {
                break;
            }
            nbp = ds.next_on_right(&mut pix0);
        }
        nbp = 1;
        for _ in 0..sub - 1 - sub / 2 {
            if nbp == 0 {
                break;
            }
            nbp = ds.next_on_left(&mut pix0);
        }
        if let Some(pl) = ct.plateau(0) {
            if pl.is_accepted() {
                label_scan(ptset, &pix0, pl, p1f, p12, l12);
            }
        }

        for side in [true, false] {
            let mut scanner = ds.clone();
            let mut search = true;
            let count = if side {
                ct.right_scan_count()
            } else {
                ct.left_scan_count()
            };
            for k in 1..=count as i32 {
                let idx = if side { -k } else { k };
                let Some(pl) = ct.plateau(idx) else {
                    continue;
                };
                scanner.bind_to(ab.x, ab.y, (pl.scan_shift() * sub + sub / 2) as i64);
                let mut pix = Vec::new();
                let rightward = side != reversed;
                for _ in 0..sub {
                    if !search {
                        break;
                    }
                    let n = if rightward {
                        scanner.next_on_right(&mut pix)
                    } else {
                        scanner.next_on_left(&mut pix)
                    };
                    if n == 0 {
                        search = false;
                    }
                }
                if pl.is_accepted() {
                    label_scan(ptset, &pix, pl, p1f, p12, l12);
                }
            }
        }
    }
}

/// Labels the points of one scan that fall inside the plateau interval.
fn label_scan(
    ptset: &mut PtTileSet,
    pix: &[Pt2i],
    pl: &Plateau,
    p1f: Pt2f,
    p12: Vr2f,
    l12: f32,
) {
    let mut pts3: Vec<Pt3f> = Vec::new();
    let mut tls: Vec<usize> = Vec::new();
    let mut lbs: Vec<usize> = Vec::new();
    for q in pix {
        ptset.collect_points_and_labels(&mut pts3, &mut tls, &mut lbs, q.x, q.y);
    }
    let mut recs: Vec<(f32, f32, usize)> = pts3
        .iter()
        .enumerate()
        .map(|(ind, p)| {
            let pcl = Vr2f::new(p.x - p1f.x, p.y - p1f.y);
            (pcl.scalar_product(p12) / l12, p.z, ind)
        })
        .collect();
    recs.sort_by(|a, b| {
        let ka = ((a.0 * 1000.0).floor(), (a.1 * 1000.0).floor());
        let kb = ((b.0 * 1000.0).floor(), (b.1 * 1000.0).floor());
        ka.partial_cmp(&kb).unwrap_or(Ordering::Equal)
    });
    let s = pl.start_index();
    let e = pl.end_index();
    if recs.len() >= e {
        for rec in &recs[s..e] {
            ptset.label_as_track(tls[rec.2], lbs[rec.2]);
        }
    }
}

/// Rounds half away from zero; scan shifts use this rounding throughout.
#[inline]
fn round_half(v: f32) -> i32 {
    (if v < 0.0 { v - 0.5 } else { v + 0.5 }) as i32
}

fn comp_further(a: &Pt2f, b: &Pt2f) -> Ordering {
    let ka = ((a.x * 1000.0).floor(), (a.y * 1000.0).floor());
    let kb = ((b.x * 1000.0).floor(), (b.y * 1000.0).floor());
    ka.partial_cmp(&kb).unwrap_or(Ordering::Equal)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_half_rounds_away_from_zero() {
        assert_eq!(round_half(2.4), 2);
        assert_eq!(round_half(2.6), 3);
        assert_eq!(round_half(-2.4), -2);
        assert_eq!(round_half(-2.6), -3);
    }

    #[test]
    fn profile_order_is_lexicographic_on_millimetres() {
        let a = Pt2f::new(1.0004, 5.0);
        let b = Pt2f::new(1.0009, 4.0);
        // same millimetre bin on x, decided by height
        assert_eq!(comp_further(&a, &b), Ordering::Less);
        let c = Pt2f::new(0.999, 9.0);
        assert_eq!(comp_further(&c, &a), Ordering::Less);
    }
}
