use road_detector::config::{load_config, ToolConfig};
use road_detector::diagnostics::MapperReport;
use road_detector::track::BoundMode;
use road_detector::types::{Pt2f, Pt2i, Pt3f};
use road_detector::{PtTileSet, RoadMapper, TrackDetector};
use std::env;
use std::fs;
use std::path::PathBuf;

fn main() {
    env_logger::init();
    if let Err(err) = run() {
        eprintln!("Error: {err}");
        std::process::exit(1);
    }
}

fn run() -> Result<(), String> {
    let program = env::args().next().unwrap_or_else(|| "road_demo".to_string());
    let cli = parse_args(&program)?;
    let mut cfg = load_config(&cli.config_path)?;
    if let Some(map) = cli.map_out {
        cfg.output.map = Some(map);
    }

    let points = read_points(&cfg)?;
    if points.is_empty() {
        return Err(format!("No points in {}", cfg.points.display()));
    }
    let (mut ptset, width, height) = build_tile_set(&cfg, &points);
    let seeds = read_seeds(&cfg, &ptset)?;

    let mut detector = TrackDetector::new(cfg.detector.clone(), cfg.plateau.clone());
    detector.set_points_grid(width, height, cfg.grid.subdiv, cfg.grid.cell_size);
    let iratio = cfg.output.iratio;
    let map_w = ((width as f32) * iratio).ceil() as i32;
    let map_h = ((height as f32) * iratio).ceil() as i32;
    let mut mapper = RoadMapper::new(
        detector,
        map_w.max(1),
        map_h.max(1),
        iratio,
        cfg.output.connected,
        cfg.output.keep_tracks,
    );

    ptset.set_buffer_size(cfg.grid.buffer_size);
    let report = mapper.process(&mut ptset, &seeds, cfg.grid.buffer_size != 0);

    if cli.format.includes_text() {
        print_text_summary(&report);
    }
    if cli.format.includes_json() {
        let json = serde_json::to_string_pretty(&report)
            .map_err(|e| format!("Failed to serialize JSON: {e}"))?;
        match &cfg.output.report {
            Some(path) => {
                fs::write(path, json)
                    .map_err(|e| format!("Failed to write report to {}: {e}", path.display()))?;
                println!("JSON report written to {}", path.display());
            }
            None => println!("{json}"),
        }
    }

    if let Some(path) = &cfg.output.map {
        let map = mapper.map();
        let img = image::GrayImage::from_raw(
            map.width() as u32,
            map.height() as u32,
            map.pixels().to_vec(),
        )
        .ok_or_else(|| "Road map buffer size mismatch".to_string())?;
        img.save(path)
            .map_err(|e| format!("Failed to write map to {}: {e}", path.display()))?;
        println!("Road map written to {}", path.display());
    }

    if cfg.output.keep_tracks {
        let tracks = mapper.take_road_sections();
        print_polylines(&tracks);
    }
    Ok(())
}

fn read_points(cfg: &ToolConfig) -> Result<Vec<Pt3f>, String> {
    let data = fs::read_to_string(&cfg.points)
        .map_err(|e| format!("Failed to read points {}: {e}", cfg.points.display()))?;
    let mut points = Vec::new();
    for (lineno, line) in data.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let mut vals = line.split_whitespace().map(str::parse::<f32>);
        match (vals.next(), vals.next(), vals.next()) {
            (Some(Ok(x)), Some(Ok(y)), Some(Ok(z))) => points.push(Pt3f::new(x, y, z)),
            _ => {
                return Err(format!(
                    "Malformed point at {}:{}",
                    cfg.points.display(),
                    lineno + 1
                ))
            }
        }
    }
    Ok(points)
}

fn build_tile_set(cfg: &ToolConfig, points: &[Pt3f]) -> (PtTileSet, i32, i32) {
    let cell = cfg.grid.cell_size;
    let xref = points.iter().map(|p| p.x).fold(f32::INFINITY, f32::min) as f64;
    let yref = points.iter().map(|p| p.y).fold(f32::INFINITY, f32::min) as f64;
    let xmax = points.iter().map(|p| p.x).fold(f32::NEG_INFINITY, f32::max) as f64;
    let ymax = points.iter().map(|p| p.y).fold(f32::NEG_INFINITY, f32::max) as f64;
    let cells_w = (((xmax - xref) / cell as f64).floor() as i32 + 1).max(1);
    let cells_h = (((ymax - yref) / cell as f64).floor() as i32 + 1).max(1);
    let tile = cfg.grid.tile_cells.max(1);
    let cot = ((cells_w + tile - 1) / tile).max(1) as usize;
    let rot = ((cells_h + tile - 1) / tile).max(1) as usize;
    let mut set = PtTileSet::new(cot, rot, tile, tile, cell, xref, yref);
    set.add_points(points);
    (set, cot as i32 * tile, rot as i32 * tile)
}

fn read_seeds(cfg: &ToolConfig, ptset: &PtTileSet) -> Result<Vec<Vec<(Pt2i, Pt2i)>>, String> {
    let data = fs::read_to_string(&cfg.seeds)
        .map_err(|e| format!("Failed to read seeds {}: {e}", cfg.seeds.display()))?;
    let raw: Vec<[i32; 4]> = serde_json::from_str(&data)
        .map_err(|e| format!("Failed to parse seeds {}: {e}", cfg.seeds.display()))?;
    let cot = ptset.columns_of_tiles();
    let rot = ptset.rows_of_tiles();
    let tile = cfg.grid.tile_cells.max(1);
    let mut seeds = vec![Vec::new(); cot * rot];
    for [x1, y1, x2, y2] in raw {
        let p1 = Pt2i::new(x1, y1);
        let p2 = Pt2i::new(x2, y2);
        let tx = (((x1 + x2) / 2) / tile).clamp(0, cot as i32 - 1) as usize;
        let ty = (((y1 + y2) / 2) / tile).clamp(0, rot as i32 - 1) as usize;
        seeds[ty * cot + tx].push((p1, p2));
    }
    Ok(seeds)
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum OutputFormat {
    Text,
    Json,
    Both,
}

impl OutputFormat {
    fn from_str(s: &str) -> Result<Self, String> {
        match s.to_lowercase().as_str() {
            "text" => Ok(Self::Text),
            "json" => Ok(Self::Json),
            "both" => Ok(Self::Both),
            other => Err(format!("Unknown format '{other}'. Use text|json|both.")),
        }
    }

    fn includes_text(&self) -> bool {
        matches!(self, Self::Text | Self::Both)
    }

    fn includes_json(&self) -> bool {
        matches!(self, Self::Json | Self::Both)
    }
}

struct CliConfig {
    config_path: PathBuf,
    format: OutputFormat,
    map_out: Option<PathBuf>,
}

fn parse_args(program: &str) -> Result<CliConfig, String> {
    let mut args = env::args().skip(1);
    let mut config_path: Option<PathBuf> = None;
    let mut format = OutputFormat::Text;
    let mut map_out: Option<PathBuf> = None;

    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--help" | "-h" => {
                println!("{}", usage(program));
                std::process::exit(0);
            }
            "--format" => {
                let value = args
                    .next()
                    .ok_or_else(|| format!("--format expects a value\n{}", usage(program)))?;
                format = OutputFormat::from_str(&value)?;
            }
            "--map-out" => {
                let value = args
                    .next()
                    .ok_or_else(|| format!("--map-out expects a path\n{}", usage(program)))?;
                map_out = Some(PathBuf::from(value));
            }
            _ if arg.starts_with('-') => {
                return Err(format!("Unknown option '{arg}'\n{}", usage(program)));
            }
            _ => {
                if config_path.is_some() {
                    return Err(format!(
                        "Unexpected positional argument '{arg}'\n{}",
                        usage(program)
                    ));
                }
                config_path = Some(PathBuf::from(arg));
            }
        }
    }

    let config_path = config_path.ok_or_else(|| usage(program))?;
    Ok(CliConfig {
        config_path,
        format,
        map_out,
    })
}

fn usage(program: &str) -> String {
    format!(
        "Usage: {program} <config.json> [--format text|json|both] [--map-out map.png]\n\n\
Runs the carriage-track detector over a seed catalogue and paints the\n\
detected roads onto an occupancy map.\n\
Examples:\n  {program} data/run.json --format both\n  {program} run.json --map-out roads.png\n"
    )
}

fn print_text_summary(report: &MapperReport) {
    println!("Detection summary");
    println!("  roads: {}", report.roads);
    println!("  unused seeds: {}", report.unused_seeds);
    println!("  covered pixels: {}", report.coverage);
    println!("  outside requests: {}", report.outside_requests);
    println!("  elapsed_ms: {:.3}", report.elapsed_ms);
    for seed in &report.seeds {
        println!(
            "  seed ({}, {}) -> ({}, {}): status {} spread {} holes {} shift {:.3}{}",
            seed.seed_start.x,
            seed.seed_start.y,
            seed.seed_end.x,
            seed.seed_end.y,
            seed.status_code,
            seed.spread,
            seed.holes,
            seed.shift_length,
            if seed.painted { " painted" } else { "" }
        );
    }
}

fn print_polylines(tracks: &[road_detector::CarriageTrack]) {
    for (num, track) in tracks.iter().enumerate() {
        let mut b1: Vec<Pt2f> = Vec::new();
        let mut b2: Vec<Pt2f> = Vec::new();
        track.get_position(&mut b1, &mut b2, BoundMode::Estimated, 1.0);
        println!("Track {num}: {} bound points per side", b1.len());
        for (p, q) in b1.iter().zip(&b2) {
            println!("  [{:.2}, {:.2}] - [{:.2}, {:.2}]", p.x, p.y, q.x, q.y);
        }
    }
}
