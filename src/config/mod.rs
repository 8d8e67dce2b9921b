//! JSON configuration of the demo tool.

use crate::detector::DetectorParams;
use crate::plateau::PlateauParams;
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};

#[derive(Debug, Deserialize)]
pub struct ToolConfig {
    /// Whitespace `x y z` text file of ground points (metres).
    pub points: PathBuf,
    /// JSON list of seed strokes `[[x1, y1, x2, y2], …]` in DTM cells.
    pub seeds: PathBuf,
    #[serde(default)]
    pub grid: GridConfig,
    #[serde(default)]
    pub detector: DetectorParams,
    #[serde(default)]
    pub plateau: PlateauParams,
    #[serde(default)]
    pub output: OutputConfig,
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct GridConfig {
    /// DTM cell size in metres.
    pub cell_size: f32,
    /// Point-grid sub-division per DTM cell.
    pub subdiv: i32,
    /// Tile size in cells (square tiles).
    pub tile_cells: i32,
    /// Resident tiles in buffered mode; 0 loads everything.
    pub buffer_size: usize,
}

impl Default for GridConfig {
    fn default() -> Self {
        Self {
            cell_size: 0.5,
            subdiv: 1,
            tile_cells: 100,
            buffer_size: 0,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    /// Road-map PNG path.
    pub map: Option<PathBuf>,
    /// JSON report path.
    pub report: Option<PathBuf>,
    /// Map pixels per DTM cell.
    pub iratio: f32,
    /// Paint only the connected run chain of each track.
    pub connected: bool,
    /// Retain tracks for polyline export.
    pub keep_tracks: bool,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            map: None,
            report: None,
            iratio: 1.0,
            connected: false,
            keep_tracks: false,
        }
    }
}

pub fn load_config(path: &Path) -> Result<ToolConfig, String> {
    let data = fs::read_to_string(path)
        .map_err(|e| format!("Failed to read config {}: {e}", path.display()))?;
    serde_json::from_str(&data)
        .map_err(|e| format!("Failed to parse config {}: {e}", path.display()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn minimal_config_gets_defaults() {
        let cfg: ToolConfig =
            serde_json::from_str(r#"{"points": "pts.xyz", "seeds": "seeds.json"}"#).unwrap();
        assert_eq!(cfg.grid.cell_size, 0.5);
        assert_eq!(cfg.grid.subdiv, 1);
        assert_eq!(cfg.detector.plateau_lack_tolerance, 11);
        assert_eq!(cfg.plateau.max_length, 6.0);
        assert!(cfg.output.map.is_none());
    }

    #[test]
    fn nested_overrides_apply() {
        let cfg: ToolConfig = serde_json::from_str(
            r#"{
                "points": "p.xyz",
                "seeds": "s.json",
                "grid": {"cell_size": 0.25, "subdiv": 2},
                "detector": {"plateau_lack_tolerance": 5},
                "plateau": {"min_length": 2.0}
            }"#,
        )
        .unwrap();
        assert_eq!(cfg.grid.cell_size, 0.25);
        assert_eq!(cfg.grid.subdiv, 2);
        assert_eq!(cfg.detector.plateau_lack_tolerance, 5);
        assert_eq!(cfg.plateau.min_length, 2.0);
    }
}
