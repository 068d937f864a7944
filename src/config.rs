use anyhow::{anyhow, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::detect::{Device, EngineConfig};
use crate::pipeline::{DEFAULT_CONFIDENCE_THRESHOLD, DEFAULT_IOU_THRESHOLD};
use crate::source::DEFAULT_SLIDESHOW_INTERVAL_MS;

const DEFAULT_WEIGHTS: &str = "stub://detector";
const DEFAULT_CAMERA_INDEX: u32 = 0;
const DEFAULT_PROJECT_STATE_PATH: &str = "workbench_state.json";

#[derive(Debug, Deserialize, Default)]
struct WorkbenchConfigFile {
    detector: Option<DetectorConfigFile>,
    source: Option<SourceConfigFile>,
    project_state_path: Option<PathBuf>,
}

#[derive(Debug, Deserialize, Default)]
struct DetectorConfigFile {
    weights: Option<String>,
    device: Option<String>,
    confidence_threshold: Option<f32>,
    iou_threshold: Option<f32>,
    annotate: Option<bool>,
    verbose: Option<bool>,
}

#[derive(Debug, Deserialize, Default)]
struct SourceConfigFile {
    mirror: Option<bool>,
    slideshow_interval_ms: Option<u64>,
    camera_index: Option<u32>,
}

/// Resolved workbench settings: JSON file named by `WORKBENCH_CONFIG`,
/// overridden by `WORKBENCH_*` environment variables, then validated.
#[derive(Debug, Clone)]
pub struct WorkbenchConfig {
    pub weights: String,
    pub device: Device,
    pub confidence_threshold: f32,
    pub iou_threshold: f32,
    pub annotate: bool,
    pub verbose: bool,
    pub mirror: bool,
    pub slideshow_interval_ms: u64,
    pub camera_index: u32,
    pub project_state_path: PathBuf,
}

impl WorkbenchConfig {
    pub fn load() -> Result<Self> {
        let config_path = std::env::var("WORKBENCH_CONFIG").ok();
        let file_cfg = match config_path.as_deref() {
            Some(path) => Some(read_config_file(Path::new(path))?),
            None => None,
        };
        let mut cfg = Self::from_file(file_cfg.unwrap_or_default())?;
        cfg.apply_env()?;
        cfg.validate()?;
        Ok(cfg)
    }

    fn from_file(file: WorkbenchConfigFile) -> Result<Self> {
        let weights = file
            .detector
            .as_ref()
            .and_then(|detector| detector.weights.clone())
            .unwrap_or_else(|| DEFAULT_WEIGHTS.to_string());
        let device = match file.detector.as_ref().and_then(|detector| detector.device.clone()) {
            Some(device) => device
                .parse::<Device>()
                .map_err(|e| anyhow!("invalid device in config: {}", e))?,
            None => Device::Cpu,
        };
        let confidence_threshold = file
            .detector
            .as_ref()
            .and_then(|detector| detector.confidence_threshold)
            .unwrap_or(DEFAULT_CONFIDENCE_THRESHOLD);
        let iou_threshold = file
            .detector
            .as_ref()
            .and_then(|detector| detector.iou_threshold)
            .unwrap_or(DEFAULT_IOU_THRESHOLD);
        let annotate = file
            .detector
            .as_ref()
            .and_then(|detector| detector.annotate)
            .unwrap_or(true);
        let verbose = file
            .detector
            .as_ref()
            .and_then(|detector| detector.verbose)
            .unwrap_or(false);
        let mirror = file
            .source
            .as_ref()
            .and_then(|source| source.mirror)
            .unwrap_or(false);
        let slideshow_interval_ms = file
            .source
            .as_ref()
            .and_then(|source| source.slideshow_interval_ms)
            .unwrap_or(DEFAULT_SLIDESHOW_INTERVAL_MS);
        let camera_index = file
            .source
            .as_ref()
            .and_then(|source| source.camera_index)
            .unwrap_or(DEFAULT_CAMERA_INDEX);
        let project_state_path = file
            .project_state_path
            .unwrap_or_else(|| PathBuf::from(DEFAULT_PROJECT_STATE_PATH));
        Ok(Self {
            weights,
            device,
            confidence_threshold,
            iou_threshold,
            annotate,
            verbose,
            mirror,
            slideshow_interval_ms,
            camera_index,
            project_state_path,
        })
    }

    fn apply_env(&mut self) -> Result<()> {
        if let Ok(weights) = std::env::var("WORKBENCH_WEIGHTS") {
            if !weights.trim().is_empty() {
                self.weights = weights;
            }
        }
        if let Ok(device) = std::env::var("WORKBENCH_DEVICE") {
            if !device.trim().is_empty() {
                self.device = device
                    .parse::<Device>()
                    .map_err(|e| anyhow!("WORKBENCH_DEVICE: {}", e))?;
            }
        }
        if let Ok(conf) = std::env::var("WORKBENCH_CONF") {
            self.confidence_threshold = conf
                .parse()
                .map_err(|_| anyhow!("WORKBENCH_CONF must be a number"))?;
        }
        if let Ok(iou) = std::env::var("WORKBENCH_IOU") {
            self.iou_threshold = iou
                .parse()
                .map_err(|_| anyhow!("WORKBENCH_IOU must be a number"))?;
        }
        if let Ok(mirror) = std::env::var("WORKBENCH_MIRROR") {
            self.mirror = parse_bool(&mirror)
                .ok_or_else(|| anyhow!("WORKBENCH_MIRROR must be true or false"))?;
        }
        if let Ok(interval) = std::env::var("WORKBENCH_SLIDESHOW_INTERVAL_MS") {
            self.slideshow_interval_ms = interval.parse().map_err(|_| {
                anyhow!("WORKBENCH_SLIDESHOW_INTERVAL_MS must be an integer number of milliseconds")
            })?;
        }
        if let Ok(index) = std::env::var("WORKBENCH_CAMERA_INDEX") {
            self.camera_index = index
                .parse()
                .map_err(|_| anyhow!("WORKBENCH_CAMERA_INDEX must be an integer"))?;
        }
        if let Ok(path) = std::env::var("WORKBENCH_PROJECT_STATE") {
            if !path.trim().is_empty() {
                self.project_state_path = PathBuf::from(path);
            }
        }
        Ok(())
    }

    fn validate(&self) -> Result<()> {
        if self.weights.trim().is_empty() {
            return Err(anyhow!("weights must not be empty"));
        }
        for (name, value) in [
            ("confidence", self.confidence_threshold),
            ("iou", self.iou_threshold),
        ] {
            if !(0.0..=1.0).contains(&value) {
                return Err(anyhow!(
                    "{} threshold must be within [0, 1], got {}",
                    name,
                    value
                ));
            }
        }
        if self.slideshow_interval_ms == 0 {
            return Err(anyhow!("slideshow interval must be greater than zero"));
        }
        Ok(())
    }

    /// Engine construction parameters for these settings.
    pub fn engine_config(&self, class_names: Vec<String>) -> EngineConfig {
        EngineConfig {
            weights: self.weights.clone(),
            device: self.device,
            class_names,
            verbose: self.verbose,
            annotate: self.annotate,
            ..EngineConfig::default()
        }
    }
}

fn read_config_file(path: &Path) -> Result<WorkbenchConfigFile> {
    let raw = std::fs::read_to_string(path)
        .map_err(|e| anyhow!("failed to read config file {}: {}", path.display(), e))?;
    let cfg = serde_json::from_str(&raw)
        .map_err(|e| anyhow!("invalid config file {}: {}", path.display(), e))?;
    Ok(cfg)
}

fn parse_bool(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

// ----------- project state -----------

/// Pointers to the artifacts of external training and validation runs.
/// The workbench only records where they landed; producing them is out
/// of its hands.
#[derive(Clone, Debug, Default, Deserialize, PartialEq, Serialize)]
pub struct ProjectState {
    pub model_to_validate: Option<PathBuf>,
    pub train_info_dir: Option<PathBuf>,
    pub val_info_dir: Option<PathBuf>,
}

impl ProjectState {
    /// Load state from disk; an absent file is an empty state.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let raw = std::fs::read_to_string(path)
            .map_err(|e| anyhow!("failed to read project state {}: {}", path.display(), e))?;
        let state = serde_json::from_str(&raw)
            .map_err(|e| anyhow!("invalid project state {}: {}", path.display(), e))?;
        Ok(state)
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        let raw = serde_json::to_string_pretty(self)?;
        std::fs::write(path, raw)
            .map_err(|e| anyhow!("failed to write project state {}: {}", path.display(), e))?;
        Ok(())
    }

    pub fn record_training_run(&mut self, weights: &Path, info_dir: &Path) {
        self.model_to_validate = Some(weights.to_path_buf());
        self.train_info_dir = Some(info_dir.to_path_buf());
    }

    pub fn record_validation_run(&mut self, info_dir: &Path) {
        self.val_info_dir = Some(info_dir.to_path_buf());
    }
}
