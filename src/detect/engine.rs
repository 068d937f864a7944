//! Inference engine.
//!
//! This module is responsible for:
//! - Loading a detector backend from a weights descriptor (`stub://`
//!   URLs select the synthetic backend, anything else is an ONNX path).
//! - Running one frame through the backend and shaping the output into
//!   a `FrameResult`: overlap suppression, class-name resolution,
//!   optional annotation, per-stage timing.
//!
//! The engine never touches a frame source; callers hand it frames.

use std::fmt;
use std::path::Path;
use std::str::FromStr;
use std::time::Instant;

use crate::detect::backend::{DetectorBackend, RawDetection};
use crate::detect::backends::{StubBackend, STUB_CLASSES};
#[cfg(feature = "backend-tract")]
use crate::detect::backends::TractBackend;
use crate::detect::result::{DetectionBox, FrameResult, FrameTiming};
use crate::error::{Error, Result};
use crate::frame::Frame;
use crate::render::render;

// ----------- device selection -----------

/// Execution device requested for inference.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Device {
    Cpu,
    Cuda(u32),
}

impl FromStr for Device {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let s = s.trim().to_ascii_lowercase();
        if s == "cpu" {
            return Ok(Device::Cpu);
        }
        if s == "cuda" {
            return Ok(Device::Cuda(0));
        }
        if let Some(idx) = s.strip_prefix("cuda:") {
            let idx = idx
                .parse::<u32>()
                .map_err(|_| Error::Load(format!("bad cuda index in device '{}'", s)))?;
            return Ok(Device::Cuda(idx));
        }
        Err(Error::Load(format!("unrecognized device '{}'", s)))
    }
}

impl fmt::Display for Device {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Device::Cpu => write!(f, "cpu"),
            Device::Cuda(idx) => write!(f, "cuda:{}", idx),
        }
    }
}

// ----------- engine configuration -----------

/// Construction parameters for [`InferenceEngine::load`].
#[derive(Clone, Debug)]
pub struct EngineConfig {
    /// Path to ONNX weights, or a `stub://` URL for the synthetic
    /// backend.
    pub weights: String,
    pub device: Device,
    /// Model input raster (width, height).
    pub input_size: (u32, u32),
    /// Class table, indexed by class id. May be left empty for
    /// `stub://` weights; required for ONNX weights.
    pub class_names: Vec<String>,
    /// Log a one-line detection summary per predict call.
    pub verbose: bool,
    /// Carry an all-boxes annotated copy in every result.
    pub annotate: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            weights: "stub://detector".to_string(),
            device: Device::Cpu,
            input_size: (640, 640),
            class_names: Vec::new(),
            verbose: false,
            annotate: true,
        }
    }
}

// ----------- engine -----------

/// A loaded detector plus the class table and per-call policy.
pub struct InferenceEngine {
    backend: Box<dyn DetectorBackend>,
    class_names: Vec<String>,
    device: Device,
    verbose: bool,
    annotate: bool,
}

impl InferenceEngine {
    /// Load weights and build a ready engine.
    ///
    /// Fails with a load error when the weights path does not resolve
    /// to a readable model. A failed load leaves nothing half built;
    /// any previously loaded engine stays usable.
    pub fn load(config: EngineConfig) -> Result<Self> {
        if let Device::Cuda(idx) = config.device {
            log::warn!("cuda:{} requested; this build executes on cpu", idx);
        }

        let (backend, class_names): (Box<dyn DetectorBackend>, Vec<String>) =
            if config.weights.starts_with("stub://") {
                let names = if config.class_names.is_empty() {
                    STUB_CLASSES.iter().map(|s| s.to_string()).collect()
                } else {
                    config.class_names.clone()
                };
                (Box::new(StubBackend::new(names.len())), names)
            } else {
                Self::load_model_backend(&config)?
            };

        log::info!(
            "engine ready: backend={} classes={} weights={}",
            backend.name(),
            class_names.len(),
            config.weights
        );

        Ok(Self {
            backend,
            class_names,
            device: config.device,
            verbose: config.verbose,
            annotate: config.annotate,
        })
    }

    #[cfg(feature = "backend-tract")]
    fn load_model_backend(config: &EngineConfig) -> Result<(Box<dyn DetectorBackend>, Vec<String>)> {
        let path = Path::new(&config.weights);
        if !path.is_file() {
            return Err(Error::Load(format!("weights not found: {}", path.display())));
        }
        if config.class_names.is_empty() {
            return Err(Error::Load(
                "ONNX weights need an explicit class list".to_string(),
            ));
        }
        let (width, height) = config.input_size;
        let backend = TractBackend::load(path, width, height, config.class_names.len())?;
        Ok((Box::new(backend), config.class_names.clone()))
    }

    #[cfg(not(feature = "backend-tract"))]
    fn load_model_backend(config: &EngineConfig) -> Result<(Box<dyn DetectorBackend>, Vec<String>)> {
        let _ = Path::new(&config.weights);
        Err(Error::Load(format!(
            "built without an ONNX backend; only stub:// weights are available (got '{}')",
            config.weights
        )))
    }

    /// Run detection on one frame.
    ///
    /// The input frame is never mutated. Output is deterministic for
    /// the same weights, frame, and thresholds. Every returned box has
    /// `confidence >= confidence_threshold`.
    pub fn predict(
        &mut self,
        frame: &Frame,
        confidence_threshold: f32,
        iou_threshold: f32,
    ) -> Result<FrameResult> {
        if frame.is_empty() {
            return Err(Error::Read("cannot run detection on an empty frame".into()));
        }

        let output = self.backend.detect(
            frame.pixels(),
            frame.width,
            frame.height,
            confidence_threshold,
        )?;

        let post_started = Instant::now();
        let kept = suppress_overlaps(output.rows, iou_threshold);

        let mut boxes = Vec::with_capacity(kept.len());
        for row in kept {
            if row.confidence < confidence_threshold {
                continue;
            }
            let class_name = self.class_names.get(row.class_id).ok_or_else(|| {
                Error::Read(format!(
                    "class id {} outside the {}-entry class table",
                    row.class_id,
                    self.class_names.len()
                ))
            })?;
            boxes.push(DetectionBox {
                x1: row.x1,
                y1: row.y1,
                x2: row.x2,
                y2: row.y2,
                confidence: row.confidence,
                class_id: row.class_id,
                class_name: class_name.clone(),
            });
        }

        let annotated_frame = if self.annotate {
            Some(render(frame, &boxes, None))
        } else {
            None
        };
        let postprocess_ms = post_started.elapsed().as_secs_f64() * 1000.0;

        let timing = FrameTiming {
            preprocess_ms: output.preprocess_ms,
            inference_ms: output.inference_ms,
            postprocess_ms,
        };

        if self.verbose {
            let labels: Vec<String> = boxes.iter().map(DetectionBox::label).collect();
            log::info!(
                "detect: {} object(s) in {:.1} ms [{}]",
                boxes.len(),
                timing.total_ms(),
                labels.join(", ")
            );
        }

        Ok(FrameResult {
            raw_frame: frame.clone(),
            annotated_frame,
            boxes,
            timing,
        })
    }

    /// Resolve a class id through the engine's class table.
    pub fn class_name(&self, class_id: usize) -> Result<&str> {
        self.class_names
            .get(class_id)
            .map(String::as_str)
            .ok_or_else(|| {
                Error::Read(format!(
                    "class id {} outside the {}-entry class table",
                    class_id,
                    self.class_names.len()
                ))
            })
    }

    /// The full class table, indexed by class id.
    pub fn classes(&self) -> &[String] {
        &self.class_names
    }

    pub fn backend_name(&self) -> &'static str {
        self.backend.name()
    }

    pub fn device(&self) -> Device {
        self.device
    }

    /// Run the backend's warm-up hook.
    pub fn warm_up(&mut self) -> Result<()> {
        self.backend.warm_up()
    }

    /// Build an engine around an arbitrary backend.
    #[cfg(test)]
    pub(crate) fn with_backend(
        backend: Box<dyn DetectorBackend>,
        class_names: Vec<String>,
    ) -> Self {
        Self {
            backend,
            class_names,
            device: Device::Cpu,
            verbose: false,
            annotate: false,
        }
    }
}

/// Manual impl: the backend trait object is not `Debug`, so it is shown
/// by its reported name only.
impl fmt::Debug for InferenceEngine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InferenceEngine")
            .field("backend", &self.backend.name())
            .field("class_names", &self.class_names)
            .field("device", &self.device)
            .field("verbose", &self.verbose)
            .field("annotate", &self.annotate)
            .finish()
    }
}

// ----------- overlap suppression -----------

fn iou(a: &RawDetection, b: &RawDetection) -> f32 {
    let ix1 = a.x1.max(b.x1);
    let iy1 = a.y1.max(b.y1);
    let ix2 = a.x2.min(b.x2);
    let iy2 = a.y2.min(b.y2);
    let inter = (ix2 - ix1).max(0.0) * (iy2 - iy1).max(0.0);
    if inter == 0.0 {
        return 0.0;
    }
    let union = (a.x2 - a.x1) * (a.y2 - a.y1) + (b.x2 - b.x1) * (b.y2 - b.y1) - inter;
    inter / union
}

/// Greedy per-class suppression: rows sorted by confidence descending,
/// a row is dropped when it overlaps an already kept row of the same
/// class beyond the threshold.
fn suppress_overlaps(mut rows: Vec<RawDetection>, iou_threshold: f32) -> Vec<RawDetection> {
    rows.sort_by(|a, b| {
        b.confidence
            .partial_cmp(&a.confidence)
            .unwrap_or(std::cmp::Ordering::Equal)
    });
    let mut kept: Vec<RawDetection> = Vec::new();
    'candidates: for row in rows {
        for k in &kept {
            if k.class_id == row.class_id && iou(k, &row) > iou_threshold {
                continue 'candidates;
            }
        }
        kept.push(row);
    }
    kept
}

// ----------- tests -----------

#[cfg(test)]
mod tests {
    use super::*;

    fn make_frame(width: u32, height: u32, seed: u8) -> Frame {
        let data = (0..width * height * 3)
            .map(|i| (i as u8).wrapping_add(seed))
            .collect();
        Frame::new(data, width, height).unwrap()
    }

    fn row(x1: f32, y1: f32, x2: f32, y2: f32, confidence: f32, class_id: usize) -> RawDetection {
        RawDetection {
            x1,
            y1,
            x2,
            y2,
            confidence,
            class_id,
        }
    }

    #[test]
    fn device_parses_cpu_and_cuda() -> Result<()> {
        assert_eq!("cpu".parse::<Device>()?, Device::Cpu);
        assert_eq!("CUDA".parse::<Device>()?, Device::Cuda(0));
        assert_eq!("cuda:2".parse::<Device>()?, Device::Cuda(2));
        assert!("tpu".parse::<Device>().is_err());
        assert!("cuda:x".parse::<Device>().is_err());
        Ok(())
    }

    #[test]
    fn stub_engine_loads_with_default_classes() -> Result<()> {
        let engine = InferenceEngine::load(EngineConfig::default())?;
        assert_eq!(engine.backend_name(), "stub");
        assert_eq!(engine.classes().len(), STUB_CLASSES.len());
        assert_eq!(engine.class_name(0)?, "person");
        assert!(engine.class_name(99).is_err());
        Ok(())
    }

    #[test]
    fn predict_resolves_names_and_honors_threshold() -> Result<()> {
        let mut engine = InferenceEngine::load(EngineConfig::default())?;
        let frame = make_frame(64, 48, 5);
        let result = engine.predict(&frame, 0.25, 0.45)?;
        assert!(!result.boxes.is_empty());
        for b in &result.boxes {
            assert!(b.confidence >= 0.25);
            assert!(STUB_CLASSES.contains(&b.class_name.as_str()));
            assert!(b.x1 < b.x2 && b.y1 < b.y2);
        }
        assert!(result.annotated_frame.is_some());
        assert_eq!(result.raw_frame, frame);
        Ok(())
    }

    #[test]
    fn predict_is_deterministic() -> Result<()> {
        let mut engine = InferenceEngine::load(EngineConfig::default())?;
        let frame = make_frame(64, 48, 9);
        let a = engine.predict(&frame, 0.25, 0.45)?;
        let b = engine.predict(&frame, 0.25, 0.45)?;
        assert_eq!(a.boxes, b.boxes);
        Ok(())
    }

    #[test]
    fn annotate_flag_controls_annotated_frame() -> Result<()> {
        let mut engine = InferenceEngine::load(EngineConfig {
            annotate: false,
            ..EngineConfig::default()
        })?;
        let result = engine.predict(&make_frame(64, 48, 1), 0.25, 0.45)?;
        assert!(result.annotated_frame.is_none());
        Ok(())
    }

    #[test]
    fn custom_class_table_is_used() -> Result<()> {
        let mut engine = InferenceEngine::load(EngineConfig {
            class_names: vec!["cat".to_string(), "dog".to_string()],
            ..EngineConfig::default()
        })?;
        let result = engine.predict(&make_frame(64, 48, 2), 0.25, 0.45)?;
        for b in &result.boxes {
            assert!(b.class_id < 2);
            assert!(b.class_name == "cat" || b.class_name == "dog");
        }
        Ok(())
    }

    #[test]
    fn predict_rejects_empty_frame() -> Result<()> {
        let mut engine = InferenceEngine::load(EngineConfig::default())?;
        let err = engine.predict(&Frame::empty(), 0.25, 0.45).unwrap_err();
        assert_eq!(err.kind(), "read");
        Ok(())
    }

    #[cfg(not(feature = "backend-tract"))]
    #[test]
    fn model_weights_without_backend_is_load_error() {
        let err = InferenceEngine::load(EngineConfig {
            weights: "model.onnx".to_string(),
            ..EngineConfig::default()
        })
        .unwrap_err();
        assert_eq!(err.kind(), "load");
    }

    #[test]
    fn suppression_keeps_best_of_same_class() {
        let rows = vec![
            row(0.0, 0.0, 10.0, 10.0, 0.9, 0),
            row(1.0, 1.0, 11.0, 11.0, 0.7, 0),
        ];
        let kept = suppress_overlaps(rows, 0.45);
        assert_eq!(kept.len(), 1);
        assert_eq!(kept[0].confidence, 0.9);
    }

    #[test]
    fn suppression_ignores_other_classes_and_low_overlap() {
        let rows = vec![
            row(0.0, 0.0, 10.0, 10.0, 0.9, 0),
            row(1.0, 1.0, 11.0, 11.0, 0.7, 1),
            row(50.0, 50.0, 60.0, 60.0, 0.6, 0),
        ];
        let kept = suppress_overlaps(rows, 0.45);
        assert_eq!(kept.len(), 3);
    }

    #[test]
    fn iou_of_disjoint_boxes_is_zero() {
        let a = row(0.0, 0.0, 10.0, 10.0, 0.9, 0);
        let b = row(20.0, 20.0, 30.0, 30.0, 0.9, 0);
        assert_eq!(iou(&a, &b), 0.0);
    }
}
