#![cfg(feature = "backend-tract")]

use std::path::Path;
use std::time::Instant;

use tract_onnx::prelude::*;

use crate::detect::backend::{BackendOutput, DetectorBackend, RawDetection};
use crate::error::{Error, Result};

type OnnxPlan = SimplePlan<TypedFact, Box<dyn TypedOp>, Graph<TypedFact, Box<dyn TypedOp>>>;

/// Tract-based backend for ONNX YOLO checkpoints.
///
/// Frames are resized to the model's input square, normalized to NCHW
/// f32, and the `[1, 4 + classes, anchors]` output head is decoded
/// back into frame pixel space. No network I/O; the model file is the
/// only thing read from disk.
pub struct TractBackend {
    model: OnnxPlan,
    input_width: u32,
    input_height: u32,
    num_classes: usize,
}

impl TractBackend {
    /// Load an ONNX model from disk and prepare it for inference.
    pub fn load(
        model_path: &Path,
        input_width: u32,
        input_height: u32,
        num_classes: usize,
    ) -> Result<Self> {
        let model = tract_onnx::onnx()
            .model_for_path(model_path)
            .map_err(|e| {
                Error::Load(format!(
                    "read ONNX model {}: {}",
                    model_path.display(),
                    e
                ))
            })?
            .with_input_fact(
                0,
                InferenceFact::dt_shape(
                    f32::datum_type(),
                    tvec!(1, 3, input_height as usize, input_width as usize),
                ),
            )
            .map_err(|e| Error::Load(format!("set input fact: {}", e)))?
            .into_optimized()
            .map_err(|e| Error::Load(format!("optimize ONNX model: {}", e)))?
            .into_runnable()
            .map_err(|e| Error::Load(format!("build runnable model: {}", e)))?;

        Ok(Self {
            model,
            input_width,
            input_height,
            num_classes,
        })
    }

    fn build_input(&self, pixels: &[u8], width: u32, height: u32) -> Result<Tensor> {
        let expected = (width as usize)
            .checked_mul(height as usize)
            .and_then(|v| v.checked_mul(3))
            .ok_or_else(|| Error::Read("frame dimensions overflow".into()))?;
        if pixels.len() != expected {
            return Err(Error::Read(format!(
                "expected {} RGB bytes, received {}",
                expected,
                pixels.len()
            )));
        }

        let img = image::RgbImage::from_raw(width, height, pixels.to_vec())
            .ok_or_else(|| Error::Read("frame buffer rejected".into()))?;
        let resized = image::imageops::resize(
            &img,
            self.input_width,
            self.input_height,
            image::imageops::FilterType::Triangle,
        );

        let input = tract_ndarray::Array4::from_shape_fn(
            (1, 3, self.input_height as usize, self.input_width as usize),
            |(_, channel, y, x)| resized.get_pixel(x as u32, y as u32)[channel] as f32 / 255.0,
        );

        Ok(input.into_tensor())
    }

    fn decode_output(
        &self,
        outputs: TVec<TValue>,
        frame_width: u32,
        frame_height: u32,
        confidence_threshold: f32,
    ) -> Result<Vec<RawDetection>> {
        let output = outputs
            .first()
            .ok_or_else(|| Error::Read("model produced no outputs".into()))?;
        let view = output
            .to_array_view::<f32>()
            .map_err(|e| Error::Read(format!("model output tensor was not f32: {}", e)))?
            .into_dimensionality::<tract_ndarray::Ix3>()
            .map_err(|e| Error::Read(format!("unexpected output rank: {}", e)))?;

        let (batch, channels, anchors) = view.dim();
        if batch != 1 || channels != 4 + self.num_classes {
            return Err(Error::Read(format!(
                "output shape [{}, {}, {}] does not match a {}-class head",
                batch, channels, anchors, self.num_classes
            )));
        }

        let scale_x = frame_width as f32 / self.input_width as f32;
        let scale_y = frame_height as f32 / self.input_height as f32;

        let mut rows = Vec::new();
        for i in 0..anchors {
            let mut best = 0.0f32;
            let mut best_class = 0usize;
            for c in 0..self.num_classes {
                let score = view[[0, 4 + c, i]];
                if score > best {
                    best = score;
                    best_class = c;
                }
            }
            if best < confidence_threshold {
                continue;
            }

            // Anchor rows are [cx, cy, w, h, class scores...] in
            // model-input space.
            let cx = view[[0, 0, i]];
            let cy = view[[0, 1, i]];
            let w = view[[0, 2, i]];
            let h = view[[0, 3, i]];

            rows.push(RawDetection {
                x1: ((cx - w / 2.0) * scale_x).max(0.0),
                y1: ((cy - h / 2.0) * scale_y).max(0.0),
                x2: ((cx + w / 2.0) * scale_x).min(frame_width as f32),
                y2: ((cy + h / 2.0) * scale_y).min(frame_height as f32),
                confidence: best,
                class_id: best_class,
            });
        }

        Ok(rows)
    }
}

impl DetectorBackend for TractBackend {
    fn name(&self) -> &'static str {
        "tract"
    }

    fn detect(
        &mut self,
        pixels: &[u8],
        width: u32,
        height: u32,
        confidence_threshold: f32,
    ) -> Result<BackendOutput> {
        let pre_started = Instant::now();
        let input = self.build_input(pixels, width, height)?;
        let preprocess_ms = pre_started.elapsed().as_secs_f64() * 1000.0;

        let infer_started = Instant::now();
        let outputs = self
            .model
            .run(tvec!(input.into()))
            .map_err(|e| Error::Read(format!("ONNX inference failed: {}", e)))?;
        let rows = self.decode_output(outputs, width, height, confidence_threshold)?;
        let inference_ms = infer_started.elapsed().as_secs_f64() * 1000.0;

        Ok(BackendOutput {
            rows,
            preprocess_ms,
            inference_ms,
        })
    }

    fn warm_up(&mut self) -> Result<()> {
        // One black frame primes the plan's allocations.
        let pixels = vec![0u8; self.input_width as usize * self.input_height as usize * 3];
        self.detect(&pixels, self.input_width, self.input_height, 1.0)
            .map(|_| ())
    }
}
