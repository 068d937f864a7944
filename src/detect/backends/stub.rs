use std::time::Instant;

use sha2::{Digest, Sha256};

use crate::detect::backend::{BackendOutput, DetectorBackend, RawDetection};
use crate::error::Result;

/// Class table the synthetic detector falls back to when the caller
/// supplies none.
pub const STUB_CLASSES: [&str; 4] = ["person", "vehicle", "animal", "package"];

/// Synthetic backend selected by `stub://` weights.
///
/// Boxes are derived from a hash of the pixel content: the same frame
/// always yields the same detections, different frames drift. No model
/// file is touched, so every pipeline path runs without weights.
pub struct StubBackend {
    num_classes: usize,
}

impl StubBackend {
    pub fn new(num_classes: usize) -> Self {
        Self {
            num_classes: num_classes.max(1),
        }
    }
}

impl DetectorBackend for StubBackend {
    fn name(&self) -> &'static str {
        "stub"
    }

    fn detect(
        &mut self,
        pixels: &[u8],
        width: u32,
        height: u32,
        confidence_threshold: f32,
    ) -> Result<BackendOutput> {
        let pre_started = Instant::now();
        let digest: [u8; 32] = Sha256::digest(pixels).into();
        let preprocess_ms = pre_started.elapsed().as_secs_f64() * 1000.0;

        let infer_started = Instant::now();
        let w = width as f32;
        let h = height as f32;
        let count = 1 + (digest[0] as usize % 2);
        let mut rows = Vec::with_capacity(count);
        for i in 0..count {
            let d = &digest[i * 8..i * 8 + 8];
            let cx = (d[0] as f32 / 255.0) * w;
            let cy = (d[1] as f32 / 255.0) * h;
            let bw = (0.2 + 0.3 * (d[2] as f32 / 255.0)) * w;
            let bh = (0.2 + 0.3 * (d[3] as f32 / 255.0)) * h;

            let x1 = (cx - bw / 2.0).max(0.0);
            let y1 = (cy - bh / 2.0).max(0.0);
            let x2 = (cx + bw / 2.0).min(w);
            let y2 = (cy + bh / 2.0).min(h);
            // A center hugging one edge can clamp to a sliver; keep at
            // least one pixel of extent.
            let x1 = x1.min((x2 - 1.0).max(0.0));
            let y1 = y1.min((y2 - 1.0).max(0.0));

            let confidence = 0.55 + 0.42 * (d[4] as f32 / 255.0);
            if confidence < confidence_threshold {
                continue;
            }

            rows.push(RawDetection {
                x1,
                y1,
                x2,
                y2,
                confidence,
                class_id: d[5] as usize % self.num_classes,
            });
        }
        let inference_ms = infer_started.elapsed().as_secs_f64() * 1000.0;

        Ok(BackendOutput {
            rows,
            preprocess_ms,
            inference_ms,
        })
    }
}
