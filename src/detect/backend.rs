use crate::error::Result;

/// One raw detector output row, before class-name resolution.
///
/// Coordinates are pixel-space corners of the frame the backend was
/// handed, not model-input space.
#[derive(Clone, Debug, PartialEq)]
pub struct RawDetection {
    pub x1: f32,
    pub y1: f32,
    pub x2: f32,
    pub y2: f32,
    pub confidence: f32,
    pub class_id: usize,
}

/// What one backend call produced, with the backend's own stage split.
#[derive(Clone, Debug, Default)]
pub struct BackendOutput {
    pub rows: Vec<RawDetection>,
    pub preprocess_ms: f64,
    pub inference_ms: f64,
}

/// Detector backend trait.
///
/// Implementations read one RGB8 frame and emit rows at or above the
/// confidence threshold. Overlap suppression, class-name resolution,
/// and annotation happen in the engine, so backends stay a thin wrap
/// around their model runtime.
pub trait DetectorBackend: Send {
    /// Backend identifier.
    fn name(&self) -> &'static str;

    /// Run detection on a frame.
    ///
    /// Implementations must treat the pixel slice as read-only. A
    /// failure here is a per-frame read error; the pipeline substitutes
    /// a degraded result and keeps the run alive.
    fn detect(
        &mut self,
        pixels: &[u8],
        width: u32,
        height: u32,
        confidence_threshold: f32,
    ) -> Result<BackendOutput>;

    /// Optional warm-up hook.
    fn warm_up(&mut self) -> Result<()> {
        Ok(())
    }
}
