//! Frame pipeline.
//!
//! This module provides `FramePipeline`, the per-tick driver that joins
//! one open frame source to an inference engine.
//!
//! The pipeline is responsible for:
//! - Holding at most one open source and replacing it atomically
//! - Pulling one frame and running one predict call per tick
//! - Substituting an empty degraded result when a frame fails to
//!   decode or infer, so one bad frame never ends a run
//! - Carrying the operator's thresholds and mirror preference across
//!   source switches
//!
//! The pipeline MUST NOT:
//! - Buffer frames or results between ticks
//! - Own the engine; callers pass it per tick and may swap it

use std::path::Path;

use crate::detect::{FrameResult, InferenceEngine};
use crate::error::Result;
use crate::frame::Frame;
use crate::source::{FrameSource, MediaDescriptor, SourceStats};

pub const DEFAULT_CONFIDENCE_THRESHOLD: f32 = 0.25;
pub const DEFAULT_IOU_THRESHOLD: f32 = 0.45;

/// One source, one engine, one result per tick.
pub struct FramePipeline {
    source: Option<FrameSource>,
    confidence_threshold: f32,
    iou_threshold: f32,
    mirror: bool,
    ticks: u64,
    degraded_frames: u64,
}

impl Default for FramePipeline {
    fn default() -> Self {
        Self::new()
    }
}

impl FramePipeline {
    pub fn new() -> Self {
        Self {
            source: None,
            confidence_threshold: DEFAULT_CONFIDENCE_THRESHOLD,
            iou_threshold: DEFAULT_IOU_THRESHOLD,
            mirror: false,
            ticks: 0,
            degraded_frames: 0,
        }
    }

    /// Open a source, closing the current one first. A failed open
    /// leaves the pipeline without a source.
    pub fn open(&mut self, descriptor: &MediaDescriptor) -> Result<()> {
        self.close();
        let source = FrameSource::open(descriptor)?.with_mirror(self.mirror);
        log::info!("pipeline source: {} ({})", source.label(), source.kind());
        self.source = Some(source);
        Ok(())
    }

    /// Open a folder as a cyclic slideshow.
    pub fn open_slideshow(&mut self, dir: &Path, interval_ms: Option<u64>) -> Result<()> {
        self.close();
        let source = FrameSource::open_slideshow(dir, interval_ms)?.with_mirror(self.mirror);
        log::info!("pipeline source: {} (slideshow)", source.label());
        self.source = Some(source);
        Ok(())
    }

    /// Close the current source, if any. Ticks after close report no
    /// result until a new source is opened.
    pub fn close(&mut self) {
        if let Some(mut source) = self.source.take() {
            source.close();
        }
    }

    /// Pull one frame and run one predict call.
    ///
    /// `None` means there is nothing to process: no source is open, or
    /// the source is exhausted. A frame that fails to decode or infer
    /// still yields a result, a degraded one, and the tick counts.
    pub fn tick(&mut self, engine: &mut InferenceEngine) -> Option<FrameResult> {
        let source = self.source.as_mut()?;
        let read = source.next_frame();
        let label = source.label().to_string();

        match read {
            Ok(Some(frame)) => {
                self.ticks += 1;
                match engine.predict(&frame, self.confidence_threshold, self.iou_threshold) {
                    Ok(result) => Some(result),
                    Err(e) => {
                        self.degraded_frames += 1;
                        log::warn!(
                            "inference failed on {}: {} (substituting empty result)",
                            label,
                            e
                        );
                        Some(FrameResult::degraded(frame))
                    }
                }
            }
            Ok(None) => {
                log::info!("source exhausted: {}", label);
                None
            }
            Err(e) => {
                self.ticks += 1;
                self.degraded_frames += 1;
                log::warn!(
                    "frame read failed on {}: {} (substituting empty result)",
                    label,
                    e
                );
                Some(FrameResult::degraded(Frame::empty()))
            }
        }
    }

    pub fn has_source(&self) -> bool {
        self.source.is_some()
    }

    pub fn source_label(&self) -> Option<&str> {
        self.source.as_ref().map(|s| s.label())
    }

    pub fn source_stats(&self) -> Option<SourceStats> {
        self.source.as_ref().map(|s| s.stats())
    }

    /// Poll interval suggested by the open source; 0 without one.
    pub fn suggested_interval_ms(&self) -> u64 {
        self.source
            .as_ref()
            .map(|s| s.suggested_interval_ms())
            .unwrap_or(0)
    }

    /// Mirror preference, applied to the current source and remembered
    /// for sources opened later.
    pub fn set_mirror(&mut self, mirror: bool) {
        self.mirror = mirror;
        if let Some(source) = self.source.as_mut() {
            source.set_mirror(mirror);
        }
    }

    pub fn mirror(&self) -> bool {
        self.mirror
    }

    pub fn set_confidence_threshold(&mut self, value: f32) {
        self.confidence_threshold = value.clamp(0.0, 1.0);
    }

    pub fn confidence_threshold(&self) -> f32 {
        self.confidence_threshold
    }

    pub fn set_iou_threshold(&mut self, value: f32) {
        self.iou_threshold = value.clamp(0.0, 1.0);
    }

    pub fn iou_threshold(&self) -> f32 {
        self.iou_threshold
    }

    /// Frames pulled (or attempted) since construction.
    pub fn ticks(&self) -> u64 {
        self.ticks
    }

    /// Ticks that substituted a degraded result.
    pub fn degraded_frames(&self) -> u64 {
        self.degraded_frames
    }
}
