use crate::frame::Frame;

/// One object instance found in a frame.
#[derive(Clone, Debug, PartialEq)]
pub struct DetectionBox {
    /// Pixel-space corners, `x1 < x2` and `y1 < y2`.
    pub x1: f32,
    pub y1: f32,
    pub x2: f32,
    pub y2: f32,
    /// Confidence in `[0, 1]`.
    pub confidence: f32,
    /// Index into the engine's class table.
    pub class_id: usize,
    pub class_name: String,
}

impl DetectionBox {
    /// Label drawn above the box and logged in verbose mode.
    pub fn label(&self) -> String {
        format!("{} {:.2}", self.class_name, self.confidence)
    }
}

/// Per-stage wall-clock cost of one predict call, in milliseconds.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct FrameTiming {
    pub preprocess_ms: f64,
    pub inference_ms: f64,
    pub postprocess_ms: f64,
}

impl FrameTiming {
    pub fn total_ms(&self) -> f64 {
        self.preprocess_ms + self.inference_ms + self.postprocess_ms
    }
}

/// Everything produced for one input frame.
#[derive(Clone, Debug)]
pub struct FrameResult {
    /// The frame as pulled from the source. Callers may retain it as
    /// the last known frame for later redraws.
    pub raw_frame: Frame,
    /// Copy with every box pre-drawn; present only when the engine is
    /// configured to annotate.
    pub annotated_frame: Option<Frame>,
    /// Boxes in the order the detection stage emitted them. Nothing
    /// downstream reorders this.
    pub boxes: Vec<DetectionBox>,
    pub timing: FrameTiming,
}

impl FrameResult {
    /// Substitute result for a failed frame: no boxes, zero timings.
    /// A decode failure carries the empty placeholder frame; an
    /// inference failure carries the decoded frame.
    pub fn degraded(raw_frame: Frame) -> Self {
        Self {
            raw_frame,
            annotated_frame: None,
            boxes: Vec::new(),
            timing: FrameTiming::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn label_uses_two_decimal_places() {
        let b = DetectionBox {
            x1: 0.0,
            y1: 0.0,
            x2: 10.0,
            y2: 10.0,
            confidence: 0.8765,
            class_id: 0,
            class_name: "person".into(),
        };
        assert_eq!(b.label(), "person 0.88");
    }

    #[test]
    fn degraded_result_is_inert() {
        let r = FrameResult::degraded(Frame::empty());
        assert!(r.boxes.is_empty());
        assert!(r.annotated_frame.is_none());
        assert_eq!(r.timing.total_ms(), 0.0);
    }
}
