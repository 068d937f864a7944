//! YOLO Operator Workbench
//!
//! This crate implements the runtime core of an operator-facing YOLO
//! detection workbench.
//!
//! # Architecture
//!
//! Detection runs as a single-threaded, poll-driven loop:
//!
//! 1. **FrameSource** normalizes every input kind (still image, folder,
//!    slideshow, video file, network stream, camera, memory buffer)
//!    into one pull-based protocol.
//! 2. **InferenceEngine** runs a detector backend over one frame and
//!    shapes the raw output into named, suppressed, timed boxes.
//! 3. **FramePipeline** joins the two per tick, substituting degraded
//!    results so one bad frame never ends a run.
//! 4. **SessionAccumulator** keeps the append-only box ledger and its
//!    CSV export.
//!
//! # Module Structure
//!
//! - `source`: frame sources and the media descriptor
//! - `detect`: detector backends, the engine, result types
//! - `render`: box and label drawing
//! - `session`: the session ledger and CSV export
//! - `pipeline`: the per-tick driver
//! - `dataset`, `config`: dataset descriptors, workbench settings,
//!   project state

pub mod config;
pub mod dataset;
pub mod detect;
pub mod error;
pub mod frame;
pub mod pipeline;
pub mod render;
pub mod session;
pub mod source;

pub use config::{ProjectState, WorkbenchConfig};
pub use dataset::DatasetDescriptor;
#[cfg(feature = "backend-tract")]
pub use detect::TractBackend;
pub use detect::{
    BackendOutput, DetectionBox, DetectorBackend, Device, EngineConfig, FrameResult, FrameTiming,
    InferenceEngine, RawDetection, StubBackend, STUB_CLASSES,
};
pub use error::{Error, Result};
pub use frame::Frame;
pub use pipeline::FramePipeline;
pub use render::render;
pub use session::{SessionAccumulator, SessionRecord, CSV_HEADERS};
pub use source::{FrameSource, MediaDescriptor, SourceStats};
