mod backend;
mod backends;
mod engine;
mod result;

pub use backend::{BackendOutput, DetectorBackend, RawDetection};
pub use backends::{StubBackend, STUB_CLASSES};
pub use engine::{Device, EngineConfig, InferenceEngine};
pub use result::{DetectionBox, FrameResult, FrameTiming};

#[cfg(feature = "backend-tract")]
pub use backends::TractBackend;
