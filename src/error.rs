//! Error types for the workbench core.
//!
//! Every public contract method converts collaborator failures into one
//! of the four kinds below at its own boundary; raw decoder or model
//! errors never cross the `FrameSource` / `InferenceEngine` seams.

use thiserror::Error;

/// Errors produced at the public contract boundaries.
#[derive(Error, Debug)]
pub enum Error {
    /// A descriptor could not be opened: missing path, unreadable
    /// device, or a folder with no decodable images. Fatal to the open
    /// call; the owner is left with no source.
    #[error("open error: {0}")]
    Open(String),

    /// One frame failed to decode or capture mid-stream. Recoverable;
    /// the pipeline substitutes an empty-detections result.
    #[error("read error: {0}")]
    Read(String),

    /// Weights missing or undeserializable. Fatal to the load call
    /// only; a previously loaded engine stays usable.
    #[error("load error: {0}")]
    Load(String),

    /// Disk or permission failure while writing an export. In-memory
    /// records are kept.
    #[error("export error: {0}")]
    Export(String),
}

pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    /// Kind label used in log lines and the CLI summary.
    pub fn kind(&self) -> &'static str {
        match self {
            Error::Open(_) => "open",
            Error::Read(_) => "read",
            Error::Load(_) => "load",
            Error::Export(_) => "export",
        }
    }
}

// ----------- tests -----------
