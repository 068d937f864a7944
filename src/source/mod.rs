//! Frame sources.
//!
//! This module normalizes every detection input into one pull-based
//! protocol:
//! - Still images, image folders, slideshows (always available)
//! - Video files and network streams (feature: ingest-file-ffmpeg)
//! - V4L2 cameras (feature: ingest-v4l2)
//! - In-memory buffers and `stub://` synthetic streams
//!
//! A descriptor is resolved into a concrete source kind exactly once at
//! open time; per-pull code never re-inspects the filesystem. The
//! source layer is responsible for:
//! - Decoding frames to RGB8
//! - Applying the mirror flag to streaming pulls only
//! - Reporting a suggested poll interval per source kind
//!
//! The source layer MUST NOT:
//! - Run inference
//! - Retain frames beyond handing them out
//! - Buffer a backlog for live sources (latest frame only)

#[cfg(feature = "ingest-v4l2")]
pub(crate) mod camera;
#[cfg(feature = "ingest-file-ffmpeg")]
pub(crate) mod video;

use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

#[cfg(feature = "ingest-v4l2")]
use camera::CameraStream;
#[cfg(feature = "ingest-file-ffmpeg")]
use video::VideoStream;

use crate::error::{Error, Result};
use crate::frame::Frame;

/// Canonical image extension set for every folder-of-images operation,
/// matched case-insensitively.
pub const IMAGE_EXTENSIONS: [&str; 7] = ["jpg", "jpeg", "png", "bmp", "tif", "tiff", "gif"];

/// Documented video container set. Any file that is neither a canonical
/// image nor a weights checkpoint is handed to the video decoder, so
/// uncommon containers still get a chance.
pub const VIDEO_EXTENSIONS: [&str; 4] = ["mp4", "avi", "mov", "mkv"];

/// Checkpoint extensions rejected with a pointed message instead of
/// being fed to the video decoder.
const WEIGHT_EXTENSIONS: [&str; 3] = ["pt", "pth", "onnx"];

/// Caller-side pacing defaults, in milliseconds.
pub const DEFAULT_SLIDESHOW_INTERVAL_MS: u64 = 2_000;
pub const LIVE_INTERVAL_MS: u64 = 33;

// ----------------------------------------------------------------------------
// MediaDescriptor: what the caller wants opened
// ----------------------------------------------------------------------------

/// A detection input, before resolution.
#[derive(Clone, Debug, PartialEq)]
pub enum MediaDescriptor {
    /// Filesystem path: image file, folder of images, or video file.
    Path(PathBuf),
    /// One already decoded frame.
    Buffer(Frame),
    /// Camera device by index.
    Camera(u32),
    /// Network stream URL; `stub://` URLs select the synthetic stream.
    Url(String),
}

impl FromStr for MediaDescriptor {
    type Err = Error;

    /// CLI form: `camera:N`, a URL with a scheme, or a filesystem path.
    fn from_str(s: &str) -> Result<Self> {
        let s = s.trim();
        if s.is_empty() {
            return Err(Error::Open("empty media descriptor".to_string()));
        }
        if let Some(index) = s.strip_prefix("camera:") {
            let index = index
                .parse::<u32>()
                .map_err(|_| Error::Open(format!("bad camera index in '{}'", s)))?;
            return Ok(MediaDescriptor::Camera(index));
        }
        if s.contains("://") {
            return Ok(MediaDescriptor::Url(s.to_string()));
        }
        Ok(MediaDescriptor::Path(PathBuf::from(s)))
    }
}

// ----------------------------------------------------------------------------
// FrameSource
// ----------------------------------------------------------------------------

/// One open media input, iterated a frame at a time.
///
/// `next_frame` yields `Ok(Some(frame))` per frame, `Ok(None)` once the
/// source is exhausted, and a read error for a frame that failed to
/// decode or capture; iteration continues past read errors.
pub struct FrameSource {
    backend: SourceBackend,
    label: String,
    mirror: bool,
    frames_delivered: u64,
}

enum SourceBackend {
    /// Single image file, decoded on the first pull.
    Still { path: PathBuf, consumed: bool },
    /// One in-memory frame, yielded once.
    Buffer { frame: Option<Frame> },
    /// Finite walk over a folder's images.
    Folder { files: Vec<PathBuf>, cursor: usize },
    /// Cyclic walk; the caller supplies the pacing.
    Slideshow {
        files: Vec<PathBuf>,
        cursor: usize,
        interval_ms: u64,
    },
    /// Deterministic synthetic live stream.
    Stub(StubStream),
    #[cfg(feature = "ingest-file-ffmpeg")]
    Video(VideoStream),
    #[cfg(feature = "ingest-v4l2")]
    Camera(CameraStream),
    /// Terminal state after `close`.
    Closed,
}

impl FrameSource {
    /// Resolve a descriptor and open the source.
    ///
    /// Resolution happens here, once: a missing path, an unreadable
    /// device, or a folder without decodable images all fail the open
    /// call and nothing is left half initialized.
    pub fn open(descriptor: &MediaDescriptor) -> Result<Self> {
        match descriptor {
            MediaDescriptor::Path(path) => Self::open_path(path),
            MediaDescriptor::Buffer(frame) => Ok(Self::from_backend(
                SourceBackend::Buffer {
                    frame: Some(frame.clone()),
                },
                "memory buffer".to_string(),
            )),
            MediaDescriptor::Camera(index) => Self::open_camera(*index),
            MediaDescriptor::Url(url) => Self::open_url(url),
        }
    }

    /// Open a folder as a cyclic slideshow instead of a finite walk.
    ///
    /// The cursor advances `(i + 1) mod n` on every pull and the source
    /// never exhausts itself; only `close` ends it.
    pub fn open_slideshow(dir: &Path, interval_ms: Option<u64>) -> Result<Self> {
        let files = list_image_files(dir)?;
        Ok(Self::from_backend(
            SourceBackend::Slideshow {
                files,
                cursor: 0,
                interval_ms: interval_ms.unwrap_or(DEFAULT_SLIDESHOW_INTERVAL_MS),
            },
            display_name(dir),
        ))
    }

    /// Apply horizontal mirroring to streaming pulls. Still, folder,
    /// slideshow, and buffer sources ignore the flag.
    pub fn with_mirror(mut self, mirror: bool) -> Self {
        self.mirror = mirror;
        self
    }

    pub fn set_mirror(&mut self, mirror: bool) {
        self.mirror = mirror;
    }

    fn from_backend(backend: SourceBackend, label: String) -> Self {
        Self {
            backend,
            label,
            mirror: false,
            frames_delivered: 0,
        }
    }

    fn open_path(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Err(Error::Open(format!("no such path: {}", path.display())));
        }
        if path.is_dir() {
            let files = list_image_files(path)?;
            return Ok(Self::from_backend(
                SourceBackend::Folder { files, cursor: 0 },
                display_name(path),
            ));
        }
        if has_extension_in(path, &WEIGHT_EXTENSIONS) {
            return Err(Error::Open(format!(
                "{} looks like model weights, not media",
                path.display()
            )));
        }
        if has_extension_in(path, &IMAGE_EXTENSIONS) {
            return Ok(Self::from_backend(
                SourceBackend::Still {
                    path: path.to_path_buf(),
                    consumed: false,
                },
                display_name(path),
            ));
        }
        Self::open_video_path(path)
    }

    #[cfg(feature = "ingest-file-ffmpeg")]
    fn open_video_path(path: &Path) -> Result<Self> {
        let stream = VideoStream::open(&path.to_string_lossy())?;
        Ok(Self::from_backend(
            SourceBackend::Video(stream),
            display_name(path),
        ))
    }

    #[cfg(not(feature = "ingest-file-ffmpeg"))]
    fn open_video_path(path: &Path) -> Result<Self> {
        Err(Error::Open(format!(
            "{}: video decode requires the ingest-file-ffmpeg feature",
            path.display()
        )))
    }

    fn open_url(url: &str) -> Result<Self> {
        if url.starts_with("stub://") {
            return Ok(Self::from_backend(
                SourceBackend::Stub(StubStream::new(url)),
                url.to_string(),
            ));
        }
        Self::open_network_url(url)
    }

    #[cfg(feature = "ingest-file-ffmpeg")]
    fn open_network_url(url: &str) -> Result<Self> {
        let stream = VideoStream::open(url)?;
        Ok(Self::from_backend(
            SourceBackend::Video(stream),
            url.to_string(),
        ))
    }

    #[cfg(not(feature = "ingest-file-ffmpeg"))]
    fn open_network_url(url: &str) -> Result<Self> {
        Err(Error::Open(format!(
            "{}: network streams require the ingest-file-ffmpeg feature",
            url
        )))
    }

    #[cfg(feature = "ingest-v4l2")]
    fn open_camera(index: u32) -> Result<Self> {
        let stream = CameraStream::open(index)?;
        Ok(Self::from_backend(
            SourceBackend::Camera(stream),
            format!("Camera Source {}", index),
        ))
    }

    #[cfg(not(feature = "ingest-v4l2"))]
    fn open_camera(index: u32) -> Result<Self> {
        Err(Error::Open(format!(
            "camera {}: camera capture requires the ingest-v4l2 feature",
            index
        )))
    }

    /// Pull the next frame.
    ///
    /// `Ok(None)` is exhaustion: the finite source has no more frames,
    /// or this source was closed. Live sources never exhaust on their
    /// own; a failed capture is a read error, not exhaustion.
    pub fn next_frame(&mut self) -> Result<Option<Frame>> {
        let streaming = self.is_streaming();
        let mut label_update: Option<String> = None;

        let frame = match &mut self.backend {
            SourceBackend::Still { path, consumed } => {
                if *consumed {
                    None
                } else {
                    *consumed = true;
                    Some(Frame::decode(path)?)
                }
            }
            SourceBackend::Buffer { frame } => frame.take(),
            SourceBackend::Folder { files, cursor } => {
                if *cursor >= files.len() {
                    None
                } else {
                    let path = files[*cursor].clone();
                    *cursor += 1;
                    label_update = Some(display_name(&path));
                    Some(Frame::decode(&path)?)
                }
            }
            SourceBackend::Slideshow { files, cursor, .. } => {
                let path = files[*cursor].clone();
                *cursor = (*cursor + 1) % files.len();
                label_update = Some(display_name(&path));
                Some(Frame::decode(&path)?)
            }
            SourceBackend::Stub(stream) => Some(stream.next_frame()),
            #[cfg(feature = "ingest-file-ffmpeg")]
            SourceBackend::Video(stream) => stream.next_frame()?,
            #[cfg(feature = "ingest-v4l2")]
            SourceBackend::Camera(stream) => Some(stream.next_frame()?),
            SourceBackend::Closed => None,
        };

        if let Some(label) = label_update {
            self.label = label;
        }

        let frame = match frame {
            Some(f) => f,
            None => return Ok(None),
        };
        self.frames_delivered += 1;

        if self.mirror && streaming {
            Ok(Some(frame.flip_horizontal()))
        } else {
            Ok(Some(frame))
        }
    }

    /// Release the underlying decoder or device handle. Idempotent;
    /// pulls after close report exhaustion.
    pub fn close(&mut self) {
        if matches!(self.backend, SourceBackend::Closed) {
            return;
        }
        self.backend = SourceBackend::Closed;
        log::info!("source closed: {}", self.label);
    }

    /// Label of the most recently delivered frame's originating media:
    /// the file name for path-born frames, `Camera Source N` for
    /// cameras, the URL for streams.
    pub fn label(&self) -> &str {
        &self.label
    }

    /// Suggested caller-side poll interval in milliseconds: 0 for
    /// one-shot inputs, the container's frame spacing for video, the
    /// configured interval for slideshows, 33 for live sources.
    pub fn suggested_interval_ms(&self) -> u64 {
        match &self.backend {
            SourceBackend::Still { .. }
            | SourceBackend::Buffer { .. }
            | SourceBackend::Folder { .. }
            | SourceBackend::Closed => 0,
            SourceBackend::Slideshow { interval_ms, .. } => *interval_ms,
            SourceBackend::Stub(_) => LIVE_INTERVAL_MS,
            #[cfg(feature = "ingest-file-ffmpeg")]
            SourceBackend::Video(stream) => stream.suggested_interval_ms(),
            #[cfg(feature = "ingest-v4l2")]
            SourceBackend::Camera(_) => LIVE_INTERVAL_MS,
        }
    }

    /// Streaming sources are the ones the mirror flag applies to.
    pub fn is_streaming(&self) -> bool {
        match &self.backend {
            SourceBackend::Stub(_) => true,
            #[cfg(feature = "ingest-file-ffmpeg")]
            SourceBackend::Video(_) => true,
            #[cfg(feature = "ingest-v4l2")]
            SourceBackend::Camera(_) => true,
            _ => false,
        }
    }

    pub fn kind(&self) -> &'static str {
        match &self.backend {
            SourceBackend::Still { .. } => "still",
            SourceBackend::Buffer { .. } => "buffer",
            SourceBackend::Folder { .. } => "folder",
            SourceBackend::Slideshow { .. } => "slideshow",
            SourceBackend::Stub(_) => "stub",
            #[cfg(feature = "ingest-file-ffmpeg")]
            SourceBackend::Video(_) => "video",
            #[cfg(feature = "ingest-v4l2")]
            SourceBackend::Camera(_) => "camera",
            SourceBackend::Closed => "closed",
        }
    }

    pub fn stats(&self) -> SourceStats {
        SourceStats {
            frames_delivered: self.frames_delivered,
            label: self.label.clone(),
            kind: self.kind(),
        }
    }
}

/// Manual impl: decoder and device handles in the backend variants are
/// not `Debug`, so the backend is shown by its kind tag only.
impl fmt::Debug for FrameSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FrameSource")
            .field("kind", &self.kind())
            .field("label", &self.label)
            .field("mirror", &self.mirror)
            .field("frames_delivered", &self.frames_delivered)
            .finish()
    }
}

/// Statistics for an open source.
#[derive(Clone, Debug)]
pub struct SourceStats {
    pub frames_delivered: u64,
    pub label: String,
    pub kind: &'static str,
}

// ----------------------------------------------------------------------------
// Synthetic stream (stub://)
// ----------------------------------------------------------------------------

/// Deterministic live stream: the pixel pattern depends only on the
/// pull index, so two streams pulled in lockstep agree frame for frame.
struct StubStream {
    frame_count: u64,
    scene_state: u8,
    width: u32,
    height: u32,
}

impl StubStream {
    fn new(url: &str) -> Self {
        log::info!("stub stream connected: {}", url);
        Self {
            frame_count: 0,
            scene_state: 0,
            width: 640,
            height: 480,
        }
    }

    fn next_frame(&mut self) -> Frame {
        self.frame_count += 1;
        if self.frame_count % 50 == 0 {
            self.scene_state = self.scene_state.wrapping_add(1);
        }

        let pixel_count = (self.width * self.height * 3) as usize;
        let mut pixels = vec![0u8; pixel_count];
        for (i, pixel) in pixels.iter_mut().enumerate() {
            *pixel = ((i as u64 + self.frame_count + self.scene_state as u64) % 256) as u8;
        }

        // Length matches width * height * 3 by construction.
        Frame::new(pixels, self.width, self.height).unwrap_or_else(|_| Frame::empty())
    }
}

// ----------------------------------------------------------------------------
// Path helpers
// ----------------------------------------------------------------------------

fn has_extension_in(path: &Path, set: &[&str]) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| set.contains(&e.to_ascii_lowercase().as_str()))
        .unwrap_or(false)
}

/// Immediate children with a canonical image extension, sorted
/// lexicographically by name. An empty result is an open error.
fn list_image_files(dir: &Path) -> Result<Vec<PathBuf>> {
    let entries = std::fs::read_dir(dir)
        .map_err(|e| Error::Open(format!("read folder {}: {}", dir.display(), e)))?;

    let mut files = Vec::new();
    for entry in entries {
        let entry =
            entry.map_err(|e| Error::Open(format!("read folder {}: {}", dir.display(), e)))?;
        let path = entry.path();
        if path.is_file() && has_extension_in(&path, &IMAGE_EXTENSIONS) {
            files.push(path);
        }
    }
    if files.is_empty() {
        return Err(Error::Open(format!(
            "no decodable images in {}",
            dir.display()
        )));
    }
    files.sort();
    Ok(files)
}

fn display_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn make_test_frame(width: u32, height: u32, seed: u8) -> Frame {
        let data = (0..width * height * 3)
            .map(|i| (i as u8).wrapping_add(seed))
            .collect();
        Frame::new(data, width, height).unwrap()
    }

    fn write_image(dir: &Path, name: &str, seed: u8) -> PathBuf {
        let path = dir.join(name);
        make_test_frame(8, 6, seed).save_png(&path).unwrap();
        path
    }

    #[test]
    fn descriptor_parses_cli_forms() -> Result<()> {
        assert_eq!("camera:2".parse::<MediaDescriptor>()?, MediaDescriptor::Camera(2));
        assert_eq!(
            "stub://cam".parse::<MediaDescriptor>()?,
            MediaDescriptor::Url("stub://cam".to_string())
        );
        assert_eq!(
            "clips/run.mp4".parse::<MediaDescriptor>()?,
            MediaDescriptor::Path(PathBuf::from("clips/run.mp4"))
        );
        assert!("camera:first".parse::<MediaDescriptor>().is_err());
        assert!("".parse::<MediaDescriptor>().is_err());
        Ok(())
    }

    #[test]
    fn missing_path_is_open_error() {
        let err =
            FrameSource::open(&MediaDescriptor::Path("/nonexistent/cat.jpg".into())).unwrap_err();
        assert_eq!(err.kind(), "open");
    }

    #[test]
    fn single_image_yields_one_frame_then_exhausts() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        let path = write_image(dir.path(), "cat.png", 3);

        let mut source = FrameSource::open(&MediaDescriptor::Path(path))?;
        assert_eq!(source.kind(), "still");
        assert_eq!(source.suggested_interval_ms(), 0);

        assert!(source.next_frame()?.is_some());
        assert_eq!(source.label(), "cat.png");
        assert!(source.next_frame()?.is_none());
        assert!(source.next_frame()?.is_none());
        assert_eq!(source.stats().frames_delivered, 1);
        Ok(())
    }

    #[test]
    fn folder_walks_matching_files_in_sorted_order() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        write_image(dir.path(), "b.png", 2);
        write_image(dir.path(), "a.jpg", 1);
        std::fs::write(dir.path().join("c.txt"), b"not an image")?;

        let mut source = FrameSource::open(&MediaDescriptor::Path(dir.path().to_path_buf()))?;
        assert_eq!(source.kind(), "folder");

        assert!(source.next_frame()?.is_some());
        assert_eq!(source.label(), "a.jpg");
        assert!(source.next_frame()?.is_some());
        assert_eq!(source.label(), "b.png");
        assert!(source.next_frame()?.is_none());
        Ok(())
    }

    #[test]
    fn folder_without_images_is_open_error() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        std::fs::write(dir.path().join("notes.txt"), b"x")?;
        let err =
            FrameSource::open(&MediaDescriptor::Path(dir.path().to_path_buf())).unwrap_err();
        assert_eq!(err.kind(), "open");
        Ok(())
    }

    #[test]
    fn undecodable_file_is_a_read_error_and_iteration_continues() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        std::fs::write(dir.path().join("a.jpg"), b"garbage bytes")?;
        write_image(dir.path(), "b.png", 4);

        let mut source = FrameSource::open(&MediaDescriptor::Path(dir.path().to_path_buf()))?;
        let err = source.next_frame().unwrap_err();
        assert_eq!(err.kind(), "read");
        assert!(source.next_frame()?.is_some());
        assert_eq!(source.label(), "b.png");
        assert!(source.next_frame()?.is_none());
        Ok(())
    }

    #[test]
    fn buffer_yields_once() -> Result<()> {
        let frame = make_test_frame(8, 6, 9);
        let mut source = FrameSource::open(&MediaDescriptor::Buffer(frame.clone()))?;
        assert_eq!(source.next_frame()?, Some(frame));
        assert_eq!(source.next_frame()?, None);
        Ok(())
    }

    #[test]
    fn slideshow_cycles_and_never_exhausts() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        write_image(dir.path(), "a.png", 1);
        write_image(dir.path(), "b.png", 2);

        let mut source = FrameSource::open_slideshow(dir.path(), None)?;
        assert_eq!(source.suggested_interval_ms(), DEFAULT_SLIDESHOW_INTERVAL_MS);

        let mut labels = Vec::new();
        for _ in 0..5 {
            assert!(source.next_frame()?.is_some());
            labels.push(source.label().to_string());
        }
        assert_eq!(labels, ["a.png", "b.png", "a.png", "b.png", "a.png"]);
        Ok(())
    }

    #[test]
    fn slideshow_interval_override() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        write_image(dir.path(), "a.png", 1);
        let source = FrameSource::open_slideshow(dir.path(), Some(500))?;
        assert_eq!(source.suggested_interval_ms(), 500);
        Ok(())
    }

    #[test]
    fn weights_file_is_rejected_with_open_error() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("best.pt");
        std::fs::write(&path, b"weights")?;
        let err = FrameSource::open(&MediaDescriptor::Path(path)).unwrap_err();
        assert_eq!(err.kind(), "open");
        assert!(format!("{}", err).contains("weights"));
        Ok(())
    }

    #[test]
    fn stub_stream_is_live_and_deterministic() -> Result<()> {
        let mut a = FrameSource::open(&MediaDescriptor::Url("stub://cam".to_string()))?;
        let mut b = FrameSource::open(&MediaDescriptor::Url("stub://cam".to_string()))?;
        assert_eq!(a.kind(), "stub");
        assert_eq!(a.suggested_interval_ms(), LIVE_INTERVAL_MS);

        for _ in 0..3 {
            assert_eq!(a.next_frame()?, b.next_frame()?);
        }
        Ok(())
    }

    #[test]
    fn mirror_applies_to_streaming_pulls_only() -> anyhow::Result<()> {
        let mut plain = FrameSource::open(&MediaDescriptor::Url("stub://cam".to_string()))?;
        let mut mirrored =
            FrameSource::open(&MediaDescriptor::Url("stub://cam".to_string()))?.with_mirror(true);
        let p = plain.next_frame()?.expect("frame");
        let m = mirrored.next_frame()?.expect("frame");
        assert_eq!(m, p.flip_horizontal());

        // A still image ignores the flag.
        let dir = tempfile::tempdir()?;
        let path = write_image(dir.path(), "cat.png", 3);
        let decoded = Frame::decode(&path)?;
        let mut still = FrameSource::open(&MediaDescriptor::Path(path))?.with_mirror(true);
        assert_eq!(still.next_frame()?, Some(decoded));
        Ok(())
    }

    #[test]
    fn close_is_idempotent_and_exhausts() -> Result<()> {
        let mut source = FrameSource::open(&MediaDescriptor::Url("stub://cam".to_string()))?;
        assert!(source.next_frame()?.is_some());
        source.close();
        source.close();
        assert_eq!(source.kind(), "closed");
        assert!(source.next_frame()?.is_none());
        Ok(())
    }

    #[cfg(not(feature = "ingest-v4l2"))]
    #[test]
    fn camera_without_feature_is_open_error() {
        let err = FrameSource::open(&MediaDescriptor::Camera(0)).unwrap_err();
        assert_eq!(err.kind(), "open");
    }

    #[cfg(not(feature = "ingest-file-ffmpeg"))]
    #[test]
    fn video_without_feature_is_open_error() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("clip.mp4");
        std::fs::write(&path, b"not really a video")?;
        let err = FrameSource::open(&MediaDescriptor::Path(path)).unwrap_err();
        assert_eq!(err.kind(), "open");
        Ok(())
    }
}
