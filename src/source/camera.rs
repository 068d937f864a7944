//! V4L2 camera capture.
//!
//! This module provides `CameraStream` for local V4L2 devices. Capture
//! is negotiated in packed RGB so frames hand off without a pixel
//! format conversion step.

use ouroboros::self_referencing;

use crate::error::{Error, Result};
use crate::frame::Frame;

const CAPTURE_WIDTH: u32 = 640;
const CAPTURE_HEIGHT: u32 = 480;
const CAPTURE_FPS: u32 = 30;

pub(crate) struct CameraStream {
    state: CameraState,
    active_width: u32,
    active_height: u32,
}

#[self_referencing]
struct CameraState {
    device: v4l::Device,
    #[borrows(mut device)]
    #[covariant]
    stream: v4l::prelude::MmapStream<'this, v4l::Device>,
}

impl CameraStream {
    /// Open `/dev/video{index}` and negotiate packed RGB capture.
    pub(crate) fn open(index: u32) -> Result<Self> {
        use v4l::buffer::Type;
        use v4l::video::Capture;

        let path = format!("/dev/video{}", index);
        let mut device = v4l::Device::with_path(&path)
            .map_err(|e| Error::Open(format!("open v4l2 device {}: {}", path, e)))?;
        let mut format = device
            .format()
            .map_err(|e| Error::Open(format!("read v4l2 format on {}: {}", path, e)))?;
        format.width = CAPTURE_WIDTH;
        format.height = CAPTURE_HEIGHT;
        format.fourcc = v4l::FourCC::new(b"RGB3");

        let format = match device.set_format(&format) {
            Ok(format) => format,
            Err(err) => {
                log::warn!("failed to set format on {}: {}", path, err);
                device.format().map_err(|e| {
                    Error::Open(format!("read v4l2 format after set failure: {}", e))
                })?
            }
        };

        if format.fourcc != v4l::FourCC::new(b"RGB3") {
            return Err(Error::Open(format!(
                "{} cannot capture packed RGB (driver offers {})",
                path, format.fourcc
            )));
        }

        let params = v4l::video::capture::Parameters::with_fps(CAPTURE_FPS);
        if let Err(err) = device.set_params(&params) {
            log::warn!("failed to set fps on {}: {}", path, err);
        }

        let active_width = format.width;
        let active_height = format.height;

        let state = CameraStateBuilder {
            device,
            stream_builder: |device| {
                v4l::prelude::MmapStream::with_buffers(device, Type::VideoCapture, 4)
                    .map_err(|e| Error::Open(format!("create v4l2 buffer stream: {}", e)))
            },
        }
        .try_build()?;

        log::info!("camera opened: {} ({}x{})", path, active_width, active_height);

        Ok(Self {
            state,
            active_width,
            active_height,
        })
    }

    /// Capture one frame. A failed capture is a read error; the stream
    /// stays usable for the next pull.
    pub(crate) fn next_frame(&mut self) -> Result<Frame> {
        use v4l::io::traits::CaptureStream;

        let (width, height) = (self.active_width, self.active_height);
        let expected = (width * height * 3) as usize;
        let pixels = self.state.with_mut(|fields| {
            let (buf, _meta) = fields
                .stream
                .next()
                .map_err(|e| Error::Read(format!("capture v4l2 frame: {}", e)))?;
            if buf.len() < expected {
                return Err(Error::Read(format!(
                    "v4l2 frame is {} bytes, expected at least {}",
                    buf.len(),
                    expected
                )));
            }
            // Drivers may pad past the packed raster; keep the packed prefix.
            Ok(buf[..expected].to_vec())
        })?;
        Frame::new(pixels, width, height)
    }
}
