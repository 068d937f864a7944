//! Video decode using FFmpeg.
//!
//! This module provides an FFmpeg-backed decoder for video files and
//! network stream URLs. One frame is decoded per pull; at end of input
//! the decoder is flushed and drained before the stream reports
//! exhaustion.

use ffmpeg_next as ffmpeg;

use crate::error::{Error, Result};
use crate::frame::Frame;

pub(crate) struct VideoStream {
    input: ffmpeg::format::context::Input,
    stream_index: usize,
    decoder: ffmpeg::codec::decoder::Video,
    scaler: ffmpeg::software::scaling::Context,
    fps: f64,
    finished: bool,
}

impl VideoStream {
    /// Open a local file path or a stream URL; ffmpeg accepts both in
    /// the same form.
    pub(crate) fn open(source: &str) -> Result<Self> {
        ffmpeg::init().map_err(|e| Error::Open(format!("initialize ffmpeg: {}", e)))?;
        let input = ffmpeg::format::input(&source)
            .map_err(|e| Error::Open(format!("open '{}' with ffmpeg: {}", source, e)))?;
        let input_stream = input
            .streams()
            .best(ffmpeg::media::Type::Video)
            .ok_or_else(|| Error::Open(format!("'{}' has no video track", source)))?;
        let stream_index = input_stream.index();
        let rate = input_stream.avg_frame_rate();
        let fps = if rate.denominator() > 0 {
            f64::from(rate.numerator()) / f64::from(rate.denominator())
        } else {
            0.0
        };
        let context = ffmpeg::codec::context::Context::from_parameters(input_stream.parameters())
            .map_err(|e| Error::Open(format!("load video decoder parameters: {}", e)))?;
        let decoder = context
            .decoder()
            .video()
            .map_err(|e| Error::Open(format!("open ffmpeg video decoder: {}", e)))?;

        let scaler = ffmpeg::software::scaling::context::Context::get(
            decoder.format(),
            decoder.width(),
            decoder.height(),
            ffmpeg::util::format::pixel::Pixel::RGB24,
            decoder.width(),
            decoder.height(),
            ffmpeg::software::scaling::flag::Flags::BILINEAR,
        )
        .map_err(|e| Error::Open(format!("create ffmpeg scaler: {}", e)))?;

        log::info!("video stream opened: {} ({:.2} fps)", source, fps);

        Ok(Self {
            input,
            stream_index,
            decoder,
            scaler,
            fps,
            finished: false,
        })
    }

    /// Decode the next frame. `Ok(None)` once the container and the
    /// decoder's buffered frames are both exhausted.
    pub(crate) fn next_frame(&mut self) -> Result<Option<Frame>> {
        let mut decoded = ffmpeg::frame::Video::empty();
        loop {
            if self.decoder.receive_frame(&mut decoded).is_ok() {
                return Ok(Some(self.convert(&decoded)?));
            }
            if self.finished {
                return Ok(None);
            }
            match self.input.packets().next() {
                Some((stream, packet)) => {
                    if stream.index() != self.stream_index {
                        continue;
                    }
                    self.decoder
                        .send_packet(&packet)
                        .map_err(|e| Error::Read(format!("send packet to ffmpeg decoder: {}", e)))?;
                }
                None => {
                    // End of container. Flushing may still surface
                    // frames the decoder buffered.
                    self.decoder.send_eof().ok();
                    self.finished = true;
                }
            }
        }
    }

    pub(crate) fn suggested_interval_ms(&self) -> u64 {
        interval_from_fps(self.fps)
    }

    fn convert(&mut self, decoded: &ffmpeg::frame::Video) -> Result<Frame> {
        let mut rgb_frame = ffmpeg::frame::Video::empty();
        self.scaler
            .run(decoded, &mut rgb_frame)
            .map_err(|e| Error::Read(format!("scale frame to RGB: {}", e)))?;
        let (pixels, width, height) = frame_to_pixels(&rgb_frame)?;
        Frame::new(pixels, width, height)
    }
}

fn interval_from_fps(fps: f64) -> u64 {
    if fps > 0.0 {
        (1000.0 / fps).round().max(1.0) as u64
    } else {
        super::LIVE_INTERVAL_MS
    }
}

fn frame_to_pixels(frame: &ffmpeg::frame::Video) -> Result<(Vec<u8>, u32, u32)> {
    let width = frame.width();
    let height = frame.height();
    let row_bytes = (width as usize) * 3;
    let stride = frame.stride(0) as usize;
    let data = frame.data(0);

    if stride == row_bytes {
        let pixels = data
            .get(..row_bytes * height as usize)
            .ok_or_else(|| Error::Read("ffmpeg frame data is truncated".to_string()))?
            .to_vec();
        return Ok((pixels, width, height));
    }

    let mut pixels = Vec::with_capacity(row_bytes * height as usize);
    for row in 0..height as usize {
        let start = row * stride;
        let end = start + row_bytes;
        pixels.extend_from_slice(
            data.get(start..end)
                .ok_or_else(|| Error::Read("ffmpeg frame row is out of bounds".to_string()))?,
        );
    }

    Ok((pixels, width, height))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn interval_tracks_container_fps() {
        assert_eq!(interval_from_fps(25.0), 40);
        assert_eq!(interval_from_fps(30.0), 33);
        assert_eq!(interval_from_fps(0.0), super::super::LIVE_INTERVAL_MS);
        assert_eq!(interval_from_fps(2000.0), 1);
    }
}
