use std::time::Instant;

use anyhow::{Result, anyhow};
use nokhwa::{
    Camera,
    pixel_format::RgbFormat,
    utils::{CameraFormat, CameraIndex, FrameFormat, RequestedFormat, RequestedFormatType, Resolution},
};

use super::{FrameSource, convert};
use crate::types::Frame;

// Prefer pixel formats with cheap conversions; MJPEG last since it costs a
// full decode per frame.
const PREFERRED_PIXEL_FORMATS: &[FrameFormat] = &[
    FrameFormat::RAWRGB,
    FrameFormat::RAWBGR,
    FrameFormat::GRAY,
    FrameFormat::YUYV,
    FrameFormat::NV12,
    FrameFormat::MJPEG,
];

fn requested_formats(width: u32, height: u32, fps: u32) -> [RequestedFormat<'static>; 4] {
    [
        RequestedFormat::with_formats(
            RequestedFormatType::Closest(CameraFormat::new(
                Resolution::new(width, height),
                FrameFormat::YUYV,
                fps,
            )),
            PREFERRED_PIXEL_FORMATS,
        ),
        RequestedFormat::with_formats(
            RequestedFormatType::AbsoluteHighestFrameRate,
            PREFERRED_PIXEL_FORMATS,
        ),
        // Fall back to any format Nokhwa can decode, but prefer higher FPS to
        // avoid very low default rates that some drivers reject.
        RequestedFormat::new::<RgbFormat>(RequestedFormatType::AbsoluteHighestFrameRate),
        RequestedFormat::new::<RgbFormat>(RequestedFormatType::None),
    ]
}

/// Nokhwa-backed camera. Frames are read synchronously on demand; the
/// detection loop's throttle controls how often that happens.
pub struct CameraSource {
    camera: Camera,
}

impl CameraSource {
    pub fn open(device_index: u32, width: u32, height: u32, fps: u32) -> Result<Self> {
        let camera = build_camera(CameraIndex::Index(device_index), width, height, fps)?;
        log::info!(
            "camera {} open at {:?}",
            device_index,
            camera.camera_format()
        );
        Ok(Self { camera })
    }
}

fn build_camera(index: CameraIndex, width: u32, height: u32, fps: u32) -> Result<Camera> {
    let mut last_err = None;

    for requested in requested_formats(width, height, fps) {
        match Camera::new(index.clone(), requested) {
            Ok(mut camera) => match camera.open_stream() {
                Ok(()) => return Ok(camera),
                Err(err) => last_err = Some(err.into()),
            },
            Err(err) => last_err = Some(err.into()),
        }
    }

    Err(last_err.unwrap_or_else(|| anyhow!("failed to open camera with any supported format")))
}

impl FrameSource for CameraSource {
    fn read(&mut self) -> Result<Frame> {
        let buffer = self.camera.frame()?;
        let resolution = buffer.resolution();
        let width = resolution.width_x;
        let height = resolution.height_y;
        let data = buffer.buffer();

        let rgb = match buffer.source_frame_format() {
            FrameFormat::NV12 => convert::nv12_to_rgb(data, width, height)?,
            FrameFormat::YUYV => convert::yuyv_to_rgb(data, width, height)?,
            FrameFormat::MJPEG => convert::mjpeg_to_rgb(data)?,
            FrameFormat::RAWRGB => convert::raw_rgb_passthrough(data, width, height)?,
            FrameFormat::RAWBGR => convert::bgr_to_rgb(data, width, height)?,
            FrameFormat::GRAY => convert::gray_to_rgb(data, width, height)?,
        };

        Ok(Frame {
            rgb,
            width,
            height,
            timestamp: Instant::now(),
        })
    }
}

impl Drop for CameraSource {
    fn drop(&mut self) {
        let _ = self.camera.stop_stream();
    }
}
