use std::{path::Path, sync::Arc};

use anyhow::{Context, Result};
use fast_image_resize as fir;

use super::{Canvas, FramePacer, OutputDevice};
use crate::{
    audio::{AudioBackend, AudioTask},
    types::Frame,
};

/// Looping video source. End-of-stream is a normal outcome, not an error;
/// `seek_start` rewinds for the next repeat.
pub trait VideoDecoder {
    fn dimensions(&self) -> (u32, u32);
    fn read_frame(&mut self) -> Result<Option<Frame>>;
    fn seek_start(&mut self) -> Result<()>;
}

/// Letterbox/pillarbox rectangle, computed once per playback session.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Placement {
    pub width: u32,
    pub height: u32,
    pub start_x: u32,
    pub start_y: u32,
}

/// Scales the source to fit the canvas without distortion and centers it.
pub fn compute_placement(canvas_w: u32, canvas_h: u32, src_w: u32, src_h: u32) -> Placement {
    let aspect = src_w as f64 / src_h as f64;
    let width = canvas_w.min((aspect * canvas_h as f64).round() as u32);
    let height = canvas_h.min((canvas_w as f64 / aspect).round() as u32);
    Placement {
        width,
        height,
        start_x: (canvas_w - width) / 2,
        start_y: (canvas_h - height) / 2,
    }
}

/// Drives the bounded-repeat eye animation onto the canvas. Holds the canvas
/// exclusively while active; steady-state failures never surface to the
/// caller, only to logs.
pub struct PlaybackController<'a, O> {
    canvas: &'a mut Canvas,
    output: &'a mut O,
    display_fps: f64,
}

impl<'a, O: OutputDevice> PlaybackController<'a, O> {
    pub fn new(canvas: &'a mut Canvas, output: &'a mut O, display_fps: f64) -> Self {
        Self {
            canvas,
            output,
            display_fps,
        }
    }

    /// Plays the animation until `loop_max` full passes (including replays
    /// cut short by end-of-stream) have been attempted, or the cancel signal
    /// fires.
    pub fn play_loop(&mut self, decoder: &mut dyn VideoDecoder, loop_max: u32) {
        let (src_w, src_h) = decoder.dimensions();
        if src_w == 0 || src_h == 0 {
            log::error!("video source reports empty dimensions, skipping playback");
            return;
        }
        let placement = compute_placement(self.canvas.width(), self.canvas.height(), src_w, src_h);
        let mut pacer = FramePacer::new(self.display_fps);

        let mut loop_count = 0u32;
        while loop_count < loop_max {
            let frame = match decoder.read_frame() {
                Ok(Some(frame)) => frame,
                Ok(None) => {
                    // Exhausting the stream is the normal restart signal.
                    loop_count += 1;
                    if let Err(err) = decoder.seek_start() {
                        log::warn!("seek to first frame failed: {err:?}");
                    }
                    continue;
                }
                Err(err) => {
                    log::warn!("video frame read failed: {err:?}");
                    loop_count += 1;
                    if let Err(err) = decoder.seek_start() {
                        log::warn!("seek to first frame failed: {err:?}");
                    }
                    continue;
                }
            };

            let scaled = match resize_nearest(&frame, placement.width, placement.height) {
                Ok(scaled) => scaled,
                Err(err) => {
                    // A frame that cannot be resized counts as a failed pass,
                    // same as a read failure, so the loop stays bounded.
                    log::warn!("frame resize failed: {err:?}");
                    loop_count += 1;
                    if let Err(err) = decoder.seek_start() {
                        log::warn!("seek to first frame failed: {err:?}");
                    }
                    continue;
                }
            };

            self.canvas.clear();
            self.canvas.blit(
                &scaled,
                placement.width,
                placement.height,
                placement.start_x,
                placement.start_y,
            );
            if let Err(err) = self.output.present(self.canvas) {
                log::warn!("present failed: {err:?}");
            }

            if self.output.poll_cancel() {
                return;
            }
            pacer.tick();
        }
    }

    /// Opens the animation directory and runs one bounded loop. An unopenable
    /// source logs and returns with the canvas untouched.
    pub fn play_path(&mut self, frames_dir: &Path, loop_max: u32) {
        match super::decoder::EyeFrameDecoder::open(frames_dir) {
            Ok(mut decoder) => self.play_loop(&mut decoder, loop_max),
            Err(err) => {
                log::error!("cannot open animation {}: {err:?}", frames_dir.display());
            }
        }
    }

    /// Cue clip over one loop, then greeting over a second loop. Each audio
    /// task is joined before the next phase starts.
    pub fn play_with_audio(
        &mut self,
        decoder: &mut dyn VideoDecoder,
        loop_max: u32,
        audio: &Arc<dyn AudioBackend>,
        cue_clip: &Path,
    ) {
        let cue = AudioTask::spawn({
            let audio = audio.clone();
            let clip = cue_clip.to_path_buf();
            move || {
                if let Err(err) = audio.play(&clip) {
                    log::warn!("cue clip playback failed: {err}");
                }
            }
        });
        self.play_loop(decoder, loop_max);
        cue.join();

        let greeting = AudioTask::spawn({
            let audio = audio.clone();
            move || {
                if let Err(err) = audio.play_greeting() {
                    log::warn!("greeting playback failed: {err}");
                }
            }
        });
        self.play_loop(decoder, loop_max);
        greeting.join();
    }

    /// Cue clip over one loop; no greeting phase.
    pub fn play_with_audio_no_greeting(
        &mut self,
        decoder: &mut dyn VideoDecoder,
        loop_max: u32,
        audio: &Arc<dyn AudioBackend>,
        cue_clip: &Path,
    ) {
        let cue = AudioTask::spawn({
            let audio = audio.clone();
            let clip = cue_clip.to_path_buf();
            move || {
                if let Err(err) = audio.play(&clip) {
                    log::warn!("cue clip playback failed: {err}");
                }
            }
        });
        self.play_loop(decoder, loop_max);
        cue.join();
    }
}

/// Nearest-neighbor scale into the placement rectangle; quality is traded
/// for throughput.
fn resize_nearest(frame: &Frame, target_w: u32, target_h: u32) -> Result<Vec<u8>> {
    if frame.width == target_w && frame.height == target_h {
        return Ok(frame.rgb.clone());
    }

    let src = fir::images::Image::from_vec_u8(
        frame.width,
        frame.height,
        frame.rgb.clone(),
        fir::PixelType::U8x3,
    )?;
    let mut dst = fir::images::Image::new(target_w, target_h, fir::PixelType::U8x3);
    let mut resizer = fir::Resizer::new();
    let options = fir::ResizeOptions::new().resize_alg(fir::ResizeAlg::Nearest);
    resizer
        .resize(&src, &mut dst, Some(&options))
        .context("playback resize failed")?;
    Ok(dst.into_vec())
}
