mod audio;
mod config;
mod detect;
mod display;
mod models;
mod types;

use anyhow::Result;

// Captions for the idle marquee.
const CAPTIONS: &[&str] = &[
    "HAPPY NEW YEAR",
    "CUNG CHÚC TÂN XUÂN",
    "CHÚC MỪNG NĂM MỚI",
    "XUÂN ẤT TỴ 2025",
];

fn main() -> Result<()> {
    env_logger::init();

    #[cfg(feature = "camera-nokhwa")]
    {
        return run(config::Config::default());
    }

    #[allow(unreachable_code)]
    {
        anyhow::bail!("built without a camera backend; enable the camera-nokhwa feature")
    }
}

#[cfg(feature = "camera-nokhwa")]
fn run(config: config::Config) -> Result<()> {
    use std::{
        path::Path,
        sync::{Arc, atomic::Ordering},
        thread,
        time::Duration,
    };

    use crate::{
        audio::{AudioBackend, CpalBackend},
        detect::{DetectionLoop, camera::CameraSource, landmarks::OrtRecognizer},
        display::{
            Canvas,
            decoder::EyeFrameDecoder,
            marquee::TextMarquee,
            output::{FramebufferDevice, spawn_quit_listener},
            playback::PlaybackController,
        },
        models::ModelKind,
    };

    let hand_model = models::default_model_path(ModelKind::HandLandmarker);
    let pose_model = models::default_model_path(ModelKind::PoseLandmarker);
    models::ensure_model_ready(ModelKind::HandLandmarker, &hand_model)?;
    models::ensure_model_ready(ModelKind::PoseLandmarker, &pose_model)?;

    let source = CameraSource::open(
        config.camera_index,
        config.capture_width,
        config.capture_height,
        config.detection_fps as u32,
    )?;
    let recognizer = OrtRecognizer::new(
        &hand_model,
        &pose_model,
        config.max_hands,
        config.detection_confidence,
    )?;
    let mut detector = DetectionLoop::new(
        source,
        recognizer,
        config.detection_fps,
        (config.processing_width, config.processing_height),
    );

    let quit = spawn_quit_listener();
    let mut output = FramebufferDevice::open(Path::new("/dev/fb0"), quit.clone())?;
    let mut canvas = Canvas::new(config.screen_width, config.screen_height);
    let audio: Arc<dyn AudioBackend> = Arc::new(CpalBackend::new(config.greeting_clips.clone()));
    let marquee = TextMarquee::new(&config.font_path, config.font_size, config.display_fps);

    log::info!("robot eyes up, watching for visitors");

    let mut idle_cycles = 0u32;
    while !quit.load(Ordering::Relaxed) {
        let detection = detector.poll();

        if detection.waving_hand || detection.human_detected {
            match EyeFrameDecoder::open(&config.eye_frames_dir) {
                Ok(mut decoder) => {
                    let mut controller =
                        PlaybackController::new(&mut canvas, &mut output, config.display_fps);
                    if detection.waving_hand {
                        controller.play_with_audio(
                            &mut decoder,
                            config.loop_max,
                            &audio,
                            &config.cue_clip,
                        );
                    } else {
                        controller.play_with_audio_no_greeting(
                            &mut decoder,
                            config.loop_max,
                            &audio,
                            &config.cue_clip,
                        );
                    }
                }
                Err(err) => log::error!("cannot open eye animation: {err:?}"),
            }
        } else {
            // Idle: keep the eyes moving, with an occasional caption pass.
            idle_cycles += 1;
            if idle_cycles % 10 == 0 {
                marquee.scroll(&mut canvas, &mut output, CAPTIONS);
            } else {
                let mut controller =
                    PlaybackController::new(&mut canvas, &mut output, config.display_fps);
                controller.play_path(&config.eye_frames_dir, 1);
            }
        }

        thread::sleep(Duration::from_millis(50));
    }

    log::info!("quit requested, shutting down");
    Ok(())
}
