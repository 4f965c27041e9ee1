use std::path::PathBuf;

/// Tuning constants for the Raspberry Pi deployment. The detection loop runs
/// at a fraction of the capture rate and recognizes on a quarter-size frame
/// to stay inside the CPU budget.
#[derive(Clone, Debug)]
pub struct Config {
    pub camera_index: u32,
    pub capture_width: u32,
    pub capture_height: u32,
    pub detection_fps: f64,
    pub processing_width: u32,
    pub processing_height: u32,
    pub max_hands: usize,
    pub detection_confidence: f32,
    // Part of the deployment tuning set; the recognizer scores every frame
    // independently and has no tracking stage to apply it to.
    #[allow(dead_code)]
    pub tracking_confidence: f32,

    pub screen_width: u32,
    pub screen_height: u32,
    pub display_fps: f64,
    pub loop_max: u32,

    pub eye_frames_dir: PathBuf,
    pub cue_clip: PathBuf,
    pub greeting_clips: Vec<PathBuf>,

    pub font_path: PathBuf,
    pub font_size: f32,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            camera_index: 0,
            capture_width: 640,
            capture_height: 480,
            detection_fps: 15.0,
            processing_width: 320,
            processing_height: 240,
            max_hands: 1,
            detection_confidence: 0.6,
            tracking_confidence: 0.5,

            screen_width: 800,
            screen_height: 480,
            display_fps: 30.0,
            loop_max: 3,

            eye_frames_dir: PathBuf::from("resources/eye_frames"),
            cue_clip: PathBuf::from("resources/audio/chime.wav"),
            greeting_clips: vec![
                PathBuf::from("resources/audio/greeting_01.wav"),
                PathBuf::from("resources/audio/greeting_02.wav"),
            ],

            font_path: PathBuf::from("resources/AmericanTypewriter.ttf"),
            font_size: 300.0,
        }
    }
}
