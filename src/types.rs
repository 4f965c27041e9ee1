use std::time::Instant;

// Hand landmark indices fixed by the recognizer contract.
pub const THUMB_IP: usize = 3;
pub const THUMB_TIP: usize = 4;
pub const INDEX_PIP: usize = 6;
pub const INDEX_TIP: usize = 8;

/// Packed RGB888 pixel grid. Ephemeral: owned by whichever stage last
/// produced it, never shared across concurrent readers.
#[derive(Clone, Debug)]
pub struct Frame {
    pub rgb: Vec<u8>,
    pub width: u32,
    pub height: u32,
    pub timestamp: Instant,
}

impl Frame {
    pub fn new(width: u32, height: u32, rgb: Vec<u8>) -> Self {
        Self {
            rgb,
            width,
            height,
            timestamp: Instant::now(),
        }
    }

    pub fn expected_len(&self) -> usize {
        (self.width as usize)
            .saturating_mul(self.height as usize)
            .saturating_mul(3)
    }
}

/// Ordered keypoints normalized to [0, 1] relative to the frame they came
/// from. Index positions keep their meaning across frames.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct LandmarkSet {
    pub points: Vec<(f32, f32)>,
}

impl LandmarkSet {
    pub fn point(&self, index: usize) -> Option<(f32, f32)> {
        self.points.get(index).copied()
    }
}

/// Immutable detection snapshot. A new result replaces the prior one as a
/// whole; readers never observe half of an update.
#[derive(Clone, Copy, Debug)]
pub struct DetectionResult {
    pub human_detected: bool,
    pub waving_hand: bool,
    pub timestamp: Instant,
}

impl DetectionResult {
    pub fn empty() -> Self {
        Self {
            human_detected: false,
            waving_hand: false,
            timestamp: Instant::now(),
        }
    }
}
