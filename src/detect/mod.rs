#[cfg(feature = "camera-nokhwa")]
pub mod camera;
pub mod convert;
pub mod landmarks;

use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use fast_image_resize as fir;

use crate::types::{DetectionResult, Frame, INDEX_PIP, INDEX_TIP, LandmarkSet, THUMB_IP, THUMB_TIP};

/// Camera abstraction: produces one frame per call or fails transiently.
pub trait FrameSource {
    fn read(&mut self) -> Result<Frame>;
}

/// Pretrained landmark detector contract. Backends return zero-or-more hand
/// landmark sets and zero-or-one pose set per frame, with the fixed index
/// semantics from [`crate::types`].
pub trait LandmarkRecognizer {
    fn detect_hands(&mut self, frame: &Frame) -> Result<Vec<LandmarkSet>>;
    fn detect_pose(&mut self, frame: &Frame) -> Result<Option<LandmarkSet>>;
}

/// Rate-gated presence/gesture detector. `poll` may be called at any rate;
/// camera reads and recognizer invocations happen at most `target_fps` times
/// per second, and every failure path degrades to the last published result.
pub struct DetectionLoop<S, R> {
    source: S,
    recognizer: R,
    interval: Duration,
    last_poll: Option<Instant>,
    process_size: (u32, u32),
    latest: DetectionResult,
}

impl<S: FrameSource, R: LandmarkRecognizer> DetectionLoop<S, R> {
    pub fn new(source: S, recognizer: R, target_fps: f64, process_size: (u32, u32)) -> Self {
        Self {
            source,
            recognizer,
            interval: Duration::from_secs_f64(1.0 / target_fps.max(f64::MIN_POSITIVE)),
            last_poll: None,
            process_size,
            latest: DetectionResult::empty(),
        }
    }

    /// Latest published snapshot, without touching the camera.
    #[allow(dead_code)]
    pub fn latest(&self) -> DetectionResult {
        self.latest
    }

    pub fn poll(&mut self) -> DetectionResult {
        let now = Instant::now();
        if let Some(last) = self.last_poll {
            if now.duration_since(last) < self.interval {
                return self.latest;
            }
        }
        // Keep the cadence even when processing fails below, otherwise a bad
        // frame would be retried at whatever rate the caller polls.
        self.last_poll = Some(now);

        let frame = match self.source.read() {
            Ok(frame) => frame,
            Err(err) => {
                log::warn!("camera frame read failed: {err:?}");
                return self.latest;
            }
        };

        let processed = match downsample(&frame, self.process_size) {
            Ok(frame) => frame,
            Err(err) => {
                log::warn!("frame downsample failed: {err:?}");
                return self.latest;
            }
        };

        let hands = match self.recognizer.detect_hands(&processed) {
            Ok(hands) => hands,
            Err(err) => {
                log::warn!("hand detection failed: {err:?}");
                return self.latest;
            }
        };
        let pose = match self.recognizer.detect_pose(&processed) {
            Ok(pose) => pose,
            Err(err) => {
                log::warn!("pose detection failed: {err:?}");
                return self.latest;
            }
        };

        // Only the first hand is considered, a deliberate single-hand
        // simplification.
        let waving_hand = hands.first().map(is_waving).unwrap_or(false);

        self.latest = DetectionResult {
            human_detected: pose.is_some(),
            waving_hand,
            timestamp: now,
        };
        self.latest
    }
}

/// Static single-frame pose test, not a temporal wave detector: thumb tip
/// extended past its lower joint on x and index fingertip raised above its
/// middle joint on y. Fires for every qualifying frame, no debouncing.
pub fn is_waving(hand: &LandmarkSet) -> bool {
    match (
        hand.point(THUMB_TIP),
        hand.point(THUMB_IP),
        hand.point(INDEX_TIP),
        hand.point(INDEX_PIP),
    ) {
        (Some(thumb_tip), Some(thumb_ip), Some(index_tip), Some(index_pip)) => {
            thumb_tip.0 > thumb_ip.0 && index_tip.1 < index_pip.1
        }
        _ => false,
    }
}

/// Shrinks a capture frame to the processing resolution before recognition,
/// trading spatial fidelity for throughput.
fn downsample(frame: &Frame, (target_w, target_h): (u32, u32)) -> Result<Frame> {
    if frame.width == target_w && frame.height == target_h {
        return Ok(frame.clone());
    }

    let src = fir::images::Image::from_vec_u8(
        frame.width,
        frame.height,
        frame.rgb.clone(),
        fir::PixelType::U8x3,
    )?;
    let mut dst = fir::images::Image::new(target_w, target_h, fir::PixelType::U8x3);
    let mut resizer = fir::Resizer::new();
    let options = fir::ResizeOptions::new()
        .resize_alg(fir::ResizeAlg::Interpolation(fir::FilterType::Bilinear));
    resizer
        .resize(&src, &mut dst, Some(&options))
        .context("processing downsample failed")?;

    Ok(Frame {
        rgb: dst.into_vec(),
        width: target_w,
        height: target_h,
        timestamp: frame.timestamp,
    })
}

#[cfg(test)]
mod tests {
    use std::{cell::Cell, rc::Rc};

    use anyhow::anyhow;

    use super::*;

    struct ScriptedSource {
        reads: Rc<Cell<usize>>,
        fail_on: Vec<usize>,
    }

    impl ScriptedSource {
        fn new(reads: Rc<Cell<usize>>) -> Self {
            Self {
                reads,
                fail_on: Vec::new(),
            }
        }
    }

    impl FrameSource for ScriptedSource {
        fn read(&mut self) -> Result<Frame> {
            let n = self.reads.get();
            self.reads.set(n + 1);
            if self.fail_on.contains(&n) {
                return Err(anyhow!("scripted read failure"));
            }
            Ok(Frame::new(4, 4, vec![0u8; 4 * 4 * 3]))
        }
    }

    struct ScriptedRecognizer {
        hands: Vec<Vec<LandmarkSet>>,
        poses: Vec<Option<LandmarkSet>>,
        calls: usize,
    }

    impl ScriptedRecognizer {
        fn new(hands: Vec<Vec<LandmarkSet>>, poses: Vec<Option<LandmarkSet>>) -> Self {
            Self {
                hands,
                poses,
                calls: 0,
            }
        }
    }

    impl LandmarkRecognizer for ScriptedRecognizer {
        fn detect_hands(&mut self, _frame: &Frame) -> Result<Vec<LandmarkSet>> {
            let step = self.calls.min(self.hands.len().saturating_sub(1));
            Ok(self.hands.get(step).cloned().unwrap_or_default())
        }

        fn detect_pose(&mut self, _frame: &Frame) -> Result<Option<LandmarkSet>> {
            let step = self.calls.min(self.poses.len().saturating_sub(1));
            let pose = self.poses.get(step).cloned().unwrap_or(None);
            self.calls += 1;
            Ok(pose)
        }
    }

    fn waving_hand_set() -> LandmarkSet {
        // Indices 0..8 with thumb tip right of thumb IP and index tip above
        // index PIP.
        let mut points = vec![(0.5, 0.5); 9];
        points[THUMB_IP] = (0.5, 0.5);
        points[THUMB_TIP] = (0.6, 0.5);
        points[INDEX_PIP] = (0.5, 0.4);
        points[INDEX_TIP] = (0.5, 0.2);
        LandmarkSet { points }
    }

    fn pose_set() -> LandmarkSet {
        LandmarkSet {
            points: vec![(0.5, 0.5); 33],
        }
    }

    #[test]
    fn wave_rule_matches_thumb_and_index_geometry() {
        assert!(is_waving(&waving_hand_set()));

        let mut thumb_flipped = waving_hand_set();
        thumb_flipped.points[THUMB_TIP] = (0.4, 0.5);
        assert!(!is_waving(&thumb_flipped));

        let mut index_flipped = waving_hand_set();
        index_flipped.points[INDEX_TIP] = (0.5, 0.6);
        assert!(!is_waving(&index_flipped));
    }

    #[test]
    fn wave_rule_rejects_truncated_landmark_sets() {
        let short = LandmarkSet {
            points: vec![(0.5, 0.5); 4],
        };
        assert!(!is_waving(&short));
    }

    #[test]
    fn poll_inside_interval_returns_previous_result_without_reading() {
        let reads = Rc::new(Cell::new(0));
        let source = ScriptedSource::new(reads.clone());
        let recognizer =
            ScriptedRecognizer::new(vec![vec![waving_hand_set()]], vec![Some(pose_set())]);
        // One-poll-per-hour throttle: only the first call may touch the camera.
        let mut detector = DetectionLoop::new(source, recognizer, 1.0 / 3600.0, (4, 4));

        let first = detector.poll();
        let second = detector.poll();

        assert_eq!(reads.get(), 1);
        assert!(first.human_detected && first.waving_hand);
        assert_eq!(second.human_detected, first.human_detected);
        assert_eq!(second.waving_hand, first.waving_hand);
        assert_eq!(second.timestamp, first.timestamp);
        assert_eq!(detector.latest().timestamp, first.timestamp);
    }

    #[test]
    fn read_failure_keeps_stale_result_then_recovers() {
        let reads = Rc::new(Cell::new(0));
        let mut source = ScriptedSource::new(reads.clone());
        source.fail_on = vec![1];
        let recognizer = ScriptedRecognizer::new(
            vec![vec![waving_hand_set()], vec![], vec![]],
            vec![Some(pose_set()), None, None],
        );
        // Effectively unthrottled so every poll attempts a read.
        let mut detector = DetectionLoop::new(source, recognizer, f64::INFINITY, (4, 4));

        let before = detector.poll();
        assert!(before.human_detected && before.waving_hand);

        let stale = detector.poll();
        assert_eq!(reads.get(), 2);
        assert_eq!(stale.human_detected, before.human_detected);
        assert_eq!(stale.waving_hand, before.waving_hand);
        assert_eq!(stale.timestamp, before.timestamp);

        let fresh = detector.poll();
        assert!(!fresh.human_detected);
        assert!(!fresh.waving_hand);
    }

    #[test]
    fn human_detected_tracks_pose_presence_only() {
        let reads = Rc::new(Cell::new(0));
        let source = ScriptedSource::new(reads);
        // Hands present but no pose, then pose present with no hands.
        let recognizer = ScriptedRecognizer::new(
            vec![vec![waving_hand_set()], vec![]],
            vec![None, Some(pose_set())],
        );
        let mut detector = DetectionLoop::new(source, recognizer, f64::INFINITY, (4, 4));

        let first = detector.poll();
        assert!(!first.human_detected);
        assert!(first.waving_hand);

        let second = detector.poll();
        assert!(second.human_detected);
        assert!(!second.waving_hand);
    }

    #[test]
    fn downsample_produces_processing_resolution() {
        let frame = Frame::new(8, 8, vec![128u8; 8 * 8 * 3]);
        let small = downsample(&frame, (4, 4)).unwrap();
        assert_eq!((small.width, small.height), (4, 4));
        assert_eq!(small.rgb.len(), 4 * 4 * 3);
    }
}
