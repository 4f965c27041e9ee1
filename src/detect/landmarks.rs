use std::path::Path;

use anyhow::{Context, Result, anyhow};
use fast_image_resize as fir;
use ndarray::Array4;
use ort::session::{Session, builder::GraphOptimizationLevel};
use ort::value::Tensor;
use rayon::prelude::*;

use super::LandmarkRecognizer;
use crate::types::{Frame, LandmarkSet};

pub const HAND_INPUT_SIZE: u32 = 224;
pub const POSE_INPUT_SIZE: u32 = 256;
pub const HAND_LANDMARKS: usize = 21;
pub const POSE_LANDMARKS: usize = 33;

// Model output strides: hands are (x, y, z), pose adds visibility and
// presence.
const HAND_STRIDE: usize = 3;
const POSE_STRIDE: usize = 5;

/// ONNX Runtime backend running the MediaPipe hand-landmark and
/// pose-landmark models on the same processed frame.
pub struct OrtRecognizer {
    hands: Session,
    pose: Session,
    max_hands: usize,
    detection_confidence: f32,
}

impl OrtRecognizer {
    pub fn new(
        hand_model: &Path,
        pose_model: &Path,
        max_hands: usize,
        detection_confidence: f32,
    ) -> Result<Self> {
        Ok(Self {
            hands: build_session(hand_model)?,
            pose: build_session(pose_model)?,
            max_hands,
            detection_confidence,
        })
    }
}

fn build_session(model_path: &Path) -> Result<Session> {
    Session::builder()?
        .with_optimization_level(GraphOptimizationLevel::Level3)?
        .with_intra_threads(2)?
        .commit_from_file(model_path)
        .with_context(|| format!("failed to load ORT session from {}", model_path.display()))
}

impl LandmarkRecognizer for OrtRecognizer {
    fn detect_hands(&mut self, frame: &Frame) -> Result<Vec<LandmarkSet>> {
        let (input, letterbox) = prepare_input(frame, HAND_INPUT_SIZE)?;
        let tensor = Tensor::from_array(input)?;
        let outputs = self
            .hands
            .run(ort::inputs![tensor])
            .context("failed to run hand landmark session")?;
        if outputs.len() < 1 {
            return Err(anyhow!("hand landmark model returned no outputs"));
        }

        let score = if outputs.len() > 1 {
            outputs[1]
                .try_extract_array::<f32>()
                .ok()
                .and_then(|arr| arr.iter().next().copied())
                .unwrap_or(0.0)
        } else {
            // Models without a score head are taken at face value.
            1.0
        };
        if score < self.detection_confidence {
            return Ok(Vec::new());
        }

        let coords: Vec<f32> = outputs[0].try_extract_array::<f32>()?.iter().copied().collect();
        let set = decode_normalized(&coords, HAND_LANDMARKS, HAND_STRIDE, &letterbox)?;

        // The single-hand model yields at most one set; max_hands caps it all
        // the same.
        let mut sets = vec![set];
        sets.truncate(self.max_hands);
        Ok(sets)
    }

    fn detect_pose(&mut self, frame: &Frame) -> Result<Option<LandmarkSet>> {
        let (input, letterbox) = prepare_input(frame, POSE_INPUT_SIZE)?;
        let tensor = Tensor::from_array(input)?;
        let outputs = self
            .pose
            .run(ort::inputs![tensor])
            .context("failed to run pose landmark session")?;
        if outputs.len() < 1 {
            return Err(anyhow!("pose landmark model returned no outputs"));
        }

        let score = if outputs.len() > 1 {
            outputs[1]
                .try_extract_array::<f32>()
                .ok()
                .and_then(|arr| arr.iter().next().copied())
                .unwrap_or(0.0)
        } else {
            1.0
        };
        if score < self.detection_confidence {
            return Ok(None);
        }

        let coords: Vec<f32> = outputs[0].try_extract_array::<f32>()?.iter().copied().collect();
        let set = decode_normalized(&coords, POSE_LANDMARKS, POSE_STRIDE, &letterbox)?;
        Ok(Some(set))
    }
}

#[derive(Clone, Debug)]
struct Letterbox {
    scale: f32,
    pad_x: f32,
    pad_y: f32,
    orig_w: u32,
    orig_h: u32,
}

/// Letterboxes the frame into a square model input normalized to [0, 1],
/// NHWC float32.
fn prepare_input(frame: &Frame, target_size: u32) -> Result<(Array4<f32>, Letterbox)> {
    if frame.rgb.len() != frame.expected_len() {
        return Err(anyhow!(
            "frame buffer size mismatch: got {}, expected {}",
            frame.rgb.len(),
            frame.expected_len()
        ));
    }

    let scale = target_size as f32 / (frame.width.max(frame.height) as f32);
    let new_w = (frame.width as f32 * scale).round().max(1.0) as u32;
    let new_h = (frame.height as f32 * scale).round().max(1.0) as u32;

    let src_image = fir::images::Image::from_vec_u8(
        frame.width,
        frame.height,
        frame.rgb.clone(),
        fir::PixelType::U8x3,
    )?;
    let mut dst_image = fir::images::Image::new(new_w, new_h, fir::PixelType::U8x3);
    let mut resizer = fir::Resizer::new();
    let resize_options = fir::ResizeOptions::new()
        .resize_alg(fir::ResizeAlg::Interpolation(fir::FilterType::Bilinear));
    resizer
        .resize(&src_image, &mut dst_image, Some(&resize_options))
        .context("model input resize failed")?;
    let resized = dst_image.into_vec();

    let pad_x = ((target_size as i64 - new_w as i64) / 2).max(0) as usize;
    let pad_y = ((target_size as i64 - new_h as i64) / 2).max(0) as usize;
    let mut canvas = vec![0u8; (target_size as usize) * (target_size as usize) * 3];
    let dst_stride = target_size as usize * 3;
    let src_stride = new_w as usize * 3;
    for row in 0..(new_h as usize) {
        let dst_offset = (pad_y + row) * dst_stride + pad_x * 3;
        let src_offset = row * src_stride;
        canvas[dst_offset..dst_offset + src_stride]
            .copy_from_slice(&resized[src_offset..src_offset + src_stride]);
    }

    let normalized: Vec<f32> = canvas.par_iter().map(|&v| v as f32 / 255.0).collect();
    let input = Array4::<f32>::from_shape_vec(
        (1, target_size as usize, target_size as usize, 3),
        normalized,
    )
    .map_err(|err| anyhow!("failed to build input tensor: {err}"))?;

    let letterbox = Letterbox {
        scale,
        pad_x: pad_x as f32,
        pad_y: pad_y as f32,
        orig_w: frame.width,
        orig_h: frame.height,
    };

    Ok((input, letterbox))
}

/// Decodes model-input-pixel landmark coordinates back to frame-normalized
/// [0, 1] points, undoing the letterbox.
fn decode_normalized(
    flat: &[f32],
    count: usize,
    stride: usize,
    letterbox: &Letterbox,
) -> Result<LandmarkSet> {
    if flat.len() < count * stride {
        return Err(anyhow!(
            "unexpected landmarks length: got {}, need {}",
            flat.len(),
            count * stride
        ));
    }

    let points = flat
        .chunks_exact(stride)
        .take(count)
        .map(|chunk| {
            let px = (chunk[0] - letterbox.pad_x) / letterbox.scale;
            let py = (chunk[1] - letterbox.pad_y) / letterbox.scale;
            (
                (px / letterbox.orig_w.max(1) as f32).clamp(0.0, 1.0),
                (py / letterbox.orig_h.max(1) as f32).clamp(0.0, 1.0),
            )
        })
        .collect();

    Ok(LandmarkSet { points })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decode_undoes_letterbox_padding_and_scale() {
        // 320x240 frame letterboxed into 224: scale 0.7, pad_y (224-168)/2.
        let letterbox = Letterbox {
            scale: 0.7,
            pad_x: 0.0,
            pad_y: 28.0,
            orig_w: 320,
            orig_h: 240,
        };
        // Landmark at the frame center in input pixels.
        let flat = [112.0f32, 112.0, 0.0];
        let set = decode_normalized(&flat, 1, 3, &letterbox).unwrap();
        let (x, y) = set.point(0).unwrap();
        assert!((x - 0.5).abs() < 1e-3);
        assert!((y - 0.5).abs() < 1e-3);
    }

    #[test]
    fn decode_rejects_short_output() {
        let letterbox = Letterbox {
            scale: 1.0,
            pad_x: 0.0,
            pad_y: 0.0,
            orig_w: 224,
            orig_h: 224,
        };
        let flat = [0.0f32; HAND_LANDMARKS * HAND_STRIDE - 1];
        assert!(decode_normalized(&flat, HAND_LANDMARKS, HAND_STRIDE, &letterbox).is_err());
    }

    #[test]
    fn decode_clamps_out_of_frame_points() {
        let letterbox = Letterbox {
            scale: 1.0,
            pad_x: 0.0,
            pad_y: 0.0,
            orig_w: 100,
            orig_h: 100,
        };
        let flat = [-20.0f32, 250.0, 0.0];
        let set = decode_normalized(&flat, 1, 3, &letterbox).unwrap();
        assert_eq!(set.point(0), Some((0.0, 1.0)));
    }

    #[test]
    fn prepare_input_letterboxes_to_square() {
        let frame = Frame::new(32, 16, vec![255u8; 32 * 16 * 3]);
        let (input, letterbox) = prepare_input(&frame, 8).unwrap();
        assert_eq!(input.shape(), &[1, 8, 8, 3]);
        assert!((letterbox.scale - 0.25).abs() < 1e-6);
        assert_eq!(letterbox.pad_x as u32, 0);
        assert_eq!(letterbox.pad_y as u32, 2);
        // Padded rows stay black, content rows are white.
        assert_eq!(input[[0, 0, 0, 0]], 0.0);
        assert_eq!(input[[0, 4, 4, 0]], 1.0);
    }
}
