use std::{
    fs,
    path::{Path, PathBuf},
};

use anyhow::{Context, Result, anyhow};

use super::playback::VideoDecoder;
use crate::types::Frame;

/// Eye-animation source: a directory of numbered PNG/JPEG frames played in
/// filename order. Decoding happens per frame so memory stays flat on the Pi.
pub struct EyeFrameDecoder {
    frames: Vec<PathBuf>,
    next: usize,
    width: u32,
    height: u32,
}

impl EyeFrameDecoder {
    pub fn open(dir: &Path) -> Result<Self> {
        let mut frames: Vec<PathBuf> = fs::read_dir(dir)
            .with_context(|| format!("failed to read animation directory {}", dir.display()))?
            .filter_map(|entry| entry.ok())
            .map(|entry| entry.path())
            .filter(|path| {
                matches!(
                    path.extension().and_then(|ext| ext.to_str()),
                    Some("png" | "jpg" | "jpeg")
                )
            })
            .collect();
        frames.sort();

        if frames.is_empty() {
            return Err(anyhow!("no animation frames in {}", dir.display()));
        }

        // Probe the first frame for source dimensions; the rest are assumed
        // to match.
        let first = image::open(&frames[0])
            .with_context(|| format!("failed to decode {}", frames[0].display()))?
            .to_rgb8();

        Ok(Self {
            width: first.width(),
            height: first.height(),
            frames,
            next: 0,
        })
    }
}

impl VideoDecoder for EyeFrameDecoder {
    fn dimensions(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    fn read_frame(&mut self) -> Result<Option<Frame>> {
        let Some(path) = self.frames.get(self.next) else {
            return Ok(None);
        };
        self.next += 1;

        let image = image::open(path)
            .with_context(|| format!("failed to decode {}", path.display()))?
            .to_rgb8();
        Ok(Some(Frame::new(
            image.width(),
            image.height(),
            image.into_raw(),
        )))
    }

    fn seek_start(&mut self) -> Result<()> {
        self.next = 0;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use image::{Rgb, RgbImage};

    use super::*;

    fn write_fixture_frames(dir: &Path, count: u32) {
        for i in 0..count {
            let image = RgbImage::from_pixel(2, 2, Rgb([i as u8 * 40, 0, 0]));
            image.save(dir.join(format!("frame_{i:03}.png"))).unwrap();
        }
    }

    #[test]
    fn frames_play_in_order_then_signal_end() {
        let dir = tempfile::tempdir().unwrap();
        write_fixture_frames(dir.path(), 2);

        let mut decoder = EyeFrameDecoder::open(dir.path()).unwrap();
        assert_eq!(decoder.dimensions(), (2, 2));

        let first = decoder.read_frame().unwrap().unwrap();
        assert_eq!(first.rgb[0], 0);
        let second = decoder.read_frame().unwrap().unwrap();
        assert_eq!(second.rgb[0], 40);
        assert!(decoder.read_frame().unwrap().is_none());
    }

    #[test]
    fn seek_start_rewinds_to_first_frame() {
        let dir = tempfile::tempdir().unwrap();
        write_fixture_frames(dir.path(), 2);

        let mut decoder = EyeFrameDecoder::open(dir.path()).unwrap();
        let _ = decoder.read_frame().unwrap();
        let _ = decoder.read_frame().unwrap();
        assert!(decoder.read_frame().unwrap().is_none());

        decoder.seek_start().unwrap();
        let replay = decoder.read_frame().unwrap().unwrap();
        assert_eq!(replay.rgb[0], 0);
    }

    #[test]
    fn empty_directory_is_an_open_failure() {
        let dir = tempfile::tempdir().unwrap();
        assert!(EyeFrameDecoder::open(dir.path()).is_err());
    }

    #[test]
    fn missing_directory_is_an_open_failure() {
        assert!(EyeFrameDecoder::open(Path::new("/nonexistent/animation")).is_err());
    }
}
