use std::{fs, path::Path};

use ab_glyph::{Font, FontVec, Glyph, PxScale, ScaleFont, point};
use rand::seq::SliceRandom;

use super::{Canvas, FramePacer, OutputDevice};

const SCROLL_STEP: i32 = 30;
const SHADOW_OFFSET: i32 = 10;
const SHADOW_COLOR: [u8; 3] = [255, 255, 255];
const TEXT_COLOR: [u8; 3] = [255, 0, 0];

/// Horizontally scrolling caption with a drop shadow. One call performs one
/// full right-to-left traversal of a randomly chosen candidate string.
pub struct TextMarquee {
    font: Option<FontVec>,
    scale: PxScale,
    display_fps: f64,
}

impl TextMarquee {
    /// A missing or unparseable font is logged once here and turns `scroll`
    /// into a no-op; the rest of the system keeps running.
    pub fn new(font_path: &Path, font_size: f32, display_fps: f64) -> Self {
        let font = match fs::read(font_path) {
            Ok(bytes) => match FontVec::try_from_vec(bytes) {
                Ok(font) => Some(font),
                Err(err) => {
                    log::error!("font {} failed to parse: {err}", font_path.display());
                    None
                }
            },
            Err(err) => {
                log::error!("font {} unavailable: {err}", font_path.display());
                None
            }
        };

        Self {
            font,
            scale: PxScale::from(font_size),
            display_fps,
        }
    }

    pub fn scroll(&self, canvas: &mut Canvas, output: &mut dyn OutputDevice, candidates: &[&str]) {
        let Some(font) = &self.font else {
            return;
        };
        let Some(text) = candidates.choose(&mut rand::thread_rng()) else {
            return;
        };

        let (text_w, text_h) = measure(font, self.scale, text);
        let y_pos = (canvas.height() as i32 + text_h) / 2 - text_h;

        run_traversal(canvas, output, text_w, self.display_fps, |canvas, x| {
            // Shadow first so the foreground never sits under it.
            draw_text(
                canvas,
                font,
                self.scale,
                text,
                x + SHADOW_OFFSET,
                y_pos + SHADOW_OFFSET,
                SHADOW_COLOR,
            );
            draw_text(canvas, font, self.scale, text, x, y_pos, TEXT_COLOR);
        });
    }
}

/// Runs one right-to-left pass over the canvas, presenting after every draw
/// and honoring the cancel signal once per frame.
fn run_traversal(
    canvas: &mut Canvas,
    output: &mut dyn OutputDevice,
    text_w: i32,
    display_fps: f64,
    mut draw: impl FnMut(&mut Canvas, i32),
) {
    let mut traversal = Traversal::new(canvas.width() as i32, text_w, SCROLL_STEP);
    let mut pacer = FramePacer::new(display_fps);

    loop {
        canvas.clear();
        draw(canvas, traversal.x);
        if let Err(err) = output.present(canvas) {
            log::warn!("marquee present failed: {err:?}");
        }

        if output.poll_cancel() {
            return;
        }
        if !traversal.advance() {
            // Exactly one pass per call.
            return;
        }
        pacer.tick();
    }
}

/// Leftward x-position sweep from the canvas's right edge until the text has
/// fully left the frame.
struct Traversal {
    x: i32,
    text_w: i32,
    step: i32,
}

impl Traversal {
    fn new(canvas_w: i32, text_w: i32, step: i32) -> Self {
        Self {
            x: canvas_w,
            text_w,
            step,
        }
    }

    /// Steps left; returns false once the text is entirely off-screen.
    fn advance(&mut self) -> bool {
        self.x -= self.step;
        self.x + self.text_w >= 0
    }
}

/// Pixel bounding box of the laid-out string.
fn measure(font: &FontVec, scale: PxScale, text: &str) -> (i32, i32) {
    let scaled = font.as_scaled(scale);
    let mut width = 0.0f32;
    let mut last = None;
    for ch in text.chars() {
        let id = scaled.glyph_id(ch);
        if let Some(prev) = last {
            width += scaled.kern(prev, id);
        }
        width += scaled.h_advance(id);
        last = Some(id);
    }
    let height = scaled.ascent() - scaled.descent();
    (width.ceil() as i32, height.ceil() as i32)
}

fn draw_text(
    canvas: &mut Canvas,
    font: &FontVec,
    scale: PxScale,
    text: &str,
    x: i32,
    y: i32,
    color: [u8; 3],
) {
    let scaled = font.as_scaled(scale);
    let baseline = y as f32 + scaled.ascent();
    let mut caret = x as f32;
    let mut last = None;

    for ch in text.chars() {
        let id = scaled.glyph_id(ch);
        if let Some(prev) = last {
            caret += scaled.kern(prev, id);
        }
        let glyph = Glyph {
            id,
            scale,
            position: point(caret, baseline),
        };
        if let Some(outlined) = font.outline_glyph(glyph) {
            let bounds = outlined.px_bounds();
            outlined.draw(|gx, gy, coverage| {
                canvas.blend_pixel(
                    bounds.min.x as i32 + gx as i32,
                    bounds.min.y as i32 + gy as i32,
                    color,
                    coverage,
                );
            });
        }
        caret += scaled.h_advance(id);
        last = Some(id);
    }
}

#[cfg(test)]
mod tests {
    use anyhow::Result;

    use super::*;

    struct CountingOutput {
        presents: usize,
        cancel_after: Option<usize>,
    }

    impl OutputDevice for CountingOutput {
        fn present(&mut self, _canvas: &Canvas) -> Result<()> {
            self.presents += 1;
            Ok(())
        }

        fn poll_cancel(&mut self) -> bool {
            match self.cancel_after {
                Some(n) => self.presents > n,
                None => false,
            }
        }
    }

    #[test]
    fn traversal_starts_at_canvas_edge_and_steps_left() {
        let mut traversal = Traversal::new(100, 20, 30);
        assert_eq!(traversal.x, 100);
        assert!(traversal.advance());
        assert_eq!(traversal.x, 70);
    }

    #[test]
    fn traversal_ends_exactly_when_text_leaves_frame() {
        let mut traversal = Traversal::new(100, 20, 30);
        // x: 70, 40, 10 still visible; -20 leaves x + text_w at 0 which
        // still counts as visible; -50 is out.
        assert!(traversal.advance());
        assert!(traversal.advance());
        assert!(traversal.advance());
        assert!(traversal.advance());
        assert!(!traversal.advance());
        assert_eq!(traversal.x, -50);
    }

    #[test]
    fn traversal_presents_once_per_step_until_text_leaves_frame() {
        let mut canvas = Canvas::new(100, 8);
        let mut output = CountingOutput {
            presents: 0,
            cancel_after: None,
        };
        run_traversal(&mut canvas, &mut output, 20, f64::INFINITY, |_, _| {});
        // x: 100, 70, 40, 10, -20; the next step puts the text fully out.
        assert_eq!(output.presents, 5);
    }

    #[test]
    fn cancel_stops_the_traversal_within_one_frame() {
        let mut canvas = Canvas::new(1000, 8);
        let mut output = CountingOutput {
            presents: 0,
            cancel_after: Some(1),
        };
        run_traversal(&mut canvas, &mut output, 20, f64::INFINITY, |_, _| {});
        assert_eq!(output.presents, 2);
    }

    #[test]
    fn missing_font_makes_scroll_a_no_op() {
        let marquee = TextMarquee::new(Path::new("/nonexistent/font.ttf"), 300.0, f64::INFINITY);
        let mut canvas = Canvas::new(8, 8);
        let mut output = CountingOutput {
            presents: 0,
            cancel_after: None,
        };
        marquee.scroll(&mut canvas, &mut output, &["HELLO"]);
        assert_eq!(output.presents, 0);
    }

    #[test]
    fn empty_candidate_set_is_a_no_op() {
        // Even with no font this exercises the candidate guard ordering.
        let marquee = TextMarquee::new(Path::new("/nonexistent/font.ttf"), 300.0, f64::INFINITY);
        let mut canvas = Canvas::new(8, 8);
        let mut output = CountingOutput {
            presents: 0,
            cancel_after: None,
        };
        marquee.scroll(&mut canvas, &mut output, &[]);
        assert_eq!(output.presents, 0);
    }
}
