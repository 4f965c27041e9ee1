/// Fixed-resolution RGB888 buffer standing in for the physical display.
/// Dimensions never change after construction; only one renderer writes to
/// it at a time.
pub struct Canvas {
    pixels: Vec<u8>,
    width: u32,
    height: u32,
}

impl Canvas {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            pixels: vec![0u8; width as usize * height as usize * 3],
            width,
            height,
        }
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn pixels(&self) -> &[u8] {
        &self.pixels
    }

    pub fn clear(&mut self) {
        self.pixels.fill(0);
    }

    /// Copies a packed RGB sub-image to (start_x, start_y). Rows and columns
    /// falling outside the canvas are dropped.
    pub fn blit(&mut self, rgb: &[u8], src_w: u32, src_h: u32, start_x: u32, start_y: u32) {
        let copy_w = src_w.min(self.width.saturating_sub(start_x)) as usize;
        let copy_h = src_h.min(self.height.saturating_sub(start_y)) as usize;
        if copy_w == 0 || copy_h == 0 {
            return;
        }

        let src_stride = src_w as usize * 3;
        let dst_stride = self.width as usize * 3;
        for row in 0..copy_h {
            let src_offset = row * src_stride;
            let dst_offset = (start_y as usize + row) * dst_stride + start_x as usize * 3;
            self.pixels[dst_offset..dst_offset + copy_w * 3]
                .copy_from_slice(&rgb[src_offset..src_offset + copy_w * 3]);
        }
    }

    /// Alpha-blends a single pixel; used by the glyph rasterizer.
    pub fn blend_pixel(&mut self, x: i32, y: i32, color: [u8; 3], coverage: f32) {
        if x < 0 || y < 0 || x as u32 >= self.width || y as u32 >= self.height {
            return;
        }
        let idx = (y as usize * self.width as usize + x as usize) * 3;
        let a = coverage.clamp(0.0, 1.0);
        for c in 0..3 {
            let dst = self.pixels[idx + c] as f32;
            self.pixels[idx + c] = (dst + (color[c] as f32 - dst) * a) as u8;
        }
    }
}
