use std::{
    fs::{File, OpenOptions},
    io::{BufRead, Seek, SeekFrom, Write},
    path::Path,
    sync::{
        Arc,
        atomic::{AtomicBool, Ordering},
    },
    thread,
};

use anyhow::{Context, Result};

use super::{Canvas, OutputDevice};

/// Headless scanout straight to a Linux framebuffer, assumed to run XRGB8888
/// at the canvas resolution. The robot display has no window system.
pub struct FramebufferDevice {
    fb: File,
    quit: Arc<AtomicBool>,
    scratch: Vec<u8>,
}

impl FramebufferDevice {
    pub fn open(path: &Path, quit: Arc<AtomicBool>) -> Result<Self> {
        let fb = OpenOptions::new()
            .write(true)
            .open(path)
            .with_context(|| format!("failed to open framebuffer {}", path.display()))?;
        Ok(Self {
            fb,
            quit,
            scratch: Vec::new(),
        })
    }
}

impl OutputDevice for FramebufferDevice {
    fn present(&mut self, canvas: &Canvas) -> Result<()> {
        let pixels = canvas.pixels();
        self.scratch.clear();
        self.scratch.reserve(pixels.len() / 3 * 4);
        for rgb in pixels.chunks_exact(3) {
            // XRGB8888 little-endian: B, G, R, X.
            self.scratch.push(rgb[2]);
            self.scratch.push(rgb[1]);
            self.scratch.push(rgb[0]);
            self.scratch.push(0);
        }

        self.fb
            .seek(SeekFrom::Start(0))
            .context("framebuffer seek failed")?;
        self.fb
            .write_all(&self.scratch)
            .context("framebuffer write failed")?;
        Ok(())
    }

    fn poll_cancel(&mut self) -> bool {
        self.quit.load(Ordering::Relaxed)
    }
}

/// Spawns a detached stdin reader: a line starting with 'q' raises the quit
/// flag every render loop polls.
pub fn spawn_quit_listener() -> Arc<AtomicBool> {
    let quit = Arc::new(AtomicBool::new(false));
    let flag = quit.clone();

    thread::spawn(move || {
        let stdin = std::io::stdin();
        for line in stdin.lock().lines() {
            match line {
                Ok(line) if line.trim_start().starts_with('q') => {
                    flag.store(true, Ordering::Relaxed);
                    return;
                }
                Ok(_) => {}
                Err(_) => return,
            }
        }
    });

    quit
}
