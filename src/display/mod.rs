pub mod canvas;
pub mod decoder;
pub mod marquee;
pub mod output;
pub mod playback;

use std::{
    thread,
    time::{Duration, Instant},
};

pub use canvas::Canvas;

/// Physical display sink plus the cooperatively polled quit signal.
pub trait OutputDevice {
    fn present(&mut self, canvas: &Canvas) -> anyhow::Result<()>;
    fn poll_cancel(&mut self) -> bool;
}

/// Sleeps out the remainder of each display frame so render loops run at the
/// configured fps instead of spinning.
pub struct FramePacer {
    interval: Duration,
    last: Option<Instant>,
}

impl FramePacer {
    pub fn new(fps: f64) -> Self {
        Self {
            interval: Duration::from_secs_f64(1.0 / fps.max(f64::MIN_POSITIVE)),
            last: None,
        }
    }

    pub fn tick(&mut self) {
        let now = Instant::now();
        if let Some(last) = self.last {
            let elapsed = now.duration_since(last);
            if elapsed < self.interval {
                thread::sleep(self.interval - elapsed);
            }
        }
        self.last = Some(Instant::now());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn infinite_fps_pacer_never_sleeps() {
        let mut pacer = FramePacer::new(f64::INFINITY);
        let start = Instant::now();
        for _ in 0..100 {
            pacer.tick();
        }
        assert!(start.elapsed() < Duration::from_millis(100));
    }
}
