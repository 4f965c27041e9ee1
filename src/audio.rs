use std::{
    path::{Path, PathBuf},
    sync::{
        Arc,
        atomic::{AtomicUsize, Ordering},
    },
    thread,
    time::Duration,
};

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use crossbeam_channel::{Sender, bounded};
use rand::seq::SliceRandom;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum AudioError {
    #[error("no audio output device available")]
    NoOutputDevice,
    #[error("unsupported output sample format {0:?}")]
    UnsupportedFormat(cpal::SampleFormat),
    #[error("failed to decode {path}: {source}")]
    Decode {
        path: PathBuf,
        source: hound::Error,
    },
    #[error(transparent)]
    StreamConfig(#[from] cpal::DefaultStreamConfigError),
    #[error(transparent)]
    BuildStream(#[from] cpal::BuildStreamError),
    #[error(transparent)]
    PlayStream(#[from] cpal::PlayStreamError),
}

/// Audio subsystem contract: both calls block for the clip's duration inside
/// whichever thread runs them. Mixing of overlapping clips is delegated to
/// the platform, never done here.
pub trait AudioBackend: Send + Sync {
    fn play(&self, clip: &Path) -> Result<(), AudioError>;
    fn play_greeting(&self) -> Result<(), AudioError>;
}

/// Fire-and-join handle around a spawned audio thread. Dropping the handle
/// detaches the task.
pub struct AudioTask {
    handle: Option<thread::JoinHandle<()>>,
}

impl AudioTask {
    pub fn spawn<F>(work: F) -> Self
    where
        F: FnOnce() + Send + 'static,
    {
        Self {
            handle: Some(thread::spawn(work)),
        }
    }

    /// Blocks until the task finishes.
    pub fn join(mut self) {
        if let Some(handle) = self.handle.take() {
            if handle.join().is_err() {
                log::warn!("audio task panicked");
            }
        }
    }

    /// Explicitly lets the task run to completion unobserved.
    pub fn detach(mut self) {
        self.handle.take();
    }
}

/// WAV playback through the default cpal output device. Source samples are
/// mixed to mono and stepped at the nearest-sample rate ratio; fidelity is
/// not a goal on this hardware.
pub struct CpalBackend {
    greeting_clips: Vec<PathBuf>,
}

impl CpalBackend {
    pub fn new(greeting_clips: Vec<PathBuf>) -> Self {
        Self { greeting_clips }
    }
}

impl AudioBackend for CpalBackend {
    fn play(&self, clip: &Path) -> Result<(), AudioError> {
        let (samples, sample_rate) = load_wav_mono(clip)?;
        play_samples(samples, sample_rate)
    }

    fn play_greeting(&self) -> Result<(), AudioError> {
        let Some(clip) = self.greeting_clips.choose(&mut rand::thread_rng()) else {
            log::warn!("no greeting clips configured");
            return Ok(());
        };
        self.play(clip)
    }
}

/// Decodes a WAV file to mono f32 samples in [-1, 1].
fn load_wav_mono(path: &Path) -> Result<(Vec<f32>, u32), AudioError> {
    let mut reader = hound::WavReader::open(path).map_err(|source| AudioError::Decode {
        path: path.to_path_buf(),
        source,
    })?;
    let spec = reader.spec();
    let channels = spec.channels.max(1) as usize;

    let interleaved: Vec<f32> = match spec.sample_format {
        hound::SampleFormat::Float => reader.samples::<f32>().filter_map(|s| s.ok()).collect(),
        hound::SampleFormat::Int => {
            let max = (1i64 << (spec.bits_per_sample.saturating_sub(1))) as f32;
            reader
                .samples::<i32>()
                .filter_map(|s| s.ok())
                .map(|s| s as f32 / max)
                .collect()
        }
    };

    let mono: Vec<f32> = interleaved
        .chunks(channels)
        .map(|frame| frame.iter().sum::<f32>() / channels as f32)
        .collect();

    Ok((mono, spec.sample_rate))
}

fn play_samples(samples: Vec<f32>, src_rate: u32) -> Result<(), AudioError> {
    if samples.is_empty() {
        return Ok(());
    }

    let host = cpal::default_host();
    let device = host
        .default_output_device()
        .ok_or(AudioError::NoOutputDevice)?;
    let default_config = device.default_output_config()?;
    let sample_format = default_config.sample_format();
    let config: cpal::StreamConfig = default_config.into();

    let clip_len = Duration::from_secs_f64(samples.len() as f64 / src_rate.max(1) as f64);
    let (done_tx, done_rx) = bounded::<()>(1);

    let stream = match sample_format {
        cpal::SampleFormat::F32 => build_stream::<f32>(&device, &config, samples, src_rate, done_tx)?,
        cpal::SampleFormat::I16 => build_stream::<i16>(&device, &config, samples, src_rate, done_tx)?,
        cpal::SampleFormat::U16 => build_stream::<u16>(&device, &config, samples, src_rate, done_tx)?,
        other => return Err(AudioError::UnsupportedFormat(other)),
    };
    stream.play()?;

    // Block until the callback exhausts the clip, with the clip length as a
    // fallback if the backend stalls; then let the device buffer drain.
    let _ = done_rx.recv_timeout(clip_len + Duration::from_secs(1));
    thread::sleep(Duration::from_millis(100));
    Ok(())
}

fn build_stream<T>(
    device: &cpal::Device,
    config: &cpal::StreamConfig,
    samples: Vec<f32>,
    src_rate: u32,
    done_tx: Sender<()>,
) -> Result<cpal::Stream, AudioError>
where
    T: cpal::SizedSample + cpal::FromSample<f32>,
{
    let channels = config.channels.max(1) as usize;
    let step_num = src_rate as usize;
    let step_den = config.sample_rate.0.max(1) as usize;
    let position = Arc::new(AtomicUsize::new(0));

    let stream = device.build_output_stream(
        config,
        move |data: &mut [T], _: &cpal::OutputCallbackInfo| {
            let mut out_index = position.load(Ordering::Relaxed);
            for frame in data.chunks_mut(channels) {
                // Nearest-sample rate adaptation.
                let src_index = out_index * step_num / step_den;
                let value = match samples.get(src_index) {
                    Some(value) => *value,
                    None => {
                        let _ = done_tx.try_send(());
                        0.0
                    }
                };
                for slot in frame.iter_mut() {
                    *slot = T::from_sample(value);
                }
                out_index += 1;
            }
            position.store(out_index, Ordering::Relaxed);
        },
        |err| log::warn!("audio stream error: {err}"),
        None,
    )?;

    Ok(stream)
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::AtomicBool;

    use super::*;

    #[test]
    fn task_join_waits_for_completion() {
        let done = Arc::new(AtomicBool::new(false));
        let flag = done.clone();
        let task = AudioTask::spawn(move || {
            thread::sleep(Duration::from_millis(10));
            flag.store(true, Ordering::SeqCst);
        });
        task.join();
        assert!(done.load(Ordering::SeqCst));
    }

    #[test]
    fn task_detach_does_not_block() {
        let task = AudioTask::spawn(|| {
            thread::sleep(Duration::from_millis(50));
        });
        let start = std::time::Instant::now();
        task.detach();
        assert!(start.elapsed() < Duration::from_millis(50));
    }

    #[test]
    fn wav_decode_mixes_stereo_to_mono() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("clip.wav");

        let spec = hound::WavSpec {
            channels: 2,
            sample_rate: 8_000,
            bits_per_sample: 16,
            sample_format: hound::SampleFormat::Int,
        };
        let mut writer = hound::WavWriter::create(&path, spec).unwrap();
        // Two stereo frames: (max, 0) and (0, 0).
        writer.write_sample(i16::MAX).unwrap();
        writer.write_sample(0i16).unwrap();
        writer.write_sample(0i16).unwrap();
        writer.write_sample(0i16).unwrap();
        writer.finalize().unwrap();

        let (mono, rate) = load_wav_mono(&path).unwrap();
        assert_eq!(rate, 8_000);
        assert_eq!(mono.len(), 2);
        assert!((mono[0] - 0.5).abs() < 1e-3);
        assert_eq!(mono[1], 0.0);
    }

    #[test]
    fn missing_clip_is_a_decode_error() {
        let backend = CpalBackend::new(Vec::new());
        let err = backend.play(Path::new("/nonexistent/clip.wav")).unwrap_err();
        assert!(matches!(err, AudioError::Decode { .. }));
    }

    #[test]
    fn greeting_without_clips_is_a_no_op() {
        let backend = CpalBackend::new(Vec::new());
        assert!(backend.play_greeting().is_ok());
    }
}
