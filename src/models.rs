use std::{
    fs,
    io::{Read, Write},
    path::{Path, PathBuf},
};

use anyhow::Context;
use indicatif::{ProgressBar, ProgressStyle};
use reqwest::blocking::Client;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ModelKind {
    HandLandmarker,
    PoseLandmarker,
}

impl ModelKind {
    fn label(self) -> &'static str {
        match self {
            ModelKind::HandLandmarker => "hand landmarker",
            ModelKind::PoseLandmarker => "pose landmarker",
        }
    }

    fn filename(self) -> &'static str {
        match self {
            ModelKind::HandLandmarker => "handpose_estimation_mediapipe_2023feb.onnx",
            ModelKind::PoseLandmarker => "pose_estimation_mediapipe_2023mar.onnx",
        }
    }

    fn url(self) -> &'static str {
        match self {
            ModelKind::HandLandmarker => {
                "https://raw.githubusercontent.com/opencv/opencv_zoo/main/models/handpose_estimation_mediapipe/handpose_estimation_mediapipe_2023feb.onnx"
            }
            ModelKind::PoseLandmarker => {
                "https://raw.githubusercontent.com/opencv/opencv_zoo/main/models/pose_estimation_mediapipe/pose_estimation_mediapipe_2023mar.onnx"
            }
        }
    }
}

pub fn default_model_path(model: ModelKind) -> PathBuf {
    PathBuf::from("models").join(model.filename())
}

/// Downloads the model if it is not already on disk.
pub fn ensure_model_ready(model: ModelKind, model_path: &Path) -> anyhow::Result<()> {
    if model_path.exists() {
        return Ok(());
    }

    if let Some(parent) = model_path.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("failed to create model directory {}", parent.display()))?;
    }

    download_to_path(model, model_path)
        .with_context(|| format!("failed to download {} model", model.label()))
}

fn download_to_path(model: ModelKind, dest: &Path) -> anyhow::Result<()> {
    log::info!(
        "downloading {} model from {} to {}",
        model.label(),
        model.url(),
        dest.display()
    );

    let client = Client::new();
    let mut response = client
        .get(model.url())
        .send()
        .context("failed to start model download")?
        .error_for_status()
        .context("model download returned error status")?;

    let progress = create_progress_bar(response.content_length());

    let tmp_path = dest.with_extension("download");
    let mut file = fs::File::create(&tmp_path)
        .with_context(|| format!("failed to create {}", tmp_path.display()))?;

    let mut downloaded: u64 = 0;
    let mut buffer = [0u8; 16 * 1024];
    loop {
        let bytes_read = response
            .read(&mut buffer)
            .context("failed while reading model bytes")?;
        if bytes_read == 0 {
            break;
        }

        file.write_all(&buffer[..bytes_read])
            .context("failed while writing model to disk")?;
        downloaded += bytes_read as u64;
        progress.set_position(downloaded);
    }

    file.sync_all()
        .context("failed to flush downloaded model to disk")?;
    fs::rename(&tmp_path, dest).with_context(|| {
        format!(
            "failed to move temp model {} into place at {}",
            tmp_path.display(),
            dest.display()
        )
    })?;

    progress.finish_with_message(format!("{} model ready", model.label()));
    Ok(())
}

fn create_progress_bar(total: Option<u64>) -> ProgressBar {
    let progress = match total {
        Some(total) => ProgressBar::new(total),
        None => ProgressBar::new_spinner(),
    };
    progress.set_style(
        ProgressStyle::with_template("{msg} {bytes}/{total_bytes} [{bar:30}] {eta}")
            .unwrap_or_else(|_| ProgressStyle::default_bar()),
    );
    progress
}
