//! First-run model download from HuggingFace.

use anyhow::{Context, Result};
use std::fs;
use std::io::Write;
use std::path::Path;

const MODEL_BASE_URL: &str = "https://huggingface.co/ggerganov/whisper.cpp/resolve/main";

/// Maps model names to their HuggingFace filenames
fn model_filename(model_name: &str) -> String {
    format!("ggml-{model_name}.bin")
}

/// Ensure the model exists locally, downloading it if missing
///
/// Returns `true` if a download happened, `false` if the file was already
/// present.
///
/// # Errors
/// Returns error if the download or the file write fails
pub fn ensure_model_downloaded(model_name: &str, model_path: &Path) -> Result<bool> {
    if model_path.exists() {
        tracing::info!(
            path = %model_path.display(),
            "model already exists, skipping download"
        );
        return Ok(false);
    }

    tracing::info!(
        model = model_name,
        path = %model_path.display(),
        "model not found, starting download"
    );

    download_model(model_name, model_path)?;

    Ok(true)
}

fn download_model(model_name: &str, model_path: &Path) -> Result<()> {
    let filename = model_filename(model_name);
    let url = format!("{MODEL_BASE_URL}/{filename}");

    if let Some(parent) = model_path.parent() {
        fs::create_dir_all(parent).context("failed to create model directory")?;
    }

    tracing::info!(url = %url, "downloading model");

    // Download to a temp file, then rename so a partial download never
    // masquerades as a valid model.
    let temp_path = model_path.with_extension("tmp");

    let response = reqwest::blocking::get(&url)
        .with_context(|| format!("failed to download model from {url}"))?;

    if !response.status().is_success() {
        anyhow::bail!("download failed with status {}: {}", response.status(), url);
    }

    let bytes = response.bytes().context("failed to read response bytes")?;

    let mut file = fs::File::create(&temp_path)
        .with_context(|| format!("failed to create temp file at {}", temp_path.display()))?;

    file.write_all(&bytes)
        .context("failed to write model to temp file")?;

    drop(file);

    fs::rename(&temp_path, model_path).with_context(|| {
        format!(
            "failed to rename {} to {}",
            temp_path.display(),
            model_path.display()
        )
    })?;

    tracing::info!(
        path = %model_path.display(),
        size = bytes.len(),
        "model downloaded successfully"
    );

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_model_filename() {
        assert_eq!(model_filename("small"), "ggml-small.bin");
        assert_eq!(model_filename("base"), "ggml-base.bin");
        assert_eq!(model_filename("tiny"), "ggml-tiny.bin");
    }

    #[test]
    fn test_ensure_model_downloaded_existing_file() {
        let temp_dir = std::env::temp_dir();
        let model_path = temp_dir.join("speakez_test_existing_model.bin");

        fs::write(&model_path, b"dummy model data").unwrap();

        let downloaded = ensure_model_downloaded("small", &model_path).unwrap();
        assert!(!downloaded);

        fs::remove_file(&model_path).unwrap();
    }

    #[test]
    fn test_download_invalid_model() {
        let temp_dir = std::env::temp_dir();
        let model_path = temp_dir.join("speakez_test_invalid_model.bin");

        let _ = fs::remove_file(&model_path);

        let result = download_model("nonexistent-model-xyz", &model_path);
        assert!(result.is_err());

        let _ = fs::remove_file(&model_path);
    }

    #[test]
    #[ignore = "requires network access and downloads a large file"]
    fn test_download_model_integration() {
        let temp_dir = std::env::temp_dir();
        let model_path = temp_dir.join("speakez_test_downloaded_model.bin");

        let _ = fs::remove_file(&model_path);

        let downloaded = ensure_model_downloaded("tiny", &model_path).unwrap();
        assert!(downloaded);
        assert!(model_path.exists());
        assert!(fs::metadata(&model_path).unwrap().len() > 0);

        fs::remove_file(&model_path).unwrap();
    }
}
