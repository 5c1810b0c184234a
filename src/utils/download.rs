//! Model artifact download.

use anyhow::{bail, Context, Result};
use sha2::{Digest, Sha256};
use std::fs::{self, File};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use crate::config::ModelConfig;
use crate::ui;

/// What [`ensure_model`] did
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ModelArtifact {
    /// The weights were already on disk
    Present(PathBuf),
    /// The weights were fetched from `download_url`
    Downloaded { path: PathBuf, bytes: u64 },
}

impl ModelArtifact {
    pub fn path(&self) -> &Path {
        match self {
            ModelArtifact::Present(path) => path,
            ModelArtifact::Downloaded { path, .. } => path,
        }
    }
}

/// Make sure the configured model weights exist locally, downloading them
/// from `model.download_url` when they are missing.
pub async fn ensure_model(model: &ModelConfig) -> Result<ModelArtifact> {
    let path = model
        .path
        .clone()
        .context("No model path configured (set model.path or BLOGSMITH_MODEL__PATH)")?;

    if path.is_file() {
        tracing::debug!(path = %path.display(), "Model artifact already present");
        return Ok(ModelArtifact::Present(path));
    }

    let Some(url) = model.download_url.as_deref() else {
        bail!(
            "Model not found at {} and no model.download_url is configured",
            path.display()
        );
    };

    let bytes = download_to(url, &path, model.sha256.as_deref()).await?;
    Ok(ModelArtifact::Downloaded { path, bytes })
}

/// Stream `url` into `dest`. The body is written to a temporary file beside
/// `dest` and only moved into place after the checksum matches.
pub async fn download_to(url: &str, dest: &Path, expected_sha256: Option<&str>) -> Result<u64> {
    let dir = match dest.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => PathBuf::from("."),
    };
    fs::create_dir_all(&dir)
        .with_context(|| format!("Failed to create directory {}", dir.display()))?;

    tracing::info!(url, dest = %dest.display(), "Downloading model");

    let client = reqwest::Client::builder()
        .user_agent(format!("blogsmith/{}", crate::VERSION))
        .build()
        .context("Failed to build HTTP client")?;

    let mut response = client
        .get(url)
        .send()
        .await
        .with_context(|| format!("Failed to request {}", url))?;

    if !response.status().is_success() {
        bail!("Failed to download model (HTTP {})", response.status());
    }

    let progress = ui::create_progress_bar(response.content_length(), "Downloading model");
    let mut temp = tempfile::NamedTempFile::new_in(&dir)
        .with_context(|| format!("Failed to create temporary file in {}", dir.display()))?;
    let mut hasher = Sha256::new();
    let mut written: u64 = 0;

    while let Some(chunk) = response
        .chunk()
        .await
        .context("Failed to read download stream")?
    {
        temp.write_all(&chunk)
            .context("Failed to write model data")?;
        hasher.update(&chunk);
        written += chunk.len() as u64;
        progress.inc(chunk.len() as u64);
    }
    temp.flush().context("Failed to flush model data")?;

    if let Some(expected) = expected_sha256 {
        let actual = format!("{:x}", hasher.finalize());
        if !checksum_matches(&actual, expected) {
            progress.finish_with_error("Checksum mismatch");
            bail!("SHA256 mismatch: expected {}, got {}", expected.trim(), actual);
        }
    }

    temp.persist(dest)
        .with_context(|| format!("Failed to move model into {}", dest.display()))?;
    progress.finish_with_success(&format!(
        "Downloaded {}",
        ui::format_file_size(written)
    ));

    tracing::info!(dest = %dest.display(), bytes = written, "Model download complete");
    Ok(written)
}

/// Compute SHA256 hash of a file without loading it into memory
pub fn compute_sha256(file_path: &Path) -> Result<String> {
    let mut file = File::open(file_path)
        .with_context(|| format!("Failed to open {} for checksum", file_path.display()))?;
    let mut hasher = Sha256::new();
    io::copy(&mut file, &mut hasher).context("Failed to read file for checksum")?;
    Ok(format!("{:x}", hasher.finalize()))
}

/// Verify a file against an expected SHA256 hash
pub fn verify_sha256(file_path: &Path, expected_hash: &str) -> Result<bool> {
    let actual_hash = compute_sha256(file_path)?;
    Ok(checksum_matches(&actual_hash, expected_hash))
}

fn checksum_matches(actual: &str, expected: &str) -> bool {
    actual.eq_ignore_ascii_case(expected.trim())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    // sha256("hello world")
    const HELLO_SHA256: &str = "b94d27b9934d3e08a52e52d7da7dabfac484efe37a5380ee9088f7ace2efcde9";

    #[test]
    fn test_compute_sha256() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("data.bin");
        fs::write(&path, b"hello world").unwrap();

        assert_eq!(compute_sha256(&path).unwrap(), HELLO_SHA256);
    }

    #[test]
    fn test_verify_sha256() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("data.bin");
        fs::write(&path, b"hello world").unwrap();

        assert!(verify_sha256(&path, HELLO_SHA256).unwrap());
        assert!(verify_sha256(&path, &HELLO_SHA256.to_uppercase()).unwrap());
        assert!(!verify_sha256(&path, "deadbeef").unwrap());
    }

    #[tokio::test]
    async fn test_ensure_model_already_present() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("model.gguf");
        fs::write(&path, b"weights").unwrap();

        let model = ModelConfig {
            path: Some(path.clone()),
            download_url: Some("http://127.0.0.1:9/never-called".to_string()),
            ..Default::default()
        };

        let artifact = ensure_model(&model).await.unwrap();
        assert_eq!(artifact, ModelArtifact::Present(path.clone()));
        assert_eq!(artifact.path(), path.as_path());
    }

    #[test]
    fn test_ensure_model_without_path() {
        let err = tokio_test::block_on(ensure_model(&ModelConfig::default())).unwrap_err();
        assert!(err.to_string().contains("No model path configured"));
    }

    #[tokio::test]
    async fn test_ensure_model_missing_without_url() {
        let dir = tempdir().unwrap();
        let model = ModelConfig {
            path: Some(dir.path().join("missing.gguf")),
            ..Default::default()
        };

        let err = ensure_model(&model).await.unwrap_err();
        assert!(err.to_string().contains("no model.download_url"));
    }

    fn entries(dir: &Path) -> usize {
        fs::read_dir(dir).unwrap().count()
    }

    #[tokio::test]
    async fn test_download_to_verifies_and_persists() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", "/llama.gguf")
            .with_status(200)
            .with_body("hello world")
            .create_async()
            .await;

        let dir = tempdir().unwrap();
        let dest = dir.path().join("models").join("llama.gguf");
        let url = format!("{}/llama.gguf", server.url());

        let bytes = download_to(&url, &dest, Some(HELLO_SHA256)).await.unwrap();

        mock.assert_async().await;
        assert_eq!(bytes, 11);
        assert_eq!(fs::read(&dest).unwrap(), b"hello world");
        // No staging file left next to the model
        assert_eq!(entries(dest.parent().unwrap()), 1);
    }

    #[tokio::test]
    async fn test_download_to_http_error() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("GET", "/missing.gguf")
            .with_status(404)
            .create_async()
            .await;

        let dir = tempdir().unwrap();
        let dest = dir.path().join("missing.gguf");
        let url = format!("{}/missing.gguf", server.url());

        let err = download_to(&url, &dest, None).await.unwrap_err();
        assert!(err.to_string().contains("404"));
        assert!(!dest.exists());
        assert_eq!(entries(dir.path()), 0);
    }

    #[tokio::test]
    async fn test_download_to_checksum_mismatch_leaves_nothing() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("GET", "/llama.gguf")
            .with_status(200)
            .with_body("hello world")
            .create_async()
            .await;

        let dir = tempdir().unwrap();
        let dest = dir.path().join("llama.gguf");
        let url = format!("{}/llama.gguf", server.url());

        let err = download_to(&url, &dest, Some("deadbeef")).await.unwrap_err();
        assert!(err.to_string().contains("SHA256 mismatch"));
        assert!(!dest.exists());
        assert_eq!(entries(dir.path()), 0);
    }

    #[tokio::test]
    async fn test_ensure_model_downloads_missing_weights() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("GET", "/llama.gguf")
            .with_status(200)
            .with_body("hello world")
            .create_async()
            .await;

        let dir = tempdir().unwrap();
        let path = dir.path().join("llama.gguf");
        let model = ModelConfig {
            path: Some(path.clone()),
            download_url: Some(format!("{}/llama.gguf", server.url())),
            sha256: Some(HELLO_SHA256.to_uppercase()),
            ..Default::default()
        };

        let artifact = ensure_model(&model).await.unwrap();
        assert_eq!(artifact, ModelArtifact::Downloaded { path: path.clone(), bytes: 11 });
        assert!(verify_sha256(&path, HELLO_SHA256).unwrap());

        // Second call finds the weights on disk
        assert_eq!(ensure_model(&model).await.unwrap(), ModelArtifact::Present(path));
    }
}
