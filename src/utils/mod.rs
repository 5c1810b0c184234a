//! Utility modules.
//!
//! - [`ensure_model`]: Fetch the model weights on first run
//! - [`compute_sha256`] / [`verify_sha256`]: Checksum helpers for downloaded artifacts
//!
//! ```rust,no_run
//! use blogsmith::config::get_config;
//! use blogsmith::utils::ensure_model;
//!
//! # #[tokio::main]
//! # async fn main() -> anyhow::Result<()> {
//! let config = get_config()?;
//! let artifact = ensure_model(&config.model).await?;
//! println!("model at {}", artifact.path().display());
//! # Ok(())
//! # }
//! ```

mod download;

pub use download::{compute_sha256, download_to, ensure_model, verify_sha256, ModelArtifact};
