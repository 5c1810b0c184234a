//! Model provider: loads the language model once and hands out the cached handle.
//!
//! The [`TextGenerator`] trait is the seam between the prompt pipeline and the
//! model runtime. A [`ModelLoader`] knows how to build a generator, and the
//! [`ModelProvider`] memoizes the first successful load for the lifetime of
//! the provider, which the binary owns for the lifetime of the process.
//!
//! # Substituting the model
//!
//! ```rust
//! use std::sync::Arc;
//! use blogsmith::provider::{mock::MockGenerator, ModelProvider};
//!
//! # #[tokio::main]
//! # async fn main() {
//! let provider = ModelProvider::preloaded(Arc::new(MockGenerator::with_text("Hello")));
//! let model = provider.get_model().await.unwrap();
//! assert_eq!(model.generate("prompt", 8).await.unwrap(), "Hello");
//! # }
//! ```

mod llama;
pub mod mock;

pub use llama::{GgufLoader, LlamaGenerator};

use async_trait::async_trait;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::OnceCell;

/// A loaded text-generation model.
///
/// Implementations must be safe to share; if the runtime keeps mutable state
/// between calls (a KV cache, for instance) they serialize access internally.
#[async_trait]
pub trait TextGenerator: Send + Sync + std::fmt::Debug {
    /// Human-readable model identifier
    fn model_name(&self) -> &str;

    /// Generate a completion for `prompt`, producing at most `max_tokens` tokens
    async fn generate(&self, prompt: &str, max_tokens: usize) -> Result<String, ModelError>;
}

/// Builds a [`TextGenerator`]. Loading may be slow and blocking.
pub trait ModelLoader: Send + Sync + std::fmt::Debug {
    /// Short description of what will be loaded (for logs)
    fn describe(&self) -> String;

    /// Load the model
    fn load(&self) -> Result<Arc<dyn TextGenerator>, ModelLoadError>;
}

/// Errors raised while locating or loading the model artifact
#[derive(Debug, thiserror::Error)]
pub enum ModelLoadError {
    /// No model path was configured
    #[error("no model configured (set model.path or BLOGSMITH_MODEL__PATH)")]
    NotConfigured,

    /// The artifact does not exist
    #[error("model artifact not found: {}", .0.display())]
    NotFound(PathBuf),

    /// The tokenizer could not be read
    #[error("failed to load tokenizer: {0}")]
    Tokenizer(String),

    /// The weights could not be parsed or loaded
    #[error("failed to load model: {0}")]
    Load(String),

    /// IO error (file system)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Faults raised during a single generation
#[derive(Debug, thiserror::Error)]
pub enum ModelError {
    /// The runtime failed while computing the completion
    #[error("inference error: {0}")]
    Inference(String),

    /// Prompt encoding or output decoding failed
    #[error("tokenizer error: {0}")]
    Tokenizer(String),

    /// The generation did not finish within the deadline
    #[error("timed out after {0:?}")]
    Timeout(std::time::Duration),

    /// The model state is unusable after an earlier panic
    #[error("model state poisoned by an earlier failure")]
    Poisoned,
}

impl From<candle_core::Error> for ModelError {
    fn from(err: candle_core::Error) -> Self {
        ModelError::Inference(err.to_string())
    }
}

/// Owns the lazily loaded model handle.
///
/// Construct one at the composition root and share it by `Arc`; every call
/// to [`ModelProvider::get_model`] after the first successful load returns
/// the same handle.
#[derive(Debug)]
pub struct ModelProvider {
    loader: Arc<dyn ModelLoader>,
    handle: OnceCell<Arc<dyn TextGenerator>>,
}

impl ModelProvider {
    /// Create a provider that loads lazily with `loader`
    pub fn new(loader: Arc<dyn ModelLoader>) -> Self {
        Self {
            loader,
            handle: OnceCell::new(),
        }
    }

    /// Create a provider that already holds `handle`
    pub fn preloaded(handle: Arc<dyn TextGenerator>) -> Self {
        Self {
            loader: Arc::new(Preloaded(handle.clone())),
            handle: OnceCell::new_with(Some(handle)),
        }
    }

    /// Get the model handle, loading it on first use.
    ///
    /// A failed load is not cached; the next call tries again.
    pub async fn get_model(&self) -> Result<Arc<dyn TextGenerator>, ModelLoadError> {
        let handle = self
            .handle
            .get_or_try_init(|| async {
                let loader = self.loader.clone();
                tracing::info!(model = %loader.describe(), "Loading model");
                let started = std::time::Instant::now();

                let handle = tokio::task::spawn_blocking(move || loader.load())
                    .await
                    .map_err(|e| ModelLoadError::Load(e.to_string()))??;

                tracing::info!(
                    model = handle.model_name(),
                    elapsed_ms = started.elapsed().as_millis() as u64,
                    "Model loaded"
                );
                Ok::<_, ModelLoadError>(handle)
            })
            .await?;

        Ok(handle.clone())
    }

    /// Whether the model has been loaded
    pub fn is_loaded(&self) -> bool {
        self.handle.initialized()
    }

    /// Description of the configured loader
    pub fn describe(&self) -> String {
        self.loader.describe()
    }
}

/// Loader backing [`ModelProvider::preloaded`]
#[derive(Debug)]
struct Preloaded(Arc<dyn TextGenerator>);

impl ModelLoader for Preloaded {
    fn describe(&self) -> String {
        self.0.model_name().to_string()
    }

    fn load(&self) -> Result<Arc<dyn TextGenerator>, ModelLoadError> {
        Ok(self.0.clone())
    }
}
