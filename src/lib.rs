//! # Blogsmith
//!
//! Generate a blog post from a topic, a word count and a writing style with a
//! locally loaded language model, then export it to a paginated PDF.
//!
//! ## Architecture
//!
//! The library is organized into several modules:
//!
//! - [`models`]: Request data (Style, WordCount, GenerationRequest)
//! - [`provider`]: Lazily loaded, process-wide text generation handle
//! - [`pipeline`]: Validation, prompt building and fault-isolated generation
//! - [`export`]: PDF rendering and the resulting document handle
//! - [`config`]: Configuration management
//! - [`ui`]: Terminal status surface
//! - [`utils`]: Model download

pub mod config;
pub mod export;
pub mod models;
pub mod pipeline;
pub mod provider;
pub mod ui;
pub mod utils;

// Re-export commonly used types
pub use export::{DocumentExporter, DocumentHandle, DocumentWriteError};
pub use models::{GenerationRequest, Style, ValidationError, WordCount};
pub use pipeline::{PipelineError, PromptPipeline};
pub use provider::{ModelError, ModelLoadError, ModelLoader, ModelProvider, TextGenerator};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
