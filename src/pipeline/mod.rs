//! Prompt pipeline: validate form input, build the prompt, run the model once.
//!
//! ```text
//! Idle -> Validating -> Rejected
//!                    \-> Generating -> Succeeded
//!                                   \-> Faulted
//! ```
//!
//! Validation failures and generation faults never escape as panics; they come
//! back as the `Err` arm of [`PromptPipeline::generate`] so the caller decides
//! how to render them. A model that cannot be loaded is reported separately
//! ([`PipelineError::ModelLoad`]) because nothing can be generated afterwards.

mod budget;

pub use budget::TokenBudget;

use std::sync::Arc;
use std::time::Duration;

use crate::config::GenerationConfig;
use crate::models::{GenerationRequest, Style, ValidationError};
use crate::provider::{ModelError, ModelLoadError, ModelProvider};

/// Pipeline states for a single request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineState {
    Idle,
    Validating,
    Rejected,
    Generating,
    Succeeded,
    Faulted,
}

impl PipelineState {
    pub fn as_str(&self) -> &'static str {
        match self {
            PipelineState::Idle => "idle",
            PipelineState::Validating => "validating",
            PipelineState::Rejected => "rejected",
            PipelineState::Generating => "generating",
            PipelineState::Succeeded => "succeeded",
            PipelineState::Faulted => "faulted",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            PipelineState::Rejected | PipelineState::Succeeded | PipelineState::Faulted
        )
    }
}

/// Why a request produced no text
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    /// Input rejected before the model was touched
    #[error(transparent)]
    Rejected(#[from] ValidationError),

    /// The model failed while generating
    #[error("generation failed: {0}")]
    Faulted(String),

    /// The model could not be loaded
    #[error(transparent)]
    ModelLoad(#[from] ModelLoadError),
}

impl PipelineError {
    /// Terminal state reached by a request that failed with this error
    pub fn state(&self) -> PipelineState {
        match self {
            PipelineError::Rejected(_) => PipelineState::Rejected,
            PipelineError::Faulted(_) | PipelineError::ModelLoad(_) => PipelineState::Faulted,
        }
    }

    /// Whether the session cannot continue after this error
    pub fn is_fatal(&self) -> bool {
        matches!(self, PipelineError::ModelLoad(_))
    }
}

impl From<ModelError> for PipelineError {
    fn from(err: ModelError) -> Self {
        PipelineError::Faulted(err.to_string())
    }
}

/// Turns validated form input into generated text
#[derive(Debug, Clone)]
pub struct PromptPipeline {
    provider: Arc<ModelProvider>,
    budget: TokenBudget,
    timeout: Option<Duration>,
}

impl PromptPipeline {
    /// Create a pipeline with the default budget and no deadline
    pub fn new(provider: Arc<ModelProvider>) -> Self {
        Self {
            provider,
            budget: TokenBudget::default(),
            timeout: None,
        }
    }

    /// Create a pipeline from the generation settings
    pub fn from_config(provider: Arc<ModelProvider>, config: &GenerationConfig) -> Self {
        Self {
            provider,
            budget: TokenBudget::new(config.tokens_per_word, config.max_tokens_cap),
            timeout: config.timeout_secs.map(Duration::from_secs),
        }
    }

    /// Replace the token budget
    pub fn with_budget(mut self, budget: TokenBudget) -> Self {
        self.budget = budget;
        self
    }

    /// Bound each generation by `timeout`
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn budget(&self) -> TokenBudget {
        self.budget
    }

    /// Validate raw form fields and generate a post
    pub async fn generate(
        &self,
        topic: &str,
        word_count_raw: &str,
        style: Style,
    ) -> Result<String, PipelineError> {
        transition(PipelineState::Idle, PipelineState::Validating);
        let request = match GenerationRequest::parse(topic, word_count_raw, style) {
            Ok(request) => request,
            Err(e) => {
                transition(PipelineState::Validating, PipelineState::Rejected);
                tracing::warn!(reason = %e, "Request rejected");
                return Err(e.into());
            }
        };

        self.run(&request).await
    }

    /// Generate a post for an already validated request
    pub async fn run(&self, request: &GenerationRequest) -> Result<String, PipelineError> {
        let max_tokens = self.budget.max_tokens(request.word_count);
        let prompt = request.prompt();
        transition(PipelineState::Validating, PipelineState::Generating);
        tracing::info!(
            topic = %request.topic,
            style = %request.style,
            words = request.word_count.get(),
            max_tokens,
            "Generating"
        );

        let model = self.provider.get_model().await.map_err(|e| {
            transition(PipelineState::Generating, PipelineState::Faulted);
            tracing::error!(error = %e, "Model unavailable");
            PipelineError::from(e)
        })?;

        // A separate task keeps a panicking model from unwinding into the caller.
        let task = tokio::spawn(async move { model.generate(&prompt, max_tokens).await });

        let outcome = match self.timeout {
            Some(limit) => match tokio::time::timeout(limit, task).await {
                Ok(joined) => joined,
                Err(_) => Ok(Err(ModelError::Timeout(limit))),
            },
            None => task.await,
        };

        let result = match outcome {
            Ok(Ok(text)) => Ok(text),
            Ok(Err(e)) => Err(PipelineError::from(e)),
            Err(join_error) => Err(PipelineError::Faulted(describe_join_error(join_error))),
        };

        match &result {
            Ok(text) => {
                transition(PipelineState::Generating, PipelineState::Succeeded);
                tracing::info!(chars = text.len(), "Generation succeeded");
            }
            Err(e) => {
                transition(PipelineState::Generating, PipelineState::Faulted);
                tracing::error!(error = %e, "Generation faulted");
            }
        }
        result
    }
}

fn transition(from: PipelineState, to: PipelineState) {
    tracing::trace!(?from, ?to, "Pipeline transition");
}

fn describe_join_error(err: tokio::task::JoinError) -> String {
    if !err.is_panic() {
        return err.to_string();
    }

    let payload = err.into_panic();
    if let Some(message) = payload.downcast_ref::<&str>() {
        format!("model panicked: {}", message)
    } else if let Some(message) = payload.downcast_ref::<String>() {
        format!("model panicked: {}", message)
    } else {
        "model panicked".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provider::mock::{MockGenerator, MockLoader};

    fn pipeline_with(generator: Arc<MockGenerator>) -> (PromptPipeline, Arc<MockLoader>) {
        let loader = Arc::new(MockLoader::shared(generator));
        let provider = Arc::new(ModelProvider::new(loader.clone()));
        (PromptPipeline::new(provider), loader)
    }

    #[tokio::test]
    async fn test_blank_topic_never_touches_model() {
        let generator = Arc::new(MockGenerator::with_text("unused"));
        let (pipeline, loader) = pipeline_with(generator.clone());

        for topic in ["", " ", "\t\n", "   \r\n  "] {
            let err = pipeline
                .generate(topic, "100", Style::Researcher)
                .await
                .unwrap_err();
            assert_eq!(err.to_string(), "topic required.");
            assert_eq!(err.state(), PipelineState::Rejected);
        }

        assert_eq!(generator.call_count(), 0);
        assert_eq!(loader.load_count(), 0);
    }

    #[tokio::test]
    async fn test_invalid_word_count_never_touches_model() {
        let generator = Arc::new(MockGenerator::with_text("unused"));
        let (pipeline, loader) = pipeline_with(generator.clone());

        for raw in ["abc", "", "12.5", "0", "-10"] {
            let err = pipeline
                .generate("Rust", raw, Style::DataAnalyst)
                .await
                .unwrap_err();
            assert_eq!(err.to_string(), "please enter a valid number for word count");
            assert!(!err.is_fatal());
        }

        assert_eq!(generator.call_count(), 0);
        assert_eq!(loader.load_count(), 0);
    }

    #[tokio::test]
    async fn test_budget_passed_to_model() {
        let generator = Arc::new(MockGenerator::with_text("ok"));
        let (pipeline, _) = pipeline_with(generator.clone());

        pipeline
            .generate("Rust", "100", Style::Researcher)
            .await
            .unwrap();
        assert_eq!(generator.last_call().unwrap().1, 200);

        pipeline
            .generate("Rust", "1000", Style::Researcher)
            .await
            .unwrap();
        assert_eq!(generator.last_call().unwrap().1, 512);
    }

    #[tokio::test]
    async fn test_oversized_word_count_is_clamped() {
        let generator = Arc::new(MockGenerator::with_text("ok"));
        let (pipeline, _) = pipeline_with(generator.clone());

        pipeline
            .generate("Rust", "5000000000", Style::Researcher)
            .await
            .unwrap();
        assert_eq!(generator.last_call().unwrap().1, 512);
    }

    #[tokio::test]
    async fn test_prompt_embeds_request() {
        let generator = Arc::new(MockGenerator::with_text("ok"));
        let (pipeline, _) = pipeline_with(generator.clone());

        pipeline
            .generate("Rust ownership", "50", Style::CommonPeople)
            .await
            .unwrap();
        let (prompt, _) = generator.last_call().unwrap();
        assert!(prompt.contains("common people"));
        assert!(prompt.contains("\"Rust ownership\""));
        assert!(prompt.contains("50 words"));
    }

    #[tokio::test]
    async fn test_text_returned_unmodified() {
        let text = "  Line1\n\nLine2 with trailing space \n";
        let generator = Arc::new(MockGenerator::with_text(text));
        let (pipeline, _) = pipeline_with(generator);

        let out = pipeline
            .generate("Rust", "3", Style::Researcher)
            .await
            .unwrap();
        assert_eq!(out, text);
    }

    #[tokio::test]
    async fn test_model_error_becomes_fault() {
        let generator = Arc::new(MockGenerator::failing("out of memory"));
        let (pipeline, _) = pipeline_with(generator.clone());

        let err = pipeline
            .generate("Rust", "50", Style::Researcher)
            .await
            .unwrap_err();
        assert!(err.to_string().starts_with("generation failed:"));
        assert!(err.to_string().contains("out of memory"));
        assert_eq!(err.state(), PipelineState::Faulted);
        assert_eq!(generator.call_count(), 1);
    }

    #[tokio::test]
    async fn test_model_panic_becomes_fault() {
        let generator = Arc::new(MockGenerator::panicking("kv cache exploded"));
        let (pipeline, _) = pipeline_with(generator);

        let err = pipeline
            .generate("Rust", "50", Style::Researcher)
            .await
            .unwrap_err();
        assert!(matches!(err, PipelineError::Faulted(_)));
        assert!(err.to_string().starts_with("generation failed:"));
        assert!(err.to_string().contains("kv cache exploded"));
    }

    #[tokio::test]
    async fn test_timeout_becomes_fault() {
        let generator =
            Arc::new(MockGenerator::with_text("late").delayed(Duration::from_secs(5)));
        let (pipeline, _) = pipeline_with(generator);
        let pipeline = pipeline.with_timeout(Duration::from_millis(20));

        let err = pipeline
            .generate("Rust", "50", Style::Researcher)
            .await
            .unwrap_err();
        assert!(err.to_string().starts_with("generation failed: timed out"));
    }

    #[tokio::test]
    async fn test_model_load_failure_is_fatal() {
        let loader = Arc::new(MockLoader::failing());
        let provider = Arc::new(ModelProvider::new(loader));
        let pipeline = PromptPipeline::new(provider);

        let err = pipeline
            .generate("Rust", "50", Style::Researcher)
            .await
            .unwrap_err();
        assert!(err.is_fatal());
        assert!(matches!(err, PipelineError::ModelLoad(_)));
    }

    #[tokio::test]
    async fn test_model_loaded_once_across_requests() {
        let generator = Arc::new(MockGenerator::with_text("ok"));
        let (pipeline, loader) = pipeline_with(generator.clone());

        for _ in 0..3 {
            pipeline
                .generate("Rust", "10", Style::Researcher)
                .await
                .unwrap();
        }
        assert_eq!(loader.load_count(), 1);
        assert_eq!(generator.call_count(), 3);
    }

    #[test]
    fn test_from_config() {
        let provider = Arc::new(ModelProvider::preloaded(Arc::new(MockGenerator::with_text(
            "x",
        ))));
        let config = GenerationConfig {
            tokens_per_word: 3,
            max_tokens_cap: 100,
            timeout_secs: Some(9),
            ..Default::default()
        };
        let pipeline = PromptPipeline::from_config(provider, &config);
        assert_eq!(pipeline.budget(), TokenBudget::new(3, 100));
        assert_eq!(pipeline.timeout, Some(Duration::from_secs(9)));
    }

    #[test]
    fn test_terminal_states() {
        assert!(PipelineState::Rejected.is_terminal());
        assert!(PipelineState::Succeeded.is_terminal());
        assert!(PipelineState::Faulted.is_terminal());
        assert!(!PipelineState::Generating.is_terminal());
        assert!(!PipelineState::Idle.is_terminal());
    }
}
