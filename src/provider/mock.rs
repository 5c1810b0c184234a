//! Mock model for testing purposes.

use async_trait::async_trait;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use crate::provider::{ModelError, ModelLoadError, ModelLoader, TextGenerator};

#[derive(Debug, Clone)]
enum Behavior {
    Text(String),
    Fail(String),
    Panic(String),
}

/// A mock generator that returns a predefined response and records calls.
#[derive(Debug)]
pub struct MockGenerator {
    behavior: Behavior,
    delay: Option<Duration>,
    calls: AtomicUsize,
    last_call: Mutex<Option<(String, usize)>>,
}

impl MockGenerator {
    fn with_behavior(behavior: Behavior) -> Self {
        Self {
            behavior,
            delay: None,
            calls: AtomicUsize::new(0),
            last_call: Mutex::new(None),
        }
    }

    /// A generator that always returns `text`.
    pub fn with_text(text: impl Into<String>) -> Self {
        Self::with_behavior(Behavior::Text(text.into()))
    }

    /// A generator that always fails with an inference error.
    pub fn failing(cause: impl Into<String>) -> Self {
        Self::with_behavior(Behavior::Fail(cause.into()))
    }

    /// A generator that panics when invoked.
    pub fn panicking(message: impl Into<String>) -> Self {
        Self::with_behavior(Behavior::Panic(message.into()))
    }

    /// Sleep for `delay` before responding.
    pub fn delayed(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Number of times `generate` was called.
    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Prompt and token budget of the most recent call.
    pub fn last_call(&self) -> Option<(String, usize)> {
        self.last_call.lock().unwrap().clone()
    }
}

#[async_trait]
impl TextGenerator for MockGenerator {
    fn model_name(&self) -> &str {
        "mock"
    }

    async fn generate(&self, prompt: &str, max_tokens: usize) -> Result<String, ModelError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        *self.last_call.lock().unwrap() = Some((prompt.to_string(), max_tokens));

        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }

        match &self.behavior {
            Behavior::Text(text) => Ok(text.clone()),
            Behavior::Fail(cause) => Err(ModelError::Inference(cause.clone())),
            Behavior::Panic(message) => panic!("{}", message),
        }
    }
}

/// A mock loader that counts loads and either yields a shared generator or fails.
#[derive(Debug)]
pub struct MockLoader {
    generator: Option<Arc<MockGenerator>>,
    loads: AtomicUsize,
}

impl MockLoader {
    /// A loader that yields `generator` on every load.
    pub fn new(generator: MockGenerator) -> Self {
        Self::shared(Arc::new(generator))
    }

    /// A loader that yields an existing generator, so tests can keep a spy on it.
    pub fn shared(generator: Arc<MockGenerator>) -> Self {
        Self {
            generator: Some(generator),
            loads: AtomicUsize::new(0),
        }
    }

    /// A loader whose artifact is always missing.
    pub fn failing() -> Self {
        Self {
            generator: None,
            loads: AtomicUsize::new(0),
        }
    }

    /// Number of times `load` was called.
    pub fn load_count(&self) -> usize {
        self.loads.load(Ordering::SeqCst)
    }
}

impl ModelLoader for MockLoader {
    fn describe(&self) -> String {
        "mock".to_string()
    }

    fn load(&self) -> Result<Arc<dyn TextGenerator>, ModelLoadError> {
        self.loads.fetch_add(1, Ordering::SeqCst);
        match &self.generator {
            Some(generator) => Ok(generator.clone() as Arc<dyn TextGenerator>),
            None => Err(ModelLoadError::NotFound("mock://missing".into())),
        }
    }
}
