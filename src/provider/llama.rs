//! Quantized llama-family model loaded from a GGUF file with candle.

use async_trait::async_trait;
use candle_core::quantized::gguf_file;
use candle_core::{Device, Tensor};
use candle_transformers::generation::LogitsProcessor;
use candle_transformers::models::quantized_llama::ModelWeights;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use tokenizers::Tokenizer;

use crate::config::{Config, GenerationConfig, ModelConfig};
use crate::provider::{ModelError, ModelLoadError, ModelLoader, TextGenerator};

/// End-of-sequence marker used by llama tokenizers
const EOS_TOKEN: &str = "</s>";

/// Loads [`LlamaGenerator`]s from the configured model artifact
#[derive(Debug, Clone)]
pub struct GgufLoader {
    model: ModelConfig,
    temperature: f64,
    seed: u64,
}

impl GgufLoader {
    pub fn new(model: ModelConfig, generation: &GenerationConfig) -> Self {
        Self {
            model,
            temperature: generation.temperature,
            seed: generation.seed,
        }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(config.model.clone(), &config.generation)
    }

    fn weights_path(&self) -> Result<&Path, ModelLoadError> {
        let path = self
            .model
            .path
            .as_deref()
            .ok_or(ModelLoadError::NotConfigured)?;
        if !path.is_file() {
            return Err(ModelLoadError::NotFound(path.to_path_buf()));
        }
        Ok(path)
    }

    fn tokenizer_path(&self) -> Result<PathBuf, ModelLoadError> {
        let path = self
            .model
            .resolved_tokenizer_path()
            .ok_or(ModelLoadError::NotConfigured)?;
        if !path.is_file() {
            return Err(ModelLoadError::NotFound(path));
        }
        Ok(path)
    }
}

impl ModelLoader for GgufLoader {
    fn describe(&self) -> String {
        match &self.model.path {
            Some(path) => path.display().to_string(),
            None => "<unconfigured>".to_string(),
        }
    }

    fn load(&self) -> Result<Arc<dyn TextGenerator>, ModelLoadError> {
        let weights = self.weights_path()?;
        let tokenizer_path = self.tokenizer_path()?;
        let device = select_device()?;

        let mut file = std::fs::File::open(weights)?;
        let content = gguf_file::Content::read(&mut file)
            .map_err(|e| ModelLoadError::Load(format!("{}: {}", weights.display(), e)))?;
        tracing::debug!(
            tensors = content.tensor_infos.len(),
            path = %weights.display(),
            "Read GGUF header"
        );
        let model = ModelWeights::from_gguf(content, &mut file, &device)
            .map_err(|e| ModelLoadError::Load(e.to_string()))?;

        let tokenizer = Tokenizer::from_file(&tokenizer_path).map_err(|e| {
            ModelLoadError::Tokenizer(format!("{}: {}", tokenizer_path.display(), e))
        })?;
        let eos_token = tokenizer.token_to_id(EOS_TOKEN);
        if eos_token.is_none() {
            tracing::warn!("Tokenizer has no {} token; generation stops at the budget", EOS_TOKEN);
        }

        let name = weights
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| "gguf".to_string());

        Ok(Arc::new(LlamaGenerator {
            name,
            inner: Arc::new(LlamaInner {
                model: Mutex::new(model),
                tokenizer,
                device,
                eos_token,
                temperature: self.temperature,
                seed: self.seed,
            }),
        }))
    }
}

fn select_device() -> Result<Device, ModelLoadError> {
    #[cfg(feature = "metal")]
    {
        Device::new_metal(0).map_err(|e| ModelLoadError::Load(e.to_string()))
    }
    #[cfg(not(feature = "metal"))]
    {
        Device::cuda_if_available(0).map_err(|e| ModelLoadError::Load(e.to_string()))
    }
}

/// A loaded GGUF model with its tokenizer
pub struct LlamaGenerator {
    name: String,
    inner: Arc<LlamaInner>,
}

struct LlamaInner {
    /// The weights carry the KV cache, so one completion runs at a time
    model: Mutex<ModelWeights>,
    tokenizer: Tokenizer,
    device: Device,
    eos_token: Option<u32>,
    temperature: f64,
    seed: u64,
}

impl std::fmt::Debug for LlamaGenerator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LlamaGenerator")
            .field("name", &self.name)
            .field("device", &self.inner.device)
            .field("temperature", &self.inner.temperature)
            .finish()
    }
}

impl LlamaInner {
    fn complete(&self, prompt: &str, max_tokens: usize) -> Result<String, ModelError> {
        let prompt_tokens = self
            .tokenizer
            .encode(prompt, true)
            .map_err(|e| ModelError::Tokenizer(e.to_string()))?
            .get_ids()
            .to_vec();
        if prompt_tokens.is_empty() || max_tokens == 0 {
            return Ok(String::new());
        }

        let mut model = self.model.lock().map_err(|_| ModelError::Poisoned)?;
        let mut sampler = LogitsProcessor::new(self.seed, Some(self.temperature), None);

        // Index 0 resets the KV cache from any previous completion.
        let input = Tensor::new(prompt_tokens.as_slice(), &self.device)?.unsqueeze(0)?;
        let logits = model.forward(&input, 0)?.squeeze(0)?;
        let mut next = sampler.sample(&logits)?;

        let mut generated = Vec::with_capacity(max_tokens);
        for step in 0..max_tokens {
            if Some(next) == self.eos_token {
                break;
            }
            generated.push(next);
            if step + 1 == max_tokens {
                break;
            }

            let input = Tensor::new(&[next], &self.device)?.unsqueeze(0)?;
            let logits = model
                .forward(&input, prompt_tokens.len() + step)?
                .squeeze(0)?;
            next = sampler.sample(&logits)?;
        }

        tracing::debug!(
            prompt_tokens = prompt_tokens.len(),
            generated_tokens = generated.len(),
            "Completion finished"
        );

        self.tokenizer
            .decode(&generated, true)
            .map_err(|e| ModelError::Tokenizer(e.to_string()))
    }
}

#[async_trait]
impl TextGenerator for LlamaGenerator {
    fn model_name(&self) -> &str {
        &self.name
    }

    async fn generate(&self, prompt: &str, max_tokens: usize) -> Result<String, ModelError> {
        let inner = self.inner.clone();
        let prompt = prompt.to_string();

        tokio::task::spawn_blocking(move || inner.complete(&prompt, max_tokens))
            .await
            .map_err(|e| ModelError::Inference(e.to_string()))?
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn loader_for(model: ModelConfig) -> GgufLoader {
        GgufLoader::new(model, &GenerationConfig::default())
    }

    #[test]
    fn test_load_without_path() {
        let loader = loader_for(ModelConfig::default());
        assert_eq!(loader.describe(), "<unconfigured>");
        assert!(matches!(loader.load(), Err(ModelLoadError::NotConfigured)));
    }

    #[test]
    fn test_load_missing_weights() {
        let loader = loader_for(ModelConfig {
            path: Some(PathBuf::from("/nonexistent/llama.gguf")),
            ..Default::default()
        });
        match loader.load() {
            Err(ModelLoadError::NotFound(path)) => {
                assert_eq!(path, PathBuf::from("/nonexistent/llama.gguf"))
            }
            other => panic!("expected NotFound, got {:?}", other.map(|_| ())),
        }
    }

    #[test]
    fn test_load_missing_tokenizer() {
        let dir = tempdir().unwrap();
        let weights = dir.path().join("llama.gguf");
        std::fs::write(&weights, b"GGUF").unwrap();

        let loader = loader_for(ModelConfig {
            path: Some(weights),
            ..Default::default()
        });
        match loader.load() {
            Err(ModelLoadError::NotFound(path)) => {
                assert_eq!(path, dir.path().join("tokenizer.json"))
            }
            other => panic!("expected NotFound, got {:?}", other.map(|_| ())),
        }
    }

    #[test]
    fn test_load_rejects_invalid_weights() {
        let dir = tempdir().unwrap();
        let weights = dir.path().join("llama.gguf");
        std::fs::write(&weights, b"definitely not a gguf file").unwrap();
        std::fs::write(dir.path().join("tokenizer.json"), b"{}").unwrap();

        let loader = loader_for(ModelConfig {
            path: Some(weights),
            ..Default::default()
        });
        assert!(matches!(loader.load(), Err(ModelLoadError::Load(_))));
    }
}
