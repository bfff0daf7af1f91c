use candle_core::Device;
use pylate_rs::ColBERT;

use crate::{
    embedding::{Embedder, mean_pool},
    error::{Error, Result},
};

pub const DEFAULT_MODEL_ID: &str = "lightonai/GTE-ModernColBERT-v1";
pub const MODEL_ENV_VAR: &str = "NOTEBERT_MODEL";

/// Select the best available compute device.
///
/// Uses CUDA when compiled with the `cuda` feature, Metal when compiled with
/// the `metal` feature, and falls back to CPU otherwise.
fn default_device() -> Device {
    #[cfg(feature = "cuda")]
    {
        if let Ok(device) = Device::new_cuda(0) {
            return device;
        }
    }

    #[cfg(feature = "metal")]
    {
        if let Ok(device) = Device::new_metal(0) {
            return device;
        }
    }

    Device::Cpu
}

/// Manages the ColBERT model lifecycle, supporting lazy loading on first use.
///
/// Each text is encoded on its own as a document, and its token embeddings
/// are mean-pooled into one vector. Encoding texts one at a time keeps batch
/// padding out of the average.
pub struct ModelManager {
    model: Option<ColBERT>,
    model_id: String,
}

impl ModelManager {
    /// Creates a `ModelManager` for `model_id`, usually the value returned by
    /// [`ConfigDb::resolve_model_id`](crate::ConfigDb::resolve_model_id).
    ///
    /// The model is not loaded until the first call to `embed`.
    pub fn with_model_id(model_id: String) -> Self {
        Self {
            model: None,
            model_id,
        }
    }

    /// Returns the model ID that will be (or has been) loaded.
    pub fn model_id(&self) -> &str {
        &self.model_id
    }

    /// Returns `true` if the model has already been loaded into memory.
    pub fn is_loaded(&self) -> bool {
        self.model.is_some()
    }

    /// Ensures the model is loaded, downloading from HuggingFace Hub if needed.
    fn ensure_loaded(&mut self) -> Result<&mut ColBERT> {
        if self.model.is_none() {
            tracing::info!(model = %self.model_id, "loading embedding model");
            let device = default_device();
            let colbert: ColBERT = ColBERT::from(&self.model_id)
                .with_device(device)
                .try_into()
                .map_err(|e| {
                    Error::Model(format!(
                        "failed to load model '{}': {e}",
                        self.model_id
                    ))
                })?;
            self.model = Some(colbert);
        }

        self.model
            .as_mut()
            .ok_or_else(|| Error::Model("model not loaded".to_string()))
    }
}

impl Embedder for ModelManager {
    fn embed(&mut self, text: &str) -> Result<Vec<f32>> {
        let model = self.ensure_loaded()?;
        let embeddings = model
            .encode(&[text.to_string()], false)
            .map_err(|e| Error::Model(format!("encoding failed: {e}")))?;
        // [1, T, D] -> [T, D]
        let tokens = embeddings.squeeze(0).map_err(|e| {
            Error::Model(format!("unexpected embedding tensor shape: {e}"))
        })?;
        mean_pool(&tokens)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn custom_model_id() {
        let manager = ModelManager::with_model_id("custom/model".to_string());
        assert_eq!(manager.model_id(), "custom/model");
        assert!(!manager.is_loaded());
    }

    #[test]
    fn with_model_id_not_loaded_by_default() {
        let manager = ModelManager::with_model_id(DEFAULT_MODEL_ID.to_string());
        assert!(!manager.is_loaded());
        assert_eq!(manager.model_id(), DEFAULT_MODEL_ID);
    }
}
