use std::path::Path;
use std::sync::Arc;

use candle_core::{Device, Tensor};

use crate::error::{Error, Result};

/// Encodes a caption into a fixed-shape token tensor.
pub trait Tokenizer: Send + Sync {
    fn tokenize(&self, text: &str) -> Result<Tensor>;
}

impl<T: Tokenizer + ?Sized> Tokenizer for Arc<T> {
    fn tokenize(&self, text: &str) -> Result<Tensor> {
        (**self).tokenize(text)
    }
}

pub const DEFAULT_CONTEXT_LENGTH: usize = 77;

/// A `tokenizers` tokenizer padded or truncated to `context_length` ids.
///
/// Produces a `u32` tensor of shape `(context_length,)`.
pub struct HfTokenizer {
    inner: tokenizers::Tokenizer,
    context_length: usize,
    pad_id: u32,
    add_special_tokens: bool,
    device: Device,
}

impl HfTokenizer {
    pub fn new(inner: tokenizers::Tokenizer) -> Self {
        Self {
            inner,
            context_length: DEFAULT_CONTEXT_LENGTH,
            pad_id: 0,
            add_special_tokens: true,
            device: Device::Cpu,
        }
    }

    /// Loads a serialized `tokenizer.json`.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let inner = tokenizers::Tokenizer::from_file(path).map_err(Error::Tokenizer)?;
        Ok(Self::new(inner))
    }

    /// Fetches `tokenizer.json` from a Hugging Face hub model repository.
    pub fn from_pretrained(repo_id: &str) -> Result<Self> {
        let api = hf_hub::api::sync::Api::new().map_err(|e| Error::Hub(e.to_string()))?;
        let path = api
            .model(repo_id.to_string())
            .get("tokenizer.json")
            .map_err(|e| Error::Hub(e.to_string()))?;
        log::info!("loaded tokenizer for {} from {}", repo_id, path.display());
        Self::from_file(path)
    }

    pub fn with_context_length(mut self, context_length: usize) -> Self {
        self.context_length = context_length;
        self
    }

    pub fn with_pad_id(mut self, pad_id: u32) -> Self {
        self.pad_id = pad_id;
        self
    }

    pub fn with_special_tokens(mut self, add_special_tokens: bool) -> Self {
        self.add_special_tokens = add_special_tokens;
        self
    }

    pub fn with_device(mut self, device: Device) -> Self {
        self.device = device;
        self
    }

    pub fn context_length(&self) -> usize {
        self.context_length
    }

    /// Token ids after padding/truncation.
    pub fn encode_ids(&self, text: &str) -> Result<Vec<u32>> {
        let encoding = self
            .inner
            .encode(text, self.add_special_tokens)
            .map_err(Error::Tokenizer)?;
        let mut ids: Vec<u32> = encoding
            .get_ids()
            .iter()
            .take(self.context_length)
            .copied()
            .collect();
        ids.resize(self.context_length, self.pad_id);
        Ok(ids)
    }
}

impl Tokenizer for HfTokenizer {
    fn tokenize(&self, text: &str) -> Result<Tensor> {
        let ids = self.encode_ids(text)?;
        Ok(Tensor::from_vec(ids, self.context_length, &self.device)?)
    }
}
