// ============================================================
// Layer 6 — Pretrained Model Store
// ============================================================
// Resolves a pretrained model name (e.g. "microsoft/deberta-v3-base")
// to the two files a run needs from the model hub:
//
//   tokenizer.json  → tokenizers::Tokenizer
//   config.json     → PretrainedConfig (architecture only)
//
// Downloads are cached under the given directory by hf-hub and
// the cache is consulted first, so an offline store resolves
// anything fetched before. An operator can point at a local
// tokenizer file instead, which skips the tokenizer download.
//
// Some repositories (microsoft/deberta-v3-base among them) only
// publish a SentencePiece `spm.model`, not `tokenizer.json`; those
// need a converted file passed with --tokenizer-file.
//
// A name that cannot be resolved is fatal for the run.

use anyhow::{anyhow, bail, Context, Result};
use hf_hub::{
    api::sync::{Api, ApiBuilder},
    Cache,
};
use std::{
    fs,
    path::{Path, PathBuf},
};
use tokenizers::Tokenizer;

use crate::ml::model::PretrainedConfig;

pub struct PretrainedStore {
    cache_dir:      PathBuf,
    tokenizer_file: Option<PathBuf>,
    offline:        bool,
}

impl PretrainedStore {
    pub fn new(cache_dir: impl Into<PathBuf>, tokenizer_file: Option<PathBuf>) -> Self {
        Self {
            cache_dir: cache_dir.into(),
            tokenizer_file,
            offline: false,
        }
    }

    /// Only resolve files already in the cache.
    pub fn offline(mut self, offline: bool) -> Self {
        self.offline = offline;
        self
    }

    pub fn tokenizer(&self, model_name: &str) -> Result<Tokenizer> {
        let path = match &self.tokenizer_file {
            Some(path) => path.clone(),
            None => self.fetch(model_name, "tokenizer.json").with_context(|| {
                format!(
                    "Cannot resolve tokenizer for '{model_name}'. If the repository only \
                     ships a SentencePiece spm.model, convert it to tokenizer.json and \
                     pass it with --tokenizer-file"
                )
            })?,
        };
        load_tokenizer(&path)
    }

    pub fn config(&self, model_name: &str) -> Result<PretrainedConfig> {
        let path = self
            .fetch(model_name, "config.json")
            .with_context(|| format!("Cannot resolve configuration for '{model_name}'"))?;
        load_config(&path)
    }

    fn api(&self) -> Result<Api> {
        ApiBuilder::new()
            .with_cache_dir(self.cache_dir.clone())
            .build()
            .map_err(|e| anyhow!("Failed to initialise model hub client: {e}"))
    }

    fn fetch(&self, model_name: &str, file: &str) -> Result<PathBuf> {
        let cached = Cache::new(self.cache_dir.clone())
            .model(model_name.to_string())
            .get(file);
        if let Some(path) = cached {
            tracing::debug!("Using cached {}/{} at '{}'", model_name, file, path.display());
            return Ok(path);
        }
        if self.offline {
            bail!("'{file}' is not in the cache '{}' and the store is offline", self.cache_dir.display());
        }

        let path = self
            .api()?
            .model(model_name.to_string())
            .get(file)
            .map_err(|e| anyhow!("'{file}' not available: {e}"))?;
        tracing::debug!("Resolved {}/{} to '{}'", model_name, file, path.display());
        Ok(path)
    }
}

pub fn load_tokenizer(path: &Path) -> Result<Tokenizer> {
    Tokenizer::from_file(path)
        .map_err(|e| anyhow!("Cannot load tokenizer from '{}': {}", path.display(), e))
}

pub fn load_config(path: &Path) -> Result<PretrainedConfig> {
    let json = fs::read_to_string(path)
        .with_context(|| format!("Cannot read '{}'", path.display()))?;
    serde_json::from_str(&json)
        .with_context(|| format!("Malformed model configuration '{}'", path.display()))
}
