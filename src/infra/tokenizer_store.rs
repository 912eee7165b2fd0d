// ============================================================
// Layer 6 — Tokenizer Store
// ============================================================
// Builds, saves, and loads the caption vocabulary.
//
// The vocabulary is a word-level HuggingFace tokenizer written
// straight to tokenizer.json beside the checkpoint, so training
// and inference always agree on token ids. Bangla captions are
// already cleaned by the Preprocessor, so the tokenizer only
// splits on whitespace: no normaliser, no lowercasing, no
// accent stripping (which would eat Bangla vowel signs).
//
// Fixed special-token ids:
//   <pad> = 0   <unk> = 1   <start> = 2   <end> = 3
//
// Reference: tokenizers crate (WordLevel model, JSON format)

use anyhow::{Context, Result};
use std::{collections::HashMap, path::PathBuf};
use tokenizers::Tokenizer;

use crate::data::preprocessor::{END_TOKEN, START_TOKEN};

pub const PAD_TOKEN: &str = "<pad>";
pub const UNK_TOKEN: &str = "<unk>";

pub const PAD_ID:   u32 = 0;
pub const UNK_ID:   u32 = 1;
pub const START_ID: u32 = 2;
pub const END_ID:   u32 = 3;

const TOKENIZER_FILE: &str = "tokenizer.json";

pub struct TokenizerStore {
    dir: PathBuf,
}

impl TokenizerStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Load the existing tokenizer or build a new one from captions.
    pub fn load_or_build(&self, captions: &[String], vocab_size: usize) -> Result<Tokenizer> {
        if self.dir.join(TOKENIZER_FILE).exists() {
            tracing::info!("Loading existing tokenizer from disk");
            self.load()
        } else {
            tracing::info!("Building new tokenizer (vocab_size={})", vocab_size);
            self.build_and_save(captions, vocab_size)
        }
    }

    /// Load a previously saved tokenizer.
    pub fn load(&self) -> Result<Tokenizer> {
        let path = self.dir.join(TOKENIZER_FILE);
        Tokenizer::from_file(&path)
            .map_err(|e| anyhow::anyhow!("Cannot load tokenizer from '{}': {}", path.display(), e))
    }

    /// Count word frequencies, keep the `vocab_size - 4` most common
    /// words, and write a WordLevel tokenizer JSON.
    fn build_and_save(&self, captions: &[String], vocab_size: usize) -> Result<Tokenizer> {
        std::fs::create_dir_all(&self.dir)
            .with_context(|| format!("Cannot create '{}'", self.dir.display()))?;

        let specials = [PAD_TOKEN, UNK_TOKEN, START_TOKEN, END_TOKEN];

        let mut freq: HashMap<&str, usize> = HashMap::new();
        for caption in captions {
            for word in caption.split_whitespace() {
                if !specials.contains(&word) {
                    *freq.entry(word).or_insert(0) += 1;
                }
            }
        }

        // Most frequent first; ties broken alphabetically so rebuilds are stable
        let mut words: Vec<(&str, usize)> = freq.into_iter().collect();
        words.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(b.0)));
        words.truncate(vocab_size.saturating_sub(specials.len()));

        let mut vocab = serde_json::Map::new();
        for (id, token) in specials.iter().enumerate() {
            vocab.insert(token.to_string(), serde_json::json!(id));
        }
        for (offset, (word, _)) in words.iter().enumerate() {
            vocab.insert(word.to_string(), serde_json::json!(specials.len() + offset));
        }
        let total = vocab.len();

        let added_tokens: Vec<serde_json::Value> = specials
            .iter()
            .enumerate()
            .map(|(id, token)| serde_json::json!({
                "id": id, "content": token, "single_word": false, "lstrip": false,
                "rstrip": false, "normalized": false, "special": true
            }))
            .collect();

        let tokenizer_json = serde_json::json!({
            "version": "1.0",
            "truncation": null,
            "padding": null,
            "added_tokens": added_tokens,
            "normalizer": null,
            "pre_tokenizer": { "type": "WhitespaceSplit" },
            "post_processor": null,
            "decoder": null,
            "model": {
                "type": "WordLevel",
                "vocab": vocab,
                "unk_token": UNK_TOKEN
            }
        });

        let tok_path = self.dir.join(TOKENIZER_FILE);
        std::fs::write(&tok_path, serde_json::to_string_pretty(&tokenizer_json)?)
            .with_context(|| "Cannot write tokenizer JSON")?;

        tracing::info!("Tokenizer built with {} tokens, saved to '{}'", total, tok_path.display());

        Tokenizer::from_file(&tok_path).map_err(|e| anyhow::anyhow!("Cannot reload tokenizer: {e}"))
    }
}
