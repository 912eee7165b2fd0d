// ============================================================
// Layer 5 — Inferencer
// ============================================================
// Restores a trained captioner from disk and decodes captions
// greedily, one word at a time:
//
//   <start> → step → argmax → word₁ → step → argmax → … → <end>
//
// Each step also yields the attention the decoder paid to the
// GRID × GRID image regions; those weights become the attention
// plots written by the results layer.
//
// A Captioner built without a checkpoint is kept "not ready":
// every generate() call fails with ModelUninitialized instead of
// decoding from random weights.
//
// Reference: Burn Book §6 (Inference)
//            Xu et al. (2015) Show, Attend and Tell

use anyhow::{anyhow, Result};
use burn::{prelude::*, tensor::activation::log_softmax};
use std::path::{Path, PathBuf};
use tokenizers::Tokenizer;

use crate::data::image_features::{load_features, FEATURE_DIM, NUM_REGIONS};
use crate::domain::{caption::GeneratedCaption, error::CaptionError, traits::CaptionGenerator};
use crate::infra::checkpoint::{CheckpointLocation, CheckpointManager};
use crate::infra::tokenizer_store::{TokenizerStore, END_ID, PAD_ID, START_ID, UNK_TOKEN};
use crate::ml::model::CaptionModel;

/// A model whose weights were read from a checkpoint.
pub struct RestoredModel<B: Backend> {
    pub model:     CaptionModel<B>,
    pub tokenizer: Tokenizer,
    pub location:  CheckpointLocation,
}

/// Locate and load the checkpoint managed by `ckpt`.
///
/// Ok(None) means no checkpoint exists. A checkpoint that exists
/// but cannot be read (weights, model config or tokenizer) is an error.
pub fn restore<B: Backend>(ckpt: &CheckpointManager, device: &B::Device) -> Result<Option<RestoredModel<B>>> {
    let Some(location) = ckpt.locate()? else {
        return Ok(None);
    };

    let config    = CheckpointManager::load_config(&location.dir)?;
    let model     = ckpt.load_model(config.init::<B>(device), &location, device)?;
    let tokenizer = TokenizerStore::new(&location.dir).load()?;

    tracing::info!(
        "Restored model from '{}' (epoch {:?}, via {:?})",
        location.stem.display(),
        location.epoch,
        location.source,
    );

    Ok(Some(RestoredModel { model, tokenizer, location }))
}

pub struct Captioner<B: Backend> {
    state:          Option<RestoredModel<B>>,
    checkpoint_dir: PathBuf,
    max_len:        usize,
    device:         B::Device,
}

impl<B: Backend> Captioner<B> {
    pub fn new(
        state:          Option<RestoredModel<B>>,
        checkpoint_dir: impl Into<PathBuf>,
        max_len:        usize,
        device:         B::Device,
    ) -> Self {
        Self { state, checkpoint_dir: checkpoint_dir.into(), max_len, device }
    }

    pub fn is_ready(&self) -> bool {
        self.state.is_some()
    }

    /// The restored model, or ModelUninitialized when there is none.
    pub fn ensure_ready(&self) -> Result<&RestoredModel<B>> {
        self.state
            .as_ref()
            .ok_or_else(|| CaptionError::ModelUninitialized(self.checkpoint_dir.clone()).into())
    }

    /// Greedy decoding from already-extracted region features.
    pub fn decode(&self, restored: &RestoredModel<B>, features: Vec<f32>) -> Result<Decoded> {
        let model   = &restored.model;
        let input   = Tensor::<B, 1>::from_floats(features.as_slice(), &self.device)
            .reshape([1, NUM_REGIONS, FEATURE_DIM]);
        let encoded = model.encode(input);

        let mut hidden  = model.init_hidden(1, &self.device);
        let mut token   = START_ID;
        let mut decoded = Decoded::default();
        let mut log_prob_sum = 0.0f32;
        let mut steps        = 0usize;

        // <start> occupies the first position
        for _ in 1..self.max_len {
            let out = model.step(
                encoded.clone(),
                Tensor::<B, 1, Int>::from_ints([token as i32], &self.device),
                hidden,
            );
            hidden = out.hidden;

            let log_probs = to_vec(log_softmax(out.logits, 1))?;
            let (next, lp) = best_token(&log_probs);
            log_prob_sum += lp;
            steps        += 1;

            if next == END_ID {
                break;
            }

            decoded.ids.push(next);
            decoded.attention.push(to_vec(out.attention)?);
            token = next;
        }

        decoded.mean_log_prob = if steps > 0 { log_prob_sum / steps as f32 } else { 0.0 };
        Ok(decoded)
    }
}

/// Raw output of greedy decoding.
#[derive(Debug, Default)]
pub struct Decoded {
    pub ids:           Vec<u32>,
    pub attention:     Vec<Vec<f32>>,
    pub mean_log_prob: f32,
}

impl<B: Backend> CaptionGenerator for Captioner<B> {
    fn generate(&self, image: &Path) -> Result<GeneratedCaption> {
        let restored = self.ensure_ready()?;
        let decoded  = self.decode(restored, load_features(image)?)?;

        let words = decoded
            .ids
            .iter()
            .map(|&id| restored.tokenizer.id_to_token(id).unwrap_or_else(|| UNK_TOKEN.to_string()))
            .collect();

        Ok(GeneratedCaption {
            image:         image.to_path_buf(),
            words,
            attention:     decoded.attention,
            mean_log_prob: decoded.mean_log_prob,
        })
    }
}

/// Highest-scoring token, never <pad> or <start>.
fn best_token(log_probs: &[f32]) -> (u32, f32) {
    log_probs
        .iter()
        .enumerate()
        .filter(|(id, _)| *id as u32 != PAD_ID && *id as u32 != START_ID)
        .fold((END_ID, f32::NEG_INFINITY), |best, (id, &lp)| {
            if lp > best.1 { (id as u32, lp) } else { best }
        })
}

fn to_vec<B: Backend>(t: Tensor<B, 2>) -> Result<Vec<f32>> {
    t.into_data()
        .convert::<f32>()
        .to_vec::<f32>()
        .map_err(|e| anyhow!("Cannot read tensor data: {e:?}"))
}
