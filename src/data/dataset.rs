// ============================================================
// Layer 4 — Caption Dataset
// ============================================================
// Builds the flat (caption, image) training pairs and wraps the
// tokenised result in Burn's Dataset trait.
//
//   CaptionMapping
//       │  flatten_captions: one row per caption, <start>/<end> added,
//       │  optionally limited to the first `train_limit` images
//       ▼
//   (Vec<caption>, Vec<image path>)
//       │  build_samples: tokenise + pad, load image features once
//       ▼
//   Vec<CaptionSample> → CaptionDataset
//
// Reference: Burn Book §4 (Datasets)

use anyhow::Result;
use burn::data::dataset::Dataset;
use serde::{Deserialize, Serialize};
use std::{collections::HashMap, path::PathBuf};
use tokenizers::Tokenizer;

use crate::data::{image_features::load_features, preprocessor::Preprocessor};
use crate::domain::caption::CaptionMapping;
use crate::infra::tokenizer_store::{END_ID, PAD_ID};

/// One training pair: image region features and a padded token sequence.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CaptionSample {
    /// NUM_REGIONS × FEATURE_DIM, flattened
    pub features: Vec<f32>,
    /// <start> w1 … wn <end> <pad>…, exactly max_caption_len long
    pub tokens: Vec<u32>,
}

impl CaptionSample {
    /// Number of tokens before padding.
    pub fn caption_len(&self) -> usize {
        self.tokens.iter().take_while(|&&t| t != PAD_ID).count()
    }
}

pub struct CaptionDataset {
    samples: Vec<CaptionSample>,
}

impl CaptionDataset {
    pub fn new(samples: Vec<CaptionSample>) -> Self { Self { samples } }

    pub fn sample_count(&self) -> usize { self.samples.len() }
}

impl Dataset<CaptionSample> for CaptionDataset {
    fn get(&self, index: usize) -> Option<CaptionSample> {
        self.samples.get(index).cloned()
    }

    fn len(&self) -> usize {
        self.samples.len()
    }
}

/// Build the flat caption list and the matching image list.
///
/// Images are visited in sorted order; with `train_limit = Some(n)`
/// and n > 0 only the first n images are used. Images without
/// captions contribute nothing. Every caption is cleaned and wrapped
/// in <start> / <end>, and its image path is repeated alongside.
pub fn flatten_captions(
    mapping:     &CaptionMapping,
    train_limit: Option<usize>,
    prep:        &Preprocessor,
) -> (Vec<String>, Vec<PathBuf>) {
    let limit = match train_limit {
        Some(n) if n > 0 => n,
        _ => usize::MAX,
    };

    let mut captions = Vec::new();
    let mut images   = Vec::new();

    for (image, caps) in mapping.iter().take(limit) {
        for cap in caps {
            captions.push(prep.wrap(cap));
            images.push(image.clone());
        }
    }

    (captions, images)
}

/// Tokenise captions and attach image features.
///
/// Sequences longer than `max_len` are cut and still end in <end>.
/// Features are decoded once per image; images that fail to decode
/// are logged and their captions skipped.
pub fn build_samples(
    captions:  &[String],
    images:    &[PathBuf],
    tokenizer: &Tokenizer,
    max_len:   usize,
) -> Result<Vec<CaptionSample>> {
    let mut cache: HashMap<&PathBuf, Option<Vec<f32>>> = HashMap::new();
    let mut samples = Vec::with_capacity(captions.len());

    for (caption, image) in captions.iter().zip(images) {
        let features = cache.entry(image).or_insert_with(|| match load_features(image) {
            Ok(f) => Some(f),
            Err(e) => {
                tracing::warn!("Skipping image '{}': {:#}", image.display(), e);
                None
            }
        });
        let Some(features) = features else { continue };

        let enc = tokenizer
            .encode(caption.as_str(), false)
            .map_err(|e| anyhow::anyhow!("Tokenisation error: {e}"))?;
        let mut tokens: Vec<u32> = enc.get_ids().to_vec();

        if tokens.len() > max_len {
            tokens.truncate(max_len);
            if let Some(last) = tokens.last_mut() {
                *last = END_ID;
            }
        }
        tokens.resize(max_len, PAD_ID);

        samples.push(CaptionSample { features: features.clone(), tokens });
    }

    Ok(samples)
}
