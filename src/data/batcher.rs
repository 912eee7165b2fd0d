// ============================================================
// Layer 4 — Caption Batcher
// ============================================================
// Implements Burn's Batcher trait to stack CaptionSamples into
// the two tensors the model consumes:
//
//   features: [batch, NUM_REGIONS, FEATURE_DIM]   (Float)
//   tokens:   [batch, max_caption_len]            (Int)
//
// Samples are pre-padded to the same length, so batching is a
// flatten followed by a reshape.
//
// Reference: Burn Book §4 (Batcher)

use burn::{data::dataloader::batcher::Batcher, prelude::*};

use crate::data::dataset::CaptionSample;
use crate::data::image_features::{FEATURE_DIM, NUM_REGIONS};

#[derive(Debug, Clone)]
pub struct CaptionBatch<B: Backend> {
    /// Region features — shape: [batch, NUM_REGIONS, FEATURE_DIM]
    pub features: Tensor<B, 3>,

    /// Token ids — shape: [batch, seq_len]
    pub tokens: Tensor<B, 2, Int>,
}

#[derive(Clone, Debug, Default)]
pub struct CaptionBatcher;

impl<B: Backend> Batcher<B, CaptionSample, CaptionBatch<B>> for CaptionBatcher {
    fn batch(&self, items: Vec<CaptionSample>, device: &B::Device) -> CaptionBatch<B> {
        let batch_size = items.len();
        let seq_len    = items[0].tokens.len();

        let features_flat: Vec<f32> = items
            .iter()
            .flat_map(|s| s.features.iter().copied())
            .collect();

        let tokens_flat: Vec<i32> = items
            .iter()
            .flat_map(|s| s.tokens.iter().map(|&t| t as i32))
            .collect();

        let features = Tensor::<B, 1>::from_floats(features_flat.as_slice(), device)
            .reshape([batch_size, NUM_REGIONS, FEATURE_DIM]);

        let tokens = Tensor::<B, 1, Int>::from_ints(tokens_flat.as_slice(), device)
            .reshape([batch_size, seq_len]);

        CaptionBatch { features, tokens }
    }
}
