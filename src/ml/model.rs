// ============================================================
// Layer 5 — Attention Caption Model (Burn)
// ============================================================
// A compact "show, attend and tell" style captioner:
//
//   region features [b, R, F]
//       │  encoder: Linear + ReLU
//       ▼
//   encoded regions [b, R, E]
//       │
//       │   ┌────────────── per decoding step ──────────────┐
//       │   │ attention: score_r = v · tanh(W_k e_r + W_q h) │
//       ├──►│ weights  = softmax over regions                │
//       │   │ context  = Σ weights_r · e_r                   │
//       │   │ h'       = tanh(W_x [embed(token); context]    │
//       │   │                 + W_h h)                       │
//       │   │ logits   = W_o dropout(h')                     │
//       │   └────────────────────────────────────────────────┘
//
// Training uses teacher forcing over the padded token sequence;
// the loss ignores <pad> targets.
//
// Reference: Burn Book §3 (Building Blocks)
//            Xu et al. (2015) Show, Attend and Tell

use burn::{
    nn::{
        loss::CrossEntropyLossConfig,
        Dropout, DropoutConfig,
        Embedding, EmbeddingConfig,
        Linear, LinearConfig,
    },
    prelude::*,
    tensor::activation::{relu, softmax},
};

use crate::infra::tokenizer_store::PAD_ID;

// NOTE: #[derive(Config)] already generates Clone and Serialize/Deserialize.
#[derive(Config, Debug)]
pub struct CaptionModelConfig {
    pub vocab_size:    usize,
    pub feature_dim:   usize,
    pub embed_dim:     usize,
    pub hidden_dim:    usize,
    pub attention_dim: usize,
    pub dropout:       f64,
}

impl CaptionModelConfig {
    pub fn init<B: Backend>(&self, device: &B::Device) -> CaptionModel<B> {
        CaptionModel {
            encoder:       LinearConfig::new(self.feature_dim, self.embed_dim).init(device),
            embedding:     EmbeddingConfig::new(self.vocab_size, self.embed_dim).init(device),
            attn_keys:     LinearConfig::new(self.embed_dim, self.attention_dim).init(device),
            attn_query:    LinearConfig::new(self.hidden_dim, self.attention_dim).init(device),
            attn_score:    LinearConfig::new(self.attention_dim, 1).init(device),
            cell_input:    LinearConfig::new(self.embed_dim * 2, self.hidden_dim).init(device),
            cell_hidden:   LinearConfig::new(self.hidden_dim, self.hidden_dim).init(device),
            output:        LinearConfig::new(self.hidden_dim, self.vocab_size).init(device),
            dropout:       DropoutConfig::new(self.dropout).init(),
            hidden_dim:    self.hidden_dim,
        }
    }
}

#[derive(Module, Debug)]
pub struct CaptionModel<B: Backend> {
    pub encoder:     Linear<B>,
    pub embedding:   Embedding<B>,
    pub attn_keys:   Linear<B>,
    pub attn_query:  Linear<B>,
    pub attn_score:  Linear<B>,
    pub cell_input:  Linear<B>,
    pub cell_hidden: Linear<B>,
    pub output:      Linear<B>,
    pub dropout:     Dropout,
    pub hidden_dim:  usize,
}

/// Result of one decoding step.
pub struct DecoderStep<B: Backend> {
    /// Vocabulary logits — [batch, vocab]
    pub logits: Tensor<B, 2>,
    /// New recurrent state — [batch, hidden]
    pub hidden: Tensor<B, 2>,
    /// Attention over image regions — [batch, regions]
    pub attention: Tensor<B, 2>,
}

impl<B: Backend> CaptionModel<B> {
    /// [batch, regions, feature_dim] → [batch, regions, embed_dim]
    pub fn encode(&self, features: Tensor<B, 3>) -> Tensor<B, 3> {
        relu(self.encoder.forward(features))
    }

    /// Shape of every weight matrix, in field order.
    pub fn param_shapes(&self) -> Vec<(&'static str, [usize; 2])> {
        vec![
            ("encoder",     self.encoder.weight.val().dims()),
            ("embedding",   self.embedding.weight.val().dims()),
            ("attn_keys",   self.attn_keys.weight.val().dims()),
            ("attn_query",  self.attn_query.weight.val().dims()),
            ("attn_score",  self.attn_score.weight.val().dims()),
            ("cell_input",  self.cell_input.weight.val().dims()),
            ("cell_hidden", self.cell_hidden.weight.val().dims()),
            ("output",      self.output.weight.val().dims()),
        ]
    }

    pub fn init_hidden(&self, batch_size: usize, device: &B::Device) -> Tensor<B, 2> {
        Tensor::zeros([batch_size, self.hidden_dim], device)
    }

    /// Additive attention: returns (context [b, E], weights [b, R]).
    fn attend(&self, encoded: Tensor<B, 3>, hidden: Tensor<B, 2>) -> (Tensor<B, 2>, Tensor<B, 2>) {
        let [batch_size, regions, embed_dim] = encoded.dims();

        let keys   = self.attn_keys.forward(encoded.clone());               // [b, R, A]
        let query  = self.attn_query.forward(hidden).unsqueeze_dim::<3>(1); // [b, 1, A]
        let scores = self.attn_score.forward((keys + query).tanh());        // [b, R, 1]
        let weights = softmax(scores, 1);

        let context = (weights.clone() * encoded)
            .sum_dim(1)
            .reshape([batch_size, embed_dim]);

        (context, weights.reshape([batch_size, regions]))
    }

    /// Advance the decoder by one token.
    pub fn step(
        &self,
        encoded: Tensor<B, 3>,
        token:   Tensor<B, 1, Int>,
        hidden:  Tensor<B, 2>,
    ) -> DecoderStep<B> {
        let [batch_size] = token.dims();
        let [_, _, embed_dim] = encoded.dims();

        let embedded = self
            .embedding
            .forward(token.unsqueeze_dim::<2>(1))
            .reshape([batch_size, embed_dim]);

        let (context, attention) = self.attend(encoded, hidden.clone());

        let x      = Tensor::cat(vec![embedded, context], 1);
        let hidden = (self.cell_input.forward(x) + self.cell_hidden.forward(hidden)).tanh();
        let logits = self.output.forward(self.dropout.forward(hidden.clone()));

        DecoderStep { logits, hidden, attention }
    }

    /// Teacher-forced cross-entropy over a padded batch.
    ///
    /// tokens: [batch, seq_len] with seq_len >= 2; position t predicts t + 1.
    pub fn forward_loss(&self, features: Tensor<B, 3>, tokens: Tensor<B, 2, Int>) -> Tensor<B, 1> {
        let [batch_size, seq_len] = tokens.dims();
        let device  = features.device();
        let encoded = self.encode(features);

        let mut hidden  = self.init_hidden(batch_size, &device);
        let mut logits  = Vec::with_capacity(seq_len - 1);
        let mut targets = Vec::with_capacity(seq_len - 1);

        for t in 0..seq_len - 1 {
            let input = tokens
                .clone()
                .slice([0..batch_size, t..t + 1])
                .reshape([batch_size]);
            let target = tokens
                .clone()
                .slice([0..batch_size, t + 1..t + 2])
                .reshape([batch_size]);

            let out = self.step(encoded.clone(), input, hidden);
            hidden = out.hidden;
            logits.push(out.logits);
            targets.push(target);
        }

        CrossEntropyLossConfig::new()
            .with_pad_tokens(Some(vec![PAD_ID as usize]))
            .init(&device)
            .forward(Tensor::cat(logits, 0), Tensor::cat(targets, 0))
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::data::image_features::{FEATURE_DIM, NUM_REGIONS};
    use burn::backend::NdArray;

    pub(crate) fn tiny_config(vocab_size: usize) -> CaptionModelConfig {
        CaptionModelConfig::new(vocab_size, FEATURE_DIM, 8, 8, 8, 0.0)
    }

    #[test]
    fn test_step_shapes_and_attention_sums_to_one() {
        let device = Default::default();
        let model: CaptionModel<NdArray> = tiny_config(12).init(&device);

        let features = Tensor::<NdArray, 3>::ones([2, NUM_REGIONS, FEATURE_DIM], &device);
        let encoded  = model.encode(features);
        let hidden   = model.init_hidden(2, &device);
        let token    = Tensor::<NdArray, 1, Int>::from_ints([2, 5], &device);

        let out = model.step(encoded, token, hidden);
        assert_eq!(out.logits.dims(), [2, 12]);
        assert_eq!(out.hidden.dims(), [2, 8]);
        assert_eq!(out.attention.dims(), [2, NUM_REGIONS]);

        let sums: Vec<f32> = out
            .attention
            .sum_dim(1)
            .into_data()
            .convert::<f32>()
            .to_vec()
            .unwrap();
        assert!(sums.iter().all(|s| (s - 1.0).abs() < 1e-4));
    }

    #[test]
    fn test_loss_is_finite() {
        let device = Default::default();
        let model: CaptionModel<NdArray> = tiny_config(12).init(&device);

        let features = Tensor::<NdArray, 3>::zeros([2, NUM_REGIONS, FEATURE_DIM], &device);
        let tokens = Tensor::<NdArray, 1, Int>::from_ints([2, 4, 5, 3, 2, 6, 3, 0], &device)
            .reshape([2, 4]);

        let loss: f32 = model.forward_loss(features, tokens).into_scalar().elem();
        assert!(loss.is_finite());
        assert!(loss > 0.0);
    }
}
