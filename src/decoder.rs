//! The stacked transformer decoder and its greedy sampling loop.

use std::sync::OnceLock;

use attention::masks::causal_mask;
use candle_core::{bail, Error, Result, Tensor, D};
use candle_nn::{linear, Linear, Module, VarBuilder};
use embedding::{SinusoidalEncoding, TokenEmbedding};

use crate::blocks::DecoderLayer;
use crate::config::DecoderConfig;
use crate::vocab::Vocabulary;

/// Decoder stack mapping `(image feature, token history)` to vocabulary
/// logits, with autoregressive greedy generation on top.
///
/// All learned parameters register through the supplied [`VarBuilder`]; the
/// vocabulary and weights are read-only during forward and sampling.
#[derive(Debug)]
pub struct TransformerDecoder {
    config: DecoderConfig,
    vocab: Vocabulary,
    token_embedding: TokenEmbedding,
    positional: SinusoidalEncoding,
    feature_proj: Linear,
    layers: Vec<DecoderLayer>,
    score_proj: Linear,
    first_call: OnceLock<()>,
}

impl TransformerDecoder {
    pub fn new(vocab: Vocabulary, config: DecoderConfig, vb: VarBuilder) -> Result<Self> {
        config.validate()?;

        let vocab_size = vocab.len();
        let token_embedding = TokenEmbedding::new(
            vocab_size,
            config.embed_dim,
            Some(vocab.null_id()),
            vb.pp("token_embedding"),
        )?;
        let positional = SinusoidalEncoding::new(
            config.embed_dim,
            config.max_length,
            config.dropout_p,
            vb.device(),
        )?;
        let feature_proj = linear(config.feature_dim, config.embed_dim, vb.pp("feature_proj"))?;

        let mut layers = Vec::with_capacity(config.num_layers);
        for index in 0..config.num_layers {
            layers.push(DecoderLayer::new(&config, vb.pp(format!("layers.{index}")))?);
        }

        let score_proj = linear(config.embed_dim, vocab_size, vb.pp("score_proj"))?;

        Ok(Self {
            config,
            vocab,
            token_embedding,
            positional,
            feature_proj,
            layers,
            score_proj,
            first_call: OnceLock::new(),
        })
    }

    pub fn config(&self) -> &DecoderConfig {
        &self.config
    }

    pub fn vocab(&self) -> &Vocabulary {
        &self.vocab
    }

    /// Scores every token position against the vocabulary.
    ///
    /// `features` is `(batch, feature_dim)`, `captions` is `(batch, seq)`
    /// token ids (ground truth during training, the partial caption during
    /// generation). Returns raw logits `(batch, seq, vocab)`; no activation
    /// is applied. Future positions are hidden from each timestep by the
    /// causal mask built fresh per call.
    pub fn forward(&self, features: &Tensor, captions: &Tensor, train: bool) -> Result<Tensor> {
        if self.first_call.set(()).is_ok() {
            log::info!(
                "decoder init vocab_size={} feature_dim={} embed_dim={} heads={} layers={} max_length={}",
                self.vocab.len(),
                self.config.feature_dim,
                self.config.embed_dim,
                self.config.num_heads,
                self.config.num_layers,
                self.config.max_length,
            );
        }

        let (feature_batch, feature_dim) = features.dims2().map_err(|_| {
            Error::Msg(format!(
                "features must be (batch, feature_dim), got {:?}",
                features.dims()
            ))
        })?;
        let (caption_batch, seq_len) = captions.dims2().map_err(|_| {
            Error::Msg(format!(
                "captions must be (batch, seq), got {:?}",
                captions.dims()
            ))
        })?;
        if feature_batch != caption_batch {
            bail!("feature batch {feature_batch} does not match caption batch {caption_batch}");
        }
        if feature_dim != self.config.feature_dim {
            bail!(
                "expected feature width {}, got {feature_dim}",
                self.config.feature_dim
            );
        }

        let embedded = self.token_embedding.forward(captions)?;
        let mut hidden = self.positional.forward(&embedded, train)?;

        // (N, F) -> (N, 1, D): one conditioning slot per batch element.
        let conditioning = self.feature_proj.forward(features)?.unsqueeze(1)?;
        let mask = causal_mask(seq_len, captions.device())?;

        for layer in &self.layers {
            hidden = layer.forward(&hidden, &conditioning, &mask, train)?;
        }

        self.score_proj.forward(&hidden)
    }

    /// Greedily decodes a caption for each image feature.
    ///
    /// Starts from a single `<START>` token per batch element and appends the
    /// arg-max token (ties resolve to the lowest id) for `max_length` steps,
    /// re-running the full forward pass on the growing prefix each time.
    /// There is deliberately no early stopping on an end token: the loop
    /// always runs the whole budget, and the caller truncates. Returns
    /// `(batch, max_length)` token ids; the buffer starts out all-`<NULL>`
    /// and each step overwrites exactly its own column.
    pub fn sample(&self, features: &Tensor, max_length: Option<usize>) -> Result<Tensor> {
        let budget = max_length.unwrap_or(self.config.max_length);
        if budget == 0 {
            bail!("sampling budget must be greater than zero");
        }
        if budget > self.config.max_length {
            bail!(
                "sampling budget {budget} exceeds the configured max_length {}",
                self.config.max_length
            );
        }
        let start_id = self.vocab.start_id().ok_or_else(|| {
            Error::Msg("vocabulary has no <START> token, cannot seed generation".to_string())
        })?;

        let (batch, _) = features.dims2().map_err(|_| {
            Error::Msg(format!(
                "features must be (batch, feature_dim), got {:?}",
                features.dims()
            ))
        })?;
        let device = features.device();

        let mut generated = vec![self.vocab.null_id(); batch * budget];
        let mut partial = Tensor::from_vec(vec![start_id; batch], (batch, 1), device)?;

        for step in 0..budget {
            let logits = self.forward(features, &partial, false)?;
            let prefix_len = logits.dim(1)?;
            let last = logits.narrow(1, prefix_len - 1, 1)?.squeeze(1)?;
            let next = last.argmax(D::Minus1)?;

            for (row, id) in next.to_vec1::<u32>()?.into_iter().enumerate() {
                generated[row * budget + step] = id;
            }
            partial = Tensor::cat(&[&partial, &next.unsqueeze(1)?], 1)?;
        }

        Tensor::from_vec(generated, (batch, budget), device)
    }
}
