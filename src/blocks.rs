//! Residual/normalize blocks composing one decoder layer.
//!
//! Every block follows the same post-norm discipline:
//! `output = LayerNorm(dropout(branch(input)) + input)`. The residual add
//! happens before normalization; reordering the two changes the gradient
//! behaviour of the stack and is not allowed.

use attention::{Attention, MultiHeadAttention};
use candle_core::{Error, Result, Tensor};
use candle_nn::{layer_norm, linear, Dropout, LayerNorm, Linear, Module, VarBuilder};

use crate::config::DecoderConfig;

fn apply_dropout(dropout: &Option<Dropout>, xs: &Tensor, train: bool) -> Result<Tensor> {
    match dropout {
        Some(drop) if train => drop.forward(xs, true),
        _ => Ok(xs.clone()),
    }
}

/// Self-attention over the decoder's own running sequence, causally masked.
#[derive(Debug)]
pub struct SelfAttentionBlock {
    attn: MultiHeadAttention,
    dropout: Option<Dropout>,
    norm: LayerNorm,
}

impl SelfAttentionBlock {
    pub fn new(config: &DecoderConfig, vb: VarBuilder) -> Result<Self> {
        let attn = MultiHeadAttention::new(
            config.embed_dim,
            config.num_heads,
            config.dropout_p,
            vb.pp("attn"),
        )
        .map_err(|e| Error::Msg(e.to_string()))?;
        let norm = layer_norm(config.embed_dim, 1e-5, vb.pp("norm"))?;
        Ok(Self {
            attn,
            dropout: config.dropout(),
            norm,
        })
    }

    pub fn forward(&self, seq: &Tensor, mask: &Tensor, train: bool) -> Result<Tensor> {
        let attended = self
            .attn
            .compute(seq, seq, seq, Some(mask), train)
            .map_err(|e| Error::Msg(e.to_string()))?;
        let branch = apply_dropout(&self.dropout, &attended, train)?;
        self.norm.forward(&branch.add(seq)?)
    }
}

/// Cross-attention from the running sequence onto the conditioning sequence.
///
/// The conditioning memory has a single position, so every query may attend
/// to it and no mask is involved.
#[derive(Debug)]
pub struct CrossAttentionBlock {
    attn: MultiHeadAttention,
    dropout: Option<Dropout>,
    norm: LayerNorm,
}

impl CrossAttentionBlock {
    pub fn new(config: &DecoderConfig, vb: VarBuilder) -> Result<Self> {
        let attn = MultiHeadAttention::new(
            config.embed_dim,
            config.num_heads,
            config.dropout_p,
            vb.pp("attn"),
        )
        .map_err(|e| Error::Msg(e.to_string()))?;
        let norm = layer_norm(config.embed_dim, 1e-5, vb.pp("norm"))?;
        Ok(Self {
            attn,
            dropout: config.dropout(),
            norm,
        })
    }

    pub fn forward(&self, seq: &Tensor, conditioning: &Tensor, train: bool) -> Result<Tensor> {
        let attended = self
            .attn
            .compute(seq, conditioning, conditioning, None, train)
            .map_err(|e| Error::Msg(e.to_string()))?;
        let branch = apply_dropout(&self.dropout, &attended, train)?;
        self.norm.forward(&branch.add(seq)?)
    }
}

/// Position-wise two-layer MLP with the shared residual/normalize wrapper.
#[derive(Debug)]
pub struct FeedForwardBlock {
    fc_in: Linear,
    fc_out: Linear,
    inner_dropout: Option<Dropout>,
    dropout: Option<Dropout>,
    norm: LayerNorm,
}

impl FeedForwardBlock {
    pub fn new(config: &DecoderConfig, vb: VarBuilder) -> Result<Self> {
        let fc_in = linear(config.embed_dim, config.ff_dim, vb.pp("fc_in"))?;
        let fc_out = linear(config.ff_dim, config.embed_dim, vb.pp("fc_out"))?;
        let norm = layer_norm(config.embed_dim, 1e-5, vb.pp("norm"))?;
        Ok(Self {
            fc_in,
            fc_out,
            inner_dropout: config.dropout(),
            dropout: config.dropout(),
            norm,
        })
    }

    pub fn forward(&self, seq: &Tensor, train: bool) -> Result<Tensor> {
        let hidden = self.fc_in.forward(seq)?.relu()?;
        let hidden = apply_dropout(&self.inner_dropout, &hidden, train)?;
        let projected = self.fc_out.forward(&hidden)?;
        let branch = apply_dropout(&self.dropout, &projected, train)?;
        self.norm.forward(&branch.add(seq)?)
    }
}

/// One decoder layer: self-attention, cross-attention, feed-forward, in that
/// order. Conditioning and mask pass through unchanged.
#[derive(Debug)]
pub struct DecoderLayer {
    self_attn: SelfAttentionBlock,
    cross_attn: CrossAttentionBlock,
    feed_forward: FeedForwardBlock,
}

impl DecoderLayer {
    pub fn new(config: &DecoderConfig, vb: VarBuilder) -> Result<Self> {
        Ok(Self {
            self_attn: SelfAttentionBlock::new(config, vb.pp("self_attn"))?,
            cross_attn: CrossAttentionBlock::new(config, vb.pp("cross_attn"))?,
            feed_forward: FeedForwardBlock::new(config, vb.pp("feed_forward"))?,
        })
    }

    pub fn forward(
        &self,
        seq: &Tensor,
        conditioning: &Tensor,
        mask: &Tensor,
        train: bool,
    ) -> Result<Tensor> {
        let seq = self.self_attn.forward(seq, mask, train)?;
        let seq = self.cross_attn.forward(&seq, conditioning, train)?;
        self.feed_forward.forward(&seq, train)
    }
}
