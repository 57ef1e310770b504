//! Multi-head scaled dot-product attention, the production strategy.

use std::sync::OnceLock;

use candle_core::Tensor;
use candle_nn::ops::softmax_last_dim;
use candle_nn::{linear, Dropout, Linear, Module, VarBuilder};

use crate::core::{validate_inputs, Attention, AttentionError};
use crate::masks;

/// Attention computed independently over `num_heads` parallel subspaces.
///
/// The projected query/key/value tensors are reshaped from `(N, S, D)` to
/// `(N, H, S, D/H)`, scored per head with `1/sqrt(head_dim)` scaling, and the
/// concatenated head outputs pass through one more learned `D -> D`
/// projection. `embed_dim` must be divisible by `num_heads`; a violation is a
/// construction-time error.
#[derive(Debug)]
pub struct MultiHeadAttention {
    query_proj: Linear,
    key_proj: Linear,
    value_proj: Linear,
    head_proj: Linear,
    dropout: Option<Dropout>,
    embed_dim: usize,
    num_heads: usize,
    head_dim: usize,
    scale: f64,
    first_call: OnceLock<()>,
}

impl MultiHeadAttention {
    pub fn new(
        embed_dim: usize,
        num_heads: usize,
        dropout_p: Option<f32>,
        vb: VarBuilder,
    ) -> Result<Self, AttentionError> {
        if embed_dim == 0 || num_heads == 0 {
            return Err(AttentionError::InvalidConfig {
                context: format!(
                    "embed_dim ({embed_dim}) and num_heads ({num_heads}) must be non-zero"
                ),
            });
        }
        if embed_dim % num_heads != 0 {
            return Err(AttentionError::InvalidConfig {
                context: format!(
                    "embed_dim ({embed_dim}) must be divisible by num_heads ({num_heads})"
                ),
            });
        }
        if let Some(p) = dropout_p {
            if !(0.0..1.0).contains(&p) {
                return Err(AttentionError::InvalidConfig {
                    context: format!("dropout probability must be in [0, 1), got {p}"),
                });
            }
        }

        let head_dim = embed_dim / num_heads;
        let query_proj = linear(embed_dim, embed_dim, vb.pp("query_proj"))?;
        let key_proj = linear(embed_dim, embed_dim, vb.pp("key_proj"))?;
        let value_proj = linear(embed_dim, embed_dim, vb.pp("value_proj"))?;
        let head_proj = linear(embed_dim, embed_dim, vb.pp("head_proj"))?;
        let dropout = dropout_p.filter(|p| *p > 0.0).map(Dropout::new);
        let scale = 1.0 / (head_dim as f64).sqrt();

        Ok(Self {
            query_proj,
            key_proj,
            value_proj,
            head_proj,
            dropout,
            embed_dim,
            num_heads,
            head_dim,
            scale,
            first_call: OnceLock::new(),
        })
    }

    pub fn num_heads(&self) -> usize {
        self.num_heads
    }

    /// `(N, S, D) -> (N, H, S, D/H)`
    fn split_heads(&self, tensor: &Tensor, batch: usize, seq: usize) -> candle_core::Result<Tensor> {
        tensor
            .reshape((batch, seq, self.num_heads, self.head_dim))?
            .transpose(1, 2)?
            .contiguous()
    }
}

impl Attention for MultiHeadAttention {
    fn compute(
        &self,
        query: &Tensor,
        key: &Tensor,
        value: &Tensor,
        mask: Option<&Tensor>,
        train: bool,
    ) -> Result<Tensor, AttentionError> {
        if self.first_call.set(()).is_ok() {
            log::info!(
                "attention init embed_dim={} num_heads={} head_dim={} dropout={}",
                self.embed_dim,
                self.num_heads,
                self.head_dim,
                if self.dropout.is_some() { "enabled" } else { "off" },
            );
        }

        let (batch, q_len, k_len) = validate_inputs(query, key, value, self.embed_dim)?;

        let q = self.split_heads(&self.query_proj.forward(query)?, batch, q_len)?;
        let k = self.split_heads(&self.key_proj.forward(key)?, batch, k_len)?;
        let v = self.split_heads(&self.value_proj.forward(value)?, batch, k_len)?;

        // (N, H, S, D/H) x (N, H, D/H, T) -> (N, H, S, T)
        let scores = q
            .matmul(&k.transpose(2, 3)?.contiguous()?)?
            .affine(self.scale, 0.0)?;

        let scores = match mask {
            Some(mask) => {
                masks::ensure_mask_shape(mask, q_len, k_len)?;
                masks::ensure_some_key_visible(mask)?;
                let bias = masks::to_additive(mask)?;
                // Broadcast over batch and heads.
                let bias = if bias.dims().len() == 2 {
                    bias.unsqueeze(0)?.unsqueeze(0)?
                } else {
                    bias.unsqueeze(1)?
                };
                scores.broadcast_add(&bias)?
            }
            None => scores,
        };

        let weights = softmax_last_dim(&scores)?;
        let weights = match &self.dropout {
            Some(drop) if train => drop.forward(&weights, true)?,
            _ => weights,
        };

        // (N, H, S, T) x (N, H, T, D/H) -> (N, H, S, D/H)
        let context = weights.matmul(&v)?;
        let merged = context
            .transpose(1, 2)?
            .contiguous()?
            .reshape((batch, q_len, self.embed_dim))?;

        Ok(self.head_proj.forward(&merged)?)
    }
}
