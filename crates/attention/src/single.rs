//! Single-head scaled dot-product attention.

use candle_core::Tensor;
use candle_nn::ops::softmax_last_dim;
use candle_nn::{linear, Dropout, Linear, Module, VarBuilder};

use crate::core::{validate_inputs, Attention, AttentionError};
use crate::masks;

/// Attention over one undivided subspace, scored with `1/sqrt(embed_dim)`.
///
/// Production blocks use [`MultiHeadAttention`](crate::MultiHeadAttention);
/// this variant keeps the arithmetic easy to follow when a test needs to pin
/// down attention behaviour in isolation.
#[derive(Debug)]
pub struct SingleHeadAttention {
    query_proj: Linear,
    key_proj: Linear,
    value_proj: Linear,
    dropout: Option<Dropout>,
    embed_dim: usize,
    scale: f64,
}

impl SingleHeadAttention {
    pub fn new(
        embed_dim: usize,
        dropout_p: Option<f32>,
        vb: VarBuilder,
    ) -> Result<Self, AttentionError> {
        if embed_dim == 0 {
            return Err(AttentionError::InvalidConfig {
                context: "embed_dim must be non-zero".to_string(),
            });
        }
        if let Some(p) = dropout_p {
            if !(0.0..1.0).contains(&p) {
                return Err(AttentionError::InvalidConfig {
                    context: format!("dropout probability must be in [0, 1), got {p}"),
                });
            }
        }

        let query_proj = linear(embed_dim, embed_dim, vb.pp("query_proj"))?;
        let key_proj = linear(embed_dim, embed_dim, vb.pp("key_proj"))?;
        let value_proj = linear(embed_dim, embed_dim, vb.pp("value_proj"))?;
        let dropout = dropout_p.filter(|p| *p > 0.0).map(Dropout::new);
        let scale = 1.0 / (embed_dim as f64).sqrt();

        Ok(Self {
            query_proj,
            key_proj,
            value_proj,
            dropout,
            embed_dim,
            scale,
        })
    }
}

impl Attention for SingleHeadAttention {
    fn compute(
        &self,
        query: &Tensor,
        key: &Tensor,
        value: &Tensor,
        mask: Option<&Tensor>,
        train: bool,
    ) -> Result<Tensor, AttentionError> {
        let (_batch, q_len, k_len) = validate_inputs(query, key, value, self.embed_dim)?;

        let q = self.query_proj.forward(query)?;
        let k = self.key_proj.forward(key)?;
        let v = self.value_proj.forward(value)?;

        // (N, S, D) x (N, D, T) -> (N, S, T)
        let scores = q
            .matmul(&k.transpose(1, 2)?.contiguous()?)?
            .affine(self.scale, 0.0)?;

        let scores = match mask {
            Some(mask) => {
                masks::ensure_mask_shape(mask, q_len, k_len)?;
                masks::ensure_some_key_visible(mask)?;
                let bias = to_additive_broadcast(mask)?;
                scores.broadcast_add(&bias)?
            }
            None => scores,
        };

        let weights = softmax_last_dim(&scores)?;
        let weights = match &self.dropout {
            Some(drop) if train => drop.forward(&weights, true)?,
            _ => weights,
        };

        Ok(weights.matmul(&v)?)
    }
}

fn to_additive_broadcast(mask: &Tensor) -> Result<Tensor, AttentionError> {
    let bias = masks::to_additive(mask)?;
    let bias = if bias.dims().len() == 2 {
        bias.unsqueeze(0)?
    } else {
        bias
    };
    Ok(bias)
}
