//! Decoder configuration and structural validation.

use candle_core::{bail, Result};
use candle_nn::Dropout;

/// High-level configuration for assembling the caption decoder.
#[derive(Debug, Clone)]
pub struct DecoderConfig {
    /// Dimensionality of the incoming image feature vectors.
    pub feature_dim: usize,
    /// Embedding width shared by every stage of the decoder.
    pub embed_dim: usize,
    /// Number of attention heads; must evenly divide `embed_dim`.
    pub num_heads: usize,
    /// Number of stacked decoder layers.
    pub num_layers: usize,
    /// Hidden width of the position-wise feed-forward network.
    pub ff_dim: usize,
    /// Maximum sequence length, bounding both the positional table and the
    /// greedy sampling budget.
    pub max_length: usize,
    /// Dropout probability applied throughout the decoder during training.
    pub dropout_p: Option<f32>,
}

impl DecoderConfig {
    /// Builds a configuration with the conventional feed-forward width and
    /// dropout rate.
    pub fn new(
        feature_dim: usize,
        embed_dim: usize,
        num_heads: usize,
        num_layers: usize,
        max_length: usize,
    ) -> Self {
        Self {
            feature_dim,
            embed_dim,
            num_heads,
            num_layers,
            ff_dim: 2048,
            max_length,
            dropout_p: Some(0.1),
        }
    }

    /// Validates structural invariants. Violations are configuration errors
    /// and fail here rather than degrading downstream.
    pub fn validate(&self) -> Result<()> {
        if self.feature_dim == 0 {
            bail!("feature_dim must be greater than zero");
        }
        if self.embed_dim == 0 {
            bail!("embed_dim must be greater than zero");
        }
        if self.num_heads == 0 {
            bail!("num_heads must be greater than zero");
        }
        if self.embed_dim % self.num_heads != 0 {
            bail!(
                "embed_dim ({}) must be divisible by num_heads ({})",
                self.embed_dim,
                self.num_heads
            );
        }
        if self.num_layers == 0 {
            bail!("num_layers must be greater than zero");
        }
        if self.ff_dim == 0 {
            bail!("ff_dim must be greater than zero");
        }
        if self.max_length == 0 {
            bail!("max_length must be greater than zero");
        }
        if let Some(p) = self.dropout_p {
            if !(0.0..1.0).contains(&p) {
                bail!("dropout_p must be in [0, 1), got {p}");
            }
        }
        Ok(())
    }

    pub(crate) fn dropout(&self) -> Option<Dropout> {
        self.dropout_p.filter(|p| *p > 0.0).map(Dropout::new)
    }
}
