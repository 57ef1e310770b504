//! Fixed sinusoidal positional encoding.

use candle_core::{bail, Device, Result, Tensor};
use candle_nn::Dropout;

/// Deterministic position signal added to token embeddings.
///
/// The `(1, max_length, embed_dim)` table is computed once at construction:
/// for position `i` and channel pair `k`, the base frequency is
/// `w_k = 10000^(-2k / embed_dim)`, channel `2k` holds `sin(i * w_k)` and
/// channel `2k + 1` holds `cos(i * w_k)`. The table is a plain constant,
/// never registered as a trainable parameter.
#[derive(Debug)]
pub struct SinusoidalEncoding {
    table: Tensor,
    dropout: Option<Dropout>,
    embed_dim: usize,
    max_length: usize,
}

impl SinusoidalEncoding {
    pub fn new(
        embed_dim: usize,
        max_length: usize,
        dropout_p: Option<f32>,
        device: &Device,
    ) -> Result<Self> {
        if embed_dim == 0 || max_length == 0 {
            bail!("sinusoidal encoding requires non-zero embed_dim and max_length");
        }
        if embed_dim % 2 != 0 {
            bail!("sinusoidal encoding requires an even channel count, got {embed_dim}");
        }

        let mut data = vec![0f32; max_length * embed_dim];
        for pos in 0..max_length {
            for pair in 0..embed_dim / 2 {
                let freq = 10000f64.powf(-((2 * pair) as f64) / embed_dim as f64);
                let angle = pos as f64 * freq;
                data[pos * embed_dim + 2 * pair] = angle.sin() as f32;
                data[pos * embed_dim + 2 * pair + 1] = angle.cos() as f32;
            }
        }
        let table = Tensor::from_vec(data, (1, max_length, embed_dim), device)?;
        let dropout = dropout_p.filter(|p| *p > 0.0).map(Dropout::new);

        Ok(Self {
            table,
            dropout,
            embed_dim,
            max_length,
        })
    }

    pub fn max_length(&self) -> usize {
        self.max_length
    }

    /// The full `(1, max_length, embed_dim)` encoding table.
    pub fn table(&self) -> &Tensor {
        &self.table
    }

    /// Adds the first `seq` rows of the table to a `(batch, seq, embed_dim)`
    /// tensor, with train-only dropout on the result.
    pub fn forward(&self, xs: &Tensor, train: bool) -> Result<Tensor> {
        let (_batch, seq, dim) = match xs.dims() {
            [batch, seq, dim] => (*batch, *seq, *dim),
            dims => bail!("positional encoding expects (batch, seq, channels), got {dims:?}"),
        };
        if dim != self.embed_dim {
            bail!(
                "positional encoding built for {} channels, input has {dim}",
                self.embed_dim
            );
        }
        if seq > self.max_length {
            bail!(
                "sequence length {seq} exceeds positional table capacity {}",
                self.max_length
            );
        }

        let out = xs.broadcast_add(&self.table.narrow(1, 0, seq)?)?;
        match &self.dropout {
            Some(drop) if train => drop.forward(&out, true),
            _ => Ok(out),
        }
    }
}
