//! Token embedding table with an optional zero-pinned padding row.

use candle_core::{bail, DType, Result, Tensor};
use candle_nn::init::Init;
use candle_nn::VarBuilder;

/// Learnable `(vocab, hidden)` lookup table.
///
/// The table is registered through the supplied [`VarBuilder`], so an
/// external training procedure reaches it via the owning `VarMap`. When a
/// padding id is configured, that row is multiplied by a constant zero mask
/// on every lookup: it always reads as the zero vector and receives zero
/// gradient, so training never moves it.
#[derive(Debug)]
pub struct TokenEmbedding {
    weight: Tensor,
    padding_mask: Option<Tensor>,
    vocab_size: usize,
    hidden_dim: usize,
}

impl TokenEmbedding {
    pub fn new(
        vocab_size: usize,
        hidden_dim: usize,
        padding_id: Option<u32>,
        vb: VarBuilder,
    ) -> Result<Self> {
        if vocab_size == 0 {
            bail!("token embedding requires vocab_size > 0");
        }
        if hidden_dim == 0 {
            bail!("token embedding requires hidden_dim > 0");
        }
        if let Some(id) = padding_id {
            if id as usize >= vocab_size {
                bail!("padding id {id} is out of range for a vocabulary of {vocab_size}");
            }
        }

        let weight = vb.get_with_hints(
            (vocab_size, hidden_dim),
            "weight",
            Init::Randn {
                mean: 0.0,
                stdev: 1.0,
            },
        )?;
        let padding_mask = match padding_id {
            Some(id) => {
                let mut rows = vec![1f32; vocab_size];
                rows[id as usize] = 0.0;
                Some(Tensor::from_vec(rows, (vocab_size, 1), vb.device())?)
            }
            None => None,
        };

        Ok(Self {
            weight,
            padding_mask,
            vocab_size,
            hidden_dim,
        })
    }

    pub fn vocab_size(&self) -> usize {
        self.vocab_size
    }

    pub fn hidden_dim(&self) -> usize {
        self.hidden_dim
    }

    /// Looks up embeddings for `(batch, seq)` integer token ids, producing a
    /// `(batch, seq, hidden)` tensor.
    pub fn forward(&self, token_ids: &Tensor) -> Result<Tensor> {
        let (batch, seq) = match token_ids.dims() {
            [batch, seq] if *batch > 0 && *seq > 0 => (*batch, *seq),
            dims => bail!("token ids must be (batch, seq) with non-zero dims, got {dims:?}"),
        };
        if !token_ids.dtype().is_int() {
            bail!(
                "token ids expected an integer dtype, got {:?}",
                token_ids.dtype()
            );
        }

        let flat = token_ids.flatten_all()?.to_dtype(DType::I64)?;
        self.ensure_id_range(&flat)?;

        let table = match &self.padding_mask {
            Some(mask) => self.weight.broadcast_mul(mask)?,
            None => self.weight.clone(),
        };
        let gathered = table.index_select(&flat.to_dtype(DType::U32)?, 0)?;
        gathered.reshape((batch, seq, self.hidden_dim))
    }

    fn ensure_id_range(&self, flat_ids: &Tensor) -> Result<()> {
        let min_id = flat_ids.min_all()?.to_scalar::<i64>()?;
        if min_id < 0 {
            bail!("encountered negative token id {min_id}");
        }
        let max_id = flat_ids.max_all()?.to_scalar::<i64>()?;
        if max_id >= self.vocab_size as i64 {
            bail!("token id {max_id} exceeds vocab size {}", self.vocab_size);
        }
        Ok(())
    }
}
