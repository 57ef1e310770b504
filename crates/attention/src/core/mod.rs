//! Core trait and validation shared across attention implementations.

pub mod errors;

use candle_core::Tensor;

pub use errors::AttentionError;

/// Unified interface over the attention strategies.
///
/// * `query` is shaped `(batch, q_len, embed)`; `key` and `value` share the
///   shape `(batch, k_len, embed)` and must be equal to each other.
/// * `mask`, when present, is a multiplicative tensor over `(q_len, k_len)`
///   positions (optionally with a leading batch axis): `1.0` permits
///   attention, `0.0` forbids it.
/// * The output mirrors the query layout `(batch, q_len, embed)`.
/// * Dropout on the attention weights is applied only when `train` is set.
pub trait Attention {
    fn compute(
        &self,
        query: &Tensor,
        key: &Tensor,
        value: &Tensor,
        mask: Option<&Tensor>,
        train: bool,
    ) -> Result<Tensor, AttentionError>;
}

/// Checks the query/key/value shape contract and returns `(batch, q_len, k_len)`.
pub(crate) fn validate_inputs(
    query: &Tensor,
    key: &Tensor,
    value: &Tensor,
    embed_dim: usize,
) -> Result<(usize, usize, usize), AttentionError> {
    let (batch, q_len, q_dim) = query.dims3().map_err(|_| AttentionError::InvalidShape {
        context: format!("query must be (batch, seq, embed), got {:?}", query.dims()),
    })?;
    let (k_batch, k_len, k_dim) = key.dims3().map_err(|_| AttentionError::InvalidShape {
        context: format!("key must be (batch, seq, embed), got {:?}", key.dims()),
    })?;
    if value.dims() != key.dims() {
        return Err(AttentionError::InvalidShape {
            context: format!(
                "key and value must share a shape, got {:?} and {:?}",
                key.dims(),
                value.dims()
            ),
        });
    }
    if k_batch != batch {
        return Err(AttentionError::InvalidShape {
            context: format!("query batch {batch} does not match key/value batch {k_batch}"),
        });
    }
    if q_dim != embed_dim || k_dim != embed_dim {
        return Err(AttentionError::InvalidShape {
            context: format!(
                "expected embedding width {embed_dim}, got query {q_dim} and key {k_dim}"
            ),
        });
    }
    Ok((batch, q_len, k_len))
}
