//! Mask validation applied before any numeric work.

use candle_core::Tensor;

use crate::core::AttentionError;

/// Checks the mask is `(q_len, k_len)` or `(batch, q_len, k_len)`.
pub fn ensure_mask_shape(
    mask: &Tensor,
    q_len: usize,
    k_len: usize,
) -> Result<(), AttentionError> {
    match mask.dims() {
        [q, k] | [_, q, k] if *q == q_len && *k == k_len => Ok(()),
        dims => Err(AttentionError::InvalidMask {
            context: format!(
                "mask must be ({q_len}, {k_len}) or (batch, {q_len}, {k_len}), got {dims:?}"
            ),
        }),
    }
}

/// Rejects masks where some query position has every key forbidden.
///
/// Softmax over an all-forbidden row has no defined result, so such masks
/// fail fast here instead of surfacing as NaN in the attention output.
pub fn ensure_some_key_visible(mask: &Tensor) -> Result<(), AttentionError> {
    let (rows, k_len) = match mask.dims() {
        [q, k] => (*q, *k),
        [b, q, k] => (b * q, *k),
        dims => {
            return Err(AttentionError::InvalidMask {
                context: format!("mask must be rank 2 or 3, got {dims:?}"),
            })
        }
    };
    let values = mask.flatten_all()?.to_vec1::<f32>()?;
    for row in 0..rows {
        let keys = &values[row * k_len..(row + 1) * k_len];
        if keys.iter().all(|v| *v <= 0.0) {
            return Err(AttentionError::InvalidMask {
                context: format!("mask forbids every key for query row {row}"),
            });
        }
    }
    Ok(())
}
