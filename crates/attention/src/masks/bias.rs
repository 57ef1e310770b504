//! Conversion from multiplicative masks to additive softmax biases.

use candle_core::{Result, Tensor};

/// Maps a multiplicative mask to an additive bias of the same shape: `0.0`
/// where the mask permits attention, `f32::NEG_INFINITY` where it forbids it.
///
/// Adding the bias to pre-softmax scores guarantees forbidden positions end
/// up with exactly zero weight: `exp(-inf - max)` is `0.0` under the stable
/// (max-subtracting) softmax.
pub fn to_additive(mask: &Tensor) -> Result<Tensor> {
    let keep = mask.gt(0.0)?;
    let zeros = mask.zeros_like()?;
    let neg_inf = Tensor::full(f32::NEG_INFINITY, mask.dims(), mask.device())?;
    keep.where_cond(&zeros, &neg_inf)
}
