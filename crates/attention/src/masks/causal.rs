//! Causal mask construction.

use candle_core::{Device, Result, Tensor};

/// Builds the `(len, len)` causal mask: `mask[i][j] = 1.0` iff `j <= i`.
///
/// Lower-triangular with the diagonal included, so position `i` may attend to
/// itself and every earlier position, never to a later one.
pub fn causal_mask(len: usize, device: &Device) -> Result<Tensor> {
    let mut data = vec![0f32; len * len];
    for i in 0..len {
        for j in 0..=i {
            data[i * len + j] = 1.0;
        }
    }
    Tensor::from_vec(data, (len, len), device)
}
