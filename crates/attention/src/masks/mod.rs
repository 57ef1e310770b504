//! Mask utilities shared by the attention strategies.
//!
//! Masks produced and consumed here are multiplicative `f32` tensors over
//! `(query, key)` positions: `1.0` permits attention, `0.0` forbids it.
//! [`to_additive`] converts a mask to the `0.0 / -inf` bias that is added to
//! pre-softmax scores, which drives forbidden weights to exactly zero after
//! normalisation. Masks are built fresh per forward call and never mutated.

pub mod bias;
pub mod causal;
pub mod validate;

pub use bias::to_additive;
pub use causal::causal_mask;
pub use validate::{ensure_mask_shape, ensure_some_key_visible};
