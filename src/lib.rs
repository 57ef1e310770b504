//! Image-conditioned transformer decoder with greedy caption generation.
//!
//! The decoder turns a fixed-size image feature plus a token history into a
//! distribution over a fixed vocabulary, and can autoregressively emit a full
//! caption from the feature alone. Attention strategies and mask utilities
//! live in the `attention` crate; the learned token table and the sinusoidal
//! position signal live in the `embedding` crate. This crate assembles them:
//! the vocabulary mapping, the residual/normalize blocks, the decoder layer
//! stack, and the greedy sampling loop.
//!
//! Training is an external concern. All learned parameters are registered
//! through the caller's [`candle_nn::VarBuilder`], logits are raw scores for
//! an external loss, and generated ids are mapped back to token strings by
//! the caller through [`Vocabulary`].

pub mod blocks;
pub mod config;
pub mod decoder;
pub mod vocab;

pub use config::DecoderConfig;
pub use decoder::TransformerDecoder;
pub use vocab::{VocabError, Vocabulary, NULL_TOKEN, START_TOKEN};
