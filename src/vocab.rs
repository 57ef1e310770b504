//! Vocabulary mapping between token strings and integer ids.
//!
//! Construction of the vocabulary itself (corpus scanning, frequency cuts)
//! happens outside this crate; the decoder only needs the finished bijection
//! plus the two distinguished entries. `<NULL>` pads unfilled positions and
//! is mandatory; `<START>` seeds generation and is required before sampling.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Padding token filling unfilled caption positions.
pub const NULL_TOKEN: &str = "<NULL>";
/// Seed token opening every generated caption.
pub const START_TOKEN: &str = "<START>";

pub type Result<T> = std::result::Result<T, VocabError>;

#[derive(Debug, Error)]
pub enum VocabError {
    #[error("vocabulary must contain at least one token")]
    Empty,

    #[error("duplicate token {0:?} in vocabulary")]
    Duplicate(String),

    #[error("vocabulary is missing the required <NULL> entry")]
    MissingNull,
}

/// Bijection between token strings and ids in `[0, V)`.
///
/// Ids are assigned by position in the constructing token list. The mapping
/// is read-only after construction; serde round-trips through the token list
/// alone.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(try_from = "Vec<String>", into = "Vec<String>")]
pub struct Vocabulary {
    token_to_id: HashMap<String, u32>,
    id_to_token: Vec<String>,
    null_id: u32,
    start_id: Option<u32>,
}

impl Vocabulary {
    /// Builds the mapping from an ordered token list, id = list position.
    pub fn from_tokens(tokens: Vec<String>) -> Result<Self> {
        if tokens.is_empty() {
            return Err(VocabError::Empty);
        }

        let mut token_to_id = HashMap::with_capacity(tokens.len());
        for (id, token) in tokens.iter().enumerate() {
            if token_to_id.insert(token.clone(), id as u32).is_some() {
                return Err(VocabError::Duplicate(token.clone()));
            }
        }

        let null_id = *token_to_id.get(NULL_TOKEN).ok_or(VocabError::MissingNull)?;
        let start_id = token_to_id.get(START_TOKEN).copied();

        Ok(Self {
            token_to_id,
            id_to_token: tokens,
            null_id,
            start_id,
        })
    }

    /// Number of distinct tokens, `V`.
    pub fn len(&self) -> usize {
        self.id_to_token.len()
    }

    pub fn is_empty(&self) -> bool {
        self.id_to_token.is_empty()
    }

    pub fn null_id(&self) -> u32 {
        self.null_id
    }

    pub fn start_id(&self) -> Option<u32> {
        self.start_id
    }

    pub fn id_for(&self, token: &str) -> Option<u32> {
        self.token_to_id.get(token).copied()
    }

    pub fn token_for(&self, id: u32) -> Option<&str> {
        self.id_to_token.get(id as usize).map(String::as_str)
    }

    /// Maps generated ids back to token strings, skipping ids outside the
    /// vocabulary. Truncation at an end token is the caller's concern.
    pub fn decode(&self, ids: &[u32]) -> Vec<&str> {
        ids.iter().filter_map(|&id| self.token_for(id)).collect()
    }
}

impl TryFrom<Vec<String>> for Vocabulary {
    type Error = VocabError;

    fn try_from(tokens: Vec<String>) -> Result<Self> {
        Self::from_tokens(tokens)
    }
}

impl From<Vocabulary> for Vec<String> {
    fn from(vocab: Vocabulary) -> Self {
        vocab.id_to_token
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tokens(names: &[&str]) -> Vec<String> {
        names.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn ids_follow_list_order() {
        let vocab = Vocabulary::from_tokens(tokens(&["<NULL>", "<START>", "a", "b"])).unwrap();
        assert_eq!(vocab.len(), 4);
        assert_eq!(vocab.null_id(), 0);
        assert_eq!(vocab.start_id(), Some(1));
        assert_eq!(vocab.id_for("b"), Some(3));
        assert_eq!(vocab.token_for(2), Some("a"));
    }

    #[test]
    fn missing_null_is_rejected() {
        let err = Vocabulary::from_tokens(tokens(&["<START>", "a"])).unwrap_err();
        assert!(matches!(err, VocabError::MissingNull));
    }

    #[test]
    fn duplicates_are_rejected() {
        let err = Vocabulary::from_tokens(tokens(&["<NULL>", "a", "a"])).unwrap_err();
        assert!(matches!(err, VocabError::Duplicate(_)));
    }

    #[test]
    fn start_token_is_optional_at_construction() {
        let vocab = Vocabulary::from_tokens(tokens(&["<NULL>", "a"])).unwrap();
        assert_eq!(vocab.start_id(), None);
    }

    #[test]
    fn decode_maps_ids_and_skips_unknowns() {
        let vocab = Vocabulary::from_tokens(tokens(&["<NULL>", "<START>", "dog", "park"])).unwrap();
        assert_eq!(vocab.decode(&[2, 3, 99]), vec!["dog", "park"]);
    }

    #[test]
    fn serde_round_trips_through_the_token_list() {
        let vocab = Vocabulary::from_tokens(tokens(&["<NULL>", "<START>", "a"])).unwrap();
        let json = serde_json::to_string(&vocab).unwrap();
        assert_eq!(json, r#"["<NULL>","<START>","a"]"#);

        let back: Vocabulary = serde_json::from_str(&json).unwrap();
        assert_eq!(back.len(), 3);
        assert_eq!(back.null_id(), 0);
        assert_eq!(back.start_id(), Some(1));
    }
}
