//! Pluggable per-object transforms.
//!
//! The pipeline treats a transform as opaque: bytes in, bytes out, or a
//! [`TransformError`] that is recorded against the object's key.

use std::sync::Mutex;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde_json::Value;
use thiserror::Error;

pub const BASE_WORDS_FIELD: &str = "base_words";
pub const TOKEN_LENGTH: usize = 2;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransformError {
    #[error("payload is not valid JSON: {message}")]
    InvalidJson { message: String },

    #[error("failed to serialize transformed payload: {message}")]
    Serialization { message: String },

    #[error("random source unavailable: {message}")]
    RandomSource { message: String },

    #[error("{message}")]
    Rejected { message: String },
}

impl TransformError {
    pub fn rejected(message: impl Into<String>) -> Self {
        Self::Rejected {
            message: message.into(),
        }
    }
}

pub trait ObjectTransform: Send + Sync {
    fn transform(&self, payload: &[u8]) -> Result<Vec<u8>, TransformError>;
}

impl<F> ObjectTransform for F
where
    F: Fn(&[u8]) -> Result<Vec<u8>, TransformError> + Send + Sync,
{
    fn transform(&self, payload: &[u8]) -> Result<Vec<u8>, TransformError> {
        self(payload)
    }
}

/// Appends a random lowercase token to a document's `base_words` list.
///
/// Documents whose `base_words` is missing or not a list are passed through
/// byte-for-byte.
#[derive(Debug)]
pub struct BaseWordsTransform {
    rng: Mutex<StdRng>,
}

impl BaseWordsTransform {
    pub fn from_entropy() -> Self {
        Self {
            rng: Mutex::new(StdRng::from_entropy()),
        }
    }

    pub fn from_seed(seed: u64) -> Self {
        Self {
            rng: Mutex::new(StdRng::seed_from_u64(seed)),
        }
    }

    fn next_token(&self) -> Result<String, TransformError> {
        let mut rng = self.rng.lock().map_err(|_| TransformError::RandomSource {
            message: "rng lock poisoned".to_string(),
        })?;
        Ok((0..TOKEN_LENGTH)
            .map(|_| char::from(rng.gen_range(b'a'..=b'z')))
            .collect())
    }
}

impl ObjectTransform for BaseWordsTransform {
    fn transform(&self, payload: &[u8]) -> Result<Vec<u8>, TransformError> {
        let mut document: Value =
            serde_json::from_slice(payload).map_err(|error| TransformError::InvalidJson {
                message: error.to_string(),
            })?;

        let Some(Value::Array(words)) = document.get_mut(BASE_WORDS_FIELD) else {
            return Ok(payload.to_vec());
        };
        words.push(Value::String(self.next_token()?));

        serde_json::to_vec(&document).map_err(|error| TransformError::Serialization {
            message: error.to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base_words(body: &[u8]) -> Vec<String> {
        let document: Value = serde_json::from_slice(body).expect("output should be JSON");
        document[BASE_WORDS_FIELD]
            .as_array()
            .expect("base_words should be a list")
            .iter()
            .map(|word| word.as_str().expect("word should be a string").to_string())
            .collect()
    }

    #[test]
    fn appends_two_letter_lowercase_token() {
        let transform = BaseWordsTransform::from_seed(7);
        let output = transform
            .transform(br#"{"base_words":["x"]}"#)
            .expect("transform should succeed");

        let words = base_words(&output);
        assert_eq!(words.len(), 2);
        assert_eq!(words[0], "x");
        assert_eq!(words[1].len(), TOKEN_LENGTH);
        assert!(words[1].chars().all(|c| c.is_ascii_lowercase()));
    }

    #[test]
    fn seeded_transforms_are_reproducible() {
        let input = br#"{"base_words":[]}"#;
        let first = BaseWordsTransform::from_seed(42)
            .transform(input)
            .expect("transform should succeed");
        let second = BaseWordsTransform::from_seed(42)
            .transform(input)
            .expect("transform should succeed");
        assert_eq!(first, second);
    }

    #[test]
    fn preserves_field_order_of_other_keys() {
        let transform = BaseWordsTransform::from_seed(1);
        let output = transform
            .transform(br#"{"zeta":1,"base_words":["x"],"alpha":2}"#)
            .expect("transform should succeed");
        let text = String::from_utf8(output).expect("output should be utf-8");
        let zeta = text.find("zeta").expect("zeta present");
        let alpha = text.find("alpha").expect("alpha present");
        assert!(zeta < alpha);
    }

    #[test]
    fn non_list_base_words_pass_through_unchanged() {
        let transform = BaseWordsTransform::from_seed(7);
        let input = br#"{ "base_words": "not-a-list" }"#;
        let output = transform.transform(input).expect("transform should succeed");
        assert_eq!(output, input.to_vec());
    }

    #[test]
    fn missing_field_and_non_object_documents_pass_through() {
        let transform = BaseWordsTransform::from_seed(7);
        for input in [&br#"{"other":1}"#[..], &b"[1,2,3]"[..], &b"\"text\""[..]] {
            let output = transform.transform(input).expect("transform should succeed");
            assert_eq!(output, input.to_vec());
        }
    }

    #[test]
    fn malformed_json_is_rejected() {
        let transform = BaseWordsTransform::from_seed(7);
        let error = transform
            .transform(b"{not json")
            .expect_err("transform should fail");
        assert!(matches!(error, TransformError::InvalidJson { .. }));
    }

    #[test]
    fn closures_are_transforms() {
        let upper = |payload: &[u8]| -> Result<Vec<u8>, TransformError> {
            Ok(payload.to_ascii_uppercase())
        };
        assert_eq!(upper.transform(b"abc"), Ok(b"ABC".to_vec()));
    }
}
