//! Session token generation.
//!
//! Valid tokens are fixed-length strings drawn from a restricted alphabet;
//! invalid tokens are drawn from a disjoint alphabet so a single character is
//! enough to make the target reject them. Misconfigured alphabets are a
//! startup fault, surfaced from the constructor rather than at draw time.

use crate::config::HarnessConfig;
use rand::RngExt;
use thiserror::Error;

/// Configuration faults detected when building a [`TokenGenerator`].
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TokenError {
    #[error("{which} token alphabet is empty")]
    EmptyAlphabet { which: &'static str },

    #[error("valid and invalid token alphabets overlap on {overlap:?}")]
    OverlappingAlphabets { overlap: Vec<char> },

    #[error("token length must be non-zero")]
    ZeroLength,
}

/// Produces session tokens for positive and negative scenarios.
#[derive(Debug, Clone)]
pub struct TokenGenerator {
    valid: Vec<char>,
    invalid: Vec<char>,
    length: usize,
}

impl TokenGenerator {
    /// Build a generator, validating the alphabets up front.
    pub fn new(
        valid_alphabet: &str,
        invalid_alphabet: &str,
        length: usize,
    ) -> Result<Self, TokenError> {
        let valid: Vec<char> = valid_alphabet.chars().collect();
        let invalid: Vec<char> = invalid_alphabet.chars().collect();

        if valid.is_empty() {
            return Err(TokenError::EmptyAlphabet { which: "valid" });
        }
        if invalid.is_empty() {
            return Err(TokenError::EmptyAlphabet { which: "invalid" });
        }
        if length == 0 {
            return Err(TokenError::ZeroLength);
        }

        let overlap: Vec<char> = valid.iter().copied().filter(|c| invalid.contains(c)).collect();
        if !overlap.is_empty() {
            return Err(TokenError::OverlappingAlphabets { overlap });
        }

        Ok(Self { valid, invalid, length })
    }

    /// Build a generator from the harness configuration.
    pub fn from_config(config: &HarnessConfig) -> Result<Self, TokenError> {
        Self::new(
            &config.token_alphabet,
            &config.token_invalid_alphabet,
            config.token_length,
        )
    }

    /// The configured valid-token length.
    pub fn length(&self) -> usize {
        self.length
    }

    /// A token of the configured length, each character drawn independently
    /// and uniformly from the valid alphabet (with replacement).
    pub fn valid_token(&self) -> String {
        sample(&self.valid, self.length)
    }

    /// A token of the configured length drawn from the invalid alphabet.
    pub fn invalid_token(&self) -> String {
        sample(&self.invalid, self.length)
    }

    /// A valid-alphabet token of an arbitrary length, for boundary scenarios
    /// (length - 1, length + 1, zero, oversized).
    pub fn valid_token_of_length(&self, length: usize) -> String {
        sample(&self.valid, length)
    }
}

// Alphabet is non-empty by construction, so indexing cannot fail.
fn sample(alphabet: &[char], length: usize) -> String {
    let mut rng = rand::rng();
    (0..length)
        .map(|_| alphabet[rng.random_range(0..alphabet.len())])
        .collect()
}
