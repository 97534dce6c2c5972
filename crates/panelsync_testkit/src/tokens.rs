//! Deterministic token generators.

use panelsync_core::TokenGenerator;
use std::sync::atomic::{AtomicU64, Ordering};

/// Zero-padded counter values: `000001`, `000002`, ...
///
/// Tokens are unique as long as the counter fits in the requested length.
#[derive(Debug, Default)]
pub struct SequenceTokens {
    next: AtomicU64,
}

impl SequenceTokens {
    /// Creates a generator starting at 1.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns how many tokens were handed out.
    pub fn issued(&self) -> u64 {
        self.next.load(Ordering::SeqCst)
    }

    /// Returns the token that the `n`th call (1-based) produces.
    pub fn nth(n: u64, length: usize) -> String {
        let digits = format!("{n:0>length$}");
        digits[digits.len() - length..].to_string()
    }
}

impl TokenGenerator for SequenceTokens {
    fn token(&self, length: usize) -> String {
        let n = self.next.fetch_add(1, Ordering::SeqCst) + 1;
        Self::nth(n, length)
    }
}

/// Always returns the same token, cycled to the requested length.
#[derive(Debug, Clone)]
pub struct FixedTokens(String);

impl FixedTokens {
    /// Creates a generator from a non-empty seed.
    pub fn new(seed: impl Into<String>) -> Self {
        let seed = seed.into();
        assert!(!seed.is_empty(), "seed must not be empty");
        Self(seed)
    }
}

impl TokenGenerator for FixedTokens {
    fn token(&self, length: usize) -> String {
        self.0.chars().cycle().take(length).collect()
    }
}
