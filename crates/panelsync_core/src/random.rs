//! Random token generation.

use rand::distributions::Alphanumeric;
use rand::Rng;

/// Source of random alphanumeric tokens.
pub trait TokenGenerator: Send + Sync {
    /// Returns a token of exactly `length` characters.
    fn token(&self, length: usize) -> String;
}

/// Tokens drawn from the thread-local RNG.
#[derive(Debug, Clone, Copy, Default)]
pub struct ThreadRngTokens;

impl TokenGenerator for ThreadRngTokens {
    fn token(&self, length: usize) -> String {
        rand::thread_rng()
            .sample_iter(&Alphanumeric)
            .take(length)
            .map(char::from)
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tokens_have_requested_length() {
        let token = ThreadRngTokens.token(36);
        assert_eq!(token.len(), 36);
        assert!(token.chars().all(|c| c.is_ascii_alphanumeric()));
    }

    #[test]
    fn tokens_differ() {
        assert_ne!(ThreadRngTokens.token(36), ThreadRngTokens.token(36));
    }
}
