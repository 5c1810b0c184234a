//! Token budget heuristic.

use crate::models::WordCount;

/// Maps a requested word count to a generation budget.
///
/// `max_tokens = min(words * tokens_per_word, cap)`. This is an overestimate
/// of tokens per word that bounds latency; it does not make the model hit the
/// requested length.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TokenBudget {
    pub tokens_per_word: usize,
    pub cap: usize,
}

impl Default for TokenBudget {
    fn default() -> Self {
        Self {
            tokens_per_word: 2,
            cap: 512,
        }
    }
}

impl TokenBudget {
    pub fn new(tokens_per_word: usize, cap: usize) -> Self {
        Self {
            tokens_per_word,
            cap,
        }
    }

    pub fn max_tokens(&self, words: WordCount) -> usize {
        (words.get() as usize)
            .saturating_mul(self.tokens_per_word)
            .min(self.cap)
    }
}
