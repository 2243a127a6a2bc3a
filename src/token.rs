use std::sync::Arc;

const CHARS_PER_TOKEN: usize = 4;
const ENHANCED_WORD_MULTIPLIER: f64 = 1.3;
const ENHANCED_SPECIAL_DIVISOR: usize = 10;

/// Type of tokenizer to use for estimation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum TokenizerKind {
    /// Character-based heuristic (one token per 4 characters, rounded down)
    #[default]
    Simple,
    /// Word, character and special-character heuristics combined
    Enhanced,
    /// One token per whitespace-separated word
    Whitespace,
}

impl TokenizerKind {
    /// Creates a new tokenizer instance of this kind.
    #[must_use]
    pub fn create(self) -> Arc<dyn TokenEstimator> {
        match self {
            Self::Simple => Arc::new(SimpleTokenizer),
            Self::Enhanced => Arc::new(EnhancedTokenizer),
            Self::Whitespace => Arc::new(WhitespaceTokenizer),
        }
    }
}

/// Estimates token counts in text.
///
/// Implementations must be pure: the same text always yields the same count.
/// Estimates are an approximation of LLM context cost, not a model-exact
/// tokenization.
pub trait TokenEstimator: Send + Sync {
    /// Estimates the number of tokens in the given text.
    fn estimate(&self, text: &str) -> usize;
}

/// Character-based tokenizer.
///
/// Counts Unicode scalar values and divides by 4, so text shorter than four
/// characters costs nothing.
#[derive(Debug, Clone, Copy)]
pub(crate) struct SimpleTokenizer;

impl TokenEstimator for SimpleTokenizer {
    fn estimate(&self, text: &str) -> usize {
        text.chars().count() / CHARS_PER_TOKEN
    }
}

/// Tokenizer with multiple heuristics.
///
/// This tokenizer considers:
/// - Word count (weighted by 1.3)
/// - Character count (divided by 4)
/// - Special characters (penalty factor)
#[derive(Debug, Clone, Copy)]
pub(crate) struct EnhancedTokenizer;

impl TokenEstimator for EnhancedTokenizer {
    fn estimate(&self, text: &str) -> usize {
        if text.is_empty() {
            return 0;
        }

        let words = count_words(text);
        let chars = text.chars().count();
        let special_chars = count_special_chars(text);

        #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss, clippy::cast_precision_loss)]
        let word_estimate = (words as f64 * ENHANCED_WORD_MULTIPLIER) as usize;
        let char_estimate = chars / CHARS_PER_TOKEN;
        let special_penalty = special_chars / ENHANCED_SPECIAL_DIVISOR;

        let base_estimate = word_estimate.saturating_add(char_estimate) / 2;

        base_estimate.saturating_add(special_penalty).max(1)
    }
}

/// Whitespace-splitting tokenizer.
#[derive(Debug, Clone, Copy)]
pub(crate) struct WhitespaceTokenizer;

impl TokenEstimator for WhitespaceTokenizer {
    fn estimate(&self, text: &str) -> usize {
        count_words(text)
    }
}

#[inline]
fn count_words(text: &str) -> usize {
    text.split_whitespace().count()
}

/// Counts special (non-alphanumeric, non-whitespace) characters.
#[inline]
fn count_special_chars(text: &str) -> usize {
    text.chars()
        .filter(|c| !c.is_alphanumeric() && !c.is_whitespace())
        .count()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_simple_tokenizer_empty() {
        assert_eq!(SimpleTokenizer.estimate(""), 0);
    }

    #[test]
    fn test_simple_tokenizer_rounds_down() {
        assert_eq!(SimpleTokenizer.estimate("abc"), 0);
        assert_eq!(SimpleTokenizer.estimate("test"), 1);
        assert_eq!(SimpleTokenizer.estimate("hello world"), 2); // 11 chars
    }

    #[test]
    fn test_simple_tokenizer_counts_chars_not_bytes() {
        // 8 chars, 16 bytes
        assert_eq!(SimpleTokenizer.estimate("пппппппп"), 2);
    }

    #[test]
    fn test_simple_tokenizer_large_input() {
        let huge_text = "a".repeat(1_000_000);
        assert_eq!(SimpleTokenizer.estimate(&huge_text), 250_000);
    }

    #[test]
    fn test_enhanced_tokenizer_empty() {
        assert_eq!(EnhancedTokenizer.estimate(""), 0);
    }

    #[test]
    fn test_enhanced_tokenizer_code() {
        let code = r#"
            fn main() {
                println!("Hello, world!");
            }
        "#;
        let result = EnhancedTokenizer.estimate(code);
        assert!(result > 5);
        assert!(result < 30);
    }

    #[test]
    fn test_whitespace_tokenizer() {
        assert_eq!(WhitespaceTokenizer.estimate(""), 0);
        assert_eq!(WhitespaceTokenizer.estimate("  hello   world  "), 2);
        assert_eq!(WhitespaceTokenizer.estimate("fn main() {}"), 3);
    }

    #[test]
    fn test_tokenizer_kind_default_is_simple() {
        let estimator = TokenizerKind::default().create();
        assert_eq!(estimator.estimate("x".repeat(10).as_str()), 2);
    }

    #[test]
    fn test_count_special_chars() {
        assert_eq!(count_special_chars("hello"), 0);
        assert_eq!(count_special_chars("hello!"), 1);
        assert_eq!(count_special_chars("fn main() {}"), 4);
    }

    #[test]
    fn test_estimators_are_deterministic() {
        let text = "pub struct Chunk { index: usize }";
        for kind in [
            TokenizerKind::Simple,
            TokenizerKind::Enhanced,
            TokenizerKind::Whitespace,
        ] {
            let estimator = kind.create();
            assert_eq!(estimator.estimate(text), estimator.estimate(text));
        }
    }
}
