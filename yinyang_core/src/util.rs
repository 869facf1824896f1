//! Token estimation and shared prompt text.

/// System preamble injected at send time when coding mode is on.
pub const DEFAULT_CODING_PREAMBLE: &str =
    "You are a coding assistant. Provide code solutions with explanations.";

/// Approximate token count of `text`: character count divided by four,
/// rounded up.
///
/// This is not a tokenizer. The displayed token counter relies on this exact
/// formula, so it must stay `ceil(chars / 4)`.
#[must_use]
pub fn estimate_tokens(text: &str) -> usize {
    text.chars().count().div_ceil(4)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn estimate_is_ceiling_of_quarter_length() {
        assert_eq!(estimate_tokens(""), 0);
        assert_eq!(estimate_tokens("a"), 1);
        assert_eq!(estimate_tokens("abcd"), 1);
        assert_eq!(estimate_tokens("abcde"), 2);
        assert_eq!(estimate_tokens("abcdefgh"), 2);
    }

    #[test]
    fn estimate_counts_characters_not_bytes() {
        // Four multi-byte characters, twelve UTF-8 bytes.
        assert_eq!(estimate_tokens("陰陽陰陽"), 1);
        assert_eq!(estimate_tokens("☯"), 1);
    }
}
