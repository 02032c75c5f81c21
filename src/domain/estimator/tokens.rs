use unicode_segmentation::UnicodeSegmentation;

/// Average number of tokens produced per word by BPE-style tokenizers
pub const TOKENS_PER_WORD: f64 = 1.3;

/// Approximate the token count of `text` as `ceil(words * 1.3)`.
///
/// Words are counted with Unicode word segmentation, so punctuation and
/// whitespace do not contribute.
pub fn estimate_tokens(text: &str) -> u32 {
    let words = text.unicode_words().count();

    if words == 0 {
        return 0;
    }

    (words as f64 * TOKENS_PER_WORD).ceil() as u32
}
