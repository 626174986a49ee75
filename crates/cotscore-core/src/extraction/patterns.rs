//! Shared segmentation patterns.
//!
//! Every regex used by the step extractor lives here so the per-style
//! segmenters only describe how the pieces are combined.

use lazy_static::lazy_static;
use regex::Regex;

lazy_static! {
    // =========================================================================
    // PREPROCESSING
    // =========================================================================

    /// A trailing line holding nothing but an echoed answer letter ("\nB." at the end)
    pub static ref TRAILING_CHOICE_LINE: Regex = Regex::new(
        r"\n[A-E]\.?\n?$"
    ).unwrap();

    /// Header after which models restate their own output as "extracted steps"
    pub static ref EXTRACTED_STEPS_HEADER: Regex = Regex::new(
        r"(?i)(?:提取的推理步骤|extracted reasoning steps)\s*[:：]"
    ).unwrap();

    // =========================================================================
    // TEMPLATED STYLE
    // =========================================================================

    /// "Step 3:" marker opening a templated segment
    pub static ref STEP_MARKER: Regex = Regex::new(
        r"Step\s*\d+:"
    ).unwrap();

    /// Sentence or clause end inside a step segment; the punctuation stays on the left piece
    pub static ref CLAUSE_BREAK: Regex = Regex::new(
        r"[.;]\s+"
    ).unwrap();

    /// Bullet marker at the start of a fragment or after whitespace
    pub static ref INLINE_BULLET: Regex = Regex::new(
        r"(?:^|\s)[-\u{2022}]\s*"
    ).unwrap();

    /// Looser step/phase markers, numbered or verbal, followed by text up to a terminator
    pub static ref LOOSE_STEP: Regex = Regex::new(
        r"(?:Step|Phase|Stage|第[^步]{0,6}步|步骤)(?:\s*\d+)?\s*[:：.]?\s*([^。.!?\n]*[。.!?\n])"
    ).unwrap();

    /// Line opening a numbered list item: "1." or "(1)"
    pub static ref NUMBERED_ITEM: Regex = Regex::new(
        r"^\s*(?:\d+\.|\(\d+\))\s*"
    ).unwrap();

    /// Line made of digits only (page or list numbers left on their own line)
    pub static ref DIGITS_ONLY: Regex = Regex::new(
        r"^\d+$"
    ).unwrap();

    // =========================================================================
    // NATURAL STYLE
    // =========================================================================

    /// Bullet at the start of a line, rewritten to a connective before splitting
    pub static ref LINE_BULLET: Regex = Regex::new(
        r"(?m)^[-\u{2022}]\s+"
    ).unwrap();

    /// Discourse markers opening a reasoning unit
    pub static ref DISCOURSE_MARKER: Regex = Regex::new(
        r"(?i)\b(?:First(?:ly)?|To\s+start\s+with|Then(?:\s+we)?|Next|After\s+that|Also|Additionally|Moreover|Furthermore|Therefore|Finally|Lastly)\b,?"
    ).unwrap();

    /// Sentence boundary inside a unit: terminator and whitespace before a capital
    pub static ref UNIT_SENTENCE_BREAK: Regex = Regex::new(
        r"[.?!;]\s+[A-Z]"
    ).unwrap();

    /// Plain sentence boundary used when no marker produced anything
    pub static ref PLAIN_SENTENCE_BREAK: Regex = Regex::new(
        r"[.?!]\s+[A-Z]"
    ).unwrap();

    // =========================================================================
    // SIMPLE STYLE
    // =========================================================================

    /// Major sentence terminator; the punctuation is consumed
    pub static ref SENTENCE_END: Regex = Regex::new(
        r"[.!?]\s+"
    ).unwrap();
}

/// Collapse runs of whitespace to single spaces.
///
/// This is the identity used for step deduplication (case-sensitive).
pub fn normalize(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Split `text` after every match of `pattern`, keeping the match's first
/// character (the punctuation) on the left piece and dropping the rest of
/// the separator, except for `keep_tail` trailing bytes which start the
/// next piece.
///
/// With `keep_tail = 1` this reproduces a "split after punctuation,
/// before the capital letter" rule without lookaround.
pub(crate) fn split_after_punct(text: &str, pattern: &Regex, keep_tail: usize) -> Vec<String> {
    let mut pieces = Vec::new();
    let mut start = 0;

    for m in pattern.find_iter(text) {
        let punct_end = m.start() + first_char_len(&text[m.start()..]);
        pieces.push(text[start..punct_end].to_string());
        start = m.end() - keep_tail;
    }
    pieces.push(text[start..].to_string());

    pieces
}

fn first_char_len(s: &str) -> usize {
    s.chars().next().map(char::len_utf8).unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_collapses_whitespace() {
        assert_eq!(normalize("  a \n b\t\tc "), "a b c");
        assert_eq!(normalize(""), "");
    }

    #[test]
    fn test_split_after_punct_keeps_terminator() {
        let pieces = split_after_punct("One. Two; three", &CLAUSE_BREAK, 0);
        assert_eq!(pieces, vec!["One.", "Two;", "three"]);
    }

    #[test]
    fn test_split_after_punct_keeps_capital() {
        let pieces = split_after_punct("It is. Then more. and less", &UNIT_SENTENCE_BREAK, 1);
        assert_eq!(pieces, vec!["It is.", "Then more. and less"]);
    }

    #[test]
    fn test_discourse_marker_word_boundary() {
        assert!(DISCOURSE_MARKER.is_match("Finally, it works"));
        assert!(DISCOURSE_MARKER.is_match("then we conclude"));
        assert!(!DISCOURSE_MARKER.is_match("the context matters"));
    }

    #[test]
    fn test_trailing_choice_line() {
        assert!(TRAILING_CHOICE_LINE.is_match("reasoning\nB."));
        assert!(TRAILING_CHOICE_LINE.is_match("reasoning\nC"));
        assert!(!TRAILING_CHOICE_LINE.is_match("reasoning\nBecause"));
    }

    #[test]
    fn test_loose_step_matches_verbal_markers() {
        let caps = LOOSE_STEP.captures("Phase 2. Compare options.").unwrap();
        assert_eq!(&caps[1], "Compare options.");
        let caps = LOOSE_STEP.captures("第一步：分析问题。").unwrap();
        assert_eq!(&caps[1], "分析问题。");
    }
}
