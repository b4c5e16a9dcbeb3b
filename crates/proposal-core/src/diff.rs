//! Character- and word-level diffing.
//!
//! Diffing happens in two passes:
//!
//! 1. [`compute_diff`] collapses the common prefix and suffix of the two strings, leaving the
//!    smallest differing middle span on each side.
//! 2. [`compute_word_diff`] aligns the two middle spans token by token (runs of whitespace or
//!    non-whitespace) with a longest-common-subsequence table, so the preview can emphasize only
//!    the words that actually changed.
//!
//! Both passes are pure and deterministic.

use serde::{Deserialize, Serialize};
use std::ops::Range;

/// Result of collapsing the common prefix/suffix of two strings.
///
/// All fields borrow from the inputs:
/// `common_prefix + old_diff + common_suffix == old` and
/// `common_prefix + new_diff + common_suffix == new`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DiffResult<'a> {
    /// Shared leading text.
    pub common_prefix: &'a str,
    /// Shared trailing text (not overlapping the prefix).
    pub common_suffix: &'a str,
    /// The differing middle span of `old`.
    pub old_diff: &'a str,
    /// The differing middle span of `new`.
    pub new_diff: &'a str,
}

impl DiffResult<'_> {
    /// Length of the common prefix in characters.
    pub fn prefix_chars(&self) -> usize {
        self.common_prefix.chars().count()
    }

    /// Returns `true` when both sides are identical.
    pub fn is_unchanged(&self) -> bool {
        self.old_diff.is_empty() && self.new_diff.is_empty()
    }

    /// Returns `true` when the change only adds text (nothing from `old` is removed).
    pub fn is_pure_insertion(&self) -> bool {
        self.old_diff.is_empty()
    }
}

/// Collapse the common prefix and suffix of `old` and `new`.
pub fn compute_diff<'a>(old: &'a str, new: &'a str) -> DiffResult<'a> {
    let mut prefix_bytes = 0usize;
    let mut prefix_chars = 0usize;
    for (a, b) in old.chars().zip(new.chars()) {
        if a != b {
            break;
        }
        prefix_bytes += a.len_utf8();
        prefix_chars += 1;
    }

    let old_rest = &old[prefix_bytes..];
    let new_rest = &new[prefix_bytes..];

    let max_suffix = old.chars().count().min(new.chars().count()) - prefix_chars;
    let mut suffix_bytes = 0usize;
    for (a, b) in old_rest.chars().rev().zip(new_rest.chars().rev()).take(max_suffix) {
        if a != b {
            break;
        }
        suffix_bytes += a.len_utf8();
    }

    DiffResult {
        common_prefix: &old[..prefix_bytes],
        common_suffix: &old_rest[old_rest.len() - suffix_bytes..],
        old_diff: &old_rest[..old_rest.len() - suffix_bytes],
        new_diff: &new_rest[..new_rest.len() - suffix_bytes],
    }
}

/// Classification of a word-diff token.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SegmentClass {
    /// The token appears on both sides.
    Same,
    /// The token was removed (old side) or added (new side).
    Changed,
}

/// One token of a word diff.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WordSegment {
    /// Token text.
    pub text: String,
    /// Whether the token is shared by both sides.
    pub class: SegmentClass,
}

impl WordSegment {
    fn new(text: &str, class: SegmentClass) -> Self {
        Self {
            text: text.to_string(),
            class,
        }
    }

    /// Returns `true` if the token differs between the two sides.
    pub fn is_changed(&self) -> bool {
        self.class == SegmentClass::Changed
    }
}

/// Token-level alignment of two strings.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct WordDiff {
    /// Tokens of the old string, in order.
    pub old: Vec<WordSegment>,
    /// Tokens of the new string, in order.
    pub new: Vec<WordSegment>,
}

/// Split `text` into maximal runs of whitespace or non-whitespace.
pub fn tokenize(text: &str) -> Vec<&str> {
    let mut tokens = Vec::new();
    let mut start = 0usize;
    let mut current: Option<bool> = None;

    for (idx, ch) in text.char_indices() {
        let ws = ch.is_whitespace();
        match current {
            Some(prev) if prev != ws => {
                tokens.push(&text[start..idx]);
                start = idx;
            }
            _ => {}
        }
        current = Some(ws);
    }

    if start < text.len() {
        tokens.push(&text[start..]);
    }
    tokens
}

/// Align `old_diff` and `new_diff` token by token.
///
/// Tokens on the longest common subsequence are [`SegmentClass::Same`], every other token is
/// [`SegmentClass::Changed`]. When the backtrack can move either up or left with the same score
/// it always consumes the old token first, so results are stable across calls.
pub fn compute_word_diff(old_diff: &str, new_diff: &str) -> WordDiff {
    let old_tokens = tokenize(old_diff);
    let new_tokens = tokenize(new_diff);
    let n = old_tokens.len();
    let m = new_tokens.len();

    // table[i * (m + 1) + j] = LCS length of old_tokens[..i] and new_tokens[..j]
    let width = m + 1;
    let mut table = vec![0u32; (n + 1) * width];
    for i in 1..=n {
        for j in 1..=m {
            table[i * width + j] = if old_tokens[i - 1] == new_tokens[j - 1] {
                table[(i - 1) * width + (j - 1)] + 1
            } else {
                table[(i - 1) * width + j].max(table[i * width + (j - 1)])
            };
        }
    }

    let mut old_same = vec![false; n];
    let mut new_same = vec![false; m];
    let (mut i, mut j) = (n, m);
    while i > 0 && j > 0 {
        if old_tokens[i - 1] == new_tokens[j - 1] {
            old_same[i - 1] = true;
            new_same[j - 1] = true;
            i -= 1;
            j -= 1;
        } else if table[(i - 1) * width + j] >= table[i * width + (j - 1)] {
            i -= 1;
        } else {
            j -= 1;
        }
    }

    let classify = |tokens: &[&str], same: &[bool]| {
        tokens
            .iter()
            .zip(same)
            .map(|(token, same)| {
                let class = if *same {
                    SegmentClass::Same
                } else {
                    SegmentClass::Changed
                };
                WordSegment::new(token, class)
            })
            .collect::<Vec<_>>()
    };

    WordDiff {
        old: classify(&old_tokens, &old_same),
        new: classify(&new_tokens, &new_same),
    }
}

/// Character ranges (relative to the start of the diffed string) of all changed segments.
pub fn changed_ranges(segments: &[WordSegment]) -> Vec<Range<usize>> {
    let mut ranges = Vec::new();
    let mut offset = 0usize;
    for segment in segments {
        let len = segment.text.chars().count();
        if segment.is_changed() && len > 0 {
            ranges.push(offset..offset + len);
        }
        offset += len;
    }
    ranges
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_collapse_prefix_and_suffix() {
        let diff = compute_diff("Hello world!", "Hello there!");
        assert_eq!(diff.common_prefix, "Hello ");
        assert_eq!(diff.common_suffix, "!");
        assert_eq!(diff.old_diff, "world");
        assert_eq!(diff.new_diff, "there");
        assert_eq!(diff.prefix_chars(), 6);
    }

    #[test]
    fn test_suffix_does_not_overlap_prefix() {
        // "aa" -> "aaa": the prefix eats both chars of old, so the suffix must be empty.
        let diff = compute_diff("aa", "aaa");
        assert_eq!(diff.common_prefix, "aa");
        assert_eq!(diff.common_suffix, "");
        assert_eq!(diff.old_diff, "");
        assert_eq!(diff.new_diff, "a");
        assert!(diff.is_pure_insertion());
    }

    #[test]
    fn test_multibyte_boundaries() {
        let diff = compute_diff("a👋b", "a🎉b");
        assert_eq!(diff.old_diff, "👋");
        assert_eq!(diff.new_diff, "🎉");
    }

    #[test]
    fn test_tokenize_runs() {
        assert_eq!(tokenize("let  x =\n1"), vec!["let", "  ", "x", " ", "=", "\n", "1"]);
        assert!(tokenize("").is_empty());
    }

    #[test]
    fn test_word_diff_marks_only_changed_words() {
        let diff = compute_word_diff("let x = 1;", "let y = 1;");
        let changed: Vec<&str> = diff
            .old
            .iter()
            .filter(|s| s.is_changed())
            .map(|s| s.text.as_str())
            .collect();
        assert_eq!(changed, vec!["x"]);
        let added: Vec<&str> = diff
            .new
            .iter()
            .filter(|s| s.is_changed())
            .map(|s| s.text.as_str())
            .collect();
        assert_eq!(added, vec!["y"]);
    }

    #[test]
    fn test_word_diff_tie_break_prefers_old_side() {
        // "a b" vs "b a": "a", " " and "b" are all LCS candidates of length 1.
        let first = compute_word_diff("a b", "b a");
        let second = compute_word_diff("a b", "b a");
        assert_eq!(first, second);
        let same: Vec<&str> = first
            .old
            .iter()
            .filter(|s| !s.is_changed())
            .map(|s| s.text.as_str())
            .collect();
        assert_eq!(same, vec!["a"]);
    }

    #[test]
    fn test_changed_ranges() {
        let diff = compute_word_diff("foo bar baz", "foo qux baz");
        assert_eq!(changed_ranges(&diff.old), vec![4..7]);
    }
}
