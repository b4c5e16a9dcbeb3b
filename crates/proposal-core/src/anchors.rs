//! Resolving command targets to document positions.
//!
//! All inputs/outputs use **character offsets** into a content snapshot. Matches are half-open
//! (`from..to`).

use crate::error::ReviewError;
use crate::protocol::{Anchors, EditCommand, EditTarget};
use crate::text::CharIndex;
use regex::{Regex, RegexBuilder};
use serde::{Deserialize, Serialize};

/// A match of a search string or anchor in a document snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MatchPosition {
    /// Inclusive start character offset.
    pub from: usize,
    /// Exclusive end character offset.
    pub to: usize,
    /// The matched text.
    pub text: String,
}

impl MatchPosition {
    /// A zero-width position (used for insertion points).
    pub fn point(offset: usize) -> Self {
        Self {
            from: offset,
            to: offset,
            text: String::new(),
        }
    }

    /// Length of the match in characters.
    pub fn len(&self) -> usize {
        self.to.saturating_sub(self.from)
    }

    /// Returns `true` for zero-width positions.
    pub fn is_empty(&self) -> bool {
        self.from >= self.to
    }
}

/// Where a command lands in a document snapshot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolution {
    /// Every match of a replace command's search text, in document order (never empty).
    Replace {
        /// Matches in document order.
        matches: Vec<MatchPosition>,
    },
    /// The insertion point of an insert command.
    Insert {
        /// Character offset to insert at.
        at: usize,
    },
}

impl Resolution {
    /// The position a highlight region tracks: the first match, or the insertion point.
    pub fn primary(&self) -> MatchPosition {
        match self {
            Self::Replace { matches } => matches
                .first()
                .cloned()
                .unwrap_or_else(|| MatchPosition::point(0)),
            Self::Insert { at } => MatchPosition::point(*at),
        }
    }

    /// Number of places the command would touch.
    pub fn match_count(&self) -> usize {
        match self {
            Self::Replace { matches } => matches.len(),
            Self::Insert { .. } => 1,
        }
    }
}

/// Compile a search pattern. `^` and `$` match at line boundaries.
pub(crate) fn compile_pattern(pattern: &str) -> Result<Regex, ReviewError> {
    RegexBuilder::new(pattern)
        .multi_line(true)
        .build()
        .map_err(|err| ReviewError::InvalidPattern {
            pattern: pattern.to_string(),
            message: err.to_string(),
        })
}

/// Find all matches of `pattern` in `content`.
///
/// - Literal mode scans left to right and resumes after each match, so occurrences never
///   overlap: `"aab"` / `"ab"` yields a single match `1..3`, `"aaaa"` / `"aa"` yields `0..2` and
///   `2..4`.
/// - Regex mode uses global iteration; empty matches are skipped.
/// - An empty pattern yields no matches.
pub fn find_match_positions(
    content: &str,
    pattern: &str,
    is_regex: bool,
) -> Result<Vec<MatchPosition>, ReviewError> {
    if pattern.is_empty() {
        return Ok(Vec::new());
    }

    let index = CharIndex::new(content);
    let to_position = |start: usize, end: usize| MatchPosition {
        from: index.byte_to_char(start),
        to: index.byte_to_char(end),
        text: content[start..end].to_string(),
    };

    if is_regex {
        let re = compile_pattern(pattern)?;
        Ok(re
            .find_iter(content)
            .filter(|m| !m.is_empty())
            .map(|m| to_position(m.start(), m.end()))
            .collect())
    } else {
        Ok(content
            .match_indices(pattern)
            .map(|(start, matched)| to_position(start, start + matched.len()))
            .collect())
    }
}

fn first_match(content: &str, anchor: Option<&str>) -> Option<MatchPosition> {
    let anchor = anchor.filter(|a| !a.is_empty())?;
    let index = CharIndex::new(content);
    let start = content.find(anchor)?;
    Some(MatchPosition {
        from: index.byte_to_char(start),
        to: index.byte_to_char(start + anchor.len()),
        text: anchor.to_string(),
    })
}

/// Resolve the insertion point described by `anchors`.
///
/// - Both anchors: each resolves independently to its first match; the point is the end of
///   `after`, and it must not be past the start of `before`.
/// - If only one anchor resolves (or only one is given), the point is right after `after` or
///   right before `before`.
/// - If nothing resolves: [`ReviewError::AnchorNotFound`].
pub fn resolve_insertion_point(content: &str, anchors: &Anchors) -> Result<usize, ReviewError> {
    let after = first_match(content, anchors.after.as_deref());
    let before = first_match(content, anchors.before.as_deref());

    match (after, before) {
        (Some(after), Some(before)) => {
            if after.to > before.from {
                Err(ReviewError::AnchorOrderViolation {
                    after_end: after.to,
                    before_start: before.from,
                })
            } else {
                Ok(after.to)
            }
        }
        (Some(after), None) => Ok(after.to),
        (None, Some(before)) => Ok(before.from),
        (None, None) => Err(ReviewError::AnchorNotFound {
            anchor: anchors
                .after
                .clone()
                .or_else(|| anchors.before.clone())
                .unwrap_or_default(),
        }),
    }
}

/// Resolve `command` against a content snapshot.
pub fn resolve_command(content: &str, command: &EditCommand) -> Result<Resolution, ReviewError> {
    match command.target() {
        EditTarget::Replace { search } => {
            let matches = find_match_positions(content, search, command.is_regex())?;
            if matches.is_empty() {
                return Err(ReviewError::NoMatchFound {
                    search: search.clone(),
                });
            }
            Ok(Resolution::Replace { matches })
        }
        EditTarget::Insert { anchors } => {
            resolve_insertion_point(content, anchors).map(|at| Resolution::Insert { at })
        }
    }
}
