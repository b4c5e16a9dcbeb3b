//! Turning a resolved command into one atomic buffer mutation.
//!
//! - Literal replace rewrites **all** non-overlapping matches, planned from the last match to the
//!   first so earlier offsets stay valid.
//! - Regex replace substitutes only the **first** match (capture groups expanded). This
//!   asymmetry with literal mode is deliberate and kept as-is.
//! - Insert performs exactly one zero-width insertion at the anchored offset.

use crate::anchors::{MatchPosition, compile_pattern, find_match_positions, resolve_insertion_point};
use crate::error::ReviewError;
use crate::protocol::{EditCommand, EditTarget};
use crate::surface::{Mutation, Surface};
use crate::text::CharIndex;

/// What an applied command did to the document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApplyReport {
    /// Number of spans rewritten.
    pub mutated_count: usize,
    /// Applied mutations, last-to-first, in pre-edit offsets.
    pub mutations: Vec<Mutation>,
    /// Mutations restoring the pre-edit text, in post-edit offsets; `inverse[i]` undoes
    /// `mutations[i]`.
    pub inverse: Vec<Mutation>,
}

impl ApplyReport {
    /// Offset of the first inverse span whose text no longer matches what was inserted, if any.
    ///
    /// A `Some` means the document changed since the edit and a revert would clobber it.
    pub fn revert_conflict(&self, content_after: &str) -> Option<usize> {
        let index = CharIndex::new(content_after);
        self.inverse
            .iter()
            .zip(&self.mutations)
            .find(|(inverse, applied)| {
                inverse.to > index.char_count()
                    || index.slice(content_after, inverse.from, inverse.to) != applied.insert_text
            })
            .map(|(inverse, _)| inverse.from)
    }
}

/// Expand `replacement` against the capture groups of the regex match at `target`.
fn expand_regex_replacement(
    pattern: &str,
    content: &str,
    target: &MatchPosition,
    replacement: &str,
) -> Result<String, ReviewError> {
    let re = compile_pattern(pattern)?;
    let index = CharIndex::new(content);
    let start_byte = index.char_to_byte(target.from);
    let end_byte = index.char_to_byte(target.to);

    let caps = re
        .captures_at(content, start_byte)
        .ok_or_else(|| ReviewError::NoMatchFound {
            search: pattern.to_string(),
        })?;
    let whole = caps.get(0).ok_or_else(|| ReviewError::NoMatchFound {
        search: pattern.to_string(),
    })?;
    if whole.start() != start_byte || whole.end() != end_byte {
        return Err(ReviewError::ApplyFailure(
            "regex match did not align with the resolved range".to_string(),
        ));
    }

    let mut expanded = String::new();
    caps.expand(replacement, &mut expanded);
    Ok(expanded)
}

/// The text `command` would put in place of its primary match `target`.
///
/// For regex commands this is the replacement with capture groups expanded; otherwise it is the
/// replacement text verbatim.
pub fn proposed_text(
    content: &str,
    command: &EditCommand,
    target: &MatchPosition,
) -> Result<String, ReviewError> {
    match command.target() {
        EditTarget::Replace { search } if command.is_regex() => {
            expand_regex_replacement(search, content, target, command.replacement())
        }
        _ => Ok(command.replacement().to_string()),
    }
}

/// Plan the mutation list for `command` against `content`, ordered last-to-first.
pub fn plan_mutations(content: &str, command: &EditCommand) -> Result<Vec<Mutation>, ReviewError> {
    match command.target() {
        EditTarget::Replace { search } => {
            let matches = find_match_positions(content, search, command.is_regex())?;
            let Some(first) = matches.first() else {
                return Err(ReviewError::NoMatchFound {
                    search: search.clone(),
                });
            };

            if command.is_regex() {
                let text = expand_regex_replacement(search, content, first, command.replacement())?;
                return Ok(vec![Mutation::new(first.from, first.to, text)]);
            }

            Ok(matches
                .iter()
                .rev()
                .map(|m| Mutation::new(m.from, m.to, command.replacement()))
                .collect())
        }
        EditTarget::Insert { anchors } => {
            let at = resolve_insertion_point(content, anchors)?;
            Ok(vec![Mutation::new(at, at, command.replacement())])
        }
    }
}

/// Mutations that undo `mutations` once they have been applied to `content_before`.
///
/// The result is index-aligned with the input and expressed in post-edit offsets.
pub fn inverse_mutations(content_before: &str, mutations: &[Mutation]) -> Vec<Mutation> {
    let index = CharIndex::new(content_before);
    let mut order: Vec<usize> = (0..mutations.len()).collect();
    order.sort_by_key(|&i| (mutations[i].from, mutations[i].to));

    let mut inverse: Vec<Option<Mutation>> = vec![None; mutations.len()];
    let mut delta: isize = 0;
    for i in order {
        let m = &mutations[i];
        let start_after = m.from.saturating_add_signed(delta);
        let inserted_len = m.insert_text.chars().count();
        let deleted = index.slice(content_before, m.from, m.to);
        inverse[i] = Some(Mutation::new(start_after, start_after + inserted_len, deleted));
        delta += inserted_len as isize - m.to.saturating_sub(m.from) as isize;
    }

    inverse.into_iter().flatten().collect()
}

/// Apply `command` to `surface` as one atomic mutation.
pub fn apply_command<S: Surface + ?Sized>(
    surface: &mut S,
    command: &EditCommand,
) -> Result<ApplyReport, ReviewError> {
    let content = surface.current_content();
    let mutations = plan_mutations(&content, command)?;
    let inverse = inverse_mutations(&content, &mutations);

    surface.apply_mutations(&mutations)?;
    tracing::debug!(id = %command.id(), count = mutations.len(), "applied command");

    Ok(ApplyReport {
        mutated_count: mutations.len(),
        mutations,
        inverse,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use crate::protocol::Anchors;
    use crate::surface::BufferSurface;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_replace_all_literal_matches_last_to_first() {
        let command = EditCommand::replace("a", "foo", "x");
        let mutations = plan_mutations("foo bar foo", &command).unwrap();
        assert_eq!(
            mutations,
            vec![Mutation::new(8, 11, "x"), Mutation::new(0, 3, "x")]
        );
    }

    #[test]
    fn test_regex_replace_substitutes_first_match_only() {
        let command = EditCommand::replace("a", r"(\w+)@(\w+)", "$2 at $1").with_regex(true);
        let mut surface = BufferSurface::new("a", "me@home you@work", 5);
        let report = apply_command(&mut surface, &command).unwrap();
        assert_eq!(report.mutated_count, 1);
        assert_eq!(surface.current_content(), "home at me you@work");
    }

    #[test]
    fn test_insert_between_anchors() {
        let command = EditCommand::insert("a", Anchors::between("X", "Y"), "<ins>");
        let mut surface = BufferSurface::new("a", "X+Y", 5);
        let report = apply_command(&mut surface, &command).unwrap();
        assert_eq!(report.mutations, vec![Mutation::new(1, 1, "<ins>")]);
        assert_eq!(surface.current_content(), "X<ins>+Y");
    }

    #[test]
    fn test_inverse_restores_original() {
        let before = "ab ab ab";
        let command = EditCommand::replace("a", "ab", "xyz");
        let mut surface = BufferSurface::new("a", before, 5);
        let report = apply_command(&mut surface, &command).unwrap();
        assert_eq!(surface.current_content(), "xyz xyz xyz");
        assert_eq!(report.revert_conflict(&surface.current_content()), None);

        surface.apply_mutations(&report.inverse).unwrap();
        assert_eq!(surface.current_content(), before);
    }

    #[test]
    fn test_revert_conflict_detects_later_edits() {
        let command = EditCommand::replace("a", "world", "there");
        let mut surface = BufferSurface::new("a", "Hello world", 5);
        let report = apply_command(&mut surface, &command).unwrap();
        surface.set_text("Hello thera!");
        assert_eq!(report.revert_conflict(&surface.current_content()), Some(6));
        surface.set_text("Hello then");
        assert_eq!(report.revert_conflict(&surface.current_content()), Some(6));
    }

    #[test]
    fn test_failed_apply_leaves_document_untouched() {
        let command = EditCommand::replace("a", "world", "there");
        let mut surface = BufferSurface::new("a", "Hello world", 5);
        surface.set_read_only(true);
        let err = apply_command(&mut surface, &command).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ApplyFailure);
        assert_eq!(surface.current_content(), "Hello world");
    }

    #[test]
    fn test_proposed_text_for_regex() {
        let command = EditCommand::replace("a", r"v(\d+)", "version $1").with_regex(true);
        let target = MatchPosition {
            from: 4,
            to: 6,
            text: "v2".to_string(),
        };
        assert_eq!(proposed_text("use v2", &command, &target).unwrap(), "version 2");
    }
}
