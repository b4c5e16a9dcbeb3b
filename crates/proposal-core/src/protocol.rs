//! Edit protocol parsing.
//!
//! A text-generation process proposes edits by emitting delimited blocks inside otherwise free-form
//! text:
//!
//! ```text
//! <<<REPLACE>>>
//! FILE: src/lib.rs
//! <<<SEARCH>>>
//! exact text
//! <<<WITH>>>
//! replacement text
//! <<<END>>>
//!
//! <<<INSERT>>>
//! FILE: src/lib.rs
//! <<<AFTER>>>
//! anchor text
//! <<<BEFORE>>>
//! anchor text
//! <<<CONTENT>>>
//! text to insert
//! <<<END>>>
//! ```
//!
//! Output may arrive incrementally, so a block without `<<<END>>>` is not an error: it is kept as
//! the unparsed remainder and picked up again by a later call. Command ids are derived from the
//! block payload, which makes re-parsing a growing transcript idempotent.
//!
//! # Example
//!
//! ```rust
//! use proposal_core::protocol::parse_commands;
//!
//! let text = "Sure:\n<<<REPLACE>>>\nFILE: a.txt\n<<<SEARCH>>>\nworld\n<<<WITH>>>\nthere\n<<<END>>>\n";
//! let output = parse_commands(text);
//! assert_eq!(output.commands.len(), 1);
//! assert_eq!(output.commands[0].search(), Some("world"));
//! assert_eq!(output.commands[0].replacement(), "there");
//! ```

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::HashSet;
use std::fmt;

const REPLACE_MARKER: &str = "<<<REPLACE>>>";
const INSERT_MARKER: &str = "<<<INSERT>>>";
const SEARCH_MARKER: &str = "<<<SEARCH>>>";
const WITH_MARKER: &str = "<<<WITH>>>";
const AFTER_MARKER: &str = "<<<AFTER>>>";
const BEFORE_MARKER: &str = "<<<BEFORE>>>";
const CONTENT_MARKER: &str = "<<<CONTENT>>>";
const END_MARKER: &str = "<<<END>>>";
const FILE_PREFIX: &str = "FILE:";

const START_MARKERS: [(&str, CommandKind); 2] = [
    (REPLACE_MARKER, CommandKind::Replace),
    (INSERT_MARKER, CommandKind::Insert),
];

const SECTION_MARKERS: [(&str, Section); 5] = [
    (SEARCH_MARKER, Section::Search),
    (WITH_MARKER, Section::With),
    (AFTER_MARKER, Section::After),
    (BEFORE_MARKER, Section::Before),
    (CONTENT_MARKER, Section::Content),
];

/// Stable identifier of a proposed edit.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CommandId(String);

impl CommandId {
    /// Wrap an externally chosen id.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// The id as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CommandId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<String> for CommandId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl From<&str> for CommandId {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

/// The two edit shapes the protocol knows about.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CommandKind {
    /// Replace occurrences of a search string.
    Replace,
    /// Insert text at an anchored position.
    Insert,
}

impl CommandKind {
    fn tag(self) -> &'static str {
        match self {
            Self::Replace => "replace",
            Self::Insert => "insert",
        }
    }
}

/// Insertion anchors. At least one side must be present for a valid insert.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Anchors {
    /// Text the insertion point must follow.
    pub after: Option<String>,
    /// Text the insertion point must precede.
    pub before: Option<String>,
}

impl Anchors {
    /// Anchor after `text`.
    pub fn after(text: impl Into<String>) -> Self {
        Self {
            after: Some(text.into()),
            before: None,
        }
    }

    /// Anchor before `text`.
    pub fn before(text: impl Into<String>) -> Self {
        Self {
            after: None,
            before: Some(text.into()),
        }
    }

    /// Anchor between `after` and `before`.
    pub fn between(after: impl Into<String>, before: impl Into<String>) -> Self {
        Self {
            after: Some(after.into()),
            before: Some(before.into()),
        }
    }

    /// Returns `true` if neither side carries any text.
    pub fn is_empty(&self) -> bool {
        self.after.as_deref().is_none_or(str::is_empty)
            && self.before.as_deref().is_none_or(str::is_empty)
    }
}

/// What an edit command targets in the document.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum EditTarget {
    /// Replace matches of `search`.
    Replace {
        /// Literal text (or regex pattern) to look for.
        search: String,
    },
    /// Insert at the position described by `anchors`.
    Insert {
        /// Insertion anchors.
        anchors: Anchors,
    },
}

/// A single proposed edit, immutable once built.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct EditCommand {
    id: CommandId,
    file: String,
    target: EditTarget,
    replacement: String,
    is_regex: bool,
}

impl EditCommand {
    /// Build a literal replace command.
    pub fn replace(
        file: impl Into<String>,
        search: impl Into<String>,
        replacement: impl Into<String>,
    ) -> Self {
        Self::build(
            file.into(),
            EditTarget::Replace {
                search: search.into(),
            },
            replacement.into(),
            false,
        )
    }

    /// Build an insert command.
    pub fn insert(file: impl Into<String>, anchors: Anchors, content: impl Into<String>) -> Self {
        Self::build(
            file.into(),
            EditTarget::Insert { anchors },
            content.into(),
            false,
        )
    }

    fn build(file: String, target: EditTarget, replacement: String, is_regex: bool) -> Self {
        let id = derive_id(&file, &target, &replacement, is_regex);
        Self {
            id,
            file,
            target,
            replacement,
            is_regex,
        }
    }

    /// Treat the search text as a regex pattern. The derived id is recomputed.
    ///
    /// Only meaningful for replace commands; inserts always match anchors literally.
    pub fn with_regex(self, is_regex: bool) -> Self {
        Self::build(self.file, self.target, self.replacement, is_regex)
    }

    /// Override the derived id with an externally chosen one.
    pub fn with_id(mut self, id: impl Into<CommandId>) -> Self {
        self.id = id.into();
        self
    }

    /// Stable command id.
    pub fn id(&self) -> &CommandId {
        &self.id
    }

    /// Target file path as emitted by the generator.
    pub fn file(&self) -> &str {
        &self.file
    }

    /// Command kind.
    pub fn kind(&self) -> CommandKind {
        match self.target {
            EditTarget::Replace { .. } => CommandKind::Replace,
            EditTarget::Insert { .. } => CommandKind::Insert,
        }
    }

    /// What the command targets.
    pub fn target(&self) -> &EditTarget {
        &self.target
    }

    /// Search text for replace commands.
    pub fn search(&self) -> Option<&str> {
        match &self.target {
            EditTarget::Replace { search } => Some(search),
            EditTarget::Insert { .. } => None,
        }
    }

    /// Anchors for insert commands.
    pub fn anchors(&self) -> Option<&Anchors> {
        match &self.target {
            EditTarget::Insert { anchors } => Some(anchors),
            EditTarget::Replace { .. } => None,
        }
    }

    /// Replacement text (replace) or inserted content (insert).
    pub fn replacement(&self) -> &str {
        &self.replacement
    }

    /// Whether `search` is a regex pattern.
    pub fn is_regex(&self) -> bool {
        self.is_regex && self.kind() == CommandKind::Replace
    }
}

fn derive_id(file: &str, target: &EditTarget, replacement: &str, is_regex: bool) -> CommandId {
    fn field(hasher: &mut Sha256, value: Option<&str>) {
        match value {
            Some(value) => {
                hasher.update([1u8]);
                hasher.update((value.len() as u64).to_le_bytes());
                hasher.update(value.as_bytes());
            }
            None => hasher.update([0u8]),
        }
    }

    let kind = match target {
        EditTarget::Replace { .. } => CommandKind::Replace,
        EditTarget::Insert { .. } => CommandKind::Insert,
    };

    let mut hasher = Sha256::new();
    field(&mut hasher, Some(kind.tag()));
    field(&mut hasher, Some(file));
    match target {
        EditTarget::Replace { search } => field(&mut hasher, Some(search)),
        EditTarget::Insert { anchors } => {
            field(&mut hasher, anchors.after.as_deref());
            field(&mut hasher, anchors.before.as_deref());
        }
    }
    field(&mut hasher, Some(replacement));
    hasher.update([is_regex as u8]);

    let digest = hasher.finalize();
    let hex: String = digest[..8].iter().map(|b| format!("{:02x}", b)).collect();
    CommandId(format!("{}-{}", kind.tag(), hex))
}

/// A complete block that could not be turned into a command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseIssue {
    /// Byte offset of the block's opening marker in the parsed text.
    pub offset: usize,
    /// Block kind.
    pub kind: CommandKind,
    /// Why the block was rejected.
    pub reason: String,
}

/// Result of one parse pass.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ParseOutput {
    /// Complete, well-formed commands in source order (duplicates removed).
    pub commands: Vec<EditCommand>,
    /// Text starting at the first incomplete block (or a dangling partial marker).
    pub remainder: String,
    /// Free-form text outside of any block.
    pub prose: String,
    /// Complete blocks that were rejected as malformed.
    pub issues: Vec<ParseIssue>,
}

impl ParseOutput {
    /// Returns `true` when the input ends inside an unterminated block.
    pub fn is_incomplete(&self) -> bool {
        !self.remainder.is_empty()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Section {
    Search,
    With,
    After,
    Before,
    Content,
}

fn find_start_marker(text: &str, from: usize) -> Option<(usize, &'static str, CommandKind)> {
    START_MARKERS
        .iter()
        .filter_map(|(marker, kind)| {
            text[from..]
                .find(marker)
                .map(|pos| (from + pos, *marker, *kind))
        })
        .min_by_key(|(pos, _, _)| *pos)
}

/// Length of a trailing prefix of a start marker (`"<<<REP"`), which may complete in a later chunk.
fn dangling_marker_len(text: &str) -> usize {
    let longest = START_MARKERS
        .iter()
        .map(|(marker, _)| marker.len())
        .max()
        .unwrap_or(0);
    (1..longest.min(text.len() + 1))
        .rev()
        .find(|&len| {
            START_MARKERS
                .iter()
                .any(|(marker, _)| text.ends_with(&marker[..len]))
        })
        .unwrap_or(0)
}

/// Parse every complete block in `text`.
///
/// Incomplete trailing blocks are returned in [`ParseOutput::remainder`]; they are not errors.
pub fn parse_commands(text: &str) -> ParseOutput {
    let mut output = ParseOutput::default();
    let mut seen: HashSet<CommandId> = HashSet::new();
    let mut cursor = 0usize;

    loop {
        let Some((start, marker, kind)) = find_start_marker(text, cursor) else {
            let tail = &text[cursor..];
            let dangling = dangling_marker_len(tail);
            output.prose.push_str(&tail[..tail.len() - dangling]);
            output.remainder.push_str(&tail[tail.len() - dangling..]);
            break;
        };

        output.prose.push_str(&text[cursor..start]);
        let body_start = start + marker.len();

        let Some(end_rel) = text[body_start..].find(END_MARKER) else {
            output.remainder.push_str(&text[start..]);
            break;
        };
        let end = body_start + end_rel;

        // A new block opened before this one was terminated: the first block is abandoned.
        if let Some((nested, _, _)) = find_start_marker(text, body_start)
            && nested < end
        {
            output.issues.push(ParseIssue {
                offset: start,
                kind,
                reason: "block was not terminated before the next block started".to_string(),
            });
            tracing::warn!(offset = start, "abandoning unterminated {} block", kind.tag());
            cursor = nested;
            continue;
        }

        match parse_block(kind, &text[body_start..end]) {
            Ok(command) => {
                if seen.insert(command.id().clone()) {
                    output.commands.push(command);
                }
            }
            Err(reason) => {
                tracing::warn!(offset = start, %reason, "skipping malformed {} block", kind.tag());
                output.issues.push(ParseIssue {
                    offset: start,
                    kind,
                    reason,
                });
            }
        }

        cursor = end + END_MARKER.len();
    }

    output
}

fn strip_structural_breaks(content: &str) -> &str {
    let content = content
        .strip_prefix("\r\n")
        .or_else(|| content.strip_prefix('\n'))
        .unwrap_or(content);
    content
        .strip_suffix("\r\n")
        .or_else(|| content.strip_suffix('\n'))
        .unwrap_or(content)
}

fn parse_block(kind: CommandKind, body: &str) -> Result<EditCommand, String> {
    let mut markers: Vec<(usize, &str, Section)> = Vec::new();
    for (marker, section) in SECTION_MARKERS {
        for (pos, _) in body.match_indices(marker) {
            markers.push((pos, marker, section));
        }
    }
    markers.sort_by_key(|(pos, _, _)| *pos);

    let header_end = markers.first().map(|(pos, _, _)| *pos).unwrap_or(body.len());
    let file = parse_file_header(&body[..header_end])
        .ok_or_else(|| "missing FILE: header".to_string())?;

    let mut sections: Vec<(Section, &str)> = Vec::with_capacity(markers.len());
    for (idx, (pos, marker, section)) in markers.iter().enumerate() {
        let content_start = pos + marker.len();
        let content_end = markers
            .get(idx + 1)
            .map(|(next, _, _)| *next)
            .unwrap_or(body.len());
        if sections.iter().any(|(seen, _)| seen == section) {
            return Err(format!("duplicate {} section", marker));
        }
        sections.push((*section, strip_structural_breaks(&body[content_start..content_end])));
    }

    let section = |wanted: Section| {
        sections
            .iter()
            .find(|(section, _)| *section == wanted)
            .map(|(_, content)| *content)
    };

    match kind {
        CommandKind::Replace => {
            if section(Section::After).is_some()
                || section(Section::Before).is_some()
                || section(Section::Content).is_some()
            {
                return Err("REPLACE block contains INSERT sections".to_string());
            }
            let search = section(Section::Search).ok_or("missing <<<SEARCH>>> section")?;
            let replacement = section(Section::With).ok_or("missing <<<WITH>>> section")?;
            if search.is_empty() {
                return Err("empty <<<SEARCH>>> section".to_string());
            }
            Ok(EditCommand::replace(file, search, replacement))
        }
        CommandKind::Insert => {
            if section(Section::Search).is_some() || section(Section::With).is_some() {
                return Err("INSERT block contains REPLACE sections".to_string());
            }
            let content = section(Section::Content).ok_or("missing <<<CONTENT>>> section")?;
            let anchors = Anchors {
                after: section(Section::After)
                    .filter(|s| !s.is_empty())
                    .map(str::to_string),
                before: section(Section::Before)
                    .filter(|s| !s.is_empty())
                    .map(str::to_string),
            };
            if anchors.is_empty() {
                return Err("INSERT block needs an <<<AFTER>>> or <<<BEFORE>>> anchor".to_string());
            }
            Ok(EditCommand::insert(file, anchors, content))
        }
    }
}

fn parse_file_header(header: &str) -> Option<String> {
    let pos = header.find(FILE_PREFIX)?;
    let rest = &header[pos + FILE_PREFIX.len()..];
    let line = rest.lines().next().unwrap_or_default().trim();
    (!line.is_empty()).then(|| line.to_string())
}

/// Incremental parser for streamed generator output.
///
/// Each chunk is appended to an internal buffer; completed blocks are consumed and only commands
/// whose id has not been yielded before are returned.
#[derive(Debug, Default)]
pub struct ProposalStream {
    buffer: String,
    seen: HashSet<CommandId>,
    issues: Vec<ParseIssue>,
}

impl ProposalStream {
    /// Create an empty stream.
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed the next chunk and return newly completed commands.
    pub fn push(&mut self, chunk: &str) -> Vec<EditCommand> {
        self.buffer.push_str(chunk);
        let output = parse_commands(&self.buffer);
        self.buffer = output.remainder;
        self.issues.extend(output.issues);

        output
            .commands
            .into_iter()
            .filter(|command| self.seen.insert(command.id().clone()))
            .collect()
    }

    /// Text still waiting for a terminating marker.
    pub fn pending_text(&self) -> &str {
        &self.buffer
    }

    /// Malformed blocks seen so far.
    pub fn issues(&self) -> &[ParseIssue] {
        &self.issues
    }

    /// Returns `true` if a command with `id` was already yielded.
    pub fn has_seen(&self, id: &CommandId) -> bool {
        self.seen.contains(id)
    }

    /// Drop buffered text and forget yielded ids (e.g. when a new generation starts).
    pub fn reset(&mut self) {
        self.buffer.clear();
        self.seen.clear();
        self.issues.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    const REPLACE_BLOCK: &str =
        "<<<REPLACE>>>\nFILE: src/main.rs\n<<<SEARCH>>>\nfoo()\n<<<WITH>>>\nbar()\n<<<END>>>";

    #[test]
    fn test_parse_replace_block() {
        let output = parse_commands(&format!("Here you go:\n{}\nDone.", REPLACE_BLOCK));
        assert_eq!(output.commands.len(), 1);
        let command = &output.commands[0];
        assert_eq!(command.kind(), CommandKind::Replace);
        assert_eq!(command.file(), "src/main.rs");
        assert_eq!(command.search(), Some("foo()"));
        assert_eq!(command.replacement(), "bar()");
        assert!(!command.is_regex());
        assert_eq!(output.prose, "Here you go:\n\nDone.");
        assert!(output.remainder.is_empty());
    }

    #[test]
    fn test_parse_insert_block_with_both_anchors() {
        let text = "<<<INSERT>>>\nFILE: a.txt\n<<<AFTER>>>\nX\n<<<BEFORE>>>\nY\n<<<CONTENT>>>\n<ins>\n<<<END>>>";
        let output = parse_commands(text);
        assert_eq!(output.commands.len(), 1);
        let command = &output.commands[0];
        assert_eq!(command.kind(), CommandKind::Insert);
        assert_eq!(command.anchors(), Some(&Anchors::between("X", "Y")));
        assert_eq!(command.replacement(), "<ins>");
    }

    #[test]
    fn test_inline_header_form() {
        let text = "<<<REPLACE>>> FILE: a.txt <<<SEARCH>>> old <<<WITH>>> new <<<END>>>";
        let output = parse_commands(text);
        assert_eq!(output.commands.len(), 1);
        assert_eq!(output.commands[0].file(), "a.txt");
        assert_eq!(output.commands[0].search(), Some(" old "));
    }

    #[test]
    fn test_multiline_bodies_keep_inner_newlines() {
        let text = "<<<REPLACE>>>\nFILE: a\n<<<SEARCH>>>\nline1\nline2\n\n<<<WITH>>>\nx\r\n<<<END>>>";
        let output = parse_commands(text);
        assert_eq!(output.commands[0].search(), Some("line1\nline2\n"));
        assert_eq!(output.commands[0].replacement(), "x");
    }

    #[test]
    fn test_incomplete_block_is_remainder() {
        let text = format!("{}\n<<<INSERT>>>\nFILE: a\n<<<AFTER>>>\nfoo", REPLACE_BLOCK);
        let output = parse_commands(&text);
        assert_eq!(output.commands.len(), 1);
        assert!(output.is_incomplete());
        assert!(output.remainder.starts_with("<<<INSERT>>>"));
        assert!(output.issues.is_empty());
    }

    #[test]
    fn test_dangling_partial_marker_is_kept() {
        let output = parse_commands("some text <<<REPL");
        assert_eq!(output.prose, "some text ");
        assert_eq!(output.remainder, "<<<REPL");
    }

    #[test]
    fn test_insert_without_anchors_is_an_issue() {
        let output =
            parse_commands("<<<INSERT>>>\nFILE: a\n<<<CONTENT>>>\nnew\n<<<END>>>\ntrailing");
        assert!(output.commands.is_empty());
        assert_eq!(output.issues.len(), 1);
        assert_eq!(output.issues[0].kind, CommandKind::Insert);
        assert_eq!(output.prose, "\ntrailing");
    }

    #[test]
    fn test_missing_file_header_is_an_issue() {
        let output = parse_commands("<<<REPLACE>>>\n<<<SEARCH>>>\na\n<<<WITH>>>\nb\n<<<END>>>");
        assert!(output.commands.is_empty());
        assert_eq!(output.issues[0].reason, "missing FILE: header");
    }

    #[test]
    fn test_unterminated_block_followed_by_complete_block() {
        let text = format!(
            "<<<REPLACE>>>\nFILE: a\n<<<SEARCH>>>\nx\n{}",
            REPLACE_BLOCK
        );
        let output = parse_commands(&text);
        assert_eq!(output.commands.len(), 1);
        assert_eq!(output.commands[0].file(), "src/main.rs");
        assert_eq!(output.issues.len(), 1);
    }

    #[test]
    fn test_ids_are_deterministic_and_deduplicated() {
        let text = format!("{}\n{}", REPLACE_BLOCK, REPLACE_BLOCK);
        let first = parse_commands(&text);
        let second = parse_commands(REPLACE_BLOCK);
        assert_eq!(first.commands.len(), 1);
        assert_eq!(first.commands[0].id(), second.commands[0].id());
        assert!(first.commands[0].id().as_str().starts_with("replace-"));
    }

    #[test]
    fn test_ids_differ_by_payload() {
        let a = EditCommand::replace("a", "x", "y");
        let b = EditCommand::replace("a", "x", "z");
        let c = EditCommand::replace("a", "x", "y").with_regex(true);
        assert_ne!(a.id(), b.id());
        assert_ne!(a.id(), c.id());
        let anchored_after = EditCommand::insert("a", Anchors::after("x"), "y");
        let anchored_before = EditCommand::insert("a", Anchors::before("x"), "y");
        assert_ne!(anchored_after.id(), anchored_before.id());
    }

    #[test]
    fn test_stream_yields_each_command_once() {
        let mut stream = ProposalStream::new();
        let mut yielded = Vec::new();
        for chunk in REPLACE_BLOCK.as_bytes().chunks(7) {
            yielded.extend(stream.push(std::str::from_utf8(chunk).unwrap()));
        }
        assert_eq!(yielded.len(), 1);
        assert!(stream.pending_text().is_empty());

        // The generator repeats itself: nothing new.
        assert!(stream.push(REPLACE_BLOCK).is_empty());
        assert!(stream.has_seen(yielded[0].id()));
    }
}
