use proposal_core::{CommandKind, EditCommand, ProposalStream, parse_commands};
use proptest::prelude::*;

const TRANSCRIPT: &str = "\
Let me fix both spots.
<<<REPLACE>>>
FILE: src/app.rs
<<<SEARCH>>>
let count = 0;
<<<WITH>>>
let mut count = 0;
<<<END>>>
And add a comment, with ünïcödé:
<<<INSERT>>>
FILE: src/app.rs
<<<BEFORE>>>
fn run() {
<<<CONTENT>>>
/// Runs the app.
<<<END>>>
Done.
";

/// Split `text` at the given char positions (sorted, deduplicated, clamped).
fn split_at_chars(text: &str, mut cuts: Vec<usize>) -> Vec<String> {
    let chars: Vec<char> = text.chars().collect();
    cuts.iter_mut().for_each(|cut| *cut = (*cut).min(chars.len()));
    cuts.sort_unstable();
    cuts.dedup();

    let mut chunks = Vec::new();
    let mut start = 0usize;
    for cut in cuts.into_iter().chain(std::iter::once(chars.len())) {
        chunks.push(chars[start..cut].iter().collect());
        start = cut;
    }
    chunks
}

#[test]
fn test_transcript_parses_into_two_commands() {
    let output = parse_commands(TRANSCRIPT);
    let kinds: Vec<CommandKind> = output.commands.iter().map(EditCommand::kind).collect();
    assert_eq!(kinds, vec![CommandKind::Replace, CommandKind::Insert]);
    assert!(output.issues.is_empty());
    assert!(output.remainder.is_empty());
}

proptest! {
    /// Any chunking yields each command exactly once, identical to a one-shot parse
    #[test]
    fn chunked_stream_yields_each_command_once(cuts in prop::collection::vec(0usize..300, 0..12)) {
        let expected = parse_commands(TRANSCRIPT).commands;
        let mut stream = ProposalStream::new();
        let mut yielded = Vec::new();
        for chunk in split_at_chars(TRANSCRIPT, cuts) {
            yielded.extend(stream.push(&chunk));
        }
        prop_assert_eq!(yielded, expected);
        prop_assert!(stream.pending_text().is_empty());
    }

    /// Reparsing a growing prefix never invents commands that the full text lacks
    #[test]
    fn prefixes_only_yield_known_commands(len in 0usize..300) {
        let full = parse_commands(TRANSCRIPT).commands;
        let prefix: String = TRANSCRIPT.chars().take(len).collect();
        for command in parse_commands(&prefix).commands {
            prop_assert!(full.contains(&command));
        }
    }
}
