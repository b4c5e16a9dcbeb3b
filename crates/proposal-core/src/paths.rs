//! Matching a command's `FILE:` header against the open document.

/// How a command path matched the open file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileMatch {
    /// Identical after normalization.
    Exact,
    /// One path is a suffix of the other on a component boundary.
    Suffix,
    /// Only the final components agree.
    Basename,
}

fn normalize(path: &str) -> String {
    let path = path.trim().replace('\\', "/");
    let mut parts: Vec<&str> = Vec::new();
    for part in path.split('/') {
        match part {
            "" | "." => {}
            _ => parts.push(part),
        }
    }
    parts.join("/")
}

fn has_component_suffix(long: &str, short: &str) -> bool {
    long.len() > short.len()
        && long.ends_with(short)
        && long.as_bytes()[long.len() - short.len() - 1] == b'/'
}

/// Match `command_file` against `open_file`.
///
/// Separators and `./` prefixes are normalized first. Suffix matches must fall on a path
/// component boundary (`src/lib.rs` matches `/repo/src/lib.rs`, `b.rs` does not match `ab.rs`).
/// Basename-only matches are accepted when `basename_fallback` is set.
pub fn match_file(command_file: &str, open_file: &str, basename_fallback: bool) -> Option<FileMatch> {
    let command = normalize(command_file);
    let open = normalize(open_file);
    if command.is_empty() || open.is_empty() {
        return None;
    }
    if command == open {
        return Some(FileMatch::Exact);
    }
    if has_component_suffix(&open, &command) || has_component_suffix(&command, &open) {
        return Some(FileMatch::Suffix);
    }

    let basename = |path: &str| path.rsplit('/').next().map(str::to_string);
    if basename_fallback && basename(&command) == basename(&open) {
        return Some(FileMatch::Basename);
    }
    None
}
