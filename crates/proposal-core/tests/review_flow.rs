use proposal_core::{
    Anchors, BufferSurface, EditCommand, ErrorKind, HighlightRegionManager, OverlayKind,
    PopoverAction, RegionStatus, ReviewConfig, ReviewEvent, SkipReason, Surface, parse_commands,
};
use pretty_assertions::assert_eq;
use std::sync::{Arc, Mutex};

fn manager_for(file: &str, text: &str, viewport_lines: usize) -> HighlightRegionManager<BufferSurface> {
    HighlightRegionManager::new(
        BufferSurface::new(file, text, viewport_lines),
        ReviewConfig::default(),
    )
}

fn record_events<S: Surface>(manager: &mut HighlightRegionManager<S>) -> Arc<Mutex<Vec<ReviewEvent>>> {
    let events = Arc::new(Mutex::new(Vec::new()));
    let sink = events.clone();
    manager.subscribe(move |event| sink.lock().unwrap().push(event.clone()));
    events
}

#[test]
fn test_replace_hello_world() {
    let mut manager = manager_for("hello.txt", "Hello world", 10);
    let events = record_events(&mut manager);
    let command = EditCommand::replace("hello.txt", "world", "there");

    manager.register_commands(std::slice::from_ref(&command), "hello.txt", false);
    manager.action(PopoverAction::Accept, command.id()).unwrap();

    assert_eq!(manager.surface().current_content(), "Hello there");
    let accepted = events
        .lock()
        .unwrap()
        .iter()
        .find_map(|event| match event {
            ReviewEvent::Accepted { mutated_count, .. } => Some(*mutated_count),
            _ => None,
        });
    assert_eq!(accepted, Some(1));
}

#[test]
fn test_literal_replace_rewrites_every_match() {
    let mut manager = manager_for("a.rs", "let x = 1;\nlet y = x + x;", 10);
    let command = EditCommand::replace("a.rs", "x", "value");
    manager.register_commands(std::slice::from_ref(&command), "a.rs", false);

    let report = manager.apply(command.id()).unwrap();
    assert_eq!(report.mutated_count, 3);
    assert_eq!(
        manager.surface().current_content(),
        "let value = 1;\nlet y = value + value;"
    );
}

#[test]
fn test_insert_between_anchors() {
    let mut manager = manager_for("a.txt", "X+Y", 10);
    let command = EditCommand::insert("a.txt", Anchors::between("X", "Y"), "<ins>");
    manager.register_commands(std::slice::from_ref(&command), "a.txt", false);

    let region = manager.region(command.id()).unwrap();
    assert_eq!((region.from, region.to), (1, 1));
    let kinds: Vec<OverlayKind> = manager.overlays().iter().map(|o| o.kind).collect();
    assert_eq!(kinds, vec![OverlayKind::InsertionCaret]);

    manager.action(PopoverAction::Accept, command.id()).unwrap();
    assert_eq!(manager.surface().current_content(), "X<ins>+Y");
}

#[test]
fn test_reject_leaves_document_untouched() {
    let original = "fn main() {\n    println!(\"hi\");\n}\n";
    let mut manager = manager_for("src/main.rs", original, 10);
    let command = EditCommand::replace("src/main.rs", "\"hi\"", "\"hello\"");
    manager.register_commands(std::slice::from_ref(&command), "src/main.rs", false);

    manager.action(PopoverAction::Reject, command.id()).unwrap();
    assert_eq!(manager.status(command.id()), Some(RegionStatus::Rejected));
    assert_eq!(manager.surface().current_content().as_bytes(), original.as_bytes());
    assert!(manager.overlays().is_empty());
}

#[test]
fn test_accept_then_undo_restores_text_exactly() {
    let original = "alpha beta alpha\r\ngamma 👋 alpha";
    let mut manager = manager_for("notes.md", original, 10);
    let command = EditCommand::replace("notes.md", "alpha", "ω");
    manager.register_commands(std::slice::from_ref(&command), "notes.md", false);

    manager.action(PopoverAction::Accept, command.id()).unwrap();
    assert_eq!(manager.surface().current_content(), "ω beta ω\r\ngamma 👋 ω");

    manager.action(PopoverAction::Undo, command.id()).unwrap();
    assert_eq!(manager.surface().current_content(), original);
    assert_eq!(manager.status(command.id()), Some(RegionStatus::Pending));
}

#[test]
fn test_region_for_other_file_is_never_created() {
    let mut manager = manager_for("src/lib.rs", "pub fn a() {}", 10);
    let command = EditCommand::replace("src/main.rs", "fn", "const fn");
    let outcome = manager.register_commands(std::slice::from_ref(&command), "src/lib.rs", true);

    assert_eq!(outcome.registered, 0);
    assert!(!outcome.is_success());
    assert_eq!(
        outcome.skipped[0].reason,
        SkipReason::FileMismatch {
            file: "src/main.rs".to_string()
        }
    );
    assert_eq!(manager.status(command.id()), None);
}

#[test]
fn test_unresolved_commands_are_skipped_silently() {
    let mut manager = manager_for("a.txt", "Y then X", 10);
    let commands = vec![
        EditCommand::replace("a.txt", "missing", "x"),
        EditCommand::insert("a.txt", Anchors::between("X", "Y"), "!"),
        EditCommand::replace("a.txt", "(", "x").with_regex(true),
    ];
    let outcome = manager.register_commands(&commands, "a.txt", false);

    let kinds: Vec<ErrorKind> = outcome
        .skipped
        .iter()
        .map(|skipped| match &skipped.reason {
            SkipReason::Unresolved { kind, .. } => *kind,
            other => panic!("unexpected skip reason {:?}", other),
        })
        .collect();
    assert_eq!(
        kinds,
        vec![
            ErrorKind::NoMatchFound,
            ErrorKind::AnchorOrderViolation,
            ErrorKind::InvalidPattern
        ]
    );
    assert_eq!(manager.region_count(), 0);
}

#[test]
fn test_duplicate_registration_is_idempotent() {
    let mut manager = manager_for("a.txt", "one two three", 10);
    let events = record_events(&mut manager);
    let command = EditCommand::replace("a.txt", "two", "2");

    manager.register_commands(std::slice::from_ref(&command), "a.txt", false);
    let created = events.lock().unwrap().len();
    let outcome = manager.register_commands(std::slice::from_ref(&command), "a.txt", false);

    assert_eq!(outcome.unchanged, 1);
    assert!(outcome.is_success());
    assert_eq!(manager.region_count(), 1);
    assert_eq!(events.lock().unwrap().len(), created);
}

#[test]
fn test_changed_payload_replaces_overlays_in_order() {
    let mut manager = manager_for("a.txt", "one two three", 10);
    let first = EditCommand::replace("a.txt", "two", "2").with_id("proposal");
    let second = EditCommand::replace("a.txt", "three", "3").with_id("proposal");

    manager.register_commands(std::slice::from_ref(&first), "a.txt", false);
    let old_ids: Vec<_> = manager.overlays().iter().map(|o| o.id).collect();
    manager.register_commands(std::slice::from_ref(&second), "a.txt", false);
    let new_ids: Vec<_> = manager.overlays().iter().map(|o| o.id).collect();

    assert_eq!(manager.region_count(), 1);
    assert!(!new_ids.is_empty());
    assert!(new_ids.iter().all(|new| old_ids.iter().all(|old| old < new)));
    let region = manager.region(first.id()).unwrap();
    assert_eq!((region.from, region.to), (8, 13));
}

#[test]
fn test_overlays_follow_the_viewport() {
    let text: String = (0..40).map(|i| format!("line {}\n", i)).collect();
    let mut manager = manager_for("long.txt", &text, 5);
    let command = EditCommand::replace("long.txt", "line 30", "line thirty");

    manager.register_commands(std::slice::from_ref(&command), "long.txt", false);
    assert_eq!(manager.status(command.id()), Some(RegionStatus::Pending));
    assert!(manager.overlays().is_empty());

    manager.register_commands(std::slice::from_ref(&command), "long.txt", true);
    assert!(!manager.overlays().is_empty());
    assert_eq!(manager.surface().scroll_top(), 28);

    manager.surface_mut().set_scroll_top(0);
    manager.refresh();
    assert!(manager.overlays().is_empty());
    assert_eq!(manager.status(command.id()), Some(RegionStatus::Pending));
}

#[test]
fn test_refresh_drops_region_when_text_disappears() {
    let mut manager = manager_for("a.txt", "keep remove", 10);
    let events = record_events(&mut manager);
    let command = EditCommand::replace("a.txt", "remove", "erase");
    manager.register_commands(std::slice::from_ref(&command), "a.txt", false);

    manager.surface_mut().set_text("keep");
    manager.refresh();

    assert_eq!(manager.status(command.id()), None);
    assert!(events.lock().unwrap().contains(&ReviewEvent::RegionDropped {
        id: command.id().clone()
    }));
}

#[test]
fn test_single_popover_instance() {
    let mut manager = manager_for("a.txt", "first second", 10);
    let events = record_events(&mut manager);
    let a = EditCommand::replace("a.txt", "first", "1st");
    let b = EditCommand::replace("a.txt", "second", "2nd");
    manager.register_commands(&[a.clone(), b.clone()], "a.txt", false);

    manager.pointer_enter(a.id());
    manager.pointer_enter(b.id());
    manager.pointer_enter(b.id());

    let opened = events
        .lock()
        .unwrap()
        .iter()
        .filter(|e| matches!(e, ReviewEvent::PopoverOpened { .. }))
        .count();
    let closed = events
        .lock()
        .unwrap()
        .iter()
        .filter(|e| matches!(e, ReviewEvent::PopoverClosed { .. }))
        .count();
    assert_eq!((opened, closed), (2, 1));
    assert_eq!(manager.popover().map(|p| p.preview_text()), Some("2nd".to_string()));
}

#[test]
fn test_regex_replace_only_touches_first_match() {
    let mut manager = manager_for("a.txt", "v1 v2 v3", 10);
    let command = EditCommand::replace("a.txt", r"v(\d)", "version-$1").with_regex(true);
    manager.register_commands(std::slice::from_ref(&command), "a.txt", false);
    assert_eq!(manager.region(command.id()).unwrap().proposed_text, "version-1");

    manager.action(PopoverAction::Accept, command.id()).unwrap();
    assert_eq!(manager.surface().current_content(), "version-1 v2 v3");
}

#[test]
fn test_parsed_transcript_end_to_end() {
    let transcript = "\
Two fixes:
<<<REPLACE>>>
FILE: src/greet.rs
<<<SEARCH>>>
println!(\"Hi\");
<<<WITH>>>
println!(\"Hello\");
<<<END>>>
<<<INSERT>>>
FILE: src/greet.rs
<<<AFTER>>>
fn greet() {
<<<CONTENT>>>

    // greet the user
<<<END>>>
";
    let parsed = parse_commands(transcript);
    assert_eq!(parsed.commands.len(), 2);

    let mut manager = manager_for("/work/src/greet.rs", "fn greet() {\n    println!(\"Hi\");\n}\n", 10);
    let outcome = manager.register_commands(&parsed.commands, "/work/src/greet.rs", true);
    assert_eq!(outcome.registered, 2);

    for id in manager.pending_ids() {
        manager.action(PopoverAction::Accept, &id).unwrap();
    }
    assert_eq!(
        manager.surface().current_content(),
        "fn greet() {\n    // greet the user\n    println!(\"Hello\");\n}\n"
    );
}

#[test]
fn test_remove_all_clears_registry() {
    let mut manager = manager_for("a.txt", "a b c", 10);
    let commands = vec![
        EditCommand::replace("a.txt", "a", "A"),
        EditCommand::replace("a.txt", "b", "B"),
    ];
    manager.register_commands(&commands, "a.txt", false);
    manager.pointer_enter(commands[0].id());

    assert_eq!(manager.remove_all(), 2);
    assert_eq!(manager.region_count(), 0);
    assert!(manager.overlays().is_empty());
    assert!(manager.popover().is_none());
}

#[test]
fn test_manager_over_borrowed_surface() {
    let mut surface = BufferSurface::new("a.txt", "Hello world", 10);
    {
        let mut manager = HighlightRegionManager::new(&mut surface, ReviewConfig::default());
        let command = EditCommand::replace("a.txt", "Hello", "Goodbye");
        manager.register_commands(std::slice::from_ref(&command), "a.txt", false);
        manager.apply(command.id()).unwrap();
    }
    assert_eq!(surface.current_content(), "Goodbye world");
}
