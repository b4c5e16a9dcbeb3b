//! Terminal review front-end.
//!
//! Opens a document and a transcript of proposed edits, highlights every proposal in place and
//! lets you accept or reject each one from a popover.
//!
//! # Usage
//!
//! ```bash
//! cargo run -p review-tui -- notes.txt proposals.txt
//! cargo run -p review-tui -- notes.txt proposals.txt --stream --log review.log
//! ```
//!
//! `--config` takes a JSON file with `ReviewConfig` fields; missing fields keep the terminal
//! defaults. `RUST_LOG` filters the log file (default `info`).
//!
//! # Keys
//!
//! - Tab: scroll to the next pending proposal and open its popover
//! - a / Enter: accept, r: reject, u: undo the last decision
//! - Esc: close the popover
//! - Arrows, PageUp/PageDown, mouse wheel: scroll
//! - Mouse: hover a highlight to open its popover, click Accept/Reject
//! - Ctrl+S: save, q: quit

mod app;
mod ui;

use app::App;
use clap::Parser;
use crossterm::{
    event::{self, DisableMouseCapture, EnableMouseCapture, Event},
    execute,
    terminal::{EnterAlternateScreen, LeaveAlternateScreen, disable_raw_mode, enable_raw_mode},
};
use proposal_core::ReviewConfig;
use ratatui::{Terminal, backend::CrosstermBackend};
use std::{
    fs::{self, File},
    io::{self, stdout},
    path::{Path, PathBuf},
    sync::Arc,
    time::Duration,
};
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

#[derive(Debug, Parser)]
#[command(name = "review-tui", about = "Review generated edit proposals in the terminal")]
struct Args {
    /// Document to review (created on save if missing).
    document: PathBuf,

    /// Transcript containing REPLACE/INSERT blocks.
    proposals: PathBuf,

    /// JSON file with review settings.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Write logs to this file.
    #[arg(long)]
    log: Option<PathBuf>,

    /// Feed the transcript one line per frame, as a generator would.
    #[arg(long)]
    stream: bool,
}

fn init_logging(path: &Path) -> io::Result<()> {
    let file = File::create(path)?;
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(Arc::new(file)).with_ansi(false))
        .with(filter)
        .try_init()
        .map_err(io::Error::other)
}

/// Terminal defaults, with the fields present in `path` laid over them.
fn load_config(path: Option<&Path>) -> io::Result<ReviewConfig> {
    let defaults = ReviewConfig::for_cell_grid();
    let Some(path) = path else {
        return Ok(defaults);
    };
    let invalid = |err: serde_json::Error| io::Error::new(io::ErrorKind::InvalidData, err);

    let overrides: serde_json::Value = serde_json::from_str(&fs::read_to_string(path)?).map_err(invalid)?;
    let mut merged = serde_json::to_value(&defaults).map_err(invalid)?;
    if let (Some(target), Some(source)) = (merged.as_object_mut(), overrides.as_object()) {
        for (key, value) in source {
            target.insert(key.clone(), value.clone());
        }
    }
    serde_json::from_value(merged).map_err(invalid)
}

fn main() -> io::Result<()> {
    let args = Args::parse();

    if let Some(log) = &args.log {
        init_logging(log)?;
    }

    let config = load_config(args.config.as_deref())?;
    let text = if args.document.exists() {
        fs::read_to_string(&args.document)?
    } else {
        String::new()
    };
    let transcript = fs::read_to_string(&args.proposals)?;

    let mut app = App::new(args.document.clone(), &text, config);
    app.load_transcript(&transcript, args.stream);
    tracing::info!(document = %args.document.display(), "review session started");

    enable_raw_mode()?;
    let mut stdout = stdout();
    execute!(stdout, EnterAlternateScreen, EnableMouseCapture)?;

    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    let result = run_app(&mut terminal, &mut app);

    disable_raw_mode()?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen, DisableMouseCapture)?;
    terminal.show_cursor()?;

    if let Err(err) = &result {
        tracing::warn!(%err, "review session ended with an error");
        eprintln!("error: {err}");
    }

    Ok(())
}

fn run_app<B: ratatui::backend::Backend>(terminal: &mut Terminal<B>, app: &mut App) -> io::Result<()> {
    loop {
        app.tick();
        terminal.draw(|f| ui::render(app, f))?;

        if app.should_quit {
            break;
        }

        if event::poll(Duration::from_millis(100))? {
            match event::read()? {
                Event::Key(key) => app.handle_key_event(key),
                Event::Mouse(mouse) => app.handle_mouse_event(mouse),
                Event::Resize(_, _) => {}
                _ => {}
            }
        }
    }

    Ok(())
}
