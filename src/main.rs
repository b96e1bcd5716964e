use std::io::Write;
use std::sync::Arc;

use clap::{CommandFactory, Parser};
use colored::*;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing_subscriber::EnvFilter;

use mimi_match::cli::{self, Args, Command, PrintClipboard};
use mimi_match::config::AppConfig;
use mimi_match::dataset::Dataset;
use mimi_match::display::{share_list, Clipboard, ShareOutcome};
use mimi_match::session::{Session, SessionOptions};
use mimi_match::storage::{KeyValueStore, SqliteStore};

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    init_tracing();
    let args = Args::parse();

    if args.no_color {
        colored::control::set_override(false);
    }

    if let Command::Completions { shell } = args.action() {
        let mut cmd = Args::command();
        clap_complete::generate(shell, &mut cmd, "mimi-match", &mut std::io::stdout());
        return Ok(());
    }

    let config = AppConfig::resolve(args.overrides())?;
    let dataset = match &config.dataset {
        Some(path) => Dataset::load(path)?,
        None => Dataset::bundled()?,
    };
    let store: Arc<dyn KeyValueStore> = Arc::new(SqliteStore::open(&config.store)?);
    tracing::debug!(store = %config.store.display(), "using state store");

    let options = SessionOptions {
        settle: config.settle,
        seed: config.seed,
        background_writes: true,
    };
    let mut session = Session::open(dataset, store, options);

    match args.action() {
        Command::Swipe => swipe(&mut session).await?,
        Command::List => {
            print!("{}", cli::render_shortlist(&session.kept(), &session.settings().label));
        }
        Command::Remove { name } => {
            if session.kept().contains(&name) {
                session.remove(&name);
                println!("{} {}", "removed".dimmed(), name);
            } else {
                eprintln!("{} '{}' is not on the shortlist", "[remove]".yellow(), name);
            }
        }
        Command::Reset => {
            session.reset_all();
            println!("{}", "All decisions cleared.".dimmed());
        }
        Command::Settings { category, label } => {
            if let Some(category) = category {
                session.set_category(category);
            }
            if let Some(label) = label {
                session.set_label(label);
            }
            let settings = session.settings();
            print!("{}", cli::render_settings(&settings.label, settings.category));
        }
        Command::Copy { name } => match session.shortlist_entry(&name) {
            Some(entry) => PrintClipboard.copy(&entry)?,
            None => eprintln!("{} '{}' is not on the shortlist", "[copy]".yellow(), name),
        },
        Command::Share => {
            let text = session.share_text();
            if text.is_empty() {
                print!("{}", cli::render_shortlist(&[], ""));
            } else if share_list(None, &PrintClipboard, &text) == ShareOutcome::Copied {
                eprintln!("{}", "Seznam připraven ke zkopírování.".dimmed());
            }
        }
        Command::Progress => {
            let progress = session.progress();
            println!("{}/{}", progress.seen, progress.total);
        }
        Command::Completions { .. } => {}
    }

    session.close().await;
    Ok(())
}

// ---------------------------------------------------------------------------
// Interactive swipe loop
// ---------------------------------------------------------------------------

async fn swipe(session: &mut Session) -> std::io::Result<()> {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    loop {
        let progress = session.progress();
        match session.current_candidate() {
            Some(candidate) => {
                println!();
                print!("{}", cli::render_card(&candidate, &session.settings().label, progress));
                println!("\n{}", cli::SWIPE_HELP.dimmed());
            }
            None => {
                println!();
                print!("{}", cli::render_exhausted(progress));
                println!("{}", "[r] začít znovu  [s] seznam  [q] konec".dimmed());
            }
        }
        print!("> ");
        std::io::stdout().flush()?;

        let Some(line) = lines.next_line().await? else {
            break;
        };
        match line.trim().to_lowercase().as_str() {
            "l" | "like" | "+" | "\u{1b}[c" => {
                let submission = session.like_current();
                if submission.is_accepted() {
                    println!("{}", "♥ líbí".bright_magenta());
                }
                submission.settled().await;
            }
            "d" | "x" | "-" | "\u{1b}[d" => {
                let submission = session.discard_current();
                if submission.is_accepted() {
                    println!("{}", "✕ další".red());
                }
                submission.settled().await;
            }
            "r" | "reset" => session.reset_all(),
            "s" | "list" => {
                println!();
                print!("{}", cli::render_shortlist(&session.kept(), &session.settings().label));
            }
            "q" | "quit" => break,
            "" => {}
            other => eprintln!("{} unknown input '{}'", "[swipe]".yellow(), other),
        }
    }
    Ok(())
}
