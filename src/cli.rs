use std::path::PathBuf;

use clap::{Parser, Subcommand};
use colored::*;

use crate::config::Overrides;
use crate::dataset::{CandidateRecord, Category};
use crate::display::{self, Clipboard};
use crate::error::Result;
use crate::selection::Progress;

#[derive(Parser, Debug)]
#[command(name = "mimi-match")]
#[command(version)]
#[command(about = "Swipe through baby names, keep the ones you like, review the shortlist")]
pub struct Args {
    /// Path to config.toml (defaults to the platform config directory)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// SQLite file holding settings and decisions
    #[arg(long, global = true)]
    pub store: Option<PathBuf>,

    /// JSON dataset to use instead of the bundled names
    #[arg(long, global = true)]
    pub dataset: Option<PathBuf>,

    /// Shuffle seed for a reproducible presentation order
    #[arg(long, global = true)]
    pub seed: Option<u64>,

    /// Delay before a swipe is applied, in milliseconds
    #[arg(long, global = true)]
    pub settle_ms: Option<u64>,

    /// Disable coloured output
    #[arg(long, global = true)]
    pub no_color: bool,

    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Subcommand, Debug, Clone, PartialEq)]
pub enum Command {
    /// Swipe through candidates interactively (default)
    Swipe,
    /// Show the shortlist
    List,
    /// Remove a name from the shortlist so it shows up again
    Remove { name: String },
    /// Forget every decision
    Reset,
    /// Show or change the category filter and surname
    Settings {
        #[arg(long, value_enum)]
        category: Option<Category>,
        /// Family surname shown after each name (may be empty)
        #[arg(long)]
        label: Option<String>,
    },
    /// Copy one shortlist entry with the surname
    Copy { name: String },
    /// Share the shortlist
    Share,
    /// Print how many candidates have been decided
    Progress,
    /// Print a shell completion script
    Completions {
        #[arg(value_enum)]
        shell: clap_complete::Shell,
    },
}

impl Args {
    pub fn overrides(&self) -> Overrides {
        Overrides {
            config: self.config.clone(),
            dataset: self.dataset.clone(),
            store: self.store.clone(),
            settle_ms: self.settle_ms,
            seed: self.seed,
        }
    }

    /// The subcommand to run; a bare invocation starts swiping.
    pub fn action(&self) -> Command {
        self.command.clone().unwrap_or(Command::Swipe)
    }
}

// ---------------------------------------------------------------------------
// Rendering
// ---------------------------------------------------------------------------

/// The candidate card: full name, optional fact, and progress.
pub fn render_card(record: &CandidateRecord, label: &str, progress: Progress) -> String {
    let mut out = String::new();
    out.push_str(&format!("{}\n\n", format!("[{progress}]").dimmed()));
    out.push_str(&format!(
        "    {}\n",
        display::full_name(&record.key, label).bold().bright_magenta()
    ));
    if let Some(fact) = &record.annotation {
        out.push_str(&format!("\n    {}\n", fact.italic().dimmed()));
    }
    out
}

/// Shown once every candidate in the category has been decided.
pub fn render_exhausted(progress: Progress) -> String {
    format!(
        "{}\n{}\n",
        "To je vše!".bold(),
        format!("Prošli jste všechna jména v této kategorii ({progress}).").dimmed()
    )
}

pub fn render_shortlist(kept: &[String], label: &str) -> String {
    if kept.is_empty() {
        return format!("{}\n", "Zatím jste nevybrali žádná jména.".dimmed());
    }
    let mut out = format!("{} {}\n", kept.len().to_string().bold(), "vybraných jmen".dimmed());
    for name in kept {
        out.push_str(&format!("  {} {}\n", "♥".bright_magenta(), display::shortlist_entry(name, label)));
    }
    out
}

pub fn render_settings(label: &str, category: Category) -> String {
    let label = if label.is_empty() { "(none)".dimmed().to_string() } else { label.to_string() };
    format!("surname:  {label}\ncategory: {category}\n")
}

pub const SWIPE_HELP: &str = "[l] líbí  [d] další  [s] seznam  [q] konec";

/// Terminal stand-in for a clipboard: prints the text for the user to copy.
pub struct PrintClipboard;

impl Clipboard for PrintClipboard {
    fn copy(&self, text: &str) -> Result<()> {
        println!("{text}");
        Ok(())
    }
}
