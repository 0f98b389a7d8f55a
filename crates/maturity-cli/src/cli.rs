use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

use maturity_core::Answer;

#[derive(Debug, Parser)]
#[command(
    name = "maturity",
    version,
    about = "Maturity questionnaire: weighted scoring and folder sync"
)]
pub struct Cli {
    /// Config file. Defaults to the platform config directory.
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

/// Composite key of an assessment.
#[derive(Debug, Clone, Args)]
pub struct Target {
    /// Application name
    pub name: String,
    /// Interview name (defaults to the application name)
    #[arg(long, short)]
    pub interview: Option<String>,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Start an interview, or resume an existing one
    Start {
        #[command(flatten)]
        target: Target,
        /// Respondent profile (developer, qa, devops, manager)
        #[arg(long, short)]
        profile: Option<String>,
    },
    /// Record a yes/no answer
    Answer {
        #[command(flatten)]
        target: Target,
        question: String,
        answer: Answer,
        /// Profile that gave the answer
        #[arg(long)]
        by: Option<String>,
    },
    /// Remove an answer
    Clear {
        #[command(flatten)]
        target: Target,
        question: String,
    },
    /// Set a comment on a question; empty text removes it
    Comment {
        #[command(flatten)]
        target: Target,
        question: String,
        text: String,
    },
    /// Print per-theme maturity scores
    Scores {
        #[command(flatten)]
        target: Target,
        #[arg(long)]
        json: bool,
    },
    /// List stored assessments
    List,
    /// Delete an assessment and its sync file
    Delete {
        #[command(flatten)]
        target: Target,
    },
    /// Sync with a folder from now on
    SyncFolder { dir: PathBuf },
    /// Stop syncing
    SyncOff,
    /// Import from and export to the sync folder once
    Sync,
    /// Keep importing on the adaptive schedule until Ctrl-C
    Watch,
    /// Write every assessment to one JSON backup file
    Export { file: Option<PathBuf> },
    /// Merge a JSON backup file
    Import { file: PathBuf },
    /// Print the effective configuration
    Config {
        /// Write it to the config file, migrating an older one in place
        #[arg(long)]
        init: bool,
    },
    /// Print the active question catalog
    Catalog {
        /// Only questions shown to this profile
        #[arg(long, short)]
        profile: Option<String>,
        /// Print the catalog in the custom catalog file format
        #[arg(long)]
        json: bool,
    },
}

impl Command {
    /// Whether the command should re-attach the sync folder first, so
    /// saves reach it.
    pub fn uses_folder(&self) -> bool {
        matches!(
            self,
            Self::Start { .. }
                | Self::Answer { .. }
                | Self::Clear { .. }
                | Self::Comment { .. }
                | Self::Delete { .. }
                | Self::Sync
                | Self::Watch
                | Self::Import { .. }
        )
    }
}
