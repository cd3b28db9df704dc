//! CLI parse: clap types for Lexis. No behavior; definitions only.

use clap::{Args, Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

/// Lexis CLI - resumable vocabulary enrichment
#[derive(Parser)]
#[command(name = "lexis")]
#[command(about = "Build a vocabulary dictionary and audio clips with resumable batch jobs")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Workspace root directory
    #[arg(long, global = true, default_value = ".")]
    pub workspace: PathBuf,

    /// Configuration file path (overrides default config loading)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Enable verbose logging (default: off)
    #[arg(long, global = true, default_value = "false")]
    pub verbose: bool,

    /// Only log errors
    #[arg(long, short = 'q', global = true, conflicts_with = "verbose")]
    pub quiet: bool,

    /// Log level (trace, debug, info, warn, error, off)
    #[arg(long, global = true)]
    pub log_level: Option<String>,

    /// Log format (json, text)
    #[arg(long, global = true)]
    pub log_format: Option<String>,

    /// Log output (stdout, stderr, file, both)
    #[arg(long, global = true)]
    pub log_output: Option<String>,

    /// Log file path (if output includes "file")
    #[arg(long, global = true)]
    pub log_file: Option<PathBuf>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Generate the word list, one letter at a time
    Words {
        #[command(flatten)]
        start: StartArgs,
    },
    /// Generate a detailed dictionary entry for every word in the word list
    Details {
        #[command(flatten)]
        start: StartArgs,
    },
    /// Synthesize example and pronunciation clips for every dictionary word
    Audio,
    /// Show statistics for a checkpoint document
    Stats {
        /// Document to summarize
        #[arg(long, value_enum, default_value = "dictionary")]
        target: Target,
        /// Output format (text or json)
        #[arg(long, default_value = "text")]
        format: String,
        /// List every incomplete word
        #[arg(long)]
        incomplete: bool,
    },
    /// Check stored statistics against the records they summarize
    Verify {
        /// Document to check (default: both)
        #[arg(long, value_enum)]
        target: Option<Target>,
        /// Rewrite drifted statistics
        #[arg(long)]
        fix: bool,
    },
}

/// How to treat an existing checkpoint
#[derive(Args, Debug, Clone, Copy, Default)]
pub struct StartArgs {
    /// Continue from the existing checkpoint without asking
    #[arg(long, conflicts_with = "fresh")]
    pub resume: bool,

    /// Back up the existing checkpoint and start over without asking
    #[arg(long)]
    pub fresh: bool,
}

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum Target {
    WordList,
    Dictionary,
}

impl Target {
    pub const ALL: [Target; 2] = [Target::WordList, Target::Dictionary];

    pub fn label(self) -> &'static str {
        match self {
            Target::WordList => "word list",
            Target::Dictionary => "dictionary",
        }
    }
}
