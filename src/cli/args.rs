//! Command-line argument parsing for musicqna
//!
//! Provides clap-based CLI with subcommands and verbosity control.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// musicqna - Music theory questions answered from a curated curriculum
#[derive(Parser, Debug)]
#[command(name = "musicqna")]
#[command(version)]
#[command(about = "Retrieval-grounded music theory question answering", long_about = None)]
pub struct Args {
    /// Configuration file path (default: ~/.musicqna/config.toml)
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Verbosity level: -q (quiet), default (normal), -v (verbose), -vv (very verbose)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Quiet mode (only errors are logged)
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Subcommand
    #[command(subcommand)]
    pub command: Commands,
}

/// Available subcommands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Embed the curriculum and persist the embedding bundle
    Embed {
        /// Regenerate even if the bundle is newer than the curriculum
        #[arg(long)]
        force: bool,
    },

    /// Show the re-ranked concepts retrieved for a query
    Search {
        /// Query text
        #[arg(value_name = "QUERY")]
        query: String,

        /// Number of results (default: retrieval.top_k)
        #[arg(short = 'k', long)]
        top_k: Option<usize>,

        /// Drop results whose raw similarity is below this
        #[arg(long)]
        min_score: Option<f32>,
    },

    /// Answer one or more questions
    Ask {
        /// Questions to answer, in order
        #[arg(value_name = "QUESTION", required = true)]
        questions: Vec<String>,

        /// Print the response as JSON
        #[arg(long)]
        json: bool,
    },

    /// Curriculum and embedding bundle statistics
    Stats,

    /// Aggregate saved gap reports
    Gaps,

    /// Evaluate retrieval against labelled questions
    Eval {
        /// JSON array of {question, target_node_id | target_node_ids}
        #[arg(value_name = "QUESTIONS_JSON")]
        questions: PathBuf,

        /// Number of results considered per question (default: retrieval.top_k)
        #[arg(short = 'k', long)]
        top_k: Option<usize>,

        /// Evaluate only the first N questions
        #[arg(long)]
        limit: Option<usize>,

        /// Directory for result files
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

/// Verbosity level enum
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verbosity {
    Quiet,
    Normal,
    Verbose,
    VeryVerbose,
}

impl Args {
    /// Get verbosity level based on flags
    pub fn verbosity(&self) -> Verbosity {
        if self.quiet {
            Verbosity::Quiet
        } else {
            match self.verbose {
                0 => Verbosity::Normal,
                1 => Verbosity::Verbose,
                _ => Verbosity::VeryVerbose,
            }
        }
    }
}

impl Verbosity {
    /// Convert to string representation
    pub fn as_str(&self) -> &'static str {
        match self {
            Verbosity::Quiet => "quiet",
            Verbosity::Normal => "normal",
            Verbosity::Verbose => "verbose",
            Verbosity::VeryVerbose => "very_verbose",
        }
    }

    /// Default log filter for this verbosity
    pub fn log_filter(&self) -> &'static str {
        match self {
            Verbosity::Quiet => "error",
            Verbosity::Normal => "warn",
            Verbosity::Verbose => "musicqna=info",
            Verbosity::VeryVerbose => "musicqna=debug",
        }
    }

    /// Check if should show progress output
    pub fn show_progress(&self) -> bool {
        !matches!(self, Verbosity::Quiet)
    }
}
