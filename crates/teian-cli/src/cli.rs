use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};
use teian_types::{AliasStatus, SortOrder};

#[derive(Parser)]
#[command(
    name = "teian",
    about = "teian -- suggestions, tag aliases and upload quotas for a shimmie board",
    version,
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// Config file (default: ./teian.toml when present)
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Database file, overriding the config
    #[arg(long, global = true)]
    pub db: Option<PathBuf>,

    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[arg(long, global = true, default_value = "text")]
    pub format: OutputFormat,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, clap::ValueEnum)]
pub enum OutputFormat {
    Text,
    Json,
}

#[derive(Subcommand)]
pub enum Command {
    /// Keep the store open and reset upload quotas daily until interrupted
    Serve(ServeArgs),
    /// Submit, list, or delete suggestions
    #[command(subcommand)]
    Suggestion(SuggestionAction),
    /// Propose, review, list, or search tag aliases
    #[command(subcommand)]
    Alias(AliasAction),
    /// Charge, inspect, or reset upload quotas
    #[command(subcommand)]
    Quota(QuotaAction),
}

#[derive(Args)]
pub struct ServeArgs {
    /// Daily reset time (HH:MM:SS), overriding the config
    #[arg(long)]
    pub reset_at: Option<String>,
}

/// Filter and sort flags shared by admin listings.
#[derive(Args, Clone, Debug, Default)]
pub struct ListArgs {
    /// Keep records whose username contains this
    #[arg(long = "filter-user", default_value = "")]
    pub filter_user: String,
    /// Keep records whose text contains this
    #[arg(long, default_value = "")]
    pub text: String,
    /// ua, ud, da or dd; anything else means dd
    #[arg(long, default_value = "dd", value_parser = parse_sort)]
    pub sort: SortOrder,
}

fn parse_sort(s: &str) -> Result<SortOrder, String> {
    Ok(SortOrder::from_code_or_default(s))
}

fn parse_status(s: &str) -> Result<AliasStatus, String> {
    s.parse().map_err(|e: teian_types::TypeError| e.to_string())
}

#[derive(Subcommand)]
pub enum SuggestionAction {
    /// Submit a suggestion
    Add { username: String, text: String },
    /// List suggestions, newest first by default
    List {
        /// Only this user's suggestions
        #[arg(short, long)]
        user: Option<String>,
        #[command(flatten)]
        list: ListArgs,
    },
    /// Delete one of a user's suggestions
    Delete { username: String, id: u64 },
}

#[derive(Subcommand)]
pub enum AliasAction {
    /// Propose renaming tag OLD to NEW
    Add {
        username: String,
        old: String,
        new: String,
        #[arg(short = 'm', long, default_value = "")]
        comment: String,
    },
    /// Show one alias
    Show { id: u64 },
    /// List aliases
    List {
        /// Only this user's aliases (exact match)
        #[arg(short, long)]
        user: Option<String>,
        #[command(flatten)]
        list: ListArgs,
    },
    /// Review an alias; unspecified fields keep their current value
    Update {
        id: u64,
        #[arg(long)]
        old: Option<String>,
        #[arg(long)]
        new: Option<String>,
        #[arg(short = 'm', long)]
        comment: Option<String>,
        /// new, approved, rejected (or 0, 1, 2)
        #[arg(short, long, value_parser = parse_status)]
        status: Option<AliasStatus>,
    },
    /// Delete an alias, or every alias with --all
    Delete {
        #[arg(required_unless_present = "all", conflicts_with = "all")]
        id: Option<u64>,
        #[arg(long)]
        all: bool,
    },
    /// Search aliases by tag, or by several fields at once
    Search {
        /// Matches either tag
        query: Option<String>,
        #[arg(long)]
        old: Option<String>,
        #[arg(long)]
        new: Option<String>,
        #[arg(long)]
        username: Option<String>,
        #[arg(long)]
        comment: Option<String>,
    },
}

#[derive(Subcommand)]
pub enum QuotaAction {
    /// Record an upload of BYTES against a user's quota
    Charge { username: String, bytes: u64 },
    /// Show a user's usage since the last reset
    Usage { username: String },
    /// Clear every user's usage now
    Reset,
}
