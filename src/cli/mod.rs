pub mod audit;
pub mod common;
pub mod config;
pub mod export;
pub mod get;
pub mod import;
pub mod init;
pub mod json_output;
pub mod list;
pub mod put;
pub mod remove;
pub mod restore;
pub mod rotate;
pub mod watch;

use std::path::PathBuf;

use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "envault", version, about = "Secrets vault store & rotation engine")]
pub struct Cli {
    /// Vault directory (default: ~/.envault)
    #[arg(long, global = true, env = "ENVAULT_DIR")]
    pub dir: Option<PathBuf>,

    /// Output results as JSON
    #[arg(long, global = true)]
    pub json: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Initialize a new vault
    Init,

    /// Store a secret (reads the value from stdin)
    Put {
        /// Project / environment name
        project: String,
        /// Secret key
        key: String,
        /// Tags to attach (repeatable, replaces existing tags)
        #[arg(long)]
        tag: Vec<String>,
        /// Rotate on this interval (e.g. "30d", "12h")
        #[arg(long, value_name = "DURATION", conflicts_with = "event_triggered")]
        every: Option<String>,
        /// Rotate only on external triggers; the scheduler skips this key
        #[arg(long)]
        event_triggered: bool,
        /// Fail unless the live version is exactly N (0 = must not exist)
        #[arg(long, value_name = "N")]
        expected_version: Option<u32>,
    },

    /// Print a secret value
    Get {
        project: String,
        key: String,
        /// Read a historical version instead of the active one
        #[arg(long)]
        version: Option<u32>,
    },

    /// List secrets in a project
    List {
        project: String,
        /// Only secrets carrying this tag
        #[arg(long)]
        tag: Option<String>,
        /// Only keys starting with this prefix
        #[arg(long)]
        prefix: Option<String>,
    },

    /// Remove a secret
    Remove { project: String, key: String },

    /// Import a dotenv file into a project
    Import {
        project: String,
        /// Path to .env file (use '-' for stdin)
        file: String,
        /// Replace keys that already exist
        #[arg(long)]
        overwrite: bool,
    },

    /// Export a project as dotenv or JSON, or the whole vault as a sealed backup
    Export {
        /// Project to export (not needed with --backup)
        project: Option<String>,
        /// Output format: env, json
        #[arg(long, default_value = "env")]
        format: String,
        /// Write an age-sealed backup of the whole vault to this path
        #[arg(long, value_name = "FILE")]
        backup: Option<PathBuf>,
    },

    /// Restore the vault from a sealed backup
    Restore {
        /// Backup file written by `export --backup`
        file: PathBuf,
    },

    /// Rotate a secret now and wait for the outcome
    Rotate { project: String, key: String },

    /// List interval-policy secrets due for rotation
    Due {
        /// Look ahead by this much (e.g. "1h"); default is now
        #[arg(long, value_name = "DURATION")]
        within: Option<String>,
    },

    /// View and verify the audit log
    Audit {
        #[command(subcommand)]
        command: AuditCommands,
    },

    /// Run the rotation scheduler in the foreground until Ctrl-C
    Watch,

    /// Show configuration
    Config {
        #[command(subcommand)]
        command: ConfigCommands,
    },
}

#[derive(Subcommand)]
pub enum AuditCommands {
    /// Show recent audit log entries
    Show {
        /// Number of entries to show (0 = all)
        #[arg(long, short, default_value = "20")]
        count: usize,
    },
    /// Verify audit log integrity
    Verify,
}

#[derive(Subcommand)]
pub enum ConfigCommands {
    /// Show current configuration
    Show,
}
