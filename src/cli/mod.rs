//! Command-line interface for planbook
//!
//! This module defines the CLI structure using clap derive macros.
//! Each command group (task, story, data) is implemented in its own
//! submodule; all of them talk to the `App` façade only.

use std::path::PathBuf;

use chrono::{DateTime, Local, NaiveDate, NaiveDateTime, TimeZone, Utc};
use clap::{Parser, Subcommand};
use uuid::Uuid;

use crate::app::App;
use crate::config::Config;
use crate::error::{Error, Result};
use crate::output::OutputOptions;

mod data;
mod story;
mod task;

/// planbook - task and story planning
///
/// Tasks derive their lifecycle state from schedule entries and deadlines;
/// stories derive theirs from member tasks. Nothing derived is ever set by
/// hand.
#[derive(Parser, Debug)]
#[command(name = "planbook")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Data directory (defaults to the platform data dir)
    #[arg(long, global = true, env = "PLANBOOK_DATA")]
    pub data_dir: Option<PathBuf>,

    /// Path to a planbook.toml config file
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Output in JSON format
    #[arg(long, global = true)]
    pub json: bool,

    /// Suppress non-essential output
    #[arg(short, long, global = true)]
    pub quiet: bool,

    #[command(subcommand)]
    pub command: Commands,
}

/// Available subcommands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Task management
    #[command(subcommand)]
    Task(TaskCommands),

    /// Story management
    #[command(subcommand)]
    Story(StoryCommands),

    /// Export, import and wipe
    #[command(subcommand)]
    Data(DataCommands),
}

/// Task subcommands
#[derive(Subcommand, Debug)]
pub enum TaskCommands {
    /// File a new task
    New {
        /// Task title
        title: String,

        /// Longer description
        #[arg(long, default_value = "")]
        description: String,

        /// Estimated time in minutes (immutable once set; drives points)
        #[arg(long)]
        estimate: Option<u32>,

        /// Due date (RFC 3339, "YYYY-MM-DD HH:MM" or "YYYY-MM-DD", local)
        #[arg(long)]
        due: Option<String>,
    },

    /// List tasks
    List {
        /// Filter by state (filed, scheduled, doing, finished, failed,
        /// deferred, removed)
        #[arg(long)]
        state: Option<String>,
    },

    /// Show one task in full
    Show {
        /// Task id
        id: String,
    },

    /// Update title, description, due date, or close the task
    Update {
        /// Task id
        id: String,

        #[arg(long)]
        title: Option<String>,

        #[arg(long)]
        description: Option<String>,

        /// Close the task: finished, failed, deferred or removed
        #[arg(long)]
        state: Option<String>,

        /// New due date
        #[arg(long)]
        due: Option<String>,

        /// Remove the due date
        #[arg(long, conflicts_with = "due")]
        clear_due: bool,
    },

    /// Delete a task (always refused; tasks are a permanent record)
    Delete {
        /// Task id
        id: String,
    },

    /// Append a comment
    Comment {
        /// Task id
        id: String,

        /// Comment text
        text: String,
    },

    /// States the user may currently set on this task
    States {
        /// Task id
        id: String,
    },

    /// Schedule entry management
    #[command(subcommand)]
    Schedule(ScheduleCommands),

    /// Dependency management
    #[command(subcommand)]
    Dep(DepCommands),

    /// Dependency graph with layered layout
    Graph {
        /// Task id to start from
        id: String,
    },
}

/// Schedule entry subcommands
#[derive(Subcommand, Debug)]
pub enum ScheduleCommands {
    /// Add a work block
    Add {
        /// Task id
        id: String,

        /// Block start
        #[arg(long)]
        start: String,

        /// Block end
        #[arg(long)]
        end: String,
    },

    /// Move or resize a work block
    Update {
        /// Task id
        id: String,

        /// Schedule entry id
        entry: String,

        #[arg(long)]
        start: String,

        #[arg(long)]
        end: String,
    },

    /// Remove a work block
    Rm {
        /// Task id
        id: String,

        /// Schedule entry id
        entry: String,
    },
}

/// Dependency subcommands
#[derive(Subcommand, Debug)]
pub enum DepCommands {
    /// Record a dependency between two tasks
    Add {
        /// Task id the relationship is stored on
        id: String,

        /// predecessor or successor (relative to the task)
        kind: String,

        /// The other task's id
        related: String,
    },

    /// Remove a dependency
    Rm {
        /// Task id
        id: String,

        /// Relationship id
        relationship: String,
    },
}

/// Story subcommands
#[derive(Subcommand, Debug)]
pub enum StoryCommands {
    /// Create a story
    New {
        /// Story title
        title: String,

        #[arg(long, default_value = "")]
        description: String,
    },

    /// List stories with derived progress
    List,

    /// Show one story
    Show {
        /// Story id
        id: String,
    },

    /// Update title or description (state and progress are derived)
    Update {
        /// Story id
        id: String,

        #[arg(long)]
        title: Option<String>,

        #[arg(long)]
        description: Option<String>,
    },

    /// Delete a story; member tasks are detached, not deleted
    Delete {
        /// Story id
        id: String,
    },

    /// Add a task to a story
    Attach {
        /// Story id
        story: String,

        /// Task id
        task: String,
    },

    /// Remove a task from a story
    Detach {
        /// Story id
        story: String,

        /// Task id
        task: String,
    },

    /// List a story's member tasks
    Tasks {
        /// Story id
        story: String,
    },
}

/// Data management subcommands
#[derive(Subcommand, Debug)]
pub enum DataCommands {
    /// Write a unified snapshot of tasks and stories
    Export {
        /// Output file (stdout when omitted)
        #[arg(long)]
        out: Option<PathBuf>,
    },

    /// Replace collections from a snapshot file (unified or legacy
    /// single-entity)
    Import {
        /// Snapshot file
        file: PathBuf,
    },

    /// Delete all tasks and stories
    Wipe {
        /// Required; wiping is irreversible
        #[arg(long)]
        force: bool,
    },
}

impl Cli {
    /// Execute the CLI command
    pub fn run(self) -> Result<()> {
        let config = match &self.config {
            Some(path) => Config::load_from(path)?,
            None => Config::load_default()?,
        };
        let data_dir = config.resolve_data_dir(self.data_dir)?;
        tracing::debug!(data_dir = %data_dir.display(), "opening app");

        let mut app = App::open(data_dir, config.graph_spacing())?;
        let out = OutputOptions {
            json: self.json,
            quiet: self.quiet,
        };

        match self.command {
            Commands::Task(cmd) => task::run(&mut app, cmd, out),
            Commands::Story(cmd) => story::run(&mut app, cmd, out),
            Commands::Data(cmd) => data::run(&mut app, cmd, out),
        }
    }
}

/// Parse an entity id argument
pub(crate) fn parse_id(value: &str) -> Result<Uuid> {
    Uuid::parse_str(value.trim())
        .map_err(|_| Error::InvalidArgument(format!("invalid id: {value}")))
}

/// Parse a date/time argument.
///
/// Accepts RFC 3339, `YYYY-MM-DD HH:MM` (local), or `YYYY-MM-DD`
/// (local midnight).
pub(crate) fn parse_datetime(value: &str) -> Result<DateTime<Utc>> {
    let value = value.trim();

    if let Ok(dt) = DateTime::parse_from_rfc3339(value) {
        return Ok(dt.with_timezone(&Utc));
    }

    if let Ok(naive) = NaiveDateTime::parse_from_str(value, "%Y-%m-%d %H:%M") {
        return resolve_local(naive);
    }

    if let Ok(date) = NaiveDate::parse_from_str(value, "%Y-%m-%d") {
        if let Some(naive) = date.and_hms_opt(0, 0, 0) {
            return resolve_local(naive);
        }
    }

    Err(Error::InvalidArgument(format!(
        "could not parse date/time: {value} (expected RFC 3339, \
         \"YYYY-MM-DD HH:MM\" or \"YYYY-MM-DD\")"
    )))
}

fn resolve_local(naive: NaiveDateTime) -> Result<DateTime<Utc>> {
    Local
        .from_local_datetime(&naive)
        .single()
        .map(|dt| dt.with_timezone(&Utc))
        .ok_or_else(|| {
            Error::InvalidArgument(format!("ambiguous local time: {naive}"))
        })
}
