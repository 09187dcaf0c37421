//! planbook - Task and Story Planning Library
//!
//! This library provides the core functionality for the planbook CLI,
//! a task/project planner that derives lifecycle state from observed
//! scheduling and deadline activity instead of letting it be set by hand.
//!
//! # Core Concepts
//!
//! - **Tasks**: The unit of work, with schedule history, comments,
//!   dependencies and derived points. Never deletable once filed.
//! - **State rules**: Pure functions deriving `Filed`/`Scheduled`/`Doing`
//!   from facts; `Finished`/`Failed`/`Deferred`/`Removed` are write-once
//!   final states.
//! - **Stories**: Task groupings whose state, progress and points are
//!   entirely derived from their member tasks.
//! - **Dependency graphs**: Layered DAG layout of predecessor/successor
//!   relationships for visualization.
//!
//! # Module Organization
//!
//! - `app`: Façade wiring both repositories and the recompute hook
//! - `cli`: Command-line interface using clap
//! - `config`: Configuration loading from `planbook.toml`
//! - `data`: Export/import snapshot formats and detection
//! - `error`: Error types and result aliases
//! - `graph`: Dependency graph leveling and layout
//! - `lock`: File locking for cross-process safety
//! - `output`: Shared CLI output formatting
//! - `rules`: Task state rules engine (pure)
//! - `storage`: Data directory layout and atomic JSON persistence
//! - `story`: Story entities, aggregation engine and repository
//! - `task`: Task entities and repository

pub mod app;
pub mod cli;
pub mod config;
pub mod data;
pub mod error;
pub mod graph;
pub mod lock;
pub mod output;
pub mod rules;
pub mod storage;
pub mod story;
pub mod task;

pub use error::{Error, Result};
