//! # mediatrove
//!
//! Ingests a configured set of source directory trees, classifies each media file by
//! filename heuristics, enriches the classification against a remote catalog, detects
//! duplicates, and organizes matched items into a Plex-compatible destination layout.
//!
//! ## Pipeline
//!
//! - [`scanner`] walks configured source folders and reconciles discovered files against
//!   the stored [`models::MediaItem`] set, calling into [`parser`], [`catalog`],
//!   [`duplicate`], and [`probe`] for each new or changed file.
//! - [`organizer`] executes the move plan computed by [`planner`] for a requested batch of
//!   item ids, with collision handling, an EXDEV-safe atomic move, and `undo`.
//! - [`store`] is the SQLite-backed persistence layer behind both.
//! - [`events`] carries progress broadcast and the scan/organize mutual-exclusion gate.
//! - [`config`] loads the singleton [`models::Settings`] record from TOML.
//! - [`cli`] is the command-line surface wiring these together.

pub mod catalog;
pub mod cli;
pub mod config;
pub mod duplicate;
pub mod error;
pub mod events;
pub mod models;
pub mod organizer;
pub mod parser;
pub mod planner;
pub mod probe;
pub mod scanner;
pub mod store;

/// Main result type for the library.
pub type Result<T> = anyhow::Result<T>;

/// Main error type for the library.
pub type Error = anyhow::Error;
