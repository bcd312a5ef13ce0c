//! Bahamut song-thread archiver library.
//!
//! A service that follows the nightly song-chain threads on a Bahamut
//! board, stores every post, comment and recognized music link in SQLite,
//! and keeps re-scraping on a schedule.

// Allow raw string hashes for safety - they're harmless and prevent issues if content changes
#![allow(clippy::needless_raw_string_hashes)]

pub mod baha;
pub mod config;
pub mod constants;
pub mod db;
pub mod error;
pub mod jobs;
pub mod links;
pub mod probe;
pub mod queue;
pub mod scheduler;
