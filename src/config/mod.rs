//! Bot configuration.
//!
//! # Data Flow
//! ```text
//! command line args ─┐
//! environment ───────┼─→ Distconf (first present value wins)
//! config.json ──→ CachedReader ─┘       │
//!      ↑              ↕                 ▼
//!  FileWatcher    cache file      AppConfig (typed, live handles)
//! ```
//!
//! # Design Decisions
//! - Values are read through their handles at the point of use, so a reload
//!   applies to the next message handled
//! - A missing or broken config file degrades to cached values, then defaults

pub mod loader;
pub mod schema;

pub use loader::{load, load_cache, save_cache, CachedFile, FileReload, LoadedConfig, LoaderOptions};
pub use schema::{AppConfig, ChatPolicy};
