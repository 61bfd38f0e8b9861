//! Lifecycle management subsystem.
//!
//! # Data Flow
//! ```text
//! Startup (main.rs):
//!     Parse args → Init logging → Build reader chain → Register keys → Spawn refresher/watcher
//!
//! Shutdown (shutdown.rs):
//!     Ctrl-C → Shutdown::trigger → Refresher closes → Cache saved → Exit
//! ```
//!
//! # Design Decisions
//! - Shutdown is a level, not an event: late subscribers still observe it
//! - Background loops stop cooperatively; nothing is aborted mid-refresh

pub mod shutdown;

pub use shutdown::{Shutdown, ShutdownSignal};
