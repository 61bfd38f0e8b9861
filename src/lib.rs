//! Hebe chat bot: configuration engine and host wiring.

pub mod config;
pub mod distconf;
pub mod lifecycle;
pub mod observability;

pub use config::AppConfig;
pub use distconf::Distconf;
pub use lifecycle::Shutdown;
