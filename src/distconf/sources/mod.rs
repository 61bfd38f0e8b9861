//! Reader backends.
//!
//! | Source | Push | Notes |
//! |---|---|---|
//! | [`JsonConfig`] | yes | file snapshot, reloaded on demand |
//! | [`InMemory`] | yes | writable, notifies per key |
//! | [`Env`] | no | live process environment |
//! | [`CommandLine`] | no | `prefix+key=value` arguments |
//! | [`CachedReader`] | yes | primary plus last-known-good cache |
//! | [`PollingReader`] | yes | change detection over any reader |

pub mod cached;
pub mod cmd;
pub mod env;
pub mod json;
pub mod memory;
pub mod polling;

pub use cached::CachedReader;
pub use cmd::CommandLine;
pub use env::Env;
pub use json::JsonConfig;
pub use memory::InMemory;
pub use polling::PollingReader;
