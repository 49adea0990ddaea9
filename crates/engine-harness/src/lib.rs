//! engine-harness
//!
//! Replays a command script against the matching engine: one async
//! worker per client session, barriers and waits honoured, engine events
//! written out as lines.

pub mod config;
pub mod dispatch;
pub mod report;
pub mod types;

// these are internal modules, not re-exported
mod output;
mod session;

pub use config::{Cli, Config};
pub use dispatch::run_script;
pub use report::{RunReport, SessionReport};
