pub mod accessories;
pub mod composefile;
pub mod config;
pub mod deploy;
pub mod error;
pub mod executor;
pub mod history;
pub mod secrets;
pub mod ssh;
pub mod swarm;

// Re-export common types for convenience
pub use self::config::{Config, DeploymentMode};
pub use self::error::{Error, Result};
pub use self::executor::{CommandResult, Executor};
