//! Configuration for the impostor system.
//!
//! Settings persist to disk as RON, every section falls back to defaults
//! when missing, and command-line arguments override what was loaded.

mod cli;
mod config;
mod error;

pub use cli::CliArgs;
pub use config::{
    AtlasConfig, BudgetConfig, CONFIG_FILE_NAME, Config, DebugConfig, DemoConfig, LogConfig,
    QualityConfig, validate_texture_resolutions,
};
pub use error::ConfigError;
