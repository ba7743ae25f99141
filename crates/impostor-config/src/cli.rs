//! Command-line argument parsing for the impostor demo.

use std::path::PathBuf;

use clap::Parser;

use crate::Config;

/// Impostor demo command-line arguments.
///
/// CLI values override settings loaded from `impostors.ron`.
#[derive(Parser, Debug)]
#[command(name = "impostor-demo", about = "Headless impostor scheduling demo")]
pub struct CliArgs {
    /// Number of objects to register.
    #[arg(long)]
    pub objects: Option<u32>,

    /// Number of frames to simulate.
    #[arg(long)]
    pub frames: Option<u32>,

    /// Atlas edge length in pixels (power of two).
    #[arg(long)]
    pub atlas_resolution: Option<u32>,

    /// Maximum work queue length per frame.
    #[arg(long)]
    pub max_updates: Option<u32>,

    /// Maximum off-screen refreshes per frame.
    #[arg(long)]
    pub max_background_updates: Option<u32>,

    /// Log level (error, warn, info, debug, trace).
    #[arg(long)]
    pub log_level: Option<String>,

    /// Path to config directory (overrides default location).
    #[arg(long)]
    pub config: Option<PathBuf>,
}

impl Config {
    /// Apply CLI overrides to a loaded config.
    pub fn apply_cli_overrides(&mut self, args: &CliArgs) {
        if let Some(n) = args.objects {
            self.demo.objects = n;
        }
        if let Some(n) = args.frames {
            self.demo.frames = n;
        }
        if let Some(res) = args.atlas_resolution {
            self.atlas.atlas_resolution = res;
        }
        if let Some(n) = args.max_updates {
            self.budget.max_updates_per_frame = n;
        }
        if let Some(n) = args.max_background_updates {
            self.budget.max_background_updates_per_frame = n;
        }
        if let Some(ref level) = args.log_level {
            self.log.level = level.clone();
        }
    }
}
