//! Configuration structs with sensible defaults and RON persistence.

use std::path::{Path, PathBuf};

use impostor_atlas::{
    MAX_ATLAS_RESOLUTION, MAX_TILE_RESOLUTION, MIN_ATLAS_RESOLUTION, MIN_TILE_RESOLUTION,
};
use impostor_lod::ImpostorSettings;
use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// File name used inside the config directory.
pub const CONFIG_FILE_NAME: &str = "impostors.ron";

/// Top-level impostor system configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct Config {
    /// Atlas texture settings.
    pub atlas: AtlasConfig,
    /// Per-frame update budgets.
    pub budget: BudgetConfig,
    /// Global quality settings.
    pub quality: QualityConfig,
    /// Settings given to objects registered without their own.
    pub defaults: ImpostorSettings,
    /// Debug visualization.
    pub debug: DebugConfig,
    /// Logging.
    pub log: LogConfig,
    /// Headless demo parameters.
    pub demo: DemoConfig,
}

/// Atlas texture configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct AtlasConfig {
    /// Edge length of every chunk atlas, in pixels. Power of two.
    pub atlas_resolution: u32,
    /// Generate mip chains after rendering into an atlas.
    pub use_mip_maps: bool,
    /// Mip sampling bias (-5.0 - 5.0).
    pub mip_map_bias: f32,
}

/// Per-frame update budgets.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct BudgetConfig {
    /// Work queue length per frame, mode transitions included (1 - 100).
    pub max_updates_per_frame: u32,
    /// Refreshes of off-screen objects per frame (1 - 50).
    pub max_background_updates_per_frame: u32,
    /// Texture updates are grouped by chunk only below this count.
    pub sort_threshold: u32,
}

/// Global quality configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct QualityConfig {
    /// Snapshot resolution multiplier over the on-screen size.
    pub texture_size_scale: f32,
    /// LOD bias (higher = objects stay at full detail longer).
    pub lod_bias: f32,
    /// Alpha cutout threshold (0.0 - 1.0).
    pub cutout: f32,
    /// Below this view angle, in degrees, quads stop turning toward the camera.
    pub min_angle_to_stop_look_at: f32,
    /// RGBA color atlas tiles are cleared to before each snapshot.
    pub background_clear_color: [f32; 4],
}

/// Debug visualization configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct DebugConfig {
    /// Tint impostor draws.
    pub enabled: bool,
    /// Tint by tile resolution instead of `debug_color`.
    pub cascades_mode: bool,
    /// RGBA tint when debugging is enabled.
    pub debug_color: [f32; 4],
}

/// Logging configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct LogConfig {
    /// Filter directive (e.g., "debug", "info,impostor_atlas=trace").
    pub level: String,
    /// Also write JSON logs to this file.
    pub json_file: Option<PathBuf>,
}

/// Headless demo configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct DemoConfig {
    /// Objects placed on the grid.
    pub objects: u32,
    /// Frames to simulate.
    pub frames: u32,
    /// Simulated viewport height in pixels.
    pub screen_height: u32,
    /// Vertical field of view in degrees.
    pub fov_degrees: f32,
    /// Camera orbit radius in meters.
    pub orbit_radius: f32,
}

// --- Default implementations ---

impl Default for AtlasConfig {
    fn default() -> Self {
        Self {
            atlas_resolution: 2048,
            use_mip_maps: true,
            mip_map_bias: 0.0,
        }
    }
}

impl Default for BudgetConfig {
    fn default() -> Self {
        Self {
            max_updates_per_frame: 20,
            max_background_updates_per_frame: 10,
            sort_threshold: 200,
        }
    }
}

impl Default for QualityConfig {
    fn default() -> Self {
        Self {
            texture_size_scale: 2.0,
            lod_bias: 1.0,
            cutout: 0.2,
            min_angle_to_stop_look_at: 30.0,
            background_clear_color: [0.5, 0.5, 0.5, 0.0],
        }
    }
}

impl Default for DebugConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            cascades_mode: false,
            debug_color: [1.0, 0.0, 1.0, 0.5],
        }
    }
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json_file: None,
        }
    }
}

impl Default for DemoConfig {
    fn default() -> Self {
        Self {
            objects: 1000,
            frames: 300,
            screen_height: 1080,
            fov_degrees: 60.0,
            orbit_radius: 150.0,
        }
    }
}

// --- Validation ---

fn check(ok: bool, message: impl FnOnce() -> String) -> Result<(), ConfigError> {
    if ok {
        Ok(())
    } else {
        Err(ConfigError::Invalid(message()))
    }
}

impl Config {
    /// Check every value against its allowed range.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let atlas = self.atlas.atlas_resolution;
        check(
            atlas.is_power_of_two() && (MIN_ATLAS_RESOLUTION..=MAX_ATLAS_RESOLUTION).contains(&atlas),
            || {
                format!(
                    "atlas_resolution {atlas} must be a power of two in \
                     {MIN_ATLAS_RESOLUTION}..={MAX_ATLAS_RESOLUTION}"
                )
            },
        )?;
        check((-5.0..=5.0).contains(&self.atlas.mip_map_bias), || {
            format!("mip_map_bias {} must be in -5..=5", self.atlas.mip_map_bias)
        })?;

        let budget = &self.budget;
        check((1..=100).contains(&budget.max_updates_per_frame), || {
            format!(
                "max_updates_per_frame {} must be in 1..=100",
                budget.max_updates_per_frame
            )
        })?;
        check((1..=50).contains(&budget.max_background_updates_per_frame), || {
            format!(
                "max_background_updates_per_frame {} must be in 1..=50",
                budget.max_background_updates_per_frame
            )
        })?;

        let quality = &self.quality;
        check(quality.lod_bias > 0.0, || {
            format!("lod_bias {} must be positive", quality.lod_bias)
        })?;
        check(quality.texture_size_scale > 0.0, || {
            format!(
                "texture_size_scale {} must be positive",
                quality.texture_size_scale
            )
        })?;
        check((0.0..=1.0).contains(&quality.cutout), || {
            format!("cutout {} must be in 0..=1", quality.cutout)
        })?;
        check((0.0..=180.0).contains(&quality.min_angle_to_stop_look_at), || {
            format!(
                "min_angle_to_stop_look_at {} must be in 0..=180",
                quality.min_angle_to_stop_look_at
            )
        })?;

        validate_texture_resolutions(&self.defaults, atlas)
    }
}

/// Check an object's tile resolution bounds against the atlas size.
pub fn validate_texture_resolutions(
    settings: &ImpostorSettings,
    atlas_resolution: u32,
) -> Result<(), ConfigError> {
    let (min, max) = (
        settings.min_texture_resolution,
        settings.max_texture_resolution,
    );
    let upper = MAX_TILE_RESOLUTION.min(atlas_resolution);
    check(
        min.is_power_of_two()
            && max.is_power_of_two()
            && MIN_TILE_RESOLUTION <= min
            && min <= max
            && max <= upper,
        || {
            format!(
                "texture resolutions {min}..={max} must be powers of two within \
                 {MIN_TILE_RESOLUTION}..={upper}"
            )
        },
    )
}

// --- Load / Save / Reload ---

impl Config {
    /// Load config from the given directory, or create a default config file.
    pub fn load_or_create(config_dir: &Path) -> Result<Self, ConfigError> {
        let config_path = config_dir.join(CONFIG_FILE_NAME);

        if config_path.exists() {
            let contents = std::fs::read_to_string(&config_path).map_err(ConfigError::ReadError)?;
            let config: Config = ron::from_str(&contents).map_err(ConfigError::ParseError)?;
            log::info!("Loaded config from {}", config_path.display());
            Ok(config)
        } else {
            let config = Config::default();
            config.save(config_dir)?;
            log::info!("Created default config at {}", config_path.display());
            Ok(config)
        }
    }

    /// Save config to the given directory as [`CONFIG_FILE_NAME`].
    pub fn save(&self, config_dir: &Path) -> Result<(), ConfigError> {
        std::fs::create_dir_all(config_dir).map_err(ConfigError::WriteError)?;

        let config_path = config_dir.join(CONFIG_FILE_NAME);
        let pretty = ron::ser::PrettyConfig::new()
            .depth_limit(3)
            .separate_tuple_members(true)
            .enumerate_arrays(false);

        let serialized =
            ron::ser::to_string_pretty(self, pretty).map_err(ConfigError::SerializeError)?;

        std::fs::write(&config_path, serialized).map_err(ConfigError::WriteError)?;
        Ok(())
    }

    /// Hot-reload: returns `Some(new_config)` if the file changed, `None` otherwise.
    pub fn reload(&self, config_dir: &Path) -> Result<Option<Self>, ConfigError> {
        let config_path = config_dir.join(CONFIG_FILE_NAME);
        let contents = std::fs::read_to_string(&config_path).map_err(ConfigError::ReadError)?;
        let new_config: Config = ron::from_str(&contents).map_err(ConfigError::ParseError)?;

        if &new_config != self {
            log::info!("Config reloaded with changes");
            Ok(Some(new_config))
        } else {
            Ok(None)
        }
    }
}
