//! Configuration system
//!
//! Settings load from TOML or RON depending on the file extension. Scene
//! configuration falls back to defaults when the file is missing or invalid.

use std::path::Path;

pub use serde::{Deserialize, Serialize};

use crate::foundation::math::{constants, Vec3};

/// Configuration trait
pub trait Config: Serialize + for<'de> Deserialize<'de> + Default {
    /// Load configuration from a `.toml` or `.ron` file
    ///
    /// # Errors
    /// Fails on I/O errors, parse errors or an unknown extension.
    fn load_from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let format = ConfigFormat::from_path(path)?;
        let contents = std::fs::read_to_string(path)?;

        match format {
            ConfigFormat::Toml => toml::from_str(&contents).map_err(|e| ConfigError::Parse(e.to_string())),
            ConfigFormat::Ron => ron::from_str(&contents).map_err(|e| ConfigError::Parse(e.to_string())),
        }
    }

    /// Save configuration to a `.toml` or `.ron` file
    ///
    /// # Errors
    /// Fails on I/O errors, serialization errors or an unknown extension.
    fn save_to_file(&self, path: impl AsRef<Path>) -> Result<(), ConfigError> {
        let path = path.as_ref();
        let contents = match ConfigFormat::from_path(path)? {
            ConfigFormat::Toml => {
                toml::to_string_pretty(self).map_err(|e| ConfigError::Serialize(e.to_string()))?
            }
            ConfigFormat::Ron => ron::ser::to_string_pretty(self, ron::ser::PrettyConfig::default())
                .map_err(|e| ConfigError::Serialize(e.to_string()))?,
        };

        std::fs::write(path, contents).map_err(ConfigError::Io)
    }
}

#[derive(Debug, Clone, Copy)]
enum ConfigFormat {
    Toml,
    Ron,
}

impl ConfigFormat {
    fn from_path(path: &Path) -> Result<Self, ConfigError> {
        match path.extension().and_then(|ext| ext.to_str()) {
            Some("toml") => Ok(Self::Toml),
            Some("ron") => Ok(Self::Ron),
            _ => Err(ConfigError::UnsupportedFormat(path.display().to_string())),
        }
    }
}

/// Configuration errors
#[derive(thiserror::Error, Debug)]
pub enum ConfigError {
    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Parse error
    #[error("Parse error: {0}")]
    Parse(String),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialize(String),

    /// Unsupported format
    #[error("Unsupported format: {0}")]
    UnsupportedFormat(String),
}

/// Default camera created with every scene
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CameraConfig {
    /// Vertical field of view in degrees
    pub fov_y_degrees: f32,
    /// Near plane distance
    pub near: f32,
    /// Far plane distance
    pub far: f32,
    /// Viewport width in pixels
    pub width: u32,
    /// Viewport height in pixels
    pub height: u32,
}

impl Default for CameraConfig {
    fn default() -> Self {
        Self {
            fov_y_degrees: 60.0,
            near: 0.1,
            far: 1000.0,
            width: 1280,
            height: 720,
        }
    }
}

impl CameraConfig {
    /// Vertical field of view in radians
    pub fn fov_y(&self) -> f32 {
        self.fov_y_degrees * constants::DEG_TO_RAD
    }

    /// Viewport aspect ratio, 1.0 for a degenerate viewport
    #[allow(clippy::cast_precision_loss)]
    pub fn aspect(&self) -> f32 {
        if self.height == 0 {
            1.0
        } else {
            self.width as f32 / self.height as f32
        }
    }
}

/// Sun shadow map settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ShadowConfig {
    /// Depth map edge length in pixels
    pub map_size: u32,
    /// Half-width of the orthographic light volume
    pub extent: f32,
    /// Light near plane
    pub near: f32,
    /// Light far plane
    pub far: f32,
    /// Light eye offset in the sun's local frame
    pub offset: Vec3,
}

impl Default for ShadowConfig {
    fn default() -> Self {
        Self {
            map_size: 2048,
            extent: 50.0,
            near: 1.0,
            far: 200.0,
            offset: Vec3::new(0.0, 0.0, 100.0),
        }
    }
}

/// Screen-space light accumulation settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LightVolumeConfig {
    /// Buffer size is the viewport size divided by this factor
    pub downscale: u32,
    /// MSAA samples, 0 for none
    pub samples: u32,
}

impl Default for LightVolumeConfig {
    fn default() -> Self {
        Self { downscale: 2, samples: 0 }
    }
}

/// Top-level scene configuration
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SceneConfig {
    /// Default camera
    pub camera: CameraConfig,
    /// Shadow map renderer
    pub shadow: ShadowConfig,
    /// Light volume system
    pub light_volume: LightVolumeConfig,
    /// Log frame statistics at debug level
    pub stats: bool,
}

impl Config for SceneConfig {}

impl SceneConfig {
    /// Load from `path`, falling back to defaults with a warning
    pub fn load_or_default(path: impl AsRef<Path>) -> Self {
        let path = path.as_ref();
        match Self::load_from_file(path) {
            Ok(config) => {
                log::info!("Loaded scene configuration from {}", path.display());
                config
            }
            Err(error) => {
                log::warn!("Using default scene configuration ({}: {error})", path.display());
                Self::default()
            }
        }
    }
}
