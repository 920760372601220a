//! # Harness Configuration
//!
//! All knobs of a harness run in one serializable tree. Every section carries
//! `#[serde(default)]`, so a config file only needs the keys it changes.
//!
//! ## Sections
//!
//! - **Window**: size, title and the context hints handed to the window system
//! - **Loader**: options for the GL function-loading layer
//! - **Features**: which stages of the pipeline are switched on
//! - **Render**: clear color, swap interval, wireframe
//! - **Shaders**: optional on-disk overrides for the built-in sources

use crate::config::{Config, ConfigError};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Requested OpenGL profile
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContextProfile {
    /// Core profile, deprecated functionality removed
    Core,
    /// Compatibility profile, deprecated functionality kept
    Compatibility,
    /// Let the driver decide
    Any,
}

/// # Window Configuration
///
/// Every value is a hint: the window system honours it when it can and
/// silently adjusts it when it is out of range.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct WindowConfig {
    /// Requested client-area width in pixels
    pub width: u32,
    /// Requested client-area height in pixels
    pub height: u32,
    /// Window title
    pub title: String,
    /// Requested GL major version
    pub major_version: u32,
    /// Requested GL minor version
    pub minor_version: u32,
    /// Requested GL profile
    pub profile: ContextProfile,
    /// Disable deprecated features in the requested profile
    pub forward_compatible: bool,
    /// MSAA sample count, `None` for no multisampling
    pub samples: Option<u32>,
}

impl WindowConfig {
    /// Create a window configuration with the default context hints
    pub fn new(width: u32, height: u32, title: impl Into<String>) -> Self {
        Self {
            width,
            height,
            title: title.into(),
            ..Self::default()
        }
    }

    /// Request a specific GL version
    pub fn with_version(mut self, major: u32, minor: u32) -> Self {
        self.major_version = major;
        self.minor_version = minor;
        self
    }

    /// Request a GL profile
    pub fn with_profile(mut self, profile: ContextProfile, forward_compatible: bool) -> Self {
        self.profile = profile;
        self.forward_compatible = forward_compatible;
        self
    }

    /// Request multisampling
    pub fn with_samples(mut self, samples: u32) -> Self {
        self.samples = Some(samples);
        self
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.width == 0 || self.height == 0 {
            return Err(ConfigError::Invalid(format!(
                "window size must be non-zero, got {}x{}",
                self.width, self.height
            )));
        }
        if self.major_version == 0 {
            return Err(ConfigError::Invalid("GL major version must be at least 1".to_string()));
        }
        if self.forward_compatible && self.profile == ContextProfile::Compatibility {
            return Err(ConfigError::Invalid(
                "forward compatibility cannot be combined with the compatibility profile".to_string(),
            ));
        }
        Ok(())
    }
}

impl Default for WindowConfig {
    fn default() -> Self {
        Self {
            width: 800,
            height: 600,
            title: "Simple OpenGL Code Snippet".to_string(),
            major_version: 3,
            minor_version: 2,
            profile: ContextProfile::Core,
            forward_compatible: true,
            samples: None,
        }
    }
}

/// Options for the GL function-loading layer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoaderOptions {
    /// Accept every entry point the window system resolves without checking
    /// the version the created context reports
    pub experimental: bool,
}

impl Default for LoaderOptions {
    fn default() -> Self {
        Self { experimental: true }
    }
}

/// Pipeline stages that can be switched on and off
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
#[allow(clippy::struct_excessive_bools)]
pub struct PipelineFeatures {
    /// Build the shader program
    pub shaders: bool,
    /// Upload geometry and issue draw calls
    pub geometry: bool,
    /// Track framebuffer resizes and update the viewport
    pub resize_callback: bool,
}

impl Default for PipelineFeatures {
    fn default() -> Self {
        Self {
            shaders: true,
            geometry: true,
            resize_callback: true,
        }
    }
}

/// Render loop settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RenderConfig {
    /// Framebuffer clear color (RGBA)
    pub clear_color: [f32; 4],
    /// Display refreshes to wait before a swap, 0 disables vsync
    pub swap_interval: u32,
    /// Rasterize polygons as lines
    pub wireframe: bool,
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self {
            clear_color: [0.2, 0.1, 0.0, 0.0],
            swap_interval: 0,
            wireframe: false,
        }
    }
}

/// # Shader Configuration
///
/// When a path is unset the built-in passthrough source is used.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ShaderConfig {
    /// GLSL vertex shader file
    pub vertex_shader_path: Option<PathBuf>,
    /// GLSL fragment shader file
    pub fragment_shader_path: Option<PathBuf>,
}

impl ShaderConfig {
    /// Use on-disk shader sources
    pub fn new(vertex_path: impl Into<PathBuf>, fragment_path: impl Into<PathBuf>) -> Self {
        Self {
            vertex_shader_path: Some(vertex_path.into()),
            fragment_shader_path: Some(fragment_path.into()),
        }
    }
}

/// Top-level harness configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HarnessConfig {
    /// Window and context hints
    pub window: WindowConfig,
    /// Function loader options
    pub loader: LoaderOptions,
    /// Enabled pipeline stages
    pub features: PipelineFeatures,
    /// Render loop settings
    pub render: RenderConfig,
    /// Shader source overrides
    pub shaders: ShaderConfig,
}

impl HarnessConfig {
    /// Replace the window section
    pub fn with_window(mut self, window: WindowConfig) -> Self {
        self.window = window;
        self
    }

    /// Replace the feature set
    pub fn with_features(mut self, features: PipelineFeatures) -> Self {
        self.features = features;
        self
    }

    /// Replace the render section
    pub fn with_render(mut self, render: RenderConfig) -> Self {
        self.render = render;
        self
    }

    /// Validate the whole tree
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.window.validate()?;

        // a core-profile draw without a program is undefined
        if self.features.geometry && !self.features.shaders {
            return Err(ConfigError::Invalid(
                "the geometry feature requires the shaders feature".to_string(),
            ));
        }
        if self.render.clear_color.iter().any(|c| !(0.0..=1.0).contains(c)) {
            return Err(ConfigError::Invalid(format!(
                "clear color components must lie in [0, 1], got {:?}",
                self.render.clear_color
            )));
        }
        Ok(())
    }
}

impl Config for HarnessConfig {}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn scratch_path(name: &str) -> PathBuf {
        std::env::temp_dir().join(format!("gl_harness_{}_{}", std::process::id(), name))
    }

    #[test]
    fn test_defaults_request_core_3_2() {
        let config = HarnessConfig::default();
        assert_eq!(config.window.width, 800);
        assert_eq!(config.window.height, 600);
        assert_eq!((config.window.major_version, config.window.minor_version), (3, 2));
        assert_eq!(config.window.profile, ContextProfile::Core);
        assert!(config.window.forward_compatible);
        assert_eq!(config.window.samples, None);
        assert_eq!(config.render.swap_interval, 0);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_zero_sized_window_is_rejected() {
        let config = HarnessConfig::default().with_window(WindowConfig::new(0, 600, "x"));
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn test_geometry_without_shaders_is_rejected() {
        let config = HarnessConfig::default().with_features(PipelineFeatures {
            shaders: false,
            geometry: true,
            resize_callback: false,
        });
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn test_forward_compat_with_compatibility_profile_is_rejected() {
        let window = WindowConfig::default().with_profile(ContextProfile::Compatibility, true);
        assert!(window.validate().is_err());

        let window = WindowConfig::default().with_profile(ContextProfile::Compatibility, false);
        assert!(window.validate().is_ok());
    }

    #[test]
    fn test_partial_toml_falls_back_to_defaults() {
        let config: HarnessConfig = toml::from_str(
            r#"
            [window]
            title = "Triangles"
            samples = 4

            [features]
            geometry = false
            "#,
        )
        .unwrap();

        assert_eq!(config.window.title, "Triangles");
        assert_eq!(config.window.samples, Some(4));
        assert_eq!(config.window.width, 800);
        assert!(config.features.shaders);
        assert!(!config.features.geometry);
        assert_relative_eq!(config.render.clear_color[0], 0.2);
    }

    #[test]
    fn test_toml_file_round_trip() {
        let path = scratch_path("round_trip.toml");
        let config = HarnessConfig::default()
            .with_window(WindowConfig::new(1024, 768, "Round trip").with_samples(4))
            .with_render(RenderConfig {
                clear_color: [0.0, 0.5, 0.25, 1.0],
                swap_interval: 1,
                wireframe: true,
            });

        config.save_to_file(&path).unwrap();
        let loaded = HarnessConfig::load_from_file(&path).unwrap();
        std::fs::remove_file(&path).ok();

        assert_eq!(loaded.window, config.window);
        assert_eq!(loaded.render.swap_interval, 1);
        assert!(loaded.render.wireframe);
        for (a, b) in loaded.render.clear_color.iter().zip(config.render.clear_color.iter()) {
            assert_relative_eq!(a, b);
        }
    }

    #[test]
    fn test_ron_file_round_trip() {
        let path = scratch_path("round_trip.ron");
        let config = HarnessConfig {
            shaders: ShaderConfig::new("a.vert", "a.frag"),
            ..HarnessConfig::default()
        };

        config.save_to_file(&path).unwrap();
        let loaded = HarnessConfig::load_from_file(&path).unwrap();
        std::fs::remove_file(&path).ok();

        assert_eq!(loaded.shaders, config.shaders);
    }

    #[test]
    fn test_unknown_extension_is_unsupported() {
        let config = HarnessConfig::default();
        let result = config.save_to_file(scratch_path("config.yaml"));
        assert!(matches!(result, Err(ConfigError::UnsupportedFormat(_))));
    }
}
