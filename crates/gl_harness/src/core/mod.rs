//! # Core Harness Module
//!
//! Shared configuration types used by every subsystem of the harness.
//!
//! ## Organization
//!
//! - **Config**: the serializable [`HarnessConfig`] tree and its sections

pub mod config;

// Re-export commonly used config types
pub use config::{
    ContextProfile,
    HarnessConfig,
    LoaderOptions,
    PipelineFeatures,
    RenderConfig,
    ShaderConfig,
    WindowConfig,
};
pub use crate::config::{Config, ConfigError};
