//! # GL Harness
//!
//! A minimal OpenGL rendering harness: one window, one shader program, one
//! vertex buffer, and a frame loop that sleeps until the window system has
//! something to say.
//!
//! ## Components
//!
//! - **ContextManager**: window and GL context bring-up with rollback
//! - **ShaderPipelineBuilder**: stage compilation and program linking
//! - **GeometryBuffer**: interleaved vertex upload and attribute layout
//! - **RenderLoop**: clear, draw, present, wait
//! - **ErrorReporter**: GL error queue draining
//!
//! All GL and window calls go through the [`backend`] traits, so the whole
//! pipeline runs against the headless backend in tests.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use gl_harness::prelude::*;
//!
//! const TRIANGLE: [f32; 18] = [
//!     -0.5, -0.5, 0.0, 1.0, 0.0, 0.0,
//!      0.5, -0.5, 0.0, 0.0, 1.0, 0.0,
//!      0.0,  0.5, 0.0, 0.0, 0.0, 1.0,
//! ];
//!
//! fn main() -> Result<(), HarnessError> {
//!     let harness = Harness::new(HarnessConfig::default());
//!     let summary = harness.run(Box::new(GlfwWindowSystem::new()), &TRIANGLE)?;
//!     println!("{} frames", summary.frames);
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all, clippy::pedantic, clippy::nursery)]
#![allow(clippy::module_name_repetitions, clippy::similar_names)]

pub mod backend;
pub mod config;
pub mod core;
pub mod error;
pub mod render;

mod harness;

pub use error::{HarnessError, HarnessResult};
pub use harness::{Harness, RunSummary};

/// Common imports for harness users
pub mod prelude {
    pub use crate::{
        backend::{GlApi, GlfwWindowSystem, HeadlessWindowSystem, WindowSystem},
        core::{Config, HarnessConfig, LoaderOptions, PipelineFeatures, RenderConfig, ShaderConfig, WindowConfig},
        render::{ContextManager, GeometryBuffer, RenderLoop, ShaderPipelineBuilder, StageKind, VertexLayout},
        Harness, HarnessError, HarnessResult, RunSummary,
    };
}
