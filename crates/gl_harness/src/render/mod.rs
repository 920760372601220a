//! Rendering components
//!
//! ```text
//! ContextManager::open ──► Context
//!                            │ borrowed by
//!          ┌─────────────────┼──────────────────┐
//!          ▼                 ▼                  ▼
//!   ShaderPipelineBuilder  GeometryBuffer   ErrorReporter
//!          │ link            │ upload           │ drain
//!          ▼                 ▼                  │
//!   ShaderProgram ───────► RenderLoop ◄─────────┘
//! ```
//!
//! Release order is the reverse: the loop drops geometry, then the program,
//! and the context is closed last.

pub mod context;
pub mod error_reporter;
pub mod geometry;
pub mod render_loop;
pub mod shader;

pub use context::{Context, ContextManager, ContextState};
pub use error_reporter::{BackendError, ErrorReporter};
pub use geometry::{GeometryBuffer, VertexAttribute, VertexLayout};
pub use render_loop::{FrameState, LoopState, LoopSummary, RenderLoop};
pub use shader::{
    ProgramStatus, ShaderPipelineBuilder, ShaderProgram, ShaderSources, StageHandle, StageKind, StageStatus,
    PASSTHROUGH_FRAGMENT_SOURCE, PASSTHROUGH_VERTEX_SOURCE,
};
