//! Backend abstraction for windowing and GL calls
//!
//! The harness talks to the outside world through two object-safe traits:
//!
//! - [`WindowSystem`]: backend bring-up, window/context creation, event waits
//!   and presentation
//! - [`GlApi`]: the small set of GL entry points the harness actually uses
//!
//! ```text
//! ┌──────────────────────────────┐
//! │ ContextManager / RenderLoop  │
//! └──────────────┬───────────────┘
//!                │ Uses
//!     ┌──────────▼──────────┐
//!     │ WindowSystem, GlApi │ ← traits (this module)
//!     └──────────┬──────────┘
//!                │ Implemented by
//!   ┌────────────▼─────────────┐
//!   │ glfw_gl: GLFW + glow     │ ← real window and driver
//!   │ headless: recording fake │ ← tests, CI without a display
//!   └──────────────────────────┘
//! ```
//!
//! # Thread Safety
//! Neither trait requires `Send`. GL calls must stay on the thread that made
//! the context current, and GLFW must be driven from the main thread anyway.

pub mod glfw_gl;
pub mod headless;

use crate::core::{LoaderOptions, WindowConfig};
use crate::error::HarnessResult;
use crate::render::StageKind;

pub use glfw_gl::{GlfwWindowSystem, GlowApi};
pub use headless::{
    FailurePoint, GlCall, HeadlessEvent, HeadlessGl, HeadlessProbe, HeadlessWindowSystem, WindowCall,
};

/// Raw GL object name (`GLuint`); 0 never names a live object
pub type GlName = u32;

/// Keys the harness observes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Key {
    /// The escape key
    Escape,
}

/// GL entry points used by the harness
///
/// Methods mirror the GL calls one to one. Object creation returns the
/// backend's error text on failure; everything else reports problems through
/// the GL error queue read by [`GlApi::get_error`].
pub trait GlApi {
    /// `glCreateShader`
    fn create_shader(&self, kind: StageKind) -> Result<GlName, String>;
    /// `glShaderSource` with a single string
    fn shader_source(&self, shader: GlName, source: &str);
    /// `glCompileShader`
    fn compile_shader(&self, shader: GlName);
    /// `GL_COMPILE_STATUS`
    fn shader_compile_status(&self, shader: GlName) -> bool;
    /// `GL_INFO_LOG_LENGTH` of a shader, including the terminating NUL
    fn shader_info_log_length(&self, shader: GlName) -> usize;
    /// `glGetShaderInfoLog` into a buffer of `capacity` bytes
    fn shader_info_log(&self, shader: GlName, capacity: usize) -> String;
    /// `glDeleteShader`
    fn delete_shader(&self, shader: GlName);

    /// `glCreateProgram`
    fn create_program(&self) -> Result<GlName, String>;
    /// `glAttachShader`
    fn attach_shader(&self, program: GlName, shader: GlName);
    /// `glDetachShader`
    fn detach_shader(&self, program: GlName, shader: GlName);
    /// `glLinkProgram`
    fn link_program(&self, program: GlName);
    /// `GL_LINK_STATUS`
    fn program_link_status(&self, program: GlName) -> bool;
    /// `GL_INFO_LOG_LENGTH` of a program, including the terminating NUL
    fn program_info_log_length(&self, program: GlName) -> usize;
    /// `glGetProgramInfoLog` into a buffer of `capacity` bytes
    fn program_info_log(&self, program: GlName, capacity: usize) -> String;
    /// `glUseProgram`
    fn use_program(&self, program: Option<GlName>);
    /// `glDeleteProgram`
    fn delete_program(&self, program: GlName);

    /// `glGenVertexArrays` for a single name
    fn create_vertex_array(&self) -> Result<GlName, String>;
    /// `glBindVertexArray`
    fn bind_vertex_array(&self, vertex_array: Option<GlName>);
    /// `glDeleteVertexArrays` for a single name
    fn delete_vertex_array(&self, vertex_array: GlName);
    /// `glGenBuffers` for a single name
    fn create_buffer(&self) -> Result<GlName, String>;
    /// `glBindBuffer(GL_ARRAY_BUFFER, ..)`
    fn bind_array_buffer(&self, buffer: Option<GlName>);
    /// `glBufferData(GL_ARRAY_BUFFER, .., GL_STATIC_DRAW)`
    fn array_buffer_data_static(&self, data: &[u8]);
    /// `glVertexAttribPointer` for non-normalized floats, stride and offset in bytes
    fn vertex_attrib_pointer_f32(&self, index: u32, components: i32, stride: i32, offset: i32);
    /// `glEnableVertexAttribArray`
    fn enable_vertex_attrib_array(&self, index: u32);
    /// `glDeleteBuffers` for a single name
    fn delete_buffer(&self, buffer: GlName);

    /// `glClearColor`
    fn clear_color(&self, rgba: [f32; 4]);
    /// `glClear(GL_COLOR_BUFFER_BIT)`
    fn clear_color_buffer(&self);
    /// `glViewport`
    fn viewport(&self, x: i32, y: i32, width: i32, height: i32);
    /// `glPolygonMode(GL_FRONT_AND_BACK, ..)`, lines when `wireframe`
    fn polygon_mode(&self, wireframe: bool);
    /// `glDrawArrays(GL_TRIANGLES, ..)`
    fn draw_triangles(&self, first: i32, count: i32);

    /// `glGetError`
    fn get_error(&self) -> u32;
    /// `GL_RENDERER`
    fn renderer_string(&self) -> String;
    /// `GL_VERSION`
    fn version_string(&self) -> String;
    /// Major and minor version of the current context
    fn context_version(&self) -> (u32, u32);
}

/// Windowing backend contract
///
/// The bring-up methods are called by [`crate::render::ContextManager`] in a
/// fixed order (`init`, `apply_hints`, `create_window`, `make_current`,
/// `load_gl`). When a step fails, the steps already taken are undone with
/// `destroy_window` and `terminate`.
pub trait WindowSystem {
    /// Initialize the windowing library
    fn init(&mut self) -> HarnessResult<()>;

    /// Pass version, profile and sample hints for the next window
    fn apply_hints(&mut self, config: &WindowConfig);

    /// Create the window and its GL context
    fn create_window(&mut self, config: &WindowConfig) -> HarnessResult<()>;

    /// Make the window's context current on this thread
    fn make_current(&mut self);

    /// Resolve GL entry points for the current context
    fn load_gl(&mut self, loader: LoaderOptions) -> HarnessResult<Box<dyn GlApi>>;

    /// Number of display refreshes to wait before a swap
    fn set_swap_interval(&mut self, interval: u32);

    /// Start or stop collecting framebuffer size changes
    fn set_resize_polling(&mut self, enabled: bool);

    /// Present the back buffer
    fn swap_buffers(&mut self);

    /// Block until at least one event has been delivered
    fn wait_events(&mut self);

    /// Whether the window manager asked the window to close
    fn should_close(&self) -> bool;

    /// Set the window's close flag
    fn set_should_close(&mut self, should_close: bool);

    /// Whether `key` is currently held down
    fn is_key_pressed(&self, key: Key) -> bool;

    /// Framebuffer sizes reported since the last call, oldest first
    fn take_resizes(&mut self) -> Vec<(i32, i32)>;

    /// Destroy the window and its context
    fn destroy_window(&mut self);

    /// Shut the windowing library down
    fn terminate(&mut self);
}
