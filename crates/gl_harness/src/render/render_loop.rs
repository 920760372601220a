//! Frame loop
//!
//! Each iteration clears, draws, presents and then blocks until the window
//! system delivers an event, so an idle window costs no CPU. Close requests
//! are only acted on between iterations.

use super::context::Context;
use super::error_reporter::ErrorReporter;
use super::geometry::GeometryBuffer;
use super::shader::ShaderProgram;
use crate::backend::Key;
use crate::core::RenderConfig;

/// Lifecycle of a [`RenderLoop`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LoopState {
    /// No frame rendered yet
    Idle,
    /// Frames are being rendered
    Rendering,
    /// Close condition observed; no further frames
    Closing,
    /// Program and geometry released
    Terminated,
}

/// Per-loop state observed between frames
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FrameState {
    /// Window close flag or escape key seen at the last iteration boundary
    pub close_requested: bool,
}

/// Totals of a finished loop
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LoopSummary {
    /// Frames presented
    pub frames: u64,
    /// Draw calls issued
    pub draw_calls: u64,
    /// GL errors drained from the error queue
    pub backend_errors: usize,
}

/// Renders a program and geometry until the window is asked to close
///
/// The loop owns the program and geometry and releases them on
/// [`RenderLoop::terminate`], geometry first. The context outlives both and
/// is closed by its owner afterwards.
pub struct RenderLoop<'ctx> {
    context: &'ctx Context,
    program: Option<ShaderProgram<'ctx>>,
    geometry: Option<GeometryBuffer<'ctx>>,
    settings: RenderConfig,
    resize_updates: bool,
    state: LoopState,
    frame: FrameState,
    reporter: ErrorReporter,
    frames: u64,
    draw_calls: u64,
}

impl<'ctx> RenderLoop<'ctx> {
    /// Create an idle loop; either resource may be absent
    pub fn new(
        context: &'ctx Context,
        program: Option<ShaderProgram<'ctx>>,
        geometry: Option<GeometryBuffer<'ctx>>,
        settings: RenderConfig,
    ) -> Self {
        Self {
            context,
            program,
            geometry,
            settings,
            resize_updates: false,
            state: LoopState::Idle,
            frame: FrameState::default(),
            reporter: ErrorReporter::new(),
            frames: 0,
            draw_calls: 0,
        }
    }

    /// Apply reported framebuffer sizes to the viewport
    pub fn with_resize_updates(mut self, enabled: bool) -> Self {
        self.resize_updates = enabled;
        self
    }

    /// Run frames until the close condition holds, then release resources
    pub fn run(&mut self) -> LoopSummary {
        while self.step() == LoopState::Rendering {}
        self.terminate();
        log::info!(
            "render loop finished after {} frames ({} draw calls, {} GL errors)",
            self.frames,
            self.draw_calls,
            self.reporter.reported()
        );
        self.summary()
    }

    /// Advance by one iteration and return the resulting state
    ///
    /// Does nothing once the loop is closing or terminated.
    pub fn step(&mut self) -> LoopState {
        match self.state {
            LoopState::Idle => {
                self.begin();
                if self.state == LoopState::Rendering {
                    self.render_frame();
                }
            }
            LoopState::Rendering => self.render_frame(),
            LoopState::Closing | LoopState::Terminated => {}
        }
        self.state
    }

    fn begin(&mut self) {
        let gl = self.context.gl();
        gl.clear_color(self.settings.clear_color);
        gl.polygon_mode(self.settings.wireframe);
        self.observe_close();
        self.state = if self.frame.close_requested {
            LoopState::Closing
        } else {
            LoopState::Rendering
        };
    }

    fn render_frame(&mut self) {
        let gl = self.context.gl();
        gl.clear_color_buffer();

        if let Some(program) = &self.program {
            program.bind();
        }
        if let Some(geometry) = &self.geometry {
            geometry.bind();
            geometry.draw();
            self.draw_calls += 1;
        }

        self.context.swap_buffers();
        self.frames += 1;
        crate::check_gl!(self.reporter, gl);

        self.context.wait_events();
        if self.resize_updates {
            for (width, height) in self.context.take_resizes() {
                log::debug!("framebuffer resized to {}x{}", width, height);
                gl.viewport(0, 0, width, height);
            }
        }

        self.observe_close();
        if self.frame.close_requested {
            self.state = LoopState::Closing;
        }
    }

    fn observe_close(&mut self) {
        if self.context.is_key_pressed(Key::Escape) {
            self.context.request_close();
        }
        self.frame.close_requested = self.context.should_close();
    }

    /// Release geometry, then the program; later calls do nothing
    pub fn terminate(&mut self) {
        if self.state == LoopState::Terminated {
            return;
        }
        if let Some(mut geometry) = self.geometry.take() {
            geometry.release();
        }
        if let Some(mut program) = self.program.take() {
            program.release();
        }
        self.state = LoopState::Terminated;
    }

    /// Current lifecycle state
    pub const fn state(&self) -> LoopState {
        self.state
    }

    /// Close flag as of the last iteration boundary
    pub const fn frame_state(&self) -> FrameState {
        self.frame
    }

    /// Totals so far
    pub const fn summary(&self) -> LoopSummary {
        LoopSummary {
            frames: self.frames,
            draw_calls: self.draw_calls,
            backend_errors: self.reporter.reported(),
        }
    }
}

impl Drop for RenderLoop<'_> {
    fn drop(&mut self) {
        self.terminate();
    }
}
