//! Window management using GLFW, GL calls through glow
//!
//! The only module that touches the driver; everything here is a thin
//! forwarding layer.

#![allow(unsafe_code)]

use crate::backend::{GlApi, GlName, Key, WindowSystem};
use crate::core::{ContextProfile, LoaderOptions, WindowConfig};
use crate::error::{HarnessError, HarnessResult};
use crate::render::StageKind;
use glfw::Context as _;
use glow::HasContext;
use std::num::NonZeroU32;

fn report_glfw_error(error: glfw::Error, description: String) {
    log::error!("GLFW error {:?}: {}", error, description);
}

/// GLFW window wrapper with an OpenGL context
///
/// Starts empty; [`crate::render::ContextManager::open`] drives it through
/// bring-up.
#[derive(Default)]
pub struct GlfwWindowSystem {
    glfw: Option<glfw::Glfw>,
    window: Option<glfw::PWindow>,
    events: Option<glfw::GlfwReceiver<(f64, glfw::WindowEvent)>>,
    resizes: Vec<(i32, i32)>,
}

impl GlfwWindowSystem {
    /// Create an uninitialized window system
    pub fn new() -> Self {
        Self::default()
    }

    fn drain_events(&mut self) {
        let Some(events) = self.events.as_ref() else {
            return;
        };
        for (_, event) in glfw::flush_messages(events) {
            if let glfw::WindowEvent::FramebufferSize(width, height) = event {
                self.resizes.push((width, height));
            }
        }
    }
}

impl WindowSystem for GlfwWindowSystem {
    fn init(&mut self) -> HarnessResult<()> {
        let glfw = glfw::init(report_glfw_error)
            .map_err(|e| HarnessError::Initialization(format!("Failed to initialize glfw: {e:?}")))?;
        self.glfw = Some(glfw);
        Ok(())
    }

    fn apply_hints(&mut self, config: &WindowConfig) {
        let Some(glfw) = self.glfw.as_mut() else {
            return;
        };

        glfw.window_hint(glfw::WindowHint::ClientApi(glfw::ClientApiHint::OpenGl));
        glfw.window_hint(glfw::WindowHint::ContextVersion(config.major_version, config.minor_version));
        glfw.window_hint(glfw::WindowHint::OpenGlProfile(match config.profile {
            ContextProfile::Core => glfw::OpenGlProfileHint::Core,
            ContextProfile::Compatibility => glfw::OpenGlProfileHint::Compat,
            ContextProfile::Any => glfw::OpenGlProfileHint::Any,
        }));
        glfw.window_hint(glfw::WindowHint::OpenGlForwardCompat(config.forward_compatible));
        glfw.window_hint(glfw::WindowHint::Samples(config.samples));
    }

    fn create_window(&mut self, config: &WindowConfig) -> HarnessResult<()> {
        let glfw = self
            .glfw
            .as_mut()
            .ok_or_else(|| HarnessError::WindowCreation("glfw is not initialized".to_string()))?;

        let (window, events) = glfw
            .create_window(config.width, config.height, &config.title, glfw::WindowMode::Windowed)
            .ok_or_else(|| HarnessError::WindowCreation("Failed to create glfw window.".to_string()))?;

        self.window = Some(window);
        self.events = Some(events);
        Ok(())
    }

    fn make_current(&mut self) {
        if let Some(window) = self.window.as_mut() {
            window.make_current();
        }
    }

    fn load_gl(&mut self, loader: LoaderOptions) -> HarnessResult<Box<dyn GlApi>> {
        let window = self
            .window
            .as_mut()
            .ok_or_else(|| HarnessError::Initialization("no window to load GL functions from".to_string()))?;

        log::debug!("Resolving GL entry points (experimental loader: {})", loader.experimental);
        let gl = unsafe {
            glow::Context::from_loader_function(|name| window.get_proc_address(name) as *const _)
        };
        Ok(Box::new(GlowApi::new(gl)))
    }

    fn set_swap_interval(&mut self, interval: u32) {
        if let Some(glfw) = self.glfw.as_mut() {
            let interval = match interval {
                0 => glfw::SwapInterval::None,
                n => glfw::SwapInterval::Sync(n),
            };
            glfw.set_swap_interval(interval);
        }
    }

    fn set_resize_polling(&mut self, enabled: bool) {
        if let Some(window) = self.window.as_mut() {
            window.set_framebuffer_size_polling(enabled);
        }
    }

    fn swap_buffers(&mut self) {
        if let Some(window) = self.window.as_mut() {
            window.swap_buffers();
        }
    }

    fn wait_events(&mut self) {
        if let Some(glfw) = self.glfw.as_mut() {
            glfw.wait_events();
        }
        self.drain_events();
    }

    fn should_close(&self) -> bool {
        self.window.as_ref().map_or(true, |window| window.should_close())
    }

    fn set_should_close(&mut self, should_close: bool) {
        if let Some(window) = self.window.as_mut() {
            window.set_should_close(should_close);
        }
    }

    fn is_key_pressed(&self, key: Key) -> bool {
        let key = match key {
            Key::Escape => glfw::Key::Escape,
        };
        self.window
            .as_ref()
            .is_some_and(|window| window.get_key(key) == glfw::Action::Press)
    }

    fn take_resizes(&mut self) -> Vec<(i32, i32)> {
        std::mem::take(&mut self.resizes)
    }

    fn destroy_window(&mut self) {
        self.events = None;
        if self.window.take().is_some() {
            log::debug!("glfw window destroyed");
        }
    }

    fn terminate(&mut self) {
        self.destroy_window();
        // glfwTerminate runs when the last Glfw handle is dropped
        if self.glfw.take().is_some() {
            log::debug!("glfw terminated");
        }
    }
}

/// [`GlApi`] over a `glow::Context`
pub struct GlowApi {
    gl: glow::Context,
}

impl GlowApi {
    /// Wrap a loaded glow context
    pub const fn new(gl: glow::Context) -> Self {
        Self { gl }
    }
}

const fn stage_enum(kind: StageKind) -> u32 {
    match kind {
        StageKind::Vertex => glow::VERTEX_SHADER,
        StageKind::Fragment => glow::FRAGMENT_SHADER,
        StageKind::Geometry => glow::GEOMETRY_SHADER,
    }
}

fn shader(name: GlName) -> Option<glow::NativeShader> {
    NonZeroU32::new(name).map(glow::NativeShader)
}

fn program(name: GlName) -> Option<glow::NativeProgram> {
    NonZeroU32::new(name).map(glow::NativeProgram)
}

fn vertex_array(name: GlName) -> Option<glow::NativeVertexArray> {
    NonZeroU32::new(name).map(glow::NativeVertexArray)
}

fn buffer(name: GlName) -> Option<glow::NativeBuffer> {
    NonZeroU32::new(name).map(glow::NativeBuffer)
}

/// Log length as GL reports it: bytes plus the terminating NUL, 0 when empty
///
/// glow exposes no `GL_INFO_LOG_LENGTH` query, so the length is measured on a
/// fetched copy of the log and the log is fetched again at that capacity.
const fn reported_length(log: &str) -> usize {
    if log.is_empty() {
        0
    } else {
        log.len() + 1
    }
}

/// Cut a log to what fits in a `capacity`-byte buffer that ends with NUL
fn truncate_to_capacity(mut log: String, capacity: usize) -> String {
    let mut end = capacity.saturating_sub(1).min(log.len());
    while !log.is_char_boundary(end) {
        end -= 1;
    }
    log.truncate(end);
    log
}

impl GlApi for GlowApi {
    fn create_shader(&self, kind: StageKind) -> Result<GlName, String> {
        unsafe { self.gl.create_shader(stage_enum(kind)) }.map(|s| s.0.get())
    }

    fn shader_source(&self, name: GlName, source: &str) {
        if let Some(s) = shader(name) {
            unsafe { self.gl.shader_source(s, source) };
        }
    }

    fn compile_shader(&self, name: GlName) {
        if let Some(s) = shader(name) {
            unsafe { self.gl.compile_shader(s) };
        }
    }

    fn shader_compile_status(&self, name: GlName) -> bool {
        shader(name).is_some_and(|s| unsafe { self.gl.get_shader_compile_status(s) })
    }

    fn shader_info_log_length(&self, name: GlName) -> usize {
        shader(name).map_or(0, |s| reported_length(&unsafe { self.gl.get_shader_info_log(s) }))
    }

    fn shader_info_log(&self, name: GlName, capacity: usize) -> String {
        shader(name).map_or_else(String::new, |s| {
            truncate_to_capacity(unsafe { self.gl.get_shader_info_log(s) }, capacity)
        })
    }

    fn delete_shader(&self, name: GlName) {
        if let Some(s) = shader(name) {
            unsafe { self.gl.delete_shader(s) };
        }
    }

    fn create_program(&self) -> Result<GlName, String> {
        unsafe { self.gl.create_program() }.map(|p| p.0.get())
    }

    fn attach_shader(&self, program_name: GlName, shader_name: GlName) {
        if let (Some(p), Some(s)) = (program(program_name), shader(shader_name)) {
            unsafe { self.gl.attach_shader(p, s) };
        }
    }

    fn detach_shader(&self, program_name: GlName, shader_name: GlName) {
        if let (Some(p), Some(s)) = (program(program_name), shader(shader_name)) {
            unsafe { self.gl.detach_shader(p, s) };
        }
    }

    fn link_program(&self, name: GlName) {
        if let Some(p) = program(name) {
            unsafe { self.gl.link_program(p) };
        }
    }

    fn program_link_status(&self, name: GlName) -> bool {
        program(name).is_some_and(|p| unsafe { self.gl.get_program_link_status(p) })
    }

    fn program_info_log_length(&self, name: GlName) -> usize {
        program(name).map_or(0, |p| reported_length(&unsafe { self.gl.get_program_info_log(p) }))
    }

    fn program_info_log(&self, name: GlName, capacity: usize) -> String {
        program(name).map_or_else(String::new, |p| {
            truncate_to_capacity(unsafe { self.gl.get_program_info_log(p) }, capacity)
        })
    }

    fn use_program(&self, name: Option<GlName>) {
        unsafe { self.gl.use_program(name.and_then(program)) };
    }

    fn delete_program(&self, name: GlName) {
        if let Some(p) = program(name) {
            unsafe { self.gl.delete_program(p) };
        }
    }

    fn create_vertex_array(&self) -> Result<GlName, String> {
        unsafe { self.gl.create_vertex_array() }.map(|v| v.0.get())
    }

    fn bind_vertex_array(&self, name: Option<GlName>) {
        unsafe { self.gl.bind_vertex_array(name.and_then(vertex_array)) };
    }

    fn delete_vertex_array(&self, name: GlName) {
        if let Some(v) = vertex_array(name) {
            unsafe { self.gl.delete_vertex_array(v) };
        }
    }

    fn create_buffer(&self) -> Result<GlName, String> {
        unsafe { self.gl.create_buffer() }.map(|b| b.0.get())
    }

    fn bind_array_buffer(&self, name: Option<GlName>) {
        unsafe { self.gl.bind_buffer(glow::ARRAY_BUFFER, name.and_then(buffer)) };
    }

    fn array_buffer_data_static(&self, data: &[u8]) {
        unsafe { self.gl.buffer_data_u8_slice(glow::ARRAY_BUFFER, data, glow::STATIC_DRAW) };
    }

    fn vertex_attrib_pointer_f32(&self, index: u32, components: i32, stride: i32, offset: i32) {
        unsafe {
            self.gl
                .vertex_attrib_pointer_f32(index, components, glow::FLOAT, false, stride, offset);
        }
    }

    fn enable_vertex_attrib_array(&self, index: u32) {
        unsafe { self.gl.enable_vertex_attrib_array(index) };
    }

    fn delete_buffer(&self, name: GlName) {
        if let Some(b) = buffer(name) {
            unsafe { self.gl.delete_buffer(b) };
        }
    }

    fn clear_color(&self, rgba: [f32; 4]) {
        unsafe { self.gl.clear_color(rgba[0], rgba[1], rgba[2], rgba[3]) };
    }

    fn clear_color_buffer(&self) {
        unsafe { self.gl.clear(glow::COLOR_BUFFER_BIT) };
    }

    fn viewport(&self, x: i32, y: i32, width: i32, height: i32) {
        unsafe { self.gl.viewport(x, y, width, height) };
    }

    fn polygon_mode(&self, wireframe: bool) {
        let mode = if wireframe { glow::LINE } else { glow::FILL };
        unsafe { self.gl.polygon_mode(glow::FRONT_AND_BACK, mode) };
    }

    fn draw_triangles(&self, first: i32, count: i32) {
        unsafe { self.gl.draw_arrays(glow::TRIANGLES, first, count) };
    }

    fn get_error(&self) -> u32 {
        unsafe { self.gl.get_error() }
    }

    fn renderer_string(&self) -> String {
        unsafe { self.gl.get_parameter_string(glow::RENDERER) }
    }

    fn version_string(&self) -> String {
        unsafe { self.gl.get_parameter_string(glow::VERSION) }
    }

    fn context_version(&self) -> (u32, u32) {
        let version = self.gl.version();
        (version.major, version.minor)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reported_length_counts_terminator() {
        assert_eq!(reported_length(""), 0);
        assert_eq!(reported_length("error"), 6);
    }

    #[test]
    fn test_truncate_respects_capacity_and_char_boundaries() {
        assert_eq!(truncate_to_capacity("abcdef".to_string(), 4), "abc");
        assert_eq!(truncate_to_capacity("abc".to_string(), 64), "abc");
        assert_eq!(truncate_to_capacity("abc".to_string(), 0), "");
        // 'é' is two bytes; a cut inside it backs off to the previous boundary
        assert_eq!(truncate_to_capacity("aé".to_string(), 3), "a");
    }
}
