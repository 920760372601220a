//! Window and GL context lifetime
//!
//! [`ContextManager::open`] brings the windowing backend up step by step and
//! hands back a [`Context`]. Every GL resource in the harness borrows the
//! context's [`GlApi`], so the borrow checker keeps the context alive until
//! they are gone.

use crate::backend::{GlApi, Key, WindowSystem};
use crate::core::{HarnessConfig, WindowConfig};
use crate::error::{HarnessError, HarnessResult};
use std::cell::RefCell;
use std::fmt;

/// Bring-up progress of a context
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ContextState {
    /// Nothing has been initialized
    Uninitialized,
    /// Windowing library initialized
    BackendReady,
    /// Window and context exist
    WindowCreated,
    /// Context is current on this thread
    Current,
    /// GL entry points loaded; ready for use
    Open,
    /// Window destroyed and backend terminated
    Closed,
}

/// Opens rendering contexts
pub struct ContextManager;

impl ContextManager {
    /// Bring up the backend, create the window and load GL
    ///
    /// Steps: initialize the backend, apply context hints, create the window,
    /// make its context current, load GL, then set the swap interval and
    /// resize event tracking. If any step fails, the window is destroyed
    /// (when created) and the backend terminated (when initialized) before
    /// the error is returned.
    pub fn open(config: &HarnessConfig, window_system: Box<dyn WindowSystem>) -> HarnessResult<Context> {
        let window = &config.window;
        let loader = config.loader;
        let mut bring_up = BringUp {
            window_system: Some(window_system),
            state: ContextState::Uninitialized,
        };

        bring_up.system()?.init()?;
        bring_up.state = ContextState::BackendReady;

        bring_up.system()?.apply_hints(window);
        bring_up.system()?.create_window(window)?;
        bring_up.state = ContextState::WindowCreated;

        bring_up.system()?.make_current();
        bring_up.state = ContextState::Current;

        let gl = bring_up.system()?.load_gl(loader)?;
        if !loader.experimental {
            check_version(gl.as_ref(), window)?;
        }

        let system = bring_up.system()?;
        system.set_swap_interval(config.render.swap_interval);
        system.set_resize_polling(config.features.resize_callback);

        log::info!("Renderer: {}", gl.renderer_string());
        log::info!("OpenGL version supported {}", gl.version_string());

        let window_system = bring_up.finish()?;
        Ok(Context {
            window: RefCell::new(window_system),
            gl,
            state: ContextState::Open,
        })
    }
}

fn check_version(gl: &dyn GlApi, window: &WindowConfig) -> HarnessResult<()> {
    let requested = (window.major_version, window.minor_version);
    let reported = gl.context_version();
    if reported < requested {
        return Err(HarnessError::Initialization(format!(
            "context reports OpenGL {}.{}, {}.{} was requested",
            reported.0, reported.1, requested.0, requested.1
        )));
    }
    Ok(())
}

/// Undoes completed bring-up steps unless [`BringUp::finish`] is reached
struct BringUp {
    window_system: Option<Box<dyn WindowSystem>>,
    state: ContextState,
}

impl BringUp {
    fn system(&mut self) -> HarnessResult<&mut Box<dyn WindowSystem>> {
        self.window_system
            .as_mut()
            .ok_or_else(|| HarnessError::Initialization("window system already handed off".to_string()))
    }

    fn finish(mut self) -> HarnessResult<Box<dyn WindowSystem>> {
        self.state = ContextState::Open;
        self.window_system
            .take()
            .ok_or_else(|| HarnessError::Initialization("window system already handed off".to_string()))
    }
}

impl Drop for BringUp {
    fn drop(&mut self) {
        let Some(window_system) = self.window_system.as_mut() else {
            return;
        };
        if self.state >= ContextState::WindowCreated {
            log::debug!("rolling back: destroying window");
            window_system.destroy_window();
        }
        if self.state >= ContextState::BackendReady {
            log::debug!("rolling back: terminating window system");
            window_system.terminate();
        }
    }
}

/// One window with its current GL context
///
/// Window operations take `&self` so the render loop can share the context
/// with the resources that borrow its GL entry points.
pub struct Context {
    window: RefCell<Box<dyn WindowSystem>>,
    gl: Box<dyn GlApi>,
    state: ContextState,
}

impl Context {
    /// GL entry points of this context
    pub fn gl(&self) -> &dyn GlApi {
        self.gl.as_ref()
    }

    /// Present the back buffer
    pub fn swap_buffers(&self) {
        self.window.borrow_mut().swap_buffers();
    }

    /// Block until the window system delivers an event
    pub fn wait_events(&self) {
        self.window.borrow_mut().wait_events();
    }

    /// Whether the window has been asked to close
    pub fn should_close(&self) -> bool {
        self.window.borrow().should_close()
    }

    /// Set the window's close flag
    pub fn request_close(&self) {
        self.window.borrow_mut().set_should_close(true);
    }

    /// Whether `key` is held down
    pub fn is_key_pressed(&self, key: Key) -> bool {
        self.window.borrow().is_key_pressed(key)
    }

    /// Framebuffer sizes reported since the last call
    pub fn take_resizes(&self) -> Vec<(i32, i32)> {
        self.window.borrow_mut().take_resizes()
    }

    /// Presentation swap interval
    pub fn set_swap_interval(&self, interval: u32) {
        self.window.borrow_mut().set_swap_interval(interval);
    }

    /// Start or stop tracking framebuffer resizes
    pub fn set_resize_polling(&self, enabled: bool) {
        self.window.borrow_mut().set_resize_polling(enabled);
    }

    /// Current lifecycle state
    pub const fn state(&self) -> ContextState {
        self.state
    }

    /// Whether [`Context::close`] has not run yet
    pub fn is_open(&self) -> bool {
        self.state == ContextState::Open
    }

    /// Destroy the window and terminate the backend; later calls do nothing
    pub fn close(&mut self) {
        if self.state == ContextState::Closed {
            return;
        }
        let window = self.window.get_mut();
        window.destroy_window();
        window.terminate();
        self.state = ContextState::Closed;
        log::info!("context closed");
    }
}

impl Drop for Context {
    fn drop(&mut self) {
        self.close();
    }
}

impl fmt::Debug for Context {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Context").field("state", &self.state).finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::headless::{FailurePoint, HeadlessEvent, WindowCall};
    use crate::backend::HeadlessWindowSystem;
    use crate::core::{LoaderOptions, PipelineFeatures, RenderConfig};

    fn open(window_system: HeadlessWindowSystem) -> HarnessResult<Context> {
        ContextManager::open(&HarnessConfig::default(), Box::new(window_system))
    }

    fn versioned(major: u32, minor: u32, experimental: bool) -> HarnessConfig {
        HarnessConfig {
            loader: LoaderOptions { experimental },
            ..HarnessConfig::default().with_window(WindowConfig::default().with_version(major, minor))
        }
    }

    #[test]
    fn test_open_runs_bring_up_in_order() {
        let window_system = HeadlessWindowSystem::new();
        let probe = window_system.probe();

        let context = open(window_system).unwrap();
        assert!(context.is_open());
        assert_eq!(
            probe.window_calls(),
            vec![
                WindowCall::Init,
                WindowCall::ApplyHints,
                WindowCall::CreateWindow,
                WindowCall::MakeCurrent,
                WindowCall::LoadGl,
                WindowCall::SwapInterval(0),
                WindowCall::ResizePolling(true),
            ]
        );
        assert!(probe.window_open());
    }

    #[test]
    fn test_init_failure_touches_nothing_else() {
        let window_system = HeadlessWindowSystem::new().failing_at(FailurePoint::Init);
        let probe = window_system.probe();

        let err = open(window_system).unwrap_err();
        assert!(matches!(err, HarnessError::Initialization(_)));
        assert_eq!(probe.window_calls(), vec![WindowCall::Init]);
    }

    #[test]
    fn test_window_failure_terminates_backend() {
        let window_system = HeadlessWindowSystem::new().failing_at(FailurePoint::CreateWindow);
        let probe = window_system.probe();

        let err = open(window_system).unwrap_err();
        assert!(matches!(err, HarnessError::WindowCreation(_)));
        let calls = probe.window_calls();
        assert_eq!(calls.last(), Some(&WindowCall::Terminate));
        assert!(!calls.contains(&WindowCall::DestroyWindow));
        assert!(!probe.initialized());
    }

    #[test]
    fn test_loader_failure_destroys_window_then_terminates() {
        let window_system = HeadlessWindowSystem::new().failing_at(FailurePoint::LoadGl);
        let probe = window_system.probe();

        let err = open(window_system).unwrap_err();
        assert!(matches!(err, HarnessError::Initialization(_)));
        let calls = probe.window_calls();
        assert_eq!(&calls[calls.len() - 2..], &[WindowCall::DestroyWindow, WindowCall::Terminate]);
        assert!(!probe.window_open());
        assert!(!probe.initialized());
    }

    #[test]
    fn test_strict_loader_rejects_older_context() {
        let window_system = HeadlessWindowSystem::new().with_context_version(3, 1);
        let probe = window_system.probe();

        let err = ContextManager::open(&versioned(3, 3, false), Box::new(window_system)).unwrap_err();
        assert!(matches!(err, HarnessError::Initialization(_)));
        assert!(!probe.window_open());
        assert!(!probe.initialized());
    }

    #[test]
    fn test_experimental_loader_accepts_older_context() {
        let window_system = HeadlessWindowSystem::new().with_context_version(3, 1);

        let context = ContextManager::open(&versioned(3, 3, true), Box::new(window_system));
        assert!(context.is_ok());
    }

    #[test]
    fn test_close_is_idempotent() {
        let window_system = HeadlessWindowSystem::new();
        let probe = window_system.probe();

        let mut context = open(window_system).unwrap();
        context.close();
        context.close();
        drop(context);

        let calls = probe.window_calls();
        let count = |wanted: &WindowCall| calls.iter().filter(|c| *c == wanted).count();
        assert_eq!(count(&WindowCall::DestroyWindow), 1);
        assert_eq!(count(&WindowCall::Terminate), 1);
    }

    #[test]
    fn test_drop_closes_context() {
        let window_system = HeadlessWindowSystem::new();
        let probe = window_system.probe();

        drop(open(window_system).unwrap());
        assert!(!probe.window_open());
        assert!(!probe.initialized());
    }

    #[test]
    fn test_escape_and_close_flag() {
        let window_system = HeadlessWindowSystem::new().with_events([HeadlessEvent::Escape]);
        let context = open(window_system).unwrap();

        assert!(!context.is_key_pressed(Key::Escape));
        context.wait_events();
        assert!(context.is_key_pressed(Key::Escape));
        assert!(!context.should_close());
        context.request_close();
        assert!(context.should_close());
    }

    #[test]
    fn test_open_applies_presentation_settings() {
        let window_system = HeadlessWindowSystem::new();
        let probe = window_system.probe();
        let config = HarnessConfig::default()
            .with_render(RenderConfig {
                swap_interval: 1,
                ..RenderConfig::default()
            })
            .with_features(PipelineFeatures {
                resize_callback: false,
                ..PipelineFeatures::default()
            });

        let _context = ContextManager::open(&config, Box::new(window_system)).unwrap();
        let calls = probe.window_calls();
        assert!(calls.contains(&WindowCall::SwapInterval(1)));
        assert!(calls.contains(&WindowCall::ResizePolling(false)));
    }
}
