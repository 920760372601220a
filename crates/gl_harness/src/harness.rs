//! Top-level orchestration
//!
//! Opens the context, builds whatever the enabled features ask for, runs the
//! loop and closes the context again, on the error path as well.

use crate::backend::WindowSystem;
use crate::core::HarnessConfig;
use crate::error::HarnessResult;
use crate::render::{
    Context, ContextManager, GeometryBuffer, LoopSummary, RenderLoop, ShaderPipelineBuilder, ShaderSources,
    VertexLayout,
};

/// Totals of a completed run
pub type RunSummary = LoopSummary;

/// Renders interleaved position/color triangles in one window
#[derive(Debug, Clone, Default)]
pub struct Harness {
    config: HarnessConfig,
}

impl Harness {
    /// Harness for `config`; validated when run
    pub const fn new(config: HarnessConfig) -> Self {
        Self { config }
    }

    /// Active configuration
    pub const fn config(&self) -> &HarnessConfig {
        &self.config
    }

    /// Render `vertices` (3 position + 3 color floats each) until the window closes
    ///
    /// Configuration and shader sources are checked before any window is
    /// created. Once the context is open it is closed before this returns,
    /// whatever the outcome.
    pub fn run(&self, window_system: Box<dyn WindowSystem>, vertices: &[f32]) -> HarnessResult<RunSummary> {
        self.config.validate()?;
        let features = self.config.features;

        let sources = if features.shaders {
            Some(ShaderSources::from_config(&self.config.shaders)?)
        } else {
            None
        };

        let mut context = ContextManager::open(&self.config, window_system)?;

        let result = self.render(&context, sources.as_ref(), vertices);
        context.close();

        if let Ok(summary) = &result {
            log::info!("run complete: {} frames, {} draw calls", summary.frames, summary.draw_calls);
        }
        result
    }

    fn render(&self, context: &Context, sources: Option<&ShaderSources>, vertices: &[f32]) -> HarnessResult<RunSummary> {
        let features = self.config.features;

        let program = match sources {
            Some(sources) => Some(ShaderPipelineBuilder::new(context.gl()).build(&sources.stages())?),
            None => None,
        };
        let geometry = if features.geometry {
            Some(GeometryBuffer::upload(context.gl(), vertices, VertexLayout::position_color())?)
        } else {
            None
        };

        let mut render_loop = RenderLoop::new(context, program, geometry, self.config.render.clone())
            .with_resize_updates(features.resize_callback);
        Ok(render_loop.run())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::headless::{FailurePoint, HeadlessEvent, WindowCall};
    use crate::backend::{HeadlessProbe, HeadlessWindowSystem};
    use crate::core::{PipelineFeatures, ShaderConfig};
    use crate::error::HarnessError;
    use crate::render::StageKind;
    use std::path::PathBuf;

    const TRIANGLE: [f32; 18] = [
        -0.5, -0.5, 0.0, 1.0, 0.0, 0.0, //
        0.5, -0.5, 0.0, 0.0, 1.0, 0.0, //
        0.0, 0.5, 0.0, 0.0, 0.0, 1.0,
    ];

    fn assert_all_released(probe: &HeadlessProbe) {
        assert_eq!(probe.live_shaders(), 0);
        assert_eq!(probe.live_programs(), 0);
        assert_eq!(probe.live_buffers(), 0);
        assert_eq!(probe.live_vertex_arrays(), 0);
        assert_eq!(probe.double_releases(), 0);
        assert!(!probe.window_open());
        assert!(!probe.initialized());
    }

    fn temp_shader(name: &str, source: &str) -> PathBuf {
        let path = std::env::temp_dir().join(format!("gl_harness_{}_{}", std::process::id(), name));
        std::fs::write(&path, source).unwrap();
        path
    }

    #[test]
    fn test_run_draws_and_releases_everything() {
        let window_system = HeadlessWindowSystem::new().with_events([HeadlessEvent::Idle]);
        let probe = window_system.probe();

        let summary = Harness::default().run(Box::new(window_system), &TRIANGLE).unwrap();

        assert_eq!(summary.frames, 2);
        assert_eq!(summary.draw_calls, 2);
        assert_eq!(summary.backend_errors, 0);
        assert_eq!(probe.draw_calls(), vec![(0, 3), (0, 3)]);
        assert_all_released(&probe);
    }

    #[test]
    fn test_run_applies_presentation_settings() {
        let window_system = HeadlessWindowSystem::new();
        let probe = window_system.probe();

        Harness::default().run(Box::new(window_system), &TRIANGLE).unwrap();

        let calls = probe.window_calls();
        assert!(calls.contains(&WindowCall::SwapInterval(0)));
        assert!(calls.contains(&WindowCall::ResizePolling(true)));
    }

    #[test]
    fn test_window_failure_is_fatal() {
        let window_system = HeadlessWindowSystem::new().failing_at(FailurePoint::CreateWindow);
        let probe = window_system.probe();

        let err = Harness::default().run(Box::new(window_system), &TRIANGLE).unwrap_err();
        assert!(matches!(err, HarnessError::WindowCreation(_)));
        assert_eq!(err.exit_code(), 1);
        assert_all_released(&probe);
    }

    #[test]
    fn test_compile_failure_closes_context() {
        let path = temp_shader("broken.vert", "#version 330 core\nvoid mian() {}\n");
        let mut config = HarnessConfig::default();
        config.shaders = ShaderConfig {
            vertex_shader_path: Some(path.clone()),
            fragment_shader_path: None,
        };
        let window_system = HeadlessWindowSystem::new();
        let probe = window_system.probe();

        let err = Harness::new(config).run(Box::new(window_system), &TRIANGLE).unwrap_err();
        std::fs::remove_file(path).ok();

        match err {
            HarnessError::Compile { stage, log } => {
                assert_eq!(stage, StageKind::Vertex);
                assert!(!log.is_empty());
            }
            other => panic!("expected a compile error, got {other:?}"),
        }
        assert!(probe.window_calls().contains(&WindowCall::DestroyWindow));
        assert_all_released(&probe);
    }

    #[test]
    fn test_missing_shader_file_fails_before_window() {
        let mut config = HarnessConfig::default();
        config.shaders.fragment_shader_path = Some(PathBuf::from("/nonexistent/harness/passthrough.frag"));
        let window_system = HeadlessWindowSystem::new();
        let probe = window_system.probe();

        let err = Harness::new(config).run(Box::new(window_system), &TRIANGLE).unwrap_err();
        assert!(matches!(err, HarnessError::ShaderSource { .. }));
        assert!(probe.window_calls().is_empty());
    }

    #[test]
    fn test_invalid_config_fails_before_window() {
        let config = HarnessConfig::default().with_features(PipelineFeatures {
            shaders: false,
            geometry: true,
            resize_callback: true,
        });
        let window_system = HeadlessWindowSystem::new();
        let probe = window_system.probe();

        let err = Harness::new(config).run(Box::new(window_system), &TRIANGLE).unwrap_err();
        assert!(matches!(err, HarnessError::Config(_)));
        assert!(probe.window_calls().is_empty());
    }

    #[test]
    fn test_shaders_only_clears_without_drawing() {
        let config = HarnessConfig::default().with_features(PipelineFeatures {
            shaders: true,
            geometry: false,
            resize_callback: false,
        });
        let window_system = HeadlessWindowSystem::new();
        let probe = window_system.probe();

        let summary = Harness::new(config).run(Box::new(window_system), &TRIANGLE).unwrap();
        assert_eq!(summary.frames, 1);
        assert_eq!(summary.draw_calls, 0);
        assert!(probe.draw_calls().is_empty());
        assert!(probe.window_calls().contains(&WindowCall::ResizePolling(false)));
        assert_all_released(&probe);
    }

    #[test]
    fn test_window_only() {
        let config = HarnessConfig::default().with_features(PipelineFeatures {
            shaders: false,
            geometry: false,
            resize_callback: false,
        });
        let window_system = HeadlessWindowSystem::new().with_events([HeadlessEvent::Escape]);
        let probe = window_system.probe();

        let summary = Harness::new(config).run(Box::new(window_system), &[]).unwrap();
        assert_eq!(summary.frames, 1);
        assert_all_released(&probe);
    }
}
