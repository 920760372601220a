//! GL error queue reporting

use crate::backend::GlApi;
use std::fmt;

/// Upper bound on codes read per check; a lost context can report forever
const MAX_DRAINED_PER_CHECK: usize = 32;

/// Non-fatal error code read from the GL error queue
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BackendError {
    /// Raw `GLenum` returned by `glGetError`
    pub code: u32,
}

impl BackendError {
    /// Wrap a raw error code
    pub const fn new(code: u32) -> Self {
        Self { code }
    }

    /// Lowercase name of the error code
    pub const fn name(&self) -> &'static str {
        match self.code {
            glow::INVALID_ENUM => "invalid_enum",
            glow::INVALID_VALUE => "invalid_value",
            glow::INVALID_OPERATION => "invalid_operation",
            glow::STACK_OVERFLOW => "stack_overflow",
            glow::STACK_UNDERFLOW => "stack_underflow",
            glow::OUT_OF_MEMORY => "out_of_memory",
            glow::INVALID_FRAMEBUFFER_OPERATION => "invalid_framebuffer_operation",
            glow::CONTEXT_LOST => "context_lost",
            _ => "unknown_error",
        }
    }
}

impl fmt::Display for BackendError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "OpenGL error {:#06x}: {}", self.code, self.name())
    }
}

impl std::error::Error for BackendError {}

/// Drains the GL error queue and logs what it finds
#[derive(Debug, Default)]
pub struct ErrorReporter {
    reported: usize,
}

impl ErrorReporter {
    /// Reporter with nothing reported yet
    pub const fn new() -> Self {
        Self { reported: 0 }
    }

    /// Pop queued error codes until the queue reports none
    ///
    /// Each code is logged as `OpenGL error (file:line) : name`. Prefer the
    /// [`check_gl!`](crate::check_gl) macro, which fills in the call site.
    pub fn drain(&mut self, gl: &dyn GlApi, file: &str, line: u32) -> Vec<BackendError> {
        let mut errors = Vec::new();
        while errors.len() < MAX_DRAINED_PER_CHECK {
            let code = gl.get_error();
            if code == glow::NO_ERROR {
                break;
            }
            let error = BackendError::new(code);
            log::error!("OpenGL error ({}:{}) : {}", file, line, error.name());
            errors.push(error);
        }
        self.reported += errors.len();
        errors
    }

    /// Errors reported over this reporter's lifetime
    pub const fn reported(&self) -> usize {
        self.reported
    }
}

/// Drain the GL error queue, tagging reports with the current file and line
///
/// ```ignore
/// let errors = check_gl!(reporter, context.gl());
/// ```
#[macro_export]
macro_rules! check_gl {
    ($reporter:expr, $gl:expr) => {
        $reporter.drain($gl, file!(), line!())
    };
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::HeadlessGl;

    #[test]
    fn test_error_names() {
        let names: Vec<_> = [
            glow::INVALID_ENUM,
            glow::INVALID_VALUE,
            glow::INVALID_OPERATION,
            glow::STACK_OVERFLOW,
            glow::STACK_UNDERFLOW,
            glow::OUT_OF_MEMORY,
            glow::INVALID_FRAMEBUFFER_OPERATION,
            glow::CONTEXT_LOST,
            0x1234,
        ]
        .into_iter()
        .map(|code| BackendError::new(code).name())
        .collect();

        assert_eq!(
            names,
            [
                "invalid_enum",
                "invalid_value",
                "invalid_operation",
                "stack_overflow",
                "stack_underflow",
                "out_of_memory",
                "invalid_framebuffer_operation",
                "context_lost",
                "unknown_error",
            ]
        );
    }

    #[test]
    fn test_drain_empties_queue_in_order() {
        let gl = HeadlessGl::new();
        let probe = gl.probe();
        probe.inject_error(glow::INVALID_VALUE);
        probe.inject_error(glow::OUT_OF_MEMORY);

        let mut reporter = ErrorReporter::new();
        let errors = check_gl!(reporter, &gl);

        assert_eq!(
            errors,
            vec![BackendError::new(glow::INVALID_VALUE), BackendError::new(glow::OUT_OF_MEMORY)]
        );
        assert!(probe.pending_errors().is_empty());
        assert_eq!(reporter.reported(), 2);
    }

    #[test]
    fn test_drain_on_clean_queue() {
        let gl = HeadlessGl::new();
        let mut reporter = ErrorReporter::new();
        assert!(reporter.drain(&gl, "frame.rs", 7).is_empty());
        assert_eq!(reporter.reported(), 0);
    }

    #[test]
    fn test_drain_is_bounded() {
        let gl = HeadlessGl::new();
        let probe = gl.probe();
        for _ in 0..MAX_DRAINED_PER_CHECK + 3 {
            probe.inject_error(glow::CONTEXT_LOST);
        }

        let mut reporter = ErrorReporter::new();
        assert_eq!(reporter.drain(&gl, file!(), line!()).len(), MAX_DRAINED_PER_CHECK);
        assert_eq!(reporter.drain(&gl, file!(), line!()).len(), 3);
        assert_eq!(reporter.reported(), MAX_DRAINED_PER_CHECK + 3);
    }

    #[test]
    fn test_display_includes_name() {
        let error = BackendError::new(glow::INVALID_OPERATION);
        assert!(error.to_string().contains("invalid_operation"));
    }
}
