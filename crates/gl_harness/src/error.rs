//! Fatal error taxonomy for the harness
//!
//! Every variant here ends the run: the first one to occur unwinds to the
//! caller of [`crate::Harness::run`], which logs it and exits with status 1.
//! Non-fatal GL errors live in [`crate::render::BackendError`] instead.

use crate::config::ConfigError;
use crate::render::StageKind;
use std::path::PathBuf;
use thiserror::Error;

/// Fatal harness errors
#[derive(Error, Debug)]
pub enum HarnessError {
    /// The windowing/graphics backend could not be brought up
    #[error("Initialization failed: {0}")]
    Initialization(String),

    /// No window/context could be created under the requested hints
    #[error("Window creation failed: {0}")]
    WindowCreation(String),

    /// A shader stage was rejected by the compiler
    #[error("{stage} shader compilation failed:\n{log}")]
    Compile {
        /// Stage that failed to compile
        stage: StageKind,
        /// Compiler diagnostic, verbatim
        log: String,
    },

    /// The stage combination was rejected at link time
    #[error("shader program linking failed:\n{log}")]
    Link {
        /// Linker diagnostic, verbatim
        log: String,
    },

    /// The backend refused to create an object (shader, program, buffer)
    #[error("Resource creation failed: {0}")]
    ResourceCreation(String),

    /// A shader source file named in the configuration could not be read
    #[error("Failed to read shader source {path:?}: {source}")]
    ShaderSource {
        /// Path that was read
        path: PathBuf,
        /// Underlying IO error
        source: std::io::Error,
    },

    /// Configuration could not be loaded or is invalid
    #[error("Config error: {0}")]
    Config(#[from] ConfigError),
}

impl HarnessError {
    /// Process exit status for this error
    ///
    /// Every fatal error maps to 1; a clean shutdown is 0.
    pub const fn exit_code(&self) -> u8 {
        1
    }
}

/// Result type for harness operations
pub type HarnessResult<T> = Result<T, HarnessError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_compile_error_carries_log_verbatim() {
        let err = HarnessError::Compile {
            stage: StageKind::Vertex,
            log: "0:3(1): error: syntax error".to_string(),
        };
        let message = err.to_string();
        assert!(message.starts_with("vertex shader compilation failed"));
        assert!(message.ends_with("0:3(1): error: syntax error"));
    }

    #[test]
    fn test_every_fatal_error_exits_with_one() {
        let errors = [
            HarnessError::Initialization("glfw".into()),
            HarnessError::WindowCreation("hints".into()),
            HarnessError::Link { log: "mismatch".into() },
            HarnessError::ResourceCreation("buffer".into()),
        ];
        for err in &errors {
            assert_eq!(err.exit_code(), 1);
        }
    }
}
