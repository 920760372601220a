//! Shader compilation and program linking
//!
//! GLSL stages are compiled one by one into stage objects owned by the
//! [`ShaderPipelineBuilder`], then linked into a [`ShaderProgram`]. Stage
//! objects are single-use: `link` detaches and deletes every stage it was
//! given before it returns, whether or not the link succeeded.
//!
//! ```text
//! stage:   Uncompiled ──► Compiling ──► Compiled ──► (consumed by link)
//!                                  └──► Failed   ──► (deleted at once)
//!
//! program: Unlinked ──► Linking ──► Linked
//!                              └──► Failed  ──► (deleted at once)
//! ```

use crate::backend::{GlApi, GlName};
use crate::core::ShaderConfig;
use crate::error::{HarnessError, HarnessResult};
use std::fmt;
use std::path::Path;

/// Built-in vertex stage: position at slot 0, color at slot 1, passed through
pub const PASSTHROUGH_VERTEX_SOURCE: &str = include_str!("../../shaders/passthrough.vert");

/// Built-in fragment stage: writes the interpolated color unmodified
pub const PASSTHROUGH_FRAGMENT_SOURCE: &str = include_str!("../../shaders/passthrough.frag");

/// Pipeline stage a shader is compiled for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StageKind {
    /// Vertex stage
    Vertex,
    /// Fragment stage
    Fragment,
    /// Geometry stage
    Geometry,
}

impl fmt::Display for StageKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Vertex => "vertex",
            Self::Fragment => "fragment",
            Self::Geometry => "geometry",
        })
    }
}

/// Compilation status of a stage
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StageStatus {
    /// Source recorded, not yet submitted
    Uncompiled,
    /// Submitted to the compiler
    Compiling,
    /// Accepted by the compiler
    Compiled,
    /// Rejected by the compiler
    Failed,
}

/// Link status of a program
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProgramStatus {
    /// Program object not created yet
    Unlinked,
    /// Stages attached, link requested
    Linking,
    /// Accepted by the linker
    Linked,
    /// Rejected by the linker
    Failed,
}

/// Opaque handle to a compiled stage held by a [`ShaderPipelineBuilder`]
///
/// Not `Clone`: handing it to [`ShaderPipelineBuilder::link`] consumes it.
#[derive(Debug, PartialEq, Eq)]
pub struct StageHandle {
    name: GlName,
    kind: StageKind,
}

impl StageHandle {
    /// Raw GL name of the stage object
    pub const fn raw(&self) -> GlName {
        self.name
    }

    /// Stage this handle was compiled for
    pub const fn kind(&self) -> StageKind {
        self.kind
    }
}

#[derive(Debug)]
struct ShaderStage {
    kind: StageKind,
    name: GlName,
    status: StageStatus,
}

/// Compiles stages and links them into programs
///
/// Owns every compiled stage until it is linked. Stages that never reach
/// `link` are deleted when the builder is dropped. The outcome of the most
/// recent compile and link stays queryable after failed objects are gone.
pub struct ShaderPipelineBuilder<'ctx> {
    gl: &'ctx dyn GlApi,
    stages: Vec<ShaderStage>,
    last_compile: Option<(StageKind, StageStatus)>,
    last_link: ProgramStatus,
}

impl<'ctx> ShaderPipelineBuilder<'ctx> {
    /// Create a builder against a loaded GL context
    pub fn new(gl: &'ctx dyn GlApi) -> Self {
        Self {
            gl,
            stages: Vec::new(),
            last_compile: None,
            last_link: ProgramStatus::Unlinked,
        }
    }

    /// Compile one stage
    ///
    /// On rejection the compiler log is fetched (length first, then a buffer
    /// of exactly that size) and returned verbatim; the stage object is
    /// deleted before returning.
    pub fn compile(&mut self, source: &str, kind: StageKind) -> HarnessResult<StageHandle> {
        let name = self.gl.create_shader(kind).map_err(|e| {
            HarnessError::ResourceCreation(format!("creation of {kind} shader object failed: {e}"))
        })?;

        let mut stage = ShaderStage {
            kind,
            name,
            status: StageStatus::Uncompiled,
        };

        self.gl.shader_source(name, source);
        self.gl.compile_shader(name);
        stage.status = StageStatus::Compiling;

        if self.gl.shader_compile_status(name) {
            stage.status = StageStatus::Compiled;
            log::debug!("{} shader {} compiled", kind, name);
            self.last_compile = Some((kind, stage.status));
            self.stages.push(stage);
            return Ok(StageHandle { name, kind });
        }

        stage.status = StageStatus::Failed;
        self.last_compile = Some((kind, stage.status));
        let capacity = self.gl.shader_info_log_length(name);
        let log = fetch_log(capacity, |capacity| self.gl.shader_info_log(name, capacity));
        self.gl.delete_shader(name);
        log::error!("shader compiler :\n{}", log);

        Err(HarnessError::Compile { stage: kind, log })
    }

    /// Link compiled stages into a program
    ///
    /// Every stage is detached and deleted before this returns, on success and
    /// on failure alike. A failed program object is deleted too.
    pub fn link(
        &mut self,
        handles: impl IntoIterator<Item = StageHandle>,
    ) -> HarnessResult<ShaderProgram<'ctx>> {
        let mut attached = AttachedStages {
            gl: self.gl,
            program: None,
            stages: Vec::new(),
        };
        for handle in handles {
            match self.take_stage(handle.name) {
                Some(stage) => attached.stages.push(stage),
                None => log::warn!("stage {} is not owned by this builder, skipping", handle.name),
            }
        }

        let mut status = ProgramStatus::Unlinked;
        let program = self.gl.create_program().map_err(|e| {
            HarnessError::ResourceCreation(format!("creation of shader program object failed: {e}"))
        })?;
        attached.attach_all(program);

        self.gl.link_program(program);
        status = transition(status, ProgramStatus::Linking);
        let kinds = attached.kinds();
        attached.release();

        if self.gl.program_link_status(program) {
            status = transition(status, ProgramStatus::Linked);
            self.last_link = status;
            log::debug!("shader program {} linked from {:?}", program, kinds);
            return Ok(ShaderProgram {
                gl: self.gl,
                name: Some(program),
                stages: kinds,
                status,
            });
        }

        self.last_link = transition(status, ProgramStatus::Failed);
        let capacity = self.gl.program_info_log_length(program);
        let log = fetch_log(capacity, |capacity| self.gl.program_info_log(program, capacity));
        self.gl.delete_program(program);
        log::error!("shader linker :\n{}", log);

        Err(HarnessError::Link { log })
    }

    /// Compile every `(kind, source)` pair in order and link the result
    ///
    /// Stops at the first failure; stages compiled before it are deleted when
    /// the builder goes out of scope.
    pub fn build(&mut self, sources: &[(StageKind, &str)]) -> HarnessResult<ShaderProgram<'ctx>> {
        let mut handles = Vec::with_capacity(sources.len());
        for (kind, source) in sources {
            handles.push(self.compile(source, *kind)?);
        }
        self.link(handles)
    }

    /// Status of a stage still held by the builder
    pub fn stage_status(&self, handle: &StageHandle) -> Option<StageStatus> {
        self.stages
            .iter()
            .find(|stage| stage.name == handle.name)
            .map(|stage| stage.status)
    }

    /// Stage kind and outcome of the most recent `compile`, including failures
    pub const fn last_compile_status(&self) -> Option<(StageKind, StageStatus)> {
        self.last_compile
    }

    /// Outcome of the most recent `link`, including failures
    pub const fn last_link_status(&self) -> ProgramStatus {
        self.last_link
    }

    /// Compiled stages waiting to be linked
    pub fn pending_stages(&self) -> usize {
        self.stages.len()
    }

    fn take_stage(&mut self, name: GlName) -> Option<ShaderStage> {
        let index = self.stages.iter().position(|stage| stage.name == name)?;
        Some(self.stages.swap_remove(index))
    }
}

impl Drop for ShaderPipelineBuilder<'_> {
    fn drop(&mut self) {
        for stage in self.stages.drain(..) {
            log::debug!("discarding unlinked {} shader {}", stage.kind, stage.name);
            self.gl.delete_shader(stage.name);
        }
    }
}

fn transition(from: ProgramStatus, to: ProgramStatus) -> ProgramStatus {
    log::trace!("program status {:?} -> {:?}", from, to);
    to
}

/// Fetch an info log whose length was queried beforehand
fn fetch_log(capacity: usize, fetch: impl FnOnce(usize) -> String) -> String {
    if capacity == 0 {
        return String::new();
    }
    let mut log = fetch(capacity);
    while log.ends_with('\0') {
        log.pop();
    }
    log
}

/// Stages attached to a program being linked
///
/// Detaches and deletes its stages exactly once, on `release` or on drop.
struct AttachedStages<'a> {
    gl: &'a dyn GlApi,
    program: Option<GlName>,
    stages: Vec<ShaderStage>,
}

impl AttachedStages<'_> {
    fn attach_all(&mut self, program: GlName) {
        self.program = Some(program);
        for stage in &self.stages {
            self.gl.attach_shader(program, stage.name);
        }
    }

    fn kinds(&self) -> Vec<StageKind> {
        self.stages.iter().map(|stage| stage.kind).collect()
    }

    fn release(&mut self) {
        for stage in self.stages.drain(..) {
            if let Some(program) = self.program {
                self.gl.detach_shader(program, stage.name);
            }
            self.gl.delete_shader(stage.name);
        }
    }
}

impl Drop for AttachedStages<'_> {
    fn drop(&mut self) {
        self.release();
    }
}

/// A linked shader program
///
/// Holds no reference to the stages it was linked from. Deleted on
/// [`ShaderProgram::release`] or drop, whichever comes first.
pub struct ShaderProgram<'ctx> {
    gl: &'ctx dyn GlApi,
    name: Option<GlName>,
    stages: Vec<StageKind>,
    status: ProgramStatus,
}

impl ShaderProgram<'_> {
    /// Raw GL name, `None` once released
    pub const fn raw(&self) -> Option<GlName> {
        self.name
    }

    /// Stage kinds the program was linked from, in attach order
    pub fn stages(&self) -> &[StageKind] {
        &self.stages
    }

    /// Link status
    pub const fn status(&self) -> ProgramStatus {
        self.status
    }

    /// Make this the current program
    pub fn bind(&self) {
        if let Some(name) = self.name {
            self.gl.use_program(Some(name));
        }
    }

    /// Delete the program object; later calls do nothing
    pub fn release(&mut self) {
        if let Some(name) = self.name.take() {
            self.gl.delete_program(name);
            log::debug!("shader program {} released", name);
        }
    }
}

impl Drop for ShaderProgram<'_> {
    fn drop(&mut self) {
        self.release();
    }
}

impl fmt::Debug for ShaderProgram<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ShaderProgram")
            .field("name", &self.name)
            .field("stages", &self.stages)
            .field("status", &self.status)
            .finish_non_exhaustive()
    }
}

/// Vertex and fragment source text for the pipeline
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShaderSources {
    /// Vertex stage GLSL
    pub vertex: String,
    /// Fragment stage GLSL
    pub fragment: String,
}

impl ShaderSources {
    /// The built-in passthrough pair
    pub fn passthrough() -> Self {
        Self {
            vertex: PASSTHROUGH_VERTEX_SOURCE.to_string(),
            fragment: PASSTHROUGH_FRAGMENT_SOURCE.to_string(),
        }
    }

    /// Sources named in the configuration, built-ins where a path is unset
    pub fn from_config(config: &ShaderConfig) -> HarnessResult<Self> {
        let mut sources = Self::passthrough();
        if let Some(path) = &config.vertex_shader_path {
            sources.vertex = read_source(path)?;
        }
        if let Some(path) = &config.fragment_shader_path {
            sources.fragment = read_source(path)?;
        }
        Ok(sources)
    }

    /// `(kind, source)` pairs in link order
    pub fn stages(&self) -> [(StageKind, &str); 2] {
        [
            (StageKind::Vertex, self.vertex.as_str()),
            (StageKind::Fragment, self.fragment.as_str()),
        ]
    }
}

fn read_source(path: &Path) -> HarnessResult<String> {
    log::info!("Loading shader source from {}", path.display());
    std::fs::read_to_string(path).map_err(|source| HarnessError::ShaderSource {
        path: path.to_path_buf(),
        source,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::headless::GlCall;
    use crate::backend::HeadlessGl;

    const NO_MAIN: &str = "#version 330 core\nlayout (location = 0) in vec3 vPos;\nvoid entry()\n{\n   gl_Position = vec4(vPos, 1.0);\n}\n";

    const MISMATCHED_FRAGMENT: &str = "#version 330 core\nin vec3 vColor;\nout vec4 FragColor;\nvoid main()\n{\n   FragColor = vec4(vColor, 1.0);\n}\n";

    #[test]
    fn test_passthrough_pair_links_and_releases_stages() {
        let gl = HeadlessGl::new();
        let probe = gl.probe();

        let mut builder = ShaderPipelineBuilder::new(&gl);
        let vertex = builder.compile(PASSTHROUGH_VERTEX_SOURCE, StageKind::Vertex).unwrap();
        let fragment = builder.compile(PASSTHROUGH_FRAGMENT_SOURCE, StageKind::Fragment).unwrap();
        let (vertex_name, fragment_name) = (vertex.raw(), fragment.raw());
        assert_eq!(builder.stage_status(&vertex), Some(StageStatus::Compiled));
        assert_eq!(builder.pending_stages(), 2);

        let program = builder.link([vertex, fragment]).unwrap();
        let program_name = program.raw().unwrap();

        assert_ne!(program_name, vertex_name);
        assert_ne!(program_name, fragment_name);
        assert_eq!(program.status(), ProgramStatus::Linked);
        assert_eq!(program.stages(), &[StageKind::Vertex, StageKind::Fragment]);
        assert_eq!(builder.pending_stages(), 0);
        assert_eq!(probe.live_shaders(), 0);
        assert_eq!(probe.live_programs(), 1);
        assert_eq!(probe.double_releases(), 0);

        drop(program);
        drop(builder);
        assert_eq!(probe.live_programs(), 0);
        assert_eq!(probe.double_releases(), 0);
    }

    #[test]
    fn test_stages_are_detached_before_deletion() {
        let gl = HeadlessGl::new();
        let probe = gl.probe();

        let mut builder = ShaderPipelineBuilder::new(&gl);
        let program = builder
            .build(&ShaderSources::passthrough().stages())
            .unwrap();
        let program_name = program.raw().unwrap();

        let calls = probe.gl_calls();
        let link_at = calls.iter().position(|c| *c == GlCall::LinkProgram(program_name)).unwrap();
        for (index, call) in calls.iter().enumerate() {
            if let GlCall::DeleteShader(shader) = call {
                let detach = GlCall::DetachShader { program: program_name, shader: *shader };
                let detach_at = calls.iter().position(|c| *c == detach).unwrap();
                assert!(link_at < detach_at && detach_at < index);
            }
        }
    }

    #[test]
    fn test_missing_main_fails_with_log() {
        let gl = HeadlessGl::new();
        let probe = gl.probe();

        let mut builder = ShaderPipelineBuilder::new(&gl);
        let err = builder.compile(NO_MAIN, StageKind::Vertex).unwrap_err();

        match err {
            HarnessError::Compile { stage, log } => {
                assert_eq!(stage, StageKind::Vertex);
                assert!(!log.is_empty());
                assert!(log.contains("main"));
            }
            other => panic!("expected a compile error, got {other:?}"),
        }
        assert_eq!(builder.pending_stages(), 0);
        assert_eq!(builder.last_compile_status(), Some((StageKind::Vertex, StageStatus::Failed)));
        assert_eq!(probe.live_shaders(), 0);
    }

    #[test]
    fn test_log_is_fetched_with_queried_length() {
        let gl = HeadlessGl::new();
        let probe = gl.probe();

        let mut builder = ShaderPipelineBuilder::new(&gl);
        let Err(HarnessError::Compile { log, .. }) = builder.compile(NO_MAIN, StageKind::Vertex) else {
            panic!("expected a compile error");
        };

        let capacity = probe
            .gl_calls()
            .iter()
            .find_map(|call| match call {
                GlCall::ShaderInfoLog { capacity, .. } => Some(*capacity),
                _ => None,
            })
            .unwrap();
        // the queried length counts the terminating NUL
        assert_eq!(capacity, log.len() + 1);
    }

    #[test]
    fn test_interface_mismatch_fails_link_and_releases_stages() {
        let gl = HeadlessGl::new();
        let probe = gl.probe();

        let mut builder = ShaderPipelineBuilder::new(&gl);
        let vertex = builder.compile(PASSTHROUGH_VERTEX_SOURCE, StageKind::Vertex).unwrap();
        let fragment = builder.compile(MISMATCHED_FRAGMENT, StageKind::Fragment).unwrap();

        let err = builder.link([vertex, fragment]).unwrap_err();
        match err {
            HarnessError::Link { log } => {
                assert!(!log.is_empty());
                assert!(log.contains("vColor"));
            }
            other => panic!("expected a link error, got {other:?}"),
        }
        assert_eq!(builder.last_link_status(), ProgramStatus::Failed);
        assert_eq!(probe.live_shaders(), 0);
        assert_eq!(probe.live_programs(), 0);
        assert_eq!(probe.double_releases(), 0);
    }

    #[test]
    fn test_type_mismatch_fails_link() {
        let gl = HeadlessGl::new();
        let fragment = PASSTHROUGH_FRAGMENT_SOURCE.replace("in vec4 fCol", "in vec3 fCol");

        let mut builder = ShaderPipelineBuilder::new(&gl);
        let err = builder
            .build(&[(StageKind::Vertex, PASSTHROUGH_VERTEX_SOURCE), (StageKind::Fragment, fragment.as_str())])
            .unwrap_err();
        assert!(matches!(err, HarnessError::Link { .. }));
    }

    #[test]
    fn test_failed_build_releases_earlier_stages() {
        let gl = HeadlessGl::new();
        let probe = gl.probe();

        {
            let mut builder = ShaderPipelineBuilder::new(&gl);
            let err = builder
                .build(&[(StageKind::Vertex, PASSTHROUGH_VERTEX_SOURCE), (StageKind::Fragment, "void main( {")])
                .unwrap_err();
            assert!(matches!(err, HarnessError::Compile { stage: StageKind::Fragment, .. }));
            assert_eq!(builder.pending_stages(), 1);
        }

        assert_eq!(probe.live_shaders(), 0);
        assert_eq!(probe.double_releases(), 0);
    }

    #[test]
    fn test_program_creation_failure_still_releases_stages() {
        let gl = HeadlessGl::new();
        let probe = gl.probe();

        let mut builder = ShaderPipelineBuilder::new(&gl);
        let vertex = builder.compile(PASSTHROUGH_VERTEX_SOURCE, StageKind::Vertex).unwrap();
        let fragment = builder.compile(PASSTHROUGH_FRAGMENT_SOURCE, StageKind::Fragment).unwrap();

        probe.fail_object_creation(true);
        let err = builder.link([vertex, fragment]).unwrap_err();

        assert!(matches!(err, HarnessError::ResourceCreation(_)));
        assert_eq!(probe.live_shaders(), 0);
        assert_eq!(probe.double_releases(), 0);
    }

    #[test]
    fn test_release_twice_is_a_no_op() {
        let gl = HeadlessGl::new();
        let probe = gl.probe();

        let mut program = ShaderPipelineBuilder::new(&gl)
            .build(&ShaderSources::passthrough().stages())
            .unwrap();
        program.release();
        program.release();
        program.bind();
        drop(program);

        assert_eq!(probe.live_programs(), 0);
        assert_eq!(probe.double_releases(), 0);
        assert!(!probe.gl_calls().iter().any(|c| matches!(c, GlCall::UseProgram(_))));
    }

    #[test]
    fn test_missing_source_file_is_reported() {
        let config = ShaderConfig::new("/nonexistent/harness.vert", "/nonexistent/harness.frag");
        let err = ShaderSources::from_config(&config).unwrap_err();
        assert!(matches!(err, HarnessError::ShaderSource { .. }));
    }

    #[test]
    fn test_default_config_uses_builtin_sources() {
        let sources = ShaderSources::from_config(&ShaderConfig::default()).unwrap();
        assert_eq!(sources, ShaderSources::passthrough());
        assert!(sources.vertex.contains("layout (location = 1) in vec3 vCol"));
    }
}
