//! Headless recording backend
//!
//! A stand-in for GLFW and the GL driver that runs without a display. It
//! records every call, keeps track of which objects are alive, raises GL
//! errors for the misuse a core-profile driver would reject, and replays a
//! scripted sequence of window events.
//!
//! The "compiler" is deliberately small: a stage compiles when its braces
//! balance and it defines `void main(`, and the "linker" checks that every
//! fragment input is produced by an earlier stage with the same type.
//!
//! ```
//! use gl_harness::backend::{HeadlessEvent, HeadlessWindowSystem};
//!
//! let window_system = HeadlessWindowSystem::new()
//!     .with_events([HeadlessEvent::Idle, HeadlessEvent::Escape]);
//! let probe = window_system.probe();
//! assert!(probe.window_calls().is_empty());
//! ```

use crate::backend::{GlApi, GlName, Key, WindowSystem};
use crate::core::{LoaderOptions, WindowConfig};
use crate::error::{HarnessError, HarnessResult};
use crate::render::StageKind;
use std::cell::RefCell;
use std::collections::{BTreeMap, HashMap, HashSet, VecDeque};
use std::rc::Rc;

/// `GL_INVALID_VALUE`
pub const INVALID_VALUE: u32 = glow::INVALID_VALUE;
/// `GL_INVALID_OPERATION`
pub const INVALID_OPERATION: u32 = glow::INVALID_OPERATION;

/// A GL call as the headless backend saw it
#[derive(Debug, Clone, PartialEq)]
#[allow(missing_docs)]
pub enum GlCall {
    CreateShader { name: GlName, kind: StageKind },
    ShaderSource(GlName),
    CompileShader(GlName),
    ShaderInfoLog { name: GlName, capacity: usize },
    DeleteShader(GlName),
    CreateProgram(GlName),
    AttachShader { program: GlName, shader: GlName },
    DetachShader { program: GlName, shader: GlName },
    LinkProgram(GlName),
    ProgramInfoLog { name: GlName, capacity: usize },
    UseProgram(Option<GlName>),
    DeleteProgram(GlName),
    CreateVertexArray(GlName),
    BindVertexArray(Option<GlName>),
    DeleteVertexArray(GlName),
    CreateBuffer(GlName),
    BindArrayBuffer(Option<GlName>),
    BufferData { bytes: usize },
    VertexAttribPointer { index: u32, components: i32, stride: i32, offset: i32 },
    EnableVertexAttribArray(u32),
    DeleteBuffer(GlName),
    ClearColor([f32; 4]),
    Clear,
    Viewport { x: i32, y: i32, width: i32, height: i32 },
    PolygonMode { wireframe: bool },
    DrawTriangles { first: i32, count: i32 },
}

/// A window-system call as the headless backend saw it
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[allow(missing_docs)]
pub enum WindowCall {
    Init,
    ApplyHints,
    CreateWindow,
    MakeCurrent,
    LoadGl,
    SwapInterval(u32),
    ResizePolling(bool),
    SwapBuffers,
    WaitEvents,
    DestroyWindow,
    Terminate,
}

/// Event delivered by one `wait_events` call
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HeadlessEvent {
    /// Something unrelated woke the loop (mouse move, expose)
    Idle,
    /// The escape key went down
    Escape,
    /// The window manager asked the window to close
    CloseRequest,
    /// The framebuffer was resized
    Resize(i32, i32),
}

/// Bring-up step that should fail
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailurePoint {
    /// Windowing library initialization
    Init,
    /// Window/context creation
    CreateWindow,
    /// GL function loading
    LoadGl,
}

/// Vertex attribute pointer as latched into a vertex array
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LatchedAttribute {
    /// Buffer bound to `GL_ARRAY_BUFFER` when the pointer was described
    pub buffer: GlName,
    /// Components per vertex
    pub components: i32,
    /// Bytes between consecutive vertices
    pub stride: i32,
    /// Byte offset of the first component
    pub offset: i32,
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct Variable {
    ty: String,
    name: String,
}

#[derive(Debug, Default, Clone)]
struct Interface {
    inputs: Vec<Variable>,
    outputs: Vec<Variable>,
}

#[derive(Debug)]
struct ShaderObject {
    kind: StageKind,
    source: String,
    compiled: bool,
    log: String,
    interface: Interface,
}

#[derive(Debug, Default)]
struct ProgramObject {
    attached: Vec<GlName>,
    linked: bool,
    log: String,
}

#[derive(Debug, Default)]
struct VertexArrayObject {
    attributes: BTreeMap<u32, LatchedAttribute>,
    enabled: HashSet<u32>,
}

#[derive(Debug)]
struct HeadlessState {
    gl_calls: Vec<GlCall>,
    window_calls: Vec<WindowCall>,
    next_name: GlName,
    shaders: HashMap<GlName, ShaderObject>,
    programs: HashMap<GlName, ProgramObject>,
    vertex_arrays: HashMap<GlName, VertexArrayObject>,
    buffers: HashMap<GlName, usize>,
    bound_vertex_array: Option<GlName>,
    bound_buffer: Option<GlName>,
    current_program: Option<GlName>,
    errors: VecDeque<u32>,
    double_releases: usize,
    events: VecDeque<HeadlessEvent>,
    fail_at: Option<FailurePoint>,
    fail_object_creation: bool,
    context_version: (u32, u32),
    initialized: bool,
    window_open: bool,
    should_close: bool,
    escape_down: bool,
    resize_polling: bool,
    resizes: Vec<(i32, i32)>,
}

impl Default for HeadlessState {
    fn default() -> Self {
        Self {
            gl_calls: Vec::new(),
            window_calls: Vec::new(),
            next_name: 1,
            shaders: HashMap::new(),
            programs: HashMap::new(),
            vertex_arrays: HashMap::new(),
            buffers: HashMap::new(),
            bound_vertex_array: None,
            bound_buffer: None,
            current_program: None,
            errors: VecDeque::new(),
            double_releases: 0,
            events: VecDeque::new(),
            fail_at: None,
            fail_object_creation: false,
            context_version: (3, 3),
            initialized: false,
            window_open: false,
            should_close: false,
            escape_down: false,
            resize_polling: false,
            resizes: Vec::new(),
        }
    }
}

impl HeadlessState {
    fn allocate(&mut self) -> Result<GlName, String> {
        if self.fail_object_creation {
            return Err("out of object names".to_string());
        }
        let name = self.next_name;
        self.next_name += 1;
        Ok(name)
    }

    fn raise(&mut self, code: u32) {
        self.errors.push_back(code);
    }

    fn compile(&mut self, name: GlName) {
        let Some(shader) = self.shaders.get_mut(&name) else {
            self.raise(INVALID_VALUE);
            return;
        };
        match check_source(&shader.source) {
            Ok(interface) => {
                shader.compiled = true;
                shader.log.clear();
                shader.interface = interface;
            }
            Err(log) => {
                shader.compiled = false;
                shader.log = log;
                shader.interface = Interface::default();
            }
        }
    }

    fn link(&mut self, name: GlName) {
        let Some(program) = self.programs.get(&name) else {
            self.raise(INVALID_VALUE);
            return;
        };

        let stages: Vec<&ShaderObject> = program
            .attached
            .iter()
            .filter_map(|shader| self.shaders.get(shader))
            .collect();
        let result = link_stages(&stages);

        if let Some(program) = self.programs.get_mut(&name) {
            match result {
                Ok(()) => {
                    program.linked = true;
                    program.log.clear();
                }
                Err(log) => {
                    program.linked = false;
                    program.log = log;
                }
            }
        }
    }
}

/// Strip comments and check the few things the fake compiler cares about
fn check_source(source: &str) -> Result<Interface, String> {
    let code: String = source
        .lines()
        .map(|line| line.split("//").next().unwrap_or(""))
        .collect::<Vec<_>>()
        .join("\n");

    let opened = code.matches('{').count();
    let closed = code.matches('}').count();
    if opened != closed {
        return Err("0:1(1): error: syntax error, unexpected end of file\n".to_string());
    }

    let squashed: String = code.chars().filter(|c| !c.is_whitespace()).collect();
    if !squashed.contains("voidmain(") {
        return Err("0:1(1): error: function `main' is not defined in this shader stage\n".to_string());
    }

    let mut interface = Interface::default();
    for statement in code.split(';') {
        let mut statement = statement.trim();
        // drop a leading layout qualifier
        if let Some(rest) = statement.strip_prefix("layout") {
            statement = rest.split_once(')').map_or("", |(_, tail)| tail).trim();
        }
        let tokens: Vec<&str> = statement.split_whitespace().collect();
        if let [qualifier, ty, name] = tokens.as_slice() {
            let variable = Variable {
                ty: (*ty).to_string(),
                name: (*name).to_string(),
            };
            match *qualifier {
                "in" => interface.inputs.push(variable),
                "out" => interface.outputs.push(variable),
                _ => {}
            }
        }
    }
    Ok(interface)
}

fn link_stages(stages: &[&ShaderObject]) -> Result<(), String> {
    let mut log = String::new();

    if let Some(stage) = stages.iter().find(|stage| !stage.compiled) {
        log.push_str(&format!("error: linking with uncompiled {} shader\n", stage.kind));
        return Err(log);
    }
    if !stages.iter().any(|stage| stage.kind == StageKind::Vertex) {
        return Err("error: program lacks a vertex shader\n".to_string());
    }

    let produced: Vec<&Variable> = stages
        .iter()
        .filter(|stage| stage.kind != StageKind::Fragment)
        .flat_map(|stage| stage.interface.outputs.iter())
        .collect();

    for stage in stages.iter().filter(|stage| stage.kind == StageKind::Fragment) {
        for input in &stage.interface.inputs {
            match produced.iter().find(|output| output.name == input.name) {
                None => log.push_str(&format!(
                    "error: fragment shader input `{}' has no matching output in the previous stage\n",
                    input.name
                )),
                Some(output) if output.ty != input.ty => log.push_str(&format!(
                    "error: `{}' declared as type `{}' but outputted from previous stage as type `{}'\n",
                    input.name, input.ty, output.ty
                )),
                Some(_) => {}
            }
        }
    }

    if log.is_empty() {
        Ok(())
    } else {
        Err(log)
    }
}

fn reported_length(log: &str) -> usize {
    if log.is_empty() {
        0
    } else {
        log.len() + 1
    }
}

/// Cut a log to what fits in a `capacity`-byte buffer that ends with NUL
fn fit(log: &str, capacity: usize) -> String {
    let mut end = capacity.saturating_sub(1).min(log.len());
    while !log.is_char_boundary(end) {
        end -= 1;
    }
    log[..end].to_string()
}

/// Read-only view of the headless backend's recorded state
#[derive(Clone)]
pub struct HeadlessProbe {
    state: Rc<RefCell<HeadlessState>>,
}

impl HeadlessProbe {
    /// Every GL call made so far
    pub fn gl_calls(&self) -> Vec<GlCall> {
        self.state.borrow().gl_calls.clone()
    }

    /// Every window-system call made so far
    pub fn window_calls(&self) -> Vec<WindowCall> {
        self.state.borrow().window_calls.clone()
    }

    /// `(first, count)` of every draw call
    pub fn draw_calls(&self) -> Vec<(i32, i32)> {
        self.state
            .borrow()
            .gl_calls
            .iter()
            .filter_map(|call| match call {
                GlCall::DrawTriangles { first, count } => Some((*first, *count)),
                _ => None,
            })
            .collect()
    }

    /// Shader objects not yet deleted
    pub fn live_shaders(&self) -> usize {
        self.state.borrow().shaders.len()
    }

    /// Program objects not yet deleted
    pub fn live_programs(&self) -> usize {
        self.state.borrow().programs.len()
    }

    /// Buffer objects not yet deleted
    pub fn live_buffers(&self) -> usize {
        self.state.borrow().buffers.len()
    }

    /// Vertex array objects not yet deleted
    pub fn live_vertex_arrays(&self) -> usize {
        self.state.borrow().vertex_arrays.len()
    }

    /// Deletes of names that were already deleted or never existed
    pub fn double_releases(&self) -> usize {
        self.state.borrow().double_releases
    }

    /// Errors raised and not yet read through `get_error`
    pub fn pending_errors(&self) -> Vec<u32> {
        self.state.borrow().errors.iter().copied().collect()
    }

    /// Attribute pointers latched into a vertex array
    pub fn latched_attributes(&self, vertex_array: GlName) -> Vec<(u32, LatchedAttribute)> {
        self.state
            .borrow()
            .vertex_arrays
            .get(&vertex_array)
            .map(|vao| vao.attributes.iter().map(|(index, attr)| (*index, *attr)).collect())
            .unwrap_or_default()
    }

    /// Whether an attribute is enabled in a vertex array
    pub fn attribute_enabled(&self, vertex_array: GlName, index: u32) -> bool {
        self.state
            .borrow()
            .vertex_arrays
            .get(&vertex_array)
            .is_some_and(|vao| vao.enabled.contains(&index))
    }

    /// Bytes stored in a buffer object
    pub fn buffer_size(&self, buffer: GlName) -> Option<usize> {
        self.state.borrow().buffers.get(&buffer).copied()
    }

    /// Whether a window currently exists
    pub fn window_open(&self) -> bool {
        self.state.borrow().window_open
    }

    /// Whether the windowing library is initialized
    pub fn initialized(&self) -> bool {
        self.state.borrow().initialized
    }

    /// Queue a GL error as if the driver had raised it
    pub fn inject_error(&self, code: u32) {
        self.state.borrow_mut().raise(code);
    }

    /// Make every subsequent object creation fail
    pub fn fail_object_creation(&self, fail: bool) {
        self.state.borrow_mut().fail_object_creation = fail;
    }
}

/// Headless [`GlApi`]
pub struct HeadlessGl {
    state: Rc<RefCell<HeadlessState>>,
}

impl HeadlessGl {
    /// A GL fake with no window attached
    pub fn new() -> Self {
        Self {
            state: Rc::new(RefCell::new(HeadlessState::default())),
        }
    }

    /// Observer for this fake's state
    pub fn probe(&self) -> HeadlessProbe {
        HeadlessProbe {
            state: Rc::clone(&self.state),
        }
    }

    fn record(&self, call: GlCall) {
        self.state.borrow_mut().gl_calls.push(call);
    }
}

impl Default for HeadlessGl {
    fn default() -> Self {
        Self::new()
    }
}

impl GlApi for HeadlessGl {
    fn create_shader(&self, kind: StageKind) -> Result<GlName, String> {
        let mut state = self.state.borrow_mut();
        let name = state.allocate()?;
        state.shaders.insert(
            name,
            ShaderObject {
                kind,
                source: String::new(),
                compiled: false,
                log: String::new(),
                interface: Interface::default(),
            },
        );
        state.gl_calls.push(GlCall::CreateShader { name, kind });
        Ok(name)
    }

    fn shader_source(&self, name: GlName, source: &str) {
        self.record(GlCall::ShaderSource(name));
        let mut state = self.state.borrow_mut();
        if let Some(shader) = state.shaders.get_mut(&name) {
            shader.source = source.to_string();
        } else {
            state.raise(INVALID_VALUE);
        }
    }

    fn compile_shader(&self, name: GlName) {
        self.record(GlCall::CompileShader(name));
        self.state.borrow_mut().compile(name);
    }

    fn shader_compile_status(&self, name: GlName) -> bool {
        self.state.borrow().shaders.get(&name).is_some_and(|s| s.compiled)
    }

    fn shader_info_log_length(&self, name: GlName) -> usize {
        self.state.borrow().shaders.get(&name).map_or(0, |s| reported_length(&s.log))
    }

    fn shader_info_log(&self, name: GlName, capacity: usize) -> String {
        self.record(GlCall::ShaderInfoLog { name, capacity });
        self.state.borrow().shaders.get(&name).map_or_else(String::new, |s| fit(&s.log, capacity))
    }

    fn delete_shader(&self, name: GlName) {
        self.record(GlCall::DeleteShader(name));
        if name == 0 {
            return;
        }
        let mut state = self.state.borrow_mut();
        if state.shaders.remove(&name).is_none() {
            state.double_releases += 1;
        }
    }

    fn create_program(&self) -> Result<GlName, String> {
        let mut state = self.state.borrow_mut();
        let name = state.allocate()?;
        state.programs.insert(name, ProgramObject::default());
        state.gl_calls.push(GlCall::CreateProgram(name));
        Ok(name)
    }

    fn attach_shader(&self, program: GlName, shader: GlName) {
        self.record(GlCall::AttachShader { program, shader });
        let mut state = self.state.borrow_mut();
        if !state.shaders.contains_key(&shader) {
            state.raise(INVALID_VALUE);
            return;
        }
        let Some(p) = state.programs.get_mut(&program) else {
            state.raise(INVALID_VALUE);
            return;
        };
        if p.attached.contains(&shader) {
            state.raise(INVALID_OPERATION);
        } else {
            p.attached.push(shader);
        }
    }

    fn detach_shader(&self, program: GlName, shader: GlName) {
        self.record(GlCall::DetachShader { program, shader });
        let mut state = self.state.borrow_mut();
        let detached = state.programs.get_mut(&program).is_some_and(|p| {
            let before = p.attached.len();
            p.attached.retain(|s| *s != shader);
            p.attached.len() != before
        });
        if !detached {
            state.raise(INVALID_OPERATION);
        }
    }

    fn link_program(&self, name: GlName) {
        self.record(GlCall::LinkProgram(name));
        self.state.borrow_mut().link(name);
    }

    fn program_link_status(&self, name: GlName) -> bool {
        self.state.borrow().programs.get(&name).is_some_and(|p| p.linked)
    }

    fn program_info_log_length(&self, name: GlName) -> usize {
        self.state.borrow().programs.get(&name).map_or(0, |p| reported_length(&p.log))
    }

    fn program_info_log(&self, name: GlName, capacity: usize) -> String {
        self.record(GlCall::ProgramInfoLog { name, capacity });
        self.state.borrow().programs.get(&name).map_or_else(String::new, |p| fit(&p.log, capacity))
    }

    fn use_program(&self, name: Option<GlName>) {
        self.record(GlCall::UseProgram(name));
        let mut state = self.state.borrow_mut();
        match name {
            None => state.current_program = None,
            Some(name) => match state.programs.get(&name).map(|p| p.linked) {
                Some(true) => state.current_program = Some(name),
                Some(false) => state.raise(INVALID_OPERATION),
                None => state.raise(INVALID_VALUE),
            },
        }
    }

    fn delete_program(&self, name: GlName) {
        self.record(GlCall::DeleteProgram(name));
        if name == 0 {
            return;
        }
        let mut state = self.state.borrow_mut();
        if state.programs.remove(&name).is_none() {
            state.double_releases += 1;
        }
        if state.current_program == Some(name) {
            state.current_program = None;
        }
    }

    fn create_vertex_array(&self) -> Result<GlName, String> {
        let mut state = self.state.borrow_mut();
        let name = state.allocate()?;
        state.vertex_arrays.insert(name, VertexArrayObject::default());
        state.gl_calls.push(GlCall::CreateVertexArray(name));
        Ok(name)
    }

    fn bind_vertex_array(&self, name: Option<GlName>) {
        self.record(GlCall::BindVertexArray(name));
        let mut state = self.state.borrow_mut();
        match name {
            Some(name) if !state.vertex_arrays.contains_key(&name) => state.raise(INVALID_OPERATION),
            _ => state.bound_vertex_array = name,
        }
    }

    fn delete_vertex_array(&self, name: GlName) {
        self.record(GlCall::DeleteVertexArray(name));
        if name == 0 {
            return;
        }
        let mut state = self.state.borrow_mut();
        if state.vertex_arrays.remove(&name).is_none() {
            state.double_releases += 1;
        }
        if state.bound_vertex_array == Some(name) {
            state.bound_vertex_array = None;
        }
    }

    fn create_buffer(&self) -> Result<GlName, String> {
        let mut state = self.state.borrow_mut();
        let name = state.allocate()?;
        state.buffers.insert(name, 0);
        state.gl_calls.push(GlCall::CreateBuffer(name));
        Ok(name)
    }

    fn bind_array_buffer(&self, name: Option<GlName>) {
        self.record(GlCall::BindArrayBuffer(name));
        let mut state = self.state.borrow_mut();
        match name {
            Some(name) if !state.buffers.contains_key(&name) => state.raise(INVALID_VALUE),
            _ => state.bound_buffer = name,
        }
    }

    fn array_buffer_data_static(&self, data: &[u8]) {
        self.record(GlCall::BufferData { bytes: data.len() });
        let mut state = self.state.borrow_mut();
        match state.bound_buffer {
            Some(buffer) => {
                state.buffers.insert(buffer, data.len());
            }
            None => state.raise(INVALID_OPERATION),
        }
    }

    fn vertex_attrib_pointer_f32(&self, index: u32, components: i32, stride: i32, offset: i32) {
        self.record(GlCall::VertexAttribPointer { index, components, stride, offset });
        let mut state = self.state.borrow_mut();
        let (Some(vao), Some(buffer)) = (state.bound_vertex_array, state.bound_buffer) else {
            state.raise(INVALID_OPERATION);
            return;
        };
        if !(1..=4).contains(&components) || stride < 0 {
            state.raise(INVALID_VALUE);
            return;
        }
        if let Some(vao) = state.vertex_arrays.get_mut(&vao) {
            vao.attributes.insert(
                index,
                LatchedAttribute {
                    buffer,
                    components,
                    stride,
                    offset,
                },
            );
        }
    }

    fn enable_vertex_attrib_array(&self, index: u32) {
        self.record(GlCall::EnableVertexAttribArray(index));
        let mut state = self.state.borrow_mut();
        let Some(vao) = state.bound_vertex_array else {
            state.raise(INVALID_OPERATION);
            return;
        };
        if let Some(vao) = state.vertex_arrays.get_mut(&vao) {
            vao.enabled.insert(index);
        }
    }

    fn delete_buffer(&self, name: GlName) {
        self.record(GlCall::DeleteBuffer(name));
        if name == 0 {
            return;
        }
        let mut state = self.state.borrow_mut();
        if state.buffers.remove(&name).is_none() {
            state.double_releases += 1;
        }
        if state.bound_buffer == Some(name) {
            state.bound_buffer = None;
        }
    }

    fn clear_color(&self, rgba: [f32; 4]) {
        self.record(GlCall::ClearColor(rgba));
    }

    fn clear_color_buffer(&self) {
        self.record(GlCall::Clear);
    }

    fn viewport(&self, x: i32, y: i32, width: i32, height: i32) {
        self.record(GlCall::Viewport { x, y, width, height });
        if width < 0 || height < 0 {
            self.state.borrow_mut().raise(INVALID_VALUE);
        }
    }

    fn polygon_mode(&self, wireframe: bool) {
        self.record(GlCall::PolygonMode { wireframe });
    }

    fn draw_triangles(&self, first: i32, count: i32) {
        self.record(GlCall::DrawTriangles { first, count });
        let mut state = self.state.borrow_mut();
        if state.bound_vertex_array.is_none() || state.current_program.is_none() {
            state.raise(INVALID_OPERATION);
        }
    }

    fn get_error(&self) -> u32 {
        self.state.borrow_mut().errors.pop_front().unwrap_or(glow::NO_ERROR)
    }

    fn renderer_string(&self) -> String {
        "headless".to_string()
    }

    fn version_string(&self) -> String {
        let (major, minor) = self.context_version();
        format!("{major}.{minor} (Core Profile) headless")
    }

    fn context_version(&self) -> (u32, u32) {
        self.state.borrow().context_version
    }
}

/// Headless [`WindowSystem`] driven by a script of events
///
/// Each `wait_events` call delivers the next scripted event. Once the script
/// runs out, the window behaves as if the user had closed it, so a render
/// loop over this backend always terminates.
pub struct HeadlessWindowSystem {
    state: Rc<RefCell<HeadlessState>>,
}

impl HeadlessWindowSystem {
    /// A window system with an empty event script
    pub fn new() -> Self {
        Self {
            state: Rc::new(RefCell::new(HeadlessState::default())),
        }
    }

    /// Queue events to deliver, one per `wait_events`
    pub fn with_events(self, events: impl IntoIterator<Item = HeadlessEvent>) -> Self {
        self.state.borrow_mut().events.extend(events);
        self
    }

    /// Make one bring-up step fail
    pub fn failing_at(self, point: FailurePoint) -> Self {
        self.state.borrow_mut().fail_at = Some(point);
        self
    }

    /// GL version the created context reports
    pub fn with_context_version(self, major: u32, minor: u32) -> Self {
        self.state.borrow_mut().context_version = (major, minor);
        self
    }

    /// Observer for this window system and the GL fake it hands out
    pub fn probe(&self) -> HeadlessProbe {
        HeadlessProbe {
            state: Rc::clone(&self.state),
        }
    }

    fn record(&self, call: WindowCall) {
        self.state.borrow_mut().window_calls.push(call);
    }

    fn fails_at(&self, point: FailurePoint) -> bool {
        self.state.borrow().fail_at == Some(point)
    }
}

impl Default for HeadlessWindowSystem {
    fn default() -> Self {
        Self::new()
    }
}

impl WindowSystem for HeadlessWindowSystem {
    fn init(&mut self) -> HarnessResult<()> {
        self.record(WindowCall::Init);
        if self.fails_at(FailurePoint::Init) {
            return Err(HarnessError::Initialization("Failed to initialize glfw.".to_string()));
        }
        self.state.borrow_mut().initialized = true;
        Ok(())
    }

    fn apply_hints(&mut self, _config: &WindowConfig) {
        self.record(WindowCall::ApplyHints);
    }

    fn create_window(&mut self, _config: &WindowConfig) -> HarnessResult<()> {
        self.record(WindowCall::CreateWindow);
        if self.fails_at(FailurePoint::CreateWindow) {
            return Err(HarnessError::WindowCreation("Failed to create glfw window.".to_string()));
        }
        self.state.borrow_mut().window_open = true;
        Ok(())
    }

    fn make_current(&mut self) {
        self.record(WindowCall::MakeCurrent);
    }

    fn load_gl(&mut self, _loader: LoaderOptions) -> HarnessResult<Box<dyn GlApi>> {
        self.record(WindowCall::LoadGl);
        if self.fails_at(FailurePoint::LoadGl) {
            return Err(HarnessError::Initialization("Failed to initialize glew.".to_string()));
        }
        Ok(Box::new(HeadlessGl {
            state: Rc::clone(&self.state),
        }))
    }

    fn set_swap_interval(&mut self, interval: u32) {
        self.record(WindowCall::SwapInterval(interval));
    }

    fn set_resize_polling(&mut self, enabled: bool) {
        self.record(WindowCall::ResizePolling(enabled));
        self.state.borrow_mut().resize_polling = enabled;
    }

    fn swap_buffers(&mut self) {
        self.record(WindowCall::SwapBuffers);
    }

    fn wait_events(&mut self) {
        self.record(WindowCall::WaitEvents);
        let mut state = self.state.borrow_mut();
        match state.events.pop_front() {
            Some(HeadlessEvent::Idle) => {}
            Some(HeadlessEvent::Escape) => state.escape_down = true,
            Some(HeadlessEvent::CloseRequest) | None => state.should_close = true,
            Some(HeadlessEvent::Resize(width, height)) => {
                if state.resize_polling {
                    state.resizes.push((width, height));
                }
            }
        }
    }

    fn should_close(&self) -> bool {
        self.state.borrow().should_close
    }

    fn set_should_close(&mut self, should_close: bool) {
        self.state.borrow_mut().should_close = should_close;
    }

    fn is_key_pressed(&self, key: Key) -> bool {
        match key {
            Key::Escape => self.state.borrow().escape_down,
        }
    }

    fn take_resizes(&mut self) -> Vec<(i32, i32)> {
        std::mem::take(&mut self.state.borrow_mut().resizes)
    }

    fn destroy_window(&mut self) {
        self.record(WindowCall::DestroyWindow);
        self.state.borrow_mut().window_open = false;
    }

    fn terminate(&mut self) {
        self.record(WindowCall::Terminate);
        self.state.borrow_mut().initialized = false;
    }
}
