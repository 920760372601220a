//! Static vertex geometry
//!
//! Interleaved float vertex data uploaded once into a vertex buffer, with its
//! attribute layout latched into a vertex array object.

use crate::backend::{GlApi, GlName};
use crate::error::{HarnessError, HarnessResult};
use std::fmt;

const FLOAT_SIZE: i32 = std::mem::size_of::<f32>() as i32;

/// One float attribute inside an interleaved vertex record
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VertexAttribute {
    /// Shader attribute location
    pub index: u32,
    /// Number of float components (1-4)
    pub components: i32,
    /// Byte offset from the start of the record
    pub offset: i32,
}

/// Interleaved vertex layout
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VertexLayout {
    stride: i32,
    attributes: Vec<VertexAttribute>,
}

impl VertexLayout {
    /// Pack `(index, components)` attributes back to back
    pub fn interleaved(attributes: &[(u32, i32)]) -> Self {
        let mut offset = 0;
        let attributes = attributes
            .iter()
            .map(|&(index, components)| {
                let attribute = VertexAttribute {
                    index,
                    components,
                    offset,
                };
                offset += components * FLOAT_SIZE;
                attribute
            })
            .collect();

        Self {
            stride: offset,
            attributes,
        }
    }

    /// 3-float position at slot 0 followed by 3-float color at slot 1
    pub fn position_color() -> Self {
        Self::interleaved(&[(0, 3), (1, 3)])
    }

    /// Bytes between consecutive vertex records
    pub const fn stride(&self) -> i32 {
        self.stride
    }

    /// Floats in one vertex record
    pub const fn floats_per_vertex(&self) -> usize {
        (self.stride / FLOAT_SIZE) as usize
    }

    /// Attributes in record order
    pub fn attributes(&self) -> &[VertexAttribute] {
        &self.attributes
    }
}

/// Uploaded vertex data plus its attribute layout
///
/// Exists only after its backing store has been filled, so it can never be
/// bound empty. Immutable once uploaded; deleted on
/// [`GeometryBuffer::release`] or drop.
pub struct GeometryBuffer<'ctx> {
    gl: &'ctx dyn GlApi,
    vertex_array: Option<GlName>,
    buffer: Option<GlName>,
    vertex_count: usize,
    layout: VertexLayout,
}

impl<'ctx> GeometryBuffer<'ctx> {
    /// Upload interleaved vertices and latch `layout` into a vertex array
    ///
    /// Order: vertex array bound, buffer bound and filled, attribute
    /// pointers described and enabled, then both unbound. The pointers keep
    /// referencing the buffer after it is unbound.
    pub fn upload(gl: &'ctx dyn GlApi, vertices: &[f32], layout: VertexLayout) -> HarnessResult<Self> {
        let floats_per_vertex = layout.floats_per_vertex();
        let vertex_count = vertices.len().checked_div(floats_per_vertex).unwrap_or(0);
        let used = vertex_count * floats_per_vertex;
        if used != vertices.len() {
            log::warn!(
                "ignoring {} trailing floats that do not form a whole {}-float vertex",
                vertices.len() - used,
                floats_per_vertex
            );
        }

        let mut geometry = Self {
            gl,
            vertex_array: None,
            buffer: None,
            vertex_count,
            layout,
        };

        // on early return the partially built geometry releases what it holds
        let vertex_array = gl.create_vertex_array().map_err(|e| {
            HarnessError::ResourceCreation(format!("creation of vertex array object failed: {e}"))
        })?;
        geometry.vertex_array = Some(vertex_array);
        let buffer = gl.create_buffer().map_err(|e| {
            HarnessError::ResourceCreation(format!("creation of vertex buffer object failed: {e}"))
        })?;
        geometry.buffer = Some(buffer);

        gl.bind_vertex_array(Some(vertex_array));
        gl.bind_array_buffer(Some(buffer));
        gl.array_buffer_data_static(bytemuck::cast_slice(&vertices[..used]));

        for attribute in geometry.layout.attributes() {
            gl.vertex_attrib_pointer_f32(
                attribute.index,
                attribute.components,
                geometry.layout.stride(),
                attribute.offset,
            );
        }
        for attribute in geometry.layout.attributes() {
            gl.enable_vertex_attrib_array(attribute.index);
        }

        gl.bind_array_buffer(None);
        gl.bind_vertex_array(None);

        log::debug!(
            "uploaded {} vertices ({} bytes, stride {})",
            vertex_count,
            used * std::mem::size_of::<f32>(),
            geometry.layout.stride()
        );
        Ok(geometry)
    }

    /// Bind the vertex array
    pub fn bind(&self) {
        if let Some(vertex_array) = self.vertex_array {
            self.gl.bind_vertex_array(Some(vertex_array));
        }
    }

    /// Draw every vertex as triangles; the vertex array must be bound
    pub fn draw(&self) {
        if self.vertex_array.is_some() {
            self.gl.draw_triangles(0, self.vertex_count as i32);
        }
    }

    /// Number of whole vertices uploaded
    pub const fn vertex_count(&self) -> usize {
        self.vertex_count
    }

    /// Attribute layout
    pub const fn layout(&self) -> &VertexLayout {
        &self.layout
    }

    /// Raw GL name of the vertex array, `None` once released
    pub const fn vertex_array(&self) -> Option<GlName> {
        self.vertex_array
    }

    /// Raw GL name of the vertex buffer, `None` once released
    pub const fn buffer(&self) -> Option<GlName> {
        self.buffer
    }

    /// Delete the vertex array and buffer; later calls do nothing
    pub fn release(&mut self) {
        if let Some(vertex_array) = self.vertex_array.take() {
            self.gl.delete_vertex_array(vertex_array);
        }
        if let Some(buffer) = self.buffer.take() {
            self.gl.delete_buffer(buffer);
            log::debug!("geometry buffer {} released", buffer);
        }
    }
}

impl Drop for GeometryBuffer<'_> {
    fn drop(&mut self) {
        self.release();
    }
}

impl fmt::Debug for GeometryBuffer<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GeometryBuffer")
            .field("vertex_array", &self.vertex_array)
            .field("buffer", &self.buffer)
            .field("vertex_count", &self.vertex_count)
            .field("layout", &self.layout)
            .finish_non_exhaustive()
    }
}
