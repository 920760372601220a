//! The four-triangle fan drawn by the demo

/// Twelve position/color vertices: four triangles meeting at the origin
pub const FOUR_TRIANGLES: [f32; 72] = [
    // upper right, orange
    0.0, 0.0, 0.0, 0.5, 0.0, 0.0, //
    1.0, 0.0, 0.0, 0.5, 0.0, 0.0, //
    0.0, 1.0, 0.0, 1.0, 0.0, 0.0, //
    // lower right, purple
    0.0, 0.0, 0.0, 0.25, 0.0, 0.4, //
    0.0, -1.0, 0.0, 0.25, 0.0, 0.4, //
    1.0, 0.0, 0.0, 0.5, 0.0, 0.8, //
    // lower left, gray
    0.0, 0.0, 0.0, 0.25, 0.45, 0.25, //
    -1.0, 0.0, 0.0, 0.25, 0.45, 0.25, //
    0.0, -1.0, 0.0, 0.4, 0.9, 0.4, //
    // upper left, blue
    0.0, 0.0, 0.0, 0.0, 0.25, 0.4, //
    0.0, 1.0, 0.0, 0.0, 0.25, 0.4, //
    -1.0, 0.0, 0.0, 0.0, 0.5, 0.8,
];

#[cfg(test)]
mod tests {
    use super::*;
    use gl_harness::render::VertexLayout;

    #[test]
    fn test_table_holds_four_whole_triangles() {
        let floats_per_vertex = VertexLayout::position_color().floats_per_vertex();
        assert_eq!(FOUR_TRIANGLES.len() % floats_per_vertex, 0);
        assert_eq!(FOUR_TRIANGLES.len() / floats_per_vertex, 12);
    }

    #[test]
    fn test_every_triangle_starts_at_origin() {
        for triangle in FOUR_TRIANGLES.chunks(18) {
            assert_eq!(&triangle[..3], &[0.0, 0.0, 0.0]);
        }
    }
}
