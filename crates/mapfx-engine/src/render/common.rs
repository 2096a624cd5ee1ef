//! Static geometry, blend state and vertex layouts shared by every layer program.

use bytemuck::{Pod, Zeroable};

// ── blend ─────────────────────────────────────────────────────────────────

/// Layer shaders output straight (non-premultiplied) alpha.
pub(super) fn straight_alpha_blend() -> wgpu::BlendState {
    wgpu::BlendState {
        color: wgpu::BlendComponent {
            src_factor: wgpu::BlendFactor::SrcAlpha,
            dst_factor: wgpu::BlendFactor::OneMinusSrcAlpha,
            operation: wgpu::BlendOperation::Add,
        },
        alpha: wgpu::BlendComponent {
            src_factor: wgpu::BlendFactor::One,
            dst_factor: wgpu::BlendFactor::OneMinusSrcAlpha,
            operation: wgpu::BlendOperation::Add,
        },
    }
}

// ── quad vertex ───────────────────────────────────────────────────────────

#[repr(C)]
#[derive(Debug, Copy, Clone, Pod, Zeroable)]
pub(super) struct QuadVertex {
    pub corner: [f32; 2], // -1..1
}

impl QuadVertex {
    const ATTRS: [wgpu::VertexAttribute; 1] = wgpu::vertex_attr_array![0 => Float32x2];

    pub(super) fn layout() -> wgpu::VertexBufferLayout<'static> {
        wgpu::VertexBufferLayout {
            array_stride: std::mem::size_of::<QuadVertex>() as u64,
            step_mode: wgpu::VertexStepMode::Vertex,
            attributes: &Self::ATTRS,
        }
    }
}

pub(super) const QUAD_VERTICES: [QuadVertex; 4] = [
    QuadVertex { corner: [-1.0, -1.0] },
    QuadVertex { corner: [1.0, -1.0] },
    QuadVertex { corner: [1.0, 1.0] },
    QuadVertex { corner: [-1.0, 1.0] },
];

pub(super) const QUAD_INDICES: [u16; 6] = [0, 1, 2, 0, 2, 3];

// ── instance attributes ───────────────────────────────────────────────────

/// Vertex format for an attribute of `width` floats.
pub(super) fn vertex_format(width: u8) -> Option<wgpu::VertexFormat> {
    match width {
        1 => Some(wgpu::VertexFormat::Float32),
        2 => Some(wgpu::VertexFormat::Float32x2),
        3 => Some(wgpu::VertexFormat::Float32x3),
        4 => Some(wgpu::VertexFormat::Float32x4),
        _ => None,
    }
}

/// One tightly packed instance buffer per attribute; attribute `i` lands on
/// `@location(i + 1)` behind the quad at location 0.
pub(super) fn instance_attributes(widths: &[u8]) -> Option<Vec<[wgpu::VertexAttribute; 1]>> {
    widths
        .iter()
        .enumerate()
        .map(|(i, &w)| {
            let format = vertex_format(w)?;
            Some([wgpu::VertexAttribute {
                format,
                offset: 0,
                shader_location: i as u32 + 1,
            }])
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn quad_spans_clip_corners() {
        let xs: Vec<f32> = QUAD_VERTICES.iter().map(|v| v.corner[0]).collect();
        assert_eq!(xs, [-1.0, 1.0, 1.0, -1.0]);
        assert!(QUAD_INDICES.iter().all(|&i| (i as usize) < QUAD_VERTICES.len()));
    }

    #[test]
    fn attributes_follow_the_quad() {
        let attrs = instance_attributes(&[2, 1, 4]).unwrap();
        let locations: Vec<u32> = attrs.iter().map(|a| a[0].shader_location).collect();
        assert_eq!(locations, [1, 2, 3]);
        assert_eq!(attrs[2][0].format, wgpu::VertexFormat::Float32x4);
        assert!(attrs.iter().all(|a| a[0].offset == 0));
    }

    #[test]
    fn unsupported_width_has_no_format() {
        assert_eq!(vertex_format(0), None);
        assert_eq!(vertex_format(5), None);
        assert!(instance_attributes(&[2, 7]).is_none());
    }
}
