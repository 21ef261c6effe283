use std::sync::Arc;

use glam::{Vec2, Vec3};
use wgpu::util::DeviceExt;

/// Vertex attribute locations shared by every shading variant.
pub const POSITION_LOCATION: u32 = 0;
pub const UV_LOCATION: u32 = 1;
pub const NORMAL_LOCATION: u32 = 2;

const POSITION_ATTRIBUTES: [wgpu::VertexAttribute; 1] =
    wgpu::vertex_attr_array![POSITION_LOCATION => Float32x3];
const UV_ATTRIBUTES: [wgpu::VertexAttribute; 1] = wgpu::vertex_attr_array![UV_LOCATION => Float32x2];
const NORMAL_ATTRIBUTES: [wgpu::VertexAttribute; 1] =
    wgpu::vertex_attr_array![NORMAL_LOCATION => Float32x3];

/// One vertex buffer per attribute (non-interleaved).
#[must_use]
pub fn vertex_buffer_layouts() -> [wgpu::VertexBufferLayout<'static>; 3] {
    [
        wgpu::VertexBufferLayout {
            array_stride: std::mem::size_of::<Vec3>() as u64,
            step_mode: wgpu::VertexStepMode::Vertex,
            attributes: &POSITION_ATTRIBUTES,
        },
        wgpu::VertexBufferLayout {
            array_stride: std::mem::size_of::<Vec2>() as u64,
            step_mode: wgpu::VertexStepMode::Vertex,
            attributes: &UV_ATTRIBUTES,
        },
        wgpu::VertexBufferLayout {
            array_stride: std::mem::size_of::<Vec3>() as u64,
            step_mode: wgpu::VertexStepMode::Vertex,
            attributes: &NORMAL_ATTRIBUTES,
        },
    ]
}

/// Ready-to-bind GPU geometry: positions, UVs, normals and 16-bit indices.
#[derive(Debug)]
pub struct Mesh {
    pub(crate) positions: wgpu::Buffer,
    pub(crate) uvs: wgpu::Buffer,
    pub(crate) normals: wgpu::Buffer,
    pub(crate) indices: wgpu::Buffer,
    index_count: u32,
}

impl Mesh {
    /// Uploads the attribute streams. Missing UVs or normals are zero-filled
    /// so every variant can bind the same three vertex buffers.
    #[must_use]
    pub fn new(
        device: &wgpu::Device,
        label: &str,
        positions: &[Vec3],
        uvs: Option<&[Vec2]>,
        normals: Option<&[Vec3]>,
        indices: &[u16],
    ) -> Arc<Self> {
        let vertex_count = positions.len();
        let zero_uvs;
        let uvs = if let Some(uvs) = uvs {
            uvs
        } else {
            zero_uvs = vec![Vec2::ZERO; vertex_count];
            &zero_uvs
        };
        let zero_normals;
        let normals = if let Some(normals) = normals {
            normals
        } else {
            zero_normals = vec![Vec3::ZERO; vertex_count];
            &zero_normals
        };

        let vertex_buffer = |name: &str, contents: &[u8]| {
            device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
                label: Some(&format!("{label} {name}")),
                contents,
                usage: wgpu::BufferUsages::VERTEX,
            })
        };

        // Index buffers must be a multiple of 4 bytes.
        let mut index_data: Vec<u16> = indices.to_vec();
        if index_data.len() % 2 == 1 {
            index_data.push(0);
        }

        Arc::new(Self {
            positions: vertex_buffer("Positions", bytemuck::cast_slice(positions)),
            uvs: vertex_buffer("UVs", bytemuck::cast_slice(uvs)),
            normals: vertex_buffer("Normals", bytemuck::cast_slice(normals)),
            indices: device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
                label: Some(&format!("{label} Indices")),
                contents: bytemuck::cast_slice(&index_data),
                usage: wgpu::BufferUsages::INDEX,
            }),
            index_count: indices.len() as u32,
        })
    }

    #[inline]
    #[must_use]
    pub fn index_count(&self) -> u32 {
        self.index_count
    }
}
