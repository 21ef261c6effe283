//! Skybox & Cubemaps
//!
//! [`Cubemap`] owns a six-layer texture, either handed over as-is or baked
//! from an equirectangular panorama by rendering every face with
//! `equirect_to_cube.frag`. [`Skybox`] is a [`Drawable`] that fills the far
//! plane with a cubemap: one fullscreen triangle at depth 1.0, with the view
//! ray reconstructed per pixel from the inverse view-projection.
//!
//! Face layout follows the wgpu cube convention, texture origin top-left:
//!
//! | Layer | Face | u grows along | v grows along |
//! |-------|------|---------------|---------------|
//! | 0 | +X | -Z | -Y |
//! | 1 | -X | +Z | -Y |
//! | 2 | +Y | +X | +Z |
//! | 3 | -Y | +X | -Z |
//! | 4 | +Z | +X | -Y |
//! | 5 | -Z | -X | -Y |

use std::f32::consts::PI;
use std::path::Path;

use bytemuck::{Pod, Zeroable};
use glam::{Mat4, Vec2, Vec3, Vec4};
use wgpu::util::DeviceExt;

use crate::errors::Result;
use crate::renderer::draw_list::{BackgroundCommand, FrameRecorder};
use crate::renderer::draw_order::{Drawable, FrameContext};
use crate::renderer::pipeline::{ProgramId, ShaderLoader};
use crate::renderer::post::fullscreen::{
    draw_fullscreen, fullscreen_pipeline, linear_clamp_sampler, sampler_entry, texture_entry, uniform_entry,
};
use crate::resources::Texture;

pub const SKYBOX_VERTEX_SHADER: &str = "skybox.vert";
pub const SKYBOX_FRAGMENT_SHADER: &str = "skybox.frag";
pub const EQUIRECT_TO_CUBE_SHADER: &str = "equirect_to_cube.frag";

// ============================================================================
// Cube Faces
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CubeFace {
    PositiveX,
    NegativeX,
    PositiveY,
    NegativeY,
    PositiveZ,
    NegativeZ,
}

impl CubeFace {
    /// Faces in array-layer order.
    pub const ALL: [CubeFace; 6] = [
        CubeFace::PositiveX,
        CubeFace::NegativeX,
        CubeFace::PositiveY,
        CubeFace::NegativeY,
        CubeFace::PositiveZ,
        CubeFace::NegativeZ,
    ];

    #[inline]
    #[must_use]
    pub fn layer(self) -> u32 {
        self as u32
    }

    /// `(forward, right, down)`: the direction through the face center and
    /// the directions texture u and v grow along.
    #[must_use]
    pub fn basis(self) -> (Vec3, Vec3, Vec3) {
        match self {
            CubeFace::PositiveX => (Vec3::X, Vec3::NEG_Z, Vec3::NEG_Y),
            CubeFace::NegativeX => (Vec3::NEG_X, Vec3::Z, Vec3::NEG_Y),
            CubeFace::PositiveY => (Vec3::Y, Vec3::X, Vec3::Z),
            CubeFace::NegativeY => (Vec3::NEG_Y, Vec3::X, Vec3::NEG_Z),
            CubeFace::PositiveZ => (Vec3::Z, Vec3::X, Vec3::NEG_Y),
            CubeFace::NegativeZ => (Vec3::NEG_Z, Vec3::NEG_X, Vec3::NEG_Y),
        }
    }

    /// Unit direction through `uv` on this face.
    #[must_use]
    pub fn direction(self, uv: Vec2) -> Vec3 {
        let (forward, right, down) = self.basis();
        let st = uv * 2.0 - Vec2::ONE;
        (forward + right * st.x + down * st.y).normalize()
    }

    /// Face a direction leaves the unit cube through. Ties go to X, then Y.
    #[must_use]
    pub fn from_direction(dir: Vec3) -> Self {
        let a = dir.abs();
        if a.x >= a.y && a.x >= a.z {
            if dir.x >= 0.0 { CubeFace::PositiveX } else { CubeFace::NegativeX }
        } else if a.y >= a.z {
            if dir.y >= 0.0 { CubeFace::PositiveY } else { CubeFace::NegativeY }
        } else if dir.z >= 0.0 {
            CubeFace::PositiveZ
        } else {
            CubeFace::NegativeZ
        }
    }
}

/// Panorama coordinates of a world direction: u wraps around +Y starting at
/// -X, v runs from +Y (0) to -Y (1).
#[must_use]
pub fn equirect_uv(dir: Vec3) -> Vec2 {
    let dir = dir.normalize();
    let u = dir.z.atan2(dir.x) / (2.0 * PI) + 0.5;
    let v = dir.y.clamp(-1.0, 1.0).acos() / PI;
    Vec2::new(u, v)
}

/// World-space view ray through `ndc`, as `skybox.frag` reconstructs it.
#[must_use]
pub fn skybox_ray(view_projection_inverse: Mat4, ndc: Vec2) -> Vec3 {
    let near = view_projection_inverse.project_point3(ndc.extend(0.0));
    let far = view_projection_inverse.project_point3(ndc.extend(1.0));
    (far - near).normalize()
}

// ============================================================================
// GPU Uniform Structs
// ============================================================================

#[repr(C)]
#[derive(Clone, Copy, Debug, Pod, Zeroable)]
struct FaceUniforms {
    forward: Vec4,
    right: Vec4,
    down: Vec4,
}

impl From<CubeFace> for FaceUniforms {
    fn from(face: CubeFace) -> Self {
        let (forward, right, down) = face.basis();
        Self {
            forward: forward.extend(0.0),
            right: right.extend(0.0),
            down: down.extend(0.0),
        }
    }
}

#[repr(C)]
#[derive(Clone, Copy, Debug, Pod, Zeroable)]
struct SkyboxUniforms {
    view_projection_inverse: Mat4,
}

// ============================================================================
// Cubemap
// ============================================================================

#[derive(Debug)]
pub struct Cubemap {
    texture: Texture,
}

impl Cubemap {
    /// Format of cubemaps baked from panoramas.
    pub const BAKED_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Rgba16Float;

    /// Takes ownership of an existing six-layer texture.
    pub fn from_cubemap(texture: Texture) -> Result<Self> {
        texture.kind().require_cubemap("use a texture as a cubemap")?;
        Ok(Self { texture })
    }

    /// Bakes an equirectangular `panorama` into a new cubemap with
    /// `face_size`² texels per face. The conversion is submitted on `queue`
    /// before this returns.
    pub fn from_panorama(
        device: &wgpu::Device,
        queue: &wgpu::Queue,
        loader: &ShaderLoader,
        panorama: &Texture,
        face_size: u32,
    ) -> Result<Self> {
        let panorama_view = panorama.view_2d("convert a panorama into a cubemap")?;
        let face_size = face_size.max(1);
        log::info!(
            "Baking {}x{} panorama into a {face_size}px cubemap",
            panorama.size().x,
            panorama.size().y
        );

        let texture = Texture::from_wgpu(device.create_texture(&wgpu::TextureDescriptor {
            label: Some("Panorama Cubemap"),
            size: wgpu::Extent3d {
                width: face_size,
                height: face_size,
                depth_or_array_layers: 6,
            },
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: Self::BAKED_FORMAT,
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT | wgpu::TextureUsages::TEXTURE_BINDING,
            view_formats: &[],
        }));

        let layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("Equirect To Cube Layout"),
            entries: &[texture_entry(0), sampler_entry(1), uniform_entry(2)],
        });
        let pipeline = fullscreen_pipeline(
            device,
            loader,
            "Equirect To Cube",
            EQUIRECT_TO_CUBE_SHADER,
            &[],
            &[&layout],
            Self::BAKED_FORMAT,
            None,
        )?;

        // u wraps around the horizon, v stops at the poles
        let sampler = device.create_sampler(&wgpu::SamplerDescriptor {
            label: Some("Panorama Sampler"),
            address_mode_u: wgpu::AddressMode::Repeat,
            address_mode_v: wgpu::AddressMode::ClampToEdge,
            mag_filter: wgpu::FilterMode::Linear,
            min_filter: wgpu::FilterMode::Linear,
            ..Default::default()
        });

        let mut encoder = device.create_command_encoder(&wgpu::CommandEncoderDescriptor {
            label: Some("Equirect To Cube"),
        });
        for face in CubeFace::ALL {
            let buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
                label: Some("Cube Face Uniforms"),
                contents: bytemuck::bytes_of(&FaceUniforms::from(face)),
                usage: wgpu::BufferUsages::UNIFORM,
            });
            let bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
                label: Some("Equirect To Cube BG"),
                layout: &layout,
                entries: &[
                    wgpu::BindGroupEntry {
                        binding: 0,
                        resource: wgpu::BindingResource::TextureView(panorama_view),
                    },
                    wgpu::BindGroupEntry {
                        binding: 1,
                        resource: wgpu::BindingResource::Sampler(&sampler),
                    },
                    wgpu::BindGroupEntry {
                        binding: 2,
                        resource: buffer.as_entire_binding(),
                    },
                ],
            });
            let target = texture.cube_face_view(face.layer())?;
            draw_fullscreen(
                &mut encoder,
                "Equirect To Cube Face",
                &target,
                wgpu::LoadOp::Clear(wgpu::Color::BLACK),
                &pipeline,
                &[&bind_group],
            );
        }
        queue.submit(std::iter::once(encoder.finish()));

        Ok(Self { texture })
    }

    #[inline]
    #[must_use]
    pub fn texture(&self) -> &Texture {
        &self.texture
    }

    pub fn view(&self) -> Result<&wgpu::TextureView> {
        self.texture.cube_view("sample a cubemap")
    }
}

// ============================================================================
// Skybox
// ============================================================================

struct SkyboxResources {
    pipeline: wgpu::RenderPipeline,
    bind_group: wgpu::BindGroup,
    uniform_buffer: wgpu::Buffer,
}

impl SkyboxResources {
    fn new(recorder: &FrameRecorder, cubemap: &Cubemap) -> Result<Self> {
        let device = recorder.device();
        let layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("Skybox Layout"),
            entries: &[
                wgpu::BindGroupLayoutEntry {
                    binding: 0,
                    visibility: wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Texture {
                        sample_type: wgpu::TextureSampleType::Float { filterable: true },
                        view_dimension: wgpu::TextureViewDimension::Cube,
                        multisampled: false,
                    },
                    count: None,
                },
                sampler_entry(1),
                uniform_entry(2),
            ],
        });

        let pipeline = skybox_pipeline(
            device,
            recorder.loader(),
            &layout,
            recorder.color_format(),
            recorder.depth_format(),
        )?;

        let uniform_buffer = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("Skybox Uniforms"),
            size: std::mem::size_of::<SkyboxUniforms>() as u64,
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });
        let sampler = linear_clamp_sampler(device, "Skybox Sampler");
        let bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("Skybox BG"),
            layout: &layout,
            entries: &[
                wgpu::BindGroupEntry {
                    binding: 0,
                    resource: wgpu::BindingResource::TextureView(cubemap.view()?),
                },
                wgpu::BindGroupEntry {
                    binding: 1,
                    resource: wgpu::BindingResource::Sampler(&sampler),
                },
                wgpu::BindGroupEntry {
                    binding: 2,
                    resource: uniform_buffer.as_entire_binding(),
                },
            ],
        });

        Ok(Self {
            pipeline,
            bind_group,
            uniform_buffer,
        })
    }
}

fn skybox_pipeline(
    device: &wgpu::Device,
    loader: &ShaderLoader,
    layout: &wgpu::BindGroupLayout,
    color_format: wgpu::TextureFormat,
    depth_format: wgpu::TextureFormat,
) -> Result<wgpu::RenderPipeline> {
    let compiled = loader.load_program(
        Path::new(SKYBOX_VERTEX_SHADER),
        Path::new(SKYBOX_FRAGMENT_SHADER),
        &[],
    )?;
    let (vs_module, fs_module) = compiled.create_modules(device, "Skybox");

    let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
        label: Some("Skybox"),
        bind_group_layouts: &[Some(layout)],
        immediate_size: 0,
    });

    Ok(device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
        label: Some("Skybox"),
        layout: Some(&pipeline_layout),
        vertex: wgpu::VertexState {
            module: &vs_module,
            entry_point: Some("main"),
            buffers: &[],
            compilation_options: wgpu::PipelineCompilationOptions::default(),
        },
        fragment: Some(wgpu::FragmentState {
            module: &fs_module,
            entry_point: Some("main"),
            targets: &[Some(wgpu::ColorTargetState {
                format: color_format,
                blend: None,
                write_mask: wgpu::ColorWrites::ALL,
            })],
            compilation_options: wgpu::PipelineCompilationOptions::default(),
        }),
        primitive: wgpu::PrimitiveState {
            topology: wgpu::PrimitiveTopology::TriangleList,
            ..Default::default()
        },
        // Far plane against a depth buffer cleared to 1.0
        depth_stencil: Some(wgpu::DepthStencilState {
            format: depth_format,
            depth_write_enabled: Some(false),
            depth_compare: Some(wgpu::CompareFunction::LessEqual),
            stencil: wgpu::StencilState::default(),
            bias: wgpu::DepthBiasState::default(),
        }),
        multisample: wgpu::MultisampleState::default(),
        multiview_mask: None,
        cache: None,
    }))
}

/// Cubemap background for the scene pass.
///
/// Reports [`ProgramId::UNRESOLVED`], so the registry always sorts it ahead
/// of the meshes in its pass.
pub struct Skybox {
    cubemap: Cubemap,
    resources: Option<SkyboxResources>,
}

impl Skybox {
    #[must_use]
    pub fn new(cubemap: Cubemap) -> Self {
        Self {
            cubemap,
            resources: None,
        }
    }

    #[inline]
    #[must_use]
    pub fn cubemap(&self) -> &Cubemap {
        &self.cubemap
    }

    fn prepare(&mut self, recorder: &FrameRecorder) -> Result<&SkyboxResources> {
        let resources = match self.resources.take() {
            Some(resources) => resources,
            None => SkyboxResources::new(recorder, &self.cubemap)?,
        };
        Ok(&*self.resources.insert(resources))
    }
}

impl Drawable<FrameRecorder> for Skybox {
    fn program_id(&self) -> ProgramId {
        ProgramId::UNRESOLVED
    }

    fn draw(&mut self, recorder: &mut FrameRecorder, frame: &mut FrameContext<'_>) -> Result<()> {
        let uniforms = SkyboxUniforms {
            view_projection_inverse: frame.view_proj.inverse(),
        };
        let resources = self.prepare(recorder)?;
        let command = BackgroundCommand {
            pipeline: resources.pipeline.clone(),
            bind_group: resources.bind_group.clone(),
            uniform_buffer: resources.uniform_buffer.clone(),
            uniform_data: bytemuck::bytes_of(&uniforms).to_vec(),
        };
        recorder.push_background(command);
        Ok(())
    }
}
