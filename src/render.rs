use std::collections::HashMap;
use std::sync::Arc;

use anyhow::{anyhow, Context, Result};
use glam::{Mat4, Vec3};
use log::{error, info};
use wgpu::util::DeviceExt;
use winit::dpi::PhysicalSize;
use winit::window::{Window, WindowId};

use crate::device::{
    BlendMode, DepthCompare, MeshId, ProgramId, RenderDevice, TextureId, UniformLocation,
};
use crate::mesh::{self, MeshData, VERTEX_STRIDE};

/// GPU renderer backed by wgpu.
///
/// Frame calls are recorded into a draw list and replayed inside a single
/// render pass when the frame ends, so the immediate-style device surface
/// maps onto one encoder submission per frame.
pub struct WgpuRenderer {
    window: Arc<Window>,
    surface: wgpu::Surface<'static>,
    device: wgpu::Device,
    queue: wgpu::Queue,
    config: wgpu::SurfaceConfiguration,
    size: PhysicalSize<u32>,
    depth: DepthBuffer,
    sampler: wgpu::Sampler,
    uniform_layout: wgpu::BindGroupLayout,
    textured_layout: wgpu::BindGroupLayout,
    cube_layout: wgpu::BindGroupLayout,
    programs: Vec<Program>,
    meshes: Vec<MeshBuffers>,
    mesh_textures: Vec<Option<TextureId>>,
    textures: Vec<wgpu::TextureView>,
    placeholder_2d: TextureId,
    placeholder_cube: TextureId,
    current_program: Option<ProgramId>,
    blend: BlendMode,
    depth_compare: DepthCompare,
    bound_texture: Option<TextureId>,
    bound_cubemap: Option<TextureId>,
    draws: Vec<RecordedDraw>,
}

impl WgpuRenderer {
    /// Initializes the GPU renderer for the provided window.
    pub async fn new(window: Arc<Window>) -> Result<Self> {
        let size = window.inner_size();
        if size.width == 0 || size.height == 0 {
            return Err(anyhow!("window has zero area"));
        }

        let instance = wgpu::Instance::new(&wgpu::InstanceDescriptor {
            backends: wgpu::Backends::PRIMARY,
            flags: wgpu::InstanceFlags::default(),
            memory_budget_thresholds: Default::default(),
            backend_options: Default::default(),
        });
        let surface = instance.create_surface(Arc::clone(&window))?;

        let adapter = instance
            .request_adapter(&wgpu::RequestAdapterOptions {
                power_preference: wgpu::PowerPreference::HighPerformance,
                compatible_surface: Some(&surface),
                force_fallback_adapter: false,
            })
            .await
            .context("failed to acquire GPU adapter")?;

        let device_descriptor = wgpu::DeviceDescriptor {
            label: Some("renderer-device"),
            required_features: wgpu::Features::empty(),
            required_limits: wgpu::Limits::default(),
            memory_hints: Default::default(),
            trace: Default::default(),
        };
        let (device, queue) = adapter
            .request_device(&device_descriptor)
            .await
            .context("failed to create GPU device")?;

        let surface_caps = surface.get_capabilities(&adapter);
        let surface_format = surface_caps
            .formats
            .iter()
            .find(|format| format.is_srgb())
            .copied()
            .unwrap_or(surface_caps.formats[0]);

        let config = wgpu::SurfaceConfiguration {
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
            format: surface_format,
            width: size.width,
            height: size.height,
            present_mode: surface_caps
                .present_modes
                .iter()
                .copied()
                .find(|mode| {
                    matches!(
                        mode,
                        wgpu::PresentMode::Mailbox | wgpu::PresentMode::Immediate
                    )
                })
                .unwrap_or(wgpu::PresentMode::Fifo),
            desired_maximum_frame_latency: 2,
            alpha_mode: surface_caps.alpha_modes[0],
            view_formats: vec![],
        };
        surface.configure(&device, &config);

        let depth = DepthBuffer::create(&device, config.width, config.height);

        let sampler = device.create_sampler(&wgpu::SamplerDescriptor {
            label: Some("scene-sampler"),
            address_mode_u: wgpu::AddressMode::Repeat,
            address_mode_v: wgpu::AddressMode::Repeat,
            address_mode_w: wgpu::AddressMode::Repeat,
            mag_filter: wgpu::FilterMode::Linear,
            min_filter: wgpu::FilterMode::Linear,
            ..Default::default()
        });

        let uniform_entry = wgpu::BindGroupLayoutEntry {
            binding: 0,
            visibility: wgpu::ShaderStages::VERTEX_FRAGMENT,
            ty: wgpu::BindingType::Buffer {
                ty: wgpu::BufferBindingType::Uniform,
                has_dynamic_offset: false,
                min_binding_size: None,
            },
            count: None,
        };
        let sampler_entry = wgpu::BindGroupLayoutEntry {
            binding: 2,
            visibility: wgpu::ShaderStages::FRAGMENT,
            ty: wgpu::BindingType::Sampler(wgpu::SamplerBindingType::Filtering),
            count: None,
        };
        let texture_entry = |dimension| wgpu::BindGroupLayoutEntry {
            binding: 1,
            visibility: wgpu::ShaderStages::FRAGMENT,
            ty: wgpu::BindingType::Texture {
                sample_type: wgpu::TextureSampleType::Float { filterable: true },
                view_dimension: dimension,
                multisampled: false,
            },
            count: None,
        };

        let uniform_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("uniform-bind-layout"),
            entries: &[uniform_entry],
        });
        let textured_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("textured-bind-layout"),
            entries: &[
                uniform_entry,
                texture_entry(wgpu::TextureViewDimension::D2),
                sampler_entry,
            ],
        });
        let cube_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("cube-bind-layout"),
            entries: &[
                uniform_entry,
                texture_entry(wgpu::TextureViewDimension::Cube),
                sampler_entry,
            ],
        });

        let mut renderer = Self {
            window,
            surface,
            device,
            queue,
            config,
            size,
            depth,
            sampler,
            uniform_layout,
            textured_layout,
            cube_layout,
            programs: Vec::new(),
            meshes: Vec::new(),
            mesh_textures: Vec::new(),
            textures: Vec::new(),
            placeholder_2d: TextureId(0),
            placeholder_cube: TextureId(0),
            current_program: None,
            blend: BlendMode::Opaque,
            depth_compare: DepthCompare::Less,
            bound_texture: None,
            bound_cubemap: None,
            draws: Vec::new(),
        };
        renderer.placeholder_2d = renderer.upload_rgba(&[255; 4], 1, 1, 1, "placeholder");
        renderer.placeholder_cube = renderer.upload_rgba(&[255; 24], 1, 1, 6, "placeholder-cube");
        Ok(renderer)
    }

    /// Returns the identifier of the window owned by the renderer.
    pub fn window_id(&self) -> WindowId {
        self.window.id()
    }

    /// Exposes the inner window for event handling.
    pub fn window(&self) -> &Window {
        &self.window
    }

    /// Resizes the swap chain to match the new dimensions.
    pub fn resize(&mut self, new_size: PhysicalSize<u32>) {
        if new_size.width == 0 || new_size.height == 0 {
            return;
        }
        self.size = new_size;
        self.config.width = new_size.width;
        self.config.height = new_size.height;
        self.surface.configure(&self.device, &self.config);
        self.depth = DepthBuffer::create(&self.device, new_size.width, new_size.height);
    }

    fn upload_rgba(&mut self, pixels: &[u8], width: u32, height: u32, layers: u32, label: &str) -> TextureId {
        let texture = self.device.create_texture(&wgpu::TextureDescriptor {
            label: Some(label),
            size: wgpu::Extent3d {
                width,
                height,
                depth_or_array_layers: layers,
            },
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: wgpu::TextureFormat::Rgba8UnormSrgb,
            usage: wgpu::TextureUsages::TEXTURE_BINDING | wgpu::TextureUsages::COPY_DST,
            view_formats: &[],
        });
        let layer_bytes = (4 * width * height) as usize;
        for layer in 0..layers {
            let start = layer as usize * layer_bytes;
            self.queue.write_texture(
                wgpu::TexelCopyTextureInfo {
                    texture: &texture,
                    mip_level: 0,
                    origin: wgpu::Origin3d {
                        x: 0,
                        y: 0,
                        z: layer,
                    },
                    aspect: wgpu::TextureAspect::All,
                },
                &pixels[start..start + layer_bytes],
                wgpu::TexelCopyBufferLayout {
                    offset: 0,
                    bytes_per_row: Some(4 * width),
                    rows_per_image: Some(height),
                },
                wgpu::Extent3d {
                    width,
                    height,
                    depth_or_array_layers: 1,
                },
            );
        }
        let view = texture.create_view(&wgpu::TextureViewDescriptor {
            dimension: Some(if layers == 6 {
                wgpu::TextureViewDimension::Cube
            } else {
                wgpu::TextureViewDimension::D2
            }),
            ..Default::default()
        });
        self.textures.push(view);
        TextureId(self.textures.len() - 1)
    }

    fn bind_layout(&self, kind: ProgramKind) -> &wgpu::BindGroupLayout {
        match kind {
            ProgramKind::Lights => &self.uniform_layout,
            ProgramKind::Main => &self.textured_layout,
            ProgramKind::Exterior | ProgramKind::Skybox => &self.cube_layout,
        }
    }

    fn push_mesh(&mut self, data: &MeshData, texture: Option<TextureId>) -> MeshId {
        let buffers = MeshBuffers::from_data(&self.device, data);
        self.meshes.push(buffers);
        self.mesh_textures.push(texture);
        MeshId(self.meshes.len() - 1)
    }

    fn write_uniform(&mut self, location: UniformLocation, bytes: &[u8]) {
        if !location.is_resolved() {
            return;
        }
        let Some(program) = self.current_program else {
            return;
        };
        let offset = location.slot() as usize;
        let staging = &mut self.programs[program.0].staging;
        staging[offset..offset + bytes.len()].copy_from_slice(bytes);
    }
}

impl RenderDevice for WgpuRenderer {
    fn create_program(&mut self, name: &str) -> Result<ProgramId> {
        let kind = ProgramKind::from_name(name)
            .ok_or_else(|| anyhow!("unknown shading program {name}"))?;
        let shader = self.device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some(name),
            source: wgpu::ShaderSource::Wgsl(kind.shader_source().into()),
        });
        let pipeline_layout = self
            .device
            .create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
                label: Some(name),
                bind_group_layouts: &[self.bind_layout(kind)],
                push_constant_ranges: &[],
            });

        let mut pipelines = HashMap::new();
        for blend in [
            BlendMode::Opaque,
            BlendMode::ScreenFilter,
            BlendMode::AlphaOver,
        ] {
            for depth in [DepthCompare::Less, DepthCompare::LessOrEqual] {
                let pipeline =
                    self.device
                        .create_render_pipeline(&wgpu::RenderPipelineDescriptor {
                            label: Some(name),
                            layout: Some(&pipeline_layout),
                            vertex: wgpu::VertexState {
                                module: &shader,
                                entry_point: Some("vs_main"),
                                compilation_options: Default::default(),
                                buffers: &[wgpu::VertexBufferLayout {
                                    array_stride: (VERTEX_STRIDE * std::mem::size_of::<f32>())
                                        as u64,
                                    step_mode: wgpu::VertexStepMode::Vertex,
                                    attributes: &[
                                        wgpu::VertexAttribute {
                                            format: wgpu::VertexFormat::Float32x3,
                                            offset: 0,
                                            shader_location: 0,
                                        },
                                        wgpu::VertexAttribute {
                                            format: wgpu::VertexFormat::Float32x3,
                                            offset: (3 * std::mem::size_of::<f32>()) as u64,
                                            shader_location: 1,
                                        },
                                        wgpu::VertexAttribute {
                                            format: wgpu::VertexFormat::Float32x2,
                                            offset: (6 * std::mem::size_of::<f32>()) as u64,
                                            shader_location: 2,
                                        },
                                    ],
                                }],
                            },
                            primitive: wgpu::PrimitiveState {
                                topology: wgpu::PrimitiveTopology::TriangleList,
                                front_face: wgpu::FrontFace::Ccw,
                                cull_mode: None,
                                polygon_mode: wgpu::PolygonMode::Fill,
                                ..Default::default()
                            },
                            depth_stencil: Some(wgpu::DepthStencilState {
                                format: DepthBuffer::FORMAT,
                                depth_write_enabled: true,
                                depth_compare: match depth {
                                    DepthCompare::Less => wgpu::CompareFunction::Less,
                                    DepthCompare::LessOrEqual => wgpu::CompareFunction::LessEqual,
                                },
                                stencil: Default::default(),
                                bias: Default::default(),
                            }),
                            multisample: wgpu::MultisampleState::default(),
                            fragment: Some(wgpu::FragmentState {
                                module: &shader,
                                entry_point: Some("fs_main"),
                                compilation_options: Default::default(),
                                targets: &[Some(wgpu::ColorTargetState {
                                    format: self.config.format,
                                    blend: Some(blend_state(blend)),
                                    write_mask: wgpu::ColorWrites::ALL,
                                })],
                            }),
                            multiview: None,
                            cache: None,
                        });
                pipelines.insert((blend, depth), pipeline);
            }
        }

        self.programs.push(Program {
            kind,
            staging: vec![0; kind.uniform_size()],
            pipelines,
        });
        Ok(ProgramId(self.programs.len() - 1))
    }

    fn uniform_location(&mut self, program: ProgramId, name: &str) -> UniformLocation {
        match self.programs[program.0].kind.uniform_offset(name) {
            Some(offset) => UniformLocation::new(offset as i32),
            None => UniformLocation::UNRESOLVED,
        }
    }

    fn load_meshes(&mut self, path: &str) -> Result<Vec<MeshId>> {
        let groups = mesh::load_obj(path)?;
        let mut ids = Vec::with_capacity(groups.len());
        for group in groups {
            let texture = group
                .texture
                .as_ref()
                .map(|p| p.display().to_string())
                .map(|name| self.load_texture_2d(&name));
            ids.push(self.push_mesh(&group, texture));
        }
        Ok(ids)
    }

    fn create_cube(&mut self) -> MeshId {
        self.push_mesh(&mesh::cube(), None)
    }

    fn create_sphere(&mut self) -> MeshId {
        self.push_mesh(&mesh::sphere(), None)
    }

    fn mesh_texture(&self, mesh: MeshId) -> Option<TextureId> {
        self.mesh_textures[mesh.0]
    }

    fn load_texture_2d(&mut self, path: &str) -> TextureId {
        match image::open(path) {
            Ok(img) => {
                let rgba = img.to_rgba8();
                let (width, height) = rgba.dimensions();
                self.upload_rgba(&rgba, width, height, 1, path)
            }
            Err(err) => {
                error!("failed to load texture {path}: {err}");
                self.placeholder_2d
            }
        }
    }

    fn load_cubemap(&mut self, faces: &[String; 6]) -> TextureId {
        let mut pixels = Vec::new();
        let mut face_size = None;
        for path in faces {
            let img = match image::open(path) {
                Ok(img) => img.to_rgba8(),
                Err(err) => {
                    error!("failed to load cubemap face {path}: {err}");
                    return self.placeholder_cube;
                }
            };
            let size = img.dimensions();
            if *face_size.get_or_insert(size) != size {
                error!("cubemap face {path} has mismatched size");
                return self.placeholder_cube;
            }
            pixels.extend_from_slice(&img);
        }
        let (width, height) = face_size.unwrap_or((1, 1));
        self.upload_rgba(&pixels, width, height, 6, "night-cubemap")
    }

    fn begin_frame(&mut self) {
        self.draws.clear();
    }

    fn use_program(&mut self, program: ProgramId) {
        self.current_program = Some(program);
    }

    fn set_mat4(&mut self, location: UniformLocation, value: Mat4) {
        let columns = value.to_cols_array();
        self.write_uniform(location, bytemuck::cast_slice(&columns));
    }

    fn set_vec3(&mut self, location: UniformLocation, value: Vec3) {
        let parts = value.to_array();
        self.write_uniform(location, bytemuck::cast_slice(&parts));
    }

    fn set_f32(&mut self, location: UniformLocation, value: f32) {
        self.write_uniform(location, bytemuck::bytes_of(&value));
    }

    fn set_i32(&mut self, location: UniformLocation, value: i32) {
        self.write_uniform(location, bytemuck::bytes_of(&value));
    }

    fn bind_texture(&mut self, _unit: u32, texture: TextureId) {
        self.bound_texture = Some(texture);
    }

    fn bind_cubemap(&mut self, _unit: u32, texture: TextureId) {
        self.bound_cubemap = Some(texture);
    }

    fn set_blend(&mut self, mode: BlendMode) {
        self.blend = mode;
    }

    fn set_depth_compare(&mut self, compare: DepthCompare) {
        self.depth_compare = compare;
    }

    fn draw(&mut self, mesh: MeshId) {
        let Some(program_id) = self.current_program else {
            return;
        };
        let program = &self.programs[program_id.0];

        // Snapshot of the program's uniform state at draw time; each draw
        // gets its own buffer since the pass replays later.
        let buffer = self
            .device
            .create_buffer_init(&wgpu::util::BufferInitDescriptor {
                label: Some("draw-uniform"),
                contents: &program.staging,
                usage: wgpu::BufferUsages::UNIFORM,
            });

        let mut entries = vec![wgpu::BindGroupEntry {
            binding: 0,
            resource: buffer.as_entire_binding(),
        }];
        let view = match program.kind {
            ProgramKind::Lights => None,
            ProgramKind::Main => {
                Some(&self.textures[self.bound_texture.unwrap_or(self.placeholder_2d).0])
            }
            ProgramKind::Exterior | ProgramKind::Skybox => {
                Some(&self.textures[self.bound_cubemap.unwrap_or(self.placeholder_cube).0])
            }
        };
        if let Some(view) = view {
            entries.push(wgpu::BindGroupEntry {
                binding: 1,
                resource: wgpu::BindingResource::TextureView(view),
            });
            entries.push(wgpu::BindGroupEntry {
                binding: 2,
                resource: wgpu::BindingResource::Sampler(&self.sampler),
            });
        }
        let bind_group = self.device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("draw-bind-group"),
            layout: self.bind_layout(program.kind),
            entries: &entries,
        });

        self.draws.push(RecordedDraw {
            program: program_id,
            blend: self.blend,
            depth: self.depth_compare,
            bind_group,
            mesh,
        });
    }

    fn end_frame(&mut self) -> Result<()> {
        let output = match self.surface.get_current_texture() {
            Ok(output) => output,
            Err(wgpu::SurfaceError::Lost) | Err(wgpu::SurfaceError::Outdated) => {
                self.surface.configure(&self.device, &self.config);
                self.draws.clear();
                return Ok(());
            }
            Err(wgpu::SurfaceError::Timeout) => {
                info!("surface timeout; retrying next frame");
                self.draws.clear();
                return Ok(());
            }
            Err(err) => {
                self.draws.clear();
                return Err(anyhow!("failed to acquire frame: {err}"));
            }
        };
        let view = output
            .texture
            .create_view(&wgpu::TextureViewDescriptor::default());
        let mut encoder = self
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("frame-encoder"),
            });

        let mut pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
            label: Some("frame-pass"),
            color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                view: &view,
                depth_slice: None,
                resolve_target: None,
                ops: wgpu::Operations {
                    load: wgpu::LoadOp::Clear(wgpu::Color {
                        r: 0.1,
                        g: 0.1,
                        b: 0.1,
                        a: 0.0,
                    }),
                    store: wgpu::StoreOp::Store,
                },
            })],
            depth_stencil_attachment: Some(wgpu::RenderPassDepthStencilAttachment {
                view: &self.depth.view,
                depth_ops: Some(wgpu::Operations {
                    load: wgpu::LoadOp::Clear(1.0),
                    store: wgpu::StoreOp::Store,
                }),
                stencil_ops: None,
            }),
            timestamp_writes: None,
            occlusion_query_set: None,
        });

        for draw in &self.draws {
            let program = &self.programs[draw.program.0];
            pass.set_pipeline(&program.pipelines[&(draw.blend, draw.depth)]);
            if draw.blend == BlendMode::ScreenFilter {
                pass.set_blend_constant(wgpu::Color::WHITE);
            }
            pass.set_bind_group(0, &draw.bind_group, &[]);
            let mesh = &self.meshes[draw.mesh.0];
            pass.set_vertex_buffer(0, mesh.vertex.slice(..));
            pass.set_index_buffer(mesh.index.slice(..), wgpu::IndexFormat::Uint32);
            pass.draw_indexed(0..mesh.index_count, 0, 0..1);
        }

        drop(pass); // explicit to satisfy lifetimes on some backends
        self.queue.submit(std::iter::once(encoder.finish()));
        output.present();
        self.draws.clear();
        Ok(())
    }
}

struct RecordedDraw {
    program: ProgramId,
    blend: BlendMode,
    depth: DepthCompare,
    bind_group: wgpu::BindGroup,
    mesh: MeshId,
}

struct Program {
    kind: ProgramKind,
    staging: Vec<u8>,
    pipelines: HashMap<(BlendMode, DepthCompare), wgpu::RenderPipeline>,
}

fn blend_state(mode: BlendMode) -> wgpu::BlendState {
    match mode {
        BlendMode::Opaque => wgpu::BlendState::REPLACE,
        // Source scaled by the (white) blend constant, destination by the
        // source color: the screen tints what is already behind it.
        BlendMode::ScreenFilter => wgpu::BlendState {
            color: wgpu::BlendComponent {
                src_factor: wgpu::BlendFactor::Constant,
                dst_factor: wgpu::BlendFactor::Src,
                operation: wgpu::BlendOperation::Add,
            },
            alpha: wgpu::BlendComponent {
                src_factor: wgpu::BlendFactor::One,
                dst_factor: wgpu::BlendFactor::Zero,
                operation: wgpu::BlendOperation::Add,
            },
        },
        BlendMode::AlphaOver => wgpu::BlendState::ALPHA_BLENDING,
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ProgramKind {
    Main,
    Lights,
    Exterior,
    Skybox,
}

const POINT_BASE: usize = 208;
const POINT_STRIDE: usize = 80;
const DIR_BASE: usize = 368;
const SPOT_BASE: usize = 432;
const SPOT_STRIDE: usize = 112;
const MATERIAL_BASE: usize = 992;
const MAIN_UNIFORM_SIZE: usize = 1008;

impl ProgramKind {
    fn from_name(name: &str) -> Option<Self> {
        match name {
            "main" => Some(Self::Main),
            "lights" => Some(Self::Lights),
            "exterior" => Some(Self::Exterior),
            "skybox" => Some(Self::Skybox),
            _ => None,
        }
    }

    fn uniform_size(self) -> usize {
        match self {
            Self::Main => MAIN_UNIFORM_SIZE,
            Self::Lights | Self::Exterior => 208,
            Self::Skybox => 128,
        }
    }

    /// Byte offset of a named uniform inside the program's buffer, laid out
    /// to match the WGSL struct declarations. Samplers have no buffer slot
    /// and resolve as unresolved; binding happens through the texture calls.
    fn uniform_offset(self, name: &str) -> Option<usize> {
        match self {
            Self::Main => main_uniform_offset(name),
            Self::Lights => match name {
                "model_matrix" => Some(0),
                "view_matrix" => Some(64),
                "projection_matrix" => Some(128),
                "bulb_color" => Some(192),
                _ => None,
            },
            Self::Exterior => match name {
                "model_matrix" => Some(0),
                "view_matrix" => Some(64),
                "projection_matrix" => Some(128),
                "eye_pos" => Some(192),
                _ => None,
            },
            Self::Skybox => match name {
                "view_matrix" => Some(0),
                "projection_matrix" => Some(64),
                _ => None,
            },
        }
    }

    fn shader_source(self) -> &'static str {
        match self {
            Self::Main => MAIN_SHADER,
            Self::Lights => LIGHTS_SHADER,
            Self::Exterior => EXTERIOR_SHADER,
            Self::Skybox => SKYBOX_SHADER,
        }
    }
}

fn main_uniform_offset(name: &str) -> Option<usize> {
    match name {
        "model_matrix" => return Some(0),
        "view_matrix" => return Some(64),
        "projection_matrix" => return Some(128),
        "eye_pos" => return Some(192),
        "material.shininess" => return Some(MATERIAL_BASE),
        _ => {}
    }
    if let Some(field) = name.strip_prefix("dir_light.") {
        let offset = match field {
            "direction" => 0,
            "ambient" => 16,
            "diffuse" => 32,
            "specular" => 48,
            _ => return None,
        };
        return Some(DIR_BASE + offset);
    }
    if let Some((index, field)) = parse_indexed(name, "point_lights") {
        if index >= 2 {
            return None;
        }
        let offset = match field {
            "position" => 0,
            "ambient" => 16,
            "diffuse" => 32,
            "specular" => 48,
            "constant" => 64,
            "linear" => 68,
            "quadratic" => 72,
            _ => return None,
        };
        return Some(POINT_BASE + index * POINT_STRIDE + offset);
    }
    if let Some((index, field)) = parse_indexed(name, "spot_lights") {
        if index >= 5 {
            return None;
        }
        let offset = match field {
            "position" => 0,
            "direction" => 16,
            "ambient" => 32,
            "diffuse" => 48,
            "specular" => 64,
            "cut_off" => 80,
            "outer_cut_off" => 84,
            "constant" => 96,
            "linear" => 100,
            "quadratic" => 104,
            _ => return None,
        };
        return Some(SPOT_BASE + index * SPOT_STRIDE + offset);
    }
    None
}

fn parse_indexed<'a>(name: &'a str, array: &str) -> Option<(usize, &'a str)> {
    let rest = name.strip_prefix(array)?.strip_prefix('[')?;
    let (index, field) = rest.split_once("].")?;
    Some((index.parse().ok()?, field))
}

struct MeshBuffers {
    vertex: wgpu::Buffer,
    index: wgpu::Buffer,
    index_count: u32,
}

impl MeshBuffers {
    fn from_data(device: &wgpu::Device, data: &MeshData) -> Self {
        let vertex = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some(&format!("{}-vertices", data.name)),
            contents: bytemuck::cast_slice(&data.vertices),
            usage: wgpu::BufferUsages::VERTEX,
        });
        let index = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some(&format!("{}-indices", data.name)),
            contents: bytemuck::cast_slice(&data.indices),
            usage: wgpu::BufferUsages::INDEX,
        });
        Self {
            vertex,
            index,
            index_count: data.indices.len() as u32,
        }
    }
}

struct DepthBuffer {
    _texture: wgpu::Texture,
    view: wgpu::TextureView,
}

impl DepthBuffer {
    const FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Depth24Plus;

    fn create(device: &wgpu::Device, width: u32, height: u32) -> Self {
        let texture = device.create_texture(&wgpu::TextureDescriptor {
            label: Some("depth-texture"),
            size: wgpu::Extent3d {
                width: width.max(1),
                height: height.max(1),
                depth_or_array_layers: 1,
            },
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: Self::FORMAT,
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
            view_formats: &[],
        });
        let view = texture.create_view(&wgpu::TextureViewDescriptor::default());
        Self {
            _texture: texture,
            view,
        }
    }
}

const MAIN_SHADER: &str = r#"
struct PointLight {
    position: vec3<f32>,
    ambient: vec3<f32>,
    diffuse: vec3<f32>,
    specular: vec3<f32>,
    attenuation: vec3<f32>,
}

struct SpotLight {
    position: vec3<f32>,
    direction: vec3<f32>,
    ambient: vec3<f32>,
    diffuse: vec3<f32>,
    specular: vec3<f32>,
    cone: vec2<f32>,
    attenuation: vec3<f32>,
}

struct DirLight {
    direction: vec3<f32>,
    ambient: vec3<f32>,
    diffuse: vec3<f32>,
    specular: vec3<f32>,
}

struct SceneUniform {
    model: mat4x4<f32>,
    view: mat4x4<f32>,
    projection: mat4x4<f32>,
    eye_pos: vec3<f32>,
    point_lights: array<PointLight, 2>,
    dir_light: DirLight,
    spot_lights: array<SpotLight, 5>,
    material: vec4<f32>,
}

@group(0) @binding(0)
var<uniform> scene: SceneUniform;

@group(0) @binding(1)
var diffuse_texture: texture_2d<f32>;

@group(0) @binding(2)
var diffuse_sampler: sampler;

struct VertexInput {
    @location(0) position: vec3<f32>,
    @location(1) normal: vec3<f32>,
    @location(2) uv: vec2<f32>,
}

struct VertexOutput {
    @builtin(position) clip: vec4<f32>,
    @location(0) world_pos: vec3<f32>,
    @location(1) normal: vec3<f32>,
    @location(2) uv: vec2<f32>,
}

@vertex
fn vs_main(input: VertexInput) -> VertexOutput {
    var out: VertexOutput;
    let world = scene.model * vec4<f32>(input.position, 1.0);
    out.clip = scene.projection * scene.view * world;
    out.world_pos = world.xyz;
    out.normal = normalize((scene.model * vec4<f32>(input.normal, 0.0)).xyz);
    out.uv = input.uv;
    return out;
}

fn falloff(coeffs: vec3<f32>, distance: f32) -> f32 {
    return 1.0 / (coeffs.x + coeffs.y * distance + coeffs.z * distance * distance);
}

@fragment
fn fs_main(input: VertexOutput) -> @location(0) vec4<f32> {
    let albedo = textureSample(diffuse_texture, diffuse_sampler, input.uv);
    let normal = normalize(input.normal);
    let view_dir = normalize(scene.eye_pos - input.world_pos);
    var lit = vec3<f32>(0.0);

    for (var i = 0; i < 2; i++) {
        let light = scene.point_lights[i];
        let to_light = light.position - input.world_pos;
        let light_dir = normalize(to_light);
        let diffuse = max(dot(normal, light_dir), 0.0);
        let reflected = reflect(-light_dir, normal);
        let specular = pow(max(dot(view_dir, reflected), 0.0), scene.material.x);
        lit += falloff(light.attenuation, length(to_light))
            * (light.ambient + light.diffuse * diffuse + light.specular * specular);
    }

    let sun_dir = normalize(-scene.dir_light.direction);
    let sun_diffuse = max(dot(normal, sun_dir), 0.0);
    let sun_reflected = reflect(-sun_dir, normal);
    let sun_specular = pow(max(dot(view_dir, sun_reflected), 0.0), scene.material.x);
    lit += scene.dir_light.ambient
        + scene.dir_light.diffuse * sun_diffuse
        + scene.dir_light.specular * sun_specular;

    for (var i = 0; i < 5; i++) {
        let light = scene.spot_lights[i];
        let to_light = light.position - input.world_pos;
        let light_dir = normalize(to_light);
        let theta = dot(light_dir, normalize(-light.direction));
        let cone = clamp((theta - light.cone.y) / (light.cone.x - light.cone.y), 0.0, 1.0);
        let diffuse = max(dot(normal, light_dir), 0.0);
        let reflected = reflect(-light_dir, normal);
        let specular = pow(max(dot(view_dir, reflected), 0.0), scene.material.x);
        lit += falloff(light.attenuation, length(to_light))
            * (light.ambient + cone * (light.diffuse * diffuse + light.specular * specular));
    }

    return vec4<f32>(lit * albedo.rgb, albedo.a);
}
"#;

const LIGHTS_SHADER: &str = r#"
struct BulbUniform {
    model: mat4x4<f32>,
    view: mat4x4<f32>,
    projection: mat4x4<f32>,
    bulb_color: vec3<f32>,
}

@group(0) @binding(0)
var<uniform> bulb: BulbUniform;

@vertex
fn vs_main(@location(0) position: vec3<f32>) -> @builtin(position) vec4<f32> {
    return bulb.projection * bulb.view * bulb.model * vec4<f32>(position, 1.0);
}

@fragment
fn fs_main() -> @location(0) vec4<f32> {
    return vec4<f32>(bulb.bulb_color, 1.0);
}
"#;

const EXTERIOR_SHADER: &str = r#"
struct ExteriorUniform {
    model: mat4x4<f32>,
    view: mat4x4<f32>,
    projection: mat4x4<f32>,
    eye_pos: vec3<f32>,
}

@group(0) @binding(0)
var<uniform> exterior: ExteriorUniform;

@group(0) @binding(1)
var sky_texture: texture_cube<f32>;

@group(0) @binding(2)
var sky_sampler: sampler;

struct VertexOutput {
    @builtin(position) clip: vec4<f32>,
    @location(0) world_pos: vec3<f32>,
    @location(1) normal: vec3<f32>,
}

@vertex
fn vs_main(
    @location(0) position: vec3<f32>,
    @location(1) normal: vec3<f32>,
) -> VertexOutput {
    var out: VertexOutput;
    let world = exterior.model * vec4<f32>(position, 1.0);
    out.clip = exterior.projection * exterior.view * world;
    out.world_pos = world.xyz;
    out.normal = normalize((exterior.model * vec4<f32>(normal, 0.0)).xyz);
    return out;
}

@fragment
fn fs_main(input: VertexOutput) -> @location(0) vec4<f32> {
    let incident = normalize(input.world_pos - exterior.eye_pos);
    let mirrored = reflect(incident, normalize(input.normal));
    return vec4<f32>(textureSample(sky_texture, sky_sampler, mirrored).rgb, 1.0);
}
"#;

const SKYBOX_SHADER: &str = r#"
struct SkyUniform {
    view: mat4x4<f32>,
    projection: mat4x4<f32>,
}

@group(0) @binding(0)
var<uniform> sky: SkyUniform;

@group(0) @binding(1)
var sky_texture: texture_cube<f32>;

@group(0) @binding(2)
var sky_sampler: sampler;

struct VertexOutput {
    @builtin(position) clip: vec4<f32>,
    @location(0) direction: vec3<f32>,
}

@vertex
fn vs_main(@location(0) position: vec3<f32>) -> VertexOutput {
    var out: VertexOutput;
    let clip = sky.projection * sky.view * vec4<f32>(position, 1.0);
    // Forces depth to the far plane; the pass runs with less-or-equal.
    out.clip = clip.xyww;
    out.direction = position;
    return out;
}

@fragment
fn fs_main(input: VertexOutput) -> @location(0) vec4<f32> {
    return vec4<f32>(textureSample(sky_texture, sky_sampler, normalize(input.direction)).rgb, 1.0);
}
"#;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn main_layout_matches_the_wgsl_struct() {
        assert_eq!(main_uniform_offset("model_matrix"), Some(0));
        assert_eq!(main_uniform_offset("eye_pos"), Some(192));
        assert_eq!(main_uniform_offset("point_lights[0].position"), Some(208));
        assert_eq!(main_uniform_offset("point_lights[1].quadratic"), Some(360));
        assert_eq!(main_uniform_offset("dir_light.specular"), Some(416));
        assert_eq!(main_uniform_offset("spot_lights[0].position"), Some(432));
        assert_eq!(
            main_uniform_offset("spot_lights[4].outer_cut_off"),
            Some(432 + 4 * 112 + 84)
        );
        assert_eq!(main_uniform_offset("material.shininess"), Some(992));
        assert!(MAIN_UNIFORM_SIZE >= 432 + 5 * 112 + 16);
    }

    #[test]
    fn samplers_have_no_buffer_slot() {
        assert_eq!(main_uniform_offset("material.diffuse"), None);
        assert_eq!(ProgramKind::Skybox.uniform_offset("skybox"), None);
        assert_eq!(ProgramKind::Exterior.uniform_offset("skybox"), None);
    }

    #[test]
    fn program_names_resolve() {
        assert_eq!(ProgramKind::from_name("main"), Some(ProgramKind::Main));
        assert_eq!(ProgramKind::from_name("skybox"), Some(ProgramKind::Skybox));
        assert_eq!(ProgramKind::from_name("bogus"), None);
    }

    #[test]
    fn indexed_names_parse() {
        assert_eq!(
            parse_indexed("spot_lights[3].cut_off", "spot_lights"),
            Some((3, "cut_off"))
        );
        assert_eq!(parse_indexed("spot_lights[3]", "spot_lights"), None);
        assert_eq!(parse_indexed("eye_pos", "spot_lights"), None);
    }
}
