use std::collections::{HashMap, HashSet};
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{anyhow, Context, Result};
use bytemuck::bytes_of;
use glam::Mat4;
use log::error;
use wgpu::util::DeviceExt;
use winit::dpi::PhysicalSize;
use winit::window::{Window, WindowId};

use crate::lights::LightRig;
use crate::obj::{self, MeshData, Vertex};
use crate::render::shader::SHADER;
use crate::render::uniforms::{CameraParams, GlobalUniform, InstanceRaw, ObjectUniform};
use crate::scene::{ObjectKind, Scene, SceneObject};

/// GPU renderer backed by wgpu that draws the scene description.
pub struct Renderer {
    window: Arc<Window>,
    surface: wgpu::Surface<'static>,
    device: wgpu::Device,
    queue: wgpu::Queue,
    config: wgpu::SurfaceConfiguration,
    size: PhysicalSize<u32>,
    depth: DepthBuffer,
    pipelines: Pipelines,
    global_buffer: wgpu::Buffer,
    global_bind_group: wgpu::BindGroup,
    object_layout: wgpu::BindGroupLayout,
    mesh_cache: HashMap<String, GpuMesh>,
    missing_meshes: HashSet<String>,
    instance_buffers: HashMap<String, InstanceBuffer>,
    asset_root: PathBuf,
    fallback_mesh: GpuMesh,
}

impl Renderer {
    /// Initializes the GPU renderer for the provided window. Meshes load
    /// lazily from `asset_root`.
    pub async fn new(window: Arc<Window>, asset_root: PathBuf) -> Result<Self> {
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

        let shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("renderer-shader"),
            source: wgpu::ShaderSource::Wgsl(SHADER.into()),
        });

        let global_layout = uniform_layout::<GlobalUniform>(&device, "global-bind-layout");
        let object_layout = uniform_layout::<ObjectUniform>(&device, "object-bind-layout");

        let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("renderer-pipeline-layout"),
            bind_group_layouts: &[&global_layout, &object_layout],
            push_constant_ranges: &[],
        });

        let global_buffer = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("global-uniform"),
            size: std::mem::size_of::<GlobalUniform>() as u64,
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });
        let global_bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("global-bind-group"),
            layout: &global_layout,
            entries: &[wgpu::BindGroupEntry {
                binding: 0,
                resource: global_buffer.as_entire_binding(),
            }],
        });

        let pipelines = Pipelines::create(&device, &pipeline_layout, &shader, surface_format);
        let fallback_mesh = GpuMesh::upload(&device, &obj::fallback_cube(), "fallback-cube");

        Ok(Self {
            window,
            surface,
            device,
            queue,
            config,
            size,
            depth,
            pipelines,
            global_buffer,
            global_bind_group,
            object_layout,
            mesh_cache: HashMap::new(),
            missing_meshes: HashSet::new(),
            instance_buffers: HashMap::new(),
            asset_root,
            fallback_mesh,
        })
    }

    /// Returns the identifier of the window owned by the renderer.
    pub fn window_id(&self) -> WindowId {
        self.window.id()
    }

    /// Exposes the inner window for event handling.
    pub fn window(&self) -> &Window {
        &self.window
    }

    pub fn aspect(&self) -> f32 {
        if self.size.height == 0 {
            1.0
        } else {
            self.size.width as f32 / self.size.height as f32
        }
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

    /// Uploads the camera and light uniforms before rendering.
    pub fn update_globals(&self, camera: &CameraParams, lights: &LightRig) {
        let uniform = GlobalUniform::new(camera, lights);
        self.queue
            .write_buffer(&self.global_buffer, 0, bytes_of(&uniform));
    }

    /// Draws one frame of the scene: instanced foliage first, then opaque
    /// surfaces, then emitter meshes at every light position, then glass.
    pub fn render(&mut self, scene: &Scene) -> Result<(), wgpu::SurfaceError> {
        let output = self.surface.get_current_texture()?;
        let view = output
            .texture
            .create_view(&wgpu::TextureViewDescriptor::default());

        for object in &scene.objects {
            if let Some(name) = object.mesh.as_deref() {
                self.ensure_mesh_loaded(name);
            }
            self.ensure_instances(object);
        }
        let commands = self.build_draw_list(scene);

        let mut encoder = self
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("renderer-encoder"),
            });
        let mut pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
            label: Some("scene-pass"),
            color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                view: &view,
                depth_slice: None,
                resolve_target: None,
                ops: wgpu::Operations {
                    load: wgpu::LoadOp::Clear(wgpu::Color::BLACK),
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

        pass.set_bind_group(0, &self.global_bind_group, &[]);

        for command in &commands {
            let mesh = match command.mesh.as_deref() {
                Some(name) => self.mesh_cache.get(name).unwrap_or(&self.fallback_mesh),
                None => &self.fallback_mesh,
            };
            pass.set_pipeline(self.pipelines.select(command.pipeline));
            pass.set_bind_group(1, &command.bind_group, &[]);
            pass.set_vertex_buffer(0, mesh.vertex.slice(..));
            pass.set_index_buffer(mesh.index.slice(..), wgpu::IndexFormat::Uint32);

            let instances = match command.instance_key.as_deref() {
                Some(key) => match self.instance_buffers.get(key) {
                    Some(buffer) => {
                        pass.set_vertex_buffer(1, buffer.buffer.slice(..));
                        buffer.count
                    }
                    None => continue,
                },
                None => 1,
            };
            pass.draw_indexed(0..mesh.index_count, 0, 0..instances);
        }

        drop(pass); // explicit to satisfy lifetimes on some backends
        self.queue.submit(std::iter::once(encoder.finish()));
        output.present();
        Ok(())
    }

    fn build_draw_list(&self, scene: &Scene) -> Vec<DrawCommand> {
        let mut commands = Vec::new();

        for object in objects_of_kind(scene, ObjectKind::Foliage) {
            commands.push(DrawCommand {
                pipeline: PipelineKind::Foliage,
                mesh: object.mesh.clone(),
                instance_key: Some(object.name.clone()),
                bind_group: self.object_bind_group(object, object.model_matrix(), false),
            });
        }
        for object in objects_of_kind(scene, ObjectKind::Surface) {
            commands.push(DrawCommand {
                pipeline: PipelineKind::Opaque,
                mesh: object.mesh.clone(),
                instance_key: None,
                bind_group: self.object_bind_group(object, object.model_matrix(), false),
            });
        }
        for object in objects_of_kind(scene, ObjectKind::Emitter) {
            for position in scene.lights.emitter_positions() {
                let model = Mat4::from_translation(position) * Mat4::from_scale(object.scale);
                commands.push(DrawCommand {
                    pipeline: PipelineKind::Emissive,
                    mesh: object.mesh.clone(),
                    instance_key: None,
                    bind_group: self.object_bind_group(object, model, true),
                });
            }
        }
        // Glass draws last so opaque geometry shows through the blend.
        for object in objects_of_kind(scene, ObjectKind::Glass) {
            commands.push(DrawCommand {
                pipeline: PipelineKind::Glass,
                mesh: object.mesh.clone(),
                instance_key: None,
                bind_group: self.object_bind_group(object, object.model_matrix(), false),
            });
        }

        commands
    }

    fn object_bind_group(
        &self,
        object: &SceneObject,
        model: Mat4,
        emissive: bool,
    ) -> wgpu::BindGroup {
        let uniform = ObjectUniform::new(object, model, emissive);
        let buffer = self
            .device
            .create_buffer_init(&wgpu::util::BufferInitDescriptor {
                label: Some("object-uniform"),
                contents: bytes_of(&uniform),
                usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            });
        self.device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("object-bind-group"),
            layout: &self.object_layout,
            entries: &[wgpu::BindGroupEntry {
                binding: 0,
                resource: buffer.as_entire_binding(),
            }],
        })
    }

    fn ensure_mesh_loaded(&mut self, name: &str) {
        if self.mesh_cache.contains_key(name) || self.missing_meshes.contains(name) {
            return;
        }
        match obj::load_obj_file(&self.asset_root.join(name)) {
            Ok(mesh) => {
                self.mesh_cache
                    .insert(name.to_string(), GpuMesh::upload(&self.device, &mesh, name));
            }
            Err(err) => {
                error!("failed to load mesh {name}: {err:?}");
                self.missing_meshes.insert(name.to_string());
            }
        }
    }

    fn ensure_instances(&mut self, object: &SceneObject) {
        let Some(grid) = object.grid.as_ref() else {
            return;
        };
        if object.kind != ObjectKind::Foliage || self.instance_buffers.contains_key(&object.name) {
            return;
        }
        let raw: Vec<InstanceRaw> = grid.transforms().into_iter().map(Into::into).collect();
        let buffer = self
            .device
            .create_buffer_init(&wgpu::util::BufferInitDescriptor {
                label: Some(&format!("{}-instances", object.name)),
                contents: bytemuck::cast_slice(&raw),
                usage: wgpu::BufferUsages::VERTEX,
            });
        self.instance_buffers.insert(
            object.name.clone(),
            InstanceBuffer {
                buffer,
                count: raw.len() as u32,
            },
        );
    }
}

fn objects_of_kind<'a>(
    scene: &'a Scene,
    kind: ObjectKind,
) -> impl Iterator<Item = &'a SceneObject> + 'a {
    scene
        .objects
        .iter()
        .filter(move |object| object.kind == kind)
}

struct DrawCommand {
    pipeline: PipelineKind,
    mesh: Option<String>,
    instance_key: Option<String>,
    bind_group: wgpu::BindGroup,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum PipelineKind {
    Opaque,
    Foliage,
    Emissive,
    Glass,
}

struct Pipelines {
    opaque: wgpu::RenderPipeline,
    foliage: wgpu::RenderPipeline,
    emissive: wgpu::RenderPipeline,
    glass: wgpu::RenderPipeline,
}

impl Pipelines {
    fn create(
        device: &wgpu::Device,
        layout: &wgpu::PipelineLayout,
        shader: &wgpu::ShaderModule,
        format: wgpu::TextureFormat,
    ) -> Self {
        let build = |label: &str, desc: PipelineDesc| {
            let mut buffers = vec![vertex_layout()];
            if desc.instanced {
                buffers.push(instance_layout());
            }
            device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
                label: Some(label),
                layout: Some(layout),
                vertex: wgpu::VertexState {
                    module: shader,
                    entry_point: Some(desc.vs_entry),
                    compilation_options: Default::default(),
                    buffers: &buffers,
                },
                primitive: wgpu::PrimitiveState {
                    topology: wgpu::PrimitiveTopology::TriangleList,
                    front_face: wgpu::FrontFace::Ccw,
                    cull_mode: desc.cull_mode,
                    polygon_mode: wgpu::PolygonMode::Fill,
                    ..Default::default()
                },
                depth_stencil: Some(wgpu::DepthStencilState {
                    format: DepthBuffer::FORMAT,
                    depth_write_enabled: desc.depth_write,
                    depth_compare: wgpu::CompareFunction::Less,
                    stencil: Default::default(),
                    bias: Default::default(),
                }),
                multisample: wgpu::MultisampleState::default(),
                fragment: Some(wgpu::FragmentState {
                    module: shader,
                    entry_point: Some(desc.fs_entry),
                    compilation_options: Default::default(),
                    targets: &[Some(wgpu::ColorTargetState {
                        format,
                        blend: Some(desc.blend),
                        write_mask: wgpu::ColorWrites::ALL,
                    })],
                }),
                multiview: None,
                cache: None,
            })
        };

        // The plant and room models do not cull well, so only the emissive
        // balls get back-face culling.
        Self {
            opaque: build("opaque-pipeline", PipelineDesc::lit("vs_mesh")),
            foliage: build(
                "foliage-pipeline",
                PipelineDesc {
                    instanced: true,
                    ..PipelineDesc::lit("vs_foliage")
                },
            ),
            emissive: build(
                "emissive-pipeline",
                PipelineDesc {
                    fs_entry: "fs_emissive",
                    cull_mode: Some(wgpu::Face::Back),
                    ..PipelineDesc::lit("vs_mesh")
                },
            ),
            glass: build(
                "glass-pipeline",
                PipelineDesc {
                    blend: wgpu::BlendState::ALPHA_BLENDING,
                    depth_write: false,
                    ..PipelineDesc::lit("vs_mesh")
                },
            ),
        }
    }

    fn select(&self, kind: PipelineKind) -> &wgpu::RenderPipeline {
        match kind {
            PipelineKind::Opaque => &self.opaque,
            PipelineKind::Foliage => &self.foliage,
            PipelineKind::Emissive => &self.emissive,
            PipelineKind::Glass => &self.glass,
        }
    }
}

struct PipelineDesc {
    vs_entry: &'static str,
    fs_entry: &'static str,
    blend: wgpu::BlendState,
    depth_write: bool,
    cull_mode: Option<wgpu::Face>,
    instanced: bool,
}

impl PipelineDesc {
    fn lit(vs_entry: &'static str) -> Self {
        Self {
            vs_entry,
            fs_entry: "fs_lit",
            blend: wgpu::BlendState::REPLACE,
            depth_write: true,
            cull_mode: None,
            instanced: false,
        }
    }
}

fn vertex_layout() -> wgpu::VertexBufferLayout<'static> {
    const ATTRIBUTES: [wgpu::VertexAttribute; 2] =
        wgpu::vertex_attr_array![0 => Float32x3, 1 => Float32x3];
    wgpu::VertexBufferLayout {
        array_stride: std::mem::size_of::<Vertex>() as u64,
        step_mode: wgpu::VertexStepMode::Vertex,
        attributes: &ATTRIBUTES,
    }
}

fn instance_layout() -> wgpu::VertexBufferLayout<'static> {
    const ATTRIBUTES: [wgpu::VertexAttribute; 4] =
        wgpu::vertex_attr_array![2 => Float32x4, 3 => Float32x4, 4 => Float32x4, 5 => Float32x4];
    wgpu::VertexBufferLayout {
        array_stride: std::mem::size_of::<InstanceRaw>() as u64,
        step_mode: wgpu::VertexStepMode::Instance,
        attributes: &ATTRIBUTES,
    }
}

fn uniform_layout<T>(device: &wgpu::Device, label: &str) -> wgpu::BindGroupLayout {
    device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
        label: Some(label),
        entries: &[wgpu::BindGroupLayoutEntry {
            binding: 0,
            visibility: wgpu::ShaderStages::VERTEX_FRAGMENT,
            ty: wgpu::BindingType::Buffer {
                ty: wgpu::BufferBindingType::Uniform,
                has_dynamic_offset: false,
                min_binding_size: Some(
                    std::num::NonZeroU64::new(std::mem::size_of::<T>() as u64)
                        .expect("uniform structs are non-empty"),
                ),
            },
            count: None,
        }],
    })
}

struct GpuMesh {
    vertex: wgpu::Buffer,
    index: wgpu::Buffer,
    index_count: u32,
}

impl GpuMesh {
    fn upload(device: &wgpu::Device, mesh: &MeshData, label: &str) -> Self {
        let vertex = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some(&format!("{label}-vertices")),
            contents: bytemuck::cast_slice(&mesh.vertices),
            usage: wgpu::BufferUsages::VERTEX,
        });
        let index = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some(&format!("{label}-indices")),
            contents: bytemuck::cast_slice(&mesh.indices),
            usage: wgpu::BufferUsages::INDEX,
        });
        Self {
            vertex,
            index,
            index_count: mesh.indices.len() as u32,
        }
    }
}

struct InstanceBuffer {
    buffer: wgpu::Buffer,
    count: u32,
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
