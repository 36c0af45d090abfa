use std::borrow::Cow;
use std::collections::BTreeMap;
use std::sync::Arc;

use wgpu::naga::ShaderStage as NagaStage;
use wgpu::util::DeviceExt;
use winit::window::Window;

use super::context::{GpuContext, MultisampleTarget};
use super::layout::{encode, UniformBlockLayout};
use crate::backend::{
    GraphicsBackend, MountError, ProgramError, ProgramId, ProgramSource, ShaderStage,
};
use crate::program::{normalize_fragment, QUAD_VERTICES};
use crate::types::{ContextOptions, PixelSize};
use crate::uniforms::{UniformKind, UniformValue};

/// Location of a uniform inside one program's block.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WgpuUniform {
    program: ProgramId,
    offset: usize,
    kind: UniformKind,
}

struct GpuProgram {
    pipeline: wgpu::RenderPipeline,
    layout: UniformBlockLayout,
    referenced: Vec<String>,
    buffer: wgpu::Buffer,
    bind_group: wgpu::BindGroup,
    shadow: Vec<u8>,
    dirty: bool,
}

/// [`GraphicsBackend`] on top of a wgpu surface.
///
/// Uniform writes land in a CPU copy of the active program's block, which is
/// uploaded right before the program draws. `clear` only marks the next draw
/// as clearing; the draw itself records, submits and presents one frame.
pub struct WgpuBackend {
    context: GpuContext,
    uniform_layout: wgpu::BindGroupLayout,
    quad: wgpu::Buffer,
    programs: BTreeMap<ProgramId, GpuProgram>,
    next_program: u32,
    active: Option<ProgramId>,
    viewport: PixelSize,
    clear_pending: bool,
    multisample: Option<MultisampleTarget>,
}

impl WgpuBackend {
    pub fn new(window: Arc<Window>, options: &ContextOptions) -> Result<Self, MountError> {
        let context = GpuContext::new(window, options)
            .map_err(|err| MountError::UnsupportedContext(format!("{err:#}")))?;

        let uniform_layout =
            context
                .device
                .create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
                    label: Some("uniform layout"),
                    entries: &[wgpu::BindGroupLayoutEntry {
                        binding: 0,
                        visibility: wgpu::ShaderStages::VERTEX_FRAGMENT,
                        ty: wgpu::BindingType::Buffer {
                            ty: wgpu::BufferBindingType::Uniform,
                            has_dynamic_offset: false,
                            min_binding_size: None,
                        },
                        count: None,
                    }],
                });
        let quad = context
            .device
            .create_buffer_init(&wgpu::util::BufferInitDescriptor {
                label: Some("fullscreen quad"),
                contents: bytemuck::cast_slice(&QUAD_VERTICES),
                usage: wgpu::BufferUsages::VERTEX,
            });
        let multisample = (context.sample_count > 1).then(|| MultisampleTarget::new(&context));
        let viewport = context.size();

        Ok(Self {
            context,
            uniform_layout,
            quad,
            programs: BTreeMap::new(),
            next_program: 0,
            active: None,
            viewport,
            clear_pending: false,
            multisample,
        })
    }

    fn shader_module(
        &self,
        stage: ShaderStage,
        source: String,
    ) -> Result<wgpu::ShaderModule, ProgramError> {
        let naga_stage = match stage {
            ShaderStage::Vertex => NagaStage::Vertex,
            ShaderStage::Fragment => NagaStage::Fragment,
        };
        let device = &self.context.device;
        device.push_error_scope(wgpu::ErrorFilter::Validation);
        let module = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some(match stage {
                ShaderStage::Vertex => "mount vertex",
                ShaderStage::Fragment => "mount fragment",
            }),
            source: wgpu::ShaderSource::Glsl {
                shader: Cow::Owned(source),
                stage: naga_stage,
                defines: &[],
            },
        });
        match pollster::block_on(device.pop_error_scope()) {
            Some(err) => Err(ProgramError::Compile {
                stage,
                log: err.to_string(),
            }),
            None => Ok(module),
        }
    }

    fn create_pipeline(
        &self,
        vertex: &wgpu::ShaderModule,
        fragment: &wgpu::ShaderModule,
    ) -> Result<wgpu::RenderPipeline, ProgramError> {
        let device = &self.context.device;
        let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("mount pipeline layout"),
            bind_group_layouts: &[&self.uniform_layout],
            push_constant_ranges: &[],
        });

        device.push_error_scope(wgpu::ErrorFilter::Validation);
        let pipeline = device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
            label: Some("mount pipeline"),
            layout: Some(&pipeline_layout),
            vertex: wgpu::VertexState {
                module: vertex,
                entry_point: Some("main"),
                buffers: &[wgpu::VertexBufferLayout {
                    array_stride: (2 * std::mem::size_of::<f32>()) as wgpu::BufferAddress,
                    step_mode: wgpu::VertexStepMode::Vertex,
                    attributes: &wgpu::vertex_attr_array![0 => Float32x2],
                }],
                compilation_options: wgpu::PipelineCompilationOptions::default(),
            },
            primitive: wgpu::PrimitiveState {
                topology: wgpu::PrimitiveTopology::TriangleList,
                strip_index_format: None,
                front_face: wgpu::FrontFace::Ccw,
                cull_mode: None,
                polygon_mode: wgpu::PolygonMode::Fill,
                unclipped_depth: false,
                conservative: false,
            },
            depth_stencil: None,
            multisample: wgpu::MultisampleState {
                count: self.context.sample_count,
                mask: !0,
                alpha_to_coverage_enabled: false,
            },
            fragment: Some(wgpu::FragmentState {
                module: fragment,
                entry_point: Some("main"),
                targets: &[Some(wgpu::ColorTargetState {
                    format: self.context.config.format,
                    blend: Some(wgpu::BlendState::REPLACE),
                    write_mask: wgpu::ColorWrites::ALL,
                })],
                compilation_options: wgpu::PipelineCompilationOptions::default(),
            }),
            multiview: None,
            cache: None,
        });
        match pollster::block_on(device.pop_error_scope()) {
            Some(err) => Err(ProgramError::Link {
                log: err.to_string(),
            }),
            None => Ok(pipeline),
        }
    }

    fn clear_color(&self) -> wgpu::Color {
        if self.context.transparent {
            wgpu::Color::TRANSPARENT
        } else {
            wgpu::Color::BLACK
        }
    }
}

impl GraphicsBackend for WgpuBackend {
    type Uniform = WgpuUniform;

    fn compile_program(&mut self, source: &ProgramSource<'_>) -> Result<ProgramId, ProgramError> {
        let normalized = normalize_fragment(source.fragment, source.uniforms);
        let layout = UniformBlockLayout::new(source.uniforms);

        let vertex = self.shader_module(ShaderStage::Vertex, source.vertex.to_string())?;
        let fragment =
            self.shader_module(ShaderStage::Fragment, layout.wrap_fragment(&normalized.body))?;
        let pipeline = self.create_pipeline(&vertex, &fragment)?;

        let device = &self.context.device;
        let buffer = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("mount uniforms"),
            size: layout.size() as wgpu::BufferAddress,
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });
        let bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("mount uniforms"),
            layout: &self.uniform_layout,
            entries: &[wgpu::BindGroupEntry {
                binding: 0,
                resource: buffer.as_entire_binding(),
            }],
        });

        self.next_program += 1;
        let id = ProgramId::new(self.next_program);
        let shadow = vec![0; layout.size()];
        self.programs.insert(
            id,
            GpuProgram {
                pipeline,
                layout,
                referenced: normalized.referenced,
                buffer,
                bind_group,
                shadow,
                dirty: true,
            },
        );
        tracing::debug!(program = id.id(), "compiled wgpu program");
        Ok(id)
    }

    fn uniform_location(&self, program: ProgramId, name: &str) -> Option<Self::Uniform> {
        let compiled = self.programs.get(&program)?;
        if !compiled.referenced.iter().any(|referenced| referenced == name) {
            return None;
        }
        let slot = compiled.layout.slot(name)?;
        Some(WgpuUniform {
            program,
            offset: slot.offset,
            kind: slot.kind,
        })
    }

    fn use_program(&mut self, program: ProgramId) {
        if self.programs.contains_key(&program) {
            self.active = Some(program);
        }
    }

    fn write_uniform(&mut self, location: &Self::Uniform, value: &UniformValue) {
        if self.active != Some(location.program) {
            tracing::warn!(offset = location.offset, "uniform written to an inactive program");
            return;
        }
        let Some(program) = self.programs.get_mut(&location.program) else {
            return;
        };
        let Some(slot) = program
            .layout
            .slots()
            .iter()
            .find(|slot| slot.offset == location.offset)
        else {
            return;
        };
        if encode(&mut program.shadow, slot, value) {
            program.dirty = true;
        } else {
            tracing::warn!(
                uniform = %slot.name,
                expected = ?location.kind,
                got = ?value.kind(),
                "uniform value does not match its declaration; skipping"
            );
        }
    }

    fn backing_size(&self) -> PixelSize {
        self.context.size()
    }

    fn resize_backing(&mut self, size: PixelSize) {
        self.context.resize(size);
        if self.context.sample_count > 1 {
            self.multisample = Some(MultisampleTarget::new(&self.context));
        }
    }

    fn set_viewport(&mut self, size: PixelSize) {
        self.viewport = size;
    }

    fn clear(&mut self) {
        self.clear_pending = true;
    }

    fn draw_quad(&mut self, vertex_count: u32) {
        let clear_color = self.clear_color();
        let Some(program) = self.active.and_then(|id| self.programs.get_mut(&id)) else {
            tracing::warn!("draw requested without an active program");
            return;
        };
        if program.dirty {
            self.context
                .queue
                .write_buffer(&program.buffer, 0, &program.shadow);
            program.dirty = false;
        }

        let frame = match self.context.surface.get_current_texture() {
            Ok(frame) => frame,
            Err(wgpu::SurfaceError::Lost | wgpu::SurfaceError::Outdated) => {
                tracing::debug!("surface lost or outdated; reconfiguring");
                self.context.reconfigure();
                return;
            }
            Err(err) => {
                tracing::warn!(error = %err, "failed to acquire surface texture; skipping frame");
                return;
            }
        };
        let view = frame
            .texture
            .create_view(&wgpu::TextureViewDescriptor::default());

        let mut encoder =
            self.context
                .device
                .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                    label: Some("mount frame"),
                });
        {
            let (attachment, resolve_target) = match self.multisample.as_ref() {
                Some(msaa) => (&msaa.view, Some(&view)),
                None => (&view, None),
            };
            let load = if self.clear_pending || resolve_target.is_some() {
                wgpu::LoadOp::Clear(clear_color)
            } else {
                wgpu::LoadOp::Load
            };
            let mut render_pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("mount pass"),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view: attachment,
                    depth_slice: None,
                    resolve_target,
                    ops: wgpu::Operations {
                        load,
                        store: wgpu::StoreOp::Store,
                    },
                })],
                depth_stencil_attachment: None,
                occlusion_query_set: None,
                timestamp_writes: None,
            });
            let target = self.context.size();
            let width = self.viewport.width.min(target.width).max(1);
            let height = self.viewport.height.min(target.height).max(1);
            render_pass.set_viewport(0.0, 0.0, width as f32, height as f32, 0.0, 1.0);
            render_pass.set_pipeline(&program.pipeline);
            render_pass.set_bind_group(0, &program.bind_group, &[]);
            render_pass.set_vertex_buffer(0, self.quad.slice(..));
            render_pass.draw(0..vertex_count, 0..1);
        }
        self.context.queue.submit(Some(encoder.finish()));
        frame.present();
        self.clear_pending = false;
    }

    fn delete_program(&mut self, program: ProgramId) {
        if self.programs.remove(&program).is_some() && self.active == Some(program) {
            self.active = None;
        }
    }

    fn unbind_all(&mut self) {
        self.active = None;
        self.multisample = None;
        self.clear_pending = false;
    }
}
