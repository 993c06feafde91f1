use glam::Mat4;

use crate::device::{GpuContext, SurfaceFrame};
use crate::error::{RenderError, Result, ShaderStage};

use super::backend::{DrawBackend, Transform};
use super::buffer::{BufferContents, BufferTarget, BufferUsage, GpuBuffer};
use super::config::BatchConfig;
use super::shader::{PipelineTarget, ProgramBuilder, Shader, ShaderProgram, UniformLocation};

/// Render attachment sized to the current frame.
struct Attachment {
    size: (u32, u32),
    view: wgpu::TextureView,
}

impl Attachment {
    fn new(
        device: &wgpu::Device,
        label: &str,
        format: wgpu::TextureFormat,
        sample_count: u32,
        (width, height): (u32, u32),
    ) -> Self {
        let texture = device.create_texture(&wgpu::TextureDescriptor {
            label: Some(label),
            size: wgpu::Extent3d {
                width: width.max(1),
                height: height.max(1),
                depth_or_array_layers: 1,
            },
            mip_level_count: 1,
            sample_count,
            dimension: wgpu::TextureDimension::D2,
            format,
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
            view_formats: &[],
        });
        let view = texture.create_view(&wgpu::TextureViewDescriptor::default());
        Self {
            size: (width, height),
            view,
        }
    }
}

/// wgpu implementation of [`DrawBackend`].
///
/// Every clear and every draw is recorded into its own command buffer and
/// submitted immediately, so a queued buffer write is always consumed by the
/// draw it was made for before the next flush overwrites offset zero.
pub struct WgpuBackend {
    ctx: GpuContext,
    buffer: Option<GpuBuffer>,
    program: Option<ShaderProgram>,
    transforms: [UniformLocation; 3],
    clear_color: wgpu::Color,

    frame_view: Option<wgpu::TextureView>,
    frame_size: (u32, u32),
    depth: Option<Attachment>,
    msaa: Option<Attachment>,
}

impl WgpuBackend {
    /// Builds the shader program and a dynamic vertex buffer sized to the staging capacity.
    pub fn new(ctx: GpuContext, config: &BatchConfig) -> Result<Self> {
        let vs_src = config.vertex_source().load()?;
        let fs_src = config.fragment_shader.load()?;

        let mut builder = ProgramBuilder::new();
        builder.attach(Shader::compile(ShaderStage::Vertex, &vs_src)?)?;
        builder.attach(Shader::compile(ShaderStage::Fragment, &fs_src)?)?;
        let mut program = builder.link()?;

        let layout = config.layout;
        for attr in layout.attributes() {
            let location = program.attribute_location(attr.name)?;
            program.enable_attribute(location)?;
            program.describe_attribute_layout(
                location,
                attr.components,
                layout.stride_bytes(),
                u64::from(attr.offset_components) * std::mem::size_of::<f32>() as u64,
            )?;
        }

        let mut transforms = [UniformLocation { offset: 0, size: 0 }; 3];
        for (slot, transform) in transforms.iter_mut().zip(Transform::ALL) {
            *slot = program.uniform_location(transform.uniform_name())?;
            program.set_uniform(*slot, &Mat4::IDENTITY)?;
        }

        program.prepare(
            &ctx.device,
            PipelineTarget {
                color_format: ctx.surface_format,
                depth_format: Some(ctx.depth_format),
                sample_count: ctx.sample_count,
            },
        )?;

        let mut buffer = GpuBuffer::create("world batch vertices", BufferTarget::Vertex { slot: 0 });
        let bytes = (config.staging_capacity * std::mem::size_of::<f32>()) as u64;
        buffer.upload_full(&ctx.device, BufferContents::Reserve(bytes), BufferUsage::Dynamic)?;

        log::info!(
            "wgpu batch backend ready: {:?} layout, {} byte vertex buffer",
            layout,
            bytes
        );

        Ok(Self {
            ctx,
            buffer: Some(buffer),
            program: Some(program),
            transforms,
            clear_color: config.clear_color,
            frame_view: None,
            frame_size: (0, 0),
            depth: None,
            msaa: None,
        })
    }

    pub fn context(&self) -> &GpuContext {
        &self.ctx
    }

    fn ensure_attachments(&mut self) {
        let size = self.frame_size;
        if self.depth.as_ref().map(|a| a.size) != Some(size) {
            self.depth = Some(Attachment::new(
                &self.ctx.device,
                "world depth",
                self.ctx.depth_format,
                self.ctx.sample_count,
                size,
            ));
        }
        if self.ctx.sample_count > 1 && self.msaa.as_ref().map(|a| a.size) != Some(size) {
            self.msaa = Some(Attachment::new(
                &self.ctx.device,
                "world msaa color",
                self.ctx.surface_format,
                self.ctx.sample_count,
                size,
            ));
        }
    }

    /// Records one pass into a fresh encoder and submits it.
    fn submit_pass(
        &mut self,
        label: &str,
        color_load: wgpu::LoadOp<wgpu::Color>,
        depth_load: wgpu::LoadOp<f32>,
        vertex_count: Option<u32>,
    ) -> Result<()> {
        self.ensure_attachments();

        let frame_view = self
            .frame_view
            .as_ref()
            .ok_or(RenderError::InvalidState("no frame bound"))?;
        let depth = self
            .depth
            .as_ref()
            .ok_or(RenderError::InvalidState("depth attachment missing"))?;
        let (color_view, resolve_target) = match &self.msaa {
            Some(msaa) if self.ctx.sample_count > 1 => (&msaa.view, Some(frame_view)),
            _ => (frame_view, None),
        };

        let mut encoder = self
            .ctx
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor { label: Some(label) });

        {
            let mut pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some(label),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view: color_view,
                    resolve_target,
                    ops: wgpu::Operations {
                        load: color_load,
                        store: wgpu::StoreOp::Store,
                    },
                    depth_slice: None,
                })],
                depth_stencil_attachment: Some(wgpu::RenderPassDepthStencilAttachment {
                    view: &depth.view,
                    depth_ops: Some(wgpu::Operations {
                        load: depth_load,
                        store: wgpu::StoreOp::Store,
                    }),
                    stencil_ops: None,
                }),
                timestamp_writes: None,
                occlusion_query_set: None,
                multiview_mask: None,
            });

            if let Some(count) = vertex_count {
                let program = self
                    .program
                    .as_ref()
                    .ok_or(RenderError::InvalidState("shader program released"))?;
                let buffer = self
                    .buffer
                    .as_ref()
                    .ok_or(RenderError::InvalidState("vertex buffer released"))?;
                program.use_program(&mut pass)?;
                buffer.bind(&mut pass)?;
                pass.draw(0..count, 0..1);
            }
        }

        self.ctx.queue.submit(std::iter::once(encoder.finish()));
        Ok(())
    }
}

impl DrawBackend for WgpuBackend {
    type Frame = SurfaceFrame;

    fn bind_frame(&mut self, frame: &SurfaceFrame) {
        self.frame_view = Some(frame.view().clone());
        self.frame_size = frame.size();
    }

    fn unbind_frame(&mut self) {
        self.frame_view = None;
    }

    fn clear(&mut self) -> Result<()> {
        let color = wgpu::LoadOp::Clear(self.clear_color);
        self.submit_pass("world clear", color, wgpu::LoadOp::Clear(1.0), None)
    }

    fn upload(&mut self, components: &[f32]) -> Result<()> {
        let buffer = self
            .buffer
            .as_ref()
            .ok_or(RenderError::InvalidState("vertex buffer released"))?;
        buffer.upload_range(&self.ctx.queue, 0, bytemuck::cast_slice(components))
    }

    fn draw(&mut self, vertex_count: u32) -> Result<()> {
        self.program
            .as_mut()
            .ok_or(RenderError::InvalidState("shader program released"))?
            .write_uniforms(&self.ctx.queue)?;
        self.submit_pass(
            "world batch",
            wgpu::LoadOp::Load,
            wgpu::LoadOp::Load,
            Some(vertex_count),
        )
    }

    fn set_transform(&mut self, slot: Transform, matrix: &Mat4) {
        let location = self.transforms[slot.index()];
        if let Some(program) = self.program.as_mut() {
            if let Err(e) = program.set_uniform(location, matrix) {
                log::warn!("{} matrix not updated: {e}", slot.uniform_name());
            }
        }
    }

    fn release(&mut self) {
        self.frame_view = None;
        self.depth = None;
        self.msaa = None;
        if let Some(buffer) = self.buffer.take() {
            buffer.delete();
        }
        if let Some(program) = self.program.take() {
            program.delete();
        }
        log::debug!("wgpu batch backend released");
    }
}
