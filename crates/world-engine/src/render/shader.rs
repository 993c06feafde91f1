//! Shader compilation, linking and reflection.
//!
//! WGSL stages are parsed and validated with naga at compile time so that
//! errors surface as [`RenderError::Compile`] instead of device panics. Linking
//! checks stage interfaces and reflects the uniform block and vertex inputs,
//! which lets callers look uniforms and attributes up by name. GPU objects
//! (modules, uniform buffer, pipeline) are created lazily by [`ShaderProgram::prepare`].

use std::borrow::Cow;
use std::collections::BTreeMap;
use std::path::PathBuf;

use glam::Mat4;

use crate::error::{RenderError, Result, ShaderStage};

/// Where a shader stage's WGSL text comes from.
#[derive(Debug, Clone, PartialEq)]
pub enum ShaderSource {
    Embedded(&'static str),
    File(PathBuf),
}

impl ShaderSource {
    pub fn load(&self) -> Result<Cow<'static, str>> {
        match self {
            ShaderSource::Embedded(src) => Ok(Cow::Borrowed(src)),
            ShaderSource::File(path) => std::fs::read_to_string(path)
                .map(Cow::Owned)
                .map_err(|e| RenderError::init(format!("reading {}: {e}", path.display()))),
        }
    }
}

/// A validated single-stage shader.
#[derive(Debug)]
pub struct Shader {
    stage: ShaderStage,
    source: String,
    entry_point: String,
    entry_index: usize,
    module: naga::Module,
}

impl Shader {
    /// Parses and validates `source`, which must contain exactly one entry point for `stage`.
    pub fn compile(stage: ShaderStage, source: &str) -> Result<Self> {
        let compile_err = |message: String| RenderError::Compile { stage, message };

        let module = naga::front::wgsl::parse_str(source)
            .map_err(|e| compile_err(e.emit_to_string(source)))?;

        naga::valid::Validator::new(
            naga::valid::ValidationFlags::all(),
            naga::valid::Capabilities::empty(),
        )
        .validate(&module)
        .map_err(|e| compile_err(e.to_string()))?;

        let mut entries = module
            .entry_points
            .iter()
            .enumerate()
            .filter(|(_, ep)| naga_stage_matches(ep.stage, stage));
        let (entry_index, entry_point) = match (entries.next(), entries.next()) {
            (Some((i, ep)), None) => (i, ep.name.clone()),
            (None, _) => return Err(compile_err(format!("no @{stage} entry point"))),
            (Some(_), Some(_)) => {
                return Err(compile_err(format!("more than one @{stage} entry point")));
            }
        };

        log::trace!("compiled {stage} shader, entry point `{entry_point}`");

        Ok(Self {
            stage,
            source: source.to_owned(),
            entry_point,
            entry_index,
            module,
        })
    }

    #[inline]
    pub fn stage(&self) -> ShaderStage {
        self.stage
    }

    #[inline]
    pub fn entry_point(&self) -> &str {
        &self.entry_point
    }

    fn entry(&self) -> &naga::EntryPoint {
        &self.module.entry_points[self.entry_index]
    }

    /// `(name, location)` of every user-defined input.
    fn inputs(&self) -> Vec<(String, u32)> {
        let mut out = Vec::new();
        for arg in &self.entry().function.arguments {
            collect_locations(&self.module, arg.name.as_deref(), arg.ty, arg.binding.as_ref(), &mut out);
        }
        out
    }

    /// `(name, location)` of every user-defined output.
    fn outputs(&self) -> Vec<(String, u32)> {
        let mut out = Vec::new();
        if let Some(result) = &self.entry().function.result {
            collect_locations(&self.module, None, result.ty, result.binding.as_ref(), &mut out);
        }
        out
    }
}

fn naga_stage_matches(naga_stage: naga::ShaderStage, stage: ShaderStage) -> bool {
    match stage {
        ShaderStage::Vertex => matches!(naga_stage, naga::ShaderStage::Vertex),
        ShaderStage::Fragment => matches!(naga_stage, naga::ShaderStage::Fragment),
    }
}

fn collect_locations(
    module: &naga::Module,
    name: Option<&str>,
    ty: naga::Handle<naga::Type>,
    binding: Option<&naga::Binding>,
    out: &mut Vec<(String, u32)>,
) {
    match binding {
        Some(naga::Binding::Location { location, .. }) => {
            out.push((name.unwrap_or_default().to_owned(), *location));
        }
        Some(naga::Binding::BuiltIn(_)) => {}
        None => {
            if let naga::TypeInner::Struct { members, .. } = &module.types[ty].inner {
                for m in members {
                    collect_locations(module, m.name.as_deref(), m.ty, m.binding.as_ref(), out);
                }
            }
        }
    }
}

/// Byte range of a uniform block member.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub struct UniformLocation {
    pub offset: u32,
    pub size: u32,
}

/// Vertex input location.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct AttributeLocation(pub u32);

#[derive(Debug, Copy, Clone, Eq, PartialEq)]
struct AttributeLayout {
    components: u32,
    stride_bytes: u64,
    offset_bytes: u64,
}

#[derive(Debug)]
struct UniformBlock {
    group: u32,
    binding: u32,
    span: u32,
    members: Vec<(String, UniformLocation)>,
}

fn reflect_uniform_block(module: &naga::Module) -> Result<UniformBlock> {
    let mut uniforms = module
        .global_variables
        .iter()
        .filter(|(_, var)| matches!(var.space, naga::AddressSpace::Uniform));

    let (_, var) = uniforms
        .next()
        .ok_or_else(|| RenderError::Link("vertex stage declares no uniform block".into()))?;
    if uniforms.next().is_some() {
        return Err(RenderError::Link("more than one uniform block".into()));
    }

    let binding = var
        .binding
        .as_ref()
        .ok_or_else(|| RenderError::Link("uniform block has no @group/@binding".into()))?;

    let naga::TypeInner::Struct { members, span } = &module.types[var.ty].inner else {
        return Err(RenderError::Link("uniform block is not a struct".into()));
    };

    let members = members
        .iter()
        .enumerate()
        .map(|(i, m)| {
            let end = members.get(i + 1).map_or(*span, |next| next.offset);
            let name = m.name.clone().unwrap_or_default();
            (name, UniformLocation { offset: m.offset, size: end - m.offset })
        })
        .collect();

    Ok(UniformBlock {
        group: binding.group,
        binding: binding.binding,
        span: *span,
        members,
    })
}

/// Collects shader stages before linking.
#[derive(Debug, Default)]
pub struct ProgramBuilder {
    vertex: Option<Shader>,
    fragment: Option<Shader>,
}

impl ProgramBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Attaches a compiled stage. Each stage may be attached once.
    pub fn attach(&mut self, shader: Shader) -> Result<&mut Self> {
        let slot = match shader.stage {
            ShaderStage::Vertex => &mut self.vertex,
            ShaderStage::Fragment => &mut self.fragment,
        };
        if slot.is_some() {
            return Err(RenderError::Link(format!(
                "{} stage attached twice",
                shader.stage
            )));
        }
        *slot = Some(shader);
        Ok(self)
    }

    /// Checks the stage interface and reflects uniforms and attributes.
    pub fn link(self) -> Result<ShaderProgram> {
        let vertex = self
            .vertex
            .ok_or_else(|| RenderError::Link("no vertex stage attached".into()))?;
        let fragment = self
            .fragment
            .ok_or_else(|| RenderError::Link("no fragment stage attached".into()))?;

        let produced = vertex.outputs();
        for (name, location) in fragment.inputs() {
            if !produced.iter().any(|(_, l)| *l == location) {
                return Err(RenderError::Link(format!(
                    "fragment input `{name}` at location {location} is not written by the vertex stage"
                )));
            }
        }

        let uniforms = reflect_uniform_block(&vertex.module)?;
        let attributes = vertex.inputs();

        log::debug!(
            "linked program: {} attribute(s), uniform block of {} bytes",
            attributes.len(),
            uniforms.span
        );

        Ok(ShaderProgram {
            uniform_data: vec![0; uniforms.span as usize],
            vertex,
            fragment,
            uniforms,
            attributes,
            enabled: BTreeMap::new(),
            uniform_dirty: true,
            gpu: None,
        })
    }
}

/// Formats a pipeline is built for.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub struct PipelineTarget {
    pub color_format: wgpu::TextureFormat,
    pub depth_format: Option<wgpu::TextureFormat>,
    pub sample_count: u32,
}

#[derive(Debug)]
struct ProgramGpu {
    target: PipelineTarget,
    pipeline: wgpu::RenderPipeline,
    bind_group: wgpu::BindGroup,
    uniform_buffer: wgpu::Buffer,
}

/// A linked vertex + fragment program.
#[derive(Debug)]
pub struct ShaderProgram {
    vertex: Shader,
    fragment: Shader,
    uniforms: UniformBlock,
    attributes: Vec<(String, u32)>,
    /// Enabled attributes; `None` until a layout is described.
    enabled: BTreeMap<u32, Option<AttributeLayout>>,
    uniform_data: Vec<u8>,
    uniform_dirty: bool,
    gpu: Option<ProgramGpu>,
}

impl ShaderProgram {
    pub fn uniform_location(&self, name: &str) -> Result<UniformLocation> {
        self.uniforms
            .members
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, loc)| *loc)
            .ok_or_else(|| RenderError::NotFound {
                kind: "uniform",
                name: name.to_owned(),
            })
    }

    pub fn attribute_location(&self, name: &str) -> Result<AttributeLocation> {
        self.attributes
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, loc)| AttributeLocation(*loc))
            .ok_or_else(|| RenderError::NotFound {
                kind: "attribute",
                name: name.to_owned(),
            })
    }

    /// Writes a 4x4 matrix into the CPU copy of the uniform block.
    ///
    /// The block is uploaded on the next [`write_uniforms`](Self::write_uniforms).
    pub fn set_uniform(&mut self, location: UniformLocation, value: &Mat4) -> Result<()> {
        let cols = value.to_cols_array();
        let bytes: &[u8] = bytemuck::cast_slice(&cols);
        if location.size as usize != bytes.len() {
            return Err(RenderError::InvalidState("uniform is not a mat4x4<f32>"));
        }
        let start = location.offset as usize;
        let dst = self
            .uniform_data
            .get_mut(start..start + bytes.len())
            .ok_or(RenderError::InvalidState("uniform location outside the block"))?;
        dst.copy_from_slice(bytes);
        self.uniform_dirty = true;
        Ok(())
    }

    pub fn enable_attribute(&mut self, location: AttributeLocation) -> Result<()> {
        self.check_attribute(location)?;
        self.enabled.entry(location.0).or_insert(None);
        self.gpu = None;
        Ok(())
    }

    /// Records how an enabled attribute is read from the vertex buffer.
    pub fn describe_attribute_layout(
        &mut self,
        location: AttributeLocation,
        components: u32,
        stride_bytes: u64,
        offset_bytes: u64,
    ) -> Result<()> {
        self.check_attribute(location)?;
        if !(1..=4).contains(&components) {
            return Err(RenderError::InvalidState("attribute must have 1 to 4 components"));
        }
        let slot = self
            .enabled
            .get_mut(&location.0)
            .ok_or(RenderError::InvalidState("attribute layout described before enabling it"))?;
        *slot = Some(AttributeLayout {
            components,
            stride_bytes,
            offset_bytes,
        });
        self.gpu = None;
        Ok(())
    }

    fn check_attribute(&self, location: AttributeLocation) -> Result<()> {
        if self.attributes.iter().any(|(_, l)| *l == location.0) {
            Ok(())
        } else {
            Err(RenderError::NotFound {
                kind: "attribute",
                name: format!("@location({})", location.0),
            })
        }
    }

    /// Stride and wgpu attributes of the single interleaved vertex buffer.
    fn vertex_attributes(&self) -> Result<(u64, Vec<wgpu::VertexAttribute>)> {
        for (name, location) in &self.attributes {
            if !self.enabled.contains_key(location) {
                return Err(RenderError::Link(format!("attribute `{name}` is not enabled")));
            }
        }

        let mut stride = None;
        let mut attrs = Vec::with_capacity(self.enabled.len());
        for (&location, layout) in &self.enabled {
            let layout = layout.ok_or_else(|| {
                RenderError::Link(format!("attribute {location} has no layout"))
            })?;
            match stride {
                None => stride = Some(layout.stride_bytes),
                Some(s) if s != layout.stride_bytes => {
                    return Err(RenderError::Link("attributes disagree on vertex stride".into()));
                }
                Some(_) => {}
            }
            attrs.push(wgpu::VertexAttribute {
                format: float_format(layout.components),
                offset: layout.offset_bytes,
                shader_location: location,
            });
        }

        let stride = stride.ok_or_else(|| RenderError::Link("no attributes enabled".into()))?;
        Ok((stride, attrs))
    }

    /// Builds GPU objects for `target`, reusing them if the target is unchanged.
    pub fn prepare(&mut self, device: &wgpu::Device, target: PipelineTarget) -> Result<()> {
        if self.gpu.as_ref().is_some_and(|g| g.target == target) {
            return Ok(());
        }

        let (stride, attributes) = self.vertex_attributes()?;

        let vs_module = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("world batch vertex shader"),
            source: wgpu::ShaderSource::Wgsl(self.vertex.source.as_str().into()),
        });
        let fs_module = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("world batch fragment shader"),
            source: wgpu::ShaderSource::Wgsl(self.fragment.source.as_str().into()),
        });

        let block_size = u64::from(self.uniforms.span);
        let min_binding_size = std::num::NonZeroU64::new(block_size)
            .ok_or_else(|| RenderError::Link("uniform block is empty".into()))?;

        let bind_group_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("world batch bgl"),
            entries: &[wgpu::BindGroupLayoutEntry {
                binding: self.uniforms.binding,
                visibility: wgpu::ShaderStages::VERTEX,
                ty: wgpu::BindingType::Buffer {
                    ty: wgpu::BufferBindingType::Uniform,
                    has_dynamic_offset: false,
                    min_binding_size: Some(min_binding_size),
                },
                count: None,
            }],
        });

        let uniform_buffer = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("world batch uniforms"),
            size: block_size,
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });

        let bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("world batch bind group"),
            layout: &bind_group_layout,
            entries: &[wgpu::BindGroupEntry {
                binding: self.uniforms.binding,
                resource: uniform_buffer.as_entire_binding(),
            }],
        });

        let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("world batch pipeline layout"),
            bind_group_layouts: &[&bind_group_layout],
            immediate_size: 0,
        });

        let vertex_buffers = [wgpu::VertexBufferLayout {
            array_stride: stride,
            step_mode: wgpu::VertexStepMode::Vertex,
            attributes: &attributes,
        }];

        let pipeline = device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
            label: Some("world batch pipeline"),
            layout: Some(&pipeline_layout),

            vertex: wgpu::VertexState {
                module: &vs_module,
                entry_point: Some(self.vertex.entry_point()),
                compilation_options: Default::default(),
                buffers: &vertex_buffers,
            },

            fragment: Some(wgpu::FragmentState {
                module: &fs_module,
                entry_point: Some(self.fragment.entry_point()),
                compilation_options: Default::default(),
                targets: &[Some(wgpu::ColorTargetState {
                    format: target.color_format,
                    blend: Some(wgpu::BlendState::ALPHA_BLENDING),
                    write_mask: wgpu::ColorWrites::ALL,
                })],
            }),

            primitive: wgpu::PrimitiveState {
                topology: wgpu::PrimitiveTopology::TriangleList,
                strip_index_format: None,
                front_face: wgpu::FrontFace::Ccw,
                cull_mode: Some(wgpu::Face::Back),
                polygon_mode: wgpu::PolygonMode::Fill,
                unclipped_depth: false,
                conservative: false,
            },

            depth_stencil: target.depth_format.map(|format| wgpu::DepthStencilState {
                format,
                depth_write_enabled: true,
                depth_compare: wgpu::CompareFunction::Less,
                stencil: wgpu::StencilState::default(),
                bias: wgpu::DepthBiasState::default(),
            }),

            multisample: wgpu::MultisampleState {
                count: target.sample_count,
                mask: !0,
                alpha_to_coverage_enabled: false,
            },

            multiview_mask: None,
            cache: None,
        });

        if let Some(old) = self.gpu.take() {
            old.uniform_buffer.destroy();
        }
        self.gpu = Some(ProgramGpu {
            target,
            pipeline,
            bind_group,
            uniform_buffer,
        });
        self.uniform_dirty = true;

        log::debug!(
            "batch pipeline built for {:?}, {} sample(s)",
            target.color_format,
            target.sample_count
        );
        Ok(())
    }

    /// Uploads the uniform block if it changed since the last upload.
    pub fn write_uniforms(&mut self, queue: &wgpu::Queue) -> Result<()> {
        let gpu = self
            .gpu
            .as_ref()
            .ok_or(RenderError::InvalidState("program used before prepare"))?;
        if self.uniform_dirty {
            queue.write_buffer(&gpu.uniform_buffer, 0, &self.uniform_data);
            self.uniform_dirty = false;
        }
        Ok(())
    }

    /// Binds the pipeline and uniform block on `pass`.
    pub fn use_program(&self, pass: &mut wgpu::RenderPass<'_>) -> Result<()> {
        let gpu = self
            .gpu
            .as_ref()
            .ok_or(RenderError::InvalidState("program used before prepare"))?;
        pass.set_pipeline(&gpu.pipeline);
        pass.set_bind_group(self.uniforms.group, &gpu.bind_group, &[]);
        Ok(())
    }

    /// Releases GPU objects. The program cannot be used afterwards.
    pub fn delete(self) {
        if let Some(gpu) = self.gpu {
            gpu.uniform_buffer.destroy();
        }
    }
}

fn float_format(components: u32) -> wgpu::VertexFormat {
    match components {
        1 => wgpu::VertexFormat::Float32,
        2 => wgpu::VertexFormat::Float32x2,
        3 => wgpu::VertexFormat::Float32x3,
        _ => wgpu::VertexFormat::Float32x4,
    }
}
