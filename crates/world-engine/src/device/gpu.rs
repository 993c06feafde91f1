use std::sync::Arc;

use winit::window::Window;

use crate::error::{RenderError, Result};

use super::surface;
use super::{GpuInit, SurfaceErrorAction, SurfaceFrame};

/// Depth attachment format used by every batch pipeline.
pub const DEPTH_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Depth32Float;

/// Device-side handles handed to the render thread.
///
/// `wgpu::Device` and `wgpu::Queue` are cheap reference-counted clones.
#[derive(Debug, Clone)]
pub struct GpuContext {
    pub device: wgpu::Device,
    pub queue: wgpu::Queue,
    pub surface_format: wgpu::TextureFormat,
    pub depth_format: wgpu::TextureFormat,
    pub sample_count: u32,
}

/// Owns the wgpu surface, adapter, device and queue for one window.
pub struct Gpu {
    surface: wgpu::Surface<'static>,
    adapter: wgpu::Adapter,
    device: wgpu::Device,
    queue: wgpu::Queue,
    config: wgpu::SurfaceConfiguration,
    /// Framebuffer size in physical pixels; may be 0x0 while minimized.
    size: (u32, u32),
    sample_count: u32,
}

impl Gpu {
    /// Creates the surface for `window` and a device able to present to it.
    ///
    /// Adapter/device acquisition is asynchronous under wgpu; callers block on it.
    pub async fn new(window: Arc<Window>, init: GpuInit) -> Result<Self> {
        let physical = window.inner_size();

        let instance = wgpu::Instance::new(&wgpu::InstanceDescriptor {
            backends: wgpu::Backends::all(),
            ..Default::default()
        });

        let surface = instance
            .create_surface(window)
            .map_err(|e| RenderError::init(format!("failed to create wgpu surface: {e}")))?;

        let adapter = instance
            .request_adapter(&wgpu::RequestAdapterOptions {
                power_preference: init.power_preference,
                compatible_surface: Some(&surface),
                force_fallback_adapter: false,
            })
            .await
            .map_err(|e| RenderError::init(format!("no suitable GPU adapter: {e}")))?;

        let (device, queue) = adapter
            .request_device(&wgpu::DeviceDescriptor {
                label: Some("world-engine device"),
                required_features: init.required_features,
                required_limits: init.required_limits.clone(),
                experimental_features: wgpu::ExperimentalFeatures::disabled(),
                memory_hints: wgpu::MemoryHints::Performance,
                trace: wgpu::Trace::Off,
            })
            .await
            .map_err(|e| RenderError::init(format!("failed to create wgpu device/queue: {e}")))?;

        let caps = surface.get_capabilities(&adapter);
        let format = surface::choose_surface_format(&caps, init.prefer_srgb)
            .ok_or_else(|| RenderError::init("surface reports no supported formats"))?;
        let alpha_mode = surface::choose_alpha_mode(&caps, init.alpha_mode);

        let format_features = adapter.get_texture_format_features(format);
        let sample_count = surface::choose_sample_count(init.msaa_samples, |n| {
            format_features.flags.sample_count_supported(n)
        });

        let config = wgpu::SurfaceConfiguration {
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
            format,
            width: physical.width.max(1),
            height: physical.height.max(1),
            present_mode: init.present_mode,
            alpha_mode,
            view_formats: vec![],
            desired_maximum_frame_latency: init.desired_maximum_frame_latency,
        };
        surface.configure(&device, &config);

        let info = adapter.get_info();
        log::info!(
            "gpu ready: {} ({:?}), {format:?}, {:?}, msaa x{sample_count}",
            info.name,
            info.backend,
            init.present_mode
        );

        Ok(Self {
            surface,
            adapter,
            device,
            queue,
            config,
            size: (physical.width, physical.height),
            sample_count,
        })
    }

    pub fn context(&self) -> GpuContext {
        GpuContext {
            device: self.device.clone(),
            queue: self.queue.clone(),
            surface_format: self.config.format,
            depth_format: DEPTH_FORMAT,
            sample_count: self.sample_count,
        }
    }

    #[inline]
    pub fn size(&self) -> (u32, u32) {
        self.size
    }

    pub fn adapter_info(&self) -> wgpu::AdapterInfo {
        self.adapter.get_info()
    }

    /// Reconfigures the surface. A zero dimension is recorded but not applied.
    pub fn resize(&mut self, width: u32, height: u32) {
        self.size = (width, height);
        if width == 0 || height == 0 {
            return;
        }
        self.config.width = width;
        self.config.height = height;
        self.surface.configure(&self.device, &self.config);
    }

    /// Acquires the next surface texture.
    ///
    /// `Ok(None)` means the frame should be skipped.
    pub fn acquire(&mut self) -> Result<Option<SurfaceFrame>> {
        if self.size.0 == 0 || self.size.1 == 0 {
            return Ok(None);
        }
        match self.surface.get_current_texture() {
            Ok(texture) => Ok(Some(SurfaceFrame::new(texture))),
            Err(err) => match surface::classify_surface_error(&err) {
                SurfaceErrorAction::Reconfigured => {
                    log::debug!("surface {err}; reconfiguring");
                    self.surface.configure(&self.device, &self.config);
                    Ok(None)
                }
                SurfaceErrorAction::SkipFrame => {
                    log::debug!("surface {err}; skipping frame");
                    Ok(None)
                }
                SurfaceErrorAction::Fatal => {
                    Err(RenderError::init(format!("surface acquisition failed: {err}")))
                }
            },
        }
    }
}
