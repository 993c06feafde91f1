use winit::dpi::PhysicalSize;
use winit::window::{Fullscreen, Window, WindowAttributes};

use crate::device::{present_mode_for, GpuInit};

/// Window creation options.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WindowConfig {
    pub title: String,
    /// Framebuffer size in physical pixels.
    pub width: u32,
    pub height: u32,
    pub vsync: bool,
    /// MSAA samples; 0 disables multisampling.
    pub msaa_samples: u32,
    /// Borderless fullscreen on the current monitor.
    pub fullscreen: bool,
    pub resizable: bool,
}

impl Default for WindowConfig {
    fn default() -> Self {
        Self {
            title: "WorldEngine".to_string(),
            width: 640,
            height: 480,
            vsync: false,
            msaa_samples: 0,
            fullscreen: false,
            resizable: false,
        }
    }
}

impl WindowConfig {
    pub(crate) fn attributes(&self) -> WindowAttributes {
        let mut attrs = Window::default_attributes()
            .with_title(self.title.clone())
            .with_inner_size(PhysicalSize::new(self.width.max(1), self.height.max(1)))
            .with_resizable(self.resizable)
            .with_visible(true);
        if self.fullscreen {
            attrs = attrs.with_fullscreen(Some(Fullscreen::Borderless(None)));
        }
        attrs
    }

    /// GPU parameters implied by this window's presentation options.
    pub fn gpu_init(&self) -> GpuInit {
        GpuInit {
            present_mode: present_mode_for(self.vsync),
            msaa_samples: self.msaa_samples,
            ..GpuInit::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_the_launcher_window() {
        let c = WindowConfig::default();
        assert_eq!((c.width, c.height), (640, 480));
        assert_eq!(c.title, "WorldEngine");
        assert!(!c.vsync && !c.fullscreen && !c.resizable);
        assert_eq!(c.msaa_samples, 0);
    }

    #[test]
    fn vsync_and_msaa_flow_into_gpu_init() {
        let c = WindowConfig {
            vsync: true,
            msaa_samples: 4,
            ..WindowConfig::default()
        };
        let init = c.gpu_init();
        assert_eq!(init.present_mode, wgpu::PresentMode::AutoVsync);
        assert_eq!(init.msaa_samples, 4);
    }
}
