/// One acquired surface texture.
///
/// Short-lived: holding it blocks acquisition of the next frame. Dropping it
/// without [`present`](Self::present) discards the frame.
#[derive(Debug)]
pub struct SurfaceFrame {
    texture: wgpu::SurfaceTexture,
    view: wgpu::TextureView,
}

impl SurfaceFrame {
    pub(crate) fn new(texture: wgpu::SurfaceTexture) -> Self {
        let view = texture
            .texture
            .create_view(&wgpu::TextureViewDescriptor::default());
        Self { texture, view }
    }

    #[inline]
    pub fn view(&self) -> &wgpu::TextureView {
        &self.view
    }

    pub fn size(&self) -> (u32, u32) {
        (self.texture.texture.width(), self.texture.texture.height())
    }

    pub(crate) fn present(self) {
        let Self { texture, view } = self;
        drop(view);
        texture.present();
    }
}
