use std::sync::atomic::{AtomicU64, Ordering};

use crate::error::{RenderError, Result};

static NEXT_BUFFER_ID: AtomicU64 = AtomicU64::new(1);

/// Process-unique generation id of a buffer allocation.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct BufferId(u64);

impl BufferId {
    fn next() -> Self {
        BufferId(NEXT_BUFFER_ID.fetch_add(1, Ordering::Relaxed))
    }

    pub fn get(self) -> u64 {
        self.0
    }
}

/// Binding point a buffer is used at.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum BufferTarget {
    /// Vertex attribute source at the given slot.
    Vertex { slot: u32 },
    Index(wgpu::IndexFormat),
}

/// Expected upload pattern.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum BufferUsage {
    /// Written once at creation; range uploads are rejected.
    Static,
    /// Rewritten through range uploads.
    Dynamic,
}

/// Initial contents for [`GpuBuffer::upload_full`].
#[derive(Debug, Copy, Clone)]
pub enum BufferContents<'a> {
    /// Reserve `n` zeroed bytes.
    Reserve(u64),
    Data(&'a [u8]),
}

/// Owns one GPU buffer allocation.
///
/// Created empty; `upload_full` allocates storage. Deleting consumes the
/// buffer, so no operation can follow it.
#[derive(Debug)]
pub struct GpuBuffer {
    id: BufferId,
    label: String,
    target: BufferTarget,
    usage: BufferUsage,
    size: u64,
    raw: Option<wgpu::Buffer>,
}

impl GpuBuffer {
    pub fn create(label: impl Into<String>, target: BufferTarget) -> Self {
        let id = BufferId::next();
        let label = label.into();
        log::trace!("buffer {label} created as #{}", id.get());
        Self {
            id,
            label,
            target,
            usage: BufferUsage::Dynamic,
            size: 0,
            raw: None,
        }
    }

    #[inline]
    pub fn id(&self) -> BufferId {
        self.id
    }

    #[inline]
    pub fn target(&self) -> BufferTarget {
        self.target
    }

    #[inline]
    pub fn usage(&self) -> BufferUsage {
        self.usage
    }

    /// Allocated size in bytes; 0 before `upload_full`.
    #[inline]
    pub fn size(&self) -> u64 {
        self.size
    }

    /// Replaces the whole allocation.
    ///
    /// The previous storage, if any, is destroyed and a new generation id issued.
    pub fn upload_full(
        &mut self,
        device: &wgpu::Device,
        contents: BufferContents<'_>,
        usage: BufferUsage,
    ) -> Result<()> {
        let mut flags = match self.target {
            BufferTarget::Vertex { .. } => wgpu::BufferUsages::VERTEX,
            BufferTarget::Index(_) => wgpu::BufferUsages::INDEX,
        };
        if usage == BufferUsage::Dynamic {
            flags |= wgpu::BufferUsages::COPY_DST;
        }

        let (raw, size) = match contents {
            BufferContents::Reserve(size) => {
                if size == 0 || size % wgpu::COPY_BUFFER_ALIGNMENT != 0 {
                    return Err(RenderError::init(format!(
                        "buffer {}: reserve size {size} must be a non-zero multiple of {}",
                        self.label,
                        wgpu::COPY_BUFFER_ALIGNMENT
                    )));
                }
                let raw = device.create_buffer(&wgpu::BufferDescriptor {
                    label: Some(self.label.as_str()),
                    size,
                    usage: flags,
                    mapped_at_creation: false,
                });
                (raw, size)
            }
            BufferContents::Data(data) => {
                use wgpu::util::DeviceExt;
                if data.is_empty() {
                    return Err(RenderError::init(format!(
                        "buffer {}: initial data is empty",
                        self.label
                    )));
                }
                let raw = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
                    label: Some(self.label.as_str()),
                    contents: data,
                    usage: flags,
                });
                let size = raw.size();
                (raw, size)
            }
        };

        if let Some(old) = self.raw.replace(raw) {
            old.destroy();
        }
        self.id = BufferId::next();
        self.size = size;
        self.usage = usage;
        log::debug!(
            "buffer {} allocated {size} bytes ({usage:?}) as #{}",
            self.label,
            self.id.get()
        );
        Ok(())
    }

    /// Writes `data` at `offset` without reallocating.
    pub fn upload_range(&self, queue: &wgpu::Queue, offset: u64, data: &[u8]) -> Result<()> {
        let raw = self
            .raw
            .as_ref()
            .ok_or(RenderError::InvalidState("range upload before storage was allocated"))?;
        check_range(self.usage, self.size, offset, data.len() as u64)?;
        queue.write_buffer(raw, offset, data);
        Ok(())
    }

    /// Binds the buffer on `pass` at its target.
    pub fn bind(&self, pass: &mut wgpu::RenderPass<'_>) -> Result<()> {
        let raw = self
            .raw
            .as_ref()
            .ok_or(RenderError::InvalidState("bind before storage was allocated"))?;
        match self.target {
            BufferTarget::Vertex { slot } => pass.set_vertex_buffer(slot, raw.slice(..)),
            BufferTarget::Index(format) => pass.set_index_buffer(raw.slice(..), format),
        }
        Ok(())
    }

    /// Releases the allocation. Must be the last operation on the buffer.
    pub fn delete(self) {
        if let Some(raw) = self.raw {
            raw.destroy();
        }
        log::trace!("buffer {} (#{}) deleted", self.label, self.id.get());
    }
}

fn check_range(usage: BufferUsage, size: u64, offset: u64, len: u64) -> Result<()> {
    if usage == BufferUsage::Static {
        return Err(RenderError::InvalidState("range upload into a static buffer"));
    }
    if offset % wgpu::COPY_BUFFER_ALIGNMENT != 0 || len % wgpu::COPY_BUFFER_ALIGNMENT != 0 {
        return Err(RenderError::InvalidState("range upload is not 4-byte aligned"));
    }
    match offset.checked_add(len) {
        Some(end) if end <= size => Ok(()),
        _ => Err(RenderError::InvalidState("range upload exceeds buffer size")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ids_are_unique() {
        let a = GpuBuffer::create("a", BufferTarget::Vertex { slot: 0 });
        let b = GpuBuffer::create("b", BufferTarget::Vertex { slot: 0 });
        assert_ne!(a.id(), b.id());
        a.delete();
        b.delete();
    }

    #[test]
    fn fresh_buffer_has_no_storage() {
        let b = GpuBuffer::create("vbo", BufferTarget::Vertex { slot: 0 });
        assert_eq!(b.size(), 0);
        assert_eq!(b.usage(), BufferUsage::Dynamic);
        b.delete();
    }

    #[test]
    fn range_inside_allocation_is_accepted() {
        assert!(check_range(BufferUsage::Dynamic, 16384, 0, 16384).is_ok());
        assert!(check_range(BufferUsage::Dynamic, 16384, 4096, 432).is_ok());
    }

    #[test]
    fn range_past_end_is_rejected() {
        assert!(check_range(BufferUsage::Dynamic, 16, 8, 12).is_err());
        assert!(check_range(BufferUsage::Dynamic, 16, u64::MAX, 4).is_err());
    }

    #[test]
    fn static_buffer_rejects_range_upload() {
        assert!(matches!(
            check_range(BufferUsage::Static, 64, 0, 4),
            Err(RenderError::InvalidState(_))
        ));
    }

    #[test]
    fn unaligned_range_is_rejected() {
        assert!(check_range(BufferUsage::Dynamic, 64, 2, 4).is_err());
        assert!(check_range(BufferUsage::Dynamic, 64, 0, 6).is_err());
    }
}
