/// Fixed-capacity CPU staging area for vertex components.
///
/// Storage is allocated once. `clear()` rewinds the write cursor without
/// releasing memory, so a stream lives as long as the renderer that owns it.
#[derive(Debug)]
pub struct VertexStream {
    data: Box<[f32]>,
    cursor: usize,
}

impl VertexStream {
    /// Allocates a stream holding `capacity` float components.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            data: vec![0.0; capacity].into_boxed_slice(),
            cursor: 0,
        }
    }

    /// Total number of components the stream can hold.
    #[inline]
    pub fn capacity(&self) -> usize {
        self.data.len()
    }

    /// Components that can still be written before a flush is required.
    #[inline]
    pub fn remaining(&self) -> usize {
        self.data.len() - self.cursor
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.cursor
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.cursor == 0
    }

    /// Reserves the next `components` slots and returns them for writing.
    ///
    /// Returns `None` if the request does not fit; the cursor is left untouched.
    pub fn reserve(&mut self, components: usize) -> Option<&mut [f32]> {
        if components > self.remaining() {
            return None;
        }
        let start = self.cursor;
        self.cursor += components;
        Some(&mut self.data[start..self.cursor])
    }

    /// The range written since the last `clear()`.
    #[inline]
    pub fn written(&self) -> &[f32] {
        &self.data[..self.cursor]
    }

    /// Rewinds the cursor. Storage is kept.
    #[inline]
    pub fn clear(&mut self) {
        self.cursor = 0;
    }
}
