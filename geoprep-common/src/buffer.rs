//! 16-byte aligned byte buffers
//!
//! Vertex buffers and every quantized output are stored in an [`AlignedBuffer`], whose
//! first byte always sits on a 16-byte boundary. That keeps f32/u16 reinterpretation
//! (via `bytemuck`) infallible and lets callers hand the bytes straight to SIMD or GPU
//! upload code.

use bytemuck::{Pod, Zeroable};

#[derive(Clone, Copy, Default)]
#[repr(C, align(16))]
struct Block([u8; 16]);

// SAFETY: `Block` is a 16-byte array with 16-byte alignment: no padding, and every bit
// pattern is valid.
unsafe impl Zeroable for Block {}
unsafe impl Pod for Block {}

/// Heap buffer with a guaranteed 16-byte aligned start address
#[derive(Clone, Default)]
pub struct AlignedBuffer {
    blocks: Vec<Block>,
    len: usize,
}

impl AlignedBuffer {
    /// Alignment of the first byte, in bytes
    pub const ALIGNMENT: usize = 16;

    /// Allocate `len` zeroed bytes
    pub fn zeroed(len: usize) -> Self {
        Self {
            blocks: vec![Block::default(); len.div_ceil(Self::ALIGNMENT)],
            len,
        }
    }

    /// Copy raw bytes into a new aligned buffer
    pub fn from_bytes(bytes: &[u8]) -> Self {
        let mut buffer = Self::zeroed(bytes.len());
        buffer.as_bytes_mut().copy_from_slice(bytes);
        buffer
    }

    /// Copy f32 values into a new aligned buffer
    pub fn from_f32s(values: &[f32]) -> Self {
        Self::from_bytes(bytemuck::cast_slice(values))
    }

    /// Length in bytes
    #[inline]
    pub fn len(&self) -> usize {
        self.len
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    #[inline]
    pub fn as_bytes(&self) -> &[u8] {
        &bytemuck::cast_slice::<Block, u8>(&self.blocks)[..self.len]
    }

    #[inline]
    pub fn as_bytes_mut(&mut self) -> &mut [u8] {
        let len = self.len;
        &mut bytemuck::cast_slice_mut::<Block, u8>(&mut self.blocks)[..len]
    }

    /// View as f32 values (trailing bytes that do not form a whole f32 are ignored)
    #[inline]
    pub fn as_f32(&self) -> &[f32] {
        let whole = self.len / 4 * 4;
        bytemuck::cast_slice(&self.as_bytes()[..whole])
    }

    #[inline]
    pub fn as_f32_mut(&mut self) -> &mut [f32] {
        let whole = self.len / 4 * 4;
        bytemuck::cast_slice_mut(&mut self.as_bytes_mut()[..whole])
    }

    /// View as u16 values (a trailing odd byte is ignored)
    #[inline]
    pub fn as_u16(&self) -> &[u16] {
        let whole = self.len / 2 * 2;
        bytemuck::cast_slice(&self.as_bytes()[..whole])
    }

    #[inline]
    pub fn as_u16_mut(&mut self) -> &mut [u16] {
        let whole = self.len / 2 * 2;
        bytemuck::cast_slice_mut(&mut self.as_bytes_mut()[..whole])
    }
}

impl std::fmt::Debug for AlignedBuffer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AlignedBuffer")
            .field("len", &self.len)
            .finish()
    }
}

impl PartialEq for AlignedBuffer {
    fn eq(&self, other: &Self) -> bool {
        self.as_bytes() == other.as_bytes()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_alignment() {
        for len in [0, 1, 15, 16, 17, 1000] {
            let buffer = AlignedBuffer::zeroed(len);
            assert_eq!(buffer.len(), len);
            assert_eq!(buffer.as_bytes().as_ptr() as usize % AlignedBuffer::ALIGNMENT, 0);
        }
    }

    #[test]
    fn test_f32_roundtrip() {
        let values = [1.0f32, -2.5, 3.25];
        let buffer = AlignedBuffer::from_f32s(&values);
        assert_eq!(buffer.len(), 12);
        assert_eq!(buffer.as_f32(), &values);
    }

    #[test]
    fn test_u16_view() {
        let mut buffer = AlignedBuffer::zeroed(6);
        buffer.as_u16_mut().copy_from_slice(&[1, 2, 65535]);
        assert_eq!(buffer.as_u16(), &[1, 2, 65535]);
        assert_eq!(buffer.as_f32().len(), 1);
    }

    #[test]
    fn test_equality_ignores_padding() {
        let a = AlignedBuffer::from_bytes(&[1, 2, 3]);
        let b = AlignedBuffer::from_bytes(&[1, 2, 3]);
        assert_eq!(a, b);
        assert_ne!(a, AlignedBuffer::from_bytes(&[1, 2]));
    }
}
