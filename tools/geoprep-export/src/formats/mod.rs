//! Prepared mesh binary format (.gpmesh)
//!
//! Little-endian, GPU-ready mesh with quantized vertex channels stored one after another
//! (non-interleaved).
//!
//! # Layout
//! ```text
//! 0x00: magic "GPMS"
//! 0x04: version u16
//! 0x06: index_format u8 (0 = u16, 1 = u32)
//! 0x07: channel_count u8
//! 0x08: vertex_count u32
//! 0x0C: index_count u32
//! 0x10: aabb_min [f32; 3]
//! 0x1C: aabb_max [f32; 3]
//! 0x28: sphere [f32; 4] (center xyz, radius)
//! 0x38: name_hash u32 (low 32 bits of xxh3-64)
//! 0x3C: reserved u32
//! 0x40: channel records (channel_count * 40 bytes)
//! var:  channel payloads, each padded to 16 bytes
//! var:  index data (index_count * 2 or 4 bytes)
//! ```

use anyhow::{Context, Result};
use geoprep_common::{AttributeCompression, TangentFrameCompression, VertexSemantic};
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use crate::pipeline::{PreparedChannel, PreparedIndices, PreparedMesh};

/// File magic
pub const MAGIC: [u8; 4] = *b"GPMS";
/// Current format version
pub const VERSION: u16 = 1;
/// Default file extension
pub const EXTENSION: &str = "gpmesh";

/// Compression byte of a channel stored as raw f32
pub const RAW_COMPRESSION: u8 = 0xFF;
/// Channel flag: the channel holds encoded normals
pub const FLAG_NORMAL_ENCODED: u8 = 1;

/// Payload alignment
const PAYLOAD_ALIGNMENT: usize = 16;

#[inline]
fn read_u32(bytes: &[u8], offset: usize) -> u32 {
    u32::from_le_bytes([bytes[offset], bytes[offset + 1], bytes[offset + 2], bytes[offset + 3]])
}

#[inline]
fn read_f32(bytes: &[u8], offset: usize) -> f32 {
    f32::from_bits(read_u32(bytes, offset))
}

fn write_f32s(bytes: &mut [u8], values: &[f32]) {
    for (chunk, value) in bytes.chunks_exact_mut(4).zip(values) {
        chunk.copy_from_slice(&value.to_le_bytes());
    }
}

fn read_f32s<const N: usize>(bytes: &[u8], offset: usize) -> [f32; N] {
    std::array::from_fn(|i| read_f32(bytes, offset + i * 4))
}

/// Index element width
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IndexFormat {
    U16 = 0,
    U32 = 1,
}

impl IndexFormat {
    pub fn from_u8(value: u8) -> Option<Self> {
        match value {
            0 => Some(Self::U16),
            1 => Some(Self::U32),
            _ => None,
        }
    }

    pub fn size(self) -> usize {
        match self {
            Self::U16 => 2,
            Self::U32 => 4,
        }
    }
}

/// Prepared mesh header (64 bytes)
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PreparedMeshHeader {
    pub version: u16,
    pub index_format: IndexFormat,
    pub channel_count: u8,
    pub vertex_count: u32,
    pub index_count: u32,
    pub aabb_min: [f32; 3],
    pub aabb_max: [f32; 3],
    pub sphere: [f32; 4],
    pub name_hash: u32,
}

impl PreparedMeshHeader {
    pub const SIZE: usize = 64;

    pub fn for_mesh(mesh: &PreparedMesh) -> Self {
        Self {
            version: VERSION,
            index_format: match mesh.indices {
                PreparedIndices::U16(_) => IndexFormat::U16,
                PreparedIndices::U32(_) => IndexFormat::U32,
            },
            channel_count: mesh.channels.len() as u8,
            vertex_count: mesh.vertex_count,
            index_count: mesh.indices.len() as u32,
            aabb_min: mesh.aabb.min.to_array(),
            aabb_max: mesh.aabb.max.to_array(),
            sphere: mesh.sphere.to_array(),
            name_hash: mesh.name_hash as u32,
        }
    }

    /// Write header to bytes
    pub fn to_bytes(&self) -> [u8; Self::SIZE] {
        let mut bytes = [0u8; Self::SIZE];
        bytes[0..4].copy_from_slice(&MAGIC);
        bytes[4..6].copy_from_slice(&self.version.to_le_bytes());
        bytes[6] = self.index_format as u8;
        bytes[7] = self.channel_count;
        bytes[8..12].copy_from_slice(&self.vertex_count.to_le_bytes());
        bytes[12..16].copy_from_slice(&self.index_count.to_le_bytes());
        write_f32s(&mut bytes[16..28], &self.aabb_min);
        write_f32s(&mut bytes[28..40], &self.aabb_max);
        write_f32s(&mut bytes[40..56], &self.sphere);
        bytes[56..60].copy_from_slice(&self.name_hash.to_le_bytes());
        // reserved bytes stay 0
        bytes
    }

    /// Read header from bytes (magic is not checked, see [`read_prepared_header`])
    pub fn from_bytes(bytes: &[u8]) -> Option<Self> {
        if bytes.len() < Self::SIZE {
            return None;
        }
        Some(Self {
            version: u16::from_le_bytes([bytes[4], bytes[5]]),
            index_format: IndexFormat::from_u8(bytes[6])?,
            channel_count: bytes[7],
            vertex_count: read_u32(bytes, 8),
            index_count: read_u32(bytes, 12),
            aabb_min: read_f32s(bytes, 16),
            aabb_max: read_f32s(bytes, 28),
            sphere: read_f32s(bytes, 40),
            name_hash: read_u32(bytes, 56),
        })
    }
}

/// Per-channel record following the header (40 bytes)
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ChannelRecord {
    /// [`VertexSemantic`] table index
    pub semantic: u8,
    /// [`AttributeCompression`] id, or [`RAW_COMPRESSION`]
    pub compression: u8,
    pub components: u8,
    /// Bit 0: normal encoded; bits 1..: [`TangentFrameCompression`] id
    pub flags: u8,
    pub scale: [f32; 4],
    pub bias: [f32; 4],
    /// Payload length in bytes, before padding
    pub data_len: u32,
}

impl ChannelRecord {
    pub const SIZE: usize = 40;

    pub fn for_channel(channel: &PreparedChannel) -> Self {
        let (scale, bias) = channel
            .scale_bias
            .map_or(([1.0; 4], [0.0; 4]), |sb| (sb.scale, sb.bias));
        let flags = channel
            .normal_encoding
            .map_or(0, |mode| FLAG_NORMAL_ENCODED | (mode.id() << 1));
        Self {
            semantic: channel.semantic.index().unwrap_or(0) as u8,
            compression: channel.compression.map_or(RAW_COMPRESSION, |c| c.id()),
            components: channel.components,
            flags,
            scale,
            bias,
            data_len: channel.data.len() as u32,
        }
    }

    pub fn semantic(&self) -> Option<VertexSemantic> {
        VertexSemantic::from_index(self.semantic as usize)
    }

    /// `None` for raw f32 channels
    pub fn compression(&self) -> Option<AttributeCompression> {
        AttributeCompression::from_id(self.compression)
    }

    pub fn normal_encoding(&self) -> Option<TangentFrameCompression> {
        if self.flags & FLAG_NORMAL_ENCODED == 0 {
            return None;
        }
        TangentFrameCompression::from_id(self.flags >> 1)
    }

    pub fn to_bytes(&self) -> [u8; Self::SIZE] {
        let mut bytes = [0u8; Self::SIZE];
        bytes[0] = self.semantic;
        bytes[1] = self.compression;
        bytes[2] = self.components;
        bytes[3] = self.flags;
        write_f32s(&mut bytes[4..20], &self.scale);
        write_f32s(&mut bytes[20..36], &self.bias);
        bytes[36..40].copy_from_slice(&self.data_len.to_le_bytes());
        bytes
    }

    pub fn from_bytes(bytes: &[u8]) -> Option<Self> {
        if bytes.len() < Self::SIZE {
            return None;
        }
        Some(Self {
            semantic: bytes[0],
            compression: bytes[1],
            components: bytes[2],
            flags: bytes[3],
            scale: read_f32s(bytes, 4),
            bias: read_f32s(bytes, 20),
            data_len: read_u32(bytes, 36),
        })
    }
}

#[inline]
fn padding_for(len: usize) -> usize {
    len.next_multiple_of(PAYLOAD_ALIGNMENT) - len
}

/// Write a complete prepared mesh
pub fn write_prepared_mesh<W: Write>(w: &mut W, mesh: &PreparedMesh) -> Result<()> {
    if mesh.channels.len() > u8::MAX as usize {
        anyhow::bail!("Mesh '{}' has {} channels (max 255)", mesh.name, mesh.channels.len());
    }

    let header = PreparedMeshHeader::for_mesh(mesh);
    w.write_all(&header.to_bytes())?;

    for channel in &mesh.channels {
        w.write_all(&ChannelRecord::for_channel(channel).to_bytes())?;
    }

    let zeros = [0u8; PAYLOAD_ALIGNMENT];
    for channel in &mesh.channels {
        let bytes = channel.data.as_bytes();
        w.write_all(bytes)?;
        w.write_all(&zeros[..padding_for(bytes.len())])?;
    }

    match &mesh.indices {
        PreparedIndices::U16(indices) => {
            for i in indices {
                w.write_all(&i.to_le_bytes())?;
            }
        }
        PreparedIndices::U32(indices) => {
            for i in indices {
                w.write_all(&i.to_le_bytes())?;
            }
        }
    }

    Ok(())
}

/// Write a prepared mesh to `output`
pub fn write_prepared_mesh_file(output: &Path, mesh: &PreparedMesh) -> Result<()> {
    if let Some(parent) = output.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create output directory: {:?}", parent))?;
    }
    let file =
        File::create(output).with_context(|| format!("Failed to create output: {:?}", output))?;
    let mut writer = BufWriter::new(file);
    write_prepared_mesh(&mut writer, mesh)?;
    writer.flush()?;
    Ok(())
}

/// Parse and check the header of a prepared mesh file
pub fn read_prepared_header(bytes: &[u8]) -> Result<PreparedMeshHeader> {
    if bytes.len() < PreparedMeshHeader::SIZE {
        anyhow::bail!(
            "File too small for a prepared mesh header ({} < {} bytes)",
            bytes.len(),
            PreparedMeshHeader::SIZE
        );
    }
    if bytes[0..4] != MAGIC {
        anyhow::bail!("Not a prepared mesh file (bad magic {:?})", &bytes[0..4]);
    }
    let header = PreparedMeshHeader::from_bytes(bytes)
        .with_context(|| format!("Invalid index format {}", bytes[6]))?;
    if header.version != VERSION {
        anyhow::bail!("Unsupported prepared mesh version {} (expected {VERSION})", header.version);
    }
    Ok(header)
}

/// Parse the channel records that follow a header
pub fn read_channel_records(bytes: &[u8], header: &PreparedMeshHeader) -> Result<Vec<ChannelRecord>> {
    (0..header.channel_count as usize)
        .map(|i| {
            let offset = PreparedMeshHeader::SIZE + i * ChannelRecord::SIZE;
            bytes
                .get(offset..)
                .and_then(ChannelRecord::from_bytes)
                .with_context(|| format!("Truncated channel record {i}"))
        })
        .collect()
}

/// Total file size implied by a header and its channel records
pub fn expected_file_size(header: &PreparedMeshHeader, records: &[ChannelRecord]) -> usize {
    let payloads: usize = records
        .iter()
        .map(|r| r.data_len as usize + padding_for(r.data_len as usize))
        .sum();
    PreparedMeshHeader::SIZE
        + records.len() * ChannelRecord::SIZE
        + payloads
        + header.index_count as usize * header.index_format.size()
}
