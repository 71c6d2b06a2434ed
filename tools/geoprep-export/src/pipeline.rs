//! Mesh preparation pipeline
//!
//! Takes an imported (one vertex per face corner) mesh through the geometry core:
//! weld duplicates, compute bounds, then quantize every channel into its final storage.

use anyhow::{Context, Result};
use geoprep_common::{
    compute_aabb, compute_bounding_sphere, merge_duplicated_vertices, Aabb, AlignedBuffer,
    AttributeCompression, BoundingSphere, CompressedAttribute, MergeFlags, MergeStats, Mesh,
    ScaleBias, TangentFrameCompression, VertexSemantic,
};
use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// Default welding distance in mesh units
pub const DEFAULT_WELD_THRESHOLD: f32 = 0.0001;

/// How normals are stored
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NormalEncoding {
    /// Two floats per normal via azimuthal projection
    #[default]
    AzimuthalProjection,
    /// Two floats per normal via sphere mapping
    SphereMapping,
    /// Quantize the three raw components
    None,
}

impl NormalEncoding {
    pub fn tangent_frame(self) -> Option<TangentFrameCompression> {
        match self {
            Self::AzimuthalProjection => Some(TangentFrameCompression::AzimuthalProjection),
            Self::SphereMapping => Some(TangentFrameCompression::SphereMapping),
            Self::None => None,
        }
    }
}

impl FromStr for NormalEncoding {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().replace('-', "_").as_str() {
            "azimuthal_projection" | "azimuthal" => Ok(Self::AzimuthalProjection),
            "sphere_mapping" | "sphere" => Ok(Self::SphereMapping),
            "none" | "raw" => Ok(Self::None),
            _ => Err(format!(
                "unknown normal encoding '{s}' (expected azimuthal_projection, sphere_mapping or none)"
            )),
        }
    }
}

/// Settings for one mesh
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PrepSettings {
    /// Vertices closer than this are welded
    pub weld_threshold: f32,
    /// Only weld vertices whose normals match
    pub match_normals: bool,
    /// Only weld vertices whose first uv set matches
    pub match_uvs: bool,
    pub normal_encoding: NormalEncoding,
    pub position_compression: AttributeCompression,
    /// Defaults to `u_float_norm_to_u16_norm` for encoded normals and
    /// `s_float_norm_to_u16_norm` for raw ones
    pub normal_compression: Option<AttributeCompression>,
    pub uv_compression: AttributeCompression,
    pub color_compression: AttributeCompression,
    /// Keep the importer's vertices as they are
    pub skip_merge: bool,
}

impl Default for PrepSettings {
    fn default() -> Self {
        Self {
            weld_threshold: DEFAULT_WELD_THRESHOLD,
            match_normals: true,
            match_uvs: true,
            normal_encoding: NormalEncoding::default(),
            position_compression: AttributeCompression::UFloatToU16NormWithScaleAndBias,
            normal_compression: None,
            uv_compression: AttributeCompression::UFloatToU16NormWithScaleAndBias,
            color_compression: AttributeCompression::UFloatNormToU8Norm,
            skip_merge: false,
        }
    }
}

impl PrepSettings {
    /// Check settings that would otherwise only fail deep inside the pipeline
    pub fn validate(&self) -> Result<()> {
        if !self.weld_threshold.is_finite() || self.weld_threshold < 0.0 {
            anyhow::bail!(
                "Invalid weld_threshold {} (must be a finite value >= 0)",
                self.weld_threshold
            );
        }
        Ok(())
    }

    pub fn merge_flags(&self) -> MergeFlags {
        let mut flags = MergeFlags::NONE;
        if self.match_normals {
            flags |= MergeFlags::NORMAL_EXACT;
        }
        if self.match_uvs {
            flags |= MergeFlags::UV0_EXACT;
        }
        flags
    }

    /// Quantization applied to the (possibly encoded) normal channel
    pub fn effective_normal_compression(&self) -> AttributeCompression {
        self.normal_compression
            .unwrap_or(match self.normal_encoding {
                NormalEncoding::None => AttributeCompression::SFloatNormToU16Norm,
                _ => AttributeCompression::UFloatNormToU16Norm,
            })
    }
}

/// One stored vertex channel
#[derive(Debug, Clone, PartialEq)]
pub struct PreparedChannel {
    pub semantic: VertexSemantic,
    /// Components per vertex as stored (2 for encoded normals)
    pub components: u8,
    /// `None` for channels stored as raw f32
    pub compression: Option<AttributeCompression>,
    pub normal_encoding: Option<TangentFrameCompression>,
    pub scale_bias: Option<ScaleBias>,
    pub data: AlignedBuffer,
}

impl PreparedChannel {
    fn quantized(
        semantic: VertexSemantic,
        attribute: CompressedAttribute,
        normal_encoding: Option<TangentFrameCompression>,
    ) -> Self {
        Self {
            semantic,
            components: attribute.component_count,
            compression: Some(attribute.compression),
            normal_encoding,
            scale_bias: attribute.scale_bias,
            data: attribute.data,
        }
    }

    fn raw(mesh: &Mesh, semantic: VertexSemantic) -> Result<Self> {
        let view = mesh.view(semantic)?;
        let values: Vec<f32> = view.iter().flatten().copied().collect();
        Ok(Self {
            semantic,
            components: view.components() as u8,
            compression: None,
            normal_encoding: None,
            scale_bias: None,
            data: AlignedBuffer::from_f32s(&values),
        })
    }
}

/// Index buffer in its final width
#[derive(Debug, Clone, PartialEq)]
pub enum PreparedIndices {
    U16(Vec<u16>),
    U32(Vec<u32>),
}

impl PreparedIndices {
    /// Narrow to u16 when every vertex is addressable with 16 bits
    pub fn from_indices(indices: &[u32], vertex_count: u32) -> Self {
        if vertex_count <= u16::MAX as u32 + 1 {
            Self::U16(indices.iter().map(|&i| i as u16).collect())
        } else {
            Self::U32(indices.to_vec())
        }
    }

    pub fn len(&self) -> usize {
        match self {
            Self::U16(i) => i.len(),
            Self::U32(i) => i.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Bytes per index
    pub fn index_size(&self) -> usize {
        match self {
            Self::U16(_) => 2,
            Self::U32(_) => 4,
        }
    }
}

/// Fully prepared mesh, ready to be written
#[derive(Debug, Clone, PartialEq)]
pub struct PreparedMesh {
    pub name: String,
    pub name_hash: u64,
    pub material: Option<String>,
    pub vertex_count: u32,
    pub aabb: Aabb,
    pub sphere: BoundingSphere,
    /// `None` when merging was skipped
    pub merge: Option<MergeStats>,
    pub channels: Vec<PreparedChannel>,
    pub indices: PreparedIndices,
}

/// Run the full preparation pipeline on an imported mesh
pub fn prepare_mesh(mut mesh: Mesh, settings: &PrepSettings) -> Result<PreparedMesh> {
    settings.validate()?;

    let merge = if settings.skip_merge {
        mesh.validate()
            .with_context(|| format!("Invalid mesh '{}'", mesh.name))?;
        None
    } else {
        let stats = merge_duplicated_vertices(
            &mut mesh,
            settings.weld_threshold,
            settings.merge_flags(),
        )
        .with_context(|| format!("Failed to merge vertices of '{}'", mesh.name))?;
        Some(stats)
    };

    let aabb = compute_aabb(&mesh)?;
    let sphere = compute_bounding_sphere(&mesh)?;

    let semantics: Vec<VertexSemantic> = mesh.layout().present().map(|(s, _)| s).collect();
    let mut channels = Vec::with_capacity(semantics.len());
    for semantic in semantics {
        let channel = prepare_channel(&mesh, semantic, settings)
            .with_context(|| format!("Failed to compress {semantic:?} of '{}'", mesh.name))?;
        channels.push(channel);
    }

    let indices = PreparedIndices::from_indices(mesh.indices(), mesh.vertex_count());

    tracing::info!(
        "Prepared mesh '{}': {} vertices, {} indices ({}-bit), {} channels",
        mesh.name,
        mesh.vertex_count(),
        indices.len(),
        indices.index_size() * 8,
        channels.len()
    );

    Ok(PreparedMesh {
        name_hash: mesh.name_hash(),
        vertex_count: mesh.vertex_count(),
        name: mesh.name,
        material: mesh.material,
        aabb,
        sphere,
        merge,
        channels,
        indices,
    })
}

fn prepare_channel(
    mesh: &Mesh,
    semantic: VertexSemantic,
    settings: &PrepSettings,
) -> Result<PreparedChannel> {
    let channel = match semantic {
        VertexSemantic::Position => PreparedChannel::quantized(
            semantic,
            mesh.compress_attribute(semantic, settings.position_compression)?,
            None,
        ),
        VertexSemantic::Normal => {
            let compression = settings.effective_normal_compression();
            match settings.normal_encoding.tangent_frame() {
                Some(mode) => {
                    let encoded = mesh.compress_tangent_space(mode)?;
                    PreparedChannel::quantized(semantic, encoded.compress(compression)?, Some(mode))
                }
                None => PreparedChannel::quantized(
                    semantic,
                    mesh.compress_attribute(semantic, compression)?,
                    None,
                ),
            }
        }
        VertexSemantic::Uv(0) => PreparedChannel::quantized(
            semantic,
            mesh.compress_attribute(semantic, settings.uv_compression)?,
            None,
        ),
        VertexSemantic::Color => PreparedChannel::quantized(
            semantic,
            mesh.compress_attribute(semantic, settings.color_compression)?,
            None,
        ),
        _ => {
            tracing::debug!("Storing {semantic:?} of '{}' as raw f32", mesh.name);
            PreparedChannel::raw(mesh, semantic)?
        }
    };
    Ok(channel)
}
