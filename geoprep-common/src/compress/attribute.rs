//! Attribute quantization
//!
//! Maps float channels onto normalized 8- or 16-bit integers. Three input conventions:
//!
//! - fixed signed (`[-1, 1]`, remapped with `v * 0.5 + 0.5`)
//! - fixed unsigned (`[0, 1]`, used as is)
//! - scale and bias: the per-component min/max of the channel is measured first and
//!   `(v - bias) / scale` lands in `[0, 1]`
//!
//! Values are rounded to the nearest step, so the decode error per component is at most
//! half a step: `scale / (2 * max)`.

use serde::{Deserialize, Serialize};

use crate::buffer::AlignedBuffer;
use crate::error::GeomResult;
use crate::mesh::AttributeDescriptor;
use crate::view::AttributeView;

/// Quantization mode for one vertex channel
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AttributeCompression {
    /// `[-1, 1]` to unorm8
    SFloatNormToU8Norm,
    /// `[0, 1]` to unorm8
    UFloatNormToU8Norm,
    /// Any range to unorm8 through a measured scale/bias
    SFloatToU8NormWithScaleAndBias,
    /// Any range to unorm8 through a measured scale/bias
    UFloatToU8NormWithScaleAndBias,
    /// `[-1, 1]` to unorm16
    SFloatNormToU16Norm,
    /// `[0, 1]` to unorm16
    UFloatNormToU16Norm,
    /// Any range to unorm16 through a measured scale/bias
    SFloatToU16NormWithScaleAndBias,
    /// Any range to unorm16 through a measured scale/bias
    UFloatToU16NormWithScaleAndBias,
}

impl AttributeCompression {
    /// Every mode, in id order
    pub const ALL: [Self; 8] = [
        Self::SFloatNormToU8Norm,
        Self::UFloatNormToU8Norm,
        Self::SFloatToU8NormWithScaleAndBias,
        Self::UFloatToU8NormWithScaleAndBias,
        Self::SFloatNormToU16Norm,
        Self::UFloatNormToU16Norm,
        Self::SFloatToU16NormWithScaleAndBias,
        Self::UFloatToU16NormWithScaleAndBias,
    ];

    /// Stable numeric id used in file formats
    pub const fn id(self) -> u8 {
        match self {
            Self::SFloatNormToU8Norm => 0,
            Self::UFloatNormToU8Norm => 1,
            Self::SFloatToU8NormWithScaleAndBias => 2,
            Self::UFloatToU8NormWithScaleAndBias => 3,
            Self::SFloatNormToU16Norm => 4,
            Self::UFloatNormToU16Norm => 5,
            Self::SFloatToU16NormWithScaleAndBias => 6,
            Self::UFloatToU16NormWithScaleAndBias => 7,
        }
    }

    pub fn from_id(id: u8) -> Option<Self> {
        Self::ALL.get(id as usize).copied()
    }

    #[inline]
    pub const fn is_16bit(self) -> bool {
        self.id() >= 4
    }

    /// Input is expected in `[-1, 1]`
    #[inline]
    pub const fn is_signed(self) -> bool {
        matches!(
            self,
            Self::SFloatNormToU8Norm
                | Self::SFloatToU8NormWithScaleAndBias
                | Self::SFloatNormToU16Norm
                | Self::SFloatToU16NormWithScaleAndBias
        )
    }

    #[inline]
    pub const fn uses_scale_and_bias(self) -> bool {
        matches!(
            self,
            Self::SFloatToU8NormWithScaleAndBias
                | Self::UFloatToU8NormWithScaleAndBias
                | Self::SFloatToU16NormWithScaleAndBias
                | Self::UFloatToU16NormWithScaleAndBias
        )
    }

    /// Largest quantized value (255 or 65535)
    #[inline]
    pub const fn max_int(self) -> u32 {
        if self.is_16bit() { u16::MAX as u32 } else { u8::MAX as u32 }
    }

    /// Bytes per quantized component
    #[inline]
    pub const fn component_size(self) -> usize {
        if self.is_16bit() { 2 } else { 1 }
    }
}

/// Per-component linear parameters: `value = normalized * scale + bias`
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScaleBias {
    pub scale: [f32; 4],
    pub bias: [f32; 4],
}

impl ScaleBias {
    /// Identity mapping (scale 1, bias 0)
    pub const IDENTITY: Self = Self {
        scale: [1.0; 4],
        bias: [0.0; 4],
    };

    /// Measure the per-component range of a channel
    ///
    /// `scale = max - min` and `bias = min`; a zero range gets scale 1. Components the
    /// channel does not have keep the identity mapping.
    pub fn measure(view: &AttributeView<'_>) -> Self {
        if view.is_empty() {
            return Self::IDENTITY;
        }

        let mut min = [f32::MAX; 4];
        let mut max = [-f32::MAX; 4];
        for vertex in view.iter() {
            for (c, &value) in vertex.iter().enumerate() {
                min[c] = min[c].min(value);
                max[c] = max[c].max(value);
            }
        }

        let mut result = Self::IDENTITY;
        for c in 0..view.components() {
            let range = max[c] - min[c];
            result.scale[c] = if range == 0.0 { 1.0 } else { range };
            result.bias[c] = min[c];
        }
        result
    }
}

/// Quantized channel produced by [`compress_vertex_attribute`]
#[derive(Debug, Clone, PartialEq)]
pub struct CompressedAttribute {
    /// `component_count * vertex_count` packed u8 or u16 values
    pub data: AlignedBuffer,
    pub component_count: u8,
    pub vertex_count: u32,
    pub compression: AttributeCompression,
    /// Present for the scale-and-bias modes
    pub scale_bias: Option<ScaleBias>,
}

impl CompressedAttribute {
    /// Quantized values of an 8-bit mode
    pub fn as_u8(&self) -> Option<&[u8]> {
        (!self.compression.is_16bit()).then(|| self.data.as_bytes())
    }

    /// Quantized values of a 16-bit mode
    pub fn as_u16(&self) -> Option<&[u16]> {
        self.compression.is_16bit().then(|| self.data.as_u16())
    }

    /// Quantized value of component `component` of vertex `vertex`
    pub fn quantized(&self, vertex: usize, component: usize) -> u32 {
        let i = vertex * self.component_count as usize + component;
        if self.compression.is_16bit() {
            self.data.as_u16()[i] as u32
        } else {
            self.data.as_bytes()[i] as u32
        }
    }

    /// Reconstruct the float value of one component
    pub fn decode(&self, vertex: usize, component: usize) -> f32 {
        let normalized = self.quantized(vertex, component) as f32 / self.compression.max_int() as f32;
        match &self.scale_bias {
            Some(sb) => normalized * sb.scale[component] + sb.bias[component],
            None if self.compression.is_signed() => normalized * 2.0 - 1.0,
            None => normalized,
        }
    }

    /// Worst-case absolute decode error of one component (for in-range inputs)
    pub fn max_error(&self, component: usize) -> f32 {
        let range = match &self.scale_bias {
            Some(sb) => sb.scale[component],
            None if self.compression.is_signed() => 2.0,
            None => 1.0,
        };
        range / (2.0 * self.compression.max_int() as f32)
    }
}

/// Quantize one channel of an interleaved f32 vertex array
///
/// `vertex_stride` is in bytes; `descriptor` locates the channel in each vertex. Inputs
/// outside the mode's range saturate.
///
/// # Errors
/// Fails with an `InvalidInput` error for a component count of 0 or more than 4 and for a
/// malformed stride/offset, and with `InvalidState` when `data` is shorter than the counts
/// claim. No output is allocated on failure.
pub fn compress_vertex_attribute(
    data: &[f32],
    vertex_stride: u32,
    vertex_count: u32,
    descriptor: AttributeDescriptor,
    compression: AttributeCompression,
) -> GeomResult<CompressedAttribute> {
    let view = AttributeView::new(data, vertex_stride, vertex_count, descriptor)?;
    let components = view.components();

    let scale_bias = compression
        .uses_scale_and_bias()
        .then(|| ScaleBias::measure(&view));
    let signed = compression.is_signed();
    let max = compression.max_int() as f32;

    let mut clamped = 0usize;
    let mut quantize = |value: f32, component: usize| -> u32 {
        let normalized = match &scale_bias {
            Some(sb) => (value - sb.bias[component]) / sb.scale[component],
            None if signed => value * 0.5 + 0.5,
            None => value,
        };
        if !(0.0..=1.0).contains(&normalized) {
            clamped += 1;
        }
        (normalized.clamp(0.0, 1.0) * max + 0.5).floor() as u32
    };

    let mut buffer =
        AlignedBuffer::zeroed(components * view.len() * compression.component_size());
    if compression.is_16bit() {
        let out = buffer.as_u16_mut();
        for (vertex, values) in view.iter().enumerate() {
            for (c, &value) in values.iter().enumerate() {
                out[vertex * components + c] = quantize(value, c) as u16;
            }
        }
    } else {
        let out = buffer.as_bytes_mut();
        for (vertex, values) in view.iter().enumerate() {
            for (c, &value) in values.iter().enumerate() {
                out[vertex * components + c] = quantize(value, c) as u8;
            }
        }
    }

    if clamped > 0 {
        tracing::warn!(
            "{clamped} component(s) outside the {:?} input range were saturated",
            compression
        );
    }

    Ok(CompressedAttribute {
        data: buffer,
        component_count: components as u8,
        vertex_count,
        compression,
        scale_bias,
    })
}
