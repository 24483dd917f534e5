//! Hardware register encoding for the fragment lighting stage
//!
//! Reconciliation lowers the in-memory lighting state into these blocks;
//! the render-command emitter reads them verbatim when building a draw.
//! Colors are packed RGB8-in-u32, positions as IEEE half floats, and spot
//! directions as signed 1.11 fixed point (13 bits, two's complement).

use std::sync::Arc;

use bytemuck::{Pod, Zeroable};
use half::f16;

use crate::lut::{LightLut, LightLutDistAttn};

// ============================================================================
// Quantization Helpers
// ============================================================================

/// Pack an f32 color channel [0.0, 1.0] to u8 [0, 255]
#[inline]
pub fn pack_unorm8(value: f32) -> u8 {
    (value.clamp(0.0, 1.0) * 255.0).round() as u8
}

/// Pack an RGB triple to u32 (R in the low byte, high byte zero)
#[inline]
pub fn pack_rgb8(r: f32, g: f32, b: f32) -> u32 {
    (pack_unorm8(r) as u32) | ((pack_unorm8(g) as u32) << 8) | ((pack_unorm8(b) as u32) << 16)
}

/// Pack the component-wise product of two RGB triples
#[inline]
pub fn pack_combined_rgb(a: [f32; 3], b: [f32; 3]) -> u32 {
    pack_rgb8(a[0] * b[0], a[1] * b[1], a[2] * b[2])
}

/// f32 to IEEE half-float bit pattern
#[inline]
pub fn f32_to_f16_bits(value: f32) -> u16 {
    f16::from_f32(value).to_bits()
}

/// f32 to signed 1.11 fixed point (13-bit two's complement in a u16)
///
/// Covers `[-2.0, 2.0)`; direction components are normalized so the usable
/// range is `[-1.0, 1.0]`.
#[inline]
pub fn f32_to_fix1_11(value: f32) -> u16 {
    let clamped = value.clamp(-2.0, 4095.0 / 2048.0);
    let scaled = (clamped * 2048.0).round() as i32;
    (scaled as u16) & 0x1FFF
}

// ============================================================================
// Control Word Layouts
// ============================================================================

/// Per-light control word bits (`LightRegs::control`)
pub mod light_control {
    /// Light vector is a fixed direction, not a position
    pub const DIRECTIONAL: u32 = 1 << 0;
    /// Diffuse term uses `|N.L|` instead of clamping negatives to zero
    pub const TWO_SIDED_DIFFUSE: u32 = 1 << 1;
    /// Cook-Torrance geometric factor on the specular0 term
    pub const GEO_FACTOR_0: u32 = 1 << 2;
    /// Cook-Torrance geometric factor on the specular1 term
    pub const GEO_FACTOR_1: u32 = 1 << 3;
    /// Light receives the shadow map attenuation
    pub const SHADOW: u32 = 1 << 4;
    /// Spotlight cutoff table applies to this light
    pub const SPOT: u32 = 1 << 5;
    /// Distance attenuation table applies to this light
    pub const DIST_ATTN: u32 = 1 << 6;
}

/// Shadow map output mode bits (`LightEnv::set_shadow_mode`)
pub mod shadow_mode {
    /// Shadow attenuates the primary fragment color
    pub const PRIMARY: u32 = 1 << 0;
    /// Shadow attenuates the secondary fragment color
    pub const SECONDARY: u32 = 1 << 1;
    /// Invert the shadow map sample
    pub const INVERT: u32 = 1 << 2;
    /// Shadow attenuates the alpha output
    pub const ALPHA: u32 = 1 << 3;
}

/// Environment control word layout (`LightEnvRegs::control`)
pub mod env_control {
    // control[0]
    pub const BUMP_MODE_SHIFT: u32 = 0; // 2 bits
    pub const BUMP_UNIT_SHIFT: u32 = 2; // 2 bits
    pub const BUMP_NORMAL_Z: u32 = 1 << 4;
    pub const LUT_ENABLE_SHIFT: u32 = 8; // 6 bits, one per LUT slot
    pub const SHADOW_MODE_SHIFT: u32 = 16; // 4 bits
    pub const SHADOW_UNIT_SHIFT: u32 = 20; // 2 bits
    pub const FRESNEL_SHIFT: u32 = 24; // 2 bits
    pub const CLAMP_HIGHLIGHTS: u32 = 1 << 26;

    // control[1]
    pub const SPOT_DISABLE_SHIFT: u32 = 0; // 8 bits, one per light slot
    pub const DIST_ATTN_DISABLE_SHIFT: u32 = 8; // 8 bits, one per light slot
}

// ============================================================================
// Register Blocks
// ============================================================================

/// Per-light register block (44 bytes, POD)
///
/// Color words hold the combined `material x light` products; `position`
/// and `dist_attn_bias`/`dist_attn_scale` are f16 bit patterns, `spot_dir`
/// is signed 1.11 fixed point. The fourth lane of each vector is padding.
#[repr(C)]
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Pod, Zeroable)]
pub struct LightRegs {
    pub specular0: u32,
    pub specular1: u32,
    pub diffuse: u32,
    pub ambient: u32,
    pub position: [u16; 4],
    pub spot_dir: [u16; 4],
    pub control: u32,
    pub dist_attn_bias: u32,
    pub dist_attn_scale: u32,
}

/// Environment register file produced by reconciliation
///
/// The POD words are upload-ready; the `Arc` fields stage the tables the
/// emitter must (re)upload alongside them. Staged references are cheap
/// clones of the caller's tables, never copies of the data.
#[derive(Clone, Debug, Default)]
pub struct LightEnvRegs {
    /// Scene ambient: `emission + material.ambient * env.ambient`, RGB8
    pub ambient: u32,
    /// Number of enabled lights
    pub num_lights: u32,
    /// Enabled light slot ids, one nibble per enabled light in slot order
    pub permutation: u32,
    /// Environment control words (see `env_control`)
    pub control: [u32; 2],
    /// LUT input selector, one nibble per slot
    pub lut_select: u32,
    /// LUT absolute-value bit per slot (set = unsigned inputs, clear = the
    /// input keeps its sign and indexes through the signed domain)
    pub lut_abs: u32,
    /// LUT input scale exponent, one nibble per slot
    pub lut_scale: u32,
    /// Per-light register blocks (slots beyond the attached count stay zero)
    pub lights: [LightRegs; 8],
    /// Environment LUT tables staged for upload
    pub env_luts: [Option<Arc<LightLut>>; 6],
    /// Per-light spotlight tables staged for upload
    pub spot_luts: [Option<Arc<LightLut>>; 8],
    /// Per-light distance attenuation tables staged for upload
    pub dist_attn_luts: [Option<Arc<LightLutDistAttn>>; 8],
}
