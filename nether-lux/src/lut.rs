//! Lighting lookup table generation
//!
//! The fragment lighting stage approximates every continuous factor of the
//! lighting equation (specular falloff, spotlight cutoff, distance
//! attenuation, fresnel) by sampling it into a 256-entry table that the GPU
//! indexes per fragment. Each entry also carries the delta to the next
//! sample so the hardware can linearly interpolate between adjacent entries.
//!
//! # Entry Format
//!
//! ```text
//! Table entry (u32, repeats 256 times):
//!   bits  0-11: sampled value, unsigned 0.12 fixed point (saturating)
//!   bits 12-23: delta to next entry, signed 0.11 fixed point (saturating)
//!   bits 24-31: unused
//! ```
//!
//! The delta of entry 255 wraps back to entry 0 - the table is logically
//! circular, which is what makes the signed domain work: inputs in
//! `[-128,128)` index the table through two's-complement wraparound, so
//! negative inputs land in the upper half.
//!
//! # Domains
//!
//! - unsigned: `x` in `[0,256)`, index = `x`.
//! - signed: `x` in `[-128,128)`, index = `x mod 256`. Used for functions of
//!   a cosine/dot-product input scaled to the index range.
//!
//! Generation is deterministic: the same function and parameter always
//! produce an identical table.

use thiserror::Error;

/// Number of entries in a lighting lookup table
pub const LUT_SIZE: usize = 256;

/// One fixed-point step of an encoded table value (1/4096)
pub const LUT_VALUE_STEP: f32 = 1.0 / 4096.0;

/// Errors from distance attenuation table construction
#[derive(Debug, Error, Clone, Copy, PartialEq)]
pub enum LutError {
    /// `to` must be strictly greater than `from`
    #[error("degenerate attenuation range: from={from} to={to} (need to > from)")]
    DegenerateRange { from: f32, to: f32 },
}

// =============================================================================
// Entry encoding
// =============================================================================

/// Encode one (value, delta-to-next) pair into the hardware entry format
#[inline]
fn encode_entry(value: f32, delta: f32) -> u32 {
    let mut val = 0u32;
    if value > 0.0 {
        let scaled = value * 4096.0;
        val = if scaled < 4096.0 { scaled as u32 } else { 0xFFF };
    }

    let mut diff = 0u32;
    if delta != 0.0 {
        let scaled = (delta * 2048.0).clamp(-2048.0, 2047.0);
        diff = (scaled as i32 as u32) & 0xFFF;
    }

    val | (diff << 12)
}

/// Decode the value field of an entry back to f32
#[inline]
pub fn decode_value(entry: u32) -> f32 {
    (entry & 0xFFF) as f32 / 4096.0
}

/// Decode the delta field of an entry back to f32 (sign-extends 12 bits)
#[inline]
pub fn decode_delta(entry: u32) -> f32 {
    let bits = ((entry >> 12) & 0xFFF) as i32;
    let signed = (bits << 20) >> 20;
    signed as f32 / 2048.0
}

// =============================================================================
// LightLut
// =============================================================================

/// A 256-entry lighting lookup table in the encoded hardware format
#[derive(Clone, PartialEq, Eq)]
pub struct LightLut {
    data: [u32; LUT_SIZE],
}

impl Default for LightLut {
    fn default() -> Self {
        Self {
            data: [0; LUT_SIZE],
        }
    }
}

impl std::fmt::Debug for LightLut {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        // 256 raw words are noise in test output; summarize the endpoints
        f.debug_struct("LightLut")
            .field("first", &self.data[0])
            .field("last", &self.data[LUT_SIZE - 1])
            .finish()
    }
}

impl LightLut {
    /// Build a table from 256 pre-computed values
    ///
    /// Values are encoded verbatim (saturating to the representable range);
    /// deltas are derived from successive differences, with the final delta
    /// wrapping to the first entry.
    pub fn from_array(values: &[f32; LUT_SIZE]) -> Self {
        let mut data = [0u32; LUT_SIZE];
        for (i, entry) in data.iter_mut().enumerate() {
            let value = values[i];
            let next = values[(i + 1) % LUT_SIZE];
            *entry = encode_entry(value, next - value);
        }
        Self { data }
    }

    /// Build a table by sampling `func(x, param)` over the index domain
    ///
    /// With `signed_domain` false, `x` runs over `[0,256)`; with it true,
    /// `x` runs over `[-128,128)` with sign preserved, and each sample is
    /// stored at `x mod 256` so the hardware's two's-complement indexing
    /// finds it.
    pub fn from_func<F>(func: F, param: f32, signed_domain: bool) -> Self
    where
        F: Fn(f32, f32) -> f32,
    {
        let mut values = [0f32; LUT_SIZE];
        if signed_domain {
            for x in -128i32..128 {
                values[(x & 0xFF) as usize] = func(x as f32, param);
            }
        } else {
            for (i, value) in values.iter_mut().enumerate() {
                *value = func(i as f32, param);
            }
        }
        Self::from_array(&values)
    }

    /// Specular falloff table: `(x/255)^shininess` over the unsigned domain
    pub fn phong(shininess: f32) -> Self {
        Self::from_func(|x, s| (x / 255.0).powf(s), shininess, false)
    }

    /// Hard-edged spotlight cutoff table for the given beam angle (radians)
    ///
    /// The signed-domain input is the cosine of the fragment's angle to the
    /// spot axis, scaled to the index range; entries inside the beam are 1,
    /// the rest 0.
    pub fn spotlight(angle: f32) -> Self {
        let cutoff = angle.cos() * 128.0;
        Self::from_func(|x, cutoff| if x >= cutoff { 1.0 } else { 0.0 }, cutoff, true)
    }

    /// Raw encoded entries
    pub fn data(&self) -> &[u32; LUT_SIZE] {
        &self.data
    }

    /// Encoded entries as bytes, ready for upload
    pub fn as_bytes(&self) -> &[u8] {
        bytemuck::cast_slice(&self.data)
    }

    /// Decoded value at `index`
    pub fn decoded_value(&self, index: usize) -> f32 {
        decode_value(self.data[index])
    }

    /// Decoded delta at `index`
    pub fn decoded_delta(&self, index: usize) -> f32 {
        decode_delta(self.data[index])
    }
}

// =============================================================================
// Distance attenuation
// =============================================================================

/// Quadratic distance falloff `1 / (1 + linear*d + quad*d^2)`
#[inline]
pub fn quadratic_attenuation(dist: f32, linear: f32, quad: f32) -> f32 {
    1.0 / (1.0 + linear * dist + quad * dist * dist)
}

/// A lighting lookup table remapped over a world-space distance range
///
/// `bias` and `scale` convert a distance into the table's sampling domain:
/// `index_input = distance * scale + bias`, so `from` maps to entry 0 and
/// `to` maps to entry 255.
#[derive(Clone, Debug, PartialEq)]
pub struct LightLutDistAttn {
    lut: LightLut,
    bias: f32,
    scale: f32,
}

impl LightLutDistAttn {
    /// Sample `func(dist, arg0, arg1)` at 256 evenly spaced distances over
    /// `[from, to]` and derive the bias/scale remap
    ///
    /// Rejects `to <= from` - the remap would divide by zero or invert.
    pub fn new<F>(func: F, from: f32, to: f32, arg0: f32, arg1: f32) -> Result<Self, LutError>
    where
        F: Fn(f32, f32, f32) -> f32,
    {
        if to <= from {
            return Err(LutError::DegenerateRange { from, to });
        }

        let scale = 1.0 / (to - from);
        let bias = -from * scale;

        let mut values = [0f32; LUT_SIZE];
        for (i, value) in values.iter_mut().enumerate() {
            let dist = from + (to - from) * (i as f32 / (LUT_SIZE - 1) as f32);
            *value = func(dist, arg0, arg1);
        }

        Ok(Self {
            lut: LightLut::from_array(&values),
            bias,
            scale,
        })
    }

    /// Quadratic attenuation table over `[from, to]`
    pub fn quadratic(from: f32, to: f32, linear: f32, quad: f32) -> Result<Self, LutError> {
        Self::new(quadratic_attenuation, from, to, linear, quad)
    }

    /// Underlying encoded table
    pub fn lut(&self) -> &LightLut {
        &self.lut
    }

    /// Distance remap bias
    pub fn bias(&self) -> f32 {
        self.bias
    }

    /// Distance remap scale
    pub fn scale(&self) -> f32 {
        self.scale
    }

    /// Table index a world-space distance samples, clamped to the domain
    pub fn index_for(&self, distance: f32) -> usize {
        let t = (distance * self.scale + self.bias).clamp(0.0, 1.0);
        (t * (LUT_SIZE - 1) as f32).round() as usize
    }
}

// =============================================================================
// Tests
// =============================================================================
