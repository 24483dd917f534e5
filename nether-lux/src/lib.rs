//! Nether-Lux: fixed-function fragment lighting state for the Nethercore GPU
//!
//! The lighting stage shades each fragment from a small register file and a
//! set of 256-entry lookup tables. **This crate is the state compiler for
//! that stage** - it models lights, materials, and the light environment on
//! the CPU, tracks which register groups each mutation touches, and lowers
//! only the touched groups into upload-ready register blocks right before a
//! draw. Command submission, texture binding, and the draw path itself live
//! with the caller.
//!
//! # Fragment Light Equation
//!
//! Per fragment, with up to 8 lights:
//!
//! ```text
//! primary   = scene_ambient
//!           + sum_i attn_i * spot_i * shadow * (l_d[i] * f(N.L) + l_a[i])
//! secondary = sum_i attn_i * spot_i * shadow
//!           * (l_s0[i] * d0(x) * G0 + l_s1[i] * d1(x) * G1 * reflect(x))
//! alpha     = fresnel(x)        (routed by the fresnel selector)
//! ```
//!
//! where every color term is a combined `material x light` product encoded
//! at reconcile time, and `d0`, `d1`, `reflect`, `fresnel`, `spot`, and
//! `attn` are sampled lookup tables (see [`LightLut`]).
//!
//! # Architecture
//!
//! **Setters** (raise dirty groups) → **`LightEnv::flush()`** (re-encode
//! exactly the dirty groups, clear them) → **register file** (read by the
//! external render-command emitter).
//!
//! Re-encoding the full lighting configuration every frame would swamp the
//! command stream; the dirty grouping keeps a static scene at zero encoding
//! work per draw.
//!
//! # Usage
//!
//! ```
//! use std::sync::Arc;
//! use nether_lux::{LightEnv, LightLut, LightingContext};
//!
//! let mut env = LightEnv::new();
//! let light = env.add_light().unwrap();
//! env.set_light_color(light, 1.0, 0.95, 0.8);
//! env.set_ambient(0.1, 0.1, 0.1);
//! env.set_lut(
//!     nether_lux::EnvLutId::D0,
//!     nether_lux::LutInput::NormalHalf,
//!     false,
//!     Some(Arc::new(LightLut::phong(30.0))),
//! );
//!
//! let mut ctx = LightingContext::new();
//! ctx.bind(env);
//! let report = ctx.flush().unwrap().unwrap();
//! assert!(report.config || report.lights[0]);
//! ```

mod context;
mod env;
mod light;
mod lut;
mod material;
pub mod regs;

pub use context::LightingContext;
pub use env::{
    BumpMode, EnvConfig, EnvDirty, EnvLutId, FlushReport, FresnelSelector, LightEnv, LightError,
    LutBinding, LutInput, ENV_LUT_COUNT, MAX_LIGHTS,
};
pub use light::{Light, LightDirty, LightId};
pub use lut::{
    decode_delta, decode_value, quadratic_attenuation, LightLut, LightLutDistAttn, LutError,
    LUT_SIZE, LUT_VALUE_STEP,
};
pub use material::Material;
