//! Light environment state and dirty-flag reconciliation
//!
//! `LightEnv` is the CPU-side staging model for the fragment lighting
//! stage: the application mutates it freely between draws, each setter
//! raising the dirty group its field encodes into, and the render-command
//! emitter calls `flush()` right before a draw to lower exactly the dirty
//! groups into the shadow register file. Clean groups keep their previous
//! encoding untouched.
//!
//! Dirty groups, and what `flush()` re-encodes for each:
//!
//! | Group            | Raised by                         | Registers touched                      |
//! |------------------|-----------------------------------|----------------------------------------|
//! | `config`         | ambient + env config setters      | scene ambient, env control word 0      |
//! | `material`       | `set_material`                    | scene ambient, all combined colors     |
//! | `luts[slot]`     | `set_lut`                         | input select/abs/scale nibbles, upload |
//! | light `config`   | enable/position/flag setters      | light control, position, permutation   |
//! | light `colors`   | per-light color setters           | that light's combined color words      |
//! | light `spot`     | spot direction/table setters      | spot direction words, table upload     |
//! | light `dist_attn`| distance attenuation setters      | bias/scale words, table upload         |

use std::sync::Arc;

use glam::Vec4;
use thiserror::Error;
use tracing::{debug, warn};

use crate::light::{Light, LightId};
use crate::lut::{LightLut, LightLutDistAttn};
use crate::material::Material;
use crate::regs::{
    self, env_control, light_control, pack_combined_rgb, pack_rgb8, LightEnvRegs,
};

/// Maximum number of lights attached to one environment
pub const MAX_LIGHTS: usize = 8;

/// Number of environment LUT slots
pub const ENV_LUT_COUNT: usize = 6;

/// Errors from light environment operations
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum LightError {
    /// All 8 light slots are occupied
    #[error("light environment is full ({} lights attached)", MAX_LIGHTS)]
    TooManyLights,
    /// Bump/shadow textures can only live on units 0-2
    #[error("texture unit {0} out of range (must be 0-2)")]
    InvalidTextureUnit(u32),
    /// Flushing an environment with no enabled light would leave the
    /// hardware in an undefined state
    #[error("no enabled light is attached to the environment")]
    NoEnabledLights,
}

// ============================================================================
// Config Vocabulary
// ============================================================================

/// Environment LUT slot, keyed by the lighting function it feeds
#[repr(usize)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EnvLutId {
    /// Specular0 distribution factor
    D0 = 0,
    /// Specular1 distribution factor
    D1 = 1,
    /// Fresnel factor feeding the alpha output
    Fresnel = 2,
    /// Reflection table, red channel
    ReflectR = 3,
    /// Reflection table, green channel
    ReflectG = 4,
    /// Reflection table, blue channel
    ReflectB = 5,
}

impl EnvLutId {
    /// Slot index in the environment's LUT array
    pub fn slot(self) -> usize {
        self as usize
    }
}

/// Which per-fragment dot product feeds a LUT lookup
#[repr(u32)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LutInput {
    /// Normal with the half vector (N.H)
    #[default]
    NormalHalf = 0,
    /// View with the half vector (V.H)
    ViewHalf = 1,
    /// Normal with the view vector (N.V)
    NormalView = 2,
    /// Light vector with the normal (L.N)
    LightNormal = 3,
    /// Negated light vector with the spot direction (-L.P)
    NegLightSpot = 4,
    /// Cosine of the half-vector angle in the tangent plane
    CosPhi = 5,
}

impl LutInput {
    pub fn from_u32(value: u32) -> Self {
        match value {
            0 => LutInput::NormalHalf,
            1 => LutInput::ViewHalf,
            2 => LutInput::NormalView,
            3 => LutInput::LightNormal,
            4 => LutInput::NegLightSpot,
            5 => LutInput::CosPhi,
            _ => LutInput::NormalHalf,
        }
    }
}

/// Which fragment color outputs receive the fresnel alpha term
#[repr(u32)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FresnelSelector {
    /// Alpha output untouched
    #[default]
    Disabled = 0,
    /// Primary color alpha
    PrimaryAlpha = 1,
    /// Secondary color alpha
    SecondaryAlpha = 2,
    /// Both alphas
    Both = 3,
}

impl FresnelSelector {
    pub fn from_u32(value: u32) -> Self {
        match value {
            1 => FresnelSelector::PrimaryAlpha,
            2 => FresnelSelector::SecondaryAlpha,
            3 => FresnelSelector::Both,
            _ => FresnelSelector::Disabled,
        }
    }
}

/// Bump map interpretation
#[repr(u32)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BumpMode {
    /// Bump mapping off
    #[default]
    NotUsed = 0,
    /// Texture holds a normal map
    NormalMap = 1,
    /// Texture holds a tangent map
    TangentMap = 2,
}

impl BumpMode {
    pub fn from_u32(value: u32) -> Self {
        match value {
            1 => BumpMode::NormalMap,
            2 => BumpMode::TangentMap,
            _ => BumpMode::NotUsed,
        }
    }
}

/// Per-slot LUT input configuration
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LutBinding {
    pub input: LutInput,
    /// Inputs index through the signed domain instead of their absolute value
    pub signed: bool,
    /// Input scale factor (power of two; no setter, kept at 1.0)
    pub scale: f32,
}

impl Default for LutBinding {
    fn default() -> Self {
        Self {
            input: LutInput::default(),
            signed: false,
            scale: 1.0,
        }
    }
}

/// Environment-wide lighting configuration
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct EnvConfig {
    pub fresnel: FresnelSelector,
    pub bump_mode: BumpMode,
    pub bump_unit: u8,
    /// Use the normal map's z component instead of reconstructing it
    pub bump_normal_z: bool,
    /// Bit combination of `regs::shadow_mode` flags
    pub shadow_mode: u32,
    pub shadow_unit: u8,
    pub clamp_highlights: bool,
    pub lut_inputs: [LutBinding; ENV_LUT_COUNT],
}

// ============================================================================
// Dirty State
// ============================================================================

/// Environment-level dirty groups (per-light groups live on each light)
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EnvDirty {
    pub config: bool,
    pub material: bool,
    pub luts: [bool; ENV_LUT_COUNT],
}

impl EnvDirty {
    pub fn any(&self) -> bool {
        self.config || self.material || self.luts.iter().any(|&d| d)
    }
}

/// Which register groups a `flush()` re-encoded
///
/// Also doubles as the pending-work summary returned by
/// `LightEnv::pending()`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FlushReport {
    pub config: bool,
    pub material: bool,
    pub luts: [bool; ENV_LUT_COUNT],
    pub lights: [bool; MAX_LIGHTS],
}

impl FlushReport {
    pub fn any(&self) -> bool {
        self.config
            || self.material
            || self.luts.iter().any(|&d| d)
            || self.lights.iter().any(|&d| d)
    }
}

// ============================================================================
// LightEnv
// ============================================================================

/// Aggregate lighting state for one scene configuration
#[derive(Debug, Clone, Default)]
pub struct LightEnv {
    ambient: [f32; 3],
    material: Material,
    luts: [Option<Arc<LightLut>>; ENV_LUT_COUNT],
    lights: Vec<Light>,
    config: EnvConfig,
    dirty: EnvDirty,
    regs: LightEnvRegs,
}

impl LightEnv {
    /// Fresh environment: black ambient, identity material, no lights, no
    /// tables, all dirty state clear
    pub fn new() -> Self {
        Self::default()
    }

    /// Reset to the freshly initialized state
    pub fn reset(&mut self) {
        *self = Self::new();
    }

    // ------------------------------------------------------------------
    // Environment setters
    // ------------------------------------------------------------------

    /// Copy a material in; combined colors re-encode on the next flush
    pub fn set_material(&mut self, material: &Material) {
        self.material = *material;
        self.dirty.material = true;
    }

    /// Scene ambient color
    pub fn set_ambient(&mut self, r: f32, g: f32, b: f32) {
        self.ambient = [r, g, b];
        self.dirty.config = true;
    }

    /// Attach, replace, or clear an environment LUT slot
    ///
    /// `lut = None` clears the slot, removing that function's contribution
    /// from the lighting equation entirely. The input selector and sign
    /// convention are recorded in the config and encoded with the slot.
    pub fn set_lut(
        &mut self,
        id: EnvLutId,
        input: LutInput,
        signed: bool,
        lut: Option<Arc<LightLut>>,
    ) {
        let slot = id.slot();
        let scale = self.config.lut_inputs[slot].scale;
        self.config.lut_inputs[slot] = LutBinding {
            input,
            signed,
            scale,
        };
        self.luts[slot] = lut;
        self.dirty.luts[slot] = true;
    }

    /// Choose which alpha outputs receive the fresnel term
    pub fn set_fresnel(&mut self, selector: FresnelSelector) {
        self.config.fresnel = selector;
        self.dirty.config = true;
    }

    pub fn set_bump_mode(&mut self, mode: BumpMode) {
        self.config.bump_mode = mode;
        self.dirty.config = true;
    }

    /// Texture unit holding the bump map (0-2)
    pub fn set_bump_texture_unit(&mut self, unit: u32) -> Result<(), LightError> {
        if unit > 2 {
            return Err(LightError::InvalidTextureUnit(unit));
        }
        self.config.bump_unit = unit as u8;
        self.dirty.config = true;
        Ok(())
    }

    /// Use the normal map's z component instead of reconstructing it from xy
    pub fn set_bump_normal_z(&mut self, enable: bool) {
        self.config.bump_normal_z = enable;
        self.dirty.config = true;
    }

    /// Bit combination of `regs::shadow_mode` flags
    pub fn set_shadow_mode(&mut self, mode: u32) {
        self.config.shadow_mode = mode;
        self.dirty.config = true;
    }

    /// Texture unit holding the shadow map (0-2)
    pub fn set_shadow_texture_unit(&mut self, unit: u32) -> Result<(), LightError> {
        if unit > 2 {
            return Err(LightError::InvalidTextureUnit(unit));
        }
        self.config.shadow_unit = unit as u8;
        self.dirty.config = true;
        Ok(())
    }

    /// Clamp specular highlights where the light faces away from the normal
    pub fn set_clamp_highlights(&mut self, clamp: bool) {
        self.config.clamp_highlights = clamp;
        self.dirty.config = true;
    }

    // ------------------------------------------------------------------
    // Light attachment and per-light setters
    // ------------------------------------------------------------------

    /// Attach a new light in the lowest free slot
    ///
    /// The light starts enabled with all of its register groups dirty.
    /// Fails without mutating anything once all 8 slots are occupied.
    pub fn add_light(&mut self) -> Result<LightId, LightError> {
        if self.lights.len() >= MAX_LIGHTS {
            return Err(LightError::TooManyLights);
        }
        let id = self.lights.len() as u8;
        self.lights.push(Light::new(id));
        debug!("add_light: attached light in slot {}", id);
        Ok(LightId(id))
    }

    /// Enable or disable a light source
    ///
    /// At least one light must be enabled by the time the environment is
    /// flushed; `flush()` rejects the draw otherwise.
    pub fn set_light_enabled(&mut self, id: LightId, enable: bool) {
        let Some(light) = self.light_slot_mut(id, "set_light_enabled") else {
            return;
        };
        light.enabled = enable;
        light.dirty.config = true;
    }

    /// Illuminate both faces of a surface
    pub fn set_light_two_sided_diffuse(&mut self, id: LightId, enable: bool) {
        let Some(light) = self.light_slot_mut(id, "set_light_two_sided_diffuse") else {
            return;
        };
        light.two_sided_diffuse = enable;
        light.dirty.config = true;
    }

    /// Toggle a Cook-Torrance geometric factor (`factor` 0 or 1)
    ///
    /// When enabled the factor multiplies the matching specular term;
    /// disabled it contributes 1.
    pub fn set_light_geo_factor(&mut self, id: LightId, factor: usize, enable: bool) {
        if factor > 1 {
            warn!(
                "set_light_geo_factor: invalid factor id {} (must be 0 or 1)",
                factor
            );
            return;
        }
        let Some(light) = self.light_slot_mut(id, "set_light_geo_factor") else {
            return;
        };
        light.geo_factor[factor] = enable;
        light.dirty.config = true;
    }

    pub fn set_light_ambient(&mut self, id: LightId, r: f32, g: f32, b: f32) {
        let Some(light) = self.light_slot_mut(id, "set_light_ambient") else {
            return;
        };
        light.ambient = [r, g, b];
        light.dirty.colors = true;
    }

    pub fn set_light_diffuse(&mut self, id: LightId, r: f32, g: f32, b: f32) {
        let Some(light) = self.light_slot_mut(id, "set_light_diffuse") else {
            return;
        };
        light.diffuse = [r, g, b];
        light.dirty.colors = true;
    }

    pub fn set_light_specular0(&mut self, id: LightId, r: f32, g: f32, b: f32) {
        let Some(light) = self.light_slot_mut(id, "set_light_specular0") else {
            return;
        };
        light.specular0 = [r, g, b];
        light.dirty.colors = true;
    }

    pub fn set_light_specular1(&mut self, id: LightId, r: f32, g: f32, b: f32) {
        let Some(light) = self.light_slot_mut(id, "set_light_specular1") else {
            return;
        };
        light.specular1 = [r, g, b];
        light.dirty.colors = true;
    }

    /// Set diffuse, specular0, and specular1 to the same color in one call
    pub fn set_light_color(&mut self, id: LightId, r: f32, g: f32, b: f32) {
        self.set_light_diffuse(id, r, g, b);
        self.set_light_specular0(id, r, g, b);
        self.set_light_specular1(id, r, g, b);
    }

    /// Light position; a nonzero `w` marks the light as directional (the
    /// xyz is then a fixed direction independent of fragment position)
    pub fn set_light_position(&mut self, id: LightId, position: Vec4) {
        let Some(light) = self.light_slot_mut(id, "set_light_position") else {
            return;
        };
        light.position = position.truncate();
        light.directional = position.w != 0.0;
        light.dirty.config = true;
    }

    /// Receive the shadow map attenuation on this light
    pub fn set_light_shadow_enabled(&mut self, id: LightId, enable: bool) {
        let Some(light) = self.light_slot_mut(id, "set_light_shadow_enabled") else {
            return;
        };
        light.shadow_enabled = enable;
        light.dirty.config = true;
    }

    pub fn set_light_spot_enabled(&mut self, id: LightId, enable: bool) {
        let Some(light) = self.light_slot_mut(id, "set_light_spot_enabled") else {
            return;
        };
        light.spot_enabled = enable;
        light.dirty.config = true;
    }

    pub fn set_light_spot_direction(&mut self, id: LightId, x: f32, y: f32, z: f32) {
        let Some(light) = self.light_slot_mut(id, "set_light_spot_direction") else {
            return;
        };
        light.spot_dir = glam::Vec3::new(x, y, z);
        light.dirty.spot = true;
    }

    /// Attach a spotlight cutoff table (see `LightLut::spotlight`)
    pub fn set_light_spot_lut(&mut self, id: LightId, lut: Arc<LightLut>) {
        let Some(light) = self.light_slot_mut(id, "set_light_spot_lut") else {
            return;
        };
        light.spot_lut = Some(lut);
        light.dirty.spot = true;
    }

    pub fn set_light_dist_attn_enabled(&mut self, id: LightId, enable: bool) {
        let Some(light) = self.light_slot_mut(id, "set_light_dist_attn_enabled") else {
            return;
        };
        light.dist_attn_enabled = enable;
        light.dirty.dist_attn = true;
    }

    /// Attach a distance attenuation table
    pub fn set_light_dist_attn(&mut self, id: LightId, lut: Arc<LightLutDistAttn>) {
        let Some(light) = self.light_slot_mut(id, "set_light_dist_attn") else {
            return;
        };
        light.dist_attn = Some(lut);
        light.dirty.dist_attn = true;
    }

    // ------------------------------------------------------------------
    // Read surface
    // ------------------------------------------------------------------

    /// Attached lights in slot order
    pub fn lights(&self) -> &[Light] {
        &self.lights
    }

    pub fn light(&self, id: LightId) -> Option<&Light> {
        self.lights.get(id.index())
    }

    pub fn light_count(&self) -> usize {
        self.lights.len()
    }

    pub fn lut(&self, id: EnvLutId) -> Option<&Arc<LightLut>> {
        self.luts[id.slot()].as_ref()
    }

    pub fn material(&self) -> &Material {
        &self.material
    }

    pub fn ambient(&self) -> [f32; 3] {
        self.ambient
    }

    pub fn config(&self) -> &EnvConfig {
        &self.config
    }

    /// Shadow register file as of the last flush
    pub fn regs(&self) -> &LightEnvRegs {
        &self.regs
    }

    /// Environment-level dirty groups (per-light groups live on each light)
    pub fn dirty(&self) -> EnvDirty {
        self.dirty
    }

    /// Register groups a flush would re-encode right now
    pub fn pending(&self) -> FlushReport {
        let mut report = FlushReport {
            config: self.dirty.config,
            material: self.dirty.material,
            luts: self.dirty.luts,
            lights: [false; MAX_LIGHTS],
        };
        for light in &self.lights {
            report.lights[light.id().index()] = light.dirty().any();
        }
        report
    }

    pub fn is_dirty(&self) -> bool {
        self.pending().any()
    }

    // ------------------------------------------------------------------
    // Reconciliation
    // ------------------------------------------------------------------

    /// Lower every dirty register group into the shadow register file and
    /// clear the dirty state
    ///
    /// Returns which groups were re-encoded. Fails without touching
    /// anything when no enabled light is attached, so the flush can be
    /// retried once a light is enabled.
    pub fn flush(&mut self) -> Result<FlushReport, LightError> {
        if !self.lights.iter().any(|l| l.enabled()) {
            return Err(LightError::NoEnabledLights);
        }

        let report = self.pending();
        let lut_dirty = self.dirty.luts.iter().any(|&d| d);
        let any_light_config = self.lights.iter().any(|l| l.dirty().config);
        let any_light_dist_attn = self.lights.iter().any(|l| l.dirty().dist_attn);

        // Scene ambient folds the material in, so either group refreshes it
        if self.dirty.config || self.dirty.material {
            let m = &self.material;
            self.regs.ambient = pack_rgb8(
                m.emission[0] + m.ambient[0] * self.ambient[0],
                m.emission[1] + m.ambient[1] * self.ambient[1],
                m.emission[2] + m.ambient[2] * self.ambient[2],
            );
        }

        // Control word 0 carries the LUT enable bits, so a slot change
        // refreshes it as well
        if self.dirty.config || lut_dirty {
            self.regs.control[0] = self.encode_control0();
        }

        for slot in 0..ENV_LUT_COUNT {
            if !self.dirty.luts[slot] {
                continue;
            }
            let binding = self.config.lut_inputs[slot];
            set_nibble(&mut self.regs.lut_select, slot, binding.input as u32);
            set_nibble(&mut self.regs.lut_scale, slot, lut_scale_code(binding.scale));
            if binding.signed {
                self.regs.lut_abs &= !(1 << slot);
            } else {
                self.regs.lut_abs |= 1 << slot;
            }
            self.regs.env_luts[slot] = self.luts[slot].clone();
        }

        // Enabled-light bookkeeping: count, hardware permutation, and the
        // per-light spot/attenuation disable masks
        if any_light_config {
            let mut num_lights = 0u32;
            let mut permutation = 0u32;
            for light in &self.lights {
                if !light.enabled() {
                    continue;
                }
                permutation |= (light.id().index() as u32) << (4 * num_lights);
                num_lights += 1;
            }
            self.regs.num_lights = num_lights;
            self.regs.permutation = permutation;
        }
        if any_light_config || any_light_dist_attn {
            self.regs.control[1] = self.encode_control1();
        }

        let material_dirty = self.dirty.material;
        let Self {
            lights,
            regs,
            material,
            ..
        } = self;
        for light in lights.iter_mut() {
            let slot = light.id().index();
            let d = light.dirty();
            let reg = &mut regs.lights[slot];

            // DA enable lives in the per-light control word
            if d.config || d.dist_attn {
                let mut control = 0u32;
                if light.directional() {
                    control |= light_control::DIRECTIONAL;
                }
                if light.two_sided_diffuse() {
                    control |= light_control::TWO_SIDED_DIFFUSE;
                }
                if light.geo_factor(0) {
                    control |= light_control::GEO_FACTOR_0;
                }
                if light.geo_factor(1) {
                    control |= light_control::GEO_FACTOR_1;
                }
                if light.shadow_enabled() {
                    control |= light_control::SHADOW;
                }
                if light.spot_enabled() {
                    control |= light_control::SPOT;
                }
                if light.dist_attn_enabled() {
                    control |= light_control::DIST_ATTN;
                }
                reg.control = control;
            }

            if d.config {
                let pos = light.position();
                reg.position = [
                    regs::f32_to_f16_bits(pos.x),
                    regs::f32_to_f16_bits(pos.y),
                    regs::f32_to_f16_bits(pos.z),
                    0,
                ];
            }

            if d.colors || material_dirty {
                reg.ambient = pack_combined_rgb(material.ambient, light.ambient());
                reg.diffuse = pack_combined_rgb(material.diffuse, light.diffuse());
                reg.specular0 = pack_combined_rgb(material.specular0, light.specular0());
                reg.specular1 = pack_combined_rgb(material.specular1, light.specular1());
            }

            if d.spot {
                let dir = light.spot_dir();
                reg.spot_dir = [
                    regs::f32_to_fix1_11(dir.x),
                    regs::f32_to_fix1_11(dir.y),
                    regs::f32_to_fix1_11(dir.z),
                    0,
                ];
            }

            if d.dist_attn {
                let (bias, scale) = light
                    .dist_attn()
                    .map(|da| (da.bias(), da.scale()))
                    .unwrap_or((0.0, 0.0));
                reg.dist_attn_bias = regs::f32_to_f16_bits(bias) as u32;
                reg.dist_attn_scale = regs::f32_to_f16_bits(scale) as u32;
            }

            if d.spot {
                regs.spot_luts[slot] = light.spot_lut().cloned();
            }
            if d.dist_attn {
                regs.dist_attn_luts[slot] = light.dist_attn().cloned();
            }

            light.dirty.clear();
        }

        self.dirty = EnvDirty::default();

        if report.any() {
            debug!(
                "flush: re-encoded config={} material={} luts={:?} lights={:?}",
                report.config, report.material, report.luts, report.lights
            );
        }
        Ok(report)
    }

    fn encode_control0(&self) -> u32 {
        let cfg = &self.config;
        let mut word = 0u32;
        word |= (cfg.bump_mode as u32) << env_control::BUMP_MODE_SHIFT;
        word |= (cfg.bump_unit as u32) << env_control::BUMP_UNIT_SHIFT;
        if cfg.bump_normal_z {
            word |= env_control::BUMP_NORMAL_Z;
        }
        for slot in 0..ENV_LUT_COUNT {
            if self.luts[slot].is_some() {
                word |= 1 << (env_control::LUT_ENABLE_SHIFT + slot as u32);
            }
        }
        word |= (cfg.shadow_mode & 0xF) << env_control::SHADOW_MODE_SHIFT;
        word |= (cfg.shadow_unit as u32) << env_control::SHADOW_UNIT_SHIFT;
        word |= (cfg.fresnel as u32) << env_control::FRESNEL_SHIFT;
        if cfg.clamp_highlights {
            word |= env_control::CLAMP_HIGHLIGHTS;
        }
        word
    }

    fn encode_control1(&self) -> u32 {
        let mut word = 0u32;
        for slot in 0..MAX_LIGHTS {
            let light = self.lights.get(slot);
            if light.is_none_or(|l| !l.spot_enabled()) {
                word |= 1 << (env_control::SPOT_DISABLE_SHIFT + slot as u32);
            }
            if light.is_none_or(|l| !l.dist_attn_enabled()) {
                word |= 1 << (env_control::DIST_ATTN_DISABLE_SHIFT + slot as u32);
            }
        }
        word
    }

    fn light_slot_mut(&mut self, id: LightId, op: &str) -> Option<&mut Light> {
        let count = self.lights.len();
        match self.lights.get_mut(id.index()) {
            Some(light) => Some(light),
            None => {
                warn!(
                    "{}: light slot {} not attached ({} lights)",
                    op,
                    id.index(),
                    count
                );
                None
            }
        }
    }
}

/// Replace the 4-bit field for `slot` in a packed config word
#[inline]
fn set_nibble(word: &mut u32, slot: usize, value: u32) {
    let shift = (slot * 4) as u32;
    *word = (*word & !(0xF << shift)) | ((value & 0xF) << shift);
}

/// Encode a LUT input scale factor as its register code
///
/// Only power-of-two scales exist in hardware; anything else falls back to
/// 1x.
fn lut_scale_code(scale: f32) -> u32 {
    if scale == 2.0 {
        1
    } else if scale == 4.0 {
        2
    } else if scale == 8.0 {
        3
    } else if scale == 0.25 {
        6
    } else if scale == 0.5 {
        7
    } else {
        0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::regs::shadow_mode;

    fn env_with_light() -> (LightEnv, LightId) {
        let mut env = LightEnv::new();
        let id = env.add_light().unwrap();
        env.flush().unwrap();
        (env, id)
    }

    #[test]
    fn test_fresh_env_is_clean() {
        let env = LightEnv::new();
        assert!(!env.is_dirty());
        assert_eq!(env.pending(), FlushReport::default());
    }

    #[test]
    fn test_capacity_limit() {
        let mut env = LightEnv::new();
        for expected in 0..MAX_LIGHTS {
            let id = env.add_light().unwrap();
            assert_eq!(id.index(), expected);
        }
        assert_eq!(env.add_light(), Err(LightError::TooManyLights));
        assert_eq!(env.light_count(), MAX_LIGHTS);
    }

    #[test]
    fn test_add_light_raises_slot_dirty() {
        let mut env = LightEnv::new();
        let id = env.add_light().unwrap();
        let pending = env.pending();
        assert!(pending.lights[id.index()]);
        assert!(!pending.config);
        assert!(!pending.material);
    }

    #[test]
    fn test_setter_dirty_discipline() {
        let (mut env, id) = env_with_light();

        env.set_ambient(0.1, 0.2, 0.3);
        assert_eq!(
            env.pending(),
            FlushReport {
                config: true,
                ..Default::default()
            }
        );
        env.flush().unwrap();

        env.set_material(&Material::default());
        assert_eq!(
            env.pending(),
            FlushReport {
                material: true,
                ..Default::default()
            }
        );
        env.flush().unwrap();

        env.set_light_diffuse(id, 1.0, 0.0, 0.0);
        let pending = env.pending();
        assert!(pending.lights[0] && !pending.config && !pending.material);
        assert!(env.light(id).unwrap().dirty().colors);
        assert!(!env.light(id).unwrap().dirty().config);
        env.flush().unwrap();

        env.set_light_spot_direction(id, 0.0, -1.0, 0.0);
        assert!(env.light(id).unwrap().dirty().spot);
        assert!(!env.light(id).unwrap().dirty().config);
        env.flush().unwrap();

        env.set_light_dist_attn_enabled(id, true);
        assert!(env.light(id).unwrap().dirty().dist_attn);
        assert!(!env.light(id).unwrap().dirty().config);
        env.flush().unwrap();

        let mut luts = [false; ENV_LUT_COUNT];
        luts[EnvLutId::D0.slot()] = true;
        env.set_lut(
            EnvLutId::D0,
            LutInput::NormalHalf,
            false,
            Some(Arc::new(LightLut::phong(8.0))),
        );
        assert_eq!(
            env.pending(),
            FlushReport {
                luts,
                ..Default::default()
            }
        );
    }

    #[test]
    fn test_flush_clears_everything() {
        let (mut env, id) = env_with_light();
        env.set_ambient(0.5, 0.5, 0.5);
        env.set_light_color(id, 1.0, 1.0, 0.5);
        assert!(env.is_dirty());

        env.flush().unwrap();
        assert!(!env.is_dirty());

        // A second flush re-encodes nothing
        let report = env.flush().unwrap();
        assert!(!report.any());
    }

    #[test]
    fn test_flush_requires_enabled_light() {
        let mut env = LightEnv::new();
        assert_eq!(env.flush(), Err(LightError::NoEnabledLights));

        let id = env.add_light().unwrap();
        env.set_light_enabled(id, false);
        assert_eq!(env.flush(), Err(LightError::NoEnabledLights));
        // Dirty state survives the rejected flush
        assert!(env.is_dirty());

        env.set_light_enabled(id, true);
        assert!(env.flush().is_ok());
    }

    #[test]
    fn test_combined_color_registers() {
        let (mut env, id) = env_with_light();
        env.set_material(&Material {
            diffuse: [0.5, 1.0, 1.0],
            ..Default::default()
        });
        env.set_light_diffuse(id, 1.0, 0.5, 0.0);
        env.flush().unwrap();

        let diffuse = env.regs().lights[0].diffuse;
        assert_eq!(diffuse & 0xFF, 128);
        assert_eq!((diffuse >> 8) & 0xFF, 128);
        assert_eq!((diffuse >> 16) & 0xFF, 0);
    }

    #[test]
    fn test_material_dirty_recombines_all_lights() {
        let mut env = LightEnv::new();
        let a = env.add_light().unwrap();
        let b = env.add_light().unwrap();
        env.set_light_diffuse(a, 1.0, 1.0, 1.0);
        env.set_light_diffuse(b, 1.0, 1.0, 1.0);
        env.flush().unwrap();

        env.set_material(&Material {
            diffuse: [0.0, 0.0, 0.0],
            ..Default::default()
        });
        env.flush().unwrap();

        assert_eq!(env.regs().lights[0].diffuse, 0);
        assert_eq!(env.regs().lights[1].diffuse, 0);
    }

    #[test]
    fn test_scene_ambient_folds_material() {
        let (mut env, _id) = env_with_light();
        env.set_material(&Material {
            ambient: [0.5, 0.5, 0.5],
            emission: [0.25, 0.0, 0.0],
            ..Default::default()
        });
        env.set_ambient(1.0, 1.0, 0.0);
        env.flush().unwrap();

        let ambient = env.regs().ambient;
        // r = 0.25 + 0.5*1.0, g = 0.5, b = 0
        assert_eq!(ambient & 0xFF, 191);
        assert_eq!((ambient >> 8) & 0xFF, 128);
        assert_eq!((ambient >> 16) & 0xFF, 0);
    }

    #[test]
    fn test_composite_color_setter_equivalence() {
        let (mut env_a, a) = env_with_light();
        env_a.set_light_color(a, 0.3, 0.6, 0.9);

        let (mut env_b, b) = env_with_light();
        env_b.set_light_specular1(b, 0.3, 0.6, 0.9);
        env_b.set_light_diffuse(b, 0.3, 0.6, 0.9);
        env_b.set_light_specular0(b, 0.3, 0.6, 0.9);

        let la = env_a.light(a).unwrap();
        let lb = env_b.light(b).unwrap();
        assert_eq!(la.diffuse(), lb.diffuse());
        assert_eq!(la.specular0(), lb.specular0());
        assert_eq!(la.specular1(), lb.specular1());
        assert_eq!(la.dirty(), lb.dirty());
    }

    #[test]
    fn test_permutation_skips_disabled_lights() {
        let mut env = LightEnv::new();
        let _a = env.add_light().unwrap();
        let b = env.add_light().unwrap();
        let _c = env.add_light().unwrap();
        env.set_light_enabled(b, false);
        env.flush().unwrap();

        assert_eq!(env.regs().num_lights, 2);
        // Slot ids 0 and 2, one nibble each
        assert_eq!(env.regs().permutation, 0x20);
    }

    #[test]
    fn test_texture_unit_validation() {
        let mut env = LightEnv::new();
        assert_eq!(
            env.set_bump_texture_unit(3),
            Err(LightError::InvalidTextureUnit(3))
        );
        assert_eq!(
            env.set_shadow_texture_unit(7),
            Err(LightError::InvalidTextureUnit(7))
        );
        // Rejected setters leave no dirty state behind
        assert!(!env.is_dirty());

        assert!(env.set_bump_texture_unit(2).is_ok());
        assert!(env.is_dirty());
    }

    #[test]
    fn test_env_control_word() {
        let (mut env, _id) = env_with_light();
        env.set_bump_mode(BumpMode::NormalMap);
        env.set_bump_texture_unit(1).unwrap();
        env.set_shadow_mode(shadow_mode::PRIMARY | shadow_mode::INVERT);
        env.set_fresnel(FresnelSelector::Both);
        env.set_clamp_highlights(true);
        env.flush().unwrap();

        let word = env.regs().control[0];
        assert_eq!(word & 0x3, BumpMode::NormalMap as u32);
        assert_eq!((word >> env_control::BUMP_UNIT_SHIFT) & 0x3, 1);
        assert_eq!(
            (word >> env_control::SHADOW_MODE_SHIFT) & 0xF,
            shadow_mode::PRIMARY | shadow_mode::INVERT
        );
        assert_eq!(
            (word >> env_control::FRESNEL_SHIFT) & 0x3,
            FresnelSelector::Both as u32
        );
        assert_ne!(word & env_control::CLAMP_HIGHLIGHTS, 0);
    }

    #[test]
    fn test_lut_slot_encode_and_clear() {
        let (mut env, _id) = env_with_light();
        let table = Arc::new(LightLut::phong(16.0));
        env.set_lut(EnvLutId::D1, LutInput::ViewHalf, true, Some(table.clone()));
        env.flush().unwrap();

        let slot = EnvLutId::D1.slot();
        assert_eq!(
            (env.regs().lut_select >> (slot * 4)) & 0xF,
            LutInput::ViewHalf as u32
        );
        // Signed domain clears the absolute-value bit
        assert_eq!(env.regs().lut_abs & (1 << slot), 0);
        assert_ne!(
            env.regs().control[0] & (1 << (env_control::LUT_ENABLE_SHIFT + slot as u32)),
            0
        );
        // Staged reference is the caller's table, not a copy
        assert!(Arc::ptr_eq(
            env.regs().env_luts[slot].as_ref().unwrap(),
            &table
        ));

        env.set_lut(EnvLutId::D1, LutInput::ViewHalf, true, None);
        env.flush().unwrap();
        assert!(env.regs().env_luts[slot].is_none());
        assert_eq!(
            env.regs().control[0] & (1 << (env_control::LUT_ENABLE_SHIFT + slot as u32)),
            0
        );
    }

    #[test]
    fn test_directional_position_encoding() {
        let (mut env, id) = env_with_light();
        env.set_light_position(id, Vec4::new(1.0, -2.0, 3.0, 1.0));
        env.flush().unwrap();

        let reg = &env.regs().lights[0];
        assert_ne!(reg.control & light_control::DIRECTIONAL, 0);
        assert_eq!(reg.position[0], regs::f32_to_f16_bits(1.0));
        assert_eq!(reg.position[1], regs::f32_to_f16_bits(-2.0));
        assert_eq!(reg.position[2], regs::f32_to_f16_bits(3.0));

        env.set_light_position(id, Vec4::new(1.0, -2.0, 3.0, 0.0));
        env.flush().unwrap();
        assert_eq!(env.regs().lights[0].control & light_control::DIRECTIONAL, 0);
    }

    #[test]
    fn test_spot_and_dist_attn_staging() {
        let (mut env, id) = env_with_light();
        let spot = Arc::new(LightLut::spotlight(0.5));
        let da = Arc::new(LightLutDistAttn::quadratic(1.0, 20.0, 0.1, 0.01).unwrap());

        env.set_light_spot_enabled(id, true);
        env.set_light_spot_direction(id, 0.0, -1.0, 0.0);
        env.set_light_spot_lut(id, spot.clone());
        env.set_light_dist_attn_enabled(id, true);
        env.set_light_dist_attn(id, da.clone());
        env.flush().unwrap();

        let reg = &env.regs().lights[0];
        assert_eq!(reg.spot_dir[1], regs::f32_to_fix1_11(-1.0));
        assert_eq!(reg.dist_attn_scale, regs::f32_to_f16_bits(da.scale()) as u32);
        assert!(Arc::ptr_eq(env.regs().spot_luts[0].as_ref().unwrap(), &spot));
        assert!(Arc::ptr_eq(
            env.regs().dist_attn_luts[0].as_ref().unwrap(),
            &da
        ));

        // Spot/DA enabled clears the matching disable-mask bits
        let mask = env.regs().control[1];
        assert_eq!(mask & 1, 0);
        assert_eq!(mask & (1 << env_control::DIST_ATTN_DISABLE_SHIFT), 0);
        // Slot 1 has no light attached: both bits stay set
        assert_ne!(mask & (1 << 1), 0);
        assert_ne!(mask & (1 << (env_control::DIST_ATTN_DISABLE_SHIFT + 1)), 0);
    }

    #[test]
    fn test_unattached_light_id_is_ignored() {
        let mut env = LightEnv::new();
        env.set_light_diffuse(LightId(5), 1.0, 1.0, 1.0);
        assert!(!env.is_dirty());

        let (mut env, id) = env_with_light();
        env.set_light_geo_factor(id, 2, true);
        assert!(!env.is_dirty());
        env.set_light_geo_factor(id, 1, true);
        assert!(env.light(id).unwrap().geo_factor(1));
    }

    #[test]
    fn test_reset_returns_to_defaults() {
        let (mut env, id) = env_with_light();
        env.set_ambient(1.0, 1.0, 1.0);
        env.set_light_color(id, 1.0, 0.0, 0.0);
        env.reset();

        assert_eq!(env.light_count(), 0);
        assert!(!env.is_dirty());
        assert_eq!(env.ambient(), [0.0; 3]);
        assert_eq!(env.regs().num_lights, 0);
    }
}
