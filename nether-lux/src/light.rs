//! Per-light state
//!
//! Lights live inside a `LightEnv` in slot order; callers hold a `LightId`
//! and go through the environment for every mutation so dirty tracking sees
//! each change. Up to eight lights can be attached and none are ever
//! removed - slot ids stay stable for the life of the environment.

use std::sync::Arc;

use glam::Vec3;

use crate::lut::{LightLut, LightLutDistAttn};

/// Handle to a light slot within a `LightEnv`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct LightId(pub(crate) u8);

impl LightId {
    /// Slot index within the owning environment (0-7)
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

/// Per-light dirty groups
///
/// Each group maps to the registers reconciliation re-encodes for it:
/// `config` covers the control word and position, `colors` the four
/// combined color words, `spot` the spot direction and cutoff table, and
/// `dist_attn` the attenuation table with its bias/scale remap.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LightDirty {
    pub config: bool,
    pub colors: bool,
    pub spot: bool,
    pub dist_attn: bool,
}

impl LightDirty {
    /// True if any group needs re-encoding
    pub fn any(self) -> bool {
        self.config || self.colors || self.spot || self.dist_attn
    }

    pub(crate) fn clear(&mut self) {
        *self = Self::default();
    }
}

/// One light source attached to a `LightEnv`
#[derive(Debug, Clone)]
pub struct Light {
    pub(crate) id: u8,
    pub(crate) enabled: bool,
    pub(crate) ambient: [f32; 3],
    pub(crate) diffuse: [f32; 3],
    pub(crate) specular0: [f32; 3],
    pub(crate) specular1: [f32; 3],
    pub(crate) position: Vec3,
    pub(crate) directional: bool,
    pub(crate) two_sided_diffuse: bool,
    pub(crate) geo_factor: [bool; 2],
    pub(crate) shadow_enabled: bool,
    pub(crate) spot_enabled: bool,
    pub(crate) spot_dir: Vec3,
    pub(crate) spot_lut: Option<Arc<LightLut>>,
    pub(crate) dist_attn_enabled: bool,
    pub(crate) dist_attn: Option<Arc<LightLutDistAttn>>,
    pub(crate) dirty: LightDirty,
}

impl Light {
    /// Fresh light for slot `id`: enabled, black, positional at the origin,
    /// everything dirty so the first reconcile encodes it
    pub(crate) fn new(id: u8) -> Self {
        Self {
            id,
            enabled: true,
            ambient: [0.0; 3],
            diffuse: [0.0; 3],
            specular0: [0.0; 3],
            specular1: [0.0; 3],
            position: Vec3::ZERO,
            directional: false,
            two_sided_diffuse: false,
            geo_factor: [false; 2],
            shadow_enabled: false,
            spot_enabled: false,
            spot_dir: Vec3::NEG_Z,
            spot_lut: None,
            dist_attn_enabled: false,
            dist_attn: None,
            dirty: LightDirty {
                config: true,
                colors: true,
                spot: true,
                dist_attn: true,
            },
        }
    }

    /// Slot id within the owning environment
    pub fn id(&self) -> LightId {
        LightId(self.id)
    }

    pub fn enabled(&self) -> bool {
        self.enabled
    }

    pub fn ambient(&self) -> [f32; 3] {
        self.ambient
    }

    pub fn diffuse(&self) -> [f32; 3] {
        self.diffuse
    }

    pub fn specular0(&self) -> [f32; 3] {
        self.specular0
    }

    pub fn specular1(&self) -> [f32; 3] {
        self.specular1
    }

    /// Light position (or direction when `directional` is set)
    pub fn position(&self) -> Vec3 {
        self.position
    }

    /// True when the light is a fixed direction independent of fragment
    /// position
    pub fn directional(&self) -> bool {
        self.directional
    }

    pub fn two_sided_diffuse(&self) -> bool {
        self.two_sided_diffuse
    }

    /// Cook-Torrance geometric factor enable for id 0 or 1
    pub fn geo_factor(&self, id: usize) -> bool {
        self.geo_factor.get(id).copied().unwrap_or(false)
    }

    pub fn shadow_enabled(&self) -> bool {
        self.shadow_enabled
    }

    pub fn spot_enabled(&self) -> bool {
        self.spot_enabled
    }

    pub fn spot_dir(&self) -> Vec3 {
        self.spot_dir
    }

    pub fn spot_lut(&self) -> Option<&Arc<LightLut>> {
        self.spot_lut.as_ref()
    }

    pub fn dist_attn_enabled(&self) -> bool {
        self.dist_attn_enabled
    }

    pub fn dist_attn(&self) -> Option<&Arc<LightLutDistAttn>> {
        self.dist_attn.as_ref()
    }

    /// Pending dirty groups
    pub fn dirty(&self) -> LightDirty {
        self.dirty
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_light_starts_enabled_and_dirty() {
        let light = Light::new(3);
        assert!(light.enabled());
        assert_eq!(light.id().index(), 3);
        assert!(light.dirty().any());
        assert!(light.dirty().config && light.dirty().colors);
    }

    #[test]
    fn test_geo_factor_out_of_range_reads_false() {
        let light = Light::new(0);
        assert!(!light.geo_factor(2));
    }
}
