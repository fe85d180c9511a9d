// config.rs - Pipeline parameters
//
// Defaults are the usual print settings: a 70 x 40 plate, 5 units of
// base and 2 units of relief, 90% face reduction, no bend.

use std::env;

use serde::{Deserialize, Serialize};

use crate::color::ClusterConfig;
use crate::error::{Result, config_err};
use crate::height::MAX_SIMPLIFICATION_LEVEL;

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReliefConfig {
    /// Plate size along X (image columns).
    pub object_width: f32,
    /// Plate size along Y (image rows).
    pub object_height: f32,
    /// Thickness under the relief.
    pub base_height: f32,
    /// Relief height above the base.
    pub image_height: f32,
    /// Parabolic bend along X, 0 disables.
    pub bend_factor: f32,
    /// Fraction of faces to remove, in `[0, 1)`.
    pub target_reduction: f32,
    /// Grid scale before meshing; 0.5 halves both axes.
    pub resolution: f32,
    /// Keep every `2^level`-th grid sample.
    pub simplification_level: u32,
    /// Remap quantized colors onto the caller's palette.
    pub remap_palette: bool,
    /// Lightest color gets the lowest tier.
    pub reverse_palette: bool,
    pub cluster: ClusterConfig,
}

impl Default for ReliefConfig {
    fn default() -> Self {
        Self {
            object_width: 70.0,
            object_height: 40.0,
            base_height: 5.0,
            image_height: 2.0,
            bend_factor: 0.0,
            target_reduction: 0.9,
            resolution: 1.0,
            simplification_level: 0,
            remap_palette: true,
            reverse_palette: false,
            cluster: ClusterConfig::default(),
        }
    }
}

fn env_or<T: std::str::FromStr>(key: &str, default: T) -> Result<T> {
    match env::var(key) {
        Ok(v) => v
            .trim()
            .parse()
            .map_err(|_| config_err(format!("{key}={v:?} is not a valid value"))),
        Err(_) => Ok(default),
    }
}

impl ReliefConfig {
    /// Defaults overridden by `RELIEF_*` environment variables, then validated.
    pub fn from_env() -> Result<Self> {
        let d = Self::default();
        let config = Self {
            object_width: env_or("RELIEF_OBJECT_WIDTH", d.object_width)?,
            object_height: env_or("RELIEF_OBJECT_HEIGHT", d.object_height)?,
            base_height: env_or("RELIEF_BASE_HEIGHT", d.base_height)?,
            image_height: env_or("RELIEF_IMAGE_HEIGHT", d.image_height)?,
            bend_factor: env_or("RELIEF_BEND_FACTOR", d.bend_factor)?,
            target_reduction: env_or("RELIEF_TARGET_REDUCTION", d.target_reduction)?,
            resolution: env_or("RELIEF_RESOLUTION", d.resolution)?,
            simplification_level: env_or("RELIEF_SIMPLIFICATION_LEVEL", d.simplification_level)?,
            remap_palette: env_or("RELIEF_REMAP_PALETTE", d.remap_palette)?,
            reverse_palette: env_or("RELIEF_REVERSE_PALETTE", d.reverse_palette)?,
            cluster: ClusterConfig {
                k: env_or("RELIEF_COLORS", d.cluster.k)?,
                seed: env_or("RELIEF_SEED", d.cluster.seed)?,
                ..d.cluster
            },
        };
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        let positive = |name: &str, v: f32| {
            if v.is_finite() && v > 0.0 { Ok(()) } else { Err(config_err(format!("{name} must be > 0, got {v}"))) }
        };
        let non_negative = |name: &str, v: f32| {
            if v.is_finite() && v >= 0.0 { Ok(()) } else { Err(config_err(format!("{name} must be >= 0, got {v}"))) }
        };

        positive("object width", self.object_width)?;
        positive("object height", self.object_height)?;
        non_negative("base height", self.base_height)?;
        non_negative("image height", self.image_height)?;
        if !self.bend_factor.is_finite() {
            return Err(config_err(format!("bend factor must be finite, got {}", self.bend_factor)));
        }
        if !(0.0..1.0).contains(&self.target_reduction) {
            return Err(config_err(format!(
                "target reduction must be in [0, 1), got {}",
                self.target_reduction
            )));
        }
        if !(self.resolution.is_finite() && self.resolution > 0.0 && self.resolution <= 4.0) {
            return Err(config_err(format!("resolution must be in (0, 4], got {}", self.resolution)));
        }
        if self.simplification_level > MAX_SIMPLIFICATION_LEVEL {
            return Err(config_err(format!(
                "simplification level must be <= {MAX_SIMPLIFICATION_LEVEL}, got {}",
                self.simplification_level
            )));
        }
        if self.cluster.k == 0 {
            return Err(config_err("cluster count k must be greater than 0"));
        }
        if self.cluster.max_iterations == 0 {
            return Err(config_err("max iterations must be greater than 0"));
        }
        non_negative("cluster tolerance", self.cluster.tolerance)?;
        Ok(())
    }
}
