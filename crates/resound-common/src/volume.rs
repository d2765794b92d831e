//! Sound categories and the global volume hierarchy.
//!
//! Every audible voice is scaled by three factors:
//!
//! ```text
//! device gain = request volume × category volume × total volume × envelope
//!                                 (bgm or se)
//! ```
//!
//! The category and total scalars live here; the request volume and the
//! envelope belong to the individual player.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Default total (master) volume.
pub const DEFAULT_TOTAL_VOLUME: f32 = 1.0;

/// Default background-music volume.
pub const DEFAULT_BGM_VOLUME: f32 = 0.5;

/// Default sound-effect volume.
pub const DEFAULT_SE_VOLUME: f32 = 0.5;

/// Volume category a clip is played under.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SoundCategory {
    /// Background music.
    Bgm,
    /// Sound effects.
    Se,
}

impl SoundCategory {
    /// Get the default volume for this category.
    #[must_use]
    pub const fn default_volume(self) -> f32 {
        match self {
            Self::Bgm => DEFAULT_BGM_VOLUME,
            Self::Se => DEFAULT_SE_VOLUME,
        }
    }
}

impl fmt::Display for SoundCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Bgm => f.write_str("BGM"),
            Self::Se => f.write_str("SE"),
        }
    }
}

/// Clamps a scalar into `[0, 1]`, mapping NaN to 0.
#[must_use]
pub fn clamp_unit(value: f32) -> f32 {
    if value.is_nan() {
        0.0
    } else {
        value.clamp(0.0, 1.0)
    }
}

/// Total and per-category volume scalars, each in `[0, 1]`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct VolumeLevels {
    /// Total (master) volume.
    pub total: f32,
    /// Background-music volume.
    pub bgm: f32,
    /// Sound-effect volume.
    pub se: f32,
}

impl Default for VolumeLevels {
    fn default() -> Self {
        Self {
            total: DEFAULT_TOTAL_VOLUME,
            bgm: DEFAULT_BGM_VOLUME,
            se: DEFAULT_SE_VOLUME,
        }
    }
}

impl VolumeLevels {
    /// Creates volume levels, clamping each value into range.
    #[must_use]
    pub fn new(total: f32, bgm: f32, se: f32) -> Self {
        Self {
            total: clamp_unit(total),
            bgm: clamp_unit(bgm),
            se: clamp_unit(se),
        }
    }

    /// Get volume for a category.
    #[must_use]
    pub const fn get(&self, category: SoundCategory) -> f32 {
        match category {
            SoundCategory::Bgm => self.bgm,
            SoundCategory::Se => self.se,
        }
    }

    /// Set volume for a category.
    pub fn set(&mut self, category: SoundCategory, volume: f32) {
        let volume = clamp_unit(volume);
        match category {
            SoundCategory::Bgm => self.bgm = volume,
            SoundCategory::Se => self.se = volume,
        }
    }

    /// Set the total volume.
    pub fn set_total(&mut self, volume: f32) {
        self.total = clamp_unit(volume);
    }

    /// Get effective volume for a category (includes total).
    #[must_use]
    pub fn effective(&self, category: SoundCategory) -> f32 {
        self.total * self.get(category)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let levels = VolumeLevels::default();
        assert!((levels.total - 1.0).abs() < f32::EPSILON);
        assert!((levels.get(SoundCategory::Bgm) - 0.5).abs() < f32::EPSILON);
        assert!((levels.get(SoundCategory::Se) - 0.5).abs() < f32::EPSILON);
    }

    #[test]
    fn test_effective_multiplies_total() {
        let mut levels = VolumeLevels::default();
        levels.set_total(0.5);
        levels.set(SoundCategory::Se, 0.8);
        assert!((levels.effective(SoundCategory::Se) - 0.4).abs() < f32::EPSILON);
    }

    #[test]
    fn test_set_clamps() {
        let mut levels = VolumeLevels::new(2.0, -1.0, f32::NAN);
        assert!((levels.total - 1.0).abs() < f32::EPSILON);
        assert!(levels.bgm.abs() < f32::EPSILON);
        assert!(levels.se.abs() < f32::EPSILON);

        levels.set(SoundCategory::Bgm, 1.5);
        assert!((levels.bgm - 1.0).abs() < f32::EPSILON);
    }

    #[test]
    fn test_category_display() {
        assert_eq!(SoundCategory::Bgm.to_string(), "BGM");
        assert_eq!(SoundCategory::Se.to_string(), "SE");
    }

    proptest::proptest! {
        #[test]
        fn test_clamp_unit_stays_in_range(v in proptest::num::f32::ANY) {
            let c = clamp_unit(v);
            proptest::prop_assert!((0.0..=1.0).contains(&c));
        }
    }
}
