//! Distance attenuation for 3D voices.
//!
//! Only basic distance falloff against a single listener is modelled; there
//! is no panning, doppler or occlusion.

use glam::Vec3;
use serde::{Deserialize, Serialize};

/// Default distance below which a 3D voice plays at full gain.
pub const DEFAULT_MIN_DISTANCE: f32 = 1.0;

/// Default distance beyond which a 3D voice is silent.
pub const DEFAULT_MAX_DISTANCE: f32 = 500.0;

/// Distance falloff curves.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Rolloff {
    /// Constant gain regardless of distance.
    None,
    /// Linear falloff from min to max distance.
    #[default]
    Linear,
    /// Inverse distance (min/d) falloff, cut to silence past max distance.
    Inverse,
}

impl Rolloff {
    /// Calculate attenuation factor (0.0-1.0) for a given distance.
    #[must_use]
    pub fn attenuation(self, distance: f32, min_distance: f32, max_distance: f32) -> f32 {
        let d = distance.max(0.0);
        if d <= min_distance {
            return 1.0;
        }

        match self {
            Self::None => 1.0,
            Self::Linear => {
                let range = max_distance - min_distance;
                if range > 0.0 {
                    (1.0 - (d - min_distance) / range).clamp(0.0, 1.0)
                } else {
                    0.0
                }
            },
            Self::Inverse => {
                if d >= max_distance {
                    0.0
                } else if min_distance > 0.0 {
                    (min_distance / d).clamp(0.0, 1.0)
                } else {
                    0.0
                }
            },
        }
    }
}

/// Spatial settings of one 3D voice.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SpatialParams {
    /// Full gain within this distance.
    pub min_distance: f32,
    /// Silent beyond this distance.
    pub max_distance: f32,
    /// Falloff between the two.
    pub rolloff: Rolloff,
}

impl Default for SpatialParams {
    fn default() -> Self {
        Self {
            min_distance: DEFAULT_MIN_DISTANCE,
            max_distance: DEFAULT_MAX_DISTANCE,
            rolloff: Rolloff::Linear,
        }
    }
}

impl SpatialParams {
    /// Creates spatial params. Distances are made non-negative and
    /// `max_distance` is raised to at least `min_distance`.
    #[must_use]
    pub fn new(min_distance: f32, max_distance: f32, rolloff: Rolloff) -> Self {
        let min_distance = if min_distance.is_nan() { 0.0 } else { min_distance.max(0.0) };
        let max_distance = if max_distance.is_nan() {
            min_distance
        } else {
            max_distance.max(min_distance)
        };
        Self {
            min_distance,
            max_distance,
            rolloff,
        }
    }

    /// Attenuation for a source at `source` heard from `listener`.
    #[must_use]
    pub fn attenuation(&self, listener: Vec3, source: Vec3) -> f32 {
        self.rolloff
            .attenuation(listener.distance(source), self.min_distance, self.max_distance)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rolloff_none() {
        assert!((Rolloff::None.attenuation(1000.0, 1.0, 10.0) - 1.0).abs() < f32::EPSILON);
    }

    #[test]
    fn test_rolloff_linear() {
        let model = Rolloff::Linear;

        // Inside min distance = full gain
        assert!((model.attenuation(0.5, 1.0, 11.0) - 1.0).abs() < f32::EPSILON);

        // Midway between min and max
        let mid = model.attenuation(6.0, 1.0, 11.0);
        assert!((mid - 0.5).abs() < 0.001);

        // At and past max = silent
        assert!(model.attenuation(11.0, 1.0, 11.0).abs() < f32::EPSILON);
        assert!(model.attenuation(50.0, 1.0, 11.0).abs() < f32::EPSILON);
    }

    #[test]
    fn test_rolloff_inverse() {
        let model = Rolloff::Inverse;
        assert!((model.attenuation(2.0, 1.0, 100.0) - 0.5).abs() < f32::EPSILON);
        assert!(model.attenuation(200.0, 1.0, 100.0).abs() < f32::EPSILON);
    }

    #[test]
    fn test_spatial_params_sanitize() {
        let params = SpatialParams::new(-3.0, -5.0, Rolloff::Linear);
        assert!(params.min_distance.abs() < f32::EPSILON);
        assert!(params.max_distance.abs() < f32::EPSILON);

        let params = SpatialParams::new(10.0, 5.0, Rolloff::Linear);
        assert!((params.max_distance - 10.0).abs() < f32::EPSILON);
    }

    #[test]
    fn test_spatial_params_attenuation() {
        let params = SpatialParams::new(1.0, 11.0, Rolloff::Linear);
        let gain = params.attenuation(Vec3::ZERO, Vec3::new(6.0, 0.0, 0.0));
        assert!((gain - 0.5).abs() < 0.001);
    }
}
