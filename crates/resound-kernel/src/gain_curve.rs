//! Piecewise-linear fade envelopes.
//!
//! A `GainCurve` maps playback time (clip seconds) to a gain in `[0, 1]`.
//! It is built once per play from the requested fade durations and the
//! clip length:
//!
//! ```text
//!  fade in only        fade out only       both, room for a plateau
//!  1 ┤  ______         1 ┤______           1 ┤  ______
//!    │ /                 │      \            │ /      \
//!  0 ┤/                0 ┤       \         0 ┤/        \
//!    0  fi    L          0   L-fo L          0  fi  L-fo L
//!
//!  both, ramps overlap (fi + fo > L)
//!  g*┤    /\           t* = L·fi / (fi + fo)
//!    │   /  \          g* = L / (fi + fo)  < 1
//!  0 ┤  /    \
//!    0   t*   L
//! ```
//!
//! A ramp longer than the clip is truncated rather than stretched: a 4 s
//! fade-in over a 2 s clip ends the clip at gain 0.5.

use resound_common::clamp_unit;

/// One point of a gain curve.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Keyframe {
    /// Time in clip seconds.
    pub time: f32,
    /// Gain at that time.
    pub gain: f32,
}

impl Keyframe {
    /// Creates a keyframe.
    #[must_use]
    pub const fn new(time: f32, gain: f32) -> Self {
        Self { time, gain }
    }
}

/// Time-to-gain envelope made of linear segments.
///
/// Always holds at least one keyframe and keyframe times are strictly
/// increasing.
#[derive(Debug, Clone, PartialEq)]
pub struct GainCurve {
    keys: Vec<Keyframe>,
}

impl Default for GainCurve {
    fn default() -> Self {
        Self::flat()
    }
}

impl GainCurve {
    /// A curve that is 1 everywhere.
    #[must_use]
    pub fn flat() -> Self {
        Self {
            keys: vec![Keyframe::new(0.0, 1.0)],
        }
    }

    /// Builds the envelope for a clip of `clip_length` seconds.
    ///
    /// Non-positive or NaN fade durations count as "no fade". A non-positive
    /// clip length, or no fade at all, yields a flat curve.
    #[must_use]
    pub fn build(fade_in: f32, fade_out: f32, clip_length: f32) -> Self {
        let fi = positive_or_zero(fade_in);
        let fo = positive_or_zero(fade_out);
        let len = clip_length;

        if len.is_nan() || len <= 0.0 || (fi <= 0.0 && fo <= 0.0) {
            return Self::flat();
        }

        let keys = match (fi > 0.0, fo > 0.0) {
            (true, false) => {
                if fi > len {
                    vec![Keyframe::new(0.0, 0.0), Keyframe::new(len, len / fi)]
                } else {
                    vec![
                        Keyframe::new(0.0, 0.0),
                        Keyframe::new(fi, 1.0),
                        Keyframe::new(len, 1.0),
                    ]
                }
            },
            (false, true) => {
                if fo > len {
                    vec![Keyframe::new(0.0, len / fo), Keyframe::new(len, 0.0)]
                } else {
                    vec![
                        Keyframe::new(0.0, 1.0),
                        Keyframe::new(len - fo, 1.0),
                        Keyframe::new(len, 0.0),
                    ]
                }
            },
            _ => {
                if fi + fo <= len {
                    // Rounding can put len - fo a hair before fi.
                    let plateau_end = (len - fo).max(fi);
                    vec![
                        Keyframe::new(0.0, 0.0),
                        Keyframe::new(fi, 1.0),
                        Keyframe::new(plateau_end, 1.0),
                        Keyframe::new(len, 0.0),
                    ]
                } else {
                    let peak_time = (len * (fi / (fi + fo))).min(len);
                    let peak_gain = (len / (fi + fo)).min(1.0);
                    vec![
                        Keyframe::new(0.0, 0.0),
                        Keyframe::new(peak_time, peak_gain),
                        Keyframe::new(len, 0.0),
                    ]
                }
            },
        };

        Self::from_keys(keys)
    }

    fn from_keys(mut keys: Vec<Keyframe>) -> Self {
        // Coincident points keep the lower gain so the silent ends survive.
        keys.dedup_by(|later, earlier| {
            if later.time <= earlier.time {
                earlier.gain = earlier.gain.min(later.gain);
                true
            } else {
                false
            }
        });
        if keys.is_empty() {
            return Self::flat();
        }
        Self { keys }
    }

    /// Gain at time `t`. Times outside the curve clamp to the end keyframes.
    #[must_use]
    pub fn evaluate(&self, t: f32) -> f32 {
        let (first, last) = match (self.keys.first(), self.keys.last()) {
            (Some(first), Some(last)) => (*first, *last),
            _ => return 1.0,
        };

        if t.is_nan() || t <= first.time {
            return clamp_unit(first.gain);
        }
        if t >= last.time {
            return clamp_unit(last.gain);
        }

        for pair in self.keys.windows(2) {
            let (a, b) = (pair[0], pair[1]);
            if t <= b.time {
                let span = b.time - a.time;
                let s = if span > 0.0 { (t - a.time) / span } else { 1.0 };
                return clamp_unit(a.gain + (b.gain - a.gain) * s);
            }
        }

        clamp_unit(last.gain)
    }

    /// Keyframes in time order.
    #[must_use]
    pub fn keyframes(&self) -> &[Keyframe] {
        &self.keys
    }

    /// Time of the last keyframe.
    #[must_use]
    pub fn duration(&self) -> f32 {
        self.keys.last().map_or(0.0, |k| k.time)
    }

    /// Highest gain reached anywhere on the curve.
    #[must_use]
    pub fn peak(&self) -> f32 {
        self.keys.iter().fold(0.0_f32, |acc, k| acc.max(k.gain))
    }

    /// Whether the curve is constant 1.
    #[must_use]
    pub fn is_flat(&self) -> bool {
        self.keys.iter().all(|k| (k.gain - 1.0).abs() < f32::EPSILON)
    }
}

fn positive_or_zero(value: f32) -> f32 {
    if value.is_nan() || value <= 0.0 {
        0.0
    } else {
        value
    }
}
