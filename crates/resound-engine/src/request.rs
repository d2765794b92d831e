//! Playback requests and lifecycle callbacks.
//!
//! Requests are plain values built with `with_*` methods. Out-of-range
//! values are accepted and clamped when the request is played, never
//! rejected.

use std::fmt;
use std::sync::Arc;

use glam::Vec3;
use resound_common::clamp_unit;

use crate::emitter::{Anchor, Emitter};

/// Default per-request volume.
pub const DEFAULT_VOLUME: f32 = 1.0;

/// Default pitch.
pub const DEFAULT_PITCH: f32 = 1.0;

/// Highest accepted pitch.
pub const MAX_PITCH: f32 = 3.0;

/// Longest accepted start delay in seconds.
pub const MAX_DELAY: f32 = 10.0;

/// Lifecycle callback. Runs synchronously inside `SoundManager::update`.
pub type Callback = Arc<dyn Fn() + Send + Sync>;

/// The four lifecycle hooks of a playback.
///
/// - `on_start_before`: when the request is accepted, before any delay
/// - `on_start`: once, when the sound first becomes audible
/// - `on_complete`: at the natural end of the last pass
/// - `on_complete_after`: right after `on_complete`
///
/// A stopped or preempted sound fires neither completion hook.
#[derive(Clone, Default)]
pub struct Callbacks {
    on_start_before: Option<Callback>,
    on_start: Option<Callback>,
    on_complete: Option<Callback>,
    on_complete_after: Option<Callback>,
}

impl fmt::Debug for Callbacks {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Callbacks")
            .field("on_start_before", &self.on_start_before.is_some())
            .field("on_start", &self.on_start.is_some())
            .field("on_complete", &self.on_complete.is_some())
            .field("on_complete_after", &self.on_complete_after.is_some())
            .finish()
    }
}

impl Callbacks {
    /// No callbacks.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn start_before(&self) {
        fire(self.on_start_before.as_ref());
    }

    pub(crate) fn start(&self) {
        fire(self.on_start.as_ref());
    }

    pub(crate) fn complete(&self) {
        fire(self.on_complete.as_ref());
        fire(self.on_complete_after.as_ref());
    }
}

fn fire(callback: Option<&Callback>) {
    if let Some(cb) = callback {
        cb();
    }
}

macro_rules! callback_setters {
    ($ty:ty) => {
        impl $ty {
            /// Runs when the request is accepted, before any delay.
            #[must_use]
            pub fn on_start_before(mut self, f: impl Fn() + Send + Sync + 'static) -> Self {
                self.callbacks.on_start_before = Some(Arc::new(f));
                self
            }

            /// Runs once when the sound first becomes audible.
            #[must_use]
            pub fn on_start(mut self, f: impl Fn() + Send + Sync + 'static) -> Self {
                self.callbacks.on_start = Some(Arc::new(f));
                self
            }

            /// Runs at the natural end of the last pass.
            #[must_use]
            pub fn on_complete(mut self, f: impl Fn() + Send + Sync + 'static) -> Self {
                self.callbacks.on_complete = Some(Arc::new(f));
                self
            }

            /// Runs right after `on_complete`.
            #[must_use]
            pub fn on_complete_after(mut self, f: impl Fn() + Send + Sync + 'static) -> Self {
                self.callbacks.on_complete_after = Some(Arc::new(f));
                self
            }
        }
    };
}

fn clamp_range(value: f32, max: f32) -> f32 {
    if value.is_nan() {
        0.0
    } else {
        value.clamp(0.0, max)
    }
}

fn non_negative(value: f32) -> f32 {
    if value.is_nan() {
        0.0
    } else {
        value.max(0.0)
    }
}

/// Request to play a sound effect.
#[derive(Debug, Clone)]
pub struct SeRequest {
    /// Clip name in the SE catalog.
    pub name: String,
    /// Volume in `[0, 1]`.
    pub volume: f32,
    /// Start delay in seconds, `[0, 10]`.
    pub delay: f32,
    /// Playback speed, `[0, 3]`.
    pub pitch: f32,
    /// Number of passes; 0 loops forever.
    pub loop_count: u32,
    /// Fade-in duration in seconds.
    pub fade_in: f32,
    /// Fade-out duration in seconds.
    pub fade_out: f32,
    /// Where the sound is heard from.
    pub emitter: Emitter,
    /// Full-gain radius for 3D sounds; manager default when `None`.
    pub min_distance: Option<f32>,
    /// Silence radius for 3D sounds; manager default when `None`.
    pub max_distance: Option<f32>,
    /// Lifecycle hooks.
    pub callbacks: Callbacks,
}

impl SeRequest {
    /// A single 2D pass of `name` at full volume and normal pitch.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            volume: DEFAULT_VOLUME,
            delay: 0.0,
            pitch: DEFAULT_PITCH,
            loop_count: 1,
            fade_in: 0.0,
            fade_out: 0.0,
            emitter: Emitter::Flat,
            min_distance: None,
            max_distance: None,
            callbacks: Callbacks::default(),
        }
    }

    /// Set the volume.
    #[must_use]
    pub fn with_volume(mut self, volume: f32) -> Self {
        self.volume = volume;
        self
    }

    /// Set the start delay.
    #[must_use]
    pub fn with_delay(mut self, delay: f32) -> Self {
        self.delay = delay;
        self
    }

    /// Set the pitch.
    #[must_use]
    pub fn with_pitch(mut self, pitch: f32) -> Self {
        self.pitch = pitch;
        self
    }

    /// Set the number of passes (0 = forever).
    #[must_use]
    pub fn with_loop_count(mut self, count: u32) -> Self {
        self.loop_count = count;
        self
    }

    /// Loop until stopped.
    #[must_use]
    pub fn looping(self) -> Self {
        self.with_loop_count(0)
    }

    /// Set the fade-in duration.
    #[must_use]
    pub fn with_fade_in(mut self, seconds: f32) -> Self {
        self.fade_in = seconds;
        self
    }

    /// Set the fade-out duration.
    #[must_use]
    pub fn with_fade_out(mut self, seconds: f32) -> Self {
        self.fade_out = seconds;
        self
    }

    /// Play in 3D at a fixed position.
    #[must_use]
    pub fn at(mut self, position: Vec3) -> Self {
        self.emitter = Emitter::At(position);
        self
    }

    /// Play in 3D, following an anchor.
    #[must_use]
    pub fn following(mut self, anchor: &Anchor) -> Self {
        self.emitter = Emitter::Follow(anchor.downgrade());
        self
    }

    /// Set the attenuation distances for 3D playback.
    #[must_use]
    pub fn with_distances(mut self, min_distance: f32, max_distance: f32) -> Self {
        self.min_distance = Some(min_distance);
        self.max_distance = Some(max_distance);
        self
    }

    /// Copy with every numeric field clamped into its valid range.
    #[must_use]
    pub fn clamped(mut self) -> Self {
        self.volume = clamp_unit(self.volume);
        self.delay = clamp_range(self.delay, MAX_DELAY);
        self.pitch = clamp_range(self.pitch, MAX_PITCH);
        self.fade_in = non_negative(self.fade_in);
        self.fade_out = non_negative(self.fade_out);
        self
    }
}

callback_setters!(SeRequest);

/// Request to play background music.
#[derive(Debug, Clone)]
pub struct BgmRequest {
    /// Clip name in the BGM catalog.
    pub name: String,
    /// Optional intro clip played once before `name`.
    pub intro: Option<String>,
    /// Volume in `[0, 1]`.
    pub volume: f32,
    /// Start delay in seconds, `[0, 10]`.
    pub delay: f32,
    /// Whether the main clip loops.
    pub looping: bool,
    /// Fade-in duration of the incoming track.
    pub fade_in: f32,
    /// Fade-out duration of the outgoing track.
    pub fade_out: f32,
    /// How much of the fade-in overlaps the outgoing fade-out, `[0, 1]`.
    pub cross_fade_rate: f32,
    /// Lifecycle hooks.
    pub callbacks: Callbacks,
}

impl BgmRequest {
    /// A looping track with a hard cut from whatever was playing.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            intro: None,
            volume: DEFAULT_VOLUME,
            delay: 0.0,
            looping: true,
            fade_in: 0.0,
            fade_out: 0.0,
            cross_fade_rate: 0.0,
            callbacks: Callbacks::default(),
        }
    }

    /// Set the intro clip.
    #[must_use]
    pub fn with_intro(mut self, intro: impl Into<String>) -> Self {
        self.intro = Some(intro.into());
        self
    }

    /// Set the volume.
    #[must_use]
    pub fn with_volume(mut self, volume: f32) -> Self {
        self.volume = volume;
        self
    }

    /// Set the start delay.
    #[must_use]
    pub fn with_delay(mut self, delay: f32) -> Self {
        self.delay = delay;
        self
    }

    /// Set whether the main clip loops.
    #[must_use]
    pub fn with_looping(mut self, looping: bool) -> Self {
        self.looping = looping;
        self
    }

    /// Set the fade-in duration.
    #[must_use]
    pub fn with_fade_in(mut self, seconds: f32) -> Self {
        self.fade_in = seconds;
        self
    }

    /// Set the fade-out duration.
    #[must_use]
    pub fn with_fade_out(mut self, seconds: f32) -> Self {
        self.fade_out = seconds;
        self
    }

    /// Crossfade over `seconds` in both directions with the given overlap.
    #[must_use]
    pub fn with_cross_fade(mut self, seconds: f32, rate: f32) -> Self {
        self.fade_in = seconds;
        self.fade_out = seconds;
        self.cross_fade_rate = rate;
        self
    }

    /// Set the crossfade overlap.
    #[must_use]
    pub fn with_cross_fade_rate(mut self, rate: f32) -> Self {
        self.cross_fade_rate = rate;
        self
    }

    /// Copy with every numeric field clamped into its valid range.
    #[must_use]
    pub fn clamped(mut self) -> Self {
        self.volume = clamp_unit(self.volume);
        self.delay = clamp_range(self.delay, MAX_DELAY);
        self.fade_in = non_negative(self.fade_in);
        self.fade_out = non_negative(self.fade_out);
        self.cross_fade_rate = clamp_unit(self.cross_fade_rate);
        self
    }

    /// Whether either fade is set.
    #[must_use]
    pub fn is_fade(&self) -> bool {
        self.fade_in > 0.0 || self.fade_out > 0.0
    }

    /// Silent lead-in of the incoming track before its ramp starts.
    #[must_use]
    pub fn fade_in_wait(&self) -> f32 {
        (1.0 - clamp_unit(self.cross_fade_rate)) * non_negative(self.fade_in)
    }
}

callback_setters!(BgmRequest);

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[test]
    fn test_se_defaults() {
        let req = SeRequest::new("jump");
        assert_eq!(req.name, "jump");
        assert!((req.volume - 1.0).abs() < f32::EPSILON);
        assert!((req.pitch - 1.0).abs() < f32::EPSILON);
        assert_eq!(req.loop_count, 1);
        assert!(!req.emitter.is_spatial());
    }

    #[test]
    fn test_se_clamped() {
        let req = SeRequest::new("x")
            .with_volume(3.0)
            .with_delay(60.0)
            .with_pitch(9.0)
            .with_fade_in(-1.0)
            .clamped();
        assert!((req.volume - 1.0).abs() < f32::EPSILON);
        assert!((req.delay - MAX_DELAY).abs() < f32::EPSILON);
        assert!((req.pitch - MAX_PITCH).abs() < f32::EPSILON);
        assert!(req.fade_in.abs() < f32::EPSILON);

        let req = SeRequest::new("x").with_pitch(-1.0).clamped();
        assert!(req.pitch.abs() < f32::EPSILON);
    }

    #[test]
    fn test_se_emitters() {
        let anchor = Anchor::new(Vec3::Y);
        let req = SeRequest::new("x").at(Vec3::X).following(&anchor);
        assert_eq!(req.emitter.position(), Some(Vec3::Y));
        assert!(SeRequest::new("x").looping().loop_count == 0);
    }

    #[test]
    fn test_callbacks_fire_in_order() {
        let counter = Arc::new(AtomicU32::new(0));
        let (a, b) = (Arc::clone(&counter), Arc::clone(&counter));
        let req = SeRequest::new("x")
            .on_complete(move || {
                assert_eq!(a.fetch_add(1, Ordering::SeqCst), 0);
            })
            .on_complete_after(move || {
                assert_eq!(b.fetch_add(1, Ordering::SeqCst), 1);
            });

        req.callbacks.complete();
        assert_eq!(counter.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_bgm_defaults_and_wait() {
        let req = BgmRequest::new("title");
        assert!(req.looping);
        assert!(!req.is_fade());

        let req = BgmRequest::new("field").with_cross_fade(2.0, 0.25);
        assert!(req.is_fade());
        assert!((req.fade_in_wait() - 1.5).abs() < f32::EPSILON);

        let req = req.with_cross_fade_rate(1.0);
        assert!(req.fade_in_wait().abs() < f32::EPSILON);
    }

    #[test]
    fn test_bgm_clamped() {
        let req = BgmRequest::new("x")
            .with_volume(-0.5)
            .with_cross_fade_rate(4.0)
            .clamped();
        assert!(req.volume.abs() < f32::EPSILON);
        assert!((req.cross_fade_rate - 1.0).abs() < f32::EPSILON);
    }

    #[test]
    fn test_callbacks_debug_shows_presence() {
        let req = BgmRequest::new("x").on_start(|| {});
        let text = format!("{:?}", req.callbacks);
        assert!(text.contains("on_start: true"));
        assert!(text.contains("on_complete: false"));
    }
}
