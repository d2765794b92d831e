//! Deterministic in-memory audio device.
//!
//! `SimulatedDevice` renders nothing. It records every voice's settings and
//! advances playback only when `advance(dt)` is called, which makes it the
//! backend for tests and for headless runs of the demo binary.

use glam::Vec3;
use parking_lot::Mutex;
use resound_common::VoiceId;
use tracing::debug;

use crate::clip::ClipHandle;
use crate::device::{AudioDevice, AudioResult, VoiceState};
use crate::spatial::SpatialParams;

/// Recorded state of one simulated voice.
#[derive(Debug, Clone, PartialEq)]
pub struct VoiceSnapshot {
    /// Assigned clip.
    pub clip: Option<ClipHandle>,
    /// Gain as set by the owner.
    pub gain: f32,
    /// Playback speed.
    pub pitch: f32,
    /// Loop flag.
    pub looping: bool,
    /// Spatial settings, `None` for 2D.
    pub spatial: Option<SpatialParams>,
    /// World position.
    pub position: Vec3,
    /// Transport state.
    pub state: VoiceState,
    /// Remaining start delay in seconds.
    pub pending_delay: f32,
    /// Playback position in clip seconds.
    pub elapsed: f32,
    /// Number of times `play` was called.
    pub play_count: u32,
}

impl Default for VoiceSnapshot {
    fn default() -> Self {
        Self {
            clip: None,
            gain: 1.0,
            pitch: 1.0,
            looping: false,
            spatial: None,
            position: Vec3::ZERO,
            state: VoiceState::Stopped,
            pending_delay: 0.0,
            elapsed: 0.0,
            play_count: 0,
        }
    }
}

impl VoiceSnapshot {
    fn advance(&mut self, dt: f32) {
        if self.state != VoiceState::Playing {
            return;
        }

        let mut dt = dt;
        if self.pending_delay > 0.0 {
            let consumed = self.pending_delay.min(dt);
            self.pending_delay -= consumed;
            dt -= consumed;
        }
        if dt <= 0.0 {
            return;
        }

        let duration = self.clip.as_ref().map_or(0.0, ClipHandle::duration);
        self.elapsed += dt * self.pitch;

        if self.elapsed >= duration {
            if self.looping && duration > 0.0 {
                self.elapsed %= duration;
            } else {
                self.elapsed = duration;
                self.state = VoiceState::Stopped;
            }
        }
    }
}

#[derive(Debug, Default)]
struct SimState {
    voices: Vec<VoiceSnapshot>,
    listener: Vec3,
}

/// Audio device that only keeps books.
#[derive(Debug, Default)]
pub struct SimulatedDevice {
    state: Mutex<SimState>,
}

impl SimulatedDevice {
    /// Create a device with no voices.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Advances every playing voice by `dt` seconds of wall time.
    pub fn advance(&self, dt: f32) {
        if dt <= 0.0 || dt.is_nan() {
            return;
        }
        let mut state = self.state.lock();
        for voice in &mut state.voices {
            voice.advance(dt);
        }
    }

    /// Copy of a voice's recorded state.
    #[must_use]
    pub fn voice(&self, voice: VoiceId) -> Option<VoiceSnapshot> {
        self.state.lock().voices.get(voice.index()).cloned()
    }

    /// Number of voices created so far.
    #[must_use]
    pub fn voice_count(&self) -> usize {
        self.state.lock().voices.len()
    }

    /// Current listener position.
    #[must_use]
    pub fn listener_position(&self) -> Vec3 {
        self.state.lock().listener
    }

    /// Gain a listener would hear: the set gain times distance attenuation.
    /// Zero unless the voice is playing and past its start delay.
    #[must_use]
    pub fn audible_gain(&self, voice: VoiceId) -> f32 {
        let state = self.state.lock();
        let Some(v) = state.voices.get(voice.index()) else {
            return 0.0;
        };
        if v.state != VoiceState::Playing || v.pending_delay > 0.0 {
            return 0.0;
        }
        let attenuation = v
            .spatial
            .map_or(1.0, |s| s.attenuation(state.listener, v.position));
        v.gain * attenuation
    }

    fn with_voice(&self, voice: VoiceId, f: impl FnOnce(&mut VoiceSnapshot)) {
        let mut state = self.state.lock();
        if let Some(v) = state.voices.get_mut(voice.index()) {
            f(v);
        }
    }
}

impl AudioDevice for SimulatedDevice {
    fn create_voice(&self) -> AudioResult<VoiceId> {
        let mut state = self.state.lock();
        let id = VoiceId::new(state.voices.len() as u32);
        state.voices.push(VoiceSnapshot::default());
        debug!("Simulated voice {} created", id.raw());
        Ok(id)
    }

    fn set_clip(&self, voice: VoiceId, clip: &ClipHandle) {
        self.with_voice(voice, |v| {
            v.clip = Some(clip.clone());
            v.elapsed = 0.0;
        });
    }

    fn set_gain(&self, voice: VoiceId, gain: f32) {
        self.with_voice(voice, |v| v.gain = gain);
    }

    fn set_pitch(&self, voice: VoiceId, pitch: f32) {
        self.with_voice(voice, |v| v.pitch = pitch);
    }

    fn set_looping(&self, voice: VoiceId, looping: bool) {
        self.with_voice(voice, |v| v.looping = looping);
    }

    fn set_spatial(&self, voice: VoiceId, spatial: Option<SpatialParams>) {
        self.with_voice(voice, |v| v.spatial = spatial);
    }

    fn set_position(&self, voice: VoiceId, position: Vec3) {
        self.with_voice(voice, |v| v.position = position);
    }

    fn set_listener_position(&self, position: Vec3) {
        self.state.lock().listener = position;
    }

    fn play(&self, voice: VoiceId, start_delay: f32) {
        self.with_voice(voice, |v| {
            v.state = VoiceState::Playing;
            v.pending_delay = start_delay.max(0.0);
            v.elapsed = 0.0;
            v.play_count += 1;
        });
    }

    fn stop(&self, voice: VoiceId) {
        self.with_voice(voice, |v| {
            v.state = VoiceState::Stopped;
            v.pending_delay = 0.0;
            v.elapsed = 0.0;
        });
    }

    fn pause(&self, voice: VoiceId) {
        self.with_voice(voice, |v| {
            if v.state == VoiceState::Playing {
                v.state = VoiceState::Paused;
            }
        });
    }

    fn resume(&self, voice: VoiceId) {
        self.with_voice(voice, |v| {
            if v.state == VoiceState::Paused {
                v.state = VoiceState::Playing;
            }
        });
    }

    fn elapsed(&self, voice: VoiceId) -> f32 {
        self.state
            .lock()
            .voices
            .get(voice.index())
            .map_or(0.0, |v| v.elapsed)
    }

    fn is_playing(&self, voice: VoiceId) -> bool {
        self.state
            .lock()
            .voices
            .get(voice.index())
            .is_some_and(|v| v.state == VoiceState::Playing)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::spatial::Rolloff;

    fn device_with_clip(duration: f32) -> (SimulatedDevice, VoiceId) {
        let device = SimulatedDevice::new();
        let voice = device.create_voice().expect("voice");
        device.set_clip(voice, &ClipHandle::new("clip", duration));
        (device, voice)
    }

    #[test]
    fn test_create_voice_ids_are_sequential() {
        let device = SimulatedDevice::new();
        let a = device.create_voice().expect("voice");
        let b = device.create_voice().expect("voice");
        assert_eq!(a.index(), 0);
        assert_eq!(b.index(), 1);
        assert_eq!(device.voice_count(), 2);
    }

    #[test]
    fn test_play_advances_and_finishes() {
        let (device, voice) = device_with_clip(1.0);
        device.play(voice, 0.0);
        device.advance(0.5);
        assert!(device.is_playing(voice));
        assert!((device.elapsed(voice) - 0.5).abs() < 1e-5);

        device.advance(0.6);
        assert!(!device.is_playing(voice));
    }

    #[test]
    fn test_start_delay_is_consumed_first() {
        let (device, voice) = device_with_clip(2.0);
        device.play(voice, 0.5);
        device.advance(0.3);
        assert!(device.elapsed(voice).abs() < f32::EPSILON);
        assert!(device.audible_gain(voice).abs() < f32::EPSILON);

        device.advance(0.3);
        assert!((device.elapsed(voice) - 0.1).abs() < 1e-5);
    }

    #[test]
    fn test_looping_wraps() {
        let (device, voice) = device_with_clip(1.0);
        device.set_looping(voice, true);
        device.play(voice, 0.0);
        device.advance(1.25);
        assert!(device.is_playing(voice));
        assert!((device.elapsed(voice) - 0.25).abs() < 1e-5);
    }

    #[test]
    fn test_pitch_scales_elapsed() {
        let (device, voice) = device_with_clip(10.0);
        device.set_pitch(voice, 2.0);
        device.play(voice, 0.0);
        device.advance(1.0);
        assert!((device.elapsed(voice) - 2.0).abs() < 1e-5);
    }

    #[test]
    fn test_pause_freezes_voice() {
        let (device, voice) = device_with_clip(10.0);
        device.play(voice, 0.0);
        device.advance(1.0);
        device.pause(voice);
        device.advance(1.0);
        assert!((device.elapsed(voice) - 1.0).abs() < 1e-5);
        assert!(!device.is_playing(voice));

        device.resume(voice);
        device.advance(1.0);
        assert!((device.elapsed(voice) - 2.0).abs() < 1e-5);
    }

    #[test]
    fn test_audible_gain_applies_attenuation() {
        let (device, voice) = device_with_clip(10.0);
        device.set_gain(voice, 0.8);
        device.set_spatial(voice, Some(SpatialParams::new(1.0, 11.0, Rolloff::Linear)));
        device.set_position(voice, Vec3::new(6.0, 0.0, 0.0));
        device.play(voice, 0.0);

        assert!((device.audible_gain(voice) - 0.4).abs() < 1e-4);

        device.set_listener_position(Vec3::new(6.0, 0.0, 0.0));
        assert!((device.audible_gain(voice) - 0.8).abs() < 1e-5);
    }

    #[test]
    fn test_unknown_voice_is_ignored() {
        let device = SimulatedDevice::new();
        let ghost = VoiceId::new(42);
        device.set_gain(ghost, 0.5);
        device.play(ghost, 0.0);
        assert!(!device.is_playing(ghost));
        assert!(device.voice(ghost).is_none());
    }
}
