//! Audio device abstraction.
//!
//! A device hands out voices. Each voice plays one clip at a time with its
//! own gain, pitch, loop flag and (for 3D voices) position. Voice setters are
//! infallible: a setter addressed to an unknown voice is ignored, so a
//! player can never take down the tick because the backend went away.

use std::path::PathBuf;

use glam::Vec3;
use resound_common::VoiceId;
use thiserror::Error;

use crate::clip::ClipHandle;
use crate::spatial::SpatialParams;

/// Audio device error types.
#[derive(Debug, Error)]
pub enum AudioError {
    /// Failed to initialize audio device.
    #[error("Failed to initialize audio device: {0}")]
    DeviceInitFailed(String),

    /// Failed to create a voice.
    #[error("Failed to create voice: {0}")]
    VoiceCreationFailed(String),

    /// Failed to load audio file.
    #[error("Failed to load audio file '{path}': {message}")]
    LoadFailed {
        /// Path to the file that failed to load.
        path: PathBuf,
        /// Error message.
        message: String,
    },

    /// Failed to decode audio data.
    #[error("Failed to decode audio: {0}")]
    DecodeFailed(String),

    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for audio device operations.
pub type AudioResult<T> = Result<T, AudioError>;

/// Transport state of a voice.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum VoiceState {
    /// Not playing; `play` restarts from the beginning.
    #[default]
    Stopped,
    /// Playing, or waiting out a start delay.
    Playing,
    /// Suspended; `resume` continues where it left off.
    Paused,
}

/// Output device that owns a set of voices.
///
/// Implementations use interior mutability; every method takes `&self` so the
/// device can be shared between all players of one manager.
pub trait AudioDevice {
    /// Allocates a new voice. Voices are never freed; players reuse theirs.
    fn create_voice(&self) -> AudioResult<VoiceId>;

    /// Assigns the clip the voice plays on the next `play`.
    fn set_clip(&self, voice: VoiceId, clip: &ClipHandle);

    /// Output gain in `[0, 1]` before distance attenuation.
    fn set_gain(&self, voice: VoiceId, gain: f32);

    /// Playback speed multiplier.
    fn set_pitch(&self, voice: VoiceId, pitch: f32);

    /// Whether the clip wraps at its end.
    fn set_looping(&self, voice: VoiceId, looping: bool);

    /// `Some` makes the voice 3D with distance attenuation, `None` makes it 2D.
    fn set_spatial(&self, voice: VoiceId, spatial: Option<SpatialParams>);

    /// World position of a 3D voice.
    fn set_position(&self, voice: VoiceId, position: Vec3);

    /// World position of the single listener.
    fn set_listener_position(&self, position: Vec3);

    /// Starts the assigned clip from the beginning after `start_delay` seconds.
    fn play(&self, voice: VoiceId, start_delay: f32);

    /// Stops the voice and rewinds it.
    fn stop(&self, voice: VoiceId);

    /// Suspends the voice, including any pending start delay.
    fn pause(&self, voice: VoiceId);

    /// Continues a paused voice.
    fn resume(&self, voice: VoiceId);

    /// Playback position in clip seconds.
    fn elapsed(&self, voice: VoiceId) -> f32;

    /// Whether the voice is playing (a pending start delay counts).
    fn is_playing(&self, voice: VoiceId) -> bool;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_voice_state_default() {
        assert_eq!(VoiceState::default(), VoiceState::Stopped);
    }

    #[test]
    fn test_error_messages() {
        let err = AudioError::LoadFailed {
            path: PathBuf::from("sfx/jump.wav"),
            message: "missing".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "Failed to load audio file 'sfx/jump.wav': missing"
        );
    }
}
