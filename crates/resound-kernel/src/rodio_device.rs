//! Audio output through rodio.
//!
//! Each voice wraps one rodio `Sink`. A sink cannot rewind, so `play`
//! replaces the voice's sink with a fresh one and appends a cursor over the
//! clip's cached samples (with the start delay prepended as silence). The
//! cursor shares the decoded buffer, so playing never copies samples.
//!
//! ```text
//! RodioDevice
//!   ├── OutputStream (kept alive)
//!   ├── clips:  ClipId → decoded samples
//!   └── voices: [Sink + gain/pitch/position bookkeeping]
//! ```
//!
//! Clips are decoded fully into memory when loaded; there is no streaming.

use std::io::{BufReader, Cursor, Read, Seek};
use std::path::Path;
use std::sync::Arc;
use std::time::{Duration, Instant};

use ahash::AHashMap;
use glam::Vec3;
use parking_lot::{Mutex, RwLock};
use resound_common::{ClipId, VoiceId};
use rodio::{Decoder, OutputStream, OutputStreamHandle, Sink, Source};
use tracing::{debug, info, warn};

use crate::clip::ClipHandle;
use crate::device::{AudioDevice, AudioError, AudioResult};
use crate::spatial::SpatialParams;

/// Rodio derives the output rate from the speed, so zero is not allowed.
const MIN_SPEED: f32 = 0.01;

/// Decoded samples of one clip.
#[derive(Debug)]
struct CachedClip {
    samples: Arc<Vec<f32>>,
    sample_rate: u32,
    channels: u16,
    duration: f32,
}

/// Cursor over a cached clip. Wraps to the start instead of ending when
/// looping.
#[derive(Debug, Clone)]
struct SharedSamples {
    samples: Arc<Vec<f32>>,
    position: usize,
    sample_rate: u32,
    channels: u16,
    looping: bool,
}

impl SharedSamples {
    fn new(clip: &CachedClip, looping: bool) -> Self {
        Self {
            samples: Arc::clone(&clip.samples),
            position: 0,
            sample_rate: clip.sample_rate,
            channels: clip.channels,
            looping,
        }
    }
}

impl Iterator for SharedSamples {
    type Item = f32;

    fn next(&mut self) -> Option<f32> {
        if self.position >= self.samples.len() {
            if !self.looping || self.samples.is_empty() {
                return None;
            }
            self.position = 0;
        }
        let sample = self.samples[self.position];
        self.position += 1;
        Some(sample)
    }
}

impl Source for SharedSamples {
    fn current_frame_len(&self) -> Option<usize> {
        None
    }

    fn channels(&self) -> u16 {
        self.channels
    }

    fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    fn total_duration(&self) -> Option<Duration> {
        if self.looping {
            return None;
        }
        let frames = self.samples.len() / usize::from(self.channels.max(1));
        (self.sample_rate > 0)
            .then(|| Duration::from_secs_f64(frames as f64 / f64::from(self.sample_rate)))
    }
}

struct RodioVoice {
    sink: Sink,
    clip: Option<ClipId>,
    gain: f32,
    pitch: f32,
    looping: bool,
    spatial: Option<SpatialParams>,
    position: Vec3,
    start_delay: Duration,
    started_at: Option<Instant>,
    played_before_pause: Duration,
}

impl std::fmt::Debug for RodioVoice {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RodioVoice")
            .field("clip", &self.clip)
            .field("gain", &self.gain)
            .field("pitch", &self.pitch)
            .field("looping", &self.looping)
            .finish_non_exhaustive()
    }
}

impl RodioVoice {
    fn new(sink: Sink) -> Self {
        Self {
            sink,
            clip: None,
            gain: 1.0,
            pitch: 1.0,
            looping: false,
            spatial: None,
            position: Vec3::ZERO,
            start_delay: Duration::ZERO,
            started_at: None,
            played_before_pause: Duration::ZERO,
        }
    }

    fn apply_volume(&self, listener: Vec3) {
        let attenuation = self
            .spatial
            .map_or(1.0, |s| s.attenuation(listener, self.position));
        self.sink.set_volume(self.gain * attenuation);
    }

    fn wall_time(&self) -> Duration {
        self.played_before_pause + self.started_at.map_or(Duration::ZERO, |t| t.elapsed())
    }
}

/// Audio device backed by the default system output.
pub struct RodioDevice {
    _stream: OutputStream,
    handle: OutputStreamHandle,
    clips: RwLock<AHashMap<ClipId, CachedClip>>,
    voices: Mutex<Vec<RodioVoice>>,
    listener: Mutex<Vec3>,
}

impl std::fmt::Debug for RodioDevice {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RodioDevice")
            .field("clips", &self.clips.read().len())
            .field("voices", &self.voices.lock().len())
            .finish_non_exhaustive()
    }
}

impl RodioDevice {
    /// Opens the default output device.
    pub fn new() -> AudioResult<Self> {
        let (stream, handle) =
            OutputStream::try_default().map_err(|e| AudioError::DeviceInitFailed(e.to_string()))?;

        info!("Audio device initialized");

        Ok(Self {
            _stream: stream,
            handle,
            clips: RwLock::new(AHashMap::new()),
            voices: Mutex::new(Vec::new()),
            listener: Mutex::new(Vec3::ZERO),
        })
    }

    /// Decodes a file and returns a handle whose duration is measured from
    /// the decoded samples.
    pub fn load_clip(&self, name: &str, path: impl AsRef<Path>) -> AudioResult<ClipHandle> {
        let path = path.as_ref();
        let file = std::fs::File::open(path).map_err(|e| AudioError::LoadFailed {
            path: path.to_path_buf(),
            message: e.to_string(),
        })?;
        let decoder = Decoder::new(BufReader::new(file)).map_err(|e| AudioError::LoadFailed {
            path: path.to_path_buf(),
            message: e.to_string(),
        })?;

        let handle = self.cache_decoded(name, decoder);
        debug!("Loaded clip '{}' from {:?}", name, path);
        Ok(handle)
    }

    /// Decodes an in-memory encoded file.
    pub fn load_clip_from_memory(&self, name: &str, data: &[u8]) -> AudioResult<ClipHandle> {
        let decoder = Decoder::new(Cursor::new(data.to_vec()))
            .map_err(|e| AudioError::DecodeFailed(e.to_string()))?;
        Ok(self.cache_decoded(name, decoder))
    }

    fn cache_decoded<R>(&self, name: &str, decoder: Decoder<R>) -> ClipHandle
    where
        R: Read + Seek + Send + Sync + 'static,
    {
        let sample_rate = decoder.sample_rate();
        let channels = decoder.channels();
        let samples: Vec<f32> = decoder.convert_samples::<f32>().collect();

        let frames = samples.len() / usize::from(channels.max(1));
        let duration = if sample_rate > 0 {
            frames as f32 / sample_rate as f32
        } else {
            0.0
        };

        let handle = ClipHandle::new(name, duration);
        self.clips.write().insert(
            handle.id(),
            CachedClip {
                samples: Arc::new(samples),
                sample_rate,
                channels,
                duration,
            },
        );
        handle
    }

    fn with_voice<R>(&self, voice: VoiceId, f: impl FnOnce(&mut RodioVoice) -> R) -> Option<R> {
        let mut voices = self.voices.lock();
        voices.get_mut(voice.index()).map(f)
    }

    fn clip_duration(&self, clip: Option<ClipId>) -> f32 {
        clip.and_then(|id| self.clips.read().get(&id).map(|c| c.duration))
            .unwrap_or(0.0)
    }
}

impl AudioDevice for RodioDevice {
    fn create_voice(&self) -> AudioResult<VoiceId> {
        let sink = Sink::try_new(&self.handle)
            .map_err(|e| AudioError::VoiceCreationFailed(e.to_string()))?;
        let mut voices = self.voices.lock();
        let id = VoiceId::new(voices.len() as u32);
        voices.push(RodioVoice::new(sink));
        Ok(id)
    }

    fn set_clip(&self, voice: VoiceId, clip: &ClipHandle) {
        if !self.clips.read().contains_key(&clip.id()) {
            warn!("Clip '{}' was not loaded by this device", clip.name());
        }
        self.with_voice(voice, |v| v.clip = Some(clip.id()));
    }

    fn set_gain(&self, voice: VoiceId, gain: f32) {
        let listener = *self.listener.lock();
        self.with_voice(voice, |v| {
            v.gain = gain;
            v.apply_volume(listener);
        });
    }

    fn set_pitch(&self, voice: VoiceId, pitch: f32) {
        self.with_voice(voice, |v| {
            v.pitch = pitch;
            v.sink.set_speed(pitch.max(MIN_SPEED));
        });
    }

    fn set_looping(&self, voice: VoiceId, looping: bool) {
        self.with_voice(voice, |v| v.looping = looping);
    }

    fn set_spatial(&self, voice: VoiceId, spatial: Option<SpatialParams>) {
        let listener = *self.listener.lock();
        self.with_voice(voice, |v| {
            v.spatial = spatial;
            v.apply_volume(listener);
        });
    }

    fn set_position(&self, voice: VoiceId, position: Vec3) {
        let listener = *self.listener.lock();
        self.with_voice(voice, |v| {
            v.position = position;
            v.apply_volume(listener);
        });
    }

    fn set_listener_position(&self, position: Vec3) {
        *self.listener.lock() = position;
        for v in self.voices.lock().iter() {
            v.apply_volume(position);
        }
    }

    fn play(&self, voice: VoiceId, start_delay: f32) {
        let listener = *self.listener.lock();
        let clips = self.clips.read();
        let mut voices = self.voices.lock();
        let Some(v) = voices.get_mut(voice.index()) else {
            return;
        };
        let Some(clip) = v.clip.and_then(|id| clips.get(&id)) else {
            warn!("Voice {} has no playable clip", voice.raw());
            return;
        };

        let sink = match Sink::try_new(&self.handle) {
            Ok(sink) => sink,
            Err(e) => {
                warn!("Failed to recreate sink for voice {}: {e}", voice.raw());
                return;
            },
        };
        v.sink.stop();
        v.sink = sink;
        v.sink.set_speed(v.pitch.max(MIN_SPEED));

        let delay = Duration::from_secs_f32(start_delay.max(0.0));
        v.sink
            .append(SharedSamples::new(clip, v.looping).delay(delay));
        v.apply_volume(listener);
        v.sink.play();

        v.start_delay = delay;
        v.started_at = Some(Instant::now());
        v.played_before_pause = Duration::ZERO;
    }

    fn stop(&self, voice: VoiceId) {
        self.with_voice(voice, |v| {
            v.sink.stop();
            v.started_at = None;
            v.played_before_pause = Duration::ZERO;
        });
    }

    fn pause(&self, voice: VoiceId) {
        self.with_voice(voice, |v| {
            if let Some(started) = v.started_at.take() {
                v.played_before_pause += started.elapsed();
            }
            v.sink.pause();
        });
    }

    fn resume(&self, voice: VoiceId) {
        self.with_voice(voice, |v| {
            if v.started_at.is_none() && !v.sink.empty() {
                v.started_at = Some(Instant::now());
            }
            v.sink.play();
        });
    }

    fn elapsed(&self, voice: VoiceId) -> f32 {
        let (clip, wall, delay, pitch, looping) = match self.with_voice(voice, |v| {
            (v.clip, v.wall_time(), v.start_delay, v.pitch, v.looping)
        }) {
            Some(parts) => parts,
            None => return 0.0,
        };

        let duration = self.clip_duration(clip);
        let played = wall.saturating_sub(delay).as_secs_f32() * pitch;
        if looping && duration > 0.0 {
            played % duration
        } else {
            played.min(duration)
        }
    }

    fn is_playing(&self, voice: VoiceId) -> bool {
        self.with_voice(voice, |v| !v.sink.empty() && !v.sink.is_paused())
            .unwrap_or(false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cached(samples: Vec<f32>) -> CachedClip {
        CachedClip {
            samples: Arc::new(samples),
            sample_rate: 4,
            channels: 1,
            duration: 1.0,
        }
    }

    #[test]
    fn test_cursor_shares_buffer() {
        let clip = cached(vec![0.1, 0.2, 0.3, 0.4]);
        let cursor = SharedSamples::new(&clip, false);
        assert_eq!(Arc::strong_count(&clip.samples), 2);

        let played: Vec<f32> = cursor.collect();
        assert_eq!(played, vec![0.1, 0.2, 0.3, 0.4]);
        assert_eq!(Arc::strong_count(&clip.samples), 1);
    }

    #[test]
    fn test_cursor_wraps_when_looping() {
        let clip = cached(vec![1.0, 2.0]);
        let played: Vec<f32> = SharedSamples::new(&clip, true).take(5).collect();
        assert_eq!(played, vec![1.0, 2.0, 1.0, 2.0, 1.0]);
        assert!(SharedSamples::new(&clip, true).total_duration().is_none());
    }

    #[test]
    fn test_cursor_duration_and_empty_loop() {
        let clip = cached(vec![0.0; 8]);
        let once = SharedSamples::new(&clip, false);
        assert_eq!(once.total_duration(), Some(Duration::from_secs(2)));

        let empty = cached(Vec::new());
        assert_eq!(SharedSamples::new(&empty, true).next(), None);
    }
}
