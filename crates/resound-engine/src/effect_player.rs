//! One slot of the sound-effect pool.
//!
//! ```text
//!            play()            delay elapsed              last pass ends
//!   Idle ───────────▶ DelayWait ─────────────▶ Playing ─────────────────▶ Idle
//!    ▲                    │                    │   │  (on_complete,
//!    │                    └──── pause() ───────┤   │   on_complete_after)
//!    │                                         ▼   │
//!    │                                      Paused │ pass ends, loops left:
//!    │                                             │ restart voice + envelope
//!    └──────────── stop() from any busy state ─────┴──▶ Stopped (no callbacks)
//! ```
//!
//! `Idle` and `Stopped` both count as free. The player keeps its own clock:
//! the delay and the position in the current pass advance by the tick's `dt`
//! (the latter scaled by pitch), and the device is only told what to render.

use std::sync::Arc;

use resound_common::VoiceId;
use resound_kernel::{AudioDevice, AudioResult, ClipHandle, GainCurve, SpatialParams};
use tracing::debug;

use crate::emitter::Emitter;
use crate::request::{Callbacks, SeRequest};

/// Lifecycle state of an effect slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum EffectState {
    /// Never used, or finished naturally.
    #[default]
    Idle,
    /// Accepted, waiting out the start delay.
    DelayWait,
    /// Audible.
    Playing,
    /// Suspended by `pause()`.
    Paused,
    /// Cut short by `stop()` or preemption.
    Stopped,
}

impl EffectState {
    /// Whether the slot can be leased.
    #[must_use]
    pub const fn is_free(self) -> bool {
        matches!(self, Self::Idle | Self::Stopped)
    }
}

/// A pooled sound-effect player owning one device voice.
pub struct EffectPlayer {
    device: Arc<dyn AudioDevice>,
    voice: VoiceId,
    state: EffectState,
    resume_state: EffectState,
    generation: u32,

    clip: Option<ClipHandle>,
    volume: f32,
    delay: f32,
    pitch: f32,
    curve: Option<GainCurve>,
    remaining_loops: u32,
    loop_infinite: bool,
    emitter: Emitter,
    callbacks: Callbacks,

    delay_elapsed: f32,
    play_time: f32,
    passes_completed: u32,
}

impl std::fmt::Debug for EffectPlayer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EffectPlayer")
            .field("voice", &self.voice)
            .field("state", &self.state)
            .field("generation", &self.generation)
            .field("clip", &self.clip.as_ref().map(ClipHandle::name))
            .field("play_time", &self.play_time)
            .finish_non_exhaustive()
    }
}

impl EffectPlayer {
    /// Creates an idle player with a fresh voice on `device`.
    pub fn new(device: Arc<dyn AudioDevice>) -> AudioResult<Self> {
        let voice = device.create_voice()?;
        Ok(Self {
            device,
            voice,
            state: EffectState::Idle,
            resume_state: EffectState::Idle,
            generation: 0,
            clip: None,
            volume: 1.0,
            delay: 0.0,
            pitch: 1.0,
            curve: None,
            remaining_loops: 1,
            loop_infinite: false,
            emitter: Emitter::Flat,
            callbacks: Callbacks::default(),
            delay_elapsed: 0.0,
            play_time: 0.0,
            passes_completed: 0,
        })
    }

    // ============================================
    // Accessors
    // ============================================

    /// Current lifecycle state.
    #[must_use]
    pub const fn state(&self) -> EffectState {
        self.state
    }

    /// Whether the slot can be leased.
    #[must_use]
    pub const fn is_free(&self) -> bool {
        self.state.is_free()
    }

    /// Whether the slot is waiting out its delay or audible.
    #[must_use]
    pub const fn is_playing(&self) -> bool {
        matches!(self.state, EffectState::DelayWait | EffectState::Playing)
    }

    /// Whether the slot is paused.
    #[must_use]
    pub const fn is_paused(&self) -> bool {
        matches!(self.state, EffectState::Paused)
    }

    /// Lease counter, bumped by every `configure`.
    #[must_use]
    pub const fn generation(&self) -> u32 {
        self.generation
    }

    /// Voice owned by this slot.
    #[must_use]
    pub const fn voice(&self) -> VoiceId {
        self.voice
    }

    /// Name of the configured clip.
    #[must_use]
    pub fn clip_name(&self) -> Option<&str> {
        self.clip.as_ref().map(ClipHandle::name)
    }

    /// Position in the current pass, in clip seconds.
    #[must_use]
    pub const fn play_time(&self) -> f32 {
        self.play_time
    }

    /// Passes finished since the last `play`.
    #[must_use]
    pub const fn passes_completed(&self) -> u32 {
        self.passes_completed
    }

    /// Configured volume after clamping.
    #[must_use]
    pub const fn volume(&self) -> f32 {
        self.volume
    }

    /// Configured pitch after clamping.
    #[must_use]
    pub const fn pitch(&self) -> f32 {
        self.pitch
    }

    /// Configured start delay after clamping.
    #[must_use]
    pub const fn delay(&self) -> f32 {
        self.delay
    }

    /// Normalized progress through the current pass, in `[0, 1]`.
    ///
    /// Zero while free or still waiting out the delay.
    #[must_use]
    pub fn length(&self) -> f32 {
        let audible = match self.state {
            EffectState::Playing => true,
            EffectState::Paused => self.resume_state == EffectState::Playing,
            _ => false,
        };
        if !audible {
            return 0.0;
        }
        match self.clip.as_ref().map(ClipHandle::duration) {
            Some(duration) if duration > 0.0 => (self.play_time / duration).clamp(0.0, 1.0),
            _ => 1.0,
        }
    }

    /// Envelope factor at the current play time.
    #[must_use]
    pub fn envelope(&self) -> f32 {
        self.curve
            .as_ref()
            .map_or(1.0, |c| c.evaluate(self.play_time))
    }

    // ============================================
    // Lifecycle
    // ============================================

    /// Loads a request into the slot, leaving it `Idle`.
    ///
    /// A busy slot is silenced first without firing any callback; this is
    /// how the pool preempts a sound.
    pub fn configure(&mut self, request: SeRequest, clip: ClipHandle, spatial: Option<SpatialParams>) {
        if !self.is_free() {
            debug!(
                "Preempting '{}' on voice {}",
                self.clip_name().unwrap_or_default(),
                self.voice.raw()
            );
            self.device.stop(self.voice);
        }

        let request = request.clamped();
        self.generation = self.generation.wrapping_add(1);
        self.state = EffectState::Idle;
        self.resume_state = EffectState::Idle;

        self.volume = request.volume;
        self.delay = request.delay;
        self.pitch = request.pitch;
        self.loop_infinite = request.loop_count == 0;
        self.remaining_loops = request.loop_count.max(1);
        self.curve = if request.fade_in > 0.0 || request.fade_out > 0.0 {
            Some(GainCurve::build(request.fade_in, request.fade_out, clip.duration()))
        } else {
            None
        };
        self.emitter = request.emitter;
        self.callbacks = request.callbacks;

        self.device.set_clip(self.voice, &clip);
        self.device.set_pitch(self.voice, self.pitch);
        self.device.set_looping(self.voice, false);
        self.device.set_spatial(self.voice, spatial.filter(|_| self.emitter.is_spatial()));
        if let Some(position) = self.emitter.position() {
            self.device.set_position(self.voice, position);
        }
        self.clip = Some(clip);
    }

    /// Starts the configured clip. `mix` is total × SE volume.
    ///
    /// `on_start_before` fires immediately; with no delay the sound is also
    /// audible (and `on_start` fires) before this returns.
    pub fn play(&mut self, mix: f32) {
        if self.clip.is_none() || self.state != EffectState::Idle {
            return;
        }

        self.state = EffectState::DelayWait;
        self.delay_elapsed = 0.0;
        self.play_time = 0.0;
        self.passes_completed = 0;

        self.callbacks.start_before();
        self.apply_gain(mix);
        self.device.play(self.voice, self.delay);

        if self.delay <= 0.0 {
            self.begin_playback();
        }
    }

    /// Advances the slot by `dt` seconds. `mix` is total × SE volume.
    pub fn update(&mut self, dt: f32, mix: f32) {
        let dt = if dt.is_nan() { 0.0 } else { dt.max(0.0) };

        match self.state {
            EffectState::DelayWait => {
                self.delay_elapsed += dt;
                if self.delay_elapsed < self.delay {
                    return;
                }
                let leftover = self.delay_elapsed - self.delay;
                self.begin_playback();
                self.advance_pass(leftover);
            },
            EffectState::Playing => self.advance_pass(dt),
            _ => return,
        }

        if self.state == EffectState::Playing {
            self.follow_emitter();
            self.apply_gain(mix);
        }
    }

    /// Suspends the voice and the slot's clock. No-op unless busy.
    pub fn pause(&mut self) {
        if !self.is_playing() {
            return;
        }
        self.resume_state = self.state;
        self.state = EffectState::Paused;
        self.device.pause(self.voice);
    }

    /// Continues a paused slot where it left off.
    pub fn resume(&mut self) {
        if self.state != EffectState::Paused {
            return;
        }
        self.state = self.resume_state;
        self.device.resume(self.voice);
    }

    /// Silences the slot and frees it without firing any callback.
    /// No-op on a free slot.
    pub fn stop(&mut self) {
        if self.is_free() {
            return;
        }
        self.device.stop(self.voice);
        self.state = EffectState::Stopped;
        self.resume_state = EffectState::Idle;
        debug!("Stopped effect on voice {}", self.voice.raw());
    }

    // ============================================
    // Internals
    // ============================================

    fn begin_playback(&mut self) {
        self.state = EffectState::Playing;
        self.follow_emitter();
        self.callbacks.start();
    }

    fn advance_pass(&mut self, dt: f32) {
        self.play_time += dt * self.pitch;

        let duration = self.clip.as_ref().map_or(0.0, ClipHandle::duration);
        if self.play_time < duration {
            return;
        }

        self.passes_completed += 1;
        if self.loop_infinite || self.remaining_loops > 1 {
            if !self.loop_infinite {
                self.remaining_loops -= 1;
            }
            self.play_time = (self.play_time - duration).max(0.0);
            self.device.play(self.voice, 0.0);
        } else {
            self.complete();
        }
    }

    fn complete(&mut self) {
        self.device.stop(self.voice);
        self.state = EffectState::Idle;
        self.resume_state = EffectState::Idle;
        debug!(
            "Effect '{}' complete after {} pass(es)",
            self.clip_name().unwrap_or_default(),
            self.passes_completed
        );
        self.callbacks.complete();
    }

    fn follow_emitter(&self) {
        if let Emitter::Follow(anchor) = &self.emitter {
            if let Some(position) = anchor.position() {
                self.device.set_position(self.voice, position);
            }
        }
    }

    fn apply_gain(&self, mix: f32) {
        let gain = self.volume * mix * self.envelope();
        self.device.set_gain(self.voice, gain);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::emitter::Anchor;
    use glam::Vec3;
    use resound_kernel::SimulatedDevice;
    use std::sync::atomic::{AtomicU32, Ordering};

    const DT: f32 = 0.1;

    fn setup() -> (Arc<SimulatedDevice>, EffectPlayer) {
        let device = Arc::new(SimulatedDevice::new());
        let player = EffectPlayer::new(device.clone()).expect("voice");
        (device, player)
    }

    fn counter() -> (Arc<AtomicU32>, impl Fn() + Send + Sync + 'static) {
        let count = Arc::new(AtomicU32::new(0));
        let c = Arc::clone(&count);
        (count, move || {
            c.fetch_add(1, Ordering::SeqCst);
        })
    }

    fn run(player: &mut EffectPlayer, device: &SimulatedDevice, seconds: f32) {
        let steps = (seconds / DT).round() as usize;
        for _ in 0..steps {
            device.advance(DT);
            player.update(DT, 1.0);
        }
    }

    #[test]
    fn test_play_without_delay_starts_immediately() {
        let (device, mut player) = setup();
        let (started, on_start) = counter();
        let (before, on_before) = counter();

        player.configure(
            SeRequest::new("blip").on_start(on_start).on_start_before(on_before),
            ClipHandle::new("blip", 1.0),
            None,
        );
        player.play(1.0);

        assert_eq!(player.state(), EffectState::Playing);
        assert_eq!(started.load(Ordering::SeqCst), 1);
        assert_eq!(before.load(Ordering::SeqCst), 1);
        assert!(device.is_playing(player.voice()));
    }

    #[test]
    fn test_delay_wait_then_start() {
        let (device, mut player) = setup();
        let (started, on_start) = counter();
        let (before, on_before) = counter();

        player.configure(
            SeRequest::new("blip")
                .with_delay(0.5)
                .on_start(on_start)
                .on_start_before(on_before),
            ClipHandle::new("blip", 2.0),
            None,
        );
        player.play(1.0);

        assert_eq!(player.state(), EffectState::DelayWait);
        assert_eq!(before.load(Ordering::SeqCst), 1);
        assert_eq!(started.load(Ordering::SeqCst), 0);
        assert!(player.length().abs() < f32::EPSILON);

        run(&mut player, &device, 0.3);
        assert_eq!(player.state(), EffectState::DelayWait);

        run(&mut player, &device, 0.3);
        assert_eq!(player.state(), EffectState::Playing);
        assert_eq!(started.load(Ordering::SeqCst), 1);
        assert!((player.play_time() - 0.1).abs() < 1e-4);
    }

    #[test]
    fn test_natural_completion_fires_callbacks() {
        let (device, mut player) = setup();
        let (completed, on_complete) = counter();
        let (after, on_after) = counter();

        player.configure(
            SeRequest::new("blip")
                .on_complete(on_complete)
                .on_complete_after(on_after),
            ClipHandle::new("blip", 0.5),
            None,
        );
        player.play(1.0);
        run(&mut player, &device, 0.6);

        assert_eq!(player.state(), EffectState::Idle);
        assert!(player.is_free());
        assert_eq!(completed.load(Ordering::SeqCst), 1);
        assert_eq!(after.load(Ordering::SeqCst), 1);
        assert!(!device.is_playing(player.voice()));
    }

    #[test]
    fn test_loop_count_three_passes() {
        let (device, mut player) = setup();
        let (started, on_start) = counter();
        let (completed, on_complete) = counter();

        player.configure(
            SeRequest::new("step")
                .with_loop_count(3)
                .on_start(on_start)
                .on_complete(on_complete),
            ClipHandle::new("step", 1.0),
            None,
        );
        player.play(1.0);

        run(&mut player, &device, 2.5);
        assert_eq!(player.passes_completed(), 2);
        assert_eq!(completed.load(Ordering::SeqCst), 0);

        run(&mut player, &device, 1.0);
        assert_eq!(player.passes_completed(), 3);
        assert_eq!(completed.load(Ordering::SeqCst), 1);
        assert_eq!(started.load(Ordering::SeqCst), 1);
        assert_eq!(player.state(), EffectState::Idle);

        let snapshot = device.voice(player.voice()).expect("voice");
        assert_eq!(snapshot.play_count, 3);
    }

    #[test]
    fn test_infinite_loop_never_completes() {
        let (device, mut player) = setup();
        let (completed, on_complete) = counter();

        player.configure(
            SeRequest::new("hum").looping().on_complete(on_complete),
            ClipHandle::new("hum", 0.5),
            None,
        );
        player.play(1.0);
        run(&mut player, &device, 5.0);

        assert_eq!(player.state(), EffectState::Playing);
        assert!(player.passes_completed() >= 8);
        assert_eq!(completed.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_loop_restart_carries_overshoot() {
        let (device, mut player) = setup();
        player.configure(
            SeRequest::new("tick").looping(),
            ClipHandle::new("tick", 0.25),
            None,
        );
        player.play(1.0);

        run(&mut player, &device, 0.3);
        assert_eq!(player.passes_completed(), 1);
        assert!((player.play_time() - 0.05).abs() < 1e-4);

        run(&mut player, &device, 0.1);
        assert_eq!(player.passes_completed(), 1);
        assert!((player.play_time() - 0.15).abs() < 1e-4);
    }

    #[test]
    fn test_stop_is_silent_and_idempotent() {
        let (device, mut player) = setup();
        let (completed, on_complete) = counter();

        // Stop on an idle slot changes nothing.
        player.stop();
        assert_eq!(player.state(), EffectState::Idle);

        player.configure(
            SeRequest::new("blip").on_complete(on_complete),
            ClipHandle::new("blip", 1.0),
            None,
        );
        player.play(1.0);
        player.stop();

        assert_eq!(player.state(), EffectState::Stopped);
        assert!(player.is_free());
        assert!(!device.is_playing(player.voice()));

        player.stop();
        assert_eq!(player.state(), EffectState::Stopped);

        run(&mut player, &device, 2.0);
        assert_eq!(completed.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_pause_freezes_clock() {
        let (device, mut player) = setup();
        player.configure(SeRequest::new("blip"), ClipHandle::new("blip", 2.0), None);
        player.play(1.0);
        run(&mut player, &device, 0.5);

        player.pause();
        assert_eq!(player.state(), EffectState::Paused);
        let frozen = player.play_time();
        run(&mut player, &device, 1.0);
        assert!((player.play_time() - frozen).abs() < f32::EPSILON);
        assert!((player.length() - 0.25).abs() < 1e-4);

        player.resume();
        assert_eq!(player.state(), EffectState::Playing);
        run(&mut player, &device, 0.5);
        assert!((player.play_time() - 1.0).abs() < 1e-4);
    }

    #[test]
    fn test_pause_idle_is_noop() {
        let (_device, mut player) = setup();
        player.pause();
        assert_eq!(player.state(), EffectState::Idle);
        player.resume();
        assert_eq!(player.state(), EffectState::Idle);
    }

    #[test]
    fn test_pitch_scales_progress() {
        let (device, mut player) = setup();
        player.configure(
            SeRequest::new("blip").with_pitch(2.0),
            ClipHandle::new("blip", 4.0),
            None,
        );
        player.play(1.0);
        run(&mut player, &device, 1.0);
        assert!((player.length() - 0.5).abs() < 1e-4);
    }

    #[test]
    fn test_gain_includes_mix_and_envelope() {
        let (device, mut player) = setup();
        player.configure(
            SeRequest::new("swell").with_volume(0.5).with_fade_in(2.0),
            ClipHandle::new("swell", 4.0),
            None,
        );
        player.play(0.8);
        device.advance(1.0);
        player.update(1.0, 0.8);

        // 0.5 volume × 0.8 mix × 0.5 envelope
        let gain = device.voice(player.voice()).expect("voice").gain;
        assert!((gain - 0.2).abs() < 1e-5);
    }

    #[test]
    fn test_follow_anchor_until_dropped() {
        let (device, mut player) = setup();
        let anchor = Anchor::new(Vec3::new(1.0, 0.0, 0.0));
        player.configure(
            SeRequest::new("engine").looping().following(&anchor),
            ClipHandle::new("engine", 1.0),
            Some(SpatialParams::default()),
        );
        player.play(1.0);

        anchor.set(Vec3::new(5.0, 0.0, 0.0));
        run(&mut player, &device, 0.1);
        let snapshot = device.voice(player.voice()).expect("voice");
        assert_eq!(snapshot.position, Vec3::new(5.0, 0.0, 0.0));
        assert!(snapshot.spatial.is_some());

        drop(anchor);
        run(&mut player, &device, 0.5);
        assert_eq!(player.state(), EffectState::Playing);
        let snapshot = device.voice(player.voice()).expect("voice");
        assert_eq!(snapshot.position, Vec3::new(5.0, 0.0, 0.0));
    }

    #[test]
    fn test_flat_request_ignores_spatial_params() {
        let (device, mut player) = setup();
        player.configure(
            SeRequest::new("ui"),
            ClipHandle::new("ui", 1.0),
            Some(SpatialParams::default()),
        );
        assert!(device.voice(player.voice()).expect("voice").spatial.is_none());
    }

    #[test]
    fn test_configure_bumps_generation_and_preempts() {
        let (device, mut player) = setup();
        let (completed, on_complete) = counter();

        player.configure(
            SeRequest::new("a").on_complete(on_complete),
            ClipHandle::new("a", 1.0),
            None,
        );
        let first = player.generation();
        player.play(1.0);

        player.configure(SeRequest::new("b"), ClipHandle::new("b", 1.0), None);
        assert_eq!(player.generation(), first + 1);
        assert_eq!(player.clip_name(), Some("b"));
        assert_eq!(player.state(), EffectState::Idle);

        player.play(1.0);
        run(&mut player, &device, 1.5);
        assert_eq!(completed.load(Ordering::SeqCst), 0);
    }
}
