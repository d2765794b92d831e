//! One of the two background-music slots.
//!
//! ```text
//!   Stop ──play()──▶ DelayWait ──▶ PlayingIntro ──▶ Playing ──▶ Stop
//!                        │         (intro only)        │     (non-looping
//!                        │                             │      main ends)
//!                        └────── fade_out() ──▶ FadeOut ──▶ Stop
//! ```
//!
//! Fades run on a separate track layered over the playback phase: a slot can
//! be waiting out its delay and fading in at the same time, which is what the
//! manager's crossfade relies on. `state()` reports `FadeIn` / `FadeOut` while
//! a fade is in flight.

use std::sync::Arc;

use resound_common::VoiceId;
use resound_kernel::{AudioDevice, AudioResult, ClipHandle};
use tracing::debug;

use crate::request::Callbacks;

/// Caller-visible state of a music slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MusicState {
    /// Silent and free.
    #[default]
    Stop,
    /// Waiting out the start delay.
    DelayWait,
    /// Playing the intro clip.
    PlayingIntro,
    /// Playing the main clip.
    Playing,
    /// Fading in.
    FadeIn,
    /// Fading out toward `Stop`.
    FadeOut,
    /// Suspended.
    Pause,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    Stop,
    DelayWait,
    PlayingIntro,
    Playing,
    Pause,
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum Fade {
    None,
    In { wait: f32, duration: f32, elapsed: f32 },
    Out { from: f32, duration: f32, elapsed: f32 },
}

/// What a music slot should play.
#[derive(Debug, Clone)]
pub struct MusicCue {
    /// Main clip.
    pub main: ClipHandle,
    /// Optional intro played once before `main`.
    pub intro: Option<ClipHandle>,
    /// Volume in `[0, 1]`.
    pub volume: f32,
    /// Start delay in seconds.
    pub delay: f32,
    /// Whether `main` loops.
    pub looping: bool,
    /// Lifecycle hooks.
    pub callbacks: Callbacks,
}

/// A background-music player owning one device voice.
pub struct MusicPlayer {
    device: Arc<dyn AudioDevice>,
    voice: VoiceId,
    phase: Phase,
    paused_from: Phase,
    generation: u32,

    main: Option<ClipHandle>,
    intro: Option<ClipHandle>,
    volume: f32,
    delay: f32,
    looping: bool,
    callbacks: Callbacks,

    delay_elapsed: f32,
    play_time: f32,
    first_main_pass: bool,

    fade: Fade,
    fade_gain: f32,
}

impl std::fmt::Debug for MusicPlayer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MusicPlayer")
            .field("voice", &self.voice)
            .field("state", &self.state())
            .field("main", &self.main.as_ref().map(ClipHandle::name))
            .field("fade_gain", &self.fade_gain)
            .finish_non_exhaustive()
    }
}

impl MusicPlayer {
    /// Creates a stopped player with a fresh voice on `device`.
    pub fn new(device: Arc<dyn AudioDevice>) -> AudioResult<Self> {
        let voice = device.create_voice()?;
        Ok(Self {
            device,
            voice,
            phase: Phase::Stop,
            paused_from: Phase::Stop,
            generation: 0,
            main: None,
            intro: None,
            volume: 1.0,
            delay: 0.0,
            looping: true,
            callbacks: Callbacks::default(),
            delay_elapsed: 0.0,
            play_time: 0.0,
            first_main_pass: false,
            fade: Fade::None,
            fade_gain: 1.0,
        })
    }

    /// Current state; an active fade takes precedence over the phase.
    #[must_use]
    pub fn state(&self) -> MusicState {
        match (self.phase, self.fade) {
            (Phase::Stop, _) => MusicState::Stop,
            (Phase::Pause, _) => MusicState::Pause,
            (_, Fade::In { .. }) => MusicState::FadeIn,
            (_, Fade::Out { .. }) => MusicState::FadeOut,
            (Phase::DelayWait, Fade::None) => MusicState::DelayWait,
            (Phase::PlayingIntro, Fade::None) => MusicState::PlayingIntro,
            (Phase::Playing, Fade::None) => MusicState::Playing,
        }
    }

    /// Whether the slot is delaying or audible.
    #[must_use]
    pub fn is_playing(&self) -> bool {
        matches!(
            self.phase,
            Phase::DelayWait | Phase::PlayingIntro | Phase::Playing
        )
    }

    /// Whether the slot is paused.
    #[must_use]
    pub fn is_paused(&self) -> bool {
        self.phase == Phase::Pause
    }

    /// Whether the slot is stopped.
    #[must_use]
    pub fn is_stopped(&self) -> bool {
        self.phase == Phase::Stop
    }

    /// Play counter, bumped by every `play`.
    #[must_use]
    pub const fn generation(&self) -> u32 {
        self.generation
    }

    /// Voice owned by this slot.
    #[must_use]
    pub const fn voice(&self) -> VoiceId {
        self.voice
    }

    /// Name of the main clip.
    #[must_use]
    pub fn clip_name(&self) -> Option<&str> {
        self.main.as_ref().map(ClipHandle::name)
    }

    /// Name of the intro clip.
    #[must_use]
    pub fn intro_name(&self) -> Option<&str> {
        self.intro.as_ref().map(ClipHandle::name)
    }

    /// Current fade factor in `[0, 1]`.
    #[must_use]
    pub const fn fade_gain(&self) -> f32 {
        self.fade_gain
    }

    /// Configured volume.
    #[must_use]
    pub const fn volume(&self) -> f32 {
        self.volume
    }

    /// Normalized play position in `[0, 1]`.
    ///
    /// While the intro or the first main pass after it plays, progress is
    /// measured against `intro + main` so it does not jump at the switch.
    #[must_use]
    pub fn length(&self) -> f32 {
        let phase = if self.phase == Phase::Pause {
            self.paused_from
        } else {
            self.phase
        };
        let main = self.main.as_ref().map_or(0.0, ClipHandle::duration);
        let intro = self.intro.as_ref().map_or(0.0, ClipHandle::duration);

        let (position, total) = match phase {
            Phase::PlayingIntro => (self.play_time, intro + main),
            Phase::Playing if self.first_main_pass && self.intro.is_some() => {
                (intro + self.play_time, intro + main)
            },
            Phase::Playing => (self.play_time, main),
            _ => return 0.0,
        };
        if total > 0.0 {
            (position / total).clamp(0.0, 1.0)
        } else {
            0.0
        }
    }

    // ============================================
    // Transport
    // ============================================

    /// Starts a cue. `mix` is total × BGM volume.
    ///
    /// A fade set up by `fade_in` just before this call is kept.
    pub fn play(&mut self, cue: MusicCue, mix: f32) {
        if !self.is_stopped() {
            self.device.stop(self.voice);
        }

        self.generation = self.generation.wrapping_add(1);
        self.volume = cue.volume;
        self.delay = cue.delay.max(0.0);
        self.looping = cue.looping;
        self.callbacks = cue.callbacks;
        self.delay_elapsed = 0.0;
        self.play_time = 0.0;
        self.first_main_pass = false;

        let first = cue.intro.as_ref().unwrap_or(&cue.main);
        self.device.set_clip(self.voice, first);
        self.device.set_looping(self.voice, cue.intro.is_none() && cue.looping);
        self.device.set_pitch(self.voice, 1.0);
        self.device.set_spatial(self.voice, None);
        self.main = Some(cue.main);
        self.intro = cue.intro;

        self.phase = Phase::DelayWait;
        self.callbacks.start_before();
        self.apply_gain(mix);
        self.device.play(self.voice, self.delay);

        if self.delay <= 0.0 {
            self.begin_playback();
        }
    }

    /// Arms a fade-in: silent for `wait` seconds, then 0 → 1 over `duration`.
    pub fn fade_in(&mut self, duration: f32, wait: f32) {
        let duration = non_negative(duration);
        let wait = non_negative(wait);
        if duration <= 0.0 && wait <= 0.0 {
            self.fade = Fade::None;
            self.fade_gain = 1.0;
            return;
        }
        self.fade = Fade::In {
            wait,
            duration,
            elapsed: 0.0,
        };
        self.fade_gain = 0.0;
    }

    /// Ramps the current gain to 0 over `duration`, then stops.
    /// No-op when stopped, paused or already fading out.
    pub fn fade_out(&mut self, duration: f32) {
        if matches!(self.phase, Phase::Stop | Phase::Pause) || matches!(self.fade, Fade::Out { .. })
        {
            return;
        }
        let duration = non_negative(duration);
        if duration <= 0.0 {
            self.stop();
            return;
        }
        self.fade = Fade::Out {
            from: self.fade_gain,
            duration,
            elapsed: 0.0,
        };
        debug!(
            "Fading out '{}' over {duration:.2}s",
            self.clip_name().unwrap_or_default()
        );
    }

    /// Stops immediately without callbacks, cancelling any fade.
    pub fn stop(&mut self) {
        self.fade = Fade::None;
        self.fade_gain = 1.0;
        if self.is_stopped() {
            return;
        }
        self.device.stop(self.voice);
        self.phase = Phase::Stop;
        self.paused_from = Phase::Stop;
        debug!("Stopped music on voice {}", self.voice.raw());
    }

    /// Suspends playback. An in-flight fade-in settles at full gain; an
    /// in-flight fade-out finishes, leaving the slot stopped.
    pub fn pause(&mut self) {
        if !self.is_playing() {
            return;
        }
        match self.fade {
            Fade::In { .. } => {
                self.fade = Fade::None;
                self.fade_gain = 1.0;
            },
            Fade::Out { .. } => {
                self.stop();
                return;
            },
            Fade::None => {},
        }
        self.paused_from = self.phase;
        self.phase = Phase::Pause;
        self.device.pause(self.voice);
    }

    /// Continues a paused slot.
    pub fn resume(&mut self) {
        if self.phase != Phase::Pause {
            return;
        }
        self.phase = self.paused_from;
        self.device.resume(self.voice);
    }

    /// Advances the slot by `dt` seconds. `mix` is total × BGM volume.
    pub fn update(&mut self, dt: f32, mix: f32) {
        if !self.is_playing() {
            return;
        }
        let dt = non_negative(dt);

        if !self.advance_fade(dt) {
            return;
        }

        let mut remaining = dt;
        if self.phase == Phase::DelayWait {
            self.delay_elapsed += dt;
            if self.delay_elapsed < self.delay {
                self.apply_gain(mix);
                return;
            }
            remaining = self.delay_elapsed - self.delay;
            self.begin_playback();
        }
        self.advance_clip(remaining);

        if self.is_playing() {
            self.apply_gain(mix);
        }
    }

    // ============================================
    // Internals
    // ============================================

    fn begin_playback(&mut self) {
        self.phase = if self.intro.is_some() {
            Phase::PlayingIntro
        } else {
            Phase::Playing
        };
        debug!(
            "Music '{}' audible on voice {}",
            self.clip_name().unwrap_or_default(),
            self.voice.raw()
        );
        self.callbacks.start();
    }

    /// Returns false if the fade stopped the slot.
    fn advance_fade(&mut self, dt: f32) -> bool {
        match self.fade {
            Fade::None => {},
            Fade::In {
                wait,
                duration,
                elapsed,
            } => {
                let elapsed = elapsed + dt;
                let ramp = elapsed - wait;
                if ramp <= 0.0 {
                    self.fade_gain = 0.0;
                } else if duration <= 0.0 || ramp >= duration {
                    self.fade = Fade::None;
                    self.fade_gain = 1.0;
                    return true;
                } else {
                    self.fade_gain = ramp / duration;
                }
                self.fade = Fade::In {
                    wait,
                    duration,
                    elapsed,
                };
            },
            Fade::Out {
                from,
                duration,
                elapsed,
            } => {
                let elapsed = elapsed + dt;
                if elapsed >= duration {
                    self.stop();
                    return false;
                }
                self.fade_gain = from * (1.0 - elapsed / duration);
                self.fade = Fade::Out {
                    from,
                    duration,
                    elapsed,
                };
            },
        }
        true
    }

    fn advance_clip(&mut self, dt: f32) {
        self.play_time += dt;

        if self.phase == Phase::PlayingIntro {
            let intro = self.intro.as_ref().map_or(0.0, ClipHandle::duration);
            if self.play_time < intro {
                return;
            }
            self.switch_to_main();
        }

        if self.phase != Phase::Playing {
            return;
        }
        let main = self.main.as_ref().map_or(0.0, ClipHandle::duration);
        if self.play_time < main {
            return;
        }

        if self.looping {
            self.play_time = if main > 0.0 {
                self.play_time % main
            } else {
                0.0
            };
            self.first_main_pass = false;
        } else {
            self.complete();
        }
    }

    fn switch_to_main(&mut self) {
        let Some(main) = self.main.as_ref() else {
            return;
        };
        self.device.set_clip(self.voice, main);
        self.device.set_looping(self.voice, self.looping);
        self.device.play(self.voice, 0.0);
        self.phase = Phase::Playing;
        self.play_time = 0.0;
        self.first_main_pass = true;
        debug!("Intro finished, switching to '{}'", main.name());
    }

    fn complete(&mut self) {
        self.device.stop(self.voice);
        self.phase = Phase::Stop;
        self.paused_from = Phase::Stop;
        self.fade = Fade::None;
        self.fade_gain = 1.0;
        debug!("Music '{}' complete", self.clip_name().unwrap_or_default());
        self.callbacks.complete();
    }

    fn apply_gain(&self, mix: f32) {
        self.device
            .set_gain(self.voice, self.volume * mix * self.fade_gain);
    }
}

fn non_negative(v: f32) -> f32 {
    if v.is_nan() {
        0.0
    } else {
        v.max(0.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::request::BgmRequest;
    use resound_kernel::SimulatedDevice;
    use std::sync::atomic::{AtomicU32, Ordering};

    const DT: f32 = 0.1;

    fn setup() -> (Arc<SimulatedDevice>, MusicPlayer) {
        let device = Arc::new(SimulatedDevice::new());
        let player = MusicPlayer::new(device.clone()).expect("voice");
        (device, player)
    }

    fn cue(main: f32) -> MusicCue {
        MusicCue {
            main: ClipHandle::new("theme", main),
            intro: None,
            volume: 1.0,
            delay: 0.0,
            looping: true,
            callbacks: Callbacks::default(),
        }
    }

    fn run(player: &mut MusicPlayer, device: &SimulatedDevice, seconds: f32) {
        let steps = (seconds / DT).round() as usize;
        for _ in 0..steps {
            device.advance(DT);
            player.update(DT, 1.0);
        }
    }

    fn counting(count: &Arc<AtomicU32>) -> impl Fn() + Send + Sync + 'static {
        let c = Arc::clone(count);
        move || {
            c.fetch_add(1, Ordering::SeqCst);
        }
    }

    #[test]
    fn test_play_without_intro() {
        let (device, mut player) = setup();
        player.play(cue(4.0), 1.0);
        assert_eq!(player.state(), MusicState::Playing);
        assert!(device.voice(player.voice()).expect("voice").looping);

        run(&mut player, &device, 1.0);
        assert!((player.length() - 0.25).abs() < 1e-4);
    }

    #[test]
    fn test_intro_switches_to_main() {
        let (device, mut player) = setup();
        let started = Arc::new(AtomicU32::new(0));
        let mut c = cue(3.0);
        c.intro = Some(ClipHandle::new("intro", 1.0));
        c.callbacks = BgmRequest::new("theme")
            .on_start(counting(&started))
            .callbacks;

        player.play(c, 1.0);
        assert_eq!(player.state(), MusicState::PlayingIntro);
        let snapshot = device.voice(player.voice()).expect("voice");
        assert_eq!(snapshot.clip.as_ref().map(ClipHandle::name), Some("intro"));
        assert!(!snapshot.looping);

        run(&mut player, &device, 0.5);
        assert!((player.length() - 0.125).abs() < 1e-3);

        run(&mut player, &device, 0.7);
        assert_eq!(player.state(), MusicState::Playing);
        let snapshot = device.voice(player.voice()).expect("voice");
        assert_eq!(snapshot.clip.as_ref().map(ClipHandle::name), Some("theme"));
        assert!(snapshot.looping);
        assert_eq!(snapshot.play_count, 2);

        // Progress keeps counting the intro during the first main pass.
        assert!(player.length() > 0.25);
        assert_eq!(started.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_non_looping_main_completes() {
        let (device, mut player) = setup();
        let completed = Arc::new(AtomicU32::new(0));
        let after = Arc::new(AtomicU32::new(0));
        let mut c = cue(1.0);
        c.looping = false;
        c.callbacks = BgmRequest::new("theme")
            .on_complete(counting(&completed))
            .on_complete_after(counting(&after))
            .callbacks;

        player.play(c, 1.0);
        run(&mut player, &device, 1.2);

        assert_eq!(player.state(), MusicState::Stop);
        assert_eq!(completed.load(Ordering::SeqCst), 1);
        assert_eq!(after.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_looping_main_keeps_playing() {
        let (device, mut player) = setup();
        player.play(cue(1.0), 1.0);
        run(&mut player, &device, 3.5);
        assert_eq!(player.state(), MusicState::Playing);
        assert!(player.length() < 1.0);
    }

    #[test]
    fn test_delay_then_play() {
        let (device, mut player) = setup();
        let mut c = cue(2.0);
        c.delay = 1.0;
        player.play(c, 1.0);
        assert_eq!(player.state(), MusicState::DelayWait);
        assert!(player.length().abs() < f32::EPSILON);

        run(&mut player, &device, 1.5);
        assert_eq!(player.state(), MusicState::Playing);
        assert!((player.length() - 0.25).abs() < 1e-3);
    }

    #[test]
    fn test_fade_in_waits_then_ramps() {
        let (device, mut player) = setup();
        player.fade_in(1.0, 0.5);
        player.play(cue(10.0), 1.0);
        assert_eq!(player.state(), MusicState::FadeIn);
        assert!(device.voice(player.voice()).expect("voice").gain.abs() < f32::EPSILON);

        run(&mut player, &device, 0.5);
        assert!(player.fade_gain().abs() < 1e-4);

        run(&mut player, &device, 0.5);
        assert!((player.fade_gain() - 0.5).abs() < 1e-3);
        let gain = device.voice(player.voice()).expect("voice").gain;
        assert!((gain - 0.5).abs() < 1e-3);

        run(&mut player, &device, 0.6);
        assert_eq!(player.state(), MusicState::Playing);
        assert!((player.fade_gain() - 1.0).abs() < f32::EPSILON);
    }

    #[test]
    fn test_fade_out_stops() {
        let (device, mut player) = setup();
        player.play(cue(10.0), 1.0);
        player.fade_out(1.0);
        assert_eq!(player.state(), MusicState::FadeOut);

        run(&mut player, &device, 0.5);
        assert!((player.fade_gain() - 0.5).abs() < 1e-3);

        run(&mut player, &device, 0.6);
        assert_eq!(player.state(), MusicState::Stop);
        assert!(!device.is_playing(player.voice()));
    }

    #[test]
    fn test_fade_out_on_stopped_is_noop() {
        let (_device, mut player) = setup();
        player.fade_out(1.0);
        assert_eq!(player.state(), MusicState::Stop);
    }

    #[test]
    fn test_pause_settles_fade_in() {
        let (device, mut player) = setup();
        player.fade_in(2.0, 0.0);
        player.play(cue(10.0), 1.0);
        run(&mut player, &device, 0.5);

        player.pause();
        assert_eq!(player.state(), MusicState::Pause);
        assert!((player.fade_gain() - 1.0).abs() < f32::EPSILON);

        player.resume();
        assert_eq!(player.state(), MusicState::Playing);
    }

    #[test]
    fn test_pause_completes_fade_out() {
        let (device, mut player) = setup();
        player.play(cue(10.0), 1.0);
        player.fade_out(2.0);
        run(&mut player, &device, 0.5);

        player.pause();
        assert_eq!(player.state(), MusicState::Stop);
    }

    #[test]
    fn test_pause_freezes_position() {
        let (device, mut player) = setup();
        player.play(cue(4.0), 1.0);
        run(&mut player, &device, 1.0);
        player.pause();
        run(&mut player, &device, 1.0);
        assert!((player.length() - 0.25).abs() < 1e-4);
        player.resume();
        run(&mut player, &device, 1.0);
        assert!((player.length() - 0.5).abs() < 1e-4);
    }

    #[test]
    fn test_stop_cancels_fade_and_is_idempotent() {
        let (device, mut player) = setup();
        player.fade_in(1.0, 0.0);
        player.play(cue(10.0), 1.0);
        player.stop();
        assert_eq!(player.state(), MusicState::Stop);
        assert!((player.fade_gain() - 1.0).abs() < f32::EPSILON);
        player.stop();
        assert_eq!(player.state(), MusicState::Stop);
        assert!(!device.is_playing(player.voice()));
    }

    #[test]
    fn test_gain_uses_volume_and_mix() {
        let (device, mut player) = setup();
        let mut c = cue(10.0);
        c.volume = 0.5;
        player.play(c, 0.4);
        player.update(DT, 0.4);
        let gain = device.voice(player.voice()).expect("voice").gain;
        assert!((gain - 0.2).abs() < 1e-5);
    }
}
