//! The sound manager: slot pools, BGM crossfade and the volume hierarchy.
//!
//! ```text
//!                 ┌──────────────── SoundManager ─────────────────┐
//!  play_se ─────▶ │ SE catalog ─▶ effects[0..N]  (first free, or  │
//!                 │                               most advanced)  │
//!  play_bgm ────▶ │ BGM catalog ─▶ music[2] ◀─ active index flips │
//!                 │                                               │
//!  update(dt) ──▶ │ drain commands ─▶ effects in order ─▶ music   │
//!                 │ gain = request × category × total (× fade)    │
//!                 └───────────────────────────────────────────────┘
//! ```
//!
//! The manager is an explicit context object created by
//! [`SoundManager::builder`] and driven by the caller's tick. Nothing here
//! blocks or sleeps; every wait is a counter advanced by `update`.

use std::sync::Arc;

use glam::Vec3;
use resound_common::{
    EffectHandle, MusicHandle, SoundCategory, SoundError, SoundResult, VolumeLevels,
};
use resound_kernel::{
    AudioDevice, AudioError, ClipCatalog, ClipHandle, ClipLibrary, SpatialParams,
};
use tracing::{debug, info, warn};

use crate::command::{Command, CommandQueue, CommandSender};
use crate::config::ManagerConfig;
use crate::effect_player::EffectPlayer;
use crate::music_player::{MusicCue, MusicPlayer};
use crate::request::{BgmRequest, SeRequest};
use crate::settings::{
    MemoryStore, SettingsStore, KEY_BGM_VOLUME, KEY_SE_VOLUME, KEY_TOTAL_VOLUME,
};

fn device_error(err: AudioError) -> SoundError {
    SoundError::Device(err.to_string())
}

// ============================================
// Builder
// ============================================

/// Builder for [`SoundManager`].
pub struct SoundManagerBuilder {
    device: Arc<dyn AudioDevice>,
    se_catalog: Box<dyn ClipCatalog>,
    bgm_catalog: Box<dyn ClipCatalog>,
    store: Box<dyn SettingsStore>,
    config: ManagerConfig,
}

impl std::fmt::Debug for SoundManagerBuilder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SoundManagerBuilder")
            .field("se_clips", &self.se_catalog.len())
            .field("bgm_clips", &self.bgm_catalog.len())
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl SoundManagerBuilder {
    /// Catalog searched by `play_se`.
    #[must_use]
    pub fn se_catalog(mut self, catalog: impl ClipCatalog + 'static) -> Self {
        self.se_catalog = Box::new(catalog);
        self
    }

    /// Catalog searched by `play_bgm`.
    #[must_use]
    pub fn bgm_catalog(mut self, catalog: impl ClipCatalog + 'static) -> Self {
        self.bgm_catalog = Box::new(catalog);
        self
    }

    /// Where volumes are persisted.
    #[must_use]
    pub fn settings(mut self, store: impl SettingsStore + 'static) -> Self {
        self.store = Box::new(store);
        self
    }

    /// Manager configuration.
    #[must_use]
    pub fn config(mut self, config: ManagerConfig) -> Self {
        self.config = config;
        self
    }

    /// Allocates every slot and its voice, then applies the initial volumes.
    pub fn build(self) -> SoundResult<SoundManager> {
        let mut config = self.config;
        config.validate();

        let effects = (0..config.se_slots)
            .map(|_| EffectPlayer::new(Arc::clone(&self.device)))
            .collect::<Result<Vec<_>, _>>()
            .map_err(device_error)?;
        let music = [
            MusicPlayer::new(Arc::clone(&self.device)).map_err(device_error)?,
            MusicPlayer::new(Arc::clone(&self.device)).map_err(device_error)?,
        ];

        let mut manager = SoundManager {
            device: self.device,
            se_catalog: self.se_catalog,
            bgm_catalog: self.bgm_catalog,
            effects,
            music,
            active_music: 0,
            volumes: config.volumes(),
            listener: Vec3::ZERO,
            store: self.store,
            commands: CommandQueue::new(config.command_capacity),
            config,
            initialized: true,
        };

        if manager.config.load_volume_on_init {
            manager.load_volume();
        }

        info!(
            "Sound manager initialized: {} SE slots, {} SE clips, {} BGM clips",
            manager.effects.len(),
            manager.se_catalog.len(),
            manager.bgm_catalog.len()
        );
        Ok(manager)
    }
}

// ============================================
// SoundManager
// ============================================

/// Owns every player slot and routes playback requests to them.
pub struct SoundManager {
    device: Arc<dyn AudioDevice>,
    se_catalog: Box<dyn ClipCatalog>,
    bgm_catalog: Box<dyn ClipCatalog>,
    effects: Vec<EffectPlayer>,
    music: [MusicPlayer; 2],
    active_music: usize,
    volumes: VolumeLevels,
    listener: Vec3,
    store: Box<dyn SettingsStore>,
    config: ManagerConfig,
    commands: CommandQueue,
    initialized: bool,
}

impl std::fmt::Debug for SoundManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SoundManager")
            .field("effects", &self.effects.len())
            .field("active_music", &self.active_music)
            .field("volumes", &self.volumes)
            .field("initialized", &self.initialized)
            .finish_non_exhaustive()
    }
}

impl SoundManager {
    /// Starts building a manager on `device` with empty catalogs, an
    /// in-memory settings store and the default configuration.
    #[must_use]
    pub fn builder(device: Arc<dyn AudioDevice>) -> SoundManagerBuilder {
        SoundManagerBuilder {
            device,
            se_catalog: Box::new(ClipLibrary::new()),
            bgm_catalog: Box::new(ClipLibrary::new()),
            store: Box::new(MemoryStore::new()),
            config: ManagerConfig::default(),
        }
    }

    /// Stops everything and rejects further playback.
    pub fn shutdown(&mut self) {
        if !self.initialized {
            return;
        }
        self.stop_all_se();
        self.stop_all_bgm();
        let dropped = self.commands.drain().len();
        if dropped > 0 {
            debug!("Dropped {dropped} queued command(s) at shutdown");
        }
        if self.config.auto_save_volume {
            self.persist_volume();
        }
        self.initialized = false;
        info!("Sound manager shut down");
    }

    /// Whether `shutdown` has not been called yet.
    #[must_use]
    pub const fn is_initialized(&self) -> bool {
        self.initialized
    }

    /// Active configuration.
    #[must_use]
    pub const fn config(&self) -> &ManagerConfig {
        &self.config
    }

    fn ensure_initialized(&self) -> SoundResult<()> {
        if self.initialized {
            Ok(())
        } else {
            Err(SoundError::NotInitialized)
        }
    }

    // ============================================
    // Sound effects
    // ============================================

    /// Plays a sound effect, reporting why it could not be played.
    pub fn try_play_se(&mut self, request: SeRequest) -> SoundResult<EffectHandle> {
        self.ensure_initialized()?;

        let clip = self
            .se_catalog
            .lookup(&request.name)
            .ok_or_else(|| SoundError::ClipNotFound {
                category: SoundCategory::Se,
                name: request.name.clone(),
            })?;

        let spatial = request.emitter.is_spatial().then(|| {
            let defaults = self.config.spatial();
            SpatialParams::new(
                request.min_distance.unwrap_or(defaults.min_distance),
                request.max_distance.unwrap_or(defaults.max_distance),
                defaults.rolloff,
            )
        });

        let slot = self.select_effect_slot();
        let mix = self.volumes.effective(SoundCategory::Se);
        let player = &mut self.effects[slot];
        player.configure(request, clip, spatial);
        player.play(mix);

        debug!(
            "SE '{}' on slot {slot}",
            player.clip_name().unwrap_or_default()
        );
        Ok(EffectHandle::new(slot, player.generation()))
    }

    /// Plays a sound effect. An unknown name is logged and yields `None`.
    pub fn play_se(&mut self, request: SeRequest) -> Option<EffectHandle> {
        self.try_play_se(request)
            .map_err(|e| warn!("play_se failed: {e}"))
            .ok()
    }

    /// First free slot in pool order, else the busy slot closest to
    /// finishing (lowest index on ties).
    fn select_effect_slot(&self) -> usize {
        if let Some(free) = self.effects.iter().position(EffectPlayer::is_free) {
            return free;
        }

        let mut best = 0;
        let mut best_length = f32::NEG_INFINITY;
        for (index, player) in self.effects.iter().enumerate() {
            let length = player.length();
            if length > best_length {
                best = index;
                best_length = length;
            }
        }
        debug!("SE pool exhausted, preempting slot {best} at {best_length:.2}");
        best
    }

    /// Stops every sound effect without completion callbacks.
    pub fn stop_all_se(&mut self) {
        for player in &mut self.effects {
            player.stop();
        }
    }

    /// Pauses every sound effect.
    pub fn pause_se(&mut self) {
        for player in &mut self.effects {
            player.pause();
        }
    }

    /// Resumes every paused sound effect.
    pub fn resume_se(&mut self) {
        for player in &mut self.effects {
            player.resume();
        }
    }

    /// Stops every effect playing `name`. Returns how many were stopped.
    pub fn stop_se_named(&mut self, name: &str) -> usize {
        self.effects_named(name, |p| {
            let busy = !p.is_free();
            p.stop();
            busy
        })
    }

    /// Pauses every effect playing `name`. Returns how many were paused.
    pub fn pause_se_named(&mut self, name: &str) -> usize {
        self.effects_named(name, |p| {
            p.pause();
            p.is_paused()
        })
    }

    /// Resumes every paused effect playing `name`. Returns how many resumed.
    pub fn resume_se_named(&mut self, name: &str) -> usize {
        self.effects_named(name, |p| {
            let paused = p.is_paused();
            p.resume();
            paused
        })
    }

    fn effects_named(&mut self, name: &str, mut f: impl FnMut(&mut EffectPlayer) -> bool) -> usize {
        self.effects
            .iter_mut()
            .filter(|p| p.clip_name() == Some(name))
            .map(|p| usize::from(f(p)))
            .sum()
    }

    /// Effect slot behind `handle`, unless it has since been re-leased.
    #[must_use]
    pub fn effect(&self, handle: EffectHandle) -> Option<&EffectPlayer> {
        self.effects
            .get(handle.slot())
            .filter(|p| p.generation() == handle.generation())
    }

    fn effect_mut(&mut self, handle: EffectHandle) -> Option<&mut EffectPlayer> {
        self.effects
            .get_mut(handle.slot())
            .filter(|p| p.generation() == handle.generation())
    }

    /// Stops the effect behind `handle`. False if the handle is stale.
    pub fn stop_effect(&mut self, handle: EffectHandle) -> bool {
        self.effect_mut(handle).map(EffectPlayer::stop).is_some()
    }

    /// Pauses the effect behind `handle`. False if the handle is stale.
    pub fn pause_effect(&mut self, handle: EffectHandle) -> bool {
        self.effect_mut(handle).map(EffectPlayer::pause).is_some()
    }

    /// Resumes the effect behind `handle`. False if the handle is stale.
    pub fn resume_effect(&mut self, handle: EffectHandle) -> bool {
        self.effect_mut(handle).map(EffectPlayer::resume).is_some()
    }

    /// All effect slots in pool order.
    #[must_use]
    pub fn effects(&self) -> &[EffectPlayer] {
        &self.effects
    }

    // ============================================
    // Background music
    // ============================================

    /// Plays background music, reporting why it could not be played.
    ///
    /// With a fade the incoming track starts on the idle slot while the
    /// active one fades out; without one both slots are cut. Either way the
    /// incoming slot becomes the active one.
    pub fn try_play_bgm(&mut self, request: BgmRequest) -> SoundResult<MusicHandle> {
        self.ensure_initialized()?;
        let request = request.clamped();

        let main = self.lookup_bgm(&request.name)?;
        let intro = request
            .intro
            .as_deref()
            .map(|name| self.lookup_bgm(name))
            .transpose()?;

        let outgoing = self.active_music;
        let incoming = 1 - outgoing;

        if request.is_fade() {
            self.music[incoming].fade_in(request.fade_in, request.fade_in_wait());
            // A paused track cannot fade out, so cut it.
            let old = &mut self.music[outgoing];
            if old.is_playing() {
                old.fade_out(request.fade_out);
            } else {
                old.stop();
            }
        } else {
            for player in &mut self.music {
                player.stop();
            }
        }

        self.active_music = incoming;
        let mix = self.volumes.effective(SoundCategory::Bgm);
        let player = &mut self.music[incoming];
        player.play(
            MusicCue {
                main,
                intro,
                volume: request.volume,
                delay: request.delay,
                looping: request.looping,
                callbacks: request.callbacks,
            },
            mix,
        );

        debug!("BGM '{}' on slot {incoming}", request.name);
        Ok(MusicHandle::new(incoming, player.generation()))
    }

    /// Plays background music. An unknown name is logged and yields `None`.
    pub fn play_bgm(&mut self, request: BgmRequest) -> Option<MusicHandle> {
        self.try_play_bgm(request)
            .map_err(|e| warn!("play_bgm failed: {e}"))
            .ok()
    }

    fn lookup_bgm(&self, name: &str) -> SoundResult<ClipHandle> {
        self.bgm_catalog
            .lookup(name)
            .ok_or_else(|| SoundError::ClipNotFound {
                category: SoundCategory::Bgm,
                name: name.to_string(),
            })
    }

    /// Stops both music slots immediately.
    pub fn stop_all_bgm(&mut self) {
        for player in &mut self.music {
            player.stop();
        }
    }

    /// Fades both music slots out over `fade_time` seconds.
    pub fn fade_out_bgm(&mut self, fade_time: f32) {
        for player in &mut self.music {
            player.fade_out(fade_time);
        }
    }

    /// Pauses both music slots.
    pub fn pause_bgm(&mut self) {
        for player in &mut self.music {
            player.pause();
        }
    }

    /// Resumes both music slots.
    pub fn resume_bgm(&mut self) {
        for player in &mut self.music {
            player.resume();
        }
    }

    /// Music slot behind `handle`, unless it has since been replayed.
    #[must_use]
    pub fn music(&self, handle: MusicHandle) -> Option<&MusicPlayer> {
        self.music
            .get(handle.slot())
            .filter(|p| p.generation() == handle.generation())
    }

    /// The slot that received the latest `play_bgm`.
    #[must_use]
    pub fn active_music(&self) -> &MusicPlayer {
        &self.music[self.active_music]
    }

    /// Both music slots.
    #[must_use]
    pub fn music_slots(&self) -> &[MusicPlayer; 2] {
        &self.music
    }

    // ============================================
    // Queries
    // ============================================

    /// Whether any SE or BGM slot is delaying or playing `name`
    /// (for music, as main or intro clip).
    #[must_use]
    pub fn is_playing(&self, name: &str) -> bool {
        self.effects
            .iter()
            .any(|p| p.is_playing() && p.clip_name() == Some(name))
            || self
                .music
                .iter()
                .any(|p| p.is_playing() && Self::music_uses(p, name))
    }

    /// Whether any SE or BGM slot holding `name` is paused.
    #[must_use]
    pub fn is_paused(&self, name: &str) -> bool {
        self.effects
            .iter()
            .any(|p| p.is_paused() && p.clip_name() == Some(name))
            || self
                .music
                .iter()
                .any(|p| p.is_paused() && Self::music_uses(p, name))
    }

    fn music_uses(player: &MusicPlayer, name: &str) -> bool {
        player.clip_name() == Some(name) || player.intro_name() == Some(name)
    }

    // ============================================
    // Volume
    // ============================================

    /// Current volume levels.
    #[must_use]
    pub const fn volumes(&self) -> VolumeLevels {
        self.volumes
    }

    /// Total volume.
    #[must_use]
    pub const fn total_volume(&self) -> f32 {
        self.volumes.total
    }

    /// BGM category volume.
    #[must_use]
    pub const fn bgm_volume(&self) -> f32 {
        self.volumes.bgm
    }

    /// SE category volume.
    #[must_use]
    pub const fn se_volume(&self) -> f32 {
        self.volumes.se
    }

    /// Sets the total volume; applied to every slot on the next tick.
    pub fn set_total_volume(&mut self, volume: f32) {
        self.volumes.set_total(volume);
        self.volume_changed();
    }

    /// Sets the BGM volume; applied on the next tick.
    pub fn set_bgm_volume(&mut self, volume: f32) {
        self.volumes.set(SoundCategory::Bgm, volume);
        self.volume_changed();
    }

    /// Sets the SE volume; applied on the next tick.
    pub fn set_se_volume(&mut self, volume: f32) {
        self.volumes.set(SoundCategory::Se, volume);
        self.volume_changed();
    }

    fn volume_changed(&mut self) {
        if self.config.auto_save_volume {
            self.persist_volume();
        }
    }

    fn persist_volume(&mut self) {
        if let Err(e) = self.save_volume() {
            warn!("Failed to save volume: {e}");
        }
    }

    /// Writes the three volumes to the settings store and flushes it.
    pub fn save_volume(&mut self) -> SoundResult<()> {
        self.store.set_float(KEY_TOTAL_VOLUME, self.volumes.total);
        self.store.set_float(KEY_BGM_VOLUME, self.volumes.bgm);
        self.store.set_float(KEY_SE_VOLUME, self.volumes.se);
        self.store
            .flush()
            .map_err(|e| SoundError::Settings(e.to_string()))?;
        debug!("Volume saved: {:?}", self.volumes);
        Ok(())
    }

    /// Reads the three volumes from the settings store. Missing keys keep
    /// their current value; stored values are clamped.
    pub fn load_volume(&mut self) {
        self.volumes = VolumeLevels::new(
            self.store.get_float(KEY_TOTAL_VOLUME, self.volumes.total),
            self.store.get_float(KEY_BGM_VOLUME, self.volumes.bgm),
            self.store.get_float(KEY_SE_VOLUME, self.volumes.se),
        );
        info!(
            "Volume loaded: total {:.2}, bgm {:.2}, se {:.2}",
            self.volumes.total, self.volumes.bgm, self.volumes.se
        );
    }

    // ============================================
    // Listener and commands
    // ============================================

    /// Moves the listener that 3D effects are attenuated against.
    pub fn set_listener_position(&mut self, position: Vec3) {
        self.listener = position;
        self.device.set_listener_position(position);
    }

    /// Current listener position.
    #[must_use]
    pub const fn listener_position(&self) -> Vec3 {
        self.listener
    }

    /// Handle for queueing commands from callbacks.
    #[must_use]
    pub fn command_sender(&self) -> CommandSender {
        self.commands.sender()
    }

    fn apply_command(&mut self, command: Command) {
        match command {
            Command::PlaySe(request) => {
                self.play_se(request);
            },
            Command::PlayBgm(request) => {
                self.play_bgm(request);
            },
            Command::StopAllSe => self.stop_all_se(),
            Command::StopAllBgm => self.stop_all_bgm(),
            Command::FadeOutBgm(fade_time) => self.fade_out_bgm(fade_time),
            Command::PauseSe => self.pause_se(),
            Command::ResumeSe => self.resume_se(),
            Command::PauseBgm => self.pause_bgm(),
            Command::ResumeBgm => self.resume_bgm(),
        }
    }

    // ============================================
    // Tick
    // ============================================

    /// Advances every slot by `dt` seconds.
    ///
    /// Queued commands run first, then SE slots in pool order, then both
    /// music slots. Commands queued by callbacks during this call run on the
    /// next one.
    pub fn update(&mut self, dt: f32) {
        if !self.initialized {
            return;
        }

        for command in self.commands.drain() {
            self.apply_command(command);
        }

        let se_mix = self.volumes.effective(SoundCategory::Se);
        for player in &mut self.effects {
            player.update(dt, se_mix);
        }

        let bgm_mix = self.volumes.effective(SoundCategory::Bgm);
        for player in &mut self.music {
            player.update(dt, bgm_mix);
        }
    }
}
