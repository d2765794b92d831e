//! ID types for clips, voices and leased player slots.

use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU32, Ordering};

/// Global counter for clip IDs.
static CLIP_COUNTER: AtomicU32 = AtomicU32::new(1);

/// Unique identifier for a registered clip.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ClipId(u32);

impl ClipId {
    /// Allocates a new process-unique clip ID.
    #[must_use]
    pub fn next() -> Self {
        Self(CLIP_COUNTER.fetch_add(1, Ordering::Relaxed))
    }

    /// Creates a clip ID from a raw value.
    #[must_use]
    pub const fn from_raw(value: u32) -> Self {
        Self(value)
    }

    /// Returns the raw ID value.
    #[must_use]
    pub const fn raw(self) -> u32 {
        self.0
    }
}

/// Identifier of a voice allocated on an audio device.
///
/// Only meaningful to the device that created it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct VoiceId(u32);

impl VoiceId {
    /// Creates a voice ID from a raw value.
    #[must_use]
    pub const fn new(id: u32) -> Self {
        Self(id)
    }

    /// Returns the raw ID value.
    #[must_use]
    pub const fn raw(self) -> u32 {
        self.0
    }

    /// Returns the ID as a slot index.
    #[must_use]
    pub const fn index(self) -> usize {
        self.0 as usize
    }
}

/// Handle to a leased sound-effect slot.
///
/// The generation is bumped every time the slot is re-leased, so a handle
/// kept past its sound's lifetime resolves to nothing instead of to whatever
/// the slot is playing now.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct EffectHandle {
    slot: usize,
    generation: u32,
}

impl EffectHandle {
    /// Create a new handle for the given slot and generation.
    #[must_use]
    pub const fn new(slot: usize, generation: u32) -> Self {
        Self { slot, generation }
    }

    /// Index of the slot in the effect pool.
    #[must_use]
    pub const fn slot(&self) -> usize {
        self.slot
    }

    /// Get the generation (for detecting stale handles).
    #[must_use]
    pub const fn generation(&self) -> u32 {
        self.generation
    }
}

/// Handle to one of the two BGM slots.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct MusicHandle {
    slot: usize,
    generation: u32,
}

impl MusicHandle {
    /// Create a new handle for the given slot and generation.
    #[must_use]
    pub const fn new(slot: usize, generation: u32) -> Self {
        Self { slot, generation }
    }

    /// Index of the music slot (0 or 1).
    #[must_use]
    pub const fn slot(&self) -> usize {
        self.slot
    }

    /// Get the generation (for detecting stale handles).
    #[must_use]
    pub const fn generation(&self) -> u32 {
        self.generation
    }
}
