//! # Resound Engine
//!
//! Sound manager built on the Resound kernel.
//!
//! This crate provides:
//! - `SoundManager`: fixed pool of effect slots plus two music slots
//! - Effect playback with delay, pitch, loop count, fades and 3D emitters
//! - Background music with intro clips and two-slot crossfades
//! - Total / BGM / SE volume hierarchy with optional persistence
//! - Deferred commands so callbacks can trigger playback safely
//!
//! ```text
//! caller ─▶ SoundManager::play_{se,bgm} ─▶ catalog lookup ─▶ slot
//!                                                            │
//! tick   ─▶ SoundManager::update(dt) ─▶ slot.update ─▶ AudioDevice
//!                                          │
//!                                          └─▶ callbacks ─▶ CommandSender
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![deny(clippy::unwrap_used)]

pub mod command;
pub mod config;
pub mod effect_player;
pub mod emitter;
pub mod manager;
pub mod music_player;
pub mod request;
pub mod settings;

/// Prelude for convenient imports
pub mod prelude {
    pub use crate::command::*;
    pub use crate::config::*;
    pub use crate::effect_player::*;
    pub use crate::emitter::*;
    pub use crate::manager::*;
    pub use crate::music_player::*;
    pub use crate::request::*;
    pub use crate::settings::*;
}

pub use prelude::*;
