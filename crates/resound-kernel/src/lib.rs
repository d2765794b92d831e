//! # Resound Kernel
//!
//! The layer between the sound manager and the audio hardware.
//!
//! This crate provides:
//! - The `AudioDevice` trait: voices that play one clip at a given
//!   gain/pitch/position and report elapsed playback time
//! - The `ClipCatalog` trait and the in-memory `ClipLibrary`
//! - `GainCurve`: piecewise-linear fade envelopes
//! - Distance attenuation for 3D voices
//! - `SimulatedDevice`, a deterministic device used by tests and headless runs
//! - `RodioDevice` (feature `rodio`), real output through the system device
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────┐   lookup    ┌──────────────┐
//! │ SoundManager │────────────▶│ ClipCatalog  │
//! │  (engine)    │             └──────────────┘
//! │              │   voices    ┌──────────────┐
//! │              │────────────▶│ AudioDevice  │──▶ Simulated / Rodio
//! └──────────────┘             └──────────────┘
//! ```
//!
//! The kernel never keeps time on behalf of the manager. Delays, fades and
//! loop boundaries are driven by the engine's own tick counters; the device
//! only renders what it is told.

#![warn(missing_docs)]
#![warn(clippy::all)]
#![deny(clippy::unwrap_used)]

pub mod clip;
pub mod device;
pub mod gain_curve;
#[cfg(feature = "rodio")]
pub mod rodio_device;
pub mod simulated;
pub mod spatial;

/// Prelude for convenient imports
pub mod prelude {
    pub use crate::clip::*;
    pub use crate::device::*;
    pub use crate::gain_curve::*;
    #[cfg(feature = "rodio")]
    pub use crate::rodio_device::*;
    pub use crate::simulated::*;
    pub use crate::spatial::*;
}

pub use prelude::*;
