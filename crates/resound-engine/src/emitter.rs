//! Where a sound effect is heard from.
//!
//! An effect is either flat (2D, no attenuation), pinned to a fixed world
//! position, or attached to an [`Anchor`] that the application moves around.
//! Players only hold an [`AnchorRef`], a weak reference: dropping the last
//! `Anchor` leaves the sound playing at its last known position.

use std::sync::{Arc, Weak};

use glam::Vec3;
use parking_lot::RwLock;

/// Shared, movable world position owned by the application.
#[derive(Debug, Clone, Default)]
pub struct Anchor(Arc<RwLock<Vec3>>);

impl Anchor {
    /// Creates an anchor at `position`.
    #[must_use]
    pub fn new(position: Vec3) -> Self {
        Self(Arc::new(RwLock::new(position)))
    }

    /// Moves the anchor.
    pub fn set(&self, position: Vec3) {
        *self.0.write() = position;
    }

    /// Current position.
    #[must_use]
    pub fn position(&self) -> Vec3 {
        *self.0.read()
    }

    /// Weak reference for players to follow.
    #[must_use]
    pub fn downgrade(&self) -> AnchorRef {
        AnchorRef(Arc::downgrade(&self.0))
    }
}

/// Non-owning reference to an [`Anchor`].
#[derive(Debug, Clone)]
pub struct AnchorRef(Weak<RwLock<Vec3>>);

impl AnchorRef {
    /// Position of the anchor, or `None` once every `Anchor` clone is dropped.
    #[must_use]
    pub fn position(&self) -> Option<Vec3> {
        self.0.upgrade().map(|p| *p.read())
    }

    /// Whether the anchor still exists.
    #[must_use]
    pub fn is_alive(&self) -> bool {
        self.0.strong_count() > 0
    }
}

/// Spatial placement of a sound effect.
#[derive(Debug, Clone, Default)]
pub enum Emitter {
    /// 2D: no position, no attenuation.
    #[default]
    Flat,
    /// 3D at a fixed world position.
    At(Vec3),
    /// 3D, tracking an anchor every tick.
    Follow(AnchorRef),
}

impl Emitter {
    /// Whether the sound is positioned in the world.
    #[must_use]
    pub const fn is_spatial(&self) -> bool {
        !matches!(self, Self::Flat)
    }

    /// Current world position, if any.
    #[must_use]
    pub fn position(&self) -> Option<Vec3> {
        match self {
            Self::Flat => None,
            Self::At(p) => Some(*p),
            Self::Follow(anchor) => anchor.position(),
        }
    }
}
