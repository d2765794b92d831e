//! Clip handles and catalogs.
//!
//! A clip is addressed by name. The catalog is populated once at startup and
//! treated as read-only afterwards; players only ever read a `ClipHandle`'s
//! name and duration.

use std::sync::Arc;

use ahash::AHashMap;
use resound_common::ClipId;
use tracing::{debug, warn};

/// Cheap-to-clone reference to a decoded clip.
#[derive(Debug, Clone, PartialEq)]
pub struct ClipHandle {
    id: ClipId,
    name: Arc<str>,
    duration: f32,
}

impl ClipHandle {
    /// Creates a handle with a fresh ID.
    ///
    /// Negative or NaN durations are stored as zero.
    #[must_use]
    pub fn new(name: impl Into<Arc<str>>, duration: f32) -> Self {
        Self::with_id(ClipId::next(), name, duration)
    }

    /// Creates a handle with an explicit ID.
    #[must_use]
    pub fn with_id(id: ClipId, name: impl Into<Arc<str>>, duration: f32) -> Self {
        let duration = if duration.is_nan() { 0.0 } else { duration.max(0.0) };
        Self {
            id,
            name: name.into(),
            duration,
        }
    }

    /// Clip ID.
    #[must_use]
    pub const fn id(&self) -> ClipId {
        self.id
    }

    /// Catalog name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Duration in seconds at pitch 1.
    #[must_use]
    pub const fn duration(&self) -> f32 {
        self.duration
    }
}

/// Name to clip lookup.
pub trait ClipCatalog {
    /// Finds a clip by name.
    fn lookup(&self, name: &str) -> Option<ClipHandle>;

    /// Number of clips in the catalog.
    fn len(&self) -> usize;

    /// Whether the catalog has no clips.
    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Whether a clip with this name exists.
    fn contains(&self, name: &str) -> bool {
        self.lookup(name).is_some()
    }
}

/// In-memory clip catalog.
#[derive(Debug, Default, Clone)]
pub struct ClipLibrary {
    clips: AHashMap<String, ClipHandle>,
}

impl ClipLibrary {
    /// Create an empty library.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a clip under a name with the given duration.
    pub fn insert(&mut self, name: &str, duration: f32) -> ClipHandle {
        let handle = ClipHandle::new(name, duration);
        self.register(handle.clone());
        handle
    }

    /// Registers an existing handle under its own name.
    ///
    /// A clip already registered under that name is replaced.
    pub fn register(&mut self, handle: ClipHandle) {
        if handle.duration() <= 0.0 {
            warn!("Clip '{}' has zero duration", handle.name());
        }
        debug!("Registered clip '{}' ({:.2}s)", handle.name(), handle.duration());
        self.clips.insert(handle.name().to_string(), handle);
    }

    /// Builder-style registration.
    #[must_use]
    pub fn with_clip(mut self, name: &str, duration: f32) -> Self {
        self.insert(name, duration);
        self
    }

    /// Removes a clip by name.
    pub fn remove(&mut self, name: &str) -> Option<ClipHandle> {
        self.clips.remove(name)
    }

    /// Iterates over registered names in no particular order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.clips.keys().map(String::as_str)
    }
}

impl ClipCatalog for ClipLibrary {
    fn lookup(&self, name: &str) -> Option<ClipHandle> {
        self.clips.get(name).cloned()
    }

    fn len(&self) -> usize {
        self.clips.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clip_handle_sanitizes_duration() {
        assert!(ClipHandle::new("a", -2.0).duration().abs() < f32::EPSILON);
        assert!(ClipHandle::new("b", f32::NAN).duration().abs() < f32::EPSILON);
        assert!((ClipHandle::new("c", 1.5).duration() - 1.5).abs() < f32::EPSILON);
    }

    #[test]
    fn test_library_lookup() {
        let library = ClipLibrary::new()
            .with_clip("jump", 0.4)
            .with_clip("coin", 0.2);

        assert_eq!(library.len(), 2);
        let jump = library.lookup("jump").expect("jump registered");
        assert_eq!(jump.name(), "jump");
        assert!((jump.duration() - 0.4).abs() < f32::EPSILON);
        assert!(library.lookup("missing").is_none());
        assert!(!library.contains("missing"));
    }

    #[test]
    fn test_library_replace_and_remove() {
        let mut library = ClipLibrary::new();
        let first = library.insert("hit", 1.0);
        let second = library.insert("hit", 2.0);

        assert_ne!(first.id(), second.id());
        assert_eq!(library.len(), 1);
        assert_eq!(library.lookup("hit"), Some(second));

        assert!(library.remove("hit").is_some());
        assert!(library.is_empty());
    }
}
