//! Error types for Resound.

use thiserror::Error;

use crate::volume::SoundCategory;

/// Top-level error type for sound manager operations.
///
/// None of these are fatal. Callers of the `play_*` entry points only ever
/// see them as a log line and an absent handle.
#[derive(Debug, Error)]
pub enum SoundError {
    /// A clip name was not present in the catalog for its category.
    #[error("{category} clip not found: '{name}'")]
    ClipNotFound {
        /// Catalog that was searched.
        category: SoundCategory,
        /// Name that was requested.
        name: String,
    },

    /// The manager was used after `shutdown()`.
    #[error("Sound manager not initialized")]
    NotInitialized,

    /// The audio device rejected an operation.
    #[error("Audio device error: {0}")]
    Device(String),

    /// Persisting or restoring volume settings failed.
    #[error("Settings error: {0}")]
    Settings(String),
}

/// Result type alias for sound manager operations.
pub type SoundResult<T> = Result<T, SoundError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clip_not_found_message() {
        let err = SoundError::ClipNotFound {
            category: SoundCategory::Bgm,
            name: "title".to_string(),
        };
        assert_eq!(err.to_string(), "BGM clip not found: 'title'");
    }

    #[test]
    fn test_device_message() {
        let err = SoundError::Device("no output".to_string());
        assert_eq!(err.to_string(), "Audio device error: no output");
    }
}
