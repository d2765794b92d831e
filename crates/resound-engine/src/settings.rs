//! Persisted volume settings.
//!
//! The manager only needs a float key/value store. Two backends:
//! - [`MemoryStore`]: in-process map, for tests and headless runs
//! - [`TomlFileStore`]: flat TOML table at `~/.config/resound/volume.toml`

use std::collections::{BTreeMap, HashMap};
use std::fs;
use std::path::{Path, PathBuf};

use thiserror::Error;
use tracing::{debug, info, warn};

/// Default settings file name.
pub const SETTINGS_FILE_NAME: &str = "volume.toml";

/// Default settings directory (relative to config).
pub const SETTINGS_DIR_NAME: &str = "resound";

/// Key of the total volume.
pub const KEY_TOTAL_VOLUME: &str = "VolumeTotal";

/// Key of the BGM volume.
pub const KEY_BGM_VOLUME: &str = "VolumeBgm";

/// Key of the SE volume.
pub const KEY_SE_VOLUME: &str = "VolumeSe";

/// Errors that can occur during settings operations.
#[derive(Debug, Error)]
pub enum SettingsError {
    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// TOML serialization error.
    #[error("TOML serialization error: {0}")]
    TomlSerialize(#[from] toml::ser::Error),

    /// TOML deserialization error.
    #[error("TOML parse error: {0}")]
    TomlDeserialize(#[from] toml::de::Error),
}

/// Result type for settings operations.
pub type SettingsResult<T> = Result<T, SettingsError>;

/// Float key/value store.
pub trait SettingsStore {
    /// Value stored under `key`, or `default`.
    fn get_float(&self, key: &str, default: f32) -> f32;

    /// Stores a value. Not persisted until `flush`.
    fn set_float(&mut self, key: &str, value: f32);

    /// Persists pending writes.
    fn flush(&mut self) -> SettingsResult<()>;
}

// ============================================
// MemoryStore
// ============================================

/// Store that never leaves memory.
#[derive(Debug, Default, Clone)]
pub struct MemoryStore {
    values: HashMap<String, f32>,
    flushes: u32,
}

impl MemoryStore {
    /// Empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Store preloaded with `values`.
    #[must_use]
    pub fn with_values<'a>(values: impl IntoIterator<Item = (&'a str, f32)>) -> Self {
        Self {
            values: values
                .into_iter()
                .map(|(k, v)| (k.to_string(), v))
                .collect(),
            flushes: 0,
        }
    }

    /// Number of times `flush` was called.
    #[must_use]
    pub const fn flush_count(&self) -> u32 {
        self.flushes
    }
}

impl SettingsStore for MemoryStore {
    fn get_float(&self, key: &str, default: f32) -> f32 {
        self.values.get(key).copied().unwrap_or(default)
    }

    fn set_float(&mut self, key: &str, value: f32) {
        self.values.insert(key.to_string(), value);
    }

    fn flush(&mut self) -> SettingsResult<()> {
        self.flushes += 1;
        Ok(())
    }
}

// ============================================
// TomlFileStore
// ============================================

/// Store backed by a flat TOML file of floats.
#[derive(Debug, Clone)]
pub struct TomlFileStore {
    path: PathBuf,
    values: BTreeMap<String, f32>,
    dirty: bool,
}

impl TomlFileStore {
    /// Opens the store at `path`, reading it if it exists.
    ///
    /// A missing file is an empty store; an unreadable one is an error.
    pub fn open(path: impl AsRef<Path>) -> SettingsResult<Self> {
        let path = path.as_ref().to_path_buf();
        let values = if path.exists() {
            let contents = fs::read_to_string(&path)?;
            let values: BTreeMap<String, f32> = toml::from_str(&contents)?;
            info!("Volume settings loaded from {:?}", path);
            values
        } else {
            info!("Volume settings not found at {:?}, starting empty", path);
            BTreeMap::new()
        };

        Ok(Self {
            path,
            values,
            dirty: false,
        })
    }

    /// Opens the store at `path`, starting empty if the file cannot be read.
    #[must_use]
    pub fn open_or_empty(path: impl AsRef<Path>) -> Self {
        let path = path.as_ref();
        Self::open(path).unwrap_or_else(|e| {
            warn!("Failed to read volume settings {:?}: {e}", path);
            Self {
                path: path.to_path_buf(),
                values: BTreeMap::new(),
                dirty: false,
            }
        })
    }

    /// Returns the default settings path.
    #[must_use]
    pub fn default_path() -> PathBuf {
        if let Ok(config_dir) = std::env::var("XDG_CONFIG_HOME") {
            return PathBuf::from(config_dir)
                .join(SETTINGS_DIR_NAME)
                .join(SETTINGS_FILE_NAME);
        }

        if let Some(home) = dirs::home_dir() {
            return home
                .join(".config")
                .join(SETTINGS_DIR_NAME)
                .join(SETTINGS_FILE_NAME);
        }

        PathBuf::from(SETTINGS_FILE_NAME)
    }

    /// File this store writes to.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Whether there are unflushed writes.
    #[must_use]
    pub const fn is_dirty(&self) -> bool {
        self.dirty
    }
}

impl SettingsStore for TomlFileStore {
    fn get_float(&self, key: &str, default: f32) -> f32 {
        self.values.get(key).copied().unwrap_or(default)
    }

    fn set_float(&mut self, key: &str, value: f32) {
        if self.values.get(key) != Some(&value) {
            self.values.insert(key.to_string(), value);
            self.dirty = true;
        }
    }

    fn flush(&mut self) -> SettingsResult<()> {
        if !self.dirty {
            debug!("Volume settings unchanged, skipping write");
            return Ok(());
        }
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }

        let toml = toml::to_string_pretty(&self.values)?;
        fs::write(&self.path, toml)?;
        self.dirty = false;

        info!("Volume settings saved to {:?}", self.path);
        Ok(())
    }
}
