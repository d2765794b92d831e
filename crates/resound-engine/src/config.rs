//! Manager configuration.
//!
//! Pool size, default volumes, persistence policy and 3D defaults. Loaded
//! from and saved to a TOML file.

use resound_common::{
    clamp_unit, VolumeLevels, DEFAULT_BGM_VOLUME, DEFAULT_SE_VOLUME, DEFAULT_TOTAL_VOLUME,
};
use resound_kernel::{Rolloff, SpatialParams, DEFAULT_MAX_DISTANCE, DEFAULT_MIN_DISTANCE};
use serde::{Deserialize, Serialize};
use std::fs;
use std::io::{self, Read, Write};
use std::path::Path;
use tracing::{info, warn};

use crate::command::DEFAULT_COMMAND_CAPACITY;

/// Default number of sound-effect slots.
pub const DEFAULT_SE_SLOTS: usize = 10;

/// Upper bound on sound-effect slots.
pub const MAX_SE_SLOTS: usize = 256;

/// Manager configuration parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ManagerConfig {
    // === Pool ===
    /// Number of sound-effect slots, fixed for the manager's lifetime
    pub se_slots: usize,
    /// Capacity of the deferred command queue
    pub command_capacity: usize,

    // === Volume ===
    /// Initial total volume
    pub total_volume: f32,
    /// Initial BGM volume
    pub bgm_volume: f32,
    /// Initial SE volume
    pub se_volume: f32,
    /// Persist volumes whenever a setter changes them
    pub auto_save_volume: bool,
    /// Read persisted volumes when the manager is built
    pub load_volume_on_init: bool,

    // === 3D ===
    /// Distance below which effects play at full gain
    pub min_distance: f32,
    /// Distance at which linear rolloff reaches silence
    pub max_distance: f32,
    /// Distance attenuation model
    pub rolloff: Rolloff,
}

impl Default for ManagerConfig {
    fn default() -> Self {
        Self {
            se_slots: DEFAULT_SE_SLOTS,
            command_capacity: DEFAULT_COMMAND_CAPACITY,
            total_volume: DEFAULT_TOTAL_VOLUME,
            bgm_volume: DEFAULT_BGM_VOLUME,
            se_volume: DEFAULT_SE_VOLUME,
            auto_save_volume: false,
            load_volume_on_init: false,
            min_distance: DEFAULT_MIN_DISTANCE,
            max_distance: DEFAULT_MAX_DISTANCE,
            rolloff: Rolloff::Linear,
        }
    }
}

impl ManagerConfig {
    /// Set the number of SE slots.
    #[must_use]
    pub fn with_se_slots(mut self, slots: usize) -> Self {
        self.se_slots = slots;
        self
    }

    /// Enable or disable auto-save of volumes.
    #[must_use]
    pub fn with_auto_save_volume(mut self, enabled: bool) -> Self {
        self.auto_save_volume = enabled;
        self
    }

    /// Enable or disable reading persisted volumes at build time.
    #[must_use]
    pub fn with_load_volume_on_init(mut self, enabled: bool) -> Self {
        self.load_volume_on_init = enabled;
        self
    }

    /// Set the initial volumes.
    #[must_use]
    pub fn with_volumes(mut self, total: f32, bgm: f32, se: f32) -> Self {
        self.total_volume = total;
        self.bgm_volume = bgm;
        self.se_volume = se;
        self
    }

    /// Load configuration from a specific path, falling back to defaults.
    #[must_use]
    pub fn load_from<P: AsRef<Path>>(path: P) -> Self {
        let path = path.as_ref();

        if !path.exists() {
            info!("Config file not found, using defaults");
            return Self::default();
        }

        match fs::File::open(path) {
            Ok(mut file) => {
                let mut contents = String::new();
                if let Err(e) = file.read_to_string(&mut contents) {
                    warn!("Failed to read config file: {e}");
                    return Self::default();
                }

                match toml::from_str::<Self>(&contents) {
                    Ok(mut config) => {
                        config.validate();
                        info!("Loaded config from {}", path.display());
                        config
                    },
                    Err(e) => {
                        warn!("Failed to parse config file: {e}");
                        Self::default()
                    },
                }
            },
            Err(e) => {
                warn!("Failed to open config file: {e}");
                Self::default()
            },
        }
    }

    /// Save configuration to a specific path.
    pub fn save_to<P: AsRef<Path>>(&self, path: P) -> io::Result<()> {
        let path = path.as_ref();

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        let contents = toml::to_string_pretty(self)
            .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;

        let mut file = fs::File::create(path)?;
        file.write_all(contents.as_bytes())?;

        info!("Saved config to {}", path.display());
        Ok(())
    }

    /// Validate and clamp configuration values to sensible ranges.
    pub fn validate(&mut self) {
        self.se_slots = self.se_slots.clamp(1, MAX_SE_SLOTS);
        self.command_capacity = self.command_capacity.max(1);

        self.total_volume = clamp_unit(self.total_volume);
        self.bgm_volume = clamp_unit(self.bgm_volume);
        self.se_volume = clamp_unit(self.se_volume);

        let spatial = self.spatial();
        self.min_distance = spatial.min_distance;
        self.max_distance = spatial.max_distance;
    }

    /// Initial volume levels.
    #[must_use]
    pub fn volumes(&self) -> VolumeLevels {
        VolumeLevels::new(self.total_volume, self.bgm_volume, self.se_volume)
    }

    /// Default spatial parameters for 3D effects.
    #[must_use]
    pub fn spatial(&self) -> SpatialParams {
        SpatialParams::new(self.min_distance, self.max_distance, self.rolloff)
    }
}
