//! Engine, director and stem configuration
//!
//! Everything a session needs before audio starts: the output format and the
//! shared filter's starting point, the musical grid, and the list of stems.
//! A whole session can be kept in one YAML manifest:
//!
//! ```yaml
//! engine:
//!   lowpass_start_hz: 18000.0
//! director:
//!   bpm: 110.0
//!   initial_start_delay_sec: 0.15
//! stems:
//!   - name: drums
//!     path: audio/drums.flac
//!     start_active: true
//!   - name: rage
//!     path: audio/rage_breath.ogg
//!     route: bypass
//! ```

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::director::mood::{BASS, DRUMS, LEAD, PERCUSSION, SYNTH};
use crate::error::ConfigError;

/// Where a sound's output goes
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Route {
    /// Through the shared high-pass and low-pass filters
    #[default]
    ThroughFilter,
    /// Straight to the output endpoint
    Bypass,
}

impl Route {
    /// Index into per-route tables
    #[inline]
    pub fn index(self) -> usize {
        match self {
            Route::ThroughFilter => 0,
            Route::Bypass => 1,
        }
    }
}

/// Output format and shared low-pass settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Output sample rate in Hz, 0 = device default
    pub sample_rate: u32,
    /// Output channel count, 0 = device default
    pub channels: u16,
    /// Low-pass cutoff at startup in Hz
    pub lowpass_start_hz: f64,
    /// Low-pass filter order (number of poles)
    pub lowpass_order: u32,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            sample_rate: 0,
            channels: 0,
            lowpass_start_hz: 18000.0,
            lowpass_order: 4,
        }
    }
}

/// Musical grid and startup timing for the director
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DirectorSettings {
    pub bpm: f32,
    pub time_sig_numerator: u32,
    pub time_sig_denominator: u32,
    /// Delay between `start_all_synced_looping` and the first audible frame
    pub initial_start_delay_sec: f32,
}

impl Default for DirectorSettings {
    fn default() -> Self {
        Self {
            bpm: 120.0,
            time_sig_numerator: 4,
            time_sig_denominator: 4,
            initial_start_delay_sec: 0.10,
        }
    }
}

/// One named stem in a session
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StemDesc {
    pub name: String,
    pub path: PathBuf,
    /// Starts at full volume instead of silent
    pub start_active: bool,
    pub route: Route,
}

impl StemDesc {
    pub fn new(name: impl Into<String>, path: impl Into<PathBuf>) -> Self {
        Self {
            name: name.into(),
            path: path.into(),
            ..Default::default()
        }
    }

    /// Start at full volume (builder pattern)
    pub fn active(mut self) -> Self {
        self.start_active = true;
        self
    }

    /// Set the route (builder pattern)
    pub fn route(mut self, route: Route) -> Self {
        self.route = route;
        self
    }
}

/// A complete session: engine, director and stems
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionManifest {
    pub engine: EngineConfig,
    pub director: DirectorSettings,
    pub stems: Vec<StemDesc>,
}

impl SessionManifest {
    /// Load a manifest from a YAML file.
    ///
    /// Relative stem paths are resolved against the manifest's directory.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        tracing::info!("loading session manifest from {:?}", path);

        let contents = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let mut manifest: Self = serde_yaml::from_str(&contents).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;

        if let Some(base) = path.parent() {
            for stem in &mut manifest.stems {
                if stem.path.is_relative() {
                    stem.path = base.join(&stem.path);
                }
            }
        }

        tracing::info!(stems = manifest.stems.len(), bpm = manifest.director.bpm, "session manifest loaded");
        Ok(manifest)
    }

    /// Parse a manifest from YAML text; stem paths are taken as written
    pub fn from_yaml_str(yaml: &str) -> Result<Self, serde_yaml::Error> {
        serde_yaml::from_str(yaml)
    }

    /// Write the manifest as YAML, creating parent directories
    pub fn save(&self, path: impl AsRef<Path>) -> Result<(), ConfigError> {
        let path = path.as_ref();
        let io_err = |source| ConfigError::Io { path: path.to_path_buf(), source };

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(io_err)?;
        }
        let yaml = serde_yaml::to_string(self).map_err(|source| ConfigError::Serialize {
            path: path.to_path_buf(),
            source,
        })?;
        std::fs::write(path, yaml).map_err(io_err)?;

        tracing::info!("session manifest saved to {:?}", path);
        Ok(())
    }

    /// The five-stem session the demo ships with, at 110 BPM
    pub fn demo() -> Self {
        Self {
            engine: EngineConfig::default(),
            director: DirectorSettings {
                bpm: 110.0,
                initial_start_delay_sec: 0.15,
                ..Default::default()
            },
            stems: vec![
                StemDesc::new(DRUMS, "audio/drums.flac").active(),
                StemDesc::new(BASS, "audio/bass.flac"),
                StemDesc::new(PERCUSSION, "audio/percussion.flac"),
                StemDesc::new(SYNTH, "audio/synth.flac"),
                StemDesc::new(LEAD, "audio/synth_lead.flac"),
            ],
        }
    }
}
