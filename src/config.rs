//! Ribbon configuration
//!
//! Settings live in `~/.config/spectral-ribbon/config.toml`. Every field has a
//! default, so a partial file (or no file at all) is always usable.

use crate::error::{Result, RibbonError};
use anyhow::Context;
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Band count emitted by the upstream spectral analyzer
pub const DEFAULT_BAND_COUNT: usize = 190;

/// Number of progress buckets kept per track
pub const DEFAULT_HISTORY_BINS: usize = 4096;

/// Fractional margins between the surface edges and the plot rect
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PlotMargins {
    pub left: f32,
    pub right: f32,
    pub top: f32,
    pub bottom: f32,
}

impl Default for PlotMargins {
    fn default() -> Self {
        Self {
            left: 0.07,
            right: 0.02,
            top: 0.05,
            bottom: 0.12,
        }
    }
}

/// dB normalization and tone curve
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ToneConfig {
    /// Dynamic range below full scale mapped onto [0, 1]
    pub floor_db: f32,
    /// Power applied after normalization; > 1 pushes low-level noise down
    pub exponent: f32,
    /// Amplitudes are clamped to this before taking the log
    pub min_amplitude: f32,
}

impl Default for ToneConfig {
    fn default() -> Self {
        Self {
            floor_db: 120.0,
            exponent: 2.15,
            min_amplitude: 1e-6,
        }
    }
}

/// One stop of the color ramp
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ColorStop {
    pub position: f32,
    pub rgb: [u8; 3],
}

impl ColorStop {
    pub const fn new(position: f32, rgb: [u8; 3]) -> Self {
        Self { position, rgb }
    }
}

pub fn default_palette() -> Vec<ColorStop> {
    vec![
        ColorStop::new(0.00, [0, 0, 0]),
        ColorStop::new(0.18, [12, 14, 72]),
        ColorStop::new(0.38, [84, 22, 142]),
        ColorStop::new(0.58, [178, 30, 138]),
        ColorStop::new(0.80, [232, 52, 54]),
        ColorStop::new(1.00, [255, 168, 38]),
    ]
}

/// Gap interpolation weighting
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GapConfig {
    /// Gaps of at least this many columns count as large
    pub large_gap_columns: usize,
    pub large_gap_floor: f32,
    pub small_gap_floor: f32,
}

impl Default for GapConfig {
    fn default() -> Self {
        Self {
            large_gap_columns: 6,
            large_gap_floor: 0.56,
            small_gap_floor: 0.72,
        }
    }
}

/// Position jumps treated as a seek
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SeekConfig {
    pub backward_secs: f64,
    pub forward_secs: f64,
}

impl Default for SeekConfig {
    fn default() -> Self {
        Self {
            backward_secs: 1.0,
            forward_secs: 10.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RibbonConfig {
    /// Expected length of every spectral frame
    pub band_count: usize,

    /// Capacity of the history grid
    pub history_bins: usize,

    /// Target render tick interval (16ms is ~60 Hz)
    pub frame_interval_ms: u64,

    /// Sample rate used to label the frequency axis
    pub sample_rate_hz: u32,

    pub plot_margins: PlotMargins,
    pub tone: ToneConfig,
    pub palette: Vec<ColorStop>,
    pub gap: GapConfig,

    /// Weight kept from the previous waterline position each tick
    pub waterline_smoothing: f32,

    pub seek: SeekConfig,

    /// Spacing of the time axis ticks
    pub time_tick_secs: u32,

    /// Raw time values above this are suspected to be milliseconds
    pub unit_threshold: f64,
}

impl Default for RibbonConfig {
    fn default() -> Self {
        Self {
            band_count: DEFAULT_BAND_COUNT,
            history_bins: DEFAULT_HISTORY_BINS,
            frame_interval_ms: 16,
            sample_rate_hz: 44_100,
            plot_margins: PlotMargins::default(),
            tone: ToneConfig::default(),
            palette: default_palette(),
            gap: GapConfig::default(),
            waterline_smoothing: 0.9,
            seek: SeekConfig::default(),
            time_tick_secs: 30,
            unit_threshold: 10_000.0,
        }
    }
}

impl RibbonConfig {
    /// Load config from ~/.config/spectral-ribbon/config.toml
    /// Returns defaults if the file doesn't exist or fails to parse
    pub fn load() -> Self {
        let Some(path) = config_path() else {
            log::warn!("Could not determine config directory, using defaults");
            return Self::default();
        };

        if !path.exists() {
            log::debug!("No config file at {}, using defaults", path.display());
            return Self::default();
        }

        match Self::load_from(&path) {
            Ok(config) => {
                log::info!("Loaded ribbon config from {}", path.display());
                config
            }
            Err(e) => {
                log::warn!("Failed to load {}: {}, using defaults", path.display(), e);
                Self::default()
            }
        }
    }

    /// Strict load: I/O, parse and validation errors are returned
    pub fn load_from(path: &Path) -> Result<Self> {
        let contents = fs::read_to_string(path)?;
        let config: Self = toml::from_str(&contents)?;
        config.validate()?;
        Ok(config)
    }

    /// Save config to ~/.config/spectral-ribbon/config.toml
    pub fn save(&self) -> anyhow::Result<()> {
        let Some(path) = config_path() else {
            anyhow::bail!("Could not determine config directory");
        };
        self.save_to(&path)
    }

    pub fn save_to(&self, path: &Path) -> anyhow::Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).with_context(|| {
                format!("Failed to create config directory: {}", parent.display())
            })?;
        }

        let toml = toml::to_string_pretty(self).context("Failed to serialize config to TOML")?;
        fs::write(path, toml)
            .with_context(|| format!("Failed to write config file: {}", path.display()))?;

        log::info!("Saved ribbon config to {}", path.display());
        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        if self.band_count < 2 {
            return Err(RibbonError::Config(format!(
                "band_count must be at least 2, got {}",
                self.band_count
            )));
        }
        if self.history_bins == 0 {
            return Err(RibbonError::Config("history_bins must be non-zero".into()));
        }
        if self.frame_interval_ms == 0 {
            return Err(RibbonError::Config("frame_interval_ms must be non-zero".into()));
        }
        if self.palette.is_empty() {
            return Err(RibbonError::Config("palette needs at least one stop".into()));
        }
        if self.tone.floor_db <= 0.0 {
            return Err(RibbonError::Config("tone.floor_db must be positive".into()));
        }
        if !(0.0..1.0).contains(&self.waterline_smoothing) {
            return Err(RibbonError::Config(
                "waterline_smoothing must be in [0, 1)".into(),
            ));
        }
        Ok(())
    }

    /// Render tick period, never shorter than 1 ms
    pub fn frame_interval(&self) -> Duration {
        Duration::from_millis(self.frame_interval_ms.max(1))
    }
}

/// Path to the config file: ~/.config/spectral-ribbon/config.toml
pub fn config_path() -> Option<PathBuf> {
    ProjectDirs::from("", "", "spectral-ribbon").map(|dirs| dirs.config_dir().join("config.toml"))
}
