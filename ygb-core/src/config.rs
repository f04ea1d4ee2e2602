use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;
use ygb_types::{LogLevel, DEFAULT_VOLUME};

const DEFAULT_CONFIG: &str = include_str!("../config.toml");

#[derive(Deserialize, Default)]
struct ConfigFile {
    #[serde(default)]
    emulator: EmulatorConfig,
    #[serde(default)]
    controller: ControllerConfig,
    #[serde(default)]
    audio: AudioConfig,
    #[serde(default)]
    storage: StorageConfig,
}

#[derive(Deserialize, Default)]
struct EmulatorConfig {
    volume: Option<u8>,
    freq_scale: Option<f64>,
}

#[derive(Deserialize, Default)]
struct ControllerConfig {
    fscale_debounce_ms: Option<u64>,
    log_filter: Option<String>,
}

#[derive(Deserialize, Default)]
struct AudioConfig {
    sample_rate: Option<u32>,
    ring_capacity: Option<usize>,
    channel_depth: Option<usize>,
}

#[derive(Deserialize, Default)]
struct StorageConfig {
    database: Option<PathBuf>,
}

pub struct Config {
    emulator: EmulatorConfig,
    controller: ControllerConfig,
    audio: AudioConfig,
    storage: StorageConfig,
}

impl Config {
    /// Built-in defaults merged with the user's config file, if any.
    pub fn load() -> Self {
        match user_config_path() {
            Some(path) if path.exists() => Self::load_with(&path),
            _ => Self::embedded(),
        }
    }

    /// Built-in defaults merged with the file at `path`. A missing or
    /// malformed file is logged and ignored.
    pub fn load_with(path: &Path) -> Self {
        let mut config = Self::embedded();
        match std::fs::read_to_string(path) {
            Ok(contents) => match toml::from_str::<ConfigFile>(&contents) {
                Ok(user) => config.merge(user),
                Err(e) => {
                    log::warn!(target: "config", "ignoring malformed config {}: {}", path.display(), e)
                }
            },
            Err(e) => {
                log::warn!(target: "config", "could not read config {}: {}", path.display(), e)
            }
        }
        config
    }

    /// Built-in defaults only.
    pub fn embedded() -> Self {
        let base: ConfigFile =
            toml::from_str(DEFAULT_CONFIG).expect("Failed to parse embedded config.toml");
        Config {
            emulator: base.emulator,
            controller: base.controller,
            audio: base.audio,
            storage: base.storage,
        }
    }

    fn merge(&mut self, user: ConfigFile) {
        merge_emulator(&mut self.emulator, user.emulator);
        merge_controller(&mut self.controller, user.controller);
        merge_audio(&mut self.audio, user.audio);
        if user.storage.database.is_some() {
            self.storage.database = user.storage.database;
        }
    }

    /// Initial volume (clamped to 0..=100).
    pub fn volume(&self) -> u8 {
        self.emulator.volume.unwrap_or(DEFAULT_VOLUME).min(100)
    }

    /// Initial clock multiplier. Non-finite or non-positive values fall back to 1.0.
    pub fn freq_scale(&self) -> f64 {
        self.emulator
            .freq_scale
            .filter(|s| s.is_finite() && *s > 0.0)
            .unwrap_or(1.0)
    }

    pub fn fscale_debounce(&self) -> Duration {
        Duration::from_millis(self.controller.fscale_debounce_ms.unwrap_or(300).min(10_000))
    }

    /// Display filter for core log lines.
    pub fn log_filter(&self) -> LogLevel {
        self.controller
            .log_filter
            .as_deref()
            .and_then(LogLevel::from_name)
            .unwrap_or_default()
    }

    /// Output sample rate in Hz (clamped to 8000..=192000).
    pub fn sample_rate(&self) -> u32 {
        self.audio.sample_rate.unwrap_or(48_000).clamp(8_000, 192_000)
    }

    /// Ring buffer capacity in samples, rounded down to whole stereo frames.
    pub fn ring_capacity(&self) -> usize {
        let cap = self.audio.ring_capacity.unwrap_or(16_384).clamp(256, 1 << 20);
        cap & !1
    }

    pub fn audio_channel_depth(&self) -> usize {
        self.audio.channel_depth.unwrap_or(64).clamp(1, 4096)
    }

    /// Save database location.
    pub fn database_path(&self) -> Option<PathBuf> {
        self.storage
            .database
            .clone()
            .or_else(|| dirs::data_dir().map(|d| d.join("ygb").join("saves.sqlite")))
    }
}

fn user_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join("ygb").join("config.toml"))
}

fn merge_emulator(base: &mut EmulatorConfig, user: EmulatorConfig) {
    if user.volume.is_some() {
        base.volume = user.volume;
    }
    if user.freq_scale.is_some() {
        base.freq_scale = user.freq_scale;
    }
}

fn merge_controller(base: &mut ControllerConfig, user: ControllerConfig) {
    if user.fscale_debounce_ms.is_some() {
        base.fscale_debounce_ms = user.fscale_debounce_ms;
    }
    if user.log_filter.is_some() {
        base.log_filter = user.log_filter;
    }
}

fn merge_audio(base: &mut AudioConfig, user: AudioConfig) {
    if user.sample_rate.is_some() {
        base.sample_rate = user.sample_rate;
    }
    if user.ring_capacity.is_some() {
        base.ring_capacity = user.ring_capacity;
    }
    if user.channel_depth.is_some() {
        base.channel_depth = user.channel_depth;
    }
}
