use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;
use tracing::warn;

use crate::obs::ObsEndpoint;
use crate::setup::{AudioNames, OverlayNames};

/// Current config schema version for future migration support
const CONFIG_VERSION: u32 = 1;

/// Directory name under the platform config root.
const APP_DIR: &str = "obs-autosetup";

/// Persisted engine configuration: control endpoint plus the overlay and
/// audio source name tables.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct EngineConfig {
    /// Schema version for migration support
    pub version: u32,
    pub endpoint: ObsEndpoint,
    pub overlays: OverlayNames,
    pub audio: AudioNames,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            version: CONFIG_VERSION,
            endpoint: ObsEndpoint::default(),
            overlays: OverlayNames::default(),
            audio: AudioNames::default(),
        }
    }
}

/// Returns the path to the config file: `<config-dir>/obs-autosetup/config.toml`
pub fn config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|p| p.join(APP_DIR).join("config.toml"))
}

/// Save the engine config.
/// Uses atomic writes (write to temp, then rename) to prevent corruption.
/// Keeps a .bak backup of the previous config.
pub fn save(config: &EngineConfig) -> Result<()> {
    let Some(path) = config_path() else {
        anyhow::bail!("Could not determine config directory");
    };

    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create config directory: {}", parent.display()))?;
    }

    let contents = toml::to_string_pretty(config).context("Failed to serialize config to TOML")?;

    // Atomic write: write to temp file, then rename
    let tmp_path = path.with_extension("toml.tmp");
    let bak_path = path.with_extension("toml.bak");

    fs::write(&tmp_path, &contents)
        .with_context(|| format!("Failed to write temp config file: {}", tmp_path.display()))?;

    // Backup existing config if it exists
    if path.exists() {
        let _ = fs::remove_file(&bak_path);
        fs::rename(&path, &bak_path)
            .with_context(|| format!("Failed to backup config file: {}", path.display()))?;
    }

    fs::rename(&tmp_path, &path)
        .with_context(|| format!("Failed to finalize config file: {}", path.display()))?;

    Ok(())
}

/// Load the engine config, or return defaults if no file exists.
/// If the main config is corrupted, attempts to load from backup.
pub fn load() -> Result<EngineConfig> {
    let Some(path) = config_path() else {
        return Ok(EngineConfig::default());
    };

    if !path.exists() {
        let bak_path = path.with_extension("toml.bak");
        if bak_path.exists() {
            warn!(path = %bak_path.display(), "main config missing, loading from backup");
            return load_from_path(&bak_path);
        }
        return Ok(EngineConfig::default());
    }

    match load_from_path(&path) {
        Ok(config) => Ok(config),
        Err(e) => {
            let bak_path = path.with_extension("toml.bak");
            if bak_path.exists() {
                warn!(error = %e, "main config corrupted, loading from backup");
                return load_from_path(&bak_path);
            }
            Err(e)
        }
    }
}

/// Load the config from a specific path
fn load_from_path(path: &PathBuf) -> Result<EngineConfig> {
    let contents = fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    let config: EngineConfig = toml::from_str(&contents)
        .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

    if config.version > CONFIG_VERSION {
        warn!(
            found = config.version,
            supported = CONFIG_VERSION,
            "config version is newer than supported"
        );
    }

    Ok(config)
}
