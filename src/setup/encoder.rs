//! Stream encoder settings persisted into the OBS profile directory.
//!
//! The settings bundle is a fixed table keyed by [`EncoderKind`]; exactly
//! one encoder-specific tuning field is populated per kind, and the whole
//! bundle is written verbatim as `streamEncoder.json`.

use std::fs;
use std::path::{Path, PathBuf};

use serde::Serialize;
use tracing::{info, warn};

use crate::error::SetupResult;
use crate::hardware::EncoderKind;

/// Persisted encoder settings, serialized as the profile's
/// `streamEncoder.json`.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct EncoderSettings {
    pub bitrate: u32,
    pub keyint_sec: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub preset: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub quality: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub target_usage: Option<String>,
    pub profile: String,
}

/// Fixed settings bundle for an encoder kind.
pub fn settings_for(kind: EncoderKind) -> EncoderSettings {
    let base = EncoderSettings {
        bitrate: 20000,
        keyint_sec: 2,
        preset: None,
        quality: None,
        target_usage: None,
        profile: "high".to_string(),
    };
    match kind {
        EncoderKind::SoftwareX264 => EncoderSettings {
            bitrate: 8000,
            preset: Some("veryfast".to_string()),
            ..base
        },
        EncoderKind::Nvenc => EncoderSettings {
            preset: Some("p7".to_string()),
            ..base
        },
        EncoderKind::AmdAmf => EncoderSettings {
            quality: Some("quality".to_string()),
            ..base
        },
        EncoderKind::Qsv => EncoderSettings {
            target_usage: Some("quality".to_string()),
            ..base
        },
    }
}

/// Outcome reported back to the host. Never an `Err`: internal I/O failures
/// are folded into `success: false`.
#[derive(Debug, Clone, Serialize)]
pub struct EncoderOutcome {
    pub success: bool,
    pub message: String,
}

/// OBS configuration root (`obs-studio` under the platform config dir).
pub fn obs_config_root() -> Option<PathBuf> {
    dirs::config_dir().map(|p| p.join("obs-studio"))
}

/// Path of a profile's stream encoder settings file under `root`.
fn encoder_settings_path(root: &Path, profile_name: &str) -> PathBuf {
    root.join("basic")
        .join("profiles")
        .join(profile_name)
        .join("streamEncoder.json")
}

/// Write the settings bundle for `encoder_id` into the named profile under
/// `root`. Whole-file replace; parent directories created as needed.
pub fn write_settings(root: &Path, encoder_id: &str, profile_name: &str) -> SetupResult<PathBuf> {
    // Unrecognized hardware encoders fall back to the x264 bundle instead
    // of blocking configuration.
    let kind = EncoderKind::from_obs_id(encoder_id).unwrap_or(EncoderKind::SoftwareX264);
    let settings = settings_for(kind);

    let path = encoder_settings_path(root, profile_name);
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let contents = serde_json::to_string_pretty(&settings)
        .map_err(|e| crate::error::SetupError::Protocol(format!("serialize settings: {e}")))?;
    fs::write(&path, contents)?;
    Ok(path)
}

/// Configure the named profile for the given encoder identifier, writing
/// under the default OBS configuration root.
pub fn configure(encoder_id: &str, profile_name: &str) -> EncoderOutcome {
    let Some(root) = obs_config_root() else {
        return EncoderOutcome {
            success: false,
            message: "could not determine the OBS configuration directory".to_string(),
        };
    };
    configure_at(&root, encoder_id, profile_name)
}

/// Same as [`configure`], against an explicit configuration root.
pub fn configure_at(root: &Path, encoder_id: &str, profile_name: &str) -> EncoderOutcome {
    match write_settings(root, encoder_id, profile_name) {
        Ok(path) => {
            info!(encoder = encoder_id, profile = profile_name, path = %path.display(),
                "wrote stream encoder settings");
            EncoderOutcome {
                success: true,
                message: format!("encoder settings written to {}", path.display()),
            }
        }
        Err(e) => {
            warn!(encoder = encoder_id, profile = profile_name, error = %e,
                "failed to write stream encoder settings");
            EncoderOutcome {
                success: false,
                message: format!("failed to write encoder settings: {e}"),
            }
        }
    }
}
