//! Bundled overlay font provisioning.
//!
//! Locates the shipped font across packaged/unpackaged layouts and copies it
//! into the OS font directory. Installation is keyed by byte-equality, so a
//! second run touches nothing. The POSIX font-cache refresh is an
//! optimization only; its failure is ignored.

use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;

use serde::Serialize;
use tracing::{debug, info, warn};

use crate::error::{SetupError, SetupResult};

/// File name of the bundled overlay font.
pub const FONT_FILE_NAME: &str = "AlibabaPuHuiTi-3-55-Regular.ttf";

/// Font directory and cache-refresh command for one target platform.
#[derive(Debug, Clone)]
pub struct PlatformPaths {
    pub font_dir: PathBuf,
    /// Command line run after a copy, best-effort. `None` on Windows where
    /// no cache refresh is needed.
    pub cache_refresh: Option<Vec<String>>,
}

/// Resolve the font paths for an OS name (`std::env::consts::OS` values).
pub fn platform_paths(os: &str) -> SetupResult<PlatformPaths> {
    let home = || {
        dirs::home_dir().ok_or_else(|| {
            SetupError::Io(std::io::Error::new(
                std::io::ErrorKind::NotFound,
                "home directory not found",
            ))
        })
    };
    let fc_cache = || Some(vec!["fc-cache".to_string(), "-f".to_string()]);

    match os {
        "windows" => {
            let root = env::var("SYSTEMROOT").unwrap_or_else(|_| "C:\\Windows".to_string());
            Ok(PlatformPaths {
                font_dir: PathBuf::from(root).join("Fonts"),
                cache_refresh: None,
            })
        }
        "macos" => Ok(PlatformPaths {
            font_dir: home()?.join("Library").join("Fonts"),
            cache_refresh: fc_cache(),
        }),
        "linux" => Ok(PlatformPaths {
            font_dir: home()?.join(".local").join("share").join("fonts"),
            cache_refresh: fc_cache(),
        }),
        other => Err(SetupError::UnsupportedPlatform(other.to_string())),
    }
}

/// Candidate locations of the bundled font, packaged layout first.
fn default_candidates() -> Vec<PathBuf> {
    let mut candidates = Vec::new();
    if let Ok(exe) = env::current_exe() {
        if let Some(dir) = exe.parent() {
            candidates.push(dir.join("resources").join("fonts").join(FONT_FILE_NAME));
            candidates.push(dir.join("..").join("resources").join("fonts").join(FONT_FILE_NAME));
        }
    }
    // Unpackaged source-tree layout.
    candidates.push(PathBuf::from("assets").join("fonts").join(FONT_FILE_NAME));
    candidates
}

/// First existing candidate, else the first candidate so the eventual error
/// names a concrete path.
pub fn locate_in(candidates: &[PathBuf]) -> PathBuf {
    candidates
        .iter()
        .find(|p| p.exists())
        .cloned()
        .unwrap_or_else(|| candidates.first().cloned().unwrap_or_default())
}

/// Locate the bundled font on disk.
pub fn locate() -> PathBuf {
    locate_in(&default_candidates())
}

/// What the install step actually did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InstallAction {
    /// Target already had byte-identical content; nothing was written.
    AlreadyInstalled,
    Installed,
}

/// Outcome surfaced to the host.
#[derive(Debug, Clone, Serialize)]
pub struct FontOutcome {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Copy `source` into `font_dir` unless byte-identical content is already
/// there, then run the cache refresh (failures ignored).
pub fn install_file(
    source: &Path,
    font_dir: &Path,
    cache_refresh: Option<&[String]>,
) -> SetupResult<InstallAction> {
    if !source.exists() {
        return Err(SetupError::Io(std::io::Error::new(
            std::io::ErrorKind::NotFound,
            format!("bundled font not found at {}", source.display()),
        )));
    }

    let file_name = source.file_name().ok_or_else(|| {
        SetupError::Io(std::io::Error::new(
            std::io::ErrorKind::InvalidInput,
            "font source has no file name",
        ))
    })?;
    let target = font_dir.join(file_name);

    if target.exists() {
        let same = fs::read(source)? == fs::read(&target)?;
        if same {
            debug!(target = %target.display(), "font already installed");
            return Ok(InstallAction::AlreadyInstalled);
        }
    }

    fs::create_dir_all(font_dir)?;
    fs::copy(source, &target)?;
    info!(target = %target.display(), "font installed");

    if let Some(cmd) = cache_refresh {
        if let Some((program, args)) = cmd.split_first() {
            match Command::new(program).args(args).status() {
                Ok(status) if status.success() => debug!("font cache refreshed"),
                Ok(status) => warn!(%status, "font cache refresh exited non-zero"),
                Err(e) => warn!(error = %e, "font cache refresh failed to start"),
            }
        }
    }

    Ok(InstallAction::Installed)
}

/// Install the bundled font into the OS font directory.
pub fn install() -> FontOutcome {
    let paths = match platform_paths(env::consts::OS) {
        Ok(paths) => paths,
        Err(e) => {
            return FontOutcome {
                success: false,
                message: None,
                error: Some(e.to_string()),
            }
        }
    };

    let source = locate();
    match install_file(&source, &paths.font_dir, paths.cache_refresh.as_deref()) {
        Ok(InstallAction::AlreadyInstalled) => FontOutcome {
            success: true,
            message: Some("font already installed".to_string()),
            error: None,
        },
        Ok(InstallAction::Installed) => FontOutcome {
            success: true,
            message: Some(format!("font installed to {}", paths.font_dir.display())),
            error: None,
        },
        Err(e) => FontOutcome {
            success: false,
            message: None,
            error: Some(e.to_string()),
        },
    }
}
