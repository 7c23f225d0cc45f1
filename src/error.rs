//! Error taxonomy for the automation engine.
//!
//! Sub-steps return `Result<T, SetupError>` so the skip-vs-abort decision is
//! visible as data instead of buried in catch blocks. Configurator entry
//! points fold these into outcome structs; only the session's initial
//! connect is allowed to surface an error to the caller.

use thiserror::Error;

/// Errors produced while configuring OBS or provisioning local assets.
#[derive(Debug, Error)]
pub enum SetupError {
    /// Control endpoint unreachable, or it rejected the handshake/auth.
    /// Fatal for the calling configurator pass.
    #[error("OBS connection failed: {0}")]
    Connection(String),

    /// A named scene source, profile, or filter does not exist. Non-fatal:
    /// the sub-step is skipped and the pass continues.
    #[error("resource not found: {0}")]
    MissingResource(String),

    /// Filesystem failure. Fatal for encoder/font operations, ignored for
    /// the font-cache refresh.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Font installation attempted on an OS we have no font directory for.
    #[error("unsupported platform: {0}")]
    UnsupportedPlatform(String),

    /// The remote endpoint returned something we could not interpret, or
    /// rejected the request for a reason other than a missing resource.
    #[error("protocol error: {0}")]
    Protocol(String),
}

impl SetupError {
    /// Whether this error means "the thing wasn't there" rather than "the
    /// operation broke". Callers use this to decide skip vs. abort.
    pub fn is_missing_resource(&self) -> bool {
        matches!(self, SetupError::MissingResource(_))
    }
}

/// Result alias used throughout the engine.
pub type SetupResult<T> = Result<T, SetupError>;
