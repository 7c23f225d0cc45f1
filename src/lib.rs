//! Automated OBS Studio configuration engine.
//!
//! Inspects host hardware, derives streaming parameters, and applies them to
//! a running OBS instance over the obs-websocket protocol: encoder profile
//! settings, overlay scene layout, default audio capture sources, and the
//! bundled overlay font. Every configurator is a single request/response
//! pass that degrades gracefully: a partial failure is reported back to
//! the host but never blocks the user from starting a stream.
//!
//! The UI shell, plugin loader, and update machinery live in the host
//! application; this crate is consumed through [`plugin::AutoSetupPlugin`]
//! or the individual configurators in [`setup`].

pub mod config;
pub mod error;
pub mod hardware;
pub mod obs;
pub mod plugin;
pub mod setup;

pub use config::EngineConfig;
pub use error::{SetupError, SetupResult};
pub use hardware::{EncoderKind, HardwareProfile};
pub use obs::{ObsEndpoint, ObsRequester, ObsSession};
pub use plugin::{AutoSetupPlugin, AutoSetupReport, Plugin};

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Initialize logging for hosts that don't bring their own subscriber.
/// `RUST_LOG` overrides the default filter.
pub fn init_logging() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "obs_autosetup=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();
}
