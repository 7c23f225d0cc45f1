//! Host integration for the automation engine.
//!
//! The engine is mounted behind the streaming assistant's plugin host. The
//! host owns the window chrome, update checks, and plugin lifecycle; the
//! engine only sees the narrow contract here: activation/deactivation, a
//! key-value settings store, an event bus, and menu-item metadata (which
//! sibling plugins use; this engine registers none).

use std::sync::Arc;

use serde_json::{json, Value};
use tracing::info;

use crate::config::EngineConfig;
use crate::error::SetupResult;
use crate::hardware;
use crate::obs::{ObsRequester, ObsSession};
use crate::setup::{audio, encoder, fonts, layout};
use crate::setup::{AudioOutcome, EncoderOutcome, FontOutcome, LayoutOutcome};

/// Key-value settings store provided by the host.
pub trait SettingsStore: Send + Sync {
    fn get(&self, key: &str) -> Option<Value>;
    fn save(&self, key: &str, value: Value) -> anyhow::Result<()>;
}

/// Event bus provided by the host; the engine emits setup outcomes on it.
pub trait EventBus: Send + Sync {
    fn emit(&self, event: &str, payload: Value);
}

/// A menu item a plugin may register with the host shell.
#[derive(Debug, Clone)]
pub struct MenuItem {
    pub id: &'static str,
    pub label: String,
}

/// Everything a plugin receives from the host on activation.
pub trait HostContext: Send + Sync {
    fn settings(&self) -> &dyn SettingsStore;
    fn events(&self) -> &dyn EventBus;
    fn register_menu_item(&self, item: MenuItem);
}

/// Trait implemented by all plugins mounted in the host.
pub trait Plugin: Send + Sync {
    /// Unique identifier for this plugin (e.g., "obs-autosetup")
    fn id(&self) -> &'static str;

    /// Human-readable name for UI display
    fn name(&self) -> &'static str;

    /// Called once when the host activates the plugin.
    fn activate(&mut self, host: &dyn HostContext) -> anyhow::Result<()>;

    /// Called when the host deactivates the plugin or shuts down.
    fn deactivate(&mut self) {}
}

/// Aggregated result of one full auto-setup pass.
#[derive(Debug, serde::Serialize)]
pub struct AutoSetupReport {
    pub hardware: hardware::HardwareProfile,
    pub encoder: EncoderOutcome,
    pub layout: LayoutOutcome,
    pub audio: AudioOutcome,
}

/// The automation engine as a host plugin.
pub struct AutoSetupPlugin {
    session: Arc<ObsSession>,
    config: EngineConfig,
}

impl AutoSetupPlugin {
    pub fn new(config: EngineConfig) -> Self {
        let session = Arc::new(ObsSession::new(config.endpoint.clone()));
        Self { session, config }
    }

    /// Construct from the on-disk engine config, falling back to defaults
    /// when no config exists or it fails to parse.
    pub fn from_disk() -> Self {
        Self::new(crate::config::load().unwrap_or_default())
    }

    pub fn session(&self) -> &Arc<ObsSession> {
        &self.session
    }

    /// Run the whole configuration pass: hardware profile, encoder settings
    /// for the current profile, overlay layout, and default audio sources.
    ///
    /// Failures inside each configurator stay advisory; the pass always
    /// runs to completion so the user can still start streaming manually.
    /// Only an unreachable endpoint aborts, since nothing below can proceed
    /// without the connection.
    pub fn run_auto_setup(&self) -> SetupResult<AutoSetupReport> {
        self.session.ensure_connected()?;
        let root = encoder::obs_config_root();
        Ok(run_auto_setup_with(
            self.session.as_ref(),
            &self.config,
            root.as_deref(),
        ))
    }

    /// Run the configuration pass and publish the aggregated report on the
    /// host event bus. A connection failure propagates without emitting.
    pub fn run_auto_setup_reporting(&self, events: &dyn EventBus) -> SetupResult<AutoSetupReport> {
        let report = self.run_auto_setup()?;
        if let Ok(payload) = serde_json::to_value(&report) {
            events.emit("autosetup/report", payload);
        }
        Ok(report)
    }

    /// Provision the bundled overlay font. Runs at setup time, independent
    /// of the OBS connection.
    pub fn install_font(&self) -> FontOutcome {
        fonts::install()
    }
}

/// The configuration pass against any requester and OBS config root; split
/// out so tests drive it with a scripted fake and a temp directory.
fn run_auto_setup_with(
    obs: &impl ObsRequester,
    config: &EngineConfig,
    obs_root: Option<&std::path::Path>,
) -> AutoSetupReport {
    let profile = hardware::profile();

    // The encoder settings land in whichever profile OBS currently has
    // selected; fall back to the stock profile name when unreadable.
    let profile_name = crate::obs::client::get_current_profile(obs)
        .unwrap_or_else(|_| "Untitled".to_string());
    let encoder_outcome = match obs_root {
        Some(root) => encoder::configure_at(root, profile.encoder.obs_id(), &profile_name),
        None => EncoderOutcome {
            success: false,
            message: "could not determine the OBS configuration directory".to_string(),
        },
    };

    let layout_outcome = layout::configure_layout(obs, &config.overlays);
    let audio_outcome = audio::enable_defaults(obs, Some(config.audio.clone()));

    info!(
        encoder = profile.encoder.obs_id(),
        profile = %profile_name,
        "auto-setup pass complete"
    );

    AutoSetupReport {
        hardware: profile,
        encoder: encoder_outcome,
        layout: layout_outcome,
        audio: audio_outcome,
    }
}

impl Plugin for AutoSetupPlugin {
    fn id(&self) -> &'static str {
        "obs-autosetup"
    }

    fn name(&self) -> &'static str {
        "OBS Auto Setup"
    }

    fn activate(&mut self, host: &dyn HostContext) -> anyhow::Result<()> {
        // Settings saved by a previous session win over the on-disk config.
        if let Some(saved) = host.settings().get("engine") {
            if let Ok(config) = serde_json::from_value::<EngineConfig>(saved) {
                self.session = Arc::new(ObsSession::new(config.endpoint.clone()));
                self.config = config;
            }
        }

        host.events().emit("autosetup/activated", json!({ "plugin": self.id() }));
        Ok(())
    }

    fn deactivate(&mut self) {
        self.session.disconnect();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::obs::fake::FakeObs;
    use std::sync::Mutex;

    #[derive(Default)]
    struct RecordingHost {
        saved: Mutex<std::collections::HashMap<String, Value>>,
        events: Mutex<Vec<(String, Value)>>,
        menu_items: Mutex<Vec<MenuItem>>,
    }

    impl SettingsStore for RecordingHost {
        fn get(&self, key: &str) -> Option<Value> {
            self.saved.lock().unwrap().get(key).cloned()
        }
        fn save(&self, key: &str, value: Value) -> anyhow::Result<()> {
            self.saved.lock().unwrap().insert(key.to_string(), value);
            Ok(())
        }
    }

    impl EventBus for RecordingHost {
        fn emit(&self, event: &str, payload: Value) {
            self.events.lock().unwrap().push((event.to_string(), payload));
        }
    }

    impl HostContext for RecordingHost {
        fn settings(&self) -> &dyn SettingsStore {
            self
        }
        fn events(&self) -> &dyn EventBus {
            self
        }
        fn register_menu_item(&self, item: MenuItem) {
            self.menu_items.lock().unwrap().push(item);
        }
    }

    fn stubbed_obs() -> FakeObs {
        let obs = FakeObs::new();
        obs.respond("GetProfileList", json!({ "currentProfileName": "Main" }));
        obs.respond("GetProfileParameter", json!({ "parameterValue": "obs_x264" }));
        obs.respond("GetVideoSettings", json!({ "baseWidth": 1080, "baseHeight": 1920 }));
        obs.respond(
            "GetCurrentProgramScene",
            json!({ "currentProgramSceneName": "场景" }),
        );
        obs.respond("GetInputList", json!({ "inputs": [] }));
        obs.respond("GetSourceFilterList", json!({ "filters": [] }));
        obs
    }

    #[test]
    fn full_pass_reports_every_stage() {
        let obs = stubbed_obs();
        let root = tempfile::tempdir().unwrap();
        let report = run_auto_setup_with(&obs, &EngineConfig::default(), Some(root.path()));

        // Advisory semantics: every stage reports, none aborts the pass.
        assert!(report.encoder.success);
        assert!(report.layout.success);
        assert!(report.audio.success);
        assert_eq!(report.layout.profile_name, "Main");
        assert!(report.hardware.resolution.0 > 0);
        // Settings landed in the profile OBS reported as current.
        assert!(root
            .path()
            .join("basic/profiles/Main/streamEncoder.json")
            .exists());
    }

    #[test]
    fn pass_continues_when_profile_query_fails() {
        let obs = stubbed_obs();
        obs.fail("GetProfileList", "no profiles");
        let root = tempfile::tempdir().unwrap();

        let report = run_auto_setup_with(&obs, &EngineConfig::default(), Some(root.path()));

        // Layout reports its failure, audio still ran.
        assert!(!report.layout.success);
        assert!(report.audio.success);
        assert_eq!(obs.calls_of("SetInputVolume"), 2);
    }

    #[test]
    fn activation_restores_saved_engine_settings() {
        let host = RecordingHost::default();
        let mut stored = EngineConfig::default();
        stored.endpoint.port = 4460;
        host.save("engine", serde_json::to_value(&stored).unwrap()).unwrap();

        let mut plugin = AutoSetupPlugin::new(EngineConfig::default());
        plugin.activate(&host).unwrap();

        assert_eq!(plugin.session().endpoint().port, 4460);
        let events = host.events.lock().unwrap();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].0, "autosetup/activated");
    }

    #[test]
    fn reporting_pass_does_not_emit_when_unreachable() {
        let host = RecordingHost::default();
        let mut config = EngineConfig::default();
        // Port 9 (discard) refuses the connection immediately.
        config.endpoint.port = 9;

        let plugin = AutoSetupPlugin::new(config);
        let result = plugin.run_auto_setup_reporting(&host);

        assert!(matches!(result, Err(crate::error::SetupError::Connection(_))));
        assert!(host.events.lock().unwrap().is_empty());
    }

    #[test]
    fn plugin_metadata() {
        let plugin = AutoSetupPlugin::new(EngineConfig::default());
        assert_eq!(plugin.id(), "obs-autosetup");
        assert_eq!(plugin.name(), "OBS Auto Setup");
    }

    #[test]
    fn deactivate_closes_the_session() {
        let mut plugin = AutoSetupPlugin::new(EngineConfig::default());
        plugin.deactivate();
        assert!(!plugin.session().is_connected());
    }
}
