//! Default audio capture sources: creation, volume/mute reset, and the
//! microphone noise-suppression filter.
//!
//! The three phases (creation, volume/mute, filter) are independently
//! guarded; a failure in one never prevents the others from attempting.
//! The exception is a lost connection, which aborts the whole pass.
//! Running the pass repeatedly creates no duplicate sources or filters.

use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::{debug, info, warn};

use crate::error::{SetupError, SetupResult};
use crate::obs::client::{self, ObsRequester};

/// Noise suppression filter attached to the microphone source.
const NOISE_FILTER_NAME: &str = "噪声抑制";
const NOISE_FILTER_KIND: &str = "noise_suppress_filter";

/// Names of the two default audio sources. Defaults are the historical
/// names; hosts may override them through the engine config.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct AudioNames {
    pub desktop: String,
    pub microphone: String,
}

impl Default for AudioNames {
    fn default() -> Self {
        Self {
            desktop: "桌面音频".to_string(),
            microphone: "麦克风/Aux".to_string(),
        }
    }
}

/// Capture-device input kinds for the current platform.
fn capture_kinds() -> (&'static str, &'static str) {
    match std::env::consts::OS {
        "windows" => ("wasapi_output_capture", "wasapi_input_capture"),
        "macos" => ("coreaudio_output_capture", "coreaudio_input_capture"),
        _ => ("pulse_output_capture", "pulse_input_capture"),
    }
}

/// Result of an audio pass, surfaced to the host.
#[derive(Debug, Clone, Serialize)]
pub struct AudioOutcome {
    pub success: bool,
    pub desktop_audio: String,
    pub mic_audio: String,
    pub message: String,
}

/// Ensure both default audio sources exist, are unmuted at full volume, and
/// that the microphone carries a noise-suppression filter.
///
/// Per-phase failures are advisory, but a [`SetupError::Connection`] means
/// the endpoint itself is gone; nothing further can succeed, so the pass
/// aborts with `success: false`.
pub fn enable_defaults(obs: &impl ObsRequester, names: Option<AudioNames>) -> AudioOutcome {
    let names = names.unwrap_or_default();
    let (desktop_kind, mic_kind) = capture_kinds();
    let mut notes: Vec<String> = Vec::new();

    // Phase 1: create whichever source is absent. A name-only collision is
    // not "present": the kind must match too, so we never mistake an
    // unrelated source of the same name for the capture device.
    match client::get_input_list(obs) {
        Ok(inputs) => {
            let present = |name: &str, kind: &str| {
                inputs
                    .iter()
                    .any(|i| i.input_name == name && i.input_kind.as_deref() == Some(kind))
            };
            let wanted = [
                (names.desktop.as_str(), desktop_kind),
                (names.microphone.as_str(), mic_kind),
            ];
            for (name, kind) in wanted {
                if present(name, kind) {
                    debug!(source = name, "audio source already present");
                    continue;
                }
                match create_capture_source(obs, name, kind) {
                    Ok(()) => {}
                    Err(e @ SetupError::Connection(_)) => return aborted(&names, &e),
                    Err(e) => {
                        warn!(source = name, error = %e, "failed to create audio source");
                        notes.push(format!("create {name}: {e}"));
                    }
                }
            }
        }
        Err(e @ SetupError::Connection(_)) => return aborted(&names, &e),
        Err(e) => {
            warn!(error = %e, "could not list inputs, skipping source creation");
            notes.push(format!("list inputs: {e}"));
        }
    }

    // Phase 2: unmute and restore full volume on both, whether they were
    // just created or pre-existing, to undo any prior manual attenuation.
    for name in [names.desktop.as_str(), names.microphone.as_str()] {
        match client::set_input_mute(obs, name, false) {
            Ok(()) => {}
            Err(e @ SetupError::Connection(_)) => return aborted(&names, &e),
            Err(e) => {
                warn!(source = name, error = %e, "failed to unmute");
                notes.push(format!("unmute {name}: {e}"));
            }
        }
        match client::set_input_volume(obs, name, 1.0) {
            Ok(()) => {}
            Err(e @ SetupError::Connection(_)) => return aborted(&names, &e),
            Err(e) => {
                warn!(source = name, error = %e, "failed to set volume");
                notes.push(format!("volume {name}: {e}"));
            }
        }
    }

    // Phase 3: noise suppression on the microphone, created only when no
    // filter matches both the expected name and kind.
    match ensure_noise_filter(obs, &names.microphone) {
        Ok(()) => {}
        Err(e @ SetupError::Connection(_)) => return aborted(&names, &e),
        Err(e) => {
            warn!(source = %names.microphone, error = %e, "failed to ensure noise filter");
            notes.push(format!("noise filter: {e}"));
        }
    }

    let message = if notes.is_empty() {
        "default audio sources configured".to_string()
    } else {
        format!("audio pass finished with issues: {}", notes.join("; "))
    };
    info!(desktop = %names.desktop, mic = %names.microphone, issues = notes.len(),
        "audio source pass complete");

    AudioOutcome {
        success: true,
        desktop_audio: names.desktop,
        mic_audio: names.microphone,
        message,
    }
}

/// Outcome for a pass cut short by a lost connection.
fn aborted(names: &AudioNames, e: &SetupError) -> AudioOutcome {
    warn!(error = %e, "connection lost, aborting audio pass");
    AudioOutcome {
        success: false,
        desktop_audio: names.desktop.clone(),
        mic_audio: names.microphone.clone(),
        message: format!("audio pass aborted: {e}"),
    }
}

fn create_capture_source(obs: &impl ObsRequester, name: &str, kind: &str) -> SetupResult<()> {
    let scene = client::get_current_scene(obs)?;
    info!(source = name, kind, scene = %scene, "creating audio source");
    client::create_input(obs, &scene, name, kind, json!({ "device_id": "default" }))
}

fn ensure_noise_filter(obs: &impl ObsRequester, mic_name: &str) -> SetupResult<()> {
    let filters = client::get_source_filter_list(obs, mic_name)?;
    let exists = filters.iter().any(|f| {
        f.filter_name == NOISE_FILTER_NAME && f.filter_kind.as_deref() == Some(NOISE_FILTER_KIND)
    });
    if exists {
        debug!(source = mic_name, "noise suppression filter already present");
        return Ok(());
    }
    info!(source = mic_name, "attaching noise suppression filter");
    client::create_source_filter(obs, mic_name, NOISE_FILTER_NAME, NOISE_FILTER_KIND, json!({}))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::obs::fake::FakeObs;

    fn stub_scene(obs: &FakeObs) {
        obs.respond(
            "GetCurrentProgramScene",
            json!({ "currentProgramSceneName": "场景" }),
        );
    }

    fn both_sources_present() -> serde_json::Value {
        let (desktop_kind, mic_kind) = capture_kinds();
        json!({ "inputs": [
            { "inputName": "桌面音频", "inputKind": desktop_kind },
            { "inputName": "麦克风/Aux", "inputKind": mic_kind },
        ]})
    }

    #[test]
    fn creates_both_sources_when_absent() {
        let obs = FakeObs::new();
        stub_scene(&obs);
        obs.respond("GetInputList", json!({ "inputs": [] }));
        obs.respond("GetSourceFilterList", json!({ "filters": [] }));

        let outcome = enable_defaults(&obs, None);

        assert!(outcome.success);
        assert_eq!(obs.calls_of("CreateInput"), 2);
        let payloads = obs.payloads_of("CreateInput");
        assert_eq!(payloads[0]["inputName"], "桌面音频");
        assert_eq!(payloads[0]["sceneName"], "场景");
        assert_eq!(payloads[0]["inputSettings"]["device_id"], "default");
        assert_eq!(payloads[1]["inputName"], "麦克风/Aux");
    }

    #[test]
    fn existing_sources_are_not_recreated() {
        let obs = FakeObs::new();
        stub_scene(&obs);
        obs.respond("GetInputList", both_sources_present());
        obs.respond("GetSourceFilterList", json!({ "filters": [
            { "filterName": NOISE_FILTER_NAME, "filterKind": NOISE_FILTER_KIND },
        ]}));

        let outcome = enable_defaults(&obs, None);

        assert!(outcome.success);
        assert_eq!(obs.calls_of("CreateInput"), 0);
        assert_eq!(obs.calls_of("CreateSourceFilter"), 0);
        // Volume and mute are still reset unconditionally.
        assert_eq!(obs.calls_of("SetInputMute"), 2);
        assert_eq!(obs.calls_of("SetInputVolume"), 2);
        let volumes = obs.payloads_of("SetInputVolume");
        assert_eq!(volumes[0]["inputVolumeMul"], 1.0);
    }

    #[test]
    fn name_only_collision_still_creates_the_capture_source() {
        let obs = FakeObs::new();
        stub_scene(&obs);
        // Same name, wrong kind: a browser source squatting on 桌面音频.
        let (_, mic_kind) = capture_kinds();
        obs.respond("GetInputList", json!({ "inputs": [
            { "inputName": "桌面音频", "inputKind": "browser_source" },
            { "inputName": "麦克风/Aux", "inputKind": mic_kind },
        ]}));
        obs.respond("GetSourceFilterList", json!({ "filters": [] }));

        enable_defaults(&obs, None);

        let payloads = obs.payloads_of("CreateInput");
        assert_eq!(payloads.len(), 1);
        assert_eq!(payloads[0]["inputName"], "桌面音频");
    }

    #[test]
    fn noise_filter_added_only_when_missing() {
        let obs = FakeObs::new();
        stub_scene(&obs);
        obs.respond("GetInputList", both_sources_present());
        // A filter with the right name but wrong kind does not count.
        obs.respond("GetSourceFilterList", json!({ "filters": [
            { "filterName": NOISE_FILTER_NAME, "filterKind": "gain_filter" },
        ]}));

        enable_defaults(&obs, None);

        assert_eq!(obs.calls_of("CreateSourceFilter"), 1);
        let payloads = obs.payloads_of("CreateSourceFilter");
        assert_eq!(payloads[0]["filterKind"], NOISE_FILTER_KIND);
        assert_eq!(payloads[0]["sourceName"], "麦克风/Aux");
    }

    #[test]
    fn repeated_invocation_is_idempotent() {
        let obs = FakeObs::new();
        stub_scene(&obs);
        obs.respond("GetInputList", both_sources_present());
        obs.respond("GetSourceFilterList", json!({ "filters": [
            { "filterName": NOISE_FILTER_NAME, "filterKind": NOISE_FILTER_KIND },
        ]}));

        let first = enable_defaults(&obs, None);
        let second = enable_defaults(&obs, None);

        assert!(first.success && second.success);
        assert_eq!(obs.calls_of("CreateInput"), 0);
        assert_eq!(obs.calls_of("CreateSourceFilter"), 0);
    }

    #[test]
    fn creation_failure_does_not_stop_volume_and_filter_phases() {
        let obs = FakeObs::new();
        stub_scene(&obs);
        obs.respond("GetInputList", json!({ "inputs": [] }));
        obs.fail("CreateInput", "no device");
        obs.respond("GetSourceFilterList", json!({ "filters": [] }));

        let outcome = enable_defaults(&obs, None);

        assert!(outcome.success);
        assert!(outcome.message.contains("issues"));
        assert_eq!(obs.calls_of("SetInputMute"), 2);
        assert_eq!(obs.calls_of("SetInputVolume"), 2);
        assert_eq!(obs.calls_of("CreateSourceFilter"), 1);
    }

    #[test]
    fn lost_connection_aborts_the_pass() {
        let obs = FakeObs::new();
        stub_scene(&obs);
        obs.on("GetInputList", |_| {
            Err(SetupError::Connection("endpoint gone".into()))
        });

        let outcome = enable_defaults(&obs, None);

        // Unlike a per-source failure, total connection loss is fatal:
        // the later phases are not attempted.
        assert!(!outcome.success);
        assert!(outcome.message.contains("aborted"));
        assert_eq!(obs.calls_of("SetInputMute"), 0);
        assert_eq!(obs.calls_of("SetInputVolume"), 0);
        assert_eq!(obs.calls_of("GetSourceFilterList"), 0);
    }

    #[test]
    fn connection_drop_mid_volume_phase_aborts() {
        let obs = FakeObs::new();
        stub_scene(&obs);
        obs.respond("GetInputList", both_sources_present());
        obs.on("SetInputVolume", |_| {
            Err(SetupError::Connection("socket closed".into()))
        });

        let outcome = enable_defaults(&obs, None);

        assert!(!outcome.success);
        assert_eq!(obs.calls_of("SetInputVolume"), 1);
        assert_eq!(obs.calls_of("GetSourceFilterList"), 0);
    }

    #[test]
    fn custom_names_are_used_and_reported() {
        let obs = FakeObs::new();
        stub_scene(&obs);
        obs.respond("GetInputList", json!({ "inputs": [] }));
        obs.respond("GetSourceFilterList", json!({ "filters": [] }));

        let outcome = enable_defaults(
            &obs,
            Some(AudioNames {
                desktop: "Desktop Audio".to_string(),
                microphone: "Mic/Aux".to_string(),
            }),
        );

        assert_eq!(outcome.desktop_audio, "Desktop Audio");
        assert_eq!(outcome.mic_audio, "Mic/Aux");
        let payloads = obs.payloads_of("SetInputMute");
        assert_eq!(payloads[0]["inputName"], "Desktop Audio");
        assert_eq!(payloads[1]["inputName"], "Mic/Aux");
    }
}
