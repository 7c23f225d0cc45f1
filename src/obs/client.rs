//! OBS WebSocket API client
//!
//! Speaks the obs-websocket 5.x protocol (built into OBS 28+). Default
//! endpoint: ws://{host}:{port}
//!
//! Typed request wrappers are generic over [`ObsRequester`] so configurators
//! can be exercised against a scripted fake instead of a live OBS.

use base64::Engine;
use serde::Deserialize;
use serde_json::{json, Value};
use sha2::{Digest, Sha256};
use std::sync::atomic::{AtomicU32, Ordering};
use tungstenite::stream::MaybeTlsStream;
use tungstenite::{connect, Message, WebSocket};

use crate::error::{SetupError, SetupResult};

/// obs-websocket status code for "the requested resource was not found".
const STATUS_RESOURCE_NOT_FOUND: u32 = 600;

/// Global request ID counter
static REQUEST_ID: AtomicU32 = AtomicU32::new(1);

/// Generate a unique request ID
fn next_request_id() -> String {
    REQUEST_ID.fetch_add(1, Ordering::SeqCst).to_string()
}

pub(crate) type ObsWebSocket = WebSocket<MaybeTlsStream<std::net::TcpStream>>;

/// Anything that can execute a named obs-websocket request. Implemented by
/// the live [`super::session::ObsSession`] and by test fakes.
pub trait ObsRequester {
    /// Execute a request by name and return the `d` payload of the response.
    fn request(&self, request_type: &str, request_data: Option<Value>) -> SetupResult<Value>;
}

/// OBS WebSocket Hello message (server -> client)
#[derive(Debug, Deserialize)]
struct Hello {
    authentication: Option<AuthChallenge>,
}

/// Authentication challenge from server
#[derive(Debug, Deserialize)]
struct AuthChallenge {
    challenge: String,
    salt: String,
}

/// OBS WebSocket message wrapper
#[derive(Debug, Deserialize)]
struct ObsMessage {
    op: u32,
    d: Value,
}

/// OBS WebSocket op codes
mod op {
    pub const HELLO: u32 = 0;
    pub const IDENTIFY: u32 = 1;
    pub const IDENTIFIED: u32 = 2;
    pub const REQUEST: u32 = 6;
    pub const REQUEST_RESPONSE: u32 = 7;
}

/// Generate authentication string per obs-websocket protocol
fn generate_auth_string(password: &str, challenge: &str, salt: &str) -> String {
    // Step 1: Concatenate password + salt, then SHA256
    let secret_string = format!("{}{}", password, salt);
    let secret_hash = Sha256::digest(secret_string.as_bytes());
    let secret_base64 = base64::engine::general_purpose::STANDARD.encode(secret_hash);

    // Step 2: Concatenate secret_base64 + challenge, then SHA256
    let auth_string = format!("{}{}", secret_base64, challenge);
    let auth_hash = Sha256::digest(auth_string.as_bytes());
    base64::engine::general_purpose::STANDARD.encode(auth_hash)
}

/// Connection parameters for the OBS control endpoint.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize, PartialEq)]
pub struct ObsEndpoint {
    pub host: String,
    pub port: u16,
    pub password: Option<String>,
}

impl Default for ObsEndpoint {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 4455,
            password: None,
        }
    }
}

impl ObsEndpoint {
    pub fn new(host: &str, port: u16, password: Option<String>) -> Self {
        Self {
            host: host.to_string(),
            port,
            password,
        }
    }

    pub fn url(&self) -> String {
        format!("ws://{}:{}", self.host, self.port)
    }
}

fn read_message(socket: &mut ObsWebSocket, what: &str) -> SetupResult<ObsMessage> {
    let msg = socket
        .read()
        .map_err(|e| SetupError::Connection(format!("failed to read {what}: {e}")))?;
    let text = msg
        .to_text()
        .map_err(|e| SetupError::Protocol(format!("non-text {what} frame: {e}")))?;
    serde_json::from_str(text).map_err(|e| SetupError::Protocol(format!("bad {what}: {e}")))
}

/// Open a socket and run the Hello / Identify / Identified handshake.
pub(crate) fn open_connection(endpoint: &ObsEndpoint) -> SetupResult<ObsWebSocket> {
    let (mut socket, _response) = connect(endpoint.url())
        .map_err(|e| SetupError::Connection(format!("connect to {} failed: {e}", endpoint.url())))?;

    // Step 1: Receive Hello
    let hello = read_message(&mut socket, "Hello")?;
    if hello.op != op::HELLO {
        return Err(SetupError::Protocol(format!(
            "expected Hello, got op {}",
            hello.op
        )));
    }
    let hello: Hello = serde_json::from_value(hello.d)
        .map_err(|e| SetupError::Protocol(format!("bad Hello data: {e}")))?;

    // Step 2: Send Identify (with auth when the server challenges us)
    let identify = match hello.authentication {
        Some(auth) => {
            let password = endpoint.password.as_deref().ok_or_else(|| {
                SetupError::Connection("OBS requires authentication but no password configured".into())
            })?;
            let auth_string = generate_auth_string(password, &auth.challenge, &auth.salt);
            json!({
                "op": op::IDENTIFY,
                "d": { "rpcVersion": 1, "authentication": auth_string }
            })
        }
        None => json!({
            "op": op::IDENTIFY,
            "d": { "rpcVersion": 1 }
        }),
    };
    socket
        .send(Message::Text(identify.to_string()))
        .map_err(|e| SetupError::Connection(format!("failed to send Identify: {e}")))?;

    // Step 3: Receive Identified
    let identified = read_message(&mut socket, "Identified")?;
    if identified.op != op::IDENTIFIED {
        return Err(SetupError::Connection(format!(
            "authentication failed or unexpected message (op {})",
            identified.op
        )));
    }

    Ok(socket)
}

/// Send one request on an established socket and return the raw `d` payload.
pub(crate) fn send_request_on_socket(
    socket: &mut ObsWebSocket,
    request_type: &str,
    request_data: Option<&Value>,
) -> SetupResult<Value> {
    let request_id = next_request_id();
    let mut d = json!({
        "requestType": request_type,
        "requestId": request_id,
    });
    if let Some(data) = request_data {
        d["requestData"] = data.clone();
    }
    let request = json!({ "op": op::REQUEST, "d": d });

    socket
        .send(Message::Text(request.to_string()))
        .map_err(|e| SetupError::Connection(format!("failed to send {request_type}: {e}")))?;

    let response = read_message(socket, "response")?;
    if response.op != op::REQUEST_RESPONSE {
        return Err(SetupError::Protocol(format!(
            "expected RequestResponse, got op {}",
            response.op
        )));
    }
    Ok(response.d)
}

/// Response status from OBS
#[derive(Debug, Deserialize)]
struct RequestStatus {
    result: bool,
    code: u32,
    #[serde(default)]
    comment: Option<String>,
}

/// Check a response's requestStatus, mapping the resource-not-found code to
/// [`SetupError::MissingResource`] so callers can skip instead of abort.
pub(crate) fn check_response(response: &Value) -> SetupResult<()> {
    if let Some(status) = response.get("requestStatus") {
        let status: RequestStatus = serde_json::from_value(status.clone())
            .map_err(|e| SetupError::Protocol(format!("bad requestStatus: {e}")))?;

        if !status.result {
            let msg = status
                .comment
                .clone()
                .unwrap_or_else(|| format!("error code {}", status.code));
            if status.code == STATUS_RESOURCE_NOT_FOUND {
                return Err(SetupError::MissingResource(msg));
            }
            return Err(SetupError::Protocol(format!("OBS request failed: {msg}")));
        }
    }
    Ok(())
}

fn response_data(response: &Value) -> SetupResult<&Value> {
    response
        .get("responseData")
        .ok_or_else(|| SetupError::Protocol("missing responseData".into()))
}

// ─────────────────────────────────────────────────────────────────
// Scene / video queries
// ─────────────────────────────────────────────────────────────────

/// Get the current program scene name
pub fn get_current_scene(obs: &impl ObsRequester) -> SetupResult<String> {
    let response = obs.request("GetCurrentProgramScene", None)?;
    check_response(&response)?;

    response_data(&response)?
        .get("currentProgramSceneName")
        .and_then(|v| v.as_str())
        .map(|s| s.to_string())
        .ok_or_else(|| SetupError::Protocol("missing currentProgramSceneName".into()))
}

/// A scene item as listed by GetSceneItemList.
#[derive(Debug, Clone, Deserialize)]
pub struct SceneItem {
    #[serde(rename = "sourceName")]
    pub source_name: String,
    #[serde(rename = "sceneItemId")]
    pub scene_item_id: i64,
}

/// List the items of a scene
pub fn get_scene_item_list(obs: &impl ObsRequester, scene_name: &str) -> SetupResult<Vec<SceneItem>> {
    let response = obs.request(
        "GetSceneItemList",
        Some(json!({ "sceneName": scene_name })),
    )?;
    check_response(&response)?;

    let items = response_data(&response)?
        .get("sceneItems")
        .cloned()
        .ok_or_else(|| SetupError::Protocol("missing sceneItems".into()))?;
    serde_json::from_value(items).map_err(|e| SetupError::Protocol(format!("bad sceneItems: {e}")))
}

/// Current transform of a scene item. `width`/`height` are the post-scale
/// on-canvas dimensions reported by OBS and are read-only.
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct SceneItemTransform {
    #[serde(default)]
    pub position_x: f64,
    #[serde(default)]
    pub position_y: f64,
    #[serde(default)]
    pub scale_x: f64,
    #[serde(default)]
    pub scale_y: f64,
    #[serde(default)]
    pub alignment: i64,
    #[serde(default)]
    pub width: f64,
    #[serde(default)]
    pub height: f64,
    #[serde(default)]
    pub bounds_width: f64,
    #[serde(default)]
    pub bounds_height: f64,
}

/// Get a scene item's current transform
pub fn get_scene_item_transform(
    obs: &impl ObsRequester,
    scene_name: &str,
    scene_item_id: i64,
) -> SetupResult<SceneItemTransform> {
    let response = obs.request(
        "GetSceneItemTransform",
        Some(json!({ "sceneName": scene_name, "sceneItemId": scene_item_id })),
    )?;
    check_response(&response)?;

    let transform = response_data(&response)?
        .get("sceneItemTransform")
        .cloned()
        .ok_or_else(|| SetupError::Protocol("missing sceneItemTransform".into()))?;
    serde_json::from_value(transform)
        .map_err(|e| SetupError::Protocol(format!("bad sceneItemTransform: {e}")))
}

/// Apply a transform mutation to a scene item
pub fn set_scene_item_transform(
    obs: &impl ObsRequester,
    scene_name: &str,
    scene_item_id: i64,
    transform: Value,
) -> SetupResult<()> {
    let response = obs.request(
        "SetSceneItemTransform",
        Some(json!({
            "sceneName": scene_name,
            "sceneItemId": scene_item_id,
            "sceneItemTransform": transform,
        })),
    )?;
    check_response(&response)
}

/// Canvas (base) dimensions from GetVideoSettings
pub fn get_canvas_size(obs: &impl ObsRequester) -> SetupResult<(u32, u32)> {
    let response = obs.request("GetVideoSettings", None)?;
    check_response(&response)?;

    let data = response_data(&response)?;
    let width = data.get("baseWidth").and_then(|v| v.as_u64());
    let height = data.get("baseHeight").and_then(|v| v.as_u64());
    match (width, height) {
        (Some(w), Some(h)) => Ok((w as u32, h as u32)),
        _ => Err(SetupError::Protocol("missing baseWidth/baseHeight".into())),
    }
}

// ─────────────────────────────────────────────────────────────────
// Profile / encoder queries
// ─────────────────────────────────────────────────────────────────

/// Get the name of the currently selected profile
pub fn get_current_profile(obs: &impl ObsRequester) -> SetupResult<String> {
    let response = obs.request("GetProfileList", None)?;
    check_response(&response)?;

    response_data(&response)?
        .get("currentProfileName")
        .and_then(|v| v.as_str())
        .map(|s| s.to_string())
        .ok_or_else(|| SetupError::Protocol("missing currentProfileName".into()))
}

/// Read one profile parameter; `None` when the parameter is unset.
pub fn get_profile_parameter(
    obs: &impl ObsRequester,
    category: &str,
    name: &str,
) -> SetupResult<Option<String>> {
    let response = obs.request(
        "GetProfileParameter",
        Some(json!({ "parameterCategory": category, "parameterName": name })),
    )?;
    check_response(&response)?;

    Ok(response_data(&response)?
        .get("parameterValue")
        .and_then(|v| v.as_str())
        .map(|s| s.to_string()))
}

// ─────────────────────────────────────────────────────────────────
// Input (audio source) operations
// ─────────────────────────────────────────────────────────────────

/// An input as listed by GetInputList.
#[derive(Debug, Clone, Deserialize)]
pub struct Input {
    #[serde(rename = "inputName")]
    pub input_name: String,
    #[serde(rename = "inputKind", default)]
    pub input_kind: Option<String>,
}

/// List all inputs known to OBS
pub fn get_input_list(obs: &impl ObsRequester) -> SetupResult<Vec<Input>> {
    let response = obs.request("GetInputList", None)?;
    check_response(&response)?;

    let inputs = response_data(&response)?
        .get("inputs")
        .cloned()
        .ok_or_else(|| SetupError::Protocol("missing inputs".into()))?;
    serde_json::from_value(inputs).map_err(|e| SetupError::Protocol(format!("bad inputs: {e}")))
}

/// Create an input in a scene
pub fn create_input(
    obs: &impl ObsRequester,
    scene_name: &str,
    input_name: &str,
    input_kind: &str,
    input_settings: Value,
) -> SetupResult<()> {
    let response = obs.request(
        "CreateInput",
        Some(json!({
            "sceneName": scene_name,
            "inputName": input_name,
            "inputKind": input_kind,
            "inputSettings": input_settings,
        })),
    )?;
    check_response(&response)
}

/// Set input mute state
pub fn set_input_mute(obs: &impl ObsRequester, input_name: &str, muted: bool) -> SetupResult<()> {
    let response = obs.request(
        "SetInputMute",
        Some(json!({ "inputName": input_name, "inputMuted": muted })),
    )?;
    check_response(&response)
}

/// Set input volume (0.0-1.0 multiplier)
pub fn set_input_volume(obs: &impl ObsRequester, input_name: &str, volume_mul: f32) -> SetupResult<()> {
    let volume = volume_mul.clamp(0.0, 1.0);
    let response = obs.request(
        "SetInputVolume",
        Some(json!({ "inputName": input_name, "inputVolumeMul": volume })),
    )?;
    check_response(&response)
}

// ─────────────────────────────────────────────────────────────────
// Filter operations
// ─────────────────────────────────────────────────────────────────

/// A filter as listed by GetSourceFilterList.
#[derive(Debug, Clone, Deserialize)]
pub struct SourceFilter {
    #[serde(rename = "filterName")]
    pub filter_name: String,
    #[serde(rename = "filterKind", default)]
    pub filter_kind: Option<String>,
}

/// List the filters attached to a source
pub fn get_source_filter_list(
    obs: &impl ObsRequester,
    source_name: &str,
) -> SetupResult<Vec<SourceFilter>> {
    let response = obs.request(
        "GetSourceFilterList",
        Some(json!({ "sourceName": source_name })),
    )?;
    check_response(&response)?;

    let filters = response_data(&response)?
        .get("filters")
        .cloned()
        .ok_or_else(|| SetupError::Protocol("missing filters".into()))?;
    serde_json::from_value(filters).map_err(|e| SetupError::Protocol(format!("bad filters: {e}")))
}

/// Create a filter on a source with the given default settings
pub fn create_source_filter(
    obs: &impl ObsRequester,
    source_name: &str,
    filter_name: &str,
    filter_kind: &str,
    filter_settings: Value,
) -> SetupResult<()> {
    let response = obs.request(
        "CreateSourceFilter",
        Some(json!({
            "sourceName": source_name,
            "filterName": filter_name,
            "filterKind": filter_kind,
            "filterSettings": filter_settings,
        })),
    )?;
    check_response(&response)
}
