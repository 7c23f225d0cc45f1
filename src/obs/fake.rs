//! Scripted stand-in for the OBS request seam, used by configurator tests.

use std::collections::HashMap;
use std::sync::Mutex;

use serde_json::{json, Value};

use super::client::ObsRequester;
use crate::error::{SetupError, SetupResult};

type Handler = Box<dyn Fn(Option<&Value>) -> SetupResult<Value> + Send>;

/// Records every request and answers from per-request-type handlers.
/// Requests without a handler succeed with an empty `responseData`, which
/// matches how mutation requests answer on a live OBS.
#[derive(Default)]
pub struct FakeObs {
    handlers: Mutex<HashMap<String, Handler>>,
    calls: Mutex<Vec<(String, Option<Value>)>>,
}

/// Build a successful response envelope around `data`.
pub fn ok_response(data: Value) -> Value {
    json!({
        "requestStatus": { "result": true, "code": 100 },
        "responseData": data,
    })
}

impl FakeObs {
    pub fn new() -> Self {
        Self::default()
    }

    /// Answer `request_type` with a dynamic handler.
    pub fn on<F>(&self, request_type: &str, handler: F)
    where
        F: Fn(Option<&Value>) -> SetupResult<Value> + Send + 'static,
    {
        self.handlers
            .lock()
            .unwrap()
            .insert(request_type.to_string(), Box::new(handler));
    }

    /// Answer `request_type` with a fixed successful `responseData`.
    pub fn respond(&self, request_type: &str, data: Value) {
        self.on(request_type, move |_| Ok(ok_response(data.clone())));
    }

    /// Answer `request_type` with a fixed error.
    pub fn fail(&self, request_type: &str, message: &str) {
        let message = message.to_string();
        self.on(request_type, move |_| {
            Err(SetupError::Protocol(message.clone()))
        });
    }

    /// Number of requests issued for `request_type`.
    pub fn calls_of(&self, request_type: &str) -> usize {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .filter(|(t, _)| t == request_type)
            .count()
    }

    /// Payloads of every request issued for `request_type`.
    pub fn payloads_of(&self, request_type: &str) -> Vec<Value> {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .filter(|(t, _)| t == request_type)
            .filter_map(|(_, d)| d.clone())
            .collect()
    }
}

impl ObsRequester for FakeObs {
    fn request(&self, request_type: &str, request_data: Option<Value>) -> SetupResult<Value> {
        self.calls
            .lock()
            .unwrap()
            .push((request_type.to_string(), request_data.clone()));

        let handlers = self.handlers.lock().unwrap();
        match handlers.get(request_type) {
            Some(handler) => handler(request_data.as_ref()),
            None => Ok(ok_response(json!({}))),
        }
    }
}
