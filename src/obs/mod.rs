//! obs-websocket protocol client and session ownership.

pub mod client;
#[cfg(test)]
pub(crate) mod fake;
pub mod session;

pub use client::{ObsEndpoint, ObsRequester};
pub use session::ObsSession;
