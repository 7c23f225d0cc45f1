//! The configurators: each one is a single request/response pass that
//! catches its own failures and reports a structured outcome.

pub mod audio;
pub mod encoder;
pub mod fonts;
pub mod layout;

pub use audio::{enable_defaults, AudioNames, AudioOutcome};
pub use encoder::{configure, EncoderOutcome, EncoderSettings};
pub use fonts::{install, locate, FontOutcome};
pub use layout::{configure_layout, LayoutOutcome, OverlayNames};
