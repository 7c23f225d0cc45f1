//! Overlay scene layout pass.
//!
//! Repositions the four named overlay sources against fixed anchor points
//! derived from the canvas dimensions, scaling each proportionally to a
//! 1080p reference design. A missing source or a per-item failure is
//! skipped; it never aborts the remaining placements.

use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::{debug, info, warn};

use crate::error::SetupResult;
use crate::obs::client::{self, ObsRequester, SceneItem};

/// Overlay height at the 1080p reference design.
const REFERENCE_OVERLAY_HEIGHT: f64 = 52.0;
const REFERENCE_CANVAS_HEIGHT: f64 = 1080.0;

/// The leaderboard overlay asset is 567x376; its horizontal offset keeps it
/// clear of the motion graphic anchored at x = 0. Revisit if the asset's
/// dimensions change.
const LEADERBOARD_ASPECT: f64 = 567.0 / 376.0;
const LEADERBOARD_MARGIN: f64 = 5.0;

/// Height assumed for a source that reports zero height, so scaling still
/// produces a finite factor.
const ZERO_HEIGHT_FALLBACK: f64 = 100.0;

/// OBS alignment bitmask values.
mod align {
    pub const LEFT: i64 = 1;
    pub const RIGHT: i64 = 2;
    pub const TOP: i64 = 4;
    pub const BOTTOM: i64 = 8;

    pub const TOP_LEFT: i64 = TOP | LEFT;
    pub const TOP_RIGHT: i64 = TOP | RIGHT;
    pub const BOTTOM_LEFT: i64 = BOTTOM | LEFT;
}

/// Simple-output encoder identifier reported when the profile parameter
/// query fails.
const DEFAULT_ENCODER_ID: &str = "obs_x264";

/// Names of the overlay sources to lay out. Defaults are the historical
/// source names; hosts may override them through the engine config.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct OverlayNames {
    pub motion_graphic: String,
    pub leaderboard: String,
    pub device: String,
    pub spend_ticker: String,
}

impl Default for OverlayNames {
    fn default() -> Self {
        Self {
            motion_graphic: "动图".to_string(),
            leaderboard: "榜一".to_string(),
            device: "设备".to_string(),
            spend_ticker: "消费".to_string(),
        }
    }
}

/// Result of a layout pass, surfaced to the host.
#[derive(Debug, Clone, Serialize)]
pub struct LayoutOutcome {
    pub success: bool,
    pub profile_name: String,
    pub encoder_name: String,
    pub message: String,
}

impl LayoutOutcome {
    fn failure(message: String) -> Self {
        Self {
            success: false,
            profile_name: String::new(),
            encoder_name: String::new(),
            message,
        }
    }
}

/// Target anchor for one overlay source.
struct Placement<'a> {
    name: &'a str,
    position: (f64, f64),
    alignment: i64,
}

/// Scale factor that brings a source of `current_height` to `target_height`.
fn scale_factor(target_height: f64, current_height: f64) -> f64 {
    if current_height > 0.0 {
        target_height / current_height
    } else {
        target_height / ZERO_HEIGHT_FALLBACK
    }
}

/// Overlay target height for a canvas.
fn target_overlay_height(canvas_height: u32) -> f64 {
    canvas_height as f64 * REFERENCE_OVERLAY_HEIGHT / REFERENCE_CANVAS_HEIGHT
}

/// Horizontal anchor of the leaderboard overlay.
fn leaderboard_offset(target_height: f64) -> f64 {
    target_height * LEADERBOARD_ASPECT + LEADERBOARD_MARGIN
}

/// Run the layout pass against the current program scene.
pub fn configure_layout(obs: &impl ObsRequester, names: &OverlayNames) -> LayoutOutcome {
    let profile_name = match client::get_current_profile(obs) {
        Ok(name) => name,
        Err(e) => return LayoutOutcome::failure(format!("failed to read current profile: {e}")),
    };

    // Best-effort: an unset or unreadable parameter means the simple-output
    // default encoder.
    let encoder_name = client::get_profile_parameter(obs, "SimpleOutput", "StreamEncoder")
        .ok()
        .flatten()
        .unwrap_or_else(|| DEFAULT_ENCODER_ID.to_string());

    let (canvas_w, canvas_h) = match client::get_canvas_size(obs) {
        Ok(size) => size,
        Err(e) => return LayoutOutcome::failure(format!("failed to read canvas settings: {e}")),
    };

    // Portrait canvases use a different overlay convention; leave them alone.
    if canvas_w < canvas_h {
        info!(canvas_w, canvas_h, "portrait canvas, overlay layout unchanged");
        return LayoutOutcome {
            success: true,
            profile_name,
            encoder_name,
            message: format!(
                "portrait canvas {canvas_w}x{canvas_h}: overlay layout left unchanged"
            ),
        };
    }

    // Past this point the pass only repositions sources; a scene read or
    // item listing failure skips placement but is not a failed pass.
    let scene_name = match client::get_current_scene(obs) {
        Ok(name) => name,
        Err(e) => {
            warn!(error = %e, "could not read current scene");
            return LayoutOutcome {
                success: true,
                profile_name,
                encoder_name,
                message: format!("could not read current scene, overlay placement skipped: {e}"),
            };
        }
    };

    let items = match client::get_scene_item_list(obs, &scene_name) {
        Ok(items) => items,
        Err(e) => {
            warn!(scene = %scene_name, error = %e, "could not list scene items");
            return LayoutOutcome {
                success: true,
                profile_name,
                encoder_name,
                message: format!("could not list scene items, overlay placement skipped: {e}"),
            };
        }
    };

    let target_height = target_overlay_height(canvas_h);
    let placements = [
        Placement {
            name: &names.motion_graphic,
            position: (0.0, 0.0),
            alignment: align::TOP_LEFT,
        },
        Placement {
            name: &names.leaderboard,
            position: (leaderboard_offset(target_height), 0.0),
            alignment: align::TOP_LEFT,
        },
        Placement {
            name: &names.device,
            position: (canvas_w as f64, 0.0),
            alignment: align::TOP_RIGHT,
        },
        Placement {
            name: &names.spend_ticker,
            position: (0.0, canvas_h as f64),
            alignment: align::BOTTOM_LEFT,
        },
    ];

    let mut placed = 0;
    for placement in &placements {
        let Some(item) = items.iter().find(|i| i.source_name == placement.name) else {
            debug!(source = placement.name, "overlay source not present, skipping");
            continue;
        };
        match place_item(obs, &scene_name, item, placement, target_height) {
            Ok(()) => placed += 1,
            Err(e) => warn!(source = placement.name, error = %e, "overlay placement failed"),
        }
    }

    info!(scene = %scene_name, placed, "overlay layout pass complete");
    LayoutOutcome {
        success: true,
        profile_name,
        encoder_name,
        message: format!("placed {placed} of {} overlay sources", placements.len()),
    }
}

/// Apply position, scale, alignment, and clamped bounds to one scene item.
fn place_item(
    obs: &impl ObsRequester,
    scene_name: &str,
    item: &SceneItem,
    placement: &Placement<'_>,
    target_height: f64,
) -> SetupResult<()> {
    let current = client::get_scene_item_transform(obs, scene_name, item.scene_item_id)?;

    let factor = scale_factor(target_height, current.height);
    let update = json!({
        "positionX": placement.position.0,
        "positionY": placement.position.1,
        "scaleX": current.scale_x * factor,
        "scaleY": current.scale_y * factor,
        "alignment": placement.alignment,
        // The remote API rejects zero-sized bounds.
        "boundsWidth": current.bounds_width.max(1.0),
        "boundsHeight": current.bounds_height.max(1.0),
    });

    client::set_scene_item_transform(obs, scene_name, item.scene_item_id, update)
}
