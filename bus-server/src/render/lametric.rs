//! LaMetric Time rendering.
//!
//! The device polls for `{"frames": [...]}` and cycles through the frames
//! on its 37x8 display, so the text has to stay terse. Activate mode
//! returns the same frames plus an instruction telling the caller when to
//! hand the display back to the default clock face; producing that payload
//! is the extent of this module's involvement with the device.

use chrono::Duration;
use serde::Serialize;

use crate::arrivals::{Board, RouteArrivals};

use super::RenderArrivals;

/// LaMetric icon id for a bus glyph.
const BUS_ICON: &str = "i996";

/// Upper bound on frames sent to the device in one payload.
pub const MAX_FRAMES: usize = 10;

/// How long activate mode holds the display before reverting to the clock.
pub const REVERT_AFTER_SECS: i64 = 300;

/// One display frame.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Frame {
    pub text: String,
    pub icon: String,
}

/// The `/lametric` poll payload.
#[derive(Debug, Serialize)]
pub struct PollPayload {
    pub frames: Vec<Frame>,
}

/// The `/lametric/activate` payload: frames plus the revert instruction.
#[derive(Debug, Serialize)]
pub struct ActivatePayload {
    pub frames: Vec<Frame>,
    /// Seconds the bus display should stay active.
    pub revert_after_secs: i64,
    /// Absolute instant to fall back to the clock face.
    pub revert_at: String,
}

#[derive(Debug, Default)]
pub struct LaMetricRenderer;

impl LaMetricRenderer {
    /// Render the activate-mode payload: the frames shown for five minutes
    /// and the instant the device should revert to its clock face.
    pub fn render_activate(&self, board: &Board) -> ActivatePayload {
        let revert_at = board.computed_at + Duration::seconds(REVERT_AFTER_SECS);
        ActivatePayload {
            frames: frames(board),
            revert_after_secs: REVERT_AFTER_SECS,
            revert_at: revert_at.format("%Y-%m-%dT%H:%M:%S").to_string(),
        }
    }
}

impl RenderArrivals for LaMetricRenderer {
    type Payload = PollPayload;

    fn render(&self, board: &Board) -> PollPayload {
        PollPayload {
            frames: frames(board),
        }
    }
}

/// One frame per arrival; a route with nothing upcoming still gets a "--"
/// frame so the display says so instead of going blank.
fn frames(board: &Board) -> Vec<Frame> {
    let mut frames = Vec::new();
    for route in &board.routes {
        if route.arrivals.is_empty() {
            frames.push(route_frame(route, "--".to_string()));
            continue;
        }
        for arrival in &route.arrivals {
            frames.push(route_frame(route, format!("{}m", arrival.minutes)));
        }
    }
    frames.truncate(MAX_FRAMES);
    frames
}

fn route_frame(route: &RouteArrivals, suffix: String) -> Frame {
    Frame {
        text: format!("{} {}", route.display_name, suffix),
        icon: BUS_ICON.to_string(),
    }
}
