//! Response formatters.
//!
//! Each consumer of the arrival board gets its own presentation adapter:
//! plain JSON, a voice-assistant speech payload, and the LaMetric frame
//! format. All of them are pure functions from a [`Board`] to a
//! serializable payload, behind one trait so the calculator stays
//! consumer-agnostic.

mod json;
mod lametric;
mod speech;

use serde::Serialize;

use crate::arrivals::Board;

pub use json::{BusPayload, JsonRenderer, RoutePayload};
pub use lametric::{
    ActivatePayload, Frame, LaMetricRenderer, MAX_FRAMES, PollPayload, REVERT_AFTER_SECS,
};
pub use speech::{DisplayBus, DisplayItem, SpeechPayload, SpeechRenderer};

/// A presentation adapter for one consumer.
pub trait RenderArrivals {
    type Payload: Serialize;

    fn render(&self, board: &Board) -> Self::Payload;
}
