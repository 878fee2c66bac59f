//! Voice assistant rendering.
//!
//! Produces one natural-language sentence per route plus a structured
//! display card. Routes are ordered by their soonest arrival so the bus
//! the listener can still catch comes first.

use serde::Serialize;

use crate::arrivals::{Board, RouteArrivals};

use super::RenderArrivals;

/// Spoken when no configured route has an upcoming departure.
const NO_SERVICE: &str = "There is no upcoming bus service.";

/// The `/bus/speech` payload.
#[derive(Debug, Serialize)]
pub struct SpeechPayload {
    pub speech: String,
    pub display_items: Vec<DisplayItem>,
}

/// One display-card line.
#[derive(Debug, Serialize)]
pub struct DisplayItem {
    pub route: String,
    pub buses: Vec<DisplayBus>,
}

#[derive(Debug, Serialize)]
pub struct DisplayBus {
    pub time: String,
    pub minutes: i64,
}

#[derive(Debug, Default)]
pub struct SpeechRenderer;

impl RenderArrivals for SpeechRenderer {
    type Payload = SpeechPayload;

    fn render(&self, board: &Board) -> SpeechPayload {
        // Routes with nothing upcoming are silent; the rest speak in order
        // of their soonest bus.
        let mut with_service: Vec<&RouteArrivals> = board
            .routes
            .iter()
            .filter(|r| !r.arrivals.is_empty())
            .collect();
        with_service.sort_by_key(|r| r.arrivals[0].minutes);

        if with_service.is_empty() {
            return SpeechPayload {
                speech: NO_SERVICE.to_string(),
                display_items: Vec::new(),
            };
        }

        let speech = with_service
            .iter()
            .map(|r| route_sentence(r))
            .collect::<Vec<_>>()
            .join(" ");

        let display_items = with_service
            .iter()
            .map(|r| DisplayItem {
                route: r.display_name.clone(),
                buses: r
                    .arrivals
                    .iter()
                    .map(|a| DisplayBus {
                        time: a.scheduled.clone(),
                        minutes: a.minutes,
                    })
                    .collect(),
            })
            .collect();

        SpeechPayload {
            speech,
            display_items,
        }
    }
}

fn route_sentence(route: &RouteArrivals) -> String {
    let mut sentence = format!(
        "Next bus to {} {}",
        route.speech_name,
        minutes_phrase(route.arrivals[0].minutes)
    );
    for later in &route.arrivals[1..] {
        sentence.push_str(&format!(", then {}", minutes_phrase(later.minutes)));
    }
    sentence.push('.');
    sentence
}

fn minutes_phrase(minutes: i64) -> String {
    match minutes {
        0 => "now".to_string(),
        1 => "in 1 minute".to_string(),
        n => format!("in {n} minutes"),
    }
}
