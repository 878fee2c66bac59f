//! Plain JSON rendering of the board.

use std::collections::BTreeMap;

use serde::Serialize;

use crate::arrivals::{Arrival, Board};

use super::RenderArrivals;

/// The `/bus` payload: computed-at timestamp plus one entry per route.
#[derive(Debug, Serialize)]
pub struct BusPayload {
    pub updated_at: String,
    pub routes: BTreeMap<String, RoutePayload>,
}

#[derive(Debug, Serialize)]
pub struct RoutePayload {
    pub display_name: String,
    /// Quick view: minutes until each departure.
    pub minutes: Vec<i64>,
    /// Full arrival records.
    pub arrivals: Vec<Arrival>,
}

/// Direct structural serialization of the arrival lists.
#[derive(Debug, Default)]
pub struct JsonRenderer;

impl RenderArrivals for JsonRenderer {
    type Payload = BusPayload;

    fn render(&self, board: &Board) -> BusPayload {
        let routes = board
            .routes
            .iter()
            .map(|route| {
                (
                    route.key.clone(),
                    RoutePayload {
                        display_name: route.display_name.clone(),
                        minutes: route.arrivals.iter().map(|a| a.minutes).collect(),
                        arrivals: route.arrivals.clone(),
                    },
                )
            })
            .collect();

        BusPayload {
            updated_at: board.computed_at.format("%Y-%m-%dT%H:%M:%S").to_string(),
            routes,
        }
    }
}
