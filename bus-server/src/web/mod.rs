//! HTTP layer: routing, handlers, and application state.

mod routes;
mod state;

pub use routes::{AppError, create_router};
pub use state::AppState;
