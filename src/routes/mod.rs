pub mod events;

use axum::Router;
use axum::routing::post;

use crate::state::SharedState;

pub fn event_routes() -> Router<SharedState> {
    Router::new().route("/events", post(events::receive))
}
