use axum::Router;

use crate::state::SharedState;

pub mod docs;
pub mod health;
pub mod room;

/// Compose all route trees and attach the shared state.
pub fn router(state: SharedState) -> Router<()> {
    health::router()
        .merge(room::router())
        .merge(docs::router())
        .with_state(state)
}
