use axum::{routing::get, Router};

use crate::state::AppState;

pub mod booking;
pub mod health;
pub mod invoice;

pub fn app_router() -> Router<AppState> {
    Router::new()
        .route("/health", get(health::health))
        .nest("/booking", booking::router())
        .nest("/invoice", invoice::router())
}
