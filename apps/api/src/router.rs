use axum::{routing::get, Router};

use scheduling_cell::{scheduling_routes, SchedulingState};

pub fn create_router(state: SchedulingState) -> Router {
    Router::new()
        .route("/", get(|| async { "Carebook scheduling API is running!" }))
        .nest("/scheduling", scheduling_routes(state))
}
