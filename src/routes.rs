// routes.rs
use axum::routing::{get, post, put};
use axum::Router;
use tower_http::cors::CorsLayer;

use crate::handlers;
use crate::services::VotingService;

pub fn create_routes(service: VotingService) -> Router {
    Router::new()
        .route("/api/polls", get(handlers::list_polls).post(handlers::create_poll))
        .route(
            "/api/polls/{id}",
            get(handlers::get_poll)
                .patch(handlers::update_poll)
                .delete(handlers::delete_poll),
        )
        .route("/api/polls/{id}/activate", post(handlers::activate_poll))
        .route("/api/polls/{id}/deactivate", post(handlers::deactivate_poll))
        .route("/api/polls/{id}/vote", post(handlers::vote))
        .route("/api/polls/{id}/results", get(handlers::results))
        .route(
            "/api/polls/{id}/bookmark",
            put(handlers::add_bookmark).delete(handlers::remove_bookmark),
        )
        .route("/api/bookmarks", get(handlers::list_bookmarks))
        .layer(CorsLayer::permissive())
        .with_state(service)
}
