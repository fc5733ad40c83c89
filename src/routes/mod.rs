use crate::models::AppState;
use axum::Router;

pub mod appointment_routes;
pub mod area_routes;
pub mod auth_routes;
pub mod dashboard_routes;
pub mod message_routes;
pub mod notification_routes;
pub mod number_routes;
pub mod patient_routes;
pub mod upload;

pub fn router(state: AppState) -> Router {
    Router::new()
        .nest("/api/v1/auth", auth_routes::router())
        .nest("/api/v1", dashboard_routes::router())
        .nest("/api/v1", patient_routes::router())
        .nest("/api/v1", appointment_routes::router())
        .nest("/api/v1", area_routes::router())
        .nest("/api/v1", number_routes::router())
        .nest("/api/v1", message_routes::router())
        .nest("/api/v1", notification_routes::router())
        .with_state(state)
}
