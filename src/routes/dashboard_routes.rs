use axum::{Json, Router, extract::State, routing::get};
use chrono::NaiveDate;
use serde::Serialize;

use crate::error::ApiError;
use crate::middleware::auth_context::AuthContext;
use crate::models::{ApiOk, AppState, NotificationStatus};

#[derive(Debug, Serialize, sqlx::FromRow)]
pub struct DashboardData {
    pub patients_total: i64,
    pub patients_active: i64,
    pub patients_inactive: i64,
    pub appointments_today: i64,
    pub notifications_pending: i64,
}

pub fn router() -> Router<AppState> {
    Router::new().route("/dashboard", get(dashboard))
}

#[derive(Debug, Serialize)]
pub struct DashboardResponse {
    pub today: NaiveDate,
    #[serde(flatten)]
    pub counts: DashboardData,
}

pub async fn dashboard(
    State(state): State<AppState>,
    auth: AuthContext,
) -> Result<Json<ApiOk<DashboardResponse>>, ApiError> {
    let today = chrono::Utc::now().date_naive();

    let counts: DashboardData = sqlx::query_as::<_, DashboardData>(
        r#"
        SELECT
            (SELECT COUNT(*) FROM patient) AS patients_total,
            (SELECT COUNT(*) FROM patient WHERE is_active) AS patients_active,
            (SELECT COUNT(*) FROM patient WHERE NOT is_active) AS patients_inactive,
            (SELECT COUNT(*) FROM appointment WHERE appointment_date = $1) AS appointments_today,
            (SELECT COUNT(*) FROM notification WHERE status = $2) AS notifications_pending
        "#,
    )
    .bind(today)
    .bind(NotificationStatus::Pending.as_str())
    .fetch_one(&state.db)
    .await
    .map_err(|e| ApiError::Internal(format!("db error: {e}")))?;

    tracing::debug!(user_id = %auth.user_id, "dashboard loaded");

    Ok(Json(ApiOk {
        data: DashboardResponse { today, counts },
    }))
}
