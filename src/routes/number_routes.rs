// src/routes/number_routes.rs
//
// Outbound sender numbers used as the origin of notifications.

use axum::{
    extract::{Path, State},
    routing::{get, post},
    Json, Router,
};
use serde::Deserialize;
use uuid::Uuid;

use crate::{
    error::ApiError,
    middleware::auth_context::AuthContext,
    models::{ApiOk, AppState, NotificationNumberRow, OkResponse},
};

const MAX_NUMBER_LEN: usize = 20;
const DUPLICATE_NUMBER: &str = "Ya existe un número de notificación igual.";

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/numbers", get(list_numbers).post(create_number))
        .route(
            "/numbers/{notification_number_id}",
            get(get_number).put(update_number).delete(delete_number),
        )
        .route("/numbers/{notification_number_id}/toggle", post(toggle_number))
}

#[derive(Debug, Deserialize)]
pub struct NumberRequest {
    pub number: String,
    pub area_id: Option<Uuid>,
    pub description: Option<String>,
}

impl NumberRequest {
    fn validated_number(&self) -> Result<&str, ApiError> {
        let number = self.number.trim();
        if number.is_empty() {
            return Err(ApiError::validation("El número es obligatorio."));
        }
        if number.chars().count() > MAX_NUMBER_LEN {
            return Err(ApiError::validation(format!(
                "El número no puede superar {MAX_NUMBER_LEN} caracteres."
            )));
        }
        Ok(number)
    }

    fn description(&self) -> &str {
        self.description.as_deref().map(str::trim).unwrap_or("")
    }
}

pub async fn list_numbers(
    State(state): State<AppState>,
    _auth: AuthContext,
) -> Result<Json<ApiOk<Vec<NotificationNumberRow>>>, ApiError> {
    let rows: Vec<NotificationNumberRow> = sqlx::query_as::<_, NotificationNumberRow>(
        r#"
        SELECT notification_number_id, area_id, number, description, is_active, created_at, updated_at
        FROM notification_number
        ORDER BY number
        "#,
    )
    .fetch_all(&state.db)
    .await
    .map_err(|e| ApiError::Internal(format!("db error: {e}")))?;

    Ok(Json(ApiOk { data: rows }))
}

pub async fn get_number(
    State(state): State<AppState>,
    _auth: AuthContext,
    Path(notification_number_id): Path<Uuid>,
) -> Result<Json<ApiOk<NotificationNumberRow>>, ApiError> {
    let row: NotificationNumberRow = sqlx::query_as::<_, NotificationNumberRow>(
        r#"
        SELECT notification_number_id, area_id, number, description, is_active, created_at, updated_at
        FROM notification_number
        WHERE notification_number_id = $1
        "#,
    )
    .bind(notification_number_id)
    .fetch_optional(&state.db)
    .await
    .map_err(|e| ApiError::Internal(format!("db error: {e}")))?
    .ok_or_else(|| ApiError::not_found("notification number"))?;

    Ok(Json(ApiOk { data: row }))
}

pub async fn create_number(
    State(state): State<AppState>,
    _auth: AuthContext,
    Json(req): Json<NumberRequest>,
) -> Result<Json<ApiOk<NotificationNumberRow>>, ApiError> {
    let number = req.validated_number()?;

    let row: NotificationNumberRow = sqlx::query_as::<_, NotificationNumberRow>(
        r#"
        INSERT INTO notification_number (notification_number_id, area_id, number, description, is_active, created_at, updated_at)
        VALUES ($1, $2, $3, $4, TRUE, now(), now())
        RETURNING notification_number_id, area_id, number, description, is_active, created_at, updated_at
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(req.area_id)
    .bind(number)
    .bind(req.description())
    .fetch_one(&state.db)
    .await
    .map_err(|e| ApiError::from_db_conflict(e, DUPLICATE_NUMBER))?;

    Ok(Json(ApiOk { data: row }))
}

pub async fn update_number(
    State(state): State<AppState>,
    _auth: AuthContext,
    Path(notification_number_id): Path<Uuid>,
    Json(req): Json<NumberRequest>,
) -> Result<Json<ApiOk<NotificationNumberRow>>, ApiError> {
    let number = req.validated_number()?;

    let row: NotificationNumberRow = sqlx::query_as::<_, NotificationNumberRow>(
        r#"
        UPDATE notification_number
        SET area_id = $1,
            number = $2,
            description = $3,
            updated_at = now()
        WHERE notification_number_id = $4
        RETURNING notification_number_id, area_id, number, description, is_active, created_at, updated_at
        "#,
    )
    .bind(req.area_id)
    .bind(number)
    .bind(req.description())
    .bind(notification_number_id)
    .fetch_optional(&state.db)
    .await
    .map_err(|e| ApiError::from_db_conflict(e, DUPLICATE_NUMBER))?
    .ok_or_else(|| ApiError::not_found("notification number"))?;

    Ok(Json(ApiOk { data: row }))
}

pub async fn delete_number(
    State(state): State<AppState>,
    _auth: AuthContext,
    Path(notification_number_id): Path<Uuid>,
) -> Result<Json<OkResponse>, ApiError> {
    let res = sqlx::query(
        r#"
        DELETE FROM notification_number
        WHERE notification_number_id = $1
        "#,
    )
    .bind(notification_number_id)
    .execute(&state.db)
    .await
    .map_err(|e| ApiError::Internal(format!("db error: {e}")))?;

    if res.rows_affected() == 0 {
        return Err(ApiError::not_found("notification number"));
    }

    Ok(Json(OkResponse::ok()))
}

pub async fn toggle_number(
    State(state): State<AppState>,
    _auth: AuthContext,
    Path(notification_number_id): Path<Uuid>,
) -> Result<Json<ApiOk<NotificationNumberRow>>, ApiError> {
    let row: NotificationNumberRow = sqlx::query_as::<_, NotificationNumberRow>(
        r#"
        UPDATE notification_number
        SET is_active = NOT is_active,
            updated_at = now()
        WHERE notification_number_id = $1
        RETURNING notification_number_id, area_id, number, description, is_active, created_at, updated_at
        "#,
    )
    .bind(notification_number_id)
    .fetch_optional(&state.db)
    .await
    .map_err(|e| ApiError::Internal(format!("db error: {e}")))?
    .ok_or_else(|| ApiError::not_found("notification number"))?;

    Ok(Json(ApiOk { data: row }))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn req(number: &str) -> NumberRequest {
        NumberRequest {
            number: number.to_string(),
            area_id: None,
            description: Some("  Recepción ".into()),
        }
    }

    #[test]
    fn number_is_trimmed_and_bounded() {
        assert_eq!(req(" +593990000000 ").validated_number().ok(), Some("+593990000000"));
        assert!(req("   ").validated_number().is_err());
        assert!(req("+5939900000000000000000").validated_number().is_err());
        assert_eq!(req("1").description(), "Recepción");
    }
}
