// src/routes/message_routes.rs
//
// Message templates used for notifications.

use axum::{
    extract::{Path, Query, State},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{
    error::ApiError,
    middleware::auth_context::AuthContext,
    models::{ApiOk, AppState, MessageKind, MessageTemplateRow, OkResponse},
    notifier::{render_message, MessageContext},
};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/messages", get(list_messages).post(create_message))
        .route(
            "/messages/{message_id}",
            get(get_message).put(update_message).delete(delete_message),
        )
        .route("/messages/{message_id}/toggle", post(toggle_message))
        .route("/messages/{message_id}/render", post(render_for_appointment))
}

fn parse_kind(code: Option<&str>) -> Result<MessageKind, ApiError> {
    match code.map(str::trim).filter(|s| !s.is_empty()) {
        None => Ok(MessageKind::default()),
        Some(code) => MessageKind::parse(code).ok_or_else(|| {
            let known: Vec<&str> = MessageKind::ALL.iter().map(|k| k.as_str()).collect();
            ApiError::validation(format!("Tipo inválido. Valores permitidos: {}", known.join(", ")))
        }),
    }
}

pub(crate) async fn load_message(
    state: &AppState,
    message_id: Uuid,
) -> Result<MessageTemplateRow, ApiError> {
    sqlx::query_as::<_, MessageTemplateRow>(
        r#"
        SELECT message_id, title, content, kind, is_active, created_at, updated_at
        FROM message_template
        WHERE message_id = $1
        "#,
    )
    .bind(message_id)
    .fetch_optional(&state.db)
    .await
    .map_err(|e| ApiError::Internal(format!("db error: {e}")))?
    .ok_or_else(|| ApiError::not_found("message"))
}

#[derive(Debug, Deserialize)]
pub struct MessageListQuery {
    pub kind: Option<String>,
}

pub async fn list_messages(
    State(state): State<AppState>,
    _auth: AuthContext,
    Query(params): Query<MessageListQuery>,
) -> Result<Json<ApiOk<Vec<MessageTemplateRow>>>, ApiError> {
    let kind = match params.kind.as_deref().map(str::trim) {
        Some(code) if !code.is_empty() => Some(parse_kind(Some(code))?.as_str()),
        _ => None,
    };

    let rows: Vec<MessageTemplateRow> = sqlx::query_as::<_, MessageTemplateRow>(
        r#"
        SELECT message_id, title, content, kind, is_active, created_at, updated_at
        FROM message_template
        WHERE ($1::text IS NULL OR kind = $1)
        ORDER BY title
        "#,
    )
    .bind(kind)
    .fetch_all(&state.db)
    .await
    .map_err(|e| ApiError::Internal(format!("db error: {e}")))?;

    Ok(Json(ApiOk { data: rows }))
}

pub async fn get_message(
    State(state): State<AppState>,
    _auth: AuthContext,
    Path(message_id): Path<Uuid>,
) -> Result<Json<ApiOk<MessageTemplateRow>>, ApiError> {
    Ok(Json(ApiOk {
        data: load_message(&state, message_id).await?,
    }))
}

#[derive(Debug, Deserialize)]
pub struct MessageRequest {
    pub title: String,
    pub content: String,
    pub kind: Option<String>,
}

impl MessageRequest {
    fn validate(&self) -> Result<(&str, &str, MessageKind), ApiError> {
        let title = self.title.trim();
        let content = self.content.trim();
        if title.is_empty() || content.is_empty() {
            return Err(ApiError::validation("Título y contenido son obligatorios."));
        }
        Ok((title, content, parse_kind(self.kind.as_deref())?))
    }
}

pub async fn create_message(
    State(state): State<AppState>,
    _auth: AuthContext,
    Json(req): Json<MessageRequest>,
) -> Result<Json<ApiOk<MessageTemplateRow>>, ApiError> {
    let (title, content, kind) = req.validate()?;

    let row: MessageTemplateRow = sqlx::query_as::<_, MessageTemplateRow>(
        r#"
        INSERT INTO message_template (message_id, title, content, kind, is_active, created_at, updated_at)
        VALUES ($1, $2, $3, $4, TRUE, now(), now())
        RETURNING message_id, title, content, kind, is_active, created_at, updated_at
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(title)
    .bind(content)
    .bind(kind.as_str())
    .fetch_one(&state.db)
    .await
    .map_err(|e| ApiError::Internal(format!("db error: {e}")))?;

    Ok(Json(ApiOk { data: row }))
}

pub async fn update_message(
    State(state): State<AppState>,
    _auth: AuthContext,
    Path(message_id): Path<Uuid>,
    Json(req): Json<MessageRequest>,
) -> Result<Json<ApiOk<MessageTemplateRow>>, ApiError> {
    let (title, content, kind) = req.validate()?;

    let row: MessageTemplateRow = sqlx::query_as::<_, MessageTemplateRow>(
        r#"
        UPDATE message_template
        SET title = $1,
            content = $2,
            kind = $3,
            updated_at = now()
        WHERE message_id = $4
        RETURNING message_id, title, content, kind, is_active, created_at, updated_at
        "#,
    )
    .bind(title)
    .bind(content)
    .bind(kind.as_str())
    .bind(message_id)
    .fetch_optional(&state.db)
    .await
    .map_err(|e| ApiError::Internal(format!("db error: {e}")))?
    .ok_or_else(|| ApiError::not_found("message"))?;

    Ok(Json(ApiOk { data: row }))
}

pub async fn delete_message(
    State(state): State<AppState>,
    _auth: AuthContext,
    Path(message_id): Path<Uuid>,
) -> Result<Json<OkResponse>, ApiError> {
    let res = sqlx::query(
        r#"
        DELETE FROM message_template
        WHERE message_id = $1
        "#,
    )
    .bind(message_id)
    .execute(&state.db)
    .await
    .map_err(|e| ApiError::Internal(format!("db error: {e}")))?;

    if res.rows_affected() == 0 {
        return Err(ApiError::not_found("message"));
    }

    Ok(Json(OkResponse::ok()))
}

pub async fn toggle_message(
    State(state): State<AppState>,
    _auth: AuthContext,
    Path(message_id): Path<Uuid>,
) -> Result<Json<ApiOk<MessageTemplateRow>>, ApiError> {
    let row: MessageTemplateRow = sqlx::query_as::<_, MessageTemplateRow>(
        r#"
        UPDATE message_template
        SET is_active = NOT is_active,
            updated_at = now()
        WHERE message_id = $1
        RETURNING message_id, title, content, kind, is_active, created_at, updated_at
        "#,
    )
    .bind(message_id)
    .fetch_optional(&state.db)
    .await
    .map_err(|e| ApiError::Internal(format!("db error: {e}")))?
    .ok_or_else(|| ApiError::not_found("message"))?;

    Ok(Json(ApiOk { data: row }))
}

#[derive(Debug, Deserialize)]
pub struct RenderRequest {
    pub appointment_id: Uuid,
}

#[derive(Debug, Serialize)]
pub struct RenderedMessage {
    pub message_id: Uuid,
    pub appointment_id: Uuid,
    pub text: String,
}

#[derive(Debug, sqlx::FromRow)]
pub(crate) struct AppointmentPlaceholders {
    pub first_name: String,
    pub last_name: String,
    pub mobile: String,
    pub appointment_date: chrono::NaiveDate,
    pub appointment_time: chrono::NaiveTime,
}

impl AppointmentPlaceholders {
    pub fn context(&self) -> MessageContext<'_> {
        MessageContext {
            first_name: &self.first_name,
            last_name: &self.last_name,
            date: self.appointment_date,
            time: self.appointment_time,
        }
    }
}

pub(crate) async fn load_placeholders(
    state: &AppState,
    appointment_id: Uuid,
) -> Result<AppointmentPlaceholders, ApiError> {
    sqlx::query_as::<_, AppointmentPlaceholders>(
        r#"
        SELECT p.first_name, p.last_name, p.mobile, a.appointment_date, a.appointment_time
        FROM appointment a
        JOIN patient p ON p.patient_id = a.patient_id
        WHERE a.appointment_id = $1
        "#,
    )
    .bind(appointment_id)
    .fetch_optional(&state.db)
    .await
    .map_err(|e| ApiError::Internal(format!("db error: {e}")))?
    .ok_or_else(|| ApiError::not_found("appointment"))
}

/// POST /api/v1/messages/{message_id}/render
/// Preview of the template filled in with one appointment's data.
pub async fn render_for_appointment(
    State(state): State<AppState>,
    _auth: AuthContext,
    Path(message_id): Path<Uuid>,
    Json(req): Json<RenderRequest>,
) -> Result<Json<ApiOk<RenderedMessage>>, ApiError> {
    let message = load_message(&state, message_id).await?;
    let placeholders = load_placeholders(&state, req.appointment_id).await?;

    Ok(Json(ApiOk {
        data: RenderedMessage {
            message_id,
            appointment_id: req.appointment_id,
            text: render_message(&message.content, &placeholders.context()),
        },
    }))
}
