// src/routes/notification_routes.rs

use axum::{
    extract::{Path, Query, State},
    routing::{get, post},
    Json, Router,
};
use chrono::{DateTime, Utc};
use serde::Deserialize;
use serde_json::json;
use uuid::Uuid;

use crate::{
    error::ApiError,
    middleware::auth_context::AuthContext,
    models::{ApiOk, AppState, NotificationRow, NotificationStatus, OkResponse},
    notifier::{
        default_reminder_time, ensure_not_in_past, render_message, DeliveryReceipt, OutboundMessage,
        SendError,
    },
    routes::message_routes::{load_message, load_placeholders},
};

const NOTIFICATION_COLUMNS: &str = r#"
    notification_id, appointment_id, notification_number_id, message_id,
    recipient_number, origin_number, scheduled_at, sent_at, status,
    provider_response, error_message, created_at, updated_at
"#;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/notifications", get(list_notifications).post(create_notification))
        .route(
            "/notifications/{notification_id}",
            get(get_notification)
                .put(update_notification)
                .delete(delete_notification),
        )
        .route("/notifications/{notification_id}/send", post(send_notification))
}

fn parse_status(code: &str) -> Result<NotificationStatus, ApiError> {
    NotificationStatus::parse(code.trim()).ok_or_else(|| {
        let known: Vec<&str> = NotificationStatus::ALL.iter().map(|s| s.as_str()).collect();
        ApiError::validation(format!("Estado inválido. Valores permitidos: {}", known.join(", ")))
    })
}

fn non_blank(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|s| !s.is_empty())
}

async fn load_notification(state: &AppState, notification_id: Uuid) -> Result<NotificationRow, ApiError> {
    let sql = format!(
        r#"
        SELECT {NOTIFICATION_COLUMNS}
        FROM notification
        WHERE notification_id = $1
        "#
    );

    sqlx::query_as::<_, NotificationRow>(&sql)
        .bind(notification_id)
        .fetch_optional(&state.db)
        .await
        .map_err(|e| ApiError::Internal(format!("db error: {e}")))?
        .ok_or_else(|| ApiError::not_found("notification"))
}

/// Sender number of a notification number, if it exists.
async fn load_origin_number(state: &AppState, notification_number_id: Uuid) -> Result<String, ApiError> {
    sqlx::query_scalar::<_, String>(
        r#"
        SELECT number
        FROM notification_number
        WHERE notification_number_id = $1
        "#,
    )
    .bind(notification_number_id)
    .fetch_optional(&state.db)
    .await
    .map_err(|e| ApiError::Internal(format!("db error: {e}")))?
    .ok_or_else(|| ApiError::not_found("notification number"))
}

#[derive(Debug, Deserialize)]
pub struct NotificationListQuery {
    pub estado: Option<String>,
}

pub async fn list_notifications(
    State(state): State<AppState>,
    _auth: AuthContext,
    Query(params): Query<NotificationListQuery>,
) -> Result<Json<ApiOk<Vec<NotificationRow>>>, ApiError> {
    let status = match non_blank(params.estado.as_deref()) {
        Some(code) => Some(parse_status(code)?.as_str()),
        None => None,
    };

    let sql = format!(
        r#"
        SELECT {NOTIFICATION_COLUMNS}
        FROM notification
        WHERE ($1::text IS NULL OR status = $1)
        ORDER BY scheduled_at DESC
        "#
    );

    let rows: Vec<NotificationRow> = sqlx::query_as::<_, NotificationRow>(&sql)
        .bind(status)
        .fetch_all(&state.db)
        .await
        .map_err(|e| ApiError::Internal(format!("db error: {e}")))?;

    Ok(Json(ApiOk { data: rows }))
}

pub async fn get_notification(
    State(state): State<AppState>,
    _auth: AuthContext,
    Path(notification_id): Path<Uuid>,
) -> Result<Json<ApiOk<NotificationRow>>, ApiError> {
    Ok(Json(ApiOk {
        data: load_notification(&state, notification_id).await?,
    }))
}

#[derive(Debug, Deserialize)]
pub struct CreateNotificationRequest {
    pub appointment_id: Uuid,
    pub notification_number_id: Option<Uuid>,
    pub message_id: Option<Uuid>,
    pub recipient_number: Option<String>,
    pub origin_number: Option<String>,
    pub scheduled_at: Option<DateTime<Utc>>,
}

/// POST /api/v1/notifications
/// Recipient defaults to the patient's mobile, origin to the chosen number,
/// and the schedule to the reminder lead time before the appointment.
pub async fn create_notification(
    State(state): State<AppState>,
    _auth: AuthContext,
    Json(req): Json<CreateNotificationRequest>,
) -> Result<Json<ApiOk<NotificationRow>>, ApiError> {
    let appointment = load_placeholders(&state, req.appointment_id).await?;

    let number_origin = match req.notification_number_id {
        Some(id) => Some(load_origin_number(&state, id).await?),
        None => None,
    };
    if let Some(message_id) = req.message_id {
        load_message(&state, message_id).await?;
    }

    let recipient = non_blank(req.recipient_number.as_deref())
        .unwrap_or(appointment.mobile.as_str())
        .to_string();
    let origin = non_blank(req.origin_number.as_deref())
        .map(str::to_string)
        .or(number_origin)
        .unwrap_or_default();
    let scheduled_at = req.scheduled_at.unwrap_or_else(|| {
        default_reminder_time(
            appointment.appointment_date,
            appointment.appointment_time,
            state.reminder_lead_hours,
        )
    });

    ensure_not_in_past(scheduled_at, Utc::now()).map_err(ApiError::validation)?;

    let sql = format!(
        r#"
        INSERT INTO notification
            (notification_id, appointment_id, notification_number_id, message_id,
             recipient_number, origin_number, scheduled_at, status, created_at, updated_at)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, now(), now())
        RETURNING {NOTIFICATION_COLUMNS}
        "#
    );

    let row: NotificationRow = sqlx::query_as::<_, NotificationRow>(&sql)
        .bind(Uuid::new_v4())
        .bind(req.appointment_id)
        .bind(req.notification_number_id)
        .bind(req.message_id)
        .bind(&recipient)
        .bind(&origin)
        .bind(scheduled_at)
        .bind(NotificationStatus::Pending.as_str())
        .fetch_one(&state.db)
        .await
        .map_err(|e| ApiError::Internal(format!("db error: {e}")))?;

    tracing::info!(
        notification_id = %row.notification_id,
        appointment_id = %row.appointment_id,
        scheduled_at = %row.scheduled_at,
        "notification scheduled"
    );
    Ok(Json(ApiOk { data: row }))
}

#[derive(Debug, Deserialize)]
pub struct UpdateNotificationRequest {
    pub notification_number_id: Option<Uuid>,
    pub message_id: Option<Uuid>,
    pub recipient_number: String,
    pub origin_number: Option<String>,
    pub scheduled_at: DateTime<Utc>,
    pub estado: Option<String>,
}

pub async fn update_notification(
    State(state): State<AppState>,
    _auth: AuthContext,
    Path(notification_id): Path<Uuid>,
    Json(req): Json<UpdateNotificationRequest>,
) -> Result<Json<ApiOk<NotificationRow>>, ApiError> {
    let existing = load_notification(&state, notification_id).await?;

    let recipient = non_blank(Some(req.recipient_number.as_str()))
        .ok_or_else(|| ApiError::validation("El número de destinatario es obligatorio."))?;
    let status = match non_blank(req.estado.as_deref()) {
        Some(code) => parse_status(code)?.as_str(),
        None => existing.status.as_str(),
    };
    ensure_not_in_past(req.scheduled_at, Utc::now()).map_err(ApiError::validation)?;

    if let Some(id) = req.notification_number_id {
        load_origin_number(&state, id).await?;
    }
    if let Some(id) = req.message_id {
        load_message(&state, id).await?;
    }

    let sql = format!(
        r#"
        UPDATE notification
        SET notification_number_id = $1,
            message_id = $2,
            recipient_number = $3,
            origin_number = $4,
            scheduled_at = $5,
            status = $6,
            updated_at = now()
        WHERE notification_id = $7
        RETURNING {NOTIFICATION_COLUMNS}
        "#
    );

    let row: NotificationRow = sqlx::query_as::<_, NotificationRow>(&sql)
        .bind(req.notification_number_id)
        .bind(req.message_id)
        .bind(recipient)
        .bind(non_blank(req.origin_number.as_deref()).unwrap_or(""))
        .bind(req.scheduled_at)
        .bind(status)
        .bind(notification_id)
        .fetch_one(&state.db)
        .await
        .map_err(|e| ApiError::Internal(format!("db error: {e}")))?;

    Ok(Json(ApiOk { data: row }))
}

pub async fn delete_notification(
    State(state): State<AppState>,
    _auth: AuthContext,
    Path(notification_id): Path<Uuid>,
) -> Result<Json<OkResponse>, ApiError> {
    let res = sqlx::query(
        r#"
        DELETE FROM notification
        WHERE notification_id = $1
        "#,
    )
    .bind(notification_id)
    .execute(&state.db)
    .await
    .map_err(|e| ApiError::Internal(format!("db error: {e}")))?;

    if res.rows_affected() == 0 {
        return Err(ApiError::not_found("notification"));
    }

    Ok(Json(OkResponse::ok()))
}

/// What a send attempt writes back to the notification.
#[derive(Debug, PartialEq)]
struct DeliveryUpdate {
    status: NotificationStatus,
    sent: bool,
    provider_response: serde_json::Value,
    error_message: String,
}

impl DeliveryUpdate {
    fn from_result(result: Result<DeliveryReceipt, SendError>) -> Self {
        match result {
            Ok(receipt) => DeliveryUpdate {
                status: NotificationStatus::Sent,
                sent: true,
                provider_response: receipt.provider_response,
                error_message: String::new(),
            },
            Err(e) => DeliveryUpdate::failed(e.to_string()),
        }
    }

    fn failed(error_message: String) -> Self {
        DeliveryUpdate {
            status: NotificationStatus::Failed,
            sent: false,
            provider_response: json!({}),
            error_message,
        }
    }
}

/// POST /api/v1/notifications/{notification_id}/send
/// A failed attempt is not an HTTP error: the notification comes back with
/// status `fallida` and the reason in `error_message`.
pub async fn send_notification(
    State(state): State<AppState>,
    auth: AuthContext,
    Path(notification_id): Path<Uuid>,
) -> Result<Json<ApiOk<NotificationRow>>, ApiError> {
    let notification = load_notification(&state, notification_id).await?;

    let status = NotificationStatus::parse(&notification.status).unwrap_or_default();
    if !status.can_send() {
        return Err(ApiError::Conflict(
            "NOT_SENDABLE",
            "Solo se pueden enviar notificaciones pendientes o fallidas.".into(),
        ));
    }

    let update = match notification.message_id {
        None => DeliveryUpdate::failed("La notificación no tiene mensaje asignado.".into()),
        Some(message_id) => {
            let message = load_message(&state, message_id).await?;
            let placeholders = load_placeholders(&state, notification.appointment_id).await?;
            let outbound = OutboundMessage {
                notification_id,
                to: notification.recipient_number.clone(),
                from: notification.origin_number.clone(),
                body: render_message(&message.content, &placeholders.context()),
            };
            DeliveryUpdate::from_result(state.sender.send(&outbound).await)
        }
    };

    let sql = format!(
        r#"
        UPDATE notification
        SET status = $1,
            sent_at = CASE WHEN $2 THEN now() ELSE sent_at END,
            provider_response = $3,
            error_message = $4,
            updated_at = now()
        WHERE notification_id = $5
        RETURNING {NOTIFICATION_COLUMNS}
        "#
    );

    let row: NotificationRow = sqlx::query_as::<_, NotificationRow>(&sql)
        .bind(update.status.as_str())
        .bind(update.sent)
        .bind(&update.provider_response)
        .bind(&update.error_message)
        .bind(notification_id)
        .fetch_one(&state.db)
        .await
        .map_err(|e| ApiError::Internal(format!("db error: {e}")))?;

    if update.sent {
        tracing::info!(%notification_id, user_id = %auth.user_id, "notification sent");
    } else {
        tracing::warn!(%notification_id, error = %update.error_message, "notification send failed");
    }

    Ok(Json(ApiOk { data: row }))
}
