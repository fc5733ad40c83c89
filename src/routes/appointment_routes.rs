// src/routes/appointment_routes.rs

use axum::{
    extract::{Multipart, Path, Query, State},
    response::IntoResponse,
    routing::{get, patch, post},
    Json, Router,
};
use chrono::NaiveDate;
use serde::Deserialize;
use uuid::Uuid;

use crate::{
    error::ApiError,
    importer::{
        read_sheet, reconcile_appointments,
        row_parser::{parse_date, parse_time},
        Cell, ImportContext, PgImportStore, TemplateKind,
    },
    middleware::auth_context::AuthContext,
    models::{ApiOk, AppState, AppointmentRow, AppointmentStatus},
    routes::upload::{read_upload, template_download, ImportResult},
};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/appointments", get(list_appointments).post(create_appointment))
        .route("/appointments/import", post(import_appointments))
        .route("/appointments/template", get(download_template))
        .route("/appointments/{appointment_id}", patch(update_status))
}

const APPOINTMENT_COLUMNS: &str = r#"
    a.appointment_id, a.patient_id, p.first_name, p.last_name, p.mobile,
    a.appointment_date, a.appointment_time, a.status, a.created_at, a.updated_at
"#;

/// Strict status check for manual edits. Imports coerce instead.
fn parse_status(code: &str) -> Result<AppointmentStatus, ApiError> {
    AppointmentStatus::parse(code.trim()).ok_or_else(|| {
        let known: Vec<&str> = AppointmentStatus::ALL.iter().map(|s| s.as_str()).collect();
        ApiError::validation(format!("Estado inválido. Valores permitidos: {}", known.join(", ")))
    })
}

async fn fetch_appointment(state: &AppState, appointment_id: Uuid) -> Result<AppointmentRow, ApiError> {
    let sql = format!(
        r#"
        SELECT {APPOINTMENT_COLUMNS}
        FROM appointment a
        JOIN patient p ON p.patient_id = a.patient_id
        WHERE a.appointment_id = $1
        "#
    );

    sqlx::query_as::<_, AppointmentRow>(&sql)
        .bind(appointment_id)
        .fetch_optional(&state.db)
        .await
        .map_err(|e| ApiError::Internal(format!("db error: {e}")))?
        .ok_or_else(|| ApiError::not_found("appointment"))
}

#[derive(Debug, Deserialize)]
pub struct AppointmentListQuery {
    pub date: Option<NaiveDate>,
    pub estado: Option<String>,
    pub patient_id: Option<Uuid>,
}

pub async fn list_appointments(
    State(state): State<AppState>,
    _auth: AuthContext,
    Query(params): Query<AppointmentListQuery>,
) -> Result<Json<ApiOk<Vec<AppointmentRow>>>, ApiError> {
    let status = match params.estado.as_deref().map(str::trim) {
        Some(code) if !code.is_empty() => Some(parse_status(code)?.as_str()),
        _ => None,
    };

    let sql = format!(
        r#"
        SELECT {APPOINTMENT_COLUMNS}
        FROM appointment a
        JOIN patient p ON p.patient_id = a.patient_id
        WHERE ($1::date IS NULL OR a.appointment_date = $1)
          AND ($2::text IS NULL OR a.status = $2)
          AND ($3::uuid IS NULL OR a.patient_id = $3)
        ORDER BY a.appointment_date, a.appointment_time
        "#
    );

    let rows: Vec<AppointmentRow> = sqlx::query_as::<_, AppointmentRow>(&sql)
        .bind(params.date)
        .bind(status)
        .bind(params.patient_id)
        .fetch_all(&state.db)
        .await
        .map_err(|e| ApiError::Internal(format!("db error: {e}")))?;

    Ok(Json(ApiOk { data: rows }))
}

#[derive(Debug, Deserialize)]
pub struct CreateAppointmentRequest {
    pub patient_id: Uuid,
    /// YYYY-MM-DD or DD/MM/YYYY
    pub date: String,
    /// HH:MM or HH:MM:SS
    pub time: String,
    pub estado: Option<String>,
}

pub async fn create_appointment(
    State(state): State<AppState>,
    _auth: AuthContext,
    Json(req): Json<CreateAppointmentRequest>,
) -> Result<Json<ApiOk<AppointmentRow>>, ApiError> {
    let date = parse_date(&Cell::text(req.date))?;
    let time = parse_time(&Cell::text(req.time))?;
    let status = match req.estado.as_deref() {
        Some(code) => parse_status(code)?,
        None => AppointmentStatus::default(),
    };

    let patient_exists: bool = sqlx::query_scalar(
        r#"
        SELECT EXISTS (SELECT 1 FROM patient WHERE patient_id = $1)
        "#,
    )
    .bind(req.patient_id)
    .fetch_one(&state.db)
    .await
    .map_err(|e| ApiError::Internal(format!("db error: {e}")))?;

    if !patient_exists {
        return Err(ApiError::not_found("patient"));
    }

    let appointment_id: Uuid = sqlx::query_scalar(
        r#"
        INSERT INTO appointment (appointment_id, patient_id, appointment_date, appointment_time, status, created_at, updated_at)
        VALUES ($1, $2, $3, $4, $5, now(), now())
        RETURNING appointment_id
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(req.patient_id)
    .bind(date)
    .bind(time)
    .bind(status.as_str())
    .fetch_one(&state.db)
    .await
    .map_err(|e| {
        ApiError::from_db_conflict(e, "El paciente ya tiene una cita en esa fecha y hora.")
    })?;

    tracing::info!(%appointment_id, patient_id = %req.patient_id, "appointment created");
    Ok(Json(ApiOk {
        data: fetch_appointment(&state, appointment_id).await?,
    }))
}

#[derive(Debug, Deserialize)]
pub struct UpdateStatusRequest {
    pub estado: String,
}

pub async fn update_status(
    State(state): State<AppState>,
    _auth: AuthContext,
    Path(appointment_id): Path<Uuid>,
    Json(req): Json<UpdateStatusRequest>,
) -> Result<Json<ApiOk<AppointmentRow>>, ApiError> {
    let status = parse_status(&req.estado)?;

    let res = sqlx::query(
        r#"
        UPDATE appointment
        SET status = $1,
            updated_at = now()
        WHERE appointment_id = $2
        "#,
    )
    .bind(status.as_str())
    .bind(appointment_id)
    .execute(&state.db)
    .await
    .map_err(|e| ApiError::Internal(format!("db error: {e}")))?;

    if res.rows_affected() == 0 {
        return Err(ApiError::not_found("appointment"));
    }

    Ok(Json(ApiOk {
        data: fetch_appointment(&state, appointment_id).await?,
    }))
}

/// POST /api/v1/appointments/import
/// Columns: Móvil, Fecha, Hora, Estado (optional). The patient must already
/// exist.
pub async fn import_appointments(
    State(state): State<AppState>,
    auth: AuthContext,
    multipart: Multipart,
) -> Result<Json<ApiOk<ImportResult>>, ApiError> {
    let upload = read_upload(multipart, state.max_upload_bytes).await?;
    let sheet = read_sheet(&upload.file_name, &upload.bytes)?;

    let ctx = ImportContext {
        requested_by: auth.user_id,
        file_name: upload.file_name,
    };
    let store = PgImportStore::new(state.db.clone());
    let outcome = reconcile_appointments(&ctx, &store, sheet.data_rows()).await;

    Ok(Json(ApiOk { data: outcome.into() }))
}

pub async fn download_template(_auth: AuthContext) -> Result<impl IntoResponse, ApiError> {
    template_download(TemplateKind::Appointments)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn manual_status_must_be_a_known_code() {
        assert_eq!(parse_status(" atendida ").ok(), Some(AppointmentStatus::Attended));
        assert!(parse_status("xyz").is_err());
        assert!(parse_status("Confirmada").is_err());
    }
}
