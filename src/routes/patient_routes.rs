// src/routes/patient_routes.rs

use axum::{
    extract::{Multipart, Path, Query, State},
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{
    error::ApiError,
    importer::{read_sheet, reconcile_patients, ImportContext, PgImportStore, TemplateKind},
    middleware::auth_context::AuthContext,
    models::{ApiOk, AppState, PatientRow},
    routes::upload::{read_upload, template_download, ImportResult},
};

const MAX_MOBILE_LEN: usize = 20;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/patients", get(list_patients).post(create_patient))
        .route("/patients/import", post(import_patients))
        .route("/patients/template", get(download_template))
        .route("/patients/{patient_id}/toggle", post(toggle_patient))
}

#[derive(Debug, Deserialize)]
pub struct PatientListQuery {
    pub q: Option<String>,
    /// `activo` or `inactivo`; anything else lists both.
    pub estado: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct PatientTotals {
    pub total: i64,
    pub activos: i64,
    pub inactivos: i64,
}

#[derive(Debug, Serialize)]
pub struct PatientListData {
    pub patients: Vec<PatientRow>,
    pub totals: PatientTotals,
}

fn active_filter(estado: Option<&str>) -> Option<bool> {
    match estado.map(str::trim) {
        Some("activo") => Some(true),
        Some("inactivo") => Some(false),
        _ => None,
    }
}

fn search_pattern(q: Option<&str>) -> Option<String> {
    q.map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|s| format!("%{s}%"))
}

pub async fn list_patients(
    State(state): State<AppState>,
    _auth: AuthContext,
    Query(params): Query<PatientListQuery>,
) -> Result<Json<ApiOk<PatientListData>>, ApiError> {
    let like = search_pattern(params.q.as_deref());
    let active = active_filter(params.estado.as_deref());

    let patients: Vec<PatientRow> = sqlx::query_as::<_, PatientRow>(
        r#"
        SELECT patient_id, first_name, last_name, mobile, is_active, created_at, updated_at
        FROM patient
        WHERE ($1::text IS NULL
               OR first_name ILIKE $1
               OR last_name ILIKE $1
               OR mobile ILIKE $1)
          AND ($2::boolean IS NULL OR is_active = $2)
        ORDER BY last_name, first_name
        "#,
    )
    .bind(like)
    .bind(active)
    .fetch_all(&state.db)
    .await
    .map_err(|e| ApiError::Internal(format!("db error: {e}")))?;

    let (total, activos): (i64, i64) = sqlx::query_as(
        r#"
        SELECT COUNT(*), COUNT(*) FILTER (WHERE is_active)
        FROM patient
        "#,
    )
    .fetch_one(&state.db)
    .await
    .map_err(|e| ApiError::Internal(format!("db error: {e}")))?;

    Ok(Json(ApiOk {
        data: PatientListData {
            patients,
            totals: PatientTotals {
                total,
                activos,
                inactivos: total - activos,
            },
        },
    }))
}

#[derive(Debug, Deserialize)]
pub struct CreatePatientRequest {
    pub first_name: String,
    pub last_name: String,
    pub mobile: String,
}

pub async fn create_patient(
    State(state): State<AppState>,
    _auth: AuthContext,
    Json(req): Json<CreatePatientRequest>,
) -> Result<Json<ApiOk<PatientRow>>, ApiError> {
    let first_name = req.first_name.trim();
    let last_name = req.last_name.trim();
    let mobile = req.mobile.trim();

    if first_name.is_empty() || last_name.is_empty() || mobile.is_empty() {
        return Err(ApiError::validation("Nombre, apellido y móvil son obligatorios."));
    }
    if mobile.chars().count() > MAX_MOBILE_LEN {
        return Err(ApiError::validation(format!(
            "El móvil no puede superar {MAX_MOBILE_LEN} caracteres."
        )));
    }

    let row: PatientRow = sqlx::query_as::<_, PatientRow>(
        r#"
        INSERT INTO patient (patient_id, first_name, last_name, mobile, is_active, created_at, updated_at)
        VALUES ($1, $2, $3, $4, TRUE, now(), now())
        RETURNING patient_id, first_name, last_name, mobile, is_active, created_at, updated_at
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(first_name)
    .bind(last_name)
    .bind(mobile)
    .fetch_one(&state.db)
    .await
    .map_err(|e| ApiError::from_db_conflict(e, "Ya existe un paciente con ese móvil."))?;

    tracing::info!(patient_id = %row.patient_id, "patient created");
    Ok(Json(ApiOk { data: row }))
}

pub async fn toggle_patient(
    State(state): State<AppState>,
    _auth: AuthContext,
    Path(patient_id): Path<Uuid>,
) -> Result<Json<ApiOk<PatientRow>>, ApiError> {
    let row: PatientRow = sqlx::query_as::<_, PatientRow>(
        r#"
        UPDATE patient
        SET is_active = NOT is_active,
            updated_at = now()
        WHERE patient_id = $1
        RETURNING patient_id, first_name, last_name, mobile, is_active, created_at, updated_at
        "#,
    )
    .bind(patient_id)
    .fetch_optional(&state.db)
    .await
    .map_err(|e| ApiError::Internal(format!("db error: {e}")))?
    .ok_or_else(|| ApiError::not_found("patient"))?;

    Ok(Json(ApiOk { data: row }))
}

/// POST /api/v1/patients/import
/// Columns: Nombre, Apellido, Móvil. Row 1 is the header.
pub async fn import_patients(
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
    let outcome = reconcile_patients(&ctx, &store, sheet.data_rows()).await;

    Ok(Json(ApiOk { data: outcome.into() }))
}

pub async fn download_template(_auth: AuthContext) -> Result<impl IntoResponse, ApiError> {
    template_download(TemplateKind::Patients)
}
