// src/routes/area_routes.rs

use axum::{
    extract::{Path, State},
    routing::{get, post},
    Json, Router,
};
use serde::Serialize;
use uuid::Uuid;

use crate::{
    error::ApiError,
    middleware::auth_context::AuthContext,
    models::{ApiOk, AppState, AreaRow},
};

struct DemoArea {
    name: &'static str,
    phone: &'static str,
    icon: &'static str,
    color: &'static str,
    description: &'static str,
}

const DEMO_AREAS: [DemoArea; 10] = [
    DemoArea { name: "Cardiología", phone: "+593991234567", icon: "favorite", color: "#f87171", description: "Área de cardiología" },
    DemoArea { name: "Emergencias", phone: "+593998765432", icon: "emergency", color: "#fbbf24", description: "Atención de emergencias" },
    DemoArea { name: "Pediatría", phone: "+593997654321", icon: "child_care", color: "#60a5fa", description: "Área pediátrica" },
    DemoArea { name: "Laboratorio", phone: "+593995432187", icon: "science", color: "#34d399", description: "Laboratorio clínico" },
    DemoArea { name: "Rayos X", phone: "+593994321876", icon: "radiology", color: "#a78bfa", description: "Servicio de rayos X" },
    DemoArea { name: "Farmacia", phone: "+593993218765", icon: "local_pharmacy", color: "#f472b6", description: "Farmacia interna" },
    DemoArea { name: "Ginecología", phone: "+593992187654", icon: "pregnant_woman", color: "#facc15", description: "Área de ginecología" },
    DemoArea { name: "Traumatología", phone: "+593991876543", icon: "accessible", color: "#38bdf8", description: "Traumatología y ortopedia" },
    DemoArea { name: "Oncología", phone: "+593991765432", icon: "healing", color: "#f472b6", description: "Área de oncología" },
    DemoArea { name: "UCI", phone: "+593991654321", icon: "monitor_heart", color: "#f87171", description: "Unidad de cuidados intensivos" },
];

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/areas", get(list_areas))
        .route("/areas/demo", post(load_demo_areas))
        .route("/areas/{area_id}/toggle", post(toggle_area))
}

pub async fn list_areas(
    State(state): State<AppState>,
    _auth: AuthContext,
) -> Result<Json<ApiOk<Vec<AreaRow>>>, ApiError> {
    let rows: Vec<AreaRow> = sqlx::query_as::<_, AreaRow>(
        r#"
        SELECT area_id, name, phone, icon, color, description, is_active, created_at, updated_at
        FROM area
        ORDER BY name
        "#,
    )
    .fetch_all(&state.db)
    .await
    .map_err(|e| ApiError::Internal(format!("db error: {e}")))?;

    Ok(Json(ApiOk { data: rows }))
}

#[derive(Debug, Serialize)]
pub struct DemoAreasResult {
    pub created: usize,
    pub updated: usize,
    pub message: String,
}

/// POST /api/v1/areas/demo
/// Creates the demo areas, or refreshes them when a name already exists.
pub async fn load_demo_areas(
    State(state): State<AppState>,
    auth: AuthContext,
) -> Result<Json<ApiOk<DemoAreasResult>>, ApiError> {
    let mut tx = state.db.begin().await
        .map_err(|e| ApiError::Internal(format!("db error: {e}")))?;

    let mut created = 0;
    for area in &DEMO_AREAS {
        let inserted: bool = sqlx::query_scalar(
            r#"
            INSERT INTO area (area_id, name, phone, icon, color, description, is_active, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, TRUE, now(), now())
            ON CONFLICT (name) DO UPDATE
            SET phone = EXCLUDED.phone,
                icon = EXCLUDED.icon,
                color = EXCLUDED.color,
                description = EXCLUDED.description,
                updated_at = now()
            RETURNING (xmax = 0) AS inserted
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(area.name)
        .bind(area.phone)
        .bind(area.icon)
        .bind(area.color)
        .bind(area.description)
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| ApiError::Internal(format!("db error: {e}")))?;

        if inserted {
            created += 1;
        }
    }

    tx.commit().await
        .map_err(|e| ApiError::Internal(format!("db error: {e}")))?;

    tracing::info!(user_id = %auth.user_id, created, "demo areas loaded");

    Ok(Json(ApiOk {
        data: DemoAreasResult {
            created,
            updated: DEMO_AREAS.len() - created,
            message: format!("{} áreas de ejemplo creadas o actualizadas.", DEMO_AREAS.len()),
        },
    }))
}

pub async fn toggle_area(
    State(state): State<AppState>,
    _auth: AuthContext,
    Path(area_id): Path<Uuid>,
) -> Result<Json<ApiOk<AreaRow>>, ApiError> {
    let row: AreaRow = sqlx::query_as::<_, AreaRow>(
        r#"
        UPDATE area
        SET is_active = NOT is_active,
            updated_at = now()
        WHERE area_id = $1
        RETURNING area_id, name, phone, icon, color, description, is_active, created_at, updated_at
        "#,
    )
    .bind(area_id)
    .fetch_optional(&state.db)
    .await
    .map_err(|e| ApiError::Internal(format!("db error: {e}")))?
    .ok_or_else(|| ApiError::not_found("area"))?;

    Ok(Json(ApiOk { data: row }))
}
