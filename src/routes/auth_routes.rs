use axum::{
    Json, Router,
    extract::State,
    routing::{get, post},
};
use chrono::{Duration, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{Postgres, Transaction};
use uuid::Uuid;

use crate::{
    auth::{generate_token, hash_password, hash_token, validate_new_password, verify_password},
    error::ApiError,
    mailer::{OutgoingEmail, activation_email, password_reset_email},
    middleware::auth_context::AuthContext,
    models::*,
};

const REMEMBER_ME_TTL_HOURS: i64 = 24 * 7;

/// Stored in account_token.purpose.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TokenPurpose {
    Activation = 1,
    PasswordReset = 2,
}

impl TokenPurpose {
    fn code(self) -> i16 {
        self as i16
    }
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/register", post(register))
        .route("/login", post(login))
        .route("/me", get(me))
        .route("/logout", post(logout))
        .route("/change_password", post(change_password))
        .route("/password_reset", post(request_password_reset))
        .route("/password_reset/confirm", post(confirm_password_reset))
        .route("/activate", post(activate_account))
}

fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

fn is_plausible_email(email: &str) -> bool {
    match email.split_once('@') {
        Some((local, domain)) => !local.is_empty() && domain.contains('.') && !domain.starts_with('.'),
        None => false,
    }
}

/// Issues a single-use token and stores its hash. Returns the raw token.
async fn issue_account_token(
    tx: &mut Transaction<'_, Postgres>,
    user_id: Uuid,
    purpose: TokenPurpose,
    ttl_hours: i64,
) -> Result<String, ApiError> {
    let token = generate_token();

    sqlx::query(
        r#"
        INSERT INTO account_token (account_token_id, user_id, token_hash, purpose, expires_at)
        VALUES ($1, $2, $3, $4, $5)
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(user_id)
    .bind(hash_token(&token))
    .bind(purpose.code())
    .bind(Utc::now() + Duration::hours(ttl_hours))
    .execute(&mut **tx)
    .await
    .map_err(|e| ApiError::Internal(format!("db error: {e}")))?;

    Ok(token)
}

/// Marks a live token as used and returns its owner.
async fn consume_account_token(
    tx: &mut Transaction<'_, Postgres>,
    token: &str,
    purpose: TokenPurpose,
) -> Result<Uuid, ApiError> {
    let token = token.trim();
    if token.is_empty() {
        return Err(ApiError::invalid_token());
    }

    sqlx::query_scalar::<_, Uuid>(
        r#"
        UPDATE account_token
        SET used_at = now()
        WHERE token_hash = $1
          AND purpose = $2
          AND used_at IS NULL
          AND expires_at > now()
        RETURNING user_id
        "#,
    )
    .bind(hash_token(token))
    .bind(purpose.code())
    .fetch_optional(&mut **tx)
    .await
    .map_err(|e| ApiError::Internal(format!("db error: {e}")))?
    .ok_or_else(ApiError::invalid_token)
}

async fn send_mail(state: &AppState, email: OutgoingEmail) {
    let to = email.to.clone();
    if let Err(e) = state.mailer.send(email).await {
        tracing::warn!(to = %to, error = %e, "failed to send account email");
    }
}

// =========================
// Registration
// =========================

#[derive(Debug, Deserialize)]
pub struct RegisterRequest {
    pub email: String,
    pub password: String,
    pub password_confirm: String,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct RegisterData {
    pub user: UserProfile,
    pub requires_activation: bool,
    pub message: String,
}

pub async fn register(
    State(state): State<AppState>,
    Json(req): Json<RegisterRequest>,
) -> Result<Json<ApiOk<RegisterData>>, ApiError> {
    let email = normalize_email(&req.email);
    if email.is_empty() {
        return Err(ApiError::validation("El correo es obligatorio."));
    }
    if !is_plausible_email(&email) {
        return Err(ApiError::validation("El correo no es válido."));
    }
    if req.password != req.password_confirm {
        return Err(ApiError::validation("Las contraseñas no coinciden."));
    }
    validate_new_password(&req.password)?;

    let password_hash = hash_password(&req.password)?;
    let first_name = req.first_name.as_deref().map(str::trim).unwrap_or("");
    let last_name = req.last_name.as_deref().map(str::trim).unwrap_or("");
    let requires_activation = state.require_account_activation;

    let mut tx = state.db.begin().await
        .map_err(|e| ApiError::Internal(format!("db error: {e}")))?;

    let user: UserRow = sqlx::query_as::<_, UserRow>(
        r#"
        INSERT INTO staff_user (user_id, username, email, first_name, last_name, password_hash, is_active)
        VALUES ($1, $2, $2, $3, $4, $5, $6)
        RETURNING user_id, username, email, first_name, last_name, password_hash, is_active
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(&email)
    .bind(first_name)
    .bind(last_name)
    .bind(password_hash)
    .bind(!requires_activation)
    .fetch_one(&mut *tx)
    .await
    .map_err(|e| ApiError::from_db_conflict(e, "Este correo ya está registrado."))?;

    let activation_token = if requires_activation {
        Some(
            issue_account_token(&mut tx, user.user_id, TokenPurpose::Activation, state.account_token_ttl_hours)
                .await?,
        )
    } else {
        None
    };

    tx.commit().await
        .map_err(|e| ApiError::Internal(format!("db error: {e}")))?;

    tracing::info!(user_id = %user.user_id, requires_activation, "staff account registered");

    let message = match activation_token {
        Some(token) => {
            send_mail(&state, activation_email(&state.public_base_url, &user.email, &token)).await;
            "Cuenta creada. Revisa tu correo para activarla.".to_string()
        }
        None => "Cuenta creada. Ya puedes iniciar sesión.".to_string(),
    };

    Ok(Json(ApiOk {
        data: RegisterData {
            user: user.into(),
            requires_activation,
            message,
        },
    }))
}

#[derive(Debug, Deserialize)]
pub struct ActivateRequest {
    pub token: String,
}

pub async fn activate_account(
    State(state): State<AppState>,
    Json(req): Json<ActivateRequest>,
) -> Result<Json<OkResponse>, ApiError> {
    let mut tx = state.db.begin().await
        .map_err(|e| ApiError::Internal(format!("db error: {e}")))?;

    let user_id = consume_account_token(&mut tx, &req.token, TokenPurpose::Activation).await?;

    sqlx::query(
        r#"
        UPDATE staff_user
        SET is_active = true
        WHERE user_id = $1
        "#,
    )
    .bind(user_id)
    .execute(&mut *tx)
    .await
    .map_err(|e| ApiError::Internal(format!("db error: {e}")))?;

    tx.commit().await
        .map_err(|e| ApiError::Internal(format!("db error: {e}")))?;

    tracing::info!(%user_id, "staff account activated");
    Ok(Json(OkResponse::ok()))
}

// =========================
// Sessions
// =========================

pub async fn login(
    State(state): State<AppState>,
    Json(req): Json<LoginRequest>,
) -> Result<Json<LoginResponse>, ApiError> {
    let identifier = req.identifier.trim();
    if identifier.is_empty() || req.password.is_empty() {
        return Err(ApiError::validation("Usuario/correo y contraseña son obligatorios."));
    }

    // Username first, email as fallback
    let user: UserRow = sqlx::query_as::<_, UserRow>(
        r#"
        SELECT user_id, username, email, first_name, last_name, password_hash, is_active
        FROM staff_user
        WHERE username = $1
           OR lower(email) = lower($1)
        ORDER BY (username = $1) DESC
        LIMIT 1
        "#,
    )
    .bind(identifier)
    .fetch_optional(&state.db)
    .await
    .map_err(|e| ApiError::Internal(format!("db error: {e}")))?
    .ok_or_else(ApiError::invalid_credentials)?;

    if !verify_password(&req.password, &user.password_hash) {
        return Err(ApiError::invalid_credentials());
    }

    if !user.is_active {
        return Err(ApiError::Forbidden(
            "ACCOUNT_INACTIVE",
            "La cuenta no está activa. Revisa tu correo para activarla.".into(),
        ));
    }

    let access_token = generate_token();
    let ttl_hours = if req.remember_me.unwrap_or(false) {
        REMEMBER_ME_TTL_HOURS
    } else {
        state.session_ttl_hours
    };
    let expires_at = Utc::now() + Duration::hours(ttl_hours);

    let session: SessionTokenRow = sqlx::query_as::<_, SessionTokenRow>(
        r#"
        INSERT INTO session_token
            (session_token_id, user_id, session_token_hash, device_name, expires_at)
        VALUES
            ($1, $2, $3, $4, $5)
        RETURNING session_token_id, expires_at
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(user.user_id)
    .bind(hash_token(&access_token))
    .bind(req.device_name.as_deref())
    .bind(expires_at)
    .fetch_one(&state.db)
    .await
    .map_err(|e| ApiError::Internal(format!("db error: {e}")))?;

    sqlx::query(
        r#"
        UPDATE staff_user
        SET last_login_at = now()
        WHERE user_id = $1
        "#,
    )
    .bind(user.user_id)
    .execute(&state.db)
    .await
    .map_err(|e| ApiError::Internal(format!("db error: {e}")))?;

    let profile = UserProfile::from(user);
    let message = format!("¡Bienvenido, {}!", profile.greeting_name());
    tracing::info!(user_id = %profile.user_id, session_token_id = %session.session_token_id, "login");

    Ok(Json(LoginResponse {
        data: LoginResponseData {
            access_token,
            expires_at: session.expires_at,
            user: profile,
            message,
        },
    }))
}

pub async fn me(
    State(state): State<AppState>,
    auth: AuthContext,
) -> Result<Json<MeResponse>, ApiError> {
    let user: UserRow = sqlx::query_as::<_, UserRow>(
        r#"
        SELECT user_id, username, email, first_name, last_name, password_hash, is_active
        FROM staff_user
        WHERE user_id = $1
          AND is_active = true
        "#,
    )
    .bind(auth.user_id)
    .fetch_optional(&state.db)
    .await
    .map_err(|e| ApiError::Internal(format!("db error: {e}")))?
    .ok_or_else(ApiError::session_expired)?;

    let session: SessionTokenRow = sqlx::query_as::<_, SessionTokenRow>(
        r#"
        SELECT session_token_id, expires_at
        FROM session_token
        WHERE session_token_id = $1
          AND user_id = $2
          AND revoked_at IS NULL
          AND expires_at > now()
        "#,
    )
    .bind(auth.session_token_id)
    .bind(auth.user_id)
    .fetch_optional(&state.db)
    .await
    .map_err(|e| ApiError::Internal(format!("db error: {e}")))?
    .ok_or_else(ApiError::session_expired)?;

    Ok(Json(MeResponse {
        data: MeResponseData {
            user: user.into(),
            session: SessionInfo {
                session_token_id: session.session_token_id,
                expires_at: session.expires_at,
            },
        },
    }))
}

pub async fn logout(
    State(state): State<AppState>,
    auth: AuthContext,
) -> Result<Json<OkResponse>, ApiError> {
    let rows = sqlx::query(
        r#"
        UPDATE session_token
        SET revoked_at = now()
        WHERE session_token_id = $1
          AND user_id = $2
          AND revoked_at IS NULL
        "#,
    )
    .bind(auth.session_token_id)
    .bind(auth.user_id)
    .execute(&state.db)
    .await
    .map_err(|e| ApiError::Internal(format!("db error: {e}")))?;

    if rows.rows_affected() == 0 {
        return Err(ApiError::session_expired());
    }

    Ok(Json(OkResponse::ok()))
}

// =========================
// Password management
// =========================

#[derive(Debug, Deserialize)]
pub struct ChangePasswordRequest {
    pub old_password: String,
    pub new_password: String,
}

pub async fn change_password(
    State(state): State<AppState>,
    auth: AuthContext,
    Json(req): Json<ChangePasswordRequest>,
) -> Result<Json<OkResponse>, ApiError> {
    if req.old_password.is_empty() || req.new_password.is_empty() {
        return Err(ApiError::validation("La contraseña actual y la nueva son obligatorias."));
    }
    validate_new_password(&req.new_password)?;

    let current_hash: String = sqlx::query_scalar(
        r#"
        SELECT password_hash
        FROM staff_user
        WHERE user_id = $1
          AND is_active = true
        "#,
    )
    .bind(auth.user_id)
    .fetch_optional(&state.db)
    .await
    .map_err(|e| ApiError::Internal(format!("db error: {e}")))?
    .ok_or_else(ApiError::session_expired)?;

    if !verify_password(&req.old_password, &current_hash) {
        return Err(ApiError::invalid_credentials());
    }

    let new_hash = hash_password(&req.new_password)?;

    let mut tx = state.db.begin().await
        .map_err(|e| ApiError::Internal(format!("db error: {e}")))?;

    sqlx::query(
        r#"
        UPDATE staff_user
        SET password_hash = $1
        WHERE user_id = $2
        "#,
    )
    .bind(new_hash)
    .bind(auth.user_id)
    .execute(&mut *tx)
    .await
    .map_err(|e| ApiError::Internal(format!("db error: {e}")))?;

    // Every other session of this user ends; the current one stays.
    sqlx::query(
        r#"
        UPDATE session_token
        SET revoked_at = now()
        WHERE user_id = $1
          AND revoked_at IS NULL
          AND expires_at > now()
          AND session_token_id <> $2
        "#,
    )
    .bind(auth.user_id)
    .bind(auth.session_token_id)
    .execute(&mut *tx)
    .await
    .map_err(|e| ApiError::Internal(format!("db error: {e}")))?;

    tx.commit().await
        .map_err(|e| ApiError::Internal(format!("db error: {e}")))?;

    Ok(Json(OkResponse::ok()))
}

#[derive(Debug, Deserialize)]
pub struct PasswordResetRequest {
    pub email: String,
}

/// POST /api/v1/auth/password_reset
/// Always answers ok so the endpoint cannot be used to enumerate accounts.
pub async fn request_password_reset(
    State(state): State<AppState>,
    Json(req): Json<PasswordResetRequest>,
) -> Result<Json<OkResponse>, ApiError> {
    let email = normalize_email(&req.email);
    if email.is_empty() {
        return Err(ApiError::validation("El correo es obligatorio."));
    }

    let user: Option<(Uuid, String)> = sqlx::query_as(
        r#"
        SELECT user_id, email
        FROM staff_user
        WHERE lower(email) = $1
          AND is_active = true
        "#,
    )
    .bind(&email)
    .fetch_optional(&state.db)
    .await
    .map_err(|e| ApiError::Internal(format!("db error: {e}")))?;

    let Some((user_id, user_email)) = user else {
        tracing::debug!("password reset requested for unknown or inactive email");
        return Ok(Json(OkResponse::ok()));
    };

    let mut tx = state.db.begin().await
        .map_err(|e| ApiError::Internal(format!("db error: {e}")))?;

    // Only the newest reset link works.
    sqlx::query(
        r#"
        UPDATE account_token
        SET used_at = now()
        WHERE user_id = $1
          AND purpose = $2
          AND used_at IS NULL
        "#,
    )
    .bind(user_id)
    .bind(TokenPurpose::PasswordReset.code())
    .execute(&mut *tx)
    .await
    .map_err(|e| ApiError::Internal(format!("db error: {e}")))?;

    let token = issue_account_token(&mut tx, user_id, TokenPurpose::PasswordReset, state.account_token_ttl_hours).await?;

    tx.commit().await
        .map_err(|e| ApiError::Internal(format!("db error: {e}")))?;

    send_mail(&state, password_reset_email(&state.public_base_url, &user_email, &token)).await;
    tracing::info!(%user_id, "password reset issued");

    Ok(Json(OkResponse::ok()))
}

#[derive(Debug, Deserialize)]
pub struct ConfirmPasswordResetRequest {
    pub token: String,
    pub new_password: String,
}

pub async fn confirm_password_reset(
    State(state): State<AppState>,
    Json(req): Json<ConfirmPasswordResetRequest>,
) -> Result<Json<OkResponse>, ApiError> {
    validate_new_password(&req.new_password)?;
    let new_hash = hash_password(&req.new_password)?;

    let mut tx = state.db.begin().await
        .map_err(|e| ApiError::Internal(format!("db error: {e}")))?;

    let user_id = consume_account_token(&mut tx, &req.token, TokenPurpose::PasswordReset).await?;

    sqlx::query(
        r#"
        UPDATE staff_user
        SET password_hash = $1
        WHERE user_id = $2
        "#,
    )
    .bind(new_hash)
    .bind(user_id)
    .execute(&mut *tx)
    .await
    .map_err(|e| ApiError::Internal(format!("db error: {e}")))?;

    sqlx::query(
        r#"
        UPDATE session_token
        SET revoked_at = now()
        WHERE user_id = $1
          AND revoked_at IS NULL
        "#,
    )
    .bind(user_id)
    .execute(&mut *tx)
    .await
    .map_err(|e| ApiError::Internal(format!("db error: {e}")))?;

    tx.commit().await
        .map_err(|e| ApiError::Internal(format!("db error: {e}")))?;

    tracing::info!(%user_id, "password reset completed");
    Ok(Json(OkResponse::ok()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn emails_are_normalized_before_lookup() {
        assert_eq!(normalize_email("  Ana@Clinica.EC "), "ana@clinica.ec");
    }

    #[test]
    fn email_shape_check() {
        assert!(is_plausible_email("ana@clinica.ec"));
        assert!(!is_plausible_email("ana"));
        assert!(!is_plausible_email("@clinica.ec"));
        assert!(!is_plausible_email("ana@localhost"));
    }

    #[test]
    fn token_purpose_codes_match_schema() {
        assert_eq!(TokenPurpose::Activation.code(), 1);
        assert_eq!(TokenPurpose::PasswordReset.code(), 2);
    }
}
