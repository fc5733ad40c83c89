use std::sync::Arc;

use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

use crate::mailer::Mailer;
use crate::notifier::NotificationSender;

#[derive(Clone)]
pub struct AppState {
    pub db: sqlx::PgPool,
    pub session_ttl_hours: i64,
    pub account_token_ttl_hours: i64,
    pub require_account_activation: bool,
    pub public_base_url: String,
    pub reminder_lead_hours: i64,
    pub max_upload_bytes: usize,
    pub mailer: Arc<dyn Mailer>,
    pub sender: Arc<dyn NotificationSender>,
}

/* -------------------------
   API envelopes
--------------------------*/

#[derive(Debug, Serialize)]
pub struct ApiOk<T> {
    pub data: T,
}

#[derive(Debug, Serialize)]
pub struct OkResponse {
    pub data: OkData,
}

#[derive(Debug, Serialize)]
pub struct OkData {
    pub ok: bool,
}

impl OkResponse {
    pub fn ok() -> Self {
        OkResponse {
            data: OkData { ok: true },
        }
    }
}

/* -------------------------
   Auth DTOs
--------------------------*/

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    /// Username or email.
    pub identifier: String,
    pub password: String,
    pub device_name: Option<String>,
    pub remember_me: Option<bool>,
}

#[derive(Debug, Serialize)]
pub struct LoginResponse {
    pub data: LoginResponseData,
}

#[derive(Debug, Serialize)]
pub struct LoginResponseData {
    pub access_token: String,
    pub expires_at: DateTime<Utc>,
    pub user: UserProfile,
    pub message: String,
}

#[derive(Debug, Serialize)]
pub struct MeResponse {
    pub data: MeResponseData,
}

#[derive(Debug, Serialize)]
pub struct MeResponseData {
    pub user: UserProfile,
    pub session: SessionInfo,
}

#[derive(Debug, Serialize)]
pub struct UserProfile {
    pub user_id: Uuid,
    pub username: String,
    pub email: String,
    pub first_name: String,
    pub last_name: String,
}

impl UserProfile {
    /// Name used in greetings: first name, else username, else email.
    pub fn greeting_name(&self) -> &str {
        [&self.first_name, &self.username, &self.email]
            .into_iter()
            .map(|s| s.trim())
            .find(|s| !s.is_empty())
            .unwrap_or("")
    }
}

impl From<UserRow> for UserProfile {
    fn from(u: UserRow) -> Self {
        UserProfile {
            user_id: u.user_id,
            username: u.username,
            email: u.email,
            first_name: u.first_name,
            last_name: u.last_name,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct SessionInfo {
    pub session_token_id: Uuid,
    pub expires_at: DateTime<Utc>,
}

/* -------------------------
   DB Row Models
--------------------------*/

#[derive(Debug, FromRow)]
pub struct UserRow {
    pub user_id: Uuid,
    pub username: String,
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    pub password_hash: String,
    pub is_active: bool,
}

#[derive(Debug, FromRow)]
pub struct SessionTokenRow {
    pub session_token_id: Uuid,
    pub expires_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, FromRow)]
pub struct PatientRow {
    pub patient_id: Uuid,
    pub first_name: String,
    pub last_name: String,
    pub mobile: String,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Appointment joined with its patient.
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct AppointmentRow {
    pub appointment_id: Uuid,
    pub patient_id: Uuid,
    pub first_name: String,
    pub last_name: String,
    pub mobile: String,
    pub appointment_date: NaiveDate,
    pub appointment_time: NaiveTime,
    pub status: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, FromRow)]
pub struct AreaRow {
    pub area_id: Uuid,
    pub name: String,
    pub phone: String,
    pub icon: String,
    pub color: String,
    pub description: String,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, FromRow)]
pub struct NotificationNumberRow {
    pub notification_number_id: Uuid,
    pub area_id: Option<Uuid>,
    pub number: String,
    pub description: String,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, FromRow)]
pub struct MessageTemplateRow {
    pub message_id: Uuid,
    pub title: String,
    pub content: String,
    pub kind: String,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, FromRow)]
pub struct NotificationRow {
    pub notification_id: Uuid,
    pub appointment_id: Uuid,
    pub notification_number_id: Option<Uuid>,
    pub message_id: Option<Uuid>,
    pub recipient_number: String,
    pub origin_number: String,
    pub scheduled_at: DateTime<Utc>,
    pub sent_at: Option<DateTime<Utc>>,
    pub status: String,
    pub provider_response: serde_json::Value,
    pub error_message: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/* -------------------------
   Status codes
--------------------------*/

/// Appointment lifecycle. Stored as the Spanish codes the staff use.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum AppointmentStatus {
    #[default]
    #[serde(rename = "pendiente")]
    Pending,
    #[serde(rename = "confirmada")]
    Confirmed,
    #[serde(rename = "cancelada")]
    Cancelled,
    #[serde(rename = "atendida")]
    Attended,
}

impl AppointmentStatus {
    pub const ALL: [AppointmentStatus; 4] = [
        AppointmentStatus::Pending,
        AppointmentStatus::Confirmed,
        AppointmentStatus::Cancelled,
        AppointmentStatus::Attended,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            AppointmentStatus::Pending => "pendiente",
            AppointmentStatus::Confirmed => "confirmada",
            AppointmentStatus::Cancelled => "cancelada",
            AppointmentStatus::Attended => "atendida",
        }
    }

    /// Exact code match; callers normalize case and whitespace first.
    pub fn parse(code: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|s| s.as_str() == code)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum NotificationStatus {
    #[default]
    Pending,
    Sent,
    Failed,
    Delivered,
}

impl NotificationStatus {
    pub const ALL: [NotificationStatus; 4] = [
        NotificationStatus::Pending,
        NotificationStatus::Sent,
        NotificationStatus::Failed,
        NotificationStatus::Delivered,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            NotificationStatus::Pending => "pendiente",
            NotificationStatus::Sent => "enviada",
            NotificationStatus::Failed => "fallida",
            NotificationStatus::Delivered => "entregada",
        }
    }

    pub fn parse(code: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|s| s.as_str() == code)
    }

    /// Only notifications that have not gone out (or failed) may be sent.
    pub fn can_send(self) -> bool {
        matches!(self, NotificationStatus::Pending | NotificationStatus::Failed)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum MessageKind {
    Confirmation,
    Reminder,
    Cancellation,
    Change,
    #[default]
    Other,
}

impl MessageKind {
    pub const ALL: [MessageKind; 5] = [
        MessageKind::Confirmation,
        MessageKind::Reminder,
        MessageKind::Cancellation,
        MessageKind::Change,
        MessageKind::Other,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            MessageKind::Confirmation => "confirmacion",
            MessageKind::Reminder => "recordatorio",
            MessageKind::Cancellation => "cancelacion",
            MessageKind::Change => "cambio",
            MessageKind::Other => "otro",
        }
    }

    pub fn parse(code: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|k| k.as_str() == code)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn appointment_status_codes_round_trip() {
        for status in AppointmentStatus::ALL {
            assert_eq!(AppointmentStatus::parse(status.as_str()), Some(status));
        }
        assert_eq!(AppointmentStatus::parse("Confirmada"), None);
        assert_eq!(AppointmentStatus::default(), AppointmentStatus::Pending);
    }

    #[test]
    fn appointment_status_serializes_as_code() {
        let json = serde_json::to_string(&AppointmentStatus::Attended).unwrap();
        assert_eq!(json, "\"atendida\"");
    }

    #[test]
    fn only_pending_or_failed_notifications_can_be_sent() {
        assert!(NotificationStatus::Pending.can_send());
        assert!(NotificationStatus::Failed.can_send());
        assert!(!NotificationStatus::Sent.can_send());
        assert!(!NotificationStatus::Delivered.can_send());
        assert_eq!(NotificationStatus::parse("enviada"), Some(NotificationStatus::Sent));
    }

    #[test]
    fn message_kind_defaults_to_other() {
        assert_eq!(MessageKind::default().as_str(), "otro");
        assert_eq!(MessageKind::parse("recordatorio"), Some(MessageKind::Reminder));
        assert_eq!(MessageKind::parse("reminder"), None);
    }

    #[test]
    fn greeting_prefers_first_name() {
        let mut profile = UserProfile {
            user_id: Uuid::nil(),
            username: "ana@clinica.ec".into(),
            email: "ana@clinica.ec".into(),
            first_name: "Ana".into(),
            last_name: String::new(),
        };
        assert_eq!(profile.greeting_name(), "Ana");
        profile.first_name.clear();
        assert_eq!(profile.greeting_name(), "ana@clinica.ec");
    }
}
