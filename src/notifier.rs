// src/notifier.rs
//
// Appointment notifications: message rendering and the sender seam. The
// messaging provider is not integrated; SimulatedSender accepts every
// well-formed message and fabricates a provider response.

use async_trait::async_trait;
use chrono::{DateTime, Duration, NaiveDate, NaiveTime, Utc};
use serde_json::json;
use thiserror::Error;
use uuid::Uuid;

#[derive(Debug, Clone)]
pub struct OutboundMessage {
    pub notification_id: Uuid,
    pub to: String,
    pub from: String,
    pub body: String,
}

#[derive(Debug, Clone)]
pub struct DeliveryReceipt {
    pub provider_response: serde_json::Value,
}

#[derive(Error, Debug, PartialEq, Eq)]
pub enum SendError {
    #[error("la notificación no tiene número de destinatario")]
    MissingRecipient,

    #[error("la notificación no tiene mensaje")]
    EmptyMessage,
}

#[async_trait]
pub trait NotificationSender: Send + Sync {
    async fn send(&self, message: &OutboundMessage) -> Result<DeliveryReceipt, SendError>;
}

pub struct SimulatedSender;

#[async_trait]
impl NotificationSender for SimulatedSender {
    async fn send(&self, message: &OutboundMessage) -> Result<DeliveryReceipt, SendError> {
        if message.to.trim().is_empty() {
            return Err(SendError::MissingRecipient);
        }
        if message.body.trim().is_empty() {
            return Err(SendError::EmptyMessage);
        }

        let provider_message_id = format!("sim-{}", Uuid::new_v4());
        tracing::info!(
            notification_id = %message.notification_id,
            to = %message.to,
            from = %message.from,
            provider_message_id = %provider_message_id,
            "notification send simulated"
        );

        Ok(DeliveryReceipt {
            provider_response: json!({
                "simulated": true,
                "status": "accepted",
                "message_id": provider_message_id,
                "to": message.to,
                "from": message.from,
            }),
        })
    }
}

/// Values available to message placeholders.
#[derive(Debug, Clone)]
pub struct MessageContext<'a> {
    pub first_name: &'a str,
    pub last_name: &'a str,
    pub date: NaiveDate,
    pub time: NaiveTime,
}

impl MessageContext<'_> {
    fn placeholder(&self, key: &str) -> Option<String> {
        match key {
            "name" => Some(format!("{} {}", self.first_name, self.last_name).trim().to_string()),
            "first_name" => Some(self.first_name.to_string()),
            "last_name" => Some(self.last_name.to_string()),
            "date" => Some(self.date.format("%d/%m/%Y").to_string()),
            "time" => Some(self.time.format("%H:%M").to_string()),
            _ => None,
        }
    }
}

/// Placeholders: {name}, {first_name}, {last_name}, {date} (DD/MM/YYYY),
/// {time} (HH:MM). The template is scanned once, so substituted values are
/// never expanded again. Unknown placeholders are kept as written.
pub fn render_message(template: &str, ctx: &MessageContext<'_>) -> String {
    let mut out = String::with_capacity(template.len());
    let mut rest = template;

    while let Some(open) = rest.find('{') {
        out.push_str(&rest[..open]);
        let tail = &rest[open..];
        let value = tail
            .find('}')
            .and_then(|close| ctx.placeholder(&tail[1..close]).map(|v| (v, close)));
        match value {
            Some((v, close)) => {
                out.push_str(&v);
                rest = &tail[close + 1..];
            }
            None => {
                out.push('{');
                rest = &tail[1..];
            }
        }
    }
    out.push_str(rest);
    out
}

/// Default reminder time: `lead_hours` before the appointment (UTC). A lead
/// that does not fit the calendar leaves the appointment time itself.
pub fn default_reminder_time(date: NaiveDate, time: NaiveTime, lead_hours: i64) -> DateTime<Utc> {
    let at = date.and_time(time).and_utc();
    Duration::try_hours(lead_hours)
        .and_then(|lead| at.checked_sub_signed(lead))
        .unwrap_or(at)
}

/// Notifications may not be scheduled for a day that has already passed.
/// Only the date is compared; earlier hours of today are fine.
pub fn ensure_not_in_past(scheduled_at: DateTime<Utc>, now: DateTime<Utc>) -> Result<(), &'static str> {
    if scheduled_at.date_naive() < now.date_naive() {
        return Err(
            "No se puede programar notificaciones para fechas pasadas. La cita ya no está disponible para notificar.",
        );
    }
    Ok(())
}
