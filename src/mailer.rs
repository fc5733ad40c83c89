// src/mailer.rs
//
// Outbound email. There is no SMTP transport yet; LogMailer writes the
// message to the log so activation and reset links can be picked up there.

use async_trait::async_trait;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutgoingEmail {
    pub to: String,
    pub subject: String,
    pub body: String,
}

#[derive(Error, Debug)]
pub enum MailError {
    #[error("email has no recipient")]
    MissingRecipient,
}

#[async_trait]
pub trait Mailer: Send + Sync {
    async fn send(&self, email: OutgoingEmail) -> Result<(), MailError>;
}

pub struct LogMailer;

#[async_trait]
impl Mailer for LogMailer {
    async fn send(&self, email: OutgoingEmail) -> Result<(), MailError> {
        if email.to.trim().is_empty() {
            return Err(MailError::MissingRecipient);
        }
        tracing::info!(to = %email.to, subject = %email.subject, body = %email.body, "email queued (log transport)");
        Ok(())
    }
}

pub fn activation_email(base_url: &str, to: &str, token: &str) -> OutgoingEmail {
    OutgoingEmail {
        to: to.to_string(),
        subject: "Activa tu cuenta".to_string(),
        body: format!(
            "Hola,\n\nPara activar tu cuenta abre el siguiente enlace:\n{base_url}/activar/{token}\n\nSi no creaste esta cuenta ignora este mensaje."
        ),
    }
}

pub fn password_reset_email(base_url: &str, to: &str, token: &str) -> OutgoingEmail {
    OutgoingEmail {
        to: to.to_string(),
        subject: "Recuperación de contraseña".to_string(),
        body: format!(
            "Hola,\n\nRecibimos una solicitud para restablecer tu contraseña. Abre el siguiente enlace:\n{base_url}/recuperar/{token}\n\nSi no la solicitaste ignora este mensaje."
        ),
    }
}
