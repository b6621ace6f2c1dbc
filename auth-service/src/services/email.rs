use async_trait::async_trait;
use lettre::{
    message::{header::ContentType, MultiPart, SinglePart},
    transport::smtp::authentication::Credentials,
    Message, SmtpTransport, Transport,
};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use super::{error::DeliveryError, link::ResetLink};
use crate::config::SmtpConfig;

/// Best-effort delivery of a reset link to its recipient.
#[async_trait]
pub trait ResetLinkSender: Send + Sync {
    async fn send_reset_link(&self, recipient: &str, link: &ResetLink) -> Result<(), DeliveryError>;
}

#[derive(Clone)]
pub struct SmtpResetLinkSender {
    mailer: SmtpTransport,
    from_email: String,
    valid_minutes: i64,
}

impl SmtpResetLinkSender {
    pub fn new(config: &SmtpConfig, valid_minutes: i64) -> Result<Self, DeliveryError> {
        let creds = Credentials::new(config.user.clone(), config.password.clone());

        let mailer = SmtpTransport::relay(&config.host)
            .map_err(|e| DeliveryError::Transport(e.to_string()))?
            .credentials(creds)
            .port(config.port)
            .timeout(Some(Duration::from_secs(10)))
            .build();

        tracing::info!(host = %config.host, port = config.port, "SMTP reset-link sender initialized");

        Ok(Self {
            mailer,
            from_email: config.from.clone(),
            valid_minutes,
        })
    }

    fn build_message(&self, recipient: &str, link: &ResetLink) -> Result<Message, DeliveryError> {
        let html_body = format!(
            r###"            <html>
                <body style="font-family: Arial, sans-serif;">
                    <h2>Password Reset Request</h2>
                    <p>We received a request to reset the password of your directory account. Click the link below to choose a new one:</p>
                    <p>
                        <a href="{link}" style="background-color: #2196F3; color: white; padding: 14px 20px; text-decoration: none; border-radius: 4px;">
                            Reset Password
                        </a>
                    </p>
                    <p style="color: #666; font-size: 12px;">
                        This link is valid for {minutes} minutes and can be used once. If you didn't request this, please ignore this email.
                    </p>
                </body>
            </html>
            "###,
            link = link,
            minutes = self.valid_minutes,
        );

        let plain_body = format!(
            "Password Reset Request\n\nWe received a request to reset the password of your directory account. \
             Please visit the following link to choose a new one:\n\n{}\n\n\
             This link is valid for {} minutes and can be used once. If you didn't request this, please ignore this email.",
            link, self.valid_minutes
        );

        Message::builder()
            .from(
                self.from_email
                    .parse()
                    .map_err(|e: lettre::address::AddressError| DeliveryError::Address(e.to_string()))?,
            )
            .to(recipient
                .parse()
                .map_err(|e: lettre::address::AddressError| DeliveryError::Address(e.to_string()))?)
            .subject("Reset Your Password")
            .multipart(
                MultiPart::alternative()
                    .singlepart(
                        SinglePart::builder()
                            .header(ContentType::TEXT_PLAIN)
                            .body(plain_body),
                    )
                    .singlepart(
                        SinglePart::builder()
                            .header(ContentType::TEXT_HTML)
                            .body(html_body),
                    ),
            )
            .map_err(|e| DeliveryError::Build(e.to_string()))
    }
}

#[async_trait]
impl ResetLinkSender for SmtpResetLinkSender {
    async fn send_reset_link(&self, recipient: &str, link: &ResetLink) -> Result<(), DeliveryError> {
        let email = self.build_message(recipient, link)?;

        // Blocking SMTP client; keep it off the async workers.
        let mailer = self.mailer.clone();
        let result = tokio::task::spawn_blocking(move || mailer.send(&email))
            .await
            .map_err(|e| DeliveryError::Transport(e.to_string()))?;

        match result {
            Ok(_) => {
                tracing::info!(to = %recipient, "Password reset email sent");
                Ok(())
            }
            Err(e) => {
                tracing::error!(error = %e, to = %recipient, "Failed to send password reset email");
                Err(DeliveryError::Transport(e.to_string()))
            }
        }
    }
}

/// A link handed to [`RecordingSender`].
#[derive(Debug, Clone)]
pub struct SentLink {
    pub recipient: String,
    pub link: ResetLink,
}

/// In-memory sender that records what would have been delivered.
#[derive(Default)]
pub struct RecordingSender {
    sent: Mutex<Vec<SentLink>>,
    failing: AtomicBool,
}

impl RecordingSender {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make subsequent sends fail without recording anything.
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    pub fn sent(&self) -> Vec<SentLink> {
        self.sent.lock().map(|s| s.clone()).unwrap_or_default()
    }

    pub fn last_sent(&self) -> Option<SentLink> {
        self.sent().pop()
    }
}

#[async_trait]
impl ResetLinkSender for RecordingSender {
    async fn send_reset_link(&self, recipient: &str, link: &ResetLink) -> Result<(), DeliveryError> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(DeliveryError::Transport("recording sender set to fail".to_string()));
        }
        self.sent
            .lock()
            .map_err(|e| DeliveryError::Transport(format!("Recording sender mutex poisoned: {}", e)))?
            .push(SentLink {
                recipient: recipient.to_string(),
                link: link.clone(),
            });
        Ok(())
    }
}
