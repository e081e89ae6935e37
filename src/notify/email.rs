// src/notify/email.rs
use super::{render_html, render_text, NotificationSink, NotifyError, SUBJECT};
use crate::config::{EmailConfig, SmtpTls};
use crate::monitor::Snapshot;
use async_trait::async_trait;
use lettre::message::{Mailbox, MultiPart};
use lettre::transport::smtp::authentication::Credentials;
use lettre::transport::smtp::client::{Tls, TlsParameters};
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};
use std::time::Duration;
use tracing::{debug, info};

const SMTP_TIMEOUT: Duration = Duration::from_secs(30);

/// Sends change alerts over SMTP to every configured receiver.
pub struct EmailNotifier {
    transport: AsyncSmtpTransport<Tokio1Executor>,
    server: String,
    from: Mailbox,
    to: Vec<Mailbox>,
}

impl EmailNotifier {
    /// TLS follows [`AuthConfig::tls_mode`](crate::config::AuthConfig::tls_mode).
    pub fn new(config: &EmailConfig) -> Result<Self, NotifyError> {
        let auth = &config.sender.auth;

        let builder = match auth.tls_mode() {
            SmtpTls::Implicit => AsyncSmtpTransport::<Tokio1Executor>::relay(&auth.host)?,
            SmtpTls::Required => AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&auth.host)?,
            // Upgrade only when the server offers STARTTLS.
            SmtpTls::Opportunistic => {
                AsyncSmtpTransport::<Tokio1Executor>::builder_dangerous(auth.host.as_str())
                    .tls(Tls::Opportunistic(TlsParameters::new(auth.host.clone())?))
            }
        };

        let transport = builder
            .port(auth.port)
            .credentials(Credentials::new(
                auth.username.clone(),
                auth.password.clone(),
            ))
            .timeout(Some(SMTP_TIMEOUT))
            .build();

        let from: Mailbox = config.sender.addr.parse()?;
        let to = config
            .receivers
            .iter()
            .map(|r| r.parse::<Mailbox>())
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self {
            transport,
            server: format!("{}:{}", auth.host, auth.port),
            from,
            to,
        })
    }

    /// Open and close one authenticated connection to the SMTP server.
    pub async fn verify(&self) -> Result<(), NotifyError> {
        info!("Checking sender email credentials against {}", self.server);
        if self.transport.test_connection().await? {
            info!("OK credentials");
            Ok(())
        } else {
            Err(NotifyError::Unreachable(self.server.clone()))
        }
    }

    pub fn build_message(&self, snapshot: &Snapshot) -> Result<Message, NotifyError> {
        let mut builder = Message::builder()
            .from(self.from.clone())
            .subject(SUBJECT);

        for to in &self.to {
            builder = builder.to(to.clone());
        }

        let message = builder.multipart(MultiPart::alternative_plain_html(
            render_text(snapshot),
            render_html(snapshot),
        ))?;
        Ok(message)
    }
}

#[async_trait]
impl NotificationSink for EmailNotifier {
    async fn notify(&self, snapshot: &Snapshot) -> Result<(), NotifyError> {
        let message = self.build_message(snapshot)?;
        let response = self.transport.send(message).await?;
        debug!("SMTP response: {:?}", response.code());
        info!(
            "Sent status change notification from {} to {} receiver(s)",
            self.from,
            self.to.len()
        );
        Ok(())
    }
}
