// src/notify/mod.rs
mod email;
mod render;

pub use email::EmailNotifier;
pub use render::{render_html, render_text, SUBJECT};

use crate::monitor::Snapshot;
use async_trait::async_trait;

/// Receives the full snapshot whenever a round detects a status change.
#[async_trait]
pub trait NotificationSink: Send + Sync {
    async fn notify(&self, snapshot: &Snapshot) -> Result<(), NotifyError>;
}

#[derive(Debug, thiserror::Error)]
pub enum NotifyError {
    #[error("Invalid address: {0}")]
    Address(#[from] lettre::address::AddressError),

    #[error("Failed to build message: {0}")]
    Message(#[from] lettre::error::Error),

    #[error("SMTP transport error: {0}")]
    Transport(#[from] lettre::transport::smtp::Error),

    #[error("SMTP server {0} did not accept the connection")]
    Unreachable(String),
}
