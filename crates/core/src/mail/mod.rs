//! Outbound email: verification codes and movie requests.
//!
//! Delivery is never allowed to fail the request that triggered it. The
//! only failure reported to a caller is the admin copy of a movie request.

mod smtp;
mod templates;

pub use smtp::SmtpMailer;
pub use templates::{movie_request_confirmation, movie_request_email, verification_email};

use async_trait::async_trait;
use thiserror::Error;
use tracing::{info, warn};

use crate::metadata::MovieMetadata;
use crate::metrics::EMAILS_SENT;

/// Errors that can occur when sending email.
#[derive(Debug, Error)]
pub enum MailError {
    #[error("Invalid address {address}: {reason}")]
    InvalidAddress { address: String, reason: String },

    #[error("Failed to build message: {0}")]
    Build(String),

    #[error("SMTP delivery failed: {0}")]
    Transport(String),
}

/// What an email is for, used in logs and metrics.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EmailKind {
    Verification,
    MovieRequest,
    RequestConfirmation,
}

impl EmailKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            EmailKind::Verification => "verification",
            EmailKind::MovieRequest => "movie_request",
            EmailKind::RequestConfirmation => "request_confirmation",
        }
    }
}

/// A composed HTML email.
#[derive(Debug, Clone, PartialEq)]
pub struct OutgoingEmail {
    pub kind: EmailKind,
    pub to: String,
    pub subject: String,
    pub html_body: String,
}

/// Email delivery backend.
#[async_trait]
pub trait Mailer: Send + Sync {
    async fn send(&self, email: OutgoingEmail) -> Result<(), MailError>;
}

/// Send and record the outcome.
pub async fn deliver(mailer: &dyn Mailer, email: OutgoingEmail) -> Result<(), MailError> {
    let kind = email.kind;
    let to = email.to.clone();
    let result = mailer.send(email).await;
    let status = if result.is_ok() { "success" } else { "error" };
    EMAILS_SENT.with_label_values(&[kind.as_str(), status]).inc();
    match &result {
        Ok(()) => info!(kind = kind.as_str(), to = %to, "Email sent"),
        Err(e) => warn!(kind = kind.as_str(), to = %to, error = %e, "Email failed"),
    }
    result
}

/// A user's request to add a movie to the catalog.
#[derive(Debug, Clone)]
pub struct MovieRequest {
    pub title: String,
    pub year: Option<String>,
    pub user_email: String,
    pub additional_info: Option<String>,
    pub metadata: Option<MovieMetadata>,
}

/// Send a movie request to `recipient`, then a confirmation to the requester.
///
/// Only the first send is reported. A failed confirmation is logged.
pub async fn dispatch_movie_request(
    mailer: &dyn Mailer,
    recipient: &str,
    request: &MovieRequest,
) -> Result<(), MailError> {
    deliver(mailer, movie_request_email(recipient, request)).await?;

    if deliver(mailer, movie_request_confirmation(request)).await.is_err() {
        warn!(
            title = %request.title,
            "Movie request confirmation not delivered to requester"
        );
    }
    Ok(())
}
