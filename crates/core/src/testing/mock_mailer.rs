//! Mock mailer for testing.

use async_trait::async_trait;
use std::collections::HashSet;
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::mail::{MailError, Mailer, OutgoingEmail};

/// Records delivered emails instead of sending them.
///
/// Addresses registered with [`fail_for`](Self::fail_for) are rejected;
/// rejected emails are not recorded.
#[derive(Debug, Default)]
pub struct MockMailer {
    sent: Arc<RwLock<Vec<OutgoingEmail>>>,
    failing: Arc<RwLock<HashSet<String>>>,
}

impl MockMailer {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn fail_for(&self, address: &str) {
        self.failing.write().await.insert(address.to_string());
    }

    pub async fn sent(&self) -> Vec<OutgoingEmail> {
        self.sent.read().await.clone()
    }

    /// Most recent email sent to `address`.
    pub async fn last_to(&self, address: &str) -> Option<OutgoingEmail> {
        self.sent
            .read()
            .await
            .iter()
            .rev()
            .find(|e| e.to == address)
            .cloned()
    }
}

#[async_trait]
impl Mailer for MockMailer {
    async fn send(&self, email: OutgoingEmail) -> Result<(), MailError> {
        if self.failing.read().await.contains(&email.to) {
            return Err(MailError::Transport(format!(
                "mock rejected mail to {}",
                email.to
            )));
        }
        self.sent.write().await.push(email);
        Ok(())
    }
}
