//! Completion notifications.

pub mod sns;

use thiserror::Error;

pub use sns::SnsNotifier;

#[derive(Debug, Error)]
pub enum NotifyError {
    #[error("failed to publish notification: {0}")]
    Publish(String),
}

/// Fire-and-forget delivery of a human-readable message to a topic.
pub trait Notifier: Send + Sync {
    fn notify(&self, topic: &str, message: &str) -> Result<(), NotifyError>;
}

pub fn issued_message(domain: &str) -> String {
    format!("Certificates for the following domains successfully obtained: {domain}")
}
