use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Mail templates known to the system.
///
/// Templates are addressed by id rather than looked up by reference in a
/// store; a missing template surfaces as [`NotifyError::TemplateMissing`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MailTemplate {
    /// "Purchase order X is submitted for Level N approval."
    ApprovalRequest,
    /// "Purchase order X was rejected."
    RejectionNotice,
}

/// Key/value substitution context handed to the template renderer.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NotificationContext {
    pairs: Vec<(String, String)>,
}

impl NotificationContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.pairs.push((key.into(), value.into()));
        self
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.pairs
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    pub fn pairs(&self) -> &[(String, String)] {
        &self.pairs
    }
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum NotifyError {
    #[error("mail template not found: {0:?}")]
    TemplateMissing(MailTemplate),

    #[error("no recipients for notification")]
    NoRecipients,

    #[error("delivery failed: {0}")]
    Send(String),
}

/// Synchronous notification delivery contract.
///
/// Implementations must not panic; every failure mode is a [`NotifyError`].
pub trait NotificationService: Send + Sync {
    /// Send a templated email to an explicit recipient list.
    fn send_mail(
        &self,
        recipients: &[String],
        template: MailTemplate,
        context: &NotificationContext,
    ) -> Result<(), NotifyError>;

    /// Post a note on a record's timeline (chatter).
    fn post_note(&self, subject_ref: &str, body: &str) -> Result<(), NotifyError>;
}
