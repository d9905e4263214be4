//! In-memory notifier for tests/dev.

use std::sync::Mutex;

use crate::service::{MailTemplate, NotificationContext, NotificationService, NotifyError};

/// A delivered email, as recorded by [`InMemoryNotifier`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SentMail {
    pub recipients: Vec<String>,
    pub template: MailTemplate,
    pub context: NotificationContext,
}

/// A recorded timeline note.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TimelineNote {
    pub subject_ref: String,
    pub body: String,
}

/// In-memory notifier.
///
/// - No IO
/// - Records everything it "delivers" for assertions
/// - Can be armed to fail, to exercise the best-effort paths
#[derive(Debug, Default)]
pub struct InMemoryNotifier {
    mails: Mutex<Vec<SentMail>>,
    notes: Mutex<Vec<TimelineNote>>,
    fail_with: Mutex<Option<NotifyError>>,
}

impl InMemoryNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every subsequent delivery fail with `err`.
    pub fn fail_with(&self, err: NotifyError) {
        *self.fail_with.lock().unwrap() = Some(err);
    }

    pub fn sent_mails(&self) -> Vec<SentMail> {
        self.mails.lock().unwrap().clone()
    }

    pub fn notes(&self) -> Vec<TimelineNote> {
        self.notes.lock().unwrap().clone()
    }
}

impl NotificationService for InMemoryNotifier {
    fn send_mail(
        &self,
        recipients: &[String],
        template: MailTemplate,
        context: &NotificationContext,
    ) -> Result<(), NotifyError> {
        if let Some(err) = self.fail_with.lock().unwrap().clone() {
            return Err(err);
        }
        if recipients.is_empty() {
            return Err(NotifyError::NoRecipients);
        }
        self.mails.lock().unwrap().push(SentMail {
            recipients: recipients.to_vec(),
            template,
            context: context.clone(),
        });
        Ok(())
    }

    fn post_note(&self, subject_ref: &str, body: &str) -> Result<(), NotifyError> {
        if let Some(err) = self.fail_with.lock().unwrap().clone() {
            return Err(err);
        }
        self.notes.lock().unwrap().push(TimelineNote {
            subject_ref: subject_ref.to_string(),
            body: body.to_string(),
        });
        Ok(())
    }
}

/// Notifier that silently accepts everything (for flows under test where
/// notifications are irrelevant).
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopNotifier;

impl NotificationService for NoopNotifier {
    fn send_mail(
        &self,
        _recipients: &[String],
        _template: MailTemplate,
        _context: &NotificationContext,
    ) -> Result<(), NotifyError> {
        Ok(())
    }

    fn post_note(&self, _subject_ref: &str, _body: &str) -> Result<(), NotifyError> {
        Ok(())
    }
}
