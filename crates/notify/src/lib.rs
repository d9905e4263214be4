//! Notification seam: templated mail + record timeline notes.
//!
//! Delivery is synchronous and best-effort. Callers in the workflow services
//! log failures and carry on; a failed notification never blocks a state
//! transition. Transport (SMTP, chat, ...) is somebody else's problem — this
//! crate only defines the contract and the test doubles.

pub mod memory;
pub mod service;

pub use memory::{InMemoryNotifier, NoopNotifier, SentMail, TimelineNote};
pub use service::{MailTemplate, NotificationContext, NotificationService, NotifyError};
