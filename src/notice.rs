//! Notices — short-lived, user-visible failure reports.
//!
//! DESIGN
//! ======
//! The engine never blocks or panics on a remote failure. Anything the user
//! should hear about becomes a `Notice` pushed onto a bounded channel that the
//! host drains into toasts. Pushing uses `try_send`: a slow host loses
//! notices rather than stalling the canvas.

use tokio::sync::mpsc;
use tracing::warn;

use crate::error::ErrorCode;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoticeLevel {
    Info,
    Warning,
    Error,
}

/// One toast-worthy event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notice {
    pub level: NoticeLevel,
    /// Grepable code from [`ErrorCode`], or a short tag for info notices.
    pub code: &'static str,
    pub message: String,
}

/// Sending half of the notice channel. Cheap to clone.
#[derive(Debug, Clone)]
pub struct Notifier {
    tx: mpsc::Sender<Notice>,
}

impl Notifier {
    /// Create a notifier and the receiver the host drains.
    #[must_use]
    pub fn channel(capacity: usize) -> (Self, mpsc::Receiver<Notice>) {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        (Self { tx }, rx)
    }

    /// Report a failure. Retryable errors are warnings, the rest are errors.
    pub fn failure(&self, context: &str, err: &(impl ErrorCode + ?Sized)) {
        let level = if err.retryable() { NoticeLevel::Warning } else { NoticeLevel::Error };
        self.push(Notice { level, code: err.error_code(), message: format!("{context}: {err}") });
    }

    pub fn info(&self, code: &'static str, message: impl Into<String>) {
        self.push(Notice { level: NoticeLevel::Info, code, message: message.into() });
    }

    /// Best-effort, non-blocking enqueue.
    pub fn push(&self, notice: Notice) {
        match self.tx.try_send(notice) {
            Ok(()) => {}
            Err(mpsc::error::TrySendError::Full(n)) => {
                warn!(code = n.code, message = %n.message, "notice queue full; dropping notice");
            }
            Err(mpsc::error::TrySendError::Closed(n)) => {
                warn!(code = n.code, message = %n.message, "notice queue closed; dropping notice");
            }
        }
    }
}

#[cfg(test)]
#[path = "notice_test.rs"]
mod tests;
