//! Status signals surfaced to the UI layer.
//!
//! Two signals exist: a "needs re-login" flag raised when the stored session
//! credential is confirmed dead, and a fallback notice raised whenever
//! catalog-A operations degrade (lower-fidelity profile data, or a basic
//! queue instead of a personalized one).

use tokio::sync::watch;

/// An informational banner describing degraded behavior.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FallbackNotice {
    pub active: bool,
    pub reason: Option<String>,
}

impl FallbackNotice {
    #[must_use]
    pub fn active(reason: impl Into<String>) -> Self {
        Self {
            active: true,
            reason: Some(reason.into()),
        }
    }

    #[must_use]
    pub fn cleared() -> Self {
        Self::default()
    }
}

/// Owner of the process-wide status channels.
///
/// Components hold an `Arc<StatusBoard>` and publish; observers call the
/// `subscribe_*` methods and receive every subsequent change.
#[derive(Debug)]
pub struct StatusBoard {
    needs_relogin: watch::Sender<bool>,
    fallback: watch::Sender<FallbackNotice>,
}

impl StatusBoard {
    #[must_use]
    pub fn new() -> Self {
        let (needs_relogin, _) = watch::channel(false);
        let (fallback, _) = watch::channel(FallbackNotice::default());
        Self {
            needs_relogin,
            fallback,
        }
    }

    pub fn set_needs_relogin(&self, value: bool) {
        self.needs_relogin.send_if_modified(|current| {
            if *current == value {
                false
            } else {
                *current = value;
                true
            }
        });
    }

    #[must_use]
    pub fn needs_relogin(&self) -> bool {
        *self.needs_relogin.borrow()
    }

    #[must_use]
    pub fn subscribe_needs_relogin(&self) -> watch::Receiver<bool> {
        self.needs_relogin.subscribe()
    }

    pub fn publish_fallback(&self, notice: FallbackNotice) {
        self.fallback.send_if_modified(|current| {
            if *current == notice {
                false
            } else {
                *current = notice;
                true
            }
        });
    }

    #[must_use]
    pub fn fallback(&self) -> FallbackNotice {
        self.fallback.borrow().clone()
    }

    #[must_use]
    pub fn subscribe_fallback(&self) -> watch::Receiver<FallbackNotice> {
        self.fallback.subscribe()
    }
}

impl Default for StatusBoard {
    fn default() -> Self {
        Self::new()
    }
}
