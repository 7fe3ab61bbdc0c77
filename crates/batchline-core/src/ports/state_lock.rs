//! StateLock port - 単一ライターの排他制御
//!
//! Every mutating controller operation holds the lock for its whole
//! duration, so two submits never see the same queue snapshot and two drains
//! never both archive the same batch.

use crate::domain::Result;

/// Held lock; released on drop.
#[must_use = "the lock is released as soon as the guard is dropped"]
pub struct StateGuard {
    release: Option<Box<dyn FnOnce() + Send>>,
}

impl StateGuard {
    pub fn new(release: impl FnOnce() + Send + 'static) -> Self {
        Self {
            release: Some(Box::new(release)),
        }
    }
}

impl Drop for StateGuard {
    fn drop(&mut self) {
        if let Some(release) = self.release.take() {
            release();
        }
    }
}

impl std::fmt::Debug for StateGuard {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StateGuard")
            .field("held", &self.release.is_some())
            .finish()
    }
}

pub trait StateLock: Send + Sync {
    /// Take the lock without waiting; `Locked` if someone else holds it.
    fn acquire(&self) -> Result<StateGuard>;
}
