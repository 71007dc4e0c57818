/// Undo stack for multi-step operations over external side effects.
///
/// Each committed step pushes the action that takes it back. On failure the
/// stack is unwound newest-first; an undo that fails is logged and audited,
/// and the remaining undos still run.

use std::sync::Arc;

use futures::future::BoxFuture;

use crate::audit::{AuditAction, AuditEvent};
use crate::error::MediaError;
use crate::media::{MediaStore, StoredMedia};

type Undo = Box<dyn FnOnce() -> BoxFuture<'static, Result<(), MediaError>> + Send>;

#[derive(Default)]
pub struct Compensations {
    steps: Vec<(String, Undo)>,
}

impl Compensations {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push<F>(&mut self, label: impl Into<String>, undo: F)
    where
        F: FnOnce() -> BoxFuture<'static, Result<(), MediaError>> + Send + 'static,
    {
        self.steps.push((label.into(), Box::new(undo)));
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    /// Run every undo in reverse order; returns how many of them failed.
    pub async fn unwind(self) -> usize {
        let mut failures = 0;
        for (label, undo) in self.steps.into_iter().rev() {
            match undo().await {
                Ok(()) => {
                    tracing::info!(step = %label, "Compensated");
                }
                Err(e) => {
                    failures += 1;
                    tracing::error!(step = %label, error = %e, "Compensation failed");
                    AuditEvent::failure(AuditAction::Compensate, format!("{}: {}", label, e))
                        .record();
                }
            }
        }
        failures
    }

    /// The operation succeeded; nothing will be undone.
    pub fn commit(self) {}
}

/// Take back a single upload whose follow-up write failed.
pub async fn discard_upload(media: &Arc<dyn MediaStore>, stored: &StoredMedia) {
    if let Err(e) = media.delete(&stored.public_id).await {
        tracing::error!(public_id = %stored.public_id, error = %e, "Failed to discard upload");
        AuditEvent::failure(AuditAction::Compensate, e.to_string()).record();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::FutureExt;
    use std::sync::{Arc, Mutex};

    #[tokio::test]
    async fn test_unwinds_in_reverse_order() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let mut compensations = Compensations::new();

        for step in ["avatar", "cover"] {
            let log = log.clone();
            compensations.push(step, move || {
                async move {
                    log.lock().unwrap().push(step);
                    Ok(())
                }
                .boxed()
            });
        }

        assert_eq!(compensations.len(), 2);
        assert_eq!(compensations.unwind().await, 0);
        assert_eq!(*log.lock().unwrap(), vec!["cover", "avatar"]);
    }

    #[tokio::test]
    async fn test_failed_undo_does_not_stop_the_rest() {
        let ran = Arc::new(Mutex::new(false));
        let mut compensations = Compensations::new();

        let flag = ran.clone();
        compensations.push("first", move || {
            async move {
                *flag.lock().unwrap() = true;
                Ok(())
            }
            .boxed()
        });
        compensations.push("second", || {
            async { Err(MediaError::DeleteFailed("storage down".to_string())) }.boxed()
        });

        assert_eq!(compensations.unwind().await, 1);
        assert!(*ran.lock().unwrap());
    }

    #[tokio::test]
    async fn test_commit_runs_nothing() {
        let ran = Arc::new(Mutex::new(false));
        let mut compensations = Compensations::new();
        let flag = ran.clone();
        compensations.push("avatar", move || {
            async move {
                *flag.lock().unwrap() = true;
                Ok(())
            }
            .boxed()
        });

        compensations.commit();

        assert!(!*ran.lock().unwrap());
    }
}
