use crate::{Error, Result};

use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

/// Per-operation context: a cancellation token plus an optional deadline.
///
/// Operations check the context between SQL statements; cancellation during a
/// statement surfaces once the database call returns.
#[derive(Debug, Default, Clone)]
pub struct Cx {
    cancel: CancellationToken,
    deadline: Option<Instant>,
}

impl Cx {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the operation deadline.
    pub fn with_deadline(mut self, deadline: Instant) -> Self {
        self.deadline = Some(deadline);
        self
    }

    /// The operation's cancellation token. Cancelling it aborts the enclosing
    /// transaction at the next statement boundary.
    pub fn cancellation(&self) -> &CancellationToken {
        &self.cancel
    }

    /// Errors with `Canceled` or `DeadlineExceeded` if the operation should
    /// stop.
    pub fn ensure_active(&self) -> Result<()> {
        if self.cancel.is_cancelled() {
            return Err(Error::canceled());
        }
        if let Some(deadline) = self.deadline {
            if Instant::now() >= deadline {
                return Err(Error::deadline_exceeded());
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ErrorKind;
    use std::time::Duration;

    #[test]
    fn fresh_context_is_active() {
        assert!(Cx::new().ensure_active().is_ok());
    }

    #[test]
    fn cancellation_surfaces_as_canceled() {
        let cx = Cx::new();
        cx.cancellation().cancel();
        assert_eq!(
            cx.ensure_active().unwrap_err().kind(),
            ErrorKind::Canceled
        );
    }

    #[tokio::test(start_paused = true)]
    async fn passed_deadline_surfaces_as_deadline_exceeded() {
        let cx = Cx::new().with_deadline(Instant::now() + Duration::from_secs(1));
        assert!(cx.ensure_active().is_ok());

        tokio::time::advance(Duration::from_secs(2)).await;
        assert_eq!(
            cx.ensure_active().unwrap_err().kind(),
            ErrorKind::DeadlineExceeded
        );
    }
}
