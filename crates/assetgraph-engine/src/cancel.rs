//! Run-wide cancellation and deadline

use futures::future::select_all;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::time::Instant;

/// Cancellation signal shared by every task of a run
///
/// Clones observe the same signal. A [`child`](CancelSignal::child) also
/// observes its parent, but cancelling the child leaves the parent alone.
#[derive(Debug, Clone)]
pub struct CancelSignal {
    /// Own flag last, ancestors before it
    flags: Vec<Arc<watch::Sender<bool>>>,
    deadline: Option<Instant>,
}

impl CancelSignal {
    pub fn new() -> Self {
        let (sender, _) = watch::channel(false);
        Self {
            flags: vec![Arc::new(sender)],
            deadline: None,
        }
    }

    /// Cancel automatically once `timeout` has elapsed from now
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        let deadline = Instant::now() + timeout;
        self.deadline = Some(match self.deadline {
            Some(existing) => existing.min(deadline),
            None => deadline,
        });
        self
    }

    /// Derive a signal that is cancelled with this one, but not vice versa
    pub fn child(&self) -> Self {
        let (sender, _) = watch::channel(false);
        let mut flags = self.flags.clone();
        flags.push(Arc::new(sender));
        Self {
            flags,
            deadline: self.deadline,
        }
    }

    pub fn cancel(&self) {
        if let Some(own) = self.flags.last() {
            own.send_replace(true);
        }
    }

    pub fn is_cancelled(&self) -> bool {
        self.flags.iter().any(|flag| *flag.borrow())
            || self.deadline.is_some_and(|deadline| Instant::now() >= deadline)
    }

    /// Deadline, if one is set
    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    /// Complete once the signal is cancelled or the deadline passes
    pub async fn cancelled(&self) {
        let mut receivers: Vec<_> = self.flags.iter().map(|flag| flag.subscribe()).collect();
        let waits = receivers.iter_mut().map(|rx| {
            Box::pin(async move {
                // The sender outlives this future, so an error cannot happen here.
                let _ = rx.wait_for(|cancelled| *cancelled).await;
            })
        });
        let any_flag = select_all(waits);

        match self.deadline {
            Some(deadline) => {
                tokio::select! {
                    _ = any_flag => {}
                    _ = tokio::time::sleep_until(deadline) => {}
                }
            }
            None => {
                any_flag.await;
            }
        }
    }
}

impl Default for CancelSignal {
    fn default() -> Self {
        Self::new()
    }
}
