use std::time::Duration;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;

/// Why a wait on a completion signal did not produce a value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WaitError {
    /// The deadline elapsed before the signal resolved.
    Timeout,
    /// The external cancellation fired, or the signal's owner cancelled
    /// all waiters (e.g. registry eviction).
    Cancelled,
}

#[derive(Clone)]
enum CompletionState<T> {
    Pending,
    Resolved(T),
    Cancelled,
}

/// A write-once cell that any number of tasks can await.
///
/// Resolution and cancellation are both terminal: the first transition
/// wins and later ones are no-ops. Waiters that subscribe after the
/// transition observe it immediately.
pub struct CompletionSignal<T> {
    tx: watch::Sender<CompletionState<T>>,
}

impl<T: Clone> CompletionSignal<T> {
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(CompletionState::Pending);
        Self { tx }
    }

    /// Resolve the signal, waking all waiters. Returns `false` if the
    /// signal had already resolved or been cancelled.
    pub fn resolve(&self, value: T) -> bool {
        self.tx.send_if_modified(|state| {
            if matches!(state, CompletionState::Pending) {
                *state = CompletionState::Resolved(value);
                true
            } else {
                false
            }
        })
    }

    /// Fail all current and future waiters with `WaitError::Cancelled`.
    /// A no-op if the signal already resolved.
    pub fn cancel(&self) -> bool {
        self.tx.send_if_modified(|state| {
            if matches!(state, CompletionState::Pending) {
                *state = CompletionState::Cancelled;
                true
            } else {
                false
            }
        })
    }

    pub fn is_resolved(&self) -> bool {
        matches!(&*self.tx.borrow(), CompletionState::Resolved(_))
    }

    /// The resolved value, if any.
    pub fn peek(&self) -> Option<T> {
        match &*self.tx.borrow() {
            CompletionState::Resolved(value) => Some(value.clone()),
            _ => None,
        }
    }

    /// Wait until the signal resolves, the `timeout` elapses or `cancel`
    /// fires, whichever is first.
    pub async fn wait(
        &self,
        timeout: Duration,
        cancel: &CancellationToken,
    ) -> Result<T, WaitError> {
        let mut rx = self.tx.subscribe();
        let sleep = tokio::time::sleep(timeout);
        tokio::pin!(sleep);

        loop {
            {
                let state = rx.borrow_and_update();
                match &*state {
                    CompletionState::Resolved(value) => return Ok(value.clone()),
                    CompletionState::Cancelled => return Err(WaitError::Cancelled),
                    CompletionState::Pending => {}
                }
            }

            tokio::select! {
                _ = &mut sleep => return Err(WaitError::Timeout),
                _ = cancel.cancelled() => return Err(WaitError::Cancelled),
                changed = rx.changed() => {
                    if changed.is_err() {
                        // Sender dropped without resolving.
                        return Err(WaitError::Cancelled);
                    }
                }
            }
        }
    }
}

impl<T: Clone> Default for CompletionSignal<T> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn resolve_wakes_multiple_waiters() {
        let signal = std::sync::Arc::new(CompletionSignal::new());
        let cancel = CancellationToken::new();

        let waiters: Vec<_> = (0..3)
            .map(|_| {
                let signal = signal.clone();
                let cancel = cancel.clone();
                tokio::spawn(async move {
                    signal.wait(Duration::from_secs(5), &cancel).await
                })
            })
            .collect();

        assert!(signal.resolve(42));

        for waiter in waiters {
            assert_eq!(waiter.await.unwrap(), Ok(42));
        }
    }

    #[tokio::test]
    async fn wait_after_resolution_returns_immediately() {
        let signal = CompletionSignal::new();
        signal.resolve("done");
        let cancel = CancellationToken::new();
        assert_eq!(
            signal.wait(Duration::from_millis(1), &cancel).await,
            Ok("done")
        );
    }

    #[tokio::test(start_paused = true)]
    async fn timeout_fires_when_unresolved() {
        let signal: CompletionSignal<u8> = CompletionSignal::new();
        let cancel = CancellationToken::new();
        assert_eq!(
            signal.wait(Duration::from_millis(50), &cancel).await,
            Err(WaitError::Timeout)
        );
    }

    #[tokio::test]
    async fn cancellation_token_beats_timeout() {
        let signal: CompletionSignal<u8> = CompletionSignal::new();
        let cancel = CancellationToken::new();
        cancel.cancel();
        assert_eq!(
            signal.wait(Duration::from_secs(10), &cancel).await,
            Err(WaitError::Cancelled)
        );
    }

    #[tokio::test]
    async fn cancel_is_terminal_and_resolution_wins_races() {
        let signal = CompletionSignal::new();
        assert!(signal.resolve(1));
        // Later cancellation cannot overwrite the resolution.
        assert!(!signal.cancel());
        assert_eq!(signal.peek(), Some(1));

        let other: CompletionSignal<u8> = CompletionSignal::new();
        assert!(other.cancel());
        assert!(!other.resolve(2));
        assert!(other.peek().is_none());
    }
}
