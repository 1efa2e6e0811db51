//! One attempt at a time, shared by every caller that asks while it runs.

use futures_util::future::{BoxFuture, FutureExt, Shared};
use std::sync::{Mutex, PoisonError};

use super::AuthError;

type SharedAttempt<T> = Shared<BoxFuture<'static, Result<T, AuthError>>>;

enum Slot<T> {
    Empty,
    Pending {
        attempt: u64,
        future: SharedAttempt<T>,
        /// Value to fall back to if this attempt fails
        previous: Option<T>,
    },
    Ready(T),
}

impl<T> Default for Slot<T> {
    fn default() -> Self {
        Slot::Empty
    }
}

struct State<T> {
    slot: Slot<T>,
    attempts: u64,
}

/// A memoized value produced by at most one in-flight attempt.
///
/// A stored value is handed out while the caller's freshness check accepts
/// it. Otherwise one attempt is started and every concurrent caller awaits it.
/// A failed attempt reaches all of its waiters and then restores whatever was
/// stored before, so the next call tries again.
pub(crate) struct SingleFlight<T> {
    state: Mutex<State<T>>,
}

impl<T> SingleFlight<T>
where
    T: Clone + Send + Sync + 'static,
{
    pub(crate) fn new() -> Self {
        Self::with_slot(Slot::Empty)
    }

    pub(crate) fn ready(value: T) -> Self {
        Self::with_slot(Slot::Ready(value))
    }

    fn with_slot(slot: Slot<T>) -> Self {
        Self {
            state: Mutex::new(State { slot, attempts: 0 }),
        }
    }

    /// The stored value, if any, regardless of freshness
    pub(crate) fn current(&self) -> Option<T> {
        let state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        match &state.slot {
            Slot::Ready(value) => Some(value.clone()),
            Slot::Pending { previous, .. } => previous.clone(),
            Slot::Empty => None,
        }
    }

    /// Return the stored value if `is_fresh` accepts it, otherwise join or
    /// start an attempt built by `start`
    pub(crate) async fn get_or_start<F>(
        &self,
        is_fresh: impl Fn(&T) -> bool,
        start: F,
    ) -> Result<T, AuthError>
    where
        F: FnOnce() -> BoxFuture<'static, Result<T, AuthError>>,
    {
        let (attempt, future) = {
            let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);

            let in_flight = match &state.slot {
                Slot::Ready(value) if is_fresh(value) => return Ok(value.clone()),
                Slot::Pending {
                    attempt, future, ..
                } => Some((*attempt, future.clone())),
                Slot::Ready(_) | Slot::Empty => None,
            };

            match in_flight {
                Some(pending) => pending,
                None => {
                    state.attempts += 1;
                    let attempt = state.attempts;
                    let previous = match std::mem::take(&mut state.slot) {
                        Slot::Ready(value) => Some(value),
                        _ => None,
                    };

                    let future = start().shared();
                    state.slot = Slot::Pending {
                        attempt,
                        future: future.clone(),
                        previous,
                    };
                    (attempt, future)
                }
            }
        };

        let result = future.await;

        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        let settles_current =
            matches!(&state.slot, Slot::Pending { attempt: current, .. } if *current == attempt);
        if settles_current {
            let previous = match std::mem::take(&mut state.slot) {
                Slot::Pending { previous, .. } => previous,
                _ => None,
            };
            state.slot = match &result {
                Ok(value) => Slot::Ready(value.clone()),
                Err(_) => previous.map(Slot::Ready).unwrap_or_default(),
            };
        }

        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use std::time::Duration;

    fn counted(calls: &Arc<AtomicUsize>, value: u32) -> BoxFuture<'static, Result<u32, AuthError>> {
        let calls = Arc::clone(calls);
        async move {
            calls.fetch_add(1, Ordering::SeqCst);
            tokio::time::sleep(Duration::from_millis(20)).await;
            Ok(value)
        }
        .boxed()
    }

    #[tokio::test]
    async fn test_stale_value_is_replaced_once() {
        let flight = SingleFlight::ready(1u32);
        let calls = Arc::new(AtomicUsize::new(0));

        let (a, b) = tokio::join!(
            flight.get_or_start(|v| *v > 1, || counted(&calls, 2)),
            flight.get_or_start(|v| *v > 1, || counted(&calls, 3)),
        );

        assert_eq!((a.unwrap(), b.unwrap()), (2, 2));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(flight.current(), Some(2));
    }

    #[tokio::test]
    async fn test_failure_restores_previous_value() {
        let flight = SingleFlight::ready(1u32);

        let result = flight
            .get_or_start(
                |_| false,
                || async { Err(AuthError::Network("down".into())) }.boxed(),
            )
            .await;

        assert!(result.is_err());
        assert_eq!(flight.current(), Some(1));
    }
}
