// Copyright 2025 Crrow
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//      http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Wait/wake coordination shared by the mutex-guarded engines.
//!
//! A [`Signal`] pairs two [`Notify`]s (readable, writable) with a
//! [`CancellationToken`] that is cancelled exactly once, when the engine
//! closes. [`Signal::wait_for`] runs an attempt closure under the engine's own
//! locking and, in blocking mode, parks until one of three things happens:
//! the relevant side is notified, the caller's token fires, or the engine
//! closes. Wake-ups are broadcast and not FIFO-fair.

use std::pin::pin;

use tokio::sync::Notify;
use tokio_util::sync::CancellationToken;

use crate::{
    Result,
    error::{CancelledSnafu, ClosedSnafu, EmptySnafu, FullSnafu},
};

/// Which side of the queue a caller is waiting on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Interest {
    /// Waiting for an item (`get`).
    Readable,
    /// Waiting for free capacity (`put`).
    Writable,
}

#[derive(Debug, Default)]
pub(crate) struct Signal {
    readable: Notify,
    writable: Notify,
    closed:   CancellationToken,
}

impl Signal {
    pub(crate) fn new() -> Self { Self::default() }

    /// Run `attempt` until it yields a value.
    ///
    /// `attempt` returns `Ok(None)` when the operation cannot proceed yet.
    /// Without a token that is reported immediately as `Empty` / `Full`;
    /// with a token the caller suspends and retries after the next wake-up.
    pub(crate) async fn wait_for<T, F>(
        &self,
        interest: Interest,
        token: Option<&CancellationToken>,
        mut attempt: F,
    ) -> Result<T>
    where
        F: FnMut() -> Result<Option<T>>,
    {
        let notify = match interest {
            Interest::Readable => &self.readable,
            Interest::Writable => &self.writable,
        };

        loop {
            // Register before checking state so a wake-up in between is kept.
            let mut notified = pin!(notify.notified());
            notified.as_mut().enable();

            if let Some(value) = attempt()? {
                return Ok(value);
            }

            let Some(token) = token else {
                return match interest {
                    Interest::Readable => EmptySnafu.fail(),
                    Interest::Writable => FullSnafu.fail(),
                };
            };

            tokio::select! {
                () = &mut notified => {}
                () = token.cancelled() => return CancelledSnafu.fail(),
                () = self.closed.cancelled() => return ClosedSnafu.fail(),
            }
        }
    }

    /// Wake callers waiting for an item.
    pub(crate) fn notify_readable(&self) { self.readable.notify_waiters(); }

    /// Wake callers waiting for capacity.
    pub(crate) fn notify_writable(&self) { self.writable.notify_waiters(); }

    /// Broadcast the one-time closed transition.
    pub(crate) fn close(&self) { self.closed.cancel(); }
}

#[cfg(test)]
mod tests {
    use std::{
        sync::{
            Arc,
            atomic::{AtomicUsize, Ordering},
        },
        time::Duration,
    };

    use super::*;
    use crate::QueueError;

    #[tokio::test]
    async fn test_probe_reports_empty_and_full() {
        let signal = Signal::new();
        let err = signal
            .wait_for(Interest::Readable, None, || Ok(None::<()>))
            .await
            .unwrap_err();
        assert!(matches!(err, QueueError::Empty { .. }));

        let err = signal
            .wait_for(Interest::Writable, None, || Ok(None::<()>))
            .await
            .unwrap_err();
        assert!(matches!(err, QueueError::Full { .. }));
    }

    #[tokio::test]
    async fn test_attempt_error_propagates() {
        let signal = Signal::new();
        let token = CancellationToken::new();
        let err = signal
            .wait_for(Interest::Readable, Some(&token), || {
                ClosedSnafu.fail::<Option<()>>()
            })
            .await
            .unwrap_err();
        assert!(err.is_closed());
    }

    #[tokio::test]
    async fn test_notify_wakes_blocked_waiter() {
        let signal = Arc::new(Signal::new());
        let ready = Arc::new(AtomicUsize::new(0));
        let token = CancellationToken::new();

        let waiter = {
            let signal = signal.clone();
            let ready = ready.clone();
            let token = token.clone();
            tokio::spawn(async move {
                signal
                    .wait_for(Interest::Readable, Some(&token), || {
                        Ok((ready.load(Ordering::SeqCst) > 0).then_some(7))
                    })
                    .await
            })
        };

        tokio::time::sleep(Duration::from_millis(20)).await;
        ready.store(1, Ordering::SeqCst);
        signal.notify_readable();

        assert_eq!(waiter.await.unwrap().unwrap(), 7);
    }

    #[tokio::test]
    async fn test_cancel_and_close_release_waiters() {
        let signal = Arc::new(Signal::new());

        let token = CancellationToken::new();
        let cancelled = {
            let signal = signal.clone();
            let token = token.clone();
            tokio::spawn(async move {
                signal
                    .wait_for(Interest::Writable, Some(&token), || Ok(None::<()>))
                    .await
            })
        };
        tokio::time::sleep(Duration::from_millis(10)).await;
        token.cancel();
        let err = cancelled.await.unwrap().unwrap_err();
        assert!(matches!(err, QueueError::Cancelled { .. }));

        let other = CancellationToken::new();
        let closed = {
            let signal = signal.clone();
            tokio::spawn(async move {
                signal
                    .wait_for(Interest::Readable, Some(&other), || Ok(None::<()>))
                    .await
            })
        };
        tokio::time::sleep(Duration::from_millis(10)).await;
        signal.close();
        assert!(closed.await.unwrap().unwrap_err().is_closed());
    }
}
