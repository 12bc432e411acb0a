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

//! Volatile bounded LIFO stack coordinated by a pair of counting semaphores.
//!
//! - `slots` holds one permit per free position. Writers take a permit before
//!   pushing; readers return one after popping.
//! - `items` holds one permit per readable entry. Writers add a permit after
//!   pushing; readers take one before popping.
//!
//! Probe calls use `try_acquire` and blocking calls race `acquire` against
//! their token, so both modes keep the same permit accounting. Closing closes
//! both semaphores, which fails every pending and future acquire.

use async_trait::async_trait;
use bytes::Bytes;
use parking_lot::Mutex;
use tokio::sync::{Semaphore, SemaphorePermit, TryAcquireError};
use tokio_util::sync::CancellationToken;

use crate::{
    QueueError, Result,
    error::{CancelledSnafu, ClosedSnafu, EmptySnafu, FullSnafu},
    queue::Queue,
};

/// An in-memory LIFO stack with the same blocking contract as the disk
/// engines.
pub struct LifoMemoryQueue {
    stack: Mutex<Vec<Bytes>>,
    slots: Semaphore,
    items: Semaphore,
}

impl LifoMemoryQueue {
    /// Create a stack holding at most `capacity` items (`None` is unbounded).
    #[must_use]
    pub fn new(capacity: Option<usize>) -> Self {
        let (stack, slots) = match capacity {
            Some(capacity) => (Vec::with_capacity(capacity), capacity),
            None => (Vec::new(), Semaphore::MAX_PERMITS),
        };
        Self {
            stack: Mutex::new(stack),
            slots: Semaphore::new(slots),
            items: Semaphore::new(0),
        }
    }

    fn is_closed(&self) -> bool { self.items.is_closed() }
}

async fn acquire<'a>(
    semaphore: &'a Semaphore,
    token: Option<&CancellationToken>,
    exhausted: fn() -> QueueError,
) -> Result<SemaphorePermit<'a>> {
    let Some(token) = token else {
        return semaphore.try_acquire().map_err(|e| match e {
            TryAcquireError::Closed => ClosedSnafu.build(),
            TryAcquireError::NoPermits => exhausted(),
        });
    };

    tokio::select! {
        permit = semaphore.acquire() => permit.map_err(|_| ClosedSnafu.build()),
        () = token.cancelled() => CancelledSnafu.fail(),
    }
}

#[async_trait]
impl Queue for LifoMemoryQueue {
    async fn get(&self, token: Option<&CancellationToken>) -> Result<Bytes> {
        let permit = acquire(&self.items, token, || EmptySnafu.build()).await?;
        let mut stack = self.stack.lock();
        if self.is_closed() {
            return ClosedSnafu.fail();
        }
        // An item permit is only ever issued after its push.
        let Some(data) = stack.pop() else {
            return EmptySnafu.fail();
        };
        // Permits move under the lock so they always agree with `len`.
        permit.forget();
        self.slots.add_permits(1);
        Ok(data)
    }

    async fn put(&self, token: Option<&CancellationToken>, data: Bytes) -> Result<()> {
        let permit = acquire(&self.slots, token, || FullSnafu.build()).await?;
        let mut stack = self.stack.lock();
        if self.is_closed() {
            return ClosedSnafu.fail();
        }
        stack.push(data);
        permit.forget();
        self.items.add_permits(1);
        Ok(())
    }

    fn len(&self) -> usize { self.stack.lock().len() }

    fn close(&self) -> Result<()> {
        let _stack = self.stack.lock();
        self.slots.close();
        self.items.close();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::{
        sync::{
            Arc,
            atomic::{AtomicBool, Ordering},
        },
        time::Duration,
    };

    use super::*;

    #[tokio::test]
    async fn test_stack_order() {
        let queue = LifoMemoryQueue::new(Some(4));
        for msg in ["a", "b", "c"] {
            queue.put(None, Bytes::from(msg)).await.unwrap();
        }
        assert_eq!(queue.get(None).await.unwrap(), "c");
        queue.put(None, Bytes::from("d")).await.unwrap();
        assert_eq!(queue.get(None).await.unwrap(), "d");
        assert_eq!(queue.get(None).await.unwrap(), "b");
        assert_eq!(queue.get(None).await.unwrap(), "a");
    }

    #[tokio::test]
    async fn test_probe_and_blocking_share_permits() {
        let queue = Arc::new(LifoMemoryQueue::new(Some(1)));
        let token = CancellationToken::new();

        // Blocking reader parks on `items`.
        let reader = {
            let queue = queue.clone();
            let token = token.clone();
            tokio::spawn(async move { queue.get(Some(&token)).await })
        };
        tokio::time::sleep(Duration::from_millis(10)).await;

        // A probe writer fills the only slot and releases the reader.
        queue.put(None, Bytes::from("x")).await.unwrap();
        assert_eq!(reader.await.unwrap().unwrap(), "x");

        // The slot came back, so a second probe write succeeds.
        queue.put(None, Bytes::from("y")).await.unwrap();
        assert!(matches!(
            queue.put(None, Bytes::from("z")).await,
            Err(QueueError::Full { .. })
        ));
        assert_eq!(queue.get(None).await.unwrap(), "y");
        assert!(matches!(
            queue.get(None).await,
            Err(QueueError::Empty { .. })
        ));
    }

    #[tokio::test]
    async fn test_cancelled_put_returns_no_permit() {
        let queue = Arc::new(LifoMemoryQueue::new(Some(1)));
        queue.put(None, Bytes::from("full")).await.unwrap();

        let token = CancellationToken::new();
        let writer = {
            let queue = queue.clone();
            let token = token.clone();
            tokio::spawn(async move { queue.put(Some(&token), Bytes::from("late")).await })
        };
        tokio::time::sleep(Duration::from_millis(10)).await;
        token.cancel();
        assert!(matches!(
            writer.await.unwrap(),
            Err(QueueError::Cancelled { .. })
        ));

        assert_eq!(queue.len(), 1);
        assert_eq!(queue.get(None).await.unwrap(), "full");
        queue.put(None, Bytes::from("again")).await.unwrap();
    }

    #[tokio::test]
    async fn test_close_wakes_waiters() {
        let queue = Arc::new(LifoMemoryQueue::new(None));
        let token = CancellationToken::new();
        let reader = {
            let queue = queue.clone();
            let token = token.clone();
            tokio::spawn(async move { queue.get(Some(&token)).await })
        };
        tokio::time::sleep(Duration::from_millis(10)).await;
        queue.close().unwrap();
        assert!(reader.await.unwrap().unwrap_err().is_closed());
        assert!(
            queue
                .put(None, Bytes::from("x"))
                .await
                .unwrap_err()
                .is_closed()
        );
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_permits_track_len() {
        const CAPACITY: usize = 4096;
        let queue = Arc::new(LifoMemoryQueue::new(Some(CAPACITY)));
        let done = Arc::new(AtomicBool::new(false));

        let observer = {
            let queue = queue.clone();
            let done = done.clone();
            std::thread::spawn(move || {
                while !done.load(Ordering::Acquire) {
                    let stack = queue.stack.lock();
                    // Producers only: every pushed item has its permit.
                    assert_eq!(queue.items.available_permits(), stack.len());
                }
            })
        };

        let mut producers = Vec::new();
        for _ in 0..4 {
            let queue = queue.clone();
            producers.push(tokio::spawn(async move {
                for i in 0..CAPACITY / 4 {
                    queue.put(None, Bytes::from(i.to_string())).await.unwrap();
                }
            }));
        }
        for producer in producers {
            producer.await.unwrap();
        }
        done.store(true, Ordering::Release);
        observer.join().unwrap();

        assert_eq!(queue.len(), CAPACITY);
        assert_eq!(queue.slots.available_permits(), 0);

        let done = Arc::new(AtomicBool::new(false));
        let observer = {
            let queue = queue.clone();
            let done = done.clone();
            std::thread::spawn(move || {
                while !done.load(Ordering::Acquire) {
                    let stack = queue.stack.lock();
                    // Consumers only: every popped item has returned its slot.
                    assert_eq!(queue.slots.available_permits() + stack.len(), CAPACITY);
                }
            })
        };

        let mut consumers = Vec::new();
        for _ in 0..4 {
            let queue = queue.clone();
            consumers.push(tokio::spawn(async move {
                for _ in 0..CAPACITY / 4 {
                    queue.get(None).await.unwrap();
                }
            }));
        }
        for consumer in consumers {
            consumer.await.unwrap();
        }
        done.store(true, Ordering::Release);
        observer.join().unwrap();

        assert!(queue.is_empty());
        assert_eq!(queue.slots.available_permits(), CAPACITY);
    }
}
