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

//! Volatile bounded FIFO queue.

use std::collections::VecDeque;

use async_trait::async_trait;
use bytes::Bytes;
use parking_lot::Mutex;
use tokio_util::sync::CancellationToken;

use crate::{
    Result,
    config::has_room,
    error::ClosedSnafu,
    queue::Queue,
    signal::{Interest, Signal},
};

struct Ring {
    items:  VecDeque<Bytes>,
    closed: bool,
}

/// An in-memory FIFO queue with the same blocking contract as the disk
/// engines.
pub struct FifoMemoryQueue {
    ring:     Mutex<Ring>,
    signal:   Signal,
    capacity: Option<usize>,
}

impl FifoMemoryQueue {
    /// Create a queue holding at most `capacity` items (`None` is unbounded).
    #[must_use]
    pub fn new(capacity: Option<usize>) -> Self {
        let items = capacity.map_or_else(VecDeque::new, VecDeque::with_capacity);
        Self {
            ring: Mutex::new(Ring {
                items,
                closed: false,
            }),
            signal: Signal::new(),
            capacity,
        }
    }

    fn try_put(&self, data: &Bytes) -> Result<Option<()>> {
        let mut ring = self.ring.lock();
        if ring.closed {
            return ClosedSnafu.fail();
        }
        if !has_room(self.capacity, ring.items.len()) {
            return Ok(None);
        }
        ring.items.push_back(data.clone());
        Ok(Some(()))
    }

    fn try_get(&self) -> Result<Option<Bytes>> {
        let mut ring = self.ring.lock();
        if ring.closed {
            return ClosedSnafu.fail();
        }
        Ok(ring.items.pop_front())
    }
}

#[async_trait]
impl Queue for FifoMemoryQueue {
    async fn get(&self, token: Option<&CancellationToken>) -> Result<Bytes> {
        let data = self
            .signal
            .wait_for(Interest::Readable, token, || self.try_get())
            .await?;
        self.signal.notify_writable();
        Ok(data)
    }

    async fn put(&self, token: Option<&CancellationToken>, data: Bytes) -> Result<()> {
        self.signal
            .wait_for(Interest::Writable, token, || self.try_put(&data))
            .await?;
        self.signal.notify_readable();
        Ok(())
    }

    fn len(&self) -> usize { self.ring.lock().items.len() }

    fn close(&self) -> Result<()> {
        let mut ring = self.ring.lock();
        if !ring.closed {
            ring.closed = true;
            self.signal.close();
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::QueueError;

    #[tokio::test]
    async fn test_strict_arrival_order() {
        let queue = FifoMemoryQueue::new(Some(8));
        for msg in ["a", "b", "c"] {
            queue.put(None, Bytes::from(msg)).await.unwrap();
        }
        assert_eq!(queue.get(None).await.unwrap(), "a");
        assert_eq!(queue.get(None).await.unwrap(), "b");
        queue.put(None, Bytes::from("d")).await.unwrap();
        assert_eq!(queue.get(None).await.unwrap(), "c");
        assert_eq!(queue.get(None).await.unwrap(), "d");
    }

    #[tokio::test]
    async fn test_closed_keeps_items_unreachable() {
        let queue = FifoMemoryQueue::new(None);
        queue.put(None, Bytes::from("x")).await.unwrap();
        queue.close().unwrap();
        assert_eq!(queue.len(), 1);
        assert!(matches!(
            queue.get(None).await,
            Err(QueueError::Closed { .. })
        ));
    }
}
