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

//! Priority router over independent queues.
//!
//! Each priority owns its own [`Queue`], created on first `put` by a factory.
//! `get` always drains the highest priority first; a member that runs empty
//! is closed and dropped.

use std::{collections::BTreeMap, sync::Arc};

use bytes::Bytes;
use tokio::sync::Mutex;
use tracing::{debug, warn};

use crate::{
    Result,
    error::{ClosedSnafu, EmptySnafu},
    queue::Queue,
};

/// Creates the queue backing one priority.
pub type QueueFactory = Box<dyn Fn(i64) -> Result<Arc<dyn Queue>> + Send + Sync>;

struct Members {
    queues: BTreeMap<i64, Arc<dyn Queue>>,
    closed: bool,
}

/// Routes items to per-priority queues; higher priorities are served first.
pub struct PriorityQueue {
    members: Mutex<Members>,
    factory: QueueFactory,
}

impl PriorityQueue {
    pub fn new<F>(factory: F) -> Self
    where
        F: Fn(i64) -> Result<Arc<dyn Queue>> + Send + Sync + 'static,
    {
        Self::with_queues(BTreeMap::new(), factory)
    }

    /// Start from already-open member queues, e.g. disk queues recovered at
    /// startup.
    pub fn with_queues<F>(queues: BTreeMap<i64, Arc<dyn Queue>>, factory: F) -> Self
    where
        F: Fn(i64) -> Result<Arc<dyn Queue>> + Send + Sync + 'static,
    {
        Self {
            members: Mutex::new(Members {
                queues,
                closed: false,
            }),
            factory: Box::new(factory),
        }
    }

    /// Put `data` at `priority` (probe mode on the member queue).
    pub async fn put(&self, data: Bytes, priority: i64) -> Result<()> {
        let mut members = self.members.lock().await;
        if members.closed {
            return ClosedSnafu.fail();
        }
        let queue = match members.queues.get(&priority) {
            Some(queue) => queue.clone(),
            None => {
                let queue = (self.factory)(priority)?;
                debug!(priority, "Created queue for priority");
                members.queues.insert(priority, queue.clone());
                queue
            }
        };
        queue.put(None, data).await
    }

    /// Take the next item from the highest non-empty priority.
    pub async fn get(&self) -> Result<Bytes> {
        let mut members = self.members.lock().await;
        if members.closed {
            return ClosedSnafu.fail();
        }
        loop {
            let Some((&priority, queue)) = members.queues.last_key_value() else {
                return EmptySnafu.fail();
            };
            let queue = queue.clone();

            // Members handed over at construction may already be empty.
            let data = if queue.is_empty() {
                None
            } else {
                Some(queue.get(None).await?)
            };
            if queue.is_empty() {
                members.queues.remove(&priority);
                // The popped item is already out of the member; hand it back
                // whatever happens to the close.
                match queue.close() {
                    Ok(()) => debug!(priority, "Priority drained, queue closed"),
                    Err(e) => warn!(priority, error = %e, "Failed to close drained priority queue"),
                }
            }
            if let Some(data) = data {
                return Ok(data);
            }
        }
    }

    /// Total pending items across all priorities.
    pub async fn len(&self) -> usize {
        let members = self.members.lock().await;
        members.queues.values().map(|queue| queue.len()).sum()
    }

    pub async fn is_empty(&self) -> bool { self.len().await == 0 }

    /// Close every member queue. Idempotent.
    pub async fn close(&self) -> Result<()> {
        let mut members = self.members.lock().await;
        members.closed = true;
        for queue in members.queues.values() {
            queue.close()?;
        }
        Ok(())
    }
}
