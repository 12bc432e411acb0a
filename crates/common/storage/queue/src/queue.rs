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

//! The contract every engine implements.
//!
//! ## Usage
//!
//! ```ignore
//! let queue = QueueBuilder::fifo().on_disk("/var/lib/app/jobs.q").build()?;
//!
//! // Probe mode: fails fast with `Empty` / `Full`.
//! queue.put(None, Bytes::from("job-1")).await?;
//!
//! // Blocking mode: waits until an item arrives, the token fires, or the
//! // queue is closed.
//! let token = CancellationToken::new();
//! let job = queue.get(Some(&token)).await?;
//!
//! // Checkpoint (or discard, when empty) and release the file.
//! queue.close()?;
//! ```

use async_trait::async_trait;
use bytes::Bytes;
use tokio_util::sync::CancellationToken;

use crate::Result;

/// A work queue.
///
/// Calls without a token are *probe* calls: they attempt once and return
/// [`Empty`](crate::QueueError::Empty) or [`Full`](crate::QueueError::Full)
/// instead of waiting. Calls with a token suspend until they can proceed, the
/// token is cancelled ([`Cancelled`](crate::QueueError::Cancelled)), or the
/// queue is closed ([`Closed`](crate::QueueError::Closed)).
///
/// After [`close`](Queue::close) every `get`/`put` fails with `Closed`;
/// closing again is a no-op.
#[async_trait]
pub trait Queue: Send + Sync {
    /// Remove and return the next item.
    async fn get(&self, token: Option<&CancellationToken>) -> Result<Bytes>;

    /// Add an item.
    async fn put(&self, token: Option<&CancellationToken>, data: Bytes) -> Result<()>;

    /// Number of pending items.
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool { self.len() == 0 }

    /// Close the queue. Idempotent.
    fn close(&self) -> Result<()>;
}
