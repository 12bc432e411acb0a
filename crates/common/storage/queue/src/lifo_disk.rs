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

//! Durable last-in-first-out stack over a single file.
//!
//! ```text
//!   0                          boundary
//!   ├── live reverse frames ───────┤── free (stale bytes) ──┤
//! ```
//!
//! Push writes `[payload][length]` at the live boundary; pop reads the length
//! just below the boundary and moves the boundary back over the record, so
//! popped space is overwritten by later pushes. A non-empty `close` truncates
//! at the boundary and appends the `"<pending>"` footer.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use bytes::Bytes;
use parking_lot::Mutex;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::{
    FlushMode, Result,
    checkpoint::{self, LifoCheckpoint},
    codec::{encode_reverse, read_reverse_at},
    config::has_room,
    error::ClosedSnafu,
    file::DataFile,
    queue::Queue,
    signal::{Interest, Signal},
};

struct LifoState {
    /// Released once `close` has checkpointed or removed the file.
    file:     Option<DataFile>,
    closed:   bool,
    /// End of the live records; everything past it is free.
    boundary: u64,
    pending:  usize,
}

/// A disk-backed LIFO queue.
pub struct LifoDiskQueue {
    state:      Mutex<LifoState>,
    signal:     Signal,
    path:       PathBuf,
    capacity:   Option<usize>,
    flush_mode: FlushMode,
}

impl LifoDiskQueue {
    /// Open (or create) an unbounded stack at `path`.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        Self::with_options(path, None, FlushMode::default())
    }

    pub fn with_options<P: AsRef<Path>>(
        path: P,
        capacity: Option<usize>,
        flush_mode: FlushMode,
    ) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let mut file = DataFile::open(&path)?;
        let recovered = checkpoint::recover::<LifoCheckpoint>(&mut file)?;

        info!(
            path = ?path,
            pending = recovered.checkpoint.pending,
            boundary = recovered.data_end,
            "LIFO disk queue opened"
        );

        Ok(Self {
            state: Mutex::new(LifoState {
                file:     Some(file),
                closed:   false,
                boundary: recovered.data_end,
                pending:  recovered.checkpoint.pending,
            }),
            signal: Signal::new(),
            path,
            capacity,
            flush_mode,
        })
    }

    pub fn path(&self) -> &Path { &self.path }

    fn try_put(&self, frame: &[u8]) -> Result<Option<()>> {
        let mut guard = self.state.lock();
        let state = &mut *guard;
        if state.closed {
            return ClosedSnafu.fail();
        }
        let Some(file) = state.file.as_mut() else {
            return ClosedSnafu.fail();
        };
        if !has_room(self.capacity, state.pending) {
            return Ok(None);
        }

        file.write_at(state.boundary, frame)?;
        file.flush(self.flush_mode)?;
        state.boundary += frame.len() as u64;
        state.pending += 1;
        Ok(Some(()))
    }

    fn try_get(&self) -> Result<Option<Bytes>> {
        let mut guard = self.state.lock();
        let state = &mut *guard;
        if state.closed {
            return ClosedSnafu.fail();
        }
        let Some(file) = state.file.as_mut() else {
            return ClosedSnafu.fail();
        };
        if state.pending == 0 {
            return Ok(None);
        }

        let (payload, start) = read_reverse_at(file, state.boundary)?;
        state.boundary = start;
        state.pending -= 1;
        Ok(Some(payload))
    }
}

#[async_trait]
impl Queue for LifoDiskQueue {
    async fn get(&self, token: Option<&CancellationToken>) -> Result<Bytes> {
        let payload = self
            .signal
            .wait_for(Interest::Readable, token, || self.try_get())
            .await?;
        self.signal.notify_writable();
        Ok(payload)
    }

    async fn put(&self, token: Option<&CancellationToken>, data: Bytes) -> Result<()> {
        let frame = encode_reverse(&data)?;
        self.signal
            .wait_for(Interest::Writable, token, || self.try_put(&frame))
            .await?;
        self.signal.notify_readable();
        Ok(())
    }

    fn len(&self) -> usize { self.state.lock().pending }

    fn close(&self) -> Result<()> {
        let mut guard = self.state.lock();
        let state = &mut *guard;
        if !state.closed {
            state.closed = true;
            self.signal.close();
        }
        // The handle is kept until the checkpoint lands, so a failed close
        // can be retried.
        let Some(file) = state.file.as_mut() else {
            return Ok(());
        };

        if state.pending == 0 {
            info!(path = ?self.path, "LIFO disk queue drained, removing backing file");
            return state.file.take().map_or(Ok(()), DataFile::remove);
        }

        // Drop stale bytes left beyond the boundary by earlier, larger pushes.
        file.truncate(state.boundary)?;
        let checkpoint = LifoCheckpoint {
            pending: state.pending,
        };
        checkpoint::write(file, state.boundary, &checkpoint)?;
        state.file = None;
        info!(
            path = ?self.path,
            pending = checkpoint.pending,
            boundary = state.boundary,
            "LIFO disk queue checkpointed"
        );
        Ok(())
    }
}

impl Drop for LifoDiskQueue {
    fn drop(&mut self) {
        if let Err(e) = self.close() {
            warn!(path = ?self.path, error = %e, "Failed to close LIFO disk queue on drop");
        }
    }
}
