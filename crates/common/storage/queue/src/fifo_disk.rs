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

//! Durable first-in-first-out queue over a single append-only log.
//!
//! ```text
//!   0              read_offset                  write_offset
//!   ├── consumed ──────┼──── pending records ─────────┤ [footer]
//! ```
//!
//! Records are forward frames appended at the write cursor and consumed at
//! an independent read cursor. Consumed bytes are never reclaimed. A
//! non-empty `close` appends the `"<pending>,<read_offset>"` footer; an empty
//! one removes the file.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use bytes::Bytes;
use parking_lot::Mutex;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::{
    FlushMode, Result,
    checkpoint::{self, FifoCheckpoint},
    codec::{encode_forward, read_forward_at},
    config::has_room,
    error::ClosedSnafu,
    file::DataFile,
    queue::Queue,
    signal::{Interest, Signal},
};

struct FifoState {
    /// Released once `close` has checkpointed or removed the file.
    file:         Option<DataFile>,
    closed:       bool,
    /// Physical end of the live data.
    write_offset: u64,
    /// Offset of the next record to read.
    read_offset:  u64,
    pending:      usize,
}

/// A disk-backed FIFO queue.
pub struct FifoDiskQueue {
    state:      Mutex<FifoState>,
    signal:     Signal,
    path:       PathBuf,
    capacity:   Option<usize>,
    flush_mode: FlushMode,
}

impl FifoDiskQueue {
    /// Open (or create) an unbounded queue at `path`.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        Self::with_options(path, None, FlushMode::default())
    }

    /// Open (or create) a queue at `path`, running checkpoint recovery.
    ///
    /// A trailing footer that does not parse fails with
    /// [`CorruptFooter`](crate::QueueError::CorruptFooter).
    pub fn with_options<P: AsRef<Path>>(
        path: P,
        capacity: Option<usize>,
        flush_mode: FlushMode,
    ) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let mut file = DataFile::open(&path)?;
        let recovered = checkpoint::recover::<FifoCheckpoint>(&mut file)?;

        info!(
            path = ?path,
            pending = recovered.checkpoint.pending,
            read_offset = recovered.checkpoint.read_bookmark,
            write_offset = recovered.data_end,
            "FIFO disk queue opened"
        );

        Ok(Self {
            state: Mutex::new(FifoState {
                file:         Some(file),
                closed:       false,
                write_offset: recovered.data_end,
                read_offset:  recovered.checkpoint.read_bookmark,
                pending:      recovered.checkpoint.pending,
            }),
            signal: Signal::new(),
            path,
            capacity,
            flush_mode,
        })
    }

    /// Backing file path.
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

        file.write_at(state.write_offset, frame)?;
        file.flush(self.flush_mode)?;
        state.write_offset += frame.len() as u64;
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

        let (payload, next) = read_forward_at(file, state.read_offset, state.write_offset)?;
        state.read_offset = next;
        state.pending -= 1;
        Ok(Some(payload))
    }
}

#[async_trait]
impl Queue for FifoDiskQueue {
    async fn get(&self, token: Option<&CancellationToken>) -> Result<Bytes> {
        let payload = self
            .signal
            .wait_for(Interest::Readable, token, || self.try_get())
            .await?;
        self.signal.notify_writable();
        Ok(payload)
    }

    async fn put(&self, token: Option<&CancellationToken>, data: Bytes) -> Result<()> {
        let frame = encode_forward(&data)?;
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
            info!(path = ?self.path, "FIFO disk queue drained, removing backing file");
            return state.file.take().map_or(Ok(()), DataFile::remove);
        }

        let checkpoint = FifoCheckpoint {
            pending:       state.pending,
            read_bookmark: state.read_offset,
        };
        checkpoint::write(file, state.write_offset, &checkpoint)?;
        state.file = None;
        info!(
            path = ?self.path,
            pending = checkpoint.pending,
            read_offset = checkpoint.read_bookmark,
            "FIFO disk queue checkpointed"
        );
        Ok(())
    }
}

impl Drop for FifoDiskQueue {
    fn drop(&mut self) {
        if let Err(e) = self.close() {
            warn!(path = ?self.path, error = %e, "Failed to close FIFO disk queue on drop");
        }
    }
}

#[cfg(test)]
mod tests {
    use tempfile::TempDir;

    use super::*;
    use crate::{
        QueueError,
        codec::{decode_reverse, frame_size},
    };

    fn queue_path(temp_dir: &TempDir) -> PathBuf { temp_dir.path().join("fifo.q") }

    #[tokio::test]
    async fn test_order_survives_restart() {
        let temp_dir = TempDir::new().unwrap();
        let path = queue_path(&temp_dir);

        {
            let queue = FifoDiskQueue::open(&path).unwrap();
            for i in 1..=5u8 {
                queue.put(None, Bytes::from(vec![i])).await.unwrap();
            }
            assert_eq!(queue.len(), 5);
            queue.close().unwrap();
        }

        let queue = FifoDiskQueue::open(&path).unwrap();
        assert_eq!(queue.len(), 5);
        for i in 1..=5u8 {
            assert_eq!(queue.get(None).await.unwrap().as_ref(), &[i]);
        }
        assert!(matches!(
            queue.get(None).await,
            Err(QueueError::Empty { .. })
        ));
    }

    #[tokio::test]
    async fn test_partial_consumption_resumes_at_bookmark() {
        let temp_dir = TempDir::new().unwrap();
        let path = queue_path(&temp_dir);

        {
            let queue = FifoDiskQueue::open(&path).unwrap();
            for msg in ["a", "bb", "ccc"] {
                queue.put(None, Bytes::from(msg)).await.unwrap();
            }
            assert_eq!(queue.get(None).await.unwrap(), "a");
            queue.close().unwrap();
        }

        {
            let queue = FifoDiskQueue::open(&path).unwrap();
            assert_eq!(queue.len(), 2);
            queue.put(None, Bytes::from("dddd")).await.unwrap();
            assert_eq!(queue.get(None).await.unwrap(), "bb");
            queue.close().unwrap();
        }

        let queue = FifoDiskQueue::open(&path).unwrap();
        assert_eq!(queue.get(None).await.unwrap(), "ccc");
        assert_eq!(queue.get(None).await.unwrap(), "dddd");
        assert!(queue.is_empty());
    }

    #[tokio::test]
    async fn test_footer_layout() {
        let temp_dir = TempDir::new().unwrap();
        let path = queue_path(&temp_dir);

        let queue = FifoDiskQueue::open(&path).unwrap();
        queue.put(None, Bytes::from("one")).await.unwrap();
        queue.put(None, Bytes::from("two")).await.unwrap();
        queue.get(None).await.unwrap();
        queue.close().unwrap();

        let bytes = std::fs::read(&path).unwrap();
        let data_end = 2 * frame_size(3);
        assert_eq!(&bytes[..4], &[0, 0, 0, 3]);
        assert_eq!(&bytes[4..7], b"one");

        let (footer, start) = decode_reverse(&bytes).unwrap();
        assert_eq!(start, data_end);
        assert_eq!(footer, format!("1,{}", frame_size(3)));
    }

    #[tokio::test]
    async fn test_consumed_space_is_not_reclaimed() {
        let temp_dir = TempDir::new().unwrap();
        let path = queue_path(&temp_dir);

        let queue = FifoDiskQueue::open(&path).unwrap();
        for _ in 0..4 {
            queue.put(None, Bytes::from_static(b"xxxx")).await.unwrap();
            queue.get(None).await.unwrap();
        }
        queue.put(None, Bytes::from_static(b"last")).await.unwrap();
        assert_eq!(std::fs::metadata(&path).unwrap().len(), 5 * frame_size(4));
    }

    #[tokio::test]
    async fn test_empty_close_removes_file() {
        let temp_dir = TempDir::new().unwrap();
        let path = queue_path(&temp_dir);

        let queue = FifoDiskQueue::open(&path).unwrap();
        queue.put(None, Bytes::from("x")).await.unwrap();
        queue.get(None).await.unwrap();
        queue.close().unwrap();
        assert!(!path.exists());

        let queue = FifoDiskQueue::open(&path).unwrap();
        assert_eq!(queue.len(), 0);
        assert_eq!(std::fs::metadata(&path).unwrap().len(), 0);
    }

    #[tokio::test]
    async fn test_drop_checkpoints() {
        let temp_dir = TempDir::new().unwrap();
        let path = queue_path(&temp_dir);

        {
            let queue = FifoDiskQueue::open(&path).unwrap();
            queue.put(None, Bytes::from("kept")).await.unwrap();
        }

        let queue = FifoDiskQueue::open(&path).unwrap();
        assert_eq!(queue.get(None).await.unwrap(), "kept");
    }

    #[test]
    fn test_corrupt_footer_fails_open() {
        let temp_dir = TempDir::new().unwrap();
        let path = queue_path(&temp_dir);

        let mut junk = b"not-a-footer".to_vec();
        junk.extend_from_slice(&12_i32.to_be_bytes());
        std::fs::write(&path, &junk).unwrap();

        let err = FifoDiskQueue::open(&path).err().unwrap();
        assert!(matches!(err, QueueError::CorruptFooter { .. }));
        assert_eq!(std::fs::read(&path).unwrap(), junk);
    }

    #[tokio::test]
    async fn test_every_write_flush_mode() {
        let temp_dir = TempDir::new().unwrap();
        let queue =
            FifoDiskQueue::with_options(queue_path(&temp_dir), Some(2), FlushMode::EveryWrite)
                .unwrap();
        queue.put(None, Bytes::from("a")).await.unwrap();
        queue.put(None, Bytes::from("b")).await.unwrap();
        assert!(matches!(
            queue.put(None, Bytes::from("c")).await,
            Err(QueueError::Full { .. })
        ));
        assert_eq!(queue.get(None).await.unwrap(), "a");
    }

    #[tokio::test]
    async fn test_failed_checkpoint_can_be_retried() {
        let temp_dir = TempDir::new().unwrap();
        let path = queue_path(&temp_dir);

        let queue = FifoDiskQueue::open(&path).unwrap();
        queue.put(None, Bytes::from("kept")).await.unwrap();

        // A read-only handle makes the footer write at close fail.
        let read_only = DataFile::open_existing(&path).unwrap().unwrap();
        let writable = queue.state.lock().file.replace(read_only);
        assert!(queue.close().is_err());
        assert!(queue.get(None).await.unwrap_err().is_closed());
        assert!(
            queue
                .put(None, Bytes::from("late"))
                .await
                .unwrap_err()
                .is_closed()
        );

        queue.state.lock().file = writable;
        queue.close().unwrap();
        queue.close().unwrap();
        drop(queue);

        let queue = FifoDiskQueue::open(&path).unwrap();
        assert_eq!(queue.len(), 1);
        assert_eq!(queue.get(None).await.unwrap(), "kept");
    }
}
