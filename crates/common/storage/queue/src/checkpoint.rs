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

//! Checkpoint footers and crash recovery.
//!
//! A disk engine persists its recovery state as one more reverse frame at the
//! end of its own log, written only by a non-empty `close`:
//!
//! - FIFO: ASCII `"<pending>,<read_bookmark>"`
//! - LIFO: ASCII `"<pending>"`
//!
//! On open the footer is decoded backward from end-of-file, the file is
//! truncated at the footer's start, and the recovered state is returned. An
//! empty file is a fresh queue. Anything else that does not parse is fatal:
//! the store is reported corrupt, never silently reset.

use std::path::Path;

use tracing::{debug, info};

use crate::{
    QueueError, Result,
    codec::{LENGTH_SIZE, encode_reverse, read_reverse_at},
    error::CorruptFooterSnafu,
    file::DataFile,
};

/// Recovery state of the FIFO disk engine.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct FifoCheckpoint {
    /// Items enqueued but not yet dequeued.
    pub pending:       usize,
    /// Byte offset of the next record to read.
    pub read_bookmark: u64,
}

/// Recovery state of the LIFO disk engine.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct LifoCheckpoint {
    /// Items pushed but not yet popped.
    pub pending: usize,
}

/// State recovered from a backing file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Recovered<C> {
    pub checkpoint: C,
    /// End of the live data once the footer has been cut off.
    pub data_end:   u64,
}

/// A footer payload that can be written at close and parsed back at open.
pub trait Checkpoint: Sized + Default + Copy {
    fn encode(&self) -> String;

    /// Parse the footer payload. `data_end` is where the footer started.
    fn parse(text: &str, data_end: u64) -> std::result::Result<Self, String>;
}

impl Checkpoint for FifoCheckpoint {
    fn encode(&self) -> String { format!("{},{}", self.pending, self.read_bookmark) }

    fn parse(text: &str, data_end: u64) -> std::result::Result<Self, String> {
        let fields: Vec<&str> = text.split(',').collect();
        let [pending, read_bookmark] = fields.as_slice() else {
            return Err(format!("expected 2 fields, found {}", fields.len()));
        };
        let pending: usize = parse_decimal(pending, "pending count")?;
        let read_bookmark: u64 = parse_decimal(read_bookmark, "read bookmark")?;

        if read_bookmark > data_end {
            return Err(format!(
                "read bookmark {read_bookmark} is past the end of data {data_end}"
            ));
        }
        if !fits(pending, data_end - read_bookmark) {
            return Err(format!(
                "{pending} pending records cannot fit in {} bytes",
                data_end - read_bookmark
            ));
        }
        Ok(Self {
            pending,
            read_bookmark,
        })
    }
}

impl Checkpoint for LifoCheckpoint {
    fn encode(&self) -> String { self.pending.to_string() }

    fn parse(text: &str, data_end: u64) -> std::result::Result<Self, String> {
        let pending: usize = parse_decimal(text, "pending count")?;
        if !fits(pending, data_end) {
            return Err(format!(
                "{pending} pending records cannot fit in {data_end} bytes"
            ));
        }
        Ok(Self { pending })
    }
}

fn parse_decimal<T: std::str::FromStr>(field: &str, what: &str) -> std::result::Result<T, String> {
    if field.is_empty() || !field.bytes().all(|b| b.is_ascii_digit()) {
        return Err(format!("{what} {field:?} is not a decimal number"));
    }
    field
        .parse()
        .map_err(|_| format!("{what} {field:?} is out of range"))
}

/// Every record costs at least its length field.
fn fits(pending: usize, bytes: u64) -> bool {
    (pending as u64).saturating_mul(LENGTH_SIZE) <= bytes
}

/// Decode and parse the footer at the end of `file` without modifying it.
///
/// An empty file is a fresh queue.
fn read_footer<C: Checkpoint>(file: &mut DataFile) -> Result<Recovered<C>> {
    let len = file.len()?;
    if len == 0 {
        return Ok(Recovered {
            checkpoint: C::default(),
            data_end:   0,
        });
    }

    let (payload, footer_start) = read_reverse_at(file, len).map_err(|e| match e {
        QueueError::CorruptRecord { offset, length, .. } => CorruptFooterSnafu {
            path:   file.path(),
            reason: format!("footer length {length} at offset {offset} is out of bounds"),
        }
        .build(),
        other => other,
    })?;

    let text = std::str::from_utf8(&payload).map_err(|_| {
        CorruptFooterSnafu {
            path:   file.path(),
            reason: "footer is not ASCII",
        }
        .build()
    })?;
    let checkpoint = C::parse(text, footer_start).map_err(|reason| {
        CorruptFooterSnafu {
            path: file.path(),
            reason,
        }
        .build()
    })?;
    debug!(path = ?file.path(), footer = text, footer_start, "Checkpoint footer decoded");

    Ok(Recovered {
        checkpoint,
        data_end: footer_start,
    })
}

/// Recover checkpoint state from `file`, cutting the footer off.
pub fn recover<C: Checkpoint>(file: &mut DataFile) -> Result<Recovered<C>> {
    if file.len()? == 0 {
        info!(path = ?file.path(), "No checkpoint found, starting fresh");
    }
    let recovered = read_footer(file)?;
    file.truncate(recovered.data_end)?;
    Ok(recovered)
}

/// Append `checkpoint` as a reverse frame at `at` and sync the file.
pub fn write<C: Checkpoint>(file: &mut DataFile, at: u64, checkpoint: &C) -> Result<()> {
    let footer = encode_reverse(checkpoint.encode().as_bytes())?;
    file.write_at(at, &footer)?;
    file.sync()
}

/// Read the checkpoint stored at `path` without opening an engine or
/// modifying the file. A missing file is a drained queue.
pub fn validate<C: Checkpoint>(path: &Path) -> Result<C> {
    let Some(mut file) = DataFile::open_existing(path)? else {
        return Ok(C::default());
    };
    Ok(read_footer::<C>(&mut file)?.checkpoint)
}
