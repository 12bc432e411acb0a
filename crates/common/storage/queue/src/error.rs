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

use std::path::PathBuf;

use snafu::Snafu;

/// Queue operation errors.
#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum QueueError {
    /// The queue has been closed. Terminal.
    #[snafu(display("Queue closed"))]
    Closed {
        #[snafu(implicit)]
        loc: snafu::Location,
    },

    /// A probe-mode `get` found nothing to read.
    #[snafu(display("Queue empty"))]
    Empty {
        #[snafu(implicit)]
        loc: snafu::Location,
    },

    /// A probe-mode `put` found no free capacity.
    #[snafu(display("Queue full"))]
    Full {
        #[snafu(implicit)]
        loc: snafu::Location,
    },

    /// The caller's cancellation token fired before the operation could
    /// proceed.
    #[snafu(display("Operation cancelled"))]
    Cancelled {
        #[snafu(implicit)]
        loc: snafu::Location,
    },

    /// Payload does not fit the 32-bit signed length field.
    #[snafu(display("Payload of {len} bytes exceeds the maximum record size"))]
    PayloadTooLarge {
        len: usize,
        #[snafu(implicit)]
        loc: snafu::Location,
    },

    /// The checkpoint footer at the end of a backing file could not be parsed.
    /// The store must be treated as invalid.
    #[snafu(display("Corrupt checkpoint footer in {}: {reason}", path.display()))]
    CorruptFooter {
        path:   PathBuf,
        reason: String,
        #[snafu(implicit)]
        loc:    snafu::Location,
    },

    /// A record length read from disk points outside the valid region.
    #[snafu(display("Corrupt record at offset {offset}: length {length}"))]
    CorruptRecord {
        offset: u64,
        length: i64,
        #[snafu(implicit)]
        loc:    snafu::Location,
    },

    #[snafu(display("Invalid queue config: {reason}"))]
    InvalidConfig {
        reason: String,
        #[snafu(implicit)]
        loc:    snafu::Location,
    },

    #[snafu(display("Failed to do file operation on {}", path.display()))]
    FileIo {
        path:   PathBuf,
        source: std::io::Error,
        #[snafu(implicit)]
        loc:    snafu::Location,
    },

    #[snafu(transparent)]
    Io {
        source: std::io::Error,
        #[snafu(implicit)]
        loc:    snafu::Location,
    },
}

impl QueueError {
    /// Returns `true` for the terminal closed state.
    #[must_use]
    pub const fn is_closed(&self) -> bool { matches!(self, Self::Closed { .. }) }

    /// Returns `true` when a later probe call may succeed (`Empty` / `Full`).
    #[must_use]
    pub const fn is_retryable(&self) -> bool { matches!(self, Self::Empty { .. } | Self::Full { .. }) }
}

/// Result type for queue operations.
pub type Result<T> = std::result::Result<T, QueueError>;
