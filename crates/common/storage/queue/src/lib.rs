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

//! Embeddable persistent work queues.
//!
//! Four engines share one [`Queue`] contract:
//!
//! | engine | order | storage |
//! |---|---|---|
//! | [`FifoDiskQueue`] | first-in-first-out | append-only log file |
//! | [`LifoDiskQueue`] | last-in-first-out | single-cursor file, space reused |
//! | [`FifoMemoryQueue`] | first-in-first-out | memory |
//! | [`LifoMemoryQueue`] | last-in-first-out | memory |
//!
//! Disk engines recover from a checkpoint footer written by `close` and
//! survive process restarts; a single process owns each backing file.

pub mod builder;
pub mod checkpoint;
pub mod codec;
pub mod config;
pub mod error;
pub mod fifo_disk;
pub mod fifo_memory;
pub mod file;
pub mod lifo_disk;
pub mod lifo_memory;
pub mod priority;
pub mod queue;
mod signal;

pub use builder::QueueBuilder;
pub use bytes::Bytes;
pub use config::{Backing, FlushMode, Order, QueueConfig};
pub use error::{QueueError, Result};
pub use fifo_disk::FifoDiskQueue;
pub use fifo_memory::FifoMemoryQueue;
pub use lifo_disk::LifoDiskQueue;
pub use lifo_memory::LifoMemoryQueue;
pub use priority::{PriorityQueue, QueueFactory};
pub use queue::Queue;
pub use tokio_util::sync::CancellationToken;
