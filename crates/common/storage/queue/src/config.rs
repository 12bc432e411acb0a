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

use snafu::ensure;

use crate::{Result, error::InvalidConfigSnafu};

#[derive(Debug, Clone)]
pub struct QueueConfig {
    pub order:      Order,
    pub backing:    Backing,
    /// Maximum number of pending items; `None` is unbounded.
    pub capacity:   Option<usize>,
    pub flush_mode: FlushMode,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            order:      Order::Fifo,
            backing:    Backing::Memory,
            capacity:   None,
            flush_mode: FlushMode::OnClose,
        }
    }
}

impl QueueConfig {
    pub fn validate(&self) -> Result<()> {
        ensure!(
            self.capacity != Some(0),
            InvalidConfigSnafu {
                reason: "capacity must be at least 1",
            }
        );
        if let Backing::Disk(path) = &self.backing {
            ensure!(
                !path.as_os_str().is_empty(),
                InvalidConfigSnafu {
                    reason: "disk queue needs a file path",
                }
            );
        }
        Ok(())
    }
}

/// Whether `pending` items leave room for one more under `capacity`
/// (`None` is unbounded).
pub(crate) fn has_room(capacity: Option<usize>, pending: usize) -> bool {
    capacity.is_none_or(|capacity| pending < capacity)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Order {
    Fifo,
    Lifo,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Backing {
    Memory,
    /// One backing file per queue.
    Disk(PathBuf),
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum FlushMode {
    /// Data reaches disk when `close` syncs the checkpoint.
    #[default]
    OnClose,
    /// `sync_data` after every write.
    EveryWrite,
}
