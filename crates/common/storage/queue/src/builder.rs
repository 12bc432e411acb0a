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

use std::{path::PathBuf, sync::Arc};

use crate::{
    Backing, FifoDiskQueue, FifoMemoryQueue, FlushMode, LifoDiskQueue, LifoMemoryQueue, Order,
    Queue, QueueConfig, Result,
};

pub struct QueueBuilder {
    config: QueueConfig,
}

impl QueueBuilder {
    pub fn new(order: Order) -> Self {
        Self {
            config: QueueConfig {
                order,
                ..Default::default()
            },
        }
    }

    pub fn fifo() -> Self { Self::new(Order::Fifo) }

    pub fn lifo() -> Self { Self::new(Order::Lifo) }

    pub fn on_disk<P: Into<PathBuf>>(mut self, path: P) -> Self {
        self.config.backing = Backing::Disk(path.into());
        self
    }

    pub fn in_memory(mut self) -> Self {
        self.config.backing = Backing::Memory;
        self
    }

    pub fn capacity(mut self, capacity: usize) -> Self {
        self.config.capacity = Some(capacity);
        self
    }

    pub fn flush_mode(mut self, mode: FlushMode) -> Self {
        self.config.flush_mode = mode;
        self
    }

    pub fn config(&self) -> &QueueConfig { &self.config }

    pub fn build(self) -> Result<Arc<dyn Queue>> { open(self.config) }
}

/// Open the engine described by `config`.
pub fn open(config: QueueConfig) -> Result<Arc<dyn Queue>> {
    config.validate()?;
    let QueueConfig {
        order,
        backing,
        capacity,
        flush_mode,
    } = config;

    let queue: Arc<dyn Queue> = match (order, backing) {
        (Order::Fifo, Backing::Memory) => Arc::new(FifoMemoryQueue::new(capacity)),
        (Order::Lifo, Backing::Memory) => Arc::new(LifoMemoryQueue::new(capacity)),
        (Order::Fifo, Backing::Disk(path)) => {
            Arc::new(FifoDiskQueue::with_options(path, capacity, flush_mode)?)
        }
        (Order::Lifo, Backing::Disk(path)) => {
            Arc::new(LifoDiskQueue::with_options(path, capacity, flush_mode)?)
        }
    };
    Ok(queue)
}

#[cfg(test)]
mod tests {
    use bytes::Bytes;

    use super::*;

    #[test]
    fn test_builder_default_config() {
        let builder = QueueBuilder::fifo();
        assert_eq!(builder.config.order, Order::Fifo);
        assert_eq!(builder.config.backing, Backing::Memory);
        assert_eq!(builder.config.capacity, None);
        assert_eq!(builder.config.flush_mode, FlushMode::OnClose);
    }

    #[test]
    fn test_builder_custom_config() {
        let builder = QueueBuilder::lifo()
            .on_disk("/tmp/test_queue")
            .capacity(16)
            .flush_mode(FlushMode::EveryWrite);

        assert_eq!(builder.config().order, Order::Lifo);
        assert_eq!(
            builder.config().backing,
            Backing::Disk(PathBuf::from("/tmp/test_queue"))
        );
        assert_eq!(builder.config().capacity, Some(16));
        assert_eq!(builder.config().flush_mode, FlushMode::EveryWrite);
    }

    #[test]
    fn test_build_rejects_zero_capacity() {
        assert!(QueueBuilder::fifo().capacity(0).build().is_err());
    }

    #[tokio::test]
    async fn test_build_each_engine() {
        let temp_dir = tempfile::tempdir().unwrap();
        let builders = [
            QueueBuilder::fifo(),
            QueueBuilder::lifo(),
            QueueBuilder::fifo().on_disk(temp_dir.path().join("fifo.q")),
            QueueBuilder::lifo().on_disk(temp_dir.path().join("lifo.q")),
        ];

        for builder in builders {
            let lifo = builder.config().order == Order::Lifo;
            let queue = builder.build().unwrap();
            queue.put(None, Bytes::from("1")).await.unwrap();
            queue.put(None, Bytes::from("2")).await.unwrap();
            let expected = if lifo { "2" } else { "1" };
            assert_eq!(queue.get(None).await.unwrap(), expected);
            queue.close().unwrap();
        }
    }
}
