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

use bytes::Bytes;
use clap::{Args, Parser, Subcommand, ValueEnum};
use snafu::{ResultExt, Whatever};
use tracing::info;
use workq_queue::{
    CancellationToken, Order, Queue, QueueBuilder, QueueError,
    checkpoint::{self, FifoCheckpoint, LifoCheckpoint},
};

mod build_info;

#[derive(Debug, Parser)]
#[clap(
name = "workq",
about = "Inspect and drive persistent work queues",
author = build_info::AUTHOR,
version = build_info::FULL_VERSION,
long_version = build_info::LONG_VERSION)]
struct Cli {
    #[command(subcommand)]
    commands: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    Push(PushArgs),
    Pop(PopArgs),
    Len(LenArgs),
    Consume(ConsumeArgs),
    Check(CheckArgs),
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum OrderArg {
    Fifo,
    Lifo,
}

impl From<OrderArg> for Order {
    fn from(order: OrderArg) -> Self {
        match order {
            OrderArg::Fifo => Self::Fifo,
            OrderArg::Lifo => Self::Lifo,
        }
    }
}

/// Backing file and ordering shared by every subcommand.
#[derive(Debug, Clone, Args)]
struct QueueArgs {
    /// Backing file of the queue.
    path: PathBuf,

    #[arg(long, value_enum, default_value_t = OrderArg::Fifo)]
    order: OrderArg,
}

impl QueueArgs {
    fn open(&self) -> Result<Arc<dyn Queue>, Whatever> {
        QueueBuilder::new(self.order.into())
            .on_disk(&self.path)
            .build()
            .with_whatever_context(|_| format!("failed to open queue at {}", self.path.display()))
    }
}

#[derive(Debug, Clone, Args)]
#[command(flatten_help = true)]
#[command(long_about = r"

Append items to a queue.
Examples:

workq push jobs.q first second
workq push jobs.q --order lifo top

")]
struct PushArgs {
    #[command(flatten)]
    queue: QueueArgs,

    #[arg(required = true)]
    items: Vec<String>,
}

impl PushArgs {
    async fn run(&self) -> Result<(), Whatever> {
        let queue = self.queue.open()?;
        for item in &self.items {
            queue
                .put(None, Bytes::from(item.clone()))
                .await
                .whatever_context("push failed")?;
        }
        info!(count = self.items.len(), "Pushed items");
        queue.close().whatever_context("failed to close queue")
    }
}

#[derive(Debug, Clone, Args)]
#[command(flatten_help = true)]
#[command(long_about = r"

Remove and print up to N items without waiting.
Examples:

workq pop jobs.q
workq pop jobs.q -n 10

")]
struct PopArgs {
    #[command(flatten)]
    queue: QueueArgs,

    #[arg(short = 'n', long, default_value_t = 1)]
    count: usize,
}

impl PopArgs {
    async fn run(&self) -> Result<(), Whatever> {
        let queue = self.queue.open()?;
        for _ in 0..self.count {
            match queue.get(None).await {
                Ok(data) => println!("{}", String::from_utf8_lossy(&data)),
                Err(QueueError::Empty { .. }) => break,
                Err(e) => {
                    queue.close().whatever_context("failed to close queue")?;
                    return Err(e).whatever_context("pop failed");
                }
            }
        }
        queue.close().whatever_context("failed to close queue")
    }
}

#[derive(Debug, Clone, Args)]
#[command(flatten_help = true)]
#[command(long_about = r"

Print the number of pending items.
Examples:

workq len jobs.q

")]
struct LenArgs {
    #[command(flatten)]
    queue: QueueArgs,
}

impl LenArgs {
    fn run(&self) -> Result<(), Whatever> {
        let queue = self.queue.open()?;
        println!("{}", queue.len());
        queue.close().whatever_context("failed to close queue")
    }
}

#[derive(Debug, Clone, Args)]
#[command(flatten_help = true)]
#[command(long_about = r"

Pop and print items as they arrive until Ctrl-C. The queue is checkpointed
on exit, so unconsumed items survive.
Examples:

workq consume jobs.q

")]
struct ConsumeArgs {
    #[command(flatten)]
    queue: QueueArgs,
}

impl ConsumeArgs {
    async fn run(&self) -> Result<(), Whatever> {
        let queue = self.queue.open()?;
        let token = CancellationToken::new();
        {
            let token = token.clone();
            ctrlc::set_handler(move || token.cancel())
                .whatever_context("failed to install Ctrl-C handler")?;
        }

        let mut consumed = 0usize;
        let result = loop {
            match queue.get(Some(&token)).await {
                Ok(data) => {
                    println!("{}", String::from_utf8_lossy(&data));
                    consumed += 1;
                }
                Err(QueueError::Cancelled { .. } | QueueError::Closed { .. }) => break Ok(()),
                Err(e) => break Err(e),
            }
        };

        info!(consumed, pending = queue.len(), "Consumer stopped");
        queue.close().whatever_context("failed to close queue")?;
        result.whatever_context("consume failed")
    }
}

#[derive(Debug, Clone, Args)]
#[command(flatten_help = true)]
#[command(long_about = r"

Validate a closed queue file without opening it.
Examples:

workq check jobs.q --order lifo

")]
struct CheckArgs {
    #[command(flatten)]
    queue: QueueArgs,
}

impl CheckArgs {
    fn run(&self) -> Result<(), Whatever> {
        let path = &self.queue.path;
        let pending = match self.queue.order {
            OrderArg::Fifo => {
                let checkpoint: FifoCheckpoint = checkpoint::validate(path)
                    .with_whatever_context(|_| format!("{} is corrupt", path.display()))?;
                checkpoint.pending
            }
            OrderArg::Lifo => {
                let checkpoint: LifoCheckpoint = checkpoint::validate(path)
                    .with_whatever_context(|_| format!("{} is corrupt", path.display()))?;
                checkpoint.pending
            }
        };
        println!("{}: ok, {pending} pending", path.display());
        Ok(())
    }
}

#[tokio::main]
async fn main() -> Result<(), Whatever> {
    let _guards = workq_common_telemetry::init_tracing_subscriber("workq");
    workq_common_telemetry::set_panic_hook();

    let cli = Cli::parse();
    match cli.commands {
        Commands::Push(args) => args.run().await,
        Commands::Pop(args) => args.run().await,
        Commands::Len(args) => args.run(),
        Commands::Consume(args) => args.run().await,
        Commands::Check(args) => args.run(),
    }
}
