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

//! Panic hook that reports panics through `tracing`, plus optional deadlock
//! detection for the `parking_lot` locks used by the queue engines.

#[cfg(feature = "deadlock_detection")]
use std::time::Duration;
use std::panic;

use backtrace::Backtrace;

/// Route panics through `tracing` with a backtrace before the default hook
/// runs.
///
/// With the `deadlock_detection` feature, also starts a thread that checks
/// `parking_lot` locks every five seconds and logs any cycle it finds.
pub fn set_panic_hook() {
    let default_hook = panic::take_hook();
    panic::set_hook(Box::new(move |panic| {
        let backtrace = format!("{:?}", Backtrace::new());
        if let Some(location) = panic.location() {
            tracing::error!(
                message = %panic,
                backtrace = %backtrace,
                panic.file = location.file(),
                panic.line = location.line(),
                panic.column = location.column(),
            );
        } else {
            tracing::error!(message = %panic, backtrace = %backtrace);
        }
        default_hook(panic);
    }));

    #[cfg(feature = "deadlock_detection")]
    let _ = std::thread::spawn(move || {
        loop {
            std::thread::sleep(Duration::from_secs(5));
            let deadlocks = parking_lot::deadlock::check_deadlock();
            if deadlocks.is_empty() {
                continue;
            }

            tracing::warn!(count = deadlocks.len(), "Deadlocks detected");
            for (i, threads) in deadlocks.iter().enumerate() {
                for t in threads {
                    tracing::warn!(
                        deadlock = i,
                        thread_id = ?t.thread_id(),
                        backtrace = ?t.backtrace(),
                        "Deadlocked thread"
                    );
                }
            }
        }
    });
}
