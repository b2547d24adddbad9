// Copyright 2024-2025 Tree xie.
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
// http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

use super::{Error, LOG_TARGET};
use async_trait::async_trait;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::{Duration, Instant};
use tokio::sync::watch;
use tokio::time::interval;
use tracing::{debug, error, info};

/// Receiver side of the shutdown signal, `true` means shut down.
pub type ShutdownWatch = watch::Receiver<bool>;

/// Periodic work driven by a [`BackgroundTaskService`].
#[async_trait]
pub trait BackgroundTask: Sync + Send {
    /// Runs one cycle. `Ok(true)` when the cycle did some work,
    /// `Ok(false)` when there was nothing to do.
    async fn execute(&self, cycle: u32) -> Result<bool, Error>;
}

const MIN_INTERVAL: Duration = Duration::from_millis(1);

/// Ticks one task at a fixed interval until shutdown.
pub struct BackgroundTaskService {
    name: String,
    task_name: String,
    task: Box<dyn BackgroundTask>,
    interval: Duration,
    cycles: AtomicU32,
    immediately: bool,
}

impl BackgroundTaskService {
    /// Creates a service for one task, the interval is at least 1ms.
    pub fn new_single(
        name: &str,
        interval: Duration,
        task_name: &str,
        task: Box<dyn BackgroundTask>,
    ) -> Self {
        Self {
            name: name.to_string(),
            task_name: task_name.to_string(),
            task,
            interval: interval.max(MIN_INTERVAL),
            cycles: AtomicU32::new(0),
            immediately: false,
        }
    }
    /// Runs the first cycle right away instead of after one interval.
    pub fn set_immediately(&mut self, immediately: bool) {
        self.immediately = immediately;
    }
    pub fn name(&self) -> &str {
        &self.name
    }
    pub fn interval(&self) -> Duration {
        self.interval
    }
    /// Number of cycles started so far.
    pub fn cycles(&self) -> u32 {
        self.cycles.load(Ordering::Relaxed)
    }

    /// Runs until the shutdown watch turns `true` or its sender is dropped.
    pub async fn start(&self, mut shutdown: ShutdownWatch) {
        let period_human: humantime::Duration = self.interval.into();
        info!(
            target: LOG_TARGET,
            name = self.name,
            task = self.task_name,
            interval = period_human.to_string(),
            "background service is running",
        );

        let mut period = interval(self.interval);
        if !self.immediately {
            // consume the tick that completes at once
            period.tick().await;
        }
        loop {
            tokio::select! {
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        break;
                    }
                }
                _ = period.tick() => {
                    self.run_cycle().await;
                }
            }
        }
        info!(
            target: LOG_TARGET,
            name = self.name,
            cycles = self.cycles(),
            "background service is stopped"
        );
    }

    async fn run_cycle(&self) {
        let cycle = self.cycles.fetch_add(1, Ordering::Relaxed);
        let started_at = Instant::now();
        let result = self.task.execute(cycle).await;
        let elapsed_ms = started_at.elapsed().as_millis() as u64;
        match result {
            Ok(true) => info!(
                target: LOG_TARGET,
                name = self.name,
                task = self.task_name,
                cycle,
                elapsed_ms,
                "background task done"
            ),
            Ok(false) => debug!(
                target: LOG_TARGET,
                name = self.name,
                task = self.task_name,
                cycle,
                "background task idle"
            ),
            Err(e) => error!(
                target: LOG_TARGET,
                name = self.name,
                task = self.task_name,
                cycle,
                error = %e,
                "background task fail"
            ),
        }
    }
}
