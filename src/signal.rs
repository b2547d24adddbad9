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

use super::LOG_TARGET;
use std::io;
use tracing::info;

/// Waits for the signals that should stop the process gracefully:
/// SIGINT (ctrl-c) and, on unix, SIGTERM.
///
/// The SIGTERM handler is installed by [`ShutdownSignal::new`], from then
/// on the signal no longer kills the process.
pub struct ShutdownSignal {
    #[cfg(unix)]
    terminate: tokio::signal::unix::Signal,
}

impl ShutdownSignal {
    pub fn new() -> io::Result<Self> {
        Ok(Self {
            #[cfg(unix)]
            terminate: tokio::signal::unix::signal(
                tokio::signal::unix::SignalKind::terminate(),
            )?,
        })
    }

    /// Resolves with the name of the first received signal.
    pub async fn recv(&mut self) -> io::Result<&'static str> {
        #[cfg(unix)]
        let name = tokio::select! {
            result = tokio::signal::ctrl_c() => {
                result?;
                "SIGINT"
            }
            _ = self.terminate.recv() => "SIGTERM",
        };
        #[cfg(not(unix))]
        let name = {
            tokio::signal::ctrl_c().await?;
            "SIGINT"
        };
        info!(target: LOG_TARGET, signal = name, "shutdown signal received");
        Ok(name)
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use nix::sys::signal::{kill, Signal};
    use nix::unistd::Pid;
    use pretty_assertions::assert_eq;
    use std::time::Duration;

    #[tokio::test]
    async fn test_shutdown_on_sigterm() {
        let mut signal = ShutdownSignal::new().unwrap();
        kill(Pid::this(), Signal::SIGTERM).unwrap();
        let name = tokio::time::timeout(Duration::from_secs(5), signal.recv())
            .await
            .unwrap()
            .unwrap();
        assert_eq!("SIGTERM", name);
    }
}
