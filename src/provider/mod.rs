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

use super::{Error, Result, LOG_TARGET};
use async_trait::async_trait;
use snigate_config::CertificateConf;
use snigate_core::ShutdownWatch;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::mpsc::Sender;
use tokio::task::JoinHandle;
use tracing::{error, info};

mod file;

pub use file::FileProvider;

/// A full certificate snapshot published by one provider.
#[derive(Debug, Clone, Default)]
pub struct ConfigMessage {
    pub provider: String,
    pub certificates: HashMap<String, CertificateConf>,
}

/// A source of dynamic certificate configuration.
///
/// Every message a provider sends replaces all certificates it sent
/// before, an empty map withdraws them.
#[async_trait]
pub trait Provider: Send + Sync {
    /// Unique name of the provider, used to keep its latest snapshot
    fn name(&self) -> &str;
    /// Checks the provider settings before it is started
    async fn init(&self) -> Result<()> {
        Ok(())
    }
    /// Publishes snapshots until shutdown or until the receiver is gone
    async fn provide(
        &self,
        sender: Sender<ConfigMessage>,
        shutdown: ShutdownWatch,
    ) -> Result<()>;
}

/// Starts a group of providers and fans their messages into one channel.
#[derive(Default)]
pub struct ProviderAggregator {
    providers: Vec<Arc<dyn Provider>>,
}

impl ProviderAggregator {
    pub fn new() -> Self {
        Self::default()
    }
    pub fn add_provider(&mut self, provider: Arc<dyn Provider>) -> Result<()> {
        if self.providers.iter().any(|p| p.name() == provider.name()) {
            return Err(Error::Invalid {
                message: format!("provider {} already exists", provider.name()),
            });
        }
        self.providers.push(provider);
        Ok(())
    }
    pub fn providers(&self) -> Vec<String> {
        self.providers.iter().map(|p| p.name().to_string()).collect()
    }
    pub fn is_empty(&self) -> bool {
        self.providers.is_empty()
    }
    /// Initializes every provider and spawns the ones that succeeded.
    ///
    /// A provider failing init is logged and left out, the others still
    /// run. Errors returned by a running provider are logged and end only
    /// that provider.
    pub async fn start(
        &self,
        sender: Sender<ConfigMessage>,
        shutdown: ShutdownWatch,
    ) -> Vec<JoinHandle<()>> {
        let mut providers = Vec::with_capacity(self.providers.len());
        for provider in self.providers.iter() {
            if let Err(e) = provider.init().await {
                error!(
                    target: LOG_TARGET,
                    name = provider.name(),
                    error = %e,
                    "provider init fail"
                );
                continue;
            }
            providers.push(provider.clone());
        }
        let mut handles = Vec::with_capacity(providers.len());
        for provider in providers {
            let sender = sender.clone();
            let shutdown = shutdown.clone();
            handles.push(tokio::spawn(async move {
                let name = provider.name().to_string();
                info!(target: LOG_TARGET, name, "provider is running");
                if let Err(e) = provider.provide(sender, shutdown).await {
                    error!(
                        target: LOG_TARGET,
                        name,
                        error = %e,
                        "provider stopped with error"
                    );
                    return;
                }
                info!(target: LOG_TARGET, name, "provider is stopped");
            }));
        }
        handles
    }
}
