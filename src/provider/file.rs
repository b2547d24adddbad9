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

use super::{ConfigMessage, Provider};
use crate::{ConfigSnafu, Error, Result, LOG_TARGET};
use async_trait::async_trait;
use snafu::ResultExt;
use snigate_config::{
    certificates_hash_key, read_toml, CertificateConf, FileProviderConf,
    SnigateConf,
};
use snigate_core::ShutdownWatch;
use std::collections::HashMap;
use std::path::Path;
use std::time::Duration;
use tokio::sync::mpsc::Sender;
use tokio::time::interval;
use tracing::{debug, error, info};

static FILE_PROVIDER_NAME: &str = "file";

/// Polls a toml file or directory for `[certificates.*]` tables.
///
/// A snapshot is only sent when the loaded certificates changed, a file
/// that fails to load keeps the previous snapshot in place.
#[derive(Debug)]
pub struct FileProvider {
    name: String,
    path: String,
    interval: Duration,
}

impl FileProvider {
    pub fn new(conf: &FileProviderConf) -> Self {
        Self {
            name: FILE_PROVIDER_NAME.to_string(),
            path: snigate_util::resolve_path(&conf.path),
            interval: conf.get_interval(),
        }
    }
    pub fn with_name(mut self, name: &str) -> Self {
        self.name = name.to_string();
        self
    }
    /// Loads the certificate tables once.
    pub async fn load(&self) -> Result<HashMap<String, CertificateConf>> {
        let data = read_toml(&self.path).await.context(ConfigSnafu)?;
        let conf = SnigateConf::from_toml(&data).context(ConfigSnafu)?;
        Ok(conf.certificates)
    }
}

#[async_trait]
impl Provider for FileProvider {
    fn name(&self) -> &str {
        &self.name
    }
    async fn init(&self) -> Result<()> {
        if !Path::new(&self.path).exists() {
            return Err(Error::Invalid {
                message: format!("file provider path {} not found", self.path),
            });
        }
        Ok(())
    }
    async fn provide(
        &self,
        sender: Sender<ConfigMessage>,
        mut shutdown: ShutdownWatch,
    ) -> Result<()> {
        let period_human: humantime::Duration = self.interval.into();
        info!(
            target: LOG_TARGET,
            name = self.name,
            path = self.path,
            interval = period_human.to_string(),
            "file provider is watching"
        );
        let mut period = interval(self.interval);
        let mut current_hash_key = None;
        loop {
            tokio::select! {
                _ = shutdown.changed() => {
                    break;
                }
                _ = period.tick() => {
                    let certificates = match self.load().await {
                        Ok(certificates) => certificates,
                        Err(e) => {
                            error!(
                                target: LOG_TARGET,
                                name = self.name,
                                error = %e,
                                "load certificates fail"
                            );
                            continue;
                        },
                    };
                    let hash_key = certificates_hash_key(&certificates);
                    if current_hash_key.as_ref() == Some(&hash_key) {
                        continue;
                    }
                    debug!(
                        target: LOG_TARGET,
                        name = self.name,
                        hash_key,
                        count = certificates.len(),
                        "certificates changed"
                    );
                    let message = ConfigMessage {
                        provider: self.name.clone(),
                        certificates,
                    };
                    if sender.send(message).await.is_err() {
                        // receiver is gone, nothing left to feed
                        break;
                    }
                    current_hash_key = Some(hash_key);
                }
            }
        }
        Ok(())
    }
}
