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

use super::{ConfigMessage, LOG_TARGET};
use snigate_certificate::{parse_certificates, CertificateSet, CertificateStore};
use snigate_config::{certificates_hash_key, CertificateConf};
use snigate_core::ShutdownWatch;
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use tokio::sync::mpsc::Receiver;
use tracing::{debug, error, info};

/// Turns provider snapshots into dynamic certificate replacements.
///
/// The latest snapshot of every provider is kept. On each message all
/// snapshots are merged in provider name order (the first provider to
/// claim a domain keeps it) and the merged set replaces the dynamic
/// certificates of the store.
pub struct ConfigApplier {
    store: Arc<CertificateStore>,
    configurations: BTreeMap<String, HashMap<String, CertificateConf>>,
    hash_keys: BTreeMap<String, String>,
}

impl ConfigApplier {
    pub fn new(store: Arc<CertificateStore>) -> Self {
        Self {
            store,
            configurations: BTreeMap::new(),
            hash_keys: BTreeMap::new(),
        }
    }

    /// Applies one snapshot, returns the updated domains or `None` when the
    /// snapshot equals the previous one of its provider.
    pub fn apply(&mut self, message: ConfigMessage) -> Option<Vec<String>> {
        let hash_key = certificates_hash_key(&message.certificates);
        if self.hash_keys.get(&message.provider) == Some(&hash_key) {
            debug!(
                target: LOG_TARGET,
                provider = message.provider,
                "skip unchanged certificates"
            );
            return None;
        }
        self.hash_keys.insert(message.provider.clone(), hash_key);
        self.configurations
            .insert(message.provider, message.certificates);

        let mut certificates = CertificateSet::new();
        for (provider, configurations) in self.configurations.iter() {
            let parsed = parse_certificates(configurations);
            if !parsed.errors.is_empty() {
                error!(
                    target: LOG_TARGET,
                    provider,
                    error = parsed.error_message(),
                    "parse certificates fail"
                );
            }
            for (domain, entry) in parsed.certificates.iter() {
                if certificates.contains(domain) {
                    debug!(
                        target: LOG_TARGET,
                        provider,
                        domain,
                        "domain is already provided"
                    );
                    continue;
                }
                certificates.insert(domain, entry.clone());
            }
        }
        let updated = self.store.replace_dynamic_certificates(certificates);
        Some(updated)
    }

    /// Applies messages until shutdown or until every sender is gone.
    pub async fn run(
        mut self,
        mut receiver: Receiver<ConfigMessage>,
        mut shutdown: ShutdownWatch,
    ) {
        loop {
            tokio::select! {
                _ = shutdown.changed() => {
                    break;
                }
                message = receiver.recv() => {
                    let Some(message) = message else {
                        break;
                    };
                    let provider = message.provider.clone();
                    if let Some(updated) = self.apply(message) {
                        info!(
                            target: LOG_TARGET,
                            provider,
                            updated = updated.len(),
                            "provider certificates applied"
                        );
                    }
                }
            }
        }
        info!(target: LOG_TARGET, "config applier is stopped");
    }
}
