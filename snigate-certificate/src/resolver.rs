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

use super::{CertificateEntry, CertificateProvider, LOG_TARGET};
use std::sync::Arc;
use tracing::{debug, error};

/// Certificate selection for the TLS handshake layer.
///
/// Looks up the best certificate for the SNI and falls back to the default
/// certificate. `None` means the handshake has to be failed.
#[derive(Clone)]
pub struct SniResolver {
    provider: Arc<dyn CertificateProvider>,
}

impl SniResolver {
    pub fn new(provider: Arc<dyn CertificateProvider>) -> Self {
        Self { provider }
    }

    pub fn resolve(&self, sni: Option<&str>) -> Option<Arc<CertificateEntry>> {
        let found = match sni.filter(|sni| !sni.trim().is_empty()) {
            Some(sni) => self.provider.get(sni).or_else(|| {
                debug!(
                    target: LOG_TARGET,
                    sni,
                    "no match, use default certificate"
                );
                self.provider.default_certificate()
            }),
            None => {
                debug!(target: LOG_TARGET, "no sni, use default certificate");
                self.provider.default_certificate()
            },
        };
        if found.is_none() {
            error!(
                target: LOG_TARGET,
                sni = sni.unwrap_or_default(),
                "no match certificate"
            );
        }
        found
    }
}
