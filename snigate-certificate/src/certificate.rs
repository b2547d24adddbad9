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

use super::{normalize_domain, Error, Result};
use snigate_config::CertificateConf;

const ERROR_CERTIFICATE: &str = "certificate";
const ERROR_PRIVATE_KEY: &str = "private_key";
const ERROR_CHAIN: &str = "chain";

/// A loaded certificate and private key.
///
/// The payload is opaque here: the bytes are carried to the TLS layer
/// as they were loaded and are never decoded by the store.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CertificateEntry {
    // Name of the configuration this entry was built from
    pub name: Option<String>,
    // Normalized domains this certificate is served for
    pub domains: Vec<String>,
    // Certificate bytes (PEM)
    pub certificate: Vec<u8>,
    // Private key bytes (PEM)
    pub key: Vec<u8>,
    // Optional intermediate chain bytes (PEM)
    pub chain: Option<Vec<u8>>,
    // Hash of the configuration, used to detect changed certificates
    pub hash_key: String,
}

impl CertificateEntry {
    /// Builds an entry from already loaded bytes.
    pub fn new(
        domains: &[&str],
        certificate: Vec<u8>,
        key: Vec<u8>,
    ) -> Self {
        Self {
            domains: domains
                .iter()
                .map(|d| normalize_domain(d).into_owned())
                .filter(|d| !d.is_empty())
                .collect(),
            certificate,
            key,
            ..Default::default()
        }
    }
    pub fn with_name(mut self, name: &str) -> Self {
        self.name = Some(name.to_string());
        self
    }
}

impl TryFrom<&CertificateConf> for CertificateEntry {
    type Error = Error;
    fn try_from(value: &CertificateConf) -> Result<Self, Self::Error> {
        let certificate = snigate_util::load_certificate_bytes(
            value.tls_cert.as_deref().unwrap_or_default(),
        )
        .map_err(|e| Error::Invalid {
            category: ERROR_CERTIFICATE.to_string(),
            message: e.to_string(),
        })?;
        let key = snigate_util::load_certificate_bytes(
            value.tls_key.as_deref().unwrap_or_default(),
        )
        .map_err(|e| Error::Invalid {
            category: ERROR_PRIVATE_KEY.to_string(),
            message: e.to_string(),
        })?;
        let chain = match value.tls_chain.as_deref() {
            Some(chain) if !chain.is_empty() => Some(
                snigate_util::load_certificate_bytes(chain).map_err(|e| {
                    Error::Invalid {
                        category: ERROR_CHAIN.to_string(),
                        message: e.to_string(),
                    }
                })?,
            ),
            _ => None,
        };
        let domains = value.domain_list();
        let domains: Vec<&str> = domains.iter().map(|d| d.as_str()).collect();

        Ok(CertificateEntry {
            chain,
            hash_key: value.hash_key(),
            ..CertificateEntry::new(&domains, certificate, key)
        })
    }
}
