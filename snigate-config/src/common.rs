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

use super::{Error, Result};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::hash::{DefaultHasher, Hash, Hasher};
use std::time::Duration;

pub const DEFAULT_CACHE_TTL: Duration = Duration::from_secs(60 * 60);
pub const DEFAULT_CACHE_SWEEP_INTERVAL: Duration =
    Duration::from_secs(10 * 60);
/// Upper bound of the result cache ttl
pub const MAX_CACHE_TTL: Duration = Duration::from_secs(365 * 24 * 60 * 60);
pub const DEFAULT_FILE_PROVIDER_INTERVAL: Duration = Duration::from_secs(10);

/// Process wide settings: logging and result cache tuning.
#[derive(Debug, Default, Deserialize, Clone, Serialize)]
pub struct BasicConf {
    /// Log level or comma separated tracing directives
    pub log_level: Option<String>,
    /// Whether to emit logs as json
    pub log_format_json: Option<bool>,
    /// Log file path, logs go to stdout when empty
    pub log_file: Option<String>,
    /// Buffered lines of the non blocking log writer
    pub log_capacity: Option<u64>,
    /// Lifetime of a resolved server name in the result cache
    #[serde(default)]
    #[serde(with = "humantime_serde")]
    pub cache_ttl: Option<Duration>,
    /// How often expired result cache entries are swept
    #[serde(default)]
    #[serde(with = "humantime_serde")]
    pub cache_sweep_interval: Option<Duration>,
}

impl BasicConf {
    pub fn get_log_level(&self) -> String {
        self.log_level.clone().unwrap_or_else(|| "info".to_string())
    }
    pub fn get_cache_ttl(&self) -> Duration {
        self.cache_ttl.unwrap_or(DEFAULT_CACHE_TTL)
    }
    pub fn get_cache_sweep_interval(&self) -> Duration {
        self.cache_sweep_interval
            .unwrap_or(DEFAULT_CACHE_SWEEP_INTERVAL)
    }
    fn validate(&self) -> Result<()> {
        if self.cache_ttl.is_some_and(|v| v.is_zero()) {
            return Err(Error::Invalid {
                message: "cache_ttl should be greater than zero".to_string(),
            });
        }
        if self.cache_ttl.is_some_and(|v| v > MAX_CACHE_TTL) {
            return Err(Error::Invalid {
                message: "cache_ttl should not be greater than 365 days"
                    .to_string(),
            });
        }
        if self.cache_sweep_interval.is_some_and(|v| v.is_zero()) {
            return Err(Error::Invalid {
                message: "cache_sweep_interval should be greater than zero"
                    .to_string(),
            });
        }
        Ok(())
    }
}

#[derive(Debug, Default, Deserialize, Clone, Serialize, Hash)]
pub struct CertificateConf {
    /// Domain names this certificate is served for (comma separated),
    /// exact names or `*.` wildcards
    pub domains: Option<String>,
    /// TLS certificate as inline PEM, file path or base64
    pub tls_cert: Option<String>,
    /// Private key as inline PEM, file path or base64
    pub tls_key: Option<String>,
    /// Optional certificate chain
    pub tls_chain: Option<String>,
    /// Whether this is the fallback certificate
    pub is_default: Option<bool>,
    pub remark: Option<String>,
}

/// Checks the shape of a configured domain pattern.
///
/// A wildcard is only allowed as the whole first label, followed by a
/// non empty suffix.
pub fn validate_domain(domain: &str) -> bool {
    let domain = domain.trim();
    if domain.is_empty() || domain.chars().any(char::is_whitespace) {
        return false;
    }
    let suffix = domain.strip_prefix("*.").unwrap_or(domain);
    let suffix = suffix.strip_suffix('.').unwrap_or(suffix);
    !suffix.is_empty()
        && !suffix.contains('*')
        && suffix.split('.').all(|label| !label.is_empty())
}

impl CertificateConf {
    /// Generates a unique hash key for this certificate configuration
    pub fn hash_key(&self) -> String {
        let mut hasher = DefaultHasher::new();
        self.hash(&mut hasher);
        format!("{:x}", hasher.finish())
    }

    /// Configured domains, trimmed, empty items dropped.
    pub fn domain_list(&self) -> Vec<String> {
        self.domains
            .as_deref()
            .unwrap_or_default()
            .split(',')
            .map(|s| s.trim())
            .filter(|s| !s.is_empty())
            .map(|s| s.to_string())
            .collect()
    }

    pub fn validate(&self, name: &str) -> Result<()> {
        let domains = self.domain_list();
        if domains.is_empty() {
            return Err(Error::Invalid {
                message: format!("certificate {name}: domains is empty"),
            });
        }
        if let Some(domain) = domains.iter().find(|d| !validate_domain(d)) {
            return Err(Error::Invalid {
                message: format!("certificate {name}: invalid domain {domain}"),
            });
        }
        if self.tls_cert.as_deref().unwrap_or_default().is_empty() {
            return Err(Error::Invalid {
                message: format!("certificate {name}: tls_cert is empty"),
            });
        }
        if self.tls_key.as_deref().unwrap_or_default().is_empty() {
            return Err(Error::Invalid {
                message: format!("certificate {name}: tls_key is empty"),
            });
        }
        Ok(())
    }
}

/// Polls a toml file (or directory) holding `[certificates.*]` tables.
#[derive(Debug, Default, Deserialize, Clone, Serialize)]
pub struct FileProviderConf {
    pub path: String,
    #[serde(default)]
    #[serde(with = "humantime_serde")]
    pub interval: Option<Duration>,
}

impl FileProviderConf {
    pub fn get_interval(&self) -> Duration {
        self.interval
            .filter(|v| !v.is_zero())
            .unwrap_or(DEFAULT_FILE_PROVIDER_INTERVAL)
    }
}

#[derive(Debug, Default, Deserialize, Clone, Serialize)]
pub struct ProvidersConf {
    pub file: Option<FileProviderConf>,
}

#[derive(Debug, Default, Deserialize, Clone, Serialize)]
pub struct SnigateConf {
    #[serde(default)]
    pub basic: BasicConf,
    /// Static certificates, fixed for the process lifetime
    #[serde(default)]
    pub certificates: HashMap<String, CertificateConf>,
    #[serde(default)]
    pub providers: ProvidersConf,
}

impl SnigateConf {
    pub fn from_toml(data: &str) -> Result<Self> {
        toml::from_str(data).map_err(|e| Error::De { source: e })
    }

    pub fn validate(&self) -> Result<()> {
        self.basic.validate()?;
        for (name, conf) in self.certificates.iter() {
            conf.validate(name)?;
        }
        if let Some(file) = &self.providers.file {
            if file.path.trim().is_empty() {
                return Err(Error::Invalid {
                    message: "file provider path is empty".to_string(),
                });
            }
        }
        Ok(())
    }
}

/// Hash of a whole certificate map, independent of map iteration order.
pub fn certificates_hash_key(
    certificates: &HashMap<String, CertificateConf>,
) -> String {
    let sorted: BTreeMap<_, _> = certificates.iter().collect();
    let mut hasher = DefaultHasher::new();
    sorted.hash(&mut hasher);
    format!("{:x}", hasher.finish())
}
