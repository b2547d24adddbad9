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

use snafu::Snafu;
use std::sync::Arc;

mod cache;
mod certificate;
mod certificate_set;
mod domain;
mod dynamic_certificate;
mod resolver;
mod store;

pub static LOG_TARGET: &str = "snigate::certificate";

#[derive(Debug, Snafu)]
pub enum Error {
    #[snafu(display("Invalid error, category: {category}, {message}"))]
    Invalid { message: String, category: String },
}

type Result<T, E = Error> = std::result::Result<T, E>;

pub use cache::ResultCache;
pub use certificate::CertificateEntry;
pub use certificate_set::CertificateSet;
pub use domain::{best_match, match_domain, normalize_domain, DomainMatch};
pub use dynamic_certificate::{parse_certificates, ParsedCertificates};
pub use resolver::SniResolver;
pub use store::{
    new_cache_sweep_service, CandidateMatch, CertificateSource,
    CertificateStore, StoreOptions, StoreStats,
};

/// The seam between the certificate store and the TLS handshake layer.
pub trait CertificateProvider: Send + Sync {
    /// Best certificate for the server name, `None` when nothing matches.
    fn get(&self, sni: &str) -> Option<Arc<CertificateEntry>>;
    /// Fallback certificate, consulted by the caller after a miss.
    fn default_certificate(&self) -> Option<Arc<CertificateEntry>>;
    /// All configured domain patterns.
    fn list(&self) -> Vec<String>;
    /// Replaces the dynamic certificates as a whole.
    fn store(&self, data: CertificateSet);
}
