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

use super::{
    best_match, match_domain, normalize_domain, CertificateEntry,
    CertificateProvider, CertificateSet, DomainMatch, ResultCache, LOG_TARGET,
};
use arc_swap::{ArcSwap, ArcSwapOption};
use async_trait::async_trait;
use serde::Serialize;
use snigate_core::{
    BackgroundTask, BackgroundTaskService, Error as ServiceError,
};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;
use tracing::{debug, info};

const DEFAULT_CACHE_TTL: Duration = Duration::from_secs(60 * 60);
const DEFAULT_SWEEP_INTERVAL: Duration = Duration::from_secs(10 * 60);

#[derive(Debug, Clone)]
pub struct StoreOptions {
    /// Lifetime of a cached lookup result
    pub cache_ttl: Duration,
    /// Interval of the expired cache entry sweep
    pub sweep_interval: Duration,
}

impl Default for StoreOptions {
    fn default() -> Self {
        Self {
            cache_ttl: DEFAULT_CACHE_TTL,
            sweep_interval: DEFAULT_SWEEP_INTERVAL,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct StoreStats {
    pub hits: u64,
    pub misses: u64,
    pub cached: usize,
    pub generation: u64,
    pub updated_at: u64,
    pub static_count: usize,
    pub dynamic_count: usize,
}

/// Which set a certificate pattern belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CertificateSource {
    Static,
    Dynamic,
}

/// A pattern that matches a server name, see [`CertificateStore::explain`].
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CandidateMatch {
    pub source: CertificateSource,
    pub pattern: String,
    pub rank: DomainMatch,
}

// A published dynamic certificate set, never mutated after the swap.
#[derive(Debug, Default)]
struct DynamicCertificates {
    generation: u64,
    updated_at: u64,
    certificates: CertificateSet,
}

/// SNI certificate store.
///
/// Lookups run against the static certificates and a snapshot of the
/// dynamic certificates, results are memoized in a [`ResultCache`].
/// Replacing the dynamic certificates swaps the whole snapshot and clears
/// the cache; readers see either the old or the new set, never a mix.
///
/// When a static and a dynamic pattern match with the same specificity,
/// the static certificate wins.
pub struct CertificateStore {
    static_certificates: CertificateSet,
    dynamic_certificates: ArcSwap<DynamicCertificates>,
    default_certificate: ArcSwapOption<CertificateEntry>,
    cache: ResultCache,
    // serializes writers of the dynamic certificates
    update_lock: Mutex<()>,
    hits: AtomicU64,
    misses: AtomicU64,
    options: StoreOptions,
}

impl CertificateStore {
    pub fn new(
        static_certificates: CertificateSet,
        options: StoreOptions,
    ) -> Self {
        Self {
            static_certificates,
            dynamic_certificates: ArcSwap::from_pointee(
                DynamicCertificates::default(),
            ),
            default_certificate: ArcSwapOption::empty(),
            cache: ResultCache::new(options.cache_ttl),
            update_lock: Mutex::new(()),
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
            options,
        }
    }

    pub fn options(&self) -> &StoreOptions {
        &self.options
    }

    /// Gets the best certificate for the server name.
    ///
    /// Exact matches outrank wildcard matches, the most specific wildcard
    /// wins. `None` is a normal result and is cached as well; falling back
    /// to the default certificate is left to the caller.
    pub fn get_best_certificate(
        &self,
        server_name: &str,
    ) -> Option<Arc<CertificateEntry>> {
        let name = normalize_domain(server_name);
        let dynamic_certificates = self.dynamic_certificates.load();
        let generation = dynamic_certificates.generation;

        if let Some(value) = self.cache.get(&name, generation) {
            self.hits.fetch_add(1, Ordering::Relaxed);
            debug!(
                target: LOG_TARGET,
                server_name = %name,
                found = value.is_some(),
                "certificate cache hit"
            );
            return value;
        }
        self.misses.fetch_add(1, Ordering::Relaxed);

        let value = best_match(
            &name,
            &[
                &self.static_certificates,
                &dynamic_certificates.certificates,
            ],
        )
        .cloned();
        debug!(
            target: LOG_TARGET,
            server_name = %name,
            generation,
            found = value.is_some(),
            "certificate resolved"
        );
        self.cache.insert(name.into_owned(), value.clone(), generation);
        value
    }

    /// All domain patterns: static ones, then dynamic ones (both in
    /// insertion order), then the domains of the default certificate.
    pub fn get_all_domains(&self) -> Vec<String> {
        let dynamic_certificates = self.dynamic_certificates.load();
        let default_certificate = self.default_certificate.load();
        let default_domains = default_certificate
            .as_ref()
            .map(|entry| entry.domains.as_slice())
            .unwrap_or_default();

        let mut domains = Vec::with_capacity(
            self.static_certificates.len()
                + dynamic_certificates.certificates.len()
                + default_domains.len(),
        );
        domains.extend(self.static_certificates.domains().map(String::from));
        domains.extend(
            dynamic_certificates.certificates.domains().map(String::from),
        );
        domains.extend(
            default_domains
                .iter()
                .map(|domain| normalize_domain(domain).into_owned()),
        );
        domains
    }

    /// Replaces the dynamic certificates as a whole and invalidates the
    /// result cache.
    ///
    /// Returns the domains whose certificate is new or changed compared
    /// with the previous dynamic certificates.
    pub fn replace_dynamic_certificates(
        &self,
        certificates: CertificateSet,
    ) -> Vec<String> {
        let _guard = self
            .update_lock
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        let current = self.dynamic_certificates.load_full();

        let updated: Vec<String> = certificates
            .iter()
            .filter(|(domain, entry)| {
                current
                    .certificates
                    .get(domain)
                    .is_none_or(|old| old.hash_key != entry.hash_key)
            })
            .map(|(domain, _)| domain.to_string())
            .collect();
        let removed = current
            .certificates
            .domains()
            .filter(|domain| !certificates.contains(domain))
            .count();
        let count = certificates.len();
        let generation = current.generation + 1;

        self.dynamic_certificates
            .store(Arc::new(DynamicCertificates {
                generation,
                updated_at: snigate_core::now_sec(),
                certificates,
            }));
        // lookups from now on carry the new generation, clearing only
        // releases the memory of the old results
        self.cache.clear();

        info!(
            target: LOG_TARGET,
            generation,
            count,
            updated = updated.join(","),
            removed,
            "dynamic certificates replaced"
        );
        updated
    }

    /// Sets the fallback certificate. Cached results are not affected
    /// because the default is never part of them.
    pub fn set_default_certificate(&self, entry: Arc<CertificateEntry>) {
        info!(
            target: LOG_TARGET,
            name = entry.name.clone().unwrap_or_default(),
            domains = entry.domains.join(","),
            "default certificate updated"
        );
        self.default_certificate.store(Some(entry));
    }

    pub fn default_certificate(&self) -> Option<Arc<CertificateEntry>> {
        self.default_certificate.load_full()
    }

    /// Lists every pattern matching the server name, best first.
    ///
    /// This scans all patterns and is meant for diagnostics, not for the
    /// handshake path.
    pub fn explain(&self, server_name: &str) -> Vec<CandidateMatch> {
        let name = normalize_domain(server_name);
        let name: &str = &name;
        let dynamic_certificates = self.dynamic_certificates.load();
        let sources = [
            (CertificateSource::Static, &self.static_certificates),
            (
                CertificateSource::Dynamic,
                &dynamic_certificates.certificates,
            ),
        ];
        let mut candidates: Vec<CandidateMatch> = sources
            .iter()
            .flat_map(|(source, set)| {
                set.domains().filter_map(move |pattern| {
                    match_domain(name, pattern).map(|rank| CandidateMatch {
                        source: *source,
                        pattern: pattern.to_string(),
                        rank,
                    })
                })
            })
            .collect();
        // stable sort keeps static before dynamic on equal rank
        candidates.sort_by(|a, b| b.rank.cmp(&a.rank));
        candidates
    }

    /// Removes expired result cache entries.
    pub fn sweep_expired(&self) -> usize {
        self.cache.sweep()
    }

    pub fn stats(&self) -> StoreStats {
        let dynamic_certificates = self.dynamic_certificates.load();
        StoreStats {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            cached: self.cache.len(),
            generation: dynamic_certificates.generation,
            updated_at: dynamic_certificates.updated_at,
            static_count: self.static_certificates.len(),
            dynamic_count: dynamic_certificates.certificates.len(),
        }
    }
}

impl CertificateProvider for CertificateStore {
    fn get(&self, sni: &str) -> Option<Arc<CertificateEntry>> {
        self.get_best_certificate(sni)
    }
    fn default_certificate(&self) -> Option<Arc<CertificateEntry>> {
        CertificateStore::default_certificate(self)
    }
    fn list(&self) -> Vec<String> {
        self.get_all_domains()
    }
    fn store(&self, data: CertificateSet) {
        self.replace_dynamic_certificates(data);
    }
}

struct CacheSweepTask {
    store: Arc<CertificateStore>,
}

#[async_trait]
impl BackgroundTask for CacheSweepTask {
    async fn execute(&self, _count: u32) -> Result<bool, ServiceError> {
        let removed = self.store.sweep_expired();
        debug!(target: LOG_TARGET, removed, "certificate cache swept");
        Ok(removed > 0)
    }
}

/// Creates the background service sweeping expired cache entries of the
/// store at its configured interval.
pub fn new_cache_sweep_service(
    store: Arc<CertificateStore>,
) -> BackgroundTaskService {
    let interval = Some(store.options().sweep_interval)
        .filter(|interval| !interval.is_zero())
        .unwrap_or(DEFAULT_SWEEP_INTERVAL);
    BackgroundTaskService::new_single(
        "certificate_cache",
        interval,
        "sweep",
        Box::new(CacheSweepTask { store }),
    )
}
