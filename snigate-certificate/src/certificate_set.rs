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

use super::domain::wildcard_suffix;
use super::{normalize_domain, CertificateEntry};
use ahash::AHashMap;
use std::sync::Arc;

/// Domain pattern to certificate mapping.
///
/// Keys are normalized on insert and unique; enumeration follows
/// insertion order. Wildcard patterns are additionally indexed by their
/// suffix so matching never has to scan the whole set.
#[derive(Debug, Default, Clone)]
pub struct CertificateSet {
    entries: Vec<(String, Arc<CertificateEntry>)>,
    exact: AHashMap<String, usize>,
    wildcards: AHashMap<String, usize>,
}

impl CertificateSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts a certificate for a pattern. An existing pattern keeps its
    /// position and gets the new entry, the previous one is returned.
    /// Empty patterns are ignored.
    pub fn insert(
        &mut self,
        pattern: &str,
        entry: Arc<CertificateEntry>,
    ) -> Option<Arc<CertificateEntry>> {
        let key = normalize_domain(pattern).into_owned();
        if key.is_empty() {
            return None;
        }
        if let Some(&index) = self.exact.get(&key) {
            return Some(std::mem::replace(&mut self.entries[index].1, entry));
        }
        let index = self.entries.len();
        if let Some(suffix) = wildcard_suffix(&key) {
            self.wildcards.insert(suffix.to_string(), index);
        }
        self.exact.insert(key.clone(), index);
        self.entries.push((key, entry));
        None
    }

    /// Gets the certificate registered for a pattern, the pattern is
    /// normalized first.
    pub fn get(&self, pattern: &str) -> Option<&Arc<CertificateEntry>> {
        self.get_exact(&normalize_domain(pattern))
    }

    pub fn contains(&self, pattern: &str) -> bool {
        self.get(pattern).is_some()
    }

    #[inline]
    pub(crate) fn get_exact(
        &self,
        key: &str,
    ) -> Option<&Arc<CertificateEntry>> {
        self.exact.get(key).map(|&index| &self.entries[index].1)
    }

    /// Gets the certificate of the wildcard pattern `*.{suffix}`.
    #[inline]
    pub(crate) fn get_wildcard(
        &self,
        suffix: &str,
    ) -> Option<&Arc<CertificateEntry>> {
        self.wildcards.get(suffix).map(|&index| &self.entries[index].1)
    }

    /// Patterns in insertion order.
    pub fn domains(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(domain, _)| domain.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Arc<CertificateEntry>)> {
        self.entries
            .iter()
            .map(|(domain, entry)| (domain.as_str(), entry))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl<S: AsRef<str>> FromIterator<(S, Arc<CertificateEntry>)>
    for CertificateSet
{
    fn from_iter<T: IntoIterator<Item = (S, Arc<CertificateEntry>)>>(
        iter: T,
    ) -> Self {
        let mut set = CertificateSet::new();
        for (pattern, entry) in iter {
            set.insert(pattern.as_ref(), entry);
        }
        set
    }
}
