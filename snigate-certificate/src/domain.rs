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

//! Domain normalization and the exact/wildcard matching policy.
//!
//! A pattern is either an exact name (`example.com`) or a wildcard
//! (`*.example.com`). A wildcard matches any name that ends with
//! `.example.com` and has at least one label in front of it, so
//! `a.b.example.com` matches but `example.com` does not.
//!
//! Precedence: any exact match outranks every wildcard match, and among
//! wildcards the one with the longest suffix wins.

use super::{CertificateEntry, CertificateSet};
use serde::Serialize;
use std::borrow::Cow;
use std::sync::Arc;

const WILDCARD_PREFIX: &str = "*.";

/// Lower-cases a domain, trims surrounding whitespace and removes one
/// trailing dot. Borrows when the input is already normalized.
pub fn normalize_domain(domain: &str) -> Cow<'_, str> {
    let trimmed = domain.trim();
    let trimmed = trimmed.strip_suffix('.').unwrap_or(trimmed);
    if trimmed.bytes().any(|b| b.is_ascii_uppercase()) {
        Cow::Owned(trimmed.to_ascii_lowercase())
    } else if trimmed.chars().any(char::is_uppercase) {
        Cow::Owned(trimmed.to_lowercase())
    } else {
        Cow::Borrowed(trimmed)
    }
}

/// Suffix of a wildcard pattern (`example.com` for `*.example.com`),
/// `None` for exact patterns and for a bare `*.`.
#[inline]
pub(crate) fn wildcard_suffix(pattern: &str) -> Option<&str> {
    pattern
        .strip_prefix(WILDCARD_PREFIX)
        .filter(|suffix| !suffix.is_empty())
}

/// How a pattern matched a name. The derived ordering ranks matches:
/// every `Exact` is greater than any `Wildcard`, and a wildcard with a
/// longer suffix is greater than one with a shorter suffix.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
pub enum DomainMatch {
    /// Wildcard match, with the length of the matched suffix
    Wildcard(usize),
    Exact,
}

/// Matches one normalized name against one normalized pattern.
pub fn match_domain(name: &str, pattern: &str) -> Option<DomainMatch> {
    if name.is_empty() || pattern.is_empty() {
        return None;
    }
    if name == pattern {
        return Some(DomainMatch::Exact);
    }
    let suffix = wildcard_suffix(pattern)?;
    let prefix = name.strip_suffix(suffix)?.strip_suffix('.')?;
    if prefix.is_empty() {
        return None;
    }
    Some(DomainMatch::Wildcard(suffix.len()))
}

/// Candidate wildcard suffixes of a name, longest first.
///
/// For `a.b.example.com` this yields `b.example.com`, `example.com`, `com`.
fn wildcard_candidates(name: &str) -> impl Iterator<Item = &str> {
    name.match_indices('.')
        .filter(move |(index, _)| *index > 0 && *index + 1 < name.len())
        .map(move |(index, _)| &name[index + 1..])
}

/// Finds the best certificate for a normalized name over an ordered list
/// of sets. On equal specificity the earlier set wins.
///
/// Exact matches are index lookups; wildcards are resolved by probing the
/// suffixes of the name from longest to shortest, so the cost depends on
/// the number of labels rather than on the number of patterns.
pub fn best_match<'a>(
    name: &str,
    sets: &[&'a CertificateSet],
) -> Option<&'a Arc<CertificateEntry>> {
    if name.is_empty() {
        return None;
    }
    if let Some(entry) =
        sets.iter().copied().find_map(|set| set.get_exact(name))
    {
        return Some(entry);
    }
    wildcard_candidates(name).find_map(|suffix| {
        sets.iter().copied().find_map(|set| set.get_wildcard(suffix))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn new_entry(name: &str) -> Arc<CertificateEntry> {
        Arc::new(CertificateEntry {
            name: Some(name.to_string()),
            domains: vec![name.to_string()],
            ..Default::default()
        })
    }

    fn new_set(patterns: &[&str]) -> CertificateSet {
        let mut set = CertificateSet::new();
        for pattern in patterns {
            set.insert(pattern, new_entry(pattern));
        }
        set
    }

    fn best_name(name: &str, sets: &[&CertificateSet]) -> Option<String> {
        best_match(name, sets).and_then(|entry| entry.name.clone())
    }

    #[test]
    fn test_normalize_domain() {
        assert_eq!("example.com", normalize_domain("example.com"));
        assert_eq!("example.com", normalize_domain(" Example.COM. "));
        assert_eq!("*.example.com", normalize_domain("*.Example.COM"));
        assert_eq!("", normalize_domain(""));
        assert_eq!("", normalize_domain("."));
        assert!(matches!(
            normalize_domain("www.example.com"),
            Cow::Borrowed(_)
        ));
    }

    #[test]
    fn test_match_domain() {
        assert_eq!(
            Some(DomainMatch::Exact),
            match_domain("example.com", "example.com")
        );
        assert_eq!(
            Some(DomainMatch::Wildcard(11)),
            match_domain("www.example.com", "*.example.com")
        );
        assert_eq!(
            Some(DomainMatch::Wildcard(11)),
            match_domain("a.b.example.com", "*.example.com")
        );
        assert_eq!(None, match_domain("example.com", "*.example.com"));
        assert_eq!(None, match_domain(".example.com", "*.example.com"));
        assert_eq!(None, match_domain("wwwexample.com", "*.example.com"));
        assert_eq!(None, match_domain("www.example.org", "*.example.com"));
        assert_eq!(None, match_domain("www.example.com", "*."));
        assert_eq!(None, match_domain("", "*.example.com"));
        assert_eq!(None, match_domain("example.com", ""));
    }

    #[test]
    fn test_domain_match_order() {
        assert!(DomainMatch::Exact > DomainMatch::Wildcard(usize::MAX));
        assert!(DomainMatch::Wildcard(15) > DomainMatch::Wildcard(11));
    }

    #[test]
    fn test_wildcard_candidates() {
        assert_eq!(
            vec!["b.example.com", "example.com", "com"],
            wildcard_candidates("a.b.example.com").collect::<Vec<_>>()
        );
        assert_eq!(
            vec!["example.com", "com"],
            wildcard_candidates(".x.example.com").collect::<Vec<_>>()
        );
        assert_eq!(0, wildcard_candidates("localhost").count());
        assert_eq!(0, wildcard_candidates("example.").count());
    }

    #[test]
    fn test_best_match() {
        let static_set = new_set(&["www.example.com", "*.www.example.com"]);
        let dynamic_set = new_set(&["*.example.com", "example.org"]);
        let sets = [&static_set, &dynamic_set];

        assert_eq!(
            Some("www.example.com".to_string()),
            best_name("www.example.com", &sets)
        );
        assert_eq!(
            Some("*.www.example.com".to_string()),
            best_name("foo.www.example.com", &sets)
        );
        assert_eq!(
            Some("*.example.com".to_string()),
            best_name("api.example.com", &sets)
        );
        assert_eq!(
            Some("example.org".to_string()),
            best_name("example.org", &sets)
        );
        assert_eq!(None, best_name("example.com", &sets));
        assert_eq!(None, best_name("", &sets));
        assert_eq!(None, best_name("www.example.net", &sets));
    }

    #[test]
    fn test_best_match_earlier_set_wins_ties() {
        let mut first = CertificateSet::new();
        first.insert("*.example.com", new_entry("first"));
        first.insert("www.example.com", new_entry("first-exact"));
        let mut second = CertificateSet::new();
        second.insert("*.example.com", new_entry("second"));
        second.insert("www.example.com", new_entry("second-exact"));

        assert_eq!(
            Some("first".to_string()),
            best_name("api.example.com", &[&first, &second])
        );
        assert_eq!(
            Some("second".to_string()),
            best_name("api.example.com", &[&second, &first])
        );
        assert_eq!(
            Some("first-exact".to_string()),
            best_name("www.example.com", &[&first, &second])
        );
    }

    #[test]
    fn test_best_match_agrees_with_scan() {
        let patterns = [
            "example.com",
            "*.example.com",
            "*.www.example.com",
            "*.a.b.example.com",
            "b.example.com",
            "*.com",
            "*.example.org",
            "deep.a.b.example.com",
        ];
        let set = new_set(&patterns);
        let names = [
            "example.com",
            "www.example.com",
            "x.www.example.com",
            "x.y.www.example.com",
            "deep.a.b.example.com",
            "other.a.b.example.com",
            "b.example.com",
            "c.b.example.com",
            "foo.com",
            "example.org",
            "www.example.org",
            "localhost",
        ];
        for name in names {
            let expected = patterns
                .iter()
                .filter_map(|p| match_domain(name, p).map(|m| (m, *p)))
                .max_by_key(|(m, _)| *m)
                .map(|(_, p)| p.to_string());
            assert_eq!(expected, best_name(name, &[&set]), "name: {name}");
        }
    }
}
