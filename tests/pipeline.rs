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

use pretty_assertions::assert_eq;
use snigate::{ConfigApplier, FileProvider, ProviderAggregator};
use snigate_certificate::{
    parse_certificates, CertificateStore, SniResolver, StoreOptions,
};
use snigate_config::load_config;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, watch};

fn certificate_toml(name: &str, domains: &str, is_default: bool) -> String {
    format!(
        r#"[certificates.{name}]
domains = "{domains}"
tls_cert = "{}"
tls_key = "{}"
is_default = {is_default}
"#,
        snigate_util::base64_encode(name),
        snigate_util::base64_encode("key"),
    )
}

fn selected_name(resolver: &SniResolver, sni: &str) -> Option<String> {
    resolver.resolve(Some(sni)).and_then(|entry| entry.name.clone())
}

async fn wait_until<F: Fn() -> bool>(check: F) {
    for _ in 0..200 {
        if check() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("condition not reached");
}

#[tokio::test]
async fn test_provider_to_store_pipeline() {
    let dir = tempfile::tempdir().unwrap();
    let dynamic_dir = dir.path().join("dynamic");
    std::fs::create_dir_all(&dynamic_dir).unwrap();
    let main_file = dir.path().join("snigate.toml");
    std::fs::write(
        &main_file,
        format!(
            r#"[basic]
cache_ttl = "1m"

{}
{}
[providers.file]
path = "{}"
interval = "20ms"
"#,
            certificate_toml("fallback", "fallback.local", true),
            certificate_toml("static_wildcard", "*.example.com", false),
            dynamic_dir.to_string_lossy(),
        ),
    )
    .unwrap();
    let dynamic_file = dynamic_dir.join("certificates.toml");
    std::fs::write(
        &dynamic_file,
        format!(
            "{}\n{}",
            certificate_toml("dynamic_wildcard", "*.example.com", false),
            certificate_toml("dynamic_exact", "www.example.com", false),
        ),
    )
    .unwrap();

    let conf = load_config(&main_file.to_string_lossy()).await.unwrap();
    let parsed = parse_certificates(&conf.certificates);
    assert_eq!(true, parsed.errors.is_empty());
    let store = Arc::new(CertificateStore::new(
        parsed.certificates,
        StoreOptions {
            cache_ttl: conf.basic.get_cache_ttl(),
            ..Default::default()
        },
    ));
    if let Some(default_certificate) = parsed.default_certificate {
        store.set_default_certificate(default_certificate);
    }
    let resolver = SniResolver::new(store.clone());

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let mut aggregator = ProviderAggregator::new();
    let file_conf = conf.providers.file.clone().unwrap();
    aggregator
        .add_provider(Arc::new(FileProvider::new(&file_conf)))
        .unwrap();
    let (sender, receiver) = mpsc::channel(4);
    let mut handles = aggregator.start(sender, shutdown_rx.clone()).await;
    let applier = ConfigApplier::new(store.clone());
    let applier_shutdown = shutdown_rx.clone();
    handles.push(tokio::spawn(async move {
        applier.run(receiver, applier_shutdown).await;
    }));

    wait_until(|| store.stats().dynamic_count == 2).await;
    // exact dynamic beats the static wildcard
    assert_eq!(
        Some("dynamic_exact".to_string()),
        selected_name(&resolver, "WWW.example.com.")
    );
    // same wildcard in both sets, static wins
    assert_eq!(
        Some("static_wildcard".to_string()),
        selected_name(&resolver, "api.example.com")
    );
    // no match falls back to the default certificate
    assert_eq!(
        Some("fallback".to_string()),
        selected_name(&resolver, "unknown.org")
    );
    assert_eq!(
        vec![
            "fallback.local",
            "*.example.com",
            "www.example.com",
            "*.example.com",
            "fallback.local",
        ],
        store.get_all_domains()
    );

    // the replaced set is visible right away, cached results included
    let next_file = dynamic_dir.join("certificates.next");
    std::fs::write(
        &next_file,
        certificate_toml("dynamic_api", "api.example.com", false),
    )
    .unwrap();
    std::fs::rename(&next_file, &dynamic_file).unwrap();
    wait_until(|| store.stats().generation == 2).await;
    assert_eq!(
        Some("dynamic_api".to_string()),
        selected_name(&resolver, "api.example.com")
    );
    assert_eq!(
        Some("static_wildcard".to_string()),
        selected_name(&resolver, "www.example.com")
    );

    shutdown_tx.send(true).unwrap();
    for handle in handles {
        handle.await.unwrap();
    }
}
