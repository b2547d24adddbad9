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

use clap::Parser;
use snigate::{
    ConfigApplier, ConfigMessage, FileProvider, Provider, ProviderAggregator,
    ShutdownSignal,
};
use snigate_certificate::{
    new_cache_sweep_service, parse_certificates, CertificateStore,
    SniResolver, StoreOptions,
};
use snigate_config::{load_config, SnigateConf};
use snigate_logger::{logger_try_init, LoggerParams};
use std::error::Error;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, watch};
use tracing::{error, info};

static LOG_TARGET: &str = "snigate";

/// SNI based dynamic TLS certificate store.
#[derive(Parser, Debug, Default)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// The config file or directory
    #[arg(short, long)]
    conf: String,
    /// Test the configuration and exit
    #[arg(short, long)]
    test: bool,
    /// Log file path
    #[arg(long)]
    log: Option<String>,
    /// Print all served domain patterns as json and exit
    #[arg(long)]
    domains: bool,
    /// Show the certificate selected for a server name and exit
    #[arg(long)]
    resolve: Option<String>,
}

fn new_store(
    conf: &SnigateConf,
) -> Result<Arc<CertificateStore>, Box<dyn Error>> {
    let parsed = parse_certificates(&conf.certificates);
    if !parsed.errors.is_empty() {
        return Err(parsed.error_message().into());
    }
    let store = CertificateStore::new(
        parsed.certificates,
        StoreOptions {
            cache_ttl: conf.basic.get_cache_ttl(),
            sweep_interval: conf.basic.get_cache_sweep_interval(),
        },
    );
    if let Some(default_certificate) = parsed.default_certificate {
        store.set_default_certificate(default_certificate);
    }
    Ok(Arc::new(store))
}

fn new_file_provider(conf: &SnigateConf) -> Option<FileProvider> {
    conf.providers.file.as_ref().map(FileProvider::new)
}

// Loads the dynamic certificates once, for the one shot commands.
async fn load_dynamic_once(
    conf: &SnigateConf,
    store: Arc<CertificateStore>,
) -> Result<(), Box<dyn Error>> {
    let Some(provider) = new_file_provider(conf) else {
        return Ok(());
    };
    provider.init().await?;
    let certificates = provider.load().await?;
    let mut applier = ConfigApplier::new(store);
    applier.apply(ConfigMessage {
        provider: provider.name().to_string(),
        certificates,
    });
    Ok(())
}

async fn run_once(
    args: &Args,
    conf: &SnigateConf,
    store: Arc<CertificateStore>,
) -> Result<(), Box<dyn Error>> {
    load_dynamic_once(conf, store.clone()).await?;
    if args.domains {
        println!("{}", serde_json::to_string_pretty(&store.get_all_domains())?);
    }
    if let Some(server_name) = &args.resolve {
        let resolver = SniResolver::new(store.clone());
        let matched = store.get_best_certificate(server_name).is_some();
        let selected = resolver.resolve(Some(server_name)).map(|entry| {
            serde_json::json!({
                "name": entry.name,
                "domains": entry.domains,
                "is_default": !matched,
            })
        });
        let output = serde_json::json!({
            "server_name": server_name,
            "selected": selected,
            "candidates": store.explain(server_name),
        });
        println!("{}", serde_json::to_string_pretty(&output)?);
    }
    Ok(())
}

async fn run(
    conf: SnigateConf,
    store: Arc<CertificateStore>,
) -> Result<(), Box<dyn Error>> {
    // SIGTERM is handled from here on
    let mut shutdown_signal = ShutdownSignal::new()?;
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let mut handles = vec![];

    let sweep_service = new_cache_sweep_service(store.clone());
    let sweep_shutdown = shutdown_rx.clone();
    handles.push(tokio::spawn(async move {
        sweep_service.start(sweep_shutdown).await;
    }));

    let mut aggregator = ProviderAggregator::new();
    if let Some(provider) = new_file_provider(&conf) {
        aggregator.add_provider(Arc::new(provider))?;
    }
    if !aggregator.is_empty() {
        let (sender, receiver) = mpsc::channel(16);
        handles.extend(aggregator.start(sender, shutdown_rx.clone()).await);
        let applier = ConfigApplier::new(store.clone());
        let applier_shutdown = shutdown_rx.clone();
        handles.push(tokio::spawn(async move {
            applier.run(receiver, applier_shutdown).await;
        }));
    }
    info!(
        target: LOG_TARGET,
        providers = aggregator.providers().join(","),
        static_count = store.stats().static_count,
        "snigate is running"
    );

    shutdown_signal.recv().await?;
    shutdown_tx.send(true)?;
    let wait_all = wait_handles(handles);
    if tokio::time::timeout(Duration::from_secs(5), wait_all)
        .await
        .is_err()
    {
        error!(target: LOG_TARGET, "wait for background tasks timeout");
    }
    Ok(())
}

async fn wait_handles(handles: Vec<tokio::task::JoinHandle<()>>) {
    for handle in handles {
        if let Err(e) = handle.await {
            error!(target: LOG_TARGET, error = %e, "background task fail");
        }
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    let args = Args::parse();
    let conf = load_config(&args.conf).await?;

    let basic = &conf.basic;
    let _guard = logger_try_init(LoggerParams {
        log: args
            .log
            .clone()
            .or_else(|| basic.log_file.clone())
            .unwrap_or_default(),
        level: basic.get_log_level(),
        capacity: basic.log_capacity.unwrap_or_default(),
        json: basic.log_format_json.unwrap_or_default(),
    })?;

    let store = new_store(&conf)?;
    if args.test {
        info!(
            target: LOG_TARGET,
            version = snigate_util::get_pkg_version(),
            domains = store.get_all_domains().len(),
            "configuration is valid"
        );
        return Ok(());
    }
    if args.domains || args.resolve.is_some() {
        return run_once(&args, &conf, store).await;
    }
    run(conf, store).await
}
