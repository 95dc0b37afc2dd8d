// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! SHE server process: parses CLI flags and an optional config file, wires
//! up logging, creates the shared-memory transport, and runs the
//! single-threaded dispatch loop (spec §5).
//!
//! CLI/tracing/ctrlc shape grounded on `hdds-logger`'s `main.rs`: a
//! `clap::Parser` struct, a `build_config` step that layers CLI overrides
//! onto a loaded (or default) config, `tracing_subscriber::fmt` with an
//! `EnvFilter`, and a named `ctrlc_handler` installed once before the run
//! loop.

mod codec;
mod config;

use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;

use she_core::crypto::RustCryptoAes128;
use she_core::keystore::{KeyFacade, MemoryKeyStore};
use she_core::she::Dispatcher;
use she_core::transport::{segment, ShmChannel, ShmRegion, ShmSegment};

use config::ServerConfig;

/// Standalone SHE command handler over a shared-memory transport.
#[derive(Parser, Debug)]
#[command(name = "she-server", version, about)]
struct Cli {
    /// Path to a TOML config file. Missing fields fall back to defaults.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Override the request segment name.
    #[arg(long)]
    request_segment: Option<String>,

    /// Override the response segment name.
    #[arg(long)]
    response_segment: Option<String>,

    /// Override the per-region payload capacity, in bytes.
    #[arg(long)]
    payload_capacity: Option<usize>,

    /// Override the NVM journal file path.
    #[arg(long)]
    nvm_journal_path: Option<PathBuf>,

    /// Override the tracing filter directive string.
    #[arg(long)]
    tracing_filter: Option<String>,
}

fn build_config(cli: &Cli) -> Result<ServerConfig> {
    let mut config = match &cli.config {
        Some(path) => ServerConfig::load_from_file(path)
            .with_context(|| format!("loading config from {}", path.display()))?,
        None => ServerConfig::default(),
    };

    if let Some(name) = &cli.request_segment {
        config.request_segment = name.clone();
    }
    if let Some(name) = &cli.response_segment {
        config.response_segment = name.clone();
    }
    if let Some(capacity) = cli.payload_capacity {
        config.payload_capacity = capacity;
    }
    if cli.nvm_journal_path.is_some() {
        config.nvm_journal_path = cli.nvm_journal_path.clone();
    }
    if let Some(filter) = &cli.tracing_filter {
        config.tracing_filter = filter.clone();
    }

    Ok(config)
}

fn init_tracing(filter: &str) -> Result<()> {
    tracing_log::LogTracer::init().context("installing log -> tracing bridge")?;
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::new(filter))
        .with_target(false)
        .init();
    Ok(())
}

fn ctrlc_handler(running: Arc<AtomicBool>) -> Result<()> {
    ctrlc::set_handler(move || {
        tracing::info!("shutdown signal received");
        running.store(false, Ordering::SeqCst);
    })
    .context("installing SIGINT handler")
}

fn load_key_facade(config: &ServerConfig) -> Result<Arc<MemoryKeyStore>> {
    let store = match &config.nvm_journal_path {
        Some(path) => {
            let store = MemoryKeyStore::load_journal(path)
                .with_context(|| format!("loading NVM journal from {}", path.display()))?;
            tracing::info!(path = %path.display(), "loaded NVM journal");
            store
        }
        None => MemoryKeyStore::new(),
    };
    Ok(Arc::new(store))
}

fn save_key_facade(store: &MemoryKeyStore, config: &ServerConfig) -> Result<()> {
    if let Some(path) = &config.nvm_journal_path {
        store
            .save_journal(path)
            .with_context(|| format!("saving NVM journal to {}", path.display()))?;
        tracing::info!(path = %path.display(), "saved NVM journal");
    }
    Ok(())
}

fn run(config: ServerConfig, running: Arc<AtomicBool>) -> Result<()> {
    let cleaned = segment::cleanup_stale_segments();
    if cleaned > 0 {
        tracing::info!(count = cleaned, "removed stale shared-memory segments");
    }

    let req_region = ShmRegion::create(&config.request_segment, config.payload_capacity)
        .context("creating request segment")?;
    let resp_region = ShmRegion::create(&config.response_segment, config.payload_capacity)
        .context("creating response segment")?;
    let channel = ShmChannel::new(req_region, resp_region);

    let key_facade = load_key_facade(&config)?;
    let dispatcher_facade: Arc<dyn KeyFacade> = key_facade.clone();
    let mut dispatcher = Dispatcher::new(dispatcher_facade, RustCryptoAes128::new());

    tracing::info!(
        request_segment = %config.request_segment,
        response_segment = %config.response_segment,
        capacity = config.payload_capacity,
        "she-server ready"
    );

    let mut in_buf = vec![0u8; config.payload_capacity];
    while running.load(Ordering::SeqCst) {
        match channel.recv_request(&mut in_buf) {
            Ok(len) => {
                let response = match codec::decode_request(&in_buf[..len]) {
                    Ok(request) => dispatcher.dispatch(&request),
                    Err(e) => {
                        tracing::warn!(error = %e, "failed to decode request packet");
                        she_core::SheResponse::error(she_core::SheErrorCode::GeneralError)
                    }
                };
                let out = codec::encode_response(&response);
                if let Err(e) = channel.send_response(&out) {
                    tracing::error!(error = %e, "failed to publish response");
                }
            }
            Err(she_core::transport::ShmError::NotReady) => {
                std::thread::sleep(Duration::from_micros(200));
            }
            Err(e) => {
                tracing::error!(error = %e, "transport error, continuing");
            }
        }
    }

    tracing::info!("she-server shutting down");
    save_key_facade(&key_facade, &config)?;
    ShmSegment::unlink(&config.request_segment).ok();
    ShmSegment::unlink(&config.response_segment).ok();
    Ok(())
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = build_config(&cli)?;
    init_tracing(&config.tracing_filter)?;

    let running = Arc::new(AtomicBool::new(true));
    ctrlc_handler(running.clone())?;

    run(config, running)
}
