// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! nid: the NeuroInsight job-execution daemon.
//!
//! Boots the configuration, registry, job store, task spool, and the
//! selected execution backend, then runs the durable task workers
//! until interrupted. The HTTP plumbing mounts on top of [`Server`].

use ni_server::{Config, Deps, Server};
use ni_storage::{FileJobStore, FsObjectStore, JobStore, ObjectStore};
use std::sync::Arc;
use tracing_subscriber::fmt::writer::MakeWriterExt;
use tracing_subscriber::EnvFilter;

fn init_tracing(config: &Config) {
    let file_appender =
        tracing_appender::rolling::daily(config.data_dir.join("logs"), "nid.log");
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .with_writer(file_appender.and(std::io::stdout))
        .init();
}

fn main() -> std::process::ExitCode {
    let config = match Config::from_env() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("configuration error: {e}");
            return std::process::ExitCode::FAILURE;
        }
    };
    if let Err(e) = std::fs::create_dir_all(config.data_dir.join("outputs")) {
        eprintln!("cannot create data directory {}: {e}", config.data_dir.display());
        return std::process::ExitCode::FAILURE;
    }
    init_tracing(&config);

    let runtime = match tokio::runtime::Runtime::new() {
        Ok(runtime) => runtime,
        Err(e) => {
            tracing::error!(error = %e, "cannot start async runtime");
            return std::process::ExitCode::FAILURE;
        }
    };

    runtime.block_on(async {
        let store: Arc<dyn JobStore> =
            match FileJobStore::open(config.data_dir.join("jobs.json")) {
                Ok(store) => Arc::new(store),
                Err(e) => {
                    tracing::error!(error = %e, "cannot open job store");
                    return std::process::ExitCode::FAILURE;
                }
            };
        let docker = match ni_executor::DockerRuntime::connect() {
            Ok(docker) => Arc::new(docker),
            Err(e) => {
                tracing::error!(error = %e, "cannot connect to Docker");
                return std::process::ExitCode::FAILURE;
            }
        };
        let object_store: Arc<dyn ObjectStore> =
            Arc::new(FsObjectStore::new(config.data_dir.join("object-store")));

        let server = match Server::build(
            config,
            Deps::new(store, docker).object_store(object_store),
        ) {
            Ok(server) => Arc::new(server),
            Err(e) => {
                tracing::error!(error = %e, "cannot assemble server");
                return std::process::ExitCode::FAILURE;
            }
        };

        let health = server.health().await;
        tracing::info!(status = health.status, "nid started");

        let pool = server.spawn_workers();

        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "signal handler failed");
        }
        tracing::info!("shutting down");
        pool.shutdown().await;
        std::process::ExitCode::SUCCESS
    })
}
