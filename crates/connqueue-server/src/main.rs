#![doc = include_str!("../README.md")]

use clap::Parser;
use connqueue::{AcceptCoordinator, BoundedConnectionQueue, ShutdownSignal, WorkerPool};
use connqueue_server::server::config::{CliArgs, ServerConfig};
use connqueue_server::server::http::StaticFileHandler;
use connqueue_server::server::net::TcpAcceptor;
use connqueue_server::server::telemetry::init_telemetry;
use std::net::SocketAddr;
use std::sync::Arc;

// Using mimalloc for better performance under contention, especially in musl
// environments.
#[global_allocator]
static GLOBAL: mimalloc::MiMalloc = mimalloc::MiMalloc;

fn main() -> anyhow::Result<()> {
    // Load from .env
    let _ = dotenvy::dotenv();
    let args = CliArgs::parse();
    let config = ServerConfig::try_from(args)?;

    init_telemetry(config.log_format)?;

    let acceptor = TcpAcceptor::bind(&config.addr, ShutdownSignal::new())?
        .with_request_timeout(config.request_timeout);
    let local_addr = acceptor.local_addr()?;

    let waker = acceptor.waker()?;
    ctrlc::set_handler(move || {
        if waker.trigger() {
            tracing::info!("Shutdown signal received, draining queued connections");
        } else {
            tracing::warn!("Second shutdown signal received, exiting without draining");
            std::process::exit(130);
        }
    })?;

    log_startup_info(local_addr, &config);

    let queue = Arc::new(BoundedConnectionQueue::new(config.queue_capacity)?);
    let handler = Arc::new(StaticFileHandler::new(config.serve_dir.clone()));
    let pool = WorkerPool::spawn(config.num_workers, Arc::clone(&queue), handler)?;

    // The coordinator owns the last handle held by this thread, so the queue
    // is torn down once the workers have exited.
    let report = AcceptCoordinator::new(acceptor, queue, pool).run()?;

    tracing::info!(
        "Server stopped: {} accepted, {} served, {} failed",
        report.accepted,
        report.served,
        report.failed
    );
    Ok(())
}

fn log_startup_info(addr: SocketAddr, config: &ServerConfig) {
    if cfg!(debug_assertions) {
        tracing::info!("Serving on {addr} with full config: {config:#?}");
    } else {
        tracing::info!(
            "Serving {:?} on {addr} with {} workers and {} queue slots",
            config.serve_dir,
            config.num_workers,
            config.queue_capacity
        );
    }
}
