use anyhow::{Context, bail};
use clap::{Parser, ValueEnum};
use std::path::PathBuf;
use std::time::Duration;

/// Output format of the log subscriber.
#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    /// Multi-line, human-readable output.
    #[default]
    Pretty,
    /// One JSON object per event.
    Json,
}

/// Runtime configuration for the `connqueue-server` binary.
///
/// All values are parsed from CLI arguments or environment variables (a
/// `.env` file is loaded first), with defaults suited to a small deployment.
#[derive(Parser, Debug, Clone)]
#[command(
    name = "connqueue-server",
    version,
    about = "Serve a directory over HTTP/1.0 with a fixed worker pool"
)]
pub struct CliArgs {
    /// Directory whose files are served. Request targets resolve relative to
    /// it and may not escape it.
    ///
    /// Environment variable: `SERVE_DIR`
    #[arg(env = "SERVE_DIR")]
    pub directory: PathBuf,

    /// TCP port to listen on.
    ///
    /// Environment variable: `PORT`
    #[arg(env = "PORT")]
    pub port: u16,

    /// Address to bind. Use `::` to accept IPv6 as well.
    ///
    /// Environment variable: `BIND_HOST`
    #[arg(long, env = "BIND_HOST", default_value_t = String::from("0.0.0.0"))]
    pub host: String,

    /// Number of worker threads answering requests.
    ///
    /// Fixed for the lifetime of the process.
    ///
    /// Environment variable: `NUM_WORKERS`
    #[arg(long, env = "NUM_WORKERS", default_value_t = 5)]
    pub num_workers: usize,

    /// Maximum number of accepted connections waiting for a worker.
    ///
    /// When the queue is full the accept thread blocks, and further clients
    /// wait in the kernel backlog. Lower values bound memory and latency more
    /// tightly; higher values absorb bursts.
    ///
    /// Environment variable: `QUEUE_CAPACITY`
    #[arg(long, env = "QUEUE_CAPACITY", default_value_t = 5)]
    pub queue_capacity: usize,

    /// Seconds a client may stall while sending its request or receiving the
    /// response before the worker gives up on it.
    ///
    /// Bounds how long shutdown waits on a silent client.
    ///
    /// Environment variable: `REQUEST_TIMEOUT`
    #[arg(long, env = "REQUEST_TIMEOUT", default_value_t = 30)]
    pub request_timeout: u64,

    /// Log output format.
    ///
    /// Environment variable: `LOG_FORMAT`
    #[arg(long, env = "LOG_FORMAT", value_enum, default_value_t = LogFormat::Pretty)]
    pub log_format: LogFormat,
}

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub serve_dir: PathBuf,
    pub addr: String,
    pub num_workers: usize,
    pub queue_capacity: usize,
    pub request_timeout: Duration,
    pub log_format: LogFormat,
}

impl TryFrom<CliArgs> for ServerConfig {
    type Error = anyhow::Error;

    fn try_from(args: CliArgs) -> Result<Self, Self::Error> {
        if args.num_workers == 0 {
            bail!("NUM_WORKERS must be greater than 0");
        }

        if args.queue_capacity == 0 {
            bail!("QUEUE_CAPACITY must be greater than 0");
        }

        if args.request_timeout == 0 {
            bail!("REQUEST_TIMEOUT must be greater than 0");
        }

        let serve_dir = args
            .directory
            .canonicalize()
            .with_context(|| format!("cannot resolve serve directory {:?}", args.directory))?;
        if !serve_dir.is_dir() {
            bail!("{serve_dir:?} is not a directory");
        }

        let addr = if args.host.contains(':') {
            format!("[{}]:{}", args.host, args.port)
        } else {
            format!("{}:{}", args.host, args.port)
        };

        Ok(Self {
            serve_dir,
            addr,
            num_workers: args.num_workers,
            queue_capacity: args.queue_capacity,
            request_timeout: Duration::from_secs(args.request_timeout),
            log_format: args.log_format,
        })
    }
}
