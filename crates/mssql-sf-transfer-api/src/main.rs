//! mssql-sf-transfer-api - HTTP service for MSSQL to Snowflake transfers.

mod error;
mod routes;

use std::net::UdpSocket;
use std::process::ExitCode;
use std::sync::Arc;

use clap::Parser;
use tracing::{info, Level};
use tracing_subscriber::fmt::format::FmtSpan;

use mssql_sf_transfer::{LogSink, TransferEngine, TransferRegistry};
use routes::AppState;

#[cfg(unix)]
use tokio::signal::unix::{signal, SignalKind};

const VERSION: &str = env!("CARGO_PKG_VERSION");

#[derive(Parser)]
#[command(name = "mssql-sf-transfer-api")]
#[command(about = "MSSQL to Snowflake transfer service")]
#[command(version)]
struct Cli {
    /// API server port
    #[arg(long, default_value = "9000")]
    port: u16,

    /// AWS region for the log sink and default SDK config
    #[arg(long, default_value = "us-west-2")]
    aws_region: String,

    /// CloudWatch log group receiving error messages
    #[arg(long, default_value = "sqlpipe-logs")]
    log_group: String,

    /// Log format: text or json
    #[arg(long, default_value = "text")]
    log_format: String,

    /// Log verbosity: debug, info, warn, error
    #[arg(long, default_value = "info")]
    verbosity: String,
}

#[tokio::main]
async fn main() -> ExitCode {
    match run().await {
        Ok(()) => ExitCode::SUCCESS,
        Err(message) => {
            eprintln!("{}", message);
            ExitCode::FAILURE
        }
    }
}

async fn run() -> Result<(), String> {
    let cli = Cli::parse();

    setup_logging(&cli.verbosity, &cli.log_format);

    let sdk_config = aws_config::defaults(aws_config::BehaviorVersion::latest())
        .region(aws_config::Region::new(cli.aws_region.clone()))
        .load()
        .await;

    // The log stream is named after this host's outbound IP, so parallel
    // instances ship to distinct streams.
    let stream_name = local_ip_address()?;
    let sink = LogSink::provision(
        aws_sdk_cloudwatchlogs::Client::new(&sdk_config),
        cli.log_group.clone(),
        stream_name.clone(),
    )
    .await
    .map_err(|e| e.format_detailed())?;
    let sink = Arc::new(sink);

    sink.ship(format!("Starting transfer service at IP {}", stream_name));

    let registry = Arc::new(TransferRegistry::new());
    let engine = TransferEngine::new(registry, Some(sink));

    let state = Arc::new(AppState {
        engine,
        version: VERSION,
    });

    let addr = format!("0.0.0.0:{}", cli.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .map_err(|e| format!("unable to bind {}: {}", addr, e))?;

    info!("Starting server on {}", addr);

    axum::serve(listener, routes::router(state))
        .with_graceful_shutdown(shutdown_signal())
        .await
        .map_err(|e| format!("server error: {}", e))?;

    info!("Stopped server");
    Ok(())
}

/// Outbound IP of this host, discovered without sending any traffic.
fn local_ip_address() -> Result<String, String> {
    let socket = UdpSocket::bind("0.0.0.0:0")
        .map_err(|e| format!("error getting local IP address: {}", e))?;
    socket
        .connect("8.8.8.8:80")
        .map_err(|e| format!("error getting local IP address: {}", e))?;
    let addr = socket
        .local_addr()
        .map_err(|e| format!("error getting local IP address: {}", e))?;
    Ok(addr.ip().to_string())
}

fn setup_logging(verbosity: &str, format: &str) {
    let level = match verbosity.to_lowercase().as_str() {
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    };

    let subscriber = tracing_subscriber::fmt()
        .with_max_level(level)
        .with_span_events(FmtSpan::CLOSE)
        .with_target(false);

    if format == "json" {
        subscriber.json().init();
    } else {
        subscriber.init();
    }
}

/// Resolve when SIGINT or SIGTERM arrives.
#[cfg(unix)]
async fn shutdown_signal() {
    let mut sigint = signal(SignalKind::interrupt()).expect("Failed to setup SIGINT handler");
    let mut sigterm = signal(SignalKind::terminate()).expect("Failed to setup SIGTERM handler");

    tokio::select! {
        _ = sigint.recv() => info!("Received SIGINT. Shutting down gracefully..."),
        _ = sigterm.recv() => info!("Received SIGTERM. Shutting down gracefully..."),
    }
}

#[cfg(not(unix))]
async fn shutdown_signal() {
    tokio::signal::ctrl_c()
        .await
        .expect("Failed to setup Ctrl-C handler");
    info!("Received Ctrl-C. Shutting down gracefully...");
}
