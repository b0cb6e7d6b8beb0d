//! Kinect XR websocket bridge daemon.
//!
//! Streams sensor RGB + depth to browser clients and mediates motor/LED
//! commands.
//!
//! Usage:
//!   kinect-bridge              # stream from hardware
//!   kinect-bridge --mock       # synthesize frames, no device required
//!   kinect-bridge --port 9000  # custom listen port
//!
//! Exit codes: 0 normal, 1 generic failure or unknown option, 2 no device
//! found, 3 device initialization failed.

#![forbid(unsafe_code)]

use std::process::ExitCode;

use clap::Parser;
use kinectxr_bridge::{BridgeConfig, BridgeServer};
use kinectxr_device::DriverConfig;
use tracing::{error, info};

const EXIT_FAILURE: u8 = 1;
const EXIT_NO_DEVICE: u8 = 2;
const EXIT_INIT_FAILED: u8 = 3;

#[derive(Parser, Debug)]
#[command(name = "kinect-bridge")]
#[command(about = "Kinect XR websocket bridge server")]
struct Args {
    /// Synthesize frames (no device required)
    #[arg(long)]
    mock: bool,

    /// Listen port
    #[arg(long, default_value_t = 8765)]
    port: u16,
}

#[tokio::main]
async fn main() -> ExitCode {
    // The documented exit codes differ from clap's defaults: unknown
    // options exit 1, help exits 0.
    let args = match Args::try_parse() {
        Ok(args) => args,
        Err(err) => {
            let is_help = matches!(
                err.kind(),
                clap::error::ErrorKind::DisplayHelp | clap::error::ErrorKind::DisplayVersion
            );
            let _ = err.print();
            return if is_help {
                ExitCode::SUCCESS
            } else {
                ExitCode::from(EXIT_FAILURE)
            };
        }
    };

    kinectxr_common::init_tracing();
    run(args).await
}

async fn run(args: Args) -> ExitCode {
    info!("Kinect XR websocket bridge");

    let driver = if args.mock {
        info!("mode: mock data (no device)");
        None
    } else {
        info!("mode: sensor hardware");

        let device_count = kinectxr_device::device_count();
        if device_count == 0 {
            device_error(
                "No Kinect device found.",
                "Unplug and replug the Kinect USB cable, then try again.",
            );
            return ExitCode::from(EXIT_NO_DEVICE);
        }
        info!("found {device_count} Kinect device(s)");

        let mut driver = kinectxr_device::default_driver();
        if let Err(cause) = driver.open(&DriverConfig::default()) {
            device_error(
                &format!("Kinect initialization failed: {cause}"),
                "Unplug and replug the Kinect USB cable, then try again.",
            );
            return ExitCode::from(EXIT_INIT_FAILED);
        }
        info!("Kinect initialized (streams start when clients connect)");
        Some(driver)
    };

    let config = BridgeConfig {
        port: args.port,
        mock: args.mock,
    };
    let mut server = BridgeServer::new(config, driver);

    let addr = match server.start().await {
        Ok(addr) => addr,
        Err(cause) => {
            error!("failed to start server: {cause:#}");
            return ExitCode::from(EXIT_FAILURE);
        }
    };
    info!(
        "bridge running; connect browsers to ws://localhost:{}/kinect",
        addr.port()
    );

    wait_for_shutdown().await;

    info!("shutting down");
    server.stop().await;
    ExitCode::SUCCESS
}

async fn wait_for_shutdown() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};
        let mut sigterm = signal(SignalKind::terminate()).expect("failed to install SIGTERM handler");
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {}
            _ = sigterm.recv() => {}
        }
    }
    #[cfg(not(unix))]
    {
        let _ = tokio::signal::ctrl_c().await;
    }
}

fn device_error(message: &str, suggestion: &str) {
    error!("{message}");
    eprintln!();
    eprintln!("  {message}");
    eprintln!("  FIX: {suggestion}");
    eprintln!();
    eprintln!("  Alternatives:");
    eprintln!("    - Run with --mock for testing without hardware");
    eprintln!("    - Check USB connection and power");
    eprintln!();
}
