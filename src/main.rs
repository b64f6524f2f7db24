use anyhow::{Context, Result};
use clap::Parser;
use log::{debug, warn};
use std::io::Stdout;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use drivelog::gpx::GpxWriter;
use drivelog::poll::{PollConfig, PollLoop};
use drivelog::vehicle::{OwnerApiClient, VehicleApi, VehicleId};

#[derive(Parser, Debug)]
#[command(name = "drivelog")]
#[command(about = "Streams a GPX track-log of a vehicle by polling its telemetry API", long_about = None)]
struct Args {
    /// Path to the API token file
    #[arg(long)]
    token: Option<PathBuf>,

    /// Wake up the vehicle at startup and keep it awake
    #[arg(long)]
    wakeup: bool,

    /// Verbose diagnostics to stderr
    #[arg(long)]
    verbose: bool,

    /// Keep one continuous track instead of opening a new one per drive
    #[arg(long = "singleTrack")]
    single_track: bool,

    /// Vehicle id to track (defaults to the last vehicle on the account)
    #[arg(long)]
    vehicle: Option<VehicleId>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let token = match args.token {
        Some(token) => token,
        None => {
            eprintln!("--token must be specified");
            std::process::exit(1);
        }
    };

    env_logger::Builder::from_env(
        env_logger::Env::default()
            .default_filter_or(if args.verbose { "debug" } else { "info" }),
    )
    .init();

    let client = OwnerApiClient::from_token_file(&token)?;
    let vehicle = resolve_vehicle(&client, args.vehicle).await?;
    debug!("tracking vehicle {}", vehicle);

    if args.wakeup {
        if let Err(err) = client.wake(vehicle).await {
            warn!("wake request failed: {:#}", err);
        }
    }

    let writer = Arc::new(Mutex::new(GpxWriter::new(std::io::stdout())));
    writer
        .lock()
        .unwrap()
        .write_header(args.single_track)
        .context("couldn't write GPX header")?;

    let config = PollConfig {
        force_awake: args.wakeup,
        ..PollConfig::default()
    };
    let mut poll = PollLoop::new(client, vehicle, writer.clone(), config, args.single_track);

    let result = tokio::select! {
        result = poll.run() => result,
        _ = termination_signal() => Ok(()),
    };

    finish(&writer);
    result
}

async fn resolve_vehicle<C: VehicleApi>(client: &C, requested: Option<VehicleId>) -> Result<VehicleId> {
    if let Some(id) = requested {
        return Ok(id);
    }
    let vehicles = client.vehicles().await.context("couldn't list vehicles")?;
    vehicles
        .last()
        .copied()
        .context("no vehicles on this account")
}

/// Resolves on SIGINT or SIGTERM.
async fn termination_signal() {
    let mut sigterm = match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
    {
        Ok(sigterm) => sigterm,
        Err(err) => {
            warn!("couldn't install SIGTERM handler: {}", err);
            let _ = tokio::signal::ctrl_c().await;
            return;
        }
    };
    tokio::select! {
        _ = tokio::signal::ctrl_c() => {}
        _ = sigterm.recv() => {}
    }
}

/// One-shot finalization: close an open segment and the root element. Runs
/// on both the signal path and the loop-error path; `finish` itself is
/// idempotent.
fn finish(writer: &Arc<Mutex<GpxWriter<Stdout>>>) {
    if let Err(err) = writer.lock().unwrap().finish() {
        warn!("couldn't finalize GPX output: {}", err);
    }
}
