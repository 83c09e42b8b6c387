use std::time::Duration;

use anyhow::Result;
use clap::Parser;
use colored::Colorize;
use tracing::{warn, Level};
use tracing_subscriber::FmtSubscriber;

mod args;

use args::Args;
use trackcast::capture::{CaptureManager, NokhwaBackend};
use trackcast::config::AppConfig;
use trackcast::estimator::Estimator;
use trackcast::output::PreviewWindow;
use trackcast::pipeline::Orchestrator;
use trackcast::sink::LoggingSink;
use trackcast::streaming::{LandmarkPublisher, WebSocketTransport};

#[tokio::main]
async fn main() -> Result<()> {
    FmtSubscriber::builder()
        .with_max_level(Level::INFO)
        .with_target(false)
        .init();

    let args = Args::parse();

    if args.list {
        let devices = NokhwaBackend::list_devices()?;
        println!("{}", "Available Cameras:".green());
        println!("{:<5} | {:<30}", "Index", "Name");
        println!("{}", "-".repeat(40));
        for (index, name) in devices {
            println!("{index:<5} | {name:<30}");
        }
        return Ok(());
    }

    let config = AppConfig::load()?;
    let mode = args.mode.into();

    let capture = CaptureManager::new(Box::new(NokhwaBackend));
    let estimator = Estimator::load(&config.estimation, mode)?;

    let mut publisher = LandmarkPublisher::new()
        .with_reconnect_delay(Duration::from_millis(config.streaming.reconnect_ms));
    if !args.no_stream {
        let room = args.room.as_deref().unwrap_or(&config.streaming.room);
        let transport = WebSocketTransport::new(config.streaming.url.clone());
        if let Err(e) = publisher.connect(Box::new(transport), room) {
            warn!(error = %e, "streaming unavailable, continuing without it");
        }
    }

    let mut orchestrator = Orchestrator::new(
        capture,
        estimator,
        publisher,
        Box::new(LoggingSink),
        &config,
    );
    orchestrator.start(&args.device, mode)?;

    let surface = orchestrator.surface();
    let mut window = PreviewWindow::new("trackcast", surface.width(), surface.height())?;

    while window.is_open() && !window.escape_pressed() {
        if !orchestrator.step() {
            break;
        }
        window.update(orchestrator.surface().data())?;
    }

    orchestrator.stop();
    Ok(())
}
