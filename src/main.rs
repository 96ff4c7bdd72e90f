use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::signal;

use bungu_entry_scanner::config::Config;
use bungu_entry_scanner::models::{PlatformContext, ScanState};
use bungu_entry_scanner::platform::frame_folder::FrameFolderDevices;
use bungu_entry_scanner::platform::stream_sink::StreamVideoSink;
use bungu_entry_scanner::platform::Navigator;
use bungu_entry_scanner::service::{EntryScanner, HttpTournamentApi, RqrrDecoder, ScannerDeps};
use bungu_entry_scanner::telemetry::init_telemetry;

#[derive(Parser)]
#[command(name = "bungu-entry-scanner", about = "Scan a BUNGU SQUAD tournament entry QR code")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Scan frames from a directory of images used as the camera
    Scan {
        #[arg(long)]
        frames: PathBuf,
    },
    /// Decode a single uploaded image
    Image { path: PathBuf },
    /// Enter the tournament URL by hand
    Manual { url: String },
    /// Print camera environment diagnostics
    Diagnose {
        #[arg(long)]
        frames: Option<PathBuf>,
    },
}

/// Prints the destination instead of opening a browser page.
struct StdoutNavigator;

impl Navigator for StdoutNavigator {
    fn navigate(&self, destination: &str) {
        println!("{}", destination);
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Load configuration
    let config = Config::from_env()?;

    // Initialize telemetry
    init_telemetry(&config.telemetry);

    let frames = match &cli.command {
        Command::Scan { frames } => frames.clone(),
        Command::Diagnose { frames } => frames.clone().unwrap_or_else(|| PathBuf::from(".")),
        _ => PathBuf::from("."),
    };

    let deps = ScannerDeps {
        devices: Arc::new(FrameFolderDevices::new(frames)),
        sink: Arc::new(StreamVideoSink::new()),
        decoder: Arc::new(RqrrDecoder::new()),
        api: Arc::new(HttpTournamentApi::new(config.api.base_url.clone())),
        navigator: Arc::new(StdoutNavigator),
        platform: PlatformContext {
            secure_context: true,
            standalone: false,
            user_agent: config.camera.user_agent.clone(),
        },
    };
    let mut scanner = EntryScanner::new(&config, deps);

    tracing::info!(scanner_id = %scanner.id(), "Starting BUNGU SQUAD entry scanner");

    let state = match cli.command {
        Command::Scan { .. } => {
            let handle = scanner.handle();
            tokio::spawn(async move {
                if signal::ctrl_c().await.is_ok() {
                    tracing::info!("Received Ctrl+C, stopping scanner");
                    handle.stop();
                }
            });
            scanner.scan().await?
        }
        Command::Image { path } => {
            let bytes = tokio::fs::read(&path).await?;
            scanner.submit_image(&bytes).await?
        }
        Command::Manual { url } => scanner.submit_manual_url(&url).await?,
        Command::Diagnose { .. } => {
            scanner.probe_environment().await;
            for line in scanner.diagnostics() {
                println!("{}", line);
            }
            return Ok(());
        }
    };

    report(&scanner, &state);
    scanner.stop().await;

    if let ScanState::Error(_) = state {
        std::process::exit(1);
    }
    Ok(())
}

fn report(scanner: &EntryScanner, state: &ScanState) {
    match state {
        ScanState::Success { destination } => {
            tracing::info!(destination = %destination, "Tournament entry complete");
        }
        ScanState::Error(err) => {
            eprintln!("{}", err.user_message());
            match serde_json::to_string_pretty(&err.report()) {
                Ok(json) => eprintln!("{}", json),
                Err(e) => tracing::warn!(error = %e, "Could not serialize error report"),
            }
            if err.is_acquisition_error() {
                for line in scanner.diagnostics() {
                    eprintln!("  {}", line);
                }
            }
        }
        other => tracing::info!(phase = ?other.phase(), "Scanner stopped"),
    }
}
