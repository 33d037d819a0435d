use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Duration;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use voicegate::audio::{FrameSource, MicSource};
use voicegate::trigger::TriggerMode;
use voicegate::{Config, Daemon};

/// Voicegate - voice front end for a remote conversational session
#[derive(Parser)]
#[command(name = "voicegate", version, about)]
struct Cli {
    /// Trigger mode: how capture is gated
    #[arg(short, long, env = "VOICEGATE_TRIGGER_MODE", value_enum, default_value_t = TriggerMode::WakeWord)]
    mode: TriggerMode,

    /// Path to a TOML config file
    #[arg(short, long, env = "VOICEGATE_CONFIG")]
    config: Option<PathBuf>,

    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Test microphone input
    TestMic {
        /// Duration in seconds
        #[arg(short, long, default_value = "5")]
        duration: u64,
    },
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    // Set up logging based on verbosity
    let filter = match cli.verbose {
        0 => "info,voicegate=info",
        1 => "info,voicegate=debug",
        2 => "debug",
        _ => "trace",
    };

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(filter))
        .init();

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!("fatal: {e}");
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    if let Some(cmd) = cli.command {
        return match cmd {
            Command::TestMic { duration } => test_mic(duration).await,
        };
    }

    tracing::info!(mode = %cli.mode, "starting voicegate");

    let config = Config::load(cli.mode, cli.config.as_deref())?;
    tracing::debug!(
        url = %config.session.base_url,
        frame_len = config.audio.frame_len,
        data_dir = %config.data_dir.display(),
        "loaded configuration"
    );

    let daemon = Daemon::new(config);
    daemon.run().await?;

    Ok(())
}

/// Test microphone input with an RMS meter
async fn test_mic(duration: u64) -> anyhow::Result<()> {
    println!("Testing microphone for {duration} seconds...");
    println!("Speak into your microphone!\n");

    let mut source = MicSource::open()?;

    // 250ms of 16-bit mono at 16kHz per meter update
    let mut buf = vec![0u8; 8000];

    for i in 0..duration * 4 {
        let read =
            tokio::task::block_in_place(|| source.read_frame(&mut buf)).unwrap_or_default();

        let samples: Vec<i16> = buf[..read]
            .chunks_exact(2)
            .map(|pair| i16::from_le_bytes([pair[0], pair[1]]))
            .collect();
        let energy = calculate_rms(&samples);
        let peak = samples
            .iter()
            .map(|s| f32::from(*s).abs() / 32768.0)
            .fold(0.0f32, f32::max);

        // Visual meter
        #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
        let meter_len = (energy * 200.0).min(50.0) as usize;
        let meter: String = "█".repeat(meter_len) + &" ".repeat(50 - meter_len);

        #[allow(clippy::cast_precision_loss)]
        let secs = (i + 1) as f64 / 4.0;
        println!("[{secs:4.1}s] RMS: {energy:.4} | Peak: {peak:.4} | [{meter}]");

        tokio::time::sleep(Duration::from_millis(10)).await;
    }

    println!("\n---");
    println!("If you saw movement in the meter, your mic is working!");
    println!("If RMS stayed near 0, check:");
    println!("  1. Is your mic plugged in?");
    println!("  2. Run: pactl info | grep 'Default Source'");
    println!("  3. Run: arecord -l (to list devices)");

    Ok(())
}

/// Normalized RMS energy of 16-bit samples
#[allow(clippy::cast_precision_loss)]
fn calculate_rms(samples: &[i16]) -> f32 {
    if samples.is_empty() {
        return 0.0;
    }
    let sum_squares: f32 = samples
        .iter()
        .map(|&s| {
            let v = f32::from(s) / 32768.0;
            v * v
        })
        .sum();
    (sum_squares / samples.len() as f32).sqrt()
}
