use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use std::io::Read;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;
use wavrec::{
    AudioFile, Config, DeviceSource, RecorderEvent, RecordingConfig, StartedRecording,
    StopReason, StopSummary, WavHeader, WavRecorder, HEADER_LEN,
};

#[derive(Parser)]
#[command(name = "wavrec")]
#[command(about = "Record raw PCM audio straight into WAV files")]
#[command(version)]
struct Cli {
    /// Configuration file, with or without extension
    #[arg(long, default_value = "config/wavrec")]
    config: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Record until stopped, Ctrl-C, or the maximum duration
    Record {
        /// Output file (bare names go under the recordings directory)
        #[arg(long, short)]
        output: Option<String>,

        /// Sample rate in Hz
        #[arg(long)]
        sample_rate: Option<u32>,

        /// 1 (mono) or 2 (stereo)
        #[arg(long)]
        channels: Option<u16>,

        /// Bytes per sample: 1 (8-bit) or 2 (16-bit)
        #[arg(long)]
        byte_depth: Option<u16>,

        /// Maximum recording duration in seconds
        #[arg(long)]
        max_duration: Option<f64>,

        /// Leave levels out of progress events
        #[arg(long)]
        no_metering: bool,

        /// Progress interval in milliseconds
        #[arg(long)]
        subscription_ms: Option<u64>,

        /// mic, tone, silence, or a WAV file to replay
        #[arg(long, default_value = "mic")]
        source: String,

        /// Frequency of the tone source
        #[arg(long, default_value = "440")]
        tone_hz: f64,

        /// Pause after this many seconds
        #[arg(long)]
        pause_after: Option<f64>,

        /// Resume this many seconds after pausing
        #[arg(long, requires = "pause_after")]
        resume_after: Option<f64>,

        /// Print events as JSON lines
        #[arg(long)]
        json: bool,
    },

    /// Show the header and format of a WAV file
    Inspect {
        path: PathBuf,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let cfg = Config::load(&cli.config)?;

    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&cfg.logging.filter))
        .context("Invalid logging filter")?;
    tracing_subscriber::fmt().with_env_filter(filter).init();

    match cli.command {
        Commands::Record {
            output,
            sample_rate,
            channels,
            byte_depth,
            max_duration,
            no_metering,
            subscription_ms,
            source,
            tone_hz,
            pause_after,
            resume_after,
            json,
        } => {
            let request = RecordingConfig {
                destination: output,
                sample_rate,
                channels,
                byte_depth,
                max_duration_secs: max_duration,
                metering_enabled: no_metering.then_some(false),
                subscription_duration_ms: subscription_ms,
                device: Some(parse_source(&source, tone_hz)),
                ..Default::default()
            };
            let summary = record(cfg, request, pause_after, resume_after, json).await?;
            if summary.reason == StopReason::Error {
                bail!("Recording to {} failed", summary.destination.display());
            }
            Ok(())
        }
        Commands::Inspect { path } => inspect(&path),
    }
}

fn parse_source(source: &str, tone_hz: f64) -> DeviceSource {
    match source {
        "mic" | "microphone" => DeviceSource::Microphone,
        "tone" => DeviceSource::Tone {
            frequency_hz: tone_hz,
        },
        "silence" => DeviceSource::Silence,
        path => DeviceSource::File(PathBuf::from(path)),
    }
}

async fn record(
    cfg: Config,
    request: RecordingConfig,
    pause_after: Option<f64>,
    resume_after: Option<f64>,
    json: bool,
) -> Result<StopSummary> {
    let recorder = Arc::new(WavRecorder::with_devices(cfg.recorder));

    let StartedRecording {
        granted,
        mut events,
    } = recorder.start(request).await?;

    if json {
        println!("{}", serde_json::to_string(&granted)?);
    } else {
        println!(
            "Recording to {} ({}, max {:.1}s)",
            granted.destination.display(),
            granted.format,
            granted.max_duration_ms as f64 / 1000.0
        );
    }

    if let Some(pause_after) = pause_after {
        let recorder = Arc::clone(&recorder);
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_secs_f64(pause_after)).await;
            info!("Pause: {:?}", recorder.pause());
            if let Some(resume_after) = resume_after {
                tokio::time::sleep(Duration::from_secs_f64(resume_after)).await;
                info!("Resume: {:?}", recorder.resume());
            }
        });
    }

    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);
    let mut interrupted = false;
    let mut summary = None;

    while summary.is_none() {
        tokio::select! {
            event = events.recv() => {
                let Some(event) = event else { break };
                if json {
                    println!("{}", serde_json::to_string(&event)?);
                }
                match event {
                    RecorderEvent::Progress(update) => {
                        if !json {
                            match update.level_db {
                                Some(level) => println!(
                                    "{:>8.1}s {:>7.1} dB",
                                    update.elapsed_ms as f64 / 1000.0,
                                    level
                                ),
                                None => println!("{:>8.1}s", update.elapsed_ms as f64 / 1000.0),
                            }
                        }
                    }
                    RecorderEvent::Stopped(stopped) => summary = Some(stopped),
                }
            }
            signal = &mut ctrl_c, if !interrupted => {
                interrupted = true;
                signal.context("Failed to listen for Ctrl-C")?;
                info!("Interrupted, stopping recording");
                recorder.stop().await?;
            }
        }
    }

    // Reap a session that ended on its own
    recorder.stop().await?;

    let Some(summary) = summary else {
        bail!("Recorder closed its event channel without a stop event");
    };

    if !json {
        println!(
            "Stopped ({}): {} samples, {} data bytes in {}",
            summary.reason,
            summary.samples_processed,
            summary.data_bytes,
            summary.destination.display()
        );
    }
    Ok(summary)
}

fn inspect(path: &Path) -> Result<()> {
    let mut header_bytes = [0u8; HEADER_LEN];
    std::fs::File::open(path)
        .and_then(|mut file| file.read_exact(&mut header_bytes))
        .with_context(|| format!("Failed to read header of {}", path.display()))?;

    let Some(header) = WavHeader::parse(&header_bytes) else {
        bail!("{} does not start with a canonical PCM WAV header", path.display());
    };

    println!("File:            {}", path.display());
    println!("Sample rate:     {} Hz", header.sample_rate);
    println!("Channels:        {}", header.num_channels);
    println!("Bits per sample: {}", header.bits_per_sample());
    println!("Byte rate:       {}", header.byte_rate());
    println!("Block align:     {}", header.block_align());
    println!("Data bytes:      {}", header.data_len);

    match AudioFile::open(path) {
        Ok(audio) => {
            println!("Samples:         {}", audio.sample_count());
            println!("Duration:        {:.3} s", audio.duration_seconds);
        }
        Err(e) => warn!("Could not decode samples: {:#}", e),
    }

    Ok(())
}
