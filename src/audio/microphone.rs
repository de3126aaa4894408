// Hardware input capture through cpal
//
// cpal streams are callback driven and not `Send` on every platform, so the
// stream lives on its own thread. The callback pushes encoded PCM bytes
// into a bounded handoff that `read` drains.

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{SampleFormat, SampleRate, SizedSample, StreamConfig, SupportedStreamConfig};
use std::sync::mpsc::{self, SyncSender};
use std::thread::JoinHandle;
use std::time::Duration;
use tracing::{error, info, warn};

use super::backend::{
    CaptureFormat, CaptureRequest, ChannelConfig, OpenError, SampleEncoding, SampleSource,
    SourceError,
};
use super::handoff::{chunk_channel, ChunkReceiver, ChunkSender};
use super::tone::encode_sample;

/// Buffers held between the audio callback and the capture loop
const CHANNEL_CAPACITY: usize = 64;

/// How long a read waits before declaring the device stalled
const READ_TIMEOUT: Duration = Duration::from_secs(5);

pub struct MicrophoneSource {
    granted: CaptureFormat,
    frame_bytes: usize,
    chunks: ChunkReceiver,
    shutdown_tx: Option<SyncSender<()>>,
    stream_thread: Option<JoinHandle<()>>,
    name: String,
}

impl MicrophoneSource {
    pub fn open(request: &CaptureRequest) -> Result<Self, OpenError> {
        let (ready_tx, ready_rx) = mpsc::sync_channel(1);
        let (data_tx, chunks) = chunk_channel(CHANNEL_CAPACITY);
        let (shutdown_tx, shutdown_rx) = mpsc::sync_channel::<()>(1);
        let requested = request.format;

        let stream_thread = std::thread::Builder::new()
            .name("wavrec-microphone".to_string())
            .spawn(move || {
                let stream = match build_stream(requested, data_tx) {
                    Ok((stream, granted, name)) => {
                        let _ = ready_tx.send(Ok((granted, name)));
                        stream
                    }
                    Err(e) => {
                        let _ = ready_tx.send(Err(e));
                        return;
                    }
                };

                // Keep the stream alive until close() or the source is dropped
                let _ = shutdown_rx.recv();
                drop(stream);
            })
            .map_err(|e| OpenError::HardwareUnavailable(e.to_string()))?;

        let (granted, name) = ready_rx
            .recv()
            .map_err(|_| OpenError::HardwareUnavailable("audio thread exited".to_string()))??;

        Ok(Self {
            granted,
            frame_bytes: granted.frame_bytes_for(request.buffer_duration_ms),
            chunks,
            shutdown_tx: Some(shutdown_tx),
            stream_thread: Some(stream_thread),
            name,
        })
    }
}

/// Pick a supported input config, preferring the requested rate and channels
fn choose_config(
    device: &cpal::Device,
    requested: CaptureFormat,
) -> Result<SupportedStreamConfig, OpenError> {
    let wanted_channels = requested.num_channels();
    let wanted_rate = SampleRate(requested.sample_rate);

    let exact = device
        .supported_input_configs()
        .map_err(|e| OpenError::HardwareUnavailable(e.to_string()))?
        .filter(|c| matches!(c.sample_format(), SampleFormat::I16 | SampleFormat::F32))
        .find(|c| {
            c.channels() == wanted_channels
                && c.min_sample_rate() <= wanted_rate
                && c.max_sample_rate() >= wanted_rate
        });

    if let Some(range) = exact {
        return Ok(range.with_sample_rate(wanted_rate));
    }

    let fallback = device
        .default_input_config()
        .map_err(|e| OpenError::UnsupportedConfig(e.to_string()))?;
    warn!(
        "Requested {} not supported by input device; falling back to {}Hz, {} channel(s)",
        requested,
        fallback.sample_rate().0,
        fallback.channels()
    );
    Ok(fallback)
}

fn build_stream(
    requested: CaptureFormat,
    tx: ChunkSender,
) -> Result<(cpal::Stream, CaptureFormat, String), OpenError> {
    let host = cpal::default_host();
    let device = host
        .default_input_device()
        .ok_or_else(|| OpenError::HardwareUnavailable("no default input device".to_string()))?;
    let name = device.name().unwrap_or_else(|_| "input device".to_string());

    let supported = choose_config(&device, requested)?;
    let Some(channels) = ChannelConfig::from_count(supported.channels()) else {
        return Err(OpenError::UnsupportedConfig(format!(
            "device offers {} channels",
            supported.channels()
        )));
    };

    // Any device sample format is converted to the requested encoding
    let granted = CaptureFormat::new(supported.sample_rate().0, channels, requested.encoding);
    let config: StreamConfig = supported.config();

    let stream = match supported.sample_format() {
        SampleFormat::I16 => build_typed::<i16>(&device, &config, granted.encoding, tx),
        SampleFormat::F32 => build_typed::<f32>(&device, &config, granted.encoding, tx),
        other => {
            return Err(OpenError::UnsupportedConfig(format!(
                "unsupported device sample format {:?}",
                other
            )))
        }
    }?;

    stream
        .play()
        .map_err(|e| OpenError::HardwareUnavailable(e.to_string()))?;

    info!("Microphone stream started on '{}' ({})", name, granted);

    Ok((stream, granted, name))
}

fn build_typed<T>(
    device: &cpal::Device,
    config: &StreamConfig,
    encoding: SampleEncoding,
    tx: ChunkSender,
) -> Result<cpal::Stream, OpenError>
where
    T: SizedSample,
    f32: cpal::FromSample<T>,
{
    let err_tx = tx.clone();

    device
        .build_input_stream(
            config,
            move |data: &[T], _: &cpal::InputCallbackInfo| {
                let mut bytes = Vec::with_capacity(data.len() * encoding.byte_depth() as usize);
                for &sample in data {
                    let value: f32 = cpal::Sample::from_sample(sample);
                    encode_sample(value as f64, encoding, &mut bytes);
                }
                // Drop audio rather than block the callback if the loop is behind
                tx.deliver(bytes);
            },
            move |err| {
                error!("Input stream error: {}", err);
                err_tx.fail(err.to_string());
            },
            None,
        )
        .map_err(|e| OpenError::UnsupportedConfig(e.to_string()))
}

impl SampleSource for MicrophoneSource {
    fn granted(&self) -> CaptureFormat {
        self.granted
    }

    fn frame_bytes(&self) -> usize {
        self.frame_bytes
    }

    fn read(&mut self, buf: &mut [u8]) -> Result<usize, SourceError> {
        self.chunks.read(buf, READ_TIMEOUT)
    }

    fn suspend(&mut self, paused: bool) {
        self.chunks.suspend(paused);
    }

    fn close(&mut self) {
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
        }
        if let Some(handle) = self.stream_thread.take() {
            if handle.join().is_err() {
                warn!("Microphone stream thread panicked");
            }
        }
        let dropped = self.chunks.dropped();
        if dropped > 0 {
            warn!(
                "Dropped {} input buffer(s) while the capture loop was behind",
                dropped
            );
        }
        info!("Microphone stream closed");
    }

    fn name(&self) -> &str {
        &self.name
    }
}

impl Drop for MicrophoneSource {
    fn drop(&mut self) {
        if self.shutdown_tx.is_some() {
            self.close();
        }
    }
}
