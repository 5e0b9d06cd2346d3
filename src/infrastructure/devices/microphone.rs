//! Default input device via cpal
//!
//! `cpal::Stream` is not `Send`, so the stream lives on its own thread for
//! as long as the track stays live.

use std::thread;
use std::time::Duration as StdDuration;

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{SampleFormat, StreamConfig};
use tokio::sync::oneshot;
use tracing::{debug, warn};

use crate::application::ports::{AcquireError, MediaTrack, MicrophoneConstraints};
use crate::domain::media::AudioChunk;

/// How often the owning thread checks whether the track was released
const LIVENESS_POLL: StdDuration = StdDuration::from_millis(100);

/// Open the default input device and publish its samples on a new track
pub async fn open_default_microphone(
    constraints: &MicrophoneConstraints,
) -> Result<MediaTrack, AcquireError> {
    if constraints.echo_cancellation || constraints.noise_suppression {
        debug!("Input processing constraints are not available on this host, ignoring");
    }

    let track = MediaTrack::audio("microphone");
    let (ready_tx, ready_rx) = oneshot::channel();

    let worker_track = track.clone();
    thread::Builder::new()
        .name("capture-deck-mic".into())
        .spawn(move || run_input(worker_track, ready_tx))
        .map_err(|e| AcquireError::Failed(format!("Failed to spawn audio thread: {}", e)))?;

    ready_rx
        .await
        .map_err(|_| AcquireError::Failed("Audio thread exited".into()))??;
    Ok(track)
}

fn input_device() -> Result<(cpal::Device, StreamConfig, SampleFormat), AcquireError> {
    let host = cpal::default_host();
    let device = host
        .default_input_device()
        .ok_or_else(|| AcquireError::NotFound("No audio input device".into()))?;

    let supported = device
        .default_input_config()
        .map_err(|e| AcquireError::classify("NotReadableError", &e.to_string()))?;

    Ok((device, supported.config(), supported.sample_format()))
}

fn build_stream(
    device: &cpal::Device,
    config: &StreamConfig,
    format: SampleFormat,
    track: &MediaTrack,
) -> Result<cpal::Stream, AcquireError> {
    let sample_rate = config.sample_rate.0;
    let channels = config.channels;

    let error_track = track.clone();
    let on_error = move |err: cpal::StreamError| {
        warn!(error = %err, "Audio input stream error");
        if matches!(err, cpal::StreamError::DeviceNotAvailable) {
            error_track.end();
        }
    };

    let stream = match format {
        SampleFormat::F32 => {
            let track = track.clone();
            device.build_input_stream(
                config,
                move |data: &[f32], _: &cpal::InputCallbackInfo| {
                    if track.is_live() {
                        track.push_audio(AudioChunk::new(sample_rate, channels, data.to_vec()));
                    }
                },
                on_error,
                None,
            )
        }
        SampleFormat::I16 => {
            let track = track.clone();
            device.build_input_stream(
                config,
                move |data: &[i16], _: &cpal::InputCallbackInfo| {
                    if track.is_live() {
                        let samples = data.iter().map(|&s| s as f32 / 32768.0).collect();
                        track.push_audio(AudioChunk::new(sample_rate, channels, samples));
                    }
                },
                on_error,
                None,
            )
        }
        other => {
            return Err(AcquireError::NotReadable(format!(
                "Unsupported sample format: {:?}",
                other
            )))
        }
    };

    stream.map_err(|e| AcquireError::classify("NotReadableError", &e.to_string()))
}

fn run_input(track: MediaTrack, ready: oneshot::Sender<Result<(), AcquireError>>) {
    let stream = input_device().and_then(|(device, config, format)| {
        debug!(
            rate = config.sample_rate.0,
            channels = config.channels,
            format = ?format,
            "Opening audio input"
        );
        let stream = build_stream(&device, &config, format, &track)?;
        stream
            .play()
            .map_err(|e| AcquireError::classify("NotReadableError", &e.to_string()))?;
        Ok(stream)
    });

    let stream = match stream {
        Ok(stream) => stream,
        Err(e) => {
            let _ = ready.send(Err(e));
            return;
        }
    };
    let _ = ready.send(Ok(()));

    while track.is_live() {
        thread::sleep(LIVENESS_POLL);
    }
    drop(stream);
    debug!("Audio input closed");
}
