//! Software mixing graph
//!
//! Every source is converted to 48 kHz packed stereo f32 and buffered. A
//! mixer task ticks every 20 ms, sums one tick's worth of each connected
//! source (missing samples count as silence) and publishes the result on
//! the destination track.

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration as StdDuration;

use rubato::{FftFixedIn, Resampler};
use tokio::sync::broadcast::{self, error::RecvError};
use tokio::task::JoinHandle;
use tokio::time::{self, MissedTickBehavior};
use tracing::{debug, warn};

use crate::application::ports::{
    AudioContext, AudioContextFactory, AudioGraphError, AudioNodeId, MediaTrack, TrackKind,
};
use crate::domain::media::AudioChunk;

pub const MIX_SAMPLE_RATE: u32 = 48_000;
pub const MIX_CHANNELS: u16 = 2;
pub const MIX_TICK: StdDuration = StdDuration::from_millis(20);
const FRAMES_PER_TICK: usize = (MIX_SAMPLE_RATE as usize * 20) / 1000;
/// Per-source backlog cap, one second of audio
const MAX_BUFFERED_FRAMES: usize = MIX_SAMPLE_RATE as usize;
const RESAMPLER_CHUNK: usize = 1024;

/// Streaming converter from any rate/channel layout to the mix format
struct SourceConverter {
    source_rate: u32,
    resampler: Option<FftFixedIn<f32>>,
    /// Planar stereo input waiting for a full resampler chunk
    pending: [Vec<f32>; 2],
}

impl SourceConverter {
    fn new() -> Self {
        Self {
            source_rate: 0,
            resampler: None,
            pending: [Vec::new(), Vec::new()],
        }
    }

    /// Convert a chunk into packed stereo frames at the mix rate
    fn convert(&mut self, chunk: &AudioChunk) -> Result<Vec<f32>, AudioGraphError> {
        let (left, right) = to_planar_stereo(chunk);

        if chunk.sample_rate == MIX_SAMPLE_RATE {
            return Ok(interleave(&left, &right));
        }

        if chunk.sample_rate != self.source_rate || self.resampler.is_none() {
            self.source_rate = chunk.sample_rate;
            self.pending = [Vec::new(), Vec::new()];
            self.resampler = Some(
                FftFixedIn::<f32>::new(
                    chunk.sample_rate as usize,
                    MIX_SAMPLE_RATE as usize,
                    RESAMPLER_CHUNK,
                    2,
                    MIX_CHANNELS as usize,
                )
                .map_err(|e| AudioGraphError::Failed(format!("Resampler init failed: {}", e)))?,
            );
        }

        let Some(resampler) = self.resampler.as_mut() else {
            return Ok(Vec::new());
        };

        self.pending[0].extend_from_slice(&left);
        self.pending[1].extend_from_slice(&right);

        let mut output = Vec::new();
        loop {
            let needed = resampler.input_frames_next();
            if self.pending[0].len() < needed {
                break;
            }
            let input: Vec<Vec<f32>> = self
                .pending
                .iter_mut()
                .map(|channel| channel.drain(..needed).collect())
                .collect();
            let resampled = resampler
                .process(&input, None)
                .map_err(|e| AudioGraphError::Failed(format!("Resampling failed: {}", e)))?;
            output.extend(interleave(&resampled[0], &resampled[1]));
        }
        Ok(output)
    }
}

fn to_planar_stereo(chunk: &AudioChunk) -> (Vec<f32>, Vec<f32>) {
    match chunk.channels {
        0 | 1 => (chunk.samples().to_vec(), chunk.samples().to_vec()),
        channels => chunk
            .samples()
            .chunks(channels as usize)
            .map(|f| (f[0], f.get(1).copied().unwrap_or(f[0])))
            .unzip(),
    }
}

fn interleave(left: &[f32], right: &[f32]) -> Vec<f32> {
    left.iter()
        .zip(right)
        .flat_map(|(&l, &r)| [l, r])
        .collect()
}

struct Source {
    buffer: VecDeque<f32>,
    connected: bool,
    reader: Option<JoinHandle<()>>,
}

#[derive(Default)]
struct Graph {
    sources: HashMap<usize, Source>,
    next_id: usize,
    closed: bool,
}

impl Graph {
    /// Sum one tick of every connected source, clamped to [-1, 1]
    fn mix_tick(&mut self) -> Vec<f32> {
        let samples = FRAMES_PER_TICK * MIX_CHANNELS as usize;
        let mut mixed = vec![0.0f32; samples];
        for source in self.sources.values_mut().filter(|s| s.connected) {
            let available = source.buffer.len().min(samples);
            for (out, sample) in mixed.iter_mut().zip(source.buffer.drain(..available)) {
                *out += sample;
            }
        }
        for sample in &mut mixed {
            *sample = sample.clamp(-1.0, 1.0);
        }
        mixed
    }
}

/// Software [`AudioContext`] with one summing destination
pub struct SummingAudioContext {
    graph: Arc<Mutex<Graph>>,
    output: MediaTrack,
    mixer: Option<JoinHandle<()>>,
}

impl SummingAudioContext {
    /// Must be called inside a tokio runtime
    pub fn new() -> Self {
        let graph = Arc::new(Mutex::new(Graph::default()));
        let output = MediaTrack::audio("mixed audio");
        let mixer = tokio::spawn(run_mixer(Arc::clone(&graph), output.clone()));
        Self {
            graph,
            output,
            mixer: Some(mixer),
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Graph> {
        self.graph.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

async fn run_mixer(graph: Arc<Mutex<Graph>>, output: MediaTrack) {
    let mut ticker = time::interval(MIX_TICK);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    loop {
        ticker.tick().await;
        let mixed = {
            let mut graph = graph.lock().unwrap_or_else(PoisonError::into_inner);
            if graph.closed {
                return;
            }
            graph.mix_tick()
        };
        output.push_audio(AudioChunk::new(MIX_SAMPLE_RATE, MIX_CHANNELS, mixed));
    }
}

async fn run_reader(
    graph: Arc<Mutex<Graph>>,
    id: usize,
    track: MediaTrack,
    mut chunks: broadcast::Receiver<AudioChunk>,
) {
    let mut converter = SourceConverter::new();
    loop {
        let chunk = match chunks.recv().await {
            Ok(chunk) => chunk,
            Err(RecvError::Lagged(skipped)) => {
                warn!(track = track.label(), skipped, "Audio source lagged, dropping chunks");
                continue;
            }
            Err(RecvError::Closed) => return,
        };

        let converted = match converter.convert(&chunk) {
            Ok(samples) => samples,
            Err(e) => {
                warn!(track = track.label(), error = %e, "Dropping unconvertible audio");
                continue;
            }
        };

        let mut graph = graph.lock().unwrap_or_else(PoisonError::into_inner);
        let Some(source) = graph.sources.get_mut(&id) else {
            return;
        };
        source.buffer.extend(converted);
        let cap = MAX_BUFFERED_FRAMES * MIX_CHANNELS as usize;
        if source.buffer.len() > cap {
            let excess = source.buffer.len() - cap;
            source.buffer.drain(..excess);
        }
    }
}

impl Default for SummingAudioContext {
    fn default() -> Self {
        Self::new()
    }
}

impl AudioContext for SummingAudioContext {
    fn create_source(&mut self, track: &MediaTrack) -> Result<AudioNodeId, AudioGraphError> {
        let chunks = match track.kind() {
            TrackKind::Audio => track.subscribe_audio(),
            TrackKind::Video => None,
        }
        .ok_or_else(|| AudioGraphError::NotAudio(track.label().to_string()))?;

        let mut graph = self.lock();
        if graph.closed {
            return Err(AudioGraphError::Closed);
        }
        let id = graph.next_id;
        graph.next_id += 1;
        let reader = tokio::spawn(run_reader(
            Arc::clone(&self.graph),
            id,
            track.clone(),
            chunks,
        ));
        graph.sources.insert(
            id,
            Source {
                buffer: VecDeque::new(),
                connected: false,
                reader: Some(reader),
            },
        );
        debug!(node = id, track = track.label(), "Audio source created");
        Ok(AudioNodeId(id))
    }

    fn connect(&mut self, node: AudioNodeId) -> Result<(), AudioGraphError> {
        let mut graph = self.lock();
        if graph.closed {
            return Err(AudioGraphError::Closed);
        }
        let source = graph
            .sources
            .get_mut(&node.0)
            .ok_or(AudioGraphError::UnknownNode(node.0))?;
        source.connected = true;
        Ok(())
    }

    fn disconnect(&mut self, node: AudioNodeId) {
        let mut graph = self.lock();
        if let Some(mut source) = graph.sources.remove(&node.0) {
            if let Some(reader) = source.reader.take() {
                reader.abort();
            }
        }
    }

    fn destination_track(&self) -> MediaTrack {
        self.output.clone()
    }

    fn close(&mut self) {
        {
            let mut graph = self.lock();
            graph.closed = true;
            for (_, mut source) in graph.sources.drain() {
                if let Some(reader) = source.reader.take() {
                    reader.abort();
                }
            }
        }
        if let Some(mixer) = self.mixer.take() {
            mixer.abort();
        }
        self.output.stop();
    }
}

impl Drop for SummingAudioContext {
    fn drop(&mut self) {
        self.close();
    }
}

/// Creates [`SummingAudioContext`]s
#[derive(Debug, Default, Clone, Copy)]
pub struct SummingAudioContextFactory;

impl AudioContextFactory for SummingAudioContextFactory {
    fn create(&self) -> Result<Box<dyn AudioContext>, AudioGraphError> {
        if tokio::runtime::Handle::try_current().is_err() {
            return Err(AudioGraphError::Failed("no async runtime".to_string()));
        }
        Ok(Box::new(SummingAudioContext::new()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tone(rate: u32, channels: u16, value: f32, frames: usize) -> AudioChunk {
        AudioChunk::new(rate, channels, vec![value; frames * channels as usize])
    }

    #[test]
    fn mono_is_duplicated_to_stereo() {
        let chunk = AudioChunk::new(MIX_SAMPLE_RATE, 1, vec![0.1, 0.2]);
        let mut converter = SourceConverter::new();
        assert_eq!(converter.convert(&chunk).unwrap(), vec![0.1, 0.1, 0.2, 0.2]);
    }

    #[test]
    fn extra_channels_are_dropped() {
        let chunk = AudioChunk::new(MIX_SAMPLE_RATE, 3, vec![0.1, 0.2, 0.3, 0.4, 0.5, 0.6]);
        let mut converter = SourceConverter::new();
        assert_eq!(converter.convert(&chunk).unwrap(), vec![0.1, 0.2, 0.4, 0.5]);
    }

    #[test]
    fn other_rates_are_resampled() {
        let mut converter = SourceConverter::new();
        let mut produced = 0;
        for _ in 0..10 {
            produced += converter.convert(&tone(16_000, 1, 0.25, 1600)).unwrap().len();
        }
        // 1 second at 16 kHz becomes roughly 1 second at 48 kHz, minus
        // whatever is still waiting for a full resampler chunk
        let frames = produced / 2;
        assert!(frames > 40_000 && frames <= 48_000, "got {} frames", frames);
    }

    #[test]
    fn mix_sums_and_clamps_connected_sources() {
        let mut graph = Graph::default();
        let samples = FRAMES_PER_TICK * 2;
        for (id, value, connected) in [(0, 0.6, true), (1, 0.7, true), (2, 0.9, false)] {
            graph.sources.insert(
                id,
                Source {
                    buffer: std::iter::repeat(value).take(samples).collect(),
                    connected,
                    reader: None,
                },
            );
        }

        let mixed = graph.mix_tick();
        assert_eq!(mixed.len(), samples);
        assert!(mixed.iter().all(|s| *s == 1.0));
    }

    #[test]
    fn short_source_is_padded_with_silence() {
        let mut graph = Graph::default();
        graph.sources.insert(
            0,
            Source {
                buffer: VecDeque::from(vec![0.5; 4]),
                connected: true,
                reader: None,
            },
        );
        let mixed = graph.mix_tick();
        assert_eq!(&mixed[..4], &[0.5; 4]);
        assert!(mixed[4..].iter().all(|s| *s == 0.0));
    }

    #[tokio::test(start_paused = true)]
    async fn mixes_live_tracks_into_destination() {
        let mut context = SummingAudioContext::new();
        let mic = MediaTrack::audio("mic");
        let system = MediaTrack::audio("system");
        for track in [&mic, &system] {
            let node = context.create_source(track).unwrap();
            context.connect(node).unwrap();
        }
        let mut output = context.destination_track().subscribe_audio().unwrap();

        // Several ticks' worth, so at least one tick sees both sources
        for _ in 0..3 {
            mic.push_audio(tone(MIX_SAMPLE_RATE, 2, 0.25, FRAMES_PER_TICK));
            system.push_audio(tone(MIX_SAMPLE_RATE, 1, 0.25, FRAMES_PER_TICK));
        }

        let mut found = false;
        for _ in 0..10 {
            let chunk = output.recv().await.unwrap();
            if chunk.samples().iter().any(|s| (*s - 0.5).abs() < 1e-6) {
                found = true;
                break;
            }
        }
        assert!(found);

        context.close();
        context.close();
        assert!(!context.destination_track().is_live());
    }

    #[tokio::test]
    async fn rejects_video_tracks() {
        let mut context = SummingAudioContext::new();
        let err = context
            .create_source(&MediaTrack::video("screen"))
            .unwrap_err();
        assert!(matches!(err, AudioGraphError::NotAudio(_)));
    }
}
