//! Resources owned by one capture session

use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, warn};

use super::ports::{EncoderState, MediaEncoder, MediaStream};
use crate::domain::capture::{CaptureMode, ElapsedClock};

/// Cleanup registered by the compositor or mixer, run once when the
/// session ends
pub type TeardownAction = Box<dyn FnOnce() + Send>;

/// Everything one session holds: device streams, the encoder, the elapsed
/// clock and its ticker, registered teardown actions and the chunk list.
///
/// Created when acquisition starts and destroyed by [`ActiveSession::release`],
/// which every exit path goes through.
pub struct ActiveSession {
    mode: CaptureMode,
    streams: Vec<MediaStream>,
    teardowns: Vec<TeardownAction>,
    encoder: Option<Box<dyn MediaEncoder>>,
    requested_format: String,
    chunks: Vec<Vec<u8>>,
    clock: ElapsedClock,
    ticker: Option<JoinHandle<()>>,
    tasks: Vec<JoinHandle<()>>,
    stopping: bool,
}

impl ActiveSession {
    pub fn new(mode: CaptureMode) -> Self {
        Self {
            mode,
            streams: Vec::new(),
            teardowns: Vec::new(),
            encoder: None,
            requested_format: String::new(),
            chunks: Vec::new(),
            clock: ElapsedClock::new(),
            ticker: None,
            tasks: Vec::new(),
            stopping: false,
        }
    }

    pub fn mode(&self) -> CaptureMode {
        self.mode
    }

    /// Take ownership of an acquired device stream
    pub fn add_stream(&mut self, stream: MediaStream) {
        self.streams.push(stream);
    }

    pub fn register_teardown(&mut self, action: TeardownAction) {
        self.teardowns.push(action);
    }

    pub fn attach_encoder(&mut self, encoder: Box<dyn MediaEncoder>, requested_format: String) {
        self.encoder = Some(encoder);
        self.requested_format = requested_format;
    }

    pub fn encoder_mut(&mut self) -> Option<&mut (dyn MediaEncoder + 'static)> {
        self.encoder.as_deref_mut()
    }

    /// Format the encoder reports it is producing, empty without an encoder
    pub fn negotiated_format(&self) -> String {
        self.encoder
            .as_ref()
            .map(|e| e.mime_type())
            .unwrap_or_default()
    }

    pub fn requested_format(&self) -> &str {
        &self.requested_format
    }

    /// Append one encoded chunk; empty chunks are dropped
    pub fn push_chunk(&mut self, chunk: Vec<u8>) {
        if !chunk.is_empty() {
            self.chunks.push(chunk);
        }
    }

    pub fn chunk_count(&self) -> usize {
        self.chunks.len()
    }

    pub fn take_chunks(&mut self) -> Vec<Vec<u8>> {
        std::mem::take(&mut self.chunks)
    }

    pub fn clock(&self) -> &ElapsedClock {
        &self.clock
    }

    pub fn clock_mut(&mut self) -> &mut ElapsedClock {
        &mut self.clock
    }

    /// Replace the elapsed ticker, cancelling the previous one
    pub fn set_ticker(&mut self, ticker: Option<JoinHandle<()>>) {
        if let Some(old) = std::mem::replace(&mut self.ticker, ticker) {
            old.abort();
        }
    }

    /// Background task that lives as long as the session
    pub fn track_task(&mut self, task: JoinHandle<()>) {
        self.tasks.push(task);
    }

    /// Mark the stop as requested. Returns `false` if it already was.
    pub fn begin_stopping(&mut self) -> bool {
        !std::mem::replace(&mut self.stopping, true)
    }

    pub fn is_stopping(&self) -> bool {
        self.stopping
    }

    /// Release every resource. Safe to call any number of times; each
    /// teardown action runs at most once, in registration order.
    pub fn release(&mut self) {
        for stream in self.streams.drain(..) {
            stream.stop_all();
        }

        if let Some(mut encoder) = self.encoder.take() {
            if encoder.state() != EncoderState::Inactive {
                if let Err(e) = encoder.stop() {
                    warn!(error = %e, "Encoder did not stop cleanly");
                }
            }
        }

        self.clock.stop(Instant::now());
        self.set_ticker(None);

        let teardowns = std::mem::take(&mut self.teardowns);
        if !teardowns.is_empty() {
            debug!(count = teardowns.len(), "Running session teardown actions");
        }
        for action in teardowns {
            action();
        }

        self.chunks.clear();

        for task in self.tasks.drain(..) {
            task.abort();
        }
    }
}

impl Drop for ActiveSession {
    fn drop(&mut self) {
        self.release();
    }
}
