// crates/playback-types/src/worker_messages.rs
//
// Types exchanged between DecoderWorker and the foreground — the playback
// analogue of velocut-media's MediaResult channel, narrowed to what a
// playback session (as opposed to a whole editor) needs.

use crate::decoder_state::DecoderState;
use crate::frame::AudioFrame;

/// A batch drained from the worker's decoded-video / decoded-audio queues in
/// one critical section (see §9 "Shared mutable queues").
#[derive(Clone, Debug, Default)]
pub struct DrainedBatch<T> {
    pub items: Vec<T>,
}

impl<T> DrainedBatch<T> {
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

pub type AudioBatch = DrainedBatch<AudioFrame>;

/// Commands the foreground enqueues for the worker to run between decode steps.
#[derive(Clone, Copy, Debug)]
pub enum WorkerCommand {
    /// Seek to `target_ms`, flushing decoder buffers and raising `skip_current_outputs`.
    Seek { target_ms: f64 },
    /// Tear down and rebuild the codec context (used after a hardware-decode demotion).
    Reconfigure,
}

/// Snapshot of worker state the foreground reads without locking the frame queues.
#[derive(Clone, Copy, Debug)]
pub struct WorkerStatus {
    pub state: DecoderState,
    pub last_decoded_ms: f64,
}
