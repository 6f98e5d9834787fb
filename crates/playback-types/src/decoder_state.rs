// crates/playback-types/src/decoder_state.rs

use std::sync::atomic::{AtomicU8, Ordering};

/// Lifecycle of one DecoderWorker. A seek always resets RUNNING/READY-adjacent
/// states back to READY; FAULTED is terminal.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DecoderState {
    Ready,
    Running,
    EndOfStream,
    Faulted,
    Stopped,
}

impl DecoderState {
    fn to_u8(self) -> u8 {
        match self {
            DecoderState::Ready => 0,
            DecoderState::Running => 1,
            DecoderState::EndOfStream => 2,
            DecoderState::Faulted => 3,
            DecoderState::Stopped => 4,
        }
    }

    fn from_u8(v: u8) -> Self {
        match v {
            0 => DecoderState::Ready,
            1 => DecoderState::Running,
            2 => DecoderState::EndOfStream,
            3 => DecoderState::Faulted,
            _ => DecoderState::Stopped,
        }
    }
}

/// Single-writer (worker), multi-reader (foreground) atomic cell for `DecoderState`.
pub struct AtomicDecoderState(AtomicU8);

impl AtomicDecoderState {
    pub fn new(initial: DecoderState) -> Self {
        Self(AtomicU8::new(initial.to_u8()))
    }

    pub fn load(&self) -> DecoderState {
        DecoderState::from_u8(self.0.load(Ordering::Acquire))
    }

    pub fn store(&self, state: DecoderState) {
        self.0.store(state.to_u8(), Ordering::Release);
    }
}

impl Default for AtomicDecoderState {
    fn default() -> Self {
        Self::new(DecoderState::Ready)
    }
}
