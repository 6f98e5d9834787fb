// crates/playback-types/src/lib.rs

pub mod constants;
pub mod decoder_state;
pub mod error;
pub mod frame;
pub mod hw;
pub mod time_base;
pub mod worker_messages;

pub use decoder_state::{AtomicDecoderState, DecoderState};
pub use error::PlaybackError;
pub use frame::{AudioFrame, FrameBody, PixelFormatTag, PlaneImage, VideoFrame};
pub use hw::HardwareBackend;
pub use time_base::TimeBase;
pub use worker_messages::{AudioBatch, DrainedBatch, WorkerCommand, WorkerStatus};
