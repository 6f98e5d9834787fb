// crates/playback-core/src/lib.rs

pub mod audio_sink;
pub mod codec_select;
pub mod command_queue;
pub mod decode;
pub mod frame_pool;
pub mod playback;
pub mod presentation;
pub mod render_device;
pub mod stream_io;
pub mod worker;
pub mod yuv_convert;

mod helpers; // internal — not pub, not re-exported

pub use audio_sink::{AudioSink, NullAudioSink};
pub use codec_select::Candidate;
pub use command_queue::CommandQueue;
pub use decode::{DecodeSession, DecodedOutput};
pub use frame_pool::{FramePool, PooledHandle};
pub use playback::Playback;
pub use presentation::PresentationController;
pub use render_device::{texture_usage, RenderDevice, ResourceId, TextureDescriptor, YuvPushConstants};
pub use stream_io::{FileStreamSource, SeekWhence, StreamSource};
pub use worker::{DecoderWorker, WorkerHandle};
pub use yuv_convert::YUVConverter;
