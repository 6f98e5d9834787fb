// crates/playback-core/src/audio_sink.rs
//
// Host audio output contract consumed by PresentationController: either a
// `mix(samples, sample_count, offset)`-style pull callback or a push
// callback, per §6 "exactly one of these is present depending on host
// integration mode". Modeled here as a single push-style trait; a host that
// wants the pull style wraps its own ring buffer behind it.

/// Receives interleaved float32 PCM as it becomes due for playback.
pub trait AudioSink: Send + Sync {
    /// `samples` is interleaved; `sample_count == samples.len() / channels`.
    fn push(&self, samples: &[f32], sample_count: usize);
}

/// No-op sink for hosts that play video only, and for tests that don't care
/// about audio.
pub struct NullAudioSink;

impl AudioSink for NullAudioSink {
    fn push(&self, _samples: &[f32], _sample_count: usize) {}
}
