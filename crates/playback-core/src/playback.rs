// crates/playback-core/src/playback.rs
//
// Playback: the public lifecycle façade (load/play/pause/stop/seek/update)
// plus read-only getters. Owns the DecoderWorker and PresentationController
// and ties Drop to the worker's shutdown sequence.

use std::path::PathBuf;
use std::sync::Arc;

use playback_types::{DecoderState, HardwareBackend, PlaybackError};

use crate::audio_sink::{AudioSink, NullAudioSink};
use crate::presentation::PresentationController;
use crate::render_device::{RenderDevice, ResourceId};
use crate::worker::{DecoderWorker, WorkerHandle};

pub struct Playback<D: RenderDevice> {
    // Declaration order matters: Rust drops fields top-to-bottom, so
    // `presentation` (which holds a pool carrier and GPU textures) releases
    // before `worker`'s Drop sets `abort` and joins the decode thread —
    // mirroring MediaWorker::shutdown's poison-pill pattern.
    presentation: PresentationController<D>,
    worker: Arc<DecoderWorker>,
    looping: bool,
}

impl<D: RenderDevice> Playback<D> {
    /// Construct a worker for `path` and pre-allocate presentation state.
    /// Does not start playback — call `play()` for that.
    pub fn load(
        path: PathBuf,
        allowed_hw: HardwareBackend,
        looping: bool,
        device: Arc<D>,
        audio_sink: Arc<dyn AudioSink>,
    ) -> Result<Self, PlaybackError> {
        let worker = Arc::new(DecoderWorker::spawn(path, allowed_hw, looping)?);
        let handle: Arc<dyn WorkerHandle> = Arc::clone(&worker);
        let presentation = PresentationController::new(handle, device, audio_sink, looping);
        Ok(Self { worker, presentation, looping })
    }

    fn faulted(&self) -> bool {
        self.worker.state() == DecoderState::Faulted
    }

    /// Convenience constructor for hosts that don't care about audio.
    pub fn load_video_only(
        path: PathBuf,
        allowed_hw: HardwareBackend,
        looping: bool,
        device: Arc<D>,
    ) -> Result<Self, PlaybackError> {
        Self::load(path, allowed_hw, looping, device, Arc::new(NullAudioSink))
    }

    pub fn play(&mut self) {
        if self.faulted() {
            return;
        }
        self.presentation.reset_local_state();
        self.presentation.seek(0.0);
        self.presentation.set_playing(true);
        self.presentation.set_paused(false);
    }

    pub fn pause(&mut self, paused: bool) {
        self.presentation.set_paused(paused);
    }

    pub fn stop(&mut self) {
        self.presentation.set_playing(false);
        self.presentation.reset_local_state();
        self.presentation.clear_output();
    }

    pub fn seek(&mut self, seconds: f64) {
        self.presentation.seek(seconds * 1000.0);
    }

    pub fn update(&mut self, delta_seconds: f64) {
        if self.faulted() {
            return;
        }
        self.presentation.update(delta_seconds);
    }

    pub fn duration_seconds(&self) -> f64 {
        self.worker.duration_ms() / 1000.0
    }

    pub fn playhead_seconds(&self) -> f64 {
        self.presentation.playhead_ms() / 1000.0
    }

    pub fn current_texture(&self) -> Option<ResourceId> {
        self.presentation.current_texture()
    }

    /// Native sample rate of the opened audio codec context (0 if the
    /// container has no audio stream).
    pub fn mix_rate(&self) -> u32 {
        self.worker.mix_rate()
    }

    /// Output channel count of decoded audio handed to the sink (0 if the
    /// container has no audio stream).
    pub fn channel_count(&self) -> u16 {
        self.worker.channel_count()
    }

    pub fn is_playing(&self) -> bool {
        !self.faulted() && self.presentation.is_playing()
    }

    pub fn is_paused(&self) -> bool {
        self.presentation.is_paused()
    }

    pub fn is_buffering(&self) -> bool {
        self.presentation.buffering()
    }

    pub fn frames_processed(&self) -> u64 {
        self.presentation.frames_processed()
    }

    pub fn looping(&self) -> bool {
        self.looping
    }
}
