// crates/playback-core/src/presentation.rs
//
// PresentationController: the foreground playback clock. Advances the
// playhead, selects the current buffered frame, detects drift and triggers
// resync seeks, uploads to a texture (direct for RGBA8, via YUVConverter for
// the YUV family), and drains PCM to the audio sink.

use std::collections::VecDeque;
use std::sync::Arc;

use playback_types::constants::{LENIENCE_MS, MAX_PENDING_TEXTURES};
use playback_types::{DecoderState, DrainedBatch, FrameBody, VideoFrame};

use crate::audio_sink::AudioSink;
use crate::frame_pool::PooledHandle;
use crate::render_device::{texture_usage, RenderDevice, ResourceId, TextureDescriptor};
use crate::worker::{AudioBatch, PooledVideoBatch, WorkerHandle};
use crate::yuv_convert::YUVConverter;
use wgpu::{Extent3d, TextureFormat};

pub struct PresentationController<D: RenderDevice> {
    worker: Arc<dyn WorkerHandle>,
    device: Arc<D>,
    audio_sink: Arc<dyn AudioSink>,
    yuv: YUVConverter<D>,

    playhead_ms: f64,
    paused: bool,
    playing: bool,
    looping: bool,
    buffering: bool,
    frames_processed: u64,
    just_seeked: bool,

    current_video_frame: Option<PooledHandle<VideoFrame>>,
    last_current_time: Option<f64>,
    video_frames: VecDeque<PooledHandle<VideoFrame>>,
    audio_frames: VecDeque<playback_types::AudioFrame>,

    /// Bounded output-texture pool (C3, spec §4.3): `MAX_PENDING_TEXTURES`
    /// slots recycled round-robin, so an in-flight GPU read of the last
    /// upload is never clobbered by the next one.
    rgba_textures: [Option<ResourceId>; MAX_PENDING_TEXTURES],
    rgba_texture_size: (u32, u32),
    rgba_next_slot: usize,
    current_texture: Option<ResourceId>,
}

impl<D: RenderDevice> PresentationController<D> {
    pub fn new(worker: Arc<dyn WorkerHandle>, device: Arc<D>, audio_sink: Arc<dyn AudioSink>, looping: bool) -> Self {
        let yuv = YUVConverter::new(Arc::clone(&device));
        Self {
            worker,
            device,
            audio_sink,
            yuv,
            playhead_ms: 0.0,
            paused: false,
            playing: false,
            looping,
            buffering: false,
            frames_processed: 0,
            just_seeked: false,
            current_video_frame: None,
            last_current_time: None,
            video_frames: VecDeque::new(),
            audio_frames: VecDeque::new(),
            rgba_textures: [None; MAX_PENDING_TEXTURES],
            rgba_texture_size: (0, 0),
            rgba_next_slot: 0,
            current_texture: None,
        }
    }

    pub fn set_playing(&mut self, playing: bool) {
        self.playing = playing;
    }

    pub fn set_paused(&mut self, paused: bool) {
        self.paused = paused;
    }

    pub fn is_playing(&self) -> bool {
        self.playing && !self.paused
    }

    pub fn is_paused(&self) -> bool {
        self.paused
    }

    pub fn playhead_ms(&self) -> f64 {
        self.playhead_ms
    }

    pub fn frames_processed(&self) -> u64 {
        self.frames_processed
    }

    pub fn buffering(&self) -> bool {
        self.buffering
    }

    pub fn current_texture(&self) -> Option<ResourceId> {
        self.current_texture
    }

    /// Clear local buffers and drop the current frame (releasing its pool
    /// carrier) without touching the worker — used by `stop()`.
    pub fn reset_local_state(&mut self) {
        self.video_frames.clear();
        self.audio_frames.clear();
        self.current_video_frame = None;
        self.last_current_time = None;
        self.playhead_ms = 0.0;
        self.frames_processed = 0;
        self.buffering = false;
    }

    /// Enqueue a resync/user seek, clearing local buffers and raising
    /// `just_seeked` so the next due frame is accepted unconditionally.
    pub fn seek(&mut self, target_ms: f64) {
        self.worker.seek(target_ms);
        self.video_frames.clear();
        self.audio_frames.clear();
        self.playhead_ms = target_ms;
        self.just_seeked = true;
    }

    fn wrap_tolerant(&self, head_ms: f64) -> bool {
        if !self.looping {
            return false;
        }
        let dur = self.worker.duration_ms();
        dur > 0.0 && (dur - self.playhead_ms).abs() < LENIENCE_MS && head_ms < LENIENCE_MS
    }

    pub fn update(&mut self, delta_s: f64) {
        if self.paused || !self.playing {
            return;
        }
        self.playhead_ms += delta_s * 1000.0;

        if self.worker.state() == DecoderState::EndOfStream && self.video_frames.is_empty() {
            if self.playhead_ms < self.worker.last_decoded_ms() {
                self.seek(self.playhead_ms);
            } else {
                self.playing = false;
            }
        }

        if let Some(peek) = self.video_frames.front() {
            let diff = (self.playhead_ms - peek.time_ms).abs();
            let out_of_sync = diff > LENIENCE_MS && !self.wrap_tolerant(peek.time_ms);
            if out_of_sync {
                self.seek(self.playhead_ms);
            }
        }

        loop {
            let head_due = match self.video_frames.front() {
                Some(head) => {
                    let due = head.time_ms <= self.playhead_ms
                        && (head.time_ms - self.playhead_ms).abs() < LENIENCE_MS;
                    due || self.just_seeked || self.wrap_tolerant(head.time_ms)
                }
                None => false,
            };
            if !head_due {
                break;
            }
            let head = self.video_frames.pop_front().unwrap();
            self.current_video_frame = Some(head);
            self.just_seeked = false;
        }

        if let Some(frame) = &self.current_video_frame {
            let time_ms = frame.time_ms;
            if self.last_current_time != Some(time_ms) {
                self.upload_current_frame();
                self.frames_processed += 1;
                self.last_current_time = Some(time_ms);
            }
        }

        if self.video_frames.is_empty() {
            let batch = self.worker.drain_video();
            self.video_frames.extend(batch.items);
        }

        loop {
            let due = matches!(self.audio_frames.front(), Some(a) if a.time_ms <= self.playhead_ms);
            if !due {
                break;
            }
            let frame = self.audio_frames.pop_front().unwrap();
            let count = frame.sample_count();
            self.audio_sink.push(&frame.samples, count);
        }
        if self.audio_frames.is_empty() {
            let batch = self.worker.drain_audio();
            self.audio_frames.extend(batch.items);
        }

        self.buffering = self.worker.is_running() && self.video_frames.is_empty();
    }

    fn upload_current_frame(&mut self) {
        let Some(frame) = &self.current_video_frame else { return };
        match &frame.body {
            FrameBody::Yuv { y, u, v, a } => {
                self.yuv.set_frame_size(y.width, y.height);
                self.yuv.set_planes(y.clone(), u.clone(), v.clone(), a.clone());
                self.yuv.convert();
                self.current_texture = Some(self.yuv.get_output_texture());
            }
            FrameBody::Rgba8 { width, height, data } => {
                if self.rgba_texture_size != (*width, *height) {
                    for slot in &mut self.rgba_textures {
                        if let Some(old) = slot.take() {
                            self.device.free(old);
                        }
                    }
                    self.rgba_texture_size = (*width, *height);
                }

                let slot = self.rgba_next_slot;
                self.rgba_next_slot = (self.rgba_next_slot + 1) % self.rgba_textures.len();

                if self.rgba_textures[slot].is_none() {
                    let desc = TextureDescriptor {
                        size: Extent3d { width: *width, height: *height, depth_or_array_layers: 1 },
                        format: TextureFormat::Rgba8Unorm,
                        usage: texture_usage::SAMPLED | texture_usage::COLOR_ATTACHMENT | texture_usage::COPY_DST,
                    };
                    self.rgba_textures[slot] = Some(self.device.texture_create(&desc));
                }
                let tex = self.rgba_textures[slot].unwrap();
                self.device.texture_update(tex, 0, data);
                self.current_texture = Some(tex);
            }
        }
    }

    /// `stop()` support: clear the output, per the façade's choice (§4.8) to
    /// leave a clean slate for the next `play` rather than retaining the
    /// last frame.
    pub fn clear_output(&mut self) {
        self.yuv.clear_output_texture();
        for slot in self.rgba_textures.into_iter().flatten() {
            self.device.texture_clear(slot, wgpu::Color::TRANSPARENT);
        }
        self.current_texture = None;
    }
}

impl<D: RenderDevice> Drop for PresentationController<D> {
    fn drop(&mut self) {
        for slot in self.rgba_textures.iter_mut().filter_map(Option::take) {
            self.device.free(slot);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio_sink::NullAudioSink;
    use crate::frame_pool::FramePool;
    use crate::render_device::mock::MockRenderDevice;
    use std::sync::Mutex as StdMutex;

    /// Stand-in for `DecoderWorker` so the clock/drift/resync logic in
    /// `update()` can be driven without a real demuxer session. Video frames
    /// are preloaded directly into the queue `drain_video` serves from.
    struct FakeWorker {
        state: StdMutex<DecoderState>,
        last_decoded_ms: StdMutex<f64>,
        duration_ms: f64,
        video_pool: FramePool<VideoFrame>,
        video_queue: StdMutex<VecDeque<PooledHandle<VideoFrame>>>,
        audio_queue: StdMutex<VecDeque<playback_types::AudioFrame>>,
        seeks: StdMutex<Vec<f64>>,
    }

    fn fake_rgba_frame(time_ms: f64) -> VideoFrame {
        VideoFrame { time_ms, body: FrameBody::Rgba8 { width: 2, height: 2, data: vec![0u8; 16] } }
    }

    impl FakeWorker {
        fn new(duration_ms: f64) -> Self {
            Self {
                state: StdMutex::new(DecoderState::Running),
                last_decoded_ms: StdMutex::new(0.0),
                duration_ms,
                video_pool: FramePool::new(64, || fake_rgba_frame(0.0)),
                video_queue: StdMutex::new(VecDeque::new()),
                audio_queue: StdMutex::new(VecDeque::new()),
                seeks: StdMutex::new(Vec::new()),
            }
        }

        fn push_video(&self, time_ms: f64) {
            let mut handle = self.video_pool.take().unwrap();
            *handle = fake_rgba_frame(time_ms);
            self.video_queue.lock().unwrap().push_back(handle);
        }

        fn seek_calls(&self) -> Vec<f64> {
            self.seeks.lock().unwrap().clone()
        }
    }

    impl WorkerHandle for FakeWorker {
        fn state(&self) -> DecoderState {
            *self.state.lock().unwrap()
        }
        fn is_running(&self) -> bool {
            matches!(self.state(), DecoderState::Ready | DecoderState::Running)
        }
        fn last_decoded_ms(&self) -> f64 {
            *self.last_decoded_ms.lock().unwrap()
        }
        fn duration_ms(&self) -> f64 {
            self.duration_ms
        }
        fn seek(&self, target_ms: f64) {
            self.seeks.lock().unwrap().push(target_ms);
        }
        fn drain_video(&self) -> PooledVideoBatch {
            DrainedBatch { items: self.video_queue.lock().unwrap().drain(..).collect() }
        }
        fn drain_audio(&self) -> AudioBatch {
            DrainedBatch { items: self.audio_queue.lock().unwrap().drain(..).collect() }
        }
    }

    fn controller(worker: Arc<FakeWorker>) -> PresentationController<MockRenderDevice> {
        let device = Arc::new(MockRenderDevice::new());
        let sink = Arc::new(NullAudioSink);
        let mut pc = PresentationController::new(worker, device, sink, false);
        pc.set_playing(true);
        pc
    }

    #[test]
    fn current_frame_times_advance_monotonically() {
        let worker = Arc::new(FakeWorker::new(10_000.0));
        for i in 0..20 {
            worker.push_video(i as f64 * 16.6);
        }
        let mut pc = controller(worker);

        let mut last = -1.0f64;
        for _ in 0..60 {
            pc.update(1.0 / 60.0);
            if let Some(frame) = &pc.current_video_frame {
                assert!(frame.time_ms >= last, "frame times must not go backward");
                last = frame.time_ms;
            }
        }
        assert!(pc.frames_processed() > 0);
    }

    #[test]
    fn drift_beyond_lenience_triggers_resync_seek() {
        let worker = Arc::new(FakeWorker::new(60_000.0));
        // Head frame is ~10s ahead of a playhead that starts at 0 — a drift
        // far outside LENIENCE_MS (2.5s) should trigger a resync seek rather
        // than silently skipping ten seconds of video.
        worker.push_video(10_000.0);
        let mut pc = controller(worker.clone());

        // First tick only pulls the batch into the local buffer (it starts
        // empty); the drift-vs-playhead check runs against that buffer
        // starting the next tick.
        pc.update(1.0 / 60.0);
        pc.update(1.0 / 60.0);
        assert!(!worker.seek_calls().is_empty(), "drift should enqueue a resync seek");
    }

    #[test]
    fn seek_clears_local_buffers_and_sets_just_seeked() {
        let worker = Arc::new(FakeWorker::new(10_000.0));
        worker.push_video(0.0);
        worker.push_video(16.6);
        let mut pc = controller(worker);
        // First tick only pulls the batch into the local buffer; the second
        // is what actually advances `current_video_frame`.
        pc.update(1.0 / 60.0);
        pc.update(1.0 / 60.0);
        assert!(pc.current_video_frame.is_some());

        pc.seek(5_000.0);
        assert!(pc.video_frames.is_empty());
        assert!(pc.just_seeked);
        assert_eq!(pc.playhead_ms(), 5_000.0);
    }

    #[test]
    fn reset_local_state_zeroes_playhead_and_drops_current_frame() {
        let worker = Arc::new(FakeWorker::new(10_000.0));
        worker.push_video(0.0);
        let mut pc = controller(worker);
        pc.update(1.0 / 60.0);
        pc.update(1.0 / 60.0);
        assert!(pc.current_video_frame.is_some());

        pc.reset_local_state();
        assert_eq!(pc.playhead_ms(), 0.0);
        assert!(pc.current_video_frame.is_none());
        assert_eq!(pc.frames_processed(), 0);
    }

    #[test]
    fn buffering_reflects_empty_local_queue_while_worker_runs() {
        let worker = Arc::new(FakeWorker::new(10_000.0));
        // no frames pushed — the worker is "running" but has nothing buffered.
        let mut pc = controller(worker);
        pc.update(1.0 / 60.0);
        assert!(pc.buffering());
    }
}
