// crates/playback-core/src/worker.rs
//
// DecoderWorker: owns the demuxer/decoder session and the single background
// thread that drives it. Publishes decoded video/audio into bounded queues
// and services a CommandQueue (seek, reconfigure) between decode steps.

use std::collections::VecDeque;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use playback_types::constants::{BACKPRESSURE_SLEEP_MS, EOF_SLEEP_MS, MAX_PENDING_FRAMES};
use playback_types::{AtomicDecoderState, AudioFrame, DecoderState, DrainedBatch, HardwareBackend, PlaybackError, VideoFrame, WorkerCommand, WorkerStatus};

use crate::command_queue::CommandQueue;
use crate::decode::{DecodeSession, DecodedOutput};
use crate::frame_pool::{FramePool, PooledHandle};

pub type PooledVideoBatch = DrainedBatch<PooledHandle<VideoFrame>>;
pub type AudioBatch = DrainedBatch<AudioFrame>;

fn empty_video_frame() -> VideoFrame {
    VideoFrame { time_ms: 0.0, body: playback_types::FrameBody::Rgba8 { width: 0, height: 0, data: Vec::new() } }
}

struct AtomicMs(AtomicU64);

impl AtomicMs {
    fn new(v: f64) -> Self {
        Self(AtomicU64::new(v.to_bits()))
    }
    fn load(&self) -> f64 {
        f64::from_bits(self.0.load(Ordering::Acquire))
    }
    fn store(&self, v: f64) {
        self.0.store(v.to_bits(), Ordering::Release)
    }
}

pub struct DecoderWorker {
    thread: Option<JoinHandle<()>>,
    abort: Arc<AtomicBool>,
    state: Arc<AtomicDecoderState>,
    last_decoded_ms: Arc<AtomicMs>,
    skip_current_outputs: Arc<AtomicBool>,
    commands: Arc<CommandQueue>,
    video_pool: FramePool<VideoFrame>,
    video_queue: Arc<Mutex<VecDeque<PooledHandle<VideoFrame>>>>,
    audio_queue: Arc<Mutex<VecDeque<AudioFrame>>>,
    video_size: (u32, u32),
    duration_ms: f64,
    mix_rate: u32,
    channel_count: u16,
}

/// Seam `PresentationController` depends on instead of the concrete
/// `DecoderWorker`, so its clock/drift/resync logic can be exercised against
/// a fake worker in tests without a real demuxer session.
pub trait WorkerHandle: Send + Sync {
    fn state(&self) -> DecoderState;
    fn is_running(&self) -> bool;
    fn last_decoded_ms(&self) -> f64;
    fn duration_ms(&self) -> f64;
    fn seek(&self, target_ms: f64);
    fn drain_video(&self) -> PooledVideoBatch;
    fn drain_audio(&self) -> AudioBatch;
}

impl DecoderWorker {
    /// Open `path` and spawn the decode thread. Surfaces `StreamOpen` /
    /// `DemuxOpen` / `NoVideoStream` / `CodecOpenAllFailed` synchronously —
    /// the façade's `load()` treats any of these as FAULTED before playback
    /// starts, per the load-time contract.
    pub fn spawn(path: PathBuf, allowed_hw: HardwareBackend, looping: bool) -> Result<Self, PlaybackError> {
        if !path.exists() {
            return Err(PlaybackError::StreamOpen(format!("{} not found", path.display())));
        }
        let session = DecodeSession::open(&path, allowed_hw)?;
        Self::spawn_session(session, looping)
    }

    /// Open a host-provided `StreamSource` (rather than a file path) and spawn
    /// the decode thread. The host owns the stream's lifetime and identity —
    /// there is no path to check for existence up front, so open failures
    /// surface only via `DecodeSession::open_stream`'s own error.
    pub fn spawn_stream(
        source: Box<dyn crate::stream_io::StreamSource>,
        allowed_hw: HardwareBackend,
        looping: bool,
    ) -> Result<Self, PlaybackError> {
        let session = DecodeSession::open_stream(source, allowed_hw)?;
        Self::spawn_session(session, looping)
    }

    fn spawn_session(session: DecodeSession, looping: bool) -> Result<Self, PlaybackError> {
        let video_size = session.video_size();
        let duration_ms = session.duration_ms();
        let mix_rate = session.audio_mix_rate();
        let channel_count = session.audio_channel_count();

        let abort = Arc::new(AtomicBool::new(false));
        let state = Arc::new(AtomicDecoderState::new(DecoderState::Ready));
        let last_decoded_ms = Arc::new(AtomicMs::new(0.0));
        let skip_current_outputs = Arc::new(AtomicBool::new(false));
        let commands = Arc::new(CommandQueue::new());
        let video_pool: FramePool<VideoFrame> = FramePool::new(MAX_PENDING_FRAMES, empty_video_frame);
        let video_queue = Arc::new(Mutex::new(VecDeque::new()));
        let audio_queue = Arc::new(Mutex::new(VecDeque::new()));

        let thread = {
            let abort = Arc::clone(&abort);
            let state = Arc::clone(&state);
            let last_decoded_ms = Arc::clone(&last_decoded_ms);
            let skip_current_outputs = Arc::clone(&skip_current_outputs);
            let commands = Arc::clone(&commands);
            let video_pool = video_pool.clone();
            let video_queue = Arc::clone(&video_queue);
            let audio_queue = Arc::clone(&audio_queue);

            thread::spawn(move || {
                run_decode_loop(
                    session, looping, abort, state, last_decoded_ms,
                    skip_current_outputs, commands, video_pool, video_queue, audio_queue,
                );
            })
        };

        Ok(Self {
            thread: Some(thread),
            abort,
            state,
            last_decoded_ms,
            skip_current_outputs,
            commands,
            video_pool,
            video_queue,
            audio_queue,
            video_size,
            duration_ms,
            mix_rate,
            channel_count,
        })
    }

    pub fn state(&self) -> DecoderState {
        self.state.load()
    }

    pub fn is_running(&self) -> bool {
        matches!(self.state(), DecoderState::Ready | DecoderState::Running)
    }

    pub fn last_decoded_ms(&self) -> f64 {
        self.last_decoded_ms.load()
    }

    /// A single-read snapshot of `state` + `last_decoded_ms`, for hosts that
    /// want both without two separate atomic loads racing against the worker.
    pub fn status(&self) -> WorkerStatus {
        WorkerStatus { state: self.state(), last_decoded_ms: self.last_decoded_ms() }
    }

    pub fn video_size(&self) -> (u32, u32) {
        self.video_size
    }

    pub fn duration_ms(&self) -> f64 {
        self.duration_ms
    }

    /// Native sample rate of the opened audio codec context (0 if no audio stream).
    pub fn mix_rate(&self) -> u32 {
        self.mix_rate
    }

    /// Output channel count of decoded audio handed to the sink (0 if no audio stream).
    pub fn channel_count(&self) -> u16 {
        self.channel_count
    }

    pub fn pending_video_count(&self) -> usize {
        self.video_pool.in_flight()
    }

    /// Drain every buffered video frame, atomically clearing the queue.
    pub fn drain_video(&self) -> PooledVideoBatch {
        let mut q = self.video_queue.lock().unwrap();
        DrainedBatch { items: q.drain(..).collect() }
    }

    /// Drain every buffered audio frame, atomically clearing the queue.
    pub fn drain_audio(&self) -> AudioBatch {
        let mut q = self.audio_queue.lock().unwrap();
        DrainedBatch { items: q.drain(..).collect() }
    }

    /// Enqueue a seek and block until the worker has executed it.
    pub fn seek(&self, target_ms: f64) {
        self.commands.push_and_wait(WorkerCommand::Seek { target_ms });
    }

    pub fn abort(&self) {
        self.abort.store(true, Ordering::Release);
    }
}

impl Drop for DecoderWorker {
    fn drop(&mut self) {
        self.abort.store(true, Ordering::Release);
        if let Some(handle) = self.thread.take() {
            let _ = handle.join();
        }
    }
}

impl WorkerHandle for DecoderWorker {
    fn state(&self) -> DecoderState {
        DecoderWorker::state(self)
    }
    fn is_running(&self) -> bool {
        DecoderWorker::is_running(self)
    }
    fn last_decoded_ms(&self) -> f64 {
        DecoderWorker::last_decoded_ms(self)
    }
    fn duration_ms(&self) -> f64 {
        DecoderWorker::duration_ms(self)
    }
    fn seek(&self, target_ms: f64) {
        DecoderWorker::seek(self, target_ms)
    }
    fn drain_video(&self) -> PooledVideoBatch {
        DecoderWorker::drain_video(self)
    }
    fn drain_audio(&self) -> AudioBatch {
        DecoderWorker::drain_audio(self)
    }
}

#[allow(clippy::too_many_arguments)]
fn run_decode_loop(
    mut session: DecodeSession,
    mut looping: bool,
    abort: Arc<AtomicBool>,
    state: Arc<AtomicDecoderState>,
    last_decoded_ms: Arc<AtomicMs>,
    skip_current_outputs: Arc<AtomicBool>,
    commands: Arc<CommandQueue>,
    video_pool: FramePool<VideoFrame>,
    video_queue: Arc<Mutex<VecDeque<PooledHandle<VideoFrame>>>>,
    audio_queue: Arc<Mutex<VecDeque<AudioFrame>>>,
) {
    let mut skip_output_until = 0.0f64;

    loop {
        if abort.load(Ordering::Acquire) {
            break;
        }

        match state.load() {
            DecoderState::Ready | DecoderState::Running => {
                if video_pool.in_flight() < video_pool.ceiling() {
                    state.store(DecoderState::Running);
                    decode_one_packet(
                        &mut session, &mut looping, &state, &last_decoded_ms,
                        &skip_current_outputs, &video_pool, &video_queue, &audio_queue,
                        &mut skip_output_until,
                    );
                } else {
                    state.store(DecoderState::Ready);
                    thread::sleep(Duration::from_millis(BACKPRESSURE_SLEEP_MS));
                }
            }
            DecoderState::EndOfStream => {
                thread::sleep(Duration::from_millis(EOF_SLEEP_MS));
            }
            DecoderState::Faulted | DecoderState::Stopped => {
                thread::sleep(Duration::from_millis(EOF_SLEEP_MS));
            }
        }

        for entry in commands.drain() {
            match entry.cmd {
                WorkerCommand::Seek { target_ms } => {
                    skip_current_outputs.store(true, Ordering::Release);
                    video_queue.lock().unwrap().clear();
                    audio_queue.lock().unwrap().clear();
                    session.seek_ms(target_ms);
                    skip_output_until = target_ms;
                    state.store(DecoderState::Ready);
                    skip_current_outputs.store(false, Ordering::Release);
                }
                WorkerCommand::Reconfigure => {
                    skip_current_outputs.store(true, Ordering::Release);
                    if let Err(e) = session.reconfigure_software() {
                        eprintln!("[decoder] reconfigure failed: {e}");
                        state.store(DecoderState::Faulted);
                    } else {
                        state.store(DecoderState::Ready);
                    }
                    skip_current_outputs.store(false, Ordering::Release);
                }
            }
            entry.complete();
        }

        if abort.load(Ordering::Acquire) {
            break;
        }
    }

    if state.load() != DecoderState::Faulted {
        state.store(DecoderState::Stopped);
    }
}

#[allow(clippy::too_many_arguments)]
fn decode_one_packet(
    session: &mut DecodeSession,
    looping: &mut bool,
    state: &Arc<AtomicDecoderState>,
    last_decoded_ms: &Arc<AtomicMs>,
    skip_current_outputs: &Arc<AtomicBool>,
    video_pool: &FramePool<VideoFrame>,
    video_queue: &Arc<Mutex<VecDeque<PooledHandle<VideoFrame>>>>,
    audio_queue: &Arc<Mutex<VecDeque<AudioFrame>>>,
    skip_output_until: &mut f64,
) {
    match session.decode_one() {
        Ok(DecodedOutput::Video(frame)) => {
            if frame.time_ms < *skip_output_until {
                return;
            }
            last_decoded_ms.store(frame.time_ms);
            if let Some(mut handle) = video_pool.take() {
                *handle = frame;
                let mut q = video_queue.lock().unwrap();
                if !skip_current_outputs.load(Ordering::Acquire) {
                    q.push_back(handle);
                }
            }
        }
        Ok(DecodedOutput::Audio(frame)) => {
            if frame.time_ms < *skip_output_until {
                return;
            }
            let mut q = audio_queue.lock().unwrap();
            if !skip_current_outputs.load(Ordering::Acquire) {
                q.push_back(frame);
            }
        }
        Ok(DecodedOutput::Pending) => {}
        Ok(DecodedOutput::Eof) => {
            session.flush();
            if *looping {
                session.seek_ms(0.0);
                *skip_output_until = 0.0;
                state.store(DecoderState::Ready);
            } else {
                state.store(DecoderState::EndOfStream);
            }
        }
        Err(e) => {
            eprintln!("[decoder] decode_one failed: {e}");
            if let Err(e2) = session.reconfigure_software() {
                eprintln!("[decoder] hw-demote reconfigure failed: {e2}");
                state.store(DecoderState::Faulted);
            }
        }
    }
}
