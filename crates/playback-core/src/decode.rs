// crates/playback-core/src/decode.rs
//
// DecodeSession: holds the demuxer, codec contexts and lazily-constructed
// scaler/resampler, and pulls one decoded output at a time. DecoderWorker
// (worker.rs) drives the loop; this module is the ffmpeg-facing mechanics.

use std::path::Path;

use anyhow::{anyhow, Result};
use ffmpeg_the_third as ffmpeg;
use ffmpeg::ffi;
use ffmpeg::format::{Pixel, Sample};
use ffmpeg::media::Type;
use ffmpeg::software::resampling::context::Context as ResamplerContext;
use ffmpeg::software::scaling::{context::Context as SwsContext, flag::Flags};
use ffmpeg::util::channel_layout::ChannelLayout;
use ffmpeg::util::frame::audio::Audio as AudioFrameFf;
use ffmpeg::util::frame::video::Video as VideoFrameFf;

use playback_types::constants::{MAX_PENDING_HW_TRANSFERS, MAX_PENDING_SCALER_FRAMES};
use playback_types::{HardwareBackend, PlaybackError, TimeBase};

use crate::codec_select::{is_hw_pixel_format, open_video_decoder};
use crate::helpers::yuv::{extract_yuv, split_planes};

/// Bounded carrier reuse for `ffmpeg`-owned frame buffers that never leave
/// `DecodeSession` (hw-transfer targets, the scaler's output frame). This is
/// `FramePool`'s single-threaded sibling: `VideoFrameFf` wraps a raw `AVFrame`
/// and is never shared across threads, so there is no need for `FramePool`'s
/// `Arc<Mutex<..>>` — a plain free list owned by `DecodeSession` is enough to
/// stop reallocating one of these per decoded picture.
struct FrameRing {
    free: Vec<VideoFrameFf>,
    ceiling: usize,
}

impl FrameRing {
    fn new(ceiling: usize) -> Self {
        Self { free: Vec::with_capacity(ceiling), ceiling }
    }

    /// Take a reused carrier if one is free, else allocate a new empty one.
    /// `VideoFrameFf::empty()` frames are reset to the target format/size by
    /// the ffmpeg call that fills them (`av_hwframe_transfer_data`, `sws_scale`),
    /// so handing back an empty frame is always safe regardless of what it
    /// held last time.
    fn take(&mut self) -> VideoFrameFf {
        self.free.pop().unwrap_or_else(VideoFrameFf::empty)
    }

    /// Return a carrier for reuse, dropping it instead once at the ceiling.
    fn put(&mut self, frame: VideoFrameFf) {
        if self.free.len() < self.ceiling {
            self.free.push(frame);
        }
    }
}

/// Result of pulling one decoded output from the session.
pub enum DecodedOutput {
    /// A decoded video picture, already converted to RGBA8 or split into YUV planes.
    Video(playback_types::VideoFrame),
    /// A decoded, resampled PCM block.
    Audio(playback_types::AudioFrame),
    /// The demuxer has no more packets.
    Eof,
    /// Decoded nothing this call (EAGAIN, non-AV packet, etc) — caller should
    /// try again rather than treat this as EOF.
    Pending,
}

pub struct DecodeSession {
    ictx: ffmpeg::format::context::Input,

    video_idx: Option<usize>,
    audio_idx: Option<usize>,

    video_decoder: Option<ffmpeg::decoder::video::Video>,
    audio_decoder: Option<ffmpeg::decoder::audio::Audio>,

    video_tb: TimeBase,
    audio_tb: TimeBase,
    video_start_pts: i64,

    hw_backend: HardwareBackend,
    hw_device_ctx: Option<*mut ffi::AVBufferRef>,

    /// AVIOContext + boxed `StreamSource` backing `ictx`'s custom I/O (C1,
    /// spec §4.1). Held only for its `Drop` glue; `ictx` itself must not
    /// outlive it, which the declaration order above guarantees.
    custom_io: crate::stream_io::CustomIoHandles,

    scaler: Option<SwsContext>,
    resampler: Option<ResamplerContext>,
    hw_transfer_pool: FrameRing,
    scaler_frame_pool: FrameRing,

    width: u32,
    height: u32,
    duration_ms: f64,

    /// Set once the first packet is read. `seek_ms(0.0)` uses this to tell a
    /// freshly-opened context (still sitting at the start — skip the seek,
    /// see `helpers::seek::seek_to_secs`) from a context that has already
    /// advanced and genuinely needs rewinding (loop restart, replay).
    has_decoded_any: bool,
}

// Safety: the raw AVBufferRef is only ever touched from the worker thread
// that owns this DecodeSession; it is never shared.
unsafe impl Send for DecodeSession {}

impl DecodeSession {
    /// Open a file by path. Thin wrapper over `open_stream` — the container
    /// is still read through a `FileStreamSource` behind a custom
    /// `AVIOContext`, same as any other host-supplied stream (C1, spec §4.1).
    pub fn open(path: &Path, allowed_hw: HardwareBackend) -> std::result::Result<Self, PlaybackError> {
        let source = crate::stream_io::FileStreamSource::open(path)
            .map_err(|e| PlaybackError::StreamOpen(e.to_string()))?;
        Self::open_stream(Box::new(source), allowed_hw)
    }

    /// Open an arbitrary host-provided `StreamSource` — the demuxer reads
    /// and seeks through it via a custom `AVIOContext`, never touching a
    /// file path directly.
    pub fn open_stream(
        source: Box<dyn crate::stream_io::StreamSource>,
        allowed_hw: HardwareBackend,
    ) -> std::result::Result<Self, PlaybackError> {
        let (mut ictx, custom_io) = crate::stream_io::open_custom_io(source)?;

        let video_idx = ictx.streams().best(Type::Video).map(|s| s.index());
        let audio_idx = ictx.streams().best(Type::Audio).map(|s| s.index());

        let Some(video_idx) = video_idx else {
            return Err(PlaybackError::NoVideoStream);
        };

        let (video_tb, video_params, video_start_pts, width, height) = {
            let stream = ictx.stream(video_idx).unwrap();
            let tb = stream.time_base();
            let start = stream.start_time();
            let params = stream.parameters();
            let (w, h) = unsafe {
                let p = params.as_ptr();
                ((*p).width as u32, (*p).height as u32)
            };
            (TimeBase::new(tb.numerator(), tb.denominator()), params, start.max(0), w, h)
        };

        let (video_decoder, hw_backend, hw_device_ctx) =
            open_video_decoder(video_params, allowed_hw)
                .map_err(PlaybackError::CodecOpenAllFailed)?;

        let (audio_tb, audio_decoder) = if let Some(aidx) = audio_idx {
            let stream = ictx.stream(aidx).unwrap();
            let tb = stream.time_base();
            let params = stream.parameters();
            let dec_ctx = ffmpeg::codec::context::Context::from_parameters(params)
                .map_err(|e| PlaybackError::CodecOpenAllFailed(e.to_string()))?;
            let decoder = dec_ctx.decoder().audio().ok();
            (TimeBase::new(tb.numerator(), tb.denominator()), decoder)
        } else {
            (TimeBase::new(1, 1), None)
        };

        let duration_ms = {
            let stream = ictx.stream(video_idx).unwrap();
            let dur = stream.duration();
            if dur > 0 {
                video_tb.pts_to_ms(dur, 0)
            } else {
                ictx.duration() as f64 / ffi::AV_TIME_BASE as f64 * 1000.0
            }
        };

        Ok(Self {
            ictx,
            video_idx: Some(video_idx),
            audio_idx,
            video_decoder: Some(video_decoder),
            audio_decoder,
            video_tb,
            audio_tb,
            video_start_pts,
            hw_backend,
            hw_device_ctx,
            custom_io,
            scaler: None,
            resampler: None,
            hw_transfer_pool: FrameRing::new(MAX_PENDING_HW_TRANSFERS),
            scaler_frame_pool: FrameRing::new(MAX_PENDING_SCALER_FRAMES),
            width,
            height,
            duration_ms,
            has_decoded_any: false,
        })
    }

    pub fn video_size(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    pub fn duration_ms(&self) -> f64 {
        self.duration_ms
    }

    pub fn hw_backend(&self) -> HardwareBackend {
        self.hw_backend
    }

    /// Native sample rate of the opened audio codec context, or 0 if the
    /// container has no audio stream. The resampler (lazily built on first
    /// decoded audio packet) targets this same rate, so it agrees with
    /// `mix_rate` for the lifetime of the session.
    pub fn audio_mix_rate(&self) -> u32 {
        self.audio_decoder.as_ref().map_or(0, |d| d.rate())
    }

    /// Output channel count PresentationController's audio path hands to the
    /// sink. The resampler always targets `ChannelLayout::STEREO` (see
    /// `decode_audio_packet`), so this is a fixed 2 whenever audio is present.
    pub fn audio_channel_count(&self) -> u16 {
        if self.audio_decoder.is_some() { 2 } else { 0 }
    }

    /// Seek the demuxer backward to the nearest keyframe at-or-before `target_ms`.
    ///
    /// `target_ms <= 0.0` on a context that has already read packets (loop
    /// wrap-around, replay after stop) performs a real rewind to the start —
    /// `helpers::seek::seek_to_secs`'s skip-at-0.0 guard only holds for a
    /// context that has never read a packet. Any seek that actually moves the
    /// read position flushes both codec contexts: they may otherwise still
    /// hold pre-seek reference frames, or — after `flush()`'s EOF signal at
    /// loop wrap-around — sit in a drained state that rejects further packets.
    pub fn seek_ms(&mut self, target_ms: f64) -> bool {
        let target_secs = target_ms / 1000.0;
        let ok = if target_secs <= 0.0 {
            if !self.has_decoded_any {
                true
            } else {
                crate::helpers::seek::rewind_to_start(&mut self.ictx, "decoder-worker")
            }
        } else {
            crate::helpers::seek::seek_to_secs(&mut self.ictx, target_secs, "decoder-worker")
        };

        if ok {
            if let Some(dec) = &mut self.video_decoder {
                dec.flush();
            }
            if let Some(dec) = &mut self.audio_decoder {
                dec.flush();
            }
            self.has_decoded_any = false;
        }
        ok
    }

    /// Flush both codec contexts by sending a null/EOF packet (drains any
    /// frames buffered inside the decoder for B-frame reordering).
    pub fn flush(&mut self) {
        if let Some(dec) = &mut self.video_decoder {
            let _ = dec.send_eof();
        }
        if let Some(dec) = &mut self.audio_decoder {
            let _ = dec.send_eof();
        }
    }

    /// Demote to software decode after a hardware runtime failure, rebuilding
    /// the video decoder with `HardwareBackend::NONE` allowed.
    pub fn reconfigure_software(&mut self) -> std::result::Result<(), PlaybackError> {
        let Some(video_idx) = self.video_idx else { return Ok(()) };
        let params = self.ictx.stream(video_idx).unwrap().parameters();
        let (decoder, backend, hw_ctx) =
            open_video_decoder(params, HardwareBackend::NONE).map_err(PlaybackError::CodecOpenAllFailed)?;
        if let Some(old) = self.hw_device_ctx.take() {
            unsafe { ffi::av_buffer_unref(&mut { old }) };
        }
        self.video_decoder = Some(decoder);
        self.hw_backend = backend;
        self.hw_device_ctx = hw_ctx;
        self.scaler = None;
        eprintln!("[codec] reconfigured to software decode after hardware failure");
        Ok(())
    }

    /// Read and decode one packet's worth of output. May produce zero, one,
    /// or (rarely) more frames internally; returns the first ready frame and
    /// leaves the rest for the next call via ffmpeg's own internal buffering
    /// — receive_frame is re-entered from the top on the next invocation.
    pub fn decode_one(&mut self) -> Result<DecodedOutput> {
        let (stream_idx, packet) = match self.ictx.packets().next() {
            Some((stream, packet)) => (stream.index(), packet),
            None => return Ok(DecodedOutput::Eof),
        };
        self.has_decoded_any = true;

        if Some(stream_idx) == self.video_idx {
            return self.decode_video_packet(&packet);
        }
        if Some(stream_idx) == self.audio_idx {
            return self.decode_audio_packet(&packet);
        }
        Ok(DecodedOutput::Pending)
    }

    fn decode_video_packet(&mut self, packet: &ffmpeg::Packet) -> Result<DecodedOutput> {
        let decoder = self.video_decoder.as_mut().ok_or_else(|| anyhow!("no video decoder"))?;
        if let Err(e) = decoder.send_packet(packet) {
            // EAGAIN means the decoder's internal buffer is full; the caller
            // drains receive_frame below regardless, which is what makes room.
            // Any other send error is logged and this packet is dropped.
            if !matches!(e, ffmpeg::Error::Other { errno } if errno == ffi::EAGAIN) {
                eprintln!("[decoder] send_packet (video): {e}");
            }
        }

        let mut decoded = VideoFrameFf::empty();
        if decoder.receive_frame(&mut decoded).is_err() {
            return Ok(DecodedOutput::Pending);
        }

        let pts = decoded.pts().unwrap_or(0);
        let time_ms = self.video_tb.pts_to_ms(pts, self.video_start_pts);

        // Hw-transfer carrier comes from the bounded `hw_transfer_pool`
        // instead of a fresh `VideoFrameFf::empty()` per frame (C3, §4.3).
        let mut hw_sw_frame = is_hw_pixel_format(decoded.format()).then(|| self.hw_transfer_pool.take());

        let body = if let Some(sw) = &mut hw_sw_frame {
            unsafe {
                let ret = ffi::av_hwframe_transfer_data(sw.as_mut_ptr(), decoded.as_ptr(), 0);
                if ret < 0 {
                    return Err(anyhow!("av_hwframe_transfer_data failed: {ret}"));
                }
                (*sw.as_mut_ptr()).pts = (*decoded.as_ptr()).pts;
            }
            self.convert_video_frame(sw)
        } else {
            self.convert_video_frame(&decoded)
        };

        if let Some(sw) = hw_sw_frame {
            self.hw_transfer_pool.put(sw);
        }

        Ok(DecodedOutput::Video(playback_types::VideoFrame { time_ms, body: body? }))
    }

    fn convert_video_frame(&mut self, frame: &VideoFrameFf) -> Result<playback_types::FrameBody> {
        let fmt = frame.format();
        let w = frame.width();
        let h = frame.height();
        let uv_w = (w as usize + 1) / 2;
        let uv_h = (h as usize + 1) / 2;

        if matches!(fmt, Pixel::YUV420P | Pixel::YUVA420P) {
            let has_alpha = fmt == Pixel::YUVA420P;
            let raw = extract_yuv(frame, w as usize, h as usize, uv_w, uv_h);
            let alpha_bytes = has_alpha.then(|| {
                let stride = frame.stride(3);
                let src = frame.data(3);
                let mut out = vec![0u8; w as usize * h as usize];
                for row in 0..h as usize {
                    out[row * w as usize..row * w as usize + w as usize]
                        .copy_from_slice(&src[row * stride..row * stride + w as usize]);
                }
                out
            });
            let (y, u, v, a) = split_planes(&raw, w as usize, h as usize, uv_w, uv_h, alpha_bytes.as_deref());
            return Ok(playback_types::FrameBody::Yuv { y, u, v, a });
        }

        // Scaler-intermediate carrier comes from the bounded `scaler_frame_pool`
        // (ceiling 1, C3 §4.3) instead of a fresh `VideoFrameFf::empty()` per
        // frame; `sws_scale` overwrites every plane it touches, so handing it
        // back a previously-used frame is safe.
        let mut out = self.scaler_frame_pool.take();
        if self.scaler.is_none() {
            self.scaler = Some(SwsContext::get(fmt, w, h, Pixel::RGBA, w, h, Flags::BILINEAR)?);
        }
        let scaler = self.scaler.as_mut().unwrap();
        scaler.run(frame, &mut out)?;

        let stride = out.stride(0);
        let raw = out.data(0);
        let data: Vec<u8> = (0..h as usize)
            .flat_map(|row| {
                let s = row * stride;
                &raw[s..s + w as usize * 4]
            })
            .copied()
            .collect();

        self.scaler_frame_pool.put(out);

        Ok(playback_types::FrameBody::Rgba8 { width: w, height: h, data })
    }

    fn decode_audio_packet(&mut self, packet: &ffmpeg::Packet) -> Result<DecodedOutput> {
        let decoder = self.audio_decoder.as_mut().ok_or_else(|| anyhow!("no audio decoder"))?;
        if decoder.send_packet(packet).is_err() {
            return Ok(DecodedOutput::Pending);
        }

        let mut decoded = AudioFrameFf::empty();
        if decoder.receive_frame(&mut decoded).is_err() {
            return Ok(DecodedOutput::Pending);
        }

        let pts = decoded.pts().unwrap_or(0);
        let time_ms = self.audio_tb.pts_to_ms(pts, 0);

        if self.resampler.is_none() {
            let resampler = ResamplerContext::get(
                decoded.format(),
                decoded.channel_layout(),
                decoded.rate(),
                Sample::F32(ffmpeg::format::sample::Type::Packed),
                ChannelLayout::STEREO,
                decoded.rate(),
            )?;
            self.resampler = Some(resampler);
        }
        let resampler = self.resampler.as_mut().unwrap();
        let mut resampled = AudioFrameFf::empty();
        resampler.run(&decoded, &mut resampled)?;

        let channels = 2u16;
        let samples = resampled.samples();
        let plane = resampled.data(0);
        let float_samples: Vec<f32> = plane
            .chunks_exact(4)
            .take(samples * channels as usize)
            .map(|c| f32::from_ne_bytes([c[0], c[1], c[2], c[3]]))
            .collect();

        Ok(DecodedOutput::Audio(playback_types::AudioFrame { time_ms, channels, samples: float_samples }))
    }
}

impl Drop for DecodeSession {
    fn drop(&mut self) {
        if let Some(raw) = self.hw_device_ctx.take() {
            unsafe { ffi::av_buffer_unref(&mut { raw }) };
        }
    }
}
