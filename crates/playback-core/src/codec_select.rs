// crates/playback-core/src/codec_select.rs
//
// CodecSelector: turns (codec id, allowed hardware backends) into an ordered
// list of candidates and opens the first one that succeeds.

use std::ptr;

use ffmpeg_the_third as ffmpeg;
use ffmpeg::codec::Id as CodecId;
use ffmpeg::ffi;

use playback_types::HardwareBackend;

/// One attempt: a codec id paired with an optional hardware device type.
/// `hw` is `None` for the final software fallback.
#[derive(Clone, Copy)]
pub struct Candidate {
    pub backend: HardwareBackend,
    pub hw_device_type: Option<ffi::AVHWDeviceType>,
}

fn hw_device_type_for(backend: HardwareBackend) -> Option<ffi::AVHWDeviceType> {
    match backend {
        HardwareBackend::NVDEC => Some(ffi::AVHWDeviceType::AV_HWDEVICE_TYPE_CUDA),
        HardwareBackend::QSV => Some(ffi::AVHWDeviceType::AV_HWDEVICE_TYPE_QSV),
        HardwareBackend::DXVA2 => Some(ffi::AVHWDeviceType::AV_HWDEVICE_TYPE_DXVA2),
        HardwareBackend::VDPAU => Some(ffi::AVHWDeviceType::AV_HWDEVICE_TYPE_VDPAU),
        HardwareBackend::VAAPI => Some(ffi::AVHWDeviceType::AV_HWDEVICE_TYPE_VAAPI),
        HardwareBackend::MEDIACODEC => Some(ffi::AVHWDeviceType::AV_HWDEVICE_TYPE_MEDIACODEC),
        HardwareBackend::VIDEOTOOLBOX => Some(ffi::AVHWDeviceType::AV_HWDEVICE_TYPE_VIDEOTOOLBOX),
        _ => None,
    }
}

/// Build the ordered candidate list for `allowed`: every set hardware bit,
/// highest score first, followed by a software fallback.
pub fn build_candidates(allowed: HardwareBackend) -> Vec<Candidate> {
    let mut hw: Vec<HardwareBackend> = allowed.iter_backends().collect();
    hw.sort_by_key(|b| -b.score());

    let mut candidates: Vec<Candidate> = hw
        .into_iter()
        .map(|backend| Candidate { backend, hw_device_type: hw_device_type_for(backend) })
        .collect();

    candidates.push(Candidate { backend: HardwareBackend::NONE, hw_device_type: None });
    candidates
}

/// Create a hardware device context for `hw_type`. Returns `None` (logged) if
/// the platform/driver doesn't support it — the caller moves to the next
/// candidate, exactly like a codec-open failure.
///
/// # Safety note
/// `av_hwdevice_ctx_create` is FFI; the returned `AVBufferRef` is owned by the
/// caller and must be attached to a decoder's `hw_device_ctx` (which takes its
/// own reference via `av_buffer_ref`) or freed with `av_buffer_unref`.
pub fn create_hw_device_ctx(hw_type: ffi::AVHWDeviceType) -> Option<*mut ffi::AVBufferRef> {
    unsafe {
        let mut hw_device_ctx: *mut ffi::AVBufferRef = ptr::null_mut();
        let ret = ffi::av_hwdevice_ctx_create(
            &mut hw_device_ctx,
            hw_type,
            ptr::null(),
            ptr::null_mut(),
            0,
        );
        if ret < 0 {
            eprintln!("[hw] av_hwdevice_ctx_create({hw_type:?}) failed: {ret}");
            return None;
        }
        Some(hw_device_ctx)
    }
}

/// Open a video decoder for `params`, trying each candidate in order.
/// Returns the opened decoder, the backend that succeeded, and the owned
/// hardware device context buffer (if any — caller must keep it alive as
/// long as the decoder uses it).
pub fn open_video_decoder(
    params: ffmpeg::codec::Parameters,
    allowed: HardwareBackend,
) -> Result<(ffmpeg::decoder::video::Video, HardwareBackend, Option<*mut ffi::AVBufferRef>), String> {
    let mut last_err = String::new();
    let codec_name = codec_label(params.id());

    for candidate in build_candidates(allowed) {
        let ctx = match ffmpeg::codec::context::Context::from_parameters(params.clone()) {
            Ok(ctx) => ctx,
            Err(e) => { last_err = e.to_string(); continue; }
        };

        let hw_ctx = candidate.hw_device_type.and_then(create_hw_device_ctx);
        if candidate.hw_device_type.is_some() && hw_ctx.is_none() {
            // Device context creation failed — this candidate can't work, move on.
            continue;
        }

        match ctx.decoder().video() {
            Ok(mut decoder) => {
                if let Some(raw) = hw_ctx {
                    unsafe {
                        (*decoder.as_mut_ptr()).hw_device_ctx = ffi::av_buffer_ref(raw);
                    }
                }
                eprintln!("[codec] opened {codec_name} decoder via {:?}", candidate.backend);
                return Ok((decoder, candidate.backend, hw_ctx));
            }
            Err(e) => {
                eprintln!("[codec] {codec_name} candidate {:?} failed to open: {e}", candidate.backend);
                last_err = e.to_string();
                if let Some(raw) = hw_ctx {
                    unsafe { ffi::av_buffer_unref(&mut { raw }) };
                }
            }
        }
    }

    Err(last_err)
}

/// True if `fmt` is a hardware-surface pixel format requiring a transfer to
/// host memory before the frame's planes can be read.
pub fn is_hw_pixel_format(fmt: ffmpeg::format::Pixel) -> bool {
    use ffmpeg::format::Pixel;
    matches!(
        fmt,
        Pixel::CUDA
            | Pixel::VAAPI
            | Pixel::DXVA2_VLD
            | Pixel::D3D11
            | Pixel::VDPAU
            | Pixel::VIDEOTOOLBOX
            | Pixel::MEDIACODEC
            | Pixel::QSV
    )
}

/// Map a `CodecId` to the `HardwareBackend` bit most commonly paired with it
/// for scoring purposes. CodecSelector itself is backend-first (it tries
/// every allowed backend for whatever codec the stream carries) — this is
/// only used for log messages.
pub fn codec_label(id: CodecId) -> String {
    format!("{id:?}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn candidates_end_with_software_fallback() {
        let candidates = build_candidates(HardwareBackend::NVDEC | HardwareBackend::VAAPI);
        assert_eq!(candidates.last().unwrap().backend, HardwareBackend::NONE);
        assert!(candidates.last().unwrap().hw_device_type.is_none());
    }

    #[test]
    fn candidates_ordered_by_score_descending() {
        let candidates = build_candidates(HardwareBackend::QSV | HardwareBackend::NVDEC);
        assert_eq!(candidates[0].backend, HardwareBackend::NVDEC);
        assert_eq!(candidates[1].backend, HardwareBackend::QSV);
        assert_eq!(candidates[2].backend, HardwareBackend::NONE);
    }

    #[test]
    fn none_allowed_yields_only_software_fallback() {
        let candidates = build_candidates(HardwareBackend::NONE);
        assert_eq!(candidates.len(), 1);
        assert_eq!(candidates[0].backend, HardwareBackend::NONE);
    }
}
