// crates/playback-core/src/helpers/yuv.rs
//
// YUV420P frame utilities shared between the decode worker (splitting a
// decoded picture into packed planes for YUVConverter) and its tests.
//
// Layout convention for packed YUV420P byte vecs:
//   [0 .. w*h]              — Y plane, packed (no stride)
//   [w*h .. w*h + uv_w*uv_h]        — U plane, packed
//   [w*h + uv_w*uv_h .. end]         — V plane, packed
//
// "Packed" means strides are removed — each row is exactly w (or uv_w) bytes.
// ffmpeg VideoFrame rows may have padding; extract_yuv strips it.

use ffmpeg_the_third::util::frame::video::Video as VideoFrame;

/// Extract packed (stride-free) YUV420P bytes from a scaled VideoFrame.
///
/// The frame must already be in `Pixel::YUV420P` format — call swscale first.
/// Returns a single Vec laid out as Y ++ U ++ V (see module doc for offsets).
pub fn extract_yuv(yuv: &VideoFrame, w: usize, h: usize, uv_w: usize, uv_h: usize) -> Vec<u8> {
    let mut raw = vec![0u8; w * h + uv_w * uv_h * 2];

    // Y plane
    let y_stride = yuv.stride(0);
    let y_src    = yuv.data(0);
    for row in 0..h {
        raw[row * w .. row * w + w]
            .copy_from_slice(&y_src[row * y_stride .. row * y_stride + w]);
    }

    // U plane
    let u_offset = w * h;
    let u_stride = yuv.stride(1);
    let u_src    = yuv.data(1);
    for row in 0..uv_h {
        let dst = u_offset + row * uv_w;
        raw[dst .. dst + uv_w]
            .copy_from_slice(&u_src[row * u_stride .. row * u_stride + uv_w]);
    }

    // V plane
    let v_offset = u_offset + uv_w * uv_h;
    let v_stride = yuv.stride(2);
    let v_src    = yuv.data(2);
    for row in 0..uv_h {
        let dst = v_offset + row * uv_w;
        raw[dst .. dst + uv_w]
            .copy_from_slice(&v_src[row * v_stride .. row * v_stride + uv_w]);
    }

    raw
}

/// Split packed YUV420P bytes (Y++U++V, see module doc) into three independent
/// `PlaneImage`s, plus an alpha plane if the source format carried one.
///
/// This is the boundary between the decode worker's ffmpeg-shaped buffers and
/// `playback_types::FrameBody::Yuv`, which YUVConverter consumes.
pub fn split_planes(
    packed: &[u8],
    w: usize, h: usize, uv_w: usize, uv_h: usize,
    alpha: Option<&[u8]>,
) -> (playback_types::PlaneImage, playback_types::PlaneImage, playback_types::PlaneImage, Option<playback_types::PlaneImage>) {
    use playback_types::PlaneImage;

    let y_end = w * h;
    let u_end = y_end + uv_w * uv_h;
    let v_end = u_end + uv_w * uv_h;

    let y = PlaneImage::new(w as u32, h as u32, packed[..y_end].to_vec());
    let u = PlaneImage::new(uv_w as u32, uv_h as u32, packed[y_end..u_end].to_vec());
    let v = PlaneImage::new(uv_w as u32, uv_h as u32, packed[u_end..v_end].to_vec());
    let a = alpha.map(|bytes| PlaneImage::new(w as u32, h as u32, bytes.to_vec()));

    (y, u, v, a)
}

#[cfg(test)]
mod tests {
    use super::*;
    use ffmpeg_the_third::util::frame::video::Video as FfFrame;
    use ffmpeg_the_third::format::Pixel;

    #[test]
    fn extract_yuv_strips_stride_padding() {
        let mut frame = FfFrame::new(Pixel::YUV420P, 4, 2);
        for row in 0..2 {
            let stride = frame.stride(0);
            frame.data_mut(0)[row * stride..row * stride + 4].copy_from_slice(&[10, 20, 30, 40]);
        }
        for plane in [1usize, 2] {
            let stride = frame.stride(plane);
            frame.data_mut(plane)[0..2].copy_from_slice(&[99, 100]);
            let _ = stride;
        }
        let raw = extract_yuv(&frame, 4, 2, 2, 1);
        assert_eq!(&raw[0..8], &[10, 20, 30, 40, 10, 20, 30, 40]);
        assert_eq!(&raw[8..10], &[99, 100]);
    }

    #[test]
    fn split_planes_round_trips_lengths() {
        let w = 4usize;
        let h = 2usize;
        let uv_w = 2usize;
        let uv_h = 1usize;
        let mut packed = vec![0u8; w * h + 2 * uv_w * uv_h];
        packed.iter_mut().enumerate().for_each(|(i, b)| *b = i as u8);
        let (y, u, v, a) = split_planes(&packed, w, h, uv_w, uv_h, None);
        assert_eq!(y.data.len(), w * h);
        assert_eq!(u.data.len(), uv_w * uv_h);
        assert_eq!(v.data.len(), uv_w * uv_h);
        assert!(a.is_none());
    }
}