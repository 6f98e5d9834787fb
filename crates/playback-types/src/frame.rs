// crates/playback-types/src/frame.rs
//
// Plain data types that flow across the channel between playback-core's
// DecoderWorker and its PresentationController / façade. No ffmpeg, no GPU
// handles — just the shapes the rest of the crate agrees on.

/// Pixel-format tag carried alongside a decoded picture.
///
/// Bit-exact plane layout for the YUV variants: Y (and A) at full W×H, U/V at
/// ⌈W/2⌉×⌈H/2⌉; all planes are single-channel R8.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PixelFormatTag {
    Rgba8,
    Yuv420p,
    Yuva420p,
}

impl PixelFormatTag {
    pub fn is_yuv_family(self) -> bool {
        matches!(self, PixelFormatTag::Yuv420p | PixelFormatTag::Yuva420p)
    }

    pub fn has_alpha(self) -> bool {
        matches!(self, PixelFormatTag::Yuva420p)
    }
}

/// A single-channel R8 plane image: width/height plus tightly packed (stride-free) bytes.
#[derive(Clone, Debug)]
pub struct PlaneImage {
    pub width:  u32,
    pub height: u32,
    pub data:   Vec<u8>,
}

impl PlaneImage {
    pub fn new(width: u32, height: u32, data: Vec<u8>) -> Self {
        debug_assert_eq!(data.len(), width as usize * height as usize,
            "PlaneImage: data length must equal width*height for a packed R8 plane");
        Self { width, height, data }
    }
}

/// Body of a decoded video frame — either a packed RGBA8 image or up to 4 YUV planes.
#[derive(Clone, Debug)]
pub enum FrameBody {
    Rgba8 {
        width:  u32,
        height: u32,
        data:   Vec<u8>, // width*height*4, tightly packed
    },
    Yuv {
        y: PlaneImage,
        u: PlaneImage,
        v: PlaneImage,
        a: Option<PlaneImage>,
    },
}

impl FrameBody {
    pub fn format_tag(&self) -> PixelFormatTag {
        match self {
            FrameBody::Rgba8 { .. } => PixelFormatTag::Rgba8,
            FrameBody::Yuv { a: None, .. } => PixelFormatTag::Yuv420p,
            FrameBody::Yuv { a: Some(_), .. } => PixelFormatTag::Yuva420p,
        }
    }

    pub fn width(&self) -> u32 {
        match self {
            FrameBody::Rgba8 { width, .. } => *width,
            FrameBody::Yuv { y, .. } => y.width,
        }
    }

    pub fn height(&self) -> u32 {
        match self {
            FrameBody::Rgba8 { height, .. } => *height,
            FrameBody::Yuv { y, .. } => y.height,
        }
    }
}

/// One decoded picture, monotonic within a decode session.
#[derive(Clone, Debug)]
pub struct VideoFrame {
    pub time_ms: f64,
    pub body:    FrameBody,
}

impl VideoFrame {
    pub fn format_tag(&self) -> PixelFormatTag {
        self.body.format_tag()
    }
}

/// One decoded PCM block. Channel count is implicit from the decoder that produced it.
#[derive(Clone, Debug)]
pub struct AudioFrame {
    pub time_ms:  f64,
    pub channels: u16,
    /// Interleaved float32 samples, `samples.len() == sample_count * channels`.
    pub samples:  Vec<f32>,
}

impl AudioFrame {
    pub fn sample_count(&self) -> usize {
        if self.channels == 0 { 0 } else { self.samples.len() / self.channels as usize }
    }
}
