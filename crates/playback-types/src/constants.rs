// crates/playback-types/src/constants.rs
//
// Numeric surface named directly in the spec. Kept as plain consts rather
// than a config layer — the teacher has no config file either, tunables are
// consts or constructor args throughout velocut-media.

/// Sync tolerance, in milliseconds, inside which a buffered frame is still "current".
pub const LENIENCE_MS: f64 = 2500.0;

/// Worker back-pressure ceiling: max decoded-video frames in flight.
pub const MAX_PENDING_FRAMES: usize = 3;

/// Hw-transfer carrier pool ceiling.
pub const MAX_PENDING_HW_TRANSFERS: usize = 2;

/// Scaler-intermediate carrier pool ceiling.
pub const MAX_PENDING_SCALER_FRAMES: usize = 1;

/// Reusable output-texture pool ceiling.
pub const MAX_PENDING_TEXTURES: usize = 2;

/// YUV→RGBA compute shader workgroup size (both dimensions).
pub const YUV_WORKGROUP_SIZE: u32 = 8;

/// Worker sleep when back-pressured (buffered video count at ceiling).
pub const BACKPRESSURE_SLEEP_MS: u64 = 1;

/// Worker sleep at end-of-stream, to avoid busy-spinning while waiting for a seek.
pub const EOF_SLEEP_MS: u64 = 50;
