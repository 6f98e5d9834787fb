// crates/playback-core/src/helpers/mod.rs
//
// Internal helper modules. Not re-exported from lib.rs — these are
// decoder/converter implementation details, not part of the public API.

pub mod yuv;
pub mod seek;
