// crates/playback-types/src/error.rs
//
// Sticky/terminal error surface. These are the only kinds that can push a
// DecoderWorker into FAULTED (see §7 of the spec); every other error kind is
// logged and recovered internally, never surfaced here.

use std::fmt;

#[derive(Clone, Debug)]
pub enum PlaybackError {
    /// The backing stream could not be opened at all.
    StreamOpen(String),
    /// avformat_open_input / find_stream_info (or the ffmpeg-the-third equivalent) failed.
    DemuxOpen(String),
    /// The container has no video stream.
    NoVideoStream,
    /// Every CodecSelector candidate failed to open.
    CodecOpenAllFailed(String),
}

impl fmt::Display for PlaybackError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PlaybackError::StreamOpen(msg) => write!(f, "could not open stream: {msg}"),
            PlaybackError::DemuxOpen(msg) => write!(f, "could not open demuxer: {msg}"),
            PlaybackError::NoVideoStream => write!(f, "no video stream in container"),
            PlaybackError::CodecOpenAllFailed(msg) => {
                write!(f, "every codec candidate failed to open: {msg}")
            }
        }
    }
}

impl std::error::Error for PlaybackError {}
