// crates/playback-core/src/stream_io.rs
//
// Seekable-byte-stream abstraction consumed by the demuxer. Every call
// originates from the decode worker thread — StreamSource implementations
// are not required to be Sync.

use std::ffi::c_void;
use std::fs::File;
use std::io::{self, Read, Seek, SeekFrom};
use std::path::Path;
use std::ptr;

use ffmpeg_the_third as ffmpeg;
use ffmpeg::ffi;

use playback_types::PlaybackError;

/// Origin for a `StreamSource::seek` call, mirroring `fseek`'s whence values.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SeekWhence {
    Set,
    Cur,
    End,
}

/// A host-provided (or file-backed) seekable byte stream.
///
/// `read` returns `Ok(0)` at end-of-stream — distinct from an I/O error, which
/// is `Err`. A stream-open failure surfaces as `PlaybackError::StreamOpen` and
/// pushes the worker to FAULTED; a read/seek error encountered mid-session is
/// logged and treated as a transient decode failure.
pub trait StreamSource: Send {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize>;
    fn seek(&mut self, offset: i64, whence: SeekWhence) -> io::Result<u64>;
    fn size(&self) -> io::Result<u64>;
}

/// `StreamSource` over a plain `std::fs::File` — used standalone and by tests.
/// A host embedding this crate against its own asset/VFS layer provides its
/// own `StreamSource` impl instead.
pub struct FileStreamSource {
    file: File,
}

impl FileStreamSource {
    pub fn open(path: impl AsRef<Path>) -> io::Result<Self> {
        Ok(Self { file: File::open(path)? })
    }
}

impl StreamSource for FileStreamSource {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.file.read(buf)
    }

    fn seek(&mut self, offset: i64, whence: SeekWhence) -> io::Result<u64> {
        let from = match whence {
            SeekWhence::Set => SeekFrom::Start(offset.max(0) as u64),
            SeekWhence::Cur => SeekFrom::Current(offset),
            SeekWhence::End => SeekFrom::End(offset),
        };
        self.file.seek(from)
    }

    fn size(&self) -> io::Result<u64> {
        Ok(self.file.metadata()?.len())
    }
}

/// ffmpeg's `AVSEEK_SIZE` whence bit: the caller wants the stream's total
/// size back, not an actual seek. Not exposed as a named constant by the
/// `ffi` bindings, so it's kept here next to its one use.
const AVSEEK_SIZE: i32 = 0x1_0000;

const AVIO_BUFFER_SIZE: usize = 32 * 1024;

/// `avio_alloc_context`'s read callback. `opaque` is the `Box<Box<dyn
/// StreamSource>>` raw pointer stashed by `open_custom_io`.
unsafe extern "C" fn read_packet(opaque: *mut c_void, buf: *mut u8, buf_size: i32) -> i32 {
    let source = &mut *(opaque as *mut Box<dyn StreamSource>);
    let len = buf_size.max(0) as usize;
    let slice = std::slice::from_raw_parts_mut(buf, len);
    match source.read(slice) {
        Ok(0) => ffi::AVERROR_EOF,
        Ok(n) => n as i32,
        Err(e) => {
            eprintln!("[stream_io] read failed: {e}");
            ffi::AVERROR(ffi::EIO)
        }
    }
}

/// `avio_alloc_context`'s seek callback, also serving `AVSEEK_SIZE` queries.
unsafe extern "C" fn seek_packet(opaque: *mut c_void, offset: i64, whence: i32) -> i64 {
    let source = &mut *(opaque as *mut Box<dyn StreamSource>);

    if whence & AVSEEK_SIZE != 0 {
        return source.size().map(|n| n as i64).unwrap_or(-1);
    }

    let whence = match whence & !AVSEEK_SIZE {
        0 => SeekWhence::Set, // SEEK_SET
        1 => SeekWhence::Cur, // SEEK_CUR
        2 => SeekWhence::End, // SEEK_END
        _ => return -1,
    };
    match source.seek(offset, whence) {
        Ok(pos) => pos as i64,
        Err(e) => {
            eprintln!("[stream_io] seek failed: {e}");
            -1
        }
    }
}

/// Owns the pieces a custom-IO demuxer session needs to free on close.
///
/// `AVFormatContext.pb` is documented as caller-owned whenever
/// `AVFMT_FLAG_CUSTOM_IO` is set — `avformat_close_input` only flushes it on
/// a write stream, it never frees the `AVIOContext` or its buffer. Both stay
/// this type's responsibility, along with the boxed trait object the
/// callbacks reach through `opaque`.
pub(crate) struct CustomIoHandles {
    avio_ctx: *mut ffi::AVIOContext,
    source: *mut Box<dyn StreamSource>,
}

// Safety: the callbacks only ever run on the decode worker thread, same as
// every other raw ffmpeg handle DecodeSession holds.
unsafe impl Send for CustomIoHandles {}

impl Drop for CustomIoHandles {
    fn drop(&mut self) {
        unsafe {
            free_avio_ctx(self.avio_ctx);
            if !self.source.is_null() {
                drop(Box::from_raw(self.source));
            }
        }
    }
}

/// Free an `AVIOContext` allocated by `avio_alloc_context`, including its
/// buffer — `avio_context_free` only frees the struct itself.
unsafe fn free_avio_ctx(mut ctx: *mut ffi::AVIOContext) {
    if !ctx.is_null() {
        ffi::av_free((*ctx).buffer as *mut c_void);
        ffi::avio_context_free(&mut ctx);
    }
}

/// Open `source` as a demuxer input via a custom `AVIOContext` bridge —
/// every `read`/`seek` the demuxer issues is routed through the trait object
/// instead of ffmpeg's own file I/O. This is what makes `StreamSource` a
/// live operation rather than scaffolding: `DecodeSession::open` (path) and
/// `DecodeSession::open_stream` (arbitrary host stream) both funnel through
/// here.
pub(crate) fn open_custom_io(
    source: Box<dyn StreamSource>,
) -> Result<(ffmpeg::format::context::Input, CustomIoHandles), PlaybackError> {
    unsafe {
        let source_ptr = Box::into_raw(Box::new(source));

        let avio_buffer = ffi::av_malloc(AVIO_BUFFER_SIZE) as *mut u8;
        if avio_buffer.is_null() {
            drop(Box::from_raw(source_ptr));
            return Err(PlaybackError::StreamOpen("av_malloc failed for AVIO buffer".into()));
        }

        let avio_ctx = ffi::avio_alloc_context(
            avio_buffer,
            AVIO_BUFFER_SIZE as i32,
            0, // read-only
            source_ptr as *mut c_void,
            Some(read_packet),
            None, // no write support
            Some(seek_packet),
        );
        if avio_ctx.is_null() {
            ffi::av_free(avio_buffer as *mut c_void);
            drop(Box::from_raw(source_ptr));
            return Err(PlaybackError::StreamOpen("avio_alloc_context failed".into()));
        }

        let mut fmt_ctx = ffi::avformat_alloc_context();
        if fmt_ctx.is_null() {
            free_avio_ctx(avio_ctx);
            drop(Box::from_raw(source_ptr));
            return Err(PlaybackError::StreamOpen("avformat_alloc_context failed".into()));
        }
        (*fmt_ctx).pb = avio_ctx;
        (*fmt_ctx).flags |= ffi::AVFMT_FLAG_CUSTOM_IO as i32;

        let ret = ffi::avformat_open_input(&mut fmt_ctx, ptr::null(), ptr::null_mut(), ptr::null_mut());
        if ret < 0 {
            ffi::avformat_close_input(&mut fmt_ctx);
            free_avio_ctx(avio_ctx);
            drop(Box::from_raw(source_ptr));
            return Err(PlaybackError::StreamOpen(format!("avformat_open_input failed: {ret}")));
        }

        let ret = ffi::avformat_find_stream_info(fmt_ctx, ptr::null_mut());
        if ret < 0 {
            ffi::avformat_close_input(&mut fmt_ctx);
            free_avio_ctx(avio_ctx);
            drop(Box::from_raw(source_ptr));
            return Err(PlaybackError::StreamOpen(format!(
                "avformat_find_stream_info failed: {ret}"
            )));
        }

        let input = ffmpeg::format::context::Input::wrap(fmt_ctx);
        Ok((input, CustomIoHandles { avio_ctx, source: source_ptr }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn file_stream_source_reads_and_seeks() {
        let mut tmp = tempfile::NamedTempFile::new().unwrap();
        tmp.write_all(b"hello playback").unwrap();
        tmp.flush().unwrap();

        let mut src = FileStreamSource::open(tmp.path()).unwrap();
        assert_eq!(src.size().unwrap(), 14);

        let mut buf = [0u8; 5];
        let n = src.read(&mut buf).unwrap();
        assert_eq!(n, 5);
        assert_eq!(&buf, b"hello");

        src.seek(6, SeekWhence::Set).unwrap();
        let n = src.read(&mut buf).unwrap();
        assert_eq!(&buf[..n], b"playb");
    }
}
