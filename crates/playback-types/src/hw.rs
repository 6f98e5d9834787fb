// crates/playback-types/src/hw.rs
//
// Bitmask of hardware decode backends the CodecSelector is allowed to try.
// Scored in CodecSelector for candidate ordering (see codec_select.rs).

use bitflags::bitflags;

bitflags! {
    #[derive(Clone, Copy, Debug, PartialEq, Eq)]
    pub struct HardwareBackend: u32 {
        const NONE         = 0;
        const NVDEC         = 1 << 0;
        const QSV           = 1 << 1;
        const DXVA2         = 1 << 2;
        const VDPAU         = 1 << 3;
        const VAAPI         = 1 << 4;
        const MEDIACODEC    = 1 << 5;
        const VIDEOTOOLBOX  = 1 << 6;
        const ANY = Self::NVDEC.bits() | Self::QSV.bits() | Self::DXVA2.bits()
            | Self::VDPAU.bits() | Self::VAAPI.bits() | Self::MEDIACODEC.bits()
            | Self::VIDEOTOOLBOX.bits();
    }
}

impl HardwareBackend {
    /// Fixed tie-break score used when CodecSelector orders candidates, highest first.
    /// Backends not covered by the table score `i32::MIN` ("other=-inf" in the spec).
    pub fn score(self) -> i32 {
        match self {
            HardwareBackend::NVDEC | HardwareBackend::MEDIACODEC | HardwareBackend::VDPAU => 10,
            HardwareBackend::VAAPI | HardwareBackend::QSV => 9,
            HardwareBackend::DXVA2 => 8,
            _ => i32::MIN,
        }
    }

    /// Iterate the single-bit backends set in `self`, for candidate generation.
    pub fn iter_backends(self) -> impl Iterator<Item = HardwareBackend> {
        const ALL: [HardwareBackend; 7] = [
            HardwareBackend::NVDEC,
            HardwareBackend::MEDIACODEC,
            HardwareBackend::VDPAU,
            HardwareBackend::VAAPI,
            HardwareBackend::QSV,
            HardwareBackend::DXVA2,
            HardwareBackend::VIDEOTOOLBOX,
        ];
        ALL.into_iter().filter(move |b| self.contains(*b))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn any_contains_every_named_backend() {
        for b in HardwareBackend::ANY.iter_backends() {
            assert!(HardwareBackend::ANY.contains(b));
        }
    }

    #[test]
    fn score_table_matches_spec() {
        assert_eq!(HardwareBackend::NVDEC.score(), 10);
        assert_eq!(HardwareBackend::MEDIACODEC.score(), 10);
        assert_eq!(HardwareBackend::VDPAU.score(), 10);
        assert_eq!(HardwareBackend::VAAPI.score(), 9);
        assert_eq!(HardwareBackend::QSV.score(), 9);
        assert_eq!(HardwareBackend::DXVA2.score(), 8);
        assert_eq!(HardwareBackend::NONE.score(), i32::MIN);
    }
}
