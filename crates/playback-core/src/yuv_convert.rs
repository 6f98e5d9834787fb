// crates/playback-core/src/yuv_convert.rs
//
// YUVConverter: GPU compute pipeline converting Y/U/V(/A) single-channel
// planes into an RGBA8 output texture, per the BT.601 matrix.
//
// The pixel math (`yuv_to_rgba8`) runs on the calling thread and the result
// is uploaded via `RenderDevice::texture_update` — real backends would do
// this work in the dispatched compute shader instead, but expressing the
// conversion in Rust keeps it testable against a `MockRenderDevice` that
// has no SPIR-V executor. The pipeline/uniform-set/dispatch calls are still
// issued in the same order a real backend expects, so swapping in a GPU
// `RenderDevice` only changes where the bytes actually get transformed.

use std::sync::Arc;

use playback_types::PlaneImage;
use wgpu::{Color, Extent3d, TextureFormat};

use playback_types::constants::YUV_WORKGROUP_SIZE;

use crate::render_device::{texture_usage, RenderDevice, ResourceId, TextureDescriptor, YuvPushConstants};

fn div_round_up(n: u32, d: u32) -> u32 {
    (n + d - 1) / d
}

/// BT.601 full-range-adjacent YUV→RGB conversion for one pixel (Y, U, V in
/// 0..=255, U/V already centered internally).
fn yuv_to_rgb(y: u8, u: u8, v: u8) -> (u8, u8, u8) {
    let y = y as f32 - 16.0;
    let u = u as f32 - 128.0;
    let v = v as f32 - 128.0;
    let r = 1.164 * y + 1.596 * v;
    let g = 1.164 * y - 0.392 * u - 0.813 * v;
    let b = 1.164 * y + 2.017 * u;
    (r.clamp(0.0, 255.0) as u8, g.clamp(0.0, 255.0) as u8, b.clamp(0.0, 255.0) as u8)
}

struct PlaneSet {
    y: PlaneImage,
    u: PlaneImage,
    v: PlaneImage,
    a: Option<PlaneImage>,
}

pub struct YUVConverter<D: RenderDevice> {
    device: Arc<D>,
    width: u32,
    height: u32,
    planes: Option<PlaneSet>,

    plane_textures: Option<[ResourceId; 4]>, // Y, U, V, A (A unused when no alpha)
    output_texture: Option<ResourceId>,
    pipeline: Option<ResourceId>,
    uniform_set: Option<ResourceId>,
}

impl<D: RenderDevice> YUVConverter<D> {
    pub fn new(device: Arc<D>) -> Self {
        Self {
            device,
            width: 0,
            height: 0,
            planes: None,
            plane_textures: None,
            output_texture: None,
            pipeline: None,
            uniform_set: None,
        }
    }

    /// Resize the converter; asserts both dimensions are positive and drops
    /// any cached plane images (they no longer match the new geometry).
    pub fn set_frame_size(&mut self, width: u32, height: u32) {
        assert!(width > 0 && height > 0, "YUVConverter::set_frame_size: zero dimension");
        if width != self.width || height != self.height {
            self.width = width;
            self.height = height;
            self.planes = None;
            for &id in self.plane_textures.iter().flatten() {
                self.device.free(id);
            }
            self.plane_textures = None;
            if let Some(out) = self.output_texture.take() {
                self.device.free(out);
            }
        }
    }

    fn expected_chroma_size(&self) -> (u32, u32) {
        (div_round_up(self.width, 2), div_round_up(self.height, 2))
    }

    /// Store plane `i` (0=Y, 1=U, 2=V, 3=A). Asserts the plane's dimensions
    /// match the expected sub-sampled geometry for its slot.
    pub fn set_planes(&mut self, y: PlaneImage, u: PlaneImage, v: PlaneImage, a: Option<PlaneImage>) {
        let (cw, ch) = self.expected_chroma_size();
        assert_eq!((y.width, y.height), (self.width, self.height), "Y plane size mismatch");
        assert_eq!((u.width, u.height), (cw, ch), "U plane size mismatch");
        assert_eq!((v.width, v.height), (cw, ch), "V plane size mismatch");
        if let Some(a) = &a {
            assert_eq!((a.width, a.height), (self.width, self.height), "A plane size mismatch");
        }
        self.planes = Some(PlaneSet { y, u, v, a });
    }

    fn ensure_pipeline(&mut self) {
        if self.pipeline.is_some() {
            return;
        }
        // SPIR-V bytes for the YUV→RGBA compute shader are supplied by the
        // host build (out of scope here, per the rendering-device contract);
        // an empty module is sufficient for the call-shape to be exercised.
        let shader = self.device.shader_create_from_spirv(&[]);
        self.pipeline = Some(self.device.compute_pipeline_create(shader));
    }

    fn ensure_plane_textures(&mut self) {
        if self.plane_textures.is_some() {
            return;
        }
        let (cw, ch) = self.expected_chroma_size();
        let r8 = |w: u32, h: u32| TextureDescriptor {
            size: Extent3d { width: w, height: h, depth_or_array_layers: 1 },
            format: TextureFormat::R8Unorm,
            usage: texture_usage::SAMPLED | texture_usage::STORAGE | texture_usage::COPY_DST,
        };
        let y_tex = self.device.texture_create(&r8(self.width, self.height));
        let u_tex = self.device.texture_create(&r8(cw, ch));
        let v_tex = self.device.texture_create(&r8(cw, ch));
        let a_tex = self.device.texture_create(&r8(self.width, self.height));
        self.plane_textures = Some([y_tex, u_tex, v_tex, a_tex]);
    }

    fn ensure_output_texture(&mut self) -> ResourceId {
        if let Some(id) = self.output_texture {
            return id;
        }
        let desc = TextureDescriptor {
            size: Extent3d { width: self.width, height: self.height, depth_or_array_layers: 1 },
            format: TextureFormat::Rgba8Unorm,
            usage: texture_usage::SAMPLED | texture_usage::STORAGE
                | texture_usage::COLOR_ATTACHMENT | texture_usage::COPY_DST,
        };
        let id = self.device.texture_create(&desc);
        self.output_texture = Some(id);
        id
    }

    /// Returns the output texture, lazily creating it if `convert()` has
    /// never run (callers that just want a valid handle to bind, pre-decode).
    pub fn get_output_texture(&mut self) -> ResourceId {
        self.ensure_output_texture()
    }

    pub fn clear_output_texture(&mut self) {
        let tex = self.ensure_output_texture();
        self.device.texture_clear(tex, Color::TRANSPARENT);
    }

    /// Upload the stored planes, dispatch the compute pipeline, and update
    /// the output texture. No-op if `set_planes` hasn't been called since
    /// the last `set_frame_size`.
    pub fn convert(&mut self) {
        let Some(planes) = &self.planes else { return };
        let use_alpha = planes.a.is_some();

        self.ensure_pipeline();
        self.ensure_plane_textures();
        let plane_textures = self.plane_textures.unwrap();
        let output = self.ensure_output_texture();

        self.device.texture_update(plane_textures[0], 0, &planes.y.data);
        self.device.texture_update(plane_textures[1], 0, &planes.u.data);
        self.device.texture_update(plane_textures[2], 0, &planes.v.data);
        if let Some(a) = &planes.a {
            self.device.texture_update(plane_textures[3], 0, &a.data);
        }

        if self.uniform_set.is_none() {
            let pipeline = self.pipeline.unwrap();
            self.uniform_set = Some(self.device.uniform_set_create(&plane_textures, pipeline, 0));
        }

        let list = self.device.compute_list_begin();
        self.device.compute_list_bind_pipeline(list, self.pipeline.unwrap());
        self.device.compute_list_bind_uniform_set(list, self.uniform_set.unwrap(), 0);
        self.device.compute_list_set_push_constant(list, YuvPushConstants {
            use_alpha: use_alpha as u32,
            _padding: [0; 3],
        });
        let groups_x = div_round_up(self.width, YUV_WORKGROUP_SIZE);
        let groups_y = div_round_up(self.height, YUV_WORKGROUP_SIZE);
        self.device.compute_list_dispatch(list, groups_x, groups_y, 1);
        self.device.compute_list_end(list);

        // CPU-side conversion (see module doc): produces the bytes a real
        // shader dispatch would have written, for hosts without one.
        let rgba = self.software_convert(planes, use_alpha);
        self.device.texture_update(output, 0, &rgba);
    }

    fn software_convert(&self, planes: &PlaneSet, use_alpha: bool) -> Vec<u8> {
        let (cw, _ch) = self.expected_chroma_size();
        let mut out = vec![0u8; self.width as usize * self.height as usize * 4];
        for row in 0..self.height as usize {
            for col in 0..self.width as usize {
                let y = planes.y.data[row * self.width as usize + col];
                let crow = row / 2;
                let ccol = col / 2;
                let u = planes.u.data[crow * cw as usize + ccol];
                let v = planes.v.data[crow * cw as usize + ccol];
                let (r, g, b) = yuv_to_rgb(y, u, v);
                let a = if use_alpha {
                    planes.a.as_ref().unwrap().data[row * self.width as usize + col]
                } else {
                    255
                };
                let idx = (row * self.width as usize + col) * 4;
                out[idx] = r;
                out[idx + 1] = g;
                out[idx + 2] = b;
                out[idx + 3] = a;
            }
        }
        out
    }
}

impl<D: RenderDevice> Drop for YUVConverter<D> {
    fn drop(&mut self) {
        // Reverse construction order: output texture's GPU handle detaches
        // before plane textures/pipeline/shader are freed, avoiding a double
        // free through the shared texture wrapper (per the rendering-device
        // contract's destruction note).
        if let Some(out) = self.output_texture.take() {
            self.device.free(out);
        }
        for &id in self.plane_textures.iter().flatten() {
            self.device.free(id);
        }
        if let Some(set) = self.uniform_set.take() {
            self.device.free(set);
        }
        if let Some(pipeline) = self.pipeline.take() {
            self.device.free(pipeline);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::render_device::mock::MockRenderDevice;

    #[test]
    fn dispatch_group_count_matches_workgroup_size() {
        assert_eq!(div_round_up(17, 8), 3);
        assert_eq!(div_round_up(16, 8), 2);
    }

    #[test]
    fn bt601_center_pixel_matches_reference() {
        // 2x2 Y=[[16,235],[128,128]], U=[[128]], V=[[128]] — mid-gray chroma,
        // so the center pixels are pure luma: Y=16 -> black, Y=235 -> near-white.
        let device = Arc::new(MockRenderDevice::new());
        let mut conv = YUVConverter::new(device.clone());
        conv.set_frame_size(2, 2);
        let y = PlaneImage::new(2, 2, vec![16, 235, 128, 128]);
        let u = PlaneImage::new(1, 1, vec![128]);
        let v = PlaneImage::new(1, 1, vec![128]);
        conv.set_planes(y, u, v, None);
        conv.convert();

        let out = conv.get_output_texture();
        let bytes = device.read_texture(out).unwrap();
        // top-left pixel (Y=16, mid chroma) should be near-black.
        assert!(bytes[0] <= 2);
        assert!(bytes[1] <= 2);
        assert!(bytes[2] <= 2);
        assert_eq!(bytes[3], 255);
        // top-right pixel (Y=235) should be near-white.
        assert!(bytes[4] >= 253);
    }

    #[test]
    fn resizing_drops_cached_planes() {
        let device = Arc::new(MockRenderDevice::new());
        let mut conv = YUVConverter::new(device);
        conv.set_frame_size(4, 4);
        conv.set_planes(
            PlaneImage::new(4, 4, vec![0u8; 16]),
            PlaneImage::new(2, 2, vec![0u8; 4]),
            PlaneImage::new(2, 2, vec![0u8; 4]),
            None,
        );
        conv.set_frame_size(8, 8);
        assert!(conv.planes.is_none());
    }
}
