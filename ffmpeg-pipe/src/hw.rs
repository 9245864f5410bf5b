//! Hardware device handling and surface-format negotiation.
//!
//! Resolves the device type by name, owns the `AVHWDeviceContext` reference a
//! decoder session binds to, and picks the pixel format the session must
//! request from the codec.

use std::ffi::{CStr, CString};
use std::ptr;

use ffmpeg_next::codec;
use ffmpeg_next::ffi;
use ffmpeg_next::format::Pixel;

use crate::error::{Error, Result};

/// Look up a hardware device type by name (e.g. "drm", "vaapi", "cuda").
pub fn find_device_type(name: &str) -> Result<ffi::AVHWDeviceType> {
    let unsupported = || Error::UnsupportedDevice {
        name: name.to_string(),
        available: available_device_types(),
    };
    let cname = CString::new(name).map_err(|_| unsupported())?;
    let device_type = unsafe { ffi::av_hwdevice_find_type_by_name(cname.as_ptr()) };
    if device_type == ffi::AVHWDeviceType::AV_HWDEVICE_TYPE_NONE {
        return Err(unsupported());
    }
    Ok(device_type)
}

/// Names of every hardware device type this FFmpeg build knows about.
pub fn available_device_types() -> Vec<String> {
    let mut names = Vec::new();
    let mut device_type = ffi::AVHWDeviceType::AV_HWDEVICE_TYPE_NONE;
    loop {
        device_type = unsafe { ffi::av_hwdevice_iterate_types(device_type) };
        if device_type == ffi::AVHWDeviceType::AV_HWDEVICE_TYPE_NONE {
            return names;
        }
        names.push(device_type_name(device_type));
    }
}

pub(crate) fn device_type_name(device_type: ffi::AVHWDeviceType) -> String {
    let name = unsafe { ffi::av_hwdevice_get_type_name(device_type) };
    if name.is_null() {
        return "unknown".to_string();
    }
    unsafe { CStr::from_ptr(name) }
        .to_string_lossy()
        .into_owned()
}

/// Owned reference to an `AVHWDeviceContext`. Created once per decoder
/// session and released when the session tears down.
pub struct HwDeviceCtx {
    ptr: *mut ffi::AVBufferRef,
}

impl HwDeviceCtx {
    pub fn new(device_type: ffi::AVHWDeviceType) -> Result<Self> {
        let mut ptr: *mut ffi::AVBufferRef = ptr::null_mut();
        let ret = unsafe {
            ffi::av_hwdevice_ctx_create(&mut ptr, device_type, ptr::null(), ptr::null_mut(), 0)
        };
        if ret < 0 || ptr.is_null() {
            return Err(Error::DeviceInit(ffmpeg_next::Error::from(ret)));
        }
        log::debug!("created {} device context", device_type_name(device_type));
        Ok(Self { ptr })
    }

    pub(crate) fn as_ptr(&self) -> *mut ffi::AVBufferRef {
        self.ptr
    }
}

impl Drop for HwDeviceCtx {
    fn drop(&mut self) {
        if !self.ptr.is_null() {
            unsafe { ffi::av_buffer_unref(&mut self.ptr) };
        }
    }
}

/// Result of format negotiation: the decoder implementation to open and the
/// hardware surface format the session must request from it.
pub struct Negotiated {
    pub codec: codec::Codec,
    pub hw_format: Pixel,
}

struct HwConfigEntry {
    methods: u32,
    device_type: ffi::AVHWDeviceType,
    pix_fmt: Pixel,
}

/// First advertised configuration offering device-context style acceleration
/// on `device_type`, scanned in order.
fn device_ctx_format(
    entries: &[HwConfigEntry],
    device_type: ffi::AVHWDeviceType,
) -> Option<Pixel> {
    entries
        .iter()
        .find(|entry| {
            entry.methods & ffi::AV_CODEC_HW_CONFIG_METHOD_HW_DEVICE_CTX != 0
                && entry.device_type == device_type
        })
        .map(|entry| entry.pix_fmt)
}

fn hw_configs(codec: &codec::Codec) -> Vec<HwConfigEntry> {
    let mut entries = Vec::new();
    for index in 0.. {
        let config = unsafe { ffi::avcodec_get_hw_config(codec.as_ptr(), index) };
        if config.is_null() {
            break;
        }
        let config = unsafe { &*config };
        entries.push(HwConfigEntry {
            methods: config.methods as u32,
            device_type: config.device_type,
            pix_fmt: Pixel::from(config.pix_fmt),
        });
    }
    entries
}

/// Pick the decoder and surface format for `codec_id` on `device_type`.
pub fn negotiate(codec_id: codec::Id, device_type: ffi::AVHWDeviceType) -> Result<Negotiated> {
    // The stateful v4l2 m2m decoders do not advertise device-ctx configs, so
    // H.264 goes straight to the dedicated wrapper emitting DRM PRIME frames.
    if codec_id == codec::Id::H264 {
        let codec = ffmpeg_next::decoder::find_by_name("h264_v4l2m2m").ok_or_else(|| {
            Error::UnsupportedConfiguration {
                decoder: "h264_v4l2m2m".to_string(),
                device: device_type_name(device_type),
            }
        })?;
        log::info!("using {} with DRM PRIME output", codec.name());
        return Ok(Negotiated {
            codec,
            hw_format: Pixel::DRM_PRIME,
        });
    }

    let codec = ffmpeg_next::decoder::find(codec_id).ok_or(Error::DecoderNotFound(codec_id))?;
    match device_ctx_format(&hw_configs(&codec), device_type) {
        Some(hw_format) => {
            log::info!(
                "decoder {} negotiated {:?} on {}",
                codec.name(),
                hw_format,
                device_type_name(device_type)
            );
            Ok(Negotiated { codec, hw_format })
        }
        None => Err(Error::UnsupportedConfiguration {
            decoder: codec.name().to_string(),
            device: device_type_name(device_type),
        }),
    }
}

/// `AVCodecContext.get_format` callback. The negotiated surface format is
/// stored in the context's `opaque` field by [`crate::decoder::HwDecoder`],
/// so no shared mutable state is involved.
pub(crate) unsafe extern "C" fn select_hw_format(
    ctx: *mut ffi::AVCodecContext,
    mut formats: *const ffi::AVPixelFormat,
) -> ffi::AVPixelFormat {
    unsafe {
        let wanted = (*ctx).opaque as usize as i32;
        while *formats != ffi::AVPixelFormat::AV_PIX_FMT_NONE {
            if *formats as i32 == wanted {
                return *formats;
            }
            formats = formats.add(1);
        }
    }
    log::error!("decoder did not offer the negotiated hardware surface format");
    ffi::AVPixelFormat::AV_PIX_FMT_NONE
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(methods: u32, device_type: ffi::AVHWDeviceType, pix_fmt: Pixel) -> HwConfigEntry {
        HwConfigEntry {
            methods,
            device_type,
            pix_fmt,
        }
    }

    #[test]
    fn scan_returns_first_device_ctx_match_in_order() {
        let drm = ffi::AVHWDeviceType::AV_HWDEVICE_TYPE_DRM;
        let vaapi = ffi::AVHWDeviceType::AV_HWDEVICE_TYPE_VAAPI;
        let entries = vec![
            // right method, wrong device type
            entry(ffi::AV_CODEC_HW_CONFIG_METHOD_HW_DEVICE_CTX, vaapi, Pixel::VAAPI),
            // right device type, wrong method
            entry(ffi::AV_CODEC_HW_CONFIG_METHOD_INTERNAL, drm, Pixel::NV12),
            entry(
                ffi::AV_CODEC_HW_CONFIG_METHOD_HW_DEVICE_CTX,
                drm,
                Pixel::DRM_PRIME,
            ),
        ];
        assert_eq!(device_ctx_format(&entries, drm), Some(Pixel::DRM_PRIME));
    }

    #[test]
    fn scan_without_a_match_is_none() {
        let drm = ffi::AVHWDeviceType::AV_HWDEVICE_TYPE_DRM;
        let vaapi = ffi::AVHWDeviceType::AV_HWDEVICE_TYPE_VAAPI;
        assert_eq!(device_ctx_format(&[], drm), None);
        let entries = vec![entry(
            ffi::AV_CODEC_HW_CONFIG_METHOD_HW_DEVICE_CTX,
            vaapi,
            Pixel::VAAPI,
        )];
        assert_eq!(device_ctx_format(&entries, drm), None);
    }

    #[test]
    fn unknown_device_type_is_rejected() {
        match find_device_type("no-such-device") {
            Err(Error::UnsupportedDevice { name, .. }) => assert_eq!(name, "no-such-device"),
            Err(other) => panic!("expected UnsupportedDevice, got {other}"),
            Ok(_) => panic!("expected UnsupportedDevice"),
        }
    }

    #[test]
    fn h264_negotiates_the_m2m_wrapper() {
        if ffmpeg_next::decoder::find_by_name("h264_v4l2m2m").is_none() {
            eprintln!("skip: h264_v4l2m2m not in this FFmpeg build");
            return;
        }
        let drm = ffi::AVHWDeviceType::AV_HWDEVICE_TYPE_DRM;
        let negotiated = negotiate(codec::Id::H264, drm).unwrap();
        assert_eq!(negotiated.codec.name(), "h264_v4l2m2m");
        assert_eq!(negotiated.hw_format, Pixel::DRM_PRIME);
    }
}
