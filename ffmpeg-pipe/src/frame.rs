use bytes::Bytes;
use ffmpeg_next::ffi;
use ffmpeg_next::format::Pixel;

use crate::error::{Error, Result};

/// Decoded video frame. Owns the underlying buffers; a hardware-resident
/// frame holds a reference to device memory until dropped.
pub struct VideoFrame {
    frame: ffmpeg_next::frame::Video,
}

impl From<ffmpeg_next::frame::Video> for VideoFrame {
    fn from(frame: ffmpeg_next::frame::Video) -> Self {
        Self { frame }
    }
}

impl VideoFrame {
    pub fn width(&self) -> u32 {
        self.frame.width()
    }

    pub fn height(&self) -> u32 {
        self.frame.height()
    }

    pub fn format(&self) -> Pixel {
        self.frame.format()
    }

    pub fn pts(&self) -> Option<i64> {
        self.frame.pts()
    }

    /// Copy a hardware-resident frame into system memory, preserving the
    /// presentation timestamp. Callers decide residency by comparing
    /// `format()` against the session's negotiated surface format.
    pub fn transfer_to_host(&self) -> Result<VideoFrame> {
        let mut sw = ffmpeg_next::frame::Video::empty();
        let ret =
            unsafe { ffi::av_hwframe_transfer_data(sw.as_mut_ptr(), self.frame.as_ptr(), 0) };
        if ret < 0 {
            return Err(Error::Transfer(ffmpeg_next::Error::from(ret)));
        }
        sw.set_pts(self.frame.pts());
        Ok(sw.into())
    }

    /// Exact byte size of the image at 1-byte row alignment.
    pub fn byte_size(&self) -> Result<usize> {
        let size = unsafe {
            ffi::av_image_get_buffer_size(
                self.frame.format().into(),
                self.frame.width() as i32,
                self.frame.height() as i32,
                1,
            )
        };
        if size < 0 {
            return Err(Error::FrameCopy(ffmpeg_next::Error::from(size)));
        }
        Ok(size as usize)
    }

    /// Serialize the pixel planes into one contiguous buffer of exactly
    /// [`byte_size`](Self::byte_size) bytes: rows packed at 1-byte alignment,
    /// planes back to back, no delimiters.
    pub fn to_bytes(&self) -> Result<Bytes> {
        let size = self.byte_size()?;
        let mut buf = vec![0u8; size];
        let ret = unsafe {
            ffi::av_image_copy_to_buffer(
                buf.as_mut_ptr(),
                size as i32,
                (*self.frame.as_ptr()).data.as_ptr() as *const *const u8,
                (*self.frame.as_ptr()).linesize.as_ptr(),
                self.frame.format().into(),
                self.frame.width() as i32,
                self.frame.height() as i32,
                1,
            )
        };
        if ret < 0 {
            return Err(Error::FrameCopy(ffmpeg_next::Error::from(ret)));
        }
        Ok(Bytes::from(buf))
    }
}
