use ffmpeg_next::codec;
use ffmpeg_next::ffi;
use ffmpeg_next::format::Pixel;
use ffmpeg_next::Rational;

use crate::error::{Error, Result};
use crate::frame::VideoFrame;
use crate::hw::{self, HwDeviceCtx, Negotiated};
use crate::packet::RawPacket;
use crate::stream::AvStream;

/// Internal decode worker threads. The hardware path is tuned for a small
/// fixed pipeline depth.
const DECODE_WORKERS: usize = 3;

/// One drain step: either a decoded frame or a transient control signal.
/// `NeedsInput` and `EndOfStream` are ordinary control flow, never errors.
pub enum Drain {
    Frame(VideoFrame),
    NeedsInput,
    EndOfStream,
}

/// Hardware-backed decode session for a single video stream.
///
/// Owns the opened codec context and the hardware device context. The
/// negotiated surface format is fixed for the session's lifetime.
pub struct HwDecoder {
    decoder: codec::decoder::Video,
    // kept alive for the decoder's lifetime
    _hw_device: HwDeviceCtx,
    hw_format: Pixel,
    time_base: Rational,
}

impl HwDecoder {
    pub fn new(stream: &AvStream, device_type: ffi::AVHWDeviceType) -> Result<Self> {
        let Negotiated { codec, hw_format } = hw::negotiate(stream.codec_id(), device_type)?;

        let mut context = codec::Context::new_with_codec(codec);
        context
            .set_parameters(stream.parameters().clone())
            .map_err(Error::CodecOpen)?;

        let hw_device = HwDeviceCtx::new(device_type)?;
        unsafe {
            let raw = context.as_mut_ptr();
            (*raw).hw_device_ctx = ffi::av_buffer_ref(hw_device.as_ptr());
            // The callback reads the negotiated format back out of `opaque`.
            (*raw).opaque = ffi::AVPixelFormat::from(hw_format) as usize as *mut _;
            (*raw).get_format = Some(hw::select_hw_format);
        }
        context.set_threading(codec::threading::Config::count(DECODE_WORKERS));

        let decoder = context.decoder().video().map_err(Error::CodecOpen)?;
        let time_base = decoder.time_base();

        Ok(Self {
            decoder,
            _hw_device: hw_device,
            hw_format,
            time_base,
        })
    }

    /// Submit one encoded packet, consuming it. Malformed bitstream input is
    /// fatal for the pass; nothing is retried.
    pub fn feed(&mut self, mut packet: RawPacket) -> Result<()> {
        let time_base = packet.time_base();
        let packet = packet.get_mut();
        packet.rescale_ts(time_base, self.time_base);
        self.decoder.send_packet(packet).map_err(Error::Decode)
    }

    /// Try to produce the next decoded frame.
    pub fn drain(&mut self) -> Result<Drain> {
        let mut frame = ffmpeg_next::frame::Video::empty();
        match self.decoder.receive_frame(&mut frame) {
            Ok(()) => Ok(Drain::Frame(frame.into())),
            Err(ffmpeg_next::Error::Other { errno })
                if errno == ffmpeg_next::util::error::EAGAIN =>
            {
                Ok(Drain::NeedsInput)
            }
            Err(ffmpeg_next::Error::Eof) => Ok(Drain::EndOfStream),
            Err(err) => Err(Error::Decode(err)),
        }
    }

    /// Enter the flushing state: no more packets will be fed. The caller
    /// drains until [`Drain::EndOfStream`] to collect trailing frames.
    pub fn send_eof(&mut self) -> Result<()> {
        self.decoder.send_eof().map_err(Error::Decode)
    }

    /// The hardware surface format negotiated when the session was opened.
    pub fn hw_format(&self) -> Pixel {
        self.hw_format
    }
}
