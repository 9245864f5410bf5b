use ffmpeg_pipe::frame::VideoFrame;
use ffmpeg_pipe::sink::DisplaySink;

/// Stand-in presentation sink: counts frames and logs their geometry. The
/// real output surface (KMS plane import of DRM PRIME buffers) lives outside
/// this binary and accepts frames in either residency, as this does.
#[derive(Default)]
pub struct LogDisplay {
    frames: u64,
}

impl DisplaySink for LogDisplay {
    fn display(&mut self, frame: &VideoFrame) {
        self.frames += 1;
        log::debug!(
            "frame {}: {}x{} {:?}, pts {:?}",
            self.frames,
            frame.width(),
            frame.height(),
            frame.format(),
            frame.pts()
        );
    }
}
