use ffmpeg_next::media;

use crate::error::{Error, Result};
use crate::packet::RawPacket;
use crate::stream::AvStream;

/// Demuxer-backed packet source for one input file or URL.
pub struct AvInput {
    inner: ffmpeg_next::format::context::Input,
}

impl AvInput {
    pub fn open(path: &str) -> Result<Self> {
        let inner = ffmpeg_next::format::input(&path).map_err(|source| Error::Open {
            path: path.to_string(),
            source,
        })?;
        Ok(Self { inner })
    }

    /// The stream a decode pass should consume, as picked by the demuxer.
    pub fn best_video_stream(&self) -> Result<AvStream> {
        let stream = self
            .inner
            .streams()
            .best(media::Type::Video)
            .ok_or(Error::NoVideoStream)?;
        let stream = AvStream::from(stream);
        log::debug!(
            "video stream {}: codec {:?}, {}x{} @ {:.1}fps",
            stream.index(),
            stream.codec_id(),
            stream.width(),
            stream.height(),
            stream.fps()
        );
        Ok(stream)
    }

    /// Next packet from any stream; `None` is the source's end of stream.
    pub fn read_packet(&mut self) -> Option<RawPacket> {
        self.inner
            .packets()
            .next()
            .map(|(stream, packet)| (packet, stream.time_base()).into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_input_is_an_open_error() {
        match AvInput::open("/no/such/file.mp4") {
            Err(Error::Open { path, .. }) => assert_eq!(path, "/no/such/file.mp4"),
            Err(other) => panic!("expected Open error, got {other}"),
            Ok(_) => panic!("expected Open error"),
        }
    }
}
