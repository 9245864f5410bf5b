use std::io;
use std::path::PathBuf;

use ffmpeg_next::codec;

/// Errors produced by the decode pipeline. Every variant is fatal for the
/// current pass (and thus the run); nothing is retried. The transient decoder
/// signals (need-more-input, end-of-stream) are control-flow values on
/// [`crate::decoder::Drain`], not errors.
#[derive(thiserror::Error, Debug)]
#[non_exhaustive]
pub enum Error {
    #[error("ffmpeg initialization failed: {0}")]
    Init(ffmpeg_next::Error),

    /// The named hardware device type is unknown to this FFmpeg build.
    /// `available` carries the types the build does know about, for reporting.
    #[error("hardware device type {name:?} is not supported")]
    UnsupportedDevice { name: String, available: Vec<String> },

    #[error("no decoder for codec {0:?}")]
    DecoderNotFound(codec::Id),

    /// No advertised configuration of the decoder offers device-context
    /// acceleration on the requested device type.
    #[error("decoder {decoder} does not support device type {device}")]
    UnsupportedConfiguration { decoder: String, device: String },

    #[error("failed to create hardware device context: {0}")]
    DeviceInit(ffmpeg_next::Error),

    #[error("failed to open codec: {0}")]
    CodecOpen(ffmpeg_next::Error),

    #[error("decode error: {0}")]
    Decode(ffmpeg_next::Error),

    #[error("failed to transfer frame data to system memory: {0}")]
    Transfer(ffmpeg_next::Error),

    #[error("failed to copy frame image to buffer: {0}")]
    FrameCopy(ffmpeg_next::Error),

    #[error("cannot open input {path}: {source}")]
    Open {
        path: String,
        source: ffmpeg_next::Error,
    },

    #[error("no video stream in input")]
    NoVideoStream,

    #[error("cannot open dump file {}: {source}", path.display())]
    DumpOpen { path: PathBuf, source: io::Error },

    #[error("failed to write raw frame data: {0}")]
    Write(io::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
