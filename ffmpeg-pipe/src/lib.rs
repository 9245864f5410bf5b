//! Hardware-accelerated video decode pipeline: device and surface-format
//! negotiation, a feed/drain decoder session, and per-frame fan-out to output
//! sinks under a frame budget.

/// Registers FFmpeg components. Call once at startup before opening inputs.
pub fn init() -> error::Result<()> {
    ffmpeg_next::init().map_err(error::Error::Init)
}

pub mod decoder;
pub mod error;
pub mod frame;
pub mod hw;
pub mod input;
pub mod packet;
pub mod player;
pub mod sink;
pub mod stream;
