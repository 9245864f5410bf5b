//! Playback orchestration: one open/decode/flush/close pass per replay.

use std::path::PathBuf;

use ffmpeg_next::ffi;

use crate::decoder::{Drain, HwDecoder};
use crate::error::Result;
use crate::hw;
use crate::input::AvInput;
use crate::sink::{self, Dispatch, DisplaySink, FrameBudget, FrameSinks, RawDump};

/// Playback configuration, mirroring the CLI surface.
pub struct PlayOptions {
    pub input: String,
    /// Hardware device type name, e.g. "drm".
    pub device: String,
    /// Replay count; 0 (the default) still runs exactly one pass.
    pub loop_count: i64,
    /// Per-pass frame budget; negative means unbounded.
    pub frame_count: i64,
    /// Raw dump output path; the file is opened once and shared by every pass.
    pub dump: Option<PathBuf>,
}

impl PlayOptions {
    pub fn new(input: impl Into<String>) -> Self {
        Self {
            input: input.into(),
            device: "drm".to_string(),
            loop_count: 0,
            frame_count: -1,
            dump: None,
        }
    }
}

/// Replay counter. One pass always runs; the count is then decremented and
/// playback continues while it stays positive, so a configured 0 or 1 both
/// mean exactly one pass and N >= 1 means N passes.
struct Replay {
    remaining: i64,
}

impl Replay {
    fn new(count: i64) -> Self {
        Self { remaining: count }
    }

    /// Called after each pass; true when another pass should run.
    fn another(&mut self) -> bool {
        self.remaining -= 1;
        self.remaining > 0
    }
}

/// Run `max(loop_count, 1)` passes over the input, dispatching every decoded
/// frame to `display` (and to the raw dump when configured). Any error
/// aborts the run; remaining passes are not attempted.
pub fn run(opts: &PlayOptions, display: Box<dyn DisplaySink>) -> Result<()> {
    let device_type = hw::find_device_type(&opts.device)?;

    let dump = match opts.dump.as_deref() {
        Some(path) => Some(RawDump::create(path)?),
        None => None,
    };
    let mut sinks = FrameSinks { display, dump };

    let mut replay = Replay::new(opts.loop_count);
    let mut pass = 0u64;
    loop {
        pass += 1;
        log::info!("pass {} over {}", pass, opts.input);
        run_pass(opts, device_type, &mut sinks)?;
        if !replay.another() {
            return Ok(());
        }
    }
}

/// One pass: open the source, build a fresh decoder session, decode under a
/// fresh budget, flush, and tear down. The source and session are dropped on
/// every exit path; only the dump handle in `sinks` outlives the pass.
fn run_pass(
    opts: &PlayOptions,
    device_type: ffi::AVHWDeviceType,
    sinks: &mut FrameSinks,
) -> Result<()> {
    let mut input = AvInput::open(&opts.input)?;
    let stream = input.best_video_stream()?;
    let mut session = HwDecoder::new(&stream, device_type)?;
    let mut budget = FrameBudget::new(opts.frame_count);

    let mut outcome = Dispatch::Continue;
    while outcome == Dispatch::Continue {
        let Some(packet) = input.read_packet() else {
            break; // source end of stream, not an error
        };
        if packet.index() != stream.index() {
            continue;
        }
        log::trace!(
            "packet: stream {}, pts {:?}, {} bytes",
            packet.index(),
            packet.pts(),
            packet.size()
        );
        session.feed(packet)?;
        outcome = drain_into(&mut session, sinks, &mut budget)?;
    }

    // Flushing runs on every exit from the read loop; trailing frames are
    // still subject to the budget.
    session.send_eof()?;
    drain_into(&mut session, sinks, &mut budget)?;
    Ok(())
}

/// Drain decoded frames into the sinks until the decoder asks for more input
/// or signals end of stream, or the budget stops the pass.
fn drain_into(
    session: &mut HwDecoder,
    sinks: &mut FrameSinks,
    budget: &mut FrameBudget,
) -> Result<Dispatch> {
    loop {
        match session.drain()? {
            Drain::Frame(frame) => {
                if sink::dispatch(frame, sinks, budget, session.hw_format())? == Dispatch::Stop {
                    return Ok(Dispatch::Stop);
                }
            }
            Drain::NeedsInput | Drain::EndOfStream => return Ok(Dispatch::Continue),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frame::VideoFrame;

    #[test]
    fn replay_zero_and_one_both_run_a_single_pass() {
        let mut replay = Replay::new(0);
        assert!(!replay.another());

        let mut replay = Replay::new(1);
        assert!(!replay.another());
    }

    #[test]
    fn replay_n_runs_n_passes() {
        let mut replay = Replay::new(3);
        let mut passes = 1;
        while replay.another() {
            passes += 1;
        }
        assert_eq!(passes, 3);
    }

    struct NullDisplay;

    impl DisplaySink for NullDisplay {
        fn display(&mut self, _frame: &VideoFrame) {}
    }

    /// Requires a DRM device and scripts/test.mp4; skips otherwise.
    #[test]
    fn budgeted_pass_dumps_frames() -> anyhow::Result<()> {
        let asset = std::path::Path::new(env!("CARGO_MANIFEST_DIR"))
            .parent()
            .unwrap()
            .join("scripts")
            .join("test.mp4");
        if !asset.exists() {
            eprintln!("skip: {} not found", asset.display());
            return Ok(());
        }
        let Ok(device_type) = hw::find_device_type("drm") else {
            eprintln!("skip: drm device type not supported");
            return Ok(());
        };
        if hw::HwDeviceCtx::new(device_type).is_err() {
            eprintln!("skip: no drm device available");
            return Ok(());
        }

        crate::init()?;
        let dir = tempfile::tempdir()?;
        let dump = dir.path().join("dump.yuv");
        let mut opts = PlayOptions::new(asset.to_string_lossy().into_owned());
        opts.frame_count = 3;
        opts.dump = Some(dump.clone());
        run(&opts, Box::new(NullDisplay))?;

        let written = std::fs::metadata(&dump)?.len();
        assert!(written > 0, "dump should contain the budgeted frames");
        Ok(())
    }
}
