//! Output sinks and per-frame dispatch.

use std::fs::File;
use std::io::Write as _;
use std::path::Path;

use bytes::Bytes;
use ffmpeg_next::format::Pixel;

use crate::error::{Error, Result};
use crate::frame::VideoFrame;

/// Presentation surface for decoded frames. Implementations must accept both
/// hardware- and host-resident frames.
pub trait DisplaySink {
    fn display(&mut self, frame: &VideoFrame);
}

/// Raw frame dump: a headerless concatenation of per-frame pixel planes at
/// 1-byte row alignment. Consumers need format and geometry out of band.
pub struct RawDump {
    file: File,
}

impl RawDump {
    /// Opened once for the whole run; successive passes append to the same
    /// handle, so their bytes concatenate into one file.
    pub fn create(path: &Path) -> Result<Self> {
        let file = File::create(path).map_err(|source| Error::DumpOpen {
            path: path.to_path_buf(),
            source,
        })?;
        Ok(Self { file })
    }

    fn append(&mut self, data: &Bytes) -> Result<()> {
        self.file.write_all(data).map_err(Error::Write)
    }
}

/// The sinks a pass dispatches into. Display is always present; the raw dump
/// only when configured.
pub struct FrameSinks {
    pub display: Box<dyn DisplaySink>,
    pub dump: Option<RawDump>,
}

/// Outcome of one dispatch.
#[derive(Debug, PartialEq, Eq)]
pub enum Dispatch {
    Continue,
    /// Frame budget exhausted; the pass ends cleanly. Not an error.
    Stop,
}

/// Per-pass cap on dispatched frames. Negative means unbounded. A configured
/// budget of zero stops after the first frame; the decrement happens after a
/// successful dispatch, so a budget of K dispatches exactly K frames.
#[derive(Clone, Copy, Debug)]
pub struct FrameBudget {
    remaining: i64,
    stopped: bool,
}

impl FrameBudget {
    pub fn new(limit: i64) -> Self {
        Self {
            remaining: limit,
            stopped: false,
        }
    }

    pub fn unbounded() -> Self {
        Self::new(-1)
    }

    /// True once a dispatch has hit the cap; later frames (e.g. trailing
    /// flush output) must not be dispatched.
    fn exhausted(&self) -> bool {
        self.stopped
    }

    /// Account one dispatched frame; true when the pass should stop.
    fn consume(&mut self) -> bool {
        if self.remaining < 0 {
            return false;
        }
        if self.remaining == 0 {
            self.stopped = true;
            return true;
        }
        self.remaining -= 1;
        if self.remaining == 0 {
            self.stopped = true;
        }
        self.stopped
    }
}

/// Fan one decoded frame out to the sinks, then account it against the
/// budget. The frame, and any host-memory copy made for the dump, is
/// released before this returns on every path.
pub fn dispatch(
    frame: VideoFrame,
    sinks: &mut FrameSinks,
    budget: &mut FrameBudget,
    hw_format: Pixel,
) -> Result<Dispatch> {
    if budget.exhausted() {
        return Ok(Dispatch::Stop);
    }

    sinks.display.display(&frame);

    if let Some(dump) = sinks.dump.as_mut() {
        let data = if frame.format() == hw_format {
            frame.transfer_to_host()?.to_bytes()?
        } else {
            frame.to_bytes()?
        };
        dump.append(&data)?;
    }

    if budget.consume() {
        return Ok(Dispatch::Stop);
    }
    Ok(Dispatch::Continue)
}

#[cfg(test)]
mod tests {
    use std::cell::Cell;
    use std::rc::Rc;

    use super::*;

    struct CountingDisplay {
        frames: Rc<Cell<usize>>,
    }

    impl DisplaySink for CountingDisplay {
        fn display(&mut self, _frame: &VideoFrame) {
            self.frames.set(self.frames.get() + 1);
        }
    }

    fn test_frame() -> VideoFrame {
        ffmpeg_next::frame::Video::new(Pixel::YUV420P, 64, 48).into()
    }

    // A hardware format no software test frame carries, so dispatch writes
    // frames through without a transfer.
    const HW_FORMAT: Pixel = Pixel::VAAPI;

    fn sinks_with_dump(path: &Path, frames: Rc<Cell<usize>>) -> FrameSinks {
        FrameSinks {
            display: Box::new(CountingDisplay { frames }),
            dump: Some(RawDump::create(path).unwrap()),
        }
    }

    #[test]
    fn unbounded_budget_never_stops() {
        let mut budget = FrameBudget::unbounded();
        for _ in 0..1000 {
            assert!(!budget.consume());
        }
        assert!(!budget.exhausted());
    }

    #[test]
    fn budget_stops_on_the_kth_frame() {
        let mut budget = FrameBudget::new(3);
        assert!(!budget.consume());
        assert!(!budget.consume());
        assert!(budget.consume());
        assert!(budget.exhausted());
    }

    #[test]
    fn zero_budget_stops_after_the_first_frame() {
        let mut budget = FrameBudget::new(0);
        assert!(!budget.exhausted());
        assert!(budget.consume());
        assert!(budget.exhausted());
    }

    #[test]
    fn display_receives_frames_without_dump() {
        let frames = Rc::new(Cell::new(0));
        let mut sinks = FrameSinks {
            display: Box::new(CountingDisplay {
                frames: frames.clone(),
            }),
            dump: None,
        };
        let mut budget = FrameBudget::unbounded();
        let outcome = dispatch(test_frame(), &mut sinks, &mut budget, HW_FORMAT).unwrap();
        assert_eq!(outcome, Dispatch::Continue);
        assert_eq!(frames.get(), 1);
    }

    #[test]
    fn dump_grows_by_exact_frame_size_under_budget() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("dump.yuv");
        let frames = Rc::new(Cell::new(0));
        let mut sinks = sinks_with_dump(&path, frames.clone());
        let mut budget = FrameBudget::new(3);
        let frame_size = test_frame().byte_size().unwrap();

        for expected in [Dispatch::Continue, Dispatch::Continue, Dispatch::Stop] {
            let outcome = dispatch(test_frame(), &mut sinks, &mut budget, HW_FORMAT).unwrap();
            assert_eq!(outcome, expected);
        }

        // A trailing frame after the stop is neither displayed nor written.
        let outcome = dispatch(test_frame(), &mut sinks, &mut budget, HW_FORMAT).unwrap();
        assert_eq!(outcome, Dispatch::Stop);

        assert_eq!(frames.get(), 3);
        let written = std::fs::metadata(&path).unwrap().len();
        assert_eq!(written, (3 * frame_size) as u64);
    }

    #[test]
    fn passes_concatenate_into_one_dump() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("dump.yuv");
        let frames = Rc::new(Cell::new(0));
        let mut sinks = sinks_with_dump(&path, frames.clone());
        let frame_size = test_frame().byte_size().unwrap();

        // Two passes over the same dump handle, budget reset in between.
        for _pass in 0..2 {
            let mut budget = FrameBudget::unbounded();
            for _ in 0..2 {
                let outcome = dispatch(test_frame(), &mut sinks, &mut budget, HW_FORMAT).unwrap();
                assert_eq!(outcome, Dispatch::Continue);
            }
        }

        assert_eq!(frames.get(), 4);
        let written = std::fs::metadata(&path).unwrap().len();
        assert_eq!(written, (4 * frame_size) as u64);
    }
}
