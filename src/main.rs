use std::path::PathBuf;

use ffmpeg_pipe::error::Error;
use ffmpeg_pipe::player::{self, PlayOptions};

mod display;

fn init_logging() {
    env_logger::Builder::from_default_env()
        .filter_level(log::LevelFilter::Info)
        .filter_module("ffmpeg_pipe", log::LevelFilter::Info)
        .init();
}

fn usage() -> ! {
    eprintln!(
        "Usage: drmplay [-l|--loop <count>] [-f|--frames <count>] [-o <raw-output-file>] <input>"
    );
    std::process::exit(1);
}

fn parse_args() -> PlayOptions {
    let mut args = pico_args::Arguments::from_env();

    let loop_count: i64 = match args.opt_value_from_str(["-l", "--loop"]) {
        Ok(value) => value.unwrap_or(0),
        Err(_) => usage(),
    };
    let frame_count: i64 = match args.opt_value_from_str(["-f", "--frames"]) {
        Ok(value) => value.unwrap_or(-1),
        Err(_) => usage(),
    };
    let dump: Option<PathBuf> = match args.opt_value_from_str("-o") {
        Ok(value) => value,
        Err(_) => usage(),
    };

    let mut rest = args.finish().into_iter();
    let input = match rest.next().and_then(|arg| arg.into_string().ok()) {
        Some(arg) if !arg.starts_with('-') => arg,
        _ => usage(),
    };
    if rest.next().is_some() {
        usage();
    }

    let mut opts = PlayOptions::new(input);
    opts.loop_count = loop_count;
    opts.frame_count = frame_count;
    opts.dump = dump;
    opts
}

fn main() {
    init_logging();

    let opts = parse_args();

    if let Err(err) = ffmpeg_pipe::init() {
        log::error!("{err}");
        std::process::exit(1);
    }

    if let Err(err) = player::run(&opts, Box::new(display::LogDisplay::default())) {
        log::error!("playback failed: {err}");
        if let Error::UnsupportedDevice { available, .. } = &err {
            log::error!("available device types: {}", available.join(" "));
        }
        std::process::exit(1);
    }
}
