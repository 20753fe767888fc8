//! MODE 7 video convertor.
//!
//! Reads a numbered image sequence, quantises it to the teletext colour
//! model and writes the delta byte stream a BBC Micro playback routine
//! applies frame by frame.

use std::{fs, io::Write, path::PathBuf};

use anyhow::Context;
use clap::{CommandFactory, Parser};
use log4rs::{
    append::console::{ConsoleAppender, Target},
    config::{Appender, Config, Root},
    encode::pattern::PatternEncoder,
};
use mode7_engine::{EncoderOptions, Mode7Encoder, SourceImage};

use crate::dither::{DitherMode, GreyscaleMode};

mod dither;

#[derive(Parser)]
#[command(name = "mode7video", about = "MODE 7 video convertor", version)]
struct Cli {
    /// Last frame number (inclusive)
    #[arg(short = 'n', long = "frames", default_value_t = 0)]
    last_frame: u32,

    /// Start frame number
    #[arg(short = 's', long = "start", default_value_t = 1)]
    start_frame: u32,

    /// Input directory / short name
    #[arg(short = 'i', long = "input")]
    input: Option<String>,

    /// Image format file extension
    #[arg(short = 'e', long = "ext", default_value = "png")]
    extension: String,

    /// Colour to greyscale conversion (0=none, 1=red, 2=green, 3=blue, 4=mean, 5=luminance)
    #[arg(short = 'g', long = "grey", default_value_t = 0, value_parser = clap::value_parser!(u8).range(0..=5))]
    greyscale: u8,

    /// B&W threshold value
    #[arg(short = 't', long = "threshold", default_value_t = 127)]
    threshold: u8,

    /// Dither mode (0=threshold only, 1=floyd steinberg, 2=ordered 2x2, 3=ordered 3x3)
    #[arg(short = 'd', long = "dither", default_value_t = 0, value_parser = clap::value_parser!(u8).range(0..=3))]
    dither: u8,

    /// Disallow the hold-graphics control codes
    #[arg(long)]
    nohold: bool,

    /// Disallow the background control codes
    #[arg(long)]
    nofill: bool,

    /// Separated graphics
    #[arg(long)]
    sep: bool,

    /// Save individual MODE 7 frames and delta arrays
    #[arg(long)]
    save: bool,

    /// Save individual dithered image frames
    #[arg(long)]
    simg: bool,

    /// Verbose output
    #[arg(short = 'v', long)]
    verbose: bool,
}

fn main() -> anyhow::Result<()> {
    init_logging();

    let args = Cli::parse();
    let Some(name) = args.input.clone() else {
        Cli::command().print_help()?;
        return Ok(());
    };

    run(&args, &name)
}

fn run(args: &Cli, name: &str) -> anyhow::Result<()> {
    let dir = PathBuf::from(name);

    let options = EncoderOptions {
        use_hold: !args.nohold,
        use_fill: !args.nofill,
        separated_graphics: args.sep,
        ..EncoderOptions::default()
    };
    let mut encoder = Mode7Encoder::new(options);
    if args.last_frame >= args.start_frame {
        encoder.expect_frames((args.last_frame - args.start_frame + 1) as usize);
    }

    if args.save {
        fs::create_dir_all(dir.join("bin"))?;
        fs::create_dir_all(dir.join("delta"))?;
    }
    if args.simg {
        fs::create_dir_all(dir.join("test"))?;
    }

    let grey_mode = GreyscaleMode::from_flag(args.greyscale);
    let dither_mode = DitherMode::from_flag(args.dither);

    for n in args.start_frame..=args.last_frame {
        let path = dir
            .join("frames")
            .join(format!("{name}-{n}.{}", args.extension));
        let mut image = match image::open(&path) {
            Ok(image) => image.into_rgb8(),
            Err(err) => {
                log::error!("cannot read frame {}: {err}", path.display());
                break;
            }
        };

        dither::to_greyscale(&mut image, grey_mode);
        dither::dither(&mut image, dither_mode, args.threshold);

        if args.simg {
            image.save(dir.join("test").join(format!("{name}-{n}.png")))?;
        }

        let (width, height) = image.dimensions();
        let source = SourceImage::from_rgb(width as usize, height as usize, image.into_raw())?;
        let report = encoder.encode_frame(&source)?;

        if args.save {
            fs::write(
                dir.join("bin").join(format!("{name}-{n}.bin")),
                encoder.current_grid(),
            )?;
            fs::write(
                dir.join("delta").join(format!("{name}-{n}.delta.bin")),
                encoder.delta_array(),
            )?;
        }

        if args.verbose {
            println!(
                "Frame: {n}  deltas={} bytes={} repr={}",
                report.delta_count,
                report.bytes,
                report.kind.name()
            );
        } else {
            print!("\rFrame: {n}/{}", args.last_frame);
            std::io::stdout().flush()?;
        }
    }

    let frame_size = encoder.current_grid().len();
    let (stream, stats) = encoder.finish();

    let out_path = dir.join(format!("{name}_beeb.bin"));
    fs::write(&out_path, &stream).with_context(|| format!("writing {}", out_path.display()))?;

    println!();
    println!("total frames = {}", stats.frames);
    println!("frame size = {frame_size}");
    println!("total deltas = {}", stats.total_deltas);
    println!("total bytes = {}", stats.total_bytes);
    println!("max deltas = {}", stats.max_deltas);
    println!("reset frames = {}", stats.reset_frames);
    println!("deltas / frame = {:.2}", stats.deltas_per_frame());
    println!("bytes / frame = {:.2}", stats.bytes_per_frame());
    println!("bytes / second = {:.2}", stats.bytes_per_second());
    println!("beeb size = {} bytes", stream.len());

    Ok(())
}

fn init_logging() {
    let stderr = ConsoleAppender::builder()
        .target(Target::Stderr)
        .encoder(Box::new(PatternEncoder::new("{l} - {m}\n")))
        .build();
    let config = Config::builder()
        .appender(Appender::builder().build("stderr", Box::new(stderr)))
        .build(Root::builder().appender("stderr").build(log::LevelFilter::Info));
    match config {
        Ok(config) => {
            let _ = log4rs::init_config(config);
        }
        Err(err) => eprintln!("Failed to initialise logging: {err}"),
    }
}
