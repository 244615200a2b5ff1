// Replay a logic-analyzer capture through the sniffer
//
// The capture thread plays the role of the edge interrupt, the main thread
// runs the decode loop and prints the transcript to stdout or a serial port.

use clap::Parser;
use i2c_sniffer_rs::{
    CaptureReplay, SerialSink, Sniffer, SnifferConfig, TranscriptSink, WriterSink,
};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

#[derive(Parser)]
#[command(name = "sniff")]
#[command(version = "1.0")]
#[command(about = "Decode I2C traffic from a logic-analyzer capture")]
#[command(long_about = "Replays a headerless CSV capture (FleaScope 'raw,0xBITMAP' rows or one integer per row) edge by edge through the sniffer and prints START/STOP/bytes/ACK/NAK.")]
struct Args {
    /// Capture file to replay
    capture: String,

    #[arg(long, default_value_t = 0, help = "Bit of the port bitmap carrying SCL")]
    scl: u8,

    #[arg(long, default_value_t = 1, help = "Bit of the port bitmap carrying SDA")]
    sda: u8,

    #[arg(short, long, default_value_t = 256, help = "Sample channel capacity (power of two)")]
    capacity: usize,

    #[arg(short, long, help = "Print every sample instead of decoded events only")]
    trace: bool,

    #[arg(short, long, help = "Send the transcript to this serial port instead of stdout")]
    serial: Option<String>,

    #[arg(long, help = "Microseconds to wait after each edge")]
    pace_us: Option<u64>,

    #[arg(short, long, help = "Show debug information and detailed logs")]
    verbose: bool,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    if args.verbose {
        env_logger::Builder::from_default_env()
            .filter_level(log::LevelFilter::Debug)
            .init();
    } else {
        env_logger::init();
    }

    let mut builder = SnifferConfig::builder()
        .scl_pin(args.scl)
        .sda_pin(args.sda)
        .capacity(args.capacity);
    if args.trace {
        builder = builder.trace();
    }
    let config = builder.build()?;

    let replay = CaptureReplay::from_path(&args.capture)?;
    let pace = args.pace_us.map(Duration::from_micros);

    match args.serial {
        Some(port) => sniff(&config, replay, pace, SerialSink::open(&port)?),
        None => sniff(&config, replay, pace, WriterSink::new(std::io::stdout().lock())),
    }
}

fn sniff<S: TranscriptSink>(
    config: &SnifferConfig,
    replay: CaptureReplay,
    pace: Option<Duration>,
    sink: S,
) -> Result<(), Box<dyn std::error::Error>> {
    let (mut capture, mut sniffer) = Sniffer::build(config, sink)?;
    sniffer.announce()?;

    let done = Arc::new(AtomicBool::new(false));
    let capture_done = Arc::clone(&done);
    let capture_thread = std::thread::spawn(move || {
        let stats = replay.play_paced(&mut capture, pace);
        capture_done.store(true, Ordering::Release);
        stats
    });

    let decoded = sniffer.run_until(&done)?;
    let stats = capture_thread
        .join()
        .map_err(|_| "capture thread panicked")?;

    eprintln!(
        "{} snapshots, {} edges, {} decoded, {} overruns",
        stats.snapshots, stats.edges, decoded, stats.overruns
    );
    Ok(())
}
