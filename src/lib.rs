//! # I2C Sniffer RS
//!
//! A passive I2C bus sniffer. It never drives the bus; it samples the clock
//! (SCL) and data (SDA) lines on every edge and turns the samples into a
//! line-oriented transcript of START, STOP, data bytes and ACK/NAK.
//!
//! ## Pipeline
//!
//! - **Capture**: [`EdgeCapture::on_edge`] runs in the edge interrupt, reads
//!   the I/O group holding both lines and pushes a [`LineSample`]
//! - **Sample channel**: lock-free single-producer/single-consumer ring
//!   ([`sample_channel`]); when full the newest sample is dropped and counted
//! - **Decoder**: [`Decoder::feed`] reconstructs protocol [`Event`]s one sample
//!   at a time
//! - **Decode loop**: [`Sniffer`] drains the channel and writes each event to a
//!   [`TranscriptSink`] (serial port, stdout, ...)
//!
//! ## Examples
//!
//! ### Decoding samples directly
//!
//! ```rust
//! use i2c_sniffer_rs::{Decoder, Event, LineSample};
//!
//! let mut decoder = Decoder::new();
//! // Data falls while the clock is high: START
//! let events: Vec<Event> = [LineSample::new(true, true), LineSample::new(true, false)]
//!     .into_iter()
//!     .flat_map(|sample| decoder.feed(sample))
//!     .collect();
//! assert_eq!(events, vec![Event::Start]);
//! ```
//!
//! ### Full pipeline
//!
//! ```rust
//! use i2c_sniffer_rs::{SnifferConfig, Sniffer, WriterSink};
//! use std::sync::atomic::AtomicU16;
//!
//! let config = SnifferConfig::builder()
//!     .scl_pin(0)
//!     .sda_pin(1)
//!     .banner(false)
//!     .build()?;
//! let (mut capture, mut sniffer) = Sniffer::build(&config, WriterSink::new(Vec::new()))?;
//!
//! // Stand-in for the port register; the interrupt would call on_edge
//! let port = AtomicU16::new(0b11);
//! port.store(0b01, std::sync::atomic::Ordering::Release);
//! capture.on_edge(&port);
//!
//! sniffer.drain()?;
//! assert_eq!(sniffer.into_sink().into_inner(), b"START\r\n");
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```
//!
//! ### Replaying a logic-analyzer capture to a serial port
//!
//! ```rust,no_run
//! use i2c_sniffer_rs::{CaptureReplay, SerialSink, Sniffer, SnifferConfig};
//!
//! let config = SnifferConfig::default();
//! let sink = SerialSink::open("/dev/ttyUSB0")?;
//! let (mut capture, mut sniffer) = Sniffer::build(&config, sink)?;
//!
//! let replay = CaptureReplay::from_path("capture.csv")?;
//! let stats = replay.play(&mut capture);
//! sniffer.announce()?;
//! sniffer.drain()?;
//! println!("{} edges, {} overruns", stats.edges, stats.overruns);
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

pub mod capture;
pub mod capture_replay;
pub mod decoder;
pub mod line_sample;
pub mod sample_channel;
pub mod sniffer;
pub mod sniffer_config;
pub mod transcript;

// Re-export the main types for convenience
pub use line_sample::{LineSample, PinMap};

pub use sample_channel::{
    sample_channel, ChannelError, PushOutcome, SampleConsumer, SampleProducer, DEFAULT_CAPACITY,
};

pub use capture::{EdgeCapture, PinChangeDetector, PinGroup};

pub use capture_replay::{CaptureReplay, ReplayError, ReplayStats};

pub use decoder::{Decoder, DecoderState, Event, Events, ProtocolError};

pub use transcript::{SerialSink, TranscriptError, TranscriptSink, WriterSink};

pub use sniffer::{Sniffer, SnifferError};

pub use sniffer_config::{ConfigError, SnifferConfig, SnifferConfigBuilder, TranscriptMode};
