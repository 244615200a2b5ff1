//! Decode loop: drains the sample channel, runs the decoder and writes the
//! transcript. It is the only owner of the decoder state.

use crate::capture::EdgeCapture;
use crate::decoder::Decoder;
use crate::line_sample::LineSample;
use crate::sample_channel::{sample_channel, ChannelError, SampleConsumer};
use crate::sniffer_config::{SnifferConfig, TranscriptMode};
use crate::transcript::{TranscriptError, TranscriptSink};
use std::fmt::Write as _;
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::trace;

pub const BANNER: &str = "I2C Sniffer";

#[derive(Debug, thiserror::Error)]
pub enum SnifferError {
    #[error("Transcript error: {0}")]
    Transcript(#[from] TranscriptError),

    #[error("Channel error: {0}")]
    Channel(#[from] ChannelError),
}

pub struct Sniffer<S: TranscriptSink> {
    consumer: SampleConsumer,
    decoder: Decoder,
    sink: S,
    mode: TranscriptMode,
    banner: bool,
    reported_overruns: u32,
    samples: u64,
    line: String,
}

impl<S: TranscriptSink> Sniffer<S> {
    pub fn new(consumer: SampleConsumer, sink: S, mode: TranscriptMode) -> Self {
        Self {
            consumer,
            decoder: Decoder::new(),
            sink,
            mode,
            banner: false,
            reported_overruns: 0,
            samples: 0,
            line: String::new(),
        }
    }

    /// Create the sample channel described by `config` and return both
    /// ends of the pipeline: the capture half for the edge interrupt and
    /// the decode loop.
    pub fn build(config: &SnifferConfig, sink: S) -> Result<(EdgeCapture, Self), SnifferError> {
        let (producer, consumer) = sample_channel(config.capacity)?;
        let mut sniffer = Self::new(consumer, sink, config.mode);
        sniffer.banner = config.banner;
        Ok((EdgeCapture::new(producer, config.pins), sniffer))
    }

    /// Write the start-up banner if the configuration asks for one.
    pub fn announce(&mut self) -> Result<(), SnifferError> {
        if self.banner {
            self.sink.write_line(BANNER)?;
        }
        Ok(())
    }

    /// Decode at most one sample. Returns `false` if the channel was empty.
    pub fn poll(&mut self) -> Result<bool, SnifferError> {
        self.report_overruns()?;

        let Some(sample) = self.consumer.try_pop() else {
            return Ok(false);
        };
        self.samples += 1;
        trace!(%sample, "sample");

        match self.mode {
            TranscriptMode::Events => {
                for event in self.decoder.feed(sample) {
                    self.line.clear();
                    let _ = write!(self.line, "{event}");
                    self.sink.write_line(&self.line)?;
                }
            }
            TranscriptMode::Trace => self.trace_sample(sample)?,
        }
        Ok(true)
    }

    fn trace_sample(&mut self, sample: LineSample) -> Result<(), SnifferError> {
        self.line.clear();
        let _ = write!(self.line, "{sample}");
        if self.decoder.is_clock_rising(sample) {
            self.line.push_str(" bit");
        }
        for event in self.decoder.feed(sample) {
            let _ = write!(self.line, " {event}");
        }
        self.sink.write_line(&self.line)?;
        Ok(())
    }

    fn report_overruns(&mut self) -> Result<(), SnifferError> {
        let overruns = self.consumer.overruns();
        if overruns != self.reported_overruns {
            log::warn!(
                "Sample channel overrun: {} samples dropped in total",
                overruns
            );
            self.reported_overruns = overruns;
            self.line.clear();
            let _ = write!(self.line, "OVERRUN {overruns}");
            self.sink.write_line(&self.line)?;
        }
        Ok(())
    }

    /// Decode everything currently queued. Returns the number of samples.
    pub fn drain(&mut self) -> Result<usize, SnifferError> {
        let mut count = 0;
        while self.poll()? {
            count += 1;
        }
        Ok(count)
    }

    /// Decode until power-off. Only returns on a transcript error.
    pub fn run(mut self) -> Result<(), SnifferError> {
        self.announce()?;
        loop {
            if !self.poll()? {
                std::hint::spin_loop();
            }
        }
    }

    /// Decode until `stop` is set and the channel has been drained, then
    /// flush the sink. Returns the number of samples decoded in this call.
    pub fn run_until(&mut self, stop: &AtomicBool) -> Result<u64, SnifferError> {
        let start = self.samples;
        loop {
            if self.poll()? {
                continue;
            }
            if stop.load(Ordering::Acquire) {
                // The producer may have pushed between our last poll and the flag
                self.drain()?;
                break;
            }
            std::hint::spin_loop();
        }
        self.sink.flush()?;
        Ok(self.samples - start)
    }

    /// Samples decoded since start.
    pub fn samples(&self) -> u64 {
        self.samples
    }

    pub fn decoder(&self) -> &Decoder {
        &self.decoder
    }

    pub fn sink(&self) -> &S {
        &self.sink
    }

    pub fn into_sink(self) -> S {
        self.sink
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capture_replay::CaptureReplay;
    use crate::transcript::WriterSink;
    use std::sync::Arc;
    use std::thread;

    type TestSniffer = Sniffer<WriterSink<Vec<u8>>>;

    fn pipeline(config: &SnifferConfig) -> (EdgeCapture, TestSniffer) {
        Sniffer::build(config, WriterSink::new(Vec::new())).unwrap()
    }

    fn transcript(sniffer: TestSniffer) -> String {
        String::from_utf8(sniffer.into_sink().into_inner()).unwrap()
    }

    fn quiet() -> SnifferConfig {
        SnifferConfig::builder().banner(false).build().unwrap()
    }

    fn push_all(capture: &mut EdgeCapture, samples: &[(u8, u8)]) {
        for &(clock, data) in samples {
            capture.push_sample(LineSample::new(clock == 1, data == 1));
        }
    }

    /// Port snapshots (bit 0 SCL, bit 1 SDA) for a write of `bytes` with the
    /// given acknowledge levels, framed by START and STOP.
    fn transfer(bytes: &[(u8, bool)]) -> Vec<u16> {
        let port = |clock: bool, data: bool| u16::from(clock) | (u16::from(data) << 1);
        let mut snapshots = vec![port(true, true), port(true, false), port(false, false)];
        let mut data = false;
        let mut clock_bit = |snapshots: &mut Vec<u16>, bit: bool| {
            if bit != data {
                snapshots.push(port(false, bit));
                data = bit;
            }
            snapshots.push(port(true, bit));
            snapshots.push(port(false, bit));
        };
        for &(byte, nak) in bytes {
            for i in (0..8).rev() {
                clock_bit(&mut snapshots, (byte >> i) & 1 == 1);
            }
            clock_bit(&mut snapshots, nak);
        }
        clock_bit(&mut snapshots, false);
        // STOP: clock up with data low, then data up
        snapshots.pop();
        snapshots.push(port(true, true));
        snapshots
    }

    #[test]
    fn test_event_transcript_lines() {
        let (mut capture, mut sniffer) = pipeline(&quiet());
        // START, bits 1,0,1,0,1,0,1,1, ACK, STOP
        let replay = CaptureReplay::from_snapshots(transfer(&[(0xAB, false)])).unwrap();
        replay.play(&mut capture);
        sniffer.drain().unwrap();

        assert_eq!(transcript(sniffer), "START\r\nAB\r\nACK\r\nSTOP\r\n");
    }

    #[test]
    fn test_golden_trace_transcript() {
        let (mut capture, mut sniffer) = pipeline(&quiet());
        push_all(
            &mut capture,
            &[(1, 1), (1, 1), (1, 0), (0, 0), (0, 1), (1, 1), (0, 1), (0, 0), (1, 0), (1, 1)],
        );
        assert_eq!(sniffer.drain().unwrap(), 10);
        assert_eq!(sniffer.decoder().state().bit_count, 0);
        assert_eq!(transcript(sniffer), "START\r\nSTOP\r\n");
    }

    #[test]
    fn test_trace_mode_prints_every_sample() {
        let config = SnifferConfig::builder().banner(false).trace().build().unwrap();
        let (mut capture, mut sniffer) = pipeline(&config);
        push_all(&mut capture, &[(1, 0), (0, 0), (0, 1), (1, 1), (0, 1), (1, 1), (0, 0)]);
        sniffer.drain().unwrap();

        assert_eq!(
            transcript(sniffer),
            "10 START\r\n00\r\n01\r\n11 bit\r\n01\r\n11 bit\r\n00 SIM 00 simultaneous line change\r\n"
        );
    }

    #[test]
    fn test_banner_and_overrun_are_reported() {
        let config = SnifferConfig::builder().capacity(2).build().unwrap();
        let (mut capture, mut sniffer) = pipeline(&config);
        sniffer.announce().unwrap();
        push_all(&mut capture, &[(1, 0), (0, 0), (0, 1), (1, 1)]);
        sniffer.drain().unwrap();

        assert_eq!(transcript(sniffer), "I2C Sniffer\r\nOVERRUN 2\r\nSTART\r\n");
    }

    #[test]
    fn test_multi_byte_transfer_with_nak() {
        let (mut capture, mut sniffer) = pipeline(&quiet());
        let snapshots = transfer(&[(0xD0, false), (0x6B, false), (0x80, true)]);
        let replay = CaptureReplay::from_snapshots(snapshots).unwrap();
        assert_eq!(replay.play(&mut capture).overruns, 0);
        sniffer.drain().unwrap();

        assert_eq!(
            transcript(sniffer),
            "START\r\nD0\r\nACK\r\n6B\r\nACK\r\n80\r\nNAK\r\nSTOP\r\n"
        );
    }

    #[test]
    fn test_run_until_with_capture_thread() {
        let config = SnifferConfig::builder()
            .banner(false)
            .capacity(4096)
            .build()
            .unwrap();
        let (mut capture, mut sniffer) = pipeline(&config);
        let stop = Arc::new(AtomicBool::new(false));

        let bytes: Vec<(u8, bool)> = (0..=40u8).map(|b| (b.wrapping_mul(37), false)).collect();
        let replay = CaptureReplay::from_snapshots(transfer(&bytes)).unwrap();

        let producer_stop = Arc::clone(&stop);
        let handle = thread::spawn(move || {
            let stats = replay.play(&mut capture);
            producer_stop.store(true, Ordering::Release);
            stats
        });

        let decoded = sniffer.run_until(&stop).unwrap();
        let stats = handle.join().unwrap();
        assert_eq!(stats.overruns, 0);
        assert_eq!(decoded, stats.edges as u64);

        let mut expected = String::from("START\r\n");
        for (byte, _) in &bytes {
            expected.push_str(&format!("{byte:02X}\r\nACK\r\n"));
        }
        expected.push_str("STOP\r\n");
        assert_eq!(transcript(sniffer), expected);
    }
}
