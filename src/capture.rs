//! Capture side of the pipeline: what runs when a monitored pin changes.
//!
//! `EdgeCapture::on_edge` is the whole interrupt handler: one read of the
//! I/O group, one push. It does not log, allocate or wait.

use crate::line_sample::{LineSample, PinMap};
use crate::sample_channel::{PushOutcome, SampleProducer};
use std::sync::atomic::{AtomicU16, Ordering};

/// An I/O group (port) holding both bus lines.
pub trait PinGroup {
    /// Current level of every pin in the group, read in one access.
    fn read(&self) -> u16;
}

impl PinGroup for AtomicU16 {
    fn read(&self) -> u16 {
        self.load(Ordering::Acquire)
    }
}

/// Producer end of the sniffer, owned by the edge interrupt.
pub struct EdgeCapture {
    producer: SampleProducer,
    pins: PinMap,
}

impl EdgeCapture {
    pub fn new(producer: SampleProducer, pins: PinMap) -> Self {
        Self { producer, pins }
    }

    pub fn pins(&self) -> PinMap {
        self.pins
    }

    /// Interrupt body: snapshot the group and hand the sample to the decoder.
    #[inline]
    pub fn on_edge<G: PinGroup + ?Sized>(&mut self, group: &G) -> PushOutcome {
        self.on_snapshot(group.read())
    }

    /// Same as [`on_edge`](Self::on_edge) for a snapshot taken elsewhere.
    #[inline]
    pub fn on_snapshot(&mut self, port: u16) -> PushOutcome {
        self.producer.push(self.pins.sample(port))
    }

    pub fn push_sample(&mut self, sample: LineSample) -> PushOutcome {
        self.producer.push(sample)
    }
}

/// Turns a fixed-rate stream of port snapshots into pin-change events, the
/// way a pin-change interrupt fires only when a masked pin toggles.
#[derive(Debug, Clone)]
pub struct PinChangeDetector {
    mask: u16,
    last: Option<u16>,
}

impl PinChangeDetector {
    pub fn new(pins: PinMap) -> Self {
        Self {
            mask: pins.mask(),
            last: None,
        }
    }

    /// Returns `true` if a monitored pin differs from the previous snapshot.
    /// The first snapshot only establishes the reference levels.
    pub fn changed(&mut self, port: u16) -> bool {
        let levels = port & self.mask;
        match self.last.replace(levels) {
            Some(previous) => previous != levels,
            None => false,
        }
    }
}
