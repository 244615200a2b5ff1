//! Lock-free single-producer/single-consumer channel carrying line samples
//! from the capture context to the decode loop.
//!
//! Both cursors run freely and are reduced modulo the capacity (a power of
//! two) when indexing, so `write - read` is always the occupancy and the
//! whole capacity is usable.
//!
//! Overrun policy: when the channel is full the newest sample is dropped and
//! an overrun counter is incremented. The producer never touches the read
//! cursor, so a full channel cannot disturb samples the consumer has yet to
//! take.

use crate::line_sample::LineSample;
use std::sync::atomic::{AtomicU32, AtomicU8, AtomicUsize, Ordering};
use std::sync::Arc;

/// Capacity used by the sniffer unless configured otherwise.
pub const DEFAULT_CAPACITY: usize = 256;

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ChannelError {
    #[error("Channel capacity must be a non-zero power of two, got {0}")]
    InvalidCapacity(usize),
}

/// Result of handing a sample to the channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PushOutcome {
    Stored,
    /// Channel was full; the sample was dropped and counted.
    Overrun,
}

struct Shared {
    slots: Box<[AtomicU8]>,
    mask: usize,
    write: AtomicUsize,
    read: AtomicUsize,
    overruns: AtomicU32,
}

impl Shared {
    fn occupancy(&self) -> usize {
        let write = self.write.load(Ordering::Acquire);
        let read = self.read.load(Ordering::Acquire);
        write.wrapping_sub(read)
    }
}

/// Create a channel and split it into its two ends.
pub fn sample_channel(
    capacity: usize,
) -> Result<(SampleProducer, SampleConsumer), ChannelError> {
    if !capacity.is_power_of_two() {
        return Err(ChannelError::InvalidCapacity(capacity));
    }

    let slots: Vec<AtomicU8> = (0..capacity)
        .map(|_| AtomicU8::new(LineSample::IDLE.bits()))
        .collect();
    let shared = Arc::new(Shared {
        slots: slots.into_boxed_slice(),
        mask: capacity - 1,
        write: AtomicUsize::new(0),
        read: AtomicUsize::new(0),
        overruns: AtomicU32::new(0),
    });

    Ok((
        SampleProducer {
            shared: Arc::clone(&shared),
        },
        SampleConsumer { shared },
    ))
}

/// Writing end, held by the capture context.
pub struct SampleProducer {
    shared: Arc<Shared>,
}

impl SampleProducer {
    /// Append a sample. Never blocks and never allocates.
    #[inline]
    pub fn push(&self, sample: LineSample) -> PushOutcome {
        let shared = &*self.shared;
        let write = shared.write.load(Ordering::Relaxed);
        // Acquire pairs with the consumer's release of `read`: the slot we
        // are about to reuse has been read before we overwrite it.
        let read = shared.read.load(Ordering::Acquire);

        if write.wrapping_sub(read) > shared.mask {
            shared.overruns.fetch_add(1, Ordering::Relaxed);
            return PushOutcome::Overrun;
        }

        shared.slots[write & shared.mask].store(sample.bits(), Ordering::Relaxed);
        // Publish the payload before the cursor advance becomes visible.
        shared.write.store(write.wrapping_add(1), Ordering::Release);
        PushOutcome::Stored
    }

    pub fn capacity(&self) -> usize {
        self.shared.slots.len()
    }
}

/// Reading end, held by the decode loop.
pub struct SampleConsumer {
    shared: Arc<Shared>,
}

impl SampleConsumer {
    /// Take the oldest sample, or `None` if the channel is empty.
    #[inline]
    pub fn try_pop(&mut self) -> Option<LineSample> {
        let shared = &*self.shared;
        let read = shared.read.load(Ordering::Relaxed);
        let write = shared.write.load(Ordering::Acquire);

        if read == write {
            return None;
        }

        let bits = shared.slots[read & shared.mask].load(Ordering::Relaxed);
        shared.read.store(read.wrapping_add(1), Ordering::Release);
        Some(LineSample::from_bits(bits))
    }

    /// Total number of samples dropped because the channel was full.
    pub fn overruns(&self) -> u32 {
        self.shared.overruns.load(Ordering::Relaxed)
    }

    pub fn len(&self) -> usize {
        self.shared.occupancy()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn capacity(&self) -> usize {
        self.shared.slots.len()
    }
}
