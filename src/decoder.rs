//! I2C framing decoder
//!
//! A state machine fed one line sample at a time. Every sample is compared to
//! the previous one:
//!
//! 1. both lines changed at once → protocol violation, bit accumulation restarts
//! 2. clock rose → data is stable: shift in a data bit, or read ACK/NAK after
//!    eight bits
//! 3. data changed while clock stayed high → START (falling) or STOP (rising)
//!
//! Clock falling edges carry no information. There is no idle state: when
//! decoding starts in the middle of a transfer the first bits may land in a
//! partial byte until the next START/STOP realigns the decoder.

use crate::line_sample::LineSample;
use std::fmt;
use tracing::trace;

/// Data bits per byte; the next clock pulse carries the acknowledge bit.
pub const BITS_PER_BYTE: u8 = 8;

/// Bus condition that does not fit the framing rules.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProtocolError {
    /// Clock and data changed between two consecutive samples, so the order
    /// of the two edges is unknown. Carries the levels observed afterwards.
    SimultaneousLineChange { clock: bool, data: bool },
}

impl fmt::Display for ProtocolError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Self::SimultaneousLineChange { clock, data } => write!(
                f,
                "SIM {}{} simultaneous line change",
                u8::from(*clock),
                u8::from(*data)
            ),
        }
    }
}

/// Protocol event reconstructed from the line samples.
///
/// `Display` renders the transcript line (without line terminator).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Event {
    Start,
    Stop,
    Byte(u8),
    Ack,
    Nak,
    Error(ProtocolError),
}

impl fmt::Display for Event {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Self::Start => f.write_str("START"),
            Self::Stop => f.write_str("STOP"),
            Self::Byte(value) => write!(f, "{value:02X}"),
            Self::Ack => f.write_str("ACK"),
            Self::Nak => f.write_str("NAK"),
            Self::Error(error) => error.fmt(f),
        }
    }
}

/// Events produced by a single sample. At most two: a violation followed by
/// whatever the rising clock edge on the same sample completed.
#[derive(Debug, Clone, Default)]
pub struct Events {
    slots: [Option<Event>; 2],
    next: usize,
}

impl Events {
    fn push(&mut self, event: Event) {
        if let Some(slot) = self.slots.iter_mut().find(|slot| slot.is_none()) {
            *slot = Some(event);
        }
    }
}

impl Iterator for Events {
    type Item = Event;

    fn next(&mut self) -> Option<Event> {
        let event = self.slots.get_mut(self.next)?.take()?;
        self.next += 1;
        Some(event)
    }
}

/// Everything the decoder remembers between samples.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DecoderState {
    /// Clock level of the previous sample.
    pub last_clock: bool,
    /// Data level of the previous sample.
    pub last_data: bool,
    /// Data bits collected since the last START, STOP or acknowledge.
    pub bit_count: u8,
    /// Collected bits, most significant first.
    pub shift_register: u8,
}

impl DecoderState {
    fn reset_bits(&mut self) {
        self.bit_count = 0;
        self.shift_register = 0;
    }
}

impl Default for DecoderState {
    fn default() -> Self {
        Self {
            last_clock: true,
            last_data: true,
            bit_count: 0,
            shift_register: 0,
        }
    }
}

#[derive(Debug, Default)]
pub struct Decoder {
    state: DecoderState,
}

impl Decoder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> &DecoderState {
        &self.state
    }

    /// Whether `sample` is a rising clock edge relative to the last one seen.
    pub fn is_clock_rising(&self, sample: LineSample) -> bool {
        sample.clock && !self.state.last_clock
    }

    /// Advance the state machine by one sample.
    pub fn feed(&mut self, sample: LineSample) -> Events {
        let mut events = Events::default();
        let state = &mut self.state;

        let clock_changed = sample.clock != state.last_clock;
        let data_changed = sample.data != state.last_data;
        let simultaneous = clock_changed && data_changed;

        if simultaneous {
            events.push(Event::Error(ProtocolError::SimultaneousLineChange {
                clock: sample.clock,
                data: sample.data,
            }));
        }

        if sample.clock && !state.last_clock {
            if state.bit_count < BITS_PER_BYTE {
                state.shift_register = (state.shift_register << 1) | u8::from(sample.data);
                state.bit_count += 1;
                trace!(bit = state.bit_count, data = sample.data, "data bit");
                if state.bit_count == BITS_PER_BYTE {
                    events.push(Event::Byte(state.shift_register));
                }
            } else {
                events.push(if sample.data { Event::Nak } else { Event::Ack });
                state.reset_bits();
            }
        } else if sample.clock && data_changed {
            events.push(if sample.data { Event::Stop } else { Event::Start });
            state.reset_bits();
        }

        // The ambiguous bit must not open the next byte
        if simultaneous {
            state.reset_bits();
        }

        state.last_clock = sample.clock;
        state.last_data = sample.data;
        events
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn s(clock: u8, data: u8) -> LineSample {
        LineSample::new(clock == 1, data == 1)
    }

    fn run(decoder: &mut Decoder, samples: &[LineSample]) -> Vec<Event> {
        samples.iter().flat_map(|&sample| decoder.feed(sample)).collect()
    }

    /// Samples for START followed by a clock pulse per bit
    /// (data set while clock low, clock up, clock down).
    fn start_and_bits(bits: &[u8]) -> Vec<LineSample> {
        let mut samples = vec![s(1, 1), s(1, 0), s(0, 0)];
        samples.extend(clock_bits(bits, 0));
        samples
    }

    fn clock_bits(bits: &[u8], mut data: u8) -> Vec<LineSample> {
        let mut samples = Vec::new();
        for &bit in bits {
            if bit != data {
                samples.push(s(0, bit));
                data = bit;
            }
            samples.push(s(1, bit));
            samples.push(s(0, bit));
        }
        samples
    }

    #[test]
    fn test_initial_state_is_idle_bus() {
        let decoder = Decoder::new();
        assert_eq!(
            *decoder.state(),
            DecoderState {
                last_clock: true,
                last_data: true,
                bit_count: 0,
                shift_register: 0,
            }
        );
    }

    #[test]
    fn test_start_and_stop_conditions() {
        let mut decoder = Decoder::new();
        assert_eq!(run(&mut decoder, &[s(1, 1), s(1, 0)]), vec![Event::Start]);
        assert_eq!(run(&mut decoder, &[s(1, 1)]), vec![Event::Stop]);
    }

    #[test]
    fn test_byte_is_msb_first() {
        let mut decoder = Decoder::new();
        let events = run(&mut decoder, &start_and_bits(&[1, 0, 1, 0, 1, 0, 1, 1]));
        assert_eq!(events, vec![Event::Start, Event::Byte(0xAB)]);
        assert_eq!(decoder.state().bit_count, BITS_PER_BYTE);
    }

    #[test]
    fn test_ack_and_nak_follow_byte() {
        let mut decoder = Decoder::new();
        let mut samples = start_and_bits(&[0, 0, 1, 1, 1, 1, 1, 1]);
        samples.extend(clock_bits(&[0], 1));
        assert_eq!(
            run(&mut decoder, &samples),
            vec![Event::Start, Event::Byte(0x3F), Event::Ack]
        );
        assert_eq!(decoder.state().bit_count, 0);

        let mut samples = clock_bits(&[1, 1, 1, 1, 0, 0, 0, 0], 0);
        samples.extend(clock_bits(&[1], 0));
        assert_eq!(
            run(&mut decoder, &samples),
            vec![Event::Byte(0xF0), Event::Nak]
        );
    }

    #[test]
    fn test_repeated_start_restarts_byte() {
        let mut decoder = Decoder::new();
        let mut samples = start_and_bits(&[1, 1, 1]);
        // Back to clock high with data high, then repeated START
        samples.extend([s(0, 1), s(1, 1), s(1, 0), s(0, 0)]);
        samples.extend(clock_bits(&[0, 1, 0, 1, 0, 1, 0, 1], 0));

        let events = run(&mut decoder, &samples);
        assert_eq!(
            events,
            vec![Event::Start, Event::Start, Event::Byte(0x55)]
        );
    }

    #[test]
    fn test_clock_falling_edge_is_silent() {
        let mut decoder = Decoder::new();
        assert!(run(&mut decoder, &[s(0, 1), s(0, 0), s(0, 1)]).is_empty());
        assert_eq!(decoder.state().bit_count, 0);
    }

    #[test]
    fn test_duplicate_samples_are_silent() {
        let mut decoder = Decoder::new();
        assert!(run(&mut decoder, &[s(1, 1), s(1, 1), s(1, 1)]).is_empty());
    }

    #[test]
    fn test_simultaneous_change_reports_and_resets() {
        let mut decoder = Decoder::new();
        let mut samples = start_and_bits(&[1, 0, 1]);
        // Clock rises while data falls
        samples.push(s(1, 0));
        let events = run(&mut decoder, &samples);
        assert_eq!(
            events,
            vec![
                Event::Start,
                Event::Error(ProtocolError::SimultaneousLineChange {
                    clock: true,
                    data: false
                }),
            ]
        );
        assert_eq!(decoder.state().bit_count, 0);

        // Following bits form a fresh byte
        let mut samples = vec![s(0, 0)];
        samples.extend(clock_bits(&[1, 1, 0, 0, 1, 1, 0, 0], 0));
        let events = run(&mut decoder, &samples);
        assert_eq!(events, vec![Event::Byte(0xCC)]);
    }

    #[test]
    fn test_simultaneous_change_on_last_bit_emits_two_events() {
        let mut decoder = Decoder::new();
        let mut samples = start_and_bits(&[0, 0, 0, 0, 0, 0, 0]);
        samples.push(s(1, 1));
        let events = run(&mut decoder, &samples);
        assert_eq!(
            events,
            vec![
                Event::Start,
                Event::Error(ProtocolError::SimultaneousLineChange {
                    clock: true,
                    data: true
                }),
                Event::Byte(0x01),
            ]
        );
        assert_eq!(decoder.state().bit_count, 0);
    }

    #[test]
    fn test_repeated_stops_are_idempotent() {
        let mut decoder = Decoder::new();
        let samples = [s(1, 0), s(1, 1), s(1, 0), s(1, 1), s(1, 1), s(1, 1)];
        let events = run(&mut decoder, &samples);
        assert!(events
            .iter()
            .all(|e| matches!(e, Event::Start | Event::Stop)));
        assert_eq!(events.iter().filter(|e| **e == Event::Stop).count(), 2);
    }

    #[test]
    fn test_golden_trace() {
        let samples = [
            s(1, 1),
            s(1, 1),
            s(1, 0),
            s(0, 0),
            s(0, 1),
            s(1, 1),
            s(0, 1),
            s(0, 0),
            s(1, 0),
            s(1, 1),
        ];
        let mut decoder = Decoder::new();
        let events = run(&mut decoder, &samples);
        assert_eq!(events, vec![Event::Start, Event::Stop]);
        assert_eq!(decoder.state().bit_count, 0);
    }

    #[test]
    fn test_mid_transaction_start_resyncs() {
        let mut decoder = Decoder::new();
        // Power-up with clock low in the middle of a byte: three stray bits
        let mut samples = vec![s(0, 1), s(0, 0)];
        samples.extend(clock_bits(&[1, 0, 1], 0));
        samples.push(s(0, 1));
        samples.push(s(1, 1));
        assert!(run(&mut decoder, &samples).is_empty());
        assert_eq!(decoder.state().bit_count, 4);

        let events = run(&mut decoder, &start_and_bits(&[1, 0, 0, 1, 0, 0, 0, 0])[1..]);
        assert_eq!(events, vec![Event::Start, Event::Byte(0x90)]);
    }

    #[test]
    fn test_event_lines() {
        assert_eq!(Event::Byte(0x3F).to_string(), "3F");
        assert_eq!(Event::Byte(0x0a).to_string(), "0A");
        assert_eq!(Event::Ack.to_string(), "ACK");
        assert_eq!(Event::Nak.to_string(), "NAK");
        assert_eq!(Event::Start.to_string(), "START");
        assert_eq!(Event::Stop.to_string(), "STOP");
        assert_eq!(
            Event::Error(ProtocolError::SimultaneousLineChange {
                clock: false,
                data: true
            })
            .to_string(),
            "SIM 01 simultaneous line change"
        );
    }
}
