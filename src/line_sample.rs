use std::fmt;

/// Highest pin index addressable inside a port snapshot.
pub const MAX_PIN: u8 = 15;

const CLOCK_BIT: u8 = 0b01;
const DATA_BIT: u8 = 0b10;

/// Levels of the clock and data lines at the moment of an edge.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct LineSample {
    pub clock: bool,
    pub data: bool,
}

impl LineSample {
    /// Both lines pulled up, the state of an idle bus.
    pub const IDLE: Self = Self::new(true, true);

    pub const fn new(clock: bool, data: bool) -> Self {
        Self { clock, data }
    }

    /// Pack into the two low bits of a byte (bit 0 clock, bit 1 data).
    ///
    /// This is the representation that crosses the sample channel, so a
    /// sample is always written and read as one byte-wide store.
    pub const fn bits(self) -> u8 {
        let mut bits = 0;
        if self.clock {
            bits |= CLOCK_BIT;
        }
        if self.data {
            bits |= DATA_BIT;
        }
        bits
    }

    pub const fn from_bits(bits: u8) -> Self {
        Self {
            clock: bits & CLOCK_BIT != 0,
            data: bits & DATA_BIT != 0,
        }
    }
}

impl Default for LineSample {
    fn default() -> Self {
        Self::IDLE
    }
}

impl From<(bool, bool)> for LineSample {
    fn from((clock, data): (bool, bool)) -> Self {
        Self::new(clock, data)
    }
}

impl fmt::Display for LineSample {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}{}", u8::from(self.clock), u8::from(self.data))
    }
}

/// Position of the clock (SCL) and data (SDA) lines inside the monitored
/// I/O group.
///
/// Both lines must live in the same group so one read of the group yields a
/// coherent pair of levels.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PinMap {
    scl: u8,
    sda: u8,
}

impl PinMap {
    /// Callers are expected to validate the pins (see `SnifferConfig`).
    pub(crate) const fn new(scl: u8, sda: u8) -> Self {
        Self { scl, sda }
    }

    pub fn scl(&self) -> u8 {
        self.scl
    }

    pub fn sda(&self) -> u8 {
        self.sda
    }

    /// Bits of the port that raise a capture when they change.
    pub fn mask(&self) -> u16 {
        (1 << self.scl) | (1 << self.sda)
    }

    /// Extract both line levels from a single port snapshot.
    #[inline]
    pub fn sample(&self, port: u16) -> LineSample {
        LineSample {
            clock: (port >> self.scl) & 1 == 1,
            data: (port >> self.sda) & 1 == 1,
        }
    }
}

impl Default for PinMap {
    fn default() -> Self {
        Self::new(0, 1)
    }
}
