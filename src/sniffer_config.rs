use crate::line_sample::{PinMap, MAX_PIN};
use crate::sample_channel::DEFAULT_CAPACITY;

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Pin {0} out of range, must be between 0 and {max}", max = MAX_PIN)]
    PinOutOfRange(u8),

    #[error("Clock and data cannot share pin {0}")]
    SamePin(u8),

    #[error("Channel capacity must be a non-zero power of two, got {0}")]
    InvalidCapacity(usize),
}

/// What the decode loop writes for each sample.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TranscriptMode {
    /// One line per decoded event.
    #[default]
    Events,
    /// One line per sample: line levels, `bit` on a rising clock, then any
    /// events the sample produced.
    Trace,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SnifferConfig {
    pub pins: PinMap,
    pub capacity: usize,
    pub mode: TranscriptMode,
    pub banner: bool,
}

impl SnifferConfig {
    pub fn builder() -> SnifferConfigBuilder {
        SnifferConfigBuilder::new()
    }
}

impl Default for SnifferConfig {
    fn default() -> Self {
        Self {
            pins: PinMap::default(),
            capacity: DEFAULT_CAPACITY,
            mode: TranscriptMode::Events,
            banner: true,
        }
    }
}

#[derive(Debug)]
pub struct SnifferConfigBuilder {
    scl: u8,
    sda: u8,
    capacity: usize,
    mode: TranscriptMode,
    banner: bool,
}

impl SnifferConfigBuilder {
    pub fn new() -> Self {
        let defaults = SnifferConfig::default();
        Self {
            scl: defaults.pins.scl(),
            sda: defaults.pins.sda(),
            capacity: defaults.capacity,
            mode: defaults.mode,
            banner: defaults.banner,
        }
    }

    /// Bit of the monitored port carrying the clock line.
    pub fn scl_pin(mut self, pin: u8) -> Self {
        self.scl = pin;
        self
    }

    /// Bit of the monitored port carrying the data line.
    pub fn sda_pin(mut self, pin: u8) -> Self {
        self.sda = pin;
        self
    }

    pub fn capacity(mut self, capacity: usize) -> Self {
        self.capacity = capacity;
        self
    }

    pub fn mode(mut self, mode: TranscriptMode) -> Self {
        self.mode = mode;
        self
    }

    /// Shorthand for `mode(TranscriptMode::Trace)`.
    pub fn trace(self) -> Self {
        self.mode(TranscriptMode::Trace)
    }

    pub fn banner(mut self, banner: bool) -> Self {
        self.banner = banner;
        self
    }

    pub fn build(self) -> Result<SnifferConfig, ConfigError> {
        for pin in [self.scl, self.sda] {
            if pin > MAX_PIN {
                return Err(ConfigError::PinOutOfRange(pin));
            }
        }
        if self.scl == self.sda {
            return Err(ConfigError::SamePin(self.scl));
        }
        if !self.capacity.is_power_of_two() {
            return Err(ConfigError::InvalidCapacity(self.capacity));
        }

        Ok(SnifferConfig {
            pins: PinMap::new(self.scl, self.sda),
            capacity: self.capacity,
            mode: self.mode,
            banner: self.banner,
        })
    }
}

impl Default for SnifferConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}
