use serialport::SerialPort;
use std::io::Write;
use std::time::Duration;

/// Every transcript line ends with CR LF, as on the firmware's UART.
pub const LINE_END: &[u8] = b"\r\n";

/// Line rate of the firmware's UART.
pub const DEFAULT_BAUD_RATE: u32 = 115_200;

#[derive(Debug, thiserror::Error)]
pub enum TranscriptError {
    #[error("Serial port error: {0}")]
    SerialPort(#[from] serialport::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Byte-oriented output receiving the decoded transcript, one line at a time.
pub trait TranscriptSink {
    /// Write `line` followed by the line terminator.
    fn write_line(&mut self, line: &str) -> Result<(), TranscriptError>;

    /// Block until everything written so far has left the sink.
    fn flush(&mut self) -> Result<(), TranscriptError> {
        Ok(())
    }
}

/// Sink over any [`Write`] implementation (stdout, a file, a `Vec<u8>`).
#[derive(Debug)]
pub struct WriterSink<W: Write> {
    inner: W,
}

impl<W: Write> WriterSink<W> {
    pub fn new(inner: W) -> Self {
        Self { inner }
    }

    pub fn get_ref(&self) -> &W {
        &self.inner
    }

    pub fn into_inner(self) -> W {
        self.inner
    }
}

impl<W: Write> TranscriptSink for WriterSink<W> {
    fn write_line(&mut self, line: &str) -> Result<(), TranscriptError> {
        self.inner.write_all(line.as_bytes())?;
        self.inner.write_all(LINE_END)?;
        Ok(())
    }

    fn flush(&mut self) -> Result<(), TranscriptError> {
        self.inner.flush()?;
        Ok(())
    }
}

/// Transcript sent out over a serial port.
pub struct SerialSink {
    serial: Box<dyn SerialPort>,
}

impl SerialSink {
    /// Open `port` at the firmware's default line rate.
    pub fn open(port: &str) -> Result<Self, TranscriptError> {
        Self::with_baud_rate(port, DEFAULT_BAUD_RATE)
    }

    pub fn with_baud_rate(port: &str, baud_rate: u32) -> Result<Self, TranscriptError> {
        log::debug!("Opening transcript port {} at {} baud", port, baud_rate);
        let serial = serialport::new(port, baud_rate)
            .timeout(Duration::from_millis(100))
            .open()?;
        Ok(Self { serial })
    }

    pub fn from_port(serial: Box<dyn SerialPort>) -> Self {
        Self { serial }
    }
}

impl TranscriptSink for SerialSink {
    fn write_line(&mut self, line: &str) -> Result<(), TranscriptError> {
        self.serial.write_all(line.as_bytes())?;
        self.serial.write_all(LINE_END)?;
        Ok(())
    }

    fn flush(&mut self) -> Result<(), TranscriptError> {
        self.serial.flush()?;
        Ok(())
    }
}

impl<T: TranscriptSink + ?Sized> TranscriptSink for &mut T {
    fn write_line(&mut self, line: &str) -> Result<(), TranscriptError> {
        (**self).write_line(line)
    }

    fn flush(&mut self) -> Result<(), TranscriptError> {
        (**self).flush()
    }
}
