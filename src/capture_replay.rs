//! Replay of logic-analyzer captures through the capture side.
//!
//! A capture is a headerless CSV with one row per sample period. The port
//! bitmap is the last column: either a `0x`-prefixed hex string (the
//! FleaScope layout, `raw,bitmap`) or a plain integer. Replaying runs each
//! row through a [`PinChangeDetector`] and calls
//! [`EdgeCapture::on_snapshot`] for every row where SCL or SDA toggled,
//! which is what the pin-change interrupt would have done on the real bus.

use crate::capture::{EdgeCapture, PinChangeDetector};
use crate::sample_channel::PushOutcome;
use polars::prelude::*;
use std::path::Path;
use std::time::Duration;

const SINGLE_COLUMN_NAME: &str = "column_1";
const BITMAP_COLUMN_NAME: &str = "column_2";

#[derive(Debug, thiserror::Error)]
pub enum ReplayError {
    #[error("Failed to parse capture: {0}")]
    Polars(#[from] PolarsError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid bitmap '{value}' in row {row}")]
    InvalidBitmap { row: usize, value: String },

    #[error("Capture contains no samples")]
    EmptyCapture,
}

/// Counters from one pass over a capture.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReplayStats {
    /// Rows read from the capture.
    pub snapshots: usize,
    /// Rows where a monitored pin changed.
    pub edges: usize,
    /// Edges dropped because the sample channel was full.
    pub overruns: usize,
}

#[derive(Debug, Clone)]
pub struct CaptureReplay {
    snapshots: Vec<u16>,
}

impl CaptureReplay {
    pub fn from_snapshots(snapshots: Vec<u16>) -> Result<Self, ReplayError> {
        if snapshots.is_empty() {
            return Err(ReplayError::EmptyCapture);
        }
        Ok(Self { snapshots })
    }

    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, ReplayError> {
        let path = path.as_ref();
        let data = std::fs::read(path)?;
        log::debug!("Loaded capture {} ({} bytes)", path.display(), data.len());
        Self::from_csv(&data)
    }

    pub fn from_csv(data: &[u8]) -> Result<Self, ReplayError> {
        let df = CsvReadOptions::default()
            .with_has_header(false)
            .into_reader_with_file_handle(std::io::Cursor::new(data))
            .finish()?;

        let column_name = if df.width() > 1 {
            BITMAP_COLUMN_NAME
        } else {
            SINGLE_COLUMN_NAME
        };
        let bitmap = df.column(column_name)?;

        let snapshots = if bitmap.dtype() == &DataType::String {
            Self::parse_hex(bitmap.str()?)?
        } else {
            let values = bitmap.cast(&DataType::Int64)?;
            Self::parse_integers(values.i64()?)?
        };

        log::debug!("Capture holds {} snapshots", snapshots.len());
        Self::from_snapshots(snapshots)
    }

    fn parse_hex(bitmaps: &StringChunked) -> Result<Vec<u16>, ReplayError> {
        bitmaps
            .into_iter()
            .enumerate()
            .map(|(row, bitmap)| {
                let text = bitmap.unwrap_or_default().trim();
                let digits = text
                    .strip_prefix("0x")
                    .or_else(|| text.strip_prefix("0X"))
                    .unwrap_or(text);
                u16::from_str_radix(digits, 16).map_err(|_| ReplayError::InvalidBitmap {
                    row,
                    value: text.to_string(),
                })
            })
            .collect()
    }

    fn parse_integers(bitmaps: &Int64Chunked) -> Result<Vec<u16>, ReplayError> {
        bitmaps
            .into_iter()
            .enumerate()
            .map(|(row, bitmap)| {
                bitmap
                    .and_then(|value| u16::try_from(value).ok())
                    .ok_or_else(|| ReplayError::InvalidBitmap {
                        row,
                        value: bitmap.map_or_else(|| "null".to_string(), |v| v.to_string()),
                    })
            })
            .collect()
    }

    pub fn snapshots(&self) -> &[u16] {
        &self.snapshots
    }

    /// Feed every edge of the capture to `capture` as fast as possible.
    pub fn play(&self, capture: &mut EdgeCapture) -> ReplayStats {
        self.play_paced(capture, None)
    }

    /// Like [`play`](Self::play), waiting `edge_interval` after each edge so
    /// a decode loop on another thread can keep up.
    pub fn play_paced(
        &self,
        capture: &mut EdgeCapture,
        edge_interval: Option<Duration>,
    ) -> ReplayStats {
        let mut detector = PinChangeDetector::new(capture.pins());
        let mut stats = ReplayStats {
            snapshots: self.snapshots.len(),
            ..ReplayStats::default()
        };

        for &port in &self.snapshots {
            if !detector.changed(port) {
                continue;
            }
            stats.edges += 1;
            if capture.on_snapshot(port) == PushOutcome::Overrun {
                stats.overruns += 1;
            }
            if let Some(interval) = edge_interval {
                std::thread::sleep(interval);
            }
        }

        log::debug!(
            "Replayed {} snapshots: {} edges, {} overruns",
            stats.snapshots,
            stats.edges,
            stats.overruns
        );
        stats
    }
}
