//! Measurement persistence
//!
//! The decode path only ever sees the `PersistenceSink` trait. The CSV
//! writer and the channel-backed decoupling live here so slow storage
//! never stalls acquisition.

use crate::error::{Error, Result};
use crate::protocol::MeasurementSample;
use chrono::{DateTime, Local};
use crossbeam_channel::{bounded, Sender, TrySendError};
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;
use std::thread::{self, JoinHandle};
use std::time::{Duration, UNIX_EPOCH};

/// Append-only sample sink
///
/// `record` must not block the decode path for long; buffering is the
/// sink's responsibility.
pub trait PersistenceSink: Send {
    fn record(&mut self, sample: &MeasurementSample) -> Result<()>;

    /// Flush buffered samples (best-effort)
    fn flush(&mut self) -> Result<()> {
        Ok(())
    }
}

/// CSV sink writing `timestamp,datetime,distance_mm,raw_hex` rows
pub struct CsvSink {
    writer: BufWriter<File>,
    rows_since_flush: u32,
    flush_every: u32,
}

impl CsvSink {
    /// Create the file and write the header row
    pub fn create<P: AsRef<Path>>(path: P) -> Result<Self> {
        let file = File::create(&path)?;
        let mut writer = BufWriter::new(file);
        writeln!(writer, "timestamp,datetime,distance_mm,raw_hex")?;
        writer.flush()?;

        log::info!("csv sink: writing to {}", path.as_ref().display());

        Ok(CsvSink {
            writer,
            rows_since_flush: 0,
            flush_every: 100,
        })
    }
}

impl PersistenceSink for CsvSink {
    fn record(&mut self, sample: &MeasurementSample) -> Result<()> {
        let unix = sample
            .captured_at
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default();
        let local: DateTime<Local> = sample.captured_at.into();
        let raw = sample.raw_frame;

        writeln!(
            self.writer,
            "{}.{:06},{},{:.3},{:02x}{:02x}{:02x}{:02x}",
            unix.as_secs(),
            unix.subsec_micros(),
            local.format("%Y-%m-%d %H:%M:%S%.3f"),
            sample.distance_mm,
            raw[0],
            raw[1],
            raw[2],
            raw[3]
        )?;

        self.rows_since_flush += 1;
        if self.rows_since_flush >= self.flush_every {
            self.flush()?;
        }
        Ok(())
    }

    fn flush(&mut self) -> Result<()> {
        self.writer.flush()?;
        self.rows_since_flush = 0;
        Ok(())
    }
}

/// In-memory sink for tests
#[derive(Default)]
pub struct MemorySink {
    pub samples: Vec<MeasurementSample>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }
}

impl PersistenceSink for MemorySink {
    fn record(&mut self, sample: &MeasurementSample) -> Result<()> {
        self.samples.push(*sample);
        Ok(())
    }
}

/// Channel-backed sink front-end
///
/// Hands samples to a dedicated writer thread. A full channel drops the
/// sample and counts it rather than blocking acquisition.
pub struct ChannelSink {
    tx: Sender<MeasurementSample>,
    dropped: u64,
}

impl ChannelSink {
    /// Samples dropped because the writer could not keep up
    pub fn dropped(&self) -> u64 {
        self.dropped
    }
}

impl PersistenceSink for ChannelSink {
    fn record(&mut self, sample: &MeasurementSample) -> Result<()> {
        match self.tx.try_send(*sample) {
            Ok(()) => Ok(()),
            Err(TrySendError::Full(_)) => {
                self.dropped += 1;
                if self.dropped == 1 || self.dropped % 1000 == 0 {
                    log::warn!("sink channel full, {} samples dropped so far", self.dropped);
                }
                Ok(())
            }
            Err(TrySendError::Disconnected(_)) => {
                Err(Error::Other("sink writer thread is gone".into()))
            }
        }
    }
}

/// Handle over the background writer thread
pub struct SinkWriter {
    handle: JoinHandle<()>,
}

impl SinkWriter {
    /// Wait for the writer to drain and exit
    ///
    /// The writer exits once the `ChannelSink` front-end has been dropped.
    pub fn join(self) {
        if self.handle.join().is_err() {
            log::error!("sink writer thread panicked");
        }
    }
}

/// Spawn a writer thread that drains samples into `inner`
///
/// Returns the channel front-end to record into and a handle to join the
/// writer after the front-end is dropped. The writer flushes `inner`
/// whenever the channel goes quiet.
pub fn spawn_writer<S: PersistenceSink + 'static>(
    mut inner: S,
    capacity: usize,
) -> Result<(ChannelSink, SinkWriter)> {
    let (tx, rx) = bounded::<MeasurementSample>(capacity);

    let handle = thread::Builder::new()
        .name("sink-writer".to_string())
        .spawn(move || {
            loop {
                match rx.recv_timeout(Duration::from_millis(500)) {
                    Ok(sample) => {
                        if let Err(e) = inner.record(&sample) {
                            log::error!("sink writer: record failed: {}", e);
                        }
                    }
                    Err(crossbeam_channel::RecvTimeoutError::Timeout) => {
                        let _ = inner.flush();
                    }
                    Err(crossbeam_channel::RecvTimeoutError::Disconnected) => break,
                }
            }
            let _ = inner.flush();
            log::debug!("sink writer exiting");
        })
        .map_err(|e| Error::Other(format!("failed to spawn sink writer: {}", e)))?;

    Ok((ChannelSink { tx, dropped: 0 }, SinkWriter { handle }))
}
