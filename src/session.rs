//! Acquisition session
//!
//! Owns one endpoint and runs its read → reassemble → decode → persist
//! pipeline: Idle → Starting → Streaming → Stopping → Idle, with a
//! terminal Failed phase when the endpoint drops mid-stream.
//!
//! The device never acknowledges commands, so Starting moves to Streaming
//! as soon as the start command is on the wire; silence is not an error.

use crate::error::{Error, Result};
use crate::protocol::{CommandFrame, FrameReassembler, MeasurementDecoder};
use crate::sink::PersistenceSink;
use crate::transport::Transport;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

const READ_CHUNK: usize = 1024;
const BACKOFF_BASE: Duration = Duration::from_millis(10);
const BACKOFF_MAX: Duration = Duration::from_millis(500);

/// Session lifecycle phases
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionPhase {
    Idle,
    Starting,
    Streaming,
    Stopping,
    Failed,
}

/// Acquisition parameters
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Sensor address on the serial bus (0..=127)
    pub address: u8,
    /// Sensor measuring range in millimetres (scales raw values)
    pub range_mm: f64,
    /// Sleep between polls when no bytes are available
    pub poll_interval: Duration,
    /// Minimum gap between decode-noise summaries in the log
    pub diagnostic_window: Duration,
}

impl Default for SessionConfig {
    fn default() -> Self {
        SessionConfig {
            address: 1,
            range_mm: 250.0,
            poll_interval: Duration::from_millis(1),
            diagnostic_window: Duration::from_secs(2),
        }
    }
}

/// Counters accumulated over one run
#[derive(Debug, Default, Clone, Copy)]
pub struct SessionStats {
    pub samples: u64,
    pub resynced_bytes: u64,
    pub dropped_bytes: u64,
}

/// One endpoint's acquisition pipeline
pub struct AcquisitionSession {
    transport: Box<dyn Transport>,
    config: SessionConfig,
    phase: SessionPhase,
    reassembler: FrameReassembler,
    decoder: MeasurementDecoder,
    stats: SessionStats,
}

impl AcquisitionSession {
    /// Create a session over an exclusively owned endpoint
    ///
    /// The address is validated here so command encoding cannot fail
    /// later in the run loop.
    pub fn new<T: Transport + 'static>(transport: T, config: SessionConfig) -> Result<Self> {
        CommandFrame::start_stream(config.address)?;
        let decoder = MeasurementDecoder::new(config.range_mm);
        Ok(AcquisitionSession {
            transport: Box::new(transport),
            config,
            phase: SessionPhase::Idle,
            reassembler: FrameReassembler::new(),
            decoder,
            stats: SessionStats::default(),
        })
    }

    /// Current lifecycle phase
    pub fn phase(&self) -> SessionPhase {
        self.phase
    }

    /// Counters accumulated so far
    pub fn stats(&self) -> SessionStats {
        self.stats
    }

    /// Stream measurements into the sink until the shutdown flag is set
    ///
    /// Returns the run's counters on a clean stop. A send failure while
    /// starting leaves the session Idle; a dropped endpoint mid-stream
    /// moves it to the terminal Failed phase and returns the last error.
    pub fn run(
        &mut self,
        sink: &mut dyn PersistenceSink,
        shutdown: &Arc<AtomicBool>,
    ) -> Result<SessionStats> {
        self.start_streaming()?;

        match self.stream_loop(sink, shutdown) {
            Ok(()) => {
                self.stop_streaming();
                self.phase = SessionPhase::Idle;
                self.stats.resynced_bytes = self.reassembler.resynced_bytes();
                self.stats.dropped_bytes = self.reassembler.dropped_bytes();
                Ok(self.stats)
            }
            Err(e) => {
                self.phase = SessionPhase::Failed;
                self.stats.resynced_bytes = self.reassembler.resynced_bytes();
                self.stats.dropped_bytes = self.reassembler.dropped_bytes();
                log::error!("session: endpoint lost: {}", e);
                Err(e)
            }
        }
    }

    fn start_streaming(&mut self) -> Result<()> {
        self.phase = SessionPhase::Starting;

        // Cannot fail: the address was validated in new()
        let Ok(cmd) = CommandFrame::start_stream(self.config.address) else {
            self.phase = SessionPhase::Idle;
            return Err(Error::InvalidAddress(self.config.address));
        };

        let sent = self
            .transport
            .write_all(&cmd.encode())
            .and_then(|_| self.transport.flush());
        if let Err(e) = sent {
            self.phase = SessionPhase::Idle;
            return Err(Error::Connection(format!(
                "failed to send start command: {}",
                e
            )));
        }

        self.phase = SessionPhase::Streaming;
        log::info!(
            "session: streaming started (address {}, range {} mm)",
            self.config.address,
            self.config.range_mm
        );
        Ok(())
    }

    fn stream_loop(
        &mut self,
        sink: &mut dyn PersistenceSink,
        shutdown: &Arc<AtomicBool>,
    ) -> Result<()> {
        let mut buf = [0u8; READ_CHUNK];
        let mut backoff = BACKOFF_BASE;
        let mut window_start = Instant::now();
        let mut reported_resync: u64 = 0;
        let mut reported_dropped: u64 = 0;

        while !shutdown.load(Ordering::Relaxed) {
            let n = match self.poll_read(&mut buf) {
                Ok(n) => {
                    backoff = BACKOFF_BASE;
                    n
                }
                Err(e) if e.is_disconnect() => return Err(e),
                Err(e) => {
                    log::warn!("session: read error, retrying in {:?}: {}", backoff, e);
                    thread::sleep(backoff);
                    backoff = (backoff * 2).min(BACKOFF_MAX);
                    continue;
                }
            };

            if n == 0 {
                thread::sleep(self.config.poll_interval);
            } else {
                self.reassembler.feed(&buf[..n]);
                while let Some(frame) = self.reassembler.next_frame() {
                    // next_frame only yields bit7-valid frames, so decode
                    // cannot fail here
                    if let Some(sample) = self.decoder.sample(&frame) {
                        self.stats.samples += 1;
                        if let Err(e) = sink.record(&sample) {
                            log::error!("session: sink rejected sample: {}", e);
                        }
                    }
                }
            }

            // Summarize stream noise at most once per window
            if window_start.elapsed() >= self.config.diagnostic_window {
                let resynced = self.reassembler.resynced_bytes();
                let dropped = self.reassembler.dropped_bytes();
                let skipped = resynced - reported_resync;
                let lost = dropped - reported_dropped;
                if skipped > 0 || lost > 0 {
                    log::warn!(
                        "session: {} bytes skipped resynchronizing, {} bytes lost to overflow",
                        skipped,
                        lost
                    );
                }
                reported_resync = resynced;
                reported_dropped = dropped;
                window_start = Instant::now();
            }
        }

        Ok(())
    }

    fn poll_read(&mut self, buf: &mut [u8]) -> Result<usize> {
        if self.transport.available()? == 0 {
            return Ok(0);
        }
        self.transport.read(buf)
    }

    fn stop_streaming(&mut self) {
        self.phase = SessionPhase::Stopping;

        // Best-effort: the stream may already be gone
        if let Ok(cmd) = CommandFrame::stop_stream(self.config.address) {
            if let Err(e) = self.transport.write_all(&cmd.encode()) {
                log::warn!("session: stop command failed (ignored): {}", e);
            }
        }
        log::info!("session: streaming stopped ({} samples)", self.stats.samples);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sink::MemorySink;
    use crate::transport::MockTransport;

    fn run_session(
        mock: &MockTransport,
        config: SessionConfig,
        for_millis: u64,
    ) -> (Result<SessionStats>, SessionPhase, MemorySink) {
        let mut session = AcquisitionSession::new(mock.clone(), config).unwrap();
        let mut sink = MemorySink::new();
        let shutdown = Arc::new(AtomicBool::new(false));

        let stopper = {
            let shutdown = Arc::clone(&shutdown);
            thread::spawn(move || {
                thread::sleep(Duration::from_millis(for_millis));
                shutdown.store(true, Ordering::Relaxed);
            })
        };

        let result = session.run(&mut sink, &shutdown);
        stopper.join().unwrap();
        (result, session.phase(), sink)
    }

    #[test]
    fn test_start_and_stop_commands_on_wire() {
        let mock = MockTransport::new();
        let (result, phase, _) = run_session(&mock, SessionConfig::default(), 30);

        result.unwrap();
        assert_eq!(phase, SessionPhase::Idle);
        // start (07h) then stop (08h) for address 1
        assert_eq!(mock.written(), vec![0x01, 0x87, 0x01, 0x88]);
    }

    #[test]
    fn test_streaming_decodes_and_persists() {
        let mock = MockTransport::new();
        // Two valid frames with a garbage byte between them
        mock.inject_read(&[0x81, 0x82, 0x83, 0x84]);
        mock.inject_read(&[0x03]);
        mock.inject_read(&[0x8F, 0x8F, 0x8F, 0x83]);

        let (result, _, sink) = run_session(&mock, SessionConfig::default(), 50);
        let stats = result.unwrap();

        assert_eq!(stats.samples, 2);
        assert_eq!(sink.samples.len(), 2);
        assert_eq!(sink.samples[0].distance_mm, 17185.0 * 250.0 / 16384.0);
        assert_eq!(sink.samples[0].raw_frame, [0x81, 0x82, 0x83, 0x84]);
        assert_eq!(stats.resynced_bytes, 1);
        assert_eq!(stats.dropped_bytes, 0);
    }

    #[test]
    fn test_start_failure_stays_idle() {
        let mock = MockTransport::new();
        mock.disconnect();

        let mut session =
            AcquisitionSession::new(mock.clone(), SessionConfig::default()).unwrap();
        let mut sink = MemorySink::new();
        let shutdown = Arc::new(AtomicBool::new(false));

        let err = session.run(&mut sink, &shutdown).unwrap_err();
        assert!(matches!(err, Error::Connection(_)));
        assert_eq!(session.phase(), SessionPhase::Idle);
    }

    #[test]
    fn test_mid_stream_disconnect_is_terminal() {
        let mock = MockTransport::new();
        let mut session =
            AcquisitionSession::new(mock.clone(), SessionConfig::default()).unwrap();
        let shutdown = Arc::new(AtomicBool::new(false));

        let dropper = {
            let mock = mock.clone();
            thread::spawn(move || {
                thread::sleep(Duration::from_millis(20));
                mock.disconnect();
            })
        };

        let mut sink = MemorySink::new();
        let err = session.run(&mut sink, &shutdown).unwrap_err();
        dropper.join().unwrap();

        assert!(err.is_disconnect());
        assert_eq!(session.phase(), SessionPhase::Failed);
    }

    #[test]
    fn test_invalid_address_rejected_up_front() {
        let config = SessionConfig {
            address: 200,
            ..SessionConfig::default()
        };
        let result = AcquisitionSession::new(MockTransport::new(), config);
        assert!(matches!(result, Err(Error::InvalidAddress(200))));
    }
}
