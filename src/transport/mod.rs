//! Transport layer for I/O abstraction
//!
//! Endpoints are opaque byte streams; everything above this layer (the
//! session, the bridge) talks to the `Transport` trait only.

use crate::error::Result;

mod mock;
mod serial;
pub use mock::MockTransport;
pub use serial::{list_ports, SerialTransport};

/// Transport trait for endpoint communication
pub trait Transport: Send {
    /// Read data into buffer, returns number of bytes read
    fn read(&mut self, buffer: &mut [u8]) -> Result<usize>;

    /// Write data from buffer, returns number of bytes written
    fn write(&mut self, data: &[u8]) -> Result<usize>;

    /// Flush any pending writes (blocking until complete)
    fn flush(&mut self) -> Result<()>;

    /// Check if data is available to read
    fn available(&mut self) -> Result<usize> {
        Ok(0) // Default implementation
    }

    /// Write the whole buffer, looping over short writes
    fn write_all(&mut self, mut data: &[u8]) -> Result<()> {
        while !data.is_empty() {
            let n = self.write(data)?;
            if n == 0 {
                return Err(std::io::Error::new(
                    std::io::ErrorKind::WriteZero,
                    "transport accepted no bytes",
                )
                .into());
            }
            data = &data[n..];
        }
        Ok(())
    }
}
