//! RF60x-IO - Acquisition and port bridging for RF60x laser ranging sensors
//!
//! Three pieces:
//! - `protocol`: 2-byte command frames and nibble-packed 4-byte response
//!   frames, with chunk-boundary-agnostic reassembly
//! - `session`: one endpoint's read → reassemble → decode → persist pipeline
//! - `bridge`: raw byte fan-out between a physical sensor port and any
//!   number of consumer ports

pub mod bridge;
pub mod config;
pub mod error;
pub mod protocol;
pub mod session;
pub mod sink;
pub mod transport;

// Re-export commonly used types
pub use config::AppConfig;
pub use error::{Error, Result};
