//! Multi-endpoint byte forwarding
//!
//! Duplicates the raw byte stream from each source endpoint to every sink
//! routed from it, so one physical sensor connection can feed several
//! independent consumers (a vendor application, a logger, an acquisition
//! session). Routes are fixed at startup; a return route from a consumer
//! port back to the sensor port gives consumers a command path.
//!
//! One forwarding thread per source. All bytes read in a poll cycle are
//! written to each sink as a single uninterrupted unit; a per-endpoint
//! mutex serializes writes when one sink appears in several routes. The
//! bridge never inspects or decodes the bytes it forwards.

use crate::error::{Error, Result};
use crate::transport::Transport;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

/// Shared, write-serialized endpoint handle
pub type Endpoint = Arc<Mutex<Box<dyn Transport>>>;

const READ_CHUNK: usize = 1024;
const BACKOFF_BASE: Duration = Duration::from_millis(10);
const BACKOFF_MAX: Duration = Duration::from_millis(500);

/// Default per-source poll interval
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_micros(500);

/// Named endpoints plus source-to-sinks routes
///
/// Built once before the bridge starts and read-only afterwards; changing
/// routes means building a new table and a new bridge.
#[derive(Default)]
pub struct RoutingTable {
    endpoints: HashMap<String, Endpoint>,
    routes: Vec<(String, Vec<String>)>,
}

impl RoutingTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an endpoint under a unique name
    pub fn add_endpoint<T: Transport + 'static>(&mut self, name: &str, transport: T) -> Result<()> {
        if self.endpoints.contains_key(name) {
            return Err(Error::InvalidConfig(format!(
                "duplicate endpoint name: {}",
                name
            )));
        }
        self.endpoints
            .insert(name.to_string(), Arc::new(Mutex::new(Box::new(transport))));
        Ok(())
    }

    /// Route a source endpoint to one or more sink endpoints
    ///
    /// Every name must already be registered. A source may appear in only
    /// one route, but a sink may be shared across routes and may itself be
    /// the source of another route (bidirectional forwarding).
    pub fn add_route(&mut self, source: &str, sinks: &[&str]) -> Result<()> {
        if !self.endpoints.contains_key(source) {
            return Err(Error::InvalidConfig(format!(
                "unknown source endpoint: {}",
                source
            )));
        }
        if self.routes.iter().any(|(s, _)| s == source) {
            return Err(Error::InvalidConfig(format!(
                "duplicate route for source: {}",
                source
            )));
        }
        if sinks.is_empty() {
            return Err(Error::InvalidConfig(format!(
                "route from {} has no sinks",
                source
            )));
        }
        for sink in sinks {
            if !self.endpoints.contains_key(*sink) {
                return Err(Error::InvalidConfig(format!(
                    "unknown sink endpoint: {}",
                    sink
                )));
            }
            if *sink == source {
                return Err(Error::InvalidConfig(format!(
                    "endpoint {} cannot sink its own bytes",
                    source
                )));
            }
        }
        self.routes.push((
            source.to_string(),
            sinks.iter().map(|s| s.to_string()).collect(),
        ));
        Ok(())
    }
}

struct BridgeRoute {
    source_name: String,
    source: Endpoint,
    sinks: Vec<(String, Endpoint)>,
}

/// Per-source forwarding counters
#[derive(Debug, Default, Clone)]
pub struct ForwardStats {
    pub source: String,
    pub cycles: u64,
    pub bytes: u64,
    pub sink_errors: u64,
}

/// Fan-out router over a fixed routing table
pub struct PortBridge {
    routes: Vec<BridgeRoute>,
    poll_interval: Duration,
}

impl PortBridge {
    /// Resolve a routing table into a runnable bridge
    pub fn new(table: RoutingTable) -> Result<Self> {
        if table.routes.is_empty() {
            return Err(Error::InvalidConfig("routing table has no routes".into()));
        }
        let routes = table
            .routes
            .iter()
            .map(|(source_name, sink_names)| {
                // Names were validated at add_route time
                let source = Arc::clone(&table.endpoints[source_name]);
                let sinks = sink_names
                    .iter()
                    .map(|n| (n.clone(), Arc::clone(&table.endpoints[n])))
                    .collect();
                BridgeRoute {
                    source_name: source_name.clone(),
                    source,
                    sinks,
                }
            })
            .collect();
        Ok(PortBridge {
            routes,
            poll_interval: DEFAULT_POLL_INTERVAL,
        })
    }

    /// Override the per-source poll interval
    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    /// Spawn one forwarding thread per source
    ///
    /// Threads run until the shared shutdown flag is set or their source
    /// endpoint closes; a failing source or sink never disturbs the other
    /// routes.
    pub fn start(self, shutdown: Arc<AtomicBool>) -> Result<BridgeHandle> {
        let poll = self.poll_interval;
        let mut threads = Vec::with_capacity(self.routes.len());
        for route in self.routes {
            let shutdown = Arc::clone(&shutdown);
            let name = format!("bridge-{}", route.source_name);
            let handle = thread::Builder::new()
                .name(name)
                .spawn(move || forward_loop(route, shutdown, poll))
                .map_err(|e| Error::Other(format!("failed to spawn bridge thread: {}", e)))?;
            threads.push(handle);
        }
        Ok(BridgeHandle { threads })
    }
}

/// Handle over the running forwarding threads
pub struct BridgeHandle {
    threads: Vec<JoinHandle<ForwardStats>>,
}

impl BridgeHandle {
    /// Wait for every forwarding thread to finish
    pub fn join(self) -> Vec<ForwardStats> {
        self.threads
            .into_iter()
            .map(|t| match t.join() {
                Ok(stats) => stats,
                Err(_) => {
                    log::error!("bridge thread panicked");
                    ForwardStats::default()
                }
            })
            .collect()
    }
}

fn forward_loop(route: BridgeRoute, shutdown: Arc<AtomicBool>, poll: Duration) -> ForwardStats {
    let mut stats = ForwardStats {
        source: route.source_name.clone(),
        ..Default::default()
    };
    let mut buf = [0u8; READ_CHUNK];
    let mut backoff = BACKOFF_BASE;

    while !shutdown.load(Ordering::Relaxed) {
        let read = {
            let mut source = route.source.lock();
            match source.available() {
                Ok(0) => Ok(0),
                Ok(_) => source.read(&mut buf),
                Err(e) => Err(e),
            }
        };

        match read {
            Ok(0) => thread::sleep(poll),
            Ok(n) => {
                backoff = BACKOFF_BASE;
                stats.cycles += 1;
                stats.bytes += n as u64;

                // One poll cycle's bytes go to every sink as a single
                // unit; a sink failure is isolated to that sink.
                for (sink_name, sink) in &route.sinks {
                    let mut sink = sink.lock();
                    if let Err(e) = sink.write_all(&buf[..n]) {
                        stats.sink_errors += 1;
                        log::warn!(
                            "bridge[{}]: write to {} failed: {}",
                            route.source_name,
                            sink_name,
                            e
                        );
                    }
                }
            }
            Err(e) if e.is_disconnect() => {
                log::error!("bridge[{}]: source closed: {}", route.source_name, e);
                break;
            }
            Err(e) => {
                log::warn!(
                    "bridge[{}]: read error, retrying in {:?}: {}",
                    route.source_name,
                    backoff,
                    e
                );
                thread::sleep(backoff);
                backoff = (backoff * 2).min(BACKOFF_MAX);
            }
        }
    }

    log::info!(
        "bridge[{}]: forwarding stopped ({} bytes in {} cycles, {} sink errors)",
        route.source_name,
        stats.bytes,
        stats.cycles,
        stats.sink_errors
    );
    stats
}
