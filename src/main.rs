//! RF60x-IO daemon
//!
//! Modes:
//! - `rf60x-io acquire [-c config.toml]` - stream measurements into a CSV file
//! - `rf60x-io bridge  [-c config.toml]` - fan raw bytes out between serial ports
//! - `rf60x-io ports`                    - list serial ports

use rf60x_io::bridge::{PortBridge, RoutingTable};
use rf60x_io::config::AppConfig;
use rf60x_io::error::{Error, Result};
use rf60x_io::session::{AcquisitionSession, SessionConfig};
use rf60x_io::sink::{spawn_writer, CsvSink};
use rf60x_io::transport::{list_ports, SerialTransport};
use std::env;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// Parse config path from command line arguments.
///
/// Supports `--config <path>`, `-c <path>`, or a positional path after
/// the mode. Defaults to `rf60x.toml`.
fn parse_config_path(args: &[String]) -> String {
    for i in 1..args.len() {
        if (args[i] == "--config" || args[i] == "-c") && i + 1 < args.len() {
            return args[i + 1].clone();
        }
    }
    if args.len() > 2 && !args[2].starts_with('-') {
        return args[2].clone();
    }
    "rf60x.toml".to_string()
}

fn install_shutdown_handler() -> Result<Arc<AtomicBool>> {
    let shutdown = Arc::new(AtomicBool::new(false));
    let flag = Arc::clone(&shutdown);
    ctrlc::set_handler(move || {
        log::info!("Received shutdown signal");
        flag.store(true, Ordering::Relaxed);
    })
    .map_err(|e| Error::Other(format!("Error setting Ctrl-C handler: {}", e)))?;
    Ok(shutdown)
}

fn run_acquire(config: &AppConfig) -> Result<()> {
    let transport = SerialTransport::open(&config.sensor.port, config.sensor.baud_rate)?;

    let csv = CsvSink::create(&config.acquisition.csv_path)?;
    let (mut sink, writer) = spawn_writer(csv, 4096)?;

    let session_config = SessionConfig {
        address: config.sensor.address,
        range_mm: config.sensor.range_mm,
        poll_interval: Duration::from_micros(config.acquisition.poll_interval_us),
        diagnostic_window: Duration::from_secs(config.acquisition.diagnostic_window_secs),
    };
    let mut session = AcquisitionSession::new(transport, session_config)?;

    let shutdown = install_shutdown_handler()?;
    log::info!("Acquisition running. Press Ctrl-C to stop.");

    let result = session.run(&mut sink, &shutdown);
    drop(sink); // disconnect the channel so the writer drains and exits
    writer.join();

    let stats = result?;
    log::info!(
        "Captured {} samples ({} bytes resynchronized, {} bytes lost to overflow)",
        stats.samples,
        stats.resynced_bytes,
        stats.dropped_bytes
    );
    Ok(())
}

fn run_bridge(config: &AppConfig) -> Result<()> {
    if config.bridge.routes.is_empty() {
        return Err(Error::InvalidConfig(
            "no bridge routes configured".to_string(),
        ));
    }

    let mut table = RoutingTable::new();
    for endpoint in &config.bridge.endpoints {
        let transport = SerialTransport::open(&endpoint.port, endpoint.baud_rate)?;
        table.add_endpoint(&endpoint.name, transport)?;
    }
    for route in &config.bridge.routes {
        let sinks: Vec<&str> = route.sinks.iter().map(String::as_str).collect();
        table.add_route(&route.source, &sinks)?;
    }

    let bridge = PortBridge::new(table)?
        .with_poll_interval(Duration::from_micros(config.bridge.poll_interval_us));

    let shutdown = install_shutdown_handler()?;
    log::info!("Bridge running. Press Ctrl-C to stop.");

    let handle = bridge.start(shutdown)?;
    for stats in handle.join() {
        log::info!(
            "{}: {} bytes forwarded in {} cycles ({} sink errors)",
            stats.source,
            stats.bytes,
            stats.cycles,
            stats.sink_errors
        );
    }
    Ok(())
}

fn run_ports() -> Result<()> {
    let ports = list_ports()?;
    if ports.is_empty() {
        println!("No serial ports found");
        return Ok(());
    }
    for (name, description) in ports {
        println!("{}  {}", name, description);
    }
    Ok(())
}

/// Initialize logging at the configured level; `RUST_LOG` overrides it
fn init_logger(level: &str) {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level)).init();
}

fn main() -> Result<()> {
    let args: Vec<String> = env::args().collect();
    let mode = args.get(1).map(String::as_str).unwrap_or("acquire");

    match mode {
        "ports" => {
            init_logger("info");
            run_ports()
        }
        "bridge" => {
            let config = AppConfig::from_file(parse_config_path(&args))?;
            init_logger(&config.logging.level);
            run_bridge(&config)
        }
        "acquire" => {
            let config = AppConfig::from_file(parse_config_path(&args))?;
            init_logger(&config.logging.level);
            run_acquire(&config)
        }
        other => {
            eprintln!("Usage: rf60x-io <acquire|bridge|ports> [-c config.toml]");
            Err(Error::InvalidConfig(format!("unknown mode: {}", other)))
        }
    }
}
