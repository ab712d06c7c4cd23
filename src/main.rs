//! trill-osc - OSC bridge daemon for Trill touch sensors
//!
//! ## Protocol
//!
//! - **UDP in (port 7562)**: control commands at `/trill/command/<verb>`
//! - **UDP out (127.0.0.1:7563)**: readings at `/trill/readings/<id>/...`
//!   and replies at `/trill/commandreply/<verb>`
//!
//! Devices are created at runtime with `new`/`createAll`, or at startup
//! from `--auto BUS` and `[polling].scan_buses`.

use clap::Parser;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use trill_osc::app::Bridge;
use trill_osc::command::Controller;
use trill_osc::config::{BusType, Config, ConfigSource, DEFAULT_CONFIG_PATH};
use trill_osc::devices::create_bus;
use trill_osc::error::{Error, Result};
use trill_osc::streaming::OscPaths;
use trill_osc::transport::UdpLink;

/// OSC bridge for Trill capacitive touch sensors
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Configuration file (missing file = defaults)
    #[arg(default_value = DEFAULT_CONFIG_PATH)]
    config: String,

    /// UDP port to listen on for commands
    #[arg(short, long)]
    port: Option<u16>,

    /// Where to send readings and replies (IP:PORT)
    #[arg(short, long)]
    remote: Option<String>,

    /// Scan this bus at startup and poll every device found
    #[arg(short, long, value_name = "BUS")]
    auto: Option<u8>,

    /// Use the simulated bus instead of I2C
    #[arg(long)]
    mock: bool,
}

fn main() -> Result<()> {
    let args = Args::parse();

    let (mut config, source) = Config::load(&args.config)?;
    apply_overrides(&mut config, &args);

    env_logger::Builder::from_env(
        env_logger::Env::default().default_filter_or(config.logging.level.as_str()),
    )
    .init();

    log::info!("trill-osc v{} starting...", env!("CARGO_PKG_VERSION"));
    match source {
        ConfigSource::File => log::info!("Using config: {}", args.config),
        ConfigSource::Defaults => log::info!("No config at {}, using defaults", args.config),
    }

    let running = Arc::new(AtomicBool::new(true));
    let r = Arc::clone(&running);
    ctrlc::set_handler(move || {
        log::info!("Received shutdown signal");
        r.store(false, Ordering::Relaxed);
    })
    .map_err(|e| Error::Other(format!("Error setting Ctrl-C handler: {}", e)))?;

    let bus = create_bus(&config.bus)?;
    let mut controller = Controller::new(
        bus,
        config.polling.auto_read_all,
        config.polling.loop_sleep(),
    );
    for &bus_id in &config.polling.scan_buses {
        let created = controller.create_all(bus_id);
        log::info!("Bus {}: created {} device(s)", bus_id, created.len());
    }

    let link = UdpLink::bind(
        &config.osc.listen_address,
        &config.osc.remote_address,
        config.osc.rebind_on_first_packet,
    )?;

    let mut bridge = Bridge::new(
        controller,
        link,
        OscPaths::new(&config.osc.root),
        &config.polling,
        running,
    );
    log::info!("trill-osc running. Press Ctrl-C to stop.");
    bridge.run();

    log::info!("trill-osc stopped");
    Ok(())
}

fn apply_overrides(config: &mut Config, args: &Args) {
    if let Some(port) = args.port {
        config.osc.set_listen_port(port);
    }
    if let Some(remote) = &args.remote {
        config.osc.remote_address = remote.clone();
    }
    if let Some(bus) = args.auto {
        config.polling.auto_read_all = true;
        if !config.polling.scan_buses.contains(&bus) {
            config.polling.scan_buses.push(bus);
        }
    }
    if args.mock {
        config.bus.bus_type = BusType::Mock;
    }
}
