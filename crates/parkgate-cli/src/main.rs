//! Parking gate controller.
//!
//! Runs one barrier lane against simulated peripherals driven from stdin,
//! talking to the real remote authority and serving the operator command
//! endpoint. Configure through `PARKGATE_CONFIG` (JSON file) and the
//! `PARKGATE_*` overrides; logging through `RUST_LOG`.

mod config;
mod simulator;

use std::time::Duration;

use anyhow::Context;
use parkgate_controller::{GateController, Peripherals};
use parkgate_hardware::SweepActuator;
use parkgate_hardware::mock::{MockInputBank, MockLine, MockRfid, MockServo};
use parkgate_network::{
    CommandEndpoint, DEFAULT_COMMAND_QUEUE, DEFAULT_COMMAND_REPLY_TIMEOUT_MS, HttpAuthority,
    command_channel,
};
use tokio::io::BufReader;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use crate::config::Settings;
use crate::simulator::Simulator;

fn init_logging() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_logging();

    let settings = Settings::load().context("Failed to load settings")?;
    info!(
        authority = %settings.authority.base_url,
        listen = %settings.listen,
        capacity = settings.capacity,
        "Starting parking gate controller"
    );

    let (servo, servo_handle) = MockServo::new();
    let (reader, reader_handle) = MockRfid::new();
    let (clearance, clearance_handle) = MockLine::new();
    let (slots, slots_handle) = MockInputBank::new(settings.capacity);
    let peripherals = Peripherals {
        actuator: SweepActuator::new(servo, settings.sweep.clone()),
        reader,
        clearance,
        slots,
    };

    let authority = HttpAuthority::connect(settings.authority.clone())
        .context("Failed to create authority client")?;

    let (sender, commands) = command_channel(DEFAULT_COMMAND_QUEUE);
    let endpoint = CommandEndpoint::bind(
        &settings.listen,
        sender,
        Duration::from_millis(DEFAULT_COMMAND_REPLY_TIMEOUT_MS),
    )
    .await
    .context("Failed to start command endpoint")?;
    info!(addr = %endpoint.local_addr()?, "Command endpoint listening");
    let endpoint_task = tokio::spawn(async move {
        if let Err(e) = endpoint.serve().await {
            error!(error = %e, "Command endpoint stopped");
        }
    });

    let mut controller = GateController::new(peripherals, authority, commands, settings.timing)
        .context("Failed to create gate controller")?;
    controller
        .initialize()
        .await
        .context("Failed to home barrier")?;

    let simulator = Simulator::new(reader_handle, clearance_handle, slots_handle, servo_handle);
    info!("Simulator ready: card <HEX> | car in|out | slot <i> on|off | status | quit");

    let shutdown = async move {
        tokio::select! {
            result = tokio::signal::ctrl_c() => match result {
                Ok(()) => info!("Ctrl-C received"),
                Err(e) => warn!(error = %e, "Failed to listen for Ctrl-C"),
            },
            () = simulator.run(BufReader::new(tokio::io::stdin())) => {}
        }
    };

    let result = controller.run(shutdown).await;
    endpoint_task.abort();
    result.context("Gate controller failed")?;

    info!("Shutdown complete");
    Ok(())
}
