use std::fs;
use std::io;
use std::path::PathBuf;
use std::time::{SystemTime, UNIX_EPOCH};

use anyhow::{bail, Context};
use clap::{Args, Parser, Subcommand};
use larm_config::{DeliveryStrategy, LarmConfig, StorageStrategy};
use larm_core::codes::alert_type;
use larm_core::{Agent, FaultFrame, FnIdentity, Ports, PortError, StoragePort};
use larm_entry::Entry;
use larm_ports::{
    parse_serial_dump, DirectoryStorage, GenericKernel, RetainedSlot, RingStorage, SerialCloud,
};
use larm_telemetry::logging::EventLogger;
use larm_telemetry::metrics::MetricsRecorder;
use tracing::{info, warn};

use crate::report::describe;

const RING_CAPACITY: usize = 64 * 1024;
const RETAINED_CAPACITY: usize = 16 * 1024;

#[derive(Parser)]
#[command(name = "larm", version, about)]
pub struct Cli {
    /// Configuration file; defaults to config/larm.yaml and LARM_* variables
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Report a simulated hard fault with a crash dump attachment
    Simulate(SimulateArgs),
    /// Decode entries from a captured serial dump
    Decode(DecodeArgs),
    /// Replay every alert kept in a storage directory
    Drain(DrainArgs),
}

#[derive(Args, Debug, Clone)]
pub struct SimulateArgs {
    /// Store into this directory instead of an in-memory region
    #[arg(short, long)]
    pub storage: Option<PathBuf>,
    /// Skip the cloud attempt
    #[arg(long)]
    pub offline: bool,
    /// Size of the simulated crash dump in bytes (0 for none)
    #[arg(long, default_value_t = 2500)]
    pub dump_size: usize,
    /// Fault status register value, decimal or 0x-prefixed hex
    #[arg(long, default_value = "0x00008200", value_parser = parse_u32)]
    pub cfsr: u32,
    #[arg(long, default_value = "larm-host")]
    pub device: String,
}

#[derive(Args, Debug, Clone)]
pub struct DecodeArgs {
    /// Text file holding the captured output
    pub input: PathBuf,
    /// MQTT topic prefix; defaults to delivery.mqtt_prefix
    #[arg(long)]
    pub prefix: Option<String>,
}

#[derive(Args, Debug, Clone)]
pub struct DrainArgs {
    /// Storage directory written by `simulate --storage`
    pub storage: PathBuf,
    /// Print the entries as a serial dump instead of a summary
    #[arg(long)]
    pub serial: bool,
}

fn parse_u32(value: &str) -> Result<u32, String> {
    let parsed = match value.strip_prefix("0x").or_else(|| value.strip_prefix("0X")) {
        Some(digits) => u32::from_str_radix(digits, 16),
        None => value.parse(),
    };
    parsed.map_err(|err| format!("invalid value '{value}': {err}"))
}

/// Session id derived from the wall clock, as hex.
fn session_id(buf: &mut [u8]) -> usize {
    let secs = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0);
    copy_into(buf, hex::encode(secs.to_be_bytes()).as_bytes())
}

fn copy_into(buf: &mut [u8], value: &[u8]) -> usize {
    let len = value.len().min(buf.len());
    buf[..len].copy_from_slice(&value[..len]);
    len
}

fn build_agent(
    config: &LarmConfig,
    storage: impl StoragePort + 'static,
    device: String,
    metrics: Option<MetricsRecorder>,
) -> anyhow::Result<Agent> {
    let ports = Ports::new(
        SerialCloud::new(io::stdout()),
        storage,
        GenericKernel::new(),
        FnIdentity::new(session_id, move |buf: &mut [u8]| {
            copy_into(buf, device.as_bytes())
        }),
    )
    .with_retained(RetainedSlot::new(RETAINED_CAPACITY));

    let agent = Agent::new(config, ports).context("Failed to initialize the agent")?;
    Ok(match metrics {
        Some(metrics) => agent.with_metrics(metrics),
        None => agent,
    })
}

fn print_metrics(agent: &Agent) -> anyhow::Result<()> {
    if let Some(metrics) = agent.metrics() {
        eprintln!("{}", metrics.gather_metrics()?);
    }
    Ok(())
}

pub fn simulate(
    config: &LarmConfig,
    args: SimulateArgs,
    metrics: Option<MetricsRecorder>,
) -> anyhow::Result<()> {
    let mut agent = match &args.storage {
        Some(dir) => build_agent(
            config,
            DirectoryStorage::new(dir).context("Failed to open the storage directory")?,
            args.device.clone(),
            metrics,
        )?,
        None => build_agent(config, RingStorage::new(RING_CAPACITY), args.device.clone(), metrics)?,
    };
    if args.offline {
        agent.set_delivery_strategy(DeliveryStrategy::Offline);
    }
    if args.storage.is_some() && agent.storage_strategy() == StorageStrategy::Ignore {
        info!("Storage directory given, storing with the skip strategy");
        agent.set_storage_strategy(StorageStrategy::Skip);
    }

    let dump: Vec<u8> = (0..args.dump_size).map(|i| (i % 251) as u8).collect();
    let frame = FaultFrame {
        cfsr: args.cfsr,
        stack_pointer: 0x2000_1FF0,
        dump: (!dump.is_empty()).then_some(dump.as_slice()),
        online: !args.offline,
    };

    let attempt = agent.report_fault(&frame).context("Fault report was not delivered")?;
    EventLogger::log_report(attempt.label(), agent.alert_id(), alert_type::HARDFAULT);
    info!(attempt = %attempt, alert_id = agent.alert_id(), "Simulated fault reported");
    print_metrics(&agent)
}

pub fn decode(config: &LarmConfig, args: DecodeArgs) -> anyhow::Result<()> {
    let text = fs::read_to_string(&args.input)
        .with_context(|| format!("Failed to read {}", args.input.display()))?;
    let entries = parse_serial_dump(&text).context("Malformed serial dump")?;
    if entries.is_empty() {
        bail!("No entries found in {}", args.input.display());
    }

    let prefix = args.prefix.as_deref().unwrap_or(&config.delivery.mqtt_prefix);
    for (index, raw) in entries.iter().enumerate() {
        match larm_entry::decode(raw) {
            Ok(entry) => println!("{}", describe(&entry, prefix)),
            Err(err) => warn!(index, error = %err, "Skipping undecodable entry"),
        }
    }
    Ok(())
}

pub fn drain(
    config: &LarmConfig,
    args: DrainArgs,
    metrics: Option<MetricsRecorder>,
) -> anyhow::Result<()> {
    let storage = DirectoryStorage::new(&args.storage).context("Failed to open the storage directory")?;
    let mut agent = build_agent(config, storage, String::from("larm-host"), metrics)?;

    let replayed = if args.serial {
        agent.send_all()?
    } else {
        let prefix = config.delivery.mqtt_prefix.clone();
        let mut print = |entry: &Entry<'_>| -> Result<(), PortError> {
            println!("{}", describe(entry, &prefix));
            Ok(())
        };
        agent.get_all(&mut print)?
    };
    info!(replayed, "Storage drained");
    print_metrics(&agent)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_decimal_and_hex() {
        assert_eq!(parse_u32("33280"), Ok(33280));
        assert_eq!(parse_u32("0x00008200"), Ok(0x8200));
        assert!(parse_u32("0xZZ").is_err());
    }

    #[test]
    fn session_id_is_hex_time() {
        let mut buf = [0u8; 32];
        let len = session_id(&mut buf);
        assert_eq!(len, 16);
        assert!(buf[..len].iter().all(u8::is_ascii_hexdigit));
    }

    #[test]
    fn cli_parses_simulate() {
        let cli = Cli::parse_from(["larm", "simulate", "--offline", "--cfsr", "0x10"]);
        match cli.command {
            Commands::Simulate(args) => {
                assert!(args.offline);
                assert_eq!(args.cfsr, 0x10);
                assert_eq!(args.dump_size, 2500);
            }
            _ => panic!("expected simulate"),
        }
    }
}
