//! Command-line surface and dispatch.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{anyhow, Context};
use clap::{Args, Parser, Subcommand};
use tokio_util::sync::CancellationToken;

use vdisk::{
    AddDiskRequest, AdapterType, DiskAddress, DiskFilter, DiskManager, DiskSize, Machine,
    ReconfigureOptions, StaticSession, TransportOptions,
};

use crate::config::{Config, DEFAULT_CONFIG_PATH};
use crate::output;

#[derive(Debug, Parser)]
#[command(name = "vdisk", about, version)]
/// Attach, detach, grow and list virtual machine disks
pub struct Cli {
    /// Configuration file
    #[arg(long, global = true, default_value = DEFAULT_CONFIG_PATH)]
    pub config: PathBuf,

    /// Skip TLS certificate validation
    #[arg(long, global = true)]
    pub insecure: bool,

    /// Seconds to wait for a reconfiguration to be applied
    #[arg(long, global = true)]
    pub timeout: Option<u64>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// List the machine's disks
    Get {
        /// Machine API href
        vm: String,

        /// Only disks on this bus type
        #[arg(long, value_parser = parse_adapter)]
        bus_type: Option<AdapterType>,

        /// Only disks on this bus number
        #[arg(long)]
        bus_id: Option<u32>,

        /// Only disks at this unit number
        #[arg(long)]
        unit_id: Option<u32>,

        /// Print JSON instead of a table
        #[arg(long)]
        json: bool,
    },

    /// Attach a new disk
    Add {
        /// Machine API href
        vm: String,

        /// Disk size, e.g. 500M, 20G or 1T
        #[arg(long, value_parser = parse_size)]
        size: DiskSize,

        /// Storage profile name; "*" uses the machine default
        #[arg(long)]
        storage_profile: Option<String>,

        /// Bus type (ide, parallel, sas, paravirtual, sata)
        #[arg(long, value_parser = parse_adapter, default_value = "paravirtual")]
        bus_type: AdapterType,

        /// Bus number
        #[arg(long, default_value_t = 0)]
        bus_id: u32,

        /// Unit number; the lowest free unit when omitted
        #[arg(long)]
        unit_id: Option<u32>,

        /// IOPS limit
        #[arg(long)]
        iops: Option<u64>,
    },

    /// Detach a disk (the machine must be powered off)
    Remove {
        /// Machine API href
        vm: String,

        #[command(flatten)]
        slot: SlotArgs,

        /// Confirm the removal
        #[arg(long)]
        confirm: bool,
    },

    /// Grow a disk
    Resize {
        /// Machine API href
        vm: String,

        #[command(flatten)]
        slot: SlotArgs,

        /// New disk size, larger than the current one
        #[arg(long, value_parser = parse_size)]
        size: DiskSize,
    },

    /// List storage profiles available to the machine
    Profiles {
        /// Machine API href
        vm: String,
    },
}

/// Address of an existing disk.
#[derive(Debug, Args)]
pub struct SlotArgs {
    /// Bus type (ide, parallel, sas, paravirtual, sata)
    #[arg(long, value_parser = parse_adapter)]
    pub bus_type: AdapterType,

    /// Bus number
    #[arg(long)]
    pub bus_id: u32,

    /// Unit number
    #[arg(long)]
    pub unit_id: u32,
}

impl SlotArgs {
    fn address(&self) -> DiskAddress {
        DiskAddress::new(self.bus_type, self.bus_id, self.unit_id)
    }
}

impl Command {
    fn vm(&self) -> &str {
        match self {
            Command::Get { vm, .. }
            | Command::Add { vm, .. }
            | Command::Remove { vm, .. }
            | Command::Resize { vm, .. }
            | Command::Profiles { vm } => vm.as_str(),
        }
    }
}

fn parse_adapter(s: &str) -> anyhow::Result<AdapterType> {
    s.parse::<AdapterType>().map_err(|e| anyhow!(e))
}

fn parse_size(s: &str) -> anyhow::Result<DiskSize> {
    s.parse::<DiskSize>().map_err(|e| anyhow!(e))
}

/// Run a command. Returns whether the requested change is known to be
/// applied; read-only commands succeed when they complete.
pub async fn run(cli: Cli, config: &Config) -> anyhow::Result<bool> {
    let machine = Machine::from_href(cli.command.vm())?;
    let credential = config.session.credential()?;
    let sessions = StaticSession::new().with_session(machine.endpoint_host(), credential);
    let manager = DiskManager::over_http(Arc::new(sessions), config.request_timeout())
        .context("failed to create HTTP transport")?;

    let transport = TransportOptions {
        skip_certificate_check: cli.insecure || config.transport.insecure,
    };
    let timeout = cli
        .timeout
        .map(Duration::from_secs)
        .unwrap_or_else(|| config.task_timeout());

    match cli.command {
        Command::Get {
            bus_type,
            bus_id,
            unit_id,
            json,
            ..
        } => {
            let filter = DiskFilter {
                adapter: bus_type,
                bus: bus_id,
                unit: unit_id,
            };
            let disks = manager.query_disks(&machine, &filter, transport).await?;
            if json {
                println!("{}", serde_json::to_string_pretty(&disks)?);
            } else {
                print!("{}", output::disk_table(&disks));
            }
            Ok(true)
        }

        Command::Profiles { .. } => {
            let profiles = manager.storage_profiles(&machine, transport).await?;
            print!("{}", output::profile_list(&profiles));
            Ok(true)
        }

        Command::Add {
            size,
            storage_profile,
            bus_type,
            bus_id,
            unit_id,
            iops,
            ..
        } => {
            let mut request = AddDiskRequest::new(size)
                .with_adapter(bus_type)
                .on_bus(bus_id);
            request.unit = unit_id;
            request.storage_profile = storage_profile;
            request.iops = iops;

            let options = reconfigure_options(timeout, transport);
            report(manager.add_disk(&machine, request, &options).await?)
        }

        Command::Remove { slot, confirm, .. } => {
            let options = reconfigure_options(timeout, transport);
            report(
                manager
                    .remove_disk(&machine, slot.address(), confirm, &options)
                    .await?,
            )
        }

        Command::Resize { slot, size, .. } => {
            let options = reconfigure_options(timeout, transport);
            report(
                manager
                    .resize_disk(&machine, slot.address(), size, &options)
                    .await?,
            )
        }
    }
}

// Ctrl-C stops waiting; the remote task is left running.
fn reconfigure_options(timeout: Duration, transport: TransportOptions) -> ReconfigureOptions {
    let token = CancellationToken::new();
    let interrupt = token.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            interrupt.cancel();
        }
    });

    ReconfigureOptions::new()
        .with_timeout(timeout)
        .skip_certificate_check(transport.skip_certificate_check)
        .with_cancellation(token)
        .on_progress(|p| {
            let percent = p
                .percent_complete
                .map(|pct| format!(" {pct}%"))
                .unwrap_or_default();
            eprintln!(
                "  {}{} ({}s left)",
                p.status,
                percent,
                p.remaining.as_secs()
            );
        })
}

fn report(outcome: vdisk::Outcome) -> anyhow::Result<bool> {
    println!("{}", output::outcome_message(outcome));
    Ok(outcome.succeeded())
}
