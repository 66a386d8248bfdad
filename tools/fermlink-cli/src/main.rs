//! fermlink - drive a simulated fermentation controller
//!
//! Commands:
//! - `fermlink bootstrap` - Assign a system id and read the clock
//! - `fermlink demo` - Create a profile and objects, then read and list them
//! - `fermlink profiles` - Create, activate and list profiles
//! - `fermlink erase` - Delete every profile, optionally wiping the device

mod config;

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use colored::Colorize;
use fermlink_connector::codec::SystemTime;
use fermlink_connector::{
    Controller, ObjectKind, PersistChangeValue, PersistentValue, ProfileId, Readable,
    ValueThreshold, Writable, UNINITIALIZED_ID,
};
use fermlink_device_mock::{IdPool, MockDevice};

use crate::config::CliConfig;

#[derive(Parser)]
#[command(name = "fermlink")]
#[command(version)]
#[command(about = "Drive a simulated fermentation controller", long_about = None)]
struct Cli {
    /// Configuration file (TOML)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Request timeout in milliseconds (overrides the configuration file)
    #[arg(long, global = true)]
    timeout_ms: Option<u64>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Assign a system id if the device has none, then read the clock
    Bootstrap,

    /// Create a profile with one object of each type and read them back
    Demo {
        /// Initial value of the change-tracked value
        #[arg(long, default_value_t = 100, allow_negative_numbers = true)]
        value: i16,

        /// Change threshold (must not be negative)
        #[arg(long, default_value_t = 5, allow_negative_numbers = true)]
        threshold: i16,
    },

    /// Create profiles and show which one is active
    Profiles {
        /// Number of profiles to create
        #[arg(short = 'n', long, default_value_t = 2)]
        create: u8,

        /// Profile to activate afterwards
        #[arg(short, long)]
        activate: Option<u8>,
    },

    /// Delete every profile
    Erase {
        /// Also wipe persistent storage, returning the system id to the pool
        #[arg(long)]
        wipe: bool,
    },
}

/// A controller wired to a fresh simulated device
struct Session {
    device: Arc<MockDevice>,
    pool: Arc<IdPool>,
    controller: Controller,
}

impl Session {
    fn open(config: &CliConfig) -> Self {
        let device = Arc::new(MockDevice::new(config.device));
        let assigned = config.device.system_id;
        let pool = Arc::new(IdPool::new(
            (0..UNINITIALIZED_ID).filter(|id| *id != assigned),
        ));
        let controller =
            Controller::new(device.clone(), pool.clone()).with_config(config.controller);
        log::debug!("opened {controller:?}");
        Self {
            device,
            pool,
            controller,
        }
    }
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();
    let mut config = CliConfig::load(cli.config.as_deref())?;
    if let Some(ms) = cli.timeout_ms {
        config.controller.timeout = Duration::from_millis(ms);
    }
    let session = Session::open(&config);

    match cli.command {
        Commands::Bootstrap => bootstrap(&session)?,
        Commands::Demo { value, threshold } => {
            demo(&session, ValueThreshold::new(value, threshold))?
        }
        Commands::Profiles { create, activate } => profiles(&session, create, activate)?,
        Commands::Erase { wipe } => erase(&session, wipe)?,
    }

    Ok(())
}

fn bootstrap(session: &Session) -> Result<()> {
    let controller = &session.controller;
    let id = controller
        .initialize_from_pool()
        .context("Failed to assign a system id")?;
    println!("{} System id: {}", "✓".green(), id.to_string().bold());

    let clock = controller.system_time();
    clock
        .write(&SystemTime {
            time: session.device.ticks(),
            scale: 1,
        })
        .context("Failed to set the system clock")?;
    let now = clock.read().context("Failed to read the system clock")?;
    println!("{} Clock: time={} scale={}", "✓".green(), now.time, now.scale);
    Ok(())
}

fn demo(session: &Session, args: ValueThreshold) -> Result<()> {
    let controller = &session.controller;
    controller
        .initialize_from_pool()
        .context("Failed to assign a system id")?;

    let profile = controller.create_profile().context("Failed to create a profile")?;
    profile.activate()?;
    println!("{} Profile {} active", "✓".green(), profile.id());

    let ticks = controller.create_current_ticks(None, None)?;
    let container = controller.create_dynamic_container(None, None)?;
    let tracked = controller
        .create_object::<PersistChangeValue>(&args, Some(&container), None)
        .context("Failed to create the change-tracked value")?;
    let blob = controller.create_object::<PersistentValue>(&b"fermlink".to_vec(), None, None)?;

    session.device.advance_ticks(1500);
    println!("  ticks    {}", ticks.read()?);
    println!("  tracked  {}", tracked.read()?);
    tracked.write(&args.value.saturating_add(1))?;
    println!("  tracked  {} (after write)", tracked.read()?);
    println!("  blob     {:02x?}", blob.read()?);

    println!("{} Objects in profile {}:", "✓".green(), profile.id());
    for reference in profile.objects()? {
        let kind = match reference.kind {
            ObjectKind::Known { name, .. } => name.to_string(),
            ObjectKind::Unknown(type_id) => format!("unknown type {type_id}").yellow().to_string(),
        };
        println!("  {:<10} {:<20} {:?}", reference.id_chain().to_string(), kind, reference.args);
    }
    Ok(())
}

fn profiles(session: &Session, create: u8, activate: Option<u8>) -> Result<()> {
    let controller = &session.controller;
    for _ in 0..create {
        let profile = controller.create_profile().context("Failed to create a profile")?;
        println!("{} Created profile {}", "✓".green(), profile.id());
    }
    if let Some(id) = activate {
        controller
            .activate_profile(Some(ProfileId::new(id)))
            .with_context(|| format!("Failed to activate profile {id}"))?;
    }

    let (active, available) = controller.active_and_available_profiles()?;
    for profile in available {
        let marker = if active.is_some_and(|a| a.id() == profile.id()) {
            "*".green().bold().to_string()
        } else {
            " ".to_string()
        };
        println!("{marker} profile {}", profile.id());
    }
    if active.is_none() {
        println!("{} No profile active", "•".yellow());
    }
    Ok(())
}

fn erase(session: &Session, wipe: bool) -> Result<()> {
    let controller = &session.controller;
    controller
        .initialize_from_pool()
        .context("Failed to assign a system id")?;
    let first = controller.create_profile()?;
    controller.create_profile()?;
    first.activate()?;

    controller.full_erase().context("Failed to erase profiles")?;
    let (_, remaining) = controller.active_and_available_profiles()?;
    println!("{} Profiles left: {}", "✓".green(), remaining.len());

    if wipe {
        controller.reset(true, false).context("Failed to wipe the device")?;
        println!(
            "{} Device wiped, returned ids: {:?}",
            "✓".green(),
            session.pool.released()
        );
    }
    Ok(())
}
