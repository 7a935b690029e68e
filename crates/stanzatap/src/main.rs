//! `stanzatap` - CLI for the stanza traffic inspector
//!
//! This binary replays captured stanza traffic through the tap pipeline and
//! manages the persisted log filter and configuration.

#![warn(missing_debug_implementations)]
#![deny(unsafe_code)]

use std::io::Read;
use std::sync::Arc;

use clap::Parser;

use stanzatap::cli::{Cli, Command, ConfigCommand, FilterCommand, ReplayCommand};
use stanzatap::replay::{parse_capture, read_capture, Replayer};
use stanzatap::storage::{FilterStore, MemoryFilterStore, Storage, FILTER_KEY};
use stanzatap::{format_delta, init_logging, Config, Pattern, Tap};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    // Initialize logging based on verbosity
    init_logging(cli.verbosity());

    // Load configuration
    let config = Config::load_from(cli.config.clone())?;

    // Execute the command
    match cli.command {
        Command::Replay(replay_cmd) => handle_replay(&config, &replay_cmd).await,
        Command::FormatDelta(delta_cmd) => {
            for delta in delta_cmd.deltas {
                println!("{}", format_delta(delta));
            }
            Ok(())
        }
        Command::Filter(filter_cmd) => handle_filter(&config, filter_cmd),
        Command::Config(config_cmd) => handle_config(&config, config_cmd),
    }
}

async fn handle_replay(
    config: &Config,
    cmd: &ReplayCommand,
) -> Result<(), Box<dyn std::error::Error>> {
    let lines = if cmd.reads_stdin() {
        let mut buf = String::new();
        std::io::stdin().read_to_string(&mut buf)?;
        parse_capture(&buf)?
    } else {
        read_capture(&cmd.input)?
    };

    let store: Arc<dyn FilterStore> = if cmd.no_persist {
        Arc::new(MemoryFilterStore::new())
    } else {
        Arc::new(Storage::open(config.database_path())?)
    };

    let tap = Tap::new(store, config.locator_config());
    let replayer = Replayer::start(tap).await?;
    replayer.tap().configure(
        cmd.log_filter_spec(config),
        cmd.level(config),
        cmd.tap_options(config),
    );

    let summary = replayer.run(&lines)?;
    for stanza in &summary.forwarded {
        println!("{stanza}");
    }
    eprintln!(
        "{} forwarded, {} dropped, {} inbound",
        summary.forwarded.len(),
        summary.dropped,
        summary.inbound
    );
    Ok(())
}

fn handle_filter(config: &Config, cmd: FilterCommand) -> Result<(), Box<dyn std::error::Error>> {
    let storage = Storage::open(config.database_path())?;

    match cmd {
        FilterCommand::Show => match storage.load()? {
            Some(stored) => match Pattern::from_persisted(&stored) {
                Ok(pattern) => println!("{pattern}"),
                Err(e) => println!("{stored} (unusable: {e})"),
            },
            None => println!("No log filter set; nothing is logged."),
        },
        FilterCommand::Set { pattern } => {
            let pattern = Pattern::regex(&pattern)?;
            if let Some(persisted) = pattern.to_persisted() {
                storage.save(&persisted)?;
            }
            println!("Log filter set to {pattern}");
        }
        FilterCommand::Clear => {
            if storage.remove(FILTER_KEY)? {
                println!("Log filter cleared.");
            } else {
                println!("No log filter was set.");
            }
        }
    }
    Ok(())
}

fn handle_config(config: &Config, cmd: ConfigCommand) -> Result<(), Box<dyn std::error::Error>> {
    match cmd {
        ConfigCommand::Show { json } => {
            if json {
                println!("{}", config.to_json()?);
            } else {
                let unset = || "(unset)".to_string();
                println!("Current Configuration");
                println!("=====================");
                println!();
                println!("[Tap]");
                println!(
                    "  Log filter:         {}",
                    config.tap.log_filter.clone().unwrap_or_else(unset)
                );
                println!("  Level:              {}", config.tap.level);
                println!("  Absolute time:      {}", config.tap.absolute_time);
                println!(
                    "  Drop filter:        {}",
                    config.tap.filter_realtime.clone().unwrap_or_else(unset)
                );
                println!("  Thaw ICE:           {}", config.tap.thaw_ice);
                println!(
                    "  Refreeze (ms):      {}",
                    config
                        .tap
                        .refreeze_ms
                        .map_or_else(unset, |ms| ms.to_string())
                );
                println!();
                println!("[Discovery]");
                println!(
                    "  Poll interval (ms): {}",
                    config.discovery.poll_interval_ms
                );
                println!("  Max attempts:       {}", config.discovery.max_attempts);
                println!();
                println!("[Storage]");
                println!("  Database path:      {}", config.database_path().display());
            }
        }
        ConfigCommand::Path => {
            println!("{}", Config::default_config_path().display());
        }
        ConfigCommand::Validate { file } => {
            let path = file.unwrap_or_else(Config::default_config_path);
            println!("Validating configuration: {}", path.display());
            match Config::load_from(Some(path)) {
                Ok(_) => println!("Configuration is valid."),
                Err(e) => println!("Configuration error: {e}"),
            }
        }
    }
    Ok(())
}
