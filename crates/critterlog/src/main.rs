//! `critterlog` - CLI for the wildlife sighting service
//!
//! This binary runs the HTTP API and offers maintenance commands that operate
//! directly on the sighting file.

#![warn(missing_debug_implementations)]
#![deny(unsafe_code)]

use anyhow::Context;
use clap::Parser;
use tracing::warn;

use critterlog::cli::{Cli, Command, ConfigCommand, ServeCommand, SightingsCommand};
use critterlog::server::{self, AppState};
use critterlog::{init_logging, Config, FlatFileStore, SightingStore};

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Initialize logging based on verbosity
    init_logging(cli.verbosity());

    // Maintenance commands work without a password, so only `serve` validates
    let config = Config::load_unchecked(cli.config.clone())?;

    // Execute the command
    match cli.command {
        Command::Serve(serve_cmd) => handle_serve(&config, &serve_cmd),
        Command::Sightings(sightings_cmd) => handle_sightings(&config, sightings_cmd),
        Command::Status(status_cmd) => handle_status(&config, status_cmd.json),
        Command::Config(config_cmd) => handle_config(&config, cli.config, config_cmd),
    }
}

fn handle_serve(config: &Config, cmd: &ServeCommand) -> anyhow::Result<()> {
    config.validate()?;
    let addr = match cmd.bind {
        Some(addr) => addr,
        None => config.bind_addr()?,
    };
    if !config.auth.enabled {
        warn!("Authentication is disabled; anyone who can reach {addr} can edit sightings");
    }

    let state = AppState::from_config(config)?;
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("failed to start the async runtime")?;
    runtime.block_on(server::serve(state, addr))?;
    Ok(())
}

fn handle_sightings(config: &Config, cmd: SightingsCommand) -> anyhow::Result<()> {
    let store = FlatFileStore::open(config.data_file())?;

    match cmd {
        SightingsCommand::List { json } => {
            let sightings = store.list()?;
            if json {
                println!("{}", serde_json::to_string_pretty(&sightings)?);
            } else if sightings.is_empty() {
                println!("No sightings logged.");
            } else {
                for s in &sightings {
                    println!(
                        "{}  {:<5}  {:>10.5}, {:>11.5}  {}",
                        s.created_at,
                        s.category.as_str(),
                        s.latitude,
                        s.longitude,
                        s.note
                    );
                }
                println!();
                println!("{} sighting(s)", sightings.len());
            }
        }
        SightingsCommand::Delete { time } => {
            store
                .delete_by_key(&time)
                .with_context(|| format!("could not delete sighting at {time}"))?;
            println!("Sighting deleted.");
        }
        SightingsCommand::Clear { yes } => {
            if yes {
                store.clear_all()?;
                println!("All sightings deleted.");
            } else {
                println!(
                    "This will delete every sighting in {}.",
                    store.path().display()
                );
                println!("Use --yes to confirm.");
            }
        }
    }
    Ok(())
}

fn handle_status(config: &Config, json: bool) -> anyhow::Result<()> {
    let store = FlatFileStore::open(config.data_file())?;
    let stats = store.stats()?;

    if json {
        let status = serde_json::json!({
            "data_file": store.path(),
            "total_sightings": stats.total_sightings,
            "skipped_lines": stats.skipped_lines,
            "oldest_sighting": stats.oldest_sighting,
            "newest_sighting": stats.newest_sighting,
            "file_size_bytes": stats.file_size_bytes,
        });
        println!("{}", serde_json::to_string_pretty(&status)?);
    } else {
        println!("critterlog status");
        println!("-----------------");
        println!("Data file:     {}", store.path().display());
        println!("Sightings:     {}", stats.total_sightings);
        println!("Skipped lines: {}", stats.skipped_lines);
        println!(
            "Oldest:        {}",
            stats.oldest_sighting.as_deref().unwrap_or("-")
        );
        println!(
            "Newest:        {}",
            stats.newest_sighting.as_deref().unwrap_or("-")
        );
        println!("File size:     {} bytes", stats.file_size_bytes);
    }
    Ok(())
}

fn handle_config(
    config: &Config,
    config_path: Option<std::path::PathBuf>,
    cmd: ConfigCommand,
) -> anyhow::Result<()> {
    match cmd {
        ConfigCommand::Show { json } => {
            let shown = config.redacted();
            if json {
                println!("{}", serde_json::to_string_pretty(&shown)?);
            } else {
                println!("Current Configuration");
                println!("=====================");
                println!();
                println!("[Server]");
                println!("  Bind address:       {}", shown.server.bind_addr);
                println!("  Max body (bytes):   {}", shown.server.max_body_bytes);
                println!();
                println!("[Storage]");
                println!("  Data file:          {}", shown.data_file().display());
                println!();
                println!("[Auth]");
                println!("  Enabled:            {}", shown.auth.enabled);
                println!(
                    "  Password:           {}",
                    shown.auth.password.as_deref().unwrap_or("(unset)")
                );
                println!(
                    "  Mass delete pass:   {}",
                    shown.auth.mass_delete_password.as_deref().unwrap_or("(unset)")
                );
                println!(
                    "  Session secret:     {}",
                    shown.auth.session_secret.as_deref().unwrap_or("(random)")
                );
                println!("  Session TTL (h):    {}", shown.auth.session_ttl_hours);
            }
        }
        ConfigCommand::Path => {
            let path = config_path.unwrap_or_else(Config::default_config_path);
            println!("{}", path.display());
        }
        ConfigCommand::Validate { file } => {
            let path = file
                .or(config_path)
                .unwrap_or_else(Config::default_config_path);
            println!("Validating configuration: {}", path.display());
            Config::load_from(Some(path)).context("configuration error")?;
            println!("Configuration is valid.");
        }
    }
    Ok(())
}
