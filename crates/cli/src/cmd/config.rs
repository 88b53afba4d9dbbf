//! Configuration management command
//!
//! Provides CLI interface to view and edit the gate configuration file.

use crate::settings::{self, Settings};
use anyhow::{Context, Result};
use owo_colors::OwoColorize;
use std::path::Path;

/// Show the effective configuration
pub async fn run_show(config: Option<&Path>, json: bool) -> Result<()> {
    let path = settings::resolve_path(config)?;
    let settings = settings::load_from(&path)?;

    if json {
        println!("{}", serde_json::to_string_pretty(&settings)?);
        return Ok(());
    }

    let gate = &settings.gate;
    println!("{}", "Gate Configuration".bold());
    println!("{}: {}", "Location".dimmed(), path.display().dimmed());
    if !path.exists() {
        println!("{}", "(file does not exist, showing defaults)".dimmed());
    }
    println!();

    println!("{}", "[gate]".yellow());
    println!("  {} = {}", "delay_ms".cyan(), gate.delay.as_millis());
    println!(
        "  {} = {} {}",
        "rolling_bump_ms".cyan(),
        gate.rolling_bump.as_millis(),
        disabled_if_zero(gate.rolling_bump.is_zero())
    );
    println!(
        "  {} = {} {}",
        "rolling_max_ms".cyan(),
        gate.rolling_max.as_millis(),
        if gate.rolling_max.is_zero() {
            "(no ceiling)".dimmed().to_string()
        } else {
            String::new()
        }
    );
    println!(
        "  {} = {} {}",
        "cool_time_ms".cyan(),
        gate.cool_time.as_millis(),
        disabled_if_zero(gate.cool_time.is_zero())
    );
    println!("  {} = {}", "trailing".cyan(), gate.trailing);
    println!("  {} = {}", "wait".cyan(), gate.wait);

    Ok(())
}

fn disabled_if_zero(zero: bool) -> String {
    if zero {
        "(disabled)".dimmed().to_string()
    } else {
        String::new()
    }
}

/// Get a single configuration value
pub async fn run_get(config: Option<&Path>, key: &str) -> Result<()> {
    let path = settings::resolve_path(config)?;
    let settings = settings::load_from(&path)?;
    println!("{}", settings.get(key)?);
    Ok(())
}

/// Set a configuration value
pub async fn run_set(config: Option<&Path>, key: &str, value: &str) -> Result<()> {
    let path = settings::resolve_path(config)?;
    let mut settings = settings::load_from(&path)?;

    settings.set(key, value)?;
    settings::save_to(&settings, &path)?;

    println!("{} {} = {}", "✓".green(), key.cyan(), value);
    Ok(())
}

/// Show the config file path and optionally create it
pub async fn run_path(create: bool) -> Result<()> {
    let config_path = settings::config_file_path()
        .context("Could not determine config file path")?;

    if create && settings::init_if_missing(&config_path)? {
        println!("{} Created config file at: {}", "✓".green(), config_path.display());
    } else if config_path.exists() {
        println!("{}", config_path.display());
    } else {
        println!("{}", config_path.display());
        println!("{}", "File does not exist. Use --create to create it.".yellow());
    }

    Ok(())
}

/// Show example configuration
pub async fn run_example() -> Result<()> {
    print!("{}", settings::example_config());
    Ok(())
}

/// Check a configuration file without running anything
pub async fn run_validate(config: Option<&Path>) -> Result<()> {
    let path = settings::resolve_path(config)?;
    let settings: Settings = settings::load_from(&path)?;

    settings
        .gate
        .validate()
        .with_context(|| format!("Invalid configuration in {}", path.display()))?;

    println!("{} {} is valid", "✓".green(), path.display());
    Ok(())
}
