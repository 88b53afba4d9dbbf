//! On-disk configuration for the hitgate binary
//!
//! The file is TOML with a single `[gate]` table mirroring
//! [`GateConfig`]. A missing file is not an error: defaults apply.

use anyhow::{Context, Result};
use gate::GateConfig;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Environment variable overriding the default config location
pub const CONFIG_ENV: &str = "HITGATE_CONFIG";

/// Top-level configuration file
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub gate: GateConfig,
}

/// Keys accepted by `config get` / `config set`
pub const KEYS: &[&str] = &[
    "gate.delay_ms",
    "gate.rolling_bump_ms",
    "gate.rolling_max_ms",
    "gate.cool_time_ms",
    "gate.trailing",
    "gate.wait",
];

fn unknown_key(key: &str) -> anyhow::Error {
    anyhow::anyhow!(
        "Unknown config key: {}. Valid keys: {}",
        key,
        KEYS.join(", ")
    )
}

impl Settings {
    /// Read a single value by dotted key
    pub fn get(&self, key: &str) -> Result<String> {
        let gate = &self.gate;
        let value = match key {
            "gate.delay_ms" => gate.delay.as_millis().to_string(),
            "gate.rolling_bump_ms" => gate.rolling_bump.as_millis().to_string(),
            "gate.rolling_max_ms" => gate.rolling_max.as_millis().to_string(),
            "gate.cool_time_ms" => gate.cool_time.as_millis().to_string(),
            "gate.trailing" => gate.trailing.to_string(),
            "gate.wait" => gate.wait.to_string(),
            _ => return Err(unknown_key(key)),
        };
        Ok(value)
    }

    /// Update a single value by dotted key, then validate
    pub fn set(&mut self, key: &str, value: &str) -> Result<()> {
        let gate = &mut self.gate;
        match key {
            "gate.delay_ms" => gate.delay = parse_millis(value)?,
            "gate.rolling_bump_ms" => gate.rolling_bump = parse_millis(value)?,
            "gate.rolling_max_ms" => gate.rolling_max = parse_millis(value)?,
            "gate.cool_time_ms" => gate.cool_time = parse_millis(value)?,
            "gate.trailing" => {
                gate.trailing = value
                    .parse()
                    .context("Invalid value: must be 'true' or 'false'")?
            }
            "gate.wait" => {
                gate.wait = value
                    .parse()
                    .context("Invalid value: must be 'true' or 'false'")?
            }
            _ => return Err(unknown_key(key)),
        }

        self.gate
            .validate()
            .context("Invalid configuration value")?;
        Ok(())
    }
}

fn parse_millis(value: &str) -> Result<std::time::Duration> {
    let millis: u64 = value
        .parse()
        .context("Invalid value: must be a non-negative integer (milliseconds)")?;
    Ok(std::time::Duration::from_millis(millis))
}

/// Default config file location
///
/// `$HITGATE_CONFIG` wins; otherwise `<config_dir>/hitgate/config.toml`.
pub fn config_file_path() -> Option<PathBuf> {
    if let Some(path) = std::env::var_os(CONFIG_ENV) {
        return Some(PathBuf::from(path));
    }
    dirs::config_dir().map(|dir| dir.join("hitgate").join("config.toml"))
}

/// Resolve the file to use: an explicit path, or the default location
pub fn resolve_path(explicit: Option<&Path>) -> Result<PathBuf> {
    match explicit {
        Some(path) => Ok(path.to_path_buf()),
        None => config_file_path().context("Could not determine config file path"),
    }
}

/// Load settings from `path`, falling back to defaults if it is missing
pub fn load_from(path: &Path) -> Result<Settings> {
    if !path.exists() {
        tracing::debug!("No config at {}, using defaults", path.display());
        return Ok(Settings::default());
    }

    let text = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file {}", path.display()))?;
    let settings: Settings = toml::from_str(&text)
        .with_context(|| format!("Failed to parse config file {}", path.display()))?;
    Ok(settings)
}

/// Write settings to `path`, creating parent directories
pub fn save_to(settings: &Settings, path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)
            .context("Failed to create config directory")?;
    }

    let text = toml::to_string_pretty(settings)
        .context("Failed to serialize configuration")?;
    std::fs::write(path, text)
        .with_context(|| format!("Failed to write config file {}", path.display()))?;
    Ok(())
}

/// Create the config file with the example contents if it does not exist
///
/// Returns `true` if a file was written.
pub fn init_if_missing(path: &Path) -> Result<bool> {
    if path.exists() {
        return Ok(false);
    }
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)
            .context("Failed to create config directory")?;
    }
    std::fs::write(path, example_config())
        .with_context(|| format!("Failed to write config file {}", path.display()))?;
    Ok(true)
}

/// Commented example configuration (all defaults)
pub fn example_config() -> String {
    r#"# hitgate configuration

[gate]
# Debounce window opened by the first hit
delay_ms = 200

# Extend the window by this much per extra hit (0 = disabled)
rolling_bump_ms = 0

# Never debounce longer than this from the first hit (0 = no ceiling)
rolling_max_ms = 0

# Quiet period after each run before the next cycle may start
cool_time_ms = 0

# Replay one hit that arrived while the job was running
trailing = true

# Wait for the command to exit before releasing the gate
wait = true
"#
    .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use tempfile::TempDir;

    #[test]
    fn test_example_matches_defaults() {
        let settings: Settings = toml::from_str(&example_config()).unwrap();
        assert_eq!(settings, Settings::default());
    }

    #[test]
    fn test_missing_file_uses_defaults() {
        let temp_dir = TempDir::new().unwrap();
        let settings = load_from(&temp_dir.path().join("absent.toml")).unwrap();
        assert_eq!(settings, Settings::default());
    }

    #[test]
    fn test_save_and_reload() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("nested/config.toml");

        let mut settings = Settings::default();
        settings.set("gate.rolling_bump_ms", "50").unwrap();
        settings.set("gate.wait", "false").unwrap();
        save_to(&settings, &path).unwrap();

        let reloaded = load_from(&path).unwrap();
        assert_eq!(reloaded.gate.rolling_bump, Duration::from_millis(50));
        assert!(!reloaded.gate.wait);
        assert_eq!(reloaded.get("gate.rolling_bump_ms").unwrap(), "50");
    }

    #[test]
    fn test_set_rejects_bad_values() {
        let mut settings = Settings::default();
        assert!(settings.set("gate.delay_ms", "-5").is_err());
        assert!(settings.set("gate.trailing", "maybe").is_err());
        assert!(settings.set("gate.unknown", "1").is_err());
        // Ceiling below the 200ms default delay
        assert!(settings.set("gate.rolling_max_ms", "100").is_err());
    }

    #[test]
    fn test_every_key_is_readable() {
        let settings = Settings::default();
        for key in KEYS {
            assert!(settings.get(key).is_ok(), "{} should be readable", key);
        }
    }

    #[test]
    fn test_unknown_key_lists_valid_keys() {
        let mut settings = Settings::default();
        for err in [
            settings.get("gate.delay").unwrap_err(),
            settings.set("delay_ms", "10").unwrap_err(),
        ] {
            let message = err.to_string();
            assert!(message.starts_with("Unknown config key"));
            for key in KEYS {
                assert!(message.contains(key), "{} missing from: {}", key, message);
            }
        }
    }

    #[test]
    fn test_init_if_missing() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("config.toml");

        assert!(init_if_missing(&path).unwrap());
        assert!(!init_if_missing(&path).unwrap());
        assert_eq!(load_from(&path).unwrap(), Settings::default());
    }
}
