//! CLI command execution helpers with automatic timing
//!
//! Wraps the `hitgate` binary built for this test run, isolates it from
//! the user's config file and measures how long each invocation takes.

use anyhow::{Context, Result};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::process::{Child, Command, Stdio};
use std::time::{Duration, Instant};

/// CLI command builder with timing
pub struct HitgateCommand {
    working_dir: PathBuf,
    args: Vec<String>,
    env: HashMap<String, String>,
    stdin_data: Option<String>,
}

impl HitgateCommand {
    /// Create a new command in the given working directory
    ///
    /// `HITGATE_CONFIG` points into the working directory so tests never
    /// read the real user configuration.
    pub fn new(working_dir: impl AsRef<Path>) -> Self {
        let working_dir = working_dir.as_ref().to_path_buf();
        let mut env = HashMap::new();
        env.insert(
            "HITGATE_CONFIG".to_string(),
            working_dir.join("config.toml").to_string_lossy().to_string(),
        );

        Self {
            working_dir,
            args: Vec::new(),
            env,
            stdin_data: None,
        }
    }

    /// Add command arguments
    pub fn args(&mut self, args: &[&str]) -> &mut Self {
        self.args.extend(args.iter().map(|s| s.to_string()));
        self
    }

    /// Provide stdin data
    pub fn stdin(&mut self, data: &str) -> &mut Self {
        self.stdin_data = Some(data.to_string());
        self
    }

    /// Spawn the command, write any stdin data and close stdin
    ///
    /// The caller owns the child; use this when the test needs to signal
    /// or poll the process while it runs.
    pub fn spawn(&self) -> Result<Child> {
        let mut child = Command::new(env!("CARGO_BIN_EXE_hitgate"))
            .args(&self.args)
            .current_dir(&self.working_dir)
            .envs(&self.env)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .context("Failed to spawn hitgate")?;

        // Always close stdin so `run` sees EOF
        if let Some(mut stdin) = child.stdin.take() {
            if let Some(data) = &self.stdin_data {
                use std::io::Write;
                stdin.write_all(data.as_bytes())?;
            }
        }

        Ok(child)
    }

    /// Execute command and return result with timing
    pub fn execute(&self) -> Result<CommandResult> {
        let start = Instant::now();
        let child = self.spawn()?;

        let output = child
            .wait_with_output()
            .context("Failed to wait for hitgate")?;

        Ok(CommandResult {
            stdout: String::from_utf8_lossy(&output.stdout).to_string(),
            stderr: String::from_utf8_lossy(&output.stderr).to_string(),
            exit_code: output.status.code().unwrap_or(-1),
            duration: start.elapsed(),
        })
    }

    /// Execute and assert success
    pub fn assert_success(&self) -> Result<CommandResult> {
        let result = self.execute()?;

        if !result.success() {
            anyhow::bail!(
                "Command failed (exit code: {}):\nArgs: {:?}\nStdout: {}\nStderr: {}",
                result.exit_code,
                self.args,
                result.stdout,
                result.stderr
            );
        }

        Ok(result)
    }

    /// Execute and expect failure
    pub fn assert_failure(&self) -> Result<CommandResult> {
        let result = self.execute()?;

        if result.success() {
            anyhow::bail!(
                "Command should have failed but succeeded:\nArgs: {:?}\nStdout: {}",
                self.args,
                result.stdout
            );
        }

        Ok(result)
    }
}

/// Command execution result with timing
#[derive(Debug, Clone)]
pub struct CommandResult {
    pub stdout: String,
    pub stderr: String,
    pub exit_code: i32,
    pub duration: Duration,
}

impl CommandResult {
    /// Check if command succeeded
    pub fn success(&self) -> bool {
        self.exit_code == 0
    }

    /// Check if stdout contains text
    pub fn contains_stdout(&self, text: &str) -> bool {
        self.stdout.contains(text)
    }

    /// Check if stderr contains text
    pub fn contains_stderr(&self, text: &str) -> bool {
        self.stderr.contains(text)
    }

    /// Number of `fired #N` lines printed by `hitgate run`
    pub fn fired_count(&self) -> usize {
        self.stdout
            .lines()
            .filter(|line| line.starts_with("fired #"))
            .count()
    }

    /// Parse the JSON document printed after any `fired` lines
    pub fn json(&self) -> Result<serde_json::Value> {
        let start = self
            .stdout
            .find('{')
            .context("No JSON object in stdout")?;
        serde_json::from_str(&self.stdout[start..]).context("Failed to parse JSON output")
    }
}

/// Macro for convenient command construction
///
/// Usage:
/// ```ignore
/// hitgate!(dir, "config", "show").assert_success()?;
/// hitgate!(dir, "run", "--json").stdin("a\nb\n").assert_success()?;
/// ```
#[macro_export]
macro_rules! hitgate {
    ($dir:expr, $($arg:expr),*) => {{
        let mut cmd = $crate::common::cli::HitgateCommand::new($dir);
        cmd.args(&[$($arg),*]);
        cmd
    }};
}

#[cfg(test)]
mod tests {
    use super::*;

    fn result(stdout: &str) -> CommandResult {
        CommandResult {
            stdout: stdout.to_string(),
            stderr: String::new(),
            exit_code: 0,
            duration: Duration::from_millis(10),
        }
    }

    #[test]
    fn test_fired_count() {
        let output = result("fired #1 at +200ms\nfired #2 at +512ms\nGate Summary\n");
        assert_eq!(output.fired_count(), 2);
    }

    #[test]
    fn test_json_after_fired_lines() {
        let output = result("fired #1 at +200ms\n{\"stats\": {\"hits\": 3}}\n");
        assert_eq!(output.json().unwrap()["stats"]["hits"], 3);
    }
}
