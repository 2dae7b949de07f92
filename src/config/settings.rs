use anyhow::{Context, Result};
use clap::Parser;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use dchan_core::{IoLoopConfig, TxPolicy};

/// Command line arguments
#[derive(Parser, Debug)]
#[command(author, version, about = "Interactive D-channel / UART console")]
pub struct Config {
    /// D-channel device (e.g. s1c2) or path to a character device
    #[arg(long = "dev", value_name = "DEVICE")]
    pub device: String,

    /// Verbose mode (prints \r, \n and other characters that are normally stripped)
    #[arg(short, long)]
    pub verbose: bool,

    /// Do not send \r on transmission
    #[arg(long = "no-cr", visible_alias = "nr")]
    pub no_cr: bool,

    /// Enable debug logging
    #[arg(short, long)]
    pub debug: bool,

    /// Path to config file
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Device wait timeout in milliseconds
    #[arg(long)]
    pub wait_timeout: Option<u64>,
}

impl Config {
    /// Parse command line arguments
    pub fn parse_args() -> Self {
        Self::parse()
    }
}

/// Console settings (from config file)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Settings {
    /// Show \r and \n instead of stripping them
    #[serde(default)]
    pub verbose: bool,

    /// Append \r to every transmitted line
    #[serde(default = "default_append_cr")]
    pub append_cr: bool,

    /// Upper bound of one device wait in milliseconds
    #[serde(default = "default_wait_timeout")]
    pub wait_timeout_ms: u64,

    /// How often the prompt re-checks for a free transmit slot (milliseconds)
    #[serde(default = "default_input_poll")]
    pub input_poll_ms: u64,

    /// Transmit slot size in bytes, one byte is reserved for \r
    #[serde(default = "default_mailbox_capacity")]
    pub mailbox_capacity: usize,

    /// Largest frame read from the device at once
    #[serde(default = "default_max_frame")]
    pub max_frame: usize,

    /// Prompt shown while waiting for a line
    #[serde(default = "default_prompt")]
    pub prompt: String,
}

fn default_append_cr() -> bool {
    true
}

fn default_wait_timeout() -> u64 {
    10
}

fn default_input_poll() -> u64 {
    100
}

fn default_mailbox_capacity() -> usize {
    512
}

fn default_max_frame() -> usize {
    512
}

fn default_prompt() -> String {
    "Ready >> ".to_string()
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            verbose: false,
            append_cr: default_append_cr(),
            wait_timeout_ms: default_wait_timeout(),
            input_poll_ms: default_input_poll(),
            mailbox_capacity: default_mailbox_capacity(),
            max_frame: default_max_frame(),
            prompt: default_prompt(),
        }
    }
}

impl Settings {
    /// Load settings from config file or use defaults
    pub fn load(path: Option<&PathBuf>) -> Result<Self> {
        // An explicit path must exist
        if let Some(p) = path {
            return Self::read_file(p);
        }

        let default_paths = [
            dirs::config_dir().map(|p| p.join("dchan/config.toml")),
            dirs::home_dir().map(|p| p.join(".config/dchan/config.toml")),
            dirs::home_dir().map(|p| p.join(".dchan.toml")),
        ];

        for path in default_paths.iter().flatten() {
            if path.exists() {
                return Self::read_file(path);
            }
        }

        Ok(Self::default())
    }

    fn read_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {:?}", path))?;
        let settings = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {:?}", path))?;
        tracing::debug!("Loaded settings from {:?}", path);
        Ok(settings)
    }

    /// Merge CLI config into settings (CLI takes precedence)
    pub fn merge_cli(&mut self, cli: &Config) {
        if cli.verbose {
            self.verbose = true;
        }
        if cli.no_cr {
            self.append_cr = false;
        }
        if let Some(wait_timeout) = cli.wait_timeout {
            self.wait_timeout_ms = wait_timeout;
        }
    }

    /// Validate and normalize settings values
    ///
    /// Zero intervals would turn both loops into busy spins.
    pub fn validate(&mut self) {
        const MIN_INTERVAL: u64 = 1;
        const MIN_CAPACITY: usize = 2;
        const MIN_FRAME: usize = 1;

        if self.wait_timeout_ms < MIN_INTERVAL {
            self.wait_timeout_ms = MIN_INTERVAL;
        }
        if self.input_poll_ms < MIN_INTERVAL {
            self.input_poll_ms = MIN_INTERVAL;
        }
        if self.mailbox_capacity < MIN_CAPACITY {
            self.mailbox_capacity = MIN_CAPACITY;
        }
        if self.max_frame < MIN_FRAME {
            self.max_frame = MIN_FRAME;
        }
    }

    pub fn io_loop_config(&self) -> IoLoopConfig {
        IoLoopConfig {
            wait_timeout: Duration::from_millis(self.wait_timeout_ms),
            max_frame: self.max_frame,
            verbose: self.verbose,
        }
    }

    pub fn tx_policy(&self) -> TxPolicy {
        TxPolicy {
            append_cr: self.append_cr,
        }
    }

    pub fn input_poll_interval(&self) -> Duration {
        Duration::from_millis(self.input_poll_ms)
    }
}
