//! Stepper configuration
//!
//! Every field has a default, so an empty YAML document is a valid config.
//! Environment variables overlay whatever was loaded:
//! - `STEPPER_LIVE` (`auto`, `always`, `never`)
//! - `STEPPER_COLOR` (`auto`, `always`, `never`)
//! - `STEPPER_REFRESH_MS`
//! - `STEPPER_PAINT_TIMEOUT_MS`
//! - `NO_COLOR` (any value disables color)

use serde::{Deserialize, Serialize};
use std::io::IsTerminal;
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;

use crate::error::{Result, StepperError};

/// Braille spinner used while a task runs
pub const DEFAULT_SPINNER: [&str; 10] = ["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏"];

/// Whether a feature is forced on, forced off, or follows the terminal
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Toggle {
    #[default]
    Auto,
    Always,
    Never,
}

impl Toggle {
    /// Resolve against whether stdout is a terminal
    pub fn resolve(self, is_tty: bool) -> bool {
        match self {
            Toggle::Auto => is_tty,
            Toggle::Always => true,
            Toggle::Never => false,
        }
    }
}

impl FromStr for Toggle {
    type Err = StepperError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "auto" => Ok(Toggle::Auto),
            "always" | "on" | "true" | "1" => Ok(Toggle::Always),
            "never" | "off" | "false" | "0" => Ok(Toggle::Never),
            other => Err(StepperError::InvalidConfig(format!(
                "expected auto, always or never, got '{}'",
                other
            ))),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StepperConfig {
    /// Repaint cadence of the live display
    pub refresh_interval_ms: u64,
    /// Longest a finished task waits for the display to catch up
    pub paint_timeout_ms: u64,
    /// Live display mode
    pub live: Toggle,
    /// Colored output mode
    pub color: Toggle,
    /// Spinner frames, cycled once per repaint
    pub spinner: Vec<String>,
}

impl Default for StepperConfig {
    fn default() -> Self {
        Self {
            refresh_interval_ms: 100,
            paint_timeout_ms: 250,
            live: Toggle::Auto,
            color: Toggle::Auto,
            spinner: DEFAULT_SPINNER.iter().map(|s| s.to_string()).collect(),
        }
    }
}

impl StepperConfig {
    /// Parse a YAML document
    pub fn from_yaml_str(yaml: &str) -> Result<Self> {
        let config: StepperConfig = if yaml.trim().is_empty() {
            StepperConfig::default()
        } else {
            serde_yaml::from_str(yaml)?
        };
        config.validate()?;
        Ok(config)
    }

    /// Load a YAML file
    pub fn from_yaml_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|source| StepperError::ConfigFile {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_yaml_str(&content)
    }

    /// Defaults overlaid with environment variables
    pub fn from_env() -> Result<Self> {
        Self::default().with_env_overrides(|key| std::env::var(key).ok())
    }

    /// Overlay values from a variable lookup (normally `std::env::var`)
    pub fn with_env_overrides<F>(mut self, lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(live) = lookup("STEPPER_LIVE") {
            self.live = live.parse()?;
        }
        if let Some(color) = lookup("STEPPER_COLOR") {
            self.color = color.parse()?;
        }
        if lookup("NO_COLOR").is_some_and(|v| !v.is_empty()) {
            self.color = Toggle::Never;
        }
        if let Some(ms) = lookup("STEPPER_REFRESH_MS") {
            self.refresh_interval_ms = parse_millis("STEPPER_REFRESH_MS", &ms)?;
        }
        if let Some(ms) = lookup("STEPPER_PAINT_TIMEOUT_MS") {
            self.paint_timeout_ms = parse_millis("STEPPER_PAINT_TIMEOUT_MS", &ms)?;
        }
        self.validate()?;
        Ok(self)
    }

    pub fn validate(&self) -> Result<()> {
        if self.refresh_interval_ms == 0 {
            return Err(StepperError::InvalidConfig(
                "refresh_interval_ms must be greater than zero".to_string(),
            ));
        }
        if self.spinner.is_empty() {
            return Err(StepperError::InvalidConfig(
                "spinner needs at least one frame".to_string(),
            ));
        }
        Ok(())
    }

    pub fn refresh_interval(&self) -> Duration {
        Duration::from_millis(self.refresh_interval_ms)
    }

    pub fn paint_timeout(&self) -> Duration {
        Duration::from_millis(self.paint_timeout_ms)
    }

    /// Whether the live refresher should run, given the current stdout
    pub fn live_enabled(&self) -> bool {
        self.live.resolve(std::io::stdout().is_terminal())
    }

    pub fn color_enabled(&self) -> bool {
        self.color.resolve(std::io::stdout().is_terminal())
    }

    // Builder-style setters

    pub fn with_live(mut self, live: Toggle) -> Self {
        self.live = live;
        self
    }

    pub fn with_color(mut self, color: Toggle) -> Self {
        self.color = color;
        self
    }

    pub fn with_refresh_interval(mut self, interval: Duration) -> Self {
        self.refresh_interval_ms = interval.as_millis() as u64;
        self
    }

    pub fn with_paint_timeout(mut self, timeout: Duration) -> Self {
        self.paint_timeout_ms = timeout.as_millis() as u64;
        self
    }
}

fn parse_millis(key: &str, value: &str) -> Result<u64> {
    value
        .trim()
        .parse::<u64>()
        .map_err(|e| StepperError::InvalidConfig(format!("{}='{}': {}", key, value, e)))
}
