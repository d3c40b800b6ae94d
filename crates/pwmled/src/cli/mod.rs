//! CLI subcommands — configuration check, paths, LED activation.

mod check;
mod config_cmd;
mod run;

use std::path::{Path, PathBuf};

use clap::Subcommand;
use serde::Serialize;

pub(super) use crate::RUNNING;
pub(super) use pwmled_lib::config::Config;
pub(super) use pwmled_lib::error::{PwmLedError, Result};
pub(super) use pwmled_lib::led::LedKind;
pub(super) use pwmled_lib::registry::RegisteredLed;

const PADDING: usize = 2;

/// Compute alignment width for a command's key-value output.
/// Ensures at least PADDING spaces after the longest key in either level,
/// with top-level and indent values aligned to the same column.
pub(super) fn kv_width(top: &[&str], indent: &[&str]) -> usize {
    let top_max = top.iter().map(|k| k.len()).max().unwrap_or(0);
    let indent_max = indent.iter().map(|k| k.len()).max().unwrap_or(0);
    let top_need = if top.is_empty() { 0 } else { top_max + PADDING };
    // Indent keys lose 2 chars of inner width to the "  " prefix
    let indent_need = if indent.is_empty() {
        0
    } else {
        indent_max + PADDING + 2
    };
    top_need.max(indent_need)
}

pub(super) fn format_kv(key: &str, value: impl std::fmt::Display, w: usize) -> String {
    format!("{key:<width$}{value}", width = w)
}

pub(super) fn kv(key: &str, value: impl std::fmt::Display, w: usize) {
    println!("{}", format_kv(key, value, w));
}

pub(super) fn kv_indent(key: &str, value: impl std::fmt::Display, w: usize) {
    println!("  {key:<width$}{value}", width = w - 2);
}

/// `--config` if given, else the platform default.
pub(super) fn config_path(custom: Option<&Path>) -> Option<PathBuf> {
    custom.map(Path::to_path_buf).or_else(Config::path)
}

/// Load the config file. Unlike a settings file, a missing LED description
/// is an error.
pub(super) fn load_config(custom: Option<&Path>) -> Result<(PathBuf, Config)> {
    let Some(path) = config_path(custom) else {
        return Err(PwmLedError::Config(
            "no config directory; pass --config".into(),
        ));
    };
    let config = Config::load_from(&path)?;
    Ok((path, config))
}

// ── JSON output structs ──

#[derive(Serialize)]
pub(super) struct CheckOutput {
    pub config_file: String,
    pub source: String,
    pub leds: Vec<LedSummaryJson>,
}

#[derive(Debug, Serialize)]
pub(super) struct LedSummaryJson {
    pub name: String,
    pub kind: LedKind,
    pub default_trigger: Option<String>,
    pub max_brightness: u32,
    pub channels: Vec<ChannelJson>,
}

#[derive(Debug, Serialize)]
pub(super) struct ChannelJson {
    pub color: String,
    pub max_value: u32,
    pub active_low: bool,
    pub pwm: Option<String>,
}

#[derive(Serialize)]
pub(super) struct ConfigOutput {
    pub config_file: Option<String>,
    pub config_file_exists: bool,
    pub source: Option<String>,
    pub led_count: Option<usize>,
    pub error: Option<String>,
}

#[derive(Serialize)]
pub(super) struct RunOutput {
    pub sysfs_root: String,
    pub leds: Vec<RegisteredLed>,
}

#[derive(Subcommand)]
pub enum Command {
    /// Validate the configuration and list the LEDs it describes (no hardware access)
    Check,

    /// Show the configuration file path and what it defines
    Config,

    /// Activate every configured LED on the sysfs PWM backend and hold until Ctrl+C
    Run {
        /// sysfs PWM class directory
        #[arg(long, value_name = "DIR", default_value = pwmled_lib::pwm::DEFAULT_SYSFS_ROOT)]
        sysfs_root: PathBuf,
        /// Set an LED's brightness once active (repeatable)
        #[arg(long = "brightness", value_name = "NAME=LEVEL", value_parser = run::parse_level)]
        brightness: Vec<(String, u32)>,
        /// Set an LED's color values, one per channel (repeatable)
        #[arg(long = "color", value_name = "NAME=V1,V2,...", value_parser = run::parse_color)]
        color: Vec<(String, Vec<u32>)>,
    },
}

pub fn run(cmd: Command, json: bool, config: Option<&Path>) -> Result<()> {
    match cmd {
        Command::Check => check::cmd_check(json, config),
        Command::Config => config_cmd::cmd_config(json, config),
        Command::Run {
            sysfs_root,
            brightness,
            color,
        } => run::cmd_run(
            json,
            config,
            &run::RunOptions {
                sysfs_root,
                brightness,
                color,
            },
        ),
    }
}

#[cfg(test)]
mod format_tests {
    use super::*;

    #[test]
    fn kv_width_top_only() {
        let w = kv_width(&["Short:", "Longer key:"], &[]);
        // "Longer key:" = 11 + PADDING = 13
        assert_eq!(w, 13);
    }

    #[test]
    fn kv_width_indent_drives_width() {
        let w = kv_width(&["A:"], &["Max brightness:"]);
        // 15 + PADDING + 2 = 19
        assert_eq!(w, 19);
    }

    #[test]
    fn kv_width_empty_both() {
        assert_eq!(kv_width(&[], &[]), 0);
    }

    #[test]
    fn values_align_across_levels() {
        let w = kv_width(&["Source:"], &["Channels:"]);
        let top = format_kv("Source:", "V", w);
        let indent = format!("  {:<width$}{}", "Channels:", "V", width = w - 2);
        assert_eq!(top.find('V'), indent.find('V'));
    }

    #[test]
    fn format_kv_overlong_key_is_not_padded() {
        assert_eq!(format_kv("Config file:", "x", 4), "Config file:x");
    }
}
