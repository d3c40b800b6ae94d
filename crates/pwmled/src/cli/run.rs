//! `run` subcommand — activate every LED on the sysfs backend and hold.

use std::path::{Path, PathBuf};
use std::sync::atomic::Ordering;
use std::time::Duration;

use pwmled_lib::config::LedSource;
use pwmled_lib::driver::{self, DriverSet};
use pwmled_lib::pwm::SysfsPwm;
use pwmled_lib::registry::LedTable;
use pwmled_lib::retry::{self, Attempt, ProbeRetry};

use super::{RUNNING, Result, RunOutput};

pub(super) struct RunOptions {
    pub sysfs_root: PathBuf,
    pub brightness: Vec<(String, u32)>,
    pub color: Vec<(String, Vec<u32>)>,
}

pub(super) fn cmd_run(json: bool, custom_path: Option<&Path>, opts: &RunOptions) -> Result<()> {
    let (path, config) = super::load_config(custom_path)?;
    let source = config.source()?;
    let provider = SysfsPwm::new(&opts.sysfs_root).with_lookup(config.lookup_table()?);
    let mut registry = LedTable::new();
    log::info!("[config] {} ({} source)", path.display(), source.kind_name());

    let Some(mut set) = activate(&provider, &mut registry, &source)? else {
        println!("Interrupted before activation.");
        return Ok(());
    };

    let applied = apply_requests(&mut set, opts);
    if applied.is_ok() {
        if json {
            let output = RunOutput {
                sysfs_root: opts.sysfs_root.display().to_string(),
                leds: registry.entries().to_vec(),
            };
            println!(
                "{}",
                serde_json::to_string_pretty(&output).map_err(std::io::Error::other)?
            );
        } else {
            for led in set.leds() {
                println!(
                    "[led] {} ({}, brightness {}/{})",
                    led.name(),
                    led.kind(),
                    led.brightness(),
                    led.max_brightness()
                );
            }
            println!("Running. Press Ctrl+C to stop.");
        }

        while RUNNING.load(Ordering::SeqCst) {
            std::thread::sleep(Duration::from_millis(250));
        }
    }

    set.remove(&mut registry);
    if !json && applied.is_ok() {
        println!("Released all LEDs.");
    }
    applied
}

/// Re-run activation until it succeeds, fails for good, or Ctrl+C.
/// `Ok(None)` means interrupted.
fn activate(
    provider: &SysfsPwm,
    registry: &mut LedTable,
    source: &LedSource<'_>,
) -> Result<Option<DriverSet>> {
    let mut backoff = ProbeRetry::with_defaults();
    while RUNNING.load(Ordering::SeqCst) {
        match retry::attempt(&mut backoff, || driver::probe(provider, registry, source)) {
            Attempt::Done(result) => return result.map(Some),
            Attempt::Deferred(e) => {
                if backoff.consecutive_failures() == 1 {
                    println!("Waiting for PWM controller ({e})...");
                }
            }
            Attempt::Waiting => {}
        }
        std::thread::sleep(Duration::from_millis(100));
    }
    Ok(None)
}

fn apply_requests(set: &mut DriverSet, opts: &RunOptions) -> Result<()> {
    for (name, level) in &opts.brightness {
        set.set_brightness(name, *level)?;
    }
    for (name, values) in &opts.color {
        set.set_color(name, values)?;
    }
    Ok(())
}

/// Parse `NAME=LEVEL`.
pub(super) fn parse_level(s: &str) -> std::result::Result<(String, u32), String> {
    let (name, level) = split_assignment(s)?;
    let level = level
        .parse::<u32>()
        .map_err(|_| format!("invalid level '{level}' (expected a non-negative integer)"))?;
    Ok((name, level))
}

/// Parse `NAME=V1,V2,...`.
pub(super) fn parse_color(s: &str) -> std::result::Result<(String, Vec<u32>), String> {
    let (name, list) = split_assignment(s)?;
    let values = list
        .split(',')
        .map(|v| {
            v.trim()
                .parse::<u32>()
                .map_err(|_| format!("invalid color value '{}'", v.trim()))
        })
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok((name, values))
}

fn split_assignment(s: &str) -> std::result::Result<(String, &str), String> {
    let Some((name, value)) = s.split_once('=') else {
        return Err(format!("expected NAME=VALUE, got '{s}'"));
    };
    let name = name.trim();
    if name.is_empty() {
        return Err("LED name is empty".into());
    }
    Ok((name.to_string(), value.trim()))
}
