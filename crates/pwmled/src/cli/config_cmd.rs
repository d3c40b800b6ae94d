//! `config` subcommand — show the configuration file and what it defines.

use std::path::Path;

use super::{Config, ConfigOutput, Result, kv, kv_width};

pub(super) fn cmd_config(json: bool, custom_path: Option<&Path>) -> Result<()> {
    let config_path = super::config_path(custom_path);
    let config_exists = config_path.as_ref().is_some_and(|p| p.exists());

    // (source kind, LED count) or the reason the file is unusable.
    let summary = match &config_path {
        Some(p) if config_exists => Some(
            Config::load_from(p)
                .and_then(|config| {
                    let source = config.source()?;
                    let count = source.records()?.len();
                    Ok((source.kind_name().to_string(), count))
                })
                .map_err(|e| e.to_string()),
        ),
        _ => None,
    };

    if json {
        let (source, led_count, error) = match summary {
            Some(Ok((source, count))) => (Some(source), Some(count), None),
            Some(Err(e)) => (None, None, Some(e)),
            None => (None, None, None),
        };
        let output = ConfigOutput {
            config_file: config_path.as_ref().map(|p| p.display().to_string()),
            config_file_exists: config_exists,
            source,
            led_count,
            error,
        };
        println!(
            "{}",
            serde_json::to_string_pretty(&output).map_err(std::io::Error::other)?
        );
        return Ok(());
    }

    let w = kv_width(&["Config file:", "Source:", "LEDs:", "Problem:"], &[]);
    match &config_path {
        Some(p) if config_exists => kv("Config file:", format_args!("{} (found)", p.display()), w),
        Some(p) => kv("Config file:", format_args!("{} (not found)", p.display()), w),
        None => kv("Config file:", "(no config directory)", w),
    }
    match summary {
        Some(Ok((source, count))) => {
            kv("Source:", source, w);
            kv("LEDs:", count, w);
        }
        Some(Err(e)) => kv("Problem:", e, w),
        None => {}
    }
    Ok(())
}
