//! `check` subcommand — validate the configuration without touching hardware.

use std::collections::{HashMap, HashSet};
use std::path::Path;

use pwmled_lib::config::LedRecord;
use pwmled_lib::pwm::PwmRef;

use super::{
    ChannelJson, CheckOutput, LedKind, LedSummaryJson, PwmLedError, Result, kv, kv_indent,
    kv_width,
};

pub(super) fn cmd_check(json: bool, custom_path: Option<&Path>) -> Result<()> {
    let (path, config) = super::load_config(custom_path)?;
    let source = config.source()?;
    let lookup = config.lookup_table()?;
    let records = source.records()?;
    let leds = summarize(&records, &lookup)?;

    if json {
        let output = CheckOutput {
            config_file: path.display().to_string(),
            source: source.kind_name().to_string(),
            leds,
        };
        println!(
            "{}",
            serde_json::to_string_pretty(&output).map_err(std::io::Error::other)?
        );
        return Ok(());
    }

    let w = kv_width(
        &["Config file:", "Source:"],
        &["Kind:", "Trigger:", "Max brightness:", "Channel:"],
    );
    kv("Config file:", path.display(), w);
    kv(
        "Source:",
        format_args!("{} ({} LEDs)", source.kind_name(), leds.len()),
        w,
    );
    for led in &leds {
        println!();
        println!("{}", led.name);
        kv_indent("Kind:", led.kind, w);
        kv_indent(
            "Trigger:",
            led.default_trigger.as_deref().unwrap_or("(none)"),
            w,
        );
        kv_indent("Max brightness:", led.max_brightness, w);
        for ch in &led.channels {
            let polarity = if ch.active_low { ", active-low" } else { "" };
            kv_indent(
                "Channel:",
                format_args!(
                    "{} (max {}{polarity}) <- {}",
                    ch.color,
                    ch.max_value,
                    ch.pwm.as_deref().unwrap_or("(unresolved)")
                ),
                w,
            );
        }
    }
    println!();
    println!("OK");
    Ok(())
}

/// Everything the builder would reject before touching a PWM, reported
/// up front.
fn summarize(
    records: &[LedRecord<'_>],
    lookup: &HashMap<String, PwmRef>,
) -> Result<Vec<LedSummaryJson>> {
    if records.is_empty() {
        return Err(PwmLedError::Config("no LEDs defined".into()));
    }
    let mut seen = HashSet::new();
    let mut leds = Vec::with_capacity(records.len());
    for record in records {
        let led = &record.led;
        if led.name.trim().is_empty() {
            return Err(PwmLedError::Config("LED with empty name".into()));
        }
        if !seen.insert(led.name.as_str()) {
            return Err(PwmLedError::Config(format!(
                "duplicate LED name '{}'",
                led.name
            )));
        }
        if led.max_brightness == 0 {
            return Err(PwmLedError::InvalidLed {
                led: led.name.clone(),
                reason: "max-brightness must be non-zero".into(),
            });
        }

        let specs = record.channel_specs().map_err(|e| e.for_led(&led.name))?;
        let pwms: Vec<Option<String>> = match record.kind() {
            LedKind::Single => vec![match record.node {
                Some(node) => node.read_string("pwms")?.map(str::to_string),
                None => lookup.get(&led.name).map(PwmRef::to_string),
            }],
            LedKind::MultiColor => record
                .elements
                .iter()
                .map(|node| -> Result<Option<String>> {
                    Ok(node.read_string("pwms")?.map(str::to_string))
                })
                .collect::<Result<_>>()?,
        };

        leds.push(LedSummaryJson {
            name: led.name.clone(),
            kind: record.kind(),
            default_trigger: led.default_trigger.clone(),
            max_brightness: led.max_brightness,
            channels: specs
                .into_iter()
                .zip(pwms)
                .map(|(spec, pwm)| ChannelJson {
                    color: spec.color,
                    max_value: spec.max_value,
                    active_low: spec.active_low,
                    pwm,
                })
                .collect(),
        });
    }
    Ok(leds)
}
