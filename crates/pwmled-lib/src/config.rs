//! LED configuration — TOML file with either a static `[[led]]` table or a
//! `[tree]` device description, plus an optional PWM lookup table.

use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{PwmLedError, Result};
use crate::led::{LED_FULL, LedKind};
use crate::pwm::PwmRef;
use crate::tree::Node;

/// Child nodes whose name starts with this prefix are color elements.
pub const ELEMENT_PREFIX: &str = "element-";

// ── Records ──

/// One statically described LED.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedPwm {
    pub name: String,

    /// Trigger name handed to the registry untouched.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_trigger: Option<String>,

    /// Default: 255.
    #[serde(default = "default_max_brightness")]
    pub max_brightness: u32,

    #[serde(default)]
    pub active_low: bool,

    /// Period used when the PWM reports none. Monochrome LEDs only.
    #[serde(default)]
    pub pwm_period_ns: u32,
}

fn default_max_brightness() -> u32 {
    LED_FULL
}

impl Default for LedPwm {
    fn default() -> Self {
        LedPwm {
            name: String::new(),
            default_trigger: None,
            max_brightness: default_max_brightness(),
            active_low: false,
            pwm_period_ns: 0,
        }
    }
}

/// Channel metadata read from an `element-*` node.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChannelSpec {
    pub color: String,
    pub max_value: u32,
    pub active_low: bool,
}

impl ChannelSpec {
    /// `color` falls back to the node name without its `element-` prefix.
    /// `max-value` is required and must be non-zero.
    pub fn from_node(node: &Node) -> Result<Self> {
        let color = match node.read_string("color")? {
            Some(color) => color.to_string(),
            None => node
                .name()
                .strip_prefix(ELEMENT_PREFIX)
                .unwrap_or(node.name())
                .to_string(),
        };
        if color.trim().is_empty() {
            return Err(PwmLedError::Config(format!("{node}: empty color name")));
        }

        let max_value = match node.read_u32("max-value")? {
            Some(0) => {
                return Err(PwmLedError::Config(format!(
                    "{node}: 'max-value' must be non-zero"
                )));
            }
            Some(v) => v,
            None => {
                return Err(PwmLedError::Config(format!(
                    "{node}: missing required property 'max-value'"
                )));
            }
        };

        Ok(ChannelSpec {
            color,
            max_value,
            active_low: node.read_bool("active-low")?,
        })
    }
}

pub fn is_element_node(node: &Node) -> bool {
    node.name().starts_with(ELEMENT_PREFIX)
}

/// A configuration record resolved from either source, ready for the
/// device builder.
#[derive(Debug, Clone, PartialEq)]
pub struct LedRecord<'a> {
    pub led: LedPwm,
    /// Tree node the PWM is looked up through; `None` = look up by name.
    pub node: Option<&'a Node>,
    /// `element-*` children, in tree order. Non-empty selects multi-color.
    pub elements: Vec<&'a Node>,
}

impl<'a> LedRecord<'a> {
    pub fn from_static(led: &LedPwm) -> Self {
        LedRecord {
            led: led.clone(),
            node: None,
            elements: Vec::new(),
        }
    }

    /// Read one LED node of the tree.
    pub fn from_node(node: &'a Node) -> Result<Self> {
        let elements: Vec<&Node> = node.children().iter().filter(|c| is_element_node(c)).collect();

        let name = node.read_string("label")?.unwrap_or(node.name()).to_string();
        let default_trigger = node
            .read_string("linux,default-trigger")?
            .map(str::to_string);
        let max_brightness = node.read_u32("max-brightness")?.unwrap_or(LED_FULL);
        let active_low = if elements.is_empty() {
            node.read_bool("active-low")?
        } else {
            false
        };

        Ok(LedRecord {
            led: LedPwm {
                name,
                default_trigger,
                max_brightness,
                active_low,
                pwm_period_ns: 0,
            },
            node: Some(node),
            elements,
        })
    }

    pub fn kind(&self) -> LedKind {
        if self.elements.is_empty() {
            LedKind::Single
        } else {
            LedKind::MultiColor
        }
    }

    /// Channel metadata this record will produce, without touching any PWM.
    pub fn channel_specs(&self) -> Result<Vec<ChannelSpec>> {
        if self.elements.is_empty() {
            return Ok(vec![ChannelSpec {
                color: crate::led::SINGLE_CHANNEL.to_string(),
                max_value: self.led.max_brightness,
                active_low: self.led.active_low,
            }]);
        }
        self.elements
            .iter()
            .map(|node| ChannelSpec::from_node(node))
            .collect()
    }
}

// ── Sources ──

/// Where the LED records come from.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum LedSource<'a> {
    Static(&'a [LedPwm]),
    /// Every child of the root is one LED.
    Tree(&'a Node),
}

impl<'a> LedSource<'a> {
    /// Resolve every record in order.
    pub fn records(&self) -> Result<Vec<LedRecord<'a>>> {
        match *self {
            LedSource::Static(leds) => Ok(leds.iter().map(LedRecord::from_static).collect()),
            LedSource::Tree(root) => root.children().iter().map(LedRecord::from_node).collect(),
        }
    }

    pub fn kind_name(&self) -> &'static str {
        match self {
            LedSource::Static(_) => "static",
            LedSource::Tree(_) => "tree",
        }
    }
}

// ── File ──

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Config {
    /// Static LED table (`[[led]]`).
    #[serde(default, rename = "led", skip_serializing_if = "Vec::is_empty")]
    pub leds: Vec<LedPwm>,

    /// Device tree (`[tree]`).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tree: Option<Node>,

    /// Name → `"pwmchipN:channel[:period_ns[:inverted]]"`, for by-name lookups.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub pwm_lookup: BTreeMap<String, String>,
}

impl Config {
    /// Platform config directory.
    pub fn dir() -> Option<PathBuf> {
        dirs::config_dir().map(|p| p.join("pwmled"))
    }

    /// Default config file path.
    pub fn path() -> Option<PathBuf> {
        Self::dir().map(|d| d.join("leds.toml"))
    }

    /// Load from an arbitrary path. A missing or unparseable file is an error.
    pub fn load_from(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        Self::from_toml_str(&contents)
            .map_err(|e| PwmLedError::Config(format!("{}: {e}", path.display())))
    }

    pub fn from_toml_str(contents: &str) -> Result<Self> {
        toml::from_str(contents).map_err(|e| PwmLedError::Config(e.to_string()))
    }

    /// The single LED source this file defines.
    pub fn source(&self) -> Result<LedSource<'_>> {
        match (self.leds.is_empty(), &self.tree) {
            (false, Some(_)) => Err(PwmLedError::Config(
                "both [[led]] and [tree] are defined; use one".into(),
            )),
            (true, None) => Err(PwmLedError::Config(
                "no LEDs defined; add [[led]] entries or a [tree]".into(),
            )),
            (false, None) => Ok(LedSource::Static(&self.leds)),
            (true, Some(tree)) => Ok(LedSource::Tree(tree)),
        }
    }

    /// Parse every `[pwm_lookup]` entry.
    pub fn lookup_table(&self) -> Result<HashMap<String, PwmRef>> {
        self.pwm_lookup
            .iter()
            .map(|(name, reference)| {
                reference
                    .parse::<PwmRef>()
                    .map(|r| (name.clone(), r))
                    .map_err(|e| PwmLedError::Config(format!("pwm_lookup.{name}: {e}")))
            })
            .collect()
    }
}
