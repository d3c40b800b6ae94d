//! Hierarchical device description — named nodes with typed properties.
//!
//! In TOML a node is a table with an optional `name`, an ordered `[[child]]`
//! array and any number of properties. Array order is child order.
//!
//! ```toml
//! [tree]
//! [[tree.child]]
//! name = "led-0"
//! label = "power"
//! max-brightness = 255
//! pwms = "pwmchip0:0:1000000"
//! ```

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{PwmLedError, Result};

/// A property value. Integers must fit in 32 bits.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PropValue {
    Bool(bool),
    U32(u32),
    String(String),
}

impl From<bool> for PropValue {
    fn from(v: bool) -> Self {
        PropValue::Bool(v)
    }
}

impl From<u32> for PropValue {
    fn from(v: u32) -> Self {
        PropValue::U32(v)
    }
}

impl From<&str> for PropValue {
    fn from(v: &str) -> Self {
        PropValue::String(v.to_string())
    }
}

impl From<String> for PropValue {
    fn from(v: String) -> Self {
        PropValue::String(v)
    }
}

impl fmt::Display for PropValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PropValue::Bool(v) => write!(f, "{v}"),
            PropValue::U32(v) => write!(f, "{v}"),
            PropValue::String(v) => write!(f, "\"{v}\""),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Node {
    #[serde(default)]
    name: String,
    #[serde(default, rename = "child", skip_serializing_if = "Vec::is_empty")]
    children: Vec<Node>,
    #[serde(flatten)]
    properties: BTreeMap<String, PropValue>,
}

impl Node {
    pub fn new(name: impl Into<String>) -> Self {
        Node {
            name: name.into(),
            ..Node::default()
        }
    }

    /// Builder-style property setter.
    pub fn with_property(mut self, key: &str, value: impl Into<PropValue>) -> Self {
        self.properties.insert(key.to_string(), value.into());
        self
    }

    /// Builder-style child append.
    pub fn with_child(mut self, child: Node) -> Self {
        self.children.push(child);
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn children(&self) -> &[Node] {
        &self.children
    }

    pub fn property(&self, key: &str) -> Option<&PropValue> {
        self.properties.get(key)
    }

    /// Read a string property. `Ok(None)` if absent.
    pub fn read_string(&self, key: &str) -> Result<Option<&str>> {
        match self.property(key) {
            None => Ok(None),
            Some(PropValue::String(s)) => Ok(Some(s)),
            Some(other) => Err(self.type_error(key, "a string", other)),
        }
    }

    /// Read a 32-bit unsigned property. `Ok(None)` if absent.
    pub fn read_u32(&self, key: &str) -> Result<Option<u32>> {
        match self.property(key) {
            None => Ok(None),
            Some(PropValue::U32(v)) => Ok(Some(*v)),
            Some(other) => Err(self.type_error(key, "an integer", other)),
        }
    }

    /// Read a boolean property. Absent reads as `false`.
    pub fn read_bool(&self, key: &str) -> Result<bool> {
        match self.property(key) {
            None => Ok(false),
            Some(PropValue::Bool(v)) => Ok(*v),
            Some(other) => Err(self.type_error(key, "a boolean", other)),
        }
    }

    fn type_error(&self, key: &str, expected: &str, found: &PropValue) -> PwmLedError {
        PwmLedError::Config(format!(
            "{}: property '{key}' must be {expected}, got {found}",
            self.display_name()
        ))
    }

    fn display_name(&self) -> &str {
        if self.name.is_empty() { "/" } else { &self.name }
    }
}

impl fmt::Display for Node {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.display_name())
    }
}
