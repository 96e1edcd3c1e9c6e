//! Configuration sections
//!
//! Free-form key/value trees carried in the volume header for application,
//! compression and encryption use. The archive only stores them.

use serde::{Deserialize, Serialize};

/// A scalar attribute value
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ConfigValue {
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
}

impl From<bool> for ConfigValue {
    fn from(v: bool) -> Self {
        ConfigValue::Bool(v)
    }
}

impl From<i64> for ConfigValue {
    fn from(v: i64) -> Self {
        ConfigValue::Int(v)
    }
}

impl From<i32> for ConfigValue {
    fn from(v: i32) -> Self {
        ConfigValue::Int(v as i64)
    }
}

impl From<f64> for ConfigValue {
    fn from(v: f64) -> Self {
        ConfigValue::Float(v)
    }
}

impl From<&str> for ConfigValue {
    fn from(v: &str) -> Self {
        ConfigValue::Text(v.to_string())
    }
}

impl From<String> for ConfigValue {
    fn from(v: String) -> Self {
        ConfigValue::Text(v)
    }
}

/// A node in a configuration tree.
///
/// Attributes and children keep insertion order; child names may repeat.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ConfigNode {
    pub name: String,
    pub attributes: Vec<(String, ConfigValue)>,
    pub children: Vec<ConfigNode>,
}

impl ConfigNode {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            attributes: Vec::new(),
            children: Vec::new(),
        }
    }

    /// Append a child node and return it for further population
    pub fn add_child(&mut self, name: impl Into<String>) -> &mut ConfigNode {
        self.children.push(ConfigNode::new(name));
        let last = self.children.len() - 1;
        &mut self.children[last]
    }

    /// Append an attribute
    pub fn add_attribute(&mut self, name: impl Into<String>, value: impl Into<ConfigValue>) -> &mut Self {
        self.attributes.push((name.into(), value.into()));
        self
    }

    /// First attribute with the given name
    pub fn attribute(&self, name: &str) -> Option<&ConfigValue> {
        self.attributes
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, v)| v)
    }

    /// All children with the given name, in insertion order
    pub fn children_named<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a ConfigNode> + 'a {
        self.children.iter().filter(move |c| c.name == name)
    }

    pub fn is_empty(&self) -> bool {
        self.attributes.is_empty() && self.children.is_empty()
    }
}
