use crate::footprint::Footprint;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Which catalog table a record belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecordKind {
    Dataset,
    Granule,
}

impl fmt::Display for RecordKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RecordKind::Dataset => write!(f, "dataset"),
            RecordKind::Granule => write!(f, "granule"),
        }
    }
}

/// Catalog identifier of a record (a CMR concept id or granule id).
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RecordId(String);

impl RecordId {
    pub fn new<S: Into<String>>(id: S) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for RecordId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

impl From<String> for RecordId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

impl fmt::Display for RecordId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A typed attribute value: title, time range bound, URL, keyword list, ...
///
/// Lists and maps nest, so CMR columns such as science keywords keep their
/// structure.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum AttrValue {
    Null,
    Bool(bool),
    Number(f64),
    Text(String),
    List(Vec<AttrValue>),
    Map(BTreeMap<String, AttrValue>),
}

impl AttrValue {
    pub fn as_text(&self) -> Option<&str> {
        match self {
            AttrValue::Text(text) => Some(text),
            _ => None,
        }
    }

    pub fn as_number(&self) -> Option<f64> {
        match self {
            AttrValue::Number(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&[AttrValue]> {
        match self {
            AttrValue::List(items) => Some(items),
            _ => None,
        }
    }

    /// A nested value by key, for map attributes.
    pub fn get(&self, key: &str) -> Option<&AttrValue> {
        match self {
            AttrValue::Map(map) => map.get(key),
            _ => None,
        }
    }
}

impl From<&str> for AttrValue {
    fn from(value: &str) -> Self {
        AttrValue::Text(value.to_string())
    }
}

impl From<String> for AttrValue {
    fn from(value: String) -> Self {
        AttrValue::Text(value)
    }
}

impl From<f64> for AttrValue {
    fn from(value: f64) -> Self {
        AttrValue::Number(value)
    }
}

impl From<bool> for AttrValue {
    fn from(value: bool) -> Self {
        AttrValue::Bool(value)
    }
}

/// A dataset or granule catalog entry.
///
/// A granule's `parent` holds the `short_name` of the dataset it belongs to.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Record {
    pub id: RecordId,
    pub kind: RecordKind,
    pub footprint: Footprint,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub short_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent: Option<String>,
    #[serde(default)]
    pub attributes: BTreeMap<String, AttrValue>,
}

impl Record {
    pub fn new<I: Into<RecordId>>(id: I, kind: RecordKind, footprint: Footprint) -> Self {
        Self {
            id: id.into(),
            kind,
            footprint,
            short_name: None,
            parent: None,
            attributes: BTreeMap::new(),
        }
    }

    pub fn with_short_name<S: Into<String>>(mut self, short_name: S) -> Self {
        self.short_name = Some(short_name.into());
        self
    }

    pub fn with_parent<S: Into<String>>(mut self, parent: S) -> Self {
        self.parent = Some(parent.into());
        self
    }

    pub fn with_attribute<K: Into<String>, V: Into<AttrValue>>(mut self, key: K, value: V) -> Self {
        self.attributes.insert(key.into(), value.into());
        self
    }

    pub fn attribute(&self, key: &str) -> Option<&AttrValue> {
        self.attributes.get(key)
    }

    /// The `title` attribute, when present as text.
    pub fn title(&self) -> Option<&str> {
        self.attribute("title").and_then(AttrValue::as_text)
    }
}
