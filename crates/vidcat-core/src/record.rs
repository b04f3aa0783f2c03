//! Catalog record model.
//!
//! A [`Record`] is an identity plus a mapping from attribute name to one or
//! more values. The stream's parent record and every segment's child record
//! share this shape; which attributes are populated is up to the rollover
//! engine and the record updaters.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::ids::RecordId;

/// Well-known attribute names.
pub mod attributes {
    /// Human-readable title.
    pub const TITLE: &str = "title";
    /// Where the record's content lives (stream URI or segment file URI).
    pub const RESOURCE_URI: &str = "resource-uri";
    /// Size of the content in bytes.
    pub const RESOURCE_SIZE: &str = "resource-size";
    /// MIME type of the content.
    pub const MEDIA_TYPE: &str = "media.type";
    /// When the record was created.
    pub const CREATED: &str = "created";
    /// Start of the time span covered by the content.
    pub const TEMPORAL_START: &str = "temporal.start";
    /// End of the time span covered by the content.
    pub const TEMPORAL_END: &str = "temporal.end";
    /// Footprint as WKT text.
    pub const LOCATION: &str = "location";
    /// Ids of records derived from this one.
    pub const DERIVED: &str = "associations.derived";

    /// MIME type used for transport-stream content.
    pub const MPEG_TS_MEDIA_TYPE: &str = "video/mp2t";
}

/// A single attribute value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum AttributeValue {
    Text(String),
    Integer(i64),
    Timestamp(DateTime<Utc>),
}

impl AttributeValue {
    /// The text payload, if this is a text value.
    pub fn as_text(&self) -> Option<&str> {
        match self {
            AttributeValue::Text(s) => Some(s),
            _ => None,
        }
    }

    /// The timestamp payload, if this is a timestamp value.
    pub fn as_timestamp(&self) -> Option<DateTime<Utc>> {
        match self {
            AttributeValue::Timestamp(t) => Some(*t),
            _ => None,
        }
    }

    /// The integer payload, if this is an integer value.
    pub fn as_integer(&self) -> Option<i64> {
        match self {
            AttributeValue::Integer(i) => Some(*i),
            _ => None,
        }
    }
}

impl From<String> for AttributeValue {
    fn from(s: String) -> Self {
        AttributeValue::Text(s)
    }
}

impl From<&str> for AttributeValue {
    fn from(s: &str) -> Self {
        AttributeValue::Text(s.to_string())
    }
}

impl From<i64> for AttributeValue {
    fn from(i: i64) -> Self {
        AttributeValue::Integer(i)
    }
}

impl From<DateTime<Utc>> for AttributeValue {
    fn from(t: DateTime<Utc>) -> Self {
        AttributeValue::Timestamp(t)
    }
}

/// A catalog record (metacard).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Record {
    id: RecordId,
    #[serde(default)]
    attributes: BTreeMap<String, Vec<AttributeValue>>,
}

impl Record {
    /// Create an empty record with a fresh id.
    pub fn new() -> Self {
        Self::with_id(RecordId::new())
    }

    /// Create an empty record with the given id.
    pub fn with_id(id: RecordId) -> Self {
        Self {
            id,
            attributes: BTreeMap::new(),
        }
    }

    pub fn id(&self) -> RecordId {
        self.id
    }

    /// All values of an attribute, or `None` when it is absent.
    pub fn attribute(&self, name: &str) -> Option<&[AttributeValue]> {
        self.attributes.get(name).map(Vec::as_slice)
    }

    /// Replace an attribute's values. An empty list removes the attribute.
    pub fn set_attribute(&mut self, name: impl Into<String>, values: Vec<AttributeValue>) {
        let name = name.into();
        if values.is_empty() {
            self.attributes.remove(&name);
        } else {
            self.attributes.insert(name, values);
        }
    }

    /// Replace an attribute with a single value.
    pub fn set(&mut self, name: impl Into<String>, value: impl Into<AttributeValue>) {
        self.attributes.insert(name.into(), vec![value.into()]);
    }

    pub fn remove_attribute(&mut self, name: &str) -> Option<Vec<AttributeValue>> {
        self.attributes.remove(name)
    }

    /// First text value of an attribute.
    pub fn text(&self, name: &str) -> Option<&str> {
        self.attribute(name)?.iter().find_map(AttributeValue::as_text)
    }

    /// All text values of an attribute, in stored order.
    pub fn texts(&self, name: &str) -> Vec<&str> {
        self.attribute(name)
            .map(|values| values.iter().filter_map(AttributeValue::as_text).collect())
            .unwrap_or_default()
    }

    /// First timestamp value of an attribute.
    pub fn timestamp(&self, name: &str) -> Option<DateTime<Utc>> {
        self.attribute(name)?
            .iter()
            .find_map(AttributeValue::as_timestamp)
    }

    /// Iterate over attribute names and values.
    pub fn attributes(&self) -> impl Iterator<Item = (&str, &[AttributeValue])> {
        self.attributes
            .iter()
            .map(|(name, values)| (name.as_str(), values.as_slice()))
    }
}

impl Default for Record {
    fn default() -> Self {
        Self::new()
    }
}
