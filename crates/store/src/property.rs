//! Tagged property values as stored in a workspace database row.

use std::collections::BTreeMap;
use std::fmt;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Property name → value for one database row.
pub type PropertyMap = BTreeMap<String, PropertyValue>;

/// The kind of a property column, independent of its value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PropertyKind {
    Title,
    RichText,
    Select,
    MultiSelect,
    Date,
    Number,
    Relation,
}

impl PropertyKind {
    /// Wire name used by the workspace API.
    pub fn as_str(&self) -> &'static str {
        match self {
            PropertyKind::Title => "title",
            PropertyKind::RichText => "rich_text",
            PropertyKind::Select => "select",
            PropertyKind::MultiSelect => "multi_select",
            PropertyKind::Date => "date",
            PropertyKind::Number => "number",
            PropertyKind::Relation => "relation",
        }
    }
}

impl fmt::Display for PropertyKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single property value. Each variant carries exactly the shape its kind allows.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum PropertyValue {
    Title(String),
    RichText(String),
    Select(Option<String>),
    MultiSelect(Vec<String>),
    Date(Option<NaiveDate>),
    Number(Option<f64>),
    Relation(Vec<String>),
}

impl PropertyValue {
    pub fn kind(&self) -> PropertyKind {
        match self {
            PropertyValue::Title(_) => PropertyKind::Title,
            PropertyValue::RichText(_) => PropertyKind::RichText,
            PropertyValue::Select(_) => PropertyKind::Select,
            PropertyValue::MultiSelect(_) => PropertyKind::MultiSelect,
            PropertyValue::Date(_) => PropertyKind::Date,
            PropertyValue::Number(_) => PropertyKind::Number,
            PropertyValue::Relation(_) => PropertyKind::Relation,
        }
    }
}
