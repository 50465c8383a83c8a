/// Typed database-row properties
use super::rich_text::{DateRange, RichText};
use super::unit::MediaSource;
use chrono::{DateTime, Utc};
use serde_json::Value;
use std::collections::BTreeMap;

/// A workspace member referenced by a people-style property
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Person {
    pub id: String,

    /// Display name, when the user directory knows it
    pub name: Option<String>,
}

/// One entry of a files property
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileRef {
    pub name: String,
    pub source: MediaSource,
}

/// Value of a single page property
#[derive(Debug, Clone, PartialEq)]
pub enum PropertyValue {
    Title(RichText),
    RichText(RichText),
    Number(Option<f64>),
    Select(Option<String>),
    MultiSelect(Vec<String>),
    Status(Option<String>),
    Date(Option<DateRange>),
    Checkbox(bool),
    Url(Option<String>),
    Email(Option<String>),
    PhoneNumber(Option<String>),
    CreatedTime(Option<DateTime<Utc>>),
    LastEditedTime(Option<DateTime<Utc>>),

    /// Computed value, already flattened to display text
    Formula(Option<String>),

    /// Ids of related pages; rendered as ids, not followed
    Relation(Vec<String>),

    /// Aggregated value, already flattened to display text
    Rollup(Option<String>),
    People(Vec<Person>),
    CreatedBy(Person),
    LastEditedBy(Person),
    Files(Vec<FileRef>),
    UniqueId {
        prefix: Option<String>,
        number: Option<i64>,
    },
    Unknown {
        type_tag: String,
        raw: Value,
    },
}

/// Properties of a page keyed by property name
pub type Properties = BTreeMap<String, PropertyValue>;
