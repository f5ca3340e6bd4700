//! Entity and alias records held by the knowledge store.
//!
//! Every detail field of an [`EntityRecord`] is always present. Missing data
//! is represented by [`FieldValue::Unknown`], never by absence, so
//! formatting code can index any field without checks.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use crate::normalize::normalize_key;

/// Text shown for an unknown value.
pub const UNKNOWN_TEXT: &str = "Нет данных";

static UNKNOWN: FieldValue = FieldValue::Unknown;

/// Detail fields extracted for a country.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Field {
    Population,
    Region,
    Area,
    Currency,
    Language,
}

impl Field {
    /// All fields, in display order.
    pub const ALL: [Field; 5] = [
        Field::Population,
        Field::Region,
        Field::Area,
        Field::Currency,
        Field::Language,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Field::Population => "population",
            Field::Region => "region",
            Field::Area => "area",
            Field::Currency => "currency",
            Field::Language => "language",
        }
    }

    /// Human-facing label used in replies.
    pub fn label(&self) -> &'static str {
        match self {
            Field::Population => "Население",
            Field::Region => "Регион",
            Field::Area => "Площадь",
            Field::Currency => "Валюта",
            Field::Language => "Официальный язык",
        }
    }
}

impl fmt::Display for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A value that is either known text or the explicit unknown sentinel.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum FieldValue {
    Known(String),
    Unknown,
}

impl FieldValue {
    /// Known if `text` has any non-whitespace content, otherwise unknown.
    pub fn from_text(text: impl Into<String>) -> Self {
        let text = text.into();
        if text.trim().is_empty() {
            FieldValue::Unknown
        } else {
            FieldValue::Known(text)
        }
    }

    pub fn as_known(&self) -> Option<&str> {
        match self {
            FieldValue::Known(text) => Some(text),
            FieldValue::Unknown => None,
        }
    }

    pub fn is_unknown(&self) -> bool {
        matches!(self, FieldValue::Unknown)
    }
}

impl fmt::Display for FieldValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldValue::Known(text) => f.write_str(text),
            FieldValue::Unknown => f.write_str(UNKNOWN_TEXT),
        }
    }
}

/// Total mapping from every [`Field`] to a [`FieldValue`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FieldValues {
    values: BTreeMap<Field, FieldValue>,
}

impl Default for FieldValues {
    fn default() -> Self {
        Self::unknown()
    }
}

impl FieldValues {
    /// All fields set to unknown.
    pub fn unknown() -> Self {
        Self {
            values: Field::ALL
                .iter()
                .map(|field| (*field, FieldValue::Unknown))
                .collect(),
        }
    }

    pub fn set(&mut self, field: Field, value: FieldValue) {
        self.values.insert(field, value);
    }

    /// Builder form of [`set`](Self::set).
    pub fn with(mut self, field: Field, value: FieldValue) -> Self {
        self.set(field, value);
        self
    }

    pub fn get(&self, field: Field) -> &FieldValue {
        self.values.get(&field).unwrap_or(&UNKNOWN)
    }

    pub fn iter(&self) -> impl Iterator<Item = (Field, &FieldValue)> {
        Field::ALL.iter().map(move |field| (*field, self.get(*field)))
    }

    pub fn all_unknown(&self) -> bool {
        self.values.values().all(FieldValue::is_unknown)
    }
}

/// One country.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EntityRecord {
    /// Canonical key
    pub name: String,

    /// Name as spelled by the source
    pub display_name: String,

    pub capital: String,

    pub fields: FieldValues,

    /// Bounded excerpt, or unknown
    pub summary: FieldValue,
}

impl EntityRecord {
    /// Create a record with every detail field unknown.
    pub fn new(display_name: impl Into<String>, capital: impl Into<String>) -> Self {
        let display_name = display_name.into();
        Self {
            name: normalize_key(&display_name),
            display_name,
            capital: capital.into(),
            fields: FieldValues::unknown(),
            summary: FieldValue::Unknown,
        }
    }

    pub fn with_fields(mut self, fields: FieldValues) -> Self {
        self.fields = fields;
        self
    }

    pub fn with_summary(mut self, summary: FieldValue) -> Self {
        self.summary = summary;
        self
    }

    /// True when nothing beyond the listing data is known.
    pub fn is_degraded(&self) -> bool {
        self.fields.all_unknown() && self.summary.is_unknown()
    }
}

/// A secondary key resolving to an entity, e.g. a capital.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AliasRecord {
    /// Canonical key
    pub alias: String,

    /// Alias as spelled by the source
    pub display: String,

    /// Canonical key of the entity this alias resolves to
    pub target_name: String,
}

impl AliasRecord {
    pub fn new(display: impl Into<String>, target_name: &str) -> Self {
        let display = display.into();
        Self {
            alias: normalize_key(&display),
            display,
            target_name: normalize_key(target_name),
        }
    }
}

/// One row of a listing: a country and its capital, as spelled by the source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntityStub {
    pub country_name: String,
    pub capital_name: String,
}

impl EntityStub {
    pub fn new(country_name: impl Into<String>, capital_name: impl Into<String>) -> Self {
        Self {
            country_name: country_name.into(),
            capital_name: capital_name.into(),
        }
    }
}

/// Result of a successful store lookup.
#[derive(Debug, Clone, PartialEq)]
pub enum Resolution {
    /// The key named an entity directly
    Entity(Arc<EntityRecord>),

    /// The key was an alias; the entity it resolves to
    Alias {
        alias: Arc<AliasRecord>,
        entity: Arc<EntityRecord>,
    },
}

impl Resolution {
    pub fn entity(&self) -> &EntityRecord {
        match self {
            Resolution::Entity(entity) => entity,
            Resolution::Alias { entity, .. } => entity,
        }
    }

    pub fn is_alias(&self) -> bool {
        matches!(self, Resolution::Alias { .. })
    }
}
