//! Declarative extraction rules.
//!
//! Label text lives here, extraction logic in [`listing`](super::listing)
//! and [`detail`](super::detail). Defaults match Russian Wikipedia markup.

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::types::record::Field;

/// Maps an infobox label substring to a field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldRule {
    pub label_pattern: String,
    pub field: Field,
}

impl FieldRule {
    pub fn new(label_pattern: impl Into<String>, field: Field) -> Self {
        Self {
            label_pattern: label_pattern.into(),
            field,
        }
    }

    /// Case-insensitive substring match against a label.
    pub fn matches(&self, label: &str) -> bool {
        contains_ci(label, &self.label_pattern)
    }
}

fn contains_ci(haystack: &str, needle: &str) -> bool {
    !needle.is_empty() && haystack.to_lowercase().contains(&needle.to_lowercase())
}

/// Rules for reading a country's detail page.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FieldRules {
    /// Label patterns, several may map to one field
    pub rules: Vec<FieldRule>,

    /// Labels of the capital row (used by targeted refresh)
    pub capital_labels: Vec<String>,

    /// Class of the infobox table
    pub infobox_class: String,

    /// Class of the article body container
    pub content_class: String,

    /// Summary length limit in characters, before the truncation marker
    pub summary_max_chars: usize,
}

impl Default for FieldRules {
    fn default() -> Self {
        Self {
            rules: vec![
                FieldRule::new("Население", Field::Population),
                FieldRule::new("Часть света", Field::Region),
                FieldRule::new("Континент", Field::Region),
                FieldRule::new("Площадь", Field::Area),
                FieldRule::new("Валюта", Field::Currency),
                FieldRule::new("Официальный язык", Field::Language),
                FieldRule::new("Официальные языки", Field::Language),
            ],
            capital_labels: vec!["Столица".to_string()],
            infobox_class: "infobox".to_string(),
            content_class: "mw-parser-output".to_string(),
            summary_max_chars: 300,
        }
    }
}

impl FieldRules {
    /// Rules with no label patterns; add them with [`with_rule`](Self::with_rule).
    pub fn empty() -> Self {
        Self {
            rules: Vec::new(),
            capital_labels: Vec::new(),
            ..Self::default()
        }
    }

    pub fn with_rule(mut self, label_pattern: impl Into<String>, field: Field) -> Self {
        self.rules.push(FieldRule::new(label_pattern, field));
        self
    }

    pub fn with_summary_max_chars(mut self, max: usize) -> Self {
        self.summary_max_chars = max;
        self
    }

    /// Fields whose patterns match `label`, in rule order, without repeats.
    pub fn fields_for_label(&self, label: &str) -> Vec<Field> {
        let mut fields = Vec::new();
        for rule in &self.rules {
            if rule.matches(label) && !fields.contains(&rule.field) {
                fields.push(rule.field);
            }
        }
        fields
    }

    pub fn is_capital_label(&self, label: &str) -> bool {
        self.capital_labels.iter().any(|l| contains_ci(label, l))
    }

    /// Patterns configured for one field.
    pub fn patterns_for(&self, field: Field) -> Vec<&str> {
        self.rules
            .iter()
            .filter(|r| r.field == field)
            .map(|r| r.label_pattern.as_str())
            .collect()
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.summary_max_chars == 0 {
            return Err(ConfigError::Zero {
                field: "summary_max_chars",
            });
        }
        if self.rules.iter().all(|r| r.label_pattern.trim().is_empty()) {
            return Err(ConfigError::EmptyRules("detail fields"));
        }
        Ok(())
    }
}

/// Rules for reading the listing page.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ListingRules {
    /// Class every listing table carries
    pub table_class: String,

    /// Zero-based index among a row's `<td>` cells
    pub country_column: usize,

    pub capital_column: usize,
}

impl Default for ListingRules {
    fn default() -> Self {
        Self {
            table_class: "wikitable".to_string(),
            country_column: 1,
            capital_column: 2,
        }
    }
}

impl ListingRules {
    pub fn with_columns(mut self, country_column: usize, capital_column: usize) -> Self {
        self.country_column = country_column;
        self.capital_column = capital_column;
        self
    }

    pub fn with_table_class(mut self, class: impl Into<String>) -> Self {
        self.table_class = class.into();
        self
    }

    /// Minimum number of `<td>` cells a row needs.
    pub fn min_cells(&self) -> usize {
        self.country_column.max(self.capital_column) + 1
    }
}
