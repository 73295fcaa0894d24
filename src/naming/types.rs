//! Identifier types

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;

static INVALID_IDENTIFIER_CHARS: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[^A-Za-z0-9_]").expect("valid identifier regex"));

// ============================================================================
// Naming Convention
// ============================================================================

/// Case folding applied to every identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CaseFolding {
    /// Keep the source casing
    #[default]
    Preserve,
    /// Fold to lower case
    Lower,
    /// Fold to upper case
    Upper,
}

/// Per-dialect identifier normalization rules
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NamingConvention {
    /// Case folding
    pub case_folding: CaseFolding,
    /// Maximum identifier length in characters
    pub max_identifier_length: usize,
    /// Replace characters outside `[A-Za-z0-9_]` with `_`
    pub replace_invalid_chars: bool,
}

impl Default for NamingConvention {
    fn default() -> Self {
        Self {
            case_folding: CaseFolding::Preserve,
            max_identifier_length: 255,
            replace_invalid_chars: false,
        }
    }
}

impl NamingConvention {
    /// Apply character replacement and case folding (no truncation)
    pub fn fold(&self, name: &str) -> String {
        let replaced = if self.replace_invalid_chars {
            INVALID_IDENTIFIER_CHARS.replace_all(name, "_").into_owned()
        } else {
            name.to_string()
        };

        let folded = match self.case_folding {
            CaseFolding::Preserve => replaced,
            CaseFolding::Lower => replaced.to_lowercase(),
            CaseFolding::Upper => replaced.to_uppercase(),
        };

        if folded.is_empty() {
            "_".to_string()
        } else {
            folded
        }
    }

    /// Fold and truncate a name into a destination identifier
    pub fn normalize(&self, name: &str) -> String {
        truncate_chars(&self.fold(name), self.max_identifier_length)
    }

    /// Append a collision suffix, shortening the base so the result still fits
    pub fn with_suffix(&self, base: &str, suffix: &str) -> String {
        let room = self
            .max_identifier_length
            .saturating_sub(suffix.chars().count());
        format!("{}{}", truncate_chars(base, room), suffix)
    }
}

fn truncate_chars(name: &str, max: usize) -> String {
    name.chars().take(max).collect()
}

// ============================================================================
// Column and Stream identities
// ============================================================================

/// A column's identity in the source and in the destination
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ColumnId {
    /// Name as declared by the source schema
    pub original_name: String,
    /// Destination-safe identifier, unique within a stream
    pub canonical_name: String,
    /// Normalized name before collision suffixing, kept for messages
    pub display_name: String,
}

impl ColumnId {
    /// Create a column id
    pub fn new(
        original_name: impl Into<String>,
        canonical_name: impl Into<String>,
        display_name: impl Into<String>,
    ) -> Self {
        Self {
            original_name: original_name.into(),
            canonical_name: canonical_name.into(),
            display_name: display_name.into(),
        }
    }

    /// Identifier used in generated SQL (unquoted)
    pub fn name(&self) -> &str {
        &self.canonical_name
    }
}

impl fmt::Display for ColumnId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.original_name == self.canonical_name {
            write!(f, "{}", self.canonical_name)
        } else {
            write!(f, "{} (as {})", self.original_name, self.canonical_name)
        }
    }
}

/// A namespace-qualified table
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TableRef {
    pub namespace: String,
    pub name: String,
}

impl TableRef {
    /// Create a table reference
    pub fn new(namespace: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
            name: name.into(),
        }
    }
}

impl fmt::Display for TableRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.namespace, self.name)
    }
}

/// A stream's identity in the source and its raw/final tables
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct StreamId {
    pub original_namespace: Option<String>,
    pub original_name: String,
    pub raw_namespace: String,
    pub raw_name: String,
    pub final_namespace: String,
    pub final_name: String,
}

impl StreamId {
    /// The raw table
    pub fn raw_table(&self) -> TableRef {
        TableRef::new(&self.raw_namespace, &self.raw_name)
    }

    /// The final table, optionally with a suffix (e.g. a soft reset side table)
    pub fn final_table(&self, suffix: &str) -> TableRef {
        TableRef::new(&self.final_namespace, format!("{}{}", self.final_name, suffix))
    }

    /// Key identifying the stream in destination state
    pub fn state_key(&self) -> (String, String) {
        (
            self.original_namespace.clone().unwrap_or_default(),
            self.original_name.clone(),
        )
    }
}

impl fmt::Display for StreamId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.original_namespace {
            Some(ns) => write!(f, "{ns}.{}", self.original_name),
            None => write!(f, "{}", self.original_name),
        }
    }
}
