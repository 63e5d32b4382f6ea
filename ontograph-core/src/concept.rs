//! Concept and relation types
//!
//! A [`Concept`] is the normalized record handed over by the extraction
//! side. The core never interprets `properties`, `schema_type` or `content`;
//! they are carried through to query results untouched.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use std::sync::OnceLock;

use regex::Regex;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::error::{GraphError, Result};

/// Typed relation between two concepts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RelationType {
    Broader,
    Narrower,
    Related,
    Prerequisite,
}

impl RelationType {
    /// Every relation type, in declaration order.
    pub const ALL: [RelationType; 4] = [
        RelationType::Broader,
        RelationType::Narrower,
        RelationType::Related,
        RelationType::Prerequisite,
    ];

    /// Relation types followed by context expansion when none are requested.
    pub const DEFAULT_EXPANSION: [RelationType; 3] = [
        RelationType::Broader,
        RelationType::Narrower,
        RelationType::Related,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            RelationType::Broader => "broader",
            RelationType::Narrower => "narrower",
            RelationType::Related => "related",
            RelationType::Prerequisite => "prerequisite",
        }
    }
}

impl fmt::Display for RelationType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error returned when a relation name is not one of the closed set.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown relation type: {0}")]
pub struct UnknownRelationType(pub String);

impl FromStr for RelationType {
    type Err = UnknownRelationType;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "broader" => Ok(RelationType::Broader),
            "narrower" => Ok(RelationType::Narrower),
            "related" => Ok(RelationType::Related),
            "prerequisite" => Ok(RelationType::Prerequisite),
            _ => Err(UnknownRelationType(s.to_string())),
        }
    }
}

/// Which side of an edge to follow.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    /// Edges whose source is the node
    Outgoing,
    /// Edges whose target is the node
    Incoming,
    /// Union of both
    Both,
}

/// A directed, typed edge.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Relation {
    pub relation: RelationType,
    pub source: String,
    pub target: String,
}

/// An outgoing relation as supplied by the extraction side, before the
/// relation name has been checked against the closed set.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RelationSpec {
    pub relation: String,
    pub target: String,
}

impl RelationSpec {
    pub fn new(relation: RelationType, target: impl Into<String>) -> Self {
        Self {
            relation: relation.as_str().to_string(),
            target: target.into(),
        }
    }

    /// Parse the relation name, attributing failures to `source_id`.
    pub fn parse(&self, source_id: &str) -> Result<RelationType> {
        self.relation.parse().map_err(|e: UnknownRelationType| {
            GraphError::invalid_relation(source_id, &self.relation, &self.target, e.to_string())
        })
    }
}

/// A knowledge unit: label, definition, codes and pass-through metadata.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Concept {
    pub id: String,
    pub pref_label: String,
    #[serde(default)]
    pub alt_labels: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub definition: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notation: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scheme: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub schema_type: Option<String>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub properties: BTreeMap<String, serde_json::Value>,
    /// Opaque locator of the originating document
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
    #[serde(default)]
    pub content: String,
}

fn id_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"^[A-Za-z0-9][A-Za-z0-9_.:\-]*$").expect("valid regex"))
}

/// Check that `id` is a usable concept identifier.
pub fn validate_id(id: &str) -> Result<()> {
    if id.is_empty() {
        return Err(GraphError::malformed(id, "empty identifier"));
    }
    if !id_pattern().is_match(id) {
        return Err(GraphError::malformed(id, "identifier contains invalid characters"));
    }
    Ok(())
}

impl Concept {
    /// Create a concept with only the required fields set.
    pub fn new(id: impl Into<String>, pref_label: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            pref_label: pref_label.into(),
            alt_labels: Vec::new(),
            definition: None,
            notation: None,
            scheme: None,
            schema_type: None,
            properties: BTreeMap::new(),
            source: None,
            content: String::new(),
        }
    }

    pub fn with_alt_label(mut self, label: impl Into<String>) -> Self {
        self.alt_labels.push(label.into());
        self
    }

    pub fn with_definition(mut self, definition: impl Into<String>) -> Self {
        self.definition = Some(definition.into());
        self
    }

    pub fn with_notation(mut self, notation: impl Into<String>) -> Self {
        self.notation = Some(notation.into());
        self
    }

    pub fn with_scheme(mut self, scheme: impl Into<String>) -> Self {
        self.scheme = Some(scheme.into());
        self
    }

    pub fn with_schema_type(mut self, schema_type: impl Into<String>) -> Self {
        self.schema_type = Some(schema_type.into());
        self
    }

    pub fn with_property(mut self, key: impl Into<String>, value: serde_json::Value) -> Self {
        self.properties.insert(key.into(), value);
        self
    }

    pub fn with_source(mut self, source: impl Into<String>) -> Self {
        self.source = Some(source.into());
        self
    }

    pub fn with_content(mut self, content: impl Into<String>) -> Self {
        self.content = content.into();
        self
    }

    /// Basic shape checks applied before a record enters the graph.
    pub fn validate(&self) -> Result<()> {
        validate_id(&self.id)?;
        if self.pref_label.trim().is_empty() {
            return Err(GraphError::malformed(&self.id, "preferred label is empty"));
        }
        if let Some(notation) = &self.notation {
            if notation.trim().is_empty() {
                return Err(GraphError::malformed(&self.id, "notation is blank"));
            }
        }
        Ok(())
    }

    /// Every label this concept claims in the label index, case-folded and
    /// without duplicates. Preferred label first.
    pub fn normalized_labels(&self) -> Vec<String> {
        let mut labels: Vec<String> = Vec::with_capacity(1 + self.alt_labels.len());
        for label in std::iter::once(&self.pref_label).chain(self.alt_labels.iter()) {
            let normalized = normalize_label(label);
            if !normalized.is_empty() && !labels.contains(&normalized) {
                labels.push(normalized);
            }
        }
        labels
    }
}

/// Case-fold and trim a label for index lookups.
pub fn normalize_label(label: &str) -> String {
    label.trim().to_lowercase()
}
