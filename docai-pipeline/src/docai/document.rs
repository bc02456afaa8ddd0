//! Parsed Document AI output.
//!
//! Only the parts of `google.cloud.documentai.v1.Document` needed for entity
//! flattening are modeled; everything else in the JSON is ignored.

use serde::Deserialize;

/// One processed document, reduced to its entities
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ParsedDocument {
    /// Source URI when the service echoes it back
    #[serde(default)]
    pub uri: Option<String>,

    #[serde(default)]
    pub entities: Vec<Entity>,
}

/// An extracted field
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Entity {
    #[serde(rename = "type", default)]
    pub type_: String,

    #[serde(default)]
    pub mention_text: String,

    #[serde(default)]
    pub normalized_value: Option<NormalizedValue>,

    /// Child entities, e.g. line item fields
    #[serde(default)]
    pub properties: Vec<Entity>,
}

/// Typed interpretation of an entity's mention
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct NormalizedValue {
    #[serde(default)]
    pub text: Option<String>,
}

impl Entity {
    /// Normalized text when the service produced one, else the raw mention
    pub fn value(&self) -> &str {
        self.normalized_value
            .as_ref()
            .and_then(|v| v.text.as_deref())
            .unwrap_or(&self.mention_text)
    }
}
