//! Flattening extracted entities into key/value records.

use std::collections::BTreeMap;

use crate::docai::{Entity, ParsedDocument};

/// Entity type (with `/` replaced by `_`) to value
pub type EntityRecord = BTreeMap<String, String>;

/// Flatten a document's entities into a single record.
///
/// Child properties are visited right after their parent. When two entities
/// map to the same key the one visited last wins.
pub fn flatten_entities(document: &ParsedDocument) -> EntityRecord {
    let mut record = EntityRecord::new();
    for entity in &document.entities {
        insert_entity(&mut record, entity);
    }
    record
}

fn insert_entity(record: &mut EntityRecord, entity: &Entity) {
    record.insert(entity_key(&entity.type_), entity.value().to_string());
    for property in &entity.properties {
        insert_entity(record, property);
    }
}

pub fn entity_key(entity_type: &str) -> String {
    entity_type.replace('/', "_")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::docai::document::NormalizedValue;

    fn entity(type_: &str, text: &str) -> Entity {
        Entity {
            type_: type_.to_string(),
            mention_text: text.to_string(),
            ..Default::default()
        }
    }

    #[test]
    fn test_last_entity_wins_after_normalization() {
        let document = ParsedDocument {
            entities: vec![entity("a/b", "x"), entity("a_b", "y")],
            ..Default::default()
        };

        let record = flatten_entities(&document);
        assert_eq!(record.len(), 1);
        assert_eq!(record["a_b"], "y");
    }

    #[test]
    fn test_no_entities_yields_empty_record() {
        assert!(flatten_entities(&ParsedDocument::default()).is_empty());
    }

    #[test]
    fn test_normalized_value_preferred() {
        let document = ParsedDocument {
            entities: vec![Entity {
                normalized_value: Some(NormalizedValue {
                    text: Some("2024-01-05".to_string()),
                }),
                ..entity("invoice_date", "Jan 5 2024")
            }],
            ..Default::default()
        };

        assert_eq!(flatten_entities(&document)["invoice_date"], "2024-01-05");
    }

    #[test]
    fn test_properties_follow_parent() {
        let line_item = |description: &str, amount: &str| Entity {
            properties: vec![
                entity("line_item/description", description),
                entity("line_item/amount", amount),
            ],
            ..entity("line_item", &format!("{} {}", description, amount))
        };
        let document = ParsedDocument {
            entities: vec![
                line_item("Widget", "10.00"),
                line_item("Gadget", "4.50"),
                entity("supplier_name", "ACME"),
            ],
            ..Default::default()
        };

        let record = flatten_entities(&document);
        assert_eq!(record["line_item"], "Gadget 4.50");
        assert_eq!(record["line_item_description"], "Gadget");
        assert_eq!(record["line_item_amount"], "4.50");
        assert_eq!(record["supplier_name"], "ACME");
        assert_eq!(record.len(), 4);
    }

    #[test]
    fn test_entity_key() {
        assert_eq!(entity_key("a/b/c"), "a_b_c");
        assert_eq!(entity_key("plain"), "plain");
    }
}
