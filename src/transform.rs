//! Turn documents into renderable form fields, with or without a collection schema.

use crate::case::capitalize;
use crate::error::SchemaError;
use crate::schema::SchemaRecord;
use crate::store::Document;
use serde::Serialize;
use serde_json::Value;

/// One form field as handed to the renderer. Built per request, never stored.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct FieldDescriptor {
    pub name: String,
    #[serde(rename = "type")]
    pub field_type: String,
    pub label: String,
    pub value: String,
}

/// Text form of a document value: strings as-is, null as empty, everything else as JSON.
pub fn display_value(v: &Value) -> String {
    match v {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

/// Schema-driven fields in schema order. Document keys the schema does not name are left out
/// of the form; they stay in the store because edits are merged, not replaced.
pub fn schema_transform(document: &Document, schema: &SchemaRecord) -> Result<Vec<FieldDescriptor>, SchemaError> {
    Ok(schema
        .fields()?
        .into_iter()
        .map(|t| {
            let value = document.get(&t.name).map(display_value).unwrap_or_default();
            FieldDescriptor {
                name: t.name,
                field_type: t.field_type,
                label: t.label,
                value,
            }
        })
        .collect())
}

/// One field per document key, in document order. Multi-line values get a textarea.
pub fn fields_transform(document: &Document) -> Vec<FieldDescriptor> {
    document
        .iter()
        .map(|(name, v)| {
            let value = display_value(v);
            let field_type = if value.contains('\n') { "textarea" } else { "text" };
            FieldDescriptor {
                name: name.clone(),
                field_type: field_type.to_string(),
                label: capitalize(name),
                value,
            }
        })
        .collect()
}

/// Loose `key: value` lines into a flat document. Lines without a colon or with an empty key are skipped;
/// the value keeps any further colons.
pub fn cook_data(raw: &str) -> Document {
    let mut doc = Document::new();
    for line in raw.lines() {
        if let Some((key, value)) = line.split_once(':') {
            let key = key.trim();
            if !key.is_empty() {
                doc.insert(key.to_string(), Value::String(value.trim().to_string()));
            }
        }
    }
    doc
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn doc(v: Value) -> Document {
        v.as_object().cloned().unwrap()
    }

    #[test]
    fn schema_transform_follows_schema_order_and_fills_missing() {
        let d = doc(json!({"a": 1, "b": "two", "c": 3}));
        let schema = SchemaRecord::new("things", "b: text Second field\nz: number\na: number");
        let fields = schema_transform(&d, &schema).unwrap();
        let summary: Vec<(&str, &str, &str, &str)> = fields
            .iter()
            .map(|f| (f.name.as_str(), f.field_type.as_str(), f.label.as_str(), f.value.as_str()))
            .collect();
        assert_eq!(
            summary,
            vec![
                ("b", "text", "Second field", "two"),
                ("z", "number", "Z", ""),
                ("a", "number", "A", "1"),
            ]
        );
    }

    #[test]
    fn schema_transform_surfaces_malformed_schema() {
        let schema = SchemaRecord::new("things", "a:");
        assert!(schema_transform(&Document::new(), &schema).is_err());
    }

    #[test]
    fn fields_transform_picks_textarea_for_multiline() {
        let d = doc(json!({"title": "Hi", "body": "line one\nline two", "count": 3, "nested": {"k": true}}));
        let fields = fields_transform(&d);
        let summary: Vec<(&str, &str, &str, &str)> = fields
            .iter()
            .map(|f| (f.name.as_str(), f.field_type.as_str(), f.label.as_str(), f.value.as_str()))
            .collect();
        assert_eq!(
            summary,
            vec![
                ("title", "text", "Title", "Hi"),
                ("body", "textarea", "Body", "line one\nline two"),
                ("count", "text", "Count", "3"),
                ("nested", "text", "Nested", "{\"k\":true}"),
            ]
        );
    }

    #[test]
    fn cook_data_reads_key_value_lines() {
        let d = cook_data("name: Joe\nnot a pair\nurl: http://x.org\n : orphan\n");
        assert_eq!(d, doc(json!({"name": "Joe", "url": "http://x.org"})));
    }

    #[test]
    fn display_value_forms() {
        assert_eq!(display_value(&json!("x")), "x");
        assert_eq!(display_value(&Value::Null), "");
        assert_eq!(display_value(&json!(false)), "false");
        assert_eq!(display_value(&json!([1, 2])), "[1,2]");
    }
}
