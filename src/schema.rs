//! Collection schema language.
//!
//! A schema is free text, one field per line:
//!
//! ```text
//! title: text
//! body: textarea
//! dob: date Date of birth
//! ```
//!
//! The part before the first `:` is the field name. After it comes a type hint and, when
//! more than one word follows the type, a display label. Blank lines are skipped and line
//! order is form order. Types are hints for rendering only and are never enforced.

use crate::case::title_case;
use crate::error::SchemaError;
use serde::{Deserialize, Serialize};

/// One parsed schema line. The field's value is filled in later by the transformer.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FieldTemplate {
    pub name: String,
    pub field_type: String,
    pub label: String,
}

/// Schema metadata for one collection, stored in the `_meta` collection.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SchemaRecord {
    pub name: String,
    #[serde(rename = "schemaText", default)]
    pub schema_text: String,
}

impl SchemaRecord {
    pub fn new(name: impl Into<String>, schema_text: impl Into<String>) -> Self {
        SchemaRecord {
            name: name.into(),
            schema_text: schema_text.into(),
        }
    }

    pub fn fields(&self) -> Result<Vec<FieldTemplate>, SchemaError> {
        parse_schema(&self.schema_text)
    }
}

/// Parse schema text into ordered field templates. Fails on the first malformed line.
pub fn parse_schema(schema_text: &str) -> Result<Vec<FieldTemplate>, SchemaError> {
    let mut fields = Vec::new();
    for (idx, raw) in schema_text.lines().enumerate() {
        let line_no = idx + 1;
        if raw.trim().is_empty() {
            continue;
        }
        let (name, rest) = raw
            .split_once(':')
            .ok_or(SchemaError::MissingColon { line: line_no })?;
        let name = name.trim();
        if name.is_empty() {
            return Err(SchemaError::MissingName { line: line_no });
        }
        let tokens: Vec<&str> = rest.split_whitespace().collect();
        let field_type = match tokens.first() {
            Some(t) => t.to_string(),
            None => {
                return Err(SchemaError::MissingType {
                    line: line_no,
                    name: name.to_string(),
                })
            }
        };
        // A single word after the type does not count as a label.
        let label = if tokens.len() > 2 {
            tokens[1..].join(" ")
        } else {
            title_case(name)
        };
        fields.push(FieldTemplate {
            name: name.to_string(),
            field_type,
            label,
        });
    }
    Ok(fields)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn field(name: &str, ty: &str, label: &str) -> FieldTemplate {
        FieldTemplate {
            name: name.into(),
            field_type: ty.into(),
            label: label.into(),
        }
    }

    #[test]
    fn parses_type_and_default_label() {
        let fields = parse_schema("age: number Age\nbio: textarea").unwrap();
        assert_eq!(
            fields,
            vec![field("age", "number", "Age"), field("bio", "textarea", "Bio")]
        );
    }

    #[test]
    fn multi_word_label_is_rejoined() {
        let fields = parse_schema("dob: date Date of birth").unwrap();
        assert_eq!(fields, vec![field("dob", "date", "Date of birth")]);
    }

    #[test]
    fn single_label_word_falls_back_to_title_cased_name() {
        let fields = parse_schema("first_name: text Given").unwrap();
        assert_eq!(fields, vec![field("first_name", "text", "First_Name")]);
    }

    #[test]
    fn preserves_line_order_and_skips_blank_lines() {
        let text = "zeta: text\n\n   \nalpha: text\r\nmid: number\n";
        let names: Vec<String> = parse_schema(text).unwrap().into_iter().map(|f| f.name).collect();
        assert_eq!(names, vec!["zeta", "alpha", "mid"]);
    }

    #[test]
    fn colon_in_label_stays_in_label() {
        let fields = parse_schema("url: text Link: full address").unwrap();
        assert_eq!(fields, vec![field("url", "text", "Link: full address")]);
    }

    #[test]
    fn missing_type_is_reported_with_line() {
        let err = parse_schema("title: text\nbody:   \n").unwrap_err();
        assert_eq!(
            err,
            SchemaError::MissingType {
                line: 2,
                name: "body".into()
            }
        );
    }

    #[test]
    fn line_without_colon_is_rejected() {
        assert_eq!(
            parse_schema("title text").unwrap_err(),
            SchemaError::MissingColon { line: 1 }
        );
        assert_eq!(
            parse_schema(" : text").unwrap_err(),
            SchemaError::MissingName { line: 1 }
        );
    }

    #[test]
    fn empty_schema_has_no_fields() {
        assert!(parse_schema("").unwrap().is_empty());
        assert!(SchemaRecord::new("posts", "\n\n").fields().unwrap().is_empty());
    }

    #[test]
    fn record_serializes_with_schema_text_key() {
        let rec = SchemaRecord::new("posts", "title: text");
        let v = serde_json::to_value(&rec).unwrap();
        assert_eq!(v, serde_json::json!({"name": "posts", "schemaText": "title: text"}));
    }
}
