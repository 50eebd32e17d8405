//! Table schema, column kinds, and the validator compiled from a schema.
//!
//! A [`TableSchema`] is a plain ordered map from field name to [`Column`].
//! Exactly one column must carry [`ColumnKind::Id`] — by convention, and by
//! every serializer and table operation in this crate, that column is named
//! `"id"`. [`Validator`] compiles a `TableSchema` into something that accepts
//! a JSON object and returns either a typed [`Row`] or a [`ValidationIssues`]
//! report; it is total and deterministic, matching §4.4 of the spec this
//! crate implements.

use std::fmt;
use std::sync::Arc;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::EpicenterError;

/// A user-supplied validator for an opaque JSON column.
///
/// Returns `Err(message)` describing why the value is invalid.
pub type JsonValidatorFn = Arc<dyn Fn(&Value) -> std::result::Result<(), String> + Send + Sync>;

/// The kind of value a column holds.
#[derive(Clone)]
pub enum ColumnKind {
    /// The row's primary key. Exactly one column per table carries this kind.
    Id,
    /// A UTF-8 string.
    Text,
    /// A signed 64-bit integer.
    Integer,
    /// A 64-bit floating point number.
    Real,
    /// A boolean.
    Boolean,
    /// An RFC 3339 timestamp with timezone offset, stored as a string.
    DateTimeTz,
    /// One of a fixed set of string literals.
    Enum(Vec<String>),
    /// An ordered collection of strings.
    StringList,
    /// Opaque JSON, optionally checked by a user-supplied validator.
    Json(Option<JsonValidatorFn>),
}

impl fmt::Debug for ColumnKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ColumnKind::Id => write!(f, "Id"),
            ColumnKind::Text => write!(f, "Text"),
            ColumnKind::Integer => write!(f, "Integer"),
            ColumnKind::Real => write!(f, "Real"),
            ColumnKind::Boolean => write!(f, "Boolean"),
            ColumnKind::DateTimeTz => write!(f, "DateTimeTz"),
            ColumnKind::Enum(variants) => write!(f, "Enum({variants:?})"),
            ColumnKind::StringList => write!(f, "StringList"),
            ColumnKind::Json(validator) => {
                write!(f, "Json(validator={})", validator.is_some())
            }
        }
    }
}

impl PartialEq for ColumnKind {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (ColumnKind::Id, ColumnKind::Id) => true,
            (ColumnKind::Text, ColumnKind::Text) => true,
            (ColumnKind::Integer, ColumnKind::Integer) => true,
            (ColumnKind::Real, ColumnKind::Real) => true,
            (ColumnKind::Boolean, ColumnKind::Boolean) => true,
            (ColumnKind::DateTimeTz, ColumnKind::DateTimeTz) => true,
            (ColumnKind::Enum(a), ColumnKind::Enum(b)) => a == b,
            (ColumnKind::StringList, ColumnKind::StringList) => true,
            (ColumnKind::Json(_), ColumnKind::Json(_)) => true,
            _ => false,
        }
    }
}

/// One field's declaration within a [`TableSchema`].
#[derive(Debug, Clone, PartialEq)]
pub struct Column {
    /// The column's kind.
    pub kind: ColumnKind,
    /// Whether `null`/absent is a valid value for this column.
    pub nullable: bool,
    /// The value substituted when the field is absent from a row.
    pub default: Option<Value>,
}

impl Column {
    /// A required column of the given kind with no default.
    pub fn new(kind: ColumnKind) -> Self {
        Self {
            kind,
            nullable: false,
            default: None,
        }
    }

    /// Mark this column as accepting `null`/absent.
    pub fn nullable(mut self) -> Self {
        self.nullable = true;
        self
    }

    /// Give this column a default value substituted when absent.
    pub fn with_default(mut self, value: Value) -> Self {
        self.default = Some(value);
        self
    }
}

/// A mapping from field name to [`Column`]. Exactly one entry must carry
/// [`ColumnKind::Id`], and by this crate's convention it is named `"id"`.
pub type TableSchema = IndexMap<String, Column>;

/// A mapping from table name to [`TableSchema`].
pub type WorkspaceSchema = IndexMap<String, TableSchema>;

/// A single field-level validation failure.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FieldIssue {
    /// Name of the offending field.
    pub field: String,
    /// Human-readable description of the failure.
    pub message: String,
}

/// A structured validation failure for one row.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValidationIssues {
    /// The row id, if one could be recovered from the input.
    pub id: Option<String>,
    /// One-line human-readable summary.
    pub summary: String,
    /// Per-field issues.
    pub issues: Vec<FieldIssue>,
}

impl fmt::Display for ValidationIssues {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.summary)
    }
}

impl From<ValidationIssues> for EpicenterError {
    fn from(issues: ValidationIssues) -> Self {
        EpicenterError::Validation {
            id: issues.id.unwrap_or_default(),
            summary: issues.summary,
            issues: issues.issues.into_iter().map(|i| format!("{}: {}", i.field, i.message)).collect(),
        }
    }
}

/// A typed, schema-valid row: a JSON object guaranteed to carry a non-empty
/// `"id"` string field and to satisfy its table's schema at the time it was
/// validated. Rows are JSON-serializable by construction — no nested live
/// CRDT objects are ever stored inside one.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Row(pub serde_json::Map<String, Value>);

impl Row {
    /// The row's id. Panics if called on a `Row` not produced by [`Validator::validate`]
    /// (which guarantees the invariant holds).
    pub fn id(&self) -> &str {
        self.0
            .get("id")
            .and_then(Value::as_str)
            .expect("Row invariant: id field is a non-empty string")
    }

    /// Consume the row, returning its JSON object.
    pub fn into_object(self) -> serde_json::Map<String, Value> {
        self.0
    }

    /// Consume the row, returning a [`Value::Object`].
    pub fn into_value(self) -> Value {
        Value::Object(self.0)
    }

    /// Borrow the row as a JSON object.
    pub fn as_object(&self) -> &serde_json::Map<String, Value> {
        &self.0
    }
}

/// Extracts the `id` field from a raw JSON value without validating the rest
/// of the row. Used by code paths (filename parsing, diagnostics) that need
/// an id even for rows that fail full validation.
pub fn extract_id(value: &Value) -> Option<&str> {
    value.get("id").and_then(Value::as_str).filter(|s| !s.is_empty())
}

/// Compiles a [`TableSchema`] into something that accepts a JSON object and
/// returns either a typed [`Row`] or a [`ValidationIssues`] report. Total and
/// deterministic: the same input always produces the same result.
#[derive(Clone)]
pub struct Validator {
    schema: Arc<TableSchema>,
}

impl Validator {
    /// Compile a validator from a table schema.
    pub fn new(schema: Arc<TableSchema>) -> Self {
        Self { schema }
    }

    /// The schema this validator was compiled from.
    pub fn schema(&self) -> &TableSchema {
        &self.schema
    }

    /// Validate a raw JSON value against this table's schema.
    pub fn validate(&self, value: &Value) -> std::result::Result<Row, ValidationIssues> {
        let id = extract_id(value).map(str::to_string);

        let Some(object) = value.as_object() else {
            return Err(ValidationIssues {
                id,
                summary: "row is not a JSON object".to_string(),
                issues: vec![],
            });
        };

        let mut issues = Vec::new();
        let mut out = object.clone();

        for (field, column) in self.schema.iter() {
            let present = object.get(field).filter(|v| !v.is_null());
            let resolved = match present {
                Some(v) => Some(v.clone()),
                None => match &column.default {
                    Some(default) => Some(default.clone()),
                    None if column.nullable => None,
                    None => {
                        issues.push(FieldIssue {
                            field: field.clone(),
                            message: "required field is missing".to_string(),
                        });
                        None
                    }
                },
            };

            if let Some(v) = &resolved {
                if let Err(message) = check_kind(&column.kind, v) {
                    issues.push(FieldIssue {
                        field: field.clone(),
                        message,
                    });
                }
            }

            match resolved {
                Some(v) => {
                    out.insert(field.clone(), v);
                }
                None => {
                    out.remove(field);
                }
            }
        }

        if id.is_none() {
            issues.push(FieldIssue {
                field: "id".to_string(),
                message: "missing or non-string id".to_string(),
            });
        }

        if issues.is_empty() {
            Ok(Row(out))
        } else {
            Err(ValidationIssues {
                id,
                summary: format!("{} field(s) failed validation", issues.len()),
                issues,
            })
        }
    }
}

fn check_kind(kind: &ColumnKind, value: &Value) -> std::result::Result<(), String> {
    match kind {
        ColumnKind::Id => {
            if value.as_str().is_some_and(|s| !s.is_empty()) {
                Ok(())
            } else {
                Err("id must be a non-empty string".to_string())
            }
        }
        ColumnKind::Text => {
            if value.is_string() {
                Ok(())
            } else {
                Err("expected a string".to_string())
            }
        }
        ColumnKind::Integer => {
            if value.is_i64() || value.is_u64() {
                Ok(())
            } else {
                Err("expected an integer".to_string())
            }
        }
        ColumnKind::Real => {
            if value.is_number() {
                Ok(())
            } else {
                Err("expected a number".to_string())
            }
        }
        ColumnKind::Boolean => {
            if value.is_boolean() {
                Ok(())
            } else {
                Err("expected a boolean".to_string())
            }
        }
        ColumnKind::DateTimeTz => match value.as_str() {
            Some(s) => chrono::DateTime::parse_from_rfc3339(s)
                .map(|_| ())
                .map_err(|e| format!("expected an RFC 3339 timestamp: {e}")),
            None => Err("expected an RFC 3339 timestamp string".to_string()),
        },
        ColumnKind::Enum(variants) => match value.as_str() {
            Some(s) if variants.iter().any(|v| v == s) => Ok(()),
            Some(s) => Err(format!("'{s}' is not one of {variants:?}")),
            None => Err("expected a string enum value".to_string()),
        },
        ColumnKind::StringList => match value.as_array() {
            Some(items) if items.iter().all(Value::is_string) => Ok(()),
            Some(_) => Err("expected an array of strings".to_string()),
            None => Err("expected an array of strings".to_string()),
        },
        ColumnKind::Json(validator) => {
            if let Some(validator) = validator {
                validator(value)
            } else {
                Ok(())
            }
        }
    }
}

/// Per-table [`Validator`]s for a workspace, exposed to providers and
/// exports factories so they can compose validation (e.g. the markdown
/// provider strips the body field out of the frontmatter validator).
#[derive(Clone)]
pub struct Validators(IndexMap<String, Validator>);

impl Validators {
    /// Compile one validator per table in a workspace schema.
    pub fn new(schema: &WorkspaceSchema) -> Self {
        let compiled = schema
            .iter()
            .map(|(name, table_schema)| (name.clone(), Validator::new(Arc::new(table_schema.clone()))))
            .collect();
        Self(compiled)
    }

    /// The validator for a given table, if declared.
    pub fn for_table(&self, table: &str) -> Option<&Validator> {
        self.0.get(table)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn notes_schema() -> TableSchema {
        let mut schema = TableSchema::new();
        schema.insert("id".to_string(), Column::new(ColumnKind::Id));
        schema.insert("content".to_string(), Column::new(ColumnKind::Text));
        schema.insert(
            "archived".to_string(),
            Column::new(ColumnKind::Boolean).with_default(json!(false)),
        );
        schema
    }

    #[test]
    fn validates_a_complete_row() {
        let validator = Validator::new(Arc::new(notes_schema()));
        let row = validator
            .validate(&json!({"id": "n1", "content": "hi"}))
            .unwrap();
        assert_eq!(row.id(), "n1");
        assert_eq!(row.as_object().get("archived"), Some(&json!(false)));
    }

    #[test]
    fn missing_required_field_is_reported() {
        let validator = Validator::new(Arc::new(notes_schema()));
        let err = validator.validate(&json!({"id": "n1"})).unwrap_err();
        assert_eq!(err.issues.len(), 1);
        assert_eq!(err.issues[0].field, "content");
    }

    #[test]
    fn missing_id_is_reported_without_panicking() {
        let validator = Validator::new(Arc::new(notes_schema()));
        let err = validator.validate(&json!({"content": "hi"})).unwrap_err();
        assert!(err.issues.iter().any(|i| i.field == "id"));
        assert_eq!(err.id, None);
    }

    #[test]
    fn wrong_type_is_reported() {
        let validator = Validator::new(Arc::new(notes_schema()));
        let err = validator
            .validate(&json!({"id": "n1", "content": 5}))
            .unwrap_err();
        assert!(err.issues.iter().any(|i| i.field == "content"));
    }

    #[test]
    fn enum_and_string_list_columns() {
        let mut schema = TableSchema::new();
        schema.insert("id".to_string(), Column::new(ColumnKind::Id));
        schema.insert(
            "status".to_string(),
            Column::new(ColumnKind::Enum(vec!["open".into(), "closed".into()])),
        );
        schema.insert("tags".to_string(), Column::new(ColumnKind::StringList));
        let validator = Validator::new(Arc::new(schema));

        assert!(
            validator
                .validate(&json!({"id": "t1", "status": "open", "tags": ["a", "b"]}))
                .is_ok()
        );
        assert!(
            validator
                .validate(&json!({"id": "t1", "status": "bogus", "tags": []}))
                .is_err()
        );
    }

    #[test]
    fn validator_is_deterministic() {
        let validator = Validator::new(Arc::new(notes_schema()));
        let input = json!({"id": "n1", "content": "hi"});
        let a = validator.validate(&input).unwrap();
        let b = validator.validate(&input).unwrap();
        assert_eq!(a, b);
    }
}
