//! Serializers: the encoding contract between a row and a markdown file.
//!
//! A [`Serializer`] is a pair of pure functions (`serialize`, `deserialize`)
//! plus a `parse_filename` stage that recovers a row id purely from a
//! filename string, with no access to file contents. `parse_filename` must be
//! the inverse of the filename half of `serialize` and total on well-formed
//! filenames; an unrecognizable filename maps to `None`, which the provider
//! treats as "can neither be matched to a row nor considered for deletion
//! tracking".

use indexmap::IndexMap;
use serde_json::Value;
use serde_yaml::Value as YamlValue;

use epicenter_core::Row;
use epicenter_core::error::Result;
use epicenter_core::frontmatter::ParsedFile;

/// A row encoded as the three pieces a markdown file is made of.
pub struct EncodedFile {
    /// Frontmatter fields, in the order they should be written.
    pub frontmatter: IndexMap<String, YamlValue>,
    /// Markdown body content.
    pub body: String,
    /// Filename (no directory component) to write this row under.
    pub filename: String,
}

/// What [`Serializer::parse_filename`] recovers from a filename alone.
pub struct FilenameParts {
    /// The row id this filename identifies.
    pub id: String,
}

/// The encoding contract between a [`Row`] and a markdown file.
///
/// Implementations must be pure: `serialize`/`deserialize` read only their
/// arguments, and `parse_filename` reads only the filename string.
pub trait Serializer: Send + Sync {
    /// Encode a row into frontmatter, body, and filename.
    fn serialize(&self, row: &Row) -> Result<EncodedFile>;

    /// Decode a parsed file back into a row's raw JSON value. The caller is
    /// responsible for running the result through the table's validator —
    /// a serializer only knows the file format, not the schema.
    fn deserialize(&self, parts: &FilenameParts, parsed: &ParsedFile) -> Result<Value>;

    /// Recover a row id (and any other filename-derived parts) from a
    /// filename, without reading the file. Returns `None` if the filename
    /// cannot be identified.
    fn parse_filename(&self, filename: &str) -> Option<FilenameParts>;
}

fn json_to_yaml(value: &Value) -> Result<YamlValue> {
    Ok(serde_yaml::to_value(value)?)
}

fn yaml_to_json(value: &YamlValue) -> Result<Value> {
    Ok(serde_json::to_value(value)?)
}

fn object_to_frontmatter(row: &Row, skip: &[&str]) -> Result<IndexMap<String, YamlValue>> {
    let mut frontmatter = IndexMap::new();
    for (key, value) in row.as_object() {
        if skip.contains(&key.as_str()) {
            continue;
        }
        frontmatter.insert(key.clone(), json_to_yaml(value)?);
    }
    Ok(frontmatter)
}

fn frontmatter_to_object(id: &str, frontmatter: &IndexMap<String, YamlValue>) -> Result<Value> {
    let mut object = serde_json::Map::new();
    object.insert("id".to_string(), Value::String(id.to_string()));
    for (key, value) in frontmatter {
        object.insert(key.clone(), yaml_to_json(value)?);
    }
    Ok(Value::Object(object))
}

fn parse_dot_md(filename: &str) -> Option<FilenameParts> {
    let id = filename.strip_suffix(".md")?;
    if id.is_empty() {
        return None;
    }
    Some(FilenameParts { id: id.to_string() })
}

/// All non-`id` fields into YAML frontmatter, empty body, filename `{id}.md`.
pub struct DefaultSerializer;

impl Serializer for DefaultSerializer {
    fn serialize(&self, row: &Row) -> Result<EncodedFile> {
        Ok(EncodedFile {
            frontmatter: object_to_frontmatter(row, &["id"])?,
            body: String::new(),
            filename: format!("{}.md", row.id()),
        })
    }

    fn deserialize(&self, parts: &FilenameParts, parsed: &ParsedFile) -> Result<Value> {
        frontmatter_to_object(&parts.id, &parsed.frontmatter)
    }

    fn parse_filename(&self, filename: &str) -> Option<FilenameParts> {
        parse_dot_md(filename)
    }
}

/// One designated field becomes the markdown body; the rest of the fields
/// (minus `id`) form frontmatter. Filename `{id}.md`.
pub struct BodyFieldSerializer {
    /// Name of the field that becomes the body.
    pub field: String,
    /// Whether to drop `null`-valued frontmatter fields on serialize.
    pub strip_nulls: bool,
}

impl BodyFieldSerializer {
    /// A body-field serializer over `field`, without null-stripping.
    pub fn new(field: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            strip_nulls: false,
        }
    }

    /// Drop `null`-valued frontmatter fields when serializing.
    pub fn strip_nulls(mut self) -> Self {
        self.strip_nulls = true;
        self
    }
}

impl Serializer for BodyFieldSerializer {
    fn serialize(&self, row: &Row) -> Result<EncodedFile> {
        let body = row
            .as_object()
            .get(&self.field)
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string();

        let mut frontmatter = object_to_frontmatter(row, &["id", self.field.as_str()])?;
        if self.strip_nulls {
            frontmatter.retain(|_, v| !matches!(v, YamlValue::Null));
        }

        Ok(EncodedFile {
            frontmatter,
            body,
            filename: format!("{}.md", row.id()),
        })
    }

    fn deserialize(&self, parts: &FilenameParts, parsed: &ParsedFile) -> Result<Value> {
        let mut object = frontmatter_to_object(&parts.id, &parsed.frontmatter)?;
        object
            .as_object_mut()
            .expect("frontmatter_to_object always returns an object")
            .insert(self.field.clone(), Value::String(parsed.body.clone()));
        Ok(object)
    }

    fn parse_filename(&self, filename: &str) -> Option<FilenameParts> {
        parse_dot_md(filename)
    }
}

/// Filename `{sanitizedTitle}-{id}.md`; all non-`id` fields in frontmatter
/// (including the title field itself, so a round trip needs no extra state).
///
/// `parse_filename` splits at the *last* dash — the title is sanitized and
/// lossy to begin with, so only the id half of the filename can be recovered
/// purely from the string. This means an id containing a dash isn't safe to
/// use with this serializer; ids are expected to be opaque identifiers (e.g.
/// nanoids or UUIDs) rather than free text.
pub struct TitleFilenameSerializer {
    /// Name of the field used to derive the filename's title component.
    pub title_field: String,
}

impl TitleFilenameSerializer {
    /// A title-filename serializer deriving filenames from `title_field`.
    pub fn new(title_field: impl Into<String>) -> Self {
        Self {
            title_field: title_field.into(),
        }
    }
}

fn sanitize_title(title: &str) -> String {
    let mut result = String::new();
    let mut last_was_dash = true; // avoid a leading dash
    for c in title.chars() {
        if c.is_alphanumeric() {
            result.extend(c.to_lowercase());
            last_was_dash = false;
        } else if !last_was_dash {
            result.push('-');
            last_was_dash = true;
        }
    }
    if result.ends_with('-') {
        result.pop();
    }
    if result.is_empty() {
        result.push_str("untitled");
    }
    result
}

impl Serializer for TitleFilenameSerializer {
    fn serialize(&self, row: &Row) -> Result<EncodedFile> {
        let title = row
            .as_object()
            .get(&self.title_field)
            .and_then(Value::as_str)
            .unwrap_or_default();

        Ok(EncodedFile {
            frontmatter: object_to_frontmatter(row, &["id"])?,
            body: String::new(),
            filename: format!("{}-{}.md", sanitize_title(title), row.id()),
        })
    }

    fn deserialize(&self, parts: &FilenameParts, parsed: &ParsedFile) -> Result<Value> {
        frontmatter_to_object(&parts.id, &parsed.frontmatter)
    }

    fn parse_filename(&self, filename: &str) -> Option<FilenameParts> {
        let stem = filename.strip_suffix(".md")?;
        let (_, id) = stem.rsplit_once('-')?;
        if id.is_empty() {
            return None;
        }
        Some(FilenameParts { id: id.to_string() })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use epicenter_core::schema::{Column, ColumnKind, TableSchema, Validator};
    use serde_json::json;
    use std::sync::Arc;

    fn row(value: serde_json::Value, fields: &[(&str, ColumnKind)]) -> Row {
        let mut schema = TableSchema::new();
        schema.insert("id".to_string(), Column::new(ColumnKind::Id));
        for (name, kind) in fields {
            schema.insert(name.to_string(), Column::new(kind.clone()).nullable());
        }
        Validator::new(Arc::new(schema)).validate(&value).unwrap()
    }

    #[test]
    fn default_serializer_round_trips() {
        let serializer = DefaultSerializer;
        let row = row(json!({"id": "n1", "content": "hi"}), &[("content", ColumnKind::Text)]);

        let encoded = serializer.serialize(&row).unwrap();
        assert_eq!(encoded.filename, "n1.md");
        assert_eq!(encoded.body, "");
        assert_eq!(encoded.frontmatter.get("content").unwrap().as_str(), Some("hi"));

        let parts = serializer.parse_filename(&encoded.filename).unwrap();
        assert_eq!(parts.id, "n1");
        let decoded = serializer
            .deserialize(
                &parts,
                &ParsedFile {
                    frontmatter: encoded.frontmatter,
                    body: encoded.body,
                },
            )
            .unwrap();
        assert_eq!(decoded, json!({"id": "n1", "content": "hi"}));
    }

    #[test]
    fn default_serializer_rejects_unidentifiable_filenames() {
        let serializer = DefaultSerializer;
        assert!(serializer.parse_filename("notes.txt").is_none());
        assert!(serializer.parse_filename(".md").is_none());
    }

    #[test]
    fn body_field_serializer_splits_body_from_frontmatter() {
        let serializer = BodyFieldSerializer::new("content");
        let row = row(
            json!({"id": "n1", "content": "hello world", "archived": false}),
            &[("content", ColumnKind::Text), ("archived", ColumnKind::Boolean)],
        );

        let encoded = serializer.serialize(&row).unwrap();
        assert_eq!(encoded.body, "hello world");
        assert!(!encoded.frontmatter.contains_key("content"));
        assert_eq!(encoded.frontmatter.get("archived").unwrap(), &YamlValue::Bool(false));

        let parts = serializer.parse_filename(&encoded.filename).unwrap();
        let decoded = serializer
            .deserialize(
                &parts,
                &ParsedFile {
                    frontmatter: encoded.frontmatter,
                    body: encoded.body,
                },
            )
            .unwrap();
        assert_eq!(decoded.get("content").unwrap(), "hello world");
    }

    #[test]
    fn body_field_serializer_strips_nulls_when_configured() {
        let serializer = BodyFieldSerializer::new("content").strip_nulls();
        let row = row(
            json!({"id": "n1", "content": "hi", "archived": null}),
            &[("content", ColumnKind::Text), ("archived", ColumnKind::Boolean)],
        );
        let encoded = serializer.serialize(&row).unwrap();
        assert!(!encoded.frontmatter.contains_key("archived"));
    }

    #[test]
    fn title_filename_serializer_derives_filename_from_title() {
        let serializer = TitleFilenameSerializer::new("title");
        let row = row(
            json!({"id": "t1", "title": "My Tab!", "url": "x"}),
            &[("title", ColumnKind::Text), ("url", ColumnKind::Text)],
        );

        let encoded = serializer.serialize(&row).unwrap();
        assert_eq!(encoded.filename, "my-tab-t1.md");

        let parts = serializer.parse_filename(&encoded.filename).unwrap();
        assert_eq!(parts.id, "t1");
    }

    #[test]
    fn title_filename_serializer_renames_when_title_changes() {
        let serializer = TitleFilenameSerializer::new("title");
        let before = row(json!({"id": "t1", "title": "A", "url": "x"}), &[("title", ColumnKind::Text), ("url", ColumnKind::Text)]);
        let after = row(json!({"id": "t1", "title": "B", "url": "x"}), &[("title", ColumnKind::Text), ("url", ColumnKind::Text)]);

        assert_eq!(serializer.serialize(&before).unwrap().filename, "a-t1.md");
        assert_eq!(serializer.serialize(&after).unwrap().filename, "b-t1.md");
    }

    #[test]
    fn title_filename_serializer_parse_filename_is_total_on_well_formed_names() {
        let serializer = TitleFilenameSerializer::new("title");
        assert!(serializer.parse_filename("untitled.md").is_none());
        assert!(serializer.parse_filename("a-t1.md").is_some());
    }
}
