//! The typed CRUD/observation API over one table's Y.Map container.
//!
//! A [`Table`] revalidates on every read: a row that fails its schema is
//! never silently dropped, but it's also never handed back as a [`Row`] —
//! callers choose whether they want only the valid rows ([`Table::get_all_valid`])
//! or a full accounting including the invalid ones ([`Table::get_all`]).

use std::sync::Arc;

use serde_json::Value;

use crate::crdt::{Document, Origin, RowChange};
use crate::error::{EpicenterError, Result};
use crate::schema::{Row, TableSchema, ValidationIssues, Validator};

/// The kind of change a [`RowEvent`] reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeKind {
    /// A row was created or overwritten.
    Upsert,
    /// A row was removed.
    Delete,
}

/// The outcome of validating a row at the time a change was observed.
#[derive(Debug, Clone)]
pub enum RowOutcome {
    /// The row satisfied its table's schema.
    Valid(Row),
    /// The row failed validation; delivered as a structured error payload
    /// instead of being dropped, so observers can still react (e.g. surface
    /// it in a diagnostics view).
    Invalid(ValidationIssues),
}

/// One row-level change, delivered in a batch sharing a single origin.
#[derive(Debug, Clone)]
pub struct RowEvent {
    /// What happened to the row.
    pub kind: ChangeKind,
    /// The row's id.
    pub id: String,
    /// The row's value before the change, if one existed and could be parsed.
    pub old: Option<RowOutcome>,
    /// The row's value after the change. `None` for deletes.
    pub new: Option<RowOutcome>,
    /// Where the transaction that produced this change came from.
    pub origin: Origin,
}

fn outcome_from_value(validator: &Validator, value: &Value) -> RowOutcome {
    match validator.validate(value) {
        Ok(row) => RowOutcome::Valid(row),
        Err(issues) => RowOutcome::Invalid(issues),
    }
}

/// Shallow-merge a JSON patch onto an existing JSON object: patch fields
/// override same-named fields in the base; fields present only in the base
/// are kept as-is.
fn shallow_merge(mut base: Value, patch: Value) -> Value {
    let (Some(base_obj), Some(patch_obj)) = (base.as_object_mut(), patch.as_object()) else {
        return patch;
    };
    for (key, value) in patch_obj {
        base_obj.insert(key.clone(), value.clone());
    }
    base
}

/// Typed CRUD and observation over one table.
#[derive(Clone)]
pub struct Table {
    name: String,
    document: Arc<Document>,
    validator: Validator,
}

impl Table {
    /// Build a table handle over an existing table name in `document`,
    /// compiling a validator from `schema`.
    pub fn new(name: impl Into<String>, document: Arc<Document>, schema: Arc<TableSchema>) -> Self {
        Self {
            name: name.into(),
            document,
            validator: Validator::new(schema),
        }
    }

    /// This table's name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Insert a row, or overwrite it in full if a row with the same id exists.
    ///
    /// The input must validate against this table's schema; unlike [`Table::update`],
    /// there is no existing-row fallback to merge against.
    pub fn upsert(&self, value: Value) -> Result<Row> {
        let row = self
            .validator
            .validate(&value)
            .map_err(EpicenterError::from)?;
        let json = serde_json::to_string(row.as_object())?;
        self.document
            .upsert_row(&self.name, row.id(), json, &Origin::Local)?;
        Ok(row)
    }

    /// [`Table::upsert`] for many rows. Stops at the first validation failure;
    /// rows before it are still persisted (this is not a transaction).
    pub fn upsert_many(&self, values: impl IntoIterator<Item = Value>) -> Result<Vec<Row>> {
        values.into_iter().map(|v| self.upsert(v)).collect()
    }

    /// Shallow-merge `patch` onto the existing row and revalidate.
    ///
    /// Intentionally a no-op — returns `Ok(None)` — when no row with this id
    /// exists locally yet. A synced row can arrive as a CRDT update after an
    /// `update()` call was issued for it; treating a missing row as "create
    /// it from just the patch" would let a partial local write clobber a full
    /// remote row under last-writer-wins. Use [`Table::upsert`] to create.
    pub fn update(&self, id: &str, patch: Value) -> Result<Option<Row>> {
        let Some(existing_json) = self.document.get_row(&self.name, id) else {
            return Ok(None);
        };
        let existing: Value = serde_json::from_str(&existing_json)?;
        let merged = shallow_merge(existing, patch);
        let row = self
            .validator
            .validate(&merged)
            .map_err(EpicenterError::from)?;
        let json = serde_json::to_string(row.as_object())?;
        self.document
            .upsert_row(&self.name, id, json, &Origin::Local)?;
        Ok(Some(row))
    }

    /// [`Table::update`] for many `(id, patch)` pairs.
    pub fn update_many(
        &self,
        patches: impl IntoIterator<Item = (String, Value)>,
    ) -> Result<Vec<Option<Row>>> {
        patches
            .into_iter()
            .map(|(id, patch)| self.update(&id, patch))
            .collect()
    }

    /// Fetch a row by id, revalidating it against the current schema.
    ///
    /// Returns `None` if no row with this id exists. Returns `Some(Err(..))`
    /// if a row exists but fails validation — callers that only want valid
    /// rows should use [`Table::get_all_valid`] or match on the result.
    pub fn get(&self, id: &str) -> Option<std::result::Result<Row, ValidationIssues>> {
        let json = self.document.get_row(&self.name, id)?;
        let value: Value = serde_json::from_str(&json).ok()?;
        Some(self.validator.validate(&value))
    }

    /// All rows, each revalidated, including ones that fail validation.
    pub fn get_all(&self) -> Vec<std::result::Result<Row, ValidationIssues>> {
        self.document
            .all_rows(&self.name)
            .into_iter()
            .filter_map(|(_, json)| {
                let value: Value = serde_json::from_str(&json).ok()?;
                Some(self.validator.validate(&value))
            })
            .collect()
    }

    /// All rows that currently pass validation.
    pub fn get_all_valid(&self) -> Vec<Row> {
        self.get_all().into_iter().filter_map(Result::ok).collect()
    }

    /// Validation failures across all currently stored rows.
    pub fn get_all_invalid(&self) -> Vec<ValidationIssues> {
        self.get_all().into_iter().filter_map(Result::err).collect()
    }

    /// Whether a row with this id is present, independent of its validity.
    pub fn has(&self, id: &str) -> bool {
        self.document.get_row(&self.name, id).is_some()
    }

    /// Remove a row. Returns whether a row with this id existed beforehand.
    pub fn delete(&self, id: &str) -> Result<bool> {
        let existed = self.has(id);
        if existed {
            self.document.remove_row(&self.name, id, &Origin::Local)?;
        }
        Ok(existed)
    }

    /// [`Table::delete`] for many ids. Returns how many rows actually existed.
    pub fn delete_many(&self, ids: impl IntoIterator<Item = impl AsRef<str>>) -> Result<usize> {
        let mut deleted = 0;
        for id in ids {
            if self.delete(id.as_ref())? {
                deleted += 1;
            }
        }
        Ok(deleted)
    }

    /// Remove every row in this table.
    pub fn clear(&self) -> Result<()> {
        let ids: Vec<String> = self
            .document
            .all_rows(&self.name)
            .into_iter()
            .map(|(id, _)| id)
            .collect();
        for id in ids {
            self.document.remove_row(&self.name, &id, &Origin::Local)?;
        }
        Ok(())
    }

    /// Valid rows matching `predicate`.
    pub fn filter(&self, predicate: impl Fn(&Row) -> bool) -> Vec<Row> {
        self.get_all_valid().into_iter().filter(|row| predicate(row)).collect()
    }

    /// The first valid row matching `predicate`, if any.
    pub fn find(&self, predicate: impl Fn(&Row) -> bool) -> Option<Row> {
        self.get_all_valid().into_iter().find(|row| predicate(row))
    }

    /// Number of rows currently stored, valid or not.
    pub fn count(&self) -> usize {
        self.document.row_count(&self.name)
    }

    /// Subscribe to row-level changes on this table.
    ///
    /// `callback` is invoked once per transaction that touched this table's
    /// rows, with every change from that transaction and the origin it came
    /// from — whether that was a local CRUD call or a CRDT update applied by
    /// a sync provider. The returned subscription must be kept alive for as
    /// long as the callback should keep firing.
    pub fn observe<F>(&self, callback: F) -> yrs::Subscription
    where
        F: Fn(&[RowEvent]) + 'static,
    {
        let validator = self.validator.clone();
        self.document.observe_table(&self.name, move |changes, origin| {
            let events: Vec<RowEvent> = changes
                .into_iter()
                .map(|(id, change)| match change {
                    RowChange::Upserted { old, new } => RowEvent {
                        kind: ChangeKind::Upsert,
                        id,
                        old: old.as_ref().map(|v| outcome_from_value(&validator, v)),
                        new: Some(outcome_from_value(&validator, &new)),
                        origin: origin.clone(),
                    },
                    RowChange::Removed { old } => RowEvent {
                        kind: ChangeKind::Delete,
                        id,
                        old: old.as_ref().map(|v| outcome_from_value(&validator, v)),
                        new: None,
                        origin: origin.clone(),
                    },
                })
                .collect();

            callback(&events);
        })
    }
}

/// The read-only facade over every table declared by a workspace, handed to
/// provider factories and exports factories as `context.tables` (spec.md §4.2).
///
/// Cheap to clone: it's an `Arc` over the compiled map, so every clone shares
/// the same underlying [`Table`] handles (which are themselves cheap to clone).
#[derive(Clone)]
pub struct Tables(Arc<indexmap::IndexMap<String, Table>>);

impl Tables {
    /// Wrap a compiled `name -> Table` map as a facade.
    pub fn new(tables: indexmap::IndexMap<String, Table>) -> Self {
        Self(Arc::new(tables))
    }

    /// The table declared under `name`, if any.
    pub fn get(&self, name: &str) -> Option<&Table> {
        self.0.get(name)
    }

    /// Names of every declared table, in schema declaration order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(String::as_str)
    }

    /// Iterate over every `(name, Table)` pair.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &Table)> {
        self.0.iter().map(|(name, table)| (name.as_str(), table))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crdt::MemoryStorage;
    use crate::schema::{Column, ColumnKind};
    use serde_json::json;
    use std::sync::Mutex;

    fn notes_schema() -> TableSchema {
        let mut schema = TableSchema::new();
        schema.insert("id".to_string(), Column::new(ColumnKind::Id));
        schema.insert("content".to_string(), Column::new(ColumnKind::Text));
        schema
    }

    fn table() -> Table {
        let storage = Arc::new(MemoryStorage::new());
        let document = Arc::new(Document::new("ws1", ["notes"], storage));
        Table::new("notes", document, Arc::new(notes_schema()))
    }

    #[test]
    fn upsert_then_get() {
        let table = table();
        table.upsert(json!({"id": "n1", "content": "hi"})).unwrap();
        let row = table.get("n1").unwrap().unwrap();
        assert_eq!(row.id(), "n1");
        assert_eq!(table.count(), 1);
    }

    #[test]
    fn upsert_rejects_invalid_input() {
        let table = table();
        assert!(table.upsert(json!({"id": "n1"})).is_err());
    }

    #[test]
    fn update_is_a_no_op_when_row_is_missing() {
        let table = table();
        let result = table.update("missing", json!({"content": "hi"})).unwrap();
        assert!(result.is_none());
        assert!(!table.has("missing"));
    }

    #[test]
    fn update_merges_onto_existing_row() {
        let table = table();
        table.upsert(json!({"id": "n1", "content": "hi"})).unwrap();
        let updated = table.update("n1", json!({"content": "bye"})).unwrap().unwrap();
        assert_eq!(updated.as_object().get("content"), Some(&json!("bye")));
    }

    #[test]
    fn delete_reports_prior_existence() {
        let table = table();
        assert!(!table.delete("n1").unwrap());
        table.upsert(json!({"id": "n1", "content": "hi"})).unwrap();
        assert!(table.delete("n1").unwrap());
        assert!(!table.has("n1"));
    }

    #[test]
    fn clear_removes_every_row() {
        let table = table();
        table.upsert(json!({"id": "n1", "content": "a"})).unwrap();
        table.upsert(json!({"id": "n2", "content": "b"})).unwrap();
        table.clear().unwrap();
        assert_eq!(table.count(), 0);
    }

    #[test]
    fn filter_and_find_only_see_valid_rows() {
        let table = table();
        table.upsert(json!({"id": "n1", "content": "keep"})).unwrap();
        table.upsert(json!({"id": "n2", "content": "drop"})).unwrap();

        let kept = table.filter(|row| row.as_object().get("content") == Some(&json!("keep")));
        assert_eq!(kept.len(), 1);
        assert_eq!(kept[0].id(), "n1");

        assert!(table.find(|row| row.id() == "n2").is_some());
        assert!(table.find(|row| row.id() == "missing").is_none());
    }

    #[test]
    fn get_all_invalid_surfaces_schema_failures_without_dropping_them() {
        let storage = Arc::new(MemoryStorage::new());
        let document = Arc::new(Document::new("ws1", ["notes"], storage));
        document
            .upsert_row("notes", "bad", r#"{"id":"bad"}"#.to_string(), &Origin::Local)
            .unwrap();
        let table = Table::new("notes", document, Arc::new(notes_schema()));

        assert_eq!(table.get_all_valid().len(), 0);
        assert_eq!(table.get_all_invalid().len(), 1);
        assert_eq!(table.count(), 1);
    }

    #[test]
    fn observe_batches_changes_with_their_origin() {
        let table = table();
        let seen: Arc<Mutex<Vec<RowEvent>>> = Arc::new(Mutex::new(Vec::new()));
        let seen_clone = seen.clone();
        let _sub = table.observe(move |events| {
            seen_clone.lock().unwrap().extend_from_slice(events);
        });

        table.upsert(json!({"id": "n1", "content": "hi"})).unwrap();
        table.delete("n1").unwrap();

        let recorded = seen.lock().unwrap();
        assert_eq!(recorded.len(), 2);
        assert_eq!(recorded[0].kind, ChangeKind::Upsert);
        assert_eq!(recorded[0].origin, Origin::Local);
        assert_eq!(recorded[1].kind, ChangeKind::Delete);
    }

    #[test]
    fn tables_facade_looks_up_by_name() {
        let mut map = indexmap::IndexMap::new();
        map.insert("notes".to_string(), table());
        let tables = Tables::new(map);

        assert!(tables.get("notes").is_some());
        assert!(tables.get("missing").is_none());
        assert_eq!(tables.names().collect::<Vec<_>>(), vec!["notes"]);
    }
}
