//! Record persistence seam.
//!
//! The importer only talks to [`RecordStore`]. [`MemoryStore`] keeps records in
//! memory and can be loaded from and saved to a JSON file, which is what the
//! command line uses.

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, instrument};

use crate::error::{Result, ToolError};

/// Identifier the store assigns to a created record.
pub type RecordId = String;

/// Field name → value of a stored record.
pub type Fields = BTreeMap<String, Value>;

/// Field name → expected value; a record matches when every entry is equal.
pub type Filter = BTreeMap<String, Value>;

/// Key under which a record's identifier is exposed to filters.
pub const ID_FIELD: &str = "name";

/// Switches off the checks a regular write goes through.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct WriteFlags {
    pub ignore_permissions: bool,
    pub ignore_mandatory: bool,
}

impl WriteFlags {
    /// Flags used by bulk imports.
    pub fn unchecked() -> Self {
        Self {
            ignore_permissions: true,
            ignore_mandatory: true,
        }
    }
}

/// A record as returned by [`RecordStore::query`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredRecord {
    pub id: RecordId,
    pub fields: Fields,
}

impl StoredRecord {
    /// Returns a string field, treating blanks and non-strings as absent.
    pub fn text(&self, field: &str) -> Option<&str> {
        self.fields
            .get(field)
            .and_then(Value::as_str)
            .filter(|value| !value.is_empty())
    }

    pub fn flag(&self, field: &str) -> bool {
        match self.fields.get(field) {
            Some(Value::Bool(value)) => *value,
            Some(Value::Number(number)) => number.as_f64().is_some_and(|value| value != 0.0),
            _ => false,
        }
    }
}

/// Typed record persistence.
pub trait RecordStore {
    /// Creates a record and returns its assigned identifier.
    fn create(&mut self, kind: &str, fields: Fields, flags: WriteFlags) -> Result<RecordId>;

    /// Replaces the given fields of an existing record.
    fn update(&mut self, kind: &str, id: &str, fields: Fields) -> Result<()>;

    /// Returns every record of `kind` matching `filter`, in creation order.
    fn query(&self, kind: &str, filter: &Filter) -> Result<Vec<StoredRecord>>;

    /// Removes every record of `kind` matching `filter`. Returns the number removed.
    fn delete_where(&mut self, kind: &str, filter: &Filter) -> Result<usize>;

    /// Fetches one record by identifier.
    fn get(&self, kind: &str, id: &str) -> Result<StoredRecord> {
        let filter = Filter::from([(ID_FIELD.to_string(), Value::from(id))]);
        self.query(kind, &filter)?
            .into_iter()
            .next()
            .ok_or_else(|| ToolError::MissingRecord {
                kind: kind.to_string(),
                id: id.to_string(),
            })
    }
}

/// Convenience constructor for a single-field equality filter.
pub fn filter_eq(field: &str, value: impl Into<Value>) -> Filter {
    Filter::from([(field.to_string(), value.into())])
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct KindTable {
    next_id: u64,
    records: Vec<StoredRecord>,
}

/// In-memory record store with optional JSON persistence.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MemoryStore {
    kinds: BTreeMap<String, KindTable>,
    /// Fields a checked create requires, per kind.
    #[serde(default)]
    mandatory: BTreeMap<String, Vec<String>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Loads a store file. A missing file yields an empty store.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::new());
        }
        let source = fs::read_to_string(path)?;
        Ok(serde_json::from_str(&source)?)
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        fs::write(path, serde_json::to_string_pretty(self)?)?;
        Ok(())
    }

    /// Declares fields that checked creates of `kind` must carry.
    pub fn require_fields(&mut self, kind: &str, fields: &[&str]) {
        self.mandatory.insert(
            kind.to_string(),
            fields.iter().map(|field| field.to_string()).collect(),
        );
    }

    /// Number of stored records of `kind`.
    pub fn count(&self, kind: &str) -> usize {
        self.kinds
            .get(kind)
            .map(|table| table.records.len())
            .unwrap_or(0)
    }

    fn check_mandatory(&self, kind: &str, fields: &Fields) -> Result<()> {
        let Some(required) = self.mandatory.get(kind) else {
            return Ok(());
        };
        for field in required {
            let present = match fields.get(field) {
                None | Some(Value::Null) => false,
                Some(Value::String(value)) => !value.is_empty(),
                Some(_) => true,
            };
            if !present {
                return Err(ToolError::MissingMandatory {
                    kind: kind.to_string(),
                    field: field.clone(),
                });
            }
        }
        Ok(())
    }
}

fn matches(record: &StoredRecord, filter: &Filter) -> bool {
    filter.iter().all(|(field, expected)| {
        if field == ID_FIELD {
            return expected.as_str() == Some(record.id.as_str());
        }
        record.fields.get(field).unwrap_or(&Value::Null) == expected
    })
}

fn id_prefix(kind: &str) -> String {
    kind.split_whitespace()
        .filter_map(|word| word.chars().next())
        .flat_map(char::to_uppercase)
        .collect()
}

impl RecordStore for MemoryStore {
    #[instrument(level = "trace", skip(self, fields))]
    fn create(&mut self, kind: &str, fields: Fields, flags: WriteFlags) -> Result<RecordId> {
        if !flags.ignore_mandatory {
            self.check_mandatory(kind, &fields)?;
        }
        let table = self.kinds.entry(kind.to_string()).or_default();
        table.next_id += 1;
        let id = format!("{}-{:05}", id_prefix(kind), table.next_id);
        table.records.push(StoredRecord {
            id: id.clone(),
            fields,
        });
        debug!(%id, "record created");
        Ok(id)
    }

    fn update(&mut self, kind: &str, id: &str, fields: Fields) -> Result<()> {
        let record = self
            .kinds
            .get_mut(kind)
            .and_then(|table| table.records.iter_mut().find(|record| record.id == id))
            .ok_or_else(|| ToolError::MissingRecord {
                kind: kind.to_string(),
                id: id.to_string(),
            })?;
        record.fields.extend(fields);
        Ok(())
    }

    fn query(&self, kind: &str, filter: &Filter) -> Result<Vec<StoredRecord>> {
        Ok(self
            .kinds
            .get(kind)
            .map(|table| {
                table
                    .records
                    .iter()
                    .filter(|record| matches(record, filter))
                    .cloned()
                    .collect()
            })
            .unwrap_or_default())
    }

    fn delete_where(&mut self, kind: &str, filter: &Filter) -> Result<usize> {
        let Some(table) = self.kinds.get_mut(kind) else {
            return Ok(0);
        };
        let before = table.records.len();
        table.records.retain(|record| !matches(record, filter));
        Ok(before - table.records.len())
    }
}
