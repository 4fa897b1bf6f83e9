//! Key-value persistence seam.
//!
//! The engine addresses records by [`RecordKey`] and never touches files
//! directly. Two backends ship with the crate: [`MemoryStore`] here and
//! [`crate::fs_store::FsStore`] for the on-device JSON layout.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};

use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;

use crate::error::{FieldTestError, Result};
use crate::record::Partition;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum RecordKind {
    Curve,
    Form,
    /// Standalone audit copy of a test, owned by its form.
    Test { form_id: String },
    /// Unpartitioned settings (recent values, general info, passcodes).
    Setting,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RecordKey {
    pub kind: RecordKind,
    pub partition: Partition,
    pub id: String,
}

impl RecordKey {
    pub fn curve(name: &str, partition: Partition) -> Self {
        Self {
            kind: RecordKind::Curve,
            partition,
            id: name.to_string(),
        }
    }

    pub fn form(form_id: &str, partition: Partition) -> Self {
        Self {
            kind: RecordKind::Form,
            partition,
            id: form_id.to_string(),
        }
    }

    pub fn test(form_id: &str, test_id: &str, partition: Partition) -> Self {
        Self {
            kind: RecordKind::Test {
                form_id: form_id.to_string(),
            },
            partition,
            id: test_id.to_string(),
        }
    }

    pub fn setting(name: &str) -> Self {
        Self {
            kind: RecordKind::Setting,
            partition: Partition::Active,
            id: name.to_string(),
        }
    }
}

impl std::fmt::Display for RecordKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.kind {
            RecordKind::Curve => write!(f, "curve {} ({})", self.id, self.partition),
            RecordKind::Form => write!(f, "form {} ({})", self.id, self.partition),
            RecordKind::Test { form_id } => {
                write!(f, "test {}/{} ({})", form_id, self.id, self.partition)
            }
            RecordKind::Setting => write!(f, "setting {}", self.id),
        }
    }
}

/// Persistence collaborator. Every method either fully applies or leaves
/// the store untouched.
pub trait Store: Send + Sync {
    fn read(&self, key: &RecordKey) -> Result<Option<Value>>;

    /// Create-only write. Returns `false` if the key is already taken.
    fn insert(&self, key: &RecordKey, record: &Value) -> Result<bool>;

    /// Upsert several records as one unit.
    fn commit(&self, writes: &[(RecordKey, Value)]) -> Result<()>;

    /// Delete a record; a form takes its test records with it. Only used to
    /// undo a reservation whose follow-up write failed.
    fn remove(&self, key: &RecordKey) -> Result<()>;

    /// Move a curve or form to another partition. A form's test records
    /// move with it.
    fn relocate(&self, key: &RecordKey, to: Partition) -> Result<()>;

    /// Ids of every record of `kind` in `partition`, sorted.
    fn ids(&self, kind: &RecordKind, partition: Partition) -> Result<Vec<String>>;
}

pub(crate) fn read_as<T, S>(store: &S, key: &RecordKey) -> Result<Option<T>>
where
    T: DeserializeOwned,
    S: Store + ?Sized,
{
    match store.read(key)? {
        Some(value) => Ok(Some(serde_json::from_value(value)?)),
        None => Ok(None),
    }
}

pub(crate) fn to_record<T: Serialize>(value: &T) -> Result<Value> {
    Ok(serde_json::to_value(value)?)
}

fn relocatable(key: &RecordKey) -> Result<()> {
    match key.kind {
        RecordKind::Curve | RecordKind::Form => Ok(()),
        _ => Err(FieldTestError::Persistence(format!(
            "{key} cannot be moved between partitions"
        ))),
    }
}

/// In-process store. Used by tests and embedders that keep no files.
#[derive(Debug, Default)]
pub struct MemoryStore {
    records: Mutex<HashMap<RecordKey, Value>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn records(&self) -> MutexGuard<'_, HashMap<RecordKey, Value>> {
        self.records.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Store for MemoryStore {
    fn read(&self, key: &RecordKey) -> Result<Option<Value>> {
        Ok(self.records().get(key).cloned())
    }

    fn insert(&self, key: &RecordKey, record: &Value) -> Result<bool> {
        let mut records = self.records();
        if records.contains_key(key) {
            return Ok(false);
        }
        records.insert(key.clone(), record.clone());
        Ok(true)
    }

    fn commit(&self, writes: &[(RecordKey, Value)]) -> Result<()> {
        let mut records = self.records();
        for (key, value) in writes {
            records.insert(key.clone(), value.clone());
        }
        Ok(())
    }

    fn remove(&self, key: &RecordKey) -> Result<()> {
        let mut records = self.records();
        records.remove(key);
        if key.kind == RecordKind::Form {
            records.retain(|k, _| {
                !(k.partition == key.partition
                    && matches!(&k.kind, RecordKind::Test { form_id } if *form_id == key.id))
            });
        }
        Ok(())
    }

    fn relocate(&self, key: &RecordKey, to: Partition) -> Result<()> {
        relocatable(key)?;
        let mut records = self.records();
        if !records.contains_key(key) {
            return Err(FieldTestError::NotFound(key.to_string()));
        }
        let target = RecordKey {
            partition: to,
            ..key.clone()
        };
        if records.contains_key(&target) {
            return Err(FieldTestError::Persistence(format!("{target} already exists")));
        }

        let mut moving = vec![key.clone()];
        if key.kind == RecordKind::Form {
            moving.extend(records.keys().filter(|k| {
                k.partition == key.partition
                    && matches!(&k.kind, RecordKind::Test { form_id } if *form_id == key.id)
            }).cloned());
        }
        for old in moving {
            if let Some(value) = records.remove(&old) {
                let new = RecordKey {
                    partition: to,
                    ..old
                };
                records.insert(new, value);
            }
        }
        Ok(())
    }

    fn ids(&self, kind: &RecordKind, partition: Partition) -> Result<Vec<String>> {
        let mut ids: Vec<String> = self
            .records()
            .keys()
            .filter(|k| &k.kind == kind && k.partition == partition)
            .map(|k| k.id.clone())
            .collect();
        ids.sort();
        Ok(ids)
    }
}
