//! JSON-file store using the field device's directory layout.
//!
//! ```text
//! <base>/Curves/<name>.json
//! <base>/ArchivedCurves/<name>.json
//! <base>/Forms/<form_id>/form.json
//! <base>/Forms/<form_id>/Tests/<test_id>.json
//! <base>/ArchivedForms/...
//! <base>/<setting>.json
//! ```
//!
//! Every write lands in a sibling temp file first and is renamed into place,
//! so readers never see a half-written record. Partition moves are a single
//! `rename` of the curve file or the whole form directory.

use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use serde_json::Value;
use tracing::{debug, warn};

use crate::error::{FieldTestError, Result};
use crate::record::Partition;
use crate::schema::layout;
use crate::store::{RecordKey, RecordKind, Store};

const TMP_SUFFIX: &str = "tmp";

#[derive(Debug, Clone)]
pub struct FsStore {
    base: PathBuf,
}

impl FsStore {
    /// Open (and create if needed) the storage tree under `base`.
    pub fn open(base: impl Into<PathBuf>) -> Result<Self> {
        let base = base.into();
        for dir in [
            layout::CURVES_DIR,
            layout::ARCHIVED_CURVES_DIR,
            layout::FORMS_DIR,
            layout::ARCHIVED_FORMS_DIR,
        ] {
            fs::create_dir_all(base.join(dir))?;
        }
        debug!(path = %base.display(), "Opened file store");
        Ok(Self { base })
    }

    pub fn base(&self) -> &Path {
        &self.base
    }

    fn forms_root(&self, partition: Partition) -> PathBuf {
        match partition {
            Partition::Active => self.base.join(layout::FORMS_DIR),
            Partition::Archived => self.base.join(layout::ARCHIVED_FORMS_DIR),
        }
    }

    fn curves_root(&self, partition: Partition) -> PathBuf {
        match partition {
            Partition::Active => self.base.join(layout::CURVES_DIR),
            Partition::Archived => self.base.join(layout::ARCHIVED_CURVES_DIR),
        }
    }

    fn form_dir(&self, form_id: &str, partition: Partition) -> PathBuf {
        self.forms_root(partition).join(form_id)
    }

    /// File holding the record behind `key`.
    fn record_path(&self, key: &RecordKey) -> Result<PathBuf> {
        check_id(&key.id)?;
        let path = match &key.kind {
            RecordKind::Curve => self
                .curves_root(key.partition)
                .join(format!("{}.json", key.id)),
            RecordKind::Form => self
                .form_dir(&key.id, key.partition)
                .join(layout::FORM_FILE),
            RecordKind::Test { form_id } => {
                check_id(form_id)?;
                self.form_dir(form_id, key.partition)
                    .join(layout::TESTS_DIR)
                    .join(format!("{}.json", key.id))
            }
            RecordKind::Setting => self.base.join(format!("{}.json", key.id)),
        };
        Ok(path)
    }

    /// File or directory that moves when `key` changes partition.
    fn movable_path(&self, key: &RecordKey, partition: Partition) -> Result<PathBuf> {
        check_id(&key.id)?;
        match key.kind {
            RecordKind::Curve => Ok(self
                .curves_root(partition)
                .join(format!("{}.json", key.id))),
            RecordKind::Form => Ok(self.form_dir(&key.id, partition)),
            _ => Err(FieldTestError::Persistence(format!(
                "{key} cannot be moved between partitions"
            ))),
        }
    }

    fn json_stems(dir: &Path) -> Result<Vec<String>> {
        let entries = match fs::read_dir(dir) {
            Ok(entries) => entries,
            Err(err) if err.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(err) => return Err(err.into()),
        };
        let mut ids = Vec::new();
        for entry in entries {
            let path = entry?.path();
            if path.extension().and_then(|e| e.to_str()) != Some("json") {
                continue;
            }
            if let Some(stem) = path.file_stem().and_then(|s| s.to_str()) {
                ids.push(stem.to_string());
            }
        }
        Ok(ids)
    }

    fn form_ids(&self, partition: Partition) -> Result<Vec<String>> {
        let mut ids = Vec::new();
        for entry in fs::read_dir(self.forms_root(partition))? {
            let entry = entry?;
            if entry.path().join(layout::FORM_FILE).is_file() {
                if let Some(name) = entry.file_name().to_str() {
                    ids.push(name.to_string());
                }
            }
        }
        Ok(ids)
    }
}

impl Store for FsStore {
    fn read(&self, key: &RecordKey) -> Result<Option<Value>> {
        let path = self.record_path(key)?;
        match fs::read(&path) {
            Ok(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            Err(err) if err.kind() == ErrorKind::NotFound => Ok(None),
            Err(err) => Err(err.into()),
        }
    }

    fn insert(&self, key: &RecordKey, record: &Value) -> Result<bool> {
        let path = self.record_path(key)?;
        let bytes = serde_json::to_vec_pretty(record)?;

        if key.kind == RecordKind::Form {
            // The form directory is the reservation.
            let dir = self.form_dir(&key.id, key.partition);
            match fs::create_dir(&dir) {
                Ok(()) => {}
                Err(err) if err.kind() == ErrorKind::AlreadyExists => return Ok(false),
                Err(err) => return Err(err.into()),
            }
            if let Err(err) = write_atomic(&path, &bytes) {
                let _ = fs::remove_dir_all(&dir);
                return Err(err);
            }
            return Ok(true);
        }

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let tmp = tmp_path(&path);
        fs::write(&tmp, &bytes)?;
        // hard_link refuses to replace an existing file.
        let linked = fs::hard_link(&tmp, &path);
        let _ = fs::remove_file(&tmp);
        match linked {
            Ok(()) => Ok(true),
            Err(err) if err.kind() == ErrorKind::AlreadyExists => Ok(false),
            Err(err) => Err(err.into()),
        }
    }

    fn commit(&self, writes: &[(RecordKey, Value)]) -> Result<()> {
        // Stage everything before touching any live record.
        let mut staged: Vec<(PathBuf, PathBuf)> = Vec::with_capacity(writes.len());
        for (key, value) in writes {
            let staging = (|| -> Result<(PathBuf, PathBuf)> {
                let path = self.record_path(key)?;
                if let Some(parent) = path.parent() {
                    fs::create_dir_all(parent)?;
                }
                let tmp = tmp_path(&path);
                fs::write(&tmp, serde_json::to_vec_pretty(value)?)?;
                Ok((tmp, path))
            })();
            match staging {
                Ok(pair) => staged.push(pair),
                Err(err) => {
                    discard(&staged);
                    return Err(err);
                }
            }
        }

        let mut applied: Vec<(PathBuf, Option<Vec<u8>>)> = Vec::with_capacity(staged.len());
        for (i, (tmp, path)) in staged.iter().enumerate() {
            let previous = match fs::read(path) {
                Ok(bytes) => Some(bytes),
                Err(err) if err.kind() == ErrorKind::NotFound => None,
                Err(err) => {
                    rollback(&applied);
                    discard(&staged[i..]);
                    return Err(err.into());
                }
            };
            if let Err(err) = fs::rename(tmp, path) {
                warn!(path = %path.display(), error = %err, "Commit failed, rolling back");
                rollback(&applied);
                discard(&staged[i..]);
                return Err(err.into());
            }
            applied.push((path.clone(), previous));
        }
        debug!(records = writes.len(), "Committed records");
        Ok(())
    }

    fn remove(&self, key: &RecordKey) -> Result<()> {
        let removed = if key.kind == RecordKind::Form {
            fs::remove_dir_all(self.form_dir(&key.id, key.partition))
        } else {
            fs::remove_file(self.record_path(key)?)
        };
        match removed {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == ErrorKind::NotFound => Ok(()),
            Err(err) => Err(err.into()),
        }
    }

    fn relocate(&self, key: &RecordKey, to: Partition) -> Result<()> {
        let from = self.movable_path(key, key.partition)?;
        let dest = self.movable_path(key, to)?;
        if !from.exists() {
            return Err(FieldTestError::NotFound(key.to_string()));
        }
        if dest.exists() {
            return Err(FieldTestError::Persistence(format!(
                "{} already exists",
                dest.display()
            )));
        }
        if let Some(parent) = dest.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::rename(&from, &dest)?;
        debug!(from = %from.display(), to = %dest.display(), "Relocated record");
        Ok(())
    }

    fn ids(&self, kind: &RecordKind, partition: Partition) -> Result<Vec<String>> {
        let mut ids = match kind {
            RecordKind::Curve => Self::json_stems(&self.curves_root(partition))?,
            RecordKind::Form => self.form_ids(partition)?,
            RecordKind::Test { form_id } => {
                check_id(form_id)?;
                Self::json_stems(&self.form_dir(form_id, partition).join(layout::TESTS_DIR))?
            }
            RecordKind::Setting => Self::json_stems(&self.base)?,
        };
        ids.sort();
        Ok(ids)
    }
}

fn check_id(id: &str) -> Result<()> {
    if id.is_empty()
        || id == "."
        || id == ".."
        || id.contains(['/', '\\'])
        || id.ends_with(&format!(".{TMP_SUFFIX}"))
    {
        return Err(FieldTestError::Persistence(format!("invalid record id {id:?}")));
    }
    Ok(())
}

fn tmp_path(path: &Path) -> PathBuf {
    let mut name = path.file_name().unwrap_or_default().to_os_string();
    name.push(".");
    name.push(TMP_SUFFIX);
    path.with_file_name(name)
}

fn write_atomic(path: &Path, bytes: &[u8]) -> Result<()> {
    let tmp = tmp_path(path);
    fs::write(&tmp, bytes)?;
    if let Err(err) = fs::rename(&tmp, path) {
        let _ = fs::remove_file(&tmp);
        return Err(err.into());
    }
    Ok(())
}

fn discard(staged: &[(PathBuf, PathBuf)]) {
    for (tmp, _) in staged {
        let _ = fs::remove_file(tmp);
    }
}

fn rollback(applied: &[(PathBuf, Option<Vec<u8>>)]) {
    for (path, previous) in applied.iter().rev() {
        let restored = match previous {
            Some(bytes) => write_atomic(path, bytes),
            None => fs::remove_file(path).map_err(FieldTestError::from),
        };
        if let Err(err) = restored {
            warn!(path = %path.display(), error = %err, "Rollback could not restore record");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::TempDir;

    fn store() -> (TempDir, FsStore) {
        let dir = TempDir::new().unwrap();
        let store = FsStore::open(dir.path()).unwrap();
        (dir, store)
    }

    #[test]
    fn test_layout_matches_device_tree() {
        let (dir, store) = store();
        store
            .commit(&[
                (RecordKey::curve("C1", Partition::Active), json!({"name": "C1"})),
                (RecordKey::form("FJL1", Partition::Active), json!({})),
                (RecordKey::test("FJL1", "TJL1_M", Partition::Active), json!({})),
                (RecordKey::setting("recent_entries"), json!({})),
            ])
            .unwrap();

        assert!(dir.path().join("Curves/C1.json").is_file());
        assert!(dir.path().join("Forms/FJL1/form.json").is_file());
        assert!(dir.path().join("Forms/FJL1/Tests/TJL1_M.json").is_file());
        assert!(dir.path().join("recent_entries.json").is_file());
    }

    #[test]
    fn test_form_insert_reserves_directory() {
        let (_dir, store) = store();
        let key = RecordKey::form("FJL1", Partition::Active);
        assert!(store.insert(&key, &json!({"n": 1})).unwrap());
        assert!(!store.insert(&key, &json!({"n": 2})).unwrap());
        assert_eq!(store.read(&key).unwrap(), Some(json!({"n": 1})));
    }

    #[test]
    fn test_curve_insert_is_create_only() {
        let (_dir, store) = store();
        let key = RecordKey::curve("C1", Partition::Active);
        assert!(store.insert(&key, &json!({"n": 1})).unwrap());
        assert!(!store.insert(&key, &json!({"n": 2})).unwrap());
        assert_eq!(store.read(&key).unwrap(), Some(json!({"n": 1})));
    }

    #[test]
    fn test_relocate_moves_form_directory() {
        let (dir, store) = store();
        store
            .commit(&[
                (RecordKey::form("FJL1", Partition::Active), json!({})),
                (RecordKey::test("FJL1", "TJL1_M", Partition::Active), json!({"m": 1})),
            ])
            .unwrap();
        store
            .relocate(&RecordKey::form("FJL1", Partition::Active), Partition::Archived)
            .unwrap();

        assert!(!dir.path().join("Forms/FJL1").exists());
        assert!(dir.path().join("ArchivedForms/FJL1/Tests/TJL1_M.json").is_file());
        assert_eq!(
            store.ids(&RecordKind::Form, Partition::Archived).unwrap(),
            vec!["FJL1".to_string()]
        );
    }

    #[test]
    fn test_rejects_path_like_ids() {
        let (_dir, store) = store();
        let err = store
            .read(&RecordKey::curve("../escape", Partition::Active))
            .unwrap_err();
        assert!(err.is_persistence_failure());
    }

    #[test]
    fn test_commit_leaves_no_temp_files() {
        let (dir, store) = store();
        store
            .commit(&[(RecordKey::curve("C1", Partition::Active), json!({}))])
            .unwrap();
        let leftovers: Vec<_> = fs::read_dir(dir.path().join("Curves"))
            .unwrap()
            .filter_map(|e| e.ok())
            .filter(|e| e.path().extension().and_then(|x| x.to_str()) == Some(TMP_SUFFIX))
            .collect();
        assert!(leftovers.is_empty());
    }
}
