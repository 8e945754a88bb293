//! Namespaced key-value storage for staged tokens and credentials
//!
//! All of the helpers' persisted state lives in a single JSON object stored
//! under one namespace key of a synchronous string-keyed medium (the browser's
//! `localStorage`, or the file/in-memory media defined here). Every mutation is
//! a whole-blob read-modify-write; the caller is assumed to be the only writer.
//!
//! An absent blob and an empty object both mean "nothing stored", so the
//! namespace entry is removed instead of being persisted as `{}`.

use std::collections::HashMap;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use serde_json::{Map, Value};
use tracing::{debug, warn};

use crate::constants::DEFAULT_NAMESPACE;
use crate::error::{Error, Result};

/// A synchronous string-keyed storage medium.
pub trait StorageBackend: Send + Sync {
    /// Read the raw value at `key`, `None` when absent.
    fn get_item(&self, key: &str) -> Result<Option<String>>;

    /// Write `value` at `key`, replacing any previous value.
    fn set_item(&self, key: &str, value: &str) -> Result<()>;

    /// Remove `key`. Removing an absent key is not an error.
    fn remove_item(&self, key: &str) -> Result<()>;
}

/// Facade over one namespace blob in a [`StorageBackend`].
#[derive(Clone)]
pub struct KeyedStore {
    backend: Arc<dyn StorageBackend>,
    namespace: String,
}

impl KeyedStore {
    /// Store under [`DEFAULT_NAMESPACE`].
    pub fn new(backend: Arc<dyn StorageBackend>) -> Self {
        Self::with_namespace(backend, DEFAULT_NAMESPACE)
    }

    pub fn with_namespace(backend: Arc<dyn StorageBackend>, namespace: impl Into<String>) -> Self {
        Self {
            backend,
            namespace: namespace.into(),
        }
    }

    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    /// The whole namespace blob.
    ///
    /// Returns an empty map when the entry is absent, cannot be read, or does
    /// not hold a JSON object.
    pub fn retrieve_all(&self) -> Map<String, Value> {
        self.try_retrieve_all().unwrap_or_else(|e| {
            warn!(namespace = %self.namespace, error = %e, "failed to read namespace blob");
            Map::new()
        })
    }

    /// Like [`retrieve_all`](Self::retrieve_all), but a failing storage medium
    /// is reported instead of read as empty.
    pub fn try_retrieve_all(&self) -> Result<Map<String, Value>> {
        let Some(raw) = self.backend.get_item(&self.namespace)? else {
            return Ok(Map::new());
        };
        Ok(self.parse_blob(&raw))
    }

    /// Like [`retrieve_one`](Self::retrieve_one), surfacing medium failures.
    pub fn try_retrieve_one(&self, key: &str) -> Result<Option<Value>> {
        Ok(self.try_retrieve_all()?.remove(key).filter(|v| !v.is_null()))
    }

    fn parse_blob(&self, raw: &str) -> Map<String, Value> {
        match serde_json::from_str::<Value>(raw) {
            Ok(Value::Object(map)) => map,
            Ok(Value::Null) => Map::new(),
            Ok(other) => {
                warn!(
                    namespace = %self.namespace,
                    kind = json_kind(&other),
                    "namespace blob is not an object, ignoring"
                );
                Map::new()
            }
            Err(e) => {
                warn!(namespace = %self.namespace, error = %e, "unparseable namespace blob, ignoring");
                Map::new()
            }
        }
    }

    /// The value at `key`, `None` when absent or `null`.
    pub fn retrieve_one(&self, key: &str) -> Option<Value> {
        self.retrieve_all().remove(key).filter(|v| !v.is_null())
    }

    /// Set `key` to `value`, leaving other keys untouched.
    pub fn store(&self, key: &str, value: impl Into<Value>) -> Result<()> {
        let mut blob = self.retrieve_all();
        blob.insert(key.to_owned(), value.into());
        debug!(namespace = %self.namespace, key, "storing value");
        self.write(&blob)
    }

    /// Remove the entire namespace entry.
    pub fn clear(&self) -> Result<()> {
        debug!(namespace = %self.namespace, "clearing namespace");
        self.backend.remove_item(&self.namespace)
    }

    /// Remove `key` from the blob.
    ///
    /// The namespace entry itself is removed once the last key is gone.
    pub fn clear_key(&self, key: &str) -> Result<()> {
        let mut blob = self.retrieve_all();
        blob.remove(key);
        debug!(namespace = %self.namespace, key, remaining = blob.len(), "clearing key");
        if blob.is_empty() {
            self.backend.remove_item(&self.namespace)
        } else {
            self.write(&blob)
        }
    }

    fn write(&self, blob: &Map<String, Value>) -> Result<()> {
        let json = serde_json::to_string(blob)
            .map_err(|e| Error::Storage(format!("serializing namespace blob: {e}")))?;
        self.backend.set_item(&self.namespace, &json)
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

/// In-process storage medium.
#[derive(Debug, Default)]
pub struct MemoryStorage {
    items: Mutex<HashMap<String, String>>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    fn items(&self) -> Result<std::sync::MutexGuard<'_, HashMap<String, String>>> {
        self.items
            .lock()
            .map_err(|_| Error::Storage("memory storage lock poisoned".into()))
    }
}

impl StorageBackend for MemoryStorage {
    fn get_item(&self, key: &str) -> Result<Option<String>> {
        Ok(self.items()?.get(key).cloned())
    }

    fn set_item(&self, key: &str, value: &str) -> Result<()> {
        self.items()?.insert(key.to_owned(), value.to_owned());
        Ok(())
    }

    fn remove_item(&self, key: &str) -> Result<()> {
        self.items()?.remove(key);
        Ok(())
    }
}

/// Storage medium persisted as a JSON file of string items.
///
/// Every mutation rewrites the file atomically. A missing file reads as an
/// empty medium; it is created on the first write.
#[derive(Debug)]
pub struct FileStorage {
    path: PathBuf,
    lock: Mutex<()>,
}

impl FileStorage {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn load(&self) -> Result<HashMap<String, String>> {
        if !self.path.exists() {
            return Ok(HashMap::new());
        }
        let contents = std::fs::read_to_string(&self.path)
            .map_err(|e| Error::Storage(format!("reading storage file: {e}")))?;
        if contents.trim().is_empty() {
            return Ok(HashMap::new());
        }
        serde_json::from_str(&contents)
            .map_err(|e| Error::Storage(format!("parsing storage file: {e}")))
    }

    fn update(&self, f: impl FnOnce(&mut HashMap<String, String>) -> bool) -> Result<()> {
        let _guard = self
            .lock
            .lock()
            .map_err(|_| Error::Storage("file storage lock poisoned".into()))?;
        let mut items = self.load()?;
        if f(&mut items) {
            write_atomic(&self.path, &items)?;
        }
        Ok(())
    }
}

impl StorageBackend for FileStorage {
    fn get_item(&self, key: &str) -> Result<Option<String>> {
        let _guard = self
            .lock
            .lock()
            .map_err(|_| Error::Storage("file storage lock poisoned".into()))?;
        Ok(self.load()?.remove(key))
    }

    fn set_item(&self, key: &str, value: &str) -> Result<()> {
        self.update(|items| {
            items.insert(key.to_owned(), value.to_owned());
            true
        })
    }

    fn remove_item(&self, key: &str) -> Result<()> {
        self.update(|items| items.remove(key).is_some())
    }
}

/// Write storage items to a file atomically.
///
/// Writes to a uniquely named temporary file in the same directory, then
/// persists it over the target. The temp file is created 0600 on Unix and is
/// removed if anything fails before the rename.
fn write_atomic(path: &Path, items: &HashMap<String, String>) -> Result<()> {
    let json = serde_json::to_string_pretty(items)
        .map_err(|e| Error::Storage(format!("serializing storage items: {e}")))?;

    let dir = match path.parent() {
        Some(dir) if !dir.as_os_str().is_empty() => dir,
        Some(_) => Path::new("."),
        None => return Err(Error::Storage("storage path has no parent directory".into())),
    };

    let mut tmp = tempfile::NamedTempFile::new_in(dir)
        .map_err(|e| Error::Storage(format!("creating temp storage file: {e}")))?;

    tmp.write_all(json.as_bytes())
        .and_then(|()| tmp.as_file().sync_all())
        .map_err(|e| Error::Storage(format!("writing temp storage file: {e}")))?;

    tmp.persist(path)
        .map_err(|e| Error::Storage(format!("renaming temp storage file: {}", e.error)))?;

    debug!(path = %path.display(), items = items.len(), "persisted storage file");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn memory_store() -> (Arc<MemoryStorage>, KeyedStore) {
        let backend = Arc::new(MemoryStorage::new());
        let store = KeyedStore::with_namespace(backend.clone(), "__TEST__");
        (backend, store)
    }

    fn raw_blob(backend: &MemoryStorage) -> Option<Value> {
        backend
            .get_item("__TEST__")
            .unwrap()
            .map(|raw| serde_json::from_str(&raw).unwrap())
    }

    #[test]
    fn retrieve_all_empty_when_nothing_stored() {
        let (_, store) = memory_store();
        assert!(store.retrieve_all().is_empty());
    }

    #[test]
    fn retrieve_all_parses_stored_blob() {
        let (backend, store) = memory_store();
        backend
            .set_item("__TEST__", r#"{"foo":"bar","bar":"baz"}"#)
            .unwrap();

        let blob = store.retrieve_all();
        assert_eq!(Value::Object(blob), json!({ "foo": "bar", "bar": "baz" }));
    }

    #[test]
    fn retrieve_all_ignores_garbage_and_non_objects() {
        let (backend, store) = memory_store();
        for raw in ["not json {{", "null", "[1,2,3]", "\"text\""] {
            backend.set_item("__TEST__", raw).unwrap();
            assert!(store.retrieve_all().is_empty(), "blob {raw} must read as empty");
        }
    }

    #[test]
    fn retrieve_one_returns_none_when_absent() {
        let (backend, store) = memory_store();
        assert_eq!(store.retrieve_one("foo"), None);

        backend.set_item("__TEST__", r#"{"foo":"bar"}"#).unwrap();
        assert_eq!(store.retrieve_one("baz"), None);
    }

    #[test]
    fn retrieve_one_returns_nested_value() {
        let (backend, store) = memory_store();
        backend
            .set_item("__TEST__", r#"{"foo":{"a":"b"},"bar":"baz"}"#)
            .unwrap();
        assert_eq!(store.retrieve_one("foo"), Some(json!({ "a": "b" })));
    }

    #[test]
    fn store_then_retrieve_leaves_other_keys_alone() {
        let (_, store) = memory_store();
        store.store("foo", "bar").unwrap();
        store.store("something", json!({ "a": "b" })).unwrap();
        store.store("flag", false).unwrap();

        assert_eq!(store.retrieve_one("something"), Some(json!({ "a": "b" })));
        assert_eq!(store.retrieve_one("foo"), Some(json!("bar")));
        assert_eq!(store.retrieve_one("flag"), Some(json!(false)));
    }

    #[test]
    fn store_overwrites_existing_value() {
        let (backend, store) = memory_store();
        backend.set_item("__TEST__", r#"{"foo":"bar"}"#).unwrap();

        store.store("foo", "new value").unwrap();
        assert_eq!(raw_blob(&backend), Some(json!({ "foo": "new value" })));
    }

    #[test]
    fn store_replaces_unparseable_blob() {
        let (backend, store) = memory_store();
        backend.set_item("__TEST__", "garbage").unwrap();

        store.store("state", "S").unwrap();
        assert_eq!(raw_blob(&backend), Some(json!({ "state": "S" })));
    }

    #[test]
    fn clear_removes_namespace_entry() {
        let (backend, store) = memory_store();
        store.clear().unwrap();
        assert_eq!(backend.get_item("__TEST__").unwrap(), None);

        store.store("foo", "bar").unwrap();
        store.clear().unwrap();
        assert_eq!(backend.get_item("__TEST__").unwrap(), None);
    }

    #[test]
    fn clear_key_removes_only_that_key() {
        let (backend, store) = memory_store();
        backend
            .set_item("__TEST__", r#"{"foo":"bar","bar":"baz"}"#)
            .unwrap();

        store.clear_key("foo").unwrap();
        assert_eq!(
            backend.get_item("__TEST__").unwrap().as_deref(),
            Some(r#"{"bar":"baz"}"#)
        );
    }

    #[test]
    fn clear_last_key_removes_namespace_entry() {
        let (backend, store) = memory_store();
        store.store("credentials", json!({ "foo": "bar" })).unwrap();

        store.clear_key("credentials").unwrap();
        assert_eq!(backend.get_item("__TEST__").unwrap(), None);
    }

    #[test]
    fn clear_key_with_nothing_stored_is_noop() {
        let (backend, store) = memory_store();
        store.clear_key("foo").unwrap();
        assert_eq!(backend.get_item("__TEST__").unwrap(), None);
    }

    #[test]
    fn namespaces_are_isolated() {
        let backend = Arc::new(MemoryStorage::new());
        let a = KeyedStore::with_namespace(backend.clone(), "__A__");
        let b = KeyedStore::new(backend.clone());

        a.store("state", "S").unwrap();
        b.store("state", "T").unwrap();
        a.clear().unwrap();

        assert_eq!(a.retrieve_one("state"), None);
        assert_eq!(b.retrieve_one("state"), Some(json!("T")));
        assert_eq!(b.namespace(), DEFAULT_NAMESPACE);
    }

    #[test]
    fn file_storage_roundtrips_across_instances() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("session.json");

        let store = KeyedStore::new(Arc::new(FileStorage::new(&path)));
        store.store("credentials", json!({ "id_token": "abc" })).unwrap();

        let reopened = KeyedStore::new(Arc::new(FileStorage::new(&path)));
        assert_eq!(
            reopened.retrieve_one("credentials"),
            Some(json!({ "id_token": "abc" }))
        );
    }

    #[test]
    fn file_storage_missing_file_reads_empty() {
        let dir = tempfile::tempdir().unwrap();
        let storage = FileStorage::new(dir.path().join("absent.json"));

        assert_eq!(storage.get_item("anything").unwrap(), None);
        storage.remove_item("anything").unwrap();
        assert!(!storage.path().exists(), "removing from nothing must not create a file");
    }

    #[test]
    fn file_storage_clear_removes_entry_but_keeps_others() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("session.json");
        let storage = Arc::new(FileStorage::new(&path));
        storage.set_item("unrelated", "keep me").unwrap();

        let store = KeyedStore::new(storage.clone());
        store.store("state", "S").unwrap();
        store.clear().unwrap();

        assert_eq!(storage.get_item(DEFAULT_NAMESPACE).unwrap(), None);
        assert_eq!(
            storage.get_item("unrelated").unwrap().as_deref(),
            Some("keep me")
        );
    }

    #[test]
    fn file_storage_rejects_corrupt_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("session.json");
        std::fs::write(&path, "not json").unwrap();

        let storage = FileStorage::new(&path);
        assert!(matches!(storage.get_item("x"), Err(Error::Storage(_))));
    }

    #[test]
    fn try_retrieve_surfaces_medium_failures() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("session.json");
        std::fs::write(&path, "not json").unwrap();

        let store = KeyedStore::new(Arc::new(FileStorage::new(&path)));
        assert!(store.retrieve_all().is_empty());
        assert!(matches!(store.try_retrieve_all(), Err(Error::Storage(_))));
        assert!(matches!(store.try_retrieve_one("state"), Err(Error::Storage(_))));
    }

    #[test]
    fn try_retrieve_one_reads_stored_value() {
        let (_, store) = memory_store();
        store.store("nonce", "N").unwrap();
        assert_eq!(store.try_retrieve_one("nonce").unwrap(), Some(json!("N")));
        assert_eq!(store.try_retrieve_one("state").unwrap(), None);
    }

    #[test]
    fn sibling_files_write_concurrently() {
        let dir = tempfile::tempdir().unwrap();
        let a = Arc::new(FileStorage::new(dir.path().join("a.json")));
        let b = Arc::new(FileStorage::new(dir.path().join("b.json")));

        let handles: Vec<_> = [a.clone(), b.clone()]
            .into_iter()
            .map(|storage| {
                std::thread::spawn(move || {
                    for i in 0..200 {
                        storage.set_item("round", &i.to_string()).unwrap();
                    }
                })
            })
            .collect();
        for h in handles {
            h.join().unwrap();
        }

        assert_eq!(a.get_item("round").unwrap().as_deref(), Some("199"));
        assert_eq!(b.get_item("round").unwrap().as_deref(), Some("199"));

        let leftovers: Vec<_> = std::fs::read_dir(dir.path())
            .unwrap()
            .map(|entry| entry.unwrap().file_name())
            .filter(|name| name != "a.json" && name != "b.json")
            .collect();
        assert!(leftovers.is_empty(), "temp files left behind: {leftovers:?}");
    }

    #[cfg(unix)]
    #[test]
    fn file_permissions_are_0600() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("session.json");
        let storage = FileStorage::new(&path);
        storage.set_item(DEFAULT_NAMESPACE, "{}").unwrap();

        let mode = std::fs::metadata(&path).unwrap().permissions().mode() & 0o777;
        assert_eq!(mode, 0o600, "storage file must be 0600, got {mode:o}");
    }
}
