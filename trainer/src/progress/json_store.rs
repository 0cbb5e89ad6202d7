use std::marker::PhantomData;
use std::path::PathBuf;

use serde::{de::DeserializeOwned, Serialize};

use super::PersistenceError;

/// Types that can live in a [`JsonStore`]. The key names the file the
/// record is stored under.
pub trait Storable: Serialize + DeserializeOwned {
    fn key(&self) -> String;
}

/// JSON-file-per-record store rooted at one directory.
pub struct JsonStore<T> {
    dir: PathBuf,
    _phantom: PhantomData<T>,
}

impl<T: Storable> JsonStore<T> {
    pub fn new(dir: PathBuf) -> Self {
        Self {
            dir,
            _phantom: PhantomData,
        }
    }

    pub fn file_path(&self, key: &str) -> PathBuf {
        self.dir.join(format!("{}.json", key))
    }

    /// Save a record, replacing any previous version atomically: the
    /// JSON is written to a sibling temp file first and renamed over
    /// the target.
    pub fn save(&self, record: &T) -> Result<(), PersistenceError> {
        std::fs::create_dir_all(&self.dir)?;
        let path = self.file_path(&record.key());
        let tmp = path.with_extension("json.tmp");
        let json = serde_json::to_string_pretty(record)?;
        std::fs::write(&tmp, json)?;
        std::fs::rename(&tmp, &path)?;
        Ok(())
    }

    /// Load a record by key. Returns None when no file exists.
    pub fn load(&self, key: &str) -> Result<Option<T>, PersistenceError> {
        let path = self.file_path(key);
        if !path.exists() {
            return Ok(None);
        }
        let contents = std::fs::read_to_string(&path)?;
        Ok(Some(serde_json::from_str(&contents)?))
    }

    /// Load every record in the store directory. Unreadable or
    /// unparseable files are skipped with a warning.
    pub fn load_all(&self) -> Vec<T> {
        let entries = match std::fs::read_dir(&self.dir) {
            Ok(entries) => entries,
            Err(_) => return Vec::new(),
        };

        let mut records = Vec::new();
        for entry in entries.flatten() {
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some("json") {
                continue;
            }
            match std::fs::read_to_string(&path) {
                Ok(contents) => match serde_json::from_str::<T>(&contents) {
                    Ok(record) => records.push(record),
                    Err(e) => tracing::warn!("Skipping unparseable record {:?}: {}", path, e),
                },
                Err(e) => tracing::warn!("Failed to read {:?}: {}", path, e),
            }
        }
        records
    }

    pub fn delete(&self, key: &str) -> Result<(), PersistenceError> {
        let path = self.file_path(key);
        if path.exists() {
            std::fs::remove_file(&path)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[derive(Debug, PartialEq, Serialize, Deserialize)]
    struct Record {
        name: String,
        score: u32,
    }

    impl Storable for Record {
        fn key(&self) -> String {
            self.name.clone()
        }
    }

    #[test]
    fn test_save_load_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonStore::<Record>::new(dir.path().to_path_buf());

        let record = Record {
            name: "alpha".into(),
            score: 42,
        };
        store.save(&record).unwrap();
        assert_eq!(store.load("alpha").unwrap(), Some(record));
        assert_eq!(store.load("missing").unwrap(), None);
    }

    #[test]
    fn test_save_overwrites() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonStore::<Record>::new(dir.path().to_path_buf());

        store
            .save(&Record {
                name: "alpha".into(),
                score: 1,
            })
            .unwrap();
        store
            .save(&Record {
                name: "alpha".into(),
                score: 2,
            })
            .unwrap();
        assert_eq!(store.load("alpha").unwrap().unwrap().score, 2);
    }

    #[test]
    fn test_load_all_skips_bad_files() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonStore::<Record>::new(dir.path().to_path_buf());
        store
            .save(&Record {
                name: "good".into(),
                score: 7,
            })
            .unwrap();
        std::fs::write(dir.path().join("bad.json"), "not json").unwrap();

        let records = store.load_all();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].name, "good");
    }

    #[test]
    fn test_load_all_missing_dir_is_empty() {
        let store = JsonStore::<Record>::new(PathBuf::from("/nonexistent/trainer-test"));
        assert!(store.load_all().is_empty());
    }

    #[test]
    fn test_delete() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonStore::<Record>::new(dir.path().to_path_buf());
        store
            .save(&Record {
                name: "alpha".into(),
                score: 1,
            })
            .unwrap();
        store.delete("alpha").unwrap();
        assert_eq!(store.load("alpha").unwrap(), None);
        // Deleting a missing key is fine.
        store.delete("alpha").unwrap();
    }
}
