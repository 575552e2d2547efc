use std::{collections::HashMap, fs, io, path::Path};

use tracing::{debug, warn};

/// Named read-only blobs the guest can look up through the file imports.
///
/// Names match case-insensitively: guests written against uppercase-only
/// filesystems ask for `SONG.M2` regardless of how the file is named on
/// disk.
#[derive(Debug, Default)]
pub struct FileStore {
    // keyed by uppercased name
    files: HashMap<String, Vec<u8>>,
}

impl FileStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Loads every regular file of `dir`, keyed by file name.
    ///
    /// # Errors
    /// Fails if the directory or one of its files cannot be read.
    pub fn from_dir(dir: &Path) -> io::Result<Self> {
        let mut store = Self::new();
        for entry in fs::read_dir(dir)? {
            let entry = entry?;
            if !entry.file_type()?.is_file() {
                continue;
            }
            let Some(name) = entry.file_name().to_str().map(str::to_owned) else {
                warn!(path = %entry.path().display(), "skipping non-UTF-8 file name");
                continue;
            };
            let data = fs::read(entry.path())?;
            debug!(name = %name, bytes = data.len(), "loaded guest file");
            store.insert(&name, data);
        }
        Ok(store)
    }

    pub fn insert(&mut self, name: &str, data: Vec<u8>) {
        self.files.insert(name.to_uppercase(), data);
    }

    /// Case-insensitive lookup.
    pub fn get(&self, name: &str) -> Option<&[u8]> {
        self.files.get(&name.to_uppercase()).map(Vec::as_slice)
    }

    pub fn len(&self) -> usize {
        self.files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lookup_is_case_insensitive() {
        let mut store = FileStore::new();
        store.insert("Song.M2", vec![1, 2, 3]);

        assert_eq!(store.get("SONG.M2"), Some(&[1, 2, 3][..]));
        assert_eq!(store.get("song.m2"), Some(&[1, 2, 3][..]));
        assert_eq!(store.get("sOnG.m2"), Some(&[1, 2, 3][..]));
    }

    #[test]
    fn missing_names_are_none() {
        let store = FileStore::new();
        assert!(store.get("NOPE.DAT").is_none());
        assert!(store.is_empty());
    }

    #[test]
    fn later_inserts_replace_same_name() {
        let mut store = FileStore::new();
        store.insert("a.dat", vec![1]);
        store.insert("A.DAT", vec![2]);

        assert_eq!(store.len(), 1);
        assert_eq!(store.get("a.dat"), Some(&[2][..]));
    }

    #[test]
    fn from_dir_loads_regular_files() {
        let dir = std::env::temp_dir().join(format!(
            "palcon-filestore-test-{}",
            std::process::id()
        ));
        fs::create_dir_all(&dir).unwrap();
        fs::write(dir.join("tune.m2"), b"abc").unwrap();
        fs::create_dir_all(dir.join("sub")).unwrap();

        let store = FileStore::from_dir(&dir).unwrap();
        assert_eq!(store.len(), 1);
        assert_eq!(store.get("TUNE.M2"), Some(&b"abc"[..]));

        fs::remove_dir_all(&dir).unwrap();
    }
}
