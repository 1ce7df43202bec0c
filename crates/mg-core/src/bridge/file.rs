//! Owner-only file store

use std::fs::{self, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use crate::error::StoreError;
use crate::traits::SecretStore;

/// Stores each key as one file inside a directory readable only by the owner.
///
/// Writes go to a temporary sibling which is then renamed over the entry, so a
/// reader never observes a half-written value.
#[derive(Debug, Clone)]
pub struct FileSecretStore {
    dir: PathBuf,
}

impl FileSecretStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn entry_path(&self, key: &str) -> PathBuf {
        self.dir.join(format!("{}.json", key))
    }

    fn ensure_dir(&self) -> io::Result<()> {
        fs::create_dir_all(&self.dir)?;

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            fs::set_permissions(&self.dir, fs::Permissions::from_mode(0o700))?;
        }

        Ok(())
    }
}

impl SecretStore for FileSecretStore {
    fn publish(&self, key: &str, value: &str) -> Result<(), StoreError> {
        self.ensure_dir()?;

        let path = self.entry_path(key);
        let tmp = self.dir.join(format!(".{}.tmp", key));

        let written = (|| -> io::Result<()> {
            let mut options = OpenOptions::new();
            options.write(true).create(true).truncate(true);
            #[cfg(unix)]
            {
                use std::os::unix::fs::OpenOptionsExt;
                options.mode(0o600);
            }

            let mut file = options.open(&tmp)?;
            file.write_all(value.as_bytes())?;
            file.sync_all()?;
            Ok(())
        })();

        if let Err(e) = written.and_then(|_| fs::rename(&tmp, &path)) {
            let _ = fs::remove_file(&tmp);
            return Err(e.into());
        }

        tracing::debug!("Published bridge entry to {}", path.display());
        Ok(())
    }

    fn fetch(&self, key: &str) -> Result<Option<String>, StoreError> {
        match fs::read_to_string(self.entry_path(key)) {
            Ok(contents) => Ok(Some(contents)),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn clear(&self, key: &str) -> Result<(), StoreError> {
        match fs::remove_file(self.entry_path(key)) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    fn name(&self) -> &'static str {
        "file"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_publish_overwrites() {
        let dir = tempdir().unwrap();
        let store = FileSecretStore::new(dir.path().join("bridge"));

        assert_eq!(store.fetch("k").unwrap(), None);
        store.publish("k", "first").unwrap();
        store.publish("k", "second").unwrap();
        assert_eq!(store.fetch("k").unwrap().as_deref(), Some("second"));

        // Only the entry itself remains, no temp files
        let entries: Vec<_> = fs::read_dir(store.dir()).unwrap().collect();
        assert_eq!(entries.len(), 1);
    }

    #[test]
    fn test_clear_is_idempotent() {
        let dir = tempdir().unwrap();
        let store = FileSecretStore::new(dir.path());

        store.publish("k", "value").unwrap();
        store.clear("k").unwrap();
        store.clear("k").unwrap();
        assert_eq!(store.fetch("k").unwrap(), None);
    }

    #[cfg(unix)]
    #[test]
    fn test_permissions() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempdir().unwrap();
        let store = FileSecretStore::new(dir.path().join("bridge"));
        store.publish("k", "secret").unwrap();

        let dir_mode = fs::metadata(store.dir()).unwrap().permissions().mode();
        assert_eq!(dir_mode & 0o777, 0o700);

        let file_mode = fs::metadata(store.entry_path("k")).unwrap().permissions().mode();
        assert_eq!(file_mode & 0o777, 0o600);
    }
}
