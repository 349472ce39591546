//! Directory-backed JSON key-value store.
//!
//! Keys are `/`-separated paths relative to the store root (for example
//! `metadata/serde.json`). Values are serialized with `serde_json` and written
//! through a temporary sibling file that is renamed into place, so a reader
//! never observes a half-written record.

use crate::Result;
use ohno::IntoAppError;
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::fs;
use std::fs::File;
use std::io::{BufReader, BufWriter, ErrorKind, Write};
use std::path::{Path, PathBuf};

const LOG_TARGET: &str = "     store";

/// Persistent key-value store rooted at a directory.
#[derive(Debug, Clone)]
pub struct Store {
    root: PathBuf,
}

impl Store {
    /// Create a store rooted at `root`. Nothing is created on disk until the first write.
    #[must_use]
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Returns the store root directory.
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Returns the on-disk location of `key`.
    #[must_use]
    pub fn path_of(&self, key: &str) -> PathBuf {
        key.split('/').fold(self.root.clone(), |path, part| path.join(part))
    }

    /// Serialize `value` and write it under `key`, creating missing directories.
    ///
    /// An existing value is replaced wholesale.
    pub fn put<T>(&self, key: &str, value: &T) -> Result<()>
    where
        T: Serialize + ?Sized,
    {
        let path = self.path_of(key);

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).into_app_err_with(|| format!("unable to create directory '{}'", parent.display()))?;
        }

        let mut tmp_name = path.file_name().map(ToOwned::to_owned).unwrap_or_default();
        tmp_name.push(".tmp");
        let tmp_path = path.with_file_name(tmp_name);

        let written = write_then_rename(&tmp_path, &path, key, value);
        if written.is_err() {
            // best effort
            _ = fs::remove_file(&tmp_path);
        }
        written?;

        log::trace!(target: LOG_TARGET, "Stored '{key}'");
        Ok(())
    }

    /// Read the value stored under `key`.
    ///
    /// Returns `Ok(None)` when nothing is stored under `key`.
    pub fn get<T>(&self, key: &str) -> Result<Option<T>>
    where
        T: DeserializeOwned,
    {
        let path = self.path_of(key);

        let file = match File::open(&path) {
            Ok(file) => file,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                log::trace!(target: LOG_TARGET, "No value stored for '{key}'");
                return Ok(None);
            }
            Err(e) => return Err(e).into_app_err_with(|| format!("unable to open file '{}'", path.display())),
        };

        let reader = BufReader::new(file);
        let value = serde_json::from_reader(reader).into_app_err_with(|| format!("unable to parse file '{}'", path.display()))?;
        Ok(Some(value))
    }

    /// Returns `true` if a value is stored under `key`.
    #[must_use]
    pub fn exists(&self, key: &str) -> bool {
        self.path_of(key).is_file()
    }

    /// Returns the size in bytes of the value stored under `key`, if any.
    #[must_use]
    pub fn size(&self, key: &str) -> Option<u64> {
        fs::metadata(self.path_of(key)).ok().filter(fs::Metadata::is_file).map(|m| m.len())
    }

    /// Delete the value stored under `key`.
    ///
    /// Returns `true` if a value was removed.
    pub fn remove(&self, key: &str) -> Result<bool> {
        let path = self.path_of(key);
        match fs::remove_file(&path) {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e).into_app_err_with(|| format!("unable to remove file '{}'", path.display())),
        }
    }
}

/// Write `value` to `tmp_path`, then move it over `path`.
fn write_then_rename<T>(tmp_path: &Path, path: &Path, key: &str, value: &T) -> Result<()>
where
    T: Serialize + ?Sized,
{
    let file = File::create(tmp_path).into_app_err_with(|| format!("unable to create file '{}'", tmp_path.display()))?;
    let mut writer = BufWriter::new(file);

    serde_json::to_writer(&mut writer, value).into_app_err_with(|| format!("unable to serialize '{key}'"))?;
    writer
        .flush()
        .into_app_err_with(|| format!("unable to flush file '{}'", tmp_path.display()))?;
    drop(writer);

    fs::rename(tmp_path, path).into_app_err_with(|| format!("unable to move '{}' into place", path.display()))
}
