use std::fs;
use std::path::{Path, PathBuf};

use common::LibraryDocument;
use parking_lot::{RwLock, RwLockReadGuard};
use serde_json::Value;
use tracing::{debug, info};

use crate::LibraryError;

/// The persisted library document. Every mutation takes the write lock for the whole
/// read-modify-write, validates the result and persists it before it becomes visible.
pub struct LibraryStore {
    path: PathBuf,
    document: RwLock<LibraryDocument>,
}

impl LibraryStore {
    pub fn exists(path: &Path) -> bool {
        path.is_file()
    }

    pub fn load(path: &Path) -> Result<Self, LibraryError> {
        let document = read_document(path)?;
        info!("Loaded library from {:?}", path);
        Ok(Self {
            path: path.to_path_buf(),
            document: RwLock::new(document),
        })
    }

    pub fn create(path: &Path, document: LibraryDocument) -> Result<Self, LibraryError> {
        validate_document(&document)?;
        write_document(path, &document)?;
        info!("Data saved in {:?}", path);
        Ok(Self {
            path: path.to_path_buf(),
            document: RwLock::new(document),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn read(&self) -> RwLockReadGuard<'_, LibraryDocument> {
        self.document.read()
    }

    pub fn snapshot(&self) -> LibraryDocument {
        self.document.read().clone()
    }

    /// Applies `apply` to a copy of the document and commits it only if it validates
    /// and reaches disk.
    pub fn update<T, F>(&self, apply: F) -> Result<T, LibraryError>
    where
        F: FnOnce(&mut LibraryDocument) -> T,
    {
        let mut guard = self.document.write();
        let mut next = guard.clone();
        let out = apply(&mut next);
        validate_document(&next)?;
        write_document(&self.path, &next)?;
        *guard = next;
        Ok(out)
    }

    /// Like `update`, but `apply` may fail, in which case nothing is committed. An
    /// edit that leaves the document unchanged is not written.
    pub fn try_update<T, F>(&self, apply: F) -> Result<T, LibraryError>
    where
        F: FnOnce(&mut LibraryDocument) -> Result<T, LibraryError>,
    {
        let mut guard = self.document.write();
        let mut next = guard.clone();
        let out = apply(&mut next)?;
        if next != *guard {
            validate_document(&next)?;
            write_document(&self.path, &next)?;
            *guard = next;
        }
        Ok(out)
    }

    /// Replaces the value at `path` (object keys or array indices) with `value`.
    /// `put_data(&["config", "last_category"], json!("album"))`.
    pub fn put_data(&self, path: &[&str], value: Value) -> Result<(), LibraryError> {
        if path.is_empty() {
            return Err(LibraryError::InvalidPath(String::new()));
        }
        let mut guard = self.document.write();
        let mut root = serde_json::to_value(&*guard)?;
        put_value(&mut root, path, path, value)?;
        let next: LibraryDocument = serde_json::from_value(root)?;
        validate_document(&next)?;
        write_document(&self.path, &next)?;
        *guard = next;
        info!("Data updated: {:?}", path);
        Ok(())
    }

    pub fn export_to(&self, dest: &Path) -> Result<(), LibraryError> {
        let guard = self.document.read();
        write_document(dest, &guard)?;
        info!("Library exported to {:?}", dest);
        Ok(())
    }

    /// Replaces the whole document with the one stored at `src`. Nothing is merged.
    pub fn import_from(&self, src: &Path) -> Result<(), LibraryError> {
        let incoming = read_document(src)?;
        let mut guard = self.document.write();
        write_document(&self.path, &incoming)?;
        *guard = incoming;
        info!("Library imported from {:?}", src);
        Ok(())
    }
}

fn put_value(
    base: &mut Value,
    full_path: &[&str],
    rest: &[&str],
    value: Value,
) -> Result<(), LibraryError> {
    let (head, tail) = match rest.split_first() {
        Some(split) => split,
        None => {
            *base = value;
            return Ok(());
        }
    };
    let slot = match base {
        Value::Object(map) => map.get_mut(*head),
        Value::Array(items) => head.parse::<usize>().ok().and_then(|idx| items.get_mut(idx)),
        _ => None,
    };
    match slot {
        Some(slot) => put_value(slot, full_path, tail, value),
        None => Err(LibraryError::InvalidPath(full_path.join("/"))),
    }
}

fn read_document(path: &Path) -> Result<LibraryDocument, LibraryError> {
    let bytes = fs::read(path)?;
    let document: LibraryDocument = serde_json::from_slice(&bytes)?;
    validate_document(&document)?;
    Ok(document)
}

fn write_document(path: &Path, document: &LibraryDocument) -> Result<(), LibraryError> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)?;
        }
    }
    let bytes = serde_json::to_vec(document)?;
    let mut tmp = path.as_os_str().to_owned();
    tmp.push(".tmp");
    let tmp = PathBuf::from(tmp);
    fs::write(&tmp, bytes)?;
    fs::rename(&tmp, path)?;
    debug!("Wrote {:?}", path);
    Ok(())
}

/// Checks that ids are dense and that every category and playlist reference points at
/// a live song.
pub fn validate_document(document: &LibraryDocument) -> Result<(), LibraryError> {
    let data = &document.data;
    for (index, song) in data.songs.iter().enumerate() {
        if song.id != index {
            return Err(LibraryError::InvalidDocument(format!(
                "song {:?} has id {} at position {}",
                song.file, song.id, index
            )));
        }
    }
    let total = data.songs.len();
    let derived = data
        .artist
        .iter()
        .chain(data.album.iter())
        .map(|c| (c.name.as_str(), c.songs.as_slice()));
    let playlists = data
        .playlist
        .iter()
        .map(|p| (p.name.as_str(), p.songs.as_slice()));
    for (name, songs) in derived.chain(playlists) {
        if let Some(bad) = songs.iter().find(|id| **id >= total) {
            return Err(LibraryError::InvalidDocument(format!(
                "{:?} references missing song {}",
                name, bad
            )));
        }
    }
    Ok(())
}

/// First free export name in `dir`: `name.json`, then `name (0).json`, `name (1).json`...
pub fn unique_export_path(dir: &Path, stem: &str) -> PathBuf {
    let first = dir.join(format!("{}.json", stem));
    if !first.exists() {
        return first;
    }
    let mut i = 0usize;
    loop {
        let candidate = dir.join(format!("{} ({}).json", stem, i));
        if !candidate.exists() {
            return candidate;
        }
        i += 1;
    }
}
