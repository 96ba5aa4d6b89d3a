pub mod heuristics;
pub mod image;
pub mod index;
pub mod search;
pub mod store;

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use common::{CategoryEntry, CategoryKind, LibraryConfig, Playlist, Song};
use metadata::{MetadataError, MetadataExtractor};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::{info, warn};

pub use image::ImagePick;
pub use search::{SearchField, DEFAULT_TOP};
pub use store::{unique_export_path, LibraryStore};

pub const PLACEHOLDER_IMAGE: &str = "assets/placeholder.png";

/// The library index: owns the store and is the only writer of the song table.
pub struct Library {
    base_path: PathBuf,
    store: LibraryStore,
    extractor: Arc<dyn MetadataExtractor>,
    placeholder_image: PathBuf,
    scanning: AtomicBool,
}

impl Library {
    /// Loads the store at `store_path`, or builds it with a full scan of `base_path` when
    /// it does not exist yet. The flag reports whether a full scan ran.
    pub fn open(
        base_path: PathBuf,
        store_path: &Path,
        favorites_name: &str,
        extractor: Arc<dyn MetadataExtractor>,
    ) -> Result<(Self, bool), LibraryError> {
        let (store, built) = if LibraryStore::exists(store_path) {
            (LibraryStore::load(store_path)?, false)
        } else {
            if !base_path.is_dir() {
                return Err(LibraryError::MissingRoot(base_path));
            }
            warn!("Library file missing; scanning {:?}", base_path);
            let document = index::build_document(&base_path, extractor.as_ref(), favorites_name);
            (LibraryStore::create(store_path, document)?, true)
        };

        let library = Self {
            base_path,
            store,
            extractor,
            placeholder_image: PathBuf::from(PLACEHOLDER_IMAGE),
            scanning: AtomicBool::new(false),
        };

        let stored_base = library.store.read().config.base_path.clone();
        let base = library.base_path.to_string_lossy().to_string();
        if stored_base != base {
            warn!("Music folder changed from {:?} to {:?}", stored_base, base);
            library.store.put_data(&["config", "base_path"], json!(base))?;
        }

        Ok((library, built))
    }

    pub fn with_placeholder_image(mut self, path: PathBuf) -> Self {
        self.placeholder_image = path;
        self
    }

    /// Brings the store in line with the folder tree. Returns whether anything changed.
    /// Only one scan runs at a time; an overlapping call gets `ScanInProgress`.
    pub fn scan_and_sync(&self) -> Result<bool, LibraryError> {
        let _guard = ScanGuard::acquire(&self.scanning)?;
        if !self.base_path.is_dir() {
            return Err(LibraryError::MissingRoot(self.base_path.clone()));
        }

        let current = index::collect_audio_files(&self.base_path);
        let diff = {
            let document = self.store.read();
            index::diff_files(&document.data, &current)
        };
        info!("Removed songs {:?}", diff.removed);
        info!("Added songs {:?}", diff.added);
        if diff.is_empty() {
            return Ok(false);
        }

        // Tag reading happens before the store is locked.
        let new_songs = index::read_songs(&self.base_path, &diff.added, self.extractor.as_ref());
        let (removed, added) = self.store.update(|document| {
            let removed = index::remove_files(&mut document.data, &diff.removed);
            let added = index::append_songs(&mut document.data, new_songs);
            (removed, added)
        })?;
        info!("Library synced: {} removed, {} added", removed, added);
        Ok(true)
    }

    pub fn is_scanning(&self) -> bool {
        self.scanning.load(Ordering::Acquire)
    }

    pub fn base_path(&self) -> &Path {
        &self.base_path
    }

    pub fn store(&self) -> &LibraryStore {
        &self.store
    }

    pub fn stats(&self) -> LibraryStats {
        let document = self.store.read();
        LibraryStats {
            songs: document.data.songs.len(),
            artists: document.data.artist.len(),
            albums: document.data.album.len(),
            playlists: document.data.playlist.len(),
        }
    }

    pub fn config(&self) -> LibraryConfig {
        self.store.read().config.clone()
    }

    pub fn songs(&self) -> Vec<Song> {
        self.store.read().data.songs.clone()
    }

    pub fn song(&self, id: usize) -> Option<Song> {
        self.store.read().data.songs.get(id).cloned()
    }

    pub fn song_path(&self, song: &Song) -> PathBuf {
        common::join_relpath(&self.base_path, &song.file)
    }

    pub fn set_shuffle(&self, shuffle: bool) -> Result<(), LibraryError> {
        self.store.put_data(&["config", "shuffle"], json!(shuffle))
    }

    /// Entries of a category, pinned first, then by name ignoring case.
    pub fn category_entries(&self, kind: CategoryKind) -> Vec<CategoryEntry> {
        let document = self.store.read();
        let mut entries: Vec<CategoryEntry> = match kind {
            CategoryKind::Artist => document.data.artist.iter().map(CategoryEntry::from).collect(),
            CategoryKind::Album => document.data.album.iter().map(CategoryEntry::from).collect(),
            CategoryKind::Playlist => document
                .data
                .playlist
                .iter()
                .map(CategoryEntry::from)
                .collect(),
        };
        entries.sort_by_cached_key(|entry| (!entry.pinned, entry.name.trim().to_lowercase()));
        entries
    }

    /// Switches the displayed category and remembers it for the next start.
    pub fn set_category(&self, name: &str) -> Result<Vec<CategoryEntry>, LibraryError> {
        let kind =
            CategoryKind::parse(name).ok_or_else(|| LibraryError::UnknownCategory(name.to_string()))?;
        if self.store.read().config.last_category != kind.as_str() {
            self.store
                .put_data(&["config", "last_category"], json!(kind.as_str()))?;
        }
        Ok(self.category_entries(kind))
    }

    pub fn category_songs(&self, entry: &CategoryEntry) -> Vec<Song> {
        let document = self.store.read();
        entry
            .songs
            .iter()
            .filter_map(|id| document.data.songs.get(*id).cloned())
            .collect()
    }

    pub fn search(&self, query: &str, field: SearchField, top: usize) -> Vec<Song> {
        let document = self.store.read();
        search::search(query, &document.data.songs, field, top)
            .into_iter()
            .cloned()
            .collect()
    }

    pub fn get_image(&self, song_files: &[String], pick: ImagePick) -> PathBuf {
        image::find_image(&self.base_path, song_files, pick, &self.placeholder_image)
    }

    pub fn playlists(&self) -> Vec<Playlist> {
        self.store.read().data.playlist.clone()
    }

    pub fn create_playlist(&self, name: &str) -> Result<usize, LibraryError> {
        let name = clean_name(name)?;
        self.edit_playlists(|playlists| {
            playlists.push(Playlist {
                name,
                pinned: false,
                songs: Vec::new(),
            });
            Ok(playlists.len() - 1)
        })
    }

    pub fn rename_playlist(&self, index: usize, name: &str) -> Result<(), LibraryError> {
        let name = clean_name(name)?;
        self.edit_playlists(|playlists| {
            let playlist = playlists
                .get_mut(index)
                .ok_or(LibraryError::UnknownPlaylist(index))?;
            playlist.name = name;
            Ok(())
        })
    }

    pub fn delete_playlist(&self, index: usize) -> Result<Playlist, LibraryError> {
        self.edit_playlists(|playlists| {
            if index >= playlists.len() {
                return Err(LibraryError::UnknownPlaylist(index));
            }
            Ok(playlists.remove(index))
        })
    }

    /// Adds or removes `song_id` from a playlist. Returns whether the playlist changed.
    pub fn set_song_in_playlist(
        &self,
        index: usize,
        song_id: usize,
        member: bool,
    ) -> Result<bool, LibraryError> {
        self.edit_playlists(|playlists| {
            let playlist = playlists
                .get_mut(index)
                .ok_or(LibraryError::UnknownPlaylist(index))?;
            let present = playlist.songs.contains(&song_id);
            match (present, member) {
                (false, true) => playlist.songs.push(song_id),
                (true, false) => playlist.songs.retain(|id| *id != song_id),
                _ => return Ok(false),
            }
            Ok(true)
        })
    }

    /// Runs `edit` on the live playlist table inside the store's write lock, so a scan
    /// that renumbers ids cannot land between the read and the write.
    fn edit_playlists<T, F>(&self, edit: F) -> Result<T, LibraryError>
    where
        F: FnOnce(&mut Vec<Playlist>) -> Result<T, LibraryError>,
    {
        let out = self
            .store
            .try_update(|document| edit(&mut document.data.playlist))?;
        info!("Playlists updated");
        Ok(out)
    }

    pub fn export_to(&self, dest: &Path) -> Result<(), LibraryError> {
        self.store.export_to(dest)
    }

    /// Replaces the library with an exported file. Refused while a scan is running.
    pub fn import_from(&self, src: &Path) -> Result<(), LibraryError> {
        let _guard = ScanGuard::acquire(&self.scanning)?;
        self.store.import_from(src)
    }
}

fn clean_name(name: &str) -> Result<String, LibraryError> {
    let trimmed = name.trim();
    if trimmed.is_empty() {
        Err(LibraryError::InvalidName(name.to_string()))
    } else {
        Ok(trimmed.to_string())
    }
}

struct ScanGuard<'a> {
    flag: &'a AtomicBool,
}

impl<'a> ScanGuard<'a> {
    fn acquire(flag: &'a AtomicBool) -> Result<Self, LibraryError> {
        flag.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .map_err(|_| LibraryError::ScanInProgress)?;
        Ok(Self { flag })
    }
}

impl Drop for ScanGuard<'_> {
    fn drop(&mut self) {
        self.flag.store(false, Ordering::Release);
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LibraryStats {
    pub songs: usize,
    pub artists: usize,
    pub albums: usize,
    pub playlists: usize,
}

#[derive(Debug)]
pub enum LibraryError {
    Io(std::io::Error),
    Json(serde_json::Error),
    Metadata(MetadataError),
    MissingRoot(PathBuf),
    InvalidPath(String),
    InvalidDocument(String),
    InvalidName(String),
    UnknownCategory(String),
    UnknownPlaylist(usize),
    ScanInProgress,
}

impl std::fmt::Display for LibraryError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LibraryError::Io(err) => write!(f, "io error: {}", err),
            LibraryError::Json(err) => write!(f, "json error: {}", err),
            LibraryError::Metadata(err) => write!(f, "metadata error: {}", err),
            LibraryError::MissingRoot(path) => write!(f, "music folder not found: {:?}", path),
            LibraryError::InvalidPath(path) => write!(f, "invalid data path: {}", path),
            LibraryError::InvalidDocument(reason) => write!(f, "invalid library: {}", reason),
            LibraryError::InvalidName(name) => write!(f, "invalid name: {:?}", name),
            LibraryError::UnknownCategory(name) => write!(f, "unknown category: {}", name),
            LibraryError::UnknownPlaylist(index) => write!(f, "unknown playlist: {}", index),
            LibraryError::ScanInProgress => write!(f, "library scan already in progress"),
        }
    }
}

impl std::error::Error for LibraryError {}

impl From<std::io::Error> for LibraryError {
    fn from(err: std::io::Error) -> Self {
        LibraryError::Io(err)
    }
}

impl From<serde_json::Error> for LibraryError {
    fn from(err: serde_json::Error) -> Self {
        LibraryError::Json(err)
    }
}

impl From<MetadataError> for LibraryError {
    fn from(err: MetadataError) -> Self {
        LibraryError::Metadata(err)
    }
}
