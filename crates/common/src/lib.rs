use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

pub const AUDIO_EXTENSIONS: &[&str] = &["wav", "mp3", "flac"];
pub const IMAGE_EXTENSIONS: &[&str] = &["jpg", "png"];

pub const DEFAULT_LAST_CATEGORY: &str = "artist";

/// A song row. `id` is the song's index in the song table and is renumbered when
/// earlier songs are removed.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Song {
    pub id: usize,
    pub title: String,
    pub album: String,
    pub artist: String,
    #[serde(default)]
    pub track: u32,
    pub file: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Category {
    pub name: String,
    pub songs: Vec<usize>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Playlist {
    pub name: String,
    #[serde(default)]
    pub pinned: bool,
    pub songs: Vec<usize>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LibraryData {
    pub songs: Vec<Song>,
    #[serde(default)]
    pub artist: Vec<Category>,
    #[serde(default)]
    pub album: Vec<Category>,
    #[serde(default)]
    pub playlist: Vec<Playlist>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LibraryConfig {
    pub base_path: String,
    pub shuffle: bool,
    pub last_category: String,
}

impl Default for LibraryConfig {
    fn default() -> Self {
        Self {
            base_path: String::new(),
            shuffle: true,
            last_category: DEFAULT_LAST_CATEGORY.to_string(),
        }
    }
}

/// The persisted library file: `{"data": {...}, "config": {...}}`.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LibraryDocument {
    pub data: LibraryData,
    #[serde(default)]
    pub config: LibraryConfig,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum CategoryKind {
    Artist,
    Album,
    Playlist,
}

impl CategoryKind {
    pub const DERIVED: [CategoryKind; 2] = [CategoryKind::Artist, CategoryKind::Album];

    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "artist" => Some(Self::Artist),
            "album" => Some(Self::Album),
            "playlist" => Some(Self::Playlist),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            CategoryKind::Artist => "artist",
            CategoryKind::Album => "album",
            CategoryKind::Playlist => "playlist",
        }
    }

    /// The song field a derived category groups by.
    pub fn song_field<'a>(&self, song: &'a Song) -> Option<&'a str> {
        match self {
            CategoryKind::Artist => Some(song.artist.as_str()),
            CategoryKind::Album => Some(song.album.as_str()),
            CategoryKind::Playlist => None,
        }
    }
}

/// Uniform view over derived categories and playlists, as listed to the UI.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct CategoryEntry {
    pub name: String,
    pub pinned: bool,
    pub songs: Vec<usize>,
}

impl From<&Category> for CategoryEntry {
    fn from(category: &Category) -> Self {
        Self {
            name: category.name.clone(),
            pinned: false,
            songs: category.songs.clone(),
        }
    }
}

impl From<&Playlist> for CategoryEntry {
    fn from(playlist: &Playlist) -> Self {
        Self {
            name: playlist.name.clone(),
            pinned: playlist.pinned,
            songs: playlist.songs.clone(),
        }
    }
}

pub fn has_extension(path: &Path, extensions: &[&str]) -> bool {
    match path.extension() {
        Some(ext) => {
            let ext = ext.to_string_lossy().to_ascii_lowercase();
            extensions.iter().any(|candidate| *candidate == ext)
        }
        None => false,
    }
}

pub fn relpath_from(root: &Path, path: &Path) -> Option<String> {
    let rel = path.strip_prefix(root).ok()?;
    Some(path_to_slash_string(rel))
}

pub fn join_relpath(root: &Path, relpath: &str) -> PathBuf {
    let mut out = PathBuf::from(root);
    for part in relpath.split('/') {
        if part.is_empty() {
            continue;
        }
        out.push(part);
    }
    out
}

fn path_to_slash_string(path: &Path) -> String {
    let parts: Vec<String> = path
        .components()
        .map(|c| c.as_os_str().to_string_lossy().to_string())
        .collect();
    parts.join("/")
}
