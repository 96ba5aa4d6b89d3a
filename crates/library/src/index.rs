use std::cmp::Ordering;
use std::collections::{BTreeMap, BTreeSet, HashSet};
use std::path::Path;

use common::{
    has_extension, join_relpath, relpath_from, Category, CategoryKind, LibraryConfig, LibraryData,
    LibraryDocument, Playlist, Song, AUDIO_EXTENSIONS,
};
use metadata::{MetadataExtractor, TagInfo};
use tracing::{debug, info, warn};
use walkdir::WalkDir;

use crate::heuristics::guess_from_path;

/// Files that differ between the song table and the folder tree.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct LibraryDiff {
    pub removed: BTreeSet<String>,
    pub added: BTreeSet<String>,
}

impl LibraryDiff {
    pub fn is_empty(&self) -> bool {
        self.removed.is_empty() && self.added.is_empty()
    }
}

/// Relative paths of every audio file under `root`.
pub fn collect_audio_files(root: &Path) -> BTreeSet<String> {
    let mut files = BTreeSet::new();
    for entry in WalkDir::new(root)
        .follow_links(false)
        .into_iter()
        .filter_map(Result::ok)
    {
        if !entry.file_type().is_file() {
            continue;
        }
        if !has_extension(entry.path(), AUDIO_EXTENSIONS) {
            continue;
        }
        if let Some(rel) = relpath_from(root, entry.path()) {
            files.insert(rel);
        }
    }
    files
}

pub fn diff_files(data: &LibraryData, current: &BTreeSet<String>) -> LibraryDiff {
    let old: BTreeSet<String> = data.songs.iter().map(|s| s.file.clone()).collect();
    LibraryDiff {
        removed: old.difference(current).cloned().collect(),
        added: current.difference(&old).cloned().collect(),
    }
}

/// Builds a fresh document from a full scan of `root`.
pub fn build_document(
    root: &Path,
    extractor: &dyn MetadataExtractor,
    favorites_name: &str,
) -> LibraryDocument {
    let files = collect_audio_files(root);
    info!("Found {} audio files", files.len());
    let songs = read_songs(root, &files, extractor);

    let data = LibraryData {
        artist: derive_categories(&songs, CategoryKind::Artist),
        album: derive_categories(&songs, CategoryKind::Album),
        playlist: vec![Playlist {
            name: favorites_name.to_string(),
            pinned: true,
            songs: Vec::new(),
        }],
        songs,
    };
    LibraryDocument {
        data,
        config: LibraryConfig {
            base_path: root.to_string_lossy().to_string(),
            ..LibraryConfig::default()
        },
    }
}

/// Reads tags for `files` and returns songs in canonical order with ids 0..N-1.
pub fn read_songs(
    root: &Path,
    files: &BTreeSet<String>,
    extractor: &dyn MetadataExtractor,
) -> Vec<Song> {
    let mut songs: Vec<Song> = files
        .iter()
        .map(|relpath| read_song(root, relpath, extractor))
        .collect();
    songs.sort_by(canonical_order);
    for (id, song) in songs.iter_mut().enumerate() {
        song.id = id;
    }
    songs
}

fn read_song(root: &Path, relpath: &str, extractor: &dyn MetadataExtractor) -> Song {
    let path = join_relpath(root, relpath);
    let tags = match extractor.extract(&path) {
        Ok(tags) => tags,
        Err(err) => {
            warn!("Failed to read tags for {:?}: {}", path, err);
            TagInfo::default()
        }
    };
    if !tags.is_complete() {
        debug!("Incomplete tags for {:?}; guessing from the path", path);
    }

    let guess = guess_from_path(relpath);
    Song {
        id: 0,
        title: tags.title.unwrap_or(guess.title),
        album: tags.album.unwrap_or(guess.album),
        artist: tags.artist.unwrap_or(guess.artist),
        track: tags.track_no.unwrap_or(guess.track),
        file: relpath.to_string(),
    }
}

/// Artist, then album, then track number, then title.
pub fn canonical_order(a: &Song, b: &Song) -> Ordering {
    a.artist
        .cmp(&b.artist)
        .then_with(|| a.album.cmp(&b.album))
        .then_with(|| a.track.cmp(&b.track))
        .then_with(|| a.title.cmp(&b.title))
        .then_with(|| a.file.cmp(&b.file))
}

/// Groups song ids by the field `kind` derives from. Entries are ordered by name and ids
/// ascending, so the result only depends on the song table's contents.
pub fn derive_categories(songs: &[Song], kind: CategoryKind) -> Vec<Category> {
    let mut groups: BTreeMap<&str, Vec<usize>> = BTreeMap::new();
    for song in songs {
        if let Some(value) = kind.song_field(song) {
            groups.entry(value).or_default().push(song.id);
        }
    }
    groups
        .into_iter()
        .map(|(name, mut ids)| {
            ids.sort_unstable();
            Category {
                name: name.to_string(),
                songs: ids,
            }
        })
        .collect()
}

/// Deletes the songs stored for `files` and closes the holes in the id space: every
/// reference above a removed id moves down by one per removed id below it, references
/// to removed ids are dropped, and emptied entries are pruned. Pinned playlists are
/// kept even when emptied. Returns the number of songs removed.
pub fn remove_files(data: &mut LibraryData, files: &BTreeSet<String>) -> usize {
    let mut removed_ids = Vec::new();
    for song in &data.songs {
        if files.contains(&song.file) {
            info!("Removed {}", song.title);
            removed_ids.push(song.id);
        }
    }
    if removed_ids.is_empty() {
        return 0;
    }
    removed_ids.sort_unstable();

    let remap = |id: usize| -> Option<usize> {
        if removed_ids.binary_search(&id).is_ok() {
            None
        } else {
            let below = removed_ids.partition_point(|removed| *removed < id);
            Some(id - below)
        }
    };

    data.songs.retain(|song| removed_ids.binary_search(&song.id).is_err());
    for (id, song) in data.songs.iter_mut().enumerate() {
        song.id = id;
    }

    for categories in [&mut data.artist, &mut data.album] {
        for category in categories.iter_mut() {
            category.songs = category.songs.iter().filter_map(|id| remap(*id)).collect();
        }
        categories.retain(|category| !category.songs.is_empty());
    }

    let mut emptied: HashSet<usize> = HashSet::new();
    for (idx, playlist) in data.playlist.iter_mut().enumerate() {
        let before = playlist.songs.len();
        playlist.songs = playlist.songs.iter().filter_map(|id| remap(*id)).collect();
        if before > 0 && playlist.songs.is_empty() {
            emptied.insert(idx);
        }
    }
    let mut idx = 0usize;
    data.playlist.retain(|playlist| {
        let keep = playlist.pinned || !emptied.contains(&idx);
        idx += 1;
        keep
    });

    removed_ids.len()
}

/// Appends songs (ids relative to 0) after the current table and files each one under its
/// artist and album, creating the entry when the name is new.
pub fn append_songs(data: &mut LibraryData, songs: Vec<Song>) -> usize {
    let offset = data.songs.len();
    let count = songs.len();
    for mut song in songs {
        song.id += offset;
        for kind in CategoryKind::DERIVED {
            let categories = match kind {
                CategoryKind::Artist => &mut data.artist,
                CategoryKind::Album => &mut data.album,
                CategoryKind::Playlist => continue,
            };
            let name = kind.song_field(&song).unwrap_or_default();
            match categories.iter_mut().find(|c| c.name == name) {
                Some(category) => {
                    category.songs.push(song.id);
                    debug!("Added {} to {}", song.title, kind.as_str());
                }
                None => {
                    info!(
                        "Added new category ({} - {}) with: {}",
                        kind.as_str(),
                        name,
                        song.title
                    );
                    categories.push(Category {
                        name: name.to_string(),
                        songs: vec![song.id],
                    });
                }
            }
        }
        data.songs.push(song);
    }
    count
}
