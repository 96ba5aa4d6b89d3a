use std::collections::BTreeSet;
use std::fs;
use std::path::{Path, PathBuf};

use common::{has_extension, join_relpath, IMAGE_EXTENSIONS};
use rand::seq::IndexedRandom;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ImagePick {
    First,
    Random,
}

const PREFERRED_STEMS: &[&str] = &["cover", "folder", "front", "album"];

/// Looks for a jpg/png next to the given songs. Only the songs' own folders are listed,
/// so the cost stays at a handful of directory reads per call.
pub fn find_image(
    root: &Path,
    song_files: &[String],
    pick: ImagePick,
    placeholder: &Path,
) -> PathBuf {
    let folders: BTreeSet<PathBuf> = song_files
        .iter()
        .filter_map(|file| join_relpath(root, file).parent().map(Path::to_path_buf))
        .collect();

    let mut found = Vec::new();
    for folder in &folders {
        let mut images = images_in_dir(folder);
        if images.is_empty() {
            continue;
        }
        if pick == ImagePick::First {
            images.sort_by_key(|path| (!is_preferred(path), path.clone()));
            return images.swap_remove(0);
        }
        found.append(&mut images);
    }

    let mut rng = rand::rng();
    match found.choose(&mut rng) {
        Some(path) => path.clone(),
        None => placeholder.to_path_buf(),
    }
}

fn images_in_dir(dir: &Path) -> Vec<PathBuf> {
    let entries = match fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(_) => return Vec::new(),
    };
    entries
        .flatten()
        .map(|entry| entry.path())
        .filter(|path| path.is_file() && has_extension(path, IMAGE_EXTENSIONS))
        .collect()
}

fn is_preferred(path: &Path) -> bool {
    path.file_stem()
        .map(|s| s.to_string_lossy().to_ascii_lowercase())
        .map(|stem| PREFERRED_STEMS.contains(&stem.as_str()))
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn prefers_cover_named_image() {
        let dir = tempfile::tempdir().unwrap();
        let album = dir.path().join("Artist").join("Album");
        fs::create_dir_all(&album).unwrap();
        fs::write(album.join("a_scan.png"), b"").unwrap();
        fs::write(album.join("cover.jpg"), b"").unwrap();
        fs::write(album.join("notes.txt"), b"").unwrap();

        let files = vec!["Artist/Album/01.mp3".to_string()];
        let image = find_image(dir.path(), &files, ImagePick::First, Path::new("none.png"));
        assert_eq!(image, album.join("cover.jpg"));
    }

    #[test]
    fn random_pick_stays_within_song_folders() {
        let dir = tempfile::tempdir().unwrap();
        let one = dir.path().join("One");
        let two = dir.path().join("Two");
        fs::create_dir_all(&one).unwrap();
        fs::create_dir_all(&two).unwrap();
        fs::write(one.join("x.png"), b"").unwrap();
        fs::write(two.join("y.jpg"), b"").unwrap();

        let files = vec!["One/a.mp3".to_string(), "Two/b.mp3".to_string()];
        for _ in 0..10 {
            let image = find_image(dir.path(), &files, ImagePick::Random, Path::new("none.png"));
            assert!(image == one.join("x.png") || image == two.join("y.jpg"));
        }
    }

    #[test]
    fn falls_back_to_placeholder() {
        let dir = tempfile::tempdir().unwrap();
        let files = vec!["Missing/a.mp3".to_string()];
        let image = find_image(dir.path(), &files, ImagePick::First, Path::new("placeholder.png"));
        assert_eq!(image, PathBuf::from("placeholder.png"));
    }
}
