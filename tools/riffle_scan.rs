use std::env;
use std::path::PathBuf;
use std::sync::Arc;

use library::Library;
use metadata::LoftyExtractor;
use tracing::info;
use tracing_subscriber::EnvFilter;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into());
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let mut args = env::args().skip(1);
    let music_root = args
        .next()
        .or_else(|| env::var("MUSIC_ROOT").ok())
        .ok_or("MUSIC_ROOT not set and no path argument")?;
    let library_path = args
        .next()
        .or_else(|| env::var("LIBRARY_PATH").ok())
        .unwrap_or_else(|| "playlist.json".to_string());
    let favorites = env::var("FAVORITES_NAME").unwrap_or_else(|_| "Favorites".to_string());

    let (library, built) = Library::open(
        PathBuf::from(&music_root),
        &PathBuf::from(&library_path),
        &favorites,
        Arc::new(LoftyExtractor),
    )?;
    let changed = if built {
        info!("Built new library at {}", library_path);
        true
    } else {
        library.scan_and_sync()?
    };
    let stats = library.stats();

    println!(
        "{}: {} songs, {} artists, {} albums, {} playlists",
        if changed { "Updated" } else { "Unchanged" },
        stats.songs,
        stats.artists,
        stats.albums,
        stats.playlists
    );

    Ok(())
}
