use std::path::PathBuf;
use std::sync::Arc;
use std::time::SystemTime;

use library::{Library, LibraryError, LibraryStats};
use metadata::LoftyExtractor;
use player::SessionCommand;
use tracing::{info, warn};

use crate::config::resolve_path;
use crate::state::{AppContext, AppEvent, LibraryStatus, ScanOutcome, ScanReport};
use crate::watch::watch_music_root;

/// Opens (or builds) the library for `root` and syncs it with the folder, off the main
/// loop. The result comes back as `AppEvent::ScanFinished`. Only one scan runs at a time.
pub fn start_index(ctx: &AppContext, root: PathBuf) {
    let existing = {
        let mut guard = ctx.library_state.write();
        if matches!(guard.status, LibraryStatus::Scanning { .. }) {
            info!("Library scan already running; request ignored");
            return;
        }
        let existing = guard
            .library
            .clone()
            .filter(|library| library.base_path() == root.as_path());
        if existing.is_none() {
            guard.library = None;
            *ctx.watcher.lock() = None;
        }
        guard.status = LibraryStatus::Scanning {
            started: SystemTime::now(),
        };
        existing
    };

    let config = ctx.config.read().clone();
    let store_path = resolve_path(&ctx.config_path, &config.library_path);
    let placeholder = resolve_path(&ctx.config_path, &config.placeholder_image);
    let events = ctx.events.clone();

    tokio::spawn(async move {
        info!("Library scan started for {}", root.display());
        let scan_root = root.clone();
        let result = tokio::task::spawn_blocking(move || {
            let (library, built) = match existing {
                Some(library) => (library, false),
                None => {
                    let (library, built) = Library::open(
                        scan_root,
                        &store_path,
                        &config.favorites_name,
                        Arc::new(LoftyExtractor),
                    )?;
                    (Arc::new(library.with_placeholder_image(placeholder)), built)
                }
            };
            let changed = library.scan_and_sync()? || built;
            let stats = library.stats();
            Ok::<(Arc<Library>, LibraryStats, bool), LibraryError>((library, stats, changed))
        })
        .await;

        let outcome = match result {
            Ok(Ok((library, stats, changed))) => ScanOutcome::Ready(ScanReport {
                root,
                library,
                stats,
                changed,
            }),
            Ok(Err(LibraryError::MissingRoot(path))) => ScanOutcome::Missing(path),
            Ok(Err(err)) => ScanOutcome::Failed(err.to_string()),
            Err(err) => ScanOutcome::Failed(format!("scan task failed: {}", err)),
        };
        let _ = events.send(AppEvent::ScanFinished(outcome));
    });
}

/// Applies a finished scan on the main loop.
pub fn finish_index(ctx: &AppContext, outcome: ScanOutcome) {
    match outcome {
        ScanOutcome::Ready(report) => {
            {
                let mut guard = ctx.library_state.write();
                guard.library = Some(Arc::clone(&report.library));
                guard.status = LibraryStatus::Ready(report.stats.clone());
            }
            info!(
                "Library ready: {} songs, {} artists, {} albums",
                report.stats.songs, report.stats.artists, report.stats.albums
            );
            let config = report.library.config();
            ctx.send(SessionCommand::SetBasePath(report.root.clone()));
            ctx.send(SessionCommand::SetShuffle(config.shuffle));
            if ctx.watcher.lock().is_none() {
                watch_music_root(ctx, report.root);
            }
            if report.changed {
                println!("Library updated.");
            }
        }
        ScanOutcome::Missing(path) => {
            warn!("Music folder not found: {}", path.display());
            set_library_missing(ctx, path);
        }
        ScanOutcome::Failed(message) => {
            warn!("Library scan failed: {}", message);
            halt_playback(ctx);
            let mut guard = ctx.library_state.write();
            guard.library = None;
            guard.status = LibraryStatus::Broken(message);
        }
    }
}

pub fn set_library_missing(ctx: &AppContext, path: PathBuf) {
    halt_playback(ctx);
    let mut guard = ctx.library_state.write();
    guard.library = None;
    guard.status = LibraryStatus::Missing(path);
}

/// Stops the session and drops its queue, so nothing from the lost library can be
/// resumed or skipped into.
fn halt_playback(ctx: &AppContext) {
    ctx.stop_loader();
    ctx.send(SessionCommand::SelectPlaylist {
        songs: Vec::new(),
        start: false,
    });
}
