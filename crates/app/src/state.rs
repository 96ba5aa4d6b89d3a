use std::path::PathBuf;
use std::sync::Arc;
use std::time::SystemTime;

use common::CategoryEntry;
use library::{Library, LibraryStats};
use notify::RecommendedWatcher;
use parking_lot::{Mutex, RwLock};
use player::{BackendEvent, SessionCommand, SessionEvent, SongLoader};
use tokio::sync::mpsc::UnboundedSender;

use crate::config::AppConfig;

/// Everything the front end needs, built once in `main` and passed by reference.
pub struct AppContext {
    pub config_path: PathBuf,
    pub config: RwLock<AppConfig>,
    pub library_state: RwLock<LibraryState>,
    pub session: UnboundedSender<SessionCommand>,
    pub backend_events: UnboundedSender<BackendEvent>,
    pub events: UnboundedSender<AppEvent>,
    pub watcher: Mutex<Option<RecommendedWatcher>>,
    pub loader: Mutex<Option<SongLoader>>,
    pub view: RwLock<ViewState>,
}

impl AppContext {
    /// The library, unless it is missing, broken or not built yet.
    pub fn library(&self) -> Option<Arc<Library>> {
        self.library_state.read().library.clone()
    }

    pub fn stop_loader(&self) {
        if let Some(loader) = self.loader.lock().take() {
            loader.stop();
        }
    }

    pub fn send(&self, command: SessionCommand) {
        let _ = self.session.send(command);
    }
}

#[derive(Clone)]
pub struct LibraryState {
    pub library: Option<Arc<Library>>,
    pub status: LibraryStatus,
}

#[derive(Clone, Debug)]
pub enum LibraryStatus {
    Unconfigured,
    Missing(PathBuf),
    Scanning { started: SystemTime },
    Ready(LibraryStats),
    Broken(String),
}

impl LibraryStatus {
    pub fn describe(&self) -> String {
        match self {
            LibraryStatus::Unconfigured => "music folder not configured".to_string(),
            LibraryStatus::Missing(path) => format!("music folder missing: {}", path.display()),
            LibraryStatus::Scanning { started } => {
                let secs = started.elapsed().map(|d| d.as_secs()).unwrap_or(0);
                format!("scanning ({}s)", secs)
            }
            LibraryStatus::Ready(stats) => format!(
                "ready: {} songs, {} artists, {} albums, {} playlists",
                stats.songs, stats.artists, stats.albums, stats.playlists
            ),
            LibraryStatus::Broken(message) => format!("broken: {}", message),
        }
    }
}

/// What the user last listed, so follow-up commands can refer to rows by number.
#[derive(Clone, Debug, Default)]
pub struct ViewState {
    pub entries: Vec<CategoryEntry>,
}

pub struct ScanReport {
    pub root: PathBuf,
    pub library: Arc<Library>,
    pub stats: LibraryStats,
    pub changed: bool,
}

pub enum ScanOutcome {
    Ready(ScanReport),
    Missing(PathBuf),
    Failed(String),
}

/// The main loop's single input queue.
pub enum AppEvent {
    Input(String),
    ScanFinished(ScanOutcome),
    RescanRequested,
    Session(SessionEvent),
    InputClosed,
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use tokio::sync::mpsc::{unbounded_channel, UnboundedReceiver};

    pub(crate) fn context(status: LibraryStatus) -> (AppContext, UnboundedReceiver<SessionCommand>) {
        let (session, commands) = unbounded_channel();
        let (backend_events, _) = unbounded_channel();
        let (events, _) = unbounded_channel();
        let ctx = AppContext {
            config_path: PathBuf::from("config.yaml"),
            config: RwLock::new(AppConfig::default()),
            library_state: RwLock::new(LibraryState {
                library: None,
                status,
            }),
            session,
            backend_events,
            events,
            watcher: Mutex::new(None),
            loader: Mutex::new(None),
            view: RwLock::new(ViewState::default()),
        };
        (ctx, commands)
    }
}
