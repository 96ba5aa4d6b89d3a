mod backend;
mod config;
mod front;
mod scan;
mod state;
mod watch;

use std::path::PathBuf;

use backend::HeadlessBackend;
use config::{config_path_from_env, load_or_create_config, resolve_music_root};
use front::{handle_event, spawn_stdin_reader, Flow};
use parking_lot::{Mutex, RwLock};
use player::{run_session, PlaybackSession};
use scan::{set_library_missing, start_index};
use state::{AppContext, AppEvent, LibraryState, LibraryStatus, ViewState};
use tokio::sync::{mpsc, watch as signal_watch};
use tracing::{info, warn};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "info".into());
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let config_path = config_path_from_env();
    let (config, created) = load_or_create_config(&config_path)?;
    if created {
        info!("Created default config at {:?}", config_path);
    } else {
        info!("Loaded config from {:?}", config_path);
    }

    let (app_tx, mut app_rx) = mpsc::unbounded_channel::<AppEvent>();
    let (session_tx, session_rx) = mpsc::unbounded_channel();
    let (backend_tx, backend_rx) = mpsc::unbounded_channel();
    let (session_event_tx, mut session_event_rx) = mpsc::unbounded_channel();
    let (shutdown_tx, shutdown_rx) = signal_watch::channel(false);

    let session = PlaybackSession::new(
        PathBuf::new(),
        HeadlessBackend::new(backend_tx.clone()),
        session_event_tx,
    );
    let session_task = tokio::spawn(run_session(session, session_rx, backend_rx, shutdown_rx));

    let forward = app_tx.clone();
    tokio::spawn(async move {
        while let Some(event) = session_event_rx.recv().await {
            if forward.send(AppEvent::Session(event)).is_err() {
                break;
            }
        }
    });

    let ctx = AppContext {
        config_path,
        config: RwLock::new(config.clone()),
        library_state: RwLock::new(LibraryState {
            library: None,
            status: LibraryStatus::Unconfigured,
        }),
        session: session_tx,
        backend_events: backend_tx,
        events: app_tx.clone(),
        watcher: Mutex::new(None),
        loader: Mutex::new(None),
        view: RwLock::new(ViewState::default()),
    };

    if let Some(music_root) = resolve_music_root(&ctx.config_path, &config.music_root) {
        if music_root.exists() {
            start_index(&ctx, music_root);
        } else {
            warn!("Music folder not found: {}", music_root.display());
            set_library_missing(&ctx, music_root);
        }
    } else {
        info!("Music folder not configured yet; use `root <path>` to select one.");
    }

    spawn_stdin_reader(app_tx);
    println!("Type `help` for commands.");

    let shutdown = shutdown_signal();
    tokio::pin!(shutdown);
    loop {
        tokio::select! {
            _ = &mut shutdown => break,
            maybe_event = app_rx.recv() => {
                let event = match maybe_event {
                    Some(event) => event,
                    None => break,
                };
                if handle_event(&ctx, event).await == Flow::Quit {
                    break;
                }
            }
        }
    }

    ctx.stop_loader();
    *ctx.watcher.lock() = None;
    let _ = shutdown_tx.send(true);
    if let Err(err) = session_task.await {
        warn!("Playback session ended abnormally: {}", err);
    }
    Ok(())
}

async fn shutdown_signal() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};
        let mut term = match signal(SignalKind::terminate()) {
            Ok(signal) => signal,
            Err(err) => {
                warn!("Failed to install terminate signal handler: {}", err);
                let _ = tokio::signal::ctrl_c().await;
                info!("Shutdown signal received.");
                return;
            }
        };
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {},
            _ = term.recv() => {},
        }
    }

    #[cfg(not(unix))]
    {
        if let Err(err) = tokio::signal::ctrl_c().await {
            warn!("Failed to listen for ctrl-c: {}", err);
        }
    }

    info!("Shutdown signal received.");
}
