use std::path::PathBuf;
use std::time::Duration;

use notify::{Config as NotifyConfig, Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use tokio::sync::mpsc::{unbounded_channel, UnboundedReceiver, UnboundedSender};
use tracing::{debug, info, warn};

use crate::state::{AppContext, AppEvent};

const DEFAULT_DEBOUNCE_SECS: u64 = 2;

/// Replaces the context's watcher with one on `root` (or none when watching is off).
/// Changes under `root` end up as a single `AppEvent::RescanRequested` per quiet period.
pub fn watch_music_root(ctx: &AppContext, root: PathBuf) {
    let (enabled, secs) = {
        let config = ctx.config.read();
        (config.watch_music, config.watch_debounce_secs)
    };
    let mut slot = ctx.watcher.lock();
    *slot = None;
    if !enabled {
        info!("Not watching the music folder (watch_music is off)");
        return;
    }
    let debounce = Duration::from_secs(if secs == 0 { DEFAULT_DEBOUNCE_SECS } else { secs });

    let (tx, rx) = unbounded_channel::<Event>();
    let started = RecommendedWatcher::new(
        move |res: notify::Result<Event>| {
            if let Ok(event) = res {
                let _ = tx.send(event);
            }
        },
        NotifyConfig::default(),
    )
    .and_then(|mut watcher| {
        watcher.watch(&root, RecursiveMode::Recursive)?;
        Ok(watcher)
    });

    match started {
        Ok(watcher) => {
            tokio::spawn(watch_loop(ctx.events.clone(), rx, debounce));
            info!("Watching {} (debounce {:?})", root.display(), debounce);
            *slot = Some(watcher);
        }
        Err(err) => warn!("Cannot watch {}: {}", root.display(), err),
    }
}

/// Collapses a burst of file events into one rescan request once the folder has been
/// quiet for `debounce`.
async fn watch_loop(
    events: UnboundedSender<AppEvent>,
    mut rx: UnboundedReceiver<Event>,
    debounce: Duration,
) {
    loop {
        let event = match rx.recv().await {
            Some(event) => event,
            None => break,
        };
        if !is_relevant_event(&event) {
            continue;
        }

        loop {
            tokio::select! {
                _ = tokio::time::sleep(debounce) => {
                    debug!("Music folder changed; requesting rescan");
                    if events.send(AppEvent::RescanRequested).is_err() {
                        return;
                    }
                    break;
                }
                maybe_event = rx.recv() => {
                    if maybe_event.is_none() {
                        return;
                    }
                }
            }
        }
    }
}

fn is_relevant_event(event: &Event) -> bool {
    matches!(
        event.kind,
        EventKind::Create(_) | EventKind::Modify(_) | EventKind::Remove(_)
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::tests::context;
    use crate::state::LibraryStatus;
    use notify::event::{AccessKind, CreateKind};
    use tokio::sync::mpsc::unbounded_channel;

    #[tokio::test]
    async fn watcher_follows_the_watch_music_flag() {
        let music = tempfile::tempdir().unwrap();
        let (ctx, _commands) = context(LibraryStatus::Unconfigured);

        watch_music_root(&ctx, music.path().to_path_buf());
        assert!(ctx.watcher.lock().is_some());

        ctx.config.write().watch_music = false;
        watch_music_root(&ctx, music.path().to_path_buf());
        assert!(ctx.watcher.lock().is_none());

        ctx.config.write().watch_music = true;
        watch_music_root(&ctx, music.path().join("missing"));
        assert!(ctx.watcher.lock().is_none());
    }

    #[tokio::test]
    async fn burst_of_changes_yields_one_request() {
        let (app_tx, mut app_rx) = unbounded_channel();
        let (tx, rx) = unbounded_channel();
        let handle = tokio::spawn(watch_loop(app_tx, rx, Duration::from_millis(30)));

        tx.send(Event::new(EventKind::Access(AccessKind::Any))).unwrap();
        for _ in 0..5 {
            tx.send(Event::new(EventKind::Create(CreateKind::File))).unwrap();
        }
        assert!(matches!(app_rx.recv().await, Some(AppEvent::RescanRequested)));

        drop(tx);
        handle.await.unwrap();
        assert!(app_rx.try_recv().is_err());
    }
}
