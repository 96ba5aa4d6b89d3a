use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use common::Song;
use tokio::sync::mpsc::UnboundedSender;
use tokio::task::JoinHandle;
use tracing::debug;

use crate::runner::SessionCommand;

pub const DEFAULT_LOADER_INTERVAL: Duration = Duration::from_millis(200);

/// Feeds a long list into the manual queue one song per tick, so a big selection never
/// blocks the session loop. `stop` is honoured before the next tick.
pub struct SongLoader {
    running: Arc<AtomicBool>,
    handle: JoinHandle<usize>,
}

impl SongLoader {
    pub fn start(
        songs: Vec<Song>,
        commands: UnboundedSender<SessionCommand>,
        interval: Duration,
    ) -> Self {
        let running = Arc::new(AtomicBool::new(true));
        let flag = running.clone();
        let handle = tokio::spawn(async move {
            let mut pending = VecDeque::from(songs);
            let mut sent = 0usize;
            while !pending.is_empty() {
                tokio::time::sleep(interval).await;
                if !flag.load(Ordering::Acquire) {
                    debug!("Song loader stopped with {} songs left", pending.len());
                    break;
                }
                let Some(song) = pending.pop_front() else {
                    break;
                };
                if commands.send(SessionCommand::AddSong(song)).is_err() {
                    break;
                }
                sent += 1;
            }
            flag.store(false, Ordering::Release);
            sent
        });
        Self { running, handle }
    }

    pub fn stop(&self) {
        self.running.store(false, Ordering::Release);
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }

    /// Waits for the loader task and returns how many songs it queued.
    pub async fn finish(self) -> usize {
        self.handle.await.unwrap_or_default()
    }
}
