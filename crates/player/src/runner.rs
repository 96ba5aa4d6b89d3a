use common::Song;
use tokio::sync::mpsc::UnboundedReceiver;
use tokio::sync::{oneshot, watch};
use tracing::{info, warn};

use crate::backend::{AudioBackend, BackendEvent};
use crate::session::{PlaybackSession, SessionStatus};
use crate::PlayerError;

/// Inbound requests from the UI.
#[derive(Debug)]
pub enum SessionCommand {
    SelectPlaylist { songs: Vec<Song>, start: bool },
    Start,
    Next,
    PlayPause(Option<bool>),
    AddSong(Song),
    Shuffle,
    SetShuffle(bool),
    SetBasePath(std::path::PathBuf),
    Close,
    Status(oneshot::Sender<SessionStatus>),
}

impl<B: AudioBackend> PlaybackSession<B> {
    pub fn handle_command(&mut self, command: SessionCommand) -> Result<(), PlayerError> {
        match command {
            SessionCommand::SelectPlaylist { songs, start } => {
                self.select_playlist(songs);
                if start {
                    self.start()?;
                }
            }
            SessionCommand::Start => {
                self.start()?;
            }
            SessionCommand::Next => {
                self.advance()?;
            }
            SessionCommand::PlayPause(desired) => self.play_pause(desired)?,
            SessionCommand::AddSong(song) => self.add_song(song)?,
            SessionCommand::Shuffle => self.shuffle(),
            SessionCommand::SetShuffle(shuffle) => self.set_shuffle(shuffle),
            SessionCommand::SetBasePath(path) => self.set_base_path(path),
            SessionCommand::Close => self.close(),
            SessionCommand::Status(reply) => {
                let _ = reply.send(self.status());
            }
        }
        Ok(())
    }
}

/// Single consumer of UI commands and backend events. Runs until `shutdown` flips, its
/// sender goes away, or both queues close; the backend is closed on the way out and the
/// session is handed back.
pub async fn run_session<B: AudioBackend>(
    mut session: PlaybackSession<B>,
    mut commands: UnboundedReceiver<SessionCommand>,
    mut backend_events: UnboundedReceiver<BackendEvent>,
    mut shutdown: watch::Receiver<bool>,
) -> PlaybackSession<B> {
    loop {
        tokio::select! {
            changed = shutdown.changed() => {
                if changed.is_err() || *shutdown.borrow() {
                    break;
                }
            }
            Some(command) = commands.recv() => {
                if let Err(err) = session.handle_command(command) {
                    warn!("Playback command failed: {}", err);
                }
            }
            Some(event) = backend_events.recv() => {
                if let Err(err) = session.handle_backend_event(event) {
                    warn!("Backend event {:?} failed: {}", event, err);
                }
            }
            else => break,
        }
    }
    session.close();
    info!("Playback session stopped");
    session
}
