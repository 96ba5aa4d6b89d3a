use std::path::PathBuf;

use common::{join_relpath, Song};
use rand::rngs::StdRng;
use tokio::sync::mpsc::UnboundedSender;
use tracing::{debug, info, warn};

use crate::backend::{AudioBackend, BackendEvent, LoadToken};
use crate::interruption::{InterruptionAction, InterruptionCoordinator};
use crate::queue::{PlaybackQueue, QueueSource};
use crate::shuffle::daily_rng;
use crate::{BackendError, PlayerError};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PlaybackState {
    Idle,
    Loading,
    Playing,
    Paused,
}

/// Outbound notifications for the UI.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SessionEvent {
    SongChanged(Song),
    StateChanged(bool),
    LoadingChanged(bool),
    LoadFailed { song: Song, message: String },
    Exhausted,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SessionStatus {
    pub state: PlaybackState,
    pub current: Option<Song>,
    pub queued: usize,
    pub manual: usize,
    pub shuffle: bool,
    pub stopped_by_call: bool,
    pub stopped_by_plug: bool,
}

/// Drives one audio backend through a queue. All mutation goes through `&mut self`, so the
/// owner decides the threading; `run_session` is the usual owner.
pub struct PlaybackSession<B: AudioBackend> {
    base_path: PathBuf,
    backend: B,
    queue: PlaybackQueue,
    shuffle: bool,
    rng: StdRng,
    state: PlaybackState,
    current: Option<Song>,
    token: LoadToken,
    interruptions: InterruptionCoordinator,
    events: UnboundedSender<SessionEvent>,
}

impl<B: AudioBackend> PlaybackSession<B> {
    pub fn new(base_path: PathBuf, backend: B, events: UnboundedSender<SessionEvent>) -> Self {
        Self {
            base_path,
            backend,
            queue: PlaybackQueue::default(),
            shuffle: true,
            rng: daily_rng(),
            state: PlaybackState::Idle,
            current: None,
            token: LoadToken::default(),
            interruptions: InterruptionCoordinator::default(),
            events,
        }
    }

    pub fn with_rng(mut self, rng: StdRng) -> Self {
        self.rng = rng;
        self
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub fn state(&self) -> PlaybackState {
        self.state
    }

    pub fn current(&self) -> Option<&Song> {
        self.current.as_ref()
    }

    pub fn queue(&self) -> &PlaybackQueue {
        &self.queue
    }

    pub fn token(&self) -> LoadToken {
        self.token
    }

    pub fn interruptions(&self) -> &InterruptionCoordinator {
        &self.interruptions
    }

    pub fn is_playing(&self) -> bool {
        self.backend.is_playing()
    }

    pub fn status(&self) -> SessionStatus {
        SessionStatus {
            state: self.state,
            current: self.current.clone(),
            queued: self.queue.len(),
            manual: self.queue.manual_len(),
            shuffle: self.shuffle,
            stopped_by_call: self.interruptions.stopped_by_call(),
            stopped_by_plug: self.interruptions.stopped_by_plug(),
        }
    }

    pub fn set_shuffle(&mut self, shuffle: bool) {
        self.shuffle = shuffle;
    }

    /// Library root moved; later loads resolve against the new folder.
    pub fn set_base_path(&mut self, base_path: PathBuf) {
        self.base_path = base_path;
    }

    /// Replaces the queue with `songs`. The current backend load is closed first.
    pub fn select_playlist(&mut self, songs: Vec<Song>) {
        self.close();
        self.queue = PlaybackQueue::new(songs);
        if self.shuffle {
            self.queue.shuffle(&mut self.rng);
        }
        info!("Selected playlist with {} songs", self.queue.len());
    }

    pub fn start(&mut self) -> Result<Song, PlayerError> {
        self.queue.rewind();
        self.advance()
    }

    /// Loads the next song. A song that fails to load is reported and skipped; once every
    /// queued song has failed in a row the session goes idle.
    pub fn advance(&mut self) -> Result<Song, PlayerError> {
        let budget = self.queue.len() + self.queue.manual_len();
        if budget == 0 {
            return Err(PlayerError::QueueEmpty);
        }

        for _ in 0..budget {
            let (song, source) = match self.queue.next(&mut self.rng) {
                Some(next) => next,
                None => break,
            };
            match self.load(&song) {
                Ok(()) => {
                    if source == QueueSource::Manual {
                        debug!("Playing manually queued {}", song.title);
                    }
                    return Ok(song);
                }
                Err(err) => {
                    warn!("Error opening {}: {}", song.title, err);
                    self.emit(SessionEvent::LoadFailed {
                        song,
                        message: err.to_string(),
                    });
                }
            }
        }

        warn!("No song could be loaded; stopping");
        self.close();
        self.emit(SessionEvent::Exhausted);
        Err(PlayerError::AllSongsFailed)
    }

    fn load(&mut self, song: &Song) -> Result<(), BackendError> {
        self.backend.close();
        self.token = self.token.next();
        self.emit(SessionEvent::LoadingChanged(true));
        self.set_state(PlaybackState::Loading);
        let path = join_relpath(&self.base_path, &song.file);
        let opened = self.backend.open(&path, song, self.token);
        self.emit(SessionEvent::LoadingChanged(false));
        opened?;

        self.current = Some(song.clone());
        self.emit(SessionEvent::SongChanged(song.clone()));
        self.set_state(PlaybackState::Playing);
        Ok(())
    }

    /// `None` flips the current state; `Some(play)` is a no-op when already there.
    /// An explicit user choice overrides any pending interruption.
    pub fn play_pause(&mut self, desired: Option<bool>) -> Result<(), PlayerError> {
        self.interruptions.clear();
        if self.current.is_none() {
            if desired == Some(false) {
                return Ok(());
            }
            return self.advance().map(|_| ());
        }
        let playing = self.backend.is_playing();
        let wanted = desired.unwrap_or(!playing);
        if wanted == playing {
            return Ok(());
        }
        self.backend.play_pause()?;
        self.set_state(if wanted {
            PlaybackState::Playing
        } else {
            PlaybackState::Paused
        });
        Ok(())
    }

    /// Queues `song` to play once before the order continues. Starts playback right away
    /// when nothing is loaded.
    pub fn add_song(&mut self, song: Song) -> Result<(), PlayerError> {
        debug!("Queued {}", song.title);
        self.queue.push_manual(song);
        if self.state == PlaybackState::Idle {
            self.advance()?;
        }
        Ok(())
    }

    pub fn shuffle(&mut self) {
        self.queue.shuffle(&mut self.rng);
    }

    /// Stops the backend. The queue position is kept.
    pub fn close(&mut self) {
        self.backend.close();
        self.token = self.token.next();
        self.current = None;
        self.interruptions.clear();
        self.set_state(PlaybackState::Idle);
    }

    pub fn handle_backend_event(&mut self, event: BackendEvent) -> Result<(), PlayerError> {
        let action = match event {
            BackendEvent::PlaybackCompleted(token) => {
                if token != self.token {
                    debug!("Ignoring completion of stale load {:?}", token);
                    return Ok(());
                }
                return self.advance().map(|_| ());
            }
            BackendEvent::CallStateChanged(call) => {
                info!("Phone state changed: {:?}", call);
                let playing = self.backend.is_playing();
                self.interruptions.on_call(call, playing)
            }
            BackendEvent::HeadsetPlugged(plugged) => {
                info!("Headset plugged: {}", plugged);
                let playing = self.backend.is_playing();
                self.interruptions.on_headset(plugged, playing)
            }
        };
        self.apply(action)
    }

    fn apply(&mut self, action: InterruptionAction) -> Result<(), PlayerError> {
        let playing = self.backend.is_playing();
        match action {
            InterruptionAction::Pause if playing => {
                self.backend.play_pause()?;
                self.set_state(PlaybackState::Paused);
            }
            InterruptionAction::Resume if !playing && self.current.is_some() => {
                self.backend.play_pause()?;
                self.set_state(PlaybackState::Playing);
            }
            _ => {}
        }
        Ok(())
    }

    fn set_state(&mut self, next: PlaybackState) {
        let previous = self.state;
        if previous == next {
            return;
        }
        self.state = next;
        let was_playing = previous == PlaybackState::Playing;
        let is_playing = next == PlaybackState::Playing;
        if was_playing != is_playing {
            self.emit(SessionEvent::StateChanged(is_playing));
        }
    }

    fn emit(&self, event: SessionEvent) {
        let _ = self.events.send(event);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::tests::MockBackend;
    use crate::backend::CallState;
    use rand::SeedableRng;
    use tokio::sync::mpsc::{unbounded_channel, UnboundedReceiver};

    fn song(id: usize) -> Song {
        Song {
            id,
            title: format!("s{}", id),
            album: "Album".to_string(),
            artist: "Artist".to_string(),
            track: id as u32,
            file: format!("s{}.mp3", id),
        }
    }

    fn session(
        backend: MockBackend,
        shuffle: bool,
    ) -> (PlaybackSession<MockBackend>, UnboundedReceiver<SessionEvent>) {
        let (tx, rx) = unbounded_channel();
        let mut session = PlaybackSession::new(PathBuf::from("/music"), backend, tx)
            .with_rng(StdRng::seed_from_u64(42));
        session.set_shuffle(shuffle);
        (session, rx)
    }

    fn drain(rx: &mut UnboundedReceiver<SessionEvent>) -> Vec<SessionEvent> {
        let mut events = Vec::new();
        while let Ok(event) = rx.try_recv() {
            events.push(event);
        }
        events
    }

    fn complete(session: &mut PlaybackSession<MockBackend>) {
        let token = session.backend().loaded().unwrap();
        session
            .handle_backend_event(BackendEvent::PlaybackCompleted(token))
            .unwrap();
    }

    #[test]
    fn plays_in_order_then_reshuffles_before_the_fourth() {
        let backend = MockBackend::default();
        let (mut session, _rx) = session(backend.clone(), false);
        session.select_playlist(vec![song(0), song(1), song(2)]);

        session.start().unwrap();
        complete(&mut session);
        complete(&mut session);
        assert_eq!(backend.opened(), vec!["s0.mp3", "s1.mp3", "s2.mp3"]);

        let before = session.queue().order().to_vec();
        complete(&mut session);
        assert_eq!(backend.opened().len(), 4);
        let mut after = session.queue().order().to_vec();
        after.sort_unstable();
        assert_eq!(after, before);
        assert_eq!(session.queue().cursor(), Some(0));
    }

    #[test]
    fn manual_song_takes_priority_once() {
        let backend = MockBackend::default();
        let (mut session, _rx) = session(backend.clone(), false);
        session.select_playlist(vec![song(0), song(1), song(2)]);
        session.start().unwrap();

        session.add_song(song(7)).unwrap();
        assert_eq!(backend.opened(), vec!["s0.mp3"]);
        complete(&mut session);
        complete(&mut session);
        assert_eq!(backend.opened(), vec!["s0.mp3", "s7.mp3", "s1.mp3"]);
    }

    #[test]
    fn add_song_while_idle_starts_playback() {
        let backend = MockBackend::default();
        let (mut session, mut rx) = session(backend.clone(), false);
        session.add_song(song(5)).unwrap();

        assert_eq!(backend.opened(), vec!["s5.mp3"]);
        assert_eq!(session.state(), PlaybackState::Playing);
        let events = drain(&mut rx);
        assert!(events.contains(&SessionEvent::SongChanged(song(5))));
        assert!(events.contains(&SessionEvent::StateChanged(true)));
    }

    #[test]
    fn failed_loads_are_skipped_and_reported() {
        let backend = MockBackend::failing(&["s0.mp3"]);
        let (mut session, mut rx) = session(backend.clone(), false);
        session.select_playlist(vec![song(0), song(1)]);

        let playing = session.start().unwrap();
        assert_eq!(playing.id, 1);
        let events = drain(&mut rx);
        assert!(events
            .iter()
            .any(|e| matches!(e, SessionEvent::LoadFailed { song, .. } if song.id == 0)));
    }

    #[test]
    fn all_failing_songs_stop_instead_of_looping() {
        let backend = MockBackend::failing(&["s0.mp3", "s1.mp3", "s2.mp3"]);
        let (mut session, mut rx) = session(backend, false);
        session.select_playlist(vec![song(0), song(1), song(2)]);

        assert!(matches!(session.start(), Err(PlayerError::AllSongsFailed)));
        assert_eq!(session.state(), PlaybackState::Idle);
        let events = drain(&mut rx);
        let failures = events
            .iter()
            .filter(|e| matches!(e, SessionEvent::LoadFailed { .. }))
            .count();
        assert_eq!(failures, 3);
        assert_eq!(events.last(), Some(&SessionEvent::Exhausted));
    }

    #[test]
    fn stale_completion_is_ignored() {
        let backend = MockBackend::default();
        let (mut session, _rx) = session(backend.clone(), false);
        session.select_playlist(vec![song(0), song(1), song(2)]);
        session.start().unwrap();
        let stale = session.token();
        complete(&mut session);

        session
            .handle_backend_event(BackendEvent::PlaybackCompleted(stale))
            .unwrap();
        assert_eq!(backend.opened(), vec!["s0.mp3", "s1.mp3"]);
    }

    #[test]
    fn play_pause_toggles_and_respects_desired_state() {
        let backend = MockBackend::default();
        let (mut session, _rx) = session(backend.clone(), false);
        session.select_playlist(vec![song(0)]);
        session.start().unwrap();

        session.play_pause(Some(true)).unwrap();
        assert!(session.is_playing());
        session.play_pause(None).unwrap();
        assert_eq!(session.state(), PlaybackState::Paused);
        session.play_pause(Some(false)).unwrap();
        assert!(!session.is_playing());
        session.play_pause(None).unwrap();
        assert_eq!(session.state(), PlaybackState::Playing);
    }

    #[test]
    fn call_and_unplug_both_have_to_clear() {
        let backend = MockBackend::default();
        let (mut session, _rx) = session(backend.clone(), false);
        session.select_playlist(vec![song(0)]);
        session.start().unwrap();
        session
            .handle_backend_event(BackendEvent::HeadsetPlugged(true))
            .unwrap();

        session
            .handle_backend_event(BackendEvent::CallStateChanged(CallState::Ringing))
            .unwrap();
        assert_eq!(session.state(), PlaybackState::Paused);
        session
            .handle_backend_event(BackendEvent::HeadsetPlugged(false))
            .unwrap();
        session
            .handle_backend_event(BackendEvent::HeadsetPlugged(true))
            .unwrap();
        assert!(!session.is_playing());

        session
            .handle_backend_event(BackendEvent::CallStateChanged(CallState::Idle))
            .unwrap();
        assert!(session.is_playing());
        assert_eq!(session.state(), PlaybackState::Playing);
    }

    #[test]
    fn user_play_overrides_interruption() {
        let backend = MockBackend::default();
        let (mut session, _rx) = session(backend.clone(), false);
        session.select_playlist(vec![song(0)]);
        session.start().unwrap();
        session
            .handle_backend_event(BackendEvent::CallStateChanged(CallState::Active))
            .unwrap();
        assert!(session.interruptions().stopped_by_call());

        session.play_pause(Some(true)).unwrap();
        assert!(!session.interruptions().is_interrupted());
        session
            .handle_backend_event(BackendEvent::CallStateChanged(CallState::Idle))
            .unwrap();
        assert!(session.is_playing());
    }

    #[test]
    fn close_keeps_position() {
        let backend = MockBackend::default();
        let (mut session, _rx) = session(backend.clone(), false);
        session.select_playlist(vec![song(0), song(1), song(2)]);
        session.start().unwrap();
        complete(&mut session);

        session.close();
        assert_eq!(session.state(), PlaybackState::Idle);
        assert_eq!(session.queue().cursor(), Some(1));
        session.advance().unwrap();
        assert_eq!(backend.opened().last().map(String::as_str), Some("s2.mp3"));
    }

    #[test]
    fn selecting_a_playlist_copies_and_shuffles() {
        let backend = MockBackend::default();
        let (mut session, _rx) = session(backend, true);
        let songs: Vec<Song> = (0..30).map(song).collect();
        session.select_playlist(songs.clone());

        let mut ids: Vec<usize> = session.queue().ordered_songs().map(|s| s.id).collect();
        ids.sort_unstable();
        assert_eq!(ids, (0..30).collect::<Vec<_>>());
        assert_eq!(songs[0].id, 0);
    }
}
