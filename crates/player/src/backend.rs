use std::path::Path;

use common::Song;

use crate::BackendError;

/// Generation counter for loads. The backend echoes the token of the load that finished,
/// so a completion that belongs to an earlier song can be told apart.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct LoadToken(pub u64);

impl LoadToken {
    pub fn next(self) -> Self {
        LoadToken(self.0.wrapping_add(1))
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CallState {
    Ringing,
    Active,
    Idle,
}

impl CallState {
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "ringing" => Some(Self::Ringing),
            "active" | "offhook" => Some(Self::Active),
            "idle" => Some(Self::Idle),
            _ => None,
        }
    }
}

/// Asynchronous notifications from the audio backend or the platform around it.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BackendEvent {
    HeadsetPlugged(bool),
    CallStateChanged(CallState),
    PlaybackCompleted(LoadToken),
}

/// A platform audio output. Implementations report completion through whatever event
/// channel they were constructed with; the session only issues commands.
pub trait AudioBackend: Send {
    /// Loads `path` and starts playing it. Any previous file is released first.
    fn open(&mut self, path: &Path, song: &Song, token: LoadToken) -> Result<(), BackendError>;

    fn close(&mut self);

    fn play_pause(&mut self) -> Result<(), BackendError>;

    fn is_playing(&self) -> bool;
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use parking_lot::Mutex;
    use std::collections::HashSet;
    use std::sync::Arc;

    #[derive(Debug, Default)]
    pub struct MockState {
        pub opened: Vec<String>,
        pub failing: HashSet<String>,
        pub playing: bool,
        pub loaded: Option<LoadToken>,
        pub closes: usize,
    }

    /// Scripted backend; clones share state so tests can inspect it after handing one over.
    #[derive(Clone, Default)]
    pub struct MockBackend {
        pub state: Arc<Mutex<MockState>>,
    }

    impl MockBackend {
        pub fn failing(files: &[&str]) -> Self {
            let backend = Self::default();
            backend
                .state
                .lock()
                .failing
                .extend(files.iter().map(|f| f.to_string()));
            backend
        }

        pub fn opened(&self) -> Vec<String> {
            self.state.lock().opened.clone()
        }

        pub fn loaded(&self) -> Option<LoadToken> {
            self.state.lock().loaded
        }
    }

    impl AudioBackend for MockBackend {
        fn open(&mut self, _path: &Path, song: &Song, token: LoadToken) -> Result<(), BackendError> {
            let mut state = self.state.lock();
            if state.failing.contains(&song.file) {
                return Err(BackendError::Decode(format!("{} is not audio", song.file)));
            }
            state.opened.push(song.file.clone());
            state.loaded = Some(token);
            state.playing = true;
            Ok(())
        }

        fn close(&mut self) {
            let mut state = self.state.lock();
            state.playing = false;
            state.loaded = None;
            state.closes += 1;
        }

        fn play_pause(&mut self) -> Result<(), BackendError> {
            let mut state = self.state.lock();
            if state.loaded.is_none() {
                return Err(BackendError::NotLoaded);
            }
            state.playing = !state.playing;
            Ok(())
        }

        fn is_playing(&self) -> bool {
            self.state.lock().playing
        }
    }

    #[test]
    fn tokens_increase() {
        let first = LoadToken::default();
        assert!(first.next() > first);
        assert_eq!(CallState::parse("OFFHOOK"), Some(CallState::Active));
        assert_eq!(CallState::parse("busy"), None);
    }
}
