//! Audio backend for machines without an output device: files are probed with symphonia
//! so undecodable songs fail to load, and playback is a timer that runs for the track's
//! length and then reports completion.

use std::fs::File;
use std::path::Path;
use std::time::{Duration, Instant};

use common::Song;
use player::{AudioBackend, BackendError, BackendEvent, LoadToken};
use symphonia::core::formats::FormatOptions;
use symphonia::core::io::MediaSourceStream;
use symphonia::core::meta::MetadataOptions;
use symphonia::core::probe::Hint;
use tokio::runtime::Handle;
use tokio::sync::mpsc::UnboundedSender;
use tokio::task::JoinHandle;
use tracing::{debug, info};

const UNKNOWN_LENGTH: Duration = Duration::from_secs(180);

struct Track {
    token: LoadToken,
    remaining: Duration,
    resumed_at: Option<Instant>,
    timer: Option<JoinHandle<()>>,
}

pub struct HeadlessBackend {
    events: UnboundedSender<BackendEvent>,
    track: Option<Track>,
}

impl HeadlessBackend {
    pub fn new(events: UnboundedSender<BackendEvent>) -> Self {
        Self {
            events,
            track: None,
        }
    }

    fn start_timer(&self, token: LoadToken, after: Duration) -> Result<JoinHandle<()>, BackendError> {
        let handle = Handle::try_current()
            .map_err(|err| BackendError::Io(std::io::Error::new(std::io::ErrorKind::Other, err)))?;
        let events = self.events.clone();
        Ok(handle.spawn(async move {
            tokio::time::sleep(after).await;
            let _ = events.send(BackendEvent::PlaybackCompleted(token));
        }))
    }
}

impl AudioBackend for HeadlessBackend {
    fn open(&mut self, path: &Path, song: &Song, token: LoadToken) -> Result<(), BackendError> {
        self.close();
        let length = probe_length(path)?;
        let timer = self.start_timer(token, length)?;
        info!("Playing {} ({}s)", song.title, length.as_secs());
        self.track = Some(Track {
            token,
            remaining: length,
            resumed_at: Some(Instant::now()),
            timer: Some(timer),
        });
        Ok(())
    }

    fn close(&mut self) {
        if let Some(track) = self.track.take() {
            if let Some(timer) = track.timer {
                timer.abort();
            }
        }
    }

    fn play_pause(&mut self) -> Result<(), BackendError> {
        let mut track = self.track.take().ok_or(BackendError::NotLoaded)?;
        match track.resumed_at.take() {
            Some(resumed_at) => {
                if let Some(timer) = track.timer.take() {
                    timer.abort();
                }
                track.remaining = track.remaining.saturating_sub(resumed_at.elapsed());
                debug!("Paused with {:?} left", track.remaining);
            }
            None => {
                match self.start_timer(track.token, track.remaining) {
                    Ok(timer) => track.timer = Some(timer),
                    Err(err) => {
                        self.track = Some(track);
                        return Err(err);
                    }
                }
                track.resumed_at = Some(Instant::now());
            }
        }
        self.track = Some(track);
        Ok(())
    }

    fn is_playing(&self) -> bool {
        self.track
            .as_ref()
            .map(|track| track.resumed_at.is_some())
            .unwrap_or(false)
    }
}

/// Opens the container and returns the default track's length.
pub fn probe_length(path: &Path) -> Result<Duration, BackendError> {
    let file = File::open(path)?;
    let mss = MediaSourceStream::new(Box::new(file), Default::default());
    let mut hint = Hint::new();
    if let Some(ext) = path.extension().and_then(|s| s.to_str()) {
        hint.with_extension(ext);
    }
    let probed = symphonia::default::get_probe()
        .format(&hint, mss, &FormatOptions::default(), &MetadataOptions::default())
        .map_err(|err| BackendError::Decode(err.to_string()))?;
    let track = probed
        .format
        .default_track()
        .ok_or_else(|| BackendError::Decode("no default audio track".to_string()))?;
    let params = &track.codec_params;
    match (params.n_frames, params.sample_rate) {
        (Some(frames), Some(rate)) if rate > 0 => {
            Ok(Duration::from_secs_f64(frames as f64 / f64::from(rate)))
        }
        _ => Ok(UNKNOWN_LENGTH),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::sync::mpsc::unbounded_channel;

    /// 16-bit mono PCM, silent.
    fn write_wav(path: &Path, sample_rate: u32, frames: u32) {
        let data_len = frames * 2;
        let mut bytes = Vec::new();
        bytes.extend_from_slice(b"RIFF");
        bytes.extend_from_slice(&(36 + data_len).to_le_bytes());
        bytes.extend_from_slice(b"WAVE");
        bytes.extend_from_slice(b"fmt ");
        bytes.extend_from_slice(&16u32.to_le_bytes());
        bytes.extend_from_slice(&1u16.to_le_bytes());
        bytes.extend_from_slice(&1u16.to_le_bytes());
        bytes.extend_from_slice(&sample_rate.to_le_bytes());
        bytes.extend_from_slice(&(sample_rate * 2).to_le_bytes());
        bytes.extend_from_slice(&2u16.to_le_bytes());
        bytes.extend_from_slice(&16u16.to_le_bytes());
        bytes.extend_from_slice(b"data");
        bytes.extend_from_slice(&data_len.to_le_bytes());
        bytes.resize(bytes.len() + data_len as usize, 0);
        std::fs::write(path, bytes).unwrap();
    }

    fn song(file: &str) -> Song {
        Song {
            id: 0,
            title: file.to_string(),
            album: String::new(),
            artist: String::new(),
            track: 0,
            file: file.to_string(),
        }
    }

    #[test]
    fn probe_reads_wav_length() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tone.wav");
        write_wav(&path, 8000, 16000);
        let length = probe_length(&path).unwrap();
        assert_eq!(length.as_millis(), 2000);
    }

    #[test]
    fn garbage_file_fails_to_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("broken.mp3");
        std::fs::write(&path, b"definitely not audio").unwrap();
        assert!(matches!(probe_length(&path), Err(BackendError::Decode(_))));
    }

    #[tokio::test]
    async fn completion_carries_the_load_token() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("short.wav");
        write_wav(&path, 8000, 400);
        let (tx, mut rx) = unbounded_channel();
        let mut backend = HeadlessBackend::new(tx);

        assert!(matches!(backend.play_pause(), Err(BackendError::NotLoaded)));
        backend.open(&path, &song("short.wav"), LoadToken(9)).unwrap();
        assert!(backend.is_playing());
        assert_eq!(
            rx.recv().await,
            Some(BackendEvent::PlaybackCompleted(LoadToken(9)))
        );
    }

    #[tokio::test]
    async fn pause_holds_completion_back() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("short.wav");
        write_wav(&path, 8000, 400);
        let (tx, mut rx) = unbounded_channel();
        let mut backend = HeadlessBackend::new(tx);

        backend.open(&path, &song("short.wav"), LoadToken(1)).unwrap();
        backend.play_pause().unwrap();
        assert!(!backend.is_playing());
        tokio::time::sleep(Duration::from_millis(120)).await;
        assert!(rx.try_recv().is_err());

        backend.play_pause().unwrap();
        assert_eq!(
            rx.recv().await,
            Some(BackendEvent::PlaybackCompleted(LoadToken(1)))
        );
        backend.close();
        assert!(!backend.is_playing());
    }
}
