use std::path::PathBuf;
use std::time::Duration;

use common::Song;
use library::{unique_export_path, ImagePick, SearchField, DEFAULT_TOP};
use player::{BackendEvent, CallState, SessionCommand, SessionEvent, SongLoader};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc::UnboundedSender;
use tokio::sync::oneshot;
use tracing::{debug, warn};

use crate::config::{resolve_music_root, save_config};
use crate::scan::{finish_index, set_library_missing, start_index};
use crate::state::{AppContext, AppEvent, LibraryStatus};

const HELP: &str = "\
commands:
  root <path>                      set the music folder and index it
  status                           library and playback status
  category [artist|album|playlist] list a category
  list <n>                         songs of entry n
  play <n>                         play entry n
  queue song <id> | queue entry <n>
  next | pause | resume | toggle
  shuffle [on|off]                 reshuffle, or set the shuffle flag
  search [title|artist|album] <text>
  image <n> [random]               cover image for entry n
  playlist list | new <name> | rename <i> <name> | delete <i>
  playlist add <i> <song id> | remove <i> <song id>
  export [dir] | import <file> | rescan
  call ringing|active|idle | headset on|off
  quit";

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Flow {
    Continue,
    Quit,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Command {
    Help,
    Status,
    Root(String),
    Category(Option<String>),
    List(usize),
    Play(usize),
    QueueSong(usize),
    QueueEntry(usize),
    Next,
    Pause,
    Resume,
    Toggle,
    Shuffle(Option<bool>),
    Search { field: SearchField, text: String },
    Image { entry: usize, pick: ImagePick },
    PlaylistList,
    PlaylistNew(String),
    PlaylistRename(usize, String),
    PlaylistDelete(usize),
    PlaylistAdd(usize, usize),
    PlaylistRemove(usize, usize),
    Export(Option<String>),
    Import(String),
    Rescan,
    Call(CallState),
    Headset(bool),
    Quit,
}

pub fn parse_command(line: &str) -> Result<Command, String> {
    let line = line.trim();
    let (word, rest) = split_word(line);
    let command = match word.to_ascii_lowercase().as_str() {
        "help" | "?" => Command::Help,
        "status" => Command::Status,
        "root" => Command::Root(required(rest, "root <path>")?.to_string()),
        "category" | "cat" => Command::Category(optional(rest)),
        "list" | "ls" => Command::List(number(rest, "list <n>")?),
        "play" => Command::Play(number(rest, "play <n>")?),
        "queue" => {
            let (kind, value) = split_word(rest);
            match kind {
                "song" => Command::QueueSong(number(value, "queue song <id>")?),
                "entry" => Command::QueueEntry(number(value, "queue entry <n>")?),
                _ => return Err("usage: queue song <id> | queue entry <n>".to_string()),
            }
        }
        "next" => Command::Next,
        "pause" => Command::Pause,
        "resume" => Command::Resume,
        "toggle" => Command::Toggle,
        "shuffle" => match rest {
            "" => Command::Shuffle(None),
            other => Command::Shuffle(Some(on_off(other, "shuffle [on|off]")?)),
        },
        "search" => {
            let (first, remainder) = split_word(rest);
            match SearchField::parse(first) {
                Some(field) if !remainder.is_empty() => Command::Search {
                    field,
                    text: remainder.to_string(),
                },
                _ => Command::Search {
                    field: SearchField::Title,
                    text: required(rest, "search [title|artist|album] <text>")?.to_string(),
                },
            }
        }
        "image" => {
            let (entry, mode) = split_word(rest);
            let pick = match mode {
                "" | "first" => ImagePick::First,
                "random" => ImagePick::Random,
                _ => return Err("usage: image <n> [random]".to_string()),
            };
            Command::Image {
                entry: number(entry, "image <n> [random]")?,
                pick,
            }
        }
        "playlist" | "pl" => parse_playlist(rest)?,
        "export" => Command::Export(optional(rest)),
        "import" => Command::Import(required(rest, "import <file>")?.to_string()),
        "rescan" => Command::Rescan,
        "call" => Command::Call(
            CallState::parse(rest).ok_or("usage: call ringing|active|idle")?,
        ),
        "headset" => Command::Headset(on_off(rest, "headset on|off")?),
        "quit" | "exit" => Command::Quit,
        "" => return Err(String::new()),
        other => return Err(format!("unknown command {:?}; try `help`", other)),
    };
    Ok(command)
}

fn parse_playlist(rest: &str) -> Result<Command, String> {
    let (action, args) = split_word(rest);
    let command = match action {
        "list" | "" => Command::PlaylistList,
        "new" => Command::PlaylistNew(required(args, "playlist new <name>")?.to_string()),
        "rename" => {
            let (index, name) = split_word(args);
            Command::PlaylistRename(
                number(index, "playlist rename <i> <name>")?,
                required(name, "playlist rename <i> <name>")?.to_string(),
            )
        }
        "delete" => Command::PlaylistDelete(number(args, "playlist delete <i>")?),
        "add" | "remove" => {
            let usage = "playlist add|remove <i> <song id>";
            let (index, song) = split_word(args);
            let index = number(index, usage)?;
            let song = number(song, usage)?;
            if action == "add" {
                Command::PlaylistAdd(index, song)
            } else {
                Command::PlaylistRemove(index, song)
            }
        }
        other => return Err(format!("unknown playlist action {:?}", other)),
    };
    Ok(command)
}

fn split_word(input: &str) -> (&str, &str) {
    let input = input.trim();
    match input.find(char::is_whitespace) {
        Some(idx) => (&input[..idx], input[idx..].trim()),
        None => (input, ""),
    }
}

fn optional(rest: &str) -> Option<String> {
    let rest = rest.trim();
    if rest.is_empty() {
        None
    } else {
        Some(rest.to_string())
    }
}

fn required<'a>(rest: &'a str, usage: &str) -> Result<&'a str, String> {
    let rest = rest.trim();
    if rest.is_empty() {
        Err(format!("usage: {}", usage))
    } else {
        Ok(rest)
    }
}

fn number(rest: &str, usage: &str) -> Result<usize, String> {
    rest.trim()
        .parse::<usize>()
        .map_err(|_| format!("usage: {}", usage))
}

fn on_off(value: &str, usage: &str) -> Result<bool, String> {
    match value.trim().to_ascii_lowercase().as_str() {
        "on" | "true" | "yes" | "1" => Ok(true),
        "off" | "false" | "no" | "0" => Ok(false),
        _ => Err(format!("usage: {}", usage)),
    }
}

/// Reads stdin line by line into the main loop's queue.
pub fn spawn_stdin_reader(events: UnboundedSender<AppEvent>) {
    tokio::spawn(async move {
        let mut lines = BufReader::new(tokio::io::stdin()).lines();
        loop {
            match lines.next_line().await {
                Ok(Some(line)) => {
                    if events.send(AppEvent::Input(line)).is_err() {
                        break;
                    }
                }
                Ok(None) => break,
                Err(err) => {
                    warn!("Failed to read input: {}", err);
                    break;
                }
            }
        }
        let _ = events.send(AppEvent::InputClosed);
    });
}

pub async fn handle_event(ctx: &AppContext, event: AppEvent) -> Flow {
    match event {
        AppEvent::Input(line) => match parse_command(&line) {
            Ok(command) => return run_command(ctx, command).await,
            Err(message) if message.is_empty() => {}
            Err(message) => println!("{}", message),
        },
        AppEvent::ScanFinished(outcome) => finish_index(ctx, outcome),
        AppEvent::RescanRequested => match ctx.library() {
            Some(library) => start_index(ctx, library.base_path().to_path_buf()),
            None => debug!("Rescan requested without a library"),
        },
        AppEvent::Session(event) => show_session_event(event),
        AppEvent::InputClosed => return Flow::Quit,
    }
    Flow::Continue
}

fn show_session_event(event: SessionEvent) {
    match event {
        SessionEvent::SongChanged(song) => println!("Now playing: {}", describe_song(&song)),
        SessionEvent::StateChanged(true) => println!("Playing"),
        SessionEvent::StateChanged(false) => println!("Paused"),
        SessionEvent::LoadingChanged(loading) => debug!("Loading: {}", loading),
        SessionEvent::LoadFailed { song, message } => {
            println!("Error opening {}: {}", song.title, message)
        }
        SessionEvent::Exhausted => println!("No playable song in this selection."),
    }
}

fn describe_song(song: &Song) -> String {
    format!("[{}] {} - {} ({})", song.id, song.title, song.artist, song.album)
}

fn report<T, E: std::fmt::Display>(result: Result<T, E>) -> Option<T> {
    match result {
        Ok(value) => Some(value),
        Err(err) => {
            println!("Error: {}", err);
            None
        }
    }
}

async fn run_command(ctx: &AppContext, command: Command) -> Flow {
    match command {
        Command::Help => println!("{}", HELP),
        Command::Quit => return Flow::Quit,
        Command::Status => show_status(ctx).await,
        Command::Root(path) => set_music_root(ctx, &path),
        Command::Pause => ctx.send(SessionCommand::PlayPause(Some(false))),
        Command::Next | Command::Resume | Command::Toggle => {
            let status = ctx.library_state.read().status.clone();
            if let LibraryStatus::Missing(_) | LibraryStatus::Broken(_) = status {
                println!("Playback disabled ({})", status.describe());
            } else {
                ctx.send(match command {
                    Command::Next => SessionCommand::Next,
                    Command::Resume => SessionCommand::PlayPause(Some(true)),
                    _ => SessionCommand::PlayPause(None),
                });
            }
        }
        Command::Call(state) => {
            let _ = ctx.backend_events.send(BackendEvent::CallStateChanged(state));
        }
        Command::Headset(plugged) => {
            let _ = ctx.backend_events.send(BackendEvent::HeadsetPlugged(plugged));
        }
        Command::Rescan => match ctx.library() {
            Some(library) => start_index(ctx, library.base_path().to_path_buf()),
            None => {
                let root = {
                    let config = ctx.config.read();
                    resolve_music_root(&ctx.config_path, &config.music_root)
                };
                match root {
                    Some(root) if root.exists() => start_index(ctx, root),
                    Some(root) => set_library_missing(ctx, root),
                    None => println!("Music folder not configured; use `root <path>`."),
                }
            }
        },
        other => library_command(ctx, other),
    }
    Flow::Continue
}

fn library_command(ctx: &AppContext, command: Command) {
    let library = match ctx.library() {
        Some(library) => library,
        None => {
            let status = ctx.library_state.read().status.clone();
            println!("Library not available ({})", status.describe());
            return;
        }
    };

    match command {
        Command::Category(name) => {
            let name = name.unwrap_or_else(|| library.config().last_category);
            if let Some(entries) = report(library.set_category(&name)) {
                for (index, entry) in entries.iter().enumerate() {
                    let pin = if entry.pinned { "*" } else { " " };
                    println!("{:>3}{} {} ({})", index, pin, entry.name, entry.songs.len());
                }
                ctx.view.write().entries = entries;
            }
        }
        Command::List(index) => {
            if let Some(songs) = entry_songs(ctx, &library, index) {
                for song in &songs {
                    println!("  {}", describe_song(song));
                }
            }
        }
        Command::Play(index) => {
            if let Some(songs) = entry_songs(ctx, &library, index) {
                ctx.stop_loader();
                ctx.send(SessionCommand::SelectPlaylist { songs, start: true });
            }
        }
        Command::QueueEntry(index) => {
            if let Some(songs) = entry_songs(ctx, &library, index) {
                ctx.stop_loader();
                let interval = Duration::from_millis(ctx.config.read().loader_interval_ms);
                println!("Queueing {} songs", songs.len());
                let loader = SongLoader::start(songs, ctx.session.clone(), interval);
                *ctx.loader.lock() = Some(loader);
            }
        }
        Command::QueueSong(id) => match library.song(id) {
            Some(song) => {
                println!("Queued {}", describe_song(&song));
                ctx.send(SessionCommand::AddSong(song));
            }
            None => println!("No song with id {}", id),
        },
        Command::Shuffle(None) => ctx.send(SessionCommand::Shuffle),
        Command::Shuffle(Some(enabled)) => {
            if report(library.set_shuffle(enabled)).is_some() {
                ctx.send(SessionCommand::SetShuffle(enabled));
                println!("Shuffle {}", if enabled { "on" } else { "off" });
            }
        }
        Command::Search { field, text } => {
            let results = library.search(&text, field, DEFAULT_TOP);
            if results.is_empty() {
                println!("No results");
            }
            for song in &results {
                println!("  {}", describe_song(song));
            }
        }
        Command::Image { entry, pick } => {
            if let Some(songs) = entry_songs(ctx, &library, entry) {
                let files: Vec<String> = songs.into_iter().map(|song| song.file).collect();
                println!("{}", library.get_image(&files, pick).display());
            }
        }
        Command::PlaylistList => {
            for (index, playlist) in library.playlists().iter().enumerate() {
                let pin = if playlist.pinned { "*" } else { " " };
                println!("{:>3}{} {} ({})", index, pin, playlist.name, playlist.songs.len());
            }
        }
        Command::PlaylistNew(name) => {
            if let Some(index) = report(library.create_playlist(&name)) {
                println!("Created playlist {}", index);
            }
        }
        Command::PlaylistRename(index, name) => {
            if report(library.rename_playlist(index, &name)).is_some() {
                println!("Renamed playlist {}", index);
            }
        }
        Command::PlaylistDelete(index) => {
            if let Some(removed) = report(library.delete_playlist(index)) {
                println!("Deleted {}", removed.name);
            }
        }
        Command::PlaylistAdd(index, song) => edit_playlist(&library, index, song, true),
        Command::PlaylistRemove(index, song) => edit_playlist(&library, index, song, false),
        Command::Export(dir) => {
            let dir = PathBuf::from(dir.unwrap_or_else(|| ".".to_string()));
            let dest = unique_export_path(&dir, "playlist");
            if report(library.export_to(&dest)).is_some() {
                println!("Exported to {}", dest.display());
            }
        }
        Command::Import(file) => {
            if report(library.import_from(&PathBuf::from(&file))).is_some() {
                ctx.stop_loader();
                ctx.send(SessionCommand::Close);
                ctx.send(SessionCommand::SetShuffle(library.config().shuffle));
                let stats = library.stats();
                ctx.library_state.write().status = LibraryStatus::Ready(stats);
                *ctx.view.write() = Default::default();
                println!("Imported {}", file);
            }
        }
        other => warn!("Unhandled command {:?}", other),
    }
}

fn entry_songs(ctx: &AppContext, library: &library::Library, index: usize) -> Option<Vec<Song>> {
    let view = ctx.view.read();
    match view.entries.get(index) {
        Some(entry) => Some(library.category_songs(entry)),
        None => {
            println!("No entry {}; list a category first", index);
            None
        }
    }
}

fn edit_playlist(library: &library::Library, index: usize, song: usize, member: bool) {
    if let Some(changed) = report(library.set_song_in_playlist(index, song, member)) {
        if !changed {
            println!("Nothing to change");
        }
    }
}

fn set_music_root(ctx: &AppContext, value: &str) {
    let config = {
        let mut config = ctx.config.write();
        config.music_root = value.to_string();
        config.clone()
    };
    if report(save_config(&ctx.config_path, &config)).is_none() {
        return;
    }
    match resolve_music_root(&ctx.config_path, &config.music_root) {
        Some(root) if root.exists() => start_index(ctx, root),
        Some(root) => {
            println!("Music folder not found: {}", root.display());
            set_library_missing(ctx, root);
        }
        None => println!("usage: root <path>"),
    }
}

async fn show_status(ctx: &AppContext) {
    let status = ctx.library_state.read().status.clone();
    println!("Library: {}", status.describe());

    let (reply, response) = oneshot::channel();
    ctx.send(SessionCommand::Status(reply));
    match response.await {
        Ok(session) => {
            println!("Playback: {:?}", session.state);
            if let Some(song) = &session.current {
                println!("  current: {}", describe_song(song));
            }
            println!(
                "  queue: {} songs, {} queued manually, shuffle {}",
                session.queued,
                session.manual,
                if session.shuffle { "on" } else { "off" }
            );
            if session.stopped_by_call || session.stopped_by_plug {
                println!(
                    "  interrupted: call={} headset={}",
                    session.stopped_by_call, session.stopped_by_plug
                );
            }
        }
        Err(_) => println!("Playback: stopped"),
    }
}
