//! Song fields guessed from the file's place in the folder tree, used when the tags
//! are unreadable or incomplete. Layout assumed: `Artist/.../Album (Year)/07 - Title.mp3`.

pub const UNKNOWN_ARTIST: &str = "Unknown Artist";
pub const UNKNOWN_ALBUM: &str = "Unknown Album";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PathGuess {
    pub title: String,
    pub album: String,
    pub artist: String,
    pub track: u32,
}

/// `relpath` is relative to the library root and uses `/` separators.
pub fn guess_from_path(relpath: &str) -> PathGuess {
    let parts: Vec<&str> = relpath.split('/').filter(|p| !p.is_empty()).collect();
    let file_name = parts.last().copied().unwrap_or(relpath);
    let stem = file_stem(file_name);
    let (track, rest) = split_track_prefix(stem);
    let title = if rest.trim().is_empty() {
        stem.trim().to_string()
    } else {
        rest.trim().to_string()
    };

    // The artist folder is the top-level folder under the root.
    let artist = if parts.len() >= 2 {
        parts[0].trim().to_string()
    } else {
        UNKNOWN_ARTIST.to_string()
    };
    let album = if parts.len() >= 2 {
        let (album, _) = split_title_year(parts[parts.len() - 2]);
        album
    } else {
        UNKNOWN_ALBUM.to_string()
    };

    PathGuess {
        title,
        album,
        artist,
        track: track.unwrap_or(0),
    }
}

fn file_stem(name: &str) -> &str {
    match name.rfind('.') {
        Some(idx) if idx > 0 => &name[..idx],
        _ => name,
    }
}

/// Splits a leading track number such as `07 - `, `07.`, `#7 ` off a file stem.
/// Only strips when the stem actually starts with a number.
pub fn split_track_prefix(stem: &str) -> (Option<u32>, &str) {
    let digits_end = stem
        .find(|c: char| !c.is_ascii_digit())
        .unwrap_or(stem.len());
    if digits_end == 0 {
        return (None, stem);
    }
    let number = stem[..digits_end].parse::<u32>().ok();
    let mut rest = &stem[digits_end..];
    rest = skip_one(rest, |c| c.is_whitespace());
    rest = skip_one(rest, |c| matches!(c, '-' | '#' | '.'));
    rest = skip_one(rest, |c| c.is_whitespace());
    (number, rest)
}

fn skip_one(input: &str, pred: impl Fn(char) -> bool) -> &str {
    match input.chars().next() {
        Some(c) if pred(c) => &input[c.len_utf8()..],
        _ => input,
    }
}

/// "Abbey Road (1969)", "Abbey Road [1969]" and "Abbey Road 1969" all give
/// ("Abbey Road", Some(1969)).
pub fn split_title_year(input: &str) -> (String, Option<i32>) {
    let trimmed = input.trim();
    if let Some((title, year)) = split_year_suffix(trimmed, '(', ')') {
        return (title.to_string(), Some(year));
    }
    if let Some((title, year)) = split_year_suffix(trimmed, '[', ']') {
        return (title.to_string(), Some(year));
    }
    if let Some((title, year)) = split_bare_year(trimmed) {
        return (title.to_string(), Some(year));
    }
    (trimmed.to_string(), None)
}

fn split_year_suffix(input: &str, open: char, close: char) -> Option<(&str, i32)> {
    let trimmed = input.trim_end();
    if !trimmed.ends_with(close) {
        return None;
    }
    let open_idx = trimmed.rfind(open)?;
    let year_str = trimmed
        .get(open_idx + open.len_utf8()..trimmed.len() - close.len_utf8())?
        .trim();
    let year = parse_year(year_str)?;
    let title = trimmed[..open_idx].trim_end();
    if title.is_empty() {
        return None;
    }
    Some((title, year))
}

fn split_bare_year(input: &str) -> Option<(&str, i32)> {
    let space_idx = input.rfind(' ')?;
    let year = parse_year(&input[space_idx + 1..])?;
    let title = input[..space_idx].trim_end();
    if title.is_empty() {
        return None;
    }
    Some((title, year))
}

fn parse_year(text: &str) -> Option<i32> {
    if text.len() != 4 || !text.chars().all(|c| c.is_ascii_digit()) {
        return None;
    }
    text.parse::<i32>().ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strips_common_track_prefixes() {
        assert_eq!(split_track_prefix("07 - Title"), (Some(7), "Title"));
        assert_eq!(split_track_prefix("07. Title"), (Some(7), "Title"));
        assert_eq!(split_track_prefix("12-Title"), (Some(12), "Title"));
        assert_eq!(split_track_prefix("3 Title"), (Some(3), "Title"));
        assert_eq!(split_track_prefix("Title"), (None, "Title"));
    }

    #[test]
    fn guesses_fields_from_nested_layout() {
        let guess = guess_from_path("Queen/Live/A Night at the Opera (1975)/11 - Bohemian Rhapsody.mp3");
        assert_eq!(
            guess,
            PathGuess {
                title: "Bohemian Rhapsody".to_string(),
                album: "A Night at the Opera".to_string(),
                artist: "Queen".to_string(),
                track: 11,
            }
        );
    }

    #[test]
    fn numeric_only_file_keeps_its_name() {
        let guess = guess_from_path("Artist/Album/01.flac");
        assert_eq!(guess.title, "01");
        assert_eq!(guess.track, 1);
    }

    #[test]
    fn loose_file_in_root_uses_unknowns() {
        let guess = guess_from_path("song.wav");
        assert_eq!(guess.title, "song");
        assert_eq!(guess.artist, UNKNOWN_ARTIST);
        assert_eq!(guess.album, UNKNOWN_ALBUM);
        assert_eq!(guess.track, 0);
    }

    #[test]
    fn strips_bare_and_bracketed_years() {
        assert_eq!(split_title_year("Blue 1971"), ("Blue".to_string(), Some(1971)));
        assert_eq!(split_title_year("Blue [1971]"), ("Blue".to_string(), Some(1971)));
        assert_eq!(split_title_year("1971"), ("1971".to_string(), None));
        assert_eq!(split_title_year("Route 66"), ("Route 66".to_string(), None));
    }
}
