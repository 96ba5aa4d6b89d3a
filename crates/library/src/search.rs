use common::Song;
use strsim::jaro_winkler;

pub const DEFAULT_TOP: usize = 5;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SearchField {
    Title,
    Artist,
    Album,
}

impl SearchField {
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "title" => Some(Self::Title),
            "artist" => Some(Self::Artist),
            "album" => Some(Self::Album),
            _ => None,
        }
    }

    fn value<'a>(&self, song: &'a Song) -> &'a str {
        match self {
            SearchField::Title => &song.title,
            SearchField::Artist => &song.artist,
            SearchField::Album => &song.album,
        }
    }
}

/// Ranks songs against a free-text query. Each query word scores the distance to the
/// closest word of the field, compared on the field word's prefix of the same length, so
/// partially typed words still match. Lower totals rank first; ties keep table order.
pub fn search<'a>(query: &str, songs: &'a [Song], field: SearchField, top: usize) -> Vec<&'a Song> {
    let query = query.to_lowercase();
    let words: Vec<&str> = query.split_whitespace().collect();
    if words.is_empty() {
        return Vec::new();
    }

    let mut ranked: Vec<(f64, &Song)> = songs
        .iter()
        .map(|song| (rank(&words, field.value(song)), song))
        .collect();
    ranked.sort_by(|a, b| a.0.total_cmp(&b.0));
    ranked.into_iter().take(top).map(|(_, song)| song).collect()
}

fn rank(words: &[&str], text: &str) -> f64 {
    let text = text.to_lowercase();
    let others: Vec<&str> = text.split_whitespace().collect();
    words
        .iter()
        .map(|word| {
            let len = word.chars().count();
            let best = others
                .iter()
                .map(|other| jaro_winkler(word, prefix(other, len)))
                .fold(0.0_f64, f64::max);
            1.0 - best
        })
        .sum()
}

fn prefix(text: &str, chars: usize) -> &str {
    match text.char_indices().nth(chars) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}
