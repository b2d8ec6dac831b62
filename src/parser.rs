use serde::{Deserialize, Serialize};

/// Song/artist separators, tried in this order. The first one present in a
/// line wins even if another separator occurs earlier in that line.
const SEPARATORS: [&str; 4] = [" / ", " - ", " \u{2014} ", " \u{2013} "];

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Song {
    pub title: String,
    /// Empty when the line had no separator.
    pub artist: String,
}

impl Song {
    pub fn new(title: impl Into<String>, artist: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            artist: artist.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParsedPlaylist {
    pub title: String,
    pub songs: Vec<Song>,
}

impl ParsedPlaylist {
    /// Rebuild the numbered text listing. Parsing the output yields the same songs.
    pub fn to_listing(&self) -> String {
        to_listing(&self.title, &self.songs)
    }
}

/// Parse pasted text into a playlist title and its songs.
///
/// The first non-empty line is the title; every following line is a song,
/// optionally prefixed with `1.` or `1)`. Returns `None` when there is no
/// title plus at least one usable song line.
pub fn parse(text: &str) -> Option<ParsedPlaylist> {
    let lines: Vec<&str> = text
        .trim()
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .collect();

    if lines.len() < 2 {
        return None;
    }

    let title = lines[0].to_string();

    let songs: Vec<Song> = lines[1..]
        .iter()
        .filter_map(|line| parse_song_line(line))
        .collect();

    if songs.is_empty() {
        return None;
    }

    Some(ParsedPlaylist { title, songs })
}

fn parse_song_line(line: &str) -> Option<Song> {
    let content = strip_list_marker(line);

    let (title, artist) = match split_song(content) {
        Some((title, artist)) => (title.trim(), artist.trim()),
        None => (content.trim(), ""),
    };

    if title.is_empty() {
        return None;
    }

    Some(Song::new(title, artist))
}

/// Remove a leading `12.` / `12)` marker and the whitespace after it.
fn strip_list_marker(line: &str) -> &str {
    let rest = line.trim_start_matches(|c: char| c.is_ascii_digit());
    if rest.len() == line.len() {
        return line;
    }

    match rest.strip_prefix(['.', ')']) {
        Some(content) => content.trim_start(),
        None => line,
    }
}

fn split_song(content: &str) -> Option<(&str, &str)> {
    SEPARATORS.iter().find_map(|sep| match content.find(sep) {
        Some(idx) if idx > 0 => Some((&content[..idx], &content[idx + sep.len()..])),
        _ => None,
    })
}

pub fn to_listing(title: &str, songs: &[Song]) -> String {
    let mut listing = title.to_string();

    for (i, song) in songs.iter().enumerate() {
        listing.push('\n');
        if song.artist.is_empty() {
            listing.push_str(&format!("{}. {}", i + 1, song.title));
        } else {
            listing.push_str(&format!("{}. {} / {}", i + 1, song.title, song.artist));
        }
    }

    listing
}
