//! Track rendering and argument parsing shared by the command modules

use super::error::AckError;
use super::response::Item;
use crate::models::{Field, Query, TlTrack, Track};

/// Render a track as `Key: value` items.
///
/// `position` adds the `Pos` and `Id` of a tracklist entry.
pub fn track_items(track: &Track, position: Option<(usize, &TlTrack)>) -> Vec<Item> {
    let track_no = track.track_no.unwrap_or(0);
    let track_field = match track.album.as_ref().and_then(|album| album.num_tracks) {
        Some(total) => format!("{}/{}", track_no, total),
        None => track_no.to_string(),
    };

    let mut items = vec![
        Item::pair("file", &track.uri),
        Item::pair("Time", track.length.unwrap_or(0) / 1000),
        Item::pair("Artist", track.artists.join(", ")),
        Item::pair("Title", track.name.as_deref().unwrap_or("")),
        Item::pair("Album", track.album_name().unwrap_or("")),
        Item::pair("Date", track.date.as_deref().unwrap_or("")),
        Item::pair("Track", track_field),
    ];
    if let Some((pos, entry)) = position {
        items.push(Item::pair("Pos", pos));
        items.push(Item::pair("Id", entry.tlid));
    }
    if let Some(album) = &track.album {
        if !album.artists.is_empty() {
            items.push(Item::pair("AlbumArtist", album.artists.join(", ")));
        }
    }
    if let Some(genre) = &track.genre {
        items.push(Item::pair("Genre", genre));
    }
    items
}

/// Render tracklist entries starting at `offset`
pub fn tracklist_items(entries: &[TlTrack], offset: usize) -> Vec<Item> {
    entries
        .iter()
        .enumerate()
        .map(|(i, entry)| Item::Group(track_items(&entry.track, Some((offset + i, entry)))))
        .collect()
}

/// Split an argument string into words.
///
/// Words are separated by spaces; a double-quoted word may contain spaces and
/// `\"` / `\\` escapes.
pub fn tokenize(input: &str) -> Result<Vec<String>, AckError> {
    let mut tokens = Vec::new();
    let mut chars = input.chars().peekable();

    loop {
        while chars.next_if(|c| c.is_whitespace()).is_some() {}
        let Some(&first) = chars.peek() else {
            break;
        };

        let mut token = String::new();
        if first == '"' {
            chars.next();
            let mut closed = false;
            while let Some(c) = chars.next() {
                match c {
                    '"' => {
                        closed = true;
                        break;
                    }
                    '\\' => match chars.next() {
                        Some(escaped) => token.push(escaped),
                        None => break,
                    },
                    c => token.push(c),
                }
            }
            if !closed {
                return Err(AckError::arg("Missing closing '\"'"));
            }
            if chars.peek().is_some_and(|c| !c.is_whitespace()) {
                return Err(AckError::arg("Space expected after closing '\"'"));
            }
        } else {
            while let Some(c) = chars.next_if(|c| !c.is_whitespace()) {
                if c == '"' {
                    return Err(AckError::arg("Invalid unquoted character"));
                }
                token.push(c);
            }
        }
        tokens.push(token);
    }
    Ok(tokens)
}

/// Parse `tag "value"` pairs into a library query.
///
/// Empty values are skipped.
pub fn parse_query(tokens: &[String]) -> Result<Query, AckError> {
    if tokens.len() % 2 != 0 {
        return Err(AckError::arg("incorrect arguments"));
    }
    let mut query = Query::new();
    for pair in tokens.chunks(2) {
        let field = Field::from_tag(&pair[0])
            .ok_or_else(|| AckError::arg(format!("Unknown tag type: {}", pair[0])))?;
        if !pair[1].is_empty() {
            query.add(field, pair[1].clone());
        }
    }
    Ok(query)
}

/// Parse a `start:end` range argument.
///
/// A missing end is returned as None.
pub fn parse_range(raw: &str) -> Result<(usize, Option<usize>), AckError> {
    let invalid = || AckError::arg(format!("Invalid range: {}", raw));
    let (start, end) = match raw.split_once(':') {
        Some((start, end)) => (start, Some(end).filter(|end| !end.is_empty())),
        None => (raw, None),
    };
    let start = start.parse().map_err(|_| invalid())?;
    let end = end.map(|end| end.parse()).transpose().map_err(|_| invalid())?;
    Ok((start, end))
}
