//! Music database commands: find, search, list, count, lsinfo, update

use std::collections::BTreeSet;

use super::dispatcher::{Args, CommandRegistry, Context, HandlerResult, RegistryError};
use super::error::AckError;
use super::format::{parse_query, tokenize, track_items};
use super::response::{Item, Response};
use super::stored_playlists::summary_items;
use crate::models::{Field, Query, Track};

pub fn register(registry: &mut CommandRegistry) -> Result<(), RegistryError> {
    registry.register("^count (?P<query>.+)$", count)?;
    registry.register("^find (?P<query>.+)$", find)?;
    registry.register("^findadd (?P<query>.+)$", findadd)?;
    registry.register(
        r#"^list "?(?P<field>(?i:albumartist|artist|album|date|genre))"?( (?P<query>.*))?$"#,
        list,
    )?;
    registry.register("^listall$", not_implemented)?;
    registry.register(r#"^listall "(?P<uri>[^"]*)"$"#, not_implemented)?;
    registry.register("^listallinfo$", not_implemented)?;
    registry.register(r#"^listallinfo "(?P<uri>[^"]*)"$"#, not_implemented)?;
    registry.register("^lsinfo$", lsinfo)?;
    registry.register(r#"^lsinfo "(?P<uri>[^"]*)"$"#, lsinfo)?;
    registry.register("^rescan$", update)?;
    registry.register(r#"^rescan "(?P<uri>[^"]*)"$"#, update)?;
    registry.register("^search (?P<query>.+)$", search)?;
    registry.register("^searchadd (?P<query>.+)$", searchadd)?;
    registry.register("^update$", update)?;
    registry.register(r#"^update "(?P<uri>[^"]*)"$"#, update)?;
    Ok(())
}

fn not_implemented(_ctx: &mut Context<'_>, _args: &Args<'_>) -> HandlerResult {
    Err(AckError::not_implemented())
}

fn query_arg(args: &Args<'_>) -> Result<Query, AckError> {
    parse_query(&tokenize(args.required("query")?)?)
}

fn find_tracks(ctx: &Context<'_>, args: &Args<'_>) -> Result<Vec<Track>, AckError> {
    Ok(ctx.core.library.find_exact(&query_arg(args)?)?)
}

fn search_tracks(ctx: &Context<'_>, args: &Args<'_>) -> Result<Vec<Track>, AckError> {
    Ok(ctx.core.library.search(&query_arg(args)?)?)
}

fn tracks_response(tracks: &[Track]) -> Response {
    tracks
        .iter()
        .map(|track| Item::Group(track_items(track, None)))
        .collect()
}

fn count(ctx: &mut Context<'_>, args: &Args<'_>) -> HandlerResult {
    let tracks = find_tracks(ctx, args)?;
    let playtime: u64 = tracks.iter().filter_map(|track| track.length).sum::<u64>() / 1000;
    Ok(Response::new()
        .pair("songs", tracks.len())
        .pair("playtime", playtime))
}

fn find(ctx: &mut Context<'_>, args: &Args<'_>) -> HandlerResult {
    Ok(tracks_response(&find_tracks(ctx, args)?))
}

fn findadd(ctx: &mut Context<'_>, args: &Args<'_>) -> HandlerResult {
    let tracks = find_tracks(ctx, args)?;
    ctx.core.add(tracks, None)?;
    Ok(Response::new())
}

fn search(ctx: &mut Context<'_>, args: &Args<'_>) -> HandlerResult {
    Ok(tracks_response(&search_tracks(ctx, args)?))
}

fn searchadd(ctx: &mut Context<'_>, args: &Args<'_>) -> HandlerResult {
    let tracks = search_tracks(ctx, args)?;
    ctx.core.add(tracks, None)?;
    Ok(Response::new())
}

/// Response key for a listed field
fn list_key(field: Field) -> &'static str {
    match field {
        Field::Artist => "Artist",
        Field::AlbumArtist => "AlbumArtist",
        Field::Album => "Album",
        Field::Date => "Date",
        Field::Genre => "Genre",
        Field::Title => "Title",
        Field::TrackNo => "Track",
        Field::Uri => "file",
        Field::Any => "Any",
    }
}

/// Distinct values of one field, optionally filtered.
///
/// `list album "<artist>"` is shorthand for `list album artist "<artist>"`.
fn list(ctx: &mut Context<'_>, args: &Args<'_>) -> HandlerResult {
    let field_name = args.required("field")?;
    let field = Field::from_tag(field_name)
        .ok_or_else(|| AckError::arg(format!("Unknown tag type: {}", field_name)))?;

    let tokens = match args.get("query") {
        Some(raw) => tokenize(raw)?,
        None => Vec::new(),
    };
    let query = match tokens.as_slice() {
        [artist] if field == Field::Album => Query::new().with(Field::Artist, artist.clone()),
        [_] => {
            return Err(AckError::arg(
                "should be \"Album\" for 3 arguments",
            ))
        }
        tokens => parse_query(tokens)?,
    };

    let tracks = ctx.core.library.find_exact(&query)?;
    let values: BTreeSet<String> = tracks
        .iter()
        .flat_map(|track| field.values(track))
        .filter(|value| !value.is_empty())
        .collect();

    let key = list_key(field);
    Ok(values.into_iter().map(|value| Item::pair(key, value)).collect())
}

/// Only the root is browsable; it lists the stored playlists
fn lsinfo(ctx: &mut Context<'_>, args: &Args<'_>) -> HandlerResult {
    match args.get("uri") {
        None | Some("") | Some("/") => {
            let playlists = ctx.core.playlists.list()?;
            Ok(playlists
                .iter()
                .filter(|summary| !summary.name.is_empty())
                .map(|summary| Item::Group(summary_items(summary)))
                .collect())
        }
        Some(_) => Err(AckError::not_implemented()),
    }
}

fn update(ctx: &mut Context<'_>, _args: &Args<'_>) -> HandlerResult {
    ctx.core.update_library();
    Ok(Response::new().pair("updating_db", 0))
}
