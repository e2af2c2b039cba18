//! Stored playlist commands

use super::dispatcher::{Args, CommandRegistry, Context, HandlerResult, RegistryError};
use super::error::AckError;
use super::format::{parse_range, track_items};
use super::response::{Item, Response};
use crate::adapters::StoreError;
use crate::bus::Subsystem;
use crate::models::{PlaylistSummary, Track};

pub fn register(registry: &mut CommandRegistry) -> Result<(), RegistryError> {
    registry.register(r#"^listplaylist "(?P<name>[^"]+)"$"#, listplaylist)?;
    registry.register(r#"^listplaylist (?P<name>[^" ]+)$"#, listplaylist)?;
    registry.register(r#"^listplaylistinfo "(?P<name>[^"]+)"$"#, listplaylistinfo)?;
    registry.register(r#"^listplaylistinfo (?P<name>[^" ]+)$"#, listplaylistinfo)?;
    registry.register("^listplaylists$", listplaylists)?;
    registry.register(r#"^load "(?P<name>[^"]+)"( "(?P<range>\d+:\d*)")?$"#, load)?;
    registry.register(r#"^load (?P<name>[^" ]+)$"#, load)?;
    registry.register(r#"^playlistadd "(?P<name>[^"]+)" "(?P<uri>[^"]+)"$"#, playlistadd)?;
    registry.register(r#"^playlistclear "(?P<name>[^"]+)"$"#, playlistclear)?;
    registry.register(r#"^playlistdelete "(?P<name>[^"]+)" "?(?P<songpos>\d+)"?$"#, playlistdelete)?;
    registry.register(
        r#"^playlistmove "(?P<name>[^"]+)" "?(?P<from>\d+)"? "?(?P<to>\d+)"?$"#,
        playlistmove,
    )?;
    registry.register(r#"^rename "(?P<old>[^"]+)" "(?P<new>[^"]+)"$"#, rename)?;
    registry.register(r#"^rm "(?P<name>[^"]+)"$"#, rm)?;
    registry.register(r#"^save "(?P<name>[^"]+)"$"#, save)?;
    Ok(())
}

/// `playlist:` and `Last-Modified:` lines for one stored playlist
pub fn summary_items(summary: &PlaylistSummary) -> Vec<Item> {
    vec![
        Item::pair("playlist", &summary.name),
        Item::pair(
            "Last-Modified",
            summary.last_modified.format("%Y-%m-%dT%H:%M:%SZ"),
        ),
    ]
}

fn changed(ctx: &Context<'_>) {
    ctx.core.bus().publish(Subsystem::StoredPlaylist);
}

fn load_tracks(ctx: &Context<'_>, name: &str) -> Result<Vec<Track>, AckError> {
    Ok(ctx.core.playlists.load(name)?)
}

fn listplaylist(ctx: &mut Context<'_>, args: &Args<'_>) -> HandlerResult {
    let tracks = load_tracks(ctx, args.required("name")?)?;
    Ok(tracks
        .iter()
        .map(|track| Item::pair("file", &track.uri))
        .collect())
}

fn listplaylistinfo(ctx: &mut Context<'_>, args: &Args<'_>) -> HandlerResult {
    let tracks = load_tracks(ctx, args.required("name")?)?;
    Ok(tracks
        .iter()
        .map(|track| Item::Group(track_items(track, None)))
        .collect())
}

fn listplaylists(ctx: &mut Context<'_>, _args: &Args<'_>) -> HandlerResult {
    let playlists = ctx.core.playlists.list()?;
    Ok(playlists
        .iter()
        .filter(|summary| !summary.name.is_empty())
        .map(|summary| Item::Group(summary_items(summary)))
        .collect())
}

/// Append a stored playlist, or a slice of it, to the tracklist.
///
/// Ranges past either end are clamped.
fn load(ctx: &mut Context<'_>, args: &Args<'_>) -> HandlerResult {
    let mut tracks = load_tracks(ctx, args.required("name")?)?;
    if let Some(range) = args.get("range") {
        let (start, end) = parse_range(range)?;
        let end = end.unwrap_or(tracks.len()).min(tracks.len());
        let start = start.min(end);
        tracks = tracks.drain(start..end).collect();
    }
    ctx.core.add(tracks, None)?;
    Ok(Response::new())
}

/// Append a library track, creating the playlist when needed
fn playlistadd(ctx: &mut Context<'_>, args: &Args<'_>) -> HandlerResult {
    let name = args.required("name")?;
    let track = ctx
        .core
        .library
        .lookup(args.required("uri")?)?
        .ok_or_else(|| AckError::no_exist("No such song"))?;
    let mut tracks = match ctx.core.playlists.load(name) {
        Ok(tracks) => tracks,
        Err(StoreError::NotFound(_)) => Vec::new(),
        Err(e) => return Err(e.into()),
    };
    tracks.push(track);
    ctx.core.playlists.save(name, &tracks)?;
    changed(ctx);
    Ok(Response::new())
}

/// Empty a playlist, creating it when needed
fn playlistclear(ctx: &mut Context<'_>, args: &Args<'_>) -> HandlerResult {
    ctx.core.playlists.save(args.required("name")?, &[])?;
    changed(ctx);
    Ok(Response::new())
}

fn playlistdelete(ctx: &mut Context<'_>, args: &Args<'_>) -> HandlerResult {
    let name = args.required("name")?;
    let position: usize = args.int("songpos")?;
    let mut tracks = load_tracks(ctx, name)?;
    if position >= tracks.len() {
        return Err(AckError::arg("Bad song index"));
    }
    tracks.remove(position);
    ctx.core.playlists.save(name, &tracks)?;
    changed(ctx);
    Ok(Response::new())
}

fn playlistmove(ctx: &mut Context<'_>, args: &Args<'_>) -> HandlerResult {
    let name = args.required("name")?;
    let from: usize = args.int("from")?;
    let to: usize = args.int("to")?;
    let mut tracks = load_tracks(ctx, name)?;
    if from == to {
        return Ok(Response::new());
    }
    if from >= tracks.len() || to >= tracks.len() {
        return Err(AckError::arg("Bad song index"));
    }
    let track = tracks.remove(from);
    tracks.insert(to, track);
    ctx.core.playlists.save(name, &tracks)?;
    changed(ctx);
    Ok(Response::new())
}

fn rename(ctx: &mut Context<'_>, args: &Args<'_>) -> HandlerResult {
    ctx.core
        .playlists
        .rename(args.required("old")?, args.required("new")?)?;
    changed(ctx);
    Ok(Response::new())
}

fn rm(ctx: &mut Context<'_>, args: &Args<'_>) -> HandlerResult {
    ctx.core.playlists.delete(args.required("name")?)?;
    changed(ctx);
    Ok(Response::new())
}

/// Save the tracklist as a new playlist
fn save(ctx: &mut Context<'_>, args: &Args<'_>) -> HandlerResult {
    let name = args.required("name")?;
    if ctx.core.playlists.exists(name)? {
        return Err(AckError::exist("Playlist already exists"));
    }
    let tracks: Vec<Track> = ctx
        .core
        .tracklist
        .entries()
        .iter()
        .map(|entry| entry.track.clone())
        .collect();
    ctx.core.playlists.save(name, &tracks)?;
    changed(ctx);
    Ok(Response::new())
}
