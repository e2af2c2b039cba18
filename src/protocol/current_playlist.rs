//! Current playlist (tracklist) commands

use super::dispatcher::{Args, CommandRegistry, Context, HandlerResult, RegistryError};
use super::error::AckError;
use super::format::{parse_range, track_items, tracklist_items};
use super::response::{Item, Response};
use crate::models::{Tlid, Track};

pub fn register(registry: &mut CommandRegistry) -> Result<(), RegistryError> {
    registry.register(r#"^add "(?P<uri>[^"]*)"$"#, add)?;
    registry.register(r#"^add (?P<uri>[^" ]+)$"#, add)?;
    registry.register(r#"^addid "(?P<uri>[^"]*)"( "?(?P<songpos>\d+)"?)?$"#, addid)?;
    registry.register(r#"^addid (?P<uri>[^" ]+)( "?(?P<songpos>\d+)"?)?$"#, addid)?;
    registry.register("^clear$", clear)?;
    registry.register(r#"^delete "?(?P<range>\d+:\d*)"?$"#, delete)?;
    registry.register(r#"^delete "?(?P<songpos>\d+)"?$"#, delete)?;
    registry.register(r#"^deleteid "?(?P<tlid>\d+)"?$"#, deleteid)?;
    registry.register(r#"^move "?(?P<range>\d+:\d*)"? "?(?P<to>\d+)"?$"#, move_range)?;
    registry.register(r#"^move "?(?P<songpos>\d+)"? "?(?P<to>\d+)"?$"#, move_range)?;
    registry.register(r#"^moveid "?(?P<tlid>\d+)"? "?(?P<to>\d+)"?$"#, moveid)?;
    registry.register("^playlist$", playlistinfo)?;
    registry.register(r#"^playlistfind "?(?P<tag>[^" ]+)"? "(?P<needle>[^"]+)"$"#, playlistfind)?;
    registry.register(r#"^playlistid( "?(?P<tlid>\d+)"?)?$"#, playlistid)?;
    registry.register("^playlistinfo$", playlistinfo)?;
    registry.register(r#"^playlistinfo "?(?P<range>\d+:\d*)"?$"#, playlistinfo)?;
    registry.register(r#"^playlistinfo "?(?P<songpos>-?\d+)"?$"#, playlistinfo)?;
    registry.register(r#"^playlistsearch "?(?P<tag>[^" ]+)"? "(?P<needle>[^"]+)"$"#, playlistsearch)?;
    registry.register(r#"^plchanges "?(?P<version>-?\d+)"?$"#, plchanges)?;
    registry.register(r#"^plchangesposid "?(?P<version>-?\d+)"?$"#, plchangesposid)?;
    registry.register("^shuffle$", shuffle)?;
    registry.register(r#"^shuffle "?(?P<range>\d+:\d*)"?$"#, shuffle)?;
    registry.register(r#"^swap "?(?P<pos1>\d+)"? "?(?P<pos2>\d+)"?$"#, swap)?;
    registry.register(r#"^swapid "?(?P<tlid1>\d+)"? "?(?P<tlid2>\d+)"?$"#, swapid)?;
    Ok(())
}

fn lookup(ctx: &Context<'_>, uri: &str) -> Result<Option<Track>, AckError> {
    Ok(ctx.core.library.lookup(uri)?)
}

/// Add a track. An empty URI adds nothing.
fn add(ctx: &mut Context<'_>, args: &Args<'_>) -> HandlerResult {
    let uri = args.required("uri")?;
    if uri.is_empty() {
        return Ok(Response::new());
    }
    let track = lookup(ctx, uri)?
        .ok_or_else(|| AckError::no_exist("directory or file not found"))?;
    ctx.core.add(vec![track], None)?;
    Ok(Response::new())
}

fn addid(ctx: &mut Context<'_>, args: &Args<'_>) -> HandlerResult {
    let uri = args.required("uri")?;
    let position: Option<usize> = args.parse("songpos")?;
    if uri.is_empty() {
        return Err(AckError::no_exist("No such song"));
    }
    let track = lookup(ctx, uri)?.ok_or_else(|| AckError::no_exist("No such song"))?;
    let added = ctx.core.add(vec![track], position)?;
    let mut response = Response::new();
    for entry in added {
        response.push_pair("Id", entry.tlid);
    }
    Ok(response)
}

fn clear(ctx: &mut Context<'_>, _args: &Args<'_>) -> HandlerResult {
    ctx.core.clear()?;
    Ok(Response::new())
}

/// Either `range` (`start:[end]`) or a single `songpos`
fn range_or_position(args: &Args<'_>) -> Result<(usize, Option<usize>), AckError> {
    match args.get("range") {
        Some(range) => parse_range(range),
        None => {
            let position: usize = args.int("songpos")?;
            let end = position
                .checked_add(1)
                .ok_or_else(|| AckError::arg("Bad song index"))?;
            Ok((position, Some(end)))
        }
    }
}

fn delete(ctx: &mut Context<'_>, args: &Args<'_>) -> HandlerResult {
    let (start, end) = range_or_position(args)?;
    ctx.core.remove_range(start, end)?;
    Ok(Response::new())
}

fn deleteid(ctx: &mut Context<'_>, args: &Args<'_>) -> HandlerResult {
    let tlid: Tlid = args.int("tlid")?;
    ctx.core.remove(tlid)?;
    Ok(Response::new())
}

fn move_range(ctx: &mut Context<'_>, args: &Args<'_>) -> HandlerResult {
    let (start, end) = range_or_position(args)?;
    let to: usize = args.int("to")?;
    let end = end.unwrap_or(ctx.core.tracklist.len());
    ctx.core.move_range(start, end, to)?;
    Ok(Response::new())
}

fn moveid(ctx: &mut Context<'_>, args: &Args<'_>) -> HandlerResult {
    let tlid: Tlid = args.int("tlid")?;
    let to: usize = args.int("to")?;
    let position = ctx
        .core
        .tracklist
        .index_of(tlid)
        .ok_or_else(|| AckError::no_exist("No such song"))?;
    ctx.core.move_range(position, position + 1, to)?;
    Ok(Response::new())
}

/// Strict match on the current playlist; only `filename` is supported
fn playlistfind(ctx: &mut Context<'_>, args: &Args<'_>) -> HandlerResult {
    if args.required("tag")? != "filename" {
        return Err(AckError::not_implemented());
    }
    let needle = args.required("needle")?;
    let response = ctx
        .core
        .tracklist
        .find_uri(needle)
        .into_iter()
        .next()
        .map(|(position, entry)| track_items(&entry.track, Some((position, entry))))
        .unwrap_or_default();
    Ok(Response::from(response))
}

fn playlistsearch(_ctx: &mut Context<'_>, _args: &Args<'_>) -> HandlerResult {
    Err(AckError::not_implemented())
}

fn playlistid(ctx: &mut Context<'_>, args: &Args<'_>) -> HandlerResult {
    let tracklist = &ctx.core.tracklist;
    match args.parse::<Tlid>("tlid")? {
        Some(tlid) => {
            let position = tracklist
                .index_of(tlid)
                .ok_or_else(|| AckError::no_exist("No such song"))?;
            let entry = &tracklist.entries()[position];
            Ok(Response::from(track_items(&entry.track, Some((position, entry)))))
        }
        None => Ok(Response::from(tracklist_items(tracklist.entries(), 0))),
    }
}

/// Whole list, one position (`-1` meaning the whole list) or a clamped range
fn playlistinfo(ctx: &mut Context<'_>, args: &Args<'_>) -> HandlerResult {
    let entries = ctx.core.tracklist.entries();
    let bad_index = || AckError::arg("Bad song index");

    if let Some(position) = args.parse::<i64>("songpos")? {
        if position == -1 {
            return Ok(Response::from(tracklist_items(entries, 0)));
        }
        let position = usize::try_from(position).map_err(|_| bad_index())?;
        let entry = entries.get(position).ok_or_else(bad_index)?;
        return Ok(Response::from(track_items(&entry.track, Some((position, entry)))));
    }

    let (start, end) = match args.get("range") {
        Some(range) => parse_range(range)?,
        None => (0, None),
    };
    if start > entries.len() {
        return Err(bad_index());
    }
    let end = end.unwrap_or(entries.len()).clamp(start, entries.len());
    Ok(Response::from(tracklist_items(&entries[start..end], start)))
}

fn plchanges(ctx: &mut Context<'_>, args: &Args<'_>) -> HandlerResult {
    let version: i64 = args.int("version")?;
    let changed = ctx.core.tracklist.changes_since(version);
    Ok(Response::from(tracklist_items(changed, 0)))
}

fn plchangesposid(ctx: &mut Context<'_>, args: &Args<'_>) -> HandlerResult {
    let version: i64 = args.int("version")?;
    let mut response = Response::new();
    for (position, entry) in ctx.core.tracklist.changes_since(version).iter().enumerate() {
        response.push_group(vec![Item::pair("cpos", position), Item::pair("Id", entry.tlid)]);
    }
    Ok(response)
}

fn shuffle(ctx: &mut Context<'_>, args: &Args<'_>) -> HandlerResult {
    let (start, end) = match args.get("range") {
        Some(range) => {
            let (start, end) = parse_range(range)?;
            (Some(start), end)
        }
        None => (None, None),
    };
    ctx.core.shuffle(start, end)?;
    Ok(Response::new())
}

fn swap(ctx: &mut Context<'_>, args: &Args<'_>) -> HandlerResult {
    ctx.core.swap(args.int("pos1")?, args.int("pos2")?)?;
    Ok(Response::new())
}

fn swapid(ctx: &mut Context<'_>, args: &Args<'_>) -> HandlerResult {
    ctx.core.swap_tlids(args.int("tlid1")?, args.int("tlid2")?)?;
    Ok(Response::new())
}
