//! Status queries and change notification: status, currentsong, stats, idle

use chrono::Utc;
use std::collections::BTreeSet;

use super::dispatcher::{Args, CommandRegistry, Context, HandlerResult, RegistryError};
use super::error::AckError;
use super::format::{self, track_items};
use super::response::{Item, Response};
use crate::bus::Subsystem;
use crate::engine::PlaybackState;

pub fn register(registry: &mut CommandRegistry) -> Result<(), RegistryError> {
    registry.register("^clearerror$", clearerror)?;
    registry.register("^currentsong$", currentsong)?;
    registry.register("^idle$", idle)?;
    registry.register("^idle (?P<subsystems>.+)$", idle)?;
    registry.register("^noidle$", noidle)?;
    registry.register("^stats$", stats)?;
    registry.register("^status$", status)?;
    Ok(())
}

fn clearerror(_ctx: &mut Context<'_>, _args: &Args<'_>) -> HandlerResult {
    Err(AckError::not_implemented())
}

fn currentsong(ctx: &mut Context<'_>, _args: &Args<'_>) -> HandlerResult {
    let core = &*ctx.core;
    let Some(position) = core.current_position() else {
        return Ok(Response::new());
    };
    let response = core
        .tracklist
        .at(position)
        .map(|entry| track_items(&entry.track, Some((position, entry))))
        .unwrap_or_default();
    Ok(Response::from(response))
}

/// Subscribe to subsystems and wait for changes.
///
/// Pending matches are answered at once. Otherwise the session is left
/// idling and the connection loop waits for the bus.
fn idle(ctx: &mut Context<'_>, args: &Args<'_>) -> HandlerResult {
    if ctx.session.in_command_list {
        return Err(AckError::arg("idle is not allowed in command lists"));
    }

    let wanted: BTreeSet<Subsystem> = match args.get("subsystems") {
        None => Subsystem::ALL.iter().copied().collect(),
        Some(raw) => format::tokenize(raw)?
            .iter()
            .filter_map(|name| match name.parse::<Subsystem>() {
                Ok(subsystem) => Some(subsystem),
                Err(e) => {
                    tracing::debug!("Ignoring idle subsystem: {}", e);
                    None
                }
            })
            .collect(),
    };
    ctx.session.subscriptions.extend(wanted);

    let changed = ctx.session.mailbox.take_matching(&ctx.session.subscriptions);
    if changed.is_empty() {
        return Ok(Response::new());
    }
    ctx.session.end_idle();
    Ok(changed_response(&changed))
}

/// `changed:` lines for collected subsystems
pub fn changed_response(changed: &[Subsystem]) -> Response {
    changed
        .iter()
        .map(|subsystem| Item::pair("changed", subsystem))
        .collect()
}

fn noidle(ctx: &mut Context<'_>, _args: &Args<'_>) -> HandlerResult {
    ctx.session.end_idle();
    Ok(Response::new())
}

fn stats(ctx: &mut Context<'_>, _args: &Args<'_>) -> HandlerResult {
    let core = &*ctx.core;
    let tracks = core.library.tracks()?;

    let artists: BTreeSet<&str> = tracks
        .iter()
        .flat_map(|track| track.artists.iter().map(String::as_str))
        .collect();
    let albums: BTreeSet<&str> = tracks.iter().filter_map(|track| track.album_name()).collect();
    let db_playtime: u64 = tracks.iter().filter_map(|track| track.length).sum::<u64>() / 1000;
    let uptime = core.uptime().as_secs();
    let db_update = Utc::now().timestamp() - uptime as i64;

    Ok(Response::new()
        .pair("artists", artists.len())
        .pair("albums", albums.len())
        .pair("songs", tracks.len())
        .pair("uptime", uptime)
        .pair("db_playtime", db_playtime)
        .pair("db_update", db_update)
        .pair("playtime", core.playback.play_time().as_secs()))
}

fn flag(value: bool) -> u8 {
    u8::from(value)
}

fn status(ctx: &mut Context<'_>, _args: &Args<'_>) -> HandlerResult {
    let next = ctx.core.playback.peek_next(&ctx.core.tracklist);
    let core = &*ctx.core;
    let playback = &core.playback;
    let state = playback.state();

    let mut response = Response::new()
        .pair("volume", core.volume())
        .pair("repeat", flag(playback.repeat()))
        .pair("random", flag(playback.random()))
        .pair("single", flag(playback.single()))
        .pair("consume", flag(playback.consume()))
        .pair("playlist", core.tracklist.version())
        .pair("playlistlength", core.tracklist.len())
        .pair("xfade", 0)
        .pair("state", state.as_str());

    let current = core.current_position().and_then(|position| {
        core.tracklist.at(position).map(|entry| (position, entry))
    });
    if let Some((position, entry)) = current {
        response.push_pair("song", position);
        response.push_pair("songid", entry.tlid);
    }

    if let Some(next) = next {
        if let Some(position) = core.tracklist.index_of(next) {
            response.push_pair("nextsong", position);
            response.push_pair("nextsongid", next);
        }
    }

    if matches!(state, PlaybackState::Playing | PlaybackState::Paused) {
        let elapsed = playback.time_position();
        let track = current.map(|(_, entry)| &entry.track);
        let length = track.and_then(|track| track.length).unwrap_or(0);
        response.push_pair("time", format!("{}:{}", elapsed / 1000, length / 1000));
        response.push_pair("elapsed", format!("{:.3}", elapsed as f64 / 1000.0));
        response.push_pair("bitrate", track.and_then(|track| track.bitrate).unwrap_or(0));
    }

    Ok(response)
}
