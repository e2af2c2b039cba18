//! Playback control commands

use super::dispatcher::{Args, CommandRegistry, Context, HandlerResult, RegistryError};
use super::error::AckError;
use super::response::Response;
use crate::engine::{Core, PlaybackState};

pub fn register(registry: &mut CommandRegistry) -> Result<(), RegistryError> {
    registry.register(r#"^consume "?(?P<state>[01])"?$"#, consume)?;
    registry.register(r#"^crossfade "?(?P<seconds>\d+)"?$"#, not_implemented)?;
    registry.register("^next$", next)?;
    registry.register("^pause$", pause)?;
    registry.register(r#"^pause "?(?P<state>[01])"?$"#, pause)?;
    registry.register("^play$", play)?;
    registry.register(r#"^play "?(?P<songpos>-?\d+)"?$"#, play)?;
    registry.register(r#"^playid "?(?P<tlid>-?\d+)"?$"#, playid)?;
    registry.register("^previous$", previous)?;
    registry.register(r#"^random "?(?P<state>[01])"?$"#, random)?;
    registry.register(r#"^repeat "?(?P<state>[01])"?$"#, repeat)?;
    registry.register(r#"^replay_gain_mode "?(?P<mode>off|track|album|auto)"?$"#, not_implemented)?;
    registry.register("^replay_gain_status$", replay_gain_status)?;
    registry.register(r#"^seek "?(?P<songpos>\d+)"? "?(?P<seconds>\d+)"?$"#, seek)?;
    registry.register(r#"^seekid "?(?P<tlid>\d+)"? "?(?P<seconds>\d+)"?$"#, seekid)?;
    registry.register(r#"^seekcur "?(?P<position>\d+)"?$"#, seekcur)?;
    registry.register(r#"^seekcur "?(?P<diff>[-+]\d+)"?$"#, seekcur)?;
    registry.register(r#"^setvol "?(?P<volume>[-+]*\d+)"?$"#, setvol)?;
    registry.register(r#"^single "?(?P<state>[01])"?$"#, single)?;
    registry.register("^stop$", stop)?;
    Ok(())
}

fn not_implemented(_ctx: &mut Context<'_>, _args: &Args<'_>) -> HandlerResult {
    Err(AckError::not_implemented())
}

fn state_flag(args: &Args<'_>) -> Result<bool, AckError> {
    args.flag("state")?
        .ok_or_else(|| AckError::arg("missing argument: state"))
}

fn consume(ctx: &mut Context<'_>, args: &Args<'_>) -> HandlerResult {
    ctx.core.playback.set_consume(state_flag(args)?);
    Ok(Response::new())
}

fn random(ctx: &mut Context<'_>, args: &Args<'_>) -> HandlerResult {
    ctx.core.set_random(state_flag(args)?);
    Ok(Response::new())
}

fn repeat(ctx: &mut Context<'_>, args: &Args<'_>) -> HandlerResult {
    ctx.core.playback.set_repeat(state_flag(args)?);
    Ok(Response::new())
}

fn single(ctx: &mut Context<'_>, args: &Args<'_>) -> HandlerResult {
    ctx.core.playback.set_single(state_flag(args)?);
    Ok(Response::new())
}

fn next(ctx: &mut Context<'_>, _args: &Args<'_>) -> HandlerResult {
    ctx.core.next()?;
    Ok(Response::new())
}

fn previous(ctx: &mut Context<'_>, _args: &Args<'_>) -> HandlerResult {
    ctx.core.previous()?;
    Ok(Response::new())
}

fn stop(ctx: &mut Context<'_>, _args: &Args<'_>) -> HandlerResult {
    ctx.core.playback.stop()?;
    Ok(Response::new())
}

/// `pause` toggles; `pause 1` pauses; `pause 0` resumes
fn pause(ctx: &mut Context<'_>, args: &Args<'_>) -> HandlerResult {
    let playback = &mut ctx.core.playback;
    let pause = match args.flag("state")? {
        Some(value) => value,
        None => playback.state() == PlaybackState::Playing,
    };
    if pause {
        playback.pause()?;
    } else {
        playback.resume()?;
    }
    Ok(Response::new())
}

/// Position `-1`: keep playing, resume, replay the current entry or start
/// from the top.
fn play_current_or_first(core: &mut Core) -> Result<(), AckError> {
    match core.playback.state() {
        PlaybackState::Playing => Ok(()),
        PlaybackState::Paused => Ok(core.playback.resume()?),
        PlaybackState::Stopped => {
            let target = core
                .current()
                .or_else(|| core.tracklist.at(0))
                .map(|entry| entry.tlid);
            match target {
                Some(tlid) => Ok(core.play(Some(tlid))?),
                None => Ok(()),
            }
        }
    }
}

fn play(ctx: &mut Context<'_>, args: &Args<'_>) -> HandlerResult {
    match args.parse::<i64>("songpos")? {
        None => ctx.core.play(None)?,
        Some(-1) => play_current_or_first(ctx.core)?,
        Some(position) => {
            let tlid = usize::try_from(position)
                .ok()
                .and_then(|position| ctx.core.tracklist.at(position))
                .map(|entry| entry.tlid)
                .ok_or_else(|| AckError::arg("Bad song index"))?;
            ctx.core.play(Some(tlid))?;
        }
    }
    Ok(Response::new())
}

fn playid(ctx: &mut Context<'_>, args: &Args<'_>) -> HandlerResult {
    match args.int::<i64>("tlid")? {
        -1 => play_current_or_first(ctx.core)?,
        tlid => {
            let tlid = u32::try_from(tlid).map_err(|_| AckError::no_exist("No such song"))?;
            ctx.core.play(Some(tlid))?;
        }
    }
    Ok(Response::new())
}

fn replay_gain_status(_ctx: &mut Context<'_>, _args: &Args<'_>) -> HandlerResult {
    Ok(Response::new().pair("replay_gain_mode", "off"))
}

fn seek(ctx: &mut Context<'_>, args: &Args<'_>) -> HandlerResult {
    let position: usize = args.int("songpos")?;
    let seconds: i64 = args.int("seconds")?;
    let tlid = ctx
        .core
        .tracklist
        .at(position)
        .map(|entry| entry.tlid)
        .ok_or_else(|| AckError::arg("Bad song index"))?;
    ctx.core.seek_in(tlid, seconds.saturating_mul(1000))?;
    Ok(Response::new())
}

fn seekid(ctx: &mut Context<'_>, args: &Args<'_>) -> HandlerResult {
    let tlid: u32 = args.int("tlid")?;
    let seconds: i64 = args.int("seconds")?;
    if !ctx.core.tracklist.contains(tlid) {
        return Err(AckError::no_exist("No such song"));
    }
    ctx.core.seek_in(tlid, seconds.saturating_mul(1000))?;
    Ok(Response::new())
}

/// Absolute position, or `+n` / `-n` seconds relative to the current one
fn seekcur(ctx: &mut Context<'_>, args: &Args<'_>) -> HandlerResult {
    let position_ms = match args.get("diff") {
        Some(diff) => {
            let diff: i64 = diff
                .trim_start_matches('+')
                .parse()
                .map_err(|_| AckError::arg(format!("Integer expected: {}", diff)))?;
            (ctx.core.playback.time_position() as i64).saturating_add(diff.saturating_mul(1000))
        }
        None => args.int::<i64>("position")?.saturating_mul(1000),
    };
    ctx.core.seek(position_ms)?;
    Ok(Response::new())
}

fn setvol(ctx: &mut Context<'_>, args: &Args<'_>) -> HandlerResult {
    let raw = args.required("volume")?;
    // clients send things like "+-5"; only the last sign counts
    let digits = raw.trim_start_matches(['+', '-']);
    let negative = raw[..raw.len() - digits.len()].ends_with('-');
    let magnitude: i64 = digits.parse().unwrap_or(i64::MAX);
    ctx.core.set_volume(if negative { -magnitude } else { magnitude });
    Ok(Response::new())
}
