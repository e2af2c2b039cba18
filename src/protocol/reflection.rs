//! Reflection commands: what the server and this connection can do

use std::collections::BTreeSet;

use super::dispatcher::{Args, CommandRegistry, Context, HandlerResult, RegistryError};
use super::error::AckError;
use super::response::{Item, Response};

/// Commands that exist but are never advertised by `commands`
const UNLISTED: &[&str] = &[
    "command_list_begin",
    "command_list_end",
    "command_list_ok_begin",
    "config",
    "idle",
    "kill",
    "noidle",
    "sticker",
];

/// Commands nobody is allowed to use
const FORBIDDEN: &[&str] = &["config", "kill"];

const TAG_TYPES: &[&str] = &["Artist", "Album", "AlbumArtist", "Title", "Track", "Genre", "Date"];

pub fn register(registry: &mut CommandRegistry) -> Result<(), RegistryError> {
    registry.register_open("^commands$", commands)?;
    registry.register_open("^config$", config)?;
    registry.register("^decoders$", decoders)?;
    registry.register_open("^notcommands$", notcommands)?;
    registry.register("^tagtypes$", tagtypes)?;
    registry.register("^urlhandlers$", urlhandlers)?;
    Ok(())
}

fn commands(ctx: &mut Context<'_>, _args: &Args<'_>) -> HandlerResult {
    let authenticated = ctx.session.authenticated;
    Ok(ctx
        .registry
        .commands()
        .filter(|(name, auth_required)| {
            !UNLISTED.contains(name) && (authenticated || !auth_required)
        })
        .map(|(name, _)| Item::pair("command", name))
        .collect())
}

fn notcommands(ctx: &mut Context<'_>, _args: &Args<'_>) -> HandlerResult {
    let mut names: BTreeSet<&str> = FORBIDDEN.iter().copied().collect();
    if !ctx.session.authenticated {
        names.extend(
            ctx.registry
                .commands()
                .filter(|(_, auth_required)| *auth_required)
                .map(|(name, _)| name),
        );
    }
    Ok(names
        .into_iter()
        .map(|name| Item::pair("command", name))
        .collect())
}

fn config(_ctx: &mut Context<'_>, _args: &Args<'_>) -> HandlerResult {
    Err(AckError::permission("config"))
}

fn decoders(_ctx: &mut Context<'_>, _args: &Args<'_>) -> HandlerResult {
    Ok(Response::new())
}

fn tagtypes(_ctx: &mut Context<'_>, _args: &Args<'_>) -> HandlerResult {
    Ok(TAG_TYPES.iter().map(|tag| Item::pair("tagtype", tag)).collect())
}

fn urlhandlers(ctx: &mut Context<'_>, _args: &Args<'_>) -> HandlerResult {
    Ok(ctx
        .core
        .library
        .uri_schemes()
        .into_iter()
        .map(|scheme| Item::pair("handler", scheme))
        .collect())
}
