//! Command list markers
//!
//! Buffering and execution of the list itself happen in the dispatcher; these
//! handlers only open the list.

use super::dispatcher::{
    Args, CommandList, CommandRegistry, Context, HandlerResult, RegistryError, COMMAND_LIST_END,
};
use super::error::AckError;
use super::response::Response;

pub fn register(registry: &mut CommandRegistry) -> Result<(), RegistryError> {
    registry.register("^command_list_begin$", begin)?;
    registry.register("^command_list_ok_begin$", ok_begin)?;
    registry.register("^command_list_end$", end)?;
    Ok(())
}

fn open(ctx: &mut Context<'_>, list_ok: bool) -> HandlerResult {
    if ctx.session.in_command_list {
        return Err(AckError::arg("Nested command lists are not allowed"));
    }
    ctx.session.command_list = Some(CommandList {
        items: Vec::new(),
        list_ok,
    });
    Ok(Response::new())
}

fn begin(ctx: &mut Context<'_>, _args: &Args<'_>) -> HandlerResult {
    open(ctx, false)
}

fn ok_begin(ctx: &mut Context<'_>, _args: &Args<'_>) -> HandlerResult {
    open(ctx, true)
}

/// Only reached when no list is open
fn end(_ctx: &mut Context<'_>, _args: &Args<'_>) -> HandlerResult {
    Err(AckError::unknown_command(COMMAND_LIST_END))
}
