//! Connection commands: close, kill, password, ping

use super::dispatcher::{Args, CommandRegistry, Context, HandlerResult, RegistryError};
use super::error::AckError;
use super::response::Response;

pub fn register(registry: &mut CommandRegistry) -> Result<(), RegistryError> {
    registry.register_open("^close$", close)?;
    registry.register("^kill$", kill)?;
    registry.register_open(r#"^password "(?P<password>[^"]+)"$"#, password)?;
    registry.register_open(r#"^password (?P<password>\S+)$"#, password)?;
    registry.register_open("^ping$", ping)?;
    Ok(())
}

/// Close the connection without a response
fn close(ctx: &mut Context<'_>, _args: &Args<'_>) -> HandlerResult {
    ctx.session.close_requested = true;
    Ok(Response::new())
}

/// Stopping the server from a client is never allowed
fn kill(_ctx: &mut Context<'_>, _args: &Args<'_>) -> HandlerResult {
    Err(AckError::permission("kill"))
}

fn password(ctx: &mut Context<'_>, args: &Args<'_>) -> HandlerResult {
    let given = args.required("password")?;
    if ctx.password == Some(given) {
        ctx.session.authenticated = true;
        tracing::debug!("Client authenticated");
        Ok(Response::new())
    } else {
        Err(AckError::password())
    }
}

fn ping(_ctx: &mut Context<'_>, _args: &Args<'_>) -> HandlerResult {
    Ok(Response::new())
}
