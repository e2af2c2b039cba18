//! Audio output commands. There is a single output with id 0.

use super::dispatcher::{Args, CommandRegistry, Context, HandlerResult, RegistryError};
use super::error::AckError;
use super::response::Response;
use crate::engine::OUTPUT_NAME;

pub fn register(registry: &mut CommandRegistry) -> Result<(), RegistryError> {
    registry.register(r#"^disableoutput "?(?P<outputid>\d+)"?$"#, disableoutput)?;
    registry.register(r#"^enableoutput "?(?P<outputid>\d+)"?$"#, enableoutput)?;
    registry.register("^outputs$", outputs)?;
    Ok(())
}

fn set_enabled(ctx: &mut Context<'_>, args: &Args<'_>, enabled: bool) -> HandlerResult {
    let id: u32 = args.int("outputid")?;
    if id != 0 {
        return Err(AckError::no_exist("No such audio output"));
    }
    ctx.core.set_output_enabled(enabled);
    Ok(Response::new())
}

fn disableoutput(ctx: &mut Context<'_>, args: &Args<'_>) -> HandlerResult {
    set_enabled(ctx, args, false)
}

fn enableoutput(ctx: &mut Context<'_>, args: &Args<'_>) -> HandlerResult {
    set_enabled(ctx, args, true)
}

fn outputs(ctx: &mut Context<'_>, _args: &Args<'_>) -> HandlerResult {
    Ok(Response::new()
        .pair("outputid", 0)
        .pair("outputname", OUTPUT_NAME)
        .pair("outputenabled", u8::from(ctx.core.output_enabled())))
}
