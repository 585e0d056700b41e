use std::sync::Arc;

use tracing::info;

use crate::error::{CommandError, RegistryError};
use crate::host::Host;
use crate::invoke::{fire_and_acknowledge, fire_and_capture};
use crate::registry::CommandRegistry;
use crate::reply::Reply;

/// Argument counts accepted by `vrun`: one to six console tokens.
pub const VRUN_ARITIES: std::ops::RangeInclusive<usize> = 1..=6;
/// Argument counts accepted by `vexec`: id, behavior and up to seven more.
pub const VEXEC_ARITIES: std::ops::RangeInclusive<usize> = 2..=9;
/// Argument counts accepted by `vbp`: id, behavior and up to nine more.
pub const VBP_ARITIES: std::ops::RangeInclusive<usize> = 2..=11;

/// Register the alias commands that drive `host`:
///
/// - `vrun <console tokens...>` runs a console command on the active controller
/// - `vexec <id> <behavior> [args...]` calls a behavior and acknowledges
/// - `vbp <id> <behavior> [args...]` calls a behavior and replies with its outputs as JSON
/// - `vget /persistent_level/id` and `vget /persistent_level/level_script_actor/id`
pub fn register_alias_commands(
    registry: &mut CommandRegistry,
    host: Arc<dyn Host>,
) -> Result<(), RegistryError> {
    let world = Arc::clone(&host);
    registry.bind_arities("vrun", VRUN_ARITIES, "Run a built-in console command", move |args| {
        let command = args.join(" ");
        info!(command = %command, "console command");
        world.console_command(&command);
        Ok(Reply::ok())
    })?;

    let reflection = Arc::clone(&host);
    registry.bind_arities(
        "vexec",
        VEXEC_ARITIES,
        "Call a behavior on an object: vexec <id> <behavior> [args...]",
        move |args| fire_and_acknowledge(&*reflection, &args[0], &args[1..]),
    )?;

    let reflection = Arc::clone(&host);
    registry.bind_arities(
        "vbp",
        VBP_ARITIES,
        "Call a behavior and return its outputs as JSON: vbp <id> <behavior> [args...]",
        move |args| fire_and_capture(&*reflection, &args[0], &args[1..]),
    )?;

    let world = Arc::clone(&host);
    registry.bind(
        "vget /persistent_level/id",
        "Get the persistent level id, to call behaviors defined on it",
        move |_| world_id(world.persistent_level_id()),
    )?;

    registry.bind(
        "vget /persistent_level/level_script_actor/id",
        "Get the level script actor id, to call behaviors defined on it",
        move |_| world_id(host.level_script_actor_id()),
    )?;

    Ok(())
}

fn world_id(id: Option<String>) -> crate::Result<Reply> {
    id.map(Reply::with_body)
        .ok_or_else(|| CommandError::Failed("The world is invalid".to_string()))
}
