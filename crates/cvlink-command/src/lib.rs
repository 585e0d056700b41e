//! Text command layer for cvlink.
//!
//! A [`CommandRegistry`] maps signatures such as `vexec [str] [str]` to
//! handlers keyed by name and exact argument count. The alias commands in
//! [`handlers`] drive a [`Host`] through the reflective invocation engine in
//! [`invoke`]: resolve an object by id, look up a behavior by name, marshal
//! the remaining text into typed parameter slots, call it, and report its
//! outputs as a JSON result map.

pub mod error;
pub mod handlers;
pub mod host;
pub mod invoke;
pub mod registry;
pub mod reply;
pub mod scene;
pub mod tokenize;

pub use error::{CommandError, RegistryError, Result};
pub use handlers::register_alias_commands;
pub use host::{
    BehaviorDescriptor, Host, ObjectHandle, ParamDirection, ParamFrame, ParamKind, ParamSlot, ParamValue,
    Reflection, World,
};
pub use invoke::{call_with_arguments, fire_and_acknowledge, fire_and_capture, ResultMap};
pub use registry::{CommandRegistry, Handler, Registration};
pub use reply::{render, Reply};
pub use scene::SceneHost;
pub use tokenize::{join_tokens, next_token, tokenize};
