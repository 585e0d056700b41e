//! In-memory [`Host`](crate::host::Host) for tests and the demo server.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tracing::{debug, warn};

use crate::error::{CommandError, Result};
use crate::host::{
    BehaviorDescriptor, ObjectHandle, ParamFrame, ParamKind, ParamSlot, ParamValue, Reflection, World,
};

type BehaviorFn = Arc<dyn Fn(&mut ParamFrame) -> Result<()> + Send + Sync>;

struct SceneBehavior {
    descriptor: BehaviorDescriptor,
    body: BehaviorFn,
}

#[derive(Default)]
struct SceneObject {
    behaviors: HashMap<String, SceneBehavior>,
}

/// A scene of named objects whose behaviors are closures over a [`ParamFrame`].
///
/// Console commands are recorded rather than executed.
pub struct SceneHost {
    objects: Mutex<HashMap<String, SceneObject>>,
    console: Mutex<Vec<String>>,
    controller_active: AtomicBool,
    world: Option<(String, String)>,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

impl SceneHost {
    pub const PERSISTENT_LEVEL: &'static str = "PersistentLevel";
    pub const LEVEL_SCRIPT_ACTOR: &'static str = "LevelScriptActor_0";

    /// An empty scene with a loaded world and an active controller.
    pub fn new() -> Self {
        Self::build(Some((
            Self::PERSISTENT_LEVEL.to_string(),
            Self::LEVEL_SCRIPT_ACTOR.to_string(),
        )))
    }

    /// A scene with no world loaded: the level queries fail.
    pub fn without_world() -> Self {
        Self::build(None)
    }

    fn build(world: Option<(String, String)>) -> Self {
        Self {
            objects: Mutex::default(),
            console: Mutex::default(),
            controller_active: AtomicBool::new(true),
            world,
        }
    }

    /// Add an object with no behaviors. Existing objects are kept.
    pub fn add_object(&self, id: impl Into<String>) {
        lock(&self.objects).entry(id.into()).or_default();
    }

    pub fn remove_object(&self, id: &str) -> bool {
        lock(&self.objects).remove(id).is_some()
    }

    /// Attach a behavior to an existing object. Returns false if there is no
    /// such object.
    pub fn add_behavior(
        &self,
        id: &str,
        descriptor: BehaviorDescriptor,
        body: impl Fn(&mut ParamFrame) -> Result<()> + Send + Sync + 'static,
    ) -> bool {
        let mut objects = lock(&self.objects);
        let Some(object) = objects.get_mut(id) else {
            return false;
        };
        object.behaviors.insert(
            descriptor.name.clone(),
            SceneBehavior {
                descriptor,
                body: Arc::new(body),
            },
        );
        true
    }

    pub fn set_controller_active(&self, active: bool) {
        self.controller_active.store(active, Ordering::SeqCst);
    }

    /// Console commands received so far, oldest first.
    pub fn console_log(&self) -> Vec<String> {
        lock(&self.console).clone()
    }

    /// A small scene for trying the protocol by hand.
    ///
    /// `Robot` has `SetSpeed(Speed: float)`, `GetSpeed() -> float`,
    /// `GetStatus() -> str`, `Echo(Text: str) -> str` and
    /// `Move(Distance: float, Speed: float = 1) -> (Arrived: bool, Eta: float)`.
    /// The level script actor has `cheat(Command: str)`, which forwards to the
    /// console.
    pub fn demo() -> Arc<Self> {
        let host = Arc::new(Self::new());
        let speed = Arc::new(Mutex::new(0.0_f64));

        host.add_object("Robot");
        let state = Arc::clone(&speed);
        host.add_behavior(
            "Robot",
            BehaviorDescriptor::new("SetSpeed").param(ParamSlot::input("Speed", ParamKind::Float)),
            move |frame| {
                let value = frame.get("Speed").and_then(ParamValue::as_float).unwrap_or_default();
                *lock(&state) = value;
                Ok(())
            },
        );
        let state = Arc::clone(&speed);
        host.add_behavior(
            "Robot",
            BehaviorDescriptor::new("GetSpeed").param(ParamSlot::returns(ParamKind::Float)),
            move |frame| {
                frame.set_return(ParamValue::Float(*lock(&state)));
                Ok(())
            },
        );
        host.add_behavior(
            "Robot",
            BehaviorDescriptor::new("GetStatus").param(ParamSlot::returns(ParamKind::Str)),
            |frame| {
                frame.set_return(ParamValue::Str("Ready".to_string()));
                Ok(())
            },
        );
        host.add_behavior(
            "Robot",
            BehaviorDescriptor::new("Echo")
                .param(ParamSlot::input("Text", ParamKind::Str))
                .param(ParamSlot::returns(ParamKind::Str)),
            |frame| {
                let text = frame.get("Text").cloned().unwrap_or(ParamValue::Unsupported);
                frame.set_return(text);
                Ok(())
            },
        );
        host.add_behavior(
            "Robot",
            BehaviorDescriptor::new("Move")
                .param(ParamSlot::input("Distance", ParamKind::Float))
                .param(ParamSlot::input("Speed", ParamKind::Float).with_default("1"))
                .param(ParamSlot::output("Arrived", ParamKind::Bool))
                .param(ParamSlot::output("Eta", ParamKind::Float)),
            |frame| {
                let distance = frame.get("Distance").and_then(ParamValue::as_float).unwrap_or_default();
                let speed = frame.get("Speed").and_then(ParamValue::as_float).unwrap_or_default();
                if speed <= 0.0 {
                    return Err(CommandError::Failed("speed must be positive".to_string()));
                }
                frame.set("Arrived", ParamValue::Bool(distance == 0.0));
                frame.set("Eta", ParamValue::Float(distance / speed));
                Ok(())
            },
        );

        host.add_object(Self::LEVEL_SCRIPT_ACTOR);
        let console = Arc::downgrade(&host);
        host.add_behavior(
            Self::LEVEL_SCRIPT_ACTOR,
            BehaviorDescriptor::new("cheat").param(ParamSlot::input("Command", ParamKind::Str)),
            move |frame| {
                let command = frame.get("Command").and_then(ParamValue::as_str).unwrap_or_default();
                match console.upgrade() {
                    Some(host) => {
                        host.console_command(&format!("cheat {command}"));
                        Ok(())
                    }
                    None => Err(CommandError::Failed("scene is gone".to_string())),
                }
            },
        );

        host
    }

    fn behavior_body(&self, object: &ObjectHandle, name: &str) -> Option<BehaviorFn> {
        lock(&self.objects)
            .get(object.id())
            .and_then(|o| o.behaviors.get(name))
            .map(|b| Arc::clone(&b.body))
    }
}

impl Default for SceneHost {
    fn default() -> Self {
        Self::new()
    }
}

impl Reflection for SceneHost {
    fn resolve_object(&self, id: &str) -> Option<ObjectHandle> {
        lock(&self.objects)
            .contains_key(id)
            .then(|| ObjectHandle::new(id))
    }

    fn find_behavior(&self, object: &ObjectHandle, name: &str) -> Option<BehaviorDescriptor> {
        lock(&self.objects)
            .get(object.id())
            .and_then(|o| o.behaviors.get(name))
            .map(|b| b.descriptor.clone())
    }

    fn invoke(&self, object: &ObjectHandle, behavior: &BehaviorDescriptor, frame: &mut ParamFrame) -> Result<()> {
        // Run the body without the scene lock held; it may call back into the scene.
        let body = self.behavior_body(object, &behavior.name).ok_or_else(|| {
            CommandError::Failed(format!("Can not find actor with id '{}'", object.id()))
        })?;
        debug!(object = %object, behavior = %behavior.name, "invoking behavior");
        body(frame)
    }
}

impl World for SceneHost {
    fn console_command(&self, command: &str) {
        if !self.controller_active.load(Ordering::SeqCst) {
            warn!(command, "no active player controller, console command dropped");
            return;
        }
        debug!(command, "console command");
        lock(&self.console).push(command.to_string());
    }

    fn persistent_level_id(&self) -> Option<String> {
        self.world.as_ref().map(|(level, _)| level.clone())
    }

    fn level_script_actor_id(&self) -> Option<String> {
        self.world.as_ref().map(|(_, actor)| actor.clone())
    }
}
