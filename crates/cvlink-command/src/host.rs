//! Capabilities the command layer needs from the embedding host.
//!
//! The invocation engine never sees the host's object model. It resolves ids
//! to [`ObjectHandle`]s, asks for a [`BehaviorDescriptor`] by name, fills a
//! [`ParamFrame`] and hands it back to [`Reflection::invoke`].

use std::fmt;

use crate::error::Result;

/// Opaque reference to a live host object, valid for one invocation.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ObjectHandle {
    id: String,
}

impl ObjectHandle {
    pub fn new(id: impl Into<String>) -> Self {
        Self { id: id.into() }
    }

    pub fn id(&self) -> &str {
        &self.id
    }
}

impl fmt::Display for ObjectHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.id)
    }
}

/// Declared type category of a parameter slot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParamKind {
    Str,
    Int,
    Float,
    Bool,
    /// Any other host type, by name. Cannot be marshaled from text.
    Other(String),
}

/// How a slot participates in a call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParamDirection {
    /// Filled from the command text.
    In,
    /// Written by the behavior, reported back.
    Out,
    /// Passed by reference: not filled from text, reported back.
    Ref,
    /// The behavior's return value.
    Return,
}

impl ParamDirection {
    /// Whether the slot's value ends up in the result map.
    pub fn is_output(self) -> bool {
        !matches!(self, ParamDirection::In)
    }
}

/// One argument or return value of a behavior.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParamSlot {
    pub name: String,
    pub kind: ParamKind,
    pub direction: ParamDirection,
    /// Textual default used when the command supplies no value.
    pub default: Option<String>,
}

impl ParamSlot {
    /// Conventional name of the return slot.
    pub const RETURN_NAME: &'static str = "ReturnValue";

    pub fn input(name: impl Into<String>, kind: ParamKind) -> Self {
        Self::new(name, kind, ParamDirection::In)
    }

    pub fn output(name: impl Into<String>, kind: ParamKind) -> Self {
        Self::new(name, kind, ParamDirection::Out)
    }

    pub fn reference(name: impl Into<String>, kind: ParamKind) -> Self {
        Self::new(name, kind, ParamDirection::Ref)
    }

    pub fn returns(kind: ParamKind) -> Self {
        Self::new(Self::RETURN_NAME, kind, ParamDirection::Return)
    }

    pub fn with_default(mut self, default: impl Into<String>) -> Self {
        self.default = Some(default.into());
        self
    }

    fn new(name: impl Into<String>, kind: ParamKind, direction: ParamDirection) -> Self {
        Self {
            name: name.into(),
            kind,
            direction,
            default: None,
        }
    }
}

/// A named behavior and its parameter slots in declaration order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BehaviorDescriptor {
    pub name: String,
    pub params: Vec<ParamSlot>,
}

impl BehaviorDescriptor {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            params: Vec::new(),
        }
    }

    /// Append a slot.
    pub fn param(mut self, slot: ParamSlot) -> Self {
        self.params.push(slot);
        self
    }

    pub fn parameter_slots(&self) -> &[ParamSlot] {
        &self.params
    }

    /// Index of the last slot in declaration order that is not the return value.
    pub fn last_parameter(&self) -> Option<usize> {
        self.params
            .iter()
            .rposition(|slot| slot.direction != ParamDirection::Return)
    }
}

/// A marshaled parameter value.
#[derive(Debug, Clone, PartialEq)]
pub enum ParamValue {
    Str(String),
    Int(i64),
    Float(f64),
    Bool(bool),
    /// Host type without a text conversion.
    Unsupported,
}

impl ParamValue {
    /// The zero value for a slot of `kind`.
    pub fn zeroed(kind: &ParamKind) -> Self {
        match kind {
            ParamKind::Str => ParamValue::Str(String::new()),
            ParamKind::Int => ParamValue::Int(0),
            ParamKind::Float => ParamValue::Float(0.0),
            ParamKind::Bool => ParamValue::Bool(false),
            ParamKind::Other(_) => ParamValue::Unsupported,
        }
    }

    /// Convert command text into a value of `kind`. `None` if it doesn't parse.
    pub fn parse(kind: &ParamKind, text: &str) -> Option<Self> {
        match kind {
            ParamKind::Str => Some(ParamValue::Str(text.to_string())),
            ParamKind::Int => text.trim().parse().ok().map(ParamValue::Int),
            ParamKind::Float => text.trim().parse().ok().map(ParamValue::Float),
            ParamKind::Bool => match text.trim().to_ascii_lowercase().as_str() {
                "true" | "1" => Some(ParamValue::Bool(true)),
                "false" | "0" => Some(ParamValue::Bool(false)),
                _ => None,
            },
            ParamKind::Other(_) => None,
        }
    }

    /// Text form used in the result map. `None` for unsupported values.
    ///
    /// Floats use the shortest representation that round-trips.
    pub fn to_text(&self) -> Option<String> {
        match self {
            ParamValue::Str(s) => Some(s.clone()),
            ParamValue::Int(i) => Some(i.to_string()),
            ParamValue::Float(f) => Some(f.to_string()),
            ParamValue::Bool(b) => Some(if *b { "true" } else { "false" }.to_string()),
            ParamValue::Unsupported => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            ParamValue::Str(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            ParamValue::Int(i) => Some(*i),
            _ => None,
        }
    }

    pub fn as_float(&self) -> Option<f64> {
        match self {
            ParamValue::Float(f) => Some(*f),
            ParamValue::Int(i) => Some(*i as f64),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            ParamValue::Bool(b) => Some(*b),
            _ => None,
        }
    }
}

/// Scratch storage for one call: one value per slot, zeroed up front.
///
/// Owned by the invocation engine for the duration of a single call; every
/// value is released when the frame drops, whichever path the call took.
#[derive(Debug, Clone, PartialEq)]
pub struct ParamFrame {
    names: Vec<String>,
    values: Vec<ParamValue>,
}

impl ParamFrame {
    pub fn new(behavior: &BehaviorDescriptor) -> Self {
        Self {
            names: behavior.params.iter().map(|slot| slot.name.clone()).collect(),
            values: behavior
                .params
                .iter()
                .map(|slot| ParamValue::zeroed(&slot.kind))
                .collect(),
        }
    }

    pub fn get(&self, name: &str) -> Option<&ParamValue> {
        self.position(name).map(|idx| &self.values[idx])
    }

    /// Overwrite the slot called `name`. Returns false if there is none.
    pub fn set(&mut self, name: &str, value: ParamValue) -> bool {
        match self.position(name) {
            Some(idx) => {
                self.values[idx] = value;
                true
            }
            None => false,
        }
    }

    /// Shortcut for setting [`ParamSlot::RETURN_NAME`].
    pub fn set_return(&mut self, value: ParamValue) -> bool {
        self.set(ParamSlot::RETURN_NAME, value)
    }

    pub fn value(&self, index: usize) -> Option<&ParamValue> {
        self.values.get(index)
    }

    pub(crate) fn set_index(&mut self, index: usize, value: ParamValue) {
        if let Some(slot) = self.values.get_mut(index) {
            *slot = value;
        }
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    fn position(&self, name: &str) -> Option<usize> {
        self.names.iter().position(|n| n == name)
    }
}

/// Object lookup and behavior invocation.
pub trait Reflection {
    /// Resolve `id` against the live object set.
    fn resolve_object(&self, id: &str) -> Option<ObjectHandle>;

    /// Look up a behavior by name on a resolved object.
    fn find_behavior(&self, object: &ObjectHandle, name: &str) -> Option<BehaviorDescriptor>;

    /// Run `behavior` with the arguments in `frame`; outputs are written back
    /// into the same frame.
    fn invoke(
        &self,
        object: &ObjectHandle,
        behavior: &BehaviorDescriptor,
        frame: &mut ParamFrame,
    ) -> Result<()>;

    /// Call a behavior from a `"<name> <args...>"` command string.
    ///
    /// Hosts with their own dynamic-call facility may override this; the
    /// default marshals through [`crate::invoke::call_with_arguments`].
    fn call_by_name(&self, object: &ObjectHandle, command: &str) -> bool {
        crate::invoke::call_by_name(self, object, command)
    }
}

/// World-level queries and the console.
pub trait World {
    /// Execute a console command on the first active controller.
    ///
    /// Fire and forget: the console reports no failure back to the caller.
    fn console_command(&self, command: &str);

    /// Id of the persistent level, if a world is loaded.
    fn persistent_level_id(&self) -> Option<String>;

    /// Id of the persistent level's script actor, if a world is loaded.
    fn level_script_actor_id(&self) -> Option<String>;
}

/// Everything the alias commands need from the host.
pub trait Host: Reflection + World + Send + Sync {}

impl<T: Reflection + World + Send + Sync + ?Sized> Host for T {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_respects_kind() {
        assert_eq!(ParamValue::parse(&ParamKind::Float, "42"), Some(ParamValue::Float(42.0)));
        assert_eq!(ParamValue::parse(&ParamKind::Int, " -7 "), Some(ParamValue::Int(-7)));
        assert_eq!(ParamValue::parse(&ParamKind::Int, "4.5"), None);
        assert_eq!(ParamValue::parse(&ParamKind::Bool, "True"), Some(ParamValue::Bool(true)));
        assert_eq!(ParamValue::parse(&ParamKind::Bool, "yes"), None);
        assert_eq!(
            ParamValue::parse(&ParamKind::Str, " keep spaces "),
            Some(ParamValue::Str(" keep spaces ".into()))
        );
        assert_eq!(ParamValue::parse(&ParamKind::Other("Vector".into()), "1 2 3"), None);
    }

    #[test]
    fn text_forms_are_canonical() {
        assert_eq!(ParamValue::Float(42.0).to_text().as_deref(), Some("42"));
        assert_eq!(ParamValue::Float(0.25).to_text().as_deref(), Some("0.25"));
        assert_eq!(ParamValue::Bool(false).to_text().as_deref(), Some("false"));
        assert_eq!(ParamValue::Unsupported.to_text(), None);
    }

    #[test]
    fn frame_starts_zeroed() {
        let behavior = BehaviorDescriptor::new("Mixed")
            .param(ParamSlot::input("Name", ParamKind::Str))
            .param(ParamSlot::input("Count", ParamKind::Int))
            .param(ParamSlot::output("Where", ParamKind::Other("Vector".into())))
            .param(ParamSlot::returns(ParamKind::Bool));

        let mut frame = ParamFrame::new(&behavior);
        assert_eq!(frame.len(), 4);
        assert_eq!(frame.get("Name"), Some(&ParamValue::Str(String::new())));
        assert_eq!(frame.get("Count"), Some(&ParamValue::Int(0)));
        assert_eq!(frame.get("Where"), Some(&ParamValue::Unsupported));

        assert!(frame.set_return(ParamValue::Bool(true)));
        assert!(!frame.set("Missing", ParamValue::Int(1)));
        assert_eq!(frame.value(3), Some(&ParamValue::Bool(true)));
    }

    #[test]
    fn last_parameter_skips_return_slot() {
        let behavior = BehaviorDescriptor::new("F")
            .param(ParamSlot::input("A", ParamKind::Int))
            .param(ParamSlot::output("B", ParamKind::Int))
            .param(ParamSlot::returns(ParamKind::Str));
        assert_eq!(behavior.last_parameter(), Some(1));

        let only_return = BehaviorDescriptor::new("G").param(ParamSlot::returns(ParamKind::Str));
        assert_eq!(only_return.last_parameter(), None);
    }
}
