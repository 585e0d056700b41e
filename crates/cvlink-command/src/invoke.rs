//! Reflective invocation: resolve a target, marshal text into a
//! [`ParamFrame`], call the behavior and collect its outputs.

use serde::ser::{Serialize, SerializeMap, Serializer};
use tracing::{debug, warn};

use crate::error::{CommandError, Result};
use crate::host::{BehaviorDescriptor, ObjectHandle, ParamDirection, ParamFrame, ParamKind, ParamValue, Reflection};
use crate::reply::Reply;
use crate::tokenize::{join_tokens, next_token};

/// Output and return values of one call, in declaration order.
///
/// Serializes as a JSON object mapping slot name to text value.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResultMap {
    entries: Vec<(String, String)>,
}

impl ResultMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace `name`.
    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<String>) {
        let name = name.into();
        let value = value.into();
        match self.entries.iter_mut().find(|(existing, _)| *existing == name) {
            Some(entry) => entry.1 = value,
            None => self.entries.push((name, value)),
        }
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|(existing, _)| existing == name)
            .map(|(_, value)| value.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string(self)
            .map_err(|err| CommandError::Failed(format!("failed to serialize result map: {err}")))
    }
}

impl Serialize for ResultMap {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.entries.len()))?;
        for (name, value) in &self.entries {
            map.serialize_entry(name, value)?;
        }
        map.end()
    }
}

/// Fill a fresh frame for `behavior` from the argument text.
///
/// Input slots consume one token each, in declaration order; out and
/// reference slots are left zeroed. A slot with no token, or an explicit
/// `""`, takes its declared default when it has one. If the last parameter
/// is textual and text remains after its token, it takes all remaining text
/// (leading whitespace trimmed, quotes kept) so a trailing sub-command such as
/// `giveall weapons` survives intact.
pub fn bind_arguments(behavior: &BehaviorDescriptor, args: &str) -> Result<ParamFrame> {
    let mut frame = ParamFrame::new(behavior);
    let last = behavior.last_parameter();
    let mut remaining = args;

    for (idx, slot) in behavior.parameter_slots().iter().enumerate() {
        if slot.direction != ParamDirection::In {
            continue;
        }

        let before = remaining;
        let token = match next_token(remaining) {
            Some((token, rest)) => {
                remaining = rest;
                token
            }
            None => String::new(),
        };

        let text = match (&slot.default, token.is_empty()) {
            (Some(default), true) => {
                debug!(param = %slot.name, %default, "using declared default");
                default.clone()
            }
            _ if Some(idx) == last
                && slot.kind == ParamKind::Str
                && !remaining.trim().is_empty() =>
            {
                let tail = before.trim_start().to_string();
                remaining = "";
                tail
            }
            _ => token,
        };

        match ParamValue::parse(&slot.kind, &text) {
            Some(value) => frame.set_index(idx, value),
            None => {
                warn!(behavior = %behavior.name, param = %slot.name, value = %text, "argument conversion failed");
                return Err(CommandError::InvalidArgument(format!(
                    "'{name}': Bad or missing property '{param}' when trying to call {name}",
                    name = behavior.name,
                    param = slot.name
                )));
            }
        }
    }

    if !remaining.trim().is_empty() {
        debug!(behavior = %behavior.name, extra = remaining.trim(), "ignoring surplus arguments");
    }
    Ok(frame)
}

/// Collect every out, reference and return slot as text.
///
/// Values without a text form are logged and left out.
pub fn collect_results(behavior: &BehaviorDescriptor, frame: &ParamFrame) -> ResultMap {
    let mut results = ResultMap::new();
    for (idx, slot) in behavior.parameter_slots().iter().enumerate() {
        if !slot.direction.is_output() {
            continue;
        }
        match frame.value(idx).and_then(ParamValue::to_text) {
            Some(text) => results.insert(slot.name.clone(), text),
            None => warn!(behavior = %behavior.name, param = %slot.name, "unrecognized type for output parameter; omitted"),
        }
    }
    results
}

/// Call a behavior on a resolved object from `"<behavior> <args...>"`.
///
/// Nothing is called if the behavior is unknown or any argument fails to
/// convert.
pub fn call_with_arguments<R: Reflection + ?Sized>(
    reflection: &R,
    object: &ObjectHandle,
    command: &str,
) -> Result<ResultMap> {
    let Some((name, args)) = next_token(command) else {
        warn!(object = %object, "empty behavior name");
        return Err(CommandError::InvalidArgument("missing behavior name".to_string()));
    };

    let Some(behavior) = reflection.find_behavior(object, &name) else {
        warn!(object = %object, behavior = %name, "behavior not found");
        return Err(CommandError::InvalidArgument(format!(
            "can not find function '{name}' on {object}"
        )));
    };

    let mut frame = bind_arguments(&behavior, args)?;
    reflection.invoke(object, &behavior, &mut frame)?;
    Ok(collect_results(&behavior, &frame))
}

/// [`call_with_arguments`] reduced to success or failure.
pub fn call_by_name<R: Reflection + ?Sized>(reflection: &R, object: &ObjectHandle, command: &str) -> bool {
    match call_with_arguments(reflection, object, command) {
        Ok(_) => true,
        Err(err) => {
            debug!(object = %object, command, error = %err, "dynamic call failed");
            false
        }
    }
}

/// Resolve `id` and hand `"<behavior> <args...>"` to the host's dynamic call.
///
/// Replies `ok` without a body; failures become
/// `Fail to execute the function '<cmd>' of <id>`.
pub fn fire_and_acknowledge<R: Reflection + ?Sized>(
    reflection: &R,
    id: &str,
    behavior_and_args: &[String],
) -> Result<Reply> {
    let object = resolve(reflection, id)?;
    let command = join_tokens(behavior_and_args);

    if reflection.call_by_name(&object, &command) {
        Ok(Reply::ok())
    } else {
        Err(CommandError::Failed(format!(
            "Fail to execute the function '{command}' of {id}"
        )))
    }
}

/// Resolve `id`, call the behavior and reply with its result map as JSON.
pub fn fire_and_capture<R: Reflection + ?Sized>(
    reflection: &R,
    id: &str,
    behavior_and_args: &[String],
) -> Result<Reply> {
    let object = resolve(reflection, id)?;
    let command = join_tokens(behavior_and_args);
    let results = call_with_arguments(reflection, &object, &command)?;
    Ok(Reply::with_body(results.to_json()?))
}

fn resolve<R: Reflection + ?Sized>(reflection: &R, id: &str) -> Result<ObjectHandle> {
    reflection.resolve_object(id).ok_or_else(|| {
        warn!(id, "object not found");
        CommandError::Failed(format!("Can not find actor with id '{id}'"))
    })
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;
    use std::sync::Mutex;

    use super::*;
    use crate::host::ParamSlot;

    /// Records each invoke instead of running anything.
    #[derive(Default)]
    struct Recorder {
        behaviors: HashMap<String, BehaviorDescriptor>,
        calls: Mutex<Vec<(String, ParamFrame)>>,
    }

    impl Recorder {
        fn with(behaviors: Vec<BehaviorDescriptor>) -> Self {
            Self {
                behaviors: behaviors.into_iter().map(|b| (b.name.clone(), b)).collect(),
                calls: Mutex::default(),
            }
        }

        fn calls(&self) -> Vec<(String, ParamFrame)> {
            self.calls.lock().unwrap().clone()
        }
    }

    impl Reflection for Recorder {
        fn resolve_object(&self, id: &str) -> Option<ObjectHandle> {
            (id == "Obj1").then(|| ObjectHandle::new(id))
        }

        fn find_behavior(&self, _object: &ObjectHandle, name: &str) -> Option<BehaviorDescriptor> {
            self.behaviors.get(name).cloned()
        }

        fn invoke(&self, _object: &ObjectHandle, behavior: &BehaviorDescriptor, frame: &mut ParamFrame) -> Result<()> {
            if behavior.name == "GetStatus" {
                frame.set_return(ParamValue::Str("Ready".into()));
            }
            self.calls.lock().unwrap().push((behavior.name.clone(), frame.clone()));
            Ok(())
        }
    }

    fn args(line: &str) -> Vec<String> {
        crate::tokenize::tokenize(line)
    }

    fn cheat() -> BehaviorDescriptor {
        BehaviorDescriptor::new("cheat").param(ParamSlot::input("Command", ParamKind::Str))
    }

    #[test]
    fn trailing_text_parameter_takes_rest_of_line() {
        let host = Recorder::with(vec![cheat()]);
        fire_and_acknowledge(&host, "Obj1", &args("cheat giveall weapons")).unwrap();

        let calls = host.calls();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].1.get("Command"), Some(&ParamValue::Str("giveall weapons".into())));
    }

    #[test]
    fn trailing_rule_keeps_quotes_verbatim() {
        let behavior = cheat();
        let frame = bind_arguments(&behavior, r#"  say "hi there" now"#).unwrap();
        assert_eq!(frame.get("Command"), Some(&ParamValue::Str(r#"say "hi there" now"#.into())));
    }

    #[test]
    fn single_quoted_token_is_unquoted() {
        let frame = bind_arguments(&cheat(), r#""giveall weapons""#).unwrap();
        assert_eq!(frame.get("Command"), Some(&ParamValue::Str("giveall weapons".into())));
    }

    #[test]
    fn missing_token_uses_declared_default() {
        let behavior = BehaviorDescriptor::new("Move")
            .param(ParamSlot::input("Distance", ParamKind::Float))
            .param(ParamSlot::input("Speed", ParamKind::Float).with_default("2.5"));

        let frame = bind_arguments(&behavior, "10").unwrap();
        assert_eq!(frame.get("Distance"), Some(&ParamValue::Float(10.0)));
        assert_eq!(frame.get("Speed"), Some(&ParamValue::Float(2.5)));

        let explicit_empty = bind_arguments(&behavior, r#"10 """#).unwrap();
        assert_eq!(explicit_empty.get("Speed"), Some(&ParamValue::Float(2.5)));

        let supplied = bind_arguments(&behavior, "10 7").unwrap();
        assert_eq!(supplied.get("Speed"), Some(&ParamValue::Float(7.0)));
    }

    #[test]
    fn conversion_failure_names_behavior_and_parameter_and_skips_call() {
        let behavior = BehaviorDescriptor::new("SetSpeed").param(ParamSlot::input("Speed", ParamKind::Float));
        let host = Recorder::with(vec![behavior]);

        let err = fire_and_capture(&host, "Obj1", &args("SetSpeed fast")).unwrap_err();
        assert_eq!(
            err,
            CommandError::InvalidArgument(
                "'SetSpeed': Bad or missing property 'Speed' when trying to call SetSpeed".into()
            )
        );
        assert!(host.calls().is_empty());

        let missing = fire_and_capture(&host, "Obj1", &args("SetSpeed")).unwrap_err();
        assert!(matches!(missing, CommandError::InvalidArgument(_)));
    }

    #[test]
    fn out_and_ref_slots_are_not_filled_from_text() {
        let behavior = BehaviorDescriptor::new("Probe")
            .param(ParamSlot::output("Hit", ParamKind::Bool))
            .param(ParamSlot::input("Range", ParamKind::Int))
            .param(ParamSlot::reference("Count", ParamKind::Int));

        let frame = bind_arguments(&behavior, "30").unwrap();
        assert_eq!(frame.get("Hit"), Some(&ParamValue::Bool(false)));
        assert_eq!(frame.get("Range"), Some(&ParamValue::Int(30)));
        assert_eq!(frame.get("Count"), Some(&ParamValue::Int(0)));
    }

    #[test]
    fn results_keep_declaration_order_and_omit_unsupported() {
        let behavior = BehaviorDescriptor::new("Query")
            .param(ParamSlot::input("Key", ParamKind::Str))
            .param(ParamSlot::output("Zeta", ParamKind::Int))
            .param(ParamSlot::output("Where", ParamKind::Other("Vector".into())))
            .param(ParamSlot::reference("Alpha", ParamKind::Bool))
            .param(ParamSlot::returns(ParamKind::Float));

        let mut frame = ParamFrame::new(&behavior);
        frame.set("Zeta", ParamValue::Int(3));
        frame.set("Alpha", ParamValue::Bool(true));
        frame.set_return(ParamValue::Float(0.5));

        let results = collect_results(&behavior, &frame);
        assert_eq!(results.len(), 3);
        assert_eq!(results.get("Where"), None);
        assert_eq!(
            results.to_json().unwrap(),
            r#"{"Zeta":"3","Alpha":"true","ReturnValue":"0.5"}"#
        );
    }

    #[test]
    fn capture_returns_result_map_json() {
        let behavior = BehaviorDescriptor::new("GetStatus").param(ParamSlot::returns(ParamKind::Str));
        let host = Recorder::with(vec![behavior]);

        let reply = fire_and_capture(&host, "Obj1", &args("GetStatus")).unwrap();
        assert_eq!(reply.body(), Some(r#"{"ReturnValue":"Ready"}"#));
    }

    #[test]
    fn unresolved_object_and_behavior() {
        let host = Recorder::with(vec![cheat()]);

        let err = fire_and_capture(&host, "Ghost", &args("cheat x")).unwrap_err();
        assert_eq!(err, CommandError::Failed("Can not find actor with id 'Ghost'".into()));

        let err = fire_and_capture(&host, "Obj1", &args("Nope 1")).unwrap_err();
        assert!(matches!(err, CommandError::InvalidArgument(_)));

        let err = fire_and_acknowledge(&host, "Obj1", &args("Nope 1")).unwrap_err();
        assert_eq!(err, CommandError::Failed("Fail to execute the function 'Nope 1' of Obj1".into()));
    }

    #[test]
    fn result_map_insert_replaces_existing() {
        let mut map = ResultMap::new();
        map.insert("a", "1");
        map.insert("b", "2");
        map.insert("a", "3");
        assert_eq!(map.iter().collect::<Vec<_>>(), [("a", "3"), ("b", "2")]);
    }
}
