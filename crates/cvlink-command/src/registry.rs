use std::collections::HashMap;
use std::fmt;
use std::ops::RangeInclusive;
use std::sync::Arc;

use tracing::{debug, warn};

use crate::error::{CommandError, RegistryError, Result};
use crate::reply::Reply;
use crate::tokenize::tokenize;

/// Placeholder for one positional argument in a signature.
pub const PLACEHOLDER: &str = "[str]";

/// Callable bound to one or more signatures.
pub type Handler = Arc<dyn Fn(&[String]) -> Result<Reply> + Send + Sync>;

/// One registered signature.
pub struct Registration {
    signature: String,
    name: String,
    arity: usize,
    help: String,
    handler: Handler,
}

impl Registration {
    /// The signature as written, e.g. `vexec [str] [str]`.
    pub fn signature(&self) -> &str {
        &self.signature
    }

    /// Literal words of the signature joined by single spaces.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Number of `[str]` placeholders.
    pub fn arity(&self) -> usize {
        self.arity
    }

    pub fn help(&self) -> &str {
        &self.help
    }
}

impl fmt::Debug for Registration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Registration")
            .field("signature", &self.signature)
            .field("help", &self.help)
            .finish_non_exhaustive()
    }
}

/// Static table of command signatures keyed by `(name, arity)`.
///
/// A name may be registered once per arity; there is no variadic matching.
/// Registration order only affects the help listing.
#[derive(Default)]
pub struct CommandRegistry {
    registrations: Vec<Registration>,
    index: HashMap<(String, usize), usize>,
    longest_name: usize,
}

impl CommandRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `handler` under `signature`.
    ///
    /// The signature is one or more literal words followed by zero or more
    /// `[str]` placeholders, e.g. `vget /persistent_level/id` or
    /// `vrun [str] [str]`.
    pub fn bind(
        &mut self,
        signature: &str,
        help: &str,
        handler: impl Fn(&[String]) -> Result<Reply> + Send + Sync + 'static,
    ) -> std::result::Result<(), RegistryError> {
        self.bind_handler(signature, help, Arc::new(handler))
    }

    /// Register one shared handler as `name` followed by each arity in `arities`.
    pub fn bind_arities(
        &mut self,
        name: &str,
        arities: RangeInclusive<usize>,
        help: &str,
        handler: impl Fn(&[String]) -> Result<Reply> + Send + Sync + 'static,
    ) -> std::result::Result<(), RegistryError> {
        let handler: Handler = Arc::new(handler);
        for arity in arities {
            let mut signature = name.to_string();
            for _ in 0..arity {
                signature.push(' ');
                signature.push_str(PLACEHOLDER);
            }
            self.bind_handler(&signature, help, Arc::clone(&handler))?;
        }
        Ok(())
    }

    /// Register an already shared handler.
    pub fn bind_handler(
        &mut self,
        signature: &str,
        help: &str,
        handler: Handler,
    ) -> std::result::Result<(), RegistryError> {
        let (words, arity) = parse_signature(signature)?;
        let name = words.join(" ");
        let key = (name.clone(), arity);
        if self.index.contains_key(&key) {
            return Err(RegistryError::Duplicate { name, arity });
        }

        self.longest_name = self.longest_name.max(words.len());
        self.index.insert(key, self.registrations.len());
        self.registrations.push(Registration {
            signature: words
                .iter()
                .copied()
                .chain(std::iter::repeat_n(PLACEHOLDER, arity))
                .collect::<Vec<_>>()
                .join(" "),
            name,
            arity,
            help: help.to_string(),
            handler,
        });
        Ok(())
    }

    /// Tokenize `line` and run the handler registered for its name and
    /// argument count.
    ///
    /// Multi-word names are tried longest first, so `vget /a/id` and
    /// `vget [str]` can both be registered. The handler's result is returned
    /// unchanged.
    pub fn dispatch(&self, line: &str) -> Result<Reply> {
        let tokens = tokenize(line);
        let max_words = self.longest_name.min(tokens.len());

        for name_words in (1..=max_words).rev() {
            let name = tokens[..name_words].join(" ");
            let args = &tokens[name_words..];
            if let Some(&idx) = self.index.get(&(name, args.len())) {
                let registration = &self.registrations[idx];
                debug!(command = registration.signature(), "dispatching");
                return (registration.handler)(args);
            }
        }

        warn!(command = line, "unknown command");
        Err(CommandError::UnknownCommand {
            line: line.to_string(),
        })
    }

    /// Whether `name` is registered with exactly `arity` arguments.
    pub fn contains(&self, name: &str, arity: usize) -> bool {
        self.index.contains_key(&(name.to_string(), arity))
    }

    /// All registrations in registration order.
    pub fn registrations(&self) -> impl Iterator<Item = &Registration> {
        self.registrations.iter()
    }

    /// One line per signature: `<signature>  <help>`.
    pub fn help_text(&self) -> String {
        let width = self
            .registrations
            .iter()
            .map(|r| r.signature.len())
            .max()
            .unwrap_or(0);
        self.registrations
            .iter()
            .map(|r| format!("{:width$}  {}", r.signature, r.help))
            .collect::<Vec<_>>()
            .join("\n")
    }

    pub fn len(&self) -> usize {
        self.registrations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.registrations.is_empty()
    }
}

impl fmt::Debug for CommandRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CommandRegistry")
            .field("registrations", &self.registrations.len())
            .field("longest_name", &self.longest_name)
            .finish()
    }
}

fn parse_signature(signature: &str) -> std::result::Result<(Vec<&str>, usize), RegistryError> {
    let invalid = |reason: &str| RegistryError::InvalidSignature {
        signature: signature.to_string(),
        reason: reason.to_string(),
    };

    let mut words = Vec::new();
    let mut arity = 0usize;
    for word in signature.split_whitespace() {
        if word == PLACEHOLDER {
            arity += 1;
        } else if word.starts_with('[') && word.ends_with(']') {
            return Err(invalid(&format!("unsupported placeholder {word}")));
        } else if arity > 0 {
            return Err(invalid("literal words must precede all placeholders"));
        } else {
            words.push(word);
        }
    }

    if words.is_empty() {
        return Err(invalid("missing command name"));
    }
    Ok((words, arity))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn echo_arity(tag: &'static str) -> impl Fn(&[String]) -> Result<Reply> + Send + Sync {
        move |args| Ok(Reply::with_body(format!("{tag}:{}", args.join(","))))
    }

    #[test]
    fn dispatch_matches_exact_arity() {
        let mut registry = CommandRegistry::new();
        registry.bind("foo [str] [str]", "two", echo_arity("two")).unwrap();
        registry.bind("foo [str] [str] [str]", "three", echo_arity("three")).unwrap();

        assert_eq!(registry.dispatch("foo a b").unwrap().body(), Some("two:a,b"));
        assert_eq!(registry.dispatch("foo a b c").unwrap().body(), Some("three:a,b,c"));
        assert_eq!(
            registry.dispatch("foo a").unwrap_err(),
            CommandError::UnknownCommand {
                line: "foo a".to_string()
            }
        );
    }

    #[test]
    fn registration_order_does_not_affect_matching() {
        let mut forward = CommandRegistry::new();
        forward.bind("foo [str]", "", echo_arity("one")).unwrap();
        forward.bind("foo [str] [str]", "", echo_arity("two")).unwrap();

        let mut reverse = CommandRegistry::new();
        reverse.bind("foo [str] [str]", "", echo_arity("two")).unwrap();
        reverse.bind("foo [str]", "", echo_arity("one")).unwrap();

        for line in ["foo x", "foo x y"] {
            assert_eq!(forward.dispatch(line), reverse.dispatch(line));
        }
    }

    #[test]
    fn longest_literal_name_wins() {
        let mut registry = CommandRegistry::new();
        registry.bind("vget [str]", "generic", echo_arity("generic")).unwrap();
        registry
            .bind("vget /persistent_level/id", "level", |_| Ok(Reply::with_body("level")))
            .unwrap();

        assert_eq!(registry.dispatch("vget /persistent_level/id").unwrap().body(), Some("level"));
        assert_eq!(registry.dispatch("vget /other").unwrap().body(), Some("generic:/other"));
    }

    #[test]
    fn quoted_arguments_count_as_one() {
        let mut registry = CommandRegistry::new();
        registry.bind("say [str]", "", echo_arity("say")).unwrap();
        assert_eq!(registry.dispatch(r#"say "hello world""#).unwrap().body(), Some("say:hello world"));
    }

    #[test]
    fn handler_errors_propagate_verbatim() {
        let mut registry = CommandRegistry::new();
        registry
            .bind("fail", "", |_| Err(CommandError::Failed("boom".into())))
            .unwrap();
        assert_eq!(registry.dispatch("fail"), Err(CommandError::Failed("boom".into())));
    }

    #[test]
    fn bind_arities_registers_each_count() {
        let mut registry = CommandRegistry::new();
        registry.bind_arities("vrun", 1..=6, "run", echo_arity("vrun")).unwrap();

        assert_eq!(registry.len(), 6);
        assert!(registry.contains("vrun", 1));
        assert!(registry.contains("vrun", 6));
        assert!(!registry.contains("vrun", 0));
        assert!(!registry.contains("vrun", 7));
        assert!(registry.dispatch("vrun a b c d e f g").is_err());
    }

    #[test]
    fn rejects_bad_signatures() {
        let mut registry = CommandRegistry::new();
        let ok = |_: &[String]| Ok(Reply::ok());

        assert!(matches!(
            registry.bind("[str]", "", ok),
            Err(RegistryError::InvalidSignature { .. })
        ));
        assert!(matches!(
            registry.bind("foo [str] bar", "", ok),
            Err(RegistryError::InvalidSignature { .. })
        ));
        assert!(matches!(
            registry.bind("foo [int]", "", ok),
            Err(RegistryError::InvalidSignature { .. })
        ));

        registry.bind("foo [str]", "", ok).unwrap();
        assert_eq!(
            registry.bind("foo   [str]", "", ok),
            Err(RegistryError::Duplicate {
                name: "foo".to_string(),
                arity: 1
            })
        );
    }

    #[test]
    fn help_lists_registrations_in_order() {
        let mut registry = CommandRegistry::new();
        registry.bind("vget /a/id", "first", |_| Ok(Reply::ok())).unwrap();
        registry.bind("vrun  [str]", "second", |_| Ok(Reply::ok())).unwrap();

        let signatures: Vec<_> = registry.registrations().map(Registration::signature).collect();
        assert_eq!(signatures, ["vget /a/id", "vrun [str]"]);
        assert_eq!(registry.registrations().next().unwrap().name(), "vget /a/id");

        let help = registry.help_text();
        let lines: Vec<_> = help.lines().collect();
        assert_eq!(lines.len(), 2);
        assert!(lines[0].starts_with("vget /a/id") && lines[0].ends_with("first"));
        assert!(lines[1].ends_with("second"));
    }

    #[test]
    fn empty_line_is_unknown() {
        let registry = CommandRegistry::new();
        assert!(matches!(
            registry.dispatch("   "),
            Err(CommandError::UnknownCommand { .. })
        ));
    }
}
