//! The command registry.
//!
//! An ordered, immutable list of [`CommandDescriptor`]s built once at
//! startup. Registration order is evaluation order.

use std::fmt;
use std::str::FromStr;

use regex::{Regex, RegexBuilder};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::descriptor::{Command, CommandDescriptor, PendingTrigger};
use crate::error::{PatternError, PatternResult};
use crate::trigger::{CommandPattern, Trigger};

/// Prefix character reported when the body does not start with a handler.
pub const FALLBACK_PREFIX: char = '!';

/// Default handler prefix expression.
pub const DEFAULT_HANDLERS: &str = "^[.,!]";

// ============================================================================
// WorkType
// ============================================================================

/// Who the bot answers by default.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WorkType {
    /// Commands are open to everyone unless marked owner-only.
    #[default]
    Public,
    /// Commands are owner-only unless explicitly opened.
    Private,
}

impl WorkType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Public => "public",
            Self::Private => "private",
        }
    }
}

impl fmt::Display for WorkType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for WorkType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "public" => Ok(Self::Public),
            "private" => Ok(Self::Private),
            other => Err(format!("unknown work type '{other}'")),
        }
    }
}

// ============================================================================
// HandlerPrefix
// ============================================================================

/// The configured handler prefix expression, e.g. `^[.,!]`.
#[derive(Debug, Clone)]
pub struct HandlerPrefix {
    source: String,
    detector: Regex,
    resume: Regex,
}

impl HandlerPrefix {
    /// Compiles the prefix expression and its derived matchers.
    pub fn new(source: impl Into<String>) -> PatternResult<Self> {
        let source = source.into();
        let detector = Regex::new(&source).map_err(|e| PatternError::invalid(&source, e))?;
        let resume_src = format!("{source}( ?resume)");
        let resume = RegexBuilder::new(&resume_src)
            .case_insensitive(true)
            .dot_matches_new_line(true)
            .build()
            .map_err(|e| PatternError::invalid(&resume_src, e))?;
        Ok(Self {
            source,
            detector,
            resume,
        })
    }

    pub fn as_str(&self) -> &str {
        &self.source
    }

    /// The prefix character of `body`: its first character lower-cased when
    /// the prefix expression matches, [`FALLBACK_PREFIX`] otherwise.
    pub fn prefix_of(&self, body: Option<&str>) -> char {
        body.filter(|b| self.detector.is_match(b))
            .and_then(|b| b.chars().next())
            .and_then(|c| c.to_lowercase().next())
            .unwrap_or(FALLBACK_PREFIX)
    }

    /// Whether `body` is a resume command, which bypasses the pause filter.
    pub fn is_resume(&self, body: Option<&str>) -> bool {
        body.is_some_and(|b| self.resume.is_match(b))
    }

    /// Builds the pattern of a prefixed command.
    pub fn command_pattern(&self, name: &str) -> PatternResult<CommandPattern> {
        let source = format!(r"(?is){}\s*(?:{})(?:\b|$)", self.source, name);
        CommandPattern::parse(&source)
    }
}

// ============================================================================
// CommandRegistry
// ============================================================================

/// Ordered command descriptors plus the handler prefix they were built with.
#[derive(Debug, Clone)]
pub struct CommandRegistry {
    prefix: HandlerPrefix,
    work_type: WorkType,
    descriptors: Vec<CommandDescriptor>,
}

impl CommandRegistry {
    pub fn builder(prefix: HandlerPrefix) -> RegistryBuilder {
        RegistryBuilder {
            registry: CommandRegistry {
                prefix,
                work_type: WorkType::default(),
                descriptors: Vec::new(),
            },
        }
    }

    pub fn prefix(&self) -> &HandlerPrefix {
        &self.prefix
    }

    pub fn work_type(&self) -> WorkType {
        self.work_type
    }

    /// Descriptors in evaluation order.
    pub fn iter(&self) -> impl Iterator<Item = &CommandDescriptor> {
        self.descriptors.iter()
    }

    pub fn get(&self, name: &str) -> Option<&CommandDescriptor> {
        self.descriptors.iter().find(|d| d.name() == name)
    }

    pub fn len(&self) -> usize {
        self.descriptors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.descriptors.is_empty()
    }

    /// Names of listed pattern commands, grouped by category in first-seen order.
    pub fn listing(&self) -> Vec<(String, Vec<String>)> {
        let mut groups: Vec<(String, Vec<String>)> = Vec::new();
        for d in self.iter() {
            if d.hidden() || !matches!(d.trigger(), Trigger::Pattern(_)) {
                continue;
            }
            let category = d.category().unwrap_or("misc").to_string();
            match groups.iter_mut().find(|(c, _)| *c == category) {
                Some((_, names)) => names.push(d.name().to_string()),
                None => groups.push((category, vec![d.name().to_string()])),
            }
        }
        groups
    }
}

/// Builds a [`CommandRegistry`].
#[must_use]
pub struct RegistryBuilder {
    registry: CommandRegistry,
}

impl RegistryBuilder {
    /// Sets the work type; affects commands registered afterwards.
    pub fn work_type(mut self, work_type: WorkType) -> Self {
        self.registry.work_type = work_type;
        self
    }

    /// Registers a command, resolving its trigger against the prefix.
    pub fn register(mut self, command: Command) -> PatternResult<Self> {
        let trigger = match command.pending_trigger() {
            PendingTrigger::Command(name) => {
                Trigger::Pattern(self.registry.prefix.command_pattern(name)?)
            }
            PendingTrigger::Regex(re) => Trigger::Pattern(CommandPattern::new(re.clone())?),
            PendingTrigger::Event(kind) => Trigger::Event(*kind),
        };
        let default_owner_only = self.registry.work_type == WorkType::Private;
        let descriptor = command.resolve(trigger, default_owner_only);
        debug!(
            command = %descriptor.name(),
            owner_only = descriptor.owner_only(),
            "Registered command"
        );
        self.registry.descriptors.push(descriptor);
        Ok(self)
    }

    /// Registers a prebuilt descriptor as is.
    pub fn descriptor(mut self, descriptor: CommandDescriptor) -> Self {
        self.registry.descriptors.push(descriptor);
        self
    }

    /// Registers every command in `commands`, in order.
    pub fn register_all(
        mut self,
        commands: impl IntoIterator<Item = Command>,
    ) -> PatternResult<Self> {
        for command in commands {
            self = self.register(command)?;
        }
        Ok(self)
    }

    pub fn build(self) -> CommandRegistry {
        self.registry
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::descriptor::{on_command, on_pattern, on_text};
    use crate::testing::message;

    fn handlers() -> HandlerPrefix {
        HandlerPrefix::new(DEFAULT_HANDLERS).unwrap()
    }

    #[test]
    fn test_prefix_of() {
        let prefix = handlers();
        assert_eq!(prefix.prefix_of(Some(".menu")), '.');
        assert_eq!(prefix.prefix_of(Some("hello")), FALLBACK_PREFIX);
        assert_eq!(prefix.prefix_of(None), FALLBACK_PREFIX);

        let letters = HandlerPrefix::new("^[A-Z]").unwrap();
        assert_eq!(letters.prefix_of(Some("Xping")), 'x');
    }

    #[test]
    fn test_resume_detection() {
        let prefix = handlers();
        assert!(prefix.is_resume(Some("!resume")));
        assert!(prefix.is_resume(Some(". RESUME")));
        assert!(!prefix.is_resume(Some("resume")));
        assert!(!prefix.is_resume(Some("!ping")));
        assert!(!prefix.is_resume(None));
    }

    #[test]
    fn test_invalid_prefix_is_rejected() {
        assert!(matches!(
            HandlerPrefix::new("^[.,!"),
            Err(PatternError::Invalid { .. })
        ));
    }

    #[test]
    fn test_command_pattern_matches_with_any_handler() {
        let pattern = handlers().command_pattern("ping").unwrap();
        assert!(pattern.is_match("!ping"));
        assert!(pattern.is_match(". PING"));
        assert!(pattern.is_match(",ping 5"));
        assert!(!pattern.is_match("!pingu"));
        assert!(!pattern.is_match("ping"));
        assert_eq!(pattern.strip(".ping   5 "), "5");
    }

    #[test]
    fn test_registration_order_and_work_type_default() {
        let registry = CommandRegistry::builder(handlers())
            .register(on_command("ping").handler(|_| async {}))
            .unwrap()
            .work_type(WorkType::Private)
            .register(on_text().name("logger").handler(|_| async {}))
            .unwrap()
            .register(
                on_command("menu")
                    .owner_only(false)
                    .handler(|_| async {}),
            )
            .unwrap()
            .build();

        let names: Vec<_> = registry.iter().map(|d| d.name().to_string()).collect();
        assert_eq!(names, ["ping", "logger", "menu"]);
        assert!(!registry.get("ping").unwrap().owner_only());
        assert!(registry.get("logger").unwrap().owner_only());
        assert!(!registry.get("menu").unwrap().owner_only());
    }

    #[test]
    fn test_raw_pattern_used_verbatim() {
        let registry = CommandRegistry::builder(handlers())
            .register(
                on_pattern(Regex::new("^hi$").unwrap())
                    .name("hi")
                    .handler(|_| async {}),
            )
            .unwrap()
            .build();
        let d = registry.get("hi").unwrap();
        assert_eq!(d.trigger().invocations(&message("1@s.whatsapp.net", "hi"), false).len(), 1);
    }

    #[test]
    fn test_listing_skips_hidden_and_events() {
        let registry = CommandRegistry::builder(handlers())
            .register_all([
                on_command("ping").category("misc").handler(|_| async {}),
                on_command("pause").hidden().handler(|_| async {}),
                on_text().handler(|_| async {}),
                on_command("menu").category("user").handler(|_| async {}),
                on_command("alive").handler(|_| async {}),
            ])
            .unwrap()
            .build();
        assert_eq!(
            registry.listing(),
            vec![
                ("misc".to_string(), vec!["ping".to_string(), "alive".to_string()]),
                ("user".to_string(), vec!["menu".to_string()]),
            ]
        );
    }
}
