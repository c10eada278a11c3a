//! Command triggers.
//!
//! A [`Trigger`] decides whether a descriptor fires for a message and, when it
//! does, what [`Invocation`] payload the handler receives. Pattern triggers
//! test the message body; event triggers test the message kind.

use std::fmt;
use std::str::FromStr;

use regex::{Regex, RegexBuilder};
use serde::{Deserialize, Serialize};

use asena_core::{MessageType, NormalizedMessage};

use crate::error::{PatternError, PatternResult};

// ============================================================================
// EventKind
// ============================================================================

/// Message kinds an event trigger can subscribe to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EventKind {
    /// Any message carrying a non-empty text body.
    Text,
    /// Image messages.
    Image,
    /// Video messages.
    Video,
    /// Sticker messages.
    Sticker,
    /// Revoke notifications (`protocolMessage`).
    Delete,
    /// Every message.
    Message,
}

impl EventKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Text => "text",
            Self::Image => "image",
            Self::Video => "video",
            Self::Sticker => "sticker",
            Self::Delete => "delete",
            Self::Message => "message",
        }
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error returned when parsing an unknown event kind.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown event kind '{0}'")]
pub struct UnknownEventKind(pub String);

impl FromStr for EventKind {
    type Err = UnknownEventKind;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "text" => Ok(Self::Text),
            "image" | "photo" => Ok(Self::Image),
            "video" => Ok(Self::Video),
            "sticker" => Ok(Self::Sticker),
            "delete" => Ok(Self::Delete),
            "message" => Ok(Self::Message),
            _ => Err(UnknownEventKind(s.to_string())),
        }
    }
}

// ============================================================================
// CommandPattern
// ============================================================================

/// A compiled pattern trigger.
///
/// Holds the matcher as given plus a case-insensitive copy used to strip the
/// matched text from the body before it reaches the handler.
#[derive(Debug, Clone)]
pub struct CommandPattern {
    matcher: Regex,
    stripper: Regex,
}

impl CommandPattern {
    /// Wraps an already compiled matcher.
    pub fn new(matcher: Regex) -> PatternResult<Self> {
        let source = matcher.as_str();
        let stripper = RegexBuilder::new(source)
            .case_insensitive(true)
            .build()
            .map_err(|e| PatternError::invalid(source, e))?;
        Ok(Self { matcher, stripper })
    }

    /// Compiles `source` verbatim.
    pub fn parse(source: &str) -> PatternResult<Self> {
        let matcher = Regex::new(source).map_err(|e| PatternError::invalid(source, e))?;
        Self::new(matcher)
    }

    /// The matcher source.
    pub fn as_str(&self) -> &str {
        self.matcher.as_str()
    }

    /// Whether `body` matches.
    pub fn is_match(&self, body: &str) -> bool {
        self.matcher.is_match(body)
    }

    /// Removes the first case-insensitive match from `body` and trims the rest.
    pub fn strip(&self, body: &str) -> String {
        self.stripper.replace(body, "").trim().to_string()
    }
}

// ============================================================================
// Trigger / Invocation
// ============================================================================

/// What makes a descriptor fire.
#[derive(Debug, Clone)]
pub enum Trigger {
    /// Fires when the body matches the pattern.
    Pattern(CommandPattern),
    /// Fires on a message kind.
    Event(EventKind),
}

/// Payload handed to a handler for one firing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Invocation {
    /// A pattern matched; `matched` is the body with the match removed.
    Pattern { matched: String },
    /// A text event with the full body.
    Text { body: String },
    /// An image event with its caption.
    Image { caption: Option<String> },
    /// A video event.
    Video,
    /// A sticker event.
    Sticker,
    /// A revoke event with the id of the deleted message, if present.
    Delete { revoked_id: Option<String> },
    /// A whole-message event.
    Message,
}

impl Invocation {
    /// Text payload: the stripped body, the full body or the image caption.
    pub fn text(&self) -> Option<&str> {
        match self {
            Self::Pattern { matched } => Some(matched),
            Self::Text { body } => Some(body),
            Self::Image { caption } => caption.as_deref(),
            _ => None,
        }
    }
}

impl Trigger {
    /// Compiles a pattern trigger from source.
    pub fn pattern(source: &str) -> PatternResult<Self> {
        CommandPattern::parse(source).map(Self::Pattern)
    }

    /// Creates an event trigger.
    pub fn event(kind: EventKind) -> Self {
        Self::Event(kind)
    }

    /// Evaluates the trigger against `message`.
    ///
    /// Returns zero or one invocation, except for delete triggers with
    /// `delete_fallthrough` set: those additionally fire a whole-message
    /// invocation for every message.
    pub fn invocations(
        &self,
        message: &NormalizedMessage,
        delete_fallthrough: bool,
    ) -> Vec<Invocation> {
        let body = message.body().filter(|b| !b.is_empty());
        match self {
            Self::Pattern(pattern) => body
                .filter(|b| pattern.is_match(b))
                .map(|b| Invocation::Pattern {
                    matched: pattern.strip(b),
                })
                .into_iter()
                .collect(),
            Self::Event(kind) => {
                let mut out = Vec::new();
                match kind {
                    EventKind::Text => {
                        if let Some(b) = body {
                            out.push(Invocation::Text {
                                body: b.to_string(),
                            });
                        }
                    }
                    EventKind::Image if message.kind == MessageType::Image => {
                        out.push(Invocation::Image {
                            caption: body.map(str::to_string),
                        })
                    }
                    EventKind::Video if message.kind == MessageType::Video => {
                        out.push(Invocation::Video)
                    }
                    EventKind::Sticker if message.kind == MessageType::Sticker => {
                        out.push(Invocation::Sticker)
                    }
                    EventKind::Delete => {
                        if message.kind == MessageType::Protocol {
                            out.push(Invocation::Delete {
                                revoked_id: message.revoked_id.clone(),
                            });
                        }
                        if delete_fallthrough {
                            out.push(Invocation::Message);
                        }
                    }
                    EventKind::Message => out.push(Invocation::Message),
                    _ => {}
                }
                out
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::message;

    #[test]
    fn test_pattern_strips_match_and_trims() {
        let trigger = Trigger::pattern("^!ping").unwrap();
        let msg = message("123@s.whatsapp.net", "!ping");
        assert_eq!(
            trigger.invocations(&msg, false),
            vec![Invocation::Pattern {
                matched: String::new()
            }]
        );

        let msg = message("123@s.whatsapp.net", "!ping   hello world ");
        assert_eq!(
            trigger.invocations(&msg, false)[0].text(),
            Some("hello world")
        );
    }

    #[test]
    fn test_pattern_strip_is_case_insensitive() {
        let pattern = CommandPattern::parse("^!ping").unwrap();
        assert!(!pattern.is_match("!PING now"));
        assert_eq!(pattern.strip("!PING now"), "now");
    }

    #[test]
    fn test_pattern_requires_body() {
        let trigger = Trigger::pattern(".*").unwrap();
        let mut msg = message("123@s.whatsapp.net", "x");
        msg.body = None;
        assert!(trigger.invocations(&msg, false).is_empty());
    }

    #[test]
    fn test_event_kinds_match_message_type() {
        let mut msg = message("123@s.whatsapp.net", "caption");
        msg.kind = MessageType::Image;

        assert_eq!(
            Trigger::event(EventKind::Image).invocations(&msg, false),
            vec![Invocation::Image {
                caption: Some("caption".into())
            }]
        );
        assert!(Trigger::event(EventKind::Video)
            .invocations(&msg, false)
            .is_empty());
        assert_eq!(
            Trigger::event(EventKind::Text).invocations(&msg, false),
            vec![Invocation::Text {
                body: "caption".into()
            }]
        );
        assert_eq!(
            Trigger::event(EventKind::Message).invocations(&msg, false),
            vec![Invocation::Message]
        );
    }

    #[test]
    fn test_delete_carries_revoked_id() {
        let mut msg = message("123@s.whatsapp.net", "");
        msg.body = None;
        msg.kind = MessageType::Protocol;
        msg.revoked_id = Some("ABC".into());

        assert_eq!(
            Trigger::event(EventKind::Delete).invocations(&msg, false),
            vec![Invocation::Delete {
                revoked_id: Some("ABC".into())
            }]
        );
    }

    #[test]
    fn test_delete_fallthrough_fires_for_every_message() {
        let msg = message("123@s.whatsapp.net", "hi");
        let trigger = Trigger::event(EventKind::Delete);
        assert!(trigger.invocations(&msg, false).is_empty());
        assert_eq!(trigger.invocations(&msg, true), vec![Invocation::Message]);
    }

    #[test]
    fn test_delete_fallthrough_on_revoke_fires_twice() {
        let mut msg = message("123@s.whatsapp.net", "");
        msg.body = None;
        msg.kind = MessageType::Protocol;
        msg.revoked_id = Some("GONE".into());
        let trigger = Trigger::event(EventKind::Delete);

        assert_eq!(
            trigger.invocations(&msg, false),
            vec![Invocation::Delete {
                revoked_id: Some("GONE".into())
            }]
        );
        assert_eq!(
            trigger.invocations(&msg, true),
            vec![
                Invocation::Delete {
                    revoked_id: Some("GONE".into())
                },
                Invocation::Message,
            ]
        );
    }

    #[test]
    fn test_event_kind_parse() {
        assert_eq!("photo".parse::<EventKind>().unwrap(), EventKind::Image);
        assert_eq!("TEXT".parse::<EventKind>().unwrap(), EventKind::Text);
        assert!("poll".parse::<EventKind>().is_err());
    }
}
