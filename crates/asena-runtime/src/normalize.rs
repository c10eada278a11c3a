//! Raw `messages.upsert` entries to [`NormalizedMessage`] records.
//!
//! An entry looks like
//!
//! ```json
//! {
//!   "key": { "remoteJid": "123@g.us", "fromMe": false, "id": "ABC", "participant": "1555@s.whatsapp.net" },
//!   "pushName": "Alice",
//!   "message": { "extendedTextMessage": { "text": "!ping" } }
//! }
//! ```
//!
//! Entries without any message content (receipts, stubs) produce no record.

use std::collections::HashSet;

use serde_json::{Map, Value};
use tracing::trace;

use asena_core::{Jid, MessageKey, MessageType, NormalizeError, NormalizedMessage};

/// Wrappers whose inner `message` carries the real content.
const ENVELOPES: &[&str] = &[
    "ephemeralMessage",
    "viewOnceMessage",
    "viewOnceMessageV2",
    "viewOnceMessageV2Extension",
    "documentWithCaptionMessage",
];

/// Keys that sit next to the content and never describe it.
const IGNORED_KEYS: &[&str] = &["senderKeyDistributionMessage", "messageContextInfo"];

/// Where a body can be found, per content kind.
const BODY_POINTERS: &[&str] = &[
    "/conversation",
    "/extendedTextMessage/text",
    "/imageMessage/caption",
    "/videoMessage/caption",
    "/documentMessage/caption",
    "/buttonsResponseMessage/selectedButtonId",
    "/listResponseMessage/singleSelectReply/selectedRowId",
    "/templateButtonReplyMessage/selectedId",
];

/// Converts raw upsert entries into message records.
#[derive(Debug, Clone, Default)]
pub struct Normalizer {
    sudo: HashSet<String>,
}

impl Normalizer {
    /// `sudo` holds the user parts (phone numbers) of privileged senders.
    pub fn new<I, S>(sudo: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            sudo: sudo.into_iter().map(Into::into).collect(),
        }
    }

    /// Normalizes one entry. `self_id` is the own account, used as the sender
    /// of messages the account sent itself.
    pub fn normalize(
        &self,
        raw: &Value,
        self_id: Option<&Jid>,
    ) -> Result<Option<NormalizedMessage>, NormalizeError> {
        let key_value = raw
            .get("key")
            .ok_or(NormalizeError::MissingField("key"))?;
        let key: MessageKey = serde_json::from_value(key_value.clone())
            .map_err(|e| NormalizeError::Malformed(format!("key: {e}")))?;
        if key.id.is_empty() {
            return Err(NormalizeError::MissingField("key.id"));
        }

        let Some(content) = raw
            .get("message")
            .and_then(Value::as_object)
            .map(unwrap_envelopes)
        else {
            trace!(id = %key.id, "Entry has no message content");
            return Ok(None);
        };
        let Some(kind) = content_kind(content) else {
            trace!(id = %key.id, "Entry has only auxiliary keys");
            return Ok(None);
        };

        let content_value = Value::Object(content.clone());
        let body = BODY_POINTERS
            .iter()
            .find_map(|p| content_value.pointer(p).and_then(Value::as_str))
            .filter(|s| !s.is_empty())
            .map(str::to_string);
        let revoked_id = content_value
            .pointer("/protocolMessage/key/id")
            .and_then(Value::as_str)
            .map(str::to_string);

        let sender = self.sender_of(raw, &key, self_id)?;
        let sudo = key.from_me || self.sudo.contains(sender.user());
        let push_name = raw
            .get("pushName")
            .and_then(Value::as_str)
            .filter(|s| !s.is_empty())
            .map(str::to_string);

        Ok(Some(NormalizedMessage {
            id: key.id.clone(),
            chat: key.remote_jid.clone(),
            sender,
            body,
            kind,
            from_self: key.from_me,
            sudo,
            push_name,
            key,
            revoked_id,
            raw: raw.clone(),
        }))
    }

    fn sender_of(
        &self,
        raw: &Value,
        key: &MessageKey,
        self_id: Option<&Jid>,
    ) -> Result<Jid, NormalizeError> {
        if key.from_me {
            if let Some(own) = self_id {
                return Ok(own.without_device());
            }
        }
        if key.remote_jid.is_group() {
            let participant = key
                .participant
                .clone()
                .or_else(|| {
                    raw.get("participant")
                        .and_then(Value::as_str)
                        .map(Jid::new)
                })
                .ok_or(NormalizeError::MissingField("key.participant"))?;
            return Ok(participant.without_device());
        }
        Ok(key.remote_jid.without_device())
    }
}

fn unwrap_envelopes(mut message: &Map<String, Value>) -> &Map<String, Value> {
    loop {
        let inner = ENVELOPES.iter().find_map(move |envelope| {
            message
                .get(*envelope)
                .and_then(|e| e.get("message"))
                .and_then(Value::as_object)
        });
        match inner {
            Some(inner) => message = inner,
            None => return message,
        }
    }
}

/// First content key in wire order. Only `conversation` and `*Message` keys
/// describe content; siblings such as `botInvokeInfo` are skipped.
fn content_kind(message: &Map<String, Value>) -> Option<MessageType> {
    message
        .keys()
        .find(|k| {
            !IGNORED_KEYS.contains(&k.as_str())
                && (k.as_str() == "conversation" || k.contains("Message"))
        })
        .map(|k| MessageType::from_wire(k))
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn own() -> Jid {
        Jid::new("10000:5@s.whatsapp.net")
    }

    #[test]
    fn test_group_text() {
        let raw = json!({
            "key": { "remoteJid": "123@g.us", "fromMe": false, "id": "A1", "participant": "1555:3@s.whatsapp.net" },
            "pushName": "Alice",
            "message": { "conversation": "!ping" },
        });
        let msg = Normalizer::default().normalize(&raw, Some(&own())).unwrap().unwrap();

        assert_eq!(msg.id, "A1");
        assert_eq!(msg.chat, Jid::new("123@g.us"));
        assert_eq!(msg.sender, Jid::new("1555@s.whatsapp.net"));
        assert_eq!(msg.body(), Some("!ping"));
        assert_eq!(msg.kind, MessageType::Text);
        assert_eq!(msg.push_name.as_deref(), Some("Alice"));
        assert!(!msg.sudo);
        assert!(msg.is_group());
    }

    #[test]
    fn test_from_self_is_sudo_and_uses_own_id() {
        let raw = json!({
            "key": { "remoteJid": "2@s.whatsapp.net", "fromMe": true, "id": "A2" },
            "message": { "extendedTextMessage": { "text": ".alive" } },
        });
        let msg = Normalizer::default().normalize(&raw, Some(&own())).unwrap().unwrap();
        assert!(msg.from_self);
        assert!(msg.sudo);
        assert_eq!(msg.sender, Jid::new("10000@s.whatsapp.net"));
        assert_eq!(msg.kind, MessageType::ExtendedText);
        assert_eq!(msg.body(), Some(".alive"));
    }

    #[test]
    fn test_sudo_list_matches_user_part() {
        let raw = json!({
            "key": { "remoteJid": "15551234567@s.whatsapp.net", "fromMe": false, "id": "A3" },
            "message": { "conversation": "hi" },
        });
        let msg = Normalizer::new(["15551234567"]).normalize(&raw, None).unwrap().unwrap();
        assert!(msg.sudo);
    }

    #[test]
    fn test_unwraps_envelopes_and_skips_auxiliary_keys() {
        let raw = json!({
            "key": { "remoteJid": "2@s.whatsapp.net", "id": "A4" },
            "message": {
                "ephemeralMessage": { "message": {
                    "viewOnceMessageV2": { "message": {
                        "messageContextInfo": {},
                        "imageMessage": { "caption": "look", "mimetype": "image/jpeg" },
                    }},
                }},
            },
        });
        let msg = Normalizer::default().normalize(&raw, None).unwrap().unwrap();
        assert_eq!(msg.kind, MessageType::Image);
        assert_eq!(msg.body(), Some("look"));
    }

    #[test]
    fn test_revoke_carries_deleted_id() {
        let raw = json!({
            "key": { "remoteJid": "2@s.whatsapp.net", "id": "A5" },
            "message": { "protocolMessage": { "type": 0, "key": { "remoteJid": "2@s.whatsapp.net", "id": "GONE" } } },
        });
        let msg = Normalizer::default().normalize(&raw, None).unwrap().unwrap();
        assert_eq!(msg.kind, MessageType::Protocol);
        assert_eq!(msg.revoked_id.as_deref(), Some("GONE"));
        assert_eq!(msg.body(), None);
    }

    #[test]
    fn test_button_reply_body() {
        let raw = json!({
            "key": { "remoteJid": "2@s.whatsapp.net", "id": "A6" },
            "message": { "buttonsResponseMessage": { "selectedButtonId": ".menu" } },
        });
        let msg = Normalizer::default().normalize(&raw, None).unwrap().unwrap();
        assert_eq!(msg.body(), Some(".menu"));
        assert_eq!(msg.kind, MessageType::Other("buttonsResponseMessage".into()));
    }

    #[test]
    fn test_contentless_entries_are_skipped() {
        let normalizer = Normalizer::default();
        for raw in [
            json!({ "key": { "remoteJid": "2@s.whatsapp.net", "id": "A7" } }),
            json!({ "key": { "remoteJid": "2@s.whatsapp.net", "id": "A8" }, "message": null }),
            json!({ "key": { "remoteJid": "2@s.whatsapp.net", "id": "A9" }, "message": { "messageContextInfo": {} } }),
        ] {
            assert!(normalizer.normalize(&raw, None).unwrap().is_none());
        }
    }

    #[test]
    fn test_malformed_entries() {
        let normalizer = Normalizer::default();
        assert!(matches!(
            normalizer.normalize(&json!({ "message": { "conversation": "x" } }), None),
            Err(NormalizeError::MissingField("key"))
        ));
        assert!(matches!(
            normalizer.normalize(
                &json!({ "key": { "remoteJid": "1@g.us", "id": "B1" }, "message": { "conversation": "x" } }),
                None
            ),
            Err(NormalizeError::MissingField("key.participant"))
        ));
        assert!(matches!(
            normalizer.normalize(&json!({ "key": { "id": "B2" } }), None),
            Err(NormalizeError::Malformed(_))
        ));
    }

    #[test]
    fn test_content_kind_skips_non_message_keys_in_wire_order() {
        let raw = json!({
            "key": { "remoteJid": "2@s.whatsapp.net", "fromMe": false, "id": "A9" },
            "message": {
                "botInvokeInfo": {},
                "videoMessage": { "caption": "clip" },
                "audioMessage": {},
            },
        });
        let msg = Normalizer::default().normalize(&raw, Some(&own())).unwrap().unwrap();
        assert_eq!(msg.kind, MessageType::Video);
        assert_eq!(msg.body(), Some("clip"));

        let raw = json!({
            "key": { "remoteJid": "2@s.whatsapp.net", "fromMe": false, "id": "A10" },
            "message": { "botInvokeInfo": {} },
        });
        assert!(Normalizer::default().normalize(&raw, Some(&own())).unwrap().is_none());
    }
}
