//! Welcome and goodbye messages for group membership changes.

use tracing::{debug, warn};

use asena_core::{ApiResult, Jid, OutgoingMessage, ParticipantAction, ParticipantsUpdate, WaSocket};

use crate::config::GreetingsConfig;

/// Renders and sends greetings. `{user}` becomes an `@mention` of the
/// participant, `{group}` the group subject.
#[derive(Debug, Clone, Default)]
pub struct Greeter {
    welcome: Option<String>,
    goodbye: Option<String>,
}

impl Greeter {
    pub fn new(welcome: Option<String>, goodbye: Option<String>) -> Self {
        Self { welcome, goodbye }
    }

    pub fn from_config(config: &GreetingsConfig) -> Self {
        Self::new(config.welcome.clone(), config.goodbye.clone())
    }

    pub fn is_enabled(&self) -> bool {
        self.welcome.is_some() || self.goodbye.is_some()
    }

    fn template(&self, action: ParticipantAction) -> Option<&str> {
        match action {
            ParticipantAction::Add => self.welcome.as_deref(),
            ParticipantAction::Remove => self.goodbye.as_deref(),
            _ => None,
        }
    }

    /// Renders the greeting for one participant, `None` when the action has
    /// no template.
    pub fn render(&self, action: ParticipantAction, user: &Jid, group: &str) -> Option<String> {
        self.template(action).map(|template| {
            template
                .replace("{user}", &format!("@{}", user.user()))
                .replace("{group}", group)
        })
    }

    /// Sends one greeting per participant and returns how many were sent.
    pub async fn greet(&self, socket: &dyn WaSocket, update: &ParticipantsUpdate) -> ApiResult<usize> {
        let Some(template) = self.template(update.action) else {
            return Ok(0);
        };

        let group = if template.contains("{group}") {
            match socket.group_metadata(&update.id).await {
                Ok(meta) => meta.subject,
                Err(e) => {
                    warn!(group = %update.id, error = %e, "Group subject unavailable for greeting");
                    update.id.user().to_string()
                }
            }
        } else {
            String::new()
        };

        let mut sent = 0;
        for participant in &update.participants {
            let Some(text) = self.render(update.action, participant, &group) else {
                continue;
            };
            let message = OutgoingMessage::text(text).with_mentions([participant.clone()]);
            socket.send_message(&update.id, message).await?;
            sent += 1;
        }
        debug!(group = %update.id, action = ?update.action, sent, "Greetings sent");
        Ok(sent)
    }
}

#[cfg(test)]
mod tests {
    use asena_framework::testing::RecordingSocket;

    use super::*;

    fn update(action: ParticipantAction, participants: &[&str]) -> ParticipantsUpdate {
        ParticipantsUpdate {
            id: Jid::new("42@g.us"),
            participants: participants.iter().map(|p| Jid::new(*p)).collect(),
            action,
        }
    }

    #[test]
    fn test_render() {
        let greeter = Greeter::new(Some("Welcome {user} to {group}!".into()), None);
        assert_eq!(
            greeter
                .render(ParticipantAction::Add, &Jid::new("1555:2@s.whatsapp.net"), "Rustaceans")
                .as_deref(),
            Some("Welcome @1555 to Rustaceans!")
        );
        assert!(
            greeter
                .render(ParticipantAction::Remove, &Jid::new("1555@s.whatsapp.net"), "x")
                .is_none()
        );
    }

    #[tokio::test]
    async fn test_greets_each_participant_with_mention() {
        let socket = RecordingSocket::new().with_group("42@g.us", "Rustaceans");
        let greeter = Greeter::new(Some("Hi {user}, this is {group}".into()), Some("Bye {user}".into()));

        let sent = greeter
            .greet(&socket, &update(ParticipantAction::Add, &["1@s.whatsapp.net", "2@s.whatsapp.net"]))
            .await
            .unwrap();
        assert_eq!(sent, 2);
        assert_eq!(
            socket.sent_texts(),
            ["Hi @1, this is Rustaceans", "Hi @2, this is Rustaceans"]
        );
        let sent = socket.sent();
        assert_eq!(sent[0].0, Jid::new("42@g.us"));
        assert_eq!(sent[0].1.mentions, [Jid::new("1@s.whatsapp.net")]);
    }

    #[tokio::test]
    async fn test_disabled_and_unhandled_actions_send_nothing() {
        let socket = RecordingSocket::new();
        let greeter = Greeter::default();
        assert!(!greeter.is_enabled());
        assert_eq!(
            greeter
                .greet(&socket, &update(ParticipantAction::Add, &["1@s.whatsapp.net"]))
                .await
                .unwrap(),
            0
        );

        let greeter = Greeter::new(Some("Hi".into()), Some("Bye".into()));
        assert_eq!(
            greeter
                .greet(&socket, &update(ParticipantAction::Promote, &["1@s.whatsapp.net"]))
                .await
                .unwrap(),
            0
        );
        assert!(socket.sent().is_empty());
    }

    #[tokio::test]
    async fn test_unknown_group_falls_back_to_id() {
        let socket = RecordingSocket::new();
        let greeter = Greeter::new(None, Some("{user} left {group}".into()));
        greeter
            .greet(&socket, &update(ParticipantAction::Remove, &["7@s.whatsapp.net"]))
            .await
            .unwrap();
        assert_eq!(socket.sent_texts(), ["@7 left 42"]);
    }
}
