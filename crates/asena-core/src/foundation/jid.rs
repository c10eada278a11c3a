//! Chat and account identifiers.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Server part of an individual account identifier.
pub const USER_SERVER: &str = "s.whatsapp.net";

/// Server part of a group chat identifier.
pub const GROUP_SERVER: &str = "g.us";

/// Identifier of the status broadcast pseudo-chat.
pub const STATUS_BROADCAST: &str = "status@broadcast";

/// An opaque conversation or account identifier (`user[:device]@server`).
///
/// The shell never interprets a jid beyond its server part and its user
/// part; everything else is passed through to the bridge untouched.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Jid(String);

impl Jid {
    /// Wraps a raw identifier.
    pub fn new(raw: impl Into<String>) -> Self {
        Self(raw.into())
    }

    /// Builds the identifier of an individual account from a phone number.
    pub fn from_number(number: &str) -> Self {
        let digits: String = number.chars().filter(char::is_ascii_digit).collect();
        Self(format!("{digits}@{USER_SERVER}"))
    }

    /// Returns the raw identifier.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Returns the user part without any `:device` suffix.
    pub fn user(&self) -> &str {
        let local = self.0.split_once('@').map_or(self.0.as_str(), |(u, _)| u);
        local.split_once(':').map_or(local, |(u, _)| u)
    }

    /// Returns the server part, or an empty string for a bare identifier.
    pub fn server(&self) -> &str {
        self.0.split_once('@').map_or("", |(_, s)| s)
    }

    /// Whether this identifies a group chat.
    pub fn is_group(&self) -> bool {
        self.server() == GROUP_SERVER
    }

    /// Whether this is the status broadcast pseudo-chat.
    pub fn is_status_broadcast(&self) -> bool {
        self.0 == STATUS_BROADCAST
    }

    /// Returns the identifier with the device suffix removed.
    ///
    /// `1555:12@s.whatsapp.net` becomes `1555@s.whatsapp.net`.
    pub fn without_device(&self) -> Jid {
        match self.server() {
            "" => Jid(self.user().to_string()),
            server => Jid(format!("{}@{}", self.user(), server)),
        }
    }
}

impl fmt::Display for Jid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for Jid {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl From<&str> for Jid {
    fn from(raw: &str) -> Self {
        Self::new(raw)
    }
}

impl From<String> for Jid {
    fn from(raw: String) -> Self {
        Self(raw)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_user_and_server_parts() {
        let jid = Jid::new("15550001111:7@s.whatsapp.net");
        assert_eq!(jid.user(), "15550001111");
        assert_eq!(jid.server(), USER_SERVER);
        assert_eq!(jid.without_device().as_str(), "15550001111@s.whatsapp.net");
    }

    #[test]
    fn test_group_and_status() {
        assert!(Jid::new("123@g.us").is_group());
        assert!(!Jid::new("123@s.whatsapp.net").is_group());
        assert!(Jid::new(STATUS_BROADCAST).is_status_broadcast());
    }

    #[test]
    fn test_from_number_strips_formatting() {
        assert_eq!(
            Jid::from_number("+1 (555) 000-1111").as_str(),
            "15550001111@s.whatsapp.net"
        );
    }
}
