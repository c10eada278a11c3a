//! Connection lifecycle state machine.
//!
//! ```text
//!              open                      close (not logged out)
//! Connecting ───────▶ Open ───────────────────────────▶ ClosedRecoverable
//!     ▲   │                  │                                 │
//!     │   │ connect failed   │ close (logged out)              │ after reconnect delay
//!     │   ▼                  ▼                                 │
//!     │ ClosedRecoverable  ClosedTerminal ──▶ exit 0           │
//!     └────────────────────────────────────────────────────────┘
//! ```
//!
//! The supervisor only decides; the runtime performs the returned
//! [`SupervisorAction`] (sleeping, reconnecting, exiting).

use std::fmt;
use std::time::Duration;

use tracing::{debug, info, warn};

use asena_core::{ConnectionPhase, ConnectionUpdate, DisconnectReason, TransportError};

use crate::config::ConnectionConfig;

/// Where the session currently is.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SupervisorState {
    Connecting,
    Open,
    ClosedRecoverable,
    ClosedTerminal,
}

impl SupervisorState {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Connecting => "connecting",
            Self::Open => "open",
            Self::ClosedRecoverable => "closed-recoverable",
            Self::ClosedTerminal => "closed-terminal",
        }
    }
}

impl fmt::Display for SupervisorState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What the runtime must do after a lifecycle input.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SupervisorAction {
    None,
    /// The session just opened: send presence and the startup notice.
    AnnounceStartup,
    /// Wait, then open a new session.
    Reconnect { after: Duration },
    /// Wait, then stop the process with `exit_code`.
    Terminate { after: Duration, exit_code: i32 },
}

/// Connection supervisor.
#[derive(Debug, Clone)]
pub struct Supervisor {
    state: SupervisorState,
    reconnect_delay: Duration,
    logout_exit_delay: Duration,
    reconnects: u64,
}

impl Supervisor {
    pub fn new(reconnect_delay: Duration, logout_exit_delay: Duration) -> Self {
        Self {
            state: SupervisorState::Connecting,
            reconnect_delay,
            logout_exit_delay,
            reconnects: 0,
        }
    }

    pub fn from_config(config: &ConnectionConfig) -> Self {
        Self::new(config.reconnect_delay(), config.logout_exit_delay())
    }

    pub fn state(&self) -> SupervisorState {
        self.state
    }

    pub fn is_terminal(&self) -> bool {
        self.state == SupervisorState::ClosedTerminal
    }

    /// Number of reconnects scheduled so far.
    pub fn reconnects(&self) -> u64 {
        self.reconnects
    }

    /// Enters `Connecting` before a connect attempt. Returns `false` once the
    /// supervisor is terminal.
    pub fn begin_connect(&mut self) -> bool {
        if self.is_terminal() {
            return false;
        }
        self.state = SupervisorState::Connecting;
        true
    }

    /// The transport could not be established at all.
    pub fn on_connect_failed(&mut self, error: &TransportError) -> SupervisorAction {
        if self.is_terminal() {
            return SupervisorAction::None;
        }
        warn!(error = %error, "Connect attempt failed");
        self.schedule_reconnect()
    }

    /// Feeds one `connection.update`.
    pub fn on_connection_update(&mut self, update: &ConnectionUpdate) -> SupervisorAction {
        if self.is_terminal() {
            debug!("Ignoring connection update after logout");
            return SupervisorAction::None;
        }
        if update.qr.is_some() {
            info!("Pairing code received; scan it with the phone to log in");
        }

        match update.connection {
            Some(ConnectionPhase::Connecting) => {
                self.state = SupervisorState::Connecting;
                SupervisorAction::None
            }
            Some(ConnectionPhase::Open) => {
                if self.state == SupervisorState::Open {
                    return SupervisorAction::None;
                }
                self.state = SupervisorState::Open;
                info!("Session open");
                SupervisorAction::AnnounceStartup
            }
            Some(ConnectionPhase::Close) => {
                let reason = update
                    .last_disconnect
                    .as_ref()
                    .map_or(DisconnectReason::Unknown(None), |d| d.reason());
                self.on_close(reason)
            }
            None => SupervisorAction::None,
        }
    }

    fn on_close(&mut self, reason: DisconnectReason) -> SupervisorAction {
        if reason.is_terminal() {
            self.state = SupervisorState::ClosedTerminal;
            warn!(
                reason = ?reason,
                exit_in_ms = self.logout_exit_delay.as_millis() as u64,
                "Logged out; terminating"
            );
            return SupervisorAction::Terminate {
                after: self.logout_exit_delay,
                exit_code: 0,
            };
        }
        if self.state == SupervisorState::ClosedRecoverable {
            debug!(reason = ?reason, "Close while already reconnecting");
            return SupervisorAction::None;
        }
        info!(reason = ?reason, code = reason.status_code(), "Connection closed");
        self.schedule_reconnect()
    }

    fn schedule_reconnect(&mut self) -> SupervisorAction {
        self.state = SupervisorState::ClosedRecoverable;
        self.reconnects += 1;
        SupervisorAction::Reconnect {
            after: self.reconnect_delay,
        }
    }
}
