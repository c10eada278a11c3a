//! Configuration schema definitions.

use std::collections::HashMap;
use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use asena_framework::{DEFAULT_HANDLERS, JoinPolicy, WorkType};

/// Root configuration structure.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AsenaConfig {
    /// Command and message pipeline behaviour.
    #[serde(default)]
    pub bot: BotSettings,

    /// Bridge connection and supervisor timing.
    #[serde(default)]
    pub connection: ConnectionConfig,

    /// Where persistent state lives.
    #[serde(default)]
    pub storage: StorageConfig,

    /// Group join/leave messages.
    #[serde(default)]
    pub greetings: GreetingsConfig,

    /// Logging setup.
    #[serde(default)]
    pub logging: LoggingConfig,
}

// =============================================================================
// bot
// =============================================================================

/// Command and message pipeline settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BotSettings {
    /// Handler prefix expression, e.g. `^[.,!]`.
    #[serde(default = "default_handlers")]
    pub handlers: String,

    /// Whether commands default to owner-only.
    #[serde(default)]
    pub work_type: WorkType,

    /// Phone numbers (digits only) allowed to run owner-only commands.
    #[serde(default)]
    pub sudo: Vec<String>,

    /// Mark every incoming message as read.
    #[serde(default)]
    pub auto_read: bool,

    /// Mark status updates as read.
    #[serde(default)]
    pub auto_read_status: bool,

    /// Log every incoming message.
    #[serde(default)]
    pub log_messages: bool,

    /// Reject incoming calls.
    #[serde(default)]
    pub reject_calls: bool,

    /// Text sent to a caller whose call was rejected.
    #[serde(default)]
    pub call_reject_message: Option<String>,

    /// Let delete triggers also fire for every message.
    #[serde(default)]
    pub delete_fallthrough: bool,

    /// Whether dispatch waits for handlers.
    #[serde(default)]
    pub join_policy: JoinPolicy,

    /// Send handler fault texts to the bot's own chat.
    #[serde(default = "default_true")]
    pub report_faults: bool,

    /// Send the startup notice when a session opens.
    #[serde(default = "default_true")]
    pub startup_notice: bool,
}

impl Default for BotSettings {
    fn default() -> Self {
        Self {
            handlers: default_handlers(),
            work_type: WorkType::default(),
            sudo: Vec::new(),
            auto_read: false,
            auto_read_status: false,
            log_messages: false,
            reject_calls: false,
            call_reject_message: None,
            delete_fallthrough: false,
            join_policy: JoinPolicy::default(),
            report_faults: true,
            startup_notice: true,
        }
    }
}

fn default_handlers() -> String {
    DEFAULT_HANDLERS.to_string()
}

fn default_true() -> bool {
    true
}

// =============================================================================
// connection
// =============================================================================

/// Bridge connection settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConnectionConfig {
    /// Bridge WebSocket URL.
    #[serde(default = "default_url")]
    pub url: String,

    /// Delay before reconnecting after a recoverable close.
    #[serde(default = "default_reconnect_delay_ms")]
    pub reconnect_delay_ms: u64,

    /// Delay before exiting after a logout.
    #[serde(default = "default_logout_exit_delay_ms")]
    pub logout_exit_delay_ms: u64,

    /// Timeout for outbound API calls.
    #[serde(default = "default_api_timeout_secs")]
    pub api_timeout_secs: u64,

    /// Inbound event channel capacity.
    #[serde(default = "default_event_buffer")]
    pub event_buffer: usize,
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self {
            url: default_url(),
            reconnect_delay_ms: default_reconnect_delay_ms(),
            logout_exit_delay_ms: default_logout_exit_delay_ms(),
            api_timeout_secs: default_api_timeout_secs(),
            event_buffer: default_event_buffer(),
        }
    }
}

impl ConnectionConfig {
    pub fn reconnect_delay(&self) -> Duration {
        Duration::from_millis(self.reconnect_delay_ms)
    }

    pub fn logout_exit_delay(&self) -> Duration {
        Duration::from_millis(self.logout_exit_delay_ms)
    }

    pub fn api_timeout(&self) -> Duration {
        Duration::from_secs(self.api_timeout_secs)
    }
}

fn default_url() -> String {
    "ws://127.0.0.1:8765".to_string()
}

fn default_reconnect_delay_ms() -> u64 {
    300
}

fn default_logout_exit_delay_ms() -> u64 {
    3000
}

fn default_api_timeout_secs() -> u64 {
    30
}

fn default_event_buffer() -> usize {
    256
}

// =============================================================================
// storage
// =============================================================================

/// Persistent state locations.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Directory holding `creds.json`.
    #[serde(default = "default_session_dir")]
    pub session_dir: PathBuf,

    /// JSON file holding the paused chat list.
    #[serde(default = "default_paused_chats_file")]
    pub paused_chats_file: PathBuf,

    /// Number of raw messages kept for resend lookups.
    #[serde(default = "default_message_cache_size")]
    pub message_cache_size: usize,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            session_dir: default_session_dir(),
            paused_chats_file: default_paused_chats_file(),
            message_cache_size: default_message_cache_size(),
        }
    }
}

fn default_session_dir() -> PathBuf {
    PathBuf::from("session")
}

fn default_paused_chats_file() -> PathBuf {
    PathBuf::from("paused_chats.json")
}

fn default_message_cache_size() -> usize {
    1000
}

// =============================================================================
// greetings
// =============================================================================

/// Group greeting templates. `{user}` and `{group}` are substituted; an unset
/// template disables that greeting.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GreetingsConfig {
    #[serde(default)]
    pub welcome: Option<String>,
    #[serde(default)]
    pub goodbye: Option<String>,
}

// =============================================================================
// logging
// =============================================================================

/// Log verbosity.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Trace,
    Debug,
    #[default]
    Info,
    Warn,
    Error,
}

impl LogLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Trace => "trace",
            Self::Debug => "debug",
            Self::Info => "info",
            Self::Warn => "warn",
            Self::Error => "error",
        }
    }

    pub fn to_tracing_level(self) -> tracing::Level {
        match self {
            Self::Trace => tracing::Level::TRACE,
            Self::Debug => tracing::Level::DEBUG,
            Self::Info => tracing::Level::INFO,
            Self::Warn => tracing::Level::WARN,
            Self::Error => tracing::Level::ERROR,
        }
    }
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Log line format.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Compact,
    Full,
    Pretty,
    /// Requires the `json-log` feature.
    Json,
}

/// Log destination.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogOutput {
    #[default]
    Stdout,
    Stderr,
    File,
}

/// File rotation for [`LogOutput::File`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogRotation {
    #[default]
    Never,
    Hourly,
    Daily,
}

/// Which span lifecycle events are logged.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SpanEventConfig {
    #[serde(default)]
    pub new: bool,
    #[serde(default)]
    pub enter: bool,
    #[serde(default)]
    pub exit: bool,
    #[serde(default)]
    pub close: bool,
}

/// Logging settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default)]
    pub level: LogLevel,

    #[serde(default)]
    pub format: LogFormat,

    #[serde(default)]
    pub output: LogOutput,

    /// Log file for [`LogOutput::File`].
    #[serde(default)]
    pub file_path: Option<PathBuf>,

    #[serde(default)]
    pub rotation: LogRotation,

    /// Per-module levels, e.g. `asena_transport = "debug"`.
    #[serde(default)]
    pub filters: HashMap<String, LogLevel>,

    #[serde(default)]
    pub span_events: SpanEventConfig,

    #[serde(default)]
    pub thread_ids: bool,

    /// Include file and line in log lines.
    #[serde(default)]
    pub file_location: bool,
}
