//! Error types shared across the bridge.

use std::fmt::{Display, Formatter};

/// Shared bridge result type.
pub type Result<T> = std::result::Result<T, AppError>;

/// Bridge error enumeration covering all domain failure modes.
#[derive(Debug)]
pub enum AppError {
    /// Configuration parsing or validation failure.
    Config(String),
    /// Persistence failure when interacting with `SQLite`.
    Db(String),
    /// The worker process could not be started.
    Spawn(String),
    /// A command was issued while no worker is attached.
    NotRunning,
    /// Malformed line from the worker or an unencodable command.
    Protocol(String),
    /// Editor collaborator failure.
    Editor(String),
    /// File-system or I/O operation failure.
    Io(String),
}

impl Display for AppError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Config(msg) => write!(f, "config: {msg}"),
            Self::Db(msg) => write!(f, "db: {msg}"),
            Self::Spawn(msg) => write!(f, "spawn: {msg}"),
            Self::NotRunning => write!(f, "worker process is not running"),
            Self::Protocol(msg) => write!(f, "protocol: {msg}"),
            Self::Editor(msg) => write!(f, "editor: {msg}"),
            Self::Io(msg) => write!(f, "io: {msg}"),
        }
    }
}

impl std::error::Error for AppError {}

impl From<toml::de::Error> for AppError {
    fn from(err: toml::de::Error) -> Self {
        Self::Config(format!("invalid config: {err}"))
    }
}

impl From<sqlx::Error> for AppError {
    fn from(err: sqlx::Error) -> Self {
        Self::Db(err.to_string())
    }
}

impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        Self::Protocol(err.to_string())
    }
}

impl From<std::io::Error> for AppError {
    fn from(err: std::io::Error) -> Self {
        Self::Io(err.to_string())
    }
}
