//! Bridge configuration parsing and validation.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;

use crate::{AppError, Result};

/// How the worker process is launched.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub struct WorkerConfig {
    /// Executable to launch (e.g. `python`).
    #[serde(default = "default_program")]
    pub program: String,
    /// Arguments passed to the executable, typically the worker script.
    #[serde(default = "default_args")]
    pub args: Vec<String>,
    /// Longest stdout line accepted from the worker, in bytes.
    #[serde(default = "default_max_line_bytes")]
    pub max_line_bytes: usize,
    /// Time allowed between the terminate signal and a forced kill.
    #[serde(default = "default_stop_grace_ms")]
    pub stop_grace_ms: u64,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            program: default_program(),
            args: default_args(),
            max_line_bytes: default_max_line_bytes(),
            stop_grace_ms: default_stop_grace_ms(),
        }
    }
}

fn default_program() -> String {
    "python".into()
}

fn default_args() -> Vec<String> {
    vec!["back.py".into()]
}

fn default_max_line_bytes() -> usize {
    1_048_576
}

fn default_stop_grace_ms() -> u64 {
    2000
}

/// Editor-facing behaviour.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub struct EditorConfig {
    /// Delay between paced line insertions.
    #[serde(default = "default_pacing_ms")]
    pub pacing_ms: u64,
    /// Apply `clear_editor` / `type_word` actions sent by the worker.
    #[serde(default)]
    pub honor_worker_edits: bool,
}

impl Default for EditorConfig {
    fn default() -> Self {
        Self {
            pacing_ms: default_pacing_ms(),
            honor_worker_edits: false,
        }
    }
}

fn default_pacing_ms() -> u64 {
    150
}

/// Conversation persistence settings.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub struct ConversationConfig {
    /// Key under which the conversation is stored.
    #[serde(default = "default_state_key")]
    pub state_key: String,
}

impl Default for ConversationConfig {
    fn default() -> Self {
        Self {
            state_key: default_state_key(),
        }
    }
}

fn default_state_key() -> String {
    "conversation".into()
}

fn default_workspace_root() -> PathBuf {
    PathBuf::from(".")
}

/// Top-level configuration parsed from `bridge.toml`.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub struct BridgeConfig {
    /// Workspace root: worker working directory and persisted state scope.
    #[serde(default = "default_workspace_root")]
    pub workspace_root: PathBuf,
    /// Explicit path of the state database; derived from the workspace when absent.
    #[serde(default)]
    pub state_db: Option<PathBuf>,
    /// Worker launch settings.
    #[serde(default)]
    pub worker: WorkerConfig,
    /// Editor settings.
    #[serde(default)]
    pub editor: EditorConfig,
    /// Conversation settings.
    #[serde(default)]
    pub conversation: ConversationConfig,
}

impl BridgeConfig {
    /// Load and validate configuration from a TOML file path.
    ///
    /// A relative `workspace_root` is resolved against the directory that
    /// contains the file.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Config` if the file cannot be read or contains
    /// invalid TOML, or if validation fails.
    pub fn load_from_path(path: impl AsRef<Path>) -> Result<Self> {
        Self::load(Some(path.as_ref()), None)
    }

    /// Build the effective configuration from an optional file and an
    /// optional workspace override, validating once both are applied.
    ///
    /// Without a file the built-in defaults are used. The override, when
    /// given, replaces the file's `workspace_root` before validation, so an
    /// unusable root in the file does not matter.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Config` if the file cannot be read or parsed, or
    /// if validation fails.
    pub fn load(path: Option<&Path>, workspace_override: Option<&Path>) -> Result<Self> {
        let mut config = match path {
            Some(path) => {
                let raw = fs::read_to_string(path)
                    .map_err(|err| AppError::Config(format!("failed to read config: {err}")))?;
                let mut config = Self::parse(&raw)?;
                if config.workspace_root.is_relative() {
                    if let Some(dir) = path.parent() {
                        config.workspace_root = dir.join(&config.workspace_root);
                    }
                }
                config
            }
            None => Self::parse("")?,
        };

        if let Some(root) = workspace_override {
            config.workspace_root = root.to_path_buf();
        }

        config.validate()?;
        Ok(config)
    }

    /// Parse configuration from a TOML string and normalize paths.
    ///
    /// A relative `workspace_root` is resolved against the current directory.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Config` if parsing or validation fails.
    pub fn from_toml_str(raw: &str) -> Result<Self> {
        let mut config = Self::parse(raw)?;
        config.validate()?;
        Ok(config)
    }

    fn parse(raw: &str) -> Result<Self> {
        Ok(toml::from_str(raw)?)
    }

    /// Replace the workspace root, canonicalizing the new path.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Config` if the path does not exist.
    pub fn set_workspace_root(&mut self, root: impl AsRef<Path>) -> Result<()> {
        self.workspace_root = root
            .as_ref()
            .canonicalize()
            .map_err(|err| AppError::Config(format!("workspace_root invalid: {err}")))?;
        Ok(())
    }

    /// Path of the `SQLite` file holding per-workspace state.
    #[must_use]
    pub fn state_db_path(&self) -> PathBuf {
        match &self.state_db {
            Some(path) if path.is_absolute() => path.clone(),
            Some(path) => self.workspace_root.join(path),
            None => self.workspace_root.join(".bridge").join("state.db"),
        }
    }

    /// Scope string used to partition persisted state.
    #[must_use]
    pub fn workspace_scope(&self) -> String {
        self.workspace_root.to_string_lossy().into_owned()
    }

    /// Pacing delay between inserted lines.
    #[must_use]
    pub fn pacing(&self) -> Duration {
        Duration::from_millis(self.editor.pacing_ms)
    }

    /// Grace period between terminate and kill when stopping the worker.
    #[must_use]
    pub fn stop_grace(&self) -> Duration {
        Duration::from_millis(self.worker.stop_grace_ms)
    }

    fn validate(&mut self) -> Result<()> {
        if self.worker.program.trim().is_empty() {
            return Err(AppError::Config("worker.program must not be empty".into()));
        }

        if self.worker.max_line_bytes == 0 {
            return Err(AppError::Config(
                "worker.max_line_bytes must be greater than zero".into(),
            ));
        }

        if self.conversation.state_key.trim().is_empty() {
            return Err(AppError::Config(
                "conversation.state_key must not be empty".into(),
            ));
        }

        let root = self.workspace_root.clone();
        self.set_workspace_root(root)
    }
}
