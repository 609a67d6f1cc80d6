//! Workflow configuration.
//!
//! Loaded from an optional TOML file with environment variables as the
//! fallback for every field, so a bare `nullsweep run` works against a
//! local OpenAI-compatible endpoint without any file on disk.
//!
//! Environment variables:
//!
//! | Variable                   | Default                          |
//! |----------------------------|----------------------------------|
//! | NULLSWEEP_CHAT_URL         | http://localhost:1234/v1         |
//! | NULLSWEEP_CHAT_MODEL       | qwen2.5-coder-32b-instruct       |
//! | NULLSWEEP_CHAT_API_KEY     | (none)                           |
//! | NULLSWEEP_CHECKER_CMD      | nullaway-check --format json     |
//! | NULLSWEEP_SLICER_CMD       | nullslice --format json          |
//! | NULLSWEEP_CORPUS_PATH      | nullsweep-training.json          |

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::Context as _;
use serde::{Deserialize, Serialize};

use crate::retry::RetryPolicy;

/// One OpenAI-compatible chat endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatEndpoint {
    /// Base URL including the `/v1` suffix.
    pub url: String,
    pub model: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,
}

impl Default for ChatEndpoint {
    fn default() -> Self {
        Self {
            url: env_or("NULLSWEEP_CHAT_URL", "http://localhost:1234/v1"),
            model: env_or("NULLSWEEP_CHAT_MODEL", "qwen2.5-coder-32b-instruct"),
            api_key: std::env::var("NULLSWEEP_CHAT_API_KEY").ok(),
        }
    }
}

/// Retry settings in file-friendly units.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(default)]
pub struct RetrySettings {
    pub attempts: u32,
    pub delay_ms: u64,
}

impl Default for RetrySettings {
    fn default() -> Self {
        Self {
            attempts: 3,
            delay_ms: 5000,
        }
    }
}

impl RetrySettings {
    pub fn policy(&self) -> RetryPolicy {
        RetryPolicy::new(self.attempts, Duration::from_millis(self.delay_ms))
    }
}

/// Complete workflow configuration. Every field has a default; a partial
/// TOML file overrides only what it names.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WorkflowConfig {
    /// Slice size (characters) above which a summary is generated before
    /// the level 2 annotation call.
    pub summary_threshold: usize,
    pub retry: RetrySettings,
    /// Endpoint for the level 1 conservative annotator.
    pub conservative: ChatEndpoint,
    /// Endpoint for the level 2 semantics-preserving annotator.
    pub deep: ChatEndpoint,
    /// Endpoint for the level 3 aggressive fixer (also the tuned model).
    pub aggressive: ChatEndpoint,
    /// Endpoint for context derivation and summarization.
    pub focus: ChatEndpoint,
    /// Shell command line for the static checker; must emit JSON findings
    /// on stdout.
    pub checker_cmd: String,
    /// Shell command line for the slice extractor; receives the finding as
    /// JSON on the command line.
    pub slicer_cmd: String,
    /// Where the training corpus is written.
    pub training_corpus_path: PathBuf,
}

impl Default for WorkflowConfig {
    fn default() -> Self {
        Self {
            summary_threshold: 300,
            retry: RetrySettings::default(),
            conservative: ChatEndpoint::default(),
            deep: ChatEndpoint::default(),
            aggressive: ChatEndpoint::default(),
            focus: ChatEndpoint::default(),
            checker_cmd: env_or("NULLSWEEP_CHECKER_CMD", "nullaway-check --format json"),
            slicer_cmd: env_or("NULLSWEEP_SLICER_CMD", "nullslice --format json"),
            training_corpus_path: PathBuf::from(env_or(
                "NULLSWEEP_CORPUS_PATH",
                "nullsweep-training.json",
            )),
        }
    }
}

impl WorkflowConfig {
    /// Load configuration: defaults, overridden by the TOML file when one
    /// is given.
    pub fn load(path: Option<&Path>) -> anyhow::Result<Self> {
        let Some(path) = path else {
            return Ok(Self::default());
        };
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("reading config file {}", path.display()))?;
        let config: Self = toml::from_str(&text)
            .with_context(|| format!("parsing config file {}", path.display()))?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> anyhow::Result<()> {
        if self.retry.attempts == 0 {
            anyhow::bail!("retry.attempts must be at least 1");
        }
        if self.checker_cmd.trim().is_empty() {
            anyhow::bail!("checker_cmd must not be empty");
        }
        Ok(())
    }
}

fn env_or(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}
