//! Run configuration
//!
//! Defaults, then `tyfx.toml` beside the program, then `TYFX_*`
//! environment variables. Command-line flags are applied last by the
//! binary.

use crate::error::{LoadError, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// File looked up next to the program
pub const CONFIG_FILE: &str = "tyfx.toml";

pub const DEFAULT_MAX_DEPTH: usize = 4096;

/// What happens when a tag has no built-in or custom handler
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UnhandledPolicy {
    /// Diagnostic line, no result
    #[default]
    Lenient,
    /// UnhandledEffect fault
    Strict,
}

impl std::str::FromStr for UnhandledPolicy {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "lenient" => Ok(UnhandledPolicy::Lenient),
            "strict" => Ok(UnhandledPolicy::Strict),
            other => Err(format!("unknown unhandled-effect policy `{other}` (expected lenient or strict)")),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "kebab-case", deny_unknown_fields)]
pub struct Config {
    /// Exported alias evaluated as the program
    pub entry: String,
    pub unhandled: UnhandledPolicy,
    /// Evaluation nesting limit
    pub max_depth: usize,
    /// Print every result entry after the run
    pub dump_results: bool,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            entry: "main".to_string(),
            unhandled: UnhandledPolicy::Lenient,
            max_depth: DEFAULT_MAX_DEPTH,
            dump_results: false,
        }
    }
}

impl Config {
    pub fn from_toml(source: &str) -> Result<Self> {
        toml::from_str(source).map_err(|e| LoadError::config(format!("{CONFIG_FILE}: {}", e.message())))
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let source = std::fs::read_to_string(path)
            .map_err(|e| LoadError::io_error(format!("{}: {e}", path.display())))?;
        Self::from_toml(&source)
    }

    /// `tyfx.toml` in `dir` if it exists, otherwise defaults
    pub fn discover(dir: &Path) -> Result<Self> {
        let path = dir.join(CONFIG_FILE);
        if path.is_file() {
            tracing::debug!(path = %path.display(), "loading configuration");
            Self::from_file(&path)
        } else {
            Ok(Self::default())
        }
    }

    /// Overlay `TYFX_ENTRY`, `TYFX_UNHANDLED` and `TYFX_MAX_DEPTH`
    pub fn apply_env(self) -> Result<Self> {
        self.apply_env_with(|name| std::env::var(name).ok())
    }

    pub fn apply_env_with(mut self, lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        if let Some(entry) = lookup("TYFX_ENTRY").filter(|e| !e.is_empty()) {
            self.entry = entry;
        }
        if let Some(policy) = lookup("TYFX_UNHANDLED") {
            self.unhandled = policy.parse().map_err(|e| LoadError::config(format!("TYFX_UNHANDLED: {e}")))?;
        }
        if let Some(depth) = lookup("TYFX_MAX_DEPTH") {
            self.max_depth = depth
                .trim()
                .parse()
                .map_err(|_| LoadError::config(format!("TYFX_MAX_DEPTH: `{depth}` is not a positive integer")))?;
        }
        Ok(self)
    }
}
