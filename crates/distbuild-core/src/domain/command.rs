//! Command results and step identity.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Result of one remote command, as reported by the executor.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct CommandResult {
    /// Exit status. `-1` when the process was terminated by a signal.
    pub exit_code: i32,

    #[serde(default)]
    pub stdout: String,

    #[serde(default)]
    pub stderr: String,
}

impl CommandResult {
    pub fn success() -> Self {
        Self::default()
    }

    pub fn with_exit_code(exit_code: i32) -> Self {
        Self {
            exit_code,
            ..Self::default()
        }
    }

    pub fn with_stdout(mut self, stdout: impl Into<String>) -> Self {
        self.stdout = stdout.into();
        self
    }

    pub fn with_stderr(mut self, stderr: impl Into<String>) -> Self {
        self.stderr = stderr.into();
        self
    }

    pub fn is_success(&self) -> bool {
        self.exit_code == 0
    }
}

/// The two remote steps of `dependencies:install`, in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Step {
    /// virtualenv + activate + `setup.py sdist`
    BuildSdist,
    /// move `dist/*` into the distribution path
    CollectArtifacts,
}

impl Step {
    pub fn as_str(&self) -> &'static str {
        match self {
            Step::BuildSdist => "build_sdist",
            Step::CollectArtifacts => "collect_artifacts",
        }
    }
}

impl fmt::Display for Step {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.as_str())
    }
}
