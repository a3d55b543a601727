//! Errors - 実行エラー
//!
//! リモート側の失敗は `RemoteCommandFailure` の 1 種類だけです。
//! 「virtualenv が無い」「sdist が失敗」「mv が失敗」は区別せず、
//! どのステップで落ちたかを `step` で示すだけにとどめます。

use super::command::Step;
use super::host::RoleSelector;

/// TransportError はコマンドを届けること自体の失敗
///
/// リモートで実行されて非 0 で終わった場合はこちらではなく
/// `CommandResult` の exit_code で表現される。
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    #[error("failed to spawn `{program}`: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("{0}")]
    Other(String),
}

/// ExecutionError はタスク実行のエラー
#[derive(Debug, thiserror::Error)]
pub enum ExecutionError {
    #[error(
        "command failed on {host} during {step} (exit code {exit_code}): {command}{}",
        stderr_suffix(.stderr)
    )]
    RemoteCommandFailure {
        host: String,
        step: Step,
        command: String,
        exit_code: i32,
        stdout: String,
        stderr: String,
    },

    #[error("could not reach {host} during {step}: {source}")]
    Transport {
        host: String,
        step: Step,
        #[source]
        source: TransportError,
    },

    #[error("no hosts match {0}")]
    NoMatchingHosts(RoleSelector),

    #[error("run was interrupted")]
    Interrupted,
}

fn stderr_suffix(stderr: &str) -> String {
    let trimmed = stderr.trim();
    if trimmed.is_empty() {
        String::new()
    } else {
        format!("\n{trimmed}")
    }
}

impl ExecutionError {
    /// 失敗したホスト名（ホストに紐づかないエラーは None）
    pub fn host(&self) -> Option<&str> {
        match self {
            Self::RemoteCommandFailure { host, .. } | Self::Transport { host, .. } => Some(host),
            Self::NoMatchingHosts(_) | Self::Interrupted => None,
        }
    }

    pub fn exit_code(&self) -> Option<i32> {
        match self {
            Self::RemoteCommandFailure { exit_code, .. } => Some(*exit_code),
            _ => None,
        }
    }
}
