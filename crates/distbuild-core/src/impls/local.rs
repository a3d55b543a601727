//! LocalExecutor - 制御ホスト上で `bash -c` する
//!
//! `transport: local` のホストと、結合テストで使う。

use std::process::Stdio;

use async_trait::async_trait;
use tokio::process::Command;

use super::command_result;
use crate::domain::{CommandResult, HostRef, TransportError};
use crate::ports::RemoteExecutor;

#[derive(Debug, Clone)]
pub struct LocalExecutor {
    shell: String,
}

impl LocalExecutor {
    pub fn new() -> Self {
        Self {
            shell: "bash".to_string(),
        }
    }
}

impl Default for LocalExecutor {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl RemoteExecutor for LocalExecutor {
    async fn run(&self, host: &HostRef, command: &str) -> Result<CommandResult, TransportError> {
        tracing::debug!(host = %host.name, shell = %self.shell, "local");

        let output = Command::new(&self.shell)
            .arg("-c")
            .arg(command)
            .stdin(Stdio::null())
            .kill_on_drop(true)
            .output()
            .await
            .map_err(|source| TransportError::Spawn {
                program: self.shell.clone(),
                source,
            })?;

        Ok(command_result(output))
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;

    #[tokio::test]
    async fn captures_exit_code_and_output() {
        let host = HostRef::new("local", "localhost");
        let result = LocalExecutor::new()
            .run(&host, "echo out; echo err >&2; exit 3")
            .await
            .unwrap();

        assert_eq!(result.exit_code, 3);
        assert_eq!(result.stdout, "out\n");
        assert_eq!(result.stderr, "err\n");
    }

    #[cfg(target_os = "linux")]
    #[tokio::test]
    async fn dropping_the_run_kills_the_shell() {
        let dir = tempfile::tempdir().unwrap();
        let pid_file = dir.path().join("pid");
        let command = format!("echo $$ > '{}'; sleep 30; true", pid_file.display());
        let host = HostRef::new("local", "localhost");
        let executor = LocalExecutor::new();

        let timed_out = tokio::time::timeout(
            std::time::Duration::from_millis(500),
            executor.run(&host, &command),
        )
        .await;
        assert!(timed_out.is_err());

        let pid = std::fs::read_to_string(&pid_file).unwrap();
        let stat = format!("/proc/{}/stat", pid.trim());
        let mut gone = false;
        for _ in 0..40 {
            // 回収前のゾンビ (Z) も終了扱い
            match std::fs::read_to_string(&stat) {
                Err(_) => gone = true,
                Ok(line) => gone = line.rsplit(')').next().is_some_and(|rest| rest.trim_start().starts_with('Z')),
            }
            if gone {
                break;
            }
            tokio::time::sleep(std::time::Duration::from_millis(50)).await;
        }
        assert!(gone, "shell {} still running", pid.trim());
    }

    #[tokio::test]
    async fn and_chain_stops_at_first_failure() {
        let host = HostRef::new("local", "localhost");
        let result = LocalExecutor::new()
            .run(&host, "false && echo unreachable")
            .await
            .unwrap();

        assert!(!result.is_success());
        assert!(result.stdout.is_empty());
    }
}
