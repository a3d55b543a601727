//! SshExecutor - システムの `ssh` クライアントでリモート実行
//!
//! `source` を使うので、リモート側のログインシェルに依らず `bash -c` で包む。
//! ssh はリモート引数をスペースで連結してシェルに渡すため、
//! `bash -c '<command>'` を 1 引数として組み立てる。

use std::process::Stdio;

use async_trait::async_trait;
use tokio::process::Command;

use super::command_result;
use crate::domain::{CommandResult, HostRef, TransportError};
use crate::ports::RemoteExecutor;

pub const DEFAULT_SSH_BINARY: &str = "ssh";

/// 対話プロンプトで止まらないようにする
pub fn default_ssh_options() -> Vec<String> {
    vec!["-o".to_string(), "BatchMode=yes".to_string()]
}

#[derive(Debug, Clone)]
pub struct SshExecutor {
    binary: String,
    options: Vec<String>,
}

impl SshExecutor {
    pub fn new() -> Self {
        Self {
            binary: DEFAULT_SSH_BINARY.to_string(),
            options: default_ssh_options(),
        }
    }

    pub fn with_binary(mut self, binary: impl Into<String>) -> Self {
        self.binary = binary.into();
        self
    }

    pub fn with_options(mut self, options: Vec<String>) -> Self {
        self.options = options;
        self
    }

    /// `ssh` に渡す引数列
    pub fn args(&self, host: &HostRef, command: &str) -> Result<Vec<String>, TransportError> {
        let remote = shlex::try_quote(command)
            .map_err(|e| TransportError::Other(format!("cannot quote command for ssh: {e}")))?;

        let destination = host.ssh_destination();
        if destination.starts_with('-') {
            return Err(TransportError::Other(format!(
                "refusing ssh destination {destination:?} for {}",
                host.name
            )));
        }

        let mut args = self.options.clone();
        if let Some(port) = host.port {
            args.push("-p".to_string());
            args.push(port.to_string());
        }
        args.push(destination);
        args.push(format!("bash -c {remote}"));
        Ok(args)
    }
}

impl Default for SshExecutor {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl RemoteExecutor for SshExecutor {
    async fn run(&self, host: &HostRef, command: &str) -> Result<CommandResult, TransportError> {
        let args = self.args(host, command)?;
        tracing::debug!(host = %host.name, destination = %host.ssh_destination(), "ssh");

        let output = Command::new(&self.binary)
            .args(&args)
            .stdin(Stdio::null())
            .kill_on_drop(true)
            .output()
            .await
            .map_err(|source| TransportError::Spawn {
                program: self.binary.clone(),
                source,
            })?;

        Ok(command_result(output))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn args_wrap_command_in_bash() {
        let host = HostRef::new("dist-1", "10.0.0.5")
            .with_user("root")
            .with_port(25642);
        let args = SshExecutor::new()
            .args(&host, "mv /srv/app/dist/* /srv/dist")
            .unwrap();

        assert_eq!(
            args,
            vec![
                "-o",
                "BatchMode=yes",
                "-p",
                "25642",
                "root@10.0.0.5",
                "bash -c 'mv /srv/app/dist/* /srv/dist'",
            ]
        );
    }

    #[test]
    fn args_without_port_or_user() {
        let host = HostRef::new("dist-1", "dist.example.com");
        let args = SshExecutor::new()
            .with_options(Vec::new())
            .args(&host, "true")
            .unwrap();
        assert_eq!(args, vec!["dist.example.com", "bash -c true"]);
    }

    #[test]
    fn destination_starting_with_dash_is_refused() {
        let host = HostRef::new("dist-1", "-oProxyCommand=touch");
        let err = SshExecutor::new().args(&host, "true").unwrap_err();
        assert!(matches!(err, TransportError::Other(_)));
    }

    #[tokio::test]
    async fn missing_binary_is_transport_error() {
        let host = HostRef::new("dist-1", "127.0.0.1");
        let executor = SshExecutor::new().with_binary("/nonexistent/distbuild-ssh");
        let err = executor.run(&host, "true").await.unwrap_err();
        assert!(matches!(err, TransportError::Spawn { .. }));
    }
}
