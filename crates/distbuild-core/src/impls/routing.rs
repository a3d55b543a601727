//! RoutingExecutor - `HostRef::transport` で実行器を振り分ける

use std::sync::Arc;

use async_trait::async_trait;

use crate::domain::{CommandResult, HostRef, Transport, TransportError};
use crate::ports::RemoteExecutor;

pub struct RoutingExecutor {
    ssh: Arc<dyn RemoteExecutor>,
    local: Arc<dyn RemoteExecutor>,
}

impl RoutingExecutor {
    pub fn new(ssh: Arc<dyn RemoteExecutor>, local: Arc<dyn RemoteExecutor>) -> Self {
        Self { ssh, local }
    }
}

#[async_trait]
impl RemoteExecutor for RoutingExecutor {
    async fn run(&self, host: &HostRef, command: &str) -> Result<CommandResult, TransportError> {
        match host.transport {
            Transport::Ssh => self.ssh.run(host, command).await,
            Transport::Local => self.local.run(host, command).await,
        }
    }
}
