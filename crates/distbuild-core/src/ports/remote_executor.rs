//! RemoteExecutor port - リモートコマンド実行の抽象化
//!
//! # 実装
//! - `impls::SshExecutor`: システムの `ssh` クライアント経由（本番用）
//! - `impls::LocalExecutor`: 制御ホスト上で `bash -c`
//! - `impls::RoutingExecutor`: `HostRef::transport` で振り分け
//! - `impls::ScriptedExecutor`: テスト用の偽物

use async_trait::async_trait;

use crate::domain::{CommandResult, HostRef, TransportError};

/// RemoteExecutor は 1 ホストで 1 コマンドを実行する
///
/// # 契約
/// - コマンドが完了するまでブロックする（タイムアウトなし、リトライなし）
/// - 非 0 終了は `Ok(CommandResult)` として返す。判断は呼び出し側
/// - コマンドを届けられなかったときだけ `Err(TransportError)`
///
/// # Thread Safety
/// - 並列モードでは複数ホストから同時に呼ばれるので `Send + Sync`
#[async_trait]
pub trait RemoteExecutor: Send + Sync {
    async fn run(&self, host: &HostRef, command: &str) -> Result<CommandResult, TransportError>;
}
