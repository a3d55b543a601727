//! Impls - ports の実装
//!
//! - `SshExecutor`: 本番用（システムの ssh クライアント）
//! - `LocalExecutor`: 制御ホスト上で実行（`transport: local`、結合テスト）
//! - `RoutingExecutor`: ホストごとに上の 2 つを振り分け
//! - `ScriptedExecutor`: 単体テスト用の偽物

pub mod local;
pub mod routing;
pub mod scripted;
pub mod ssh;

pub use self::local::LocalExecutor;
pub use self::routing::RoutingExecutor;
pub use self::scripted::{RecordedCall, ScriptedExecutor};
pub use self::ssh::SshExecutor;

use crate::domain::CommandResult;

/// プロセスの終了結果を CommandResult に変換
///
/// シグナルで落ちた場合は exit code が取れないので -1 にする。
pub(crate) fn command_result(output: std::process::Output) -> CommandResult {
    CommandResult {
        exit_code: output.status.code().unwrap_or(-1),
        stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
        stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
    }
}
