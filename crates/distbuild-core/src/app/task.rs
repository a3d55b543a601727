//! DeployTask trait - 名前付きタスクの定義
//!
//! # 学習ポイント
//! - Associated Constants ではなく `name()` を使う（trait object にするため）
//! - 実行に必要なものは TaskContext でまとめて明示的に渡す

use std::sync::Arc;

use async_trait::async_trait;

use crate::app::config::DeployConfig;
use crate::app::installer::{self, DependencyInstaller, Execution, PlannedCommand};
use crate::domain::ExecutionError;
use crate::ports::RemoteExecutor;

/// タスク実行時の入力
///
/// グローバルな設定参照はせず、設定と実行器をここから取る。
pub struct TaskContext {
    pub config: DeployConfig,
    pub executor: Arc<dyn RemoteExecutor>,
}

impl TaskContext {
    pub fn new(config: DeployConfig, executor: Arc<dyn RemoteExecutor>) -> Self {
        Self { config, executor }
    }
}

/// DeployTask は名前で呼び出せるデプロイ手順
///
/// # 命名規約
/// - `{namespace}:{action}`
/// - 例: `dependencies:install`
#[async_trait]
pub trait DeployTask: Send + Sync {
    fn name(&self) -> &'static str;

    fn description(&self) -> &'static str;

    /// 実行せずに発行予定のコマンドを返す
    fn plan(&self, ctx: &TaskContext) -> Result<Vec<PlannedCommand>, ExecutionError>;

    async fn run(&self, ctx: &TaskContext) -> Execution;
}

/// `dependencies:install`
pub struct InstallDependencies;

#[async_trait]
impl DeployTask for InstallDependencies {
    fn name(&self) -> &'static str {
        installer::TASK_NAME
    }

    fn description(&self) -> &'static str {
        "Build a virtualenv and an sdist in current_path, then move dist/* into dist_path"
    }

    fn plan(&self, ctx: &TaskContext) -> Result<Vec<PlannedCommand>, ExecutionError> {
        installer::plan(&ctx.config.install_request())
    }

    async fn run(&self, ctx: &TaskContext) -> Execution {
        DependencyInstaller::new(Arc::clone(&ctx.executor))
            .execute(&ctx.config.install_request())
            .await
    }
}
