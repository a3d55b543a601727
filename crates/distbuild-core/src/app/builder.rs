//! AppBuilder - タスクの登録と起動時検証
//!
//! # Fail-fast 設計
//! - expect_tasks() で期待されるタスク名を登録
//! - build() 時に「期待集合 ⊆ 登録済み集合」をチェック
//! - 不足があれば BuildError を返す

use std::sync::Arc;

use super::installer::{Execution, PlannedCommand};
use super::registry::{RegistryError, TaskRegistry};
use super::task::{DeployTask, InstallDependencies, TaskContext};
use crate::domain::ExecutionError;

/// AppBuilder はアプリケーションを構築
///
/// # 使用例
/// ```ignore
/// let app = AppBuilder::new()
///     .register(InstallDependencies)?
///     .expect_tasks(&["dependencies:install"])
///     .build()?;
/// ```
pub struct AppBuilder {
    registry: TaskRegistry,
    expected_tasks: Option<Vec<String>>,
}

/// BuildError はアプリケーション構築時のエラー
#[derive(Debug, thiserror::Error)]
pub enum BuildError {
    #[error("Missing tasks: {0:?}. These tasks were expected but not registered.")]
    MissingTasks(Vec<String>),
}

/// AppError は App の呼び出しエラー
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("unknown task '{name}' (available: {})", .available.join(", "))]
    UnknownTask { name: String, available: Vec<String> },

    #[error(transparent)]
    Execution(#[from] ExecutionError),
}

impl AppBuilder {
    pub fn new() -> Self {
        Self {
            registry: TaskRegistry::new(),
            expected_tasks: None,
        }
    }

    pub fn register<T: DeployTask + 'static>(mut self, task: T) -> Result<Self, RegistryError> {
        self.registry.register(Arc::new(task))?;
        Ok(self)
    }

    pub fn expect_tasks(mut self, names: &[&str]) -> Self {
        self.expected_tasks = Some(names.iter().map(|n| n.to_string()).collect());
        self
    }

    pub fn build(self) -> Result<App, BuildError> {
        if let Some(expected_tasks) = &self.expected_tasks {
            let registered = self.registry.registered_names();
            let missing: Vec<String> = expected_tasks
                .iter()
                .filter(|x| !registered.contains(x))
                .cloned()
                .collect();
            if !missing.is_empty() {
                return Err(BuildError::MissingTasks(missing));
            }
        }
        Ok(App {
            registry: self.registry,
        })
    }
}

impl Default for AppBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// 組み込みタスクを登録済みの構成
#[derive(Debug, thiserror::Error)]
pub enum StandardAppError {
    #[error(transparent)]
    Registry(#[from] RegistryError),
    #[error(transparent)]
    Build(#[from] BuildError),
}

pub struct App {
    registry: TaskRegistry,
}

impl App {
    /// `dependencies:install` を持つ App
    pub fn standard() -> Result<App, StandardAppError> {
        let app = AppBuilder::new()
            .register(InstallDependencies)?
            .expect_tasks(&[super::installer::TASK_NAME])
            .build()?;
        Ok(app)
    }

    pub fn registry(&self) -> &TaskRegistry {
        &self.registry
    }

    fn task(&self, name: &str) -> Result<Arc<dyn DeployTask>, AppError> {
        self.registry.get(name).ok_or_else(|| AppError::UnknownTask {
            name: name.to_string(),
            available: self.registry.registered_names(),
        })
    }

    pub async fn run(&self, name: &str, ctx: &TaskContext) -> Result<Execution, AppError> {
        let task = self.task(name)?;
        Ok(task.run(ctx).await)
    }

    pub fn plan(&self, name: &str, ctx: &TaskContext) -> Result<Vec<PlannedCommand>, AppError> {
        let task = self.task(name)?;
        Ok(task.plan(ctx)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::app::task::testing::{NoopTask, config};
    use crate::impls::ScriptedExecutor;

    #[test]
    fn test_build_success() {
        let app = AppBuilder::new()
            .register(InstallDependencies)
            .unwrap()
            .expect_tasks(&["dependencies:install"])
            .build();
        assert!(app.is_ok());
    }

    #[test]
    fn test_build_missing_tasks() {
        let app = AppBuilder::new()
            .register(InstallDependencies)
            .unwrap()
            .expect_tasks(&["dependencies:install", "release:publish"])
            .build();
        assert!(matches!(
            app,
            Err(BuildError::MissingTasks(missing)) if missing == vec!["release:publish".to_string()]
        ));
    }

    #[test]
    fn test_build_no_expect_tasks() {
        let app = AppBuilder::new()
            .register(NoopTask("release:publish"))
            .unwrap()
            .build();
        assert!(app.is_ok());
    }

    #[tokio::test]
    async fn test_unknown_task_lists_available() {
        let app = App::standard().unwrap();
        let ctx = TaskContext::new(config(), Arc::new(ScriptedExecutor::new()));
        let err = app.run("dependencies:remove", &ctx).await.unwrap_err();
        assert_eq!(
            err.to_string(),
            "unknown task 'dependencies:remove' (available: dependencies:install)"
        );
    }

    #[tokio::test]
    async fn test_standard_app_runs_install() {
        let app = App::standard().unwrap();
        let executor = Arc::new(ScriptedExecutor::new());
        let ctx = TaskContext::new(config(), executor.clone());

        let execution = app.run("dependencies:install", &ctx).await.unwrap();
        assert!(execution.report.is_success());
        assert_eq!(executor.calls().len(), 4);

        let planned = app.plan("dependencies:install", &ctx).unwrap();
        assert_eq!(planned.len(), 4);
    }
}
