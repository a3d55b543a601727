//! App - アプリケーション層
//!
//! ports を組み合わせてタスクを実装します。
//!
//! # 主要コンポーネント
//! - **DeployConfig**: 設定の読み込み（YAML + 環境変数）
//! - **DependencyInstaller**: `dependencies:install` の本体
//! - **DeployTask / TaskRegistry / AppBuilder**: 名前付きタスクの登録と呼び出し

pub mod builder;
pub mod config;
pub mod installer;
pub mod registry;
pub mod task;

pub use self::builder::{App, AppBuilder, AppError, BuildError, StandardAppError};
pub use self::config::{ConfigError, DeployConfig, SshSettings};
pub use self::installer::{
    DependencyInstaller, Execution, ExecutionMode, InstallRequest, PlannedCommand,
};
pub use self::registry::{RegistryError, TaskRegistry};
pub use self::task::{DeployTask, InstallDependencies, TaskContext};
