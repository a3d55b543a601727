//! TaskRegistry - タスクの登録と検索
//!
//! # 内部実装
//! - BTreeMap<String, Arc<dyn DeployTask>>（`list` が名前順になる）
//! - 構築時だけ可変、実行中は不変（ロック不要）

use std::collections::BTreeMap;
use std::sync::Arc;

use super::task::DeployTask;

pub struct TaskRegistry {
    tasks: BTreeMap<String, Arc<dyn DeployTask>>,
}

#[derive(Debug, thiserror::Error)]
pub enum RegistryError {
    #[error("Task '{0}' is already registered")]
    AlreadyRegistered(String),
}

impl TaskRegistry {
    pub fn new() -> Self {
        Self {
            tasks: BTreeMap::new(),
        }
    }

    pub fn register(&mut self, task: Arc<dyn DeployTask>) -> Result<(), RegistryError> {
        let name = task.name().to_string();
        if self.tasks.contains_key(&name) {
            return Err(RegistryError::AlreadyRegistered(name));
        }
        self.tasks.insert(name, task);
        Ok(())
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn DeployTask>> {
        self.tasks.get(name).cloned()
    }

    pub fn registered_names(&self) -> Vec<String> {
        self.tasks.keys().cloned().collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Arc<dyn DeployTask>> {
        self.tasks.values()
    }
}

impl Default for TaskRegistry {
    fn default() -> Self {
        Self::new()
    }
}
