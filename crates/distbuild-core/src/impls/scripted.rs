//! ScriptedExecutor - テスト用の RemoteExecutor
//!
//! # 学習ポイント
//! - 呼び出しの記録（どのホストで何をどの順で実行したか）
//! - 部分一致ルールで応答を差し替え（最初に一致したルールが勝つ）
//! - 遅延を入れて並列実行の重なりを観測

use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;

use crate::domain::{CommandResult, HostRef, TransportError};
use crate::ports::RemoteExecutor;

/// 記録された 1 回の呼び出し
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordedCall {
    pub host: String,
    pub command: String,
}

enum Reply {
    Result(CommandResult),
    Unreachable,
}

struct Rule {
    host: Option<String>,
    pattern: String,
    reply: Reply,
}

impl Rule {
    fn matches(&self, host: &HostRef, command: &str) -> bool {
        self.host.as_deref().is_none_or(|h| h == host.name) && command.contains(&self.pattern)
    }
}

#[derive(Default)]
struct State {
    calls: Vec<RecordedCall>,
    in_flight: Vec<String>,
    max_overlap: Vec<(String, usize)>,
}

/// 何もしない（全コマンド成功）のがデフォルト
pub struct ScriptedExecutor {
    rules: Vec<Rule>,
    delay: Option<Duration>,
    tracked: Vec<String>,
    state: Mutex<State>,
}

impl ScriptedExecutor {
    pub fn new() -> Self {
        Self {
            rules: Vec::new(),
            delay: None,
            tracked: Vec::new(),
            state: Mutex::new(State::default()),
        }
    }

    /// `pattern` を含むコマンドに `result` を返す（全ホスト）
    pub fn respond(mut self, pattern: impl Into<String>, result: CommandResult) -> Self {
        self.rules.push(Rule {
            host: None,
            pattern: pattern.into(),
            reply: Reply::Result(result),
        });
        self
    }

    /// 特定ホストだけに効くルール
    pub fn respond_on(
        mut self,
        host: impl Into<String>,
        pattern: impl Into<String>,
        result: CommandResult,
    ) -> Self {
        self.rules.push(Rule {
            host: Some(host.into()),
            pattern: pattern.into(),
            reply: Reply::Result(result),
        });
        self
    }

    /// そのホストへの呼び出しはすべて TransportError
    pub fn unreachable(mut self, host: impl Into<String>) -> Self {
        self.rules.push(Rule {
            host: Some(host.into()),
            pattern: String::new(),
            reply: Reply::Unreachable,
        });
        self
    }

    /// 各呼び出しの前に待つ
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// `pattern` を含むコマンドの同時実行数を記録する
    pub fn track_overlap(mut self, pattern: impl Into<String>) -> Self {
        self.tracked.push(pattern.into());
        self
    }

    pub fn calls(&self) -> Vec<RecordedCall> {
        self.lock().calls.clone()
    }

    pub fn commands_for(&self, host: &str) -> Vec<String> {
        self.lock()
            .calls
            .iter()
            .filter(|c| c.host == host)
            .map(|c| c.command.clone())
            .collect()
    }

    /// `track_overlap` したパターンが同時に何本走ったかの最大値
    pub fn max_overlap(&self, pattern: &str) -> usize {
        self.lock()
            .max_overlap
            .iter()
            .find(|(p, _)| p == pattern)
            .map(|(_, n)| *n)
            .unwrap_or(0)
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn enter(&self, host: &HostRef, command: &str) {
        let mut state = self.lock();
        state.calls.push(RecordedCall {
            host: host.name.clone(),
            command: command.to_string(),
        });
        state.in_flight.push(command.to_string());

        for pattern in &self.tracked {
            let overlap = state
                .in_flight
                .iter()
                .filter(|c| c.contains(pattern.as_str()))
                .count();
            match state.max_overlap.iter_mut().find(|(p, _)| p == pattern) {
                Some((_, n)) => *n = (*n).max(overlap),
                None => state.max_overlap.push((pattern.clone(), overlap)),
            }
        }
    }

    fn leave(&self, command: &str) {
        let mut state = self.lock();
        if let Some(pos) = state.in_flight.iter().position(|c| c == command) {
            state.in_flight.remove(pos);
        }
    }
}

impl Default for ScriptedExecutor {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl RemoteExecutor for ScriptedExecutor {
    async fn run(&self, host: &HostRef, command: &str) -> Result<CommandResult, TransportError> {
        self.enter(host, command);
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        self.leave(command);

        match self.rules.iter().find(|r| r.matches(host, command)) {
            Some(Rule {
                reply: Reply::Result(result),
                ..
            }) => Ok(result.clone()),
            Some(Rule {
                reply: Reply::Unreachable,
                ..
            }) => Err(TransportError::Other(format!("{} is unreachable", host.name))),
            None => Ok(CommandResult::success()),
        }
    }
}
