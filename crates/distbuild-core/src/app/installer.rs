//! DependencyInstaller - `dependencies:install` の本体
//!
//! 選ばれたホストごとに 2 本のコマンドを順番に流す:
//! 1. build: `cd` → virtualenv → activate → `python setup.py sdist`
//! 2. collect: `mv <current_path>/dist/* <dist_path>`
//!
//! # 失敗時の方針
//! - ホスト内: 失敗したステップで打ち切り（collect は走らない）
//! - ホスト間: 以降のホストは開始しない（SKIPPED として記録）
//! - ロールバック・リトライ・タイムアウトはしない
//!
//! # 並列モード
//! - Semaphore で同時実行数を制限。permit は spawn 前に取るので、ホストは設定順に開始
//! - 失敗が出た時点で未開始のホストは SKIPPED
//! - `namespace_by_host` でない場合、collect ステップは共有ロックで直列化
//!   （同じ dist_path への mv が競合しないように）

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Instant;

use serde::Serialize;
use tokio::sync::{Mutex, Semaphore};
use tokio::task::JoinSet;
use tracing::Instrument;

use crate::domain::recipe::{build_command, collect_command};
use crate::domain::{
    BuildSettings, CollectSettings, ExecutionError, HostOutcome, HostRef, HostReport,
    RemotePath, RoleSelector, RunReport, Step, StepReport,
};
use crate::ports::{Clock, IdGenerator, RemoteExecutor, SystemClock, UlidGenerator};

pub const TASK_NAME: &str = "dependencies:install";

/// ホストの処理順序
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ExecutionMode {
    /// 設定順に 1 台ずつ
    #[default]
    Sequential,
    /// 最大 `max_parallel` 台を同時に
    Parallel { max_parallel: usize },
}

/// `dependencies:install` への入力（すべて明示的に渡す）
#[derive(Debug, Clone, PartialEq)]
pub struct InstallRequest {
    pub current_path: RemotePath,
    pub dist_path: RemotePath,
    pub role: RoleSelector,
    pub build: BuildSettings,
    pub collect: CollectSettings,
    pub execution: ExecutionMode,
    /// 候補となるホストの全体。`role` で絞り込まれる
    pub hosts: Vec<HostRef>,
}

impl InstallRequest {
    pub fn new(current_path: RemotePath, dist_path: RemotePath, hosts: Vec<HostRef>) -> Self {
        Self {
            current_path,
            dist_path,
            role: RoleSelector::role(crate::app::config::DEFAULT_ROLE),
            build: BuildSettings::default(),
            collect: CollectSettings::default(),
            execution: ExecutionMode::Sequential,
            hosts,
        }
    }

    pub fn with_role(mut self, role: RoleSelector) -> Self {
        self.role = role;
        self
    }

    pub fn with_build(mut self, build: BuildSettings) -> Self {
        self.build = build;
        self
    }

    pub fn with_collect(mut self, collect: CollectSettings) -> Self {
        self.collect = collect;
        self
    }

    pub fn with_execution(mut self, execution: ExecutionMode) -> Self {
        self.execution = execution;
        self
    }

    /// role に一致するホスト（設定順）。1 台も無ければエラー
    pub fn selected_hosts(&self) -> Result<Vec<&HostRef>, ExecutionError> {
        let selected = self.role.select(&self.hosts);
        if selected.is_empty() {
            return Err(ExecutionError::NoMatchingHosts(self.role.clone()));
        }
        Ok(selected)
    }

    /// あるホストで実行するコマンド（実行順）
    pub fn commands_for(&self, host: &HostRef) -> Vec<(Step, String)> {
        vec![
            (
                Step::BuildSdist,
                build_command(&self.current_path, &self.build),
            ),
            (
                Step::CollectArtifacts,
                collect_command(&self.current_path, &self.dist_path, host, &self.collect),
            ),
        ]
    }

    fn serialize_collect(&self) -> bool {
        matches!(self.execution, ExecutionMode::Parallel { .. }) && !self.collect.namespace_by_host
    }
}

/// dry-run 用: 実行せずにコマンドだけ並べる
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PlannedCommand {
    pub host: String,
    pub step: Step,
    pub command: String,
}

pub fn plan(request: &InstallRequest) -> Result<Vec<PlannedCommand>, ExecutionError> {
    let hosts = request.selected_hosts()?;
    Ok(hosts
        .into_iter()
        .flat_map(|host| {
            request
                .commands_for(host)
                .into_iter()
                .map(move |(step, command)| PlannedCommand {
                    host: host.name.clone(),
                    step,
                    command,
                })
        })
        .collect())
}

/// 実行結果。失敗してもレポートは返す
#[derive(Debug)]
pub struct Execution {
    pub report: RunReport,
    /// 設定順で最初に失敗したホストのエラー
    pub failure: Option<ExecutionError>,
}

impl Execution {
    pub fn into_result(self) -> Result<RunReport, ExecutionError> {
        match self.failure {
            Some(err) => Err(err),
            None => Ok(self.report),
        }
    }
}

pub struct DependencyInstaller {
    executor: Arc<dyn RemoteExecutor>,
    clock: Arc<dyn Clock>,
    ids: Arc<dyn IdGenerator>,
}

impl DependencyInstaller {
    pub fn new(executor: Arc<dyn RemoteExecutor>) -> Self {
        Self {
            executor,
            clock: Arc::new(SystemClock),
            ids: Arc::new(UlidGenerator::new(SystemClock)),
        }
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn with_id_generator(mut self, ids: Arc<dyn IdGenerator>) -> Self {
        self.ids = ids;
        self
    }

    /// 全ホストで実行し、最初の失敗をエラーとして返す
    pub async fn install(&self, request: &InstallRequest) -> Result<RunReport, ExecutionError> {
        self.execute(request).await.into_result()
    }

    /// 全ホストで実行し、失敗時もレポートを返す
    pub async fn execute(&self, request: &InstallRequest) -> Execution {
        let run_id = self.ids.generate_run_id();
        let started_at = self.clock.now();
        let span = tracing::info_span!("run", run_id = %run_id, task = TASK_NAME);

        async {
            let (hosts, failure) = match request.selected_hosts() {
                Ok(selected) => {
                    tracing::info!(
                        hosts = selected.len(),
                        role = %request.role,
                        mode = ?request.execution,
                        "starting"
                    );
                    match request.execution {
                        ExecutionMode::Sequential => self.run_sequential(request, selected).await,
                        ExecutionMode::Parallel { max_parallel } => {
                            self.run_parallel(request, selected, max_parallel).await
                        }
                    }
                }
                Err(err) => {
                    tracing::error!(error = %err, "nothing to do");
                    (Vec::new(), Some(err))
                }
            };

            let report = RunReport {
                run_id,
                task: TASK_NAME.to_string(),
                started_at,
                finished_at: self.clock.now(),
                hosts,
            };
            tracing::info!(
                succeeded = report.count(HostOutcome::Success),
                failed = report.count(HostOutcome::Failure),
                skipped = report.count(HostOutcome::Skipped),
                "finished"
            );

            Execution { report, failure }
        }
        .instrument(span)
        .await
    }

    async fn run_sequential(
        &self,
        request: &InstallRequest,
        hosts: Vec<&HostRef>,
    ) -> (Vec<HostReport>, Option<ExecutionError>) {
        let mut reports = Vec::with_capacity(hosts.len());
        let mut failure = None;

        for host in hosts {
            if failure.is_some() {
                tracing::warn!(host = %host.name, "skipped after earlier failure");
                reports.push(HostReport::skipped(&host.name));
                continue;
            }
            let commands = request.commands_for(host);
            let (report, result) = run_host(self.executor.as_ref(), host, commands, None).await;
            reports.push(report);
            if let Err(err) = result {
                failure = Some(err);
            }
        }

        (reports, failure)
    }

    async fn run_parallel(
        &self,
        request: &InstallRequest,
        hosts: Vec<&HostRef>,
        max_parallel: usize,
    ) -> (Vec<HostReport>, Option<ExecutionError>) {
        let semaphore = Arc::new(Semaphore::new(max_parallel.max(1)));
        let stop = Arc::new(AtomicBool::new(false));
        let collect_lock = request
            .serialize_collect()
            .then(|| Arc::new(Mutex::new(())));

        let mut set = JoinSet::new();
        let mut index_of = HashMap::new();
        let names: Vec<String> = hosts.iter().map(|h| h.name.clone()).collect();

        for (index, host) in hosts.into_iter().enumerate() {
            // permit を取ってから spawn する。ここで待つことで開始順が設定順になる
            let Ok(permit) = Arc::clone(&semaphore).acquire_owned().await else {
                break;
            };
            if stop.load(Ordering::SeqCst) {
                tracing::warn!(host = %host.name, "skipped after earlier failure");
                continue;
            }

            let executor = Arc::clone(&self.executor);
            let stop = Arc::clone(&stop);
            let collect_lock = collect_lock.clone();
            let host = host.clone();
            let commands = request.commands_for(&host);

            let handle = set.spawn(async move {
                let _permit = permit;
                let (report, result) =
                    run_host(executor.as_ref(), &host, commands, collect_lock.as_deref()).await;
                if result.is_err() {
                    stop.store(true, Ordering::SeqCst);
                }
                (index, report, result)
            });
            index_of.insert(handle.id(), index);
        }

        let mut slots: Vec<Option<(HostReport, Result<(), ExecutionError>)>> =
            names.iter().map(|_| None).collect();
        while let Some(joined) = set.join_next().await {
            match joined {
                Ok((index, report, result)) => slots[index] = Some((report, result)),
                Err(join_err) => {
                    let Some(&index) = index_of.get(&join_err.id()) else {
                        continue;
                    };
                    let name = &names[index];
                    tracing::error!(host = %name, error = %join_err, "host task aborted");
                    stop.store(true, Ordering::SeqCst);
                    let report = HostReport {
                        outcome: HostOutcome::Failure,
                        ..HostReport::new(name)
                    };
                    let err = ExecutionError::Transport {
                        host: name.clone(),
                        step: Step::BuildSdist,
                        source: crate::domain::TransportError::Other(join_err.to_string()),
                    };
                    slots[index] = Some((report, Err(err)));
                }
            }
        }

        let mut reports = Vec::with_capacity(slots.len());
        let mut failure = None;
        for (slot, name) in slots.into_iter().zip(names) {
            let (report, result) = slot.unwrap_or_else(|| (HostReport::skipped(name), Ok(())));
            reports.push(report);
            if let Err(err) = result {
                failure.get_or_insert(err);
            }
        }
        (reports, failure)
    }
}

/// 1 ホスト分のステップを順番に流す
async fn run_host(
    executor: &dyn RemoteExecutor,
    host: &HostRef,
    commands: Vec<(Step, String)>,
    collect_lock: Option<&Mutex<()>>,
) -> (HostReport, Result<(), ExecutionError>) {
    let span = tracing::info_span!("host", host = %host.name);

    async move {
        let mut report = HostReport::new(&host.name);

        for (step, command) in commands {
            let _guard = match (step, collect_lock) {
                (Step::CollectArtifacts, Some(lock)) => Some(lock.lock().await),
                _ => None,
            };

            tracing::info!(%step, %command, "running");
            let started = Instant::now();
            let result = executor.run(host, &command).await;
            let duration_ms = started.elapsed().as_millis() as u64;

            match result {
                Ok(output) => {
                    report.steps.push(StepReport {
                        step,
                        command: command.clone(),
                        exit_code: Some(output.exit_code),
                        duration_ms,
                    });
                    if !output.is_success() {
                        tracing::error!(
                            %step,
                            exit_code = output.exit_code,
                            stderr = %output.stderr.trim(),
                            "command failed"
                        );
                        report.outcome = HostOutcome::Failure;
                        let err = ExecutionError::RemoteCommandFailure {
                            host: host.name.clone(),
                            step,
                            command,
                            exit_code: output.exit_code,
                            stdout: output.stdout,
                            stderr: output.stderr,
                        };
                        return (report, Err(err));
                    }
                    tracing::info!(%step, exit_code = output.exit_code, duration_ms, "done");
                }
                Err(source) => {
                    tracing::error!(%step, error = %source, "transport failed");
                    report.steps.push(StepReport {
                        step,
                        command,
                        exit_code: None,
                        duration_ms,
                    });
                    report.outcome = HostOutcome::Failure;
                    let err = ExecutionError::Transport {
                        host: host.name.clone(),
                        step,
                        source,
                    };
                    return (report, Err(err));
                }
            }
        }

        (report, Ok(()))
    }
    .instrument(span)
    .await
}
