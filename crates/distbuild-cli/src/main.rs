use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};

use distbuild_core::app::config::DEFAULT_CONFIG_FILE;
use distbuild_core::app::{App, DeployConfig, Execution, PlannedCommand, TaskContext};
use distbuild_core::domain::{ExecutionError, HostOutcome, RoleSelector, RunReport};
use distbuild_core::impls::{LocalExecutor, RoutingExecutor, SshExecutor};

mod observability;

#[derive(Debug, Parser)]
#[command(name = "distbuild", version, about = "Build and collect Python sdists on remote hosts")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Run a task on the selected hosts
    Run(TaskArgs),
    /// Print the commands a task would run, without running them
    Plan(TaskArgs),
    /// List registered tasks
    List,
}

#[derive(Debug, Args)]
struct TaskArgs {
    /// Task name, e.g. `dependencies:install`
    task: String,

    /// Deployment config (YAML)
    #[arg(short, long, env = "DISTBUILD_CONFIG", default_value = DEFAULT_CONFIG_FILE)]
    config: PathBuf,

    /// Role to target (`all` for every host); overrides the config file
    #[arg(long)]
    role: Option<String>,

    /// Print the report / plan as JSON on stdout
    #[arg(long)]
    json: bool,
}

impl TaskArgs {
    fn load_config(&self) -> Result<DeployConfig> {
        let config = DeployConfig::load(&self.config)
            .with_context(|| format!("loading {}", self.config.display()))?;
        Ok(match &self.role {
            Some(role) => config.with_role(RoleSelector::parse(role)),
            None => config,
        })
    }
}

fn executor_for(config: &DeployConfig) -> Arc<RoutingExecutor> {
    let ssh = SshExecutor::new()
        .with_binary(config.ssh.binary.clone())
        .with_options(config.ssh.options.clone());
    Arc::new(RoutingExecutor::new(Arc::new(ssh), Arc::new(LocalExecutor::new())))
}

async fn run(args: TaskArgs) -> Result<()> {
    let app = App::standard()?;
    let config = args.load_config()?;
    let ctx = TaskContext::new(config.clone(), executor_for(&config));

    let execution = tokio::select! {
        execution = app.run(&args.task, &ctx) => execution?,
        _ = tokio::signal::ctrl_c() => {
            tracing::warn!("interrupted; remote commands already started are left as-is");
            return Err(ExecutionError::Interrupted.into());
        }
    };

    let Execution { report, failure } = execution;
    if args.json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        print_report(&report);
    }

    match failure {
        Some(err) => Err(err.into()),
        None => Ok(()),
    }
}

fn plan(args: TaskArgs) -> Result<()> {
    let app = App::standard()?;
    let config = args.load_config()?;
    let ctx = TaskContext::new(config.clone(), executor_for(&config));

    let planned = app.plan(&args.task, &ctx)?;
    if args.json {
        println!("{}", serde_json::to_string_pretty(&planned)?);
    } else {
        print_plan(&planned);
    }
    Ok(())
}

fn list() -> Result<()> {
    let app = App::standard()?;
    for task in app.registry().iter() {
        println!("{:<24} {}", task.name(), task.description());
    }
    Ok(())
}

fn print_plan(planned: &[PlannedCommand]) {
    for cmd in planned {
        println!("[{}] {}: {}", cmd.host, cmd.step, cmd.command);
    }
}

fn print_report(report: &RunReport) {
    println!("{} {} ({})", report.task, report.run_id, report.finished_at);
    for host in &report.hosts {
        let outcome = match host.outcome {
            HostOutcome::Success => "ok",
            HostOutcome::Failure => "FAILED",
            HostOutcome::Skipped => "skipped",
        };
        println!("  {:<20} {}", host.host, outcome);
        for step in &host.steps {
            let exit = step
                .exit_code
                .map(|c| c.to_string())
                .unwrap_or_else(|| "-".to_string());
            println!("    {:<18} exit={:<4} {}ms", step.step, exit, step.duration_ms);
        }
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    observability::init_tracing();
    let cli = Cli::parse();

    let result = match cli.command {
        Command::Run(args) => run(args).await,
        Command::Plan(args) => plan(args),
        Command::List => list(),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("error: {err:#}");
            ExitCode::FAILURE
        }
    }
}
