//! Run report: what happened on each host.
//!
//! The report is architecture-agnostic: it only records the shape of a run
//! (which commands ran where, how they exited) so it can be printed or shipped
//! as JSON after the fact.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::command::Step;
use super::ids::RunId;

/// Per-host classification.
///
/// Serialized as SCREAMING_SNAKE_CASE: SUCCESS / FAILURE / SKIPPED.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum HostOutcome {
    Success,
    Failure,
    /// Never started because an earlier host failed (or the run was interrupted).
    Skipped,
}

/// One executed command.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StepReport {
    pub step: Step,
    pub command: String,

    /// `None` when the command never reached the host.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exit_code: Option<i32>,

    pub duration_ms: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HostReport {
    pub host: String,
    pub outcome: HostOutcome,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub steps: Vec<StepReport>,
}

impl HostReport {
    pub fn new(host: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            outcome: HostOutcome::Success,
            steps: Vec::new(),
        }
    }

    pub fn skipped(host: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            outcome: HostOutcome::Skipped,
            steps: Vec::new(),
        }
    }

    pub fn with_step(mut self, step: StepReport) -> Self {
        self.steps.push(step);
        self
    }
}

/// Summary of one task invocation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunReport {
    pub run_id: RunId,
    pub task: String,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub hosts: Vec<HostReport>,
}

impl RunReport {
    pub fn is_success(&self) -> bool {
        self.hosts.iter().all(|h| h.outcome == HostOutcome::Success)
    }

    pub fn count(&self, outcome: HostOutcome) -> usize {
        self.hosts.iter().filter(|h| h.outcome == outcome).count()
    }

    pub fn host(&self, name: &str) -> Option<&HostReport> {
        self.hosts.iter().find(|h| h.host == name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use ulid::Ulid;

    #[test]
    fn host_outcome_serializes_as_required_names() {
        let s = serde_json::to_string(&HostOutcome::Success).unwrap();
        assert_eq!(s, "\"SUCCESS\"");

        let s = serde_json::to_string(&HostOutcome::Failure).unwrap();
        assert_eq!(s, "\"FAILURE\"");

        let s = serde_json::to_string(&HostOutcome::Skipped).unwrap();
        assert_eq!(s, "\"SKIPPED\"");
    }

    #[test]
    fn report_counts_outcomes() {
        let at = Utc.with_ymd_and_hms(2024, 1, 1, 12, 0, 0).unwrap();
        let report = RunReport {
            run_id: RunId::from_ulid(Ulid::new()),
            task: "dependencies:install".to_string(),
            started_at: at,
            finished_at: at,
            hosts: vec![
                HostReport::new("a").with_step(StepReport {
                    step: Step::BuildSdist,
                    command: "true".to_string(),
                    exit_code: Some(0),
                    duration_ms: 3,
                }),
                HostReport {
                    outcome: HostOutcome::Failure,
                    ..HostReport::new("b")
                },
                HostReport::skipped("c"),
            ],
        };

        assert!(!report.is_success());
        assert_eq!(report.count(HostOutcome::Success), 1);
        assert_eq!(report.count(HostOutcome::Failure), 1);
        assert_eq!(report.count(HostOutcome::Skipped), 1);
        assert_eq!(report.host("a").map(|h| h.steps.len()), Some(1));
    }

    #[test]
    fn skipped_host_omits_steps_in_json() {
        let v = serde_json::to_value(HostReport::skipped("c")).unwrap();
        assert_eq!(v["outcome"], "SKIPPED");
        assert!(v.get("steps").is_none());
    }
}
