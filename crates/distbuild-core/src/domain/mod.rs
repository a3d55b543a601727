//! Domain model (paths, hosts, commands, reports, errors).
//!
//! I/O を一切しない値型だけを置く。コマンド文字列の組み立て（recipe）も
//! 純粋関数なのでここに含める。

pub mod command;
pub mod errors;
pub mod host;
pub mod ids;
pub mod paths;
pub mod recipe;
pub mod report;

pub use command::{CommandResult, Step};
pub use errors::{ExecutionError, TransportError};
pub use host::{HostRef, Role, RoleSelector, Transport};
pub use ids::RunId;
pub use paths::{PathError, RemotePath};
pub use recipe::{BuildSettings, CollectSettings, ConflictPolicy};
pub use report::{HostOutcome, HostReport, RunReport, StepReport};
