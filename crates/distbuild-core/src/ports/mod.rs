//! Ports - 抽象化レイヤー
//!
//! Hexagonal Architecture の「ポート」を定義します。
//! 外部（SSH、時計、ID 生成）への依存はすべてここの trait 越しにし、
//! テストでは差し替え可能にします。

pub mod clock;
pub mod id_generator;
pub mod remote_executor;

pub use self::clock::{Clock, FixedClock, SystemClock};
pub use self::id_generator::{IdGenerator, UlidGenerator};
pub use self::remote_executor::RemoteExecutor;
