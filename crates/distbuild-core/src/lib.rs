//! distbuild-core
//!
//! Build a Python source distribution on remote hosts and collect the archives.
//!
//! # モジュール構成
//! - **domain**: 値型（RemotePath, HostRef, RoleSelector, recipe, report, errors）
//! - **ports**: 抽象化レイヤー（RemoteExecutor, Clock, IdGenerator）
//! - **impls**: 実装（SshExecutor, LocalExecutor, RoutingExecutor, ScriptedExecutor）
//! - **app**: アプリケーションロジック（config, installer, task registry）

pub mod app;
pub mod domain;
pub mod impls;
pub mod ports;
