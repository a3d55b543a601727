//! DeployConfig - デプロイ設定の読み込みと検証
//!
//! # 読み込み順（後勝ち）
//! 1. YAML ファイル（既定は `deploy.yml`）
//! 2. 環境変数 `DISTBUILD_*`
//! 3. CLI フラグ（`--role` など。CLI 側で上書き）
//!
//! # Fail-fast
//! 読み込み時にパスやホスト定義を検証し、実行中に設定起因で落ちないようにする。

use std::collections::HashSet;
use std::path::Path;

use serde::Deserialize;

use crate::app::installer::{ExecutionMode, InstallRequest};
use crate::domain::recipe::{DEFAULT_PYTHON, DEFAULT_VENV_DIR, DEFAULT_VIRTUALENV};
use crate::domain::{
    BuildSettings, CollectSettings, ConflictPolicy, HostRef, PathError, RemotePath, RoleSelector,
};
use crate::impls::ssh::{DEFAULT_SSH_BINARY, default_ssh_options};

pub const DEFAULT_CONFIG_FILE: &str = "deploy.yml";
pub const DEFAULT_ROLE: &str = "dist";
pub const DEFAULT_MAX_PARALLEL: usize = 4;

/// 環境変数名
pub mod env_keys {
    pub const CURRENT_PATH: &str = "DISTBUILD_CURRENT_PATH";
    pub const DIST_PATH: &str = "DISTBUILD_DIST_PATH";
    pub const PYTHON: &str = "DISTBUILD_PYTHON";
    pub const ROLE: &str = "DISTBUILD_ROLE";
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config: {0}")]
    Parse(#[from] serde_yaml::Error),

    #[error("`{0}` is required")]
    Missing(&'static str),

    #[error("invalid `{field}`: {source}")]
    InvalidPath {
        field: &'static str,
        #[source]
        source: PathError,
    },

    #[error("invalid `{field}`: {reason}")]
    InvalidSetting { field: &'static str, reason: String },

    #[error("no hosts configured")]
    EmptyHosts,

    #[error("duplicate host name: {0}")]
    DuplicateHost(String),

    #[error("invalid host name {0:?}: must be non-empty and contain no '/'")]
    InvalidHostName(String),

    #[error("invalid `{field}` for host {host}: {value:?}")]
    InvalidHostField {
        host: String,
        field: &'static str,
        value: String,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
enum ExecutionKind {
    #[default]
    Sequential,
    Parallel,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SshSettings {
    #[serde(default = "default_ssh_binary")]
    pub binary: String,
    #[serde(default = "default_ssh_options")]
    pub options: Vec<String>,
}

fn default_ssh_binary() -> String {
    DEFAULT_SSH_BINARY.to_string()
}

impl Default for SshSettings {
    fn default() -> Self {
        Self {
            binary: default_ssh_binary(),
            options: default_ssh_options(),
        }
    }
}

/// YAML そのままの形（未検証）
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawConfig {
    current_path: Option<String>,
    dist_path: Option<String>,
    role: Option<String>,
    python: Option<String>,
    virtualenv: Option<String>,
    venv_dir: Option<String>,
    #[serde(default)]
    execution: ExecutionKind,
    max_parallel: Option<usize>,
    #[serde(default)]
    on_conflict: ConflictPolicy,
    #[serde(default)]
    namespace_by_host: bool,
    #[serde(default)]
    ssh: SshSettings,
    #[serde(default)]
    hosts: Vec<HostRef>,
}

impl RawConfig {
    fn apply_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        if let Some(v) = get(env_keys::CURRENT_PATH) {
            self.current_path = Some(v);
        }
        if let Some(v) = get(env_keys::DIST_PATH) {
            self.dist_path = Some(v);
        }
        if let Some(v) = get(env_keys::PYTHON) {
            self.python = Some(v);
        }
        if let Some(v) = get(env_keys::ROLE) {
            self.role = Some(v);
        }
    }

    fn validate(self) -> Result<DeployConfig, ConfigError> {
        let current_path = required_path("current_path", self.current_path)?;
        let dist_path = required_path("dist_path", self.dist_path)?;

        let build = BuildSettings {
            python: setting("python", self.python, DEFAULT_PYTHON)?,
            virtualenv: setting("virtualenv", self.virtualenv, DEFAULT_VIRTUALENV)?,
            venv_dir: setting("venv_dir", self.venv_dir, DEFAULT_VENV_DIR)?,
        };

        let execution = match self.execution {
            ExecutionKind::Sequential => ExecutionMode::Sequential,
            ExecutionKind::Parallel => {
                let max_parallel = self.max_parallel.unwrap_or(DEFAULT_MAX_PARALLEL);
                if max_parallel == 0 {
                    return Err(ConfigError::InvalidSetting {
                        field: "max_parallel",
                        reason: "must be at least 1".to_string(),
                    });
                }
                ExecutionMode::Parallel { max_parallel }
            }
        };

        if self.hosts.is_empty() {
            return Err(ConfigError::EmptyHosts);
        }
        let mut seen = HashSet::new();
        for host in &self.hosts {
            if host.name.is_empty() || host.name.contains('/') || host.name == "." || host.name == ".." {
                return Err(ConfigError::InvalidHostName(host.name.clone()));
            }
            if !is_ssh_word(&host.address) {
                return Err(ConfigError::InvalidHostField {
                    host: host.name.clone(),
                    field: "address",
                    value: host.address.clone(),
                });
            }
            if let Some(user) = host.user.as_deref().filter(|u| !is_ssh_word(u) || u.contains('@')) {
                return Err(ConfigError::InvalidHostField {
                    host: host.name.clone(),
                    field: "user",
                    value: user.to_string(),
                });
            }
            if !seen.insert(host.name.as_str()) {
                return Err(ConfigError::DuplicateHost(host.name.clone()));
            }
        }

        let role = RoleSelector::parse(self.role.as_deref().unwrap_or(DEFAULT_ROLE));

        Ok(DeployConfig {
            current_path,
            dist_path,
            role,
            build,
            collect: CollectSettings {
                on_conflict: self.on_conflict,
                namespace_by_host: self.namespace_by_host,
            },
            execution,
            ssh: self.ssh,
            hosts: self.hosts,
        })
    }
}

/// ssh の宛先に使える語か。先頭 `-` はオプションと解釈されるので不可
fn is_ssh_word(value: &str) -> bool {
    !value.is_empty()
        && !value.starts_with('-')
        && !value.chars().any(|c| c.is_whitespace() || c.is_control())
}

fn required_path(field: &'static str, value: Option<String>) -> Result<RemotePath, ConfigError> {
    let raw = value.ok_or(ConfigError::Missing(field))?;
    RemotePath::parse(&raw).map_err(|source| ConfigError::InvalidPath { field, source })
}

fn setting(field: &'static str, value: Option<String>, default: &str) -> Result<String, ConfigError> {
    let value = value.unwrap_or_else(|| default.to_string());
    if value.trim().is_empty() {
        return Err(ConfigError::InvalidSetting {
            field,
            reason: "must not be empty".to_string(),
        });
    }
    if value.contains(['\0', '\n', '\r']) {
        return Err(ConfigError::InvalidSetting {
            field,
            reason: "must not contain control characters".to_string(),
        });
    }
    Ok(value)
}

/// 検証済みのデプロイ設定
#[derive(Debug, Clone, PartialEq)]
pub struct DeployConfig {
    pub current_path: RemotePath,
    pub dist_path: RemotePath,
    pub role: RoleSelector,
    pub build: BuildSettings,
    pub collect: CollectSettings,
    pub execution: ExecutionMode,
    pub ssh: SshSettings,
    pub hosts: Vec<HostRef>,
}

impl DeployConfig {
    /// ファイル + プロセスの環境変数から読み込む
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        Self::load_with(path, |key| std::env::var(key).ok())
    }

    /// ファイル + 任意の lookup から読み込む（テストで環境変数を汚さないため）
    pub fn load_with<F>(path: impl AsRef<Path>, lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_yaml_str(&text, lookup)
    }

    pub fn from_yaml_str<F>(text: &str, lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut raw: RawConfig = if text.trim().is_empty() {
            RawConfig::default()
        } else {
            serde_yaml::from_str(text)?
        };
        raw.apply_overrides(lookup);
        raw.validate()
    }

    /// CLI の `--role` 用
    pub fn with_role(mut self, role: RoleSelector) -> Self {
        self.role = role;
        self
    }

    /// `dependencies:install` への入力
    pub fn install_request(&self) -> InstallRequest {
        InstallRequest {
            current_path: self.current_path.clone(),
            dist_path: self.dist_path.clone(),
            role: self.role.clone(),
            build: self.build.clone(),
            collect: self.collect,
            execution: self.execution,
            hosts: self.hosts.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::Transport;
    use std::collections::HashMap;

    const FULL: &str = r#"
current_path: /srv/app/current
dist_path: /srv/dist
role: dist
python: /usr/bin/python3.11
virtualenv: /usr/local/bin/virtualenv
venv_dir: .venv
execution: parallel
max_parallel: 2
on_conflict: fail
namespace_by_host: true
ssh:
  binary: /usr/bin/ssh
  options: ["-o", "StrictHostKeyChecking=no"]
hosts:
  - name: dist-1
    address: 10.0.0.5
    user: root
    port: 25642
    roles: [dist]
  - name: builder
    address: localhost
    roles: [dist, web]
    transport: local
"#;

    const MINIMAL: &str = r#"
current_path: /srv/app/current
dist_path: /srv/dist
hosts:
  - name: dist-1
    address: 10.0.0.5
    roles: [dist]
"#;

    fn no_env(_: &str) -> Option<String> {
        None
    }

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn full_config_is_parsed() {
        let cfg = DeployConfig::from_yaml_str(FULL, no_env).unwrap();

        assert_eq!(cfg.current_path.as_str(), "/srv/app/current");
        assert_eq!(cfg.dist_path.as_str(), "/srv/dist");
        assert_eq!(cfg.role, RoleSelector::role("dist"));
        assert_eq!(cfg.build.python, "/usr/bin/python3.11");
        assert_eq!(cfg.build.virtualenv, "/usr/local/bin/virtualenv");
        assert_eq!(cfg.build.venv_dir, ".venv");
        assert_eq!(cfg.execution, ExecutionMode::Parallel { max_parallel: 2 });
        assert_eq!(cfg.collect.on_conflict, ConflictPolicy::Fail);
        assert!(cfg.collect.namespace_by_host);
        assert_eq!(cfg.ssh.binary, "/usr/bin/ssh");
        assert_eq!(cfg.hosts.len(), 2);
        assert_eq!(cfg.hosts[0].port, Some(25642));
        assert_eq!(cfg.hosts[1].transport, Transport::Local);
    }

    #[test]
    fn minimal_config_uses_defaults() {
        let cfg = DeployConfig::from_yaml_str(MINIMAL, no_env).unwrap();

        assert_eq!(cfg.role, RoleSelector::role(DEFAULT_ROLE));
        assert_eq!(cfg.build, BuildSettings::default());
        assert_eq!(cfg.collect, CollectSettings::default());
        assert_eq!(cfg.execution, ExecutionMode::Sequential);
        assert_eq!(cfg.ssh, SshSettings::default());
        assert_eq!(cfg.hosts[0].transport, Transport::Ssh);
    }

    #[test]
    fn env_overrides_file_values() {
        let cfg = DeployConfig::from_yaml_str(
            MINIMAL,
            env(&[
                (env_keys::CURRENT_PATH, "/srv/app/releases/42"),
                (env_keys::PYTHON, "/usr/bin/python3.12"),
                (env_keys::ROLE, "all"),
            ]),
        )
        .unwrap();

        assert_eq!(cfg.current_path.as_str(), "/srv/app/releases/42");
        assert_eq!(cfg.dist_path.as_str(), "/srv/dist");
        assert_eq!(cfg.build.python, "/usr/bin/python3.12");
        assert_eq!(cfg.role, RoleSelector::All);
    }

    #[test]
    fn env_can_supply_missing_paths() {
        let yaml = "hosts:\n  - name: a\n    address: 10.0.0.1\n";
        let cfg = DeployConfig::from_yaml_str(
            yaml,
            env(&[
                (env_keys::CURRENT_PATH, "/srv/app"),
                (env_keys::DIST_PATH, "/srv/dist"),
            ]),
        )
        .unwrap();
        assert_eq!(cfg.current_path.as_str(), "/srv/app");
    }

    #[test]
    fn blank_env_values_are_ignored() {
        let cfg =
            DeployConfig::from_yaml_str(MINIMAL, env(&[(env_keys::DIST_PATH, "  ")])).unwrap();
        assert_eq!(cfg.dist_path.as_str(), "/srv/dist");
    }

    #[test]
    fn missing_current_path_is_rejected() {
        let yaml = "dist_path: /srv/dist\nhosts:\n  - name: a\n    address: 10.0.0.1\n";
        let err = DeployConfig::from_yaml_str(yaml, no_env).unwrap_err();
        assert!(matches!(err, ConfigError::Missing("current_path")));
    }

    #[test]
    fn relative_dist_path_is_rejected() {
        let yaml = MINIMAL.replace("/srv/dist", "srv/dist");
        let err = DeployConfig::from_yaml_str(&yaml, no_env).unwrap_err();
        assert!(matches!(
            err,
            ConfigError::InvalidPath {
                field: "dist_path",
                source: PathError::NotAbsolute(_)
            }
        ));
    }

    #[test]
    fn empty_hosts_are_rejected() {
        let yaml = "current_path: /a\ndist_path: /b\n";
        let err = DeployConfig::from_yaml_str(yaml, no_env).unwrap_err();
        assert!(matches!(err, ConfigError::EmptyHosts));
    }

    #[test]
    fn duplicate_host_names_are_rejected() {
        let yaml = r#"
current_path: /a
dist_path: /b
hosts:
  - { name: a, address: 10.0.0.1 }
  - { name: a, address: 10.0.0.2 }
"#;
        let err = DeployConfig::from_yaml_str(yaml, no_env).unwrap_err();
        assert!(matches!(err, ConfigError::DuplicateHost(name) if name == "a"));
    }

    #[test]
    fn host_name_with_slash_is_rejected() {
        let yaml = "current_path: /a\ndist_path: /b\nhosts:\n  - { name: a/b, address: x }\n";
        let err = DeployConfig::from_yaml_str(yaml, no_env).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidHostName(_)));
    }

    #[test]
    fn address_that_looks_like_an_ssh_option_is_rejected() {
        let text = MINIMAL.replace("address: 10.0.0.5", "address: -oProxyCommand=touch");
        let err = DeployConfig::from_yaml_str(&text, no_env).unwrap_err();
        assert!(matches!(
            err,
            ConfigError::InvalidHostField { field: "address", .. }
        ));
    }

    #[test]
    fn user_with_leading_dash_or_at_sign_is_rejected() {
        for user in ["-lroot", "root@other"] {
            let text = MINIMAL.replace(
                "address: 10.0.0.5",
                &format!("address: 10.0.0.5\n    user: \"{user}\""),
            );
            let err = DeployConfig::from_yaml_str(&text, no_env).unwrap_err();
            assert!(
                matches!(err, ConfigError::InvalidHostField { field: "user", .. }),
                "user {user:?} gave {err:?}"
            );
        }
    }

    #[test]
    fn misspelled_host_field_is_rejected() {
        let text = MINIMAL.replace("roles: [dist]", "role: [dist]");
        let err = DeployConfig::from_yaml_str(&text, no_env).unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }

    #[test]
    fn zero_max_parallel_is_rejected() {
        let yaml = format!("{MINIMAL}execution: parallel\nmax_parallel: 0\n");
        let err = DeployConfig::from_yaml_str(&yaml, no_env).unwrap_err();
        assert!(matches!(
            err,
            ConfigError::InvalidSetting {
                field: "max_parallel",
                ..
            }
        ));
    }

    #[test]
    fn unknown_fields_are_rejected() {
        let yaml = format!("{MINIMAL}retries: 3\n");
        let err = DeployConfig::from_yaml_str(&yaml, no_env).unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }

    #[test]
    fn load_reads_file_from_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(DEFAULT_CONFIG_FILE);
        std::fs::write(&path, MINIMAL).unwrap();

        let cfg = DeployConfig::load_with(&path, no_env).unwrap();
        assert_eq!(cfg.hosts[0].name, "dist-1");

        let err = DeployConfig::load_with(dir.path().join("missing.yml"), no_env).unwrap_err();
        assert!(matches!(err, ConfigError::Io { .. }));
    }

    #[test]
    fn install_request_carries_everything() {
        let cfg = DeployConfig::from_yaml_str(FULL, no_env).unwrap();
        let req = cfg.install_request();
        assert_eq!(req.current_path, cfg.current_path);
        assert_eq!(req.hosts.len(), 2);
        assert_eq!(req.execution, ExecutionMode::Parallel { max_parallel: 2 });
    }
}
