//! Hosts and roles.
//!
//! A host carries zero or more roles; a `RoleSelector` picks the hosts a task
//! runs on. Selection keeps configuration order, which is also the order hosts
//! are processed in sequential mode.

use std::fmt;

use serde::{Deserialize, Serialize};

/// A named group of hosts (e.g. `dist`, `web`).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Role(String);

impl Role {
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// How commands reach a host.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Transport {
    #[default]
    Ssh,
    /// Run on the control host itself (`bash -c`).
    Local,
}

/// A remote host as configured.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct HostRef {
    /// Unique label, used in logs, reports and `namespace_by_host`.
    pub name: String,

    /// Hostname or IP address.
    pub address: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub port: Option<u16>,

    #[serde(default)]
    pub roles: Vec<Role>,

    #[serde(default)]
    pub transport: Transport,
}

impl HostRef {
    pub fn new(name: impl Into<String>, address: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            address: address.into(),
            user: None,
            port: None,
            roles: Vec::new(),
            transport: Transport::Ssh,
        }
    }

    pub fn with_user(mut self, user: impl Into<String>) -> Self {
        self.user = Some(user.into());
        self
    }

    pub fn with_port(mut self, port: u16) -> Self {
        self.port = Some(port);
        self
    }

    pub fn with_role(mut self, role: impl Into<String>) -> Self {
        self.roles.push(Role::new(role));
        self
    }

    pub fn with_transport(mut self, transport: Transport) -> Self {
        self.transport = transport;
        self
    }

    pub fn has_role(&self, role: &Role) -> bool {
        self.roles.iter().any(|r| r == role)
    }

    /// `user@address`, or just `address` when no user is configured.
    pub fn ssh_destination(&self) -> String {
        match &self.user {
            Some(user) => format!("{user}@{}", self.address),
            None => self.address.clone(),
        }
    }
}

impl fmt::Display for HostRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)
    }
}

/// Selects execution targets among the configured hosts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RoleSelector {
    Role(Role),
    All,
}

impl RoleSelector {
    pub fn role(name: impl Into<String>) -> Self {
        Self::Role(Role::new(name))
    }

    /// `all` or `*` selects every host; anything else is a role name.
    pub fn parse(raw: &str) -> Self {
        match raw.trim() {
            "all" | "*" => Self::All,
            other => Self::role(other),
        }
    }

    pub fn matches(&self, host: &HostRef) -> bool {
        match self {
            Self::Role(role) => host.has_role(role),
            Self::All => true,
        }
    }

    pub fn select<'a>(&self, hosts: &'a [HostRef]) -> Vec<&'a HostRef> {
        hosts.iter().filter(|h| self.matches(h)).collect()
    }
}

impl fmt::Display for RoleSelector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Role(role) => write!(f, "role:{role}"),
            Self::All => f.write_str("all"),
        }
    }
}

impl std::str::FromStr for RoleSelector {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self::parse(s))
    }
}
