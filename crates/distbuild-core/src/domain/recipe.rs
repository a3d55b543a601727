//! Recipe - リモートコマンド文字列の組み立て
//!
//! `dependencies:install` が発行するのは 2 本のシェルコマンドだけです。
//! ここではその文字列を組み立てるだけで、実行はしません（純粋関数）。
//!
//! # 発行されるコマンド（単純なパスの場合）
//! ```text
//! cd /srv/app/current && virtualenv --python=/usr/bin/python3.6 venv && source venv/bin/activate && python setup.py sdist
//! mv /srv/app/current/dist/* /srv/dist
//! ```
//!
//! # クォート
//! - パスは `shlex` で必要なときだけクォートする
//! - `dist/*` の glob はクォートの外に置く（展開させるため）

use std::borrow::Cow;

use serde::{Deserialize, Serialize};

use super::host::HostRef;
use super::paths::RemotePath;

pub const DEFAULT_PYTHON: &str = "/usr/bin/python3.6";
pub const DEFAULT_VIRTUALENV: &str = "virtualenv";
pub const DEFAULT_VENV_DIR: &str = "venv";

/// sdist が書き出されるディレクトリ名（current_path 配下）
pub const SDIST_OUTPUT_DIR: &str = "dist";

/// BuildSettings は build ステップの可変部分
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BuildSettings {
    /// virtualenv に渡すインタプリタのパス
    pub python: String,
    /// virtualenv コマンド
    pub virtualenv: String,
    /// current_path からの相対ディレクトリ
    pub venv_dir: String,
}

impl Default for BuildSettings {
    fn default() -> Self {
        Self {
            python: DEFAULT_PYTHON.to_string(),
            virtualenv: DEFAULT_VIRTUALENV.to_string(),
            venv_dir: DEFAULT_VENV_DIR.to_string(),
        }
    }
}

/// dist_path に同名ファイルがあったときの扱い
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConflictPolicy {
    /// 素の `mv`（上書き）
    #[default]
    Overwrite,
    /// 1 つでも衝突したら何も動かさずに失敗
    Fail,
}

/// CollectSettings は collect ステップの可変部分
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct CollectSettings {
    pub on_conflict: ConflictPolicy,
    /// true なら `<dist_path>/<host.name>` に集める
    pub namespace_by_host: bool,
}

/// NUL を含む値は設定読み込み時に弾いているので、ここでは落として扱う
fn quote(value: &str) -> Cow<'_, str> {
    shlex::try_quote(value).unwrap_or_else(|_| {
        let stripped = value.replace('\0', "");
        Cow::Owned(shlex::try_quote(&stripped).map(Cow::into_owned).unwrap_or(stripped))
    })
}

/// build ステップのコマンド
pub fn build_command(current_path: &RemotePath, settings: &BuildSettings) -> String {
    let venv = quote(&settings.venv_dir);
    format!(
        "cd {cwd} && {virtualenv} --python={python} {venv} && source {venv}/bin/activate && python setup.py sdist",
        cwd = quote(current_path.as_str()),
        virtualenv = quote(&settings.virtualenv),
        python = quote(&settings.python),
        venv = venv,
    )
}

/// collect 先のディレクトリ
pub fn collect_destination(
    dist_path: &RemotePath,
    host: &HostRef,
    settings: &CollectSettings,
) -> RemotePath {
    if settings.namespace_by_host {
        dist_path.join(&host.name)
    } else {
        dist_path.clone()
    }
}

/// collect ステップのコマンド
pub fn collect_command(
    current_path: &RemotePath,
    dist_path: &RemotePath,
    host: &HostRef,
    settings: &CollectSettings,
) -> String {
    let source = current_path.join(SDIST_OUTPUT_DIR);
    let source = quote(source.as_str());
    let destination = collect_destination(dist_path, host, settings);
    let destination = quote(destination.as_str());

    let mut parts = Vec::new();
    if settings.namespace_by_host {
        parts.push(format!("mkdir -p {destination}"));
    }
    if settings.on_conflict == ConflictPolicy::Fail {
        parts.push(format!(
            "for f in {source}/*; do if [ -e {destination}/\"$(basename \"$f\")\" ]; then echo \"distbuild: {destination}/$(basename \"$f\") already exists\" >&2; exit 1; fi; done"
        ));
    }
    parts.push(format!("mv {source}/* {destination}"));
    parts.join(" && ")
}
