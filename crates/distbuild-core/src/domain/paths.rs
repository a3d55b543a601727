//! RemotePath - リモートホスト上の絶対パス
//!
//! current_path / dist_path はどちらもリモート側の POSIX パスなので、
//! ローカルの `PathBuf` ではなく文字列の newtype として扱います。
//!
//! # 検証ルール
//! - 空文字列は不可
//! - `/` で始まる（絶対パス）
//! - NUL / 改行を含まない（シェルに渡すため）

use std::fmt;

use serde::{Deserialize, Serialize};

/// PathError は RemotePath の検証エラー
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PathError {
    #[error("remote path is empty")]
    Empty,

    #[error("remote path must be absolute: {0}")]
    NotAbsolute(String),

    #[error("remote path contains a control character: {0:?}")]
    ControlCharacter(String),
}

/// リモートホスト上の絶対パス
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct RemotePath(String);

impl RemotePath {
    pub fn parse(raw: &str) -> Result<Self, PathError> {
        if raw.is_empty() {
            return Err(PathError::Empty);
        }
        if raw.contains(['\0', '\n', '\r']) {
            return Err(PathError::ControlCharacter(raw.to_string()));
        }
        if !raw.starts_with('/') {
            return Err(PathError::NotAbsolute(raw.to_string()));
        }

        // 末尾の `/` は join 時に `//` にならないよう落とす（ルートは除く）
        let trimmed = raw.trim_end_matches('/');
        let normalized = if trimmed.is_empty() { "/" } else { trimmed };
        Ok(Self(normalized.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// 1 セグメントを連結した新しいパスを返す
    ///
    /// `segment` に `/` が含まれていてもそのまま連結する（呼び出し側の責務）。
    pub fn join(&self, segment: &str) -> RemotePath {
        let segment = segment.trim_matches('/');
        if self.0 == "/" {
            RemotePath(format!("/{segment}"))
        } else {
            RemotePath(format!("{}/{segment}", self.0))
        }
    }
}

impl fmt::Display for RemotePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for RemotePath {
    type Error = PathError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        RemotePath::parse(&value)
    }
}

impl From<RemotePath> for String {
    fn from(value: RemotePath) -> Self {
        value.0
    }
}

impl std::str::FromStr for RemotePath {
    type Err = PathError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        RemotePath::parse(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("/srv/app/current", "/srv/app/current")]
    #[case("/srv/dist/", "/srv/dist")]
    #[case("/", "/")]
    #[case("//", "/")]
    fn parse_accepts_absolute_paths(#[case] raw: &str, #[case] expected: &str) {
        let path = RemotePath::parse(raw).unwrap();
        assert_eq!(path.as_str(), expected);
    }

    #[rstest]
    #[case("", PathError::Empty)]
    #[case("srv/app", PathError::NotAbsolute("srv/app".to_string()))]
    #[case("./current", PathError::NotAbsolute("./current".to_string()))]
    #[case("/srv/a\nb", PathError::ControlCharacter("/srv/a\nb".to_string()))]
    fn parse_rejects_invalid_paths(#[case] raw: &str, #[case] expected: PathError) {
        assert_eq!(RemotePath::parse(raw).unwrap_err(), expected);
    }

    #[test]
    fn join_appends_single_segment() {
        let base = RemotePath::parse("/srv/app/current").unwrap();
        assert_eq!(base.join("dist").as_str(), "/srv/app/current/dist");
        assert_eq!(base.join("/dist/").as_str(), "/srv/app/current/dist");

        let root = RemotePath::parse("/").unwrap();
        assert_eq!(root.join("dist").as_str(), "/dist");
    }

    #[test]
    fn deserialize_validates() {
        let ok: RemotePath = serde_json::from_str("\"/srv/dist\"").unwrap();
        assert_eq!(ok.as_str(), "/srv/dist");

        let err = serde_json::from_str::<RemotePath>("\"relative\"");
        assert!(err.is_err());
    }
}
