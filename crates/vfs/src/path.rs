//! Normalized virtual paths.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use thiserror::Error;

/// Errors from path construction.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum VfsPathError {
    /// Input contained a NUL byte or a control character other than
    /// tab/CR/LF.
    #[error("Path contains forbidden character {codepoint:#06x}: {input:?}")]
    ForbiddenCharacter {
        /// The offending raw input.
        input: String,
        /// Code point of the rejected character.
        codepoint: u32,
    },
}

/// Normalized, absolute, slash-separated virtual path.
///
/// Invariants held by construction: always begins with `/`; no `//`; no
/// trailing `/` except the root itself; no `.`/`..` segments. Equality and
/// hashing are structural on the normalized string. Pure data - no I/O.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct VfsPath(String);

impl VfsPath {
    /// Normalize `input` into a path.
    ///
    /// Backslashes are treated as separators, repeated separators collapse,
    /// `.`/`..` segments are resolved left-to-right (excess `..` at the root
    /// is a no-op). The only failure mode is a forbidden character.
    pub fn new(input: impl AsRef<str>) -> Result<Self, VfsPathError> {
        let input: &str = input.as_ref();
        if let Some(bad) = input
            .chars()
            .find(|c| c.is_control() && !matches!(c, '\t' | '\r' | '\n'))
        {
            return Err(VfsPathError::ForbiddenCharacter {
                input: input.to_string(),
                codepoint: bad as u32,
            });
        }

        let mut segments: Vec<&str> = Vec::new();
        for segment in input.split(['/', '\\']) {
            match segment {
                "" | "." => {}
                ".." => {
                    segments.pop();
                }
                other => segments.push(other),
            }
        }

        if segments.is_empty() {
            return Ok(Self::root());
        }
        let mut normalized = String::with_capacity(input.len());
        for segment in &segments {
            normalized.push('/');
            normalized.push_str(segment);
        }
        Ok(VfsPath(normalized))
    }

    /// The root path `/`.
    pub fn root() -> Self {
        VfsPath("/".to_string())
    }

    /// True for the root path.
    pub fn is_root(&self) -> bool {
        self.0 == "/"
    }

    /// Parent path; the parent of root is root.
    pub fn parent(&self) -> VfsPath {
        if self.is_root() {
            return self.clone();
        }
        match self.0.rfind('/') {
            Some(0) | None => Self::root(),
            Some(pos) => VfsPath(self.0[..pos].to_string()),
        }
    }

    /// Append `name` (which may itself contain separators) and re-normalize.
    pub fn join(&self, name: impl AsRef<str>) -> Result<VfsPath, VfsPathError> {
        VfsPath::new(format!("{}/{}", self.0, name.as_ref()))
    }

    /// Final path segment; empty string for the root.
    pub fn file_name(&self) -> &str {
        match self.0.rfind('/') {
            Some(pos) => &self.0[pos + 1..],
            None => "",
        }
    }

    /// Extension of the final segment, without the dot.
    ///
    /// Dotfiles such as `.keep` have no extension.
    pub fn extension(&self) -> Option<&str> {
        let name: &str = self.file_name();
        match name.rfind('.') {
            Some(pos) if pos > 0 && pos + 1 < name.len() => Some(&name[pos + 1..]),
            _ => None,
        }
    }

    /// Path segments, outermost first.
    pub fn segments(&self) -> impl Iterator<Item = &str> {
        self.0[1..].split('/').filter(|s| !s.is_empty())
    }

    /// The normalized string form.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Projection onto a storage key: the path without its leading slash.
    /// The root maps to the empty string.
    pub fn to_blob_key(&self) -> &str {
        &self.0[1..]
    }
}

impl fmt::Display for VfsPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for VfsPath {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl TryFrom<&str> for VfsPath {
    type Error = VfsPathError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        VfsPath::new(value)
    }
}

impl FromStr for VfsPath {
    type Err = VfsPathError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        VfsPath::new(s)
    }
}

impl From<VfsPath> for String {
    fn from(path: VfsPath) -> Self {
        path.0
    }
}

impl Serialize for VfsPath {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.0)
    }
}

impl<'de> Deserialize<'de> for VfsPath {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw: String = String::deserialize(deserializer)?;
        VfsPath::new(&raw).map_err(serde::de::Error::custom)
    }
}
