//! Output files produced by assets

use serde::Serialize;
use sha2::{Digest, Sha256};
use std::path::{Component, Path};

/// A named, immutable payload produced by exactly one asset
///
/// `path` is the logical path relative to the output directory, always
/// written with `/` separators.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct File {
    /// Logical path relative to the output directory
    pub path: String,

    /// Raw file contents
    #[serde(skip)]
    pub data: Vec<u8>,
}

impl File {
    /// Create a new file
    ///
    /// Valid paths are stored in normalized form. Invalid ones are kept as
    /// given so the store can report them on commit.
    pub fn new(path: impl Into<String>, data: impl Into<Vec<u8>>) -> Self {
        let path = path.into();
        Self {
            path: Self::normalize_path(&path).unwrap_or(path),
            data: data.into(),
        }
    }

    /// Payload size in bytes
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// Check whether the payload is empty
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Hex encoded SHA-256 digest of the payload
    pub fn sha256(&self) -> String {
        hex::encode(Sha256::digest(&self.data))
    }

    /// Payload as UTF-8 text, if it is valid UTF-8
    pub fn as_str(&self) -> Option<&str> {
        std::str::from_utf8(&self.data).ok()
    }

    /// Check that a logical path stays inside the output directory and
    /// return its canonical spelling
    ///
    /// Returns a description of the problem for empty, absolute or
    /// parent-escaping paths. `./a.yaml` normalizes to `a.yaml` and
    /// `a//./b.yaml` to `a/b.yaml`; two files collide exactly when their
    /// normalized paths are equal.
    pub fn normalize_path(path: &str) -> Result<String, String> {
        if path.trim().is_empty() {
            return Err("path is empty".to_string());
        }

        let mut segments = Vec::new();
        for component in Path::new(path).components() {
            match component {
                Component::Normal(segment) => segments.push(segment.to_string_lossy()),
                Component::CurDir => {}
                Component::ParentDir => {
                    return Err(format!("path '{}' escapes the output directory", path));
                }
                Component::RootDir | Component::Prefix(_) => {
                    return Err(format!("path '{}' must be relative", path));
                }
            }
        }

        if segments.is_empty() {
            return Err(format!("path '{}' does not name a file", path));
        }
        Ok(segments.join("/"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn file_digest_is_stable() {
        let file = File::new("metadata.json", b"{}".to_vec());
        assert_eq!(
            file.sha256(),
            "44136fa355b3678a1146ad16f7e8649e94fb4fc21fe77e8310c060f61caaff8a"
        );
        assert_eq!(file.len(), 2);
        assert_eq!(file.as_str(), Some("{}"));
    }

    #[test]
    fn path_validation() {
        assert!(File::normalize_path("metadata.json").is_ok());
        assert!(File::normalize_path("cluster-manifests/nmstateconfig.yaml").is_ok());
        assert!(File::normalize_path("").is_err());
        assert!(File::normalize_path("../outside.yaml").is_err());
        assert!(File::normalize_path("a/../../b").is_err());
        assert!(File::normalize_path("/etc/passwd").is_err());
        assert!(File::normalize_path("./.").is_err());
    }

    #[test]
    fn equivalent_spellings_normalize_to_one_path() {
        for spelling in ["foo.yaml", "./foo.yaml", "././foo.yaml"] {
            assert_eq!(File::normalize_path(spelling).unwrap(), "foo.yaml");
        }
        assert_eq!(File::normalize_path("a//b/./c.yaml").unwrap(), "a/b/c.yaml");
        assert_eq!(File::new("./openshift//m.yaml", "x").path, "openshift/m.yaml");
        assert_eq!(File::new("../escape", "x").path, "../escape");
    }
}
