//! Relative media references
//!
//! Records never embed media; they point at files (photos, admission
//! screenshots) by a path relative to the site root. [`MediaPath`] checks the
//! syntax of such a path. Whether the file exists is advisory only.

use std::fmt::{self, Display, Formatter};
use std::path::Path;
use std::str::FromStr;

/// Well-formed relative media path using `/` separators
///
/// # Examples
/// - `photos/chen_tao.jpg` is accepted
/// - `teachers\photos\a.jpg` is accepted and becomes `teachers/photos/a.jpg`
/// - `/etc/passwd`, `https://cdn.example.com/a.jpg` and `photos/../secret.jpg`
///   are rejected
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct MediaPath(String);

impl MediaPath {
    /// Parse and normalize a raw path
    ///
    /// # Errors
    /// Returns error if the path is empty, absolute, a URL, or escapes its root
    pub fn parse(raw: &str) -> Result<Self, MediaPathError> {
        let unified = raw.trim().replace('\\', "/");
        if unified.is_empty() {
            return Err(MediaPathError::Empty);
        }
        if unified.starts_with('/') || has_drive_prefix(&unified) {
            return Err(MediaPathError::Absolute(raw.to_string()));
        }

        let segments: Vec<&str> = unified.split('/').filter(|s| !s.is_empty()).collect();
        // scheme-qualified: https://, data:, file:
        if segments.first().is_some_and(|s| s.contains(':')) {
            return Err(MediaPathError::Absolute(raw.to_string()));
        }
        if segments.iter().any(|s| *s == "..") {
            return Err(MediaPathError::ParentSegment(raw.to_string()));
        }
        if segments.is_empty() {
            return Err(MediaPathError::Empty);
        }

        Ok(Self(segments.join("/")))
    }

    /// Rewrite `raw` in its normalized form; a malformed path is left alone
    pub fn normalize(raw: &mut String) {
        if let Ok(path) = Self::parse(raw) {
            if path.0 != *raw {
                *raw = path.0;
            }
        }
    }

    #[inline]
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Final path segment
    #[must_use]
    pub fn file_name(&self) -> &str {
        self.0.rsplit('/').next().unwrap_or(&self.0)
    }

    /// Whether the referenced file exists below `root`
    #[must_use]
    pub fn exists_under(&self, root: &Path) -> bool {
        root.join(&self.0).is_file()
    }
}

fn has_drive_prefix(p: &str) -> bool {
    let bytes = p.as_bytes();
    bytes.len() >= 2 && bytes[0].is_ascii_alphabetic() && bytes[1] == b':'
}

impl Display for MediaPath {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for MediaPath {
    type Err = MediaPathError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

/// Media path syntax errors
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum MediaPathError {
    #[error("media path is empty")]
    Empty,

    #[error("absolute media path not allowed: {0}")]
    Absolute(String),

    #[error("media path contains '..': {0}")]
    ParentSegment(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_normalizes_separators() {
        let p = MediaPath::parse(" teachers\\photos//chen.jpg ").unwrap();
        assert_eq!(p.as_str(), "teachers/photos/chen.jpg");
        assert_eq!(p.file_name(), "chen.jpg");
    }

    #[test]
    fn parse_rejects_absolute() {
        assert!(matches!(
            MediaPath::parse("/photos/a.jpg"),
            Err(MediaPathError::Absolute(_))
        ));
        assert!(matches!(
            MediaPath::parse("C:\\photos\\a.jpg"),
            Err(MediaPathError::Absolute(_))
        ));
    }

    #[test]
    fn parse_rejects_parent_segments() {
        assert!(matches!(
            MediaPath::parse("photos/../../etc/passwd"),
            Err(MediaPathError::ParentSegment(_))
        ));
    }

    #[test]
    fn parse_rejects_empty() {
        assert_eq!(MediaPath::parse("  "), Err(MediaPathError::Empty));
        assert_eq!(MediaPath::parse("//"), Err(MediaPathError::Absolute("//".to_string())));
    }

    #[test]
    fn parse_rejects_urls() {
        for raw in ["https://cdn.example.com/a.jpg", "file:///tmp/a.jpg", "data:image/png;base64,AAAA"] {
            assert!(
                matches!(MediaPath::parse(raw), Err(MediaPathError::Absolute(_))),
                "{raw} accepted"
            );
        }
    }

    #[test]
    fn normalize_rewrites_only_well_formed_paths() {
        let mut photo = "teachers\\photos\\a.jpg".to_string();
        MediaPath::normalize(&mut photo);
        assert_eq!(photo, "teachers/photos/a.jpg");

        let mut bad = "../a.jpg".to_string();
        MediaPath::normalize(&mut bad);
        assert_eq!(bad, "../a.jpg");
    }
}
