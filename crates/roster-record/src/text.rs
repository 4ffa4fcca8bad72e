//! Text normalization for free-form cells and names

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Collapse whitespace runs (including U+3000) to single spaces and trim
#[must_use]
pub fn norm_line(s: &str) -> String {
    s.split(|c: char| c.is_whitespace() || c == '\u{3000}')
        .filter(|part| !part.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
}

/// Normalize and return `None` for blank input
#[must_use]
pub fn non_blank(s: &str) -> Option<String> {
    let normalized = norm_line(s);
    (!normalized.is_empty()).then_some(normalized)
}

/// Department name canonicalization
///
/// Maps spellings found in source sheets (e.g. `理论组教师`) to the
/// department label the site groups by (e.g. `理论组`). Unknown names pass
/// through normalized.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DepartmentAliases(BTreeMap<String, String>);

impl DepartmentAliases {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an alias
    #[must_use]
    pub fn with(mut self, alias: impl Into<String>, canonical: impl Into<String>) -> Self {
        self.0.insert(alias.into(), canonical.into());
        self
    }

    /// Canonical department label for `raw`
    #[must_use]
    pub fn canonical(&self, raw: &str) -> String {
        let cleaned = norm_line(raw);
        let cleaned = cleaned.trim_matches(|c| c == ':' || c == '：').trim();
        self.0
            .get(cleaned)
            .cloned()
            .unwrap_or_else(|| cleaned.to_string())
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn norm_line_collapses_ideographic_space() {
        assert_eq!(norm_line("  陈\u{3000}\u{3000}涛 \t 老师 "), "陈 涛 老师");
        assert_eq!(norm_line(""), "");
    }

    #[test]
    fn non_blank_filters_whitespace() {
        assert_eq!(non_blank(" \u{3000} "), None);
        assert_eq!(non_blank(" 声乐组 ").as_deref(), Some("声乐组"));
    }

    #[test]
    fn aliases_canonicalize_and_strip_colons() {
        let aliases = DepartmentAliases::new().with("理论组教师", "理论组");
        assert_eq!(aliases.canonical("理论组教师："), "理论组");
        assert_eq!(aliases.canonical(" 声乐组 "), "声乐组");
    }
}
