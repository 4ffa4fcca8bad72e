//! Append-only change journal
//!
//! One human-readable line per committed mutation:
//! `<YYYY-MM-DD HH:MM> — <summary> — by <author>`. Failures are logged and
//! never fail the mutation that was already committed.

use chrono::{DateTime, Local};
use std::path::PathBuf;
use tokio::io::AsyncWriteExt;

pub const DEFAULT_AUTHOR: &str = "roster";

/// Journal of committed changes
#[derive(Debug, Clone)]
pub struct ChangeJournal {
    path: Option<PathBuf>,
    author: String,
}

impl ChangeJournal {
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: Some(path.into()),
            author: DEFAULT_AUTHOR.to_string(),
        }
    }

    /// Journal that records nothing
    #[must_use]
    pub fn disabled() -> Self {
        Self {
            path: None,
            author: DEFAULT_AUTHOR.to_string(),
        }
    }

    #[must_use]
    pub fn with_author(mut self, author: impl Into<String>) -> Self {
        self.author = author.into();
        self
    }

    #[must_use]
    pub fn path(&self) -> Option<&std::path::Path> {
        self.path.as_deref()
    }

    /// Format one journal line
    #[must_use]
    pub fn line(&self, at: DateTime<Local>, summary: &str) -> String {
        format!("{} — {summary} — by {}\n", at.format("%Y-%m-%d %H:%M"), self.author)
    }

    /// Append `summary`; errors are logged, not returned
    pub async fn record(&self, summary: &str) {
        let Some(path) = &self.path else {
            return;
        };
        let line = self.line(Local::now(), summary);

        let result = async {
            if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
                tokio::fs::create_dir_all(parent).await?;
            }
            let mut file = tokio::fs::OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .await?;
            file.write_all(line.as_bytes()).await?;
            file.flush().await
        }
        .await;

        if let Err(e) = result {
            tracing::warn!(path = %path.display(), error = %e, "failed to append change journal");
        }
    }
}
