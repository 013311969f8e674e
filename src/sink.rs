//! Output sinks consuming the final record stream.

use std::path::PathBuf;

use anyhow::{Context, Result};
use async_trait::async_trait;
use tokio::io::AsyncWriteExt;
use tracing::info;

use crate::aggregate::AggregateResult;

/// Consumer of a finished harvest. Sinks never mutate records.
#[async_trait]
pub trait RecordSink: Send + Sync {
    /// # Errors
    ///
    /// Returns an error if the result cannot be written.
    async fn emit(&self, result: &AggregateResult) -> Result<()>;
}

/// Pretty JSON to a file, or to stdout when no path is given.
#[derive(Debug, Clone)]
pub struct JsonSink {
    path: Option<PathBuf>,
}

impl JsonSink {
    #[must_use]
    pub fn stdout() -> Self {
        Self { path: None }
    }

    #[must_use]
    pub fn file(path: impl Into<PathBuf>) -> Self {
        Self {
            path: Some(path.into()),
        }
    }

    /// Stdout when `path` is `None`.
    #[must_use]
    pub fn from_path(path: Option<PathBuf>) -> Self {
        Self { path }
    }
}

#[async_trait]
impl RecordSink for JsonSink {
    async fn emit(&self, result: &AggregateResult) -> Result<()> {
        let mut json =
            serde_json::to_vec_pretty(result).context("Failed to serialize harvest result")?;
        json.push(b'\n');

        if let Some(path) = &self.path {
            if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
                tokio::fs::create_dir_all(parent).await.with_context(|| {
                    format!("Failed to create output directory: {}", parent.display())
                })?;
            }
            tokio::fs::write(path, &json)
                .await
                .with_context(|| format!("Failed to write output file: {}", path.display()))?;
            info!(path = %path.display(), records = result.records.len(), "Wrote harvest result");
        } else {
            let mut stdout = tokio::io::stdout();
            stdout
                .write_all(&json)
                .await
                .context("Failed to write harvest result to stdout")?;
            stdout.flush().await.context("Failed to flush stdout")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;
    use tempfile::TempDir;

    use super::*;
    use crate::aggregate::ErrorSummary;
    use crate::models::DiscussionRecord;

    #[tokio::test]
    async fn test_json_file_sink() {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let path = temp_dir.path().join("out/result.json");

        let mut errors = ErrorSummary::new();
        errors.record_message("http status 404 Not Found".to_string(), Some(3));
        let result = AggregateResult {
            records: vec![DiscussionRecord {
                title: "整租".to_string(),
                short_title: "整租".to_string(),
                link: "https://s/topic/7/".to_string(),
                id: "7".to_string(),
                author: "alice".to_string(),
                reply_count: 4,
                last_activity: NaiveDate::from_ymd_opt(2021, 5, 9)
                    .unwrap()
                    .and_hms_opt(0, 0, 0)
                    .unwrap(),
                created_at: None,
                content: None,
                favor_count: None,
            }],
            errors: Some(errors),
            pages_planned: 4,
            pages_completed: 3,
        };

        JsonSink::file(&path).emit(&result).await.unwrap();

        let written: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(written["records"][0]["id"], "7");
        assert_eq!(written["records"][0]["last_activity"], "2021-05-09T00:00:00");
        assert!(written["records"][0].get("content").is_none());
        assert_eq!(written["errors"][0]["count"], 1);
        assert_eq!(written["errors"][0]["pages"][0], 3);
        assert_eq!(written["pages_completed"], 3);
    }
}
