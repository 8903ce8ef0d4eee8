//! JSON output of pipeline results.
//!
//! Results go to stdout or to a date-based directory structure:
//!
//! ```text
//! output_dir/
//! └── 2025-05-06/
//!     ├── 081502.json
//!     └── 174233.json
//! ```

use crate::models::PipelineResult;
use chrono::{DateTime, Local};
use std::error::Error;
use std::path::PathBuf;
use tokio::fs;
use tracing::{error, info, instrument};

/// Serialize a result as `{ "cards": [...], "errors": {...} }`.
pub fn to_json(result: &PipelineResult, pretty: bool) -> serde_json::Result<String> {
    if pretty {
        serde_json::to_string_pretty(result)
    } else {
        serde_json::to_string(result)
    }
}

/// Path of the result file for a run that finished at `at`.
pub fn result_path(output_dir: &str, at: DateTime<Local>) -> PathBuf {
    PathBuf::from(output_dir)
        .join(at.format("%Y-%m-%d").to_string())
        .join(format!("{}.json", at.format("%H%M%S")))
}

/// Write a result file under `output_dir` and return its path.
#[instrument(level = "info", skip_all, fields(%output_dir))]
pub async fn write_result(
    result: &PipelineResult,
    output_dir: &str,
    pretty: bool,
) -> Result<PathBuf, Box<dyn Error>> {
    let json = to_json(result, pretty)?;
    let path = result_path(output_dir, Local::now());

    if let Some(dir) = path.parent() {
        if let Err(e) = fs::create_dir_all(dir).await {
            error!(dir = %dir.display(), error = %e, "Failed to create JSON dir");
            return Err(e.into());
        }
    }

    fs::write(&path, json).await?;
    info!(path = %path.display(), cards = result.cards.len(), "Wrote JSON result");
    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::CardRecord;
    use chrono::TimeZone;

    #[test]
    fn test_result_path_layout() {
        let at = Local.with_ymd_and_hms(2025, 5, 6, 8, 15, 2).unwrap();
        let path = result_path("/tmp/out", at);
        assert_eq!(path, PathBuf::from("/tmp/out/2025-05-06/081502.json"));
    }

    #[test]
    fn test_json_shape() {
        let mut result = PipelineResult::default();
        result.cards.push(CardRecord {
            name: "Mew".into(),
            source_name: Some("List 1".into()),
            ..Default::default()
        });
        result.errors.insert("List 2".into(), "fetch failed: timeout".into());

        let value: serde_json::Value = serde_json::from_str(&to_json(&result, false).unwrap()).unwrap();
        assert_eq!(
            value,
            serde_json::json!({
                "cards": [{"name": "Mew", "source_name": "List 1"}],
                "errors": {"List 2": "fetch failed: timeout"}
            })
        );
    }

    #[tokio::test]
    async fn test_write_result_creates_dirs() {
        let tmp = tempfile::tempdir().unwrap();
        let dir = tmp.path().to_str().unwrap();
        let path = write_result(&PipelineResult::default(), dir, true).await.unwrap();
        let written = std::fs::read_to_string(path).unwrap();
        let back: PipelineResult = serde_json::from_str(&written).unwrap();
        assert!(back.cards.is_empty());
    }
}
