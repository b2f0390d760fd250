// Download / file export of an analysis result
use anyhow::{Context, Result};
use std::path::Path;

use crate::analysis::MacroAnalysisResult;

pub const DOWNLOAD_FILENAME: &str = "financial_analysis_output.json";

/// Pretty-printed JSON, exactly what the download button produces
pub fn render_download(result: &MacroAnalysisResult) -> Result<String> {
    serde_json::to_string_pretty(result).context("Failed to serialize analysis result")
}

/// `Content-Disposition` value for a download named `filename`
pub fn content_disposition(filename: &str) -> String {
    let safe: String = filename
        .chars()
        .filter(|c| !matches!(c, '"' | '\\' | '/' | '\r' | '\n'))
        .collect();
    let safe = if safe.trim().is_empty() {
        DOWNLOAD_FILENAME.to_string()
    } else {
        safe
    };
    format!("attachment; filename=\"{}\"", safe)
}

/// Write the download file to `path`, creating parent directories.
pub async fn write_download(path: &Path, result: &MacroAnalysisResult) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        tokio::fs::create_dir_all(parent)
            .await
            .with_context(|| format!("Failed to create output directory: {}", parent.display()))?;
    }
    let body = render_download(result)?;
    tokio::fs::write(path, body)
        .await
        .with_context(|| format!("Failed to write analysis output: {}", path.display()))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::MacroAnalysisItem;

    fn sample(n: usize) -> MacroAnalysisResult {
        MacroAnalysisResult {
            macro_analysis: (0..n)
                .map(|i| MacroAnalysisItem {
                    news_summary: format!("story {}", i),
                    identified_macro_factors: vec!["inflation".into(), "interest rates".into()],
                    impact_analysis: "Higher yields".into(),
                    importance_score: if i % 2 == 0 { Some(5) } else { None },
                })
                .collect(),
        }
    }

    #[test]
    fn download_round_trips() {
        let result = sample(3);
        let text = render_download(&result).unwrap();
        assert!(text.contains("\n  \"macro_analysis\": ["));
        let back: MacroAnalysisResult = serde_json::from_str(&text).unwrap();
        assert_eq!(back, result);
        assert_eq!(back.len(), 3);
    }

    #[test]
    fn disposition_strips_quotes() {
        assert_eq!(
            content_disposition(DOWNLOAD_FILENAME),
            "attachment; filename=\"financial_analysis_output.json\""
        );
        assert_eq!(
            content_disposition("a\"b/c.json"),
            "attachment; filename=\"abc.json\""
        );
        assert_eq!(
            content_disposition("\"\""),
            "attachment; filename=\"financial_analysis_output.json\""
        );
    }

    #[tokio::test]
    async fn writes_file_into_new_directory() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out").join(DOWNLOAD_FILENAME);
        write_download(&path, &sample(1)).await.unwrap();

        let text = tokio::fs::read_to_string(&path).await.unwrap();
        assert_eq!(text, render_download(&sample(1)).unwrap());
    }
}
