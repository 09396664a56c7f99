//! Conversion results: the assembled document plus per-page detail.

use crate::error::{Layout2MdError, PageError};
use serde::{Deserialize, Serialize};

/// Result of converting a whole document.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConversionOutput {
    /// Assembled Markdown for all successful pages.
    pub markdown: String,
    /// Per-page results sorted by page number.
    pub pages: Vec<PageResult>,
    pub metadata: DocumentMetadata,
    pub stats: ConversionStats,
}

impl ConversionOutput {
    /// Treat any failed page as an error.
    pub fn into_result(self) -> Result<Self, Layout2MdError> {
        let failed = self.stats.failed_pages;
        if failed > 0 {
            return Err(Layout2MdError::PartialFailure {
                success: self.stats.processed_pages,
                failed,
                total: self.stats.processed_pages + failed,
            });
        }
        Ok(self)
    }

    /// Serialise the output (without image data) as pretty JSON.
    pub fn to_json(&self) -> Result<String, Layout2MdError> {
        serde_json::to_string_pretty(self)
            .map_err(|e| Layout2MdError::Internal(format!("JSON serialisation failed: {e}")))
    }
}

/// Outcome of a single page.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PageResult {
    /// 1-indexed page number.
    pub page_num: usize,
    /// Markdown produced for this page alone.
    pub markdown: String,
    /// Number of labelled items found on the page (furniture included).
    pub items: usize,
    pub tables: usize,
    pub pictures: usize,
    /// Wall-clock time spent analysing the page.
    pub duration_ms: u64,
    pub error: Option<PageError>,
}

impl PageResult {
    pub(crate) fn failed(error: PageError) -> Self {
        Self {
            page_num: error.page(),
            error: Some(error),
            ..Self::default()
        }
    }
}

/// Aggregate counters for a conversion.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ConversionStats {
    /// Page count of the whole document.
    pub total_pages: usize,
    pub processed_pages: usize,
    pub failed_pages: usize,
    /// Selected pages that produced no result at all.
    pub skipped_pages: usize,
    pub total_tables: usize,
    pub total_pictures: usize,
    pub total_duration_ms: u64,
    pub extract_duration_ms: u64,
    pub analysis_duration_ms: u64,
}

/// Document-level information from the PDF info dictionary.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DocumentMetadata {
    pub title: Option<String>,
    pub author: Option<String>,
    pub subject: Option<String>,
    pub creator: Option<String>,
    pub producer: Option<String>,
    pub creation_date: Option<String>,
    pub modification_date: Option<String>,
    pub page_count: usize,
    pub pdf_version: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn output(processed: usize, failed: usize) -> ConversionOutput {
        ConversionOutput {
            markdown: "# Title\n".into(),
            pages: vec![],
            metadata: DocumentMetadata::default(),
            stats: ConversionStats {
                total_pages: processed + failed,
                processed_pages: processed,
                failed_pages: failed,
                ..ConversionStats::default()
            },
        }
    }

    #[test]
    fn into_result_passes_clean_output() {
        assert!(output(3, 0).into_result().is_ok());
    }

    #[test]
    fn into_result_flags_partial_failure() {
        match output(2, 1).into_result() {
            Err(Layout2MdError::PartialFailure {
                success,
                failed,
                total,
            }) => {
                assert_eq!((success, failed, total), (2, 1, 3));
            }
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[test]
    fn failed_page_result_takes_page_from_error() {
        let r = PageResult::failed(PageError::ExtractionFailed {
            page: 5,
            detail: "x".into(),
        });
        assert_eq!(r.page_num, 5);
        assert!(r.markdown.is_empty());
    }

    #[test]
    fn to_json_contains_markdown() {
        let json = output(1, 0).to_json().unwrap();
        assert!(json.contains("\"markdown\": \"# Title\\n\""));
    }
}
