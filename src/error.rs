//! Error types for the layout2md library.
//!
//! Two distinct error types reflect two distinct failure modes:
//!
//! * [`Layout2MdError`] — **Fatal**: the conversion cannot proceed at all
//!   (bad input file, wrong password, pdfium unavailable). Returned as
//!   `Err(Layout2MdError)` from the top-level `convert*` functions.
//!
//! * [`PageError`] — **Non-fatal**: a single page could not be extracted or
//!   analysed but every other page is fine. Stored inside
//!   [`crate::output::PageResult`] so one malformed page does not cost the
//!   whole document.

use std::path::PathBuf;
use thiserror::Error;

/// All fatal errors returned by the layout2md library.
///
/// Page-level failures use [`PageError`] and are stored in
/// [`crate::output::PageResult`] rather than propagated here.
#[derive(Debug, Error)]
pub enum Layout2MdError {
    // ── Input errors ──────────────────────────────────────────────────────
    /// Input file was not found at the given path.
    #[error("PDF file not found: '{path}'\nCheck the path exists and is readable.")]
    FileNotFound { path: PathBuf },

    /// Process does not have read permission on the file.
    #[error("Permission denied reading '{path}'\nTry: chmod +r {path:?}")]
    PermissionDenied { path: PathBuf },

    /// The input string is not a valid file path or URL.
    #[error("Invalid input '{input}': not a file path or a valid HTTP/HTTPS URL")]
    InvalidInput { input: String },

    /// HTTP URL was syntactically valid but download failed.
    #[error("Failed to download '{url}': {reason}")]
    DownloadFailed { url: String, reason: String },

    /// Download exceeded the configured timeout.
    #[error("Download timed out after {secs}s for '{url}'")]
    DownloadTimeout { url: String, secs: u64 },

    /// The file exists and was read, but is not a PDF.
    #[error("File is not a valid PDF: '{path}'\nFirst bytes: {magic:?}")]
    NotAPdf { path: PathBuf, magic: [u8; 4] },

    // ── PDF errors ────────────────────────────────────────────────────────
    /// PDF header/trailer/xref is corrupt and cannot be parsed.
    #[error("PDF '{path}' is corrupt: {detail}")]
    CorruptPdf { path: PathBuf, detail: String },

    /// PDF requires a password but none was provided.
    #[error("PDF '{path}' is encrypted and requires a password")]
    PasswordRequired { path: PathBuf },

    /// A password was provided but it is wrong.
    #[error("Wrong password for PDF '{path}'")]
    WrongPassword { path: PathBuf },

    /// The page selection matched no page of the document.
    #[error("Page {page} is out of range (document has {total} pages)")]
    PageOutOfRange { page: usize, total: usize },

    // ── Conversion errors ─────────────────────────────────────────────────
    /// Every selected page failed; output would be empty.
    #[error("All {total} pages failed.\nFirst error: {first_error}")]
    AllPagesFailed { total: usize, first_error: String },

    /// Some pages succeeded but at least one failed.
    ///
    /// Returned by [`crate::output::ConversionOutput::into_result`] when
    /// the caller wants to treat any page failure as an error.
    #[error("{failed}/{total} pages failed during conversion")]
    PartialFailure {
        success: usize,
        failed: usize,
        total: usize,
    },

    // ── I/O errors ────────────────────────────────────────────────────────
    /// Could not create or write the output Markdown file.
    #[error("Failed to write output file '{path}': {source}")]
    OutputWriteFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    // ── Fixture errors ────────────────────────────────────────────────────
    /// A fixture file or directory could not be read.
    #[error("Failed to read fixture '{path}': {source}")]
    FixtureIo {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// No source PDF exists for an expected-output fixture.
    #[error("No source PDF found for fixture '{name}' (looked for {expected:?})")]
    FixtureSourceMissing { name: String, expected: PathBuf },

    // ── Config errors ─────────────────────────────────────────────────────
    /// Builder validation failed.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    // ── Pdfium binding errors ─────────────────────────────────────────────
    /// Could not bind to a pdfium library.
    #[error(
        "Failed to bind to pdfium library: {0}\n\n\
Install libpdfium system-wide, or set\n\
PDFIUM_LIB_PATH=/path/to/libpdfium to use a specific copy."
    )]
    PdfiumBindingFailed(String),

    // ── Catch-all ─────────────────────────────────────────────────────────
    /// Unexpected internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

/// A non-fatal error for a single page.
///
/// Stored alongside [`crate::output::PageResult`] when a page fails.
/// The overall conversion continues unless ALL pages fail.
#[derive(Debug, Clone, Error, serde::Serialize, serde::Deserialize)]
pub enum PageError {
    /// pdfium could not load the page or its text layer.
    #[error("Page {page}: layout extraction failed: {detail}")]
    ExtractionFailed { page: usize, detail: String },

    /// The layout analysis task failed (panicked or was cancelled).
    #[error("Page {page}: layout analysis failed: {detail}")]
    AnalysisFailed { page: usize, detail: String },
}

impl PageError {
    /// 1-indexed page number the error refers to.
    pub fn page(&self) -> usize {
        match self {
            PageError::ExtractionFailed { page, .. } | PageError::AnalysisFailed { page, .. } => {
                *page
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_failure_display() {
        let e = Layout2MdError::PartialFailure {
            success: 9,
            failed: 1,
            total: 10,
        };
        let msg = e.to_string();
        assert!(msg.contains("1/10"), "got: {msg}");
    }

    #[test]
    fn all_pages_failed_carries_first_error() {
        let e = Layout2MdError::AllPagesFailed {
            total: 3,
            first_error: "Page 1: layout extraction failed: no text".into(),
        };
        let msg = e.to_string();
        assert!(msg.contains("All 3 pages"));
        assert!(msg.contains("no text"));
    }

    #[test]
    fn fixture_source_missing_names_fixture() {
        let e = Layout2MdError::FixtureSourceMissing {
            name: "2203.01017v2".into(),
            expected: PathBuf::from("/data/2203.01017v2.pdf"),
        };
        assert!(e.to_string().contains("2203.01017v2"));
    }

    #[test]
    fn page_error_reports_page() {
        let e = PageError::AnalysisFailed {
            page: 4,
            detail: "task cancelled".into(),
        };
        assert_eq!(e.page(), 4);
        assert!(e.to_string().starts_with("Page 4:"));
    }

    #[test]
    fn page_error_round_trips_through_json() {
        let e = PageError::ExtractionFailed {
            page: 2,
            detail: "bad stream".into(),
        };
        let json = serde_json::to_string(&e).unwrap();
        let back: PageError = serde_json::from_str(&json).unwrap();
        assert_eq!(back.page(), 2);
    }
}
