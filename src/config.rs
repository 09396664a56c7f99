//! Configuration types for PDF-to-Markdown conversion.
//!
//! All conversion behaviour is controlled through [`ConversionConfig`], built
//! via its [`ConversionConfigBuilder`]. Geometry thresholds used by the
//! layout analysis live in [`LayoutTolerances`] so they can be tuned as a
//! unit for unusual documents.

use crate::error::Layout2MdError;
use crate::progress::ProgressCallback;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Configuration for a PDF-to-Markdown conversion.
///
/// Built via [`ConversionConfig::builder()`] or using
/// [`ConversionConfig::default()`].
///
/// # Example
/// ```rust
/// use layout2md::{ConversionConfig, ImageMode, TableStrategy};
///
/// let config = ConversionConfig::builder()
///     .concurrency(4)
///     .image_mode(ImageMode::Placeholder)
///     .table_strategy(TableStrategy::Lines)
///     .build()
///     .unwrap();
/// ```
#[derive(Clone)]
pub struct ConversionConfig {
    /// Number of pages analysed concurrently. Default: available parallelism.
    pub concurrency: usize,

    /// PDF user password for encrypted documents.
    pub password: Option<String>,

    /// Page selection. Default: All pages.
    pub pages: PageSelection,

    /// Page separator in assembled output. Default: None.
    pub page_separator: PageSeparator,

    /// Include YAML front-matter with document metadata. Default: false.
    pub include_metadata: bool,

    /// Download timeout for URL inputs in seconds. Default: 120.
    pub download_timeout_secs: u64,

    /// How pictures appear in the Markdown. Default: [`ImageMode::Placeholder`].
    pub image_mode: ImageMode,

    /// How tables are detected. Default: [`TableStrategy::Lines`].
    pub table_strategy: TableStrategy,

    /// How section header levels are assigned. Default: [`HeadingStyle::Flat`].
    pub heading_style: HeadingStyle,

    /// Keep running headers, footers and page numbers. Default: false.
    pub include_furniture: bool,

    /// Escape `_` outside code spans as `\_`. Default: true.
    pub escape_underscores: bool,

    /// Escape `&`, `<` and `>` as HTML entities. Default: true.
    pub escape_html: bool,

    /// Re-join words hyphenated across line breaks. Default: true.
    pub dehyphenate: bool,

    /// Geometry thresholds for layout analysis.
    pub tolerances: LayoutTolerances,

    /// Optional per-page progress events.
    pub progress_callback: Option<ProgressCallback>,
}

impl Default for ConversionConfig {
    fn default() -> Self {
        Self {
            concurrency: default_concurrency(),
            password: None,
            pages: PageSelection::default(),
            page_separator: PageSeparator::default(),
            include_metadata: false,
            download_timeout_secs: 120,
            image_mode: ImageMode::default(),
            table_strategy: TableStrategy::default(),
            heading_style: HeadingStyle::default(),
            include_furniture: false,
            escape_underscores: true,
            escape_html: true,
            dehyphenate: true,
            tolerances: LayoutTolerances::default(),
            progress_callback: None,
        }
    }
}

fn default_concurrency() -> usize {
    std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(4)
}

impl fmt::Debug for ConversionConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConversionConfig")
            .field("concurrency", &self.concurrency)
            .field("password", &self.password.as_ref().map(|_| "<redacted>"))
            .field("pages", &self.pages)
            .field("page_separator", &self.page_separator)
            .field("include_metadata", &self.include_metadata)
            .field("image_mode", &self.image_mode)
            .field("table_strategy", &self.table_strategy)
            .field("heading_style", &self.heading_style)
            .field("include_furniture", &self.include_furniture)
            .field("tolerances", &self.tolerances)
            .field(
                "progress_callback",
                &self.progress_callback.as_ref().map(|_| "<dyn ConversionProgressCallback>"),
            )
            .finish()
    }
}

impl ConversionConfig {
    /// Create a new builder for `ConversionConfig`.
    pub fn builder() -> ConversionConfigBuilder {
        ConversionConfigBuilder {
            config: Self::default(),
        }
    }
}

/// Builder for [`ConversionConfig`].
#[derive(Debug)]
pub struct ConversionConfigBuilder {
    config: ConversionConfig,
}

impl ConversionConfigBuilder {
    pub fn concurrency(mut self, n: usize) -> Self {
        self.config.concurrency = n;
        self
    }

    pub fn password(mut self, pwd: impl Into<String>) -> Self {
        self.config.password = Some(pwd.into());
        self
    }

    pub fn pages(mut self, selection: PageSelection) -> Self {
        self.config.pages = selection;
        self
    }

    pub fn page_separator(mut self, sep: PageSeparator) -> Self {
        self.config.page_separator = sep;
        self
    }

    pub fn include_metadata(mut self, v: bool) -> Self {
        self.config.include_metadata = v;
        self
    }

    pub fn download_timeout_secs(mut self, secs: u64) -> Self {
        self.config.download_timeout_secs = secs;
        self
    }

    pub fn image_mode(mut self, mode: ImageMode) -> Self {
        self.config.image_mode = mode;
        self
    }

    pub fn table_strategy(mut self, strategy: TableStrategy) -> Self {
        self.config.table_strategy = strategy;
        self
    }

    pub fn heading_style(mut self, style: HeadingStyle) -> Self {
        self.config.heading_style = style;
        self
    }

    pub fn include_furniture(mut self, v: bool) -> Self {
        self.config.include_furniture = v;
        self
    }

    pub fn escape_underscores(mut self, v: bool) -> Self {
        self.config.escape_underscores = v;
        self
    }

    pub fn escape_html(mut self, v: bool) -> Self {
        self.config.escape_html = v;
        self
    }

    pub fn dehyphenate(mut self, v: bool) -> Self {
        self.config.dehyphenate = v;
        self
    }

    pub fn tolerances(mut self, tolerances: LayoutTolerances) -> Self {
        self.config.tolerances = tolerances;
        self
    }

    pub fn progress_callback(mut self, cb: ProgressCallback) -> Self {
        self.config.progress_callback = Some(cb);
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(self) -> Result<ConversionConfig, Layout2MdError> {
        let c = &self.config;
        if c.concurrency == 0 {
            return Err(Layout2MdError::InvalidConfig(
                "Concurrency must be ≥ 1".into(),
            ));
        }
        if let PageSelection::Range(start, end) = c.pages {
            if start > end {
                return Err(Layout2MdError::InvalidConfig(format!(
                    "Page range {start}-{end} is reversed"
                )));
            }
        }
        c.tolerances.validate()?;
        Ok(self.config)
    }
}

// ── Layout tolerances ────────────────────────────────────────────────────

/// Geometry thresholds for the layout analysis stages.
///
/// Ratios are relative to the font size of the text involved; absolute
/// values are PDF points.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LayoutTolerances {
    /// Minimum vertical overlap (fraction of the smaller run) for two runs
    /// to share a line. Default: 0.5.
    pub line_overlap_ratio: f32,
    /// Horizontal gap (× font size) above which a space is inserted between
    /// runs. Default: 0.15.
    pub word_gap_ratio: f32,
    /// Horizontal gap in points that splits a line into column segments.
    /// Default: 10.0.
    pub column_gap: f32,
    /// Maximum vertical gap (× font size) between lines of one block.
    /// Default: 0.7.
    pub paragraph_gap_ratio: f32,
    /// Font-size ratio to the body text above which a block is a heading
    /// candidate. Default: 1.15.
    pub heading_min_ratio: f32,
    /// Distance within which parallel rulings snap together. Default: 3.0.
    pub snap_tolerance: f32,
    /// Gap within which collinear rulings are joined. Default: 3.0.
    pub join_tolerance: f32,
    /// Rulings shorter than this are ignored. Default: 3.0.
    pub min_edge_length: f32,
    /// Fraction of the page height treated as top/bottom margin. Default: 0.08.
    pub margin_ratio: f32,
}

impl Default for LayoutTolerances {
    fn default() -> Self {
        Self {
            line_overlap_ratio: 0.5,
            word_gap_ratio: 0.15,
            column_gap: 10.0,
            paragraph_gap_ratio: 0.7,
            heading_min_ratio: 1.15,
            snap_tolerance: 3.0,
            join_tolerance: 3.0,
            min_edge_length: 3.0,
            margin_ratio: 0.08,
        }
    }
}

impl LayoutTolerances {
    fn validate(&self) -> Result<(), Layout2MdError> {
        let fields = [
            ("line_overlap_ratio", self.line_overlap_ratio),
            ("word_gap_ratio", self.word_gap_ratio),
            ("column_gap", self.column_gap),
            ("paragraph_gap_ratio", self.paragraph_gap_ratio),
            ("heading_min_ratio", self.heading_min_ratio),
            ("snap_tolerance", self.snap_tolerance),
            ("join_tolerance", self.join_tolerance),
            ("min_edge_length", self.min_edge_length),
            ("margin_ratio", self.margin_ratio),
        ];
        for (name, value) in fields {
            if !value.is_finite() || value <= 0.0 {
                return Err(Layout2MdError::InvalidConfig(format!(
                    "{name} must be a positive number, got {value}"
                )));
            }
        }
        if self.margin_ratio >= 0.5 {
            return Err(Layout2MdError::InvalidConfig(format!(
                "margin_ratio must be below 0.5, got {}",
                self.margin_ratio
            )));
        }
        Ok(())
    }
}

// ── Enums ────────────────────────────────────────────────────────────────

/// Specifies which pages of the PDF to convert.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub enum PageSelection {
    /// Convert all pages (default).
    #[default]
    All,
    /// Convert a single page (1-indexed).
    Single(usize),
    /// Convert a contiguous range of pages (1-indexed, inclusive).
    Range(usize, usize),
    /// Convert specific pages (1-indexed, deduplicated).
    Set(Vec<usize>),
}

impl PageSelection {
    /// Expand the selection into a sorted, deduplicated list of 0-indexed page numbers.
    pub fn to_indices(&self, total_pages: usize) -> Vec<usize> {
        let mut indices: Vec<usize> = match self {
            PageSelection::All => (0..total_pages).collect(),
            PageSelection::Single(p) => {
                if *p >= 1 && *p <= total_pages {
                    vec![p - 1]
                } else {
                    vec![]
                }
            }
            PageSelection::Range(start, end) => {
                let s = (*start).max(1) - 1;
                let e = (*end).min(total_pages);
                (s..e).collect()
            }
            PageSelection::Set(pages) => pages
                .iter()
                .filter(|&&p| p >= 1 && p <= total_pages)
                .map(|p| p - 1)
                .collect(),
        };
        indices.sort_unstable();
        indices.dedup();
        indices
    }
}

/// How to separate pages in the assembled Markdown output.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub enum PageSeparator {
    /// No separator; pages joined with "\n\n". (default)
    #[default]
    None,
    /// Horizontal rule: "\n\n---\n\n"
    HorizontalRule,
    /// HTML comment with page number: "<!-- page N -->"
    Comment,
    /// Custom string inserted between pages.
    Custom(String),
}

impl PageSeparator {
    /// Render the separator string for the given page number (1-indexed).
    pub fn render(&self, page_num: usize) -> String {
        match self {
            PageSeparator::None => "\n\n".to_string(),
            PageSeparator::HorizontalRule => "\n\n---\n\n".to_string(),
            PageSeparator::Comment => format!("\n\n<!-- page {} -->\n\n", page_num),
            PageSeparator::Custom(s) => format!("\n\n{}\n\n", s),
        }
    }
}

/// How pictures are written to the Markdown output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ImageMode {
    /// `<!-- image -->` comment. (default)
    #[default]
    Placeholder,
    /// Inline `![Image](data:image/png;base64,…)`.
    Embedded,
    /// Pictures are dropped entirely.
    Omit,
}

/// How tables are located on a page.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum TableStrategy {
    /// Grids formed by drawn ruling lines. (default)
    #[default]
    Lines,
    /// Ruling lines first, then column-aligned text without borders.
    LinesAndText,
    /// No table detection; table text flows as paragraphs.
    Disabled,
}

/// How section header levels are assigned.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum HeadingStyle {
    /// Every section header is level 1 (`##`). (default)
    #[default]
    Flat,
    /// Levels follow font size rank and section numbering depth.
    Hierarchical,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        let c = ConversionConfig::builder().build().unwrap();
        assert!(c.concurrency >= 1);
        assert_eq!(c.image_mode, ImageMode::Placeholder);
        assert_eq!(c.table_strategy, TableStrategy::Lines);
        assert!(!c.include_furniture);
        assert!(c.escape_underscores);
    }

    #[test]
    fn zero_concurrency_rejected() {
        let err = ConversionConfig::builder().concurrency(0).build().unwrap_err();
        assert!(matches!(err, Layout2MdError::InvalidConfig(_)));
    }

    #[test]
    fn reversed_range_rejected() {
        let err = ConversionConfig::builder()
            .pages(PageSelection::Range(5, 2))
            .build()
            .unwrap_err();
        assert!(err.to_string().contains("5-2"));
    }

    #[test]
    fn bad_tolerances_rejected() {
        let tol = LayoutTolerances {
            column_gap: f32::NAN,
            ..LayoutTolerances::default()
        };
        assert!(ConversionConfig::builder().tolerances(tol).build().is_err());

        let tol = LayoutTolerances {
            margin_ratio: 0.6,
            ..LayoutTolerances::default()
        };
        let err = ConversionConfig::builder().tolerances(tol).build().unwrap_err();
        assert!(err.to_string().contains("margin_ratio"));
    }

    #[test]
    fn page_selection_to_indices() {
        assert_eq!(PageSelection::All.to_indices(3), vec![0, 1, 2]);
        assert_eq!(PageSelection::Single(3).to_indices(5), vec![2]);
        assert_eq!(PageSelection::Single(6).to_indices(5), Vec::<usize>::new());
        assert_eq!(PageSelection::Range(2, 4).to_indices(5), vec![1, 2, 3]);
        assert_eq!(PageSelection::Range(3, 10).to_indices(4), vec![2, 3]);
        assert_eq!(PageSelection::Set(vec![3, 1, 3]).to_indices(5), vec![0, 2]);
    }

    #[test]
    fn page_separator_render() {
        assert_eq!(PageSeparator::None.render(2), "\n\n");
        assert_eq!(PageSeparator::HorizontalRule.render(2), "\n\n---\n\n");
        assert_eq!(PageSeparator::Comment.render(7), "\n\n<!-- page 7 -->\n\n");
        assert_eq!(PageSeparator::Custom("***".into()).render(1), "\n\n***\n\n");
    }

    #[test]
    fn debug_redacts_password() {
        let c = ConversionConfig::builder().password("hunter2").build().unwrap();
        let dbg = format!("{c:?}");
        assert!(!dbg.contains("hunter2"));
        assert!(dbg.contains("<redacted>"));
    }

    #[test]
    fn enums_serialise() {
        let json = serde_json::to_string(&ImageMode::Embedded).unwrap();
        assert_eq!(json, "\"Embedded\"");
        let back: TableStrategy = serde_json::from_str("\"LinesAndText\"").unwrap();
        assert_eq!(back, TableStrategy::LinesAndText);
    }
}
