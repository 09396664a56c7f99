//! Eager (full-document) conversion entry points.
//!
//! These wait for every page, apply the document-level merges (paragraphs
//! continued across columns and pages, caption placement, title demotion)
//! and return one assembled Markdown document. Use
//! [`crate::stream::convert_stream`] to receive pages as they complete
//! instead; streamed pages skip the cross-page merges.

use crate::config::{ConversionConfig, ImageMode, PageSeparator};
use crate::error::{Layout2MdError, PageError};
use crate::model::{DocItem, PageAnalysis, PageLayout};
use crate::output::{ConversionOutput, ConversionStats, DocumentMetadata, PageResult};
use crate::pipeline::analyse::{analyse_page, AnalysisContext};
use crate::pipeline::markdown::{join_parts, render_parts, MarkdownOptions, RenderedPart};
use crate::pipeline::{extract, input, merge, postprocess};
use futures::stream::{self, StreamExt};
use std::path::Path;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, warn};

/// Convert a PDF file or URL to Markdown.
///
/// This is the primary entry point for the library.
///
/// # Arguments
/// * `input_str` — Local file path, `file://` path or HTTP/HTTPS URL
/// * `config` — Conversion configuration
///
/// # Returns
/// `Ok(ConversionOutput)` on success, even if some pages failed
/// (check `output.stats.failed_pages`).
///
/// # Errors
/// Returns `Err(Layout2MdError)` only for fatal errors:
/// - File not found / permission denied / not a PDF
/// - Wrong or missing password
/// - No page selected, or every selected page failed
pub async fn convert(
    input_str: impl AsRef<str>,
    config: &ConversionConfig,
) -> Result<ConversionOutput, Layout2MdError> {
    let total_start = Instant::now();
    let input_str = input_str.as_ref();
    info!("Starting conversion: {}", input_str);

    // ── Step 1: Resolve input ────────────────────────────────────────────
    let resolved = input::resolve_input(input_str, config.download_timeout_secs).await?;
    convert_pdf(resolved.path(), config, total_start).await
}

/// Convert PDF bytes in memory to Markdown.
///
/// The bytes are written to a managed [`tempfile`] that is removed when
/// the conversion returns.
///
/// # Example
/// ```rust,no_run
/// use layout2md::{convert_from_bytes, ConversionConfig};
///
/// # #[tokio::main]
/// # async fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let bytes: Vec<u8> = std::fs::read("document.pdf")?;
/// let output = convert_from_bytes(&bytes, &ConversionConfig::default()).await?;
/// println!("{}", output.markdown);
/// # Ok(())
/// # }
/// ```
pub async fn convert_from_bytes(
    bytes: &[u8],
    config: &ConversionConfig,
) -> Result<ConversionOutput, Layout2MdError> {
    let total_start = Instant::now();
    let resolved = input::resolve_bytes(bytes)?;
    convert_pdf(resolved.path(), config, total_start).await
}

/// Convert a PDF and write the Markdown to a file.
///
/// Uses atomic write (temp file + rename) to prevent partial files.
pub async fn convert_to_file(
    input_str: impl AsRef<str>,
    output_path: impl AsRef<Path>,
    config: &ConversionConfig,
) -> Result<ConversionStats, Layout2MdError> {
    let output = convert(input_str, config).await?;
    write_atomically(output_path.as_ref(), &output.markdown).await?;
    Ok(output.stats)
}

async fn write_atomically(path: &Path, contents: &str) -> Result<(), Layout2MdError> {
    let write_err = |source| Layout2MdError::OutputWriteFailed {
        path: path.to_path_buf(),
        source,
    };
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        tokio::fs::create_dir_all(parent).await.map_err(write_err)?;
    }
    let tmp_path = path.with_extension("md.tmp");
    tokio::fs::write(&tmp_path, contents).await.map_err(write_err)?;
    tokio::fs::rename(&tmp_path, path).await.map_err(write_err)?;
    debug!("Wrote {} bytes to {}", contents.len(), path.display());
    Ok(())
}

/// Synchronous wrapper around [`convert`].
///
/// Creates a temporary tokio runtime internally; do not call it from
/// inside an async context.
pub fn convert_sync(
    input_str: impl AsRef<str>,
    config: &ConversionConfig,
) -> Result<ConversionOutput, Layout2MdError> {
    tokio::runtime::Runtime::new()
        .map_err(|e| Layout2MdError::Internal(format!("Failed to create tokio runtime: {}", e)))?
        .block_on(convert(input_str, config))
}

/// Read PDF metadata without converting any page.
pub async fn inspect(input_str: impl AsRef<str>) -> Result<DocumentMetadata, Layout2MdError> {
    let resolved = input::resolve_input(input_str.as_ref(), 120).await?;
    extract::extract_metadata(resolved.path(), None).await
}

/// Run everything after extraction on layouts that are already in memory.
///
/// `config.pages` selects by `page_index + 1`. The metadata only carries
/// the page count, taken as one past the highest page index.
pub async fn convert_layouts(
    mut layouts: Vec<PageLayout>,
    config: &ConversionConfig,
) -> Result<ConversionOutput, Layout2MdError> {
    let total_start = Instant::now();
    let total_pages = layouts.iter().map(|l| l.page_index + 1).max().unwrap_or(0);

    let wanted = config.pages.to_indices(total_pages);
    layouts.retain(|l| wanted.binary_search(&l.page_index).is_ok());
    layouts.sort_by_key(|l| l.page_index);
    layouts.dedup_by_key(|l| l.page_index);
    if layouts.is_empty() {
        return Err(Layout2MdError::PageOutOfRange {
            page: 0,
            total: total_pages,
        });
    }

    let selected = layouts.len();
    if let Some(ref cb) = config.progress_callback {
        cb.on_conversion_start(selected);
        cb.on_extraction_complete(selected, selected);
    }

    let metadata = DocumentMetadata {
        page_count: total_pages,
        ..DocumentMetadata::default()
    };
    let extraction = Extraction {
        layouts,
        failures: Vec::new(),
        total_pages,
        selected,
        duration_ms: 0,
    };
    finish(extraction, metadata, config, total_start).await
}

// ── Internal pipeline ────────────────────────────────────────────────────

/// Extracted pages plus the pages pdfium could not read.
pub(crate) struct Extraction {
    pub(crate) layouts: Vec<PageLayout>,
    pub(crate) failures: Vec<PageResult>,
    pub(crate) total_pages: usize,
    pub(crate) selected: usize,
    pub(crate) duration_ms: u64,
}

async fn convert_pdf(
    pdf_path: &Path,
    config: &ConversionConfig,
    total_start: Instant,
) -> Result<ConversionOutput, Layout2MdError> {
    // ── Step 2: Extract metadata ─────────────────────────────────────────
    let metadata = extract::extract_metadata(pdf_path, config.password.as_deref()).await?;
    info!("PDF has {} pages", metadata.page_count);

    let selected = config.pages.to_indices(metadata.page_count).len();
    if selected > 0 {
        if let Some(ref cb) = config.progress_callback {
            cb.on_conversion_start(selected);
        }
    }

    // ── Step 3: Extract layouts ──────────────────────────────────────────
    let extraction = extract_pages(pdf_path, config).await?;
    finish(extraction, metadata, config, total_start).await
}

/// Extract the selected pages and split them into layouts and failures.
pub(crate) async fn extract_pages(
    pdf_path: &Path,
    config: &ConversionConfig,
) -> Result<Extraction, Layout2MdError> {
    let start = Instant::now();
    let embed_images = config.image_mode == ImageMode::Embedded;
    let extracted = extract::extract_layouts(
        pdf_path,
        config.password.as_deref(),
        &config.pages,
        embed_images,
    )
    .await?;
    let duration_ms = start.elapsed().as_millis() as u64;

    let selected = extracted.pages.len();
    let mut layouts = Vec::with_capacity(selected);
    let mut failures = Vec::new();
    for page in extracted.pages {
        match page {
            Ok(layout) => layouts.push(layout),
            Err(e) => {
                warn!("{}", e);
                if let Some(ref cb) = config.progress_callback {
                    cb.on_page_error(e.page(), selected, &e.to_string());
                }
                failures.push(PageResult::failed(e));
            }
        }
    }
    info!(
        "Extracted {}/{} pages in {}ms",
        layouts.len(),
        selected,
        duration_ms
    );
    if let Some(ref cb) = config.progress_callback {
        cb.on_extraction_complete(layouts.len(), selected);
    }

    Ok(Extraction {
        layouts,
        failures,
        total_pages: extracted.total_pages,
        selected,
        duration_ms,
    })
}

/// Analyse, merge, render and assemble.
async fn finish(
    extraction: Extraction,
    metadata: DocumentMetadata,
    config: &ConversionConfig,
    total_start: Instant,
) -> Result<ConversionOutput, Layout2MdError> {
    let Extraction {
        layouts,
        failures,
        total_pages,
        selected,
        duration_ms: extract_duration_ms,
    } = extraction;

    // ── Step 4: Analyse pages ────────────────────────────────────────────
    let analysis_start = Instant::now();
    let ctx = Arc::new(AnalysisContext::new(&layouts, config));
    let analysed = analyse_concurrent(layouts, &ctx, config, selected).await;
    let analysis_duration_ms = analysis_start.elapsed().as_millis() as u64;

    let mut pages = failures;
    let mut analyses: Vec<(PageAnalysis, u64)> = Vec::with_capacity(analysed.len());
    for result in analysed {
        match result {
            Ok(ok) => analyses.push(ok),
            Err(e) => {
                warn!("{}", e);
                pages.push(PageResult::failed(e));
            }
        }
    }
    analyses.sort_by_key(|(a, _)| a.page_index);

    // ── Step 5: Cross-page merges ────────────────────────────────────────
    let page_nums: Vec<(usize, u64)> = analyses
        .iter()
        .map(|(a, ms)| (a.page_index + 1, *ms))
        .collect();
    let merged = merge::merge_pages(
        analyses.into_iter().map(|(a, _)| a).collect(),
        config.dehyphenate,
    );

    // ── Step 6: Render Markdown per page ─────────────────────────────────
    let opts = MarkdownOptions::from(config);
    let mut rendered: Vec<(usize, Vec<RenderedPart>)> = Vec::with_capacity(merged.len());
    for ((page_num, duration_ms), items) in page_nums.into_iter().zip(merged) {
        let parts = render_parts(&items, &opts);
        let markdown = postprocess::clean_markdown(&join_parts(&parts));
        if let Some(ref cb) = config.progress_callback {
            cb.on_page_complete(page_num, selected, markdown.len());
        }
        pages.push(page_result(page_num, markdown, &items, duration_ms));
        rendered.push((page_num, parts));
    }
    pages.sort_by_key(|p| p.page_num);

    // ── Step 7: Assemble document ────────────────────────────────────────
    let markdown = assemble_document(&rendered, config, &metadata);

    // ── Step 8: Stats ────────────────────────────────────────────────────
    let processed = pages.iter().filter(|p| p.error.is_none()).count();
    let failed = pages.len() - processed;
    if processed == 0 {
        let first_error = pages
            .iter()
            .find_map(|p| p.error.as_ref())
            .map(|e| e.to_string())
            .unwrap_or_else(|| "Unknown error".to_string());
        return Err(Layout2MdError::AllPagesFailed {
            total: pages.len(),
            first_error,
        });
    }

    let stats = ConversionStats {
        total_pages,
        processed_pages: processed,
        failed_pages: failed,
        skipped_pages: selected.saturating_sub(pages.len()),
        total_tables: pages.iter().map(|p| p.tables).sum(),
        total_pictures: pages.iter().map(|p| p.pictures).sum(),
        total_duration_ms: total_start.elapsed().as_millis() as u64,
        extract_duration_ms,
        analysis_duration_ms,
    };

    info!(
        "Conversion complete: {}/{} pages, {} tables, {} pictures, {}ms total",
        processed, selected, stats.total_tables, stats.total_pictures, stats.total_duration_ms
    );
    if let Some(ref cb) = config.progress_callback {
        cb.on_conversion_complete(selected, processed);
    }

    Ok(ConversionOutput {
        markdown,
        pages,
        metadata,
        stats,
    })
}

/// Analyse pages on the blocking pool, at most `config.concurrency` at once.
///
/// Results arrive in completion order.
pub(crate) async fn analyse_concurrent(
    layouts: Vec<PageLayout>,
    ctx: &Arc<AnalysisContext>,
    config: &ConversionConfig,
    total_pages: usize,
) -> Vec<Result<(PageAnalysis, u64), PageError>> {
    stream::iter(
        layouts
            .into_iter()
            .map(|layout| analyse_one(layout, Arc::clone(ctx), config, total_pages)),
    )
    .buffer_unordered(config.concurrency)
    .collect()
    .await
}

pub(crate) fn analyse_one(
    layout: PageLayout,
    ctx: Arc<AnalysisContext>,
    config: &ConversionConfig,
    total_pages: usize,
) -> impl std::future::Future<Output = Result<(PageAnalysis, u64), PageError>> + Send + 'static {
    let cb = config.progress_callback.clone();
    async move {
        let page_num = layout.page_index + 1;
        if let Some(ref cb) = cb {
            cb.on_page_start(page_num, total_pages);
        }
        let start = Instant::now();
        let result = tokio::task::spawn_blocking(move || analyse_page(&layout, &ctx))
            .await
            .map(|analysis| (analysis, start.elapsed().as_millis() as u64))
            .map_err(|e| PageError::AnalysisFailed {
                page: page_num,
                detail: e.to_string(),
            });
        if let (Some(cb), Err(e)) = (&cb, &result) {
            cb.on_page_error(page_num, total_pages, &e.to_string());
        }
        result
    }
}

pub(crate) fn page_result(
    page_num: usize,
    markdown: String,
    items: &[DocItem],
    duration_ms: u64,
) -> PageResult {
    PageResult {
        page_num,
        markdown,
        items: items.len(),
        tables: items.iter().filter(|i| matches!(i, DocItem::Table(_))).count(),
        pictures: items
            .iter()
            .filter(|i| matches!(i, DocItem::Picture { .. }))
            .count(),
        duration_ms,
        error: None,
    }
}

/// Join the rendered pages into the final document.
///
/// Without a separator the pages flow as one item sequence, so a list
/// continued on the next page stays one list.
fn assemble_document(
    pages: &[(usize, Vec<RenderedPart>)],
    config: &ConversionConfig,
    metadata: &DocumentMetadata,
) -> String {
    let mut out = String::new();

    // Optional YAML front-matter
    if config.include_metadata {
        out.push_str(&format_yaml_front_matter(metadata));
    }

    match config.page_separator {
        PageSeparator::None => {
            out.push_str(&join_parts(pages.iter().flat_map(|(_, parts)| parts)));
        }
        ref separator => {
            let mut first = true;
            for (page_num, parts) in pages {
                let body = join_parts(parts);
                if body.is_empty() {
                    continue;
                }
                if !first {
                    out.push_str(&separator.render(*page_num));
                }
                out.push_str(&body);
                first = false;
            }
        }
    }

    postprocess::clean_markdown(&out)
}

/// Format document metadata as YAML front matter.
fn format_yaml_front_matter(meta: &DocumentMetadata) -> String {
    let mut yaml = String::from("---\n");
    let fields = [
        ("title", &meta.title),
        ("author", &meta.author),
        ("subject", &meta.subject),
        ("creator", &meta.creator),
        ("producer", &meta.producer),
        ("created", &meta.creation_date),
        ("modified", &meta.modification_date),
    ];
    for (key, value) in fields {
        if let Some(v) = value {
            yaml.push_str(&format!("{}: \"{}\"\n", key, yaml_escape(v)));
        }
    }
    yaml.push_str(&format!("pages: {}\n", meta.page_count));
    if !meta.pdf_version.is_empty() {
        yaml.push_str(&format!("pdf_version: \"{}\"\n", meta.pdf_version));
    }
    yaml.push_str("---\n\n");
    yaml
}

fn yaml_escape(s: &str) -> String {
    s.replace('\\', "\\\\").replace('"', "\\\"")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::PageSelection;
    use crate::model::{BBox, TextRun};
    use crate::progress::ConversionProgressCallback;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn run(text: &str, x0: f32, top: f32, size: f32) -> TextRun {
        let width = text.chars().count() as f32 * size * 0.5;
        TextRun::new(text, BBox::new(x0, top, x0 + width, top + size), size, "Times-Roman")
    }

    fn page(index: usize, lines: &[&str]) -> PageLayout {
        let mut layout = PageLayout::new(index, 600.0, 800.0);
        for (i, line) in lines.iter().enumerate() {
            layout.runs.push(run(line, 72.0, 200.0 + i as f32 * 40.0, 10.0));
        }
        layout
    }

    #[tokio::test]
    async fn paragraphs_continue_across_pages() {
        let layouts = vec![
            page(0, &["The first page ends in the middle of a sentence and"]),
            page(1, &["continues on the second page."]),
        ];
        let out = convert_layouts(layouts, &ConversionConfig::default()).await.unwrap();
        assert_eq!(
            out.markdown,
            "The first page ends in the middle of a sentence and continues on the second page.\n"
        );
        assert_eq!(out.stats.processed_pages, 2);
        assert_eq!(out.pages[1].markdown, "");
    }

    #[tokio::test]
    async fn separator_between_pages() {
        let layouts = vec![page(0, &["Alpha."]), page(1, &["Beta."])];
        let config = ConversionConfig::builder()
            .page_separator(PageSeparator::Comment)
            .build()
            .unwrap();
        let out = convert_layouts(layouts, &config).await.unwrap();
        assert_eq!(out.markdown, "Alpha.\n\n<!-- page 2 -->\n\nBeta.\n");
    }

    #[tokio::test]
    async fn list_continued_on_next_page_stays_one_list() {
        let layouts = vec![page(0, &["- first point."]), page(1, &["- second point."])];
        let out = convert_layouts(layouts, &ConversionConfig::default()).await.unwrap();
        assert_eq!(out.markdown, "- first point.\n- second point.\n");
    }

    #[tokio::test]
    async fn page_selection_applies_to_layouts() {
        let layouts = vec![page(0, &["Alpha."]), page(1, &["Beta."]), page(2, &["Gamma."])];
        let config = ConversionConfig::builder()
            .pages(PageSelection::Single(2))
            .build()
            .unwrap();
        let out = convert_layouts(layouts.clone(), &config).await.unwrap();
        assert_eq!(out.markdown, "Beta.\n");
        assert_eq!(out.stats.total_pages, 3);

        let config = ConversionConfig::builder()
            .pages(PageSelection::Single(9))
            .build()
            .unwrap();
        let err = convert_layouts(layouts, &config).await.unwrap_err();
        assert!(matches!(err, Layout2MdError::PageOutOfRange { total: 3, .. }));
    }

    #[tokio::test]
    async fn front_matter_is_prepended() {
        let config = ConversionConfig::builder()
            .include_metadata(true)
            .build()
            .unwrap();
        let out = convert_layouts(vec![page(0, &["Alpha."])], &config).await.unwrap();
        assert_eq!(out.markdown, "---\npages: 1\n---\n\nAlpha.\n");
    }

    #[tokio::test]
    async fn progress_events_fire_per_page() {
        #[derive(Default)]
        struct Counter {
            started: AtomicUsize,
            completed: AtomicUsize,
            success: AtomicUsize,
        }
        impl ConversionProgressCallback for Counter {
            fn on_page_start(&self, _: usize, _: usize) {
                self.started.fetch_add(1, Ordering::SeqCst);
            }
            fn on_page_complete(&self, _: usize, _: usize, _: usize) {
                self.completed.fetch_add(1, Ordering::SeqCst);
            }
            fn on_conversion_complete(&self, _: usize, success_count: usize) {
                self.success.store(success_count, Ordering::SeqCst);
            }
        }

        let counter = Arc::new(Counter::default());
        let config = ConversionConfig::builder()
            .concurrency(2)
            .progress_callback(counter.clone())
            .build()
            .unwrap();
        let layouts = vec![page(0, &["Alpha."]), page(1, &["Beta."]), page(2, &["Gamma."])];
        convert_layouts(layouts, &config).await.unwrap();
        assert_eq!(counter.started.load(Ordering::SeqCst), 3);
        assert_eq!(counter.completed.load(Ordering::SeqCst), 3);
        assert_eq!(counter.success.load(Ordering::SeqCst), 3);
    }

    #[test]
    fn yaml_front_matter_escapes_quotes() {
        let meta = DocumentMetadata {
            title: Some("A \"quoted\" title".into()),
            page_count: 4,
            pdf_version: "1.7".into(),
            ..DocumentMetadata::default()
        };
        let yaml = format_yaml_front_matter(&meta);
        assert!(yaml.contains("title: \"A \\\"quoted\\\" title\"\n"));
        assert!(yaml.contains("pages: 4\n"));
        assert!(yaml.ends_with("---\n\n"));
    }

    #[tokio::test]
    async fn write_atomically_creates_parents() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested/out.md");
        write_atomically(&path, "# Done\n").await.unwrap();
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "# Done\n");
        assert!(!path.with_extension("md.tmp").exists());
    }
}
