//! Streaming conversion API: emit pages as they complete.
//!
//! Unlike the eager [`crate::convert::convert`] which returns only after
//! all pages finish, [`convert_stream`] yields `PageResult` items via a
//! `Stream` as each page is analysed. Pages may arrive out of order (sort
//! by `page_num` if order matters).
//!
//! Each streamed page is rendered on its own: paragraphs continued across
//! pages are not re-joined, and a title is only recognised on the first
//! selected page.

use crate::config::ConversionConfig;
use crate::convert::{analyse_one, extract_pages, page_result};
use crate::error::{Layout2MdError, PageError};
use crate::model::PageLayout;
use crate::output::PageResult;
use crate::pipeline::analyse::AnalysisContext;
use crate::pipeline::markdown::{render_items, MarkdownOptions};
use crate::pipeline::{input, merge, postprocess};
use futures::stream::{self, StreamExt};
use std::path::Path;
use std::pin::Pin;
use std::sync::Arc;
use tokio_stream::Stream;
use tracing::info;

/// A boxed stream of page results.
pub type PageStream = Pin<Box<dyn Stream<Item = Result<PageResult, PageError>> + Send>>;

/// Convert a PDF to Markdown, streaming pages as they are ready.
///
/// Layout extraction happens before this returns; analysis and rendering
/// run as the stream is polled, `config.concurrency` pages at a time.
/// Pages pdfium could not read come first, as errors.
///
/// # Returns
/// - `Ok(PageStream)` — a stream of `Result<PageResult, PageError>`
/// - `Err(Layout2MdError)` — fatal error (file not found, not a PDF, etc.)
pub async fn convert_stream(
    input_str: impl AsRef<str>,
    config: &ConversionConfig,
) -> Result<PageStream, Layout2MdError> {
    let input_str = input_str.as_ref();
    info!("Starting streaming conversion: {}", input_str);

    let resolved = input::resolve_input(input_str, config.download_timeout_secs).await?;
    stream_pdf(resolved.path(), config).await
}

/// Convert PDF bytes in memory to Markdown, streaming pages as they complete.
///
/// This is the streaming equivalent of [`crate::convert::convert_from_bytes`].
/// The temporary copy of the bytes is removed once extraction finishes,
/// before the stream is returned.
///
/// # Example
/// ```rust,no_run
/// use layout2md::{convert_stream_from_bytes, ConversionConfig};
/// use futures::StreamExt;
///
/// # #[tokio::main]
/// # async fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let bytes: Vec<u8> = std::fs::read("document.pdf")?;
/// let config = ConversionConfig::default();
/// let mut stream = convert_stream_from_bytes(&bytes, &config).await?;
/// while let Some(page) = stream.next().await {
///     match page {
///         Ok(p) => println!("Page {}: {} chars", p.page_num, p.markdown.len()),
///         Err(e) => eprintln!("Error: {e}"),
///     }
/// }
/// # Ok(())
/// # }
/// ```
pub async fn convert_stream_from_bytes(
    bytes: &[u8],
    config: &ConversionConfig,
) -> Result<PageStream, Layout2MdError> {
    let resolved = input::resolve_bytes(bytes)?;
    stream_pdf(resolved.path(), config).await
}

async fn stream_pdf(
    pdf_path: &Path,
    config: &ConversionConfig,
) -> Result<PageStream, Layout2MdError> {
    let extraction = extract_pages(pdf_path, config).await?;
    let failures = extraction
        .failures
        .into_iter()
        .filter_map(|page| page.error)
        .map(Err);
    let analysed = stream_layouts(extraction.layouts, config);
    Ok(Box::pin(stream::iter(failures).chain(analysed)))
}

/// Stream already-extracted layouts through analysis and rendering.
pub fn stream_layouts(mut layouts: Vec<PageLayout>, config: &ConversionConfig) -> PageStream {
    layouts.sort_by_key(|l| l.page_index);
    let total_pages = layouts.len();
    let ctx = Arc::new(AnalysisContext::new(&layouts, config));
    let opts = MarkdownOptions::from(config);
    let dehyphenate = config.dehyphenate;
    let cb = config.progress_callback.clone();

    let pending: Vec<_> = layouts
        .into_iter()
        .map(|layout| analyse_one(layout, Arc::clone(&ctx), config, total_pages))
        .collect();

    let s = stream::iter(pending)
        .buffer_unordered(config.concurrency)
        .map(move |result| -> Result<PageResult, PageError> {
            let (analysis, duration_ms) = result?;
            let page_num = analysis.page_index + 1;
            let items = merge::merge_pages(vec![analysis], dehyphenate)
                .into_iter()
                .next()
                .unwrap_or_default();
            let markdown = postprocess::clean_markdown(&render_items(&items, &opts));
            if let Some(ref cb) = cb {
                cb.on_page_complete(page_num, total_pages, markdown.len());
            }
            Ok(page_result(page_num, markdown, &items, duration_ms))
        });
    Box::pin(s)
}
