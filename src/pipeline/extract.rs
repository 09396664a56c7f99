//! Layout extraction: read text runs, picture regions and ruling lines from
//! each selected page via pdfium.
//!
//! pdfium reports geometry in PDF user space (origin bottom-left). Everything
//! is flipped to a top-left origin here, once, so the rest of the pipeline
//! never has to think about it.
//!
//! pdfium is not async-safe, so both entry points run their work inside
//! `tokio::task::spawn_blocking`.

use crate::config::PageSelection;
use crate::error::{Layout2MdError, PageError};
use crate::model::{BBox, ImageRegion, PageLayout, Ruling, TextRun};
use crate::output::DocumentMetadata;
use pdfium_render::prelude::*;
use std::path::Path;
use tracing::{debug, info, warn};

/// Paths thinner than this are treated as drawn lines.
const LINE_THICKNESS: f32 = 2.0;

/// Pictures narrower or shorter than this (points) are decoration.
const MIN_PICTURE_SIDE: f32 = 16.0;

/// Pictures covering more than this share of the page are page backgrounds.
const MAX_PICTURE_COVERAGE: f32 = 0.95;

/// Layouts of the selected pages of one document.
#[derive(Debug)]
pub struct ExtractedDocument {
    /// Page count of the whole document.
    pub total_pages: usize,
    /// One entry per selected page, in page order.
    pub pages: Vec<Result<PageLayout, PageError>>,
}

/// Bind to a pdfium library: `PDFIUM_LIB_PATH` first, then the system library.
pub fn bind_pdfium() -> Result<Pdfium, Layout2MdError> {
    let bindings = match std::env::var("PDFIUM_LIB_PATH") {
        Ok(path) if !path.is_empty() => {
            debug!("Binding pdfium from PDFIUM_LIB_PATH={}", path);
            Pdfium::bind_to_library(&path)
        }
        _ => Pdfium::bind_to_system_library(),
    }
    .map_err(|e| Layout2MdError::PdfiumBindingFailed(format!("{:?}", e)))?;
    Ok(Pdfium::new(bindings))
}

/// Open a document, mapping pdfium's load errors onto [`Layout2MdError`].
fn open_document<'a>(
    pdfium: &'a Pdfium,
    pdf_path: &Path,
    password: Option<&'a str>,
) -> Result<PdfDocument<'a>, Layout2MdError> {
    pdfium.load_pdf_from_file(pdf_path, password).map_err(|e| {
        let err_str = format!("{:?}", e);
        if err_str.contains("Password") || err_str.contains("password") {
            if password.is_some() {
                Layout2MdError::WrongPassword {
                    path: pdf_path.to_path_buf(),
                }
            } else {
                Layout2MdError::PasswordRequired {
                    path: pdf_path.to_path_buf(),
                }
            }
        } else {
            Layout2MdError::CorruptPdf {
                path: pdf_path.to_path_buf(),
                detail: err_str,
            }
        }
    })
}

/// Extract the layout of every selected page.
///
/// Fails as a whole only when the document cannot be opened or the
/// selection matches no page; single pages fail into [`PageError`].
pub async fn extract_layouts(
    pdf_path: &Path,
    password: Option<&str>,
    selection: &PageSelection,
    embed_images: bool,
) -> Result<ExtractedDocument, Layout2MdError> {
    let path = pdf_path.to_path_buf();
    let password = password.map(str::to_string);
    let selection = selection.clone();

    tokio::task::spawn_blocking(move || {
        extract_layouts_blocking(&path, password.as_deref(), &selection, embed_images)
    })
    .await
    .map_err(|e| Layout2MdError::Internal(format!("Extraction task panicked: {}", e)))?
}

fn extract_layouts_blocking(
    pdf_path: &Path,
    password: Option<&str>,
    selection: &PageSelection,
    embed_images: bool,
) -> Result<ExtractedDocument, Layout2MdError> {
    let pdfium = bind_pdfium()?;
    let document = open_document(&pdfium, pdf_path, password)?;

    let pages = document.pages();
    let total_pages = pages.len() as usize;
    info!("PDF loaded: {} pages", total_pages);

    let indices = selection.to_indices(total_pages);
    if indices.is_empty() {
        let page = match selection {
            PageSelection::Single(p) => *p,
            PageSelection::Range(start, _) => *start,
            PageSelection::Set(set) => set.iter().copied().max().unwrap_or(0),
            PageSelection::All => 0,
        };
        return Err(Layout2MdError::PageOutOfRange {
            page,
            total: total_pages,
        });
    }

    let mut results = Vec::with_capacity(indices.len());
    for idx in indices {
        let layout = pages
            .get(idx as u16)
            .map_err(|e| format!("{:?}", e))
            .and_then(|page| {
                extract_page(&page, idx, embed_images).map_err(|e| format!("{:?}", e))
            });
        match layout {
            Ok(layout) => {
                debug!(
                    "Page {}: {} runs, {} images, {} rulings",
                    idx + 1,
                    layout.runs.len(),
                    layout.images.len(),
                    layout.rulings.len()
                );
                results.push(Ok(layout));
            }
            Err(detail) => {
                warn!("Page {}: extraction failed: {}", idx + 1, detail);
                results.push(Err(PageError::ExtractionFailed {
                    page: idx + 1,
                    detail,
                }));
            }
        }
    }

    Ok(ExtractedDocument {
        total_pages,
        pages: results,
    })
}

fn extract_page(
    page: &PdfPage,
    index: usize,
    embed_images: bool,
) -> Result<PageLayout, PdfiumError> {
    let width = page.width().value;
    let height = page.height().value;
    let mut layout = PageLayout::new(index, width, height);

    let page_box = layout.bbox();
    layout.runs = text_runs(page, &page_box)?;
    for object in page.objects().iter() {
        let kind = object.object_type();
        if kind != PdfPageObjectType::Path && kind != PdfPageObjectType::Image {
            continue;
        }
        let Ok(bounds) = object.bounds() else {
            continue;
        };
        let bbox = BBox::new(
            bounds.left().value,
            height - bounds.top().value,
            bounds.right().value,
            height - bounds.bottom().value,
        )
        .clip(width, height);

        match kind {
            PdfPageObjectType::Path => layout.rulings.extend(path_rulings(&bbox, &page_box)),
            PdfPageObjectType::Image if is_picture(&bbox, &page_box) => {
                let mut region = ImageRegion::new(bbox);
                if embed_images {
                    region.image = object
                        .as_image_object()
                        .and_then(|image| image.get_raw_image().ok());
                }
                layout.images.push(region);
            }
            _ => {}
        }
    }

    Ok(layout)
}

/// One run per pdfium text segment, with the font of its first glyph.
fn text_runs(page: &PdfPage, page_box: &BBox) -> Result<Vec<TextRun>, PdfiumError> {
    let height = page_box.height();
    let text = page.text()?;
    let mut runs = Vec::new();

    for segment in text.segments().iter() {
        let content = segment.text();
        let content = content.trim();
        if content.is_empty() {
            continue;
        }

        let bounds = segment.bounds();
        let raw = BBox::new(
            bounds.left().value,
            height - bounds.top().value,
            bounds.right().value,
            height - bounds.bottom().value,
        );
        let Some(bbox) = clip_to_page(&raw, page_box) else {
            continue;
        };

        let (mut size, font_name) = segment
            .chars()
            .ok()
            .and_then(|chars| {
                chars
                    .iter()
                    .find(|ch| ch.unicode_char().is_some_and(|c| !c.is_whitespace()))
                    .map(|ch| (ch.scaled_font_size().value, ch.font_name()))
            })
            .unwrap_or_default();
        if size <= 0.0 {
            size = bbox.height();
        }

        runs.push(TextRun::new(content, bbox, size, font_name));
    }

    Ok(runs)
}

/// Clip `bbox` to the page; `None` when nothing of it is left.
fn clip_to_page(bbox: &BBox, page: &BBox) -> Option<BBox> {
    let clipped = bbox.clip(page.width(), page.height());
    (clipped.width() > 0.0 && clipped.height() > 0.0).then_some(clipped)
}

/// Turn a path's bounding box into ruling lines.
///
/// Thin paths become a single line along their long axis; larger boxes
/// contribute their four edges (cell borders are often drawn as rectangles).
fn path_rulings(bbox: &BBox, page: &BBox) -> Vec<Ruling> {
    let (w, h) = (bbox.width(), bbox.height());
    if w < LINE_THICKNESS && h < LINE_THICKNESS {
        return Vec::new();
    }
    if h <= LINE_THICKNESS {
        return vec![Ruling::horizontal(bbox.center_y(), bbox.x0, bbox.x1)];
    }
    if w <= LINE_THICKNESS {
        return vec![Ruling::vertical(bbox.center_x(), bbox.top, bbox.bottom)];
    }
    if bbox.area() >= page.area() * MAX_PICTURE_COVERAGE {
        return Vec::new();
    }
    Ruling::rect_edges(bbox).to_vec()
}

fn is_picture(bbox: &BBox, page: &BBox) -> bool {
    bbox.width() >= MIN_PICTURE_SIDE
        && bbox.height() >= MIN_PICTURE_SIDE
        && bbox.area() < page.area() * MAX_PICTURE_COVERAGE
}

/// Read the info dictionary without extracting any page.
pub async fn extract_metadata(
    pdf_path: &Path,
    password: Option<&str>,
) -> Result<DocumentMetadata, Layout2MdError> {
    let path = pdf_path.to_path_buf();
    let pwd = password.map(|s| s.to_string());

    tokio::task::spawn_blocking(move || extract_metadata_blocking(&path, pwd.as_deref()))
        .await
        .map_err(|e| Layout2MdError::Internal(format!("Metadata task panicked: {}", e)))?
}

fn extract_metadata_blocking(
    pdf_path: &Path,
    password: Option<&str>,
) -> Result<DocumentMetadata, Layout2MdError> {
    let pdfium = bind_pdfium()?;
    let document = open_document(&pdfium, pdf_path, password)?;

    let metadata = document.metadata();
    let get_meta = |tag: PdfDocumentMetadataTagType| -> Option<String> {
        metadata
            .get(tag)
            .map(|t| t.value().trim().to_string())
            .filter(|v| !v.is_empty())
    };

    Ok(DocumentMetadata {
        title: get_meta(PdfDocumentMetadataTagType::Title),
        author: get_meta(PdfDocumentMetadataTagType::Author),
        subject: get_meta(PdfDocumentMetadataTagType::Subject),
        creator: get_meta(PdfDocumentMetadataTagType::Creator),
        producer: get_meta(PdfDocumentMetadataTagType::Producer),
        creation_date: get_meta(PdfDocumentMetadataTagType::CreationDate),
        modification_date: get_meta(PdfDocumentMetadataTagType::ModificationDate),
        page_count: document.pages().len() as usize,
        pdf_version: format!("{:?}", document.version()),
    })
}
