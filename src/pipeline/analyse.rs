//! Per-page layout analysis: one [`PageLayout`] in, one [`PageAnalysis`] out.
//!
//! ```text
//! runs ──▶ tables ──▶ (remaining runs) ──▶ lines ──▶ segments ──▶ blocks
//!                                                                  │
//!          pictures ─────────────────────────────────┐            ▼
//!                                                     ├──▶ furniture / classify
//!          tables ───────────────────────────────────┘            │
//!                                                                  ▼
//!                                                           reading order
//! ```
//!
//! Everything that needs the whole document (font statistics, repeated
//! margin text) is measured up front into an [`AnalysisContext`], so pages
//! can be analysed independently and concurrently.

use crate::config::{ConversionConfig, ImageMode, TableStrategy};
use crate::model::{DocItem, PageAnalysis, PageItem, PageLayout};
use crate::pipeline::blocks::{build_blocks, build_lines, split_columns};
use crate::pipeline::classify::{classify_block, ClassifyContext, FontStats};
use crate::pipeline::furniture::{FurnitureKind, FurnitureProfile};
use crate::pipeline::reading_order::reading_order;
use crate::pipeline::tables::find_tables;
use tracing::debug;

/// Pictures covering more of the page than this are backdrops.
const BACKDROP_PAGE_RATIO: f32 = 0.5;

/// Document-wide state shared by every page analysis.
#[derive(Debug, Clone)]
pub struct AnalysisContext {
    pub classify: ClassifyContext,
    pub furniture: FurnitureProfile,
    /// Index of the first page analysed; only that page may hold the title.
    pub first_page_index: usize,
    pub table_strategy: TableStrategy,
    pub keep_image_data: bool,
}

impl AnalysisContext {
    /// Measure `layouts` (every page that will be analysed).
    pub fn new(layouts: &[PageLayout], config: &ConversionConfig) -> Self {
        let tol = &config.tolerances;
        let stats = FontStats::from_layouts(layouts, tol);
        debug!(
            "Font stats: body {:.1}pt, {} heading sizes, title {:?}",
            stats.body_size,
            stats.heading_sizes.len(),
            stats.title_size
        );
        Self {
            classify: ClassifyContext {
                stats,
                tolerances: *tol,
                heading_style: config.heading_style,
                dehyphenate: config.dehyphenate,
            },
            furniture: FurnitureProfile::detect(layouts, tol),
            first_page_index: layouts.first().map_or(0, |l| l.page_index),
            table_strategy: config.table_strategy,
            keep_image_data: config.image_mode == ImageMode::Embedded,
        }
    }
}

/// Label every element of a page and put them in reading order.
pub fn analyse_page(layout: &PageLayout, ctx: &AnalysisContext) -> PageAnalysis {
    let tol = &ctx.classify.tolerances;

    // ── Step 1: tables ──────────────────────────────────────────────────
    let tables = find_tables(layout, ctx.table_strategy, tol);

    // ── Step 2: text outside tables and pictures ────────────────────────
    // Text over a backdrop image is page text, not a label inside a figure.
    let page_area = layout.bbox().area().max(1.0);
    let figures: Vec<_> = layout
        .images
        .iter()
        .filter(|img| img.bbox.area() / page_area <= BACKDROP_PAGE_RATIO)
        .collect();
    let runs: Vec<_> = layout
        .runs
        .iter()
        .filter(|run| !tables.iter().any(|t| t.consumes(run)))
        .filter(|run| {
            let (cx, cy) = (run.bbox.center_x(), run.bbox.center_y());
            !figures.iter().any(|img| img.bbox.contains_point(cx, cy))
        })
        .cloned()
        .collect();

    // ── Step 3: blocks ──────────────────────────────────────────────────
    let blocks = build_blocks(split_columns(build_lines(&runs, tol), tol.column_gap), tol);

    // ── Step 4: labels ──────────────────────────────────────────────────
    let first_page = layout.page_index == ctx.first_page_index;
    let mut items: Vec<PageItem> =
        Vec::with_capacity(blocks.len() + tables.len() + layout.images.len());
    for block in &blocks {
        let lines = block.line_texts(tol.word_gap_ratio);
        let item = match ctx.furniture.classify(&lines, &block.bbox, layout.height) {
            Some(FurnitureKind::Header) => DocItem::PageHeader(lines.join(" ")),
            Some(FurnitureKind::Footer) => DocItem::PageFooter(lines.join(" ")),
            None => classify_block(block, &ctx.classify, first_page),
        };
        items.push(PageItem {
            bbox: block.bbox,
            item,
        });
    }
    for table in tables {
        items.push(PageItem {
            bbox: table.bbox,
            item: DocItem::Table(table.data),
        });
    }
    for image in &layout.images {
        let data = if ctx.keep_image_data {
            image.image.clone()
        } else {
            None
        };
        items.push(PageItem {
            bbox: image.bbox,
            item: DocItem::Picture { image: data },
        });
    }

    // ── Step 5: reading order ───────────────────────────────────────────
    let boxes: Vec<_> = items.iter().map(|i| i.bbox).collect();
    let order = reading_order(&boxes, layout.width);
    let mut slots: Vec<Option<PageItem>> = items.into_iter().map(Some).collect();
    let items: Vec<PageItem> = order.into_iter().filter_map(|i| slots[i].take()).collect();

    debug!(
        "Page {}: {} items ({} tables, {} pictures)",
        layout.page_index + 1,
        items.len(),
        items.iter().filter(|i| matches!(i.item, DocItem::Table(_))).count(),
        items.iter().filter(|i| matches!(i.item, DocItem::Picture { .. })).count()
    );

    PageAnalysis {
        page_index: layout.page_index,
        width: layout.width,
        height: layout.height,
        items,
    }
}
