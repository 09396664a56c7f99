//! Page and document model shared by every pipeline stage.
//!
//! All geometry is expressed in PDF points with a **top-left** origin:
//! `top` grows downward, so `top < bottom` for every well-formed box. The
//! extractor converts pdfium's bottom-left coordinates once, at the boundary,
//! and nothing downstream ever sees the PDF convention.

use image::DynamicImage;
use serde::{Deserialize, Serialize};

/// Tolerance used by the strict geometric predicates.
pub const EPS: f32 = 1e-3;

// ── Geometry ─────────────────────────────────────────────────────────────

/// Axis-aligned bounding box (top-left origin).
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct BBox {
    pub x0: f32,
    pub top: f32,
    pub x1: f32,
    pub bottom: f32,
}

impl BBox {
    /// Create a box, normalising swapped coordinates.
    pub fn new(x0: f32, top: f32, x1: f32, bottom: f32) -> Self {
        Self {
            x0: x0.min(x1),
            top: top.min(bottom),
            x1: x0.max(x1),
            bottom: top.max(bottom),
        }
    }

    pub fn width(&self) -> f32 {
        self.x1 - self.x0
    }

    pub fn height(&self) -> f32 {
        self.bottom - self.top
    }

    pub fn area(&self) -> f32 {
        self.width() * self.height()
    }

    pub fn center_x(&self) -> f32 {
        (self.x0 + self.x1) / 2.0
    }

    pub fn center_y(&self) -> f32 {
        (self.top + self.bottom) / 2.0
    }

    /// Smallest box containing both.
    pub fn union(&self, other: &BBox) -> BBox {
        BBox {
            x0: self.x0.min(other.x0),
            top: self.top.min(other.top),
            x1: self.x1.max(other.x1),
            bottom: self.bottom.max(other.bottom),
        }
    }

    /// Length of the shared x-range (0 when disjoint).
    pub fn h_overlap(&self, other: &BBox) -> f32 {
        (self.x1.min(other.x1) - self.x0.max(other.x0)).max(0.0)
    }

    /// Length of the shared y-range (0 when disjoint).
    pub fn v_overlap(&self, other: &BBox) -> f32 {
        (self.bottom.min(other.bottom) - self.top.max(other.top)).max(0.0)
    }

    /// True when the open x-ranges intersect.
    pub fn overlaps_horizontally(&self, other: &BBox) -> bool {
        !(self.x1 <= other.x0 || other.x1 <= self.x0)
    }

    /// True when the open y-ranges intersect.
    pub fn overlaps_vertically(&self, other: &BBox) -> bool {
        !(self.bottom <= other.top || other.bottom <= self.top)
    }

    pub fn overlaps(&self, other: &BBox) -> bool {
        self.overlaps_horizontally(other) && self.overlaps_vertically(other)
    }

    /// `self` ends above the start of `other`.
    pub fn is_strictly_above(&self, other: &BBox, eps: f32) -> bool {
        self.bottom < other.top + eps
    }

    /// `self` ends left of the start of `other`.
    pub fn is_strictly_left_of(&self, other: &BBox, eps: f32) -> bool {
        self.x1 < other.x0 + eps
    }

    pub fn contains_point(&self, x: f32, y: f32) -> bool {
        x >= self.x0 && x <= self.x1 && y >= self.top && y <= self.bottom
    }

    /// Fraction of `self` covered by `other`.
    pub fn coverage_by(&self, other: &BBox) -> f32 {
        let area = self.area();
        if area <= 0.0 {
            return if other.contains_point(self.center_x(), self.center_y()) {
                1.0
            } else {
                0.0
            };
        }
        self.h_overlap(other) * self.v_overlap(other) / area
    }

    /// Clamp the box to `[0, width] × [0, height]`.
    pub fn clip(&self, width: f32, height: f32) -> BBox {
        BBox {
            x0: self.x0.clamp(0.0, width),
            top: self.top.clamp(0.0, height),
            x1: self.x1.clamp(0.0, width),
            bottom: self.bottom.clamp(0.0, height),
        }
    }
}

// ── Extracted page content ───────────────────────────────────────────────

/// A run of text sharing one font on one baseline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TextRun {
    pub text: String,
    pub bbox: BBox,
    /// Effective font size in points.
    pub font_size: f32,
    pub font_name: String,
    pub bold: bool,
    pub italic: bool,
    pub monospace: bool,
}

impl TextRun {
    /// Create a run, deriving style flags from the font name.
    pub fn new(
        text: impl Into<String>,
        bbox: BBox,
        font_size: f32,
        font_name: impl Into<String>,
    ) -> Self {
        let font_name = font_name.into();
        let style = FontStyle::from_font_name(&font_name);
        Self {
            text: text.into(),
            bbox,
            font_size,
            font_name,
            bold: style.bold,
            italic: style.italic,
            monospace: style.monospace,
        }
    }

    /// Number of non-whitespace characters.
    pub fn char_count(&self) -> usize {
        self.text.chars().filter(|c| !c.is_whitespace()).count()
    }
}

/// Style flags inferred from a PDF font name such as `ABCDEF+Times-BoldItalic`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FontStyle {
    pub bold: bool,
    pub italic: bool,
    pub monospace: bool,
}

impl FontStyle {
    pub fn from_font_name(name: &str) -> Self {
        // Strip the subset prefix ("ABCDEF+").
        let base = match name.split_once('+') {
            Some((prefix, rest)) if prefix.len() == 6 => rest,
            _ => name,
        };
        let lower = base.to_ascii_lowercase();
        let bold = ["bold", "black", "heavy", "semibold", "demi"]
            .iter()
            .any(|k| lower.contains(k))
            || lower.ends_with(",b")
            || lower.ends_with("-bd");
        let italic = ["italic", "oblique"].iter().any(|k| lower.contains(k))
            || lower.ends_with("-it")
            || lower.ends_with(",i");
        let monospace = ["courier", "mono", "consola", "menlo", "typewriter", "cmtt", "inconsolata"]
            .iter()
            .any(|k| lower.contains(k));
        Self {
            bold,
            italic,
            monospace,
        }
    }
}

/// An embedded raster image placed on the page.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImageRegion {
    pub bbox: BBox,
    /// Decoded pixels; only populated when pictures are embedded in the output.
    #[serde(skip)]
    pub image: Option<DynamicImage>,
}

impl ImageRegion {
    pub fn new(bbox: BBox) -> Self {
        Self { bbox, image: None }
    }
}

/// Direction of a ruling line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Orientation {
    Horizontal,
    Vertical,
}

/// A straight horizontal or vertical line drawn on the page.
///
/// For a horizontal ruling `position` is its y and `start..end` its x-range;
/// for a vertical one `position` is its x and `start..end` its y-range.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Ruling {
    pub orientation: Orientation,
    pub position: f32,
    pub start: f32,
    pub end: f32,
}

impl Ruling {
    pub fn horizontal(y: f32, x0: f32, x1: f32) -> Self {
        Self {
            orientation: Orientation::Horizontal,
            position: y,
            start: x0.min(x1),
            end: x0.max(x1),
        }
    }

    pub fn vertical(x: f32, top: f32, bottom: f32) -> Self {
        Self {
            orientation: Orientation::Vertical,
            position: x,
            start: top.min(bottom),
            end: top.max(bottom),
        }
    }

    pub fn length(&self) -> f32 {
        self.end - self.start
    }

    /// The four edges of a stroked rectangle.
    pub fn rect_edges(bbox: &BBox) -> [Ruling; 4] {
        [
            Ruling::horizontal(bbox.top, bbox.x0, bbox.x1),
            Ruling::horizontal(bbox.bottom, bbox.x0, bbox.x1),
            Ruling::vertical(bbox.x0, bbox.top, bbox.bottom),
            Ruling::vertical(bbox.x1, bbox.top, bbox.bottom),
        ]
    }
}

/// Everything the extractor recovers from one page.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PageLayout {
    /// 0-indexed page number within the document.
    pub page_index: usize,
    pub width: f32,
    pub height: f32,
    pub runs: Vec<TextRun>,
    pub images: Vec<ImageRegion>,
    pub rulings: Vec<Ruling>,
}

impl PageLayout {
    pub fn new(page_index: usize, width: f32, height: f32) -> Self {
        Self {
            page_index,
            width,
            height,
            ..Self::default()
        }
    }

    /// Page box as a [`BBox`].
    pub fn bbox(&self) -> BBox {
        BBox::new(0.0, 0.0, self.width, self.height)
    }
}

// ── Structured document ──────────────────────────────────────────────────

/// A reconstructed table: `grid[row][col]`, rectangular.
///
/// Spanning cells are replicated into every slot they cover.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct TableData {
    pub num_rows: usize,
    pub num_cols: usize,
    pub grid: Vec<Vec<String>>,
}

impl TableData {
    /// Build a table, padding ragged rows with empty cells.
    pub fn new(mut grid: Vec<Vec<String>>) -> Self {
        let num_cols = grid.iter().map(Vec::len).max().unwrap_or(0);
        for row in &mut grid {
            row.resize(num_cols, String::new());
        }
        Self {
            num_rows: grid.len(),
            num_cols,
            grid,
        }
    }

    /// Drop rows and columns in which every cell is blank.
    pub fn prune_empty(self) -> Self {
        let keep_cols: Vec<usize> = (0..self.num_cols)
            .filter(|&c| self.grid.iter().any(|row| !row[c].trim().is_empty()))
            .collect();
        let grid = self
            .grid
            .into_iter()
            .filter(|row| row.iter().any(|cell| !cell.trim().is_empty()))
            .map(|row| keep_cols.iter().map(|&c| row[c].clone()).collect())
            .collect();
        TableData::new(grid)
    }

    pub fn non_empty_cells(&self) -> usize {
        self.grid
            .iter()
            .flatten()
            .filter(|cell| !cell.trim().is_empty())
            .count()
    }

    pub fn is_empty(&self) -> bool {
        self.non_empty_cells() == 0
    }
}

/// How a list item was marked in the source.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ListMarker {
    /// Bullet glyph; the glyph itself is dropped.
    Bullet,
    /// Enumerated marker. `number` is set for arabic `N.` / `N)` markers,
    /// `label` keeps the literal marker (`(a)`, `iv.`).
    Ordered { number: Option<u32>, label: String },
}

/// One labelled element of the document.
#[derive(Debug, Clone, PartialEq)]
pub enum DocItem {
    Title(String),
    /// `level` starts at 1 (rendered as `##`).
    SectionHeader { level: u8, text: String },
    Paragraph(String),
    ListItem { marker: ListMarker, text: String },
    Caption(String),
    Code(String),
    Formula(String),
    Table(TableData),
    Picture { image: Option<DynamicImage> },
    PageHeader(String),
    PageFooter(String),
}

impl DocItem {
    /// Running header, footer or page number.
    pub fn is_furniture(&self) -> bool {
        matches!(self, DocItem::PageHeader(_) | DocItem::PageFooter(_))
    }

    /// Text content of textual items.
    pub fn text(&self) -> Option<&str> {
        match self {
            DocItem::Title(t)
            | DocItem::Paragraph(t)
            | DocItem::Caption(t)
            | DocItem::Code(t)
            | DocItem::Formula(t)
            | DocItem::PageHeader(t)
            | DocItem::PageFooter(t) => Some(t),
            DocItem::SectionHeader { text, .. } | DocItem::ListItem { text, .. } => Some(text),
            DocItem::Table(_) | DocItem::Picture { .. } => None,
        }
    }

    /// Short label used in logs and stats.
    pub fn label(&self) -> &'static str {
        match self {
            DocItem::Title(_) => "title",
            DocItem::SectionHeader { .. } => "section_header",
            DocItem::Paragraph(_) => "text",
            DocItem::ListItem { .. } => "list_item",
            DocItem::Caption(_) => "caption",
            DocItem::Code(_) => "code",
            DocItem::Formula(_) => "formula",
            DocItem::Table(_) => "table",
            DocItem::Picture { .. } => "picture",
            DocItem::PageHeader(_) => "page_header",
            DocItem::PageFooter(_) => "page_footer",
        }
    }
}

/// A labelled element with its position on the page.
#[derive(Debug, Clone, PartialEq)]
pub struct PageItem {
    pub bbox: BBox,
    pub item: DocItem,
}

/// Result of analysing one page: items in reading order.
#[derive(Debug, Clone, PartialEq)]
pub struct PageAnalysis {
    pub page_index: usize,
    pub width: f32,
    pub height: f32,
    pub items: Vec<PageItem>,
}

impl PageAnalysis {
    pub fn count(&self, label: &str) -> usize {
        self.items.iter().filter(|i| i.item.label() == label).count()
    }
}
