//! Running headers, footers and page numbers.
//!
//! Furniture is text in the top or bottom margin band that either repeats
//! across pages (once digits are masked, so `Page 3` and `Page 4` match) or
//! is a bare page number. Detection needs every page at once, so the
//! [`FurnitureProfile`] is built before the per-page analysis fans out.

use crate::config::LayoutTolerances;
use crate::model::{BBox, PageLayout};
use crate::pipeline::blocks::{build_lines, split_columns};
use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::{HashMap, HashSet};
use tracing::debug;

/// Margin text on this many pages is running furniture.
const MIN_REPEAT_PAGES: usize = 2;

/// Which margin a furniture item sits in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FurnitureKind {
    Header,
    Footer,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
enum Band {
    Top,
    Bottom,
}

/// Margin texts seen on enough pages to count as running furniture.
#[derive(Debug, Clone, Default)]
pub struct FurnitureProfile {
    repeated: HashSet<(Band, String)>,
    margin_ratio: f32,
}

impl FurnitureProfile {
    /// Scan the margin bands of every page.
    pub fn detect(layouts: &[PageLayout], tol: &LayoutTolerances) -> Self {
        let mut seen: HashMap<(Band, String), HashSet<usize>> = HashMap::new();
        for layout in layouts {
            let segments = split_columns(build_lines(&layout.runs, tol), tol.column_gap);
            for seg in segments {
                let Some(band) = band_of(&seg.bbox, layout.height, tol.margin_ratio) else {
                    continue;
                };
                let key = normalise(&seg.text(tol.word_gap_ratio));
                if key.is_empty() {
                    continue;
                }
                seen.entry((band, key)).or_default().insert(layout.page_index);
            }
        }

        let repeated: HashSet<(Band, String)> = seen
            .into_iter()
            .filter(|(_, pages)| pages.len() >= MIN_REPEAT_PAGES)
            .map(|(key, _)| key)
            .collect();
        debug!("Furniture profile: {} repeated margin texts", repeated.len());

        Self {
            repeated,
            margin_ratio: tol.margin_ratio,
        }
    }

    /// Decide whether a block of `lines` at `bbox` is furniture.
    pub fn classify(
        &self,
        lines: &[String],
        bbox: &BBox,
        page_height: f32,
    ) -> Option<FurnitureKind> {
        let band = band_of(bbox, page_height, self.margin_ratio)?;
        if lines.is_empty() {
            return None;
        }
        let all_furniture = lines.iter().all(|line| {
            is_page_number(line) || self.repeated.contains(&(band, normalise(line)))
        });
        if !all_furniture {
            return None;
        }
        Some(match band {
            Band::Top => FurnitureKind::Header,
            Band::Bottom => FurnitureKind::Footer,
        })
    }
}

fn band_of(bbox: &BBox, page_height: f32, margin_ratio: f32) -> Option<Band> {
    let margin = page_height * margin_ratio;
    if bbox.bottom <= margin {
        Some(Band::Top)
    } else if bbox.top >= page_height - margin {
        Some(Band::Bottom)
    } else {
        None
    }
}

/// Lowercase, digits masked as `#`, whitespace collapsed.
fn normalise(text: &str) -> String {
    let masked: String = text
        .chars()
        .map(|c| if c.is_ascii_digit() { '#' } else { c.to_ascii_lowercase() })
        .collect();
    masked.split_whitespace().collect::<Vec<_>>().join(" ")
}

static RE_PAGE_NUMBER: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)^(?:page\s*)?\d{1,4}(?:\s*(?:of|/)\s*\d{1,4})?$|^[-–—]\s*\d{1,4}\s*[-–—]$")
        .unwrap()
});

// Well-formed numerals from i to lxxxix; front matter never runs longer.
static RE_ROMAN_PAGE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)^(?:xc|xl|l?x{0,3})(?:ix|iv|v?i{0,3})$").unwrap());

/// `12`, `- 12 -`, `Page 3 of 10`, `iv`.
pub fn is_page_number(text: &str) -> bool {
    let text = text.trim();
    !text.is_empty() && (RE_PAGE_NUMBER.is_match(text) || RE_ROMAN_PAGE.is_match(text))
}
