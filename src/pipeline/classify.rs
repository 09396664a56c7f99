//! Block classification: decide what each text block is.
//!
//! Labels come from typography measured against document-wide font
//! statistics (a heading is larger or bolder than the body text) and from
//! textual cues (list markers, caption prefixes, mathematical symbols).
//!
//! | Check (in order) | Label |
//! |------------------|-------|
//! | every run monospace | `Code` |
//! | `Figure N` / `Table N` prefix | `Caption` |
//! | largest size on the first page | `Title` |
//! | size ratio or bold single line | `SectionHeader` |
//! | bullet / enumerator prefix | `ListItem` |
//!
//! An enumerator does not veto a heading that is enlarged, or bold with a
//! capitalised word after the number. Bullets always do.
//! | symbol-dense, few words | `Formula` |
//! | otherwise | `Paragraph` |

use crate::config::{HeadingStyle, LayoutTolerances};
use crate::model::{DocItem, ListMarker, PageLayout};
use crate::pipeline::blocks::{dominant_size, TextBlock};
use once_cell::sync::Lazy;
use regex::Regex;

// ── Document font statistics ─────────────────────────────────────────────

/// Font sizes measured over the whole document.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct FontStats {
    /// Most common size, weighted by character count.
    pub body_size: f32,
    /// Distinct heading-candidate sizes, largest first.
    pub heading_sizes: Vec<f32>,
    /// Size of the document title, when the first page has one.
    pub title_size: Option<f32>,
}

const TITLE_MIN_RATIO: f32 = 1.5;

impl FontStats {
    /// Measure `layouts`; the first layout is treated as the first page.
    pub fn from_layouts(layouts: &[PageLayout], tol: &LayoutTolerances) -> Self {
        let body_size = dominant_size(
            layouts
                .iter()
                .flat_map(|l| l.runs.iter())
                .map(|r| (r.font_size, r.char_count())),
        );
        if body_size <= 0.0 {
            return Self::default();
        }

        let mut heading_sizes: Vec<f32> = layouts
            .iter()
            .flat_map(|l| l.runs.iter())
            .filter(|r| r.char_count() > 0)
            .map(|r| (r.font_size * 2.0).round() / 2.0)
            .filter(|s| *s >= body_size * tol.heading_min_ratio)
            .collect();
        heading_sizes.sort_by(|a, b| b.total_cmp(a));
        heading_sizes.dedup();

        let title_size = layouts.first().and_then(|first| {
            first
                .runs
                .iter()
                .filter(|r| r.char_count() >= 2)
                .map(|r| (r.font_size * 2.0).round() / 2.0)
                .max_by(|a, b| a.total_cmp(b))
                .filter(|s| *s >= body_size * TITLE_MIN_RATIO)
        });

        Self {
            body_size,
            heading_sizes,
            title_size,
        }
    }
}

/// Everything classification needs besides the block itself.
#[derive(Debug, Clone)]
pub struct ClassifyContext {
    pub stats: FontStats,
    pub tolerances: LayoutTolerances,
    pub heading_style: HeadingStyle,
    pub dehyphenate: bool,
}

// ── Classification ───────────────────────────────────────────────────────

/// Label a block. `first_page` enables title detection.
pub fn classify_block(block: &TextBlock, ctx: &ClassifyContext, first_page: bool) -> DocItem {
    let tol = &ctx.tolerances;
    let text = block.text(tol.word_gap_ratio, ctx.dehyphenate);

    if block.is_monospace() {
        return DocItem::Code(code_text(block, tol.word_gap_ratio));
    }
    if is_caption(&text) {
        return DocItem::Caption(text);
    }

    let size = block.font_size();
    let body = if ctx.stats.body_size > 0.0 {
        ctx.stats.body_size
    } else {
        size.max(1.0)
    };
    let ratio = size / body;

    if looks_like_heading(block, &text) {
        if first_page
            && ctx
                .stats
                .title_size
                .is_some_and(|ts| (size - ts).abs() < 0.5)
        {
            return DocItem::Title(text);
        }
        let bold_line = block.is_bold()
            && block.lines.len() == 1
            && ratio >= 0.95
            && text.split_whitespace().count() <= 12
            && text
                .chars()
                .next()
                .is_some_and(|c| c.is_uppercase() || c.is_ascii_digit());
        let enlarged = ratio >= tol.heading_min_ratio;
        // Numbered headings ("1. Introduction") share the enumerator syntax.
        let list_veto = match parse_list_marker(&text) {
            None => false,
            Some((ListMarker::Bullet, _)) => true,
            Some(_) => !(enlarged || (bold_line && RE_NUMBERED_HEADING.is_match(&text))),
        };
        if (enlarged || bold_line) && !list_veto {
            let level = heading_level(&text, size, &ctx.stats, ctx.heading_style);
            return DocItem::SectionHeader { level, text };
        }
    }

    if let Some((marker, rest)) = parse_list_marker(&text) {
        return DocItem::ListItem {
            marker,
            text: rest.to_string(),
        };
    }
    if block.lines.len() <= 4 && is_formula(&text) {
        return DocItem::Formula(text);
    }
    DocItem::Paragraph(text)
}

fn looks_like_heading(block: &TextBlock, text: &str) -> bool {
    block.lines.len() <= 3
        && text.chars().count() <= 200
        && !text.ends_with(['.', ',', ';'])
        && text.chars().any(char::is_alphabetic)
}

static RE_NUMBERED_HEADING: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\d+(?:\.\d+)*[.)]?\s+\p{Lu}").unwrap());

static RE_SECTION_NUMBER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(\d+(?:\.\d+)*)\.?\s+\S").unwrap());

/// Section level (1-based) for a heading.
pub fn heading_level(text: &str, size: f32, stats: &FontStats, style: HeadingStyle) -> u8 {
    if style == HeadingStyle::Flat {
        return 1;
    }
    if let Some(caps) = RE_SECTION_NUMBER.captures(text) {
        let depth = caps[1].split('.').count();
        return depth.clamp(1, 5) as u8;
    }
    let rank = stats
        .heading_sizes
        .iter()
        .position(|s| (s - size).abs() < 0.5)
        .map(|i| i + 1)
        .unwrap_or(stats.heading_sizes.len() + 1);
    rank.clamp(1, 5) as u8
}

// ── Textual cues ─────────────────────────────────────────────────────────

static RE_BULLET: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(?:[•·◦▪●○■□➢►\u{F0B7}]\s*|[-*–]\s+)(\S.*)$").unwrap());
static RE_NUMBERED: Lazy<Regex> = Lazy::new(|| Regex::new(r"^(\d{1,3})[.)]\s+(\S.*)$").unwrap());
static RE_PAREN_ENUM: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(\((?:\d{1,2}|[a-z]|[ivx]{1,4})\)|[a-z]\)|[ivx]{1,4}\.)\s+(\S.*)$").unwrap()
});

/// Split a list marker off the start of `text`.
pub fn parse_list_marker(text: &str) -> Option<(ListMarker, &str)> {
    if let Some(caps) = RE_BULLET.captures(text) {
        let rest = caps.get(1)?.as_str();
        return Some((ListMarker::Bullet, rest));
    }
    if let Some(caps) = RE_NUMBERED.captures(text) {
        let number = caps[1].parse().ok();
        let label = caps[0][..caps.get(2)?.start()].trim_end().to_string();
        return Some((ListMarker::Ordered { number, label }, caps.get(2)?.as_str()));
    }
    if let Some(caps) = RE_PAREN_ENUM.captures(text) {
        let label = caps[1].to_string();
        return Some((
            ListMarker::Ordered {
                number: None,
                label,
            },
            caps.get(2)?.as_str(),
        ));
    }
    None
}

static RE_CAPTION: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(?:Figure|Fig\.|Table|Tab\.|Listing|Chart|Scheme)\s*[0-9IVX]+[A-Za-z]?\s*[:.|\-–—]?(?:\s|$)")
        .unwrap()
});

/// `Figure 3: …`, `Fig. 2.`, `Table 1 …`.
pub fn is_caption(text: &str) -> bool {
    RE_CAPTION.is_match(text)
}

fn is_math_char(c: char) -> bool {
    matches!(
        c,
        '=' | '+' | '−' | '×' | '÷' | '∑' | '∫' | '∏' | '√' | '∞' | '≤' | '≥' | '≠' | '≈'
            | '∂' | '∇' | '±' | '∈' | '∉' | '⊂' | '⊆' | '∪' | '∩' | '→' | '⇒' | '⇔' | '^'
            | '{' | '}' | '|' | '∀' | '∃' | '⊗' | '⊕' | '∼' | '∝'
    ) || ('\u{0391}'..='\u{03C9}').contains(&c)
        || ('\u{1D400}'..='\u{1D7FF}').contains(&c)
}

/// Symbol-dense text with few ordinary words.
pub fn is_formula(text: &str) -> bool {
    let chars: Vec<char> = text.chars().filter(|c| !c.is_whitespace()).collect();
    if chars.len() < 3 {
        return false;
    }
    let math = chars.iter().filter(|c| is_math_char(**c)).count();
    let words = text
        .split_whitespace()
        .filter(|w| w.chars().filter(|c| c.is_ascii_alphabetic()).count() >= 3)
        .count();
    math * 10 >= chars.len() * 3 && words <= 3
}

/// Code text with indentation recovered from x offsets.
fn code_text(block: &TextBlock, word_gap_ratio: f32) -> String {
    let size = block.font_size().max(1.0);
    let char_width = 0.6 * size;
    block
        .lines
        .iter()
        .map(|line| {
            let indent = ((line.bbox.x0 - block.bbox.x0) / char_width).round().max(0.0) as usize;
            format!("{}{}", " ".repeat(indent), line.text(word_gap_ratio))
        })
        .collect::<Vec<_>>()
        .join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{BBox, TextRun};
    use crate::pipeline::blocks::{build_blocks, build_lines, split_columns};

    fn run(text: &str, top: f32, size: f32, font: &str) -> TextRun {
        let width = text.chars().count() as f32 * size * 0.5;
        TextRun::new(text, BBox::new(50.0, top, 50.0 + width, top + size), size, font)
    }

    fn block_of(runs: Vec<TextRun>) -> TextBlock {
        let tol = LayoutTolerances::default();
        let lines = build_lines(&runs, &tol);
        let mut blocks = build_blocks(split_columns(lines, tol.column_gap), &tol);
        assert_eq!(blocks.len(), 1, "fixture must form one block");
        blocks.remove(0)
    }

    fn ctx(style: HeadingStyle) -> ClassifyContext {
        ClassifyContext {
            stats: FontStats {
                body_size: 10.0,
                heading_sizes: vec![24.0, 14.0, 12.0],
                title_size: Some(24.0),
            },
            tolerances: LayoutTolerances::default(),
            heading_style: style,
            dehyphenate: true,
        }
    }

    #[test]
    fn font_stats_find_body_and_title() {
        let mut page = PageLayout::new(0, 600.0, 800.0);
        page.runs.push(run("A Study of Layout", 50.0, 24.0, "Times-Bold"));
        page.runs.push(run("Body text that is long enough to dominate.", 100.0, 10.0, "Times"));
        page.runs.push(run("1 Introduction", 130.0, 14.0, "Times-Bold"));
        let stats = FontStats::from_layouts(&[page], &LayoutTolerances::default());
        assert_eq!(stats.body_size, 10.0);
        assert_eq!(stats.heading_sizes, vec![24.0, 14.0]);
        assert_eq!(stats.title_size, Some(24.0));
    }

    #[test]
    fn empty_document_has_default_stats() {
        let stats = FontStats::from_layouts(&[], &LayoutTolerances::default());
        assert_eq!(stats, FontStats::default());
    }

    #[test]
    fn classifies_title_only_on_first_page() {
        let b = block_of(vec![run("A Study of Layout", 50.0, 24.0, "Times-Bold")]);
        let c = ctx(HeadingStyle::Flat);
        assert_eq!(classify_block(&b, &c, true), DocItem::Title("A Study of Layout".into()));
        assert_eq!(
            classify_block(&b, &c, false),
            DocItem::SectionHeader {
                level: 1,
                text: "A Study of Layout".into()
            }
        );
    }

    #[test]
    fn bold_body_size_line_is_section_header() {
        let b = block_of(vec![run("Related Work", 50.0, 10.0, "Times-Bold")]);
        assert!(matches!(
            classify_block(&b, &ctx(HeadingStyle::Flat), false),
            DocItem::SectionHeader { level: 1, .. }
        ));
    }

    #[test]
    fn bold_sentence_is_not_a_header() {
        let b = block_of(vec![run("Note that this applies.", 50.0, 10.0, "Times-Bold")]);
        assert!(matches!(
            classify_block(&b, &ctx(HeadingStyle::Flat), false),
            DocItem::Paragraph(_)
        ));
    }

    #[test]
    fn hierarchical_levels_follow_numbering_and_size() {
        let stats = ctx(HeadingStyle::Hierarchical).stats;
        assert_eq!(heading_level("2.3.1 Details", 12.0, &stats, HeadingStyle::Hierarchical), 3);
        assert_eq!(heading_level("Methods", 14.0, &stats, HeadingStyle::Hierarchical), 2);
        assert_eq!(heading_level("Aside", 10.0, &stats, HeadingStyle::Hierarchical), 4);
        assert_eq!(heading_level("2.3.1 Details", 12.0, &stats, HeadingStyle::Flat), 1);
    }

    #[test]
    fn numbered_heading_beats_enumerator() {
        let c = ctx(HeadingStyle::Hierarchical);
        let enlarged = block_of(vec![run("1. Introduction", 50.0, 14.0, "Times-Bold")]);
        assert_eq!(
            classify_block(&enlarged, &c, false),
            DocItem::SectionHeader {
                level: 1,
                text: "1. Introduction".into()
            }
        );
        let bold = block_of(vec![run("2.1 Data Sources", 50.0, 10.0, "Times-Bold")]);
        assert_eq!(
            classify_block(&bold, &c, false),
            DocItem::SectionHeader {
                level: 2,
                text: "2.1 Data Sources".into()
            }
        );
    }

    #[test]
    fn body_size_enumerator_stays_a_list_item() {
        let b = block_of(vec![run("1. Introduction", 50.0, 10.0, "Times-Roman")]);
        assert_eq!(
            classify_block(&b, &ctx(HeadingStyle::Flat), false),
            DocItem::ListItem {
                marker: ListMarker::Ordered {
                    number: Some(1),
                    label: "1.".into()
                },
                text: "Introduction".into()
            }
        );
        let bullet = block_of(vec![run("• Overview", 50.0, 14.0, "Times-Bold")]);
        assert!(matches!(
            classify_block(&bullet, &ctx(HeadingStyle::Flat), false),
            DocItem::ListItem { .. }
        ));
    }

    #[test]
    fn list_markers() {
        assert_eq!(parse_list_marker("• item one"), Some((ListMarker::Bullet, "item one")));
        assert_eq!(parse_list_marker("- dash item"), Some((ListMarker::Bullet, "dash item")));
        assert_eq!(
            parse_list_marker("3. third"),
            Some((
                ListMarker::Ordered {
                    number: Some(3),
                    label: "3.".into()
                },
                "third"
            ))
        );
        assert_eq!(
            parse_list_marker("(b) second"),
            Some((
                ListMarker::Ordered {
                    number: None,
                    label: "(b)".into()
                },
                "second"
            ))
        );
        assert_eq!(parse_list_marker("-5 degrees"), None);
        assert_eq!(parse_list_marker("2019. A year"), None);
        assert_eq!(parse_list_marker("Plain text"), None);
    }

    #[test]
    fn list_item_block_keeps_text_without_marker() {
        let b = block_of(vec![run("• apples and pears", 50.0, 10.0, "Times")]);
        assert_eq!(
            classify_block(&b, &ctx(HeadingStyle::Flat), false),
            DocItem::ListItem {
                marker: ListMarker::Bullet,
                text: "apples and pears".into()
            }
        );
    }

    #[test]
    fn captions() {
        assert!(is_caption("Figure 3: Overview of the pipeline."));
        assert!(is_caption("Fig. 2. Results"));
        assert!(is_caption("Table 1 Accuracy per class"));
        assert!(is_caption("Table IV: Ablation"));
        assert!(!is_caption("Tables are useful"));
        assert!(!is_caption("The figure shows"));
    }

    #[test]
    fn formulas() {
        assert!(is_formula("E = mc^2"));
        assert!(is_formula("∑ α_i β_i ≤ 1"));
        assert!(!is_formula("The loss decreases when the learning rate is lowered."));
        assert!(!is_formula("a+"));
    }

    #[test]
    fn monospace_block_is_code_with_indentation() {
        let runs = vec![
            TextRun::new("fn main() {", BBox::new(50.0, 100.0, 116.0, 110.0), 10.0, "Courier"),
            TextRun::new("run();", BBox::new(74.0, 112.0, 110.0, 122.0), 10.0, "Courier"),
        ];
        let b = block_of(runs);
        assert_eq!(
            classify_block(&b, &ctx(HeadingStyle::Flat), false),
            DocItem::Code("fn main() {\n    run();".into())
        );
    }
}
