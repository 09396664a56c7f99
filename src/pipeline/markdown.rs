//! Markdown serialisation of labelled document items.
//!
//! The output follows docling's Markdown serializer so converted documents
//! line up with `*.text-only.md` fixtures:
//!
//! | Item | Markdown |
//! |------|----------|
//! | title | `# text` |
//! | section header (level n) | `#` × (n + 1), so level 1 is `##` |
//! | list item | `- text` or `N. text`, consecutive items on adjacent lines |
//! | code | fenced block |
//! | formula | `<!-- formula-not-decoded -->` |
//! | picture | `<!-- image -->`, an inline data URI, or nothing |
//! | table | tabulate's `github` layout |
//!
//! Blocks are separated by one blank line.

use crate::config::{ConversionConfig, ImageMode};
use crate::model::{DocItem, ListMarker, TableData};
use crate::pipeline::encode::image_data_uri;
use tracing::warn;
use unicode_width::UnicodeWidthStr;

pub const IMAGE_PLACEHOLDER: &str = "<!-- image -->";
pub const FORMULA_PLACEHOLDER: &str = "<!-- formula-not-decoded -->";

/// Rendering switches, taken from [`ConversionConfig`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MarkdownOptions {
    pub image_mode: ImageMode,
    pub include_furniture: bool,
    pub escape_underscores: bool,
    pub escape_html: bool,
}

impl Default for MarkdownOptions {
    fn default() -> Self {
        Self {
            image_mode: ImageMode::Placeholder,
            include_furniture: false,
            escape_underscores: true,
            escape_html: true,
        }
    }
}

impl From<&ConversionConfig> for MarkdownOptions {
    fn from(config: &ConversionConfig) -> Self {
        Self {
            image_mode: config.image_mode,
            include_furniture: config.include_furniture,
            escape_underscores: config.escape_underscores,
            escape_html: config.escape_html,
        }
    }
}

/// One item rendered to Markdown.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderedPart {
    pub markdown: String,
    pub is_list_item: bool,
}

/// Render every visible item; hidden and empty items are skipped.
pub fn render_parts<'a>(
    items: impl IntoIterator<Item = &'a DocItem>,
    opts: &MarkdownOptions,
) -> Vec<RenderedPart> {
    items
        .into_iter()
        .filter_map(|item| {
            render_item(item, opts).map(|markdown| RenderedPart {
                markdown,
                is_list_item: matches!(item, DocItem::ListItem { .. }),
            })
        })
        .collect()
}

/// Join parts: adjacent list items on consecutive lines, everything else
/// separated by a blank line.
pub fn join_parts<'a>(parts: impl IntoIterator<Item = &'a RenderedPart>) -> String {
    let mut out = String::new();
    let mut prev_list = false;
    for part in parts {
        if !out.is_empty() {
            out.push_str(if part.is_list_item && prev_list { "\n" } else { "\n\n" });
        }
        out.push_str(&part.markdown);
        prev_list = part.is_list_item;
    }
    out
}

/// Render items in order. Returns an empty string when nothing is visible.
pub fn render_items<'a>(
    items: impl IntoIterator<Item = &'a DocItem>,
    opts: &MarkdownOptions,
) -> String {
    join_parts(&render_parts(items, opts))
}

fn render_item(item: &DocItem, opts: &MarkdownOptions) -> Option<String> {
    let part = match item {
        DocItem::Title(text) => format!("# {}", escape_text(text, opts)),
        DocItem::SectionHeader { level, text } => {
            let hashes = "#".repeat(usize::from((*level).clamp(1, 5)) + 1);
            format!("{} {}", hashes, escape_text(text, opts))
        }
        DocItem::Paragraph(text) | DocItem::Caption(text) => escape_text(text, opts),
        DocItem::ListItem { marker, text } => {
            let text = escape_text(text, opts);
            match marker {
                ListMarker::Bullet => format!("- {}", text),
                ListMarker::Ordered {
                    number: Some(n), ..
                } => format!("{}. {}", n, text),
                ListMarker::Ordered { label, .. } => format!("- {} {}", label, text),
            }
        }
        DocItem::Code(text) => format!("```\n{}\n```", text),
        DocItem::Formula(_) => FORMULA_PLACEHOLDER.to_string(),
        DocItem::Table(table) => render_table(table),
        DocItem::Picture { image } => match opts.image_mode {
            ImageMode::Omit => return None,
            ImageMode::Placeholder => IMAGE_PLACEHOLDER.to_string(),
            ImageMode::Embedded => match image.as_ref().map(image_data_uri) {
                Some(Ok(uri)) => format!("![Image]({})", uri),
                Some(Err(e)) => {
                    warn!("Picture could not be encoded, using placeholder: {}", e);
                    IMAGE_PLACEHOLDER.to_string()
                }
                None => IMAGE_PLACEHOLDER.to_string(),
            },
        },
        DocItem::PageHeader(text) | DocItem::PageFooter(text) => {
            if !opts.include_furniture {
                return None;
            }
            escape_text(text, opts)
        }
    };
    if part.trim().is_empty() {
        None
    } else {
        Some(part)
    }
}

// ── Escaping ─────────────────────────────────────────────────────────────

/// Apply the enabled escapes to the parts of `text` outside backtick spans.
pub fn escape_text(text: &str, opts: &MarkdownOptions) -> String {
    if !opts.escape_underscores && !opts.escape_html {
        return text.to_string();
    }
    text.split('`')
        .enumerate()
        .map(|(i, part)| {
            if i % 2 == 1 {
                return part.to_string();
            }
            let mut s = String::with_capacity(part.len());
            for c in part.chars() {
                match c {
                    '_' if opts.escape_underscores => s.push_str("\\_"),
                    '&' if opts.escape_html => s.push_str("&amp;"),
                    '<' if opts.escape_html => s.push_str("&lt;"),
                    '>' if opts.escape_html => s.push_str("&gt;"),
                    _ => s.push(c),
                }
            }
            s
        })
        .collect::<Vec<_>>()
        .join("`")
}

// ── Tables ───────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
enum ColumnType {
    Empty,
    Int,
    Float,
    Text,
}

fn is_int(s: &str) -> bool {
    let digits = s.strip_prefix(['+', '-']).unwrap_or(s);
    !digits.is_empty() && digits.bytes().all(|b| b.is_ascii_digit())
}

fn parse_float(s: &str) -> Option<f64> {
    s.parse::<f64>().ok().filter(|v| v.is_finite())
}

fn cell_type(s: &str) -> ColumnType {
    if s.is_empty() {
        ColumnType::Empty
    } else if is_int(s) {
        ColumnType::Int
    } else if parse_float(s).is_some() {
        ColumnType::Float
    } else {
        ColumnType::Text
    }
}

/// `format(x, "g")`: six significant digits, trailing zeros dropped.
fn format_general(x: f64) -> String {
    if x == 0.0 {
        return if x.is_sign_negative() { "-0" } else { "0" }.to_string();
    }
    let sci = format!("{:.5e}", x);
    let (mantissa, exp) = match sci.split_once('e') {
        Some((m, e)) => (m, e.parse::<i32>().unwrap_or(0)),
        None => return sci,
    };
    if (-4..6).contains(&exp) {
        let decimals = (5 - exp).max(0) as usize;
        trim_fraction(&format!("{:.*}", decimals, x))
    } else {
        let sign = if exp < 0 { '-' } else { '+' };
        format!("{}e{}{:02}", trim_fraction(mantissa), sign, exp.abs())
    }
}

fn trim_fraction(s: &str) -> String {
    if s.contains('.') {
        s.trim_end_matches('0').trim_end_matches('.').to_string()
    } else {
        s.to_string()
    }
}

/// Digits after the decimal point (or exponent marker); -1 for integers.
fn after_point(s: &str) -> isize {
    if is_int(s) || parse_float(s).is_none() {
        return -1;
    }
    let pos = s.rfind('.').or_else(|| s.to_ascii_lowercase().rfind('e'));
    match pos {
        Some(p) => (s.len() - p - 1) as isize,
        None => -1,
    }
}

fn width(s: &str) -> usize {
    UnicodeWidthStr::width(s)
}

fn pad_left(s: &str, w: usize) -> String {
    format!("{}{}", " ".repeat(w.saturating_sub(width(s))), s)
}

fn pad_right(s: &str, w: usize) -> String {
    format!("{}{}", s, " ".repeat(w.saturating_sub(width(s))))
}

/// Render a table in tabulate's `github` layout, first row as header.
///
/// Numeric columns are right-aligned on their decimal point and float
/// columns are reformatted with six significant digits; when a float column
/// has a blank cell the whole table falls back to plain left-aligned text.
/// Tables with fewer than two rows render as nothing.
pub fn render_table(table: &TableData) -> String {
    if table.num_rows < 2 || table.num_cols == 0 {
        return String::new();
    }
    let clean = |s: &str| s.replace('\n', " ").trim().to_string();
    let header: Vec<String> = table.grid[0].iter().map(|s| clean(s)).collect();
    let body: Vec<Vec<String>> = table.grid[1..]
        .iter()
        .map(|row| row.iter().map(|s| clean(s)).collect())
        .collect();

    let mut types: Vec<ColumnType> = (0..table.num_cols)
        .map(|c| {
            body.iter()
                .map(|row| cell_type(&row[c]))
                .max()
                .unwrap_or(ColumnType::Empty)
        })
        .collect();
    let float_gap = (0..table.num_cols)
        .any(|c| types[c] == ColumnType::Float && body.iter().any(|row| row[c].is_empty()));
    if float_gap {
        types.iter_mut().for_each(|t| *t = ColumnType::Text);
    }

    let mut columns: Vec<Vec<String>> = Vec::with_capacity(table.num_cols);
    let mut widths: Vec<usize> = Vec::with_capacity(table.num_cols);
    for (c, ty) in types.iter().enumerate() {
        let numeric = matches!(ty, ColumnType::Int | ColumnType::Float);
        let mut cells: Vec<String> = body
            .iter()
            .map(|row| match ty {
                ColumnType::Float => parse_float(&row[c]).map(format_general).unwrap_or_default(),
                _ => row[c].clone(),
            })
            .collect();
        if numeric {
            let decimals: Vec<isize> = cells.iter().map(|s| after_point(s)).collect();
            let max_dec = decimals.iter().copied().max().unwrap_or(-1);
            for (cell, dec) in cells.iter_mut().zip(decimals) {
                cell.push_str(&" ".repeat((max_dec - dec) as usize));
            }
        }
        let w = cells
            .iter()
            .map(|s| width(s))
            .max()
            .unwrap_or(0)
            .max(width(&header[c]) + 2);
        for cell in cells.iter_mut() {
            *cell = if numeric { pad_left(cell, w) } else { pad_right(cell, w) };
        }
        columns.push(cells);
        widths.push(w);
    }

    let mut lines = Vec::with_capacity(body.len() + 2);
    let header_cells: Vec<String> = header
        .iter()
        .enumerate()
        .map(|(c, h)| match types[c] {
            ColumnType::Int | ColumnType::Float => pad_left(h, widths[c]),
            _ => pad_right(h, widths[c]),
        })
        .collect();
    lines.push(table_row(&header_cells));
    lines.push(format!(
        "|{}|",
        widths
            .iter()
            .map(|w| "-".repeat(w + 2))
            .collect::<Vec<_>>()
            .join("|")
    ));
    for r in 0..body.len() {
        let cells: Vec<String> = columns.iter().map(|col| col[r].clone()).collect();
        lines.push(table_row(&cells));
    }
    lines.join("\n")
}

fn table_row(cells: &[String]) -> String {
    format!(
        "|{}|",
        cells
            .iter()
            .map(|c| format!(" {} ", c))
            .collect::<Vec<_>>()
            .join("|")
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn opts() -> MarkdownOptions {
        MarkdownOptions::default()
    }

    fn table(rows: &[&[&str]]) -> TableData {
        TableData::new(
            rows.iter()
                .map(|r| r.iter().map(|s| s.to_string()).collect())
                .collect(),
        )
    }

    #[test]
    fn headings_paragraphs_and_lists() {
        let items = vec![
            DocItem::Title("Layout Study".into()),
            DocItem::SectionHeader {
                level: 1,
                text: "1 Introduction".into(),
            },
            DocItem::Paragraph("Some text.".into()),
            DocItem::ListItem {
                marker: ListMarker::Bullet,
                text: "first".into(),
            },
            DocItem::ListItem {
                marker: ListMarker::Ordered {
                    number: Some(2),
                    label: "2.".into(),
                },
                text: "second".into(),
            },
            DocItem::Paragraph("After.".into()),
        ];
        assert_eq!(
            render_items(&items, &opts()),
            "# Layout Study\n\n## 1 Introduction\n\nSome text.\n\n- first\n2. second\n\nAfter."
        );
    }

    #[test]
    fn hierarchical_levels_add_hashes() {
        let items = vec![DocItem::SectionHeader {
            level: 3,
            text: "Deep".into(),
        }];
        assert_eq!(render_items(&items, &opts()), "#### Deep");
    }

    #[test]
    fn placeholders_for_formulas_and_pictures() {
        let items = vec![
            DocItem::Formula("x = y²".into()),
            DocItem::Picture { image: None },
        ];
        assert_eq!(
            render_items(&items, &opts()),
            "<!-- formula-not-decoded -->\n\n<!-- image -->"
        );

        let omit = MarkdownOptions {
            image_mode: ImageMode::Omit,
            ..opts()
        };
        assert_eq!(render_items(&[DocItem::Picture { image: None }], &omit), "");
    }

    #[test]
    fn embedded_picture_is_a_data_uri() {
        let embedded = MarkdownOptions {
            image_mode: ImageMode::Embedded,
            ..opts()
        };
        let items = vec![DocItem::Picture {
            image: Some(image::DynamicImage::new_rgb8(2, 2)),
        }];
        let md = render_items(&items, &embedded);
        assert!(md.starts_with("![Image](data:image/png;base64,"), "got: {md}");
        assert!(md.ends_with(')'));
    }

    #[test]
    fn furniture_only_when_requested() {
        let items = vec![
            DocItem::PageHeader("Running head".into()),
            DocItem::Paragraph("Body.".into()),
            DocItem::PageFooter("3".into()),
        ];
        assert_eq!(render_items(&items, &opts()), "Body.");
        let with = MarkdownOptions {
            include_furniture: true,
            ..opts()
        };
        assert_eq!(render_items(&items, &with), "Running head\n\nBody.\n\n3");
    }

    #[test]
    fn escapes_outside_code_spans() {
        assert_eq!(
            escape_text("a_b <c> & `x_y <z>`", &opts()),
            "a\\_b &lt;c&gt; &amp; `x_y <z>`"
        );
        let off = MarkdownOptions {
            escape_underscores: false,
            escape_html: false,
            ..opts()
        };
        assert_eq!(escape_text("a_b <c>", &off), "a_b <c>");
    }

    #[test]
    fn code_is_fenced_and_unescaped() {
        let items = vec![DocItem::Code("let x_y = 1;".into())];
        assert_eq!(render_items(&items, &opts()), "```\nlet x_y = 1;\n```");
    }

    #[test]
    fn text_table_in_github_layout() {
        let t = table(&[&["Name", "Role"], &["Ada", "Engineer"], &["Bob", "QA"]]);
        assert_eq!(
            render_table(&t),
            "| Name   | Role     |\n\
             |--------|----------|\n\
             | Ada    | Engineer |\n\
             | Bob    | QA       |"
        );
    }

    #[test]
    fn numeric_columns_align_right_on_the_decimal_point() {
        let t = table(&[&["Model", "Acc", "N"], &["A", "71.25", "10"], &["B", "9.5", "7"]]);
        assert_eq!(
            render_table(&t),
            "| Model   |   Acc |   N |\n\
             |---------|-------|-----|\n\
             | A       | 71.25 |  10 |\n\
             | B       |  9.5  |   7 |"
        );
    }

    #[test]
    fn float_cells_are_reformatted() {
        let t = table(&[&["v"], &["1.50"], &["0.10"]]);
        assert_eq!(render_table(&t), "|   v |\n|-----|\n| 1.5 |\n| 0.1 |");
    }

    #[test]
    fn blank_cell_in_float_column_disables_number_parsing() {
        let t = table(&[&["k", "v"], &["a", "1.50"], &["b", ""]]);
        assert_eq!(
            render_table(&t),
            "| k   | v    |\n\
             |-----|------|\n\
             | a   | 1.50 |\n\
             | b   |      |"
        );
    }

    #[test]
    fn wide_characters_use_display_width() {
        let t = table(&[&["名前", "x"], &["東京", "y"]]);
        assert_eq!(
            render_table(&t),
            "| 名前   | x   |\n|--------|-----|\n| 東京   | y   |"
        );
    }

    #[test]
    fn single_row_table_renders_nothing() {
        let t = table(&[&["only", "row"]]);
        assert_eq!(render_table(&t), "");
        assert_eq!(render_items(&[DocItem::Table(t)], &opts()), "");
    }

    #[test]
    fn general_format_matches_python() {
        assert_eq!(format_general(1.5), "1.5");
        assert_eq!(format_general(100.0), "100");
        assert_eq!(format_general(3.14159265), "3.14159");
        assert_eq!(format_general(1234567.0), "1.23457e+06");
        assert_eq!(format_general(0.0001), "0.0001");
        assert_eq!(format_general(0.00001), "1e-05");
        assert_eq!(format_general(-2.50), "-2.5");
    }
}
