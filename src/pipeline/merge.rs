//! Document-level merges over the analysed pages.
//!
//! Page analysis sees one page at a time; a few decisions need the
//! neighbouring pages or the whole document:
//!
//! * a paragraph cut by a column or page break is re-joined with its
//!   continuation (docling's `predict_merges` rule);
//! * only the first title survives, later ones become section headers;
//! * a caption that follows its table or picture is moved in front of it.
//!
//! The page structure is preserved: the result has one item list per input
//! page, and a continuation is folded into the paragraph on the earlier page.

use crate::model::{DocItem, PageAnalysis, PageItem, EPS};
use crate::pipeline::blocks::join_lines;
use once_cell::sync::Lazy;
use regex::Regex;
use tracing::debug;

/// Text that may continue: ends in a lowercase letter, comma or hyphen.
static RE_OPEN_END: Lazy<Regex> = Lazy::new(|| Regex::new(r".+([a-z,\-])(\s*)$").unwrap());

/// Text that continues something: starts with a lowercase letter.
static RE_CONTINUATION: Lazy<Regex> = Lazy::new(|| Regex::new(r"^(\s*[a-z])(.+)").unwrap());

struct Entry {
    page: usize,
    item: PageItem,
}

/// Merge across columns and pages. Returns the items of each page.
pub fn merge_pages(pages: Vec<PageAnalysis>, dehyphenate: bool) -> Vec<Vec<DocItem>> {
    let page_count = pages.len();
    let mut entries: Vec<Option<Entry>> = pages
        .into_iter()
        .enumerate()
        .flat_map(|(page, analysis)| {
            analysis
                .items
                .into_iter()
                .map(move |item| Some(Entry { page, item }))
        })
        .collect();

    merge_continuations(&mut entries, dehyphenate);

    let mut entries: Vec<Entry> = entries.into_iter().flatten().collect();
    demote_extra_titles(&mut entries);
    captions_first(&mut entries);

    let mut out: Vec<Vec<DocItem>> = (0..page_count).map(|_| Vec::new()).collect();
    for entry in entries {
        out[entry.page].push(entry.item.item);
    }
    out
}

/// Items a continuation may jump over.
fn is_skippable(item: &DocItem) -> bool {
    item.is_furniture()
        || matches!(
            item,
            DocItem::Table(_) | DocItem::Picture { .. } | DocItem::Caption(_)
        )
}

// ── Paragraph continuation ───────────────────────────────────────────────

fn merge_continuations(entries: &mut [Option<Entry>], dehyphenate: bool) {
    let mut merged = 0usize;
    for i in 0..entries.len() {
        loop {
            let Some(current) = entries[i].as_ref() else {
                break;
            };
            let DocItem::Paragraph(text) = &current.item.item else {
                break;
            };
            if !RE_OPEN_END.is_match(text) {
                break;
            }

            let next = (i + 1..entries.len()).find(|&k| {
                entries[k]
                    .as_ref()
                    .is_some_and(|e| !is_skippable(&e.item.item))
            });
            let Some(j) = next else {
                break;
            };
            let Some(candidate) = entries[j].as_ref() else {
                break;
            };
            let DocItem::Paragraph(next_text) = &candidate.item.item else {
                break;
            };
            let placed_after = candidate.page != current.page
                || current.item.bbox.is_strictly_left_of(&candidate.item.bbox, EPS);
            if !placed_after || !RE_CONTINUATION.is_match(next_text) {
                break;
            }

            let joined = join_lines(&[text.clone(), next_text.clone()], dehyphenate);
            let same_page = candidate.page == current.page;
            let next_bbox = candidate.item.bbox;
            entries[j] = None;
            if let Some(entry) = entries[i].as_mut() {
                entry.item.item = DocItem::Paragraph(joined);
                if same_page {
                    entry.item.bbox = entry.item.bbox.union(&next_bbox);
                }
            }
            merged += 1;
        }
    }
    if merged > 0 {
        debug!("Merged {} paragraph continuations", merged);
    }
}

// ── Titles ───────────────────────────────────────────────────────────────

fn demote_extra_titles(entries: &mut [Entry]) {
    let mut seen = false;
    for entry in entries.iter_mut() {
        if let DocItem::Title(text) = &entry.item.item {
            if seen {
                entry.item.item = DocItem::SectionHeader {
                    level: 1,
                    text: text.clone(),
                };
            }
            seen = true;
        }
    }
}

// ── Captions ─────────────────────────────────────────────────────────────

fn captions_first(entries: &mut [Entry]) {
    let is_float = |item: &DocItem| matches!(item, DocItem::Table(_) | DocItem::Picture { .. });
    let mut k = 1;
    while k < entries.len() {
        let attach = matches!(entries[k].item.item, DocItem::Caption(_))
            && is_float(&entries[k - 1].item.item)
            && entries[k].page == entries[k - 1].page
            && (k < 2 || !matches!(entries[k - 2].item.item, DocItem::Caption(_)));
        if attach {
            entries.swap(k - 1, k);
            k += 2;
        } else {
            k += 1;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{BBox, TableData};

    fn item(x0: f32, top: f32, x1: f32, bottom: f32, item: DocItem) -> PageItem {
        PageItem {
            bbox: BBox::new(x0, top, x1, bottom),
            item,
        }
    }

    fn para(text: &str) -> DocItem {
        DocItem::Paragraph(text.into())
    }

    fn page(index: usize, items: Vec<PageItem>) -> PageAnalysis {
        PageAnalysis {
            page_index: index,
            width: 600.0,
            height: 800.0,
            items,
        }
    }

    #[test]
    fn paragraph_continues_into_next_column() {
        let pages = vec![page(
            0,
            vec![
                item(50.0, 100.0, 290.0, 700.0, para("the model is trained on")),
                item(310.0, 100.0, 550.0, 300.0, para("a large corpus of documents.")),
            ],
        )];
        let merged = merge_pages(pages, true);
        assert_eq!(merged[0], vec![para("the model is trained on a large corpus of documents.")]);
    }

    #[test]
    fn paragraph_continues_across_pages_over_furniture() {
        let pages = vec![
            page(
                0,
                vec![
                    item(50.0, 100.0, 550.0, 700.0, para("results were obtained with the exam-")),
                    item(290.0, 770.0, 300.0, 780.0, DocItem::PageFooter("1".into())),
                ],
            ),
            page(
                1,
                vec![
                    item(50.0, 20.0, 300.0, 30.0, DocItem::PageHeader("Running head".into())),
                    item(50.0, 100.0, 550.0, 200.0, para("ple configuration.")),
                    item(50.0, 220.0, 550.0, 300.0, para("Another paragraph.")),
                ],
            ),
        ];
        let merged = merge_pages(pages, true);
        assert_eq!(
            merged[0],
            vec![
                para("results were obtained with the example configuration."),
                DocItem::PageFooter("1".into())
            ]
        );
        assert_eq!(
            merged[1],
            vec![DocItem::PageHeader("Running head".into()), para("Another paragraph.")]
        );
    }

    #[test]
    fn closed_sentences_and_capitalised_starts_are_not_merged() {
        let pages = vec![page(
            0,
            vec![
                item(50.0, 100.0, 290.0, 700.0, para("The sentence ends here.")),
                item(310.0, 100.0, 550.0, 300.0, para("but this one starts lowercase")),
                item(310.0, 320.0, 550.0, 400.0, para("Capitalised start.")),
            ],
        )];
        let merged = merge_pages(pages, true);
        assert_eq!(merged[0].len(), 3);
    }

    #[test]
    fn same_column_paragraphs_stay_apart() {
        let pages = vec![page(
            0,
            vec![
                item(50.0, 100.0, 550.0, 200.0, para("an open ending,")),
                item(50.0, 220.0, 550.0, 300.0, para("and a lowercase start")),
            ],
        )];
        let merged = merge_pages(pages, true);
        assert_eq!(merged[0].len(), 2);
    }

    #[test]
    fn only_first_title_survives() {
        let pages = vec![
            page(0, vec![item(50.0, 50.0, 550.0, 80.0, DocItem::Title("Main".into()))]),
            page(1, vec![item(50.0, 50.0, 550.0, 80.0, DocItem::Title("Appendix".into()))]),
        ];
        let merged = merge_pages(pages, true);
        assert_eq!(merged[0], vec![DocItem::Title("Main".into())]);
        assert_eq!(
            merged[1],
            vec![DocItem::SectionHeader {
                level: 1,
                text: "Appendix".into()
            }]
        );
    }

    #[test]
    fn trailing_caption_moves_before_its_table() {
        let table = DocItem::Table(TableData::new(vec![vec!["a".into(), "b".into()]]));
        let pages = vec![page(
            0,
            vec![
                item(50.0, 100.0, 550.0, 200.0, table.clone()),
                item(50.0, 210.0, 550.0, 220.0, DocItem::Caption("Table 1: Results.".into())),
                item(50.0, 300.0, 550.0, 310.0, para("Text.")),
            ],
        )];
        let merged = merge_pages(pages, true);
        assert_eq!(
            merged[0],
            vec![DocItem::Caption("Table 1: Results.".into()), table, para("Text.")]
        );
    }

    #[test]
    fn leading_caption_stays_put() {
        let pic = DocItem::Picture { image: None };
        let pages = vec![page(
            0,
            vec![
                item(50.0, 90.0, 550.0, 99.0, DocItem::Caption("Figure 1: Above.".into())),
                item(50.0, 100.0, 550.0, 200.0, pic.clone()),
                item(50.0, 210.0, 550.0, 220.0, DocItem::Caption("Figure 2: Below.".into())),
            ],
        )];
        let merged = merge_pages(pages, true);
        assert_eq!(
            merged[0],
            vec![
                DocItem::Caption("Figure 1: Above.".into()),
                pic,
                DocItem::Caption("Figure 2: Below.".into())
            ]
        );
    }
}
