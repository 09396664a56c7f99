//! Text runs → lines → column segments → blocks.
//!
//! Runs are first grouped into physical lines by vertical overlap, then each
//! line is split wherever a gap wider than the column gutter appears (two
//! side-by-side columns share baselines but must never share a line). The
//! resulting segments are stacked into blocks: a segment joins the block
//! directly above it when the two overlap horizontally, sit close enough
//! vertically and look alike typographically.

use crate::config::LayoutTolerances;
use crate::model::{BBox, TextRun};
use crate::pipeline::classify::parse_list_marker;

/// One physical line (or one column segment of it).
#[derive(Debug, Clone, PartialEq)]
pub struct Line {
    pub bbox: BBox,
    /// Runs ordered left to right.
    pub runs: Vec<TextRun>,
}

impl Line {
    fn from_runs(mut runs: Vec<TextRun>) -> Self {
        runs.sort_by(|a, b| a.bbox.x0.total_cmp(&b.bbox.x0));
        let bbox = runs
            .iter()
            .map(|r| r.bbox)
            .reduce(|a, b| a.union(&b))
            .unwrap_or_default();
        Self { bbox, runs }
    }

    /// Line text with spaces inserted at word gaps.
    pub fn text(&self, word_gap_ratio: f32) -> String {
        let mut out = String::new();
        let mut prev: Option<&TextRun> = None;
        for run in &self.runs {
            if let Some(p) = prev {
                let gap = run.bbox.x0 - p.bbox.x1;
                let threshold = word_gap_ratio * p.font_size.max(run.font_size);
                let has_space = out.ends_with(char::is_whitespace)
                    || run.text.starts_with(char::is_whitespace);
                if gap > threshold && !has_space {
                    out.push(' ');
                }
            }
            out.push_str(&run.text);
            prev = Some(run);
        }
        collapse_spaces(out.trim())
    }

    /// Character-weighted dominant font size.
    pub fn font_size(&self) -> f32 {
        dominant_size(self.runs.iter().map(|r| (r.font_size, r.char_count())))
    }

    fn styled_runs(&self) -> impl Iterator<Item = &TextRun> {
        self.runs.iter().filter(|r| r.char_count() > 0)
    }

    pub fn is_bold(&self) -> bool {
        self.styled_runs().count() > 0 && self.styled_runs().all(|r| r.bold)
    }

    pub fn is_monospace(&self) -> bool {
        self.styled_runs().count() > 0 && self.styled_runs().all(|r| r.monospace)
    }

    pub fn char_count(&self) -> usize {
        self.runs.iter().map(TextRun::char_count).sum()
    }
}

/// A vertical stack of lines forming one candidate paragraph.
#[derive(Debug, Clone, PartialEq)]
pub struct TextBlock {
    pub bbox: BBox,
    /// Lines ordered top to bottom.
    pub lines: Vec<Line>,
}

impl TextBlock {
    fn new(line: Line) -> Self {
        Self {
            bbox: line.bbox,
            lines: vec![line],
        }
    }

    fn push(&mut self, line: Line) {
        self.bbox = self.bbox.union(&line.bbox);
        self.lines.push(line);
    }

    pub fn font_size(&self) -> f32 {
        dominant_size(
            self.lines
                .iter()
                .flat_map(|l| l.runs.iter())
                .map(|r| (r.font_size, r.char_count())),
        )
    }

    pub fn is_bold(&self) -> bool {
        self.lines.iter().all(Line::is_bold)
    }

    pub fn is_monospace(&self) -> bool {
        self.lines.iter().all(Line::is_monospace)
    }

    pub fn char_count(&self) -> usize {
        self.lines.iter().map(Line::char_count).sum()
    }

    /// Text of every line, one entry per line.
    pub fn line_texts(&self, word_gap_ratio: f32) -> Vec<String> {
        self.lines
            .iter()
            .map(|l| l.text(word_gap_ratio))
            .filter(|t| !t.is_empty())
            .collect()
    }

    /// Lines joined into running text.
    pub fn text(&self, word_gap_ratio: f32, dehyphenate: bool) -> String {
        join_lines(&self.line_texts(word_gap_ratio), dehyphenate)
    }
}

/// Join wrapped lines with spaces, optionally re-joining hyphenated words.
///
/// A line ending in `letter-` followed by a line starting with a lowercase
/// letter is treated as one word split by the line break.
pub fn join_lines(lines: &[String], dehyphenate: bool) -> String {
    let mut out = String::new();
    for line in lines {
        if out.is_empty() {
            out.push_str(line);
            continue;
        }
        let continues_word = dehyphenate
            && out.ends_with('-')
            && out
                .chars()
                .rev()
                .nth(1)
                .is_some_and(|c| c.is_alphabetic() && c.is_lowercase())
            && line.chars().next().is_some_and(char::is_lowercase);
        if continues_word {
            out.pop();
        } else {
            out.push(' ');
        }
        out.push_str(line);
    }
    out
}

/// Group runs into lines by vertical overlap.
pub fn build_lines(runs: &[TextRun], tol: &LayoutTolerances) -> Vec<Line> {
    let mut sorted: Vec<&TextRun> = runs.iter().filter(|r| !r.text.trim().is_empty()).collect();
    sorted.sort_by(|a, b| {
        a.bbox
            .center_y()
            .total_cmp(&b.bbox.center_y())
            .then(a.bbox.x0.total_cmp(&b.bbox.x0))
    });

    let mut groups: Vec<(BBox, Vec<TextRun>)> = Vec::new();
    for run in sorted {
        let target = groups.iter_mut().rev().take(4).find(|(bbox, _)| {
            let min_h = bbox.height().min(run.bbox.height()).max(0.1);
            bbox.v_overlap(&run.bbox) / min_h >= tol.line_overlap_ratio
        });
        match target {
            Some((bbox, members)) => {
                *bbox = bbox.union(&run.bbox);
                members.push(run.clone());
            }
            None => groups.push((run.bbox, vec![run.clone()])),
        }
    }

    let mut lines: Vec<Line> = groups.into_iter().map(|(_, runs)| Line::from_runs(runs)).collect();
    lines.sort_by(|a, b| a.bbox.top.total_cmp(&b.bbox.top));
    lines
}

/// Split lines wherever the gap between consecutive runs exceeds `column_gap`.
pub fn split_columns(lines: Vec<Line>, column_gap: f32) -> Vec<Line> {
    let mut out = Vec::with_capacity(lines.len());
    for line in lines {
        let mut current: Vec<TextRun> = Vec::new();
        let mut right = f32::NEG_INFINITY;
        for run in line.runs {
            if !current.is_empty() && run.bbox.x0 - right > column_gap {
                out.push(Line::from_runs(std::mem::take(&mut current)));
            }
            right = right.max(run.bbox.x1);
            current.push(run);
        }
        if !current.is_empty() {
            out.push(Line::from_runs(current));
        }
    }
    out
}

/// Stack column segments into blocks.
pub fn build_blocks(segments: Vec<Line>, tol: &LayoutTolerances) -> Vec<TextBlock> {
    let mut segments = segments;
    segments.sort_by(|a, b| {
        a.bbox
            .top
            .total_cmp(&b.bbox.top)
            .then(a.bbox.x0.total_cmp(&b.bbox.x0))
    });

    let mut blocks: Vec<TextBlock> = Vec::new();
    for seg in segments {
        let mut best: Option<(usize, f32)> = None;
        for (i, block) in blocks.iter().enumerate() {
            if let Some(gap) = continuation_gap(block, &seg, tol) {
                if best.is_none_or(|(_, g)| gap < g) {
                    best = Some((i, gap));
                }
            }
        }
        match best {
            Some((i, _)) => blocks[i].push(seg),
            None => blocks.push(TextBlock::new(seg)),
        }
    }
    blocks
}

/// Vertical gap between `block` and `seg` when `seg` may continue the block.
fn continuation_gap(block: &TextBlock, seg: &Line, tol: &LayoutTolerances) -> Option<f32> {
    let last = block.lines.last()?;
    let size = last.font_size().max(seg.font_size()).max(1.0);
    let gap = seg.bbox.top - last.bbox.bottom;

    if gap < -0.3 * size || gap > tol.paragraph_gap_ratio * size {
        return None;
    }
    if last.bbox.h_overlap(&seg.bbox) <= 0.0 {
        return None;
    }
    let (a, b) = (last.font_size(), seg.font_size());
    if (a - b).abs() > 0.15 * a.max(b) {
        return None;
    }
    if last.is_bold() != seg.is_bold() {
        return None;
    }

    let seg_text = seg.text(tol.word_gap_ratio);
    if parse_list_marker(&seg_text).is_some() {
        return None;
    }

    // A noticeably larger gap than the block's own leading starts a paragraph.
    if block.lines.len() >= 2 {
        let prev = &block.lines[block.lines.len() - 2];
        let leading = last.bbox.top - prev.bbox.bottom;
        if gap > leading + 0.5 * size {
            return None;
        }
    }

    // First-line indent opens a new paragraph, except under list items.
    let first_text = block.lines[0].text(tol.word_gap_ratio);
    let is_list = parse_list_marker(&first_text).is_some();
    if !is_list && block.lines.len() >= 2 && seg.bbox.x0 - block.bbox.x0 > size {
        return None;
    }
    Some(gap)
}

/// Mode of `(size, weight)` pairs with sizes bucketed to 0.5pt.
pub fn dominant_size(sizes: impl Iterator<Item = (f32, usize)>) -> f32 {
    let mut buckets: Vec<(i32, usize)> = Vec::new();
    for (size, weight) in sizes {
        if weight == 0 || !size.is_finite() {
            continue;
        }
        let key = (size * 2.0).round() as i32;
        match buckets.iter_mut().find(|(k, _)| *k == key) {
            Some((_, w)) => *w += weight,
            None => buckets.push((key, weight)),
        }
    }
    buckets
        .into_iter()
        .max_by(|a, b| a.1.cmp(&b.1).then(b.0.cmp(&a.0)))
        .map(|(k, _)| k as f32 / 2.0)
        .unwrap_or(0.0)
}

fn collapse_spaces(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut prev_space = false;
    for c in s.chars() {
        if c.is_whitespace() {
            if !prev_space {
                out.push(' ');
            }
            prev_space = true;
        } else {
            out.push(c);
            prev_space = false;
        }
    }
    out
}
