//! Table reconstruction.
//!
//! The **lines** strategy follows the ruling lines drawn on the page:
//!
//! ```text
//! rulings ─▶ snap ─▶ join ─▶ connected components ─▶ grid ─▶ spans ─▶ cell text
//! ```
//!
//! 1. Parallel rulings within `snap_tolerance` are moved to their mean
//!    position so slightly misaligned strokes share a coordinate.
//! 2. Collinear segments separated by at most `join_tolerance` are merged.
//! 3. Horizontal and vertical edges that touch form connected components;
//!    each component with at least two edges per direction is a candidate.
//! 4. The distinct x and y positions of a component define a grid. Adjacent
//!    grid cells whose separating edge is missing are merged into one
//!    spanning cell, and the spanning cell's text is replicated into every
//!    slot it covers.
//!
//! The optional **text** strategy finds borderless tables: runs of at least
//! three consecutive lines that split into the same number of aligned
//! column segments.

use crate::config::{LayoutTolerances, TableStrategy};
use crate::model::{BBox, Orientation, PageLayout, Ruling, TableData, TextRun};
use crate::pipeline::blocks::{build_lines, split_columns, Line};
use tracing::debug;

/// A table found on a page.
#[derive(Debug, Clone, PartialEq)]
pub struct DetectedTable {
    pub bbox: BBox,
    pub data: TableData,
}

impl DetectedTable {
    /// Whether `run` belongs to this table's text.
    pub fn consumes(&self, run: &TextRun) -> bool {
        self.bbox.contains_point(run.bbox.center_x(), run.bbox.center_y())
    }
}

/// Locate every table on `layout`.
pub fn find_tables(
    layout: &PageLayout,
    strategy: TableStrategy,
    tol: &LayoutTolerances,
) -> Vec<DetectedTable> {
    if strategy == TableStrategy::Disabled {
        return Vec::new();
    }

    let mut tables = find_ruled_tables(layout, tol);
    if strategy == TableStrategy::LinesAndText {
        let remaining: Vec<TextRun> = layout
            .runs
            .iter()
            .filter(|r| !tables.iter().any(|t| t.consumes(r)))
            .cloned()
            .collect();
        tables.extend(find_text_tables(&remaining, layout.width, tol));
    }
    debug!("Page {}: {} tables", layout.page_index + 1, tables.len());
    tables
}

// ── Step 1: Snap ─────────────────────────────────────────────────────────

/// Move parallel rulings within `tolerance` of each other to their mean position.
pub fn snap_rulings(rulings: Vec<Ruling>, tolerance: f32) -> Vec<Ruling> {
    let (mut horizontals, mut verticals): (Vec<Ruling>, Vec<Ruling>) = rulings
        .into_iter()
        .partition(|r| r.orientation == Orientation::Horizontal);
    snap_group(&mut horizontals, tolerance);
    snap_group(&mut verticals, tolerance);
    horizontals.extend(verticals);
    horizontals
}

fn snap_group(rulings: &mut [Ruling], tolerance: f32) {
    rulings.sort_by(|a, b| a.position.total_cmp(&b.position));
    let mut start = 0;
    for i in 1..=rulings.len() {
        let end_of_cluster =
            i == rulings.len() || rulings[i].position - rulings[start].position > tolerance;
        if end_of_cluster {
            let count = (i - start) as f32;
            let mean = rulings[start..i].iter().map(|r| r.position).sum::<f32>() / count;
            for r in &mut rulings[start..i] {
                r.position = mean;
            }
            start = i;
        }
    }
}

// ── Step 2: Join ─────────────────────────────────────────────────────────

/// Merge collinear rulings whose gap is at most `tolerance`.
pub fn join_rulings(mut rulings: Vec<Ruling>, tolerance: f32) -> Vec<Ruling> {
    rulings.sort_by(|a, b| {
        (a.orientation as u8)
            .cmp(&(b.orientation as u8))
            .then(a.position.total_cmp(&b.position))
            .then(a.start.total_cmp(&b.start))
    });

    let mut out: Vec<Ruling> = Vec::with_capacity(rulings.len());
    for r in rulings {
        match out.last_mut() {
            Some(last)
                if last.orientation == r.orientation
                    && (last.position - r.position).abs() < 1e-3
                    && r.start <= last.end + tolerance =>
            {
                last.end = last.end.max(r.end);
            }
            _ => out.push(r),
        }
    }
    out
}

// ── Step 3: Components ───────────────────────────────────────────────────

struct UnionFind {
    parent: Vec<usize>,
}

impl UnionFind {
    fn new(n: usize) -> Self {
        Self {
            parent: (0..n).collect(),
        }
    }

    fn find(&mut self, mut x: usize) -> usize {
        while self.parent[x] != x {
            self.parent[x] = self.parent[self.parent[x]];
            x = self.parent[x];
        }
        x
    }

    fn union(&mut self, a: usize, b: usize) {
        let (ra, rb) = (self.find(a), self.find(b));
        if ra != rb {
            self.parent[rb.max(ra)] = ra.min(rb);
        }
    }

    fn groups(&mut self) -> Vec<Vec<usize>> {
        let n = self.parent.len();
        let mut by_root: Vec<Vec<usize>> = vec![Vec::new(); n];
        for i in 0..n {
            let root = self.find(i);
            by_root[root].push(i);
        }
        by_root.into_iter().filter(|g| !g.is_empty()).collect()
    }
}

fn touches(h: &Ruling, v: &Ruling, tol: f32) -> bool {
    v.position >= h.start - tol
        && v.position <= h.end + tol
        && h.position >= v.start - tol
        && h.position <= v.end + tol
}

/// Split edges into groups connected by horizontal/vertical contact.
fn connected_components(edges: &[Ruling], tol: f32) -> Vec<Vec<Ruling>> {
    let mut uf = UnionFind::new(edges.len());
    for (i, a) in edges.iter().enumerate() {
        for (j, b) in edges.iter().enumerate().skip(i + 1) {
            let connected = match (a.orientation, b.orientation) {
                (Orientation::Horizontal, Orientation::Vertical) => touches(a, b, tol),
                (Orientation::Vertical, Orientation::Horizontal) => touches(b, a, tol),
                _ => false,
            };
            if connected {
                uf.union(i, j);
            }
        }
    }
    uf.groups()
        .into_iter()
        .map(|g| g.into_iter().map(|i| edges[i]).collect())
        .collect()
}

// ── Step 4: Grid and spans ───────────────────────────────────────────────

fn distinct_positions(edges: &[Ruling], orientation: Orientation, tol: f32) -> Vec<f32> {
    let mut positions: Vec<f32> = edges
        .iter()
        .filter(|e| e.orientation == orientation)
        .map(|e| e.position)
        .collect();
    positions.sort_by(f32::total_cmp);
    positions.dedup_by(|b, a| (*b - *a).abs() <= tol);
    positions
}

fn has_edge(
    edges: &[Ruling],
    orientation: Orientation,
    position: f32,
    along: f32,
    tol: f32,
) -> bool {
    edges.iter().any(|e| {
        e.orientation == orientation
            && (e.position - position).abs() <= tol
            && along >= e.start - tol
            && along <= e.end + tol
    })
}

fn find_ruled_tables(layout: &PageLayout, tol: &LayoutTolerances) -> Vec<DetectedTable> {
    let edges: Vec<Ruling> = layout
        .rulings
        .iter()
        .filter(|r| r.length() >= tol.min_edge_length)
        .copied()
        .collect();
    if edges.len() < 4 {
        return Vec::new();
    }
    let edges = join_rulings(snap_rulings(edges, tol.snap_tolerance), tol.join_tolerance);
    let edges: Vec<Ruling> = edges
        .into_iter()
        .filter(|r| r.length() >= tol.min_edge_length)
        .collect();

    let mut tables = Vec::new();
    for component in connected_components(&edges, tol.snap_tolerance) {
        if let Some(table) = grid_table(&component, &layout.runs, tol) {
            tables.push(table);
        }
    }
    tables.sort_by(|a, b| a.bbox.top.total_cmp(&b.bbox.top));
    tables
}

fn grid_table(edges: &[Ruling], runs: &[TextRun], tol: &LayoutTolerances) -> Option<DetectedTable> {
    let t = tol.snap_tolerance;
    let xs = distinct_positions(edges, Orientation::Vertical, t);
    let ys = distinct_positions(edges, Orientation::Horizontal, t);
    if xs.len() < 2 || ys.len() < 2 {
        return None;
    }
    let (rows, cols) = (ys.len() - 1, xs.len() - 1);
    let bbox = BBox::new(xs[0], ys[0], xs[cols], ys[rows]);

    // Merge grid cells across missing separators.
    let id = |r: usize, c: usize| r * cols + c;
    let mut uf = UnionFind::new(rows * cols);
    for r in 0..rows {
        let ymid = (ys[r] + ys[r + 1]) / 2.0;
        for c in 0..cols.saturating_sub(1) {
            if !has_edge(edges, Orientation::Vertical, xs[c + 1], ymid, t) {
                uf.union(id(r, c), id(r, c + 1));
            }
        }
    }
    for c in 0..cols {
        let xmid = (xs[c] + xs[c + 1]) / 2.0;
        for r in 0..rows.saturating_sub(1) {
            if !has_edge(edges, Orientation::Horizontal, ys[r + 1], xmid, t) {
                uf.union(id(r, c), id(r + 1, c));
            }
        }
    }

    // Assign runs to the spanning cell containing their centre.
    let mut cell_runs: Vec<Vec<TextRun>> = vec![Vec::new(); rows * cols];
    for run in runs {
        let (cx, cy) = (run.bbox.center_x(), run.bbox.center_y());
        if !bbox.contains_point(cx, cy) {
            continue;
        }
        let c = xs.windows(2).position(|w| cx >= w[0] && cx <= w[1]);
        let r = ys.windows(2).position(|w| cy >= w[0] && cy <= w[1]);
        if let (Some(r), Some(c)) = (r, c) {
            let root = uf.find(id(r, c));
            cell_runs[root].push(run.clone());
        }
    }

    let mut grid = vec![vec![String::new(); cols]; rows];
    for r in 0..rows {
        for c in 0..cols {
            let root = uf.find(id(r, c));
            grid[r][c] = cell_text(&cell_runs[root], tol);
        }
    }

    let span_groups = uf.groups().len();
    let data = TableData::new(grid);
    if span_groups < 2 || data.non_empty_cells() < 2 {
        return None;
    }
    Some(DetectedTable {
        bbox,
        data: data.prune_empty(),
    })
}

fn cell_text(runs: &[TextRun], tol: &LayoutTolerances) -> String {
    if runs.is_empty() {
        return String::new();
    }
    build_lines(runs, tol)
        .iter()
        .map(|l| l.text(tol.word_gap_ratio))
        .filter(|t| !t.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
}

// ── Text strategy ────────────────────────────────────────────────────────

const MIN_TEXT_ROWS: usize = 3;

fn aligned(a: &BBox, b: &BBox, tol: f32) -> bool {
    (a.x0 - b.x0).abs() <= tol
        || (a.x1 - b.x1).abs() <= tol
        || (a.center_x() - b.center_x()).abs() <= tol
}

fn rows_match(a: &[Line], b: &[Line], tol: f32) -> bool {
    a.len() == b.len() && a.iter().zip(b).all(|(x, y)| aligned(&x.bbox, &y.bbox, tol))
}

/// Borderless tables from column-aligned lines.
pub fn find_text_tables(
    runs: &[TextRun],
    page_width: f32,
    tol: &LayoutTolerances,
) -> Vec<DetectedTable> {
    let rows: Vec<Vec<Line>> = build_lines(runs, tol)
        .into_iter()
        .map(|line| split_columns(vec![line], tol.column_gap))
        .collect();

    let mut tables = Vec::new();
    let mut i = 0;
    while i < rows.len() {
        if rows[i].len() < 2 {
            i += 1;
            continue;
        }
        let mut j = i + 1;
        while j < rows.len() {
            let prev_bottom = rows[j - 1].iter().map(|l| l.bbox.bottom).fold(f32::MIN, f32::max);
            let top = rows[j].iter().map(|l| l.bbox.top).fold(f32::MAX, f32::min);
            let size = rows[j][0].font_size().max(1.0);
            if top - prev_bottom > 2.0 * size
                || !rows_match(&rows[i], &rows[j], 2.0 * tol.snap_tolerance)
            {
                break;
            }
            j += 1;
        }

        let group = &rows[i..j];
        let ncols = rows[i].len();
        let widest = group
            .iter()
            .flatten()
            .map(|l| l.bbox.width())
            .fold(0.0f32, f32::max);
        if group.len() >= MIN_TEXT_ROWS && (ncols >= 3 || widest < 0.3 * page_width) {
            let grid: Vec<Vec<String>> = group
                .iter()
                .map(|row| row.iter().map(|l| l.text(tol.word_gap_ratio)).collect())
                .collect();
            let bbox = group
                .iter()
                .flatten()
                .map(|l| l.bbox)
                .reduce(|a, b| a.union(&b))
                .unwrap_or_default();
            tables.push(DetectedTable {
                bbox,
                data: TableData::new(grid),
            });
            i = j;
        } else {
            i += 1;
        }
    }
    tables
}
