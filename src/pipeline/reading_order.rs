//! Reading-order resolution for the elements of one page.
//!
//! A rule-based graph ordering in the style of docling's `reading_order_rb`:
//!
//! 1. Build an up/down graph: `i → j` when `i` is strictly above `j`, the two
//!    overlap horizontally, and no third element sitting between them
//!    interrupts the sequence.
//! 2. Widen each element toward the extent of its neighbours when the growth
//!    is small (≤ 15% of the page width) and collides with nothing, then
//!    rebuild the graph. This reconnects ragged lines with their column.
//! 3. Start from the *heads* (elements without predecessors) in row-major
//!    order and walk the graph depth-first; before visiting an element, climb
//!    to its topmost unvisited predecessor so a column is read top to bottom
//!    before moving right.
//!
//! The result is always a permutation of the input indices.

use crate::model::{BBox, EPS};
use std::cmp::Ordering;

/// Fraction of the page width an element may grow during dilation.
const DILATION_THRESHOLD: f32 = 0.15;

/// Vertical bucket height used when comparing element positions.
const ROW_HEIGHT: f32 = 1.0;

#[derive(Debug, Default)]
struct Graph {
    up: Vec<Vec<usize>>,
    down: Vec<Vec<usize>>,
}

/// Order `boxes` for reading. Returns indices into `boxes`.
pub fn reading_order(boxes: &[BBox], page_width: f32) -> Vec<usize> {
    if boxes.len() <= 1 {
        return (0..boxes.len()).collect();
    }

    let mut graph = build_graph(boxes);
    let dilated = dilate(boxes, &graph, page_width);
    if dilated != boxes {
        graph = build_graph(&dilated);
    }
    sort_neighbours(&mut graph, &dilated);

    let mut heads: Vec<usize> = (0..dilated.len()).filter(|&i| graph.up[i].is_empty()).collect();
    heads.sort_by(|&a, &b| row_major(&dilated[a], &dilated[b]).then(a.cmp(&b)));

    let mut visited = vec![false; dilated.len()];
    let mut order = Vec::with_capacity(dilated.len());
    for head in heads {
        if visited[head] {
            continue;
        }
        visited[head] = true;
        order.push(head);
        walk_down(head, &graph, &mut visited, &mut order);
    }

    let mut rest: Vec<usize> = (0..dilated.len()).filter(|&i| !visited[i]).collect();
    rest.sort_by(|&a, &b| row_major(&dilated[a], &dilated[b]).then(a.cmp(&b)));
    order.extend(rest);
    order
}

/// Row bucket by bottom edge, then left edge.
fn row_major(a: &BBox, b: &BBox) -> Ordering {
    let ra = (a.bottom / ROW_HEIGHT).floor() as i64;
    let rb = (b.bottom / ROW_HEIGHT).floor() as i64;
    ra.cmp(&rb).then(a.x0.total_cmp(&b.x0))
}

fn build_graph(boxes: &[BBox]) -> Graph {
    let n = boxes.len();
    let mut graph = Graph {
        up: vec![Vec::new(); n],
        down: vec![Vec::new(); n],
    };
    for j in 0..n {
        for i in 0..n {
            if i == j {
                continue;
            }
            let (bi, bj) = (&boxes[i], &boxes[j]);
            if !bi.is_strictly_above(bj, EPS) || !bi.overlaps_horizontally(bj) {
                continue;
            }
            if is_interrupted(boxes, i, j) {
                continue;
            }
            graph.down[i].push(j);
            graph.up[j].push(i);
        }
    }
    graph
}

/// Whether some element lies between `i` (above) and `j` (below) in a way
/// that breaks the direct `i → j` sequence.
fn is_interrupted(boxes: &[BBox], i: usize, j: usize) -> bool {
    let (bi, bj) = (&boxes[i], &boxes[j]);
    let region = BBox::new(bi.x0.min(bj.x0), bi.bottom, bi.x1.max(bj.x1), bj.top);
    boxes.iter().enumerate().any(|(k, w)| {
        if k == i || k == j {
            return false;
        }
        let inside = w.x0 >= region.x0
            && w.x1 <= region.x1
            && w.top >= region.top
            && w.bottom <= region.bottom;
        inside
            && (w.overlaps_horizontally(bi) || w.overlaps_horizontally(bj))
            && w.bottom > bi.bottom
            && w.top < bj.top
    })
}

/// Widen boxes toward their graph neighbours where that is cheap and safe.
fn dilate(boxes: &[BBox], graph: &Graph, page_width: f32) -> Vec<BBox> {
    let threshold = page_width * DILATION_THRESHOLD;
    let mut out = boxes.to_vec();
    for (i, b) in boxes.iter().enumerate() {
        let (mut x0, mut x1) = (b.x0, b.x1);
        for &k in graph.up[i].iter().chain(graph.down[i].iter()) {
            x0 = x0.min(boxes[k].x0);
            x1 = x1.max(boxes[k].x1);
        }
        let growth = (x1 - x0) - b.width();
        if growth <= 0.0 || growth > threshold {
            continue;
        }
        let widened = BBox { x0, x1, ..*b };
        let collides = boxes
            .iter()
            .enumerate()
            .any(|(k, other)| k != i && widened.overlaps(other));
        if !collides {
            out[i] = widened;
        }
    }
    out
}

fn sort_neighbours(graph: &mut Graph, boxes: &[BBox]) {
    let cmp = |a: &usize, b: &usize| row_major(&boxes[*a], &boxes[*b]).then(a.cmp(b));
    for list in graph.down.iter_mut().chain(graph.up.iter_mut()) {
        list.sort_by(cmp);
    }
}

/// Climb from `start` to its topmost unvisited predecessor.
fn climb_up(start: usize, graph: &Graph, visited: &[bool]) -> usize {
    let mut current = start;
    // Bounded by the element count; the graph is acyclic (edges point downward).
    for _ in 0..visited.len() {
        match graph.up[current].iter().find(|&&p| !visited[p]) {
            Some(&p) => current = p,
            None => break,
        }
    }
    current
}

/// Iterative depth-first traversal of successors.
fn walk_down(start: usize, graph: &Graph, visited: &mut [bool], order: &mut Vec<usize>) {
    let mut stack: Vec<(usize, usize)> = vec![(start, 0)];
    while let Some((node, offset)) = stack.pop() {
        let successors = &graph.down[node];
        for (pos, &succ) in successors.iter().enumerate().skip(offset) {
            let k = climb_up(succ, graph, visited);
            if !visited[k] {
                visited[k] = true;
                order.push(k);
                stack.push((node, pos + 1));
                stack.push((k, 0));
                break;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn b(x0: f32, top: f32, x1: f32, bottom: f32) -> BBox {
        BBox::new(x0, top, x1, bottom)
    }

    fn is_permutation(order: &[usize], n: usize) -> bool {
        let mut sorted = order.to_vec();
        sorted.sort_unstable();
        sorted == (0..n).collect::<Vec<_>>()
    }

    #[test]
    fn empty_and_single() {
        assert!(reading_order(&[], 600.0).is_empty());
        assert_eq!(reading_order(&[b(0.0, 0.0, 1.0, 1.0)], 600.0), vec![0]);
    }

    #[test]
    fn two_columns_read_column_by_column() {
        let boxes = [
            b(310.0, 100.0, 550.0, 200.0), // right top
            b(50.0, 210.0, 290.0, 300.0),  // left bottom
            b(50.0, 50.0, 550.0, 70.0),    // title
            b(310.0, 210.0, 550.0, 300.0), // right bottom
            b(50.0, 100.0, 290.0, 200.0),  // left top
        ];
        assert_eq!(reading_order(&boxes, 600.0), vec![2, 4, 1, 0, 3]);
    }

    #[test]
    fn single_column_is_top_to_bottom() {
        let boxes = [
            b(50.0, 300.0, 550.0, 350.0),
            b(50.0, 100.0, 550.0, 150.0),
            b(50.0, 200.0, 550.0, 250.0),
        ];
        assert_eq!(reading_order(&boxes, 600.0), vec![1, 2, 0]);
    }

    #[test]
    fn full_width_element_after_columns_comes_last() {
        let boxes = [
            b(50.0, 100.0, 290.0, 200.0),
            b(310.0, 100.0, 550.0, 200.0),
            b(50.0, 400.0, 550.0, 450.0), // footer-like paragraph below both columns
        ];
        assert_eq!(reading_order(&boxes, 600.0), vec![0, 1, 2]);
    }

    #[test]
    fn side_by_side_elements_read_left_to_right() {
        let boxes = [b(300.0, 100.0, 400.0, 120.0), b(100.0, 100.0, 200.0, 120.0)];
        assert_eq!(reading_order(&boxes, 600.0), vec![1, 0]);
    }

    #[test]
    fn short_trailing_line_stays_with_its_column() {
        let boxes = [
            b(50.0, 100.0, 290.0, 200.0),
            b(310.0, 100.0, 550.0, 200.0),
            b(60.0, 205.0, 150.0, 215.0),
        ];
        let order = reading_order(&boxes, 600.0);
        assert_eq!(order, vec![0, 2, 1]);
    }

    #[test]
    fn slightly_narrower_neighbour_is_widened() {
        let boxes = [b(50.0, 100.0, 290.0, 150.0), b(50.0, 160.0, 250.0, 200.0)];
        let graph = build_graph(&boxes);
        let dilated = dilate(&boxes, &graph, 600.0);
        assert_eq!(dilated[1].x1, 290.0);
        assert_eq!(dilated[0], boxes[0]);
    }

    #[test]
    fn result_is_always_a_permutation() {
        let boxes: Vec<BBox> = (0..25)
            .map(|i| {
                let col = (i % 3) as f32;
                let row = (i / 3) as f32;
                b(
                    50.0 + col * 170.0,
                    40.0 + row * 35.0 + col * 3.0,
                    200.0 + col * 170.0,
                    60.0 + row * 35.0,
                )
            })
            .collect();
        let order = reading_order(&boxes, 600.0);
        assert!(is_permutation(&order, boxes.len()));
    }
}
