use anyhow::{ensure, Result};
use ndarray::{ArrayView1, ArrayView2};

/// Subsequence alignment of a query against a (possibly longer) reference.
#[derive(Debug, Clone)]
pub struct SubsequenceAlignment {
    /// Accumulated cost in the bottom-right cell
    pub corner_cost: f64,
    /// Accumulated cost at the end of the chosen path
    pub path_cost: f64,
    /// (query frame, reference frame) pairs in ascending order
    pub path: Vec<(usize, usize)>,
}

/// Row-major accumulated cost matrix.
struct CostMatrix {
    cols: usize,
    cells: Vec<f32>,
}

impl CostMatrix {
    fn at(&self, row: usize, col: usize) -> f32 {
        self.cells[row * self.cols + col]
    }
}

/// Dynamic time warping where the query may start and end anywhere in the reference.
///
/// Frames are rows. Steps are (1,1), (0,1) and (1,0) with unit weights; the first
/// query row is not accumulated along the reference axis.
pub fn subsequence_dtw(
    query: ArrayView2<'_, f64>,
    reference: ArrayView2<'_, f64>,
) -> Result<SubsequenceAlignment> {
    ensure!(query.nrows() > 0, "query sequence has no frames");
    ensure!(reference.nrows() > 0, "reference sequence has no frames");
    ensure!(
        query.ncols() == reference.ncols(),
        "feature width mismatch: {} vs {}",
        query.ncols(),
        reference.ncols()
    );

    let matrix = accumulate(query, reference);
    let last_row = query.nrows() - 1;
    let end_col = (0..matrix.cols)
        .min_by(|&a, &b| matrix.at(last_row, a).total_cmp(&matrix.at(last_row, b)))
        .unwrap_or(0);
    let path = backtrack(&matrix, last_row, end_col);
    let corner_cost = matrix.at(last_row, matrix.cols - 1) as f64;
    ensure!(corner_cost.is_finite(), "alignment cost is not finite");

    Ok(SubsequenceAlignment {
        corner_cost,
        path_cost: matrix.at(last_row, end_col) as f64,
        path,
    })
}

fn accumulate(query: ArrayView2<'_, f64>, reference: ArrayView2<'_, f64>) -> CostMatrix {
    let (rows, cols) = (query.nrows(), reference.nrows());
    let mut cells = vec![0.0_f32; rows * cols];
    for i in 0..rows {
        let q = query.row(i);
        for j in 0..cols {
            let local = euclidean(q, reference.row(j)) as f32;
            let best_previous = match (i, j) {
                (0, _) => 0.0,
                (_, 0) => cells[(i - 1) * cols],
                _ => cells[(i - 1) * cols + j - 1]
                    .min(cells[i * cols + j - 1])
                    .min(cells[(i - 1) * cols + j]),
            };
            cells[i * cols + j] = local + best_previous;
        }
    }
    CostMatrix { cols, cells }
}

fn backtrack(matrix: &CostMatrix, mut row: usize, mut col: usize) -> Vec<(usize, usize)> {
    let mut path = vec![(row, col)];
    while row > 0 {
        if col == 0 {
            row -= 1;
        } else {
            let diagonal = matrix.at(row - 1, col - 1);
            let left = matrix.at(row, col - 1);
            let up = matrix.at(row - 1, col);
            if diagonal <= left && diagonal <= up {
                row -= 1;
                col -= 1;
            } else if left <= up {
                col -= 1;
            } else {
                row -= 1;
            }
        }
        path.push((row, col));
    }
    path.reverse();
    path
}

pub(crate) fn euclidean(a: ArrayView1<'_, f64>, b: ArrayView1<'_, f64>) -> f64 {
    a.iter()
        .zip(b.iter())
        .map(|(x, y)| (x - y).powi(2))
        .sum::<f64>()
        .sqrt()
}
